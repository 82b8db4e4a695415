// ── Value and naming helpers ──
//
// Shared by the route compiler, the request engine, and the core
// crate's sync naming.

use serde_json::Value;

/// Truthiness of a dynamic value: `null`, `false`, `0`, and `""` are falsy.
/// Arrays and objects are truthy even when empty.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Upper-camel-case a name: `"user_profile"` and `"user-profile"` both
/// become `"UserProfile"`, `"admin/users"` becomes `"AdminUsers"`.
pub fn camel_case(name: &str) -> String {
    name.split(['_', '-', ' ', '/'])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

/// Uppercase the first character, leaving the rest untouched.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render a value for substitution into a URI template.
pub(crate) fn segment_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
