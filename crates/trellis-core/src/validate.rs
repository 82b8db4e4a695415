// ── Property validators ──
//
// Declared per property on a controller definition and run on demand by
// `Controller::validate`. Failures are collected rather than
// short-circuited so every problem is reported at once.

use std::fmt;
use std::rc::Rc;

use regex::Regex;
use serde_json::Value;

use crate::error::CoreError;

type CheckFn = Rc<dyn Fn(&Value) -> Result<(), String>>;

/// A single rule applied to one property value.
#[derive(Clone)]
pub enum Validator {
    /// Fails for `null`, empty strings, and empty arrays.
    Required,
    /// Minimum length in characters (strings) or elements (arrays).
    MinLength(usize),
    MaxLength(usize),
    /// String values must match. Non-strings fail.
    Pattern(Regex),
    Custom(CheckFn),
}

impl Validator {
    pub fn pattern(pattern: &str) -> Result<Self, CoreError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| CoreError::Definition {
                owner: "validator".into(),
                message: format!("invalid pattern '{pattern}': {e}"),
            })
    }

    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + 'static,
    {
        Self::Custom(Rc::new(check))
    }

    /// Check `value`, returning a human-readable reason on failure.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::Required => {
                if is_blank(value) {
                    Err("is required".into())
                } else {
                    Ok(())
                }
            }
            Self::MinLength(min) => match length(value) {
                Some(len) if len < *min => Err(format!("must be at least {min} long")),
                _ => Ok(()),
            },
            Self::MaxLength(max) => match length(value) {
                Some(len) if len > *max => Err(format!("must be at most {max} long")),
                _ => Ok(()),
            },
            Self::Pattern(re) => match value {
                Value::String(s) if re.is_match(s) => Ok(()),
                _ => Err(format!("must match {}", re.as_str())),
            },
            Self::Custom(check) => check(value),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::MinLength(n) => f.debug_tuple("MinLength").field(n).finish(),
            Self::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Null => Some(0),
        _ => None,
    }
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub property: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Run `validators` against `value`, appending failures for `property`.
pub(crate) fn collect_failures(
    property: &str,
    value: &Value,
    validators: &[Validator],
    failures: &mut Vec<ValidationFailure>,
) {
    failures.extend(
        validators
            .iter()
            .filter_map(|v| v.check(value).err())
            .map(|message| ValidationFailure::new(property, message)),
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn required_rejects_blank_values() {
        let v = Validator::Required;
        assert!(v.check(&Value::Null).is_err());
        assert!(v.check(&json!("  ")).is_err());
        assert!(v.check(&json!([])).is_err());
        assert!(v.check(&json!(0)).is_ok());
        assert!(v.check(&json!("x")).is_ok());
    }

    #[test]
    fn length_bounds_count_characters() {
        assert!(Validator::MinLength(3).check(&json!("héé")).is_ok());
        assert!(Validator::MinLength(3).check(&json!("hé")).is_err());
        assert!(Validator::MaxLength(2).check(&json!([1, 2, 3])).is_err());
        assert!(Validator::MaxLength(2).check(&json!(12345)).is_ok());
    }

    #[test]
    fn pattern_requires_a_matching_string() {
        let v = Validator::pattern("^[a-z-]+$").unwrap();
        assert!(v.check(&json!("hello-world")).is_ok());
        assert_eq!(
            v.check(&json!("Hello")).unwrap_err(),
            "must match ^[a-z-]+$"
        );
        assert!(v.check(&json!(5)).is_err());
        assert!(Validator::pattern("(").is_err());
    }

    #[test]
    fn failures_are_collected_per_rule() {
        let mut failures = Vec::new();
        collect_failures(
            "slug",
            &json!("A"),
            &[
                Validator::MinLength(2),
                Validator::pattern("^[a-z]+$").unwrap(),
                Validator::custom(|_| Ok(())),
            ],
            &mut failures,
        );
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.property == "slug"));
    }
}
