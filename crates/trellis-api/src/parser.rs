// ── Response parser registry ──
//
// Ordered (pattern, verb, handler) entries that pick a response
// transformer per request. First structural + verb match wins; a
// derived resource's entries sit in front of its parent's.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::Error;
use crate::route::Verb;

/// A response transformer: `(payload, request params) -> transformed`.
/// Returning `None` (or a falsy value) makes the engine resolve with `{}`.
pub type ParserFn = Arc<dyn Fn(Value, &Map<String, Value>) -> Option<Value> + Send + Sync>;

/// Named response handlers that parser entries may refer to.
///
/// Names are resolved when a parser table is compiled, so a typo fails
/// the resource definition instead of the first matching request.
#[derive(Clone, Default)]
pub struct HandlerSet {
    handlers: HashMap<String, ParserFn>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set preloaded with `identity` and `data` (unwraps a top-level
    /// `data` key when present).
    pub fn with_builtins() -> Self {
        let mut set = Self::new();
        set.register("identity", |payload, _| Some(payload));
        set.register("data", |payload, _| match payload {
            Value::Object(mut obj) if obj.contains_key("data") => obj.remove("data"),
            other => Some(other),
        });
        set
    }

    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Value, &Map<String, Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<ParserFn> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HandlerSet").field("handlers", &names).finish()
    }
}

/// What a parser key maps to: a registered handler name or a closure.
#[derive(Clone)]
pub enum ParserTarget {
    Named(String),
    Handler(ParserFn),
}

impl ParserTarget {
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(Value, &Map<String, Value>) -> Option<Value> + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(handler))
    }
}

impl From<&str> for ParserTarget {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for ParserTarget {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for ParserTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// One compiled parser entry.
#[derive(Clone)]
pub struct ParserEntry {
    source: String,
    verb: Option<Verb>,
    pattern: Regex,
    handler: ParserFn,
}

impl ParserEntry {
    /// The path the pattern was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn verb(&self) -> Option<Verb> {
        self.verb
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    fn matches(&self, uri: &str, verb: Verb) -> bool {
        self.verb.is_none_or(|v| v == verb) && self.pattern.is_match(uri)
    }
}

impl fmt::Debug for ParserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserEntry")
            .field("source", &self.source)
            .field("verb", &self.verb)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Ordered parser entries for one resource.
#[derive(Debug, Clone, Default)]
pub struct ParserTable {
    entries: Vec<ParserEntry>,
}

impl ParserTable {
    /// Compile declarative parser entries and place them in front of the
    /// `inherited` entries.
    ///
    /// Keys are `"VERB path"`, `"#verb#path"`, or a bare `"path"` that
    /// matches any verb.
    pub fn compile<I, K, T>(
        entries: I,
        handlers: &HandlerSet,
        inherited: &ParserTable,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Into<ParserTarget>,
    {
        let mut compiled = Vec::new();
        for (key, target) in entries {
            let key = key.as_ref();
            let (verb, path) = parse_key(key)?;
            let handler = match target.into() {
                ParserTarget::Handler(f) => f,
                ParserTarget::Named(name) => handlers
                    .get(&name)
                    .ok_or(Error::UnknownHandler { name })?,
            };
            compiled.push(ParserEntry {
                source: path.to_owned(),
                verb,
                pattern: compile_pattern(path)?,
                handler,
            });
        }
        compiled.extend(inherited.entries.iter().cloned());
        Ok(Self { entries: compiled })
    }

    /// The handler of the first entry matching `uri` and `verb`.
    pub fn resolve(&self, uri: &str, verb: Verb) -> Option<&ParserFn> {
        let entry = self.entries.iter().find(|e| e.matches(uri, verb))?;
        trace!(uri, %verb, pattern = entry.source(), "parser selected");
        Some(&entry.handler)
    }

    pub fn entries(&self) -> &[ParserEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_key(key: &str) -> Result<(Option<Verb>, &str), Error> {
    let key = key.trim();
    let invalid = |reason: &str| Error::InvalidRoute {
        key: key.to_owned(),
        reason: reason.to_owned(),
    };

    if let Some(rest) = key.strip_prefix('#') {
        let (verb, path) = rest
            .split_once('#')
            .ok_or_else(|| invalid("unterminated '#verb#' prefix"))?;
        let verb = verb.parse().map_err(|_| invalid("unknown verb"))?;
        return Ok((Some(verb), path));
    }

    match key.split_once(char::is_whitespace) {
        Some((verb, path)) => {
            let verb = verb.parse().map_err(|_| invalid("unknown verb"))?;
            Ok((Some(verb), path.trim()))
        }
        None => Ok((None, key)),
    }
}

/// Compile a route-style path into an anchored regex.
///
/// `(optional)` groups become optional non-capturing groups, `:name`
/// matches one non-empty run of non-slash characters, `*name` matches
/// anything (lazily). Every other character is literal.
fn compile_pattern(path: &str) -> Result<Regex, Error> {
    let mut out = String::from("^");
    let mut chars = path.chars().peekable();
    let mut buf = [0u8; 4];

    while let Some(c) = chars.next() {
        match c {
            '(' => out.push_str("(?:"),
            ')' => out.push_str(")?"),
            ':' | '*' if chars.peek().is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_') => {
                while chars
                    .next_if(|n| n.is_ascii_alphanumeric() || *n == '_')
                    .is_some()
                {}
                out.push_str(if c == ':' { "([^/]+)" } else { "(.*?)" });
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|source| Error::InvalidPattern {
        pattern: path.to_owned(),
        source,
    })
}
