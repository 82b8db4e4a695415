// ── Declarative route compiler ──
//
// Turns `"VERB path"` / `"CRUD name"` keys into named request methods
// with pre-parsed URI templates. Templates support `:name` placeholders
// (filled from call parameters, consumed from the body) and `:$n`
// placeholders (filled from positional arguments).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::Error;
use crate::options::{RequestOptions, RouteCall};
use crate::util::{camel_case, segment_text};

/// HTTP verb of a route or parser entry.
///
/// `DELETE` and its short alias `DEL` parse to the same variant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Verb {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
    #[strum(serialize = "PUT")]
    Put,
    #[strum(to_string = "DELETE", serialize = "DEL")]
    Del,
}

impl Verb {
    pub fn method(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Del => reqwest::Method::DELETE,
        }
    }
}

/// What a route key maps to: a bare method name, or a method name plus
/// static request options (`{ fn = "requestFoo", json_body = true }`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RouteTarget {
    Method(String),
    Options {
        #[serde(rename = "fn")]
        name: String,
        #[serde(flatten)]
        options: RequestOptions,
    },
}

impl RouteTarget {
    /// Interpret an untyped config value. Anything other than a string or
    /// an object with a string `fn` key is rejected.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, Error> {
        serde_json::from_value(value.clone()).map_err(|_| Error::InvalidRouteTarget {
            key: key.to_owned(),
        })
    }

    fn into_parts(self) -> (String, RequestOptions) {
        match self {
            Self::Method(name) => (name, RequestOptions::default()),
            Self::Options { name, options } => (name, options),
        }
    }
}

impl From<&str> for RouteTarget {
    fn from(name: &str) -> Self {
        Self::Method(name.to_owned())
    }
}

impl From<String> for RouteTarget {
    fn from(name: String) -> Self {
        Self::Method(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Named(String),
    Positional(usize),
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' {
            literal.push(c);
            continue;
        }

        let placeholder = if chars.peek() == Some(&'$') {
            let mut lookahead = chars.clone();
            lookahead.next();
            let digits: String = std::iter::from_fn(|| lookahead.next_if(char::is_ascii_digit))
                .collect();
            digits.parse::<usize>().ok().map(|index| {
                // Consume `$` and the digits from the real iterator.
                for _ in 0..=digits.len() {
                    chars.next();
                }
                Segment::Positional(index)
            })
        } else {
            let name: String = std::iter::from_fn(|| chars.next_if(|n| is_word(*n))).collect();
            (!name.is_empty()).then_some(Segment::Named(name))
        };

        match placeholder {
            Some(segment) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(segment);
            }
            None => literal.push(':'),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// A single compiled route: one generated request method.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSpec {
    verb: Verb,
    uri_template: String,
    method_name: String,
    static_options: RequestOptions,
    segments: Vec<Segment>,
}

/// A route with every placeholder filled in, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub verb: Verb,
    pub uri: String,
    /// Call parameters minus those consumed by `:name` placeholders.
    pub body: Map<String, Value>,
    /// Caller options layered over the route's static options.
    pub options: RequestOptions,
}

impl RouteSpec {
    pub fn new(
        verb: Verb,
        uri_template: impl Into<String>,
        method_name: impl Into<String>,
        static_options: RequestOptions,
    ) -> Self {
        let uri_template = uri_template.into();
        let segments = parse_template(&uri_template);
        Self {
            verb,
            uri_template,
            method_name: method_name.into(),
            static_options,
            segments,
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn uri_template(&self) -> &str {
        &self.uri_template
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn static_options(&self) -> &RequestOptions {
        &self.static_options
    }

    /// Names of the `:name` placeholders, in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Named(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Fill the template from `call`.
    ///
    /// Each `:name` is looked up in `call.params` and removed from the
    /// outgoing body; each `:$n` takes `call.args[n]`.
    pub fn resolve(&self, call: RouteCall) -> Result<ResolvedRoute, Error> {
        let RouteCall {
            params,
            options,
            args,
        } = call;
        let mut body = params.clone();
        let mut uri = String::with_capacity(self.uri_template.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => uri.push_str(text),
                Segment::Named(name) => {
                    let value = params.get(name).ok_or_else(|| Error::MissingRouteParam {
                        route: self.method_name.clone(),
                        param: name.clone(),
                    })?;
                    body.remove(name);
                    uri.push_str(&segment_text(value));
                }
                Segment::Positional(index) => {
                    let value = args.get(*index).ok_or_else(|| Error::MissingRouteArg {
                        route: self.method_name.clone(),
                        index: *index,
                    })?;
                    uri.push_str(&segment_text(value));
                }
            }
        }

        Ok(ResolvedRoute {
            verb: self.verb,
            uri,
            body,
            options: options.or_defaults(&self.static_options),
        })
    }
}

/// All request methods generated for one resource, keyed by method name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    routes: IndexMap<String, RouteSpec>,
}

impl RouteTable {
    /// Compile a declarative route map.
    ///
    /// Keys are `"VERB path"` or `"CRUD name"`. A CRUD key expands into
    /// `requestCreate<Name>`, `requestOne<Name>`, `requestUpdate<Name>`
    /// and `requestDelete<Name>`; it generates no method of its own. Its
    /// target must be empty or name the same `<Name>`.
    pub fn compile<I, K, T>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Into<RouteTarget>,
    {
        let mut table = Self::default();
        for (key, target) in entries {
            table.add(key.as_ref(), target.into())?;
        }
        Ok(table)
    }

    fn add(&mut self, key: &str, target: RouteTarget) -> Result<(), Error> {
        let (verb, path) = key
            .trim()
            .split_once(char::is_whitespace)
            .map(|(verb, path)| (verb, path.trim()))
            .ok_or_else(|| Error::InvalidRoute {
                key: key.to_owned(),
                reason: "expected \"VERB path\"".into(),
            })?;
        let (method_name, options) = target.into_parts();

        if verb.eq_ignore_ascii_case("CRUD") {
            let name = camel_case(path);
            if !method_name.is_empty() && camel_case(&method_name) != name {
                return Err(Error::InvalidRoute {
                    key: key.to_owned(),
                    reason: format!("CRUD target '{method_name}' must be empty or '{name}'"),
                });
            }
            let expansions = [
                (Verb::Post, path.to_owned(), format!("requestCreate{name}")),
                (Verb::Get, format!("{path}/:$0"), format!("requestOne{name}")),
                (Verb::Put, format!("{path}/:id"), format!("requestUpdate{name}")),
                (Verb::Del, format!("{path}/:id"), format!("requestDelete{name}")),
            ];
            for (verb, uri, method) in expansions {
                self.insert(RouteSpec::new(verb, uri, method, options.clone()));
            }
            return Ok(());
        }

        let verb: Verb = verb.parse().map_err(|_| Error::InvalidRoute {
            key: key.to_owned(),
            reason: format!("unknown verb '{verb}'"),
        })?;
        if method_name.is_empty() {
            return Err(Error::InvalidRouteTarget {
                key: key.to_owned(),
            });
        }
        self.insert(RouteSpec::new(verb, path, method_name, options));
        Ok(())
    }

    fn insert(&mut self, spec: RouteSpec) {
        self.routes.insert(spec.method_name.clone(), spec);
    }

    /// Add every parent route whose method name is not already defined.
    pub(crate) fn inherit(&mut self, parent: &RouteTable) {
        for (name, spec) in &parent.routes {
            if !self.routes.contains_key(name) {
                self.routes.insert(name.clone(), spec.clone());
            }
        }
    }

    pub fn get(&self, method_name: &str) -> Option<&RouteSpec> {
        self.routes.get(method_name)
    }

    pub fn contains(&self, method_name: &str) -> bool {
        self.routes.contains_key(method_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.values()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn table(entries: &[(&str, &str)]) -> RouteTable {
        RouteTable::compile(entries.iter().copied()).unwrap()
    }

    #[test]
    fn delete_and_del_parse_to_the_same_verb() {
        assert_eq!("DELETE".parse::<Verb>().unwrap(), Verb::Del);
        assert_eq!("del".parse::<Verb>().unwrap(), Verb::Del);
        assert_eq!(Verb::Del.to_string(), "DELETE");
    }

    #[test]
    fn named_placeholder_is_substituted_and_consumed() {
        let routes = table(&[("GET foo/:id", "requestFoo")]);
        let resolved = routes
            .get("requestFoo")
            .unwrap()
            .resolve(RouteCall::new().param("id", 5).param("q", "x"))
            .unwrap();

        assert_eq!(resolved.verb, Verb::Get);
        assert_eq!(resolved.uri, "foo/5");
        assert!(!resolved.body.contains_key("id"));
        assert_eq!(resolved.body["q"], json!("x"));
    }

    #[test]
    fn positional_placeholders_use_call_args() {
        let routes = table(&[("GET a/:$0/b/:$1", "requestPair")]);
        let resolved = routes
            .get("requestPair")
            .unwrap()
            .resolve(RouteCall::with_args(["x", "y"]))
            .unwrap();
        assert_eq!(resolved.uri, "a/x/b/y");
    }

    #[test]
    fn missing_named_parameter_is_a_definition_error() {
        let routes = table(&[("PUT doc/:id", "requestPut")]);
        let err = routes
            .get("requestPut")
            .unwrap()
            .resolve(RouteCall::new())
            .unwrap_err();
        assert!(matches!(err, Error::MissingRouteParam { ref param, .. } if param == "id"));
        assert!(err.is_definition());
    }

    #[test]
    fn missing_positional_argument_is_a_definition_error() {
        let routes = table(&[("GET doc/:$0", "requestOne")]);
        let err = routes
            .get("requestOne")
            .unwrap()
            .resolve(RouteCall::new())
            .unwrap_err();
        assert!(matches!(err, Error::MissingRouteArg { index: 0, .. }));
    }

    #[test]
    fn crud_expands_into_exactly_four_methods() {
        let routes = table(&[("CRUD widget", "Widget")]);

        let mut names: Vec<_> = routes.method_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "requestCreateWidget",
                "requestDeleteWidget",
                "requestOneWidget",
                "requestUpdateWidget",
            ]
        );

        let verb_of = |name: &str| routes.get(name).unwrap().verb();
        assert_eq!(verb_of("requestCreateWidget"), Verb::Post);
        assert_eq!(verb_of("requestOneWidget"), Verb::Get);
        assert_eq!(verb_of("requestUpdateWidget"), Verb::Put);
        assert_eq!(verb_of("requestDeleteWidget"), Verb::Del);

        assert_eq!(routes.get("requestOneWidget").unwrap().uri_template(), "widget/:$0");
        assert_eq!(routes.get("requestUpdateWidget").unwrap().uri_template(), "widget/:id");
    }

    #[test]
    fn crud_target_must_match_the_path_name() {
        let err = RouteTable::compile([("CRUD document", "Doc")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { ref key, .. } if key == "CRUD document"));

        let routes = RouteTable::compile([("CRUD document", "")]).unwrap();
        assert!(routes.contains("requestOneDocument"));
    }

    #[test]
    fn crud_names_are_camel_cased() {
        let routes = table(&[("CRUD line_item", "LineItem")]);
        assert!(routes.contains("requestOneLineItem"));
    }

    #[test]
    fn static_options_are_defaults_for_the_caller() {
        let target = RouteTarget::from_value(
            "POST upload",
            &json!({ "fn": "requestUpload", "json_body": true, "timeout_ms": 900 }),
        )
        .unwrap();
        let routes = RouteTable::compile([("POST upload", target)]).unwrap();

        let resolved = routes
            .get("requestUpload")
            .unwrap()
            .resolve(RouteCall::new().options(RequestOptions {
                timeout_ms: Some(50),
                ..RequestOptions::default()
            }))
            .unwrap();
        assert_eq!(resolved.options.json_body, Some(true));
        assert_eq!(resolved.options.timeout_ms, Some(50));
    }

    #[test]
    fn route_values_of_the_wrong_shape_are_rejected() {
        let err = RouteTarget::from_value("GET x", &json!(42)).unwrap_err();
        assert!(matches!(err, Error::InvalidRouteTarget { .. }));

        let err = RouteTarget::from_value("GET x", &json!({ "json_body": true })).unwrap_err();
        assert!(matches!(err, Error::InvalidRouteTarget { .. }));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let err = RouteTable::compile([("nospace", "m")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));

        let err = RouteTable::compile([("PATCH x", "m")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));
    }

    #[test]
    fn lone_colons_stay_literal() {
        let segments = parse_template("time/12:/x:$");
        assert_eq!(segments, vec![Segment::Literal("time/12:/x:$".into())]);
    }

    #[test]
    fn param_names_follow_template_order() {
        let spec = RouteSpec::new(Verb::Get, "org/:org/repo/:repo", "m", RequestOptions::default());
        assert_eq!(spec.param_names().collect::<Vec<_>>(), vec!["org", "repo"]);
    }

    #[test]
    fn inherited_routes_do_not_override_own_routes() {
        let mut child = table(&[("GET child/:id", "requestThing")]);
        let parent = table(&[("GET parent/:id", "requestThing"), ("GET ping", "requestPing")]);
        child.inherit(&parent);

        assert_eq!(child.get("requestThing").unwrap().uri_template(), "child/:id");
        assert!(child.contains("requestPing"));
    }
}
