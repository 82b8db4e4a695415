// ── Per-request options and route call arguments ──

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options accepted by every request.
///
/// Each field is optional so option sets can be layered: a route's static
/// options act as defaults, the caller's options override them, and the
/// engine fills whatever is still unset.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RequestOptions {
    /// Serialize the body as a JSON string instead of form-encoding it.
    #[serde(alias = "jsonBody", skip_serializing_if = "Option::is_none")]
    pub json_body: Option<bool>,

    /// Per-request timeout override, in milliseconds.
    #[serde(alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(alias = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// `false` marks the body as already encoded.
    #[serde(alias = "processData", skip_serializing_if = "Option::is_none")]
    pub process_data: Option<bool>,

    /// Explicit body, replacing the call parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,

    /// Explicit URL, replacing `root_uri + uri`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl RequestOptions {
    /// Fill every unset field from `defaults`. Fields already set on
    /// `self` win; headers merge with `self` taking precedence per name.
    pub fn or_defaults(mut self, defaults: &RequestOptions) -> Self {
        self.json_body = self.json_body.or(defaults.json_body);
        self.timeout_ms = self.timeout_ms.or(defaults.timeout_ms);
        self.content_type = self.content_type.or_else(|| defaults.content_type.clone());
        self.process_data = self.process_data.or(defaults.process_data);
        self.data = self.data.or_else(|| defaults.data.clone());
        self.url = self.url.or_else(|| defaults.url.clone());
        for (name, value) in &defaults.headers {
            self.headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    pub fn json_body(mut self, enabled: bool) -> Self {
        self.json_body = Some(enabled);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Whether the body should be sent as a JSON string.
    pub(crate) fn wants_json_body(&self) -> bool {
        self.json_body.unwrap_or(false)
    }
}

/// Arguments for one invocation of a generated route method.
///
/// `params` fill `:name` placeholders (consumed keys are removed from the
/// outgoing body), `args` fill `:$n` placeholders by index, and `options`
/// override the route's static options.
#[derive(Debug, Clone, Default)]
pub struct RouteCall {
    pub params: Map<String, Value>,
    pub options: RequestOptions,
    pub args: Vec<Value>,
}

impl RouteCall {
    pub fn new() -> Self {
        Self::default()
    }

    /// A call carrying only positional arguments.
    pub fn with_args<I, V>(args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new().args(args)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}
