// ── Resource definitions ──
//
// A `ResourceDef` is the compiled, immutable description of one kind of
// server-backed model: where it lives, how long requests may take, which
// request methods it has, and how responses are validated and
// transformed. Built once per model type; derived definitions compose
// their parent's tables explicitly through `extends`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::parser::{HandlerSet, ParserTable, ParserTarget};
use crate::route::{RouteTable, RouteTarget};
use crate::transport::RawResponse;

/// Timeout used when a definition sets none (or sets zero).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra validity check applied to a non-empty response body.
pub type ValidityFn = Arc<dyn Fn(&Value, u16, &RawResponse) -> bool + Send + Sync>;

/// Body transform applied before resolving or rejecting a request.
pub type PayloadFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Compiled description of a server-backed model type.
#[derive(Clone)]
pub struct ResourceDef {
    name: String,
    root_uri: String,
    timeout: Option<Duration>,
    routes: RouteTable,
    parsers: ParserTable,
    response_defaults: Map<String, Value>,
    server_properties: Vec<String>,
    is_valid_response: Option<ValidityFn>,
    success_payload: Option<PayloadFn>,
    fail_payload: Option<PayloadFn>,
}

impl ResourceDef {
    pub fn builder(name: impl Into<String>) -> ResourceDefBuilder {
        ResourceDefBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    /// Effective request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn parsers(&self) -> &ParserTable {
        &self.parsers
    }

    pub fn response_defaults(&self) -> &Map<String, Value> {
        &self.response_defaults
    }

    /// Attribute names sent to the server. Empty means "all".
    pub fn server_properties(&self) -> &[String] {
        &self.server_properties
    }

    /// Fill keys missing from an object body with the declared defaults.
    pub(crate) fn apply_response_defaults(&self, body: &mut Value) {
        if let Value::Object(obj) = body {
            for (key, value) in &self.response_defaults {
                if !obj.contains_key(key) {
                    obj.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub(crate) fn is_valid_response(&self, body: &Value, status: u16, raw: &RawResponse) -> bool {
        self.is_valid_response
            .as_ref()
            .is_none_or(|check| check(body, status, raw))
    }

    pub(crate) fn success_payload(&self, body: Value) -> Value {
        match self.success_payload {
            Some(ref f) => f(body),
            None => body,
        }
    }

    pub(crate) fn fail_payload(&self, body: Value) -> Value {
        match self.fail_payload {
            Some(ref f) => f(body),
            None => body,
        }
    }
}

impl fmt::Debug for ResourceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("root_uri", &self.root_uri)
            .field("timeout", &self.timeout())
            .field("routes", &self.routes.len())
            .field("parsers", &self.parsers.len())
            .field("server_properties", &self.server_properties)
            .finish_non_exhaustive()
    }
}

/// Collects the declarative pieces of a [`ResourceDef`].
pub struct ResourceDefBuilder {
    name: String,
    parent: Option<ResourceDef>,
    root_uri: Option<String>,
    timeout: Option<Duration>,
    routes: Vec<(String, RouteTarget)>,
    parsers: Vec<(String, ParserTarget)>,
    response_defaults: Map<String, Value>,
    server_properties: Option<Vec<String>>,
    is_valid_response: Option<ValidityFn>,
    success_payload: Option<PayloadFn>,
    fail_payload: Option<PayloadFn>,
}

impl ResourceDefBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            root_uri: None,
            timeout: None,
            routes: Vec::new(),
            parsers: Vec::new(),
            response_defaults: Map::new(),
            server_properties: None,
            is_valid_response: None,
            success_payload: None,
            fail_payload: None,
        }
    }

    /// Derive from `parent`: its routes, parsers, defaults, and hooks are
    /// inherited; anything declared on this builder takes precedence.
    pub fn extends(mut self, parent: &ResourceDef) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn root_uri(mut self, root_uri: impl Into<String>) -> Self {
        self.root_uri = Some(root_uri.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Millisecond timeout; `0` leaves the timeout unset.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self
    }

    pub fn route(mut self, key: impl Into<String>, target: impl Into<RouteTarget>) -> Self {
        self.routes.push((key.into(), target.into()));
        self
    }

    pub fn parser(mut self, key: impl Into<String>, target: impl Into<ParserTarget>) -> Self {
        self.parsers.push((key.into(), target.into()));
        self
    }

    pub fn response_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.response_defaults.insert(key.into(), value.into());
        self
    }

    pub fn server_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_properties = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_valid_response<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value, u16, &RawResponse) -> bool + Send + Sync + 'static,
    {
        self.is_valid_response = Some(Arc::new(check));
        self
    }

    pub fn success_payload<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.success_payload = Some(Arc::new(transform));
        self
    }

    pub fn fail_payload<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.fail_payload = Some(Arc::new(transform));
        self
    }

    /// Compile the definition. Named parser handlers are resolved against
    /// `handlers`; route and parser keys are validated here.
    pub fn build(self, handlers: &HandlerSet) -> Result<ResourceDef, Error> {
        let parent = self.parent.as_ref();

        let mut routes = RouteTable::compile(self.routes)?;
        if let Some(parent) = parent {
            routes.inherit(&parent.routes);
        }

        let empty = ParserTable::default();
        let inherited = parent.map_or(&empty, |p| &p.parsers);
        let parsers = ParserTable::compile(self.parsers, handlers, inherited)?;

        let mut response_defaults = parent
            .map(|p| p.response_defaults.clone())
            .unwrap_or_default();
        response_defaults.extend(self.response_defaults);

        Ok(ResourceDef {
            root_uri: self
                .root_uri
                .or_else(|| parent.map(|p| p.root_uri.clone()))
                .unwrap_or_default(),
            timeout: self.timeout.or_else(|| parent.and_then(|p| p.timeout)),
            server_properties: self
                .server_properties
                .or_else(|| parent.map(|p| p.server_properties.clone()))
                .unwrap_or_default(),
            is_valid_response: self
                .is_valid_response
                .or_else(|| parent.and_then(|p| p.is_valid_response.clone())),
            success_payload: self
                .success_payload
                .or_else(|| parent.and_then(|p| p.success_payload.clone())),
            fail_payload: self
                .fail_payload
                .or_else(|| parent.and_then(|p| p.fail_payload.clone())),
            name: self.name,
            routes,
            parsers,
            response_defaults,
        })
    }
}
