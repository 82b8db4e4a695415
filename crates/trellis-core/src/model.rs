// ── Server-backed model ──
//
// Observable attributes plus the request methods generated from its
// resource definition. Request futures own everything they need, so
// they can be spawned or awaited after the model handle is gone.

use std::sync::Arc;

use serde_json::{Map, Value};
use trellis_api::{RequestEngine, ResourceDef, RouteCall, Transport};

use crate::error::CoreError;
use crate::store::PropertyStore;

#[derive(Clone)]
pub struct Model {
    props: PropertyStore,
    engine: RequestEngine,
}

impl Model {
    pub fn new(engine: RequestEngine) -> Self {
        Self {
            props: PropertyStore::new(),
            engine,
        }
    }

    pub fn with_transport(def: ResourceDef, transport: Arc<dyn Transport>) -> Self {
        Self::new(RequestEngine::new(def, transport))
    }

    pub fn definition(&self) -> &ResourceDef {
        self.engine.definition()
    }

    pub fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    pub fn props(&self) -> &PropertyStore {
        &self.props
    }

    pub fn get(&self, name: &str) -> Value {
        self.props.get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        self.props.set(name, value)
    }

    /// Invoke a generated request method.
    pub fn call(
        &self,
        method: &str,
        call: RouteCall,
    ) -> impl Future<Output = Result<Value, CoreError>> + Send + 'static {
        let engine = self.engine.clone();
        let method = method.to_owned();
        async move { engine.call(&method, call).await.map_err(CoreError::from) }
    }

    /// Copy the fields of an object payload into the model's properties.
    /// Returns how many properties changed; non-objects change nothing.
    pub fn apply(&self, payload: &Value) -> usize {
        payload
            .as_object()
            .map_or(0, |fields| self.props.set_many(fields))
    }

    /// Properties to send to the server: the declared server properties,
    /// or every property when none are declared.
    pub fn server_params(&self) -> Map<String, Value> {
        let declared = self.definition().server_properties();
        if declared.is_empty() {
            return self.props.snapshot();
        }
        declared
            .iter()
            .map(|name| (name.clone(), self.props.get(name)))
            .collect()
    }

    /// Call `method` with the model's server params, then apply the
    /// response to the model.
    #[allow(clippy::future_not_send)]
    pub async fn save(&self, method: &str) -> Result<Value, CoreError> {
        let value = self
            .call(method, RouteCall::new().params(self.server_params()))
            .await?;
        self.apply(&value);
        Ok(value)
    }

    /// Call `method` and apply the response to the model.
    #[allow(clippy::future_not_send)]
    pub async fn fetch(&self, method: &str, call: RouteCall) -> Result<Value, CoreError> {
        let value = self.call(method, call).await?;
        self.apply(&value);
        Ok(value)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("resource", &self.definition().name())
            .field("props", &self.props)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use trellis_api::{HandlerSet, TransportRequest, TransportResponse};

    use super::*;

    #[derive(Default)]
    struct Echo {
        requests: Mutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl Transport for Echo {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, trellis_api::Error> {
            let body = Value::Object(request.data.clone());
            self.requests.lock().unwrap().push(request);
            Ok(TransportResponse {
                body,
                status: 200,
                raw: Default::default(),
            })
        }
    }

    fn model(server_properties: &[&str]) -> (Model, Arc<Echo>) {
        let def = ResourceDef::builder("document")
            .root_uri("/api/")
            .route("CRUD document", "Document")
            .server_properties(server_properties.iter().copied())
            .build(&HandlerSet::with_builtins())
            .unwrap();
        let echo = Arc::new(Echo::default());
        (Model::with_transport(def, echo.clone()), echo)
    }

    #[test]
    fn server_params_respect_declared_properties() {
        let (all, _) = model(&[]);
        all.set("title", "t");
        all.set("draft", true);
        assert_eq!(all.server_params().len(), 2);

        let (some, _) = model(&["title"]);
        some.set("title", "t");
        some.set("draft", true);
        assert_eq!(Value::Object(some.server_params()), json!({ "title": "t" }));
    }

    #[tokio::test]
    async fn save_sends_server_params_and_applies_the_response() {
        let (model, echo) = model(&["title"]);
        model.set("title", "Hello");

        let value = model.save("requestCreateDocument").await.unwrap();
        assert_eq!(value, json!({ "title": "Hello" }));

        let requests = echo.requests.lock().unwrap();
        assert_eq!(requests[0].url, "/api/document");
    }

    #[tokio::test]
    async fn unknown_methods_surface_as_definition_errors() {
        let (model, _) = model(&[]);
        let err = model
            .call("requestNothing", RouteCall::new())
            .await
            .unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn apply_ignores_non_objects() {
        let (model, _) = model(&[]);
        assert_eq!(model.apply(&json!([1, 2])), 0);
        assert_eq!(model.apply(&json!({ "a": 1, "b": 2 })), 2);
        assert_eq!(model.get("a"), json!(1));
    }
}
