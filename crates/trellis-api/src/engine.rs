// Request engine
//
// Executes requests for one resource definition: builds the transport
// request, validates the response, and runs it through the matching
// response parser. Generated route methods dispatch through `call`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::Error;
use crate::options::{RequestOptions, RouteCall};
use crate::resource::ResourceDef;
use crate::route::Verb;
use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::util::is_falsy;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Executes requests for a [`ResourceDef`] over a [`Transport`].
///
/// Cheap to share: both the definition and the transport are behind
/// `Arc`, and every request future is `Send`.
#[derive(Clone)]
pub struct RequestEngine {
    def: Arc<ResourceDef>,
    transport: Arc<dyn Transport>,
}

impl RequestEngine {
    pub fn new(def: impl Into<Arc<ResourceDef>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            def: def.into(),
            transport,
        }
    }

    pub fn definition(&self) -> &ResourceDef {
        &self.def
    }

    /// Effective timeout for requests without an explicit override.
    pub fn timeout(&self) -> Duration {
        self.def.timeout()
    }

    /// Invoke a generated route method by name.
    pub async fn call(&self, method: &str, call: RouteCall) -> Result<Value, Error> {
        let route = self
            .def
            .routes()
            .get(method)
            .ok_or_else(|| Error::UnknownMethod {
                name: method.to_owned(),
            })?;
        let resolved = route.resolve(call)?;
        trace!(method, uri = %resolved.uri, "route resolved");

        match resolved.verb {
            Verb::Get => self.get(&resolved.uri, resolved.body, resolved.options).await,
            Verb::Post => self.post(&resolved.uri, resolved.body, resolved.options).await,
            Verb::Put => self.put(&resolved.uri, resolved.body, resolved.options).await,
            Verb::Del => self.del(&resolved.uri, resolved.body, resolved.options).await,
        }
    }

    pub async fn get(
        &self,
        uri: &str,
        params: Map<String, Value>,
        options: RequestOptions,
    ) -> Result<Value, Error> {
        self.request(Verb::Get, uri, params, options).await
    }

    pub async fn post(
        &self,
        uri: &str,
        params: Map<String, Value>,
        options: RequestOptions,
    ) -> Result<Value, Error> {
        self.request(Verb::Post, uri, params, options).await
    }

    /// PUT sends a JSON body unless the caller opts out.
    pub async fn put(
        &self,
        uri: &str,
        params: Map<String, Value>,
        mut options: RequestOptions,
    ) -> Result<Value, Error> {
        options.json_body.get_or_insert(true);
        self.request(Verb::Put, uri, params, options).await
    }

    pub async fn del(
        &self,
        uri: &str,
        params: Map<String, Value>,
        options: RequestOptions,
    ) -> Result<Value, Error> {
        self.request(Verb::Del, uri, params, options).await
    }

    /// Send a request to `root_uri + uri` and resolve with the parsed
    /// payload.
    ///
    /// An empty/falsy body or one rejected by the definition's validity
    /// check fails with [`Error::RequestFailed`]; transport errors pass
    /// through unchanged.
    pub async fn request(
        &self,
        verb: Verb,
        uri: &str,
        params: Map<String, Value>,
        options: RequestOptions,
    ) -> Result<Value, Error> {
        let request = self.prepare(verb, uri, &params, &options)?;
        debug!(%verb, url = %request.url, "sending request");

        let TransportResponse {
            mut body,
            status,
            raw,
        } = self.transport.send(request).await?;

        self.def.apply_response_defaults(&mut body);
        if is_falsy(&body) || !self.def.is_valid_response(&body, status, &raw) {
            debug!(%verb, uri, status, "response rejected");
            return Err(Error::RequestFailed {
                payload: self.def.fail_payload(body),
                status,
            });
        }

        let payload = self.def.success_payload(body);
        let parsed = match self.def.parsers().resolve(uri, verb) {
            Some(parser) => parser(payload, &params),
            None => Some(payload),
        };
        Ok(parsed
            .filter(|v| !is_falsy(v))
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn prepare(
        &self,
        verb: Verb,
        uri: &str,
        params: &Map<String, Value>,
        options: &RequestOptions,
    ) -> Result<TransportRequest, Error> {
        let url = options
            .url
            .clone()
            .unwrap_or_else(|| format!("{}{uri}", self.def.root_uri()));
        let data = options.data.clone().unwrap_or_else(|| params.clone());
        let timeout = options
            .timeout_ms
            .filter(|ms| *ms > 0)
            .map_or_else(|| self.timeout(), Duration::from_millis);

        let mut request = TransportRequest {
            verb,
            url,
            data,
            body: None,
            content_type: options.content_type.clone(),
            process_data: options.process_data.unwrap_or(true),
            timeout,
            headers: options.headers.clone(),
        };

        if options.wants_json_body() {
            let body = serde_json::to_string(&request.data).map_err(|e| Error::Deserialization {
                message: format!("failed to encode request body: {e}"),
                body: String::new(),
            })?;
            request.body = Some(body);
            request
                .content_type
                .get_or_insert_with(|| JSON_CONTENT_TYPE.to_owned());
            request.process_data = false;
        }

        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::parser::{HandlerSet, ParserTarget};
    use crate::transport::RawResponse;

    /// Records every request and answers with a canned response.
    struct Recorder {
        sent: Mutex<Vec<TransportRequest>>,
        body: Value,
        status: u16,
    }

    impl Recorder {
        fn answering(body: Value) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                body,
                status: 200,
            })
        }

        fn last(&self) -> TransportRequest {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
            self.sent.lock().unwrap().push(request);
            Ok(TransportResponse {
                body: self.body.clone(),
                status: self.status,
                raw: RawResponse::default(),
            })
        }
    }

    fn document_def() -> ResourceDef {
        ResourceDef::builder("document")
            .root_uri("/api/")
            .route("CRUD document", "Document")
            .route("GET foo/:id", "requestFoo")
            .build(&HandlerSet::with_builtins())
            .unwrap()
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn request_one_hits_the_positional_uri() {
        let transport = Recorder::answering(json!({ "name": "x" }));
        let engine = RequestEngine::new(document_def(), transport.clone());

        let value = engine
            .call("requestOneDocument", RouteCall::with_args([1]))
            .await
            .unwrap();

        let sent = transport.last();
        assert_eq!(sent.verb, Verb::Get);
        assert_eq!(sent.url, "/api/document/1");
        assert_eq!(value, json!({ "name": "x" }));
    }

    #[tokio::test]
    async fn named_params_are_removed_from_the_body() {
        let transport = Recorder::answering(json!({ "ok": true }));
        let engine = RequestEngine::new(document_def(), transport.clone());

        engine
            .call(
                "requestFoo",
                RouteCall::new().params(params(json!({ "id": 5, "q": "z" }))),
            )
            .await
            .unwrap();

        let sent = transport.last();
        assert_eq!(sent.url, "/api/foo/5");
        assert_eq!(sent.data, params(json!({ "q": "z" })));
    }

    #[tokio::test]
    async fn json_body_is_pre_encoded() {
        let transport = Recorder::answering(json!({ "ok": true }));
        let engine = RequestEngine::new(document_def(), transport.clone());

        engine
            .post(
                "thing",
                params(json!({ "a": 1 })),
                RequestOptions::default().json_body(true),
            )
            .await
            .unwrap();

        let sent = transport.last();
        assert_eq!(sent.body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(sent.content_type.as_deref(), Some("application/json"));
        assert!(!sent.process_data);
    }

    #[tokio::test]
    async fn put_defaults_to_json_and_post_does_not() {
        let transport = Recorder::answering(json!({ "ok": true }));
        let engine = RequestEngine::new(document_def(), transport.clone());

        engine
            .call(
                "requestUpdateDocument",
                RouteCall::new().params(params(json!({ "id": 3, "title": "t" }))),
            )
            .await
            .unwrap();
        let put = transport.last();
        assert_eq!(put.verb, Verb::Put);
        assert_eq!(put.url, "/api/document/3");
        assert_eq!(put.body.as_deref(), Some(r#"{"title":"t"}"#));

        engine
            .call("requestCreateDocument", RouteCall::new().param("title", "t"))
            .await
            .unwrap();
        let post = transport.last();
        assert_eq!(post.verb, Verb::Post);
        assert!(post.body.is_none());
        assert!(post.process_data);
    }

    #[tokio::test]
    async fn explicit_url_and_data_win() {
        let transport = Recorder::answering(json!({ "ok": true }));
        let engine = RequestEngine::new(document_def(), transport.clone());

        let options = RequestOptions {
            url: Some("/elsewhere".into()),
            data: Some(params(json!({ "override": true }))),
            ..RequestOptions::default()
        };
        engine
            .get("ignored", params(json!({ "a": 1 })), options)
            .await
            .unwrap();

        let sent = transport.last();
        assert_eq!(sent.url, "/elsewhere");
        assert_eq!(sent.data, params(json!({ "override": true })));
    }

    #[tokio::test]
    async fn timeout_uses_definition_then_override() {
        let def = ResourceDef::builder("t")
            .timeout_ms(750)
            .build(&HandlerSet::new())
            .unwrap();
        let transport = Recorder::answering(json!({ "ok": true }));
        let engine = RequestEngine::new(def, transport.clone());

        engine.get("a", Map::new(), RequestOptions::default()).await.unwrap();
        assert_eq!(transport.last().timeout, Duration::from_millis(750));

        engine
            .get("a", Map::new(), RequestOptions::default().timeout(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(transport.last().timeout, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn null_body_rejects_even_with_a_permissive_validator() {
        let def = ResourceDef::builder("v")
            .is_valid_response(|_, _, _| true)
            .fail_payload(|body| json!({ "failed": body }))
            .build(&HandlerSet::new())
            .unwrap();
        let engine = RequestEngine::new(def, Recorder::answering(Value::Null));

        let err = engine
            .get("x", Map::new(), RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.fail_payload(), Some(&json!({ "failed": null })));
        assert_eq!(err.status(), Some(200));
    }

    #[tokio::test]
    async fn validator_rejection_carries_the_fail_payload() {
        let def = ResourceDef::builder("v")
            .is_valid_response(|body, _, _| body["status"] == "ok")
            .fail_payload(|body| body["error"].clone())
            .success_payload(|body| body["result"].clone())
            .build(&HandlerSet::new())
            .unwrap();

        let failing = RequestEngine::new(
            def.clone(),
            Recorder::answering(json!({ "status": "error", "error": "nope" })),
        );
        let err = failing
            .get("x", Map::new(), RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestFailed { .. }));
        assert_eq!(err.fail_payload(), Some(&json!("nope")));

        let passing = RequestEngine::new(
            def,
            Recorder::answering(json!({ "status": "ok", "result": { "n": 1 } })),
        );
        let value = passing
            .get("x", Map::new(), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn response_defaults_apply_before_validation() {
        let def = ResourceDef::builder("d")
            .response_default("items", json!([]))
            .build(&HandlerSet::new())
            .unwrap();
        let engine = RequestEngine::new(def, Recorder::answering(json!({ "total": 0 })));

        let value = engine
            .get("x", Map::new(), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({ "total": 0, "items": [] }));
    }

    #[tokio::test]
    async fn matching_parser_transforms_with_original_params() {
        let def = ResourceDef::builder("p")
            .parser(
                "GET doc/:id",
                ParserTarget::handler(|payload, params| {
                    Some(json!({ "doc": payload, "asked": params.get("fields").cloned() }))
                }),
            )
            .build(&HandlerSet::new())
            .unwrap();
        let engine = RequestEngine::new(def, Recorder::answering(json!({ "id": 9 })));

        let value = engine
            .get("doc/9", params(json!({ "fields": "all" })), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({ "doc": { "id": 9 }, "asked": "all" }));

        // POST does not match the GET-only parser.
        let value = engine
            .post("doc/9", Map::new(), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({ "id": 9 }));
    }

    #[tokio::test]
    async fn parser_returning_nothing_resolves_empty_object() {
        let def = ResourceDef::builder("p")
            .parser("ping", ParserTarget::handler(|_, _| None))
            .build(&HandlerSet::new())
            .unwrap();
        let engine = RequestEngine::new(def, Recorder::answering(json!({ "pong": true })));

        let value = engine
            .get("ping", Map::new(), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn unknown_methods_fail_without_sending() {
        let transport = Recorder::answering(json!({}));
        let engine = RequestEngine::new(document_def(), transport.clone());

        let err = engine.call("requestNothing", RouteCall::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { .. }));
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
