// Transport layer: the seam between the request engine and the network.
//
// `Transport` is what the engine consumes; `HttpTransport` is the reqwest
// implementation. `TransportConfig` holds the TLS, timeout, and auth
// settings used to build the underlying `reqwest::Client`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::route::Verb;
use crate::util::segment_text;

/// A fully prepared request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub verb: Verb,
    /// `root_uri + uri`, or an explicit URL override.
    pub url: String,
    pub data: Map<String, Value>,
    /// Pre-encoded body. When set, `data` must not be encoded again.
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub process_data: bool,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

/// Everything the transport saw besides the decoded body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub headers: BTreeMap<String, String>,
    pub text: String,
}

/// Decoded response from a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// Parsed JSON body; `null` for an empty body.
    pub body: Value,
    pub status: u16,
    pub raw: RawResponse,
}

/// Sends one request and decodes the response.
///
/// Implementations surface network problems and non-success statuses as
/// errors; the engine propagates them unchanged.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error>;
}

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed development servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Client-wide ceiling; individual requests carry their own timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Sent as `Authorization: Bearer <token>` on every request.
    pub token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            user_agent: concat!("trellis/", env!("CARGO_PKG_VERSION")).into(),
            token: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str());

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                warn!("TLS certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// reqwest-backed [`Transport`].
///
/// Request URLs are resolved against `origin`, so resources may use
/// host-relative roots such as `/api/`.
pub struct HttpTransport {
    http: reqwest::Client,
    origin: Url,
    token: Option<SecretString>,
}

impl HttpTransport {
    pub fn new(origin: Url, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            origin,
            token: config.token.clone(),
        })
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, origin: Url) -> Self {
        Self {
            http,
            origin,
            token: None,
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn resolve_url(&self, url: &str) -> Result<Url, Error> {
        Ok(self.origin.join(url)?)
    }
}

/// Flatten a parameter map into `key=value` pairs for query strings and
/// form bodies. Nested values are sent as JSON text.
fn form_pairs(data: &Map<String, Value>) -> Vec<(String, String)> {
    data.iter()
        .map(|(key, value)| (key.clone(), segment_text(value)))
        .collect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
        let url = self.resolve_url(&request.url)?;
        let timeout_ms = u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX);
        debug!("{} {}", request.verb, url);

        let mut builder = self
            .http
            .request(request.verb.method(), url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        builder = match request.body {
            Some(body) => {
                let content_type = request
                    .content_type
                    .unwrap_or_else(|| "application/json".into());
                builder.header(CONTENT_TYPE, content_type).body(body)
            }
            None if matches!(request.verb, Verb::Get | Verb::Del) => {
                builder.query(&form_pairs(&request.data))
            }
            None => {
                let builder = builder.form(&form_pairs(&request.data));
                match request.content_type {
                    Some(content_type) => builder.header(CONTENT_TYPE, content_type),
                    None => builder,
                }
            }
        };

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout { timeout_ms }
            } else {
                Error::Transport(e)
            }
        })?;

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
            })?
        };
        trace!(status = status.as_u16(), "response decoded");

        Ok(TransportResponse {
            body,
            status: status.as_u16(),
            raw: RawResponse { headers, text },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn form_pairs_flatten_scalars_and_nest_json() {
        let data = json!({ "a": 1, "b": "two", "c": { "d": true } });
        let pairs = form_pairs(data.as_object().unwrap_or(&Map::new()));
        assert_eq!(
            pairs,
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "two".to_owned()),
                ("c".to_owned(), r#"{"d":true}"#.to_owned()),
            ]
        );
    }
}
