//! Shared configuration for trellis tools.
//!
//! TOML model definitions layered with environment overrides, and their
//! resolution into compiled `trellis_api::ResourceDef`s. A model may
//! `extends` another; chains are followed root-first so every derived
//! definition composes its parent's tables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

use trellis_api::{HandlerSet, ResourceDef, RouteTarget, TlsMode, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no model named '{name}' is configured")]
    UnknownModel { name: String },

    #[error("model inheritance cycle: {chain}")]
    InheritanceCycle { chain: String },

    #[error("invalid definition for model '{model}': {source}")]
    Definition {
        model: String,
        #[source]
        source: trellis_api::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named model definitions.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Server origin that root URIs are resolved against.
    pub origin: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Bearer token (plaintext; prefer `TRELLIS_DEFAULTS__TOKEN`).
    pub token: Option<String>,

    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            origin: None,
            timeout_ms: default_timeout_ms(),
            insecure: false,
            ca_cert: None,
            token: None,
            output: default_output(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_output() -> String {
    "json".into()
}

/// One server-backed model.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Prefix for every route URI (e.g., "/api/").
    pub root_uri: Option<String>,

    pub timeout_ms: Option<u64>,

    /// Name of the parent model.
    pub extends: Option<String>,

    /// Attributes sent to the server. Omitted means "all".
    pub server_properties: Option<Vec<String>>,

    /// `"VERB path"` / `"CRUD path"` to a method name or
    /// `{ fn = "name", ..options }`.
    #[serde(default)]
    pub routes: BTreeMap<String, Value>,

    /// Response parsers, matched in order.
    #[serde(default)]
    pub parsers: Vec<ParserConfig>,

    /// Keys filled into object responses that lack them.
    #[serde(default)]
    pub response_defaults: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserConfig {
    /// `"VERB path"`, `"#verb#path"`, or a bare path.
    pub route: String,
    /// Name of a registered response handler.
    pub handler: String,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "trellis", "trellis").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("trellis");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults
/// (still subject to environment overrides).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TRELLIS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent
/// directories as needed.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Model resolution ────────────────────────────────────────────────

impl Config {
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn model(&self, name: &str) -> Result<&ModelConfig, ConfigError> {
        self.models.get(name).ok_or_else(|| ConfigError::UnknownModel {
            name: name.into(),
        })
    }

    /// `name` followed by its ancestors, nearest first.
    pub fn inheritance_chain(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let mut chain = vec![name.to_owned()];
        let mut current = self.model(name)?;
        while let Some(parent) = current.extends.as_deref() {
            if chain.iter().any(|seen| seen == parent) {
                chain.push(parent.to_owned());
                return Err(ConfigError::InheritanceCycle {
                    chain: chain.join(" -> "),
                });
            }
            chain.push(parent.to_owned());
            current = self.model(parent)?;
        }
        Ok(chain)
    }

    /// Compile model `name`, composing every ancestor root-first.
    /// Parser handler names resolve against `handlers`.
    pub fn resolve_model(
        &self,
        name: &str,
        handlers: &HandlerSet,
    ) -> Result<ResourceDef, ConfigError> {
        let chain = self.inheritance_chain(name)?;
        let mut parent: Option<ResourceDef> = None;

        for model_name in chain.iter().rev() {
            let model = self.model(model_name)?;
            let mut builder = ResourceDef::builder(model_name.as_str());
            match parent {
                Some(ref p) => builder = builder.extends(p),
                None if model.timeout_ms.is_none() => {
                    builder = builder.timeout_ms(self.defaults.timeout_ms);
                }
                None => {}
            }
            let def = model
                .apply(builder)?
                .build(handlers)
                .map_err(|source| ConfigError::Definition {
                    model: model_name.clone(),
                    source,
                })?;
            parent = Some(def);
        }

        parent.ok_or_else(|| ConfigError::UnknownModel { name: name.into() })
    }

    /// Transport settings derived from the defaults section.
    pub fn transport_config(&self) -> TransportConfig {
        let defaults = &self.defaults;
        let tls = if defaults.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = defaults.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        TransportConfig {
            tls,
            timeout: Duration::from_millis(defaults.timeout_ms),
            token: defaults.token.clone().map(SecretString::from),
            ..TransportConfig::default()
        }
    }

    /// The configured origin, parsed.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        let raw = self
            .defaults
            .origin
            .as_deref()
            .ok_or_else(|| ConfigError::Validation {
                field: "origin".into(),
                reason: "no origin configured (set defaults.origin or pass --origin)".into(),
            })?;
        raw.parse().map_err(|_| ConfigError::Validation {
            field: "origin".into(),
            reason: format!("invalid URL: {raw}"),
        })
    }
}

impl ModelConfig {
    /// Feed this model's declarations into `builder`.
    pub fn apply(
        &self,
        mut builder: trellis_api::ResourceDefBuilder,
    ) -> Result<trellis_api::ResourceDefBuilder, ConfigError> {
        if let Some(ref root_uri) = self.root_uri {
            builder = builder.root_uri(root_uri.as_str());
        }
        if let Some(ms) = self.timeout_ms {
            builder = builder.timeout_ms(ms);
        }
        if let Some(ref names) = self.server_properties {
            builder = builder.server_properties(names.iter().cloned());
        }
        for (key, value) in &self.routes {
            let target = RouteTarget::from_value(key, value).map_err(|e| ConfigError::Validation {
                field: format!("routes.\"{key}\""),
                reason: e.to_string(),
            })?;
            builder = builder.route(key.as_str(), target);
        }
        for parser in &self.parsers {
            builder = builder.parser(parser.route.as_str(), parser.handler.as_str());
        }
        for (key, value) in &self.response_defaults {
            builder = builder.response_default(key.as_str(), value.clone());
        }
        Ok(builder)
    }
}
