//! Helpers shared by command handlers.

use std::path::PathBuf;

use serde_json::Value;
use trellis_api::{HandlerSet, ResourceDef};
use trellis_config::{self as config, Config};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Config file in effect: `--config`, or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

/// Load config and layer the global flags over its defaults.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match global.config {
        Some(ref path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(ref origin) = global.origin {
        cfg.defaults.origin = Some(origin.clone());
    }
    if let Some(ref token) = global.token {
        cfg.defaults.token = Some(token.clone());
    }
    if let Some(ms) = global.timeout.filter(|ms| *ms > 0) {
        cfg.defaults.timeout_ms = ms;
    }
    if global.insecure {
        cfg.defaults.insecure = true;
    }
    Ok(cfg)
}

/// Compile a model, listing the configured names when it is missing.
pub fn resolve_model(cfg: &Config, name: &str) -> Result<ResourceDef, CliError> {
    if !cfg.models.contains_key(name) {
        let names: Vec<&str> = cfg.model_names().collect();
        return Err(CliError::UnknownModel {
            name: name.into(),
            available: if names.is_empty() {
                "(none)".into()
            } else {
                names.join(", ")
            },
        });
    }
    Ok(cfg.resolve_model(name, &HandlerSet::with_builtins())?)
}

/// `--output`, else the config default, else `fallback`.
pub fn output_format(global: &GlobalOpts, cfg: &Config, fallback: OutputFormat) -> OutputFormat {
    use clap::ValueEnum;

    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(fallback)
    })
}

/// Command-line values are JSON when they parse as JSON, strings otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}
