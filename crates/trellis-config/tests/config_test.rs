#![allow(clippy::unwrap_used)]
// Integration tests for loading config files and resolving models.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use trellis_api::{HandlerSet, RequestOptions, Verb};
use trellis_config::{Config, ConfigError, load_config_from, save_config};

const SAMPLE: &str = r#"
[defaults]
origin = "http://localhost:4000"
timeout_ms = 2000

[models.base]
root_uri = "/api/"
server_properties = ["name"]
response_defaults = { ok = true }

[[models.base.parsers]]
route = "GET document/:id"
handler = "identity"

[models.document]
extends = "base"
timeout_ms = 750

[models.document.routes]
"CRUD document" = "Document"
"GET document/:id/history" = { fn = "requestHistory", json_body = true }

[[models.document.parsers]]
route = "GET document/:id"
handler = "data"

[[models.document.parsers]]
route = "document/*rest"
handler = "identity"
"#;

fn write_config(contents: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    let cfg = load_config_from(&path).unwrap();
    (dir, cfg)
}

#[test]
fn test_missing_file_loads_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert!(cfg.models.is_empty());
    assert_eq!(cfg.defaults.timeout_ms, 30_000);
}

#[test]
fn test_derived_model_composes_its_parent() {
    let (_dir, cfg) = write_config(SAMPLE);
    let def = cfg
        .resolve_model("document", &HandlerSet::with_builtins())
        .unwrap();

    assert_eq!(def.name(), "document");
    assert_eq!(def.root_uri(), "/api/");
    assert_eq!(def.timeout(), Duration::from_millis(750));
    assert_eq!(def.server_properties(), ["name".to_owned()]);
    assert_eq!(def.response_defaults()["ok"], json!(true));

    let methods: Vec<&str> = def.routes().method_names().collect();
    for expected in [
        "requestCreateDocument",
        "requestOneDocument",
        "requestUpdateDocument",
        "requestDeleteDocument",
        "requestHistory",
    ] {
        assert!(methods.contains(&expected), "missing {expected}");
    }

    let history = def.routes().get("requestHistory").unwrap();
    assert_eq!(history.verb(), Verb::Get);
    assert_eq!(
        history.static_options(),
        &RequestOptions::default().json_body(true)
    );

    let parsers: Vec<(Option<Verb>, &str)> = def
        .parsers()
        .entries()
        .iter()
        .map(|e| (e.verb(), e.source()))
        .collect();
    assert_eq!(
        parsers,
        vec![
            (Some(Verb::Get), "document/:id"),
            (None, "document/*rest"),
            (Some(Verb::Get), "document/:id"),
        ]
    );
}

#[test]
fn test_root_model_takes_the_default_timeout() {
    let (_dir, cfg) = write_config(SAMPLE);
    let base = cfg.resolve_model("base", &HandlerSet::with_builtins()).unwrap();
    assert_eq!(base.timeout(), Duration::from_secs(2));
}

#[test]
fn test_unknown_parser_handler_is_a_definition_error() {
    let (_dir, cfg) = write_config(
        r#"
        [[models.a.parsers]]
        route = "GET a"
        handler = "nope"
        "#,
    );
    let err = cfg.resolve_model("a", &HandlerSet::with_builtins()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Definition { ref model, .. } if model == "a"),
        "got {err:?}"
    );
}

#[test]
fn test_unknown_model() {
    let (_dir, cfg) = write_config(SAMPLE);
    assert!(matches!(
        cfg.resolve_model("widget", &HandlerSet::new()),
        Err(ConfigError::UnknownModel { .. })
    ));
}

#[test]
fn test_saved_config_loads_back() {
    let (_dir, cfg) = write_config(SAMPLE);
    let out = TempDir::new().unwrap();
    let path = out.path().join("nested").join("config.toml");

    save_config(&cfg, &path).unwrap();
    let reloaded = load_config_from(&path).unwrap();

    assert_eq!(
        reloaded.model_names().collect::<Vec<_>>(),
        vec!["base", "document"]
    );
    assert_eq!(
        reloaded.models["document"].parsers.len(),
        cfg.models["document"].parsers.len()
    );
}
