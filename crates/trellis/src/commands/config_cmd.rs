//! Config subcommand handlers.

use owo_colors::OwoColorize;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

const STARTER: &str = r#"# trellis configuration

[defaults]
origin = "http://localhost:8080"
timeout_ms = 30000
output = "json"

[models.document]
root_uri = "/api/"
server_properties = ["title", "body"]

[models.document.routes]
"CRUD document" = "Document"
"GET document/:id/history" = "requestHistory"

[[models.document.parsers]]
route = "GET document/*rest"
handler = "data"
"#;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_path(global);
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = util::load_config(global)?;
            if cfg.defaults.token.is_some() {
                cfg.defaults.token = Some("****".into());
            }
            let rendered = toml::to_string_pretty(&cfg).map_err(|e| CliError::Output {
                message: e.to_string(),
            })?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, STARTER)?;
            if !global.quiet {
                let shown = path.display().to_string();
                if output::should_color(global.color) {
                    eprintln!("wrote {}", shown.green());
                } else {
                    eprintln!("wrote {shown}");
                }
            }
            Ok(())
        }
    }
}
