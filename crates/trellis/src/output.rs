//! Output formatting: table, JSON, YAML.
//!
//! Structured formats serialize with serde; tables use `tabled`.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::{Table, Tabled, settings::Style};

use trellis_api::Verb;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// HTTP verb label, colored by how much it changes on the server.
pub fn verb_label(verb: Verb, color: bool) -> String {
    let label = verb.to_string();
    if !color {
        return label;
    }
    match verb {
        Verb::Get => label.green().to_string(),
        Verb::Post => label.cyan().to_string(),
        Verb::Put => label.yellow().to_string(),
        Verb::Del => label.red().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render rows as a table, or the serde data in a structured format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        structured => render_structured(structured, data),
    }
}

/// Render a response payload. Objects become a two-column table; other
/// values fall back to pretty JSON in table mode.
pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    match (format, value) {
        (OutputFormat::Table, Value::Object(fields)) => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, field) in fields {
                let text = match field {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                builder.push_record([key.clone(), text]);
            }
            Ok(builder.build().with(Style::rounded()).to_string())
        }
        (OutputFormat::Table, other) => render_structured(OutputFormat::Json, other),
        (structured, other) => render_structured(structured, other),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_structured<T: Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(output_err)?,
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(output_err)?,
        OutputFormat::Json | OutputFormat::Table => {
            serde_json::to_string_pretty(data).map_err(output_err)?
        }
    };
    Ok(rendered.trim_end().to_owned())
}

fn output_err(e: impl std::fmt::Display) -> CliError {
    CliError::Output {
        message: e.to_string(),
    }
}
