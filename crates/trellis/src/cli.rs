//! Clap derive structures for the `trellis` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// trellis -- inspect and call declarative REST resource models
#[derive(Debug, Parser)]
#[command(
    name = "trellis",
    version,
    about = "Inspect and call declarative REST resource models",
    long_about = "Models are declared in the trellis config file: a root URI, \
        route templates that generate request methods, and response parsers.\n\n\
        `trellis routes` lists the methods a model generates; `trellis call` \
        invokes one against the configured origin.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TRELLIS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server origin that model root URIs resolve against
    #[arg(long, env = "TRELLIS_ORIGIN", global = true)]
    pub origin: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "TRELLIS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "TRELLIS_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "TRELLIS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in milliseconds (overrides the model's timeout)
    #[arg(long, env = "TRELLIS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the request methods a model generates
    #[command(alias = "r")]
    Routes(RoutesArgs),

    /// Invoke a generated request method and print the parsed payload
    #[command(alias = "c")]
    Call(CallArgs),

    /// Inspect or initialize the config file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RoutesArgs {
    /// Model name from the config file
    pub model: String,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Model name from the config file
    pub model: String,

    /// Generated method name (e.g. requestOneDocument)
    pub method: String,

    /// Positional argument for `:$n` placeholders, in order
    #[arg(long = "arg", short = 'a', value_name = "ARG")]
    pub args: Vec<String>,

    /// Named parameter; values are read as JSON when they parse
    #[arg(long = "param", short = 'P', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Send parameters as a JSON request body
    #[arg(long)]
    pub json_body: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the effective config (token redacted)
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
