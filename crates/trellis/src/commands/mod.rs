pub mod call;
pub mod config_cmd;
pub mod routes;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a model command to its handler.
#[allow(clippy::future_not_send)]
pub async fn dispatch(cmd: &Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Routes(args) => routes::handle(args, global),
        Command::Call(args) => call::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        // Handled in main before dispatch
        Command::Completions(_) => Ok(()),
    }
}
