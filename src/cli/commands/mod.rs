//! CLI command dispatch and handlers.

pub mod run;
pub mod validate;

use crate::cli::args::{Cli, Commands};
use crate::error::FenceWatchError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), FenceWatchError> {
    match cli.command {
        Commands::Run(args) => run::run(&args).await,
        Commands::Validate(args) => validate::run(&args),
    }
}
