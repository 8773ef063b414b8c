//! The `validate` command: check configuration files without connecting.

use tracing::{info, warn};

use crate::cli::args::ValidateArgs;
use crate::config;
use crate::error::FenceWatchError;

/// Validate configuration files.
///
/// # Errors
///
/// Returns the first load or validation error encountered.
pub fn run(args: &ValidateArgs) -> Result<(), FenceWatchError> {
    for path in &args.files {
        info!(file = %path.display(), "validating configuration");
        let loaded = config::load(path)?;
        for warning in &loaded.warnings {
            warn!(location = %warning.location, "{}", warning.message);
        }
        info!(
            file = %path.display(),
            servers = loaded.config.servers.len(),
            "configuration valid"
        );
    }
    Ok(())
}
