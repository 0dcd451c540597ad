use tracing_subscriber::EnvFilter;

use crate::error::{Result, TemporaError};
use crate::settings::Settings;

/// Installs a `fmt` subscriber filtered by `settings.log_filter`, falling
/// back to `RUST_LOG` and then `info` when the setting is empty.
///
/// Returns `Ok(false)` when a global subscriber was already installed.
pub fn init(settings: &Settings) -> Result<bool> {
    let filter = if settings.log_filter.trim().is_empty() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_new(&settings.log_filter)
            .map_err(|e| TemporaError::Config(format!("log filter '{}': {e}", settings.log_filter)))?
    };
    Ok(tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok())
}
