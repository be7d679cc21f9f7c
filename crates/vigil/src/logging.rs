//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::VigilError;

/// Installs a formatted `tracing` subscriber as the global default.
///
/// `RUST_LOG` wins when it is set and parses; otherwise `default_filter`
/// (for example `"info"` or `"vigil_protocol=debug"`) is used. Calling
/// this again once a subscriber is installed does nothing.
///
/// # Errors
///
/// Returns [`VigilError::Config`] if `default_filter` is needed and does
/// not parse.
pub fn init(default_filter: &str) -> Result<(), VigilError> {
    let filter = env_filter(default_filter)?;
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}

fn env_filter(default_filter: &str) -> Result<EnvFilter, VigilError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| VigilError::Config(format!("log filter {default_filter:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("info").unwrap();
        init("debug").unwrap();
    }
}
