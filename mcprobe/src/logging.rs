//! Tracing setup for the binary.
//!
//! Logs always go to stderr so stdout stays reserved for the report.

use crate::cli::LogFormat;
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` when set and valid, then `level`, then `warn`.
#[must_use]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(
    level: &str,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => subscriber.try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_used_without_rust_log() {
        // Only meaningful when RUST_LOG is unset, which is the normal test setup.
        if std::env::var_os("RUST_LOG").is_none() {
            let filter = env_filter("info,mcprobe=debug").to_string();
            assert!(filter.contains("mcprobe=debug"), "{filter}");
        }
    }
}
