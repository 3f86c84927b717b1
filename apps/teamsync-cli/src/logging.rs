//! Tracing subscriber setup.
//!
//! Logs go to stderr so that `--json` reports on stdout stay parseable.
//! `RUST_LOG` takes precedence over the built-in filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,teamsync_core=debug,teamsync_connector_graph=debug,teamsync=debug"
    } else {
        "info,teamsync=info"
    }
}

/// Initialize the global subscriber, as text or flattened JSON lines.
pub fn init_logging(verbose: bool, json: bool) {
    let filter = default_filter(verbose);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter_layer);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .flatten_event(true),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(verbose)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    tracing::debug!(filter = %filter, json, "Logging initialized");
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_filter(verbose)).is_ok());
        }
        assert!(default_filter(true).contains("teamsync_core=debug"));
    }

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
        init_test_logging();
    }
}
