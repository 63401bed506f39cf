//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so streamed answers on stdout stay clean. The filter is
//! read from `DOCQA_LOG` (same syntax as `RUST_LOG`), defaulting to `warn`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "DOCQA_LOG";

/// Filter used when `DOCQA_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// Builds the filter: `DOCQA_LOG` if set and valid, else `debug` for the
/// crate when `verbose`, else [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    if verbose {
        EnvFilter::new("warn,docqa_rs=debug")
    } else {
        EnvFilter::new(DEFAULT_FILTER)
    }
}

/// Installs the global subscriber. Calling it twice is a no-op.
pub fn init(verbose: bool) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt_layer)
        .try_init();
}
