//! Tracing subscriber setup

use crate::config::Verbosity;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive for a verbosity level
#[must_use]
pub fn filter_directive(verbosity: Verbosity) -> String {
    let level = verbosity.log_level();
    format!("comparar={level},comparador={level}")
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over the verbosity flags. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
pub fn init_logging(verbosity: Verbosity, use_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(use_color)
                .with_target(verbosity.is_debug()),
        )
        .try_init();
}
