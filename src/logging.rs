//! Diagnostic tracing for baton.
//!
//! Diagnostics go to stderr through `tracing`; command reports are printed to
//! stdout as JSON and are unaffected by the log level. The durable record of
//! what happened lives in the event journal (`events`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `verbose` selects `baton=debug`
/// instead of `baton=info`.
///
/// ```bash
/// RUST_LOG=baton=trace baton dispatch --repo octo/widgets --task "add logging"
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "baton=debug" } else { "baton=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
