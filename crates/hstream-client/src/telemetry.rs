use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-based filter and bridge `log` records.
///
/// - Reads `RUST_LOG` for level directives (e.g., "info", "debug,hstream_client=trace").
/// - Forwards `log` crate records (e.g. from transport dependencies) to `tracing`.
/// - Logs to stderr so command output on stdout stays clean.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with_default("info");
}

/// Like [`init`], with the filter used when `RUST_LOG` is unset.
fn init_with_default(default_directives: &str) {
    let _ = LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
