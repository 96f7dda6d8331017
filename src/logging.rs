use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the global fmt subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` applies
/// (e.g. `ledger_dedup=info`). Later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

        // try_init: a test harness may already own the global subscriber
        let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    });
}
