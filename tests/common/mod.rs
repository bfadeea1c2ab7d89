//! Shared helpers for integration tests.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialises test logging once per binary; later calls are no-ops.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}
