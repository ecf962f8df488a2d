//! Tracing initialisation for tests.
//!
//! [`init_test_tracing`] routes `tracing` output through the test harness
//! writer so it only shows up for failing tests. The global subscriber is
//! installed at most once per process, so every test may call it.

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber honouring `RUST_LOG` (default `debug`
/// for ScriptDesk crates, `warn` elsewhere).
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,scriptdesk_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
