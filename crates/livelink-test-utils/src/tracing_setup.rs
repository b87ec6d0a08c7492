//! Tracing output for tests.
//!
//! Receive-loop and correlation events are the interesting ones when a
//! network test fails, so the default filter shows them at debug and keeps
//! everything else quiet. `LIVELINK_TEST_LOG` takes precedence over
//! `RUST_LOG` so a single run can be made noisier without touching other
//! crates' test output.

use tracing_subscriber::EnvFilter;

/// Environment variable read before `RUST_LOG`.
pub const TEST_LOG_ENV: &str = "LIVELINK_TEST_LOG";

/// Filter used when neither variable is set.
pub const DEFAULT_TEST_FILTER: &str = "warn,livelink_core::bridge=debug,livelink_config=info";

/// The filter directives a test run will use.
pub fn test_filter() -> String {
    std::env::var(TEST_LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_TEST_FILTER.to_string())
}

/// Install a subscriber writing through the test harness, with targets and
/// without timestamps. Later calls in the same process do nothing.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_new(test_filter())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_test_writer()
        .try_init();
}
