//! Builders, fakes and async helpers shared by devpipe's integration tests.

pub mod builders;
pub mod fake_executor;
pub mod fakes;

use std::future::Future;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for every async wait in the test suite.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber so logs show up only for failing tests.
/// Filter directives come from `DEVPIPE_LOG`, defaulting to `devpipe=debug`.
/// Repeated calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("DEVPIPE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn,devpipe=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Await `fut`, failing the test once [`TEST_DEADLINE`] passes.
pub async fn with_timeout<T>(fut: impl Future<Output = T>) -> T {
    match tokio::time::timeout(TEST_DEADLINE, fut).await {
        Ok(value) => value,
        Err(_) => panic!("test future still pending after {TEST_DEADLINE:?}"),
    }
}

/// Poll `cond` every 10ms until it holds, failing after [`TEST_DEADLINE`].
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let give_up = tokio::time::Instant::now() + TEST_DEADLINE;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < give_up,
            "gave up waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
