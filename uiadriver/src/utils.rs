use crate::AutomationError;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default window for retrying transient provider failures.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default delay between two attempts of a bounded loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs `op` until it succeeds, fails permanently, or `timeout` elapses.
///
/// Only errors reporting [`AutomationError::is_retryable`] are retried; the
/// last error is returned once the window closes.
pub fn retry_with_timeout<T, F>(
    operation: &str,
    timeout: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Result<T, AutomationError>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && start.elapsed() + interval <= timeout => {
                debug!(operation, attempt, error = %e, "transient failure, retrying");
                thread::sleep(interval);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Polls `probe` until it yields a value or `timeout` elapses.
///
/// Probe errors count as "not yet"; the last one is reported on expiry.
pub fn poll_until<T, F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Result<Option<T>, AutomationError>,
{
    let start = Instant::now();
    let mut last_error = None;
    loop {
        match probe() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => last_error = Some(e),
        }
        if start.elapsed() >= timeout {
            return Err(match last_error {
                Some(e) if !e.is_not_found() => e,
                _ => AutomationError::ElementNotFound(format!(
                    "{what} not available within {timeout:?}"
                )),
            });
        }
        thread::sleep(interval.min(timeout.saturating_sub(start.elapsed())));
    }
}
