//! Retry of SQLite writes that hit a busy or locked database.
//!
//! The CLI and an external scheduler may hold the same database file; a
//! refresh should wait for the other writer instead of being recorded as
//! failed.

use std::future::Future;
use std::time::Duration;

/// Maximum number of retries after the first attempt
pub const MAX_RETRIES: u32 = 4;

/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("5")      // SQLITE_BUSY
                | Some("6")    // SQLITE_LOCKED
                | Some("262")  // SQLITE_LOCKED_SHAREDCACHE
                | Some("517")  // SQLITE_BUSY_SNAPSHOT
                | Some("1032") // SQLITE_BUSY_TIMEOUT
        ),
        _ => false,
    }
}

/// 100ms, 200ms, 400ms, 800ms
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * 2u64.pow(attempt.saturating_sub(1)))
}

/// Run `operation` again while it fails with a transient error
pub async fn with_retry<F, Fut, T>(operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if is_transient_error(&e) && attempts < MAX_RETRIES => {
                attempts += 1;
                let delay = backoff_delay(attempts);
                tracing::debug!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Database busy, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
