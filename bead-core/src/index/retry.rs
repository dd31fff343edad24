//! Bounded exponential backoff for SQLite `BUSY`/`LOCKED` contention.
//!
//! Adapted from `contracts::evaluator::load_contract_from_file`'s
//! `BACKOFF_SERIES` retry shape (I/O retries there, SQLite-busy retries
//! here): a short fixed series of delays, doubling each attempt, with the
//! final outcome left for the caller to classify — a busy/locked exhaustion
//! and a genuine write failure (e.g. read-only filesystem) mean different
//! `BeadError` variants one level up, so this module stays agnostic to that
//! mapping.

use std::thread;
use std::time::Duration;

use rusqlite::ErrorCode;

const BASE_DELAY_MS: u64 = 20;
const MAX_ATTEMPTS: u32 = 5;

/// What happened when the retry budget ran out.
pub enum RetryOutcome {
    /// Every attempt hit `BUSY`/`LOCKED`; `attempts` is how many were made.
    Busy { attempts: u32 },
    /// A non-contention error occurred; retrying would not have helped.
    Failed(rusqlite::Error),
}

fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

/// Run `op` up to `MAX_ATTEMPTS` times, backing off between attempts when the
/// failure looks like transient lock contention. Any other error short-
/// circuits immediately as `RetryOutcome::Failed`.
pub fn with_retry<T>(mut op: impl FnMut() -> Result<T, rusqlite::Error>) -> Result<T, RetryOutcome> {
    let mut delay = BASE_DELAY_MS;
    for attempt in 1..=MAX_ATTEMPTS {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_contention(&e) && attempt < MAX_ATTEMPTS => {
                thread::sleep(Duration::from_millis(delay));
                delay *= 2;
            }
            Err(e) if is_contention(&e) => {
                return Err(RetryOutcome::Busy { attempts: attempt });
            }
            Err(e) => return Err(RetryOutcome::Failed(e)),
        }
    }
    unreachable!("loop always returns on its final iteration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_without_retrying_when_op_succeeds_first_try() {
        let mut calls = 0;
        let result = with_retry(|| {
            calls += 1;
            Ok::<_, rusqlite::Error>(7)
        });
        assert!(matches!(result, Ok(7)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn non_contention_error_is_not_retried() {
        let mut calls = 0;
        let result = with_retry(|| {
            calls += 1;
            Err::<i32, _>(rusqlite::Error::InvalidQuery)
        });
        assert!(matches!(result, Err(RetryOutcome::Failed(_))));
        assert_eq!(calls, 1);
    }
}
