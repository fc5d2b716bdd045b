//! Retry and backoff for failed transitions.

use super::error::{ClientError, ClientResult, ErrorCode};
use super::event::Event;

/// Retry parameters for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay in seconds; `0` selects the linear backoff.
    pub delay: u64,
    /// Attempts before giving up; `0` retries forever.
    pub max_tries: u32,
}

impl RetryPolicy {
    /// Retry forever with the given fixed delay (or linear backoff when `0`).
    pub const fn unlimited(delay: u64) -> Self {
        Self { delay, max_tries: 0 }
    }

    /// Retry at most `max_tries` times.
    pub const fn limited(delay: u64, max_tries: u32) -> Self {
        Self { delay, max_tries }
    }
}

/// Linear backoff used when no explicit delay applies.
pub const fn linear_backoff(tries: u32) -> u64 {
    10 + tries as u64 * 10
}

/// Count a failed attempt on `event` and compute how long to wait before the retry.
///
/// Returns the delay in seconds, or a fatal error once `policy.max_tries` is reached.
/// The fatal error keeps the code and message of `error` when one is given.
pub fn backoff(event: &mut Event, policy: RetryPolicy, error: Option<&ClientError>) -> ClientResult<u64> {
    event.tries = event.tries.saturating_add(1);
    let delay = if policy.delay > 0 {
        policy.delay
    } else {
        linear_backoff(event.tries)
    };
    if policy.max_tries > 0 && event.tries >= policy.max_tries {
        return Err(error.map_or_else(
            || ClientError::fatal(ErrorCode::Internal, "Maximum number of tries exceeded"),
            |e| e.clone().into_fatal(),
        ));
    }
    Ok(delay)
}
