//! Bounded retry with a fixed delay
//!
//! Every client call made by the upload engine goes through
//! [`RetryPolicy::run`]: transient failures are retried after a blocking
//! wait until `max_attempts` calls have been made, fatal failures stop
//! immediately. Each call site owns an independent attempt counter.

use crate::client::{ClientError, ClientResult, FailureKind, Operation};
use crate::events::{TransferEvent, TransferObserver};
use std::time::Duration;

/// Default number of attempts per call (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Retry bound and delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, at least 1
    pub max_attempts: u32,
    /// Blocking wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Why a retried call gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure {
    /// Fatal failure, no further attempts made
    Fatal {
        /// The failure
        error: ClientError,
        /// Attempt on which it happened
        attempt: u32,
    },
    /// Every attempt failed transiently
    Exhausted {
        /// Last failure seen
        error: ClientError,
        /// Attempts made
        attempts: u32,
    },
}

impl RetryPolicy {
    /// Policy with the given bound and no delay (for tests)
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    /// Set the attempt bound
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay between attempts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Attempt bound, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `call` until it succeeds, fails fatally or runs out of attempts
    ///
    /// `call` receives the 1-based attempt number. Failures and waits are
    /// reported to `observer` under `archive` and `operation`.
    pub fn run<T, F>(
        &self,
        archive: &str,
        operation: Operation,
        observer: &dyn TransferObserver,
        mut call: F,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut(u32) -> ClientResult<T>,
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;
        loop {
            let error = match call(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            observer.on_event(&TransferEvent::AttemptFailed {
                archive: archive.to_string(),
                operation,
                attempt,
                max_attempts,
                error: error.clone(),
            });

            if error.kind == FailureKind::Fatal {
                return Err(RetryFailure::Fatal { error, attempt });
            }
            if attempt >= max_attempts {
                return Err(RetryFailure::Exhausted {
                    error,
                    attempts: attempt,
                });
            }

            attempt += 1;
            observer.on_event(&TransferEvent::Retrying {
                archive: archive.to_string(),
                operation,
                next_attempt: attempt,
                delay: self.delay,
            });
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }
    }
}
