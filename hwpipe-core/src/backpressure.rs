//! Buffer-full retry policy
//!
//! A full ingest buffer drains at the real playback rate, so the session
//! waits roughly one unit of playback time and resubmits the identical
//! payload until the device accepts it. Nothing is ever dropped; the only
//! ways out of the loop are acceptance, a fatal response, or cancellation.

use crate::cancel::CancelToken;
use crate::status::FeedStatus;
use serde::Serialize;
use std::time::Duration;
use tracing::{trace, warn};

/// Shortest wait between resubmissions
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// How long to wait after a full-buffer response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
}

impl RetryPolicy {
    /// Policy paced by one unit of playback time (clamped to
    /// [`MIN_RETRY_INTERVAL`] so it can never spin)
    pub fn paced(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_RETRY_INTERVAL),
        }
    }

    /// Wait applied after each full-buffer response
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submit through `feed` until the device accepts, fails, or `cancel` fires.
    ///
    /// Only interrupts raised while this submission is in flight end it; one
    /// left over from before the call is dropped. A closed token ends the
    /// first wait.
    pub fn submit<F>(&self, cancel: &CancelToken, mut feed: F) -> SubmitOutcome
    where
        F: FnMut() -> String,
    {
        cancel.discard_interrupt();
        let mut retries = 0u32;
        loop {
            let response = feed();
            match FeedStatus::parse(&response) {
                FeedStatus::Ok => return SubmitOutcome::Accepted { retries },
                FeedStatus::BufferFull => {
                    trace!(retries, interval = ?self.interval, "ingest buffer full, waiting");
                    if cancel.wait_for(self.interval) {
                        warn!(retries, "retry abandoned, session interrupted");
                        return SubmitOutcome::Cancelled { retries };
                    }
                    retries += 1;
                }
                FeedStatus::Fatal(status) => {
                    return SubmitOutcome::Fatal { status, retries };
                }
            }
        }
    }
}

/// Result of a paced submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Device took the payload after `retries` resubmissions
    Accepted {
        /// Number of resubmissions after full-buffer responses
        retries: u32,
    },
    /// Device answered with something other than Ok or BufferFull
    Fatal {
        /// Verbatim response
        status: String,
        /// Resubmissions made before the fatal response
        retries: u32,
    },
    /// Waiting was interrupted by close or an explicit interrupt; the
    /// payload was not accepted
    Cancelled {
        /// Resubmissions made before cancellation
        retries: u32,
    },
}

impl SubmitOutcome {
    /// True when the payload was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }

    /// Number of resubmissions performed
    pub fn retries(&self) -> u32 {
        match self {
            SubmitOutcome::Accepted { retries }
            | SubmitOutcome::Fatal { retries, .. }
            | SubmitOutcome::Cancelled { retries } => *retries,
        }
    }
}

/// Per-session ingest counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Payloads accepted by the device
    pub packets_fed: u64,
    /// Bytes accepted by the device
    pub bytes_fed: u64,
    /// Resubmissions caused by full-buffer responses
    pub buffer_full_retries: u64,
    /// Fatal feed responses
    pub fatal_responses: u64,
    /// Submissions abandoned by interruption
    pub cancelled_submissions: u64,
    /// Seek commands issued
    pub seeks: u64,
}

impl IngestStats {
    /// Fold one submission outcome into the counters
    pub fn record(&mut self, outcome: &SubmitOutcome, bytes: usize) {
        self.buffer_full_retries += u64::from(outcome.retries());
        match outcome {
            SubmitOutcome::Accepted { .. } => {
                self.packets_fed += 1;
                self.bytes_fed += bytes as u64;
            }
            SubmitOutcome::Fatal { .. } => self.fatal_responses += 1,
            SubmitOutcome::Cancelled { .. } => self.cancelled_submissions += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Instant;

    fn scripted(responses: &[&str]) -> impl FnMut() -> String {
        let mut queue: VecDeque<String> = responses.iter().map(|s| s.to_string()).collect();
        move || queue.pop_front().unwrap_or_else(|| "Ok".to_string())
    }

    #[test]
    fn test_interval_is_clamped() {
        assert_eq!(RetryPolicy::paced(Duration::ZERO).interval(), MIN_RETRY_INTERVAL);
        assert_eq!(
            RetryPolicy::paced(Duration::from_millis(40)).interval(),
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_one_resubmission_per_full_response() {
        let policy = RetryPolicy::paced(Duration::from_millis(5));
        let mut calls = 0;
        let mut feed = scripted(&["BufferFull", "BufferFull", "BufferFull", "Ok"]);

        let start = Instant::now();
        let outcome = policy.submit(&CancelToken::new(), || {
            calls += 1;
            feed()
        });

        assert_eq!(outcome, SubmitOutcome::Accepted { retries: 3 });
        assert_eq!(calls, 4);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_fatal_is_not_retried() {
        let policy = RetryPolicy::paced(Duration::from_millis(5));
        let mut calls = 0;
        let mut feed = scripted(&["BufferFull", "DecoderDead"]);

        let outcome = policy.submit(&CancelToken::new(), || {
            calls += 1;
            feed()
        });

        assert_eq!(
            outcome,
            SubmitOutcome::Fatal {
                status: "DecoderDead".to_string(),
                retries: 1
            }
        );
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_closed_token_stops_retrying() {
        let policy = RetryPolicy::paced(Duration::from_secs(30));
        let token = CancelToken::new();
        token.close();

        let start = Instant::now();
        let outcome = policy.submit(&token, || "BufferFull".to_string());

        assert_eq!(outcome, SubmitOutcome::Cancelled { retries: 0 });
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stale_interrupt_is_dropped() {
        let policy = RetryPolicy::paced(Duration::from_millis(5));
        let token = CancelToken::new();
        token.cancel();

        let outcome = policy.submit(&token, scripted(&["BufferFull", "Ok"]));
        assert_eq!(outcome, SubmitOutcome::Accepted { retries: 1 });
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_closed_token_cancels_every_submission() {
        let policy = RetryPolicy::paced(Duration::from_secs(30));
        let token = CancelToken::new();
        token.close();

        for _ in 0..2 {
            let outcome = policy.submit(&token, scripted(&["BufferFull", "Ok"]));
            assert_eq!(outcome, SubmitOutcome::Cancelled { retries: 0 });
        }
    }

    #[test]
    fn test_stats_record() {
        let mut stats = IngestStats::default();
        stats.record(&SubmitOutcome::Accepted { retries: 2 }, 100);
        stats.record(
            &SubmitOutcome::Fatal {
                status: "x".to_string(),
                retries: 0,
            },
            50,
        );

        assert_eq!(stats.packets_fed, 1);
        assert_eq!(stats.bytes_fed, 100);
        assert_eq!(stats.buffer_full_retries, 2);
        assert_eq!(stats.fatal_responses, 1);
    }
}
