// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for jobs and connection attempts.
//
// Jobs get a fixed number of execution attempts. Connection attempts are
// spaced by a constant delay: a receipt printer that is off stays off until
// someone switches it on, so growing the delay only makes recovery slower.

use std::time::Duration;

use tracing::{debug, warn};

use parkdesk_core::config::PrinterConfig;

/// Execution attempts per job, counting the one that succeeds.
pub const MAX_JOB_ATTEMPTS: u32 = 3;

/// Pause before the head job is retried after a failed write.
pub const JOB_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// What to do with a job whose write just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put it back at the head of the queue.
    Requeue,
    /// Attempts exhausted.
    GiveUp,
}

/// Decide after the `attempts`-th failed attempt.
pub fn decide(attempts: u32, max_attempts: u32) -> RetryDecision {
    if attempts >= max_attempts {
        warn!(attempts, max_attempts, "job attempts exhausted");
        RetryDecision::GiveUp
    } else {
        debug!(attempts, max_attempts, "job will be retried");
        RetryDecision::Requeue
    }
}

/// Connection attempt schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    /// Total attempts per connect, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl ConnectRetry {
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay(),
        }
    }

    /// Whether another attempt follows attempt number `attempt` (1-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.attempts
    }

    /// Delay before the attempt after `attempt`. Linear: the same every time.
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
