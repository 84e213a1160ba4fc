// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory print queue.
//
// Jobs are kept in drain order: HIGH before NORMAL before LOW, FIFO within a
// band. The head job stays where it is once it has been attempted, so a
// retried job is never overtaken by a later submission. Nothing is persisted.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use parkdesk_core::error::{PrinterError, Result};
use parkdesk_core::types::{JobId, JobStatus, PrintJob};

use crate::retry::{self, RetryDecision};

/// Queue capacity. Submissions beyond it are rejected.
pub const MAX_QUEUE_SIZE: usize = 50;

/// Result of recording a failed attempt.
#[derive(Debug, Clone)]
pub enum FailOutcome {
    /// Back to PENDING at the head of the queue.
    Requeued,
    /// Removed and marked FAILED.
    Exhausted(PrintJob),
}

/// Bounded priority queue of print jobs.
#[derive(Debug)]
pub struct PrintQueue {
    jobs: VecDeque<PrintJob>,
    capacity: usize,
}

impl Default for PrintQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Printing, or waiting for its retry.
fn is_pinned(job: &PrintJob) -> bool {
    job.status == JobStatus::Printing || job.attempts > 0
}

impl PrintQueue {
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert `job` behind every job of equal or higher priority.
    pub fn enqueue(&mut self, job: PrintJob) -> Result<()> {
        if self.is_full() {
            return Err(PrinterError::QueueFull(self.capacity));
        }
        let pos = self
            .jobs
            .iter()
            .position(|queued| !is_pinned(queued) && queued.priority < job.priority)
            .unwrap_or(self.jobs.len());
        debug!(job_id = %job.id, priority = ?job.priority, pos, "job enqueued");
        self.jobs.insert(pos, job);
        Ok(())
    }

    /// Mark the head job PRINTING and return a copy of it.
    ///
    /// Returns `None` when the queue is empty or a job is already printing.
    pub fn begin_next(&mut self) -> Option<PrintJob> {
        let head = self.jobs.front_mut()?;
        if head.status == JobStatus::Printing {
            return None;
        }
        head.status = JobStatus::Printing;
        head.attempts += 1;
        head.last_attempt_at = Some(Utc::now());
        Some(head.clone())
    }

    /// Remove a job after a successful write.
    pub fn complete(&mut self, id: &JobId) -> Option<PrintJob> {
        let pos = self.position(id)?;
        let mut job = self.jobs.remove(pos)?;
        job.status = JobStatus::Completed;
        job.last_error = None;
        Some(job)
    }

    /// Record a failed attempt. `None` if the job is no longer queued.
    pub fn fail(&mut self, id: &JobId, error: &str, max_attempts: u32) -> Option<FailOutcome> {
        let pos = self.position(id)?;
        let job = &mut self.jobs[pos];
        job.last_error = Some(error.to_string());

        match retry::decide(job.attempts, max_attempts) {
            RetryDecision::Requeue => {
                job.status = JobStatus::Pending;
                Some(FailOutcome::Requeued)
            }
            RetryDecision::GiveUp => {
                let mut job = self.jobs.remove(pos)?;
                job.status = JobStatus::Failed;
                Some(FailOutcome::Exhausted(job))
            }
        }
    }

    /// Undo `begin_next` for a job that never reached the printer.
    ///
    /// The job goes back to PENDING and the attempt is not counted.
    pub fn abort(&mut self, id: &JobId) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let job = &mut self.jobs[pos];
        if job.status != JobStatus::Printing {
            return false;
        }
        job.status = JobStatus::Pending;
        job.attempts = job.attempts.saturating_sub(1);
        if job.attempts == 0 {
            job.last_attempt_at = None;
        }
        true
    }

    /// Drop every job that is not currently printing. Returns how many went.
    pub fn clear(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| job.status == JobStatus::Printing);
        before - self.jobs.len()
    }

    /// Copies of all queued jobs in drain order.
    pub fn snapshot(&self) -> Vec<PrintJob> {
        self.jobs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    fn position(&self, id: &JobId) -> Option<usize> {
        self.jobs.iter().position(|job| &job.id == id)
    }
}
