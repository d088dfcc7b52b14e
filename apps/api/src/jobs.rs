//! Ingest job history.
//!
//! Every ingest request records a job that moves
//! `pending → running → completed | failed`. History is bounded: once the
//! tracker is full the oldest finished job is evicted. Jobs still in flight
//! are never evicted, so the history can briefly exceed its capacity when
//! every slot is busy.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    fn can_become(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub url: Option<String>,
    pub message_count: usize,
    pub context_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("ingest job {0} not found")]
    NotFound(Uuid),

    #[error("ingest job {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

pub struct IngestJobTracker {
    capacity: usize,
    jobs: RwLock<VecDeque<IngestJob>>,
}

impl IngestJobTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            jobs: RwLock::new(VecDeque::new()),
        }
    }

    /// Records a new pending job and returns its id.
    pub fn create(&self, url: Option<String>, message_count: usize) -> Uuid {
        let job = IngestJob {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            url,
            message_count,
            context_id: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        let id = job.id;

        let mut jobs = self.jobs.write();
        while jobs.len() >= self.capacity {
            let Some(oldest_finished) = jobs.iter().position(|j| j.status.is_finished()) else {
                break;
            };
            jobs.remove(oldest_finished);
        }
        jobs.push_back(job);
        id
    }

    pub fn start(&self, id: Uuid) -> Result<(), JobError> {
        self.transition(id, JobStatus::Running, |_| {})
    }

    pub fn complete(&self, id: Uuid, context_id: Uuid) -> Result<(), JobError> {
        self.transition(id, JobStatus::Completed, |job| {
            job.context_id = Some(context_id);
            job.finished_at = Some(Utc::now());
        })
    }

    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.transition(id, JobStatus::Failed, |job| {
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        })
    }

    fn transition(
        &self,
        id: Uuid,
        next: JobStatus,
        apply: impl FnOnce(&mut IngestJob),
    ) -> Result<(), JobError> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(JobError::NotFound(id))?;

        if !job.status.can_become(next) {
            return Err(JobError::InvalidTransition {
                id,
                from: job.status,
                to: next,
            });
        }
        job.status = next;
        apply(job);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<IngestJob> {
        self.jobs.read().iter().find(|j| j.id == id).cloned()
    }

    /// Newest first.
    pub fn list(&self) -> Vec<IngestJob> {
        self.jobs.read().iter().rev().cloned().collect()
    }

    pub fn summary(&self) -> JobSummary {
        let jobs = self.jobs.read();
        let mut summary = JobSummary {
            total: jobs.len(),
            ..JobSummary::default()
        };
        for job in jobs.iter() {
            match job.status {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::Running => summary.running += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_happy_path() {
        let tracker = IngestJobTracker::new(10);
        let id = tracker.create(Some("https://chat/1".into()), 4);
        assert_eq!(tracker.get(id).unwrap().status, JobStatus::Pending);

        tracker.start(id).unwrap();
        let context_id = Uuid::new_v4();
        tracker.complete(id, context_id).unwrap();

        let job = tracker.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.context_id, Some(context_id));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_job_rejects_skipping_running() {
        let tracker = IngestJobTracker::new(10);
        let id = tracker.create(None, 0);
        let err = tracker.complete(id, Uuid::new_v4()).unwrap_err();
        assert_eq!(
            err,
            JobError::InvalidTransition {
                id,
                from: JobStatus::Pending,
                to: JobStatus::Completed
            }
        );
    }

    #[test]
    fn test_job_terminal_states_are_final() {
        let tracker = IngestJobTracker::new(10);
        let id = tracker.create(None, 1);
        tracker.start(id).unwrap();
        tracker.fail(id, "boom").unwrap();
        assert!(tracker.start(id).is_err());
        assert!(tracker.complete(id, Uuid::new_v4()).is_err());
        assert_eq!(tracker.get(id).unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unknown_job() {
        let tracker = IngestJobTracker::new(10);
        let id = Uuid::new_v4();
        assert_eq!(tracker.start(id), Err(JobError::NotFound(id)));
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let tracker = IngestJobTracker::new(2);
        let first = tracker.create(None, 1);
        let second = tracker.create(None, 2);
        for id in [first, second] {
            tracker.start(id).unwrap();
            tracker.complete(id, Uuid::new_v4()).unwrap();
        }
        let third = tracker.create(None, 3);

        assert!(tracker.get(first).is_none());
        let ids: Vec<Uuid> = tracker.list().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![third, second]);
    }

    #[test]
    fn test_running_job_survives_eviction() {
        let tracker = IngestJobTracker::new(1);
        let running = tracker.create(Some("https://chat/a".into()), 1);
        tracker.start(running).unwrap();

        // A second ingest arrives while the first is still running.
        let queued = tracker.create(Some("https://chat/b".into()), 1);

        tracker.complete(running, Uuid::new_v4()).unwrap();
        assert_eq!(tracker.get(running).unwrap().status, JobStatus::Completed);
        assert_eq!(tracker.get(queued).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_finished_jobs_evicted_before_older_running_ones() {
        let tracker = IngestJobTracker::new(2);
        let slow = tracker.create(None, 1);
        tracker.start(slow).unwrap();
        let fast = tracker.create(None, 1);
        tracker.start(fast).unwrap();
        tracker.fail(fast, "boom").unwrap();

        let next = tracker.create(None, 1);

        assert!(tracker.get(fast).is_none());
        assert_eq!(tracker.get(slow).unwrap().status, JobStatus::Running);
        assert!(tracker.get(next).is_some());
        assert_eq!(tracker.summary().total, 2);
    }

    #[test]
    fn test_summary_counts_by_status() {
        let tracker = IngestJobTracker::new(10);
        let a = tracker.create(None, 1);
        let b = tracker.create(None, 1);
        tracker.create(None, 1);
        tracker.start(a).unwrap();
        tracker.complete(a, Uuid::new_v4()).unwrap();
        tracker.start(b).unwrap();

        assert_eq!(
            tracker.summary(),
            JobSummary {
                total: 3,
                pending: 1,
                running: 1,
                completed: 1,
                failed: 0
            }
        );
    }
}
