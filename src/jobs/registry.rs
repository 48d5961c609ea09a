/*!
 * In-memory job registry.
 *
 * Entries live for the lifetime of the process; nothing evicts them.
 * Readers take snapshots under a shared lock. Each job has exactly one
 * `JobHandle`, the only way to change it.
 */

use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Job, JobId, JobStatus};

/// Process-wide map from job id to job record
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a Pending job and return its single writer
    pub fn create(&self) -> JobHandle {
        let id = JobId::generate();
        self.jobs.write().insert(id.clone(), Job::pending(id.clone()));
        debug!("Job {} created", id);
        JobHandle { id, registry: self.clone() }
    }

    /// Snapshot of a job
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().get(id).cloned()
    }

    /// Number of jobs ever created in this process
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Apply `change` unless the job already reached a terminal state
    fn update(&self, id: &JobId, change: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(id) {
            if !job.status.is_terminal() {
                change(job);
            }
        }
    }
}

/// Exclusive writer for one job
///
/// Not `Clone`. The terminal transitions consume the handle.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    registry: JobRegistry,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Pending -> InProgress
    pub fn start(&self, message: impl Into<String>) {
        let message = message.into();
        self.registry.update(&self.id, |job| {
            job.status = JobStatus::InProgress;
            job.message = message;
        });
    }

    /// Record progress, clamped to 0..=100 and never lowered
    pub fn progress(&self, percent: i64, message: impl Into<String>) {
        let percent = percent.clamp(0, 100) as u8;
        let message = message.into();
        self.registry.update(&self.id, |job| {
            job.progress = job.progress.max(percent);
            job.message = message;
        });
    }

    /// Raise progress without touching the message
    pub fn advance(&self, percent: i64) {
        let percent = percent.clamp(0, 100) as u8;
        self.registry.update(&self.id, |job| job.progress = job.progress.max(percent));
    }

    /// InProgress -> Completed
    pub fn complete(self, output: PathBuf, fallback_reason: Option<String>) {
        self.registry.update(&self.id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.message = if fallback_reason.is_some() {
                "Completed with fallback".to_string()
            } else {
                "Completed".to_string()
            };
            job.output_location = Some(output);
            job.fallback = fallback_reason.is_some();
            job.fallback_reason = fallback_reason;
        });
    }

    /// Any state -> Failed, with a non-empty error
    pub fn fail(self, error: impl Into<String>) {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Unknown error".to_string();
        }
        self.registry.update(&self.id, |job| {
            job.status = JobStatus::Failed;
            job.message = "Failed".to_string();
            job.error = Some(error);
        });
    }
}
