/*!
 * Job records and the process-wide registry.
 *
 * A `Job` is created `Pending` at submission, moved to `InProgress` when its
 * background run starts and ends `Completed` or `Failed`. Only the run that
 * owns the job's `JobHandle` can change it; anyone holding the registry can
 * read snapshots.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

pub mod registry;

pub use registry::{JobHandle, JobRegistry};

/// Opaque job identifier, never reused
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, background run not started yet
    Pending,
    /// Background run in progress
    InProgress,
    /// Output written
    Completed,
    /// Run aborted; `error` says why
    Failed,
}

impl JobStatus {
    /// Completed and Failed accept no further changes
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Snapshot of one job as pollers see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    /// 0 to 100, never lowered while the job runs
    pub progress: u8,
    /// Last human-readable status line
    pub message: String,
    /// Set only when Completed
    pub output_location: Option<PathBuf>,
    /// Set only when Failed, never empty
    pub error: Option<String>,
    /// The output format differs from the input format
    pub fallback: bool,
    /// Describes the format change when `fallback` is set
    pub fallback_reason: Option<String>,
}

impl Job {
    pub(crate) fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            message: "Queued".to_string(),
            output_location: None,
            error: None,
            fallback: false,
            fallback_reason: None,
        }
    }

    /// File name a download should carry
    pub fn download_name(&self) -> Option<String> {
        self.output_location
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}
