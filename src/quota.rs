/*!
 * Per-caller daily translation quotas.
 *
 * The gate is consulted once, synchronously with submission. Usage is the
 * number of history records of the caller since midnight UTC.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::errors::PipelineError;
use crate::history::TranslationStore;

/// Subscription plan of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    ProMax,
}

impl Plan {
    /// Translations allowed per UTC day
    pub fn daily_quota(&self) -> u32 {
        match self {
            Self::Free => 170,
            Self::Pro => 4000,
            Self::ProMax => 10000,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
            Self::ProMax => write!(f, "promax"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = anyhow::Error;

    // Unknown plans get the free quota
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pro" => Ok(Self::Pro),
            "promax" => Ok(Self::ProMax),
            "free" | "" => Ok(Self::Free),
            other => {
                warn!("Unknown plan '{}', using free quota", other);
                Ok(Self::Free)
            }
        }
    }
}

/// Authenticated submitter of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Opaque identity from the auth layer
    pub id: String,
    pub plan: Plan,
}

impl Caller {
    pub fn new(id: impl Into<String>, plan: Plan) -> Self {
        Self { id: id.into(), plan }
    }
}

/// Admission check run before a job is created
#[async_trait]
pub trait QuotaGate: Send + Sync + Debug {
    /// `Err(PipelineError::QuotaExceeded)` when the caller may not submit
    async fn admit(&self, caller: &Caller) -> Result<(), PipelineError>;
}

/// Start of the UTC day containing `now`
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Plan-table quota counted from the translation history
#[derive(Debug, Clone)]
pub struct DailyPlanQuota {
    store: Arc<dyn TranslationStore>,
}

impl DailyPlanQuota {
    pub fn new(store: Arc<dyn TranslationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QuotaGate for DailyPlanQuota {
    async fn admit(&self, caller: &Caller) -> Result<(), PipelineError> {
        let quota = caller.plan.daily_quota();
        let since = start_of_utc_day(Utc::now());

        // An unreadable history never blocks a caller
        let used = match self.store.count_since(&caller.id, since).await {
            Ok(used) => used,
            Err(e) => {
                warn!("Could not read usage of {}: {}", caller.id, e);
                0
            }
        };

        debug!("Caller {} ({}) used {}/{} today", caller.id, caller.plan, used, quota);
        if quota > 0 && used >= quota as u64 {
            return Err(PipelineError::QuotaExceeded { quota });
        }
        Ok(())
    }
}
