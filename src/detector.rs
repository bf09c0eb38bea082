use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::job::{CrossLoadStatus, JobRecord};
use crate::job_store::{JobStore, JobStoreError};

/// Finds jobs stalled in `MovedForProcessing` past the staleness threshold,
/// inferred to have failed silently.
pub struct StuckJobDetector {
    store: Arc<dyn JobStore>,
    stuck_threshold_minutes: u64,
}

impl StuckJobDetector {
    pub fn new(store: Arc<dyn JobStore>, stuck_threshold_minutes: u64) -> Self {
        Self {
            store,
            stuck_threshold_minutes,
        }
    }

    /// Computed fresh on every call. The status filter happens at the store;
    /// staleness is judged in one pass over that snapshot. A record with no
    /// last-update timestamp is never stuck, and a record exactly at the
    /// threshold is not stuck (strict inequality).
    pub async fn stuck_jobs(
        &self,
        now_utc: DateTime<Utc>,
    ) -> Result<Vec<JobRecord>, JobStoreError> {
        let threshold = Duration::minutes(self.stuck_threshold_minutes as i64);
        let candidates = self
            .store
            .jobs_in_cross_load_status(CrossLoadStatus::MovedForProcessing)
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|job| {
                matches!(job.last_updated_utc, Some(updated) if updated + threshold < now_utc)
            })
            .collect())
    }
}
