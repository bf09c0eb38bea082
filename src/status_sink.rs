use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::job::{CrossLoadStatus, JobId};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("status sink request failed: {0}")]
    Http(String),
    #[error("status notification cancelled for job {0}")]
    Cancelled(JobId),
}

/// Upstream scheduler notification: one call per terminal status.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn notify(
        &self,
        job_id: JobId,
        status: CrossLoadStatus,
        cancel: &CancellationToken,
    ) -> Result<(), NotificationError>;
}

/// Posts job statuses to the scheduler web API. A non-2xx response is an
/// error like any transport failure.
pub struct HttpStatusSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStatusSink {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/job/cross-loading/status",
                base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn status_url(&self, job_id: JobId, status: CrossLoadStatus) -> String {
        format!("{}/{}/{}", self.endpoint, job_id, status.code())
    }
}

#[async_trait]
impl StatusSink for HttpStatusSink {
    async fn notify(
        &self,
        job_id: JobId,
        status: CrossLoadStatus,
        cancel: &CancellationToken,
    ) -> Result<(), NotificationError> {
        let url = self.status_url(job_id, status);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NotificationError::Cancelled(job_id)),
            response = self.client.post(&url).send() => {
                response
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| NotificationError::Http(e.to_string()))?;
                Ok(())
            }
        }
    }
}
