use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::job::{CompletionNotification, CrossLoadStatus};
use crate::merge::{ArchiveMerger, MergeError};
use crate::queue::QueueCallbackResult;
use crate::report_store::{StoreError, StoreRegistry};
use crate::status_sink::{NotificationError, StatusSink};

#[derive(Debug, Error)]
pub enum CrossLoadError {
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Single-shot handler for one completion notification: classify, notify
/// the status sink, and on the success path merge the job's report
/// archives. Shared by the queue adapter and the sweeper.
pub struct CompletionOrchestrator {
    status_sink: Arc<dyn StatusSink>,
    stores: StoreRegistry,
    merger: ArchiveMerger,
}

impl CompletionOrchestrator {
    pub fn new(status_sink: Arc<dyn StatusSink>, stores: StoreRegistry) -> Self {
        Self {
            status_sink,
            stores,
            merger: ArchiveMerger,
        }
    }

    /// Never panics and never re-raises: every failure is logged with the
    /// job id and folded into the returned result, which the transport uses
    /// to decide acknowledgement.
    pub async fn handle(
        &self,
        message: &CompletionNotification,
        cancel: &CancellationToken,
    ) -> QueueCallbackResult {
        info!(
            job_id = message.job_id,
            external_job_id = %message.external_job_id,
            "cross loading job matched with external job id"
        );

        match self.process(message, cancel).await {
            Ok(()) => QueueCallbackResult::ok(),
            Err(err) => {
                error!(
                    job_id = message.job_id,
                    error = %err,
                    "cross loading failed to post status update or merge reports"
                );
                QueueCallbackResult::failed(err)
            }
        }
    }

    async fn process(
        &self,
        message: &CompletionNotification,
        cancel: &CancellationToken,
    ) -> Result<(), CrossLoadError> {
        if message.is_success() {
            info!(job_id = message.job_id, "cross loading successful");
            self.status_sink
                .notify(message.job_id, CrossLoadStatus::Completed, cancel)
                .await?;
            self.merge_reports(message, cancel).await?;
        } else {
            warn!(
                job_id = message.job_id,
                reason = message.error_message.as_deref().unwrap_or_default(),
                "cross loading failed"
            );
            self.status_sink
                .notify(message.job_id, CrossLoadStatus::Failed, cancel)
                .await?;
        }
        Ok(())
    }

    async fn merge_reports(
        &self,
        message: &CompletionNotification,
        cancel: &CancellationToken,
    ) -> Result<(), CrossLoadError> {
        let container = message
            .storage_container
            .as_deref()
            .filter(|c| !c.is_empty());
        let Some(container) = container else {
            warn!(
                job_id = message.job_id,
                "no storage container on completion message, skipping report merge"
            );
            return Ok(());
        };

        let store = self.stores.get_or_create(container).await?;
        self.merger
            .merge(
                message.job_id,
                message.report_file_1.as_deref(),
                message.report_file_2.as_deref(),
                store.as_ref(),
                cancel,
            )
            .await?;
        Ok(())
    }
}
