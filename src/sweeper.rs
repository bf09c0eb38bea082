use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::detector::StuckJobDetector;
use crate::job::{CompletionNotification, JobId};
use crate::orchestrator::CompletionOrchestrator;

/// Failure reason attached to a sweeper-synthesized notification.
pub fn stuck_failure_message(stuck_threshold_minutes: u64) -> String {
    format!(
        "Cross load job has been marked as failed as it has not changed state within the configured timeout of {} minutes",
        stuck_threshold_minutes
    )
}

/// Periodically fails jobs stalled mid cross-load by pushing a synthetic
/// failure notification through the same path queue messages take.
pub struct StuckJobSweeper {
    detector: StuckJobDetector,
    orchestrator: Arc<CompletionOrchestrator>,
    clock: Arc<dyn Clock>,
    stuck_threshold_minutes: u64,
    sweep_interval: Duration,
}

impl StuckJobSweeper {
    pub fn new(
        detector: StuckJobDetector,
        orchestrator: Arc<CompletionOrchestrator>,
        clock: Arc<dyn Clock>,
        stuck_threshold_minutes: u64,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            detector,
            orchestrator,
            clock,
            stuck_threshold_minutes,
            sweep_interval,
        }
    }

    /// Sweep loop. The first run happens immediately; each run is awaited to
    /// completion before the next delay is armed, so firings never overlap.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.run_once().await;
            tokio::select! {
                _ = sleep(self.sweep_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("stuck job sweeper stopped");
    }

    /// One sweep. Jobs are handled one at a time so a failing notification
    /// does not stop the rest; a detector failure ends the run early and the
    /// caller loop still schedules the next one.
    pub async fn run_once(&self) {
        let now = self.clock.now_utc();
        let stuck = match self.detector.stuck_jobs(now).await {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(error = %err, "cross loading error in find crashed jobs logic");
                return;
            }
        };

        if stuck.is_empty() {
            return;
        }
        info!(count = stuck.len(), "failing stuck cross load jobs");

        let cancel = CancellationToken::new();
        for job in stuck {
            let notification = self.synthetic_failure(job.job_id);
            // handle() logs its own failures; one bad job must not stop the rest.
            let _ = self.orchestrator.handle(&notification, &cancel).await;
        }
    }

    pub fn synthetic_failure(&self, job_id: JobId) -> CompletionNotification {
        CompletionNotification {
            job_id,
            external_job_id: "NA".to_string(),
            error_message: Some(stuck_failure_message(self.stuck_threshold_minutes)),
            storage_container: None,
            report_file_1: None,
            report_file_2: None,
        }
    }
}
