use std::sync::Arc;

use async_nats::jetstream;
use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::AckKind;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::job::CompletionNotification;
use crate::orchestrator::{CompletionOrchestrator, CrossLoadError};
use crate::settings::QueueConfig;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to queue: {0}")]
    Connect(#[from] async_nats::ConnectError),
    #[error("failed to create or look up stream: {0}")]
    Stream(String),
    #[error("failed to create consumer: {0}")]
    Consumer(String),
    #[error("failed to open message stream: {0}")]
    Messages(String),
}

/// Outcome handed back to the queue transport. `success` acknowledges the
/// message; otherwise the transport's own redelivery policy applies.
#[derive(Debug)]
pub struct QueueCallbackResult {
    pub success: bool,
    pub error: Option<CrossLoadError>,
}

impl QueueCallbackResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: CrossLoadError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            error: None,
        }
    }
}

/// Durable pull subscription on the completion-notification subject. Each
/// decoded message goes through the orchestrator's single entry point.
pub struct NotificationQueue {
    consumer: jetstream::consumer::Consumer<pull::Config>,
}

impl NotificationQueue {
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);
        let stream = context
            .get_or_create_stream(StreamConfig {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                ..Default::default()
            })
            .await
            .map_err(|e| QueueError::Stream(e.to_string()))?;
        let consumer = stream
            .get_or_create_consumer(
                &config.consumer,
                pull::Config {
                    durable_name: Some(config.consumer.clone()),
                    filter_subject: config.subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::Consumer(e.to_string()))?;
        Ok(Self { consumer })
    }

    /// Receive loop: ack on a successful callback, nak otherwise. Malformed
    /// payloads are rejected without reaching the orchestrator. Runs until
    /// `shutdown` flips, at which point in-flight work is cancelled.
    pub async fn run(
        self,
        orchestrator: Arc<CompletionOrchestrator>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError> {
        let mut messages = self
            .consumer
            .messages()
            .await
            .map_err(|e| QueueError::Messages(e.to_string()))?;
        let cancel = CancellationToken::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        cancel.cancel();
                        break;
                    }
                }
                next = messages.next() => {
                    let Some(delivery) = next else { break };
                    match delivery {
                        Ok(message) => {
                            let result = match serde_json::from_slice::<CompletionNotification>(
                                &message.payload,
                            ) {
                                Ok(notification) => {
                                    let token = cancel.child_token();
                                    orchestrator.handle(&notification, &token).await
                                }
                                Err(err) => {
                                    error!(error = %err, "rejecting malformed completion message");
                                    QueueCallbackResult::rejected()
                                }
                            };
                            let ack = if result.success {
                                message.ack().await
                            } else {
                                message.ack_with(AckKind::Nak(None)).await
                            };
                            if let Err(err) = ack {
                                warn!(error = %err, "failed to acknowledge queue message");
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "transient queue receive error");
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
