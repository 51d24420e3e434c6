//! Queue service access.
//!
//! [`QueueClient`] is the seam between the consumer loop and SQS. The
//! production implementation wraps `aws-sdk-sqs`; tests substitute an
//! in-memory queue.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use thiserror::Error;
use tracing::debug;

use super::types::QueueRecord;

/// Failure talking to the queue service.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to resolve queue {queue}: {message}")]
    Resolve { queue: String, message: String },

    #[error("failed to receive messages: {0}")]
    Receive(String),

    #[error("failed to delete message: {0}")]
    Delete(String),

    #[error("message has no receipt handle")]
    MissingReceiptHandle,
}

/// Receive parameters for a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    pub wait_time_seconds: i32,
    pub visibility_timeout_seconds: i32,
}

/// Operations the consumer needs from a queue service.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Translate a queue name into its addressable URL.
    async fn resolve(&self, queue_name: &str) -> Result<String, QueueError>;

    /// Long-poll for a batch of messages.
    async fn receive(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<QueueRecord>, QueueError>;

    /// Acknowledge a message by deleting it.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;
}

/// SQS-backed [`QueueClient`].
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn resolve(&self, queue_name: &str) -> Result<String, QueueError> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| QueueError::Resolve {
                queue: queue_name.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QueueError::Resolve {
                queue: queue_name.to_string(),
                message: "response did not include a queue URL".to_string(),
            })
    }

    async fn receive(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<QueueRecord>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(options.max_messages)
            .wait_time_seconds(options.wait_time_seconds)
            .visibility_timeout(options.visibility_timeout_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(e).to_string()))?;

        let records: Vec<QueueRecord> = output
            .messages()
            .iter()
            .map(|m| QueueRecord {
                message_id: m.message_id().unwrap_or("unknown").to_string(),
                receipt_handle: m.receipt_handle().map(str::to_string),
                body: m.body().unwrap_or_default().to_string(),
            })
            .collect();

        debug!(batch_size = records.len(), "sqs_receive_complete");
        Ok(records)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }
}
