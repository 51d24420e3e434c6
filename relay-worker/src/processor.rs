//! Per-message processing for the queue path.
//!
//! A record is acknowledged (deleted) only after the sink accepted it. Every
//! other outcome leaves the message in the queue so it redelivers once its
//! visibility timeout expires.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::forwarder::{ForwardError, Forwarder};
use crate::queue::{NormalizedMessage, QueueClient, QueueError, QueueRecord, RecordError};

/// Why a record was not acknowledged.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("malformed message body: {0}")]
    Malformed(#[from] RecordError),

    #[error("forward failed: {0}")]
    Forward(#[from] ForwardError),

    /// The sink has the message but the queue will redeliver it.
    #[error("forwarded but not acknowledged: {0}")]
    Acknowledge(#[source] QueueError),
}

/// Normalize, forward and acknowledge a single record.
///
/// # Arguments
///
/// * `queue` - Queue client used for the delete call
/// * `queue_url` - Resolved URL of the queue the record came from
/// * `forwarder` - Shared sink forwarder
/// * `record` - The record to process
pub async fn process_record<Q>(
    queue: &Q,
    queue_url: &str,
    forwarder: &Forwarder,
    record: &QueueRecord,
) -> Result<(), ProcessError>
where
    Q: QueueClient + ?Sized,
{
    let message = NormalizedMessage::from_body(&record.body).map_err(|e| {
        warn!(
            message_id = %record.message_id,
            error = %e,
            body_preview = %preview(&record.body),
            "sqs_message_malformed"
        );
        ProcessError::from(e)
    })?;

    info!(
        message_id = %record.message_id,
        timestamp = %message.timestamp,
        message_length = message.message.len(),
        "sqs_message_normalized"
    );

    forwarder.forward(&message).await.map_err(|e| {
        error!(
            message_id = %record.message_id,
            error = %e,
            "sqs_message_forward_failed"
        );
        ProcessError::from(e)
    })?;

    let receipt_handle = record.receipt_handle.as_deref().ok_or_else(|| {
        error!(message_id = %record.message_id, "sqs_message_missing_receipt_handle");
        ProcessError::Acknowledge(QueueError::MissingReceiptHandle)
    })?;

    queue.delete(queue_url, receipt_handle).await.map_err(|e| {
        error!(
            message_id = %record.message_id,
            error = %e,
            "sqs_message_delete_failed"
        );
        ProcessError::Acknowledge(e)
    })?;

    info!(message_id = %record.message_id, "sqs_message_deleted");
    Ok(())
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
