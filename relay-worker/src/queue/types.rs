//! Queue message types.
//!
//! This module defines:
//! - [`QueueRecord`]: one message as received from the queue
//! - [`NormalizedMessage`]: the `{message, timestamp}` unit forwarded to the sink

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Maximum number of messages a single receive call may return.
pub const MAX_BATCH_SIZE: i32 = 10;

/// A message received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    /// Unique message identifier
    pub message_id: String,
    /// Capability token required to delete (acknowledge) this delivery
    pub receipt_handle: Option<String>,
    /// Raw message body
    pub body: String,
}

impl QueueRecord {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            receipt_handle: Some(receipt_handle.into()),
            body: body.into(),
        }
    }
}

/// Why a queue body could not be normalized.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("body is not a JSON object")]
    NotAnObject,

    #[error("field {0} not found or not a string")]
    MissingField(&'static str),

    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

/// Canonical message forwarded from the queue path.
///
/// The timestamp is always serialized as RFC 3339 in UTC with nine fractional
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedMessage {
    pub message: String,
    #[serde(serialize_with = "serialize_rfc3339_nanos")]
    pub timestamp: DateTime<Utc>,
}

impl NormalizedMessage {
    /// Build a message from a queue body shaped like an SNS-to-SQS envelope:
    /// a JSON object with string `Message` and `Timestamp` fields.
    pub fn from_body(body: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(body)?;
        let fields = value.as_object().ok_or(RecordError::NotAnObject)?;

        let message = fields
            .get("Message")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingField("Message"))?;

        let raw_timestamp = fields
            .get("Timestamp")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingField("Timestamp"))?;

        let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
            .map_err(|source| RecordError::InvalidTimestamp {
                value: raw_timestamp.to_string(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            message: message.to_string(),
            timestamp,
        })
    }
}

fn serialize_rfc3339_nanos<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true))
}
