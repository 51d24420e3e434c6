//! SNS HTTP push envelope and payload unwrapping.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum number of string-encoding layers peeled off a notification payload.
pub const MAX_UNWRAP_DEPTH: usize = 3;

/// Envelope posted by SNS to an HTTP(S) subscription.
///
/// Only the fields the relay acts on are decoded. Missing strings default to
/// empty, matching how SNS omits fields that do not apply to a message type.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "Type", default)]
    pub message_type: String,

    /// Present only on `SubscriptionConfirmation`
    #[serde(rename = "Token", default)]
    pub token: String,

    #[serde(rename = "TopicArn", default)]
    pub topic_arn: String,

    #[serde(rename = "MessageId", default)]
    pub message_id: Option<String>,

    /// Opaque payload, often a JSON document encoded as a string
    #[serde(rename = "Message", default)]
    pub message: Value,
}

/// Discriminator of a [`RawEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind<'a> {
    SubscriptionConfirmation,
    Notification,
    Other(&'a str),
}

impl RawEnvelope {
    pub fn kind(&self) -> MessageKind<'_> {
        match self.message_type.as_str() {
            "SubscriptionConfirmation" => MessageKind::SubscriptionConfirmation,
            "Notification" => MessageKind::Notification,
            other => MessageKind::Other(other),
        }
    }

    pub fn message_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or("unknown")
    }
}

/// Why a notification payload could not be turned into a JSON object.
#[derive(Debug, Error)]
pub enum UnwrapError {
    #[error("payload string is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("payload is encoded more than {MAX_UNWRAP_DEPTH} times")]
    TooDeep,
}

/// Decode a payload that may be an object or a JSON string containing one.
///
/// Objects are returned as is. Strings are parsed as JSON and the result is
/// unwrapped again, so a payload quoted twice still yields its object.
pub fn unwrap_payload(payload: Value) -> Result<Map<String, Value>, UnwrapError> {
    let mut current = payload;

    for _ in 0..=MAX_UNWRAP_DEPTH {
        match current {
            Value::Object(fields) => return Ok(fields),
            Value::String(text) => current = serde_json::from_str(&text)?,
            other => return Err(UnwrapError::NotAnObject(json_type(&other))),
        }
    }

    Err(UnwrapError::TooDeep)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
