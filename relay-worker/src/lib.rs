//! Relay - forwards SNS/SQS notifications to a single HTTP sink.
//!
//! Two independent ingestion paths share one forwarder:
//! - `consumer`: long-polls an SQS queue and deletes each message only after
//!   the sink accepted it
//! - `web`: receives SNS HTTP pushes, confirms subscriptions and relays
//!   notification payloads
//!
//! ## Architecture
//!
//! ```text
//! SQS ──► QueueConsumer ──┐
//!                         ├──► Forwarder ──► sink
//! SNS ──► /sns-webhook ───┘
//! ```

pub mod aws;
pub mod config;
pub mod consumer;
pub mod forwarder;
pub mod processor;
pub mod queue;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use consumer::{ConsumerSettings, QueueConsumer};
pub use forwarder::{ForwardError, Forwarder};
pub use queue::{NormalizedMessage, QueueClient, QueueRecord, SqsQueue};
pub use web::{AppState, SnsSubscriptions, SubscriptionClient};
