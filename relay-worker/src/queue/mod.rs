//! Queue module for SQS operations.
//!
//! This module provides:
//! - Message types for the queue ingestion path
//! - The [`QueueClient`] seam and its SQS implementation
//! - Backoff and circuit breaking for failed polls
//!
//! ## Flow
//!
//! ```text
//! SQS → receive → NormalizedMessage → Forwarder → delete
//! ```

pub mod backoff;
pub mod client;
pub mod types;

pub use backoff::{BackoffPolicy, CircuitState, PollBackoff};
pub use client::{QueueClient, QueueError, ReceiveOptions, SqsQueue};
pub use types::{NormalizedMessage, QueueRecord, RecordError, MAX_BATCH_SIZE};

#[cfg(test)]
pub(crate) mod testing;
