//! SQS consumer loop.
//!
//! The consumer resolves its queue URL once, then long-polls forever:
//! receive a batch, process each record in order, sleep, repeat. Records are
//! deleted only after the sink accepted them, which gives at-least-once
//! delivery through the queue's own redelivery.

use std::convert::Infallible;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::forwarder::Forwarder;
use crate::processor::{process_record, ProcessError};
use crate::queue::backoff::with_jitter;
use crate::queue::{
    BackoffPolicy, CircuitState, PollBackoff, QueueClient, QueueError, ReceiveOptions,
    MAX_BATCH_SIZE,
};
use crate::Config;

/// Immutable settings for a [`QueueConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub queue_name: String,
    pub receive: ReceiveOptions,
    /// Pause after every successful poll, empty or not
    pub poll_interval: Duration,
    pub backoff: BackoffPolicy,
}

impl ConsumerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_name: config.queue_name.clone(),
            receive: ReceiveOptions {
                max_messages: MAX_BATCH_SIZE,
                wait_time_seconds: config.wait_time_seconds,
                visibility_timeout_seconds: config.visibility_timeout_seconds,
            },
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            backoff: BackoffPolicy::from_config(config),
        }
    }
}

/// Outcome counts for one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub received: usize,
    pub acknowledged: usize,
    pub malformed: usize,
    pub forward_failed: usize,
    pub ack_failed: usize,
}

/// Long-polling consumer feeding the shared [`Forwarder`].
pub struct QueueConsumer<Q> {
    queue: Q,
    forwarder: Forwarder,
    settings: ConsumerSettings,
}

impl<Q> QueueConsumer<Q>
where
    Q: QueueClient,
{
    pub fn new(queue: Q, forwarder: Forwarder, settings: ConsumerSettings) -> Self {
        Self {
            queue,
            forwarder,
            settings,
        }
    }

    /// Run the consumer.
    ///
    /// This function:
    /// 1. Resolves the queue URL (failure is returned and is fatal)
    /// 2. Polls for batches of up to 10 messages
    /// 3. Processes each message in batch order
    /// 4. Backs off exponentially on poll errors, opening a circuit after
    ///    repeated failures
    ///
    /// It only returns on resolution failure.
    pub async fn run(&self) -> Result<Infallible, QueueError> {
        let queue_url = self.queue.resolve(&self.settings.queue_name).await?;

        info!(
            queue = %self.settings.queue_name,
            queue_url = %queue_url,
            wait_time_seconds = self.settings.receive.wait_time_seconds,
            visibility_timeout_seconds = self.settings.receive.visibility_timeout_seconds,
            "sqs_consumer_started"
        );

        let mut backoff = PollBackoff::new(self.settings.backoff);

        loop {
            match self.poll_once(&queue_url).await {
                Ok(_) => {
                    if backoff.record_success() {
                        info!(queue = %self.settings.queue_name, "sqs_circuit_closed");
                    }
                    sleep(self.settings.poll_interval).await;
                }
                Err(e) => {
                    let retry = backoff.record_failure();
                    let delay = with_jitter(retry.delay);

                    if retry.just_opened {
                        error!(
                            queue = %self.settings.queue_name,
                            consecutive_failures = retry.consecutive_failures,
                            cooldown_ms = delay.as_millis() as u64,
                            error = %e,
                            "sqs_circuit_opened"
                        );
                    } else {
                        warn!(
                            queue = %self.settings.queue_name,
                            consecutive_failures = retry.consecutive_failures,
                            circuit_open = retry.circuit == CircuitState::Open,
                            backoff_ms = delay.as_millis() as u64,
                            error = %e,
                            "sqs_receive_failed"
                        );
                    }

                    sleep(delay).await;
                }
            }
        }
    }

    /// Receive one batch and process its records sequentially.
    pub async fn poll_once(&self, queue_url: &str) -> Result<CycleSummary, QueueError> {
        let records = self.queue.receive(queue_url, self.settings.receive).await?;

        let mut summary = CycleSummary {
            received: records.len(),
            ..Default::default()
        };

        if records.is_empty() {
            return Ok(summary);
        }

        info!(batch_size = records.len(), "sqs_batch_received");

        for record in &records {
            match process_record(&self.queue, queue_url, &self.forwarder, record).await {
                Ok(()) => summary.acknowledged += 1,
                Err(ProcessError::Malformed(_)) => summary.malformed += 1,
                Err(ProcessError::Forward(_)) => summary.forward_failed += 1,
                Err(ProcessError::Acknowledge(_)) => summary.ack_failed += 1,
            }
        }

        info!(
            received = summary.received,
            acknowledged = summary.acknowledged,
            malformed = summary.malformed,
            forward_failed = summary.forward_failed,
            ack_failed = summary.ack_failed,
            "sqs_batch_complete"
        );

        Ok(summary)
    }
}
