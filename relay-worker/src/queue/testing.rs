//! In-memory [`QueueClient`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{QueueClient, QueueError, ReceiveOptions};
use super::types::QueueRecord;

#[derive(Default)]
struct State {
    batches: VecDeque<Result<Vec<QueueRecord>, String>>,
    receives: Vec<ReceiveOptions>,
    deleted: Vec<String>,
    fail_deletes: bool,
    fail_resolve: bool,
}

/// Scripted queue: each receive pops the next pushed batch, then returns empty.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
}

impl MemoryQueue {
    pub fn push_batch(&self, records: Vec<QueueRecord>) {
        self.state.lock().unwrap().batches.push_back(Ok(records));
    }

    pub fn push_error(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .batches
            .push_back(Err(message.to_string()));
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    pub fn fail_resolve(&self, fail: bool) {
        self.state.lock().unwrap().fail_resolve = fail;
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn receives(&self) -> Vec<ReceiveOptions> {
        self.state.lock().unwrap().receives.clone()
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn resolve(&self, queue_name: &str) -> Result<String, QueueError> {
        if self.state.lock().unwrap().fail_resolve {
            return Err(QueueError::Resolve {
                queue: queue_name.to_string(),
                message: "queue does not exist".to_string(),
            });
        }
        Ok(format!("http://localhost:4566/000000000000/{}", queue_name))
    }

    async fn receive(
        &self,
        _queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<QueueRecord>, QueueError> {
        let mut state = self.state.lock().unwrap();
        state.receives.push(options);
        match state.batches.pop_front() {
            Some(Ok(records)) => Ok(records),
            Some(Err(message)) => Err(QueueError::Receive(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(QueueError::Delete("access denied".to_string()));
        }
        state.deleted.push(receipt_handle.to_string());
        Ok(())
    }
}
