//! Poll failure handling: exponential backoff with a circuit breaker.

use std::time::Duration;

use rand::Rng;

use crate::Config;

/// Tuning for [`PollBackoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Consecutive failures that open the circuit
    pub circuit_threshold: u32,
    pub circuit_cooldown: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial: Duration::from_millis(config.poll_backoff_initial_ms),
            max: Duration::from_millis(config.poll_backoff_max_ms),
            circuit_threshold: config.poll_circuit_threshold.max(1),
            circuit_cooldown: Duration::from_secs(config.poll_circuit_cooldown_secs),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            circuit_threshold: 5,
            circuit_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

/// Delay decision after a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    pub delay: Duration,
    pub consecutive_failures: u32,
    pub circuit: CircuitState,
    /// True only on the failure that tripped the breaker
    pub just_opened: bool,
}

/// Tracks consecutive poll failures for one consumer.
#[derive(Debug)]
pub struct PollBackoff {
    policy: BackoffPolicy,
    next_delay: Duration,
    consecutive_failures: u32,
    circuit: CircuitState,
}

impl PollBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            next_delay: policy.initial,
            consecutive_failures: 0,
            circuit: CircuitState::Closed,
        }
    }

    pub fn circuit(&self) -> CircuitState {
        self.circuit
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a failed poll and return how long to wait before the next one.
    ///
    /// Below the threshold the delay doubles up to `max`. Once the threshold is
    /// reached every further failure waits the full cooldown.
    pub fn record_failure(&mut self) -> Retry {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures >= self.policy.circuit_threshold {
            let just_opened = self.circuit == CircuitState::Closed;
            self.circuit = CircuitState::Open;
            return Retry {
                delay: self.policy.circuit_cooldown,
                consecutive_failures: self.consecutive_failures,
                circuit: self.circuit,
                just_opened,
            };
        }

        let delay = self.next_delay;
        self.next_delay = (self.next_delay * 2).min(self.policy.max);

        Retry {
            delay,
            consecutive_failures: self.consecutive_failures,
            circuit: self.circuit,
            just_opened: false,
        }
    }

    /// Record a successful poll. Returns true if this closed an open circuit.
    pub fn record_success(&mut self) -> bool {
        let was_open = self.circuit == CircuitState::Open;
        self.consecutive_failures = 0;
        self.next_delay = self.policy.initial;
        self.circuit = CircuitState::Closed;
        was_open
    }
}

/// Add up to 10% random jitter so many consumers do not retry in lockstep.
pub fn with_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = (delay.as_millis() / 10) as u64;
    if max_jitter_ms == 0 {
        return delay;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}
