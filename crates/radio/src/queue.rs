//! At-least-once delivery queue between the radio and the backend

use std::collections::VecDeque;
use std::time::Duration;

use log::{info, warn};
use tokio::time::{sleep, timeout};

use sos_relay_core::{MessageId, RelayMessage};

use crate::backend::{Backend, TransportFault};

/// Attempt budget for a single drain cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(3),
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Idle,
    Delivered {
        msg_id: MessageId,
        attempts: u32,
        status: u16,
    },
    /// Every attempt of this cycle failed; the message went to the back.
    Requeued { msg_id: MessageId, attempts: u32 },
}

/// Messages waiting for backend confirmation, oldest first.
///
/// A message leaves only after the backend took it. A failed cycle moves it
/// to the tail with a fresh budget for its next turn, so an unreachable
/// backend grows the queue instead of losing reports.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    messages: VecDeque<RelayMessage>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: RelayMessage) {
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelayMessage> {
        self.messages.iter()
    }

    /// Tries to deliver the head message, at most `policy.max_attempts` times.
    pub async fn drain_one<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        policy: &RetryPolicy,
    ) -> DrainOutcome {
        let Some(message) = self.messages.pop_front() else {
            return DrainOutcome::Idle;
        };
        let msg_id = message.msg_id();
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let result = match timeout(policy.attempt_timeout, backend.post(&message)).await {
                Ok(result) => result,
                Err(_) => Err(TransportFault::Timeout),
            };
            match result {
                Ok(status) => {
                    info!("Sent to backend: {}, msg_id: {}", status, msg_id);
                    return DrainOutcome::Delivered {
                        msg_id,
                        attempts: attempt,
                        status,
                    };
                }
                Err(fault) => {
                    warn!(
                        "Backend error for msg_id {} (attempt {}/{}): {}",
                        msg_id, attempt, max_attempts, fault
                    );
                    sleep(policy.retry_delay).await;
                }
            }
        }

        self.messages.push_back(message);
        warn!(
            "Failed to send msg_id {} after {} attempts, requeued ({} waiting)",
            msg_id,
            max_attempts,
            self.messages.len()
        );
        DrainOutcome::Requeued {
            msg_id,
            attempts: max_attempts,
        }
    }
}
