//! In-process message bus for tests and single-process runs

use super::{BusError, BusResult, Delivery, Event, Message, MessageBus};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Queued {
    delivery_id: i64,
    topic: String,
    message: Message,
    visible_at: Instant,
    attempts: u32,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    queue: Vec<Queued>,
    published: Vec<(String, Message)>,
}

/// Message bus held in memory
///
/// Besides the queue it keeps a log of everything ever published, so tests
/// can inspect fan-out without consuming.
#[derive(Debug)]
pub struct MemoryBus {
    state: Mutex<State>,
    lease: Duration,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl MemoryBus {
    pub fn new(lease: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            lease,
        }
    }

    /// Every message published to `topic`, acked or not, oldest first
    pub fn published(&self, topic: &str) -> Vec<Message> {
        match self.state() {
            Ok(state) => state
                .published
                .iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, m)| m.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Forgets all queued and published messages
    pub fn reset(&self) {
        if let Ok(mut state) = self.state() {
            *state = State::default();
        }
    }

    fn state(&self) -> BusResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| BusError::LockPoisoned)
    }
}

impl MessageBus for MemoryBus {
    fn publish(&self, event: &Event, topic: &str) -> BusResult<Message> {
        let message = Message::new(event.clone());
        let mut state = self.state()?;

        state.next_id += 1;
        let delivery_id = state.next_id;
        state.queue.push(Queued {
            delivery_id,
            topic: topic.to_string(),
            message: message.clone(),
            visible_at: Instant::now(),
            attempts: 0,
        });
        state.published.push((topic.to_string(), message.clone()));

        Ok(message)
    }

    fn receive(&self, topic: &str) -> BusResult<Option<Delivery>> {
        let mut state = self.state()?;
        let now = Instant::now();

        let Some(queued) = state
            .queue
            .iter_mut()
            .find(|q| q.topic == topic && q.visible_at <= now)
        else {
            return Ok(None);
        };

        queued.visible_at = now + self.lease;
        queued.attempts += 1;

        Ok(Some(Delivery {
            delivery_id: queued.delivery_id,
            topic: queued.topic.clone(),
            attempt: queued.attempts,
            message: queued.message.clone(),
        }))
    }

    fn ack(&self, delivery: &Delivery) -> BusResult<()> {
        self.state()?
            .queue
            .retain(|q| q.delivery_id != delivery.delivery_id);
        Ok(())
    }

    fn pending(&self, topic: &str) -> BusResult<u64> {
        Ok(self
            .state()?
            .queue
            .iter()
            .filter(|q| q.topic == topic)
            .count() as u64)
    }
}
