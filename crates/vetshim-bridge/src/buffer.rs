//! Bounded fault buffer

use crate::protocol::FaultEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO ring buffer of faults
///
/// Push and eviction happen under one lock, so the length never exceeds
/// capacity as seen by any reader.
#[derive(Debug)]
pub struct FaultBuffer {
    capacity: usize,
    events: Mutex<VecDeque<FaultEvent>>,
}

impl FaultBuffer {
    /// Buffer holding at most `capacity` events (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Capacity
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append, evicting the oldest events past capacity
    ///
    /// Returns the number of evicted events.
    pub fn push(&self, event: FaultEvent) -> usize {
        let mut events = self.events.lock();
        events.push_back(event);
        let overflow = events.len().saturating_sub(self.capacity);
        events.drain(..overflow);
        overflow
    }

    /// Events matching `app_id` (all when `None`), oldest first
    #[must_use]
    pub fn snapshot(&self, app_id: Option<&str>) -> Vec<FaultEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.belongs_to(app_id))
            .cloned()
            .collect()
    }

    /// Events matching `app_id` received at or after `since`
    #[must_use]
    pub fn since(&self, app_id: Option<&str>, since: DateTime<Utc>) -> Vec<FaultEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.belongs_to(app_id) && e.timestamp >= since)
            .cloned()
            .collect()
    }

    /// Check for an event matching `app_id` received at or after `since`
    #[must_use]
    pub fn any_since(&self, app_id: Option<&str>, since: DateTime<Utc>) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.belongs_to(app_id) && e.timestamp >= since)
    }

    /// Remove events matching `app_id` (all when `None`)
    ///
    /// Returns the number removed.
    pub fn clear(&self, app_id: Option<&str>) -> usize {
        let mut events = self.events.lock();
        let before = events.len();
        match app_id {
            None => events.clear(),
            Some(_) => events.retain(|e| !e.belongs_to(app_id)),
        }
        before - events.len()
    }

    /// Number of buffered events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FaultKind, FaultPayload};
    use vetshim_types::AppId;

    fn event(app: &str, message: &str) -> FaultEvent {
        FaultEvent::from_payload(
            FaultKind::RuntimeError,
            FaultPayload::new(message),
            Some(AppId::new(app)),
            Utc::now(),
        )
    }

    #[test]
    fn evicts_oldest() {
        let buffer = FaultBuffer::new(3);
        for i in 0..5 {
            buffer.push(event("a", &i.to_string()));
        }
        let messages: Vec<_> = buffer.snapshot(None).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["2", "3", "4"]);
    }

    #[test]
    fn clear_by_app() {
        let buffer = FaultBuffer::new(10);
        buffer.push(event("a", "1"));
        buffer.push(event("b", "2"));
        buffer.push(event("a", "3"));

        assert_eq!(buffer.clear(Some("a")), 2);
        assert_eq!(buffer.snapshot(None).len(), 1);
        assert_eq!(buffer.clear(None), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buffer = FaultBuffer::new(0);
        buffer.push(event("a", "1"));
        buffer.push(event("a", "2"));
        assert_eq!(buffer.len(), 1);
    }
}
