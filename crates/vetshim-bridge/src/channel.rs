//! Message transport between host and sandbox
//!
//! The host end of a [`SandboxChannel`] is whatever carries `postMessage`
//! traffic in the embedding. [`InMemoryChannel::pair`] gives two connected
//! ends for tests and in-process embedding.

use crate::error::{ChannelError, ChannelResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Handle for removing a message handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Callback invoked per inbound message
pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Bidirectional message transport
pub trait SandboxChannel: Send + Sync {
    /// Post a message to the other end
    ///
    /// # Errors
    /// `ChannelError::Closed` once the channel is closed.
    fn send(&self, message: Value) -> ChannelResult<()>;

    /// Register a handler for inbound messages
    fn on_message(&self, handler: MessageHandler) -> HandlerId;

    /// Remove a handler; unknown ids are ignored
    fn off_message(&self, id: HandlerId);
}

#[derive(Default)]
struct Shared {
    closed: AtomicBool,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Inbox {
    handlers: Mutex<Vec<(HandlerId, MessageHandler)>>,
}

impl Inbox {
    fn deliver(&self, message: &Value) {
        // Handlers may register or remove handlers; never call under the lock.
        let handlers: Vec<MessageHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(message);
        }
    }
}

/// One end of an in-process channel
///
/// Delivery is synchronous: `send` returns after every handler on the
/// other end has run.
#[derive(Clone)]
pub struct InMemoryChannel {
    shared: Arc<Shared>,
    inbox: Arc<Inbox>,
    peer: Arc<Inbox>,
}

impl InMemoryChannel {
    /// Two connected ends: `(host, sandbox)`
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let shared = Arc::new(Shared::default());
        let host = Arc::new(Inbox::default());
        let sandbox = Arc::new(Inbox::default());
        (
            Self {
                shared: Arc::clone(&shared),
                inbox: Arc::clone(&host),
                peer: Arc::clone(&sandbox),
            },
            Self {
                shared,
                inbox: sandbox,
                peer: host,
            },
        )
    }

    /// Close both ends
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    /// Check if closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of handlers on this end
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inbox.handlers.lock().len()
    }
}

impl std::fmt::Debug for InMemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChannel")
            .field("closed", &self.is_closed())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl SandboxChannel for InMemoryChannel {
    fn send(&self, message: Value) -> ChannelResult<()> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.peer.deliver(&message);
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) -> HandlerId {
        let id = HandlerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.inbox.handlers.lock().push((id, handler));
        id
    }

    fn off_message(&self, id: HandlerId) {
        self.inbox.handlers.lock().retain(|(hid, _)| *hid != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn messages_cross_to_the_other_end() {
        let (host, sandbox) = InMemoryChannel::pair();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        host.on_message(Arc::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        sandbox.send(json!({ "type": "x" })).unwrap();
        host.send(json!({ "type": "echo" })).unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_message_stops_delivery() {
        let (host, sandbox) = InMemoryChannel::pair();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let id = host.on_message(Arc::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        host.off_message(id);

        sandbox.send(json!({})).unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 0);
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn closed_channel_rejects_sends() {
        let (host, sandbox) = InMemoryChannel::pair();
        host.close();
        assert_eq!(sandbox.send(json!({})), Err(ChannelError::Closed));
    }
}
