//! Host-side fault bridge
//!
//! Receives fault reports from the sandbox channel, buffers them, and
//! forwards actionable ones to per-app listeners.
//!
//! # Lifecycle
//!
//! `Idle → Monitoring → Idle`. [`FaultBridge::start`] registers the bridge
//! as a handler on the channel; [`FaultBridge::stop`] removes it. Both are
//! idempotent, and stopping only affects messages not yet delivered.

use crate::buffer::FaultBuffer;
use crate::channel::{HandlerId, MessageHandler, SandboxChannel};
use crate::classifier::{FaultClassifier, PatternClassifier};
use crate::clock::{Clock, SystemClock};
use crate::config::{BridgeConfig, WILDCARD};
use crate::protocol::{FaultEvent, SandboxMessage};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vetshim_types::AppId;

/// Callback for forwarded faults
pub type FaultListener = Arc<dyn Fn(&FaultEvent) + Send + Sync>;

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Bridge lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Not attached to the channel
    Idle,
    /// Attached through the given handler
    Monitoring(HandlerId),
}

/// Fault bridge between a sandbox channel and host listeners
pub struct FaultBridge {
    channel: Arc<dyn SandboxChannel>,
    classifier: Arc<dyn FaultClassifier>,
    clock: Arc<dyn Clock>,
    buffer: FaultBuffer,
    listeners: DashMap<String, Vec<(SubscriptionId, FaultListener)>>,
    subscriptions: DashMap<SubscriptionId, String>,
    ready: DashMap<AppId, DateTime<Utc>>,
    state: Mutex<BridgeState>,
    next_subscription: AtomicU64,
}

impl FaultBridge {
    /// Bridge over a channel with the default classifier and wall clock
    #[must_use]
    pub fn new(channel: Arc<dyn SandboxChannel>, config: BridgeConfig) -> Self {
        Self {
            channel,
            classifier: Arc::new(PatternClassifier::new()),
            clock: Arc::new(SystemClock),
            buffer: FaultBuffer::new(config.buffer_capacity),
            listeners: DashMap::new(),
            subscriptions: DashMap::new(),
            ready: DashMap::new(),
            state: Mutex::new(BridgeState::Idle),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// With classifier
    #[inline]
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn FaultClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// With clock
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach to the channel
    ///
    /// The channel handler holds only a weak reference, so a dropped bridge
    /// never keeps receiving.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if matches!(*state, BridgeState::Monitoring(_)) {
            return;
        }

        let weak = Arc::downgrade(self);
        let handler: MessageHandler = Arc::new(move |value: &Value| {
            if let Some(bridge) = weak.upgrade() {
                bridge.handle_message(value);
            }
        });
        let id = self.channel.on_message(handler);
        *state = BridgeState::Monitoring(id);
        tracing::info!("Fault bridge monitoring sandbox channel");
    }

    /// Detach from the channel
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let BridgeState::Monitoring(id) = *state {
            self.channel.off_message(id);
            *state = BridgeState::Idle;
            tracing::info!("Fault bridge stopped");
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    /// Check if attached to the channel
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        matches!(self.state(), BridgeState::Monitoring(_))
    }

    /// Process one inbound message
    ///
    /// Malformed messages are dropped without surfacing anything.
    pub fn handle_message(&self, value: &Value) {
        let Some(message) = SandboxMessage::parse(value) else {
            tracing::debug!("Dropping malformed sandbox message");
            return;
        };

        let Some(kind) = message.kind.fault_kind() else {
            match message.app_id {
                Some(app_id) => {
                    tracing::debug!("Error reporter ready for {}", app_id);
                    self.ready.insert(app_id, self.clock.now());
                }
                None => tracing::debug!("Ignoring reporter-ready message without app id"),
            }
            return;
        };
        let Some(payload) = message.data else {
            return;
        };

        let mut event = FaultEvent::from_payload(kind, payload, message.app_id, self.clock.now());
        let verdict = self.classifier.classify(&event);
        event.category = verdict.category;

        let evicted = self.buffer.push(event.clone());
        if evicted > 0 {
            tracing::debug!("Fault buffer full, evicted {} event(s)", evicted);
        }

        if verdict.has_actionable_error {
            self.dispatch(&event);
        }
    }

    fn dispatch(&self, event: &FaultEvent) {
        let mut targets: Vec<FaultListener> = Vec::new();
        let mut collect = |key: &str| {
            if let Some(entry) = self.listeners.get(key) {
                targets.extend(entry.iter().map(|(_, l)| Arc::clone(l)));
            }
        };
        if let Some(app_id) = &event.app_id {
            if app_id.as_str() != WILDCARD {
                collect(app_id.as_str());
            }
        }
        collect(WILDCARD);

        // Listeners run outside the map guards so they may subscribe or unsubscribe.
        for listener in targets {
            listener(event);
        }
    }

    /// Register a listener for an app id, or `"*"` for every app
    pub fn subscribe<F>(&self, app_id: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&FaultEvent) + Send + Sync + 'static,
    {
        let key = app_id.into();
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        self.subscriptions.insert(id, key);
        id
    }

    /// Remove a listener
    ///
    /// Returns `false` for unknown or already removed ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some((_, key)) = self.subscriptions.remove(&id) else {
            return false;
        };
        if let Some(mut entry) = self.listeners.get_mut(&key) {
            entry.retain(|(sid, _)| *sid != id);
        }
        self.listeners.remove_if(&key, |_, v| v.is_empty());
        true
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Buffered events for an app (all when `None`), oldest first
    #[must_use]
    pub fn buffered_errors(&self, app_id: Option<&str>) -> Vec<FaultEvent> {
        self.buffer.snapshot(app_id)
    }

    /// Drop buffered events for an app (all when `None`)
    ///
    /// Returns the number removed.
    pub fn clear_buffer(&self, app_id: Option<&str>) -> usize {
        self.buffer.clear(app_id)
    }

    /// Events received within `window` of now
    #[must_use]
    pub fn recent_errors(&self, app_id: Option<&str>, window: Duration) -> Vec<FaultEvent> {
        self.buffer.since(app_id, self.window_start(window))
    }

    /// Check for events received within `window` of now
    #[must_use]
    pub fn has_recent_errors(&self, app_id: Option<&str>, window: Duration) -> bool {
        self.buffer.any_since(app_id, self.window_start(window))
    }

    /// Start of a lookback window, saturating at the representable range
    fn window_start(&self, window: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        now.checked_sub_signed(window).unwrap_or(if window < Duration::zero() {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
    }

    /// Check if the app's reporter announced itself
    #[must_use]
    pub fn is_reporter_ready(&self, app_id: &str) -> bool {
        self.ready.contains_key(app_id)
    }

    /// Buffer capacity
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl Drop for FaultBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FaultBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultBridge")
            .field("state", &self.state())
            .field("buffered", &self.buffer.len())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn bridge() -> (Arc<FaultBridge>, InMemoryChannel, InMemoryChannel) {
        let (host, sandbox) = InMemoryChannel::pair();
        let bridge = Arc::new(FaultBridge::new(
            Arc::new(host.clone()),
            BridgeConfig::default(),
        ));
        (bridge, host, sandbox)
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (bridge, host, _sandbox) = bridge();
        assert_eq!(bridge.state(), BridgeState::Idle);

        bridge.start();
        bridge.start();
        assert!(bridge.is_monitoring());
        assert_eq!(host.handler_count(), 1);

        bridge.stop();
        bridge.stop();
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn messages_after_stop_are_ignored() {
        let (bridge, _host, sandbox) = bridge();
        bridge.start();
        sandbox
            .send(json!({ "type": "runtime_error", "data": { "message": "one" } }))
            .unwrap();
        bridge.stop();
        sandbox
            .send(json!({ "type": "runtime_error", "data": { "message": "two" } }))
            .unwrap();

        assert_eq!(bridge.buffered_errors(None).len(), 1);
    }

    #[test]
    fn reporter_ready_is_tracked_not_buffered() {
        let (bridge, _host, sandbox) = bridge();
        bridge.start();
        sandbox.send(SandboxMessage::ready("app-1").to_value()).unwrap();

        assert!(bridge.is_reporter_ready("app-1"));
        assert!(!bridge.is_reporter_ready("app-2"));
        assert!(bridge.buffered_errors(None).is_empty());
    }

    #[test]
    fn events_are_enriched_with_category() {
        let (bridge, _host, _sandbox) = bridge();
        bridge.handle_message(&json!({
            "type": "runtime_error",
            "data": { "message": "ReferenceError: x is not defined" },
            "appId": "a"
        }));
        let events = bridge.buffered_errors(Some("a"));
        assert_eq!(events[0].category.as_deref(), Some("reference_error"));
    }

    #[test]
    fn dropped_bridge_detaches() {
        let (bridge, host, _sandbox) = bridge();
        bridge.start();
        drop(bridge);
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn recency_uses_injected_clock() {
        let (host, _sandbox) = InMemoryChannel::pair();
        let clock = Arc::new(ManualClock::default());
        let bridge = FaultBridge::new(Arc::new(host), BridgeConfig::default())
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

        bridge.handle_message(&json!({ "type": "console_error", "data": { "message": "x" } }));
        assert!(bridge.has_recent_errors(None, Duration::seconds(5)));

        clock.advance(Duration::seconds(10));
        assert!(!bridge.has_recent_errors(None, Duration::seconds(5)));
        assert_eq!(bridge.recent_errors(None, Duration::seconds(15)).len(), 1);
    }

    #[test]
    fn unbounded_windows_saturate() {
        let (host, _sandbox) = InMemoryChannel::pair();
        let clock = Arc::new(ManualClock::default());
        let bridge = FaultBridge::new(Arc::new(host), BridgeConfig::default())
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

        bridge.handle_message(&json!({ "type": "runtime_error", "data": { "message": "x" } }));
        clock.advance(Duration::days(365));

        assert!(bridge.has_recent_errors(None, Duration::milliseconds(i64::MAX)));
        assert_eq!(bridge.recent_errors(None, Duration::MAX).len(), 1);
        assert!(!bridge.has_recent_errors(None, Duration::MIN));
    }
}
