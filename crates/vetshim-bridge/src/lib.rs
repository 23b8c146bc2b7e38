//! vetshim Bridge
//!
//! Fault telemetry from sandboxed apps back to their host.
//!
//! # Overview
//!
//! - **SandboxMessage**: wire protocol posted by the in-sandbox reporter
//! - **FaultBridge**: validates, classifies, buffers and forwards faults
//! - **FaultBuffer**: bounded FIFO ring (capacity 50 by default)
//! - **SandboxChannel**: transport trait, with an in-memory pair
//! - **reporter_script**: the JavaScript half installed in every payload
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use vetshim_bridge::{BridgeConfig, FaultBridge, InMemoryChannel, SandboxChannel};
//!
//! let (host, sandbox) = InMemoryChannel::pair();
//! let bridge = Arc::new(FaultBridge::new(Arc::new(host), BridgeConfig::default()));
//! bridge.start();
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! bridge.subscribe("app-1", move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! sandbox
//!     .send(serde_json::json!({
//!         "type": "runtime_error",
//!         "data": { "message": "TypeError: rows.map is not a function" },
//!         "appId": "app-1"
//!     }))
//!     .unwrap();
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! assert_eq!(bridge.buffered_errors(Some("app-1")).len(), 1);
//! ```

#![warn(missing_docs)]

pub mod bridge;
pub mod buffer;
pub mod channel;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod reporter;

// Re-exports
pub use bridge::{BridgeState, FaultBridge, FaultListener, SubscriptionId};
pub use buffer::FaultBuffer;
pub use channel::{HandlerId, InMemoryChannel, MessageHandler, SandboxChannel};
pub use classifier::{
    Classification, ClassifierRule, FaultClassifier, PatternClassifier, DEFAULT_CLASSIFIER_RULES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BridgeConfig, DEFAULT_BUFFER_CAPACITY, WILDCARD};
pub use error::{ChannelError, ChannelResult};
pub use protocol::{FaultEvent, FaultKind, FaultPayload, MessageKind, SandboxMessage};
pub use reporter::{reporter_script, REPORT_FUNCTION};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for fault bridging
    pub use crate::{
        BridgeConfig, Clock, FaultBridge, FaultClassifier, FaultEvent, InMemoryChannel,
        SandboxChannel,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
