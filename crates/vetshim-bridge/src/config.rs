//! Bridge configuration

use serde::{Deserialize, Serialize};

/// Default fault buffer capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 50;

/// Listener key that matches every app
pub const WILDCARD: &str = "*";

/// Fault bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Ring buffer capacity
    pub buffer_capacity: usize,
}

impl BridgeConfig {
    /// With buffer capacity
    #[inline]
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
