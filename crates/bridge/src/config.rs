//! Bridge configuration

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

/// Bridge loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Ring buffer capacity in bytes
    pub buffer_capacity: usize,
    /// Largest transfer unit the sink accepts before it needs a terminator.
    /// At most `max_chunk - 1` bytes are sent per iteration.
    pub max_chunk: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 128,
            max_chunk: 64,
        }
    }
}

impl BridgeConfig {
    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.buffer_capacity == 0 {
            return Err(BridgeError::ZeroCapacity);
        }
        if self.max_chunk < 2 {
            return Err(BridgeError::ChunkTooSmall(self.max_chunk));
        }
        Ok(())
    }

    /// Bytes sent per egress phase at most
    pub fn chunk_limit(&self) -> usize {
        self.max_chunk - 1
    }
}
