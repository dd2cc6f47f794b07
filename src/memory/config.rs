//! Memory backend selection

use super::{Memory, SafeMemory, StdlibMemory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which backend to build and how to instrument it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Use the guard-word instrumented allocator
    pub safe: bool,
    /// Capture a backtrace for every instrumented allocation
    pub capture_backtraces: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            safe: cfg!(debug_assertions),
            capture_backtraces: false,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl MemoryConfig {
    /// Create config from environment variables
    ///
    /// `PARC_SAFE_MEMORY` selects the instrumented allocator and
    /// `PARC_MEMORY_BACKTRACE` turns on backtrace capture.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PARC_SAFE_MEMORY") {
            config.safe = flag(&value);
        }

        if let Ok(value) = std::env::var("PARC_MEMORY_BACKTRACE") {
            config.capture_backtraces = flag(&value);
        }

        config
    }

    /// Build the configured backend
    pub fn build(&self) -> Memory {
        if self.safe {
            Arc::new(SafeMemory::with_config(self))
        } else {
            Arc::new(StdlibMemory::new())
        }
    }
}
