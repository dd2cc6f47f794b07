//! PARC - foundation layer for the ICN forwarder stack
//!
//! This crate provides the reference counted object runtime and the
//! containers built on it, plus the instrumented allocator underneath.
//!
//! Components, leaf to root:
//! - `memory`: allocation backends, including the guard-word checking `SafeMemory`
//! - `object`: `Object<T>` handles with polymorphic operations and per-instance locks
//! - `buffer`: cursor view over shared byte storage
//! - `hash_map`: chained hash table keyed by objects
//! - `red_black`: ordered map driven by caller callbacks

pub mod error;
pub mod logging;
pub mod memory;
pub mod object;
pub mod buffer;
pub mod hash_map;
pub mod red_black;

// Re-export core types
pub use buffer::{Buffer, ByteArray};
pub use error::{MemoryError, ParseError, TrapKind};
pub use hash_map::HashMap;
pub use memory::{default_memory, Memory, MemoryBackend, MemoryConfig, SafeMemory, StdlibMemory};
pub use object::{Object, ObjectInfo, ParcObject, TypeDescriptor, OBJECT};
pub use red_black::{Callbacks, RedBlackTree};

/// Initialize logging from the environment and select the default memory backend
///
/// Safe to call more than once; later calls do nothing.
pub fn init() {
    logging::init();
    let memory = default_memory();
    tracing::info!(backend = memory.name(), "parc initialized");
}
