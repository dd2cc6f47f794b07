//! Memory backends - the allocation interface every other component uses
//!
//! Design: one object-safe trait with two implementations.
//! 1. `StdlibMemory`: thin pass-through to the platform allocator
//! 2. `SafeMemory`: guard-word instrumented allocator with a live registry,
//!    for debug builds and diagnostics
//!
//! Which one backs `default_memory()` is decided once, from `MemoryConfig`.

mod config;
mod safe;
mod stdlib;


pub use config::MemoryConfig;
pub use safe::{MemoryState, SafeMemory, RECENTLY_FREED_CAPACITY};
pub use stdlib::StdlibMemory;

use crate::error::MemoryError;
use core::ptr::NonNull;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// Size of a pointer; the minimum legal alignment
pub const POINTER_SIZE: usize = core::mem::size_of::<*const u8>();

/// Shared handle to a memory backend
pub type Memory = Arc<dyn MemoryBackend>;

/// Process default backend, chosen from the environment on first use
static DEFAULT_MEMORY: Lazy<Memory> = Lazy::new(|| MemoryConfig::from_env().build());

/// Get the process default memory backend
pub fn default_memory() -> Memory {
    Arc::clone(&DEFAULT_MEMORY)
}

/// Allocation interface
///
/// Pointers returned by one backend must only be handed back to the same
/// backend.
pub trait MemoryBackend: Send + Sync + fmt::Debug {
    /// Human readable backend name, used in logs and reports
    fn name(&self) -> &'static str;

    /// Allocate `size` bytes aligned to `alignment`
    ///
    /// `alignment` must be a power of two no smaller than a pointer and
    /// `size` must be non-zero, otherwise nothing is allocated.
    fn mem_align(&self, alignment: usize, size: usize) -> Result<NonNull<u8>, MemoryError>;

    /// Allocate `size` bytes at pointer alignment
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, MemoryError> {
        self.mem_align(POINTER_SIZE, size)
    }

    /// Allocate `size` zeroed bytes at pointer alignment
    fn allocate_and_clear(&self, size: usize) -> Result<NonNull<u8>, MemoryError> {
        let ptr = self.allocate(size)?;
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Release memory obtained from this backend
    ///
    /// # Safety
    /// `ptr` must have been returned by this backend and not yet released.
    /// Debug backends trap on violations they can detect.
    unsafe fn deallocate(&self, ptr: NonNull<u8>);

    /// Move an allocation to a new block of `new_size` bytes
    ///
    /// The contents up to the smaller of the two sizes are preserved and the
    /// old block is released.
    ///
    /// # Safety
    /// Same contract as `deallocate` for `ptr`.
    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, MemoryError>;

    /// Copy `text` into a fresh NUL terminated allocation
    fn string_duplicate(&self, text: &str) -> Result<NonNull<u8>, MemoryError> {
        let length = text.len();
        let ptr = self.allocate(length + 1)?;
        unsafe {
            core::ptr::copy_nonoverlapping(text.as_ptr(), ptr.as_ptr(), length);
            *ptr.as_ptr().add(length) = 0;
        }
        Ok(ptr)
    }

    /// Number of allocations not yet released
    fn outstanding(&self) -> usize;
}

/// True if `alignment` is a power of two no smaller than a pointer
#[inline]
pub fn is_valid_alignment(alignment: usize) -> bool {
    alignment.is_power_of_two() && alignment >= POINTER_SIZE
}

/// Validate an allocation request shared by every backend
pub(crate) fn validate_request(alignment: usize, size: usize) -> Result<(), MemoryError> {
    if !is_valid_alignment(alignment) {
        return Err(MemoryError::InvalidAlignment(alignment));
    }
    if size == 0 {
        return Err(MemoryError::InvalidSize);
    }
    Ok(())
}

/// Round `value` up to a multiple of the power of two `alignment`
#[inline]
pub(crate) fn round_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    value
        .checked_add(alignment - 1)
        .map(|v| v & !(alignment - 1))
}
