//! Reference counted byte storage shared by buffers
//!
//! Bytes are exposed as `AtomicU8` so that several buffers viewing the same
//! storage can read and write it through shared references, from any thread.
//! Accesses are relaxed; ordering between threads comes from the owning
//! object's lock.

use crate::error::MemoryError;
use crate::memory::{default_memory, Memory};
use crate::{trap, trap_if};
use core::ptr::NonNull;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

enum Storage {
    /// Obtained from a memory backend and returned to it on drop
    Allocated {
        ptr: NonNull<u8>,
        capacity: usize,
        memory: Memory,
    },
    /// Taken over from a caller's vector
    Owned(Box<[AtomicU8]>),
}

// The allocated region is only reached through `AtomicU8` views, and the
// backend handle is itself `Send + Sync`.
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Storage::Allocated { ptr, memory, .. } = self {
            unsafe { memory.deallocate(*ptr) };
        }
    }
}

/// Shared handle to a fixed-capacity byte array
#[derive(Clone)]
pub struct ByteArray {
    storage: Arc<Storage>,
}

impl ByteArray {
    /// Allocate `capacity` zeroed bytes from the default memory backend
    ///
    /// Traps if the backend is out of memory.
    pub fn allocate(capacity: usize) -> Self {
        match Self::allocate_in(&default_memory(), capacity) {
            Ok(array) => array,
            Err(err) => trap!(OutOfMemory, "byte array of {} bytes: {}", capacity, err),
        }
    }

    /// Allocate `capacity` zeroed bytes from `memory`
    pub fn allocate_in(memory: &Memory, capacity: usize) -> Result<Self, MemoryError> {
        if capacity == 0 {
            return Ok(Self::wrap(Vec::new()));
        }
        let ptr = memory.allocate_and_clear(capacity)?;
        Ok(Self {
            storage: Arc::new(Storage::Allocated {
                ptr,
                capacity,
                memory: Arc::clone(memory),
            }),
        })
    }

    /// Take ownership of `bytes` as the array contents
    pub fn wrap(bytes: Vec<u8>) -> Self {
        Self {
            storage: Arc::new(Storage::Owned(bytes.into_iter().map(AtomicU8::new).collect())),
        }
    }

    /// Another handle to the same storage
    #[inline]
    pub fn acquire(&self) -> Self {
        self.clone()
    }

    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.storage, &b.storage)
    }

    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Backend the storage came from, if any
    pub fn memory(&self) -> Option<&Memory> {
        match &*self.storage {
            Storage::Allocated { memory, .. } => Some(memory),
            Storage::Owned(_) => None,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells().len()
    }

    #[inline]
    pub fn cells(&self) -> &[AtomicU8] {
        match &*self.storage {
            Storage::Allocated { ptr, capacity, .. } => unsafe {
                core::slice::from_raw_parts(ptr.as_ptr() as *const AtomicU8, *capacity)
            },
            Storage::Owned(cells) => &cells[..],
        }
    }

    fn check_range(&self, index: usize, length: usize) {
        let capacity = self.capacity();
        trap_if!(
            index > capacity || length > capacity - index,
            OutOfBounds,
            "byte array range {}..{} exceeds capacity {}",
            index,
            index.saturating_add(length),
            capacity
        );
    }

    pub fn get(&self, index: usize) -> u8 {
        self.check_range(index, 1);
        self.cells()[index].load(Ordering::Relaxed)
    }

    pub fn put(&self, index: usize, value: u8) {
        self.check_range(index, 1);
        self.cells()[index].store(value, Ordering::Relaxed);
    }

    pub fn get_bytes(&self, index: usize, dest: &mut [u8]) {
        self.check_range(index, dest.len());
        for (byte, cell) in dest.iter_mut().zip(&self.cells()[index..]) {
            *byte = cell.load(Ordering::Relaxed);
        }
    }

    pub fn put_bytes(&self, index: usize, src: &[u8]) {
        self.check_range(index, src.len());
        for (cell, &byte) in self.cells()[index..].iter().zip(src) {
            cell.store(byte, Ordering::Relaxed);
        }
    }

    /// Copy `length` bytes from `source[source_offset..]` to `self[dest_offset..]`
    ///
    /// The ranges may overlap when both handles share storage.
    pub fn array_copy(&self, dest_offset: usize, source: &ByteArray, source_offset: usize, length: usize) {
        source.check_range(source_offset, length);
        self.check_range(dest_offset, length);

        let mut staged = vec![0u8; length];
        source.get_bytes(source_offset, &mut staged);
        self.put_bytes(dest_offset, &staged);
    }

    /// Copy of the whole array
    pub fn to_vec(&self) -> Vec<u8> {
        self.cells().iter().map(|cell| cell.load(Ordering::Relaxed)).collect()
    }

    /// Independent array with the same contents, from the same backend
    pub fn copy(&self) -> Self {
        let copy = match self.memory() {
            Some(memory) => match Self::allocate_in(memory, self.capacity()) {
                Ok(array) => array,
                Err(err) => trap!(OutOfMemory, "byte array copy of {} bytes: {}", self.capacity(), err),
            },
            None => Self::wrap(vec![0; self.capacity()]),
        };
        copy.array_copy(0, self, 0, self.capacity());
        copy
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteArray")
            .field("capacity", &self.capacity())
            .field("references", &self.reference_count())
            .finish()
    }
}
