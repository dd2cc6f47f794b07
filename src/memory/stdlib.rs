//! Platform allocator backend

use super::{validate_request, MemoryBackend};
use crate::error::MemoryError;
use crate::logging::{log_allocation, log_deallocation};
use core::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pass-through to `posix_memalign`/`realloc`/`free`, counting live blocks
#[derive(Debug, Default)]
pub struct StdlibMemory {
    outstanding: AtomicUsize,
}

impl StdlibMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryBackend for StdlibMemory {
    fn name(&self) -> &'static str {
        "StdlibMemory"
    }

    fn mem_align(&self, alignment: usize, size: usize) -> Result<NonNull<u8>, MemoryError> {
        validate_request(alignment, size)?;

        let mut raw: *mut libc::c_void = core::ptr::null_mut();
        let status = unsafe { libc::posix_memalign(&mut raw, alignment, size) };
        if status != 0 {
            return Err(MemoryError::OutOfMemory(size));
        }
        let ptr = NonNull::new(raw as *mut u8).ok_or(MemoryError::OutOfMemory(size))?;

        self.outstanding.fetch_add(1, Ordering::Relaxed);
        log_allocation(self.name(), size, alignment, ptr.as_ptr());
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        libc::free(ptr.as_ptr() as *mut libc::c_void);
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        log_deallocation(self.name(), ptr.as_ptr());
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, MemoryError> {
        if new_size == 0 {
            return Err(MemoryError::InvalidSize);
        }
        let raw = libc::realloc(ptr.as_ptr() as *mut libc::c_void, new_size);
        NonNull::new(raw as *mut u8).ok_or(MemoryError::OutOfMemory(new_size))
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }
}
