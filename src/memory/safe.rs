//! Guard-word instrumented allocator
//!
//! Every block is laid out as
//!
//! ```text
//! base                      usable                     usable + actual
//! | padding | Prefix ........| requested | fill ........| suffix u32 |
//! ```
//!
//! The prefix abuts the usable region, so a write one byte before the
//! returned pointer lands on the prefix guard word. The fill bytes between the
//! requested and the pointer-rounded length are stamped too, so a write one
//! byte past the requested length is caught even when it misses the suffix.
//!
//! Live blocks are tracked in a registry keyed by usable address. A pointer is
//! only ever dereferenced after the registry confirms it is live.

use super::{is_valid_alignment, round_up, validate_request, MemoryBackend, MemoryConfig, POINTER_SIZE};
use crate::error::MemoryError;
use crate::logging::{log_allocation, log_deallocation, log_guard_violation, log_leak_report, perf};
use crate::trap;
use core::ptr::NonNull;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

const PREFIX_MAGIC: u64 = 0xface_face_face_face;
const PREFIX_GUARD: u64 = 0xdead_dead_dead_dead;
const FREED_GUARD: u64 = 0xbadd_cafe_badd_cafe;
const SUFFIX_GUARD: u32 = 0xcafe_cafe;
const FILL_BYTE: u8 = 0xca;

const PREFIX_SIZE: usize = core::mem::size_of::<Prefix>();
const SUFFIX_SIZE: usize = core::mem::size_of::<u32>();

/// Freed addresses remembered for double-free detection
pub const RECENTLY_FREED_CAPACITY: usize = 1024;

/// Metadata written immediately before the usable region
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct Prefix {
    magic: u64,
    requested_length: usize,
    actual_length: usize,
    alignment: usize,
    guard: u64,
}

/// Outcome of checking a pointer against the registry and its guard words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryState {
    Ok,
    /// The pointer is not one this allocator handed out
    Mismatched,
    /// Memory before the usable region was overwritten
    Underrun,
    /// Memory after the requested length was overwritten
    Overrun,
    /// Nothing is allocated at all
    NothingAllocated,
    /// The block was already released
    AlreadyFree,
}

impl MemoryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryState::Ok => "OK",
            MemoryState::Mismatched => "MISMATCHED",
            MemoryState::Underrun => "UNDERRUN",
            MemoryState::Overrun => "OVERRUN",
            MemoryState::NothingAllocated => "NOTHINGALLOCATED",
            MemoryState::AlreadyFree => "ALREADYFREE",
        }
    }
}

impl fmt::Display for MemoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry for a live block
#[derive(Debug)]
struct AllocationRecord {
    sequence: u64,
    base: usize,
    requested_length: usize,
    actual_length: usize,
    alignment: usize,
    backtrace: Option<Backtrace>,
}

impl AllocationRecord {
    fn prefix_length(&self) -> usize {
        prefix_length(self.alignment)
    }

    fn total_length(&self) -> usize {
        self.prefix_length() + self.actual_length + SUFFIX_SIZE
    }
}

/// Prefix struct size rounded up to the alignment; never overflows for a
/// validated alignment
fn prefix_length(alignment: usize) -> usize {
    (PREFIX_SIZE + alignment - 1) & !(alignment - 1)
}

/// Debug allocator with guard words and a live-allocation registry
///
/// Instances are independent: each has its own registry, and pointers must
/// be released through the instance that produced them.
pub struct SafeMemory {
    live: DashMap<usize, AllocationRecord>,
    recently_freed: DashSet<usize>,
    /// Free order of `recently_freed`, oldest first
    freed_order: Mutex<VecDeque<usize>>,
    lock: Mutex<()>,
    sequence: AtomicU64,
    capture_backtraces: bool,
}

impl fmt::Debug for SafeMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeMemory")
            .field("outstanding", &self.live.len())
            .field("capture_backtraces", &self.capture_backtraces)
            .finish()
    }
}

impl Default for SafeMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeMemory {
    pub fn new() -> Self {
        Self::with_config(&MemoryConfig {
            safe: true,
            capture_backtraces: false,
        })
    }

    pub fn with_config(config: &MemoryConfig) -> Self {
        Self {
            live: DashMap::new(),
            recently_freed: DashSet::new(),
            freed_order: Mutex::new(VecDeque::with_capacity(RECENTLY_FREED_CAPACITY)),
            lock: Mutex::new(()),
            sequence: AtomicU64::new(0),
            capture_backtraces: config.capture_backtraces,
        }
    }

    /// Classify `ptr` without modifying anything
    pub fn check(&self, ptr: *const u8) -> MemoryState {
        let _guard = self.lock.lock();
        self.classify(ptr as usize)
    }

    /// True if `ptr` is a live block with intact guards
    pub fn is_valid(&self, ptr: *const u8) -> bool {
        self.check(ptr) == MemoryState::Ok
    }

    /// Number of freed addresses still remembered, at most
    /// `RECENTLY_FREED_CAPACITY`
    pub fn recently_freed(&self) -> usize {
        self.recently_freed.len()
    }

    /// Caller must hold `self.lock`
    fn remember_freed(&self, address: usize) {
        let mut order = self.freed_order.lock();
        if order.len() == RECENTLY_FREED_CAPACITY {
            if let Some(oldest) = order.pop_front() {
                self.recently_freed.remove(&oldest);
            }
        }
        order.push_back(address);
        self.recently_freed.insert(address);
    }

    /// Caller must hold `self.lock`
    fn forget_freed(&self, address: usize) {
        if self.recently_freed.remove(&address).is_some() {
            self.freed_order.lock().retain(|&freed| freed != address);
        }
    }

    /// Caller must hold `self.lock`
    fn classify(&self, address: usize) -> MemoryState {
        match self.live.get(&address) {
            Some(record) => unsafe { inspect(address as *const u8, &record) },
            None if self.recently_freed.contains(&address) => MemoryState::AlreadyFree,
            None if self.live.is_empty() => MemoryState::NothingAllocated,
            None => MemoryState::Mismatched,
        }
    }

    /// Write one entry per live allocation, oldest first
    ///
    /// Returns the number of entries written.
    pub fn report_allocation(&self, out: &mut dyn Write) -> io::Result<usize> {
        let _timing = perf::track_if_enabled("report_allocation");
        let mut records: Vec<_> = self
            .live
            .iter()
            .map(|entry| (entry.value().sequence, *entry.key()))
            .collect();
        records.sort_unstable();

        let mut written = 0;
        for (index, (_, address)) in records.into_iter().enumerate() {
            let Some(record) = self.live.get(&address) else {
                continue;
            };
            writeln!(
                out,
                "{} SafeMemory@{:#x}: {:#x}={{ .requestedLength={}, .actualLength={}, .alignment={} }}",
                index,
                address,
                record.base,
                record.requested_length,
                record.actual_length,
                record.alignment,
            )?;
            if let Some(backtrace) = &record.backtrace {
                writeln!(out, "{backtrace}")?;
            }
            written += 1;
        }
        Ok(written)
    }

    /// Print the prefix fields and a hex dump of a live block
    pub fn display(&self, ptr: *const u8, out: &mut dyn Write) -> io::Result<()> {
        let _guard = self.lock.lock();
        let address = ptr as usize;
        let state = self.classify(address);

        let Some(record) = self.live.get(&address) else {
            return writeln!(out, "SafeMemory@{address:#x} {state}");
        };

        let prefix = unsafe { read_prefix(ptr) };
        writeln!(
            out,
            "SafeMemory@{:#x} {} {{ .magic={:#x}, .requestedLength={}, .actualLength={}, .alignment={}, .guard={:#x} }}",
            address,
            state,
            prefix.magic,
            prefix.requested_length,
            prefix.actual_length,
            prefix.alignment,
            prefix.guard,
        )?;

        let bytes = unsafe { core::slice::from_raw_parts(ptr, record.requested_length) };
        for (row, chunk) in bytes.chunks(16).enumerate() {
            write!(out, "{:#010x}:", row * 16)?;
            for byte in chunk {
                write!(out, " {byte:02x}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Read the prefix of a block
///
/// # Safety
/// `usable` must be the usable address of a live block.
unsafe fn read_prefix(usable: *const u8) -> Prefix {
    (usable.sub(PREFIX_SIZE) as *const Prefix).read_unaligned()
}

/// Check the guards of a block the registry knows to be live
///
/// # Safety
/// `usable` must be the key `record` is registered under.
unsafe fn inspect(usable: *const u8, record: &AllocationRecord) -> MemoryState {
    let prefix = read_prefix(usable);

    if prefix.guard == FREED_GUARD {
        return MemoryState::AlreadyFree;
    }
    if prefix.guard != PREFIX_GUARD
        || prefix.magic != PREFIX_MAGIC
        || !is_valid_alignment(prefix.alignment)
        || prefix.alignment != record.alignment
        || prefix.requested_length != record.requested_length
        || prefix.actual_length != record.actual_length
    {
        return MemoryState::Underrun;
    }

    let fill = core::slice::from_raw_parts(
        usable.add(record.requested_length),
        record.actual_length - record.requested_length,
    );
    if fill.iter().any(|&b| b != FILL_BYTE) {
        return MemoryState::Overrun;
    }

    let suffix = (usable.add(record.actual_length) as *const u32).read_unaligned();
    if suffix != SUFFIX_GUARD {
        return MemoryState::Overrun;
    }

    MemoryState::Ok
}

impl MemoryBackend for SafeMemory {
    fn name(&self) -> &'static str {
        "SafeMemory"
    }

    fn mem_align(&self, alignment: usize, size: usize) -> Result<NonNull<u8>, MemoryError> {
        validate_request(alignment, size)?;

        let actual_length = round_up(size, POINTER_SIZE).ok_or(MemoryError::Overflow)?;
        let prefix_len = prefix_length(alignment);
        let total = prefix_len
            .checked_add(actual_length)
            .and_then(|n| n.checked_add(SUFFIX_SIZE))
            .ok_or(MemoryError::Overflow)?;

        let backtrace = self.capture_backtraces.then(Backtrace::force_capture);

        let _guard = self.lock.lock();

        let mut raw: *mut libc::c_void = core::ptr::null_mut();
        let status = unsafe { libc::posix_memalign(&mut raw, alignment, total) };
        if status != 0 || raw.is_null() {
            return Err(MemoryError::OutOfMemory(size));
        }

        let base = raw as *mut u8;
        let usable = unsafe {
            let usable = base.add(prefix_len);
            (usable.sub(PREFIX_SIZE) as *mut Prefix).write_unaligned(Prefix {
                magic: PREFIX_MAGIC,
                requested_length: size,
                actual_length,
                alignment,
                guard: PREFIX_GUARD,
            });
            core::ptr::write_bytes(usable.add(size), FILL_BYTE, actual_length - size);
            (usable.add(actual_length) as *mut u32).write_unaligned(SUFFIX_GUARD);
            usable
        };

        let address = usable as usize;
        self.forget_freed(address);
        self.live.insert(
            address,
            AllocationRecord {
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                base: base as usize,
                requested_length: size,
                actual_length,
                alignment,
                backtrace,
            },
        );

        log_allocation(self.name(), size, alignment, usable);
        NonNull::new(usable).ok_or(MemoryError::OutOfMemory(size))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        let guard = self.lock.lock();
        let address = ptr.as_ptr() as usize;

        let state = self.classify(address);
        if state != MemoryState::Ok {
            drop(guard);
            log_guard_violation(state.as_str(), ptr.as_ptr());
            trap!(CorruptMemory, "SafeMemory deallocate {:p}: {}", ptr.as_ptr(), state);
        }

        let Some((_, record)) = self.live.remove(&address) else {
            drop(guard);
            trap!(InvalidState, "SafeMemory deallocate {:p}: registry changed", ptr.as_ptr());
        };

        let base = record.base as *mut u8;
        core::ptr::write_bytes(base, 0, record.total_length());
        let prefix = ptr.as_ptr().sub(PREFIX_SIZE) as *mut Prefix;
        core::ptr::addr_of_mut!((*prefix).guard).write_unaligned(FREED_GUARD);
        libc::free(base as *mut libc::c_void);

        self.remember_freed(address);
        drop(guard);

        log_deallocation(self.name(), ptr.as_ptr());
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, MemoryError> {
        let (alignment, requested_length) = {
            let _guard = self.lock.lock();
            let address = ptr.as_ptr() as usize;
            let state = self.classify(address);
            if state != MemoryState::Ok {
                drop(_guard);
                log_guard_violation(state.as_str(), ptr.as_ptr());
                trap!(CorruptMemory, "SafeMemory reallocate {:p}: {}", ptr.as_ptr(), state);
            }
            match self.live.get(&address) {
                Some(record) => (record.alignment, record.requested_length),
                None => trap!(InvalidState, "SafeMemory reallocate {:p}: registry changed", ptr.as_ptr()),
            }
        };

        let new_ptr = self.mem_align(alignment, new_size)?;
        core::ptr::copy_nonoverlapping(
            ptr.as_ptr(),
            new_ptr.as_ptr(),
            requested_length.min(new_size),
        );
        self.deallocate(ptr);
        Ok(new_ptr)
    }

    fn outstanding(&self) -> usize {
        self.live.len()
    }
}

impl Drop for SafeMemory {
    fn drop(&mut self) {
        let outstanding = self.live.len();
        if outstanding > 0 {
            let mut report = Vec::new();
            let _ = self.report_allocation(&mut report);
            log_leak_report(outstanding, &String::from_utf8_lossy(&report));
        }
    }
}
