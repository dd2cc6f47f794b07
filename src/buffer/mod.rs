//! Buffer - cursor view over shared byte storage
//!
//! Design: NIO-style state machine over (position, limit, mark, capacity)
//! with the invariant
//!
//! ```text
//! 0 <= mark <= position <= limit <= capacity
//! array_offset + capacity <= backing array capacity
//! ```
//!
//! The cursor lives in atomics and the array handle behind a `RwLock`, so
//! every handle acquired from the same `Object<Buffer>` sees and moves the
//! same cursor, on any thread. Single accessors are race free; sequences of
//! operations from several threads go through the object lock. Multi-byte
//! integers are big-endian. Every bounds violation traps; nothing is silently
//! truncated.

mod byte_array;


pub use byte_array::ByteArray;

use crate::error::{MemoryError, ParseError};
use crate::logging::{log_buffer_resize, perf};
use crate::memory::{default_memory, Memory};
use crate::object::{hash_bytes, print_indented, Object, ObjectInfo, ParcObject, TypeDescriptor, OBJECT};
use crate::{trap, trap_if};
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering as AtomicOrdering};

static BUFFER: TypeDescriptor = TypeDescriptor::extend::<Buffer>(&OBJECT, "Buffer", true);

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Stored in `Buffer::mark` when no mark is set
const NO_MARK: usize = usize::MAX;

/// How `Buffer::resize` places the new limit
///
/// A limit that tracked the old capacity keeps tracking the new one;
/// any other limit is kept, clamped to the new capacity when shrinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeCase {
    Growing,
    GrowingAtLimit,
    Shrinking,
    ShrinkingAtLimit,
}

impl ResizeCase {
    pub fn classify(old_capacity: usize, old_limit: usize, new_capacity: usize) -> Self {
        let limit_at_capacity = old_limit == old_capacity;
        match (new_capacity > old_capacity, limit_at_capacity) {
            (true, false) => ResizeCase::Growing,
            (true, true) => ResizeCase::GrowingAtLimit,
            (false, false) => ResizeCase::Shrinking,
            (false, true) => ResizeCase::ShrinkingAtLimit,
        }
    }

    pub fn new_limit(self, old_limit: usize, new_capacity: usize) -> usize {
        match self {
            ResizeCase::Growing => old_limit,
            ResizeCase::GrowingAtLimit | ResizeCase::ShrinkingAtLimit => new_capacity,
            ResizeCase::Shrinking => old_limit.min(new_capacity),
        }
    }
}

/// Cursor over a window of a `ByteArray`
pub struct Buffer {
    array: RwLock<ByteArray>,
    array_offset: AtomicUsize,
    capacity: AtomicUsize,
    position: AtomicUsize,
    limit: AtomicUsize,
    mark: AtomicUsize,
}

impl Buffer {
    fn with_array(array: ByteArray, array_offset: usize, position: usize, limit: usize, capacity: usize) -> Self {
        Self {
            array: RwLock::new(array),
            array_offset: AtomicUsize::new(array_offset),
            capacity: AtomicUsize::new(capacity),
            position: AtomicUsize::new(position),
            limit: AtomicUsize::new(limit),
            mark: AtomicUsize::new(NO_MARK),
        }
    }

    /// Read access to the backing array; nested reads on one thread are fine
    #[inline]
    fn storage(&self) -> RwLockReadGuard<'_, ByteArray> {
        self.array.read_recursive()
    }

    #[inline]
    fn set_mark_slot(&self, mark: Option<usize>) {
        self.mark.store(mark.unwrap_or(NO_MARK), AtomicOrdering::Relaxed);
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Buffer over `capacity` fresh zeroed bytes, position 0, limit at capacity
    pub fn allocate(capacity: usize) -> Object<Buffer> {
        let array = ByteArray::allocate(capacity);
        Object::new(Self::with_array(array, 0, 0, capacity, capacity))
    }

    /// `allocate` drawing the storage from `memory`
    pub fn try_allocate_in(memory: &Memory, capacity: usize) -> Result<Object<Buffer>, MemoryError> {
        let array = ByteArray::allocate_in(memory, capacity)?;
        Ok(Object::new(Self::with_array(array, 0, 0, capacity, capacity)))
    }

    /// Buffer owning `bytes`, with the given cursor
    ///
    /// Traps if `limit` exceeds the length or `position` exceeds `limit`.
    pub fn wrap(bytes: Vec<u8>, position: usize, limit: usize) -> Object<Buffer> {
        let length = bytes.len();
        match Self::wrap_byte_array(&ByteArray::wrap(bytes), position, limit) {
            Some(buffer) => buffer,
            None => trap!(OutOfBounds, "wrap limit {} exceeds array length {}", limit, length),
        }
    }

    /// Buffer sharing `array`; `None` if `limit` exceeds its capacity
    pub fn wrap_byte_array(array: &ByteArray, position: usize, limit: usize) -> Option<Object<Buffer>> {
        if limit > array.capacity() {
            return None;
        }
        trap_if!(
            position > limit,
            OutOfBounds,
            "wrap position {} exceeds limit {}",
            position,
            limit
        );
        Some(Object::new(Self::with_array(
            array.acquire(),
            0,
            position,
            limit,
            array.capacity(),
        )))
    }

    /// Readable buffer holding a copy of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Object<Buffer> {
        let buffer = Self::allocate(bytes.len());
        buffer.put_array(bytes).flip();
        buffer
    }

    /// Readable buffer over the bytes of `text`, without a terminator
    pub fn wrap_str(text: &str) -> Object<Buffer> {
        let length = text.len();
        Self::wrap(text.as_bytes().to_vec(), 0, length)
    }

    /// Readable buffer over `text` followed by a NUL byte beyond the limit
    pub fn allocate_cstring(text: &str) -> Object<Buffer> {
        let buffer = Self::allocate(text.len() + 1);
        buffer.put_array(text.as_bytes()).put_u8(0);
        buffer.set_position(buffer.position() - 1).flip();
        buffer
    }

    /// Readable buffer decoded from pairs of hex digits
    ///
    /// `None` if the length is odd or a character is not a hex digit.
    pub fn from_hex_string(hex: &str) -> Option<Object<Buffer>> {
        let digits = hex.as_bytes();
        if digits.len() % 2 == 1 {
            return None;
        }
        let buffer = Self::allocate(digits.len() / 2);
        for pair in digits.chunks(2) {
            let high = (pair[0] as char).to_digit(16)?;
            let low = (pair[1] as char).to_digit(16)?;
            buffer.put_u8((high << 4 | low) as u8);
        }
        buffer.flip();
        Some(buffer)
    }

    // ========================================================================
    // Cursor state
    // ========================================================================

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.load(AtomicOrdering::Relaxed)
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position.load(AtomicOrdering::Relaxed)
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit.load(AtomicOrdering::Relaxed)
    }

    /// The mark, if set
    #[inline]
    pub fn marked(&self) -> Option<usize> {
        let mark = self.mark.load(AtomicOrdering::Relaxed);
        (mark != NO_MARK).then_some(mark)
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit() - self.position()
    }

    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    #[inline]
    pub fn array_offset(&self) -> usize {
        self.array_offset.load(AtomicOrdering::Relaxed)
    }

    /// Another handle to the backing array
    pub fn array(&self) -> ByteArray {
        self.storage().acquire()
    }

    /// Check the cursor invariant and the window against the array
    pub fn is_valid(&self) -> bool {
        let mark_ok = self.marked().map_or(true, |mark| mark <= self.position());
        mark_ok
            && self.position() <= self.limit()
            && self.limit() <= self.capacity()
            && self.array_offset() + self.capacity() <= self.storage().capacity()
    }

    #[inline]
    fn assert_invariants(&self) {
        debug_assert!(self.is_valid(), "buffer invariant violated: {self:?}");
    }

    /// Move the position; a mark beyond it is discarded
    pub fn set_position(&self, new_position: usize) -> &Self {
        trap_if!(
            new_position > self.limit(),
            OutOfBounds,
            "position {} exceeds limit {}",
            new_position,
            self.limit()
        );
        self.position.store(new_position, AtomicOrdering::Relaxed);
        if self.marked().map_or(false, |mark| mark > new_position) {
            self.set_mark_slot(None);
        }
        self.assert_invariants();
        self
    }

    /// Move the limit; the position and mark are pulled back below it
    pub fn set_limit(&self, new_limit: usize) -> &Self {
        trap_if!(
            new_limit > self.capacity(),
            OutOfBounds,
            "limit {} exceeds capacity {}",
            new_limit,
            self.capacity()
        );
        if self.position() > new_limit {
            self.position.store(new_limit, AtomicOrdering::Relaxed);
        }
        if self.marked().map_or(false, |mark| mark > new_limit) {
            self.set_mark_slot(None);
        }
        self.limit.store(new_limit, AtomicOrdering::Relaxed);
        self.assert_invariants();
        self
    }

    /// Set the mark at the position
    pub fn mark(&self) -> &Self {
        self.set_mark_slot(Some(self.position()));
        self
    }

    /// Return to the mark; traps if no mark is set
    pub fn reset(&self) -> &Self {
        match self.marked() {
            Some(mark) => self.position.store(mark, AtomicOrdering::Relaxed),
            None => trap!(InvalidState, "reset of a buffer with no mark"),
        }
        self
    }

    /// Switch from writing to reading: limit at position, position at 0
    pub fn flip(&self) -> &Self {
        self.limit.store(self.position(), AtomicOrdering::Relaxed);
        self.position.store(0, AtomicOrdering::Relaxed);
        self.set_mark_slot(None);
        self
    }

    /// Position 0, limit at capacity, mark discarded
    pub fn clear(&self) -> &Self {
        self.position.store(0, AtomicOrdering::Relaxed);
        self.limit.store(self.capacity(), AtomicOrdering::Relaxed);
        self.set_mark_slot(None);
        self
    }

    /// Position 0, mark discarded
    pub fn rewind(&self) -> &Self {
        self.position.store(0, AtomicOrdering::Relaxed);
        self.set_mark_slot(None);
        self
    }

    // ========================================================================
    // Derived buffers
    // ========================================================================

    /// New buffer over `[position, limit)` of the same array
    pub fn slice(&self) -> Object<Buffer> {
        let remaining = self.remaining();
        Object::new(Self::with_array(
            self.array(),
            self.array_offset() + self.position(),
            0,
            remaining,
            remaining,
        ))
    }

    /// New buffer over the same array with the same cursor
    pub fn duplicate(&self) -> Object<Buffer> {
        let duplicate = Self::with_array(
            self.array(),
            self.array_offset(),
            self.position(),
            self.limit(),
            self.capacity(),
        );
        duplicate.set_mark_slot(self.marked());
        Object::new(duplicate)
    }

    fn deep_copy(&self) -> Buffer {
        let copy = Self::with_array(
            self.storage().copy(),
            self.array_offset(),
            self.position(),
            self.limit(),
            self.capacity(),
        );
        copy.set_mark_slot(self.marked());
        copy
    }

    /// Move the contents to a new array of `new_capacity` bytes
    ///
    /// Bytes up to the smaller capacity are kept and the window restarts at
    /// offset 0. The limit follows `ResizeCase`; a mark past the new limit is
    /// discarded and the position is clamped to the new limit.
    pub fn resize(&self, new_capacity: usize) -> &Self {
        let _timing = perf::track_if_enabled("buffer_resize");
        let old_capacity = self.capacity();

        let new_array = {
            let array = self.storage();
            let memory = array.memory().cloned().unwrap_or_else(default_memory);
            let new_array = match ByteArray::allocate_in(&memory, new_capacity) {
                Ok(new_array) => new_array,
                Err(err) => trap!(OutOfMemory, "resize to {} bytes: {}", new_capacity, err),
            };
            new_array.array_copy(0, &array, self.array_offset(), old_capacity.min(new_capacity));
            new_array
        };

        let case = ResizeCase::classify(old_capacity, self.limit(), new_capacity);
        let new_limit = case.new_limit(self.limit(), new_capacity);
        let new_mark = self
            .marked()
            .filter(|&mark| mark <= new_capacity && mark <= new_limit);

        *self.array.write() = new_array;
        self.array_offset.store(0, AtomicOrdering::Relaxed);
        self.capacity.store(new_capacity, AtomicOrdering::Relaxed);
        self.limit.store(new_limit, AtomicOrdering::Relaxed);
        self.set_mark_slot(new_mark);
        self.position.store(self.position().min(new_limit), AtomicOrdering::Relaxed);

        log_buffer_resize(old_capacity, new_capacity);
        self.assert_invariants();
        self
    }

    // ========================================================================
    // Reading
    // ========================================================================

    #[inline]
    fn effective_index(&self, index: usize) -> usize {
        self.array_offset() + index
    }

    #[inline]
    fn check_remaining(&self, required: usize, operation: &str) {
        trap_if!(
            self.remaining() < required,
            OutOfBounds,
            "{} needs {} bytes but {} remain (position {}, limit {})",
            operation,
            required,
            self.remaining(),
            self.position(),
            self.limit()
        );
    }

    #[inline]
    fn check_index(&self, index: usize) {
        trap_if!(
            index >= self.limit(),
            OutOfBounds,
            "index {} is not below limit {}",
            index,
            self.limit()
        );
    }

    /// Run `f` over the remaining bytes without moving the cursor
    fn with_remaining<R>(&self, f: impl FnOnce(&[AtomicU8]) -> R) -> R {
        let array = self.storage();
        let start = self.effective_index(self.position());
        f(&array.cells()[start..start + self.remaining()])
    }

    /// Copy of the remaining bytes; the cursor does not move
    pub fn remaining_bytes(&self) -> Vec<u8> {
        self.with_remaining(|cells| cells.iter().map(|cell| cell.load(AtomicOrdering::Relaxed)).collect())
    }

    /// Borrow `length` bytes at the position and advance past them
    ///
    /// `resize` blocks until the returned guard is dropped.
    pub fn overlay(&self, length: usize) -> MappedRwLockReadGuard<'_, [AtomicU8]> {
        self.check_remaining(length, "overlay");
        let start = self.effective_index(self.position());
        self.position.store(self.position() + length, AtomicOrdering::Relaxed);
        RwLockReadGuard::map(self.storage(), |array| &array.cells()[start..start + length])
    }

    pub fn get_u8(&self) -> u8 {
        self.check_remaining(1, "get_u8");
        let value = self.storage().get(self.effective_index(self.position()));
        self.position.store(self.position() + 1, AtomicOrdering::Relaxed);
        value
    }

    /// Fill `dest` from the position and advance past it
    pub fn get_bytes(&self, dest: &mut [u8]) -> &Self {
        self.check_remaining(dest.len(), "get_bytes");
        self.storage()
            .get_bytes(self.effective_index(self.position()), dest);
        self.position.store(self.position() + dest.len(), AtomicOrdering::Relaxed);
        self
    }

    pub fn get_u16(&self) -> u16 {
        let mut bytes = [0u8; 2];
        self.get_bytes(&mut bytes);
        u16::from_be_bytes(bytes)
    }

    pub fn get_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.get_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    pub fn get_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.get_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Byte at `index` (relative to the window); the cursor does not move
    pub fn get_at(&self, index: usize) -> u8 {
        self.check_index(index);
        self.storage().get(self.effective_index(index))
    }

    /// Byte at the position; the cursor does not move
    pub fn peek_byte(&self) -> u8 {
        self.get_at(self.position())
    }

    // ========================================================================
    // Writing
    // ========================================================================

    pub fn put_u8(&self, value: u8) -> &Self {
        self.check_remaining(1, "put_u8");
        self.storage()
            .put(self.effective_index(self.position()), value);
        self.position.store(self.position() + 1, AtomicOrdering::Relaxed);
        self
    }

    pub fn put_u16(&self, value: u16) -> &Self {
        self.put_array(&value.to_be_bytes())
    }

    pub fn put_u32(&self, value: u32) -> &Self {
        self.put_array(&value.to_be_bytes())
    }

    pub fn put_u64(&self, value: u64) -> &Self {
        self.put_array(&value.to_be_bytes())
    }

    /// Copy `bytes` in at the position and advance past them
    pub fn put_array(&self, bytes: &[u8]) -> &Self {
        self.check_remaining(bytes.len(), "put_array");
        self.storage()
            .put_bytes(self.effective_index(self.position()), bytes);
        self.position.store(self.position() + bytes.len(), AtomicOrdering::Relaxed);
        self
    }

    pub fn put_str(&self, text: &str) -> &Self {
        self.put_array(text.as_bytes())
    }

    /// `text` followed by a NUL byte
    pub fn put_cstring(&self, text: &str) -> &Self {
        self.check_remaining(text.len() + 1, "put_cstring");
        self.put_array(text.as_bytes()).put_u8(0)
    }

    /// Copy the remaining bytes of `source`; only this buffer's cursor moves
    pub fn put_buffer(&self, source: &Buffer) -> &Self {
        let length = source.remaining();
        self.check_remaining(length, "put_buffer");
        let source_array = source.storage();
        self.storage().array_copy(
            self.effective_index(self.position()),
            &source_array,
            source.effective_index(source.position()),
            length,
        );
        self.position.store(self.position() + length, AtomicOrdering::Relaxed);
        self
    }

    /// Store `value` at `index` (relative to the window); the cursor does not move
    pub fn put_at(&self, index: usize, value: u8) -> &Self {
        self.check_index(index);
        self.storage().put(self.effective_index(index), value);
        self
    }

    // ========================================================================
    // Scanning and parsing
    // ========================================================================

    /// Index of the first `byte` in `[position, limit)`
    pub fn find_u8(&self, byte: u8) -> Option<usize> {
        let position = self.position();
        self.with_remaining(|cells| cells.iter().position(|cell| cell.load(AtomicOrdering::Relaxed) == byte))
            .map(|offset| position + offset)
    }

    /// Advance past bytes contained in `set`
    ///
    /// Returns true if the position stopped on a byte outside `set`, false if
    /// the limit was reached.
    pub fn skip_over(&self, set: &[u8]) -> bool {
        let skipped = self.with_remaining(|cells| cells.iter().position(|cell| !set.contains(&cell.load(AtomicOrdering::Relaxed))));
        match skipped {
            Some(offset) => {
                self.position.store(self.position() + offset, AtomicOrdering::Relaxed);
                true
            }
            None => {
                self.position.store(self.limit(), AtomicOrdering::Relaxed);
                false
            }
        }
    }

    /// Advance to the first byte contained in `set`
    ///
    /// Returns true if the position stopped on such a byte, false if the limit
    /// was reached.
    pub fn skip_to(&self, set: &[u8]) -> bool {
        let found = self.with_remaining(|cells| cells.iter().position(|cell| set.contains(&cell.load(AtomicOrdering::Relaxed))));
        match found {
            Some(offset) => {
                self.position.store(self.position() + offset, AtomicOrdering::Relaxed);
                true
            }
            None => {
                self.position.store(self.limit(), AtomicOrdering::Relaxed);
                false
            }
        }
    }

    /// Accumulate a run of digits in `radix` starting `skip` bytes past the
    /// position; advances past the prefix and the digits on success
    fn parse_digits(&self, skip: usize, radix: u32) -> Result<u64, ParseError> {
        let bytes = self.remaining_bytes();
        let digits: Vec<u64> = bytes[skip..]
            .iter()
            .map_while(|&b| (b as char).to_digit(radix))
            .map(u64::from)
            .collect();

        if digits.is_empty() {
            return Err(ParseError::NoDigits(self.position() + skip));
        }

        let value = digits.iter().try_fold(0u64, |acc, &digit| {
            acc.checked_mul(u64::from(radix))
                .and_then(|acc| acc.checked_add(digit))
                .ok_or(ParseError::Overflow)
        })?;

        self.position.store(self.position() + skip + digits.len(), AtomicOrdering::Relaxed);
        Ok(value)
    }

    fn has_hex_prefix(&self) -> bool {
        self.remaining() > 2 && self.get_at(self.position()) == b'0' && self.get_at(self.position() + 1) == b'x'
    }

    /// Parse hex digits, skipping a leading "0x"
    pub fn parse_hex_number(&self) -> Result<u64, ParseError> {
        let skip = if self.has_hex_prefix() { 2 } else { 0 };
        self.parse_digits(skip, 16)
    }

    pub fn parse_decimal_number(&self) -> Result<u64, ParseError> {
        self.parse_digits(0, 10)
    }

    /// Hex when the remaining bytes start with "0x", decimal otherwise
    pub fn parse_numeric(&self) -> Result<u64, ParseError> {
        if self.has_hex_prefix() {
            self.parse_hex_number()
        } else {
            self.parse_decimal_number()
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Uppercase hex of the remaining bytes
    pub fn to_hex_string(&self) -> String {
        self.with_remaining(|cells| {
            let mut hex = String::with_capacity(cells.len() * 2);
            for cell in cells {
                let byte = cell.load(AtomicOrdering::Relaxed);
                hex.push(HEX_DIGITS[usize::from(byte >> 4)] as char);
                hex.push(HEX_DIGITS[usize::from(byte & 0xf)] as char);
            }
            hex
        })
    }
}

impl ParcObject for Buffer {
    fn descriptor() -> &'static TypeDescriptor {
        &BUFFER
    }

    /// Equal when the remaining bytes are equal
    fn equals(&self, other: &Self) -> bool {
        self.with_remaining(|a| {
            other.with_remaining(|b| a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.load(AtomicOrdering::Relaxed) == y.load(AtomicOrdering::Relaxed)))
        })
    }

    /// Bytewise over the remaining bytes; a longer buffer with an equal
    /// prefix orders after the shorter one
    fn compare(&self, other: &Self) -> Ordering {
        let load = |cell: &AtomicU8| cell.load(AtomicOrdering::Relaxed);
        self.with_remaining(|a| other.with_remaining(|b| a.iter().map(load).cmp(b.iter().map(load))))
    }

    fn hash_code(&self) -> u64 {
        if self.has_remaining() {
            hash_bytes(&self.remaining_bytes())
        } else {
            0
        }
    }

    fn copy(&self) -> Self {
        self.deep_copy()
    }

    fn describe(&self, _info: &ObjectInfo) -> String {
        String::from_utf8_lossy(&self.remaining_bytes()).into_owned()
    }

    fn display(&self, info: &ObjectInfo, indentation: usize, out: &mut dyn Write) -> io::Result<()> {
        print_indented(out, indentation, format_args!("{}@{:p} {{", info.name, info.address))?;
        print_indented(
            out,
            indentation + 1,
            format_args!(
                ".arrayOffset={} .position={} .limit={} .mark={}",
                self.array_offset(),
                self.position(),
                self.limit(),
                self.marked().map_or_else(|| "none".to_string(), |mark| mark.to_string())
            ),
        )?;
        let array = self.storage();
        print_indented(
            out,
            indentation + 1,
            format_args!("ByteArray {{ .capacity={} }}", array.capacity()),
        )?;
        for (row, chunk) in array.cells().chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|cell| format!("{:02x}", cell.load(AtomicOrdering::Relaxed))).collect();
            print_indented(out, indentation + 2, format_args!("{:#06x}: {}", row * 16, hex.join(" ")))?;
        }
        print_indented(out, indentation, format_args!("}}"))
    }
}

impl Clone for Buffer {
    /// Deep copy; use `duplicate` to share the array
    fn clone(&self) -> Self {
        self.deep_copy()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Hash for Buffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(ParcObject::hash_code(self));
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("array_offset", &self.array_offset())
            .field("position", &self.position())
            .field("limit", &self.limit())
            .field("mark", &self.marked())
            .field("capacity", &self.capacity())
            .finish()
    }
}
