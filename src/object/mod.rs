//! Object runtime - reference counted, polymorphic base objects
//!
//! Design: `Object<T>` is a shared handle over an `Arc` holding a small
//! header next to the value. Polymorphic operations come from the
//! `ParcObject` trait; its default methods play the role of the root type,
//! and a type overrides only what it needs. The header carries:
//! - A magic word used as a cheap corruption probe
//! - The static `TypeDescriptor` (name, layout, supertype chain)
//! - A lazily built lock block for lockable types
//! - A spin barrier flag

mod descriptor;
mod locking;

#[cfg(test)]
mod tests;

pub use descriptor::{TypeDescriptor, OBJECT};
pub use locking::Locking;

use crate::logging::log_object_destroyed;
use crate::{trap, trap_if};
use core::cmp::Ordering;
use core::hash::{BuildHasher, Hash, Hasher};
use core::mem::ManuallyDrop;
use core::ops::Deref;
use once_cell::sync::OnceCell;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Header magic word
pub const OBJECT_MAGIC: u32 = 0x0ddf_adda;

/// Spaces per indentation level in `display` output
pub const INDENTATION_WIDTH: usize = 4;

/// Identity of an instance, passed to the formatting operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: &'static str,
    pub address: *const u8,
    pub references: usize,
    pub length: usize,
    pub alignment: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectJson {
    references: usize,
    object_length: usize,
    object_alignment: usize,
    address: String,
}

impl ObjectInfo {
    /// Default JSON introspection document
    pub fn to_json(&self) -> serde_json::Value {
        let document = ObjectJson {
            references: self.references,
            object_length: self.length,
            object_alignment: self.alignment,
            address: format!("{:p}", self.address),
        };
        serde_json::to_value(document).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Object@{:p} {{ .references={}, .objectLength = {}, .objectAlignment={} }} data {:p}",
            self.address, self.references, self.length, self.alignment, self.address
        )
    }
}

/// Write `indentation` levels of padding followed by a line of text
pub fn print_indented(out: &mut dyn Write, indentation: usize, line: fmt::Arguments<'_>) -> io::Result<()> {
    writeln!(out, "{:width$}{}", "", line, width = indentation * INDENTATION_WIDTH)
}

/// Hash of a byte sequence, stable for the life of the process
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxBuildHasher::default().build_hasher();
    hasher.write(bytes);
    hasher.finish()
}

/// Polymorphic object operations
///
/// Every method except `descriptor` has a default; the defaults treat the
/// value as plain data (value equality, hash of the value, clone as copy).
pub trait ParcObject: Clone + PartialEq + Hash + fmt::Debug + 'static {
    /// The static descriptor of this type
    fn descriptor() -> &'static TypeDescriptor;

    fn equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Order by hash code, then by `Debug` text; `Equal` whenever `equals`
    ///
    /// Two values that differ but share both the hash code and the `Debug`
    /// text also compare `Equal`. Types with a natural order override this.
    fn compare(&self, other: &Self) -> Ordering {
        if self.equals(other) {
            return Ordering::Equal;
        }
        self.hash_code()
            .cmp(&other.hash_code())
            .then_with(|| format!("{self:?}").cmp(&format!("{other:?}")))
    }

    fn hash_code(&self) -> u64 {
        FxBuildHasher::default().hash_one(self)
    }

    /// Independent copy of the value
    fn copy(&self) -> Self {
        self.clone()
    }

    /// String form of the instance
    fn describe(&self, info: &ObjectInfo) -> String {
        info.to_string()
    }

    fn to_json(&self, info: &ObjectInfo) -> serde_json::Value {
        info.to_json()
    }

    fn display(&self, info: &ObjectInfo, indentation: usize, out: &mut dyn Write) -> io::Result<()> {
        print_indented(
            out,
            indentation,
            format_args!("{}@{:p} {{ .references={} }}", info.name, info.address, info.references),
        )
    }

    /// Called once when the last reference is released
    ///
    /// Return false to take over teardown: the value is then not dropped.
    fn destructor(&mut self) -> bool {
        true
    }
}

/// Per-instance runtime header
pub struct Header {
    magic: u32,
    descriptor: &'static TypeDescriptor,
    locking: OnceCell<Locking>,
    barrier: AtomicBool,
}

impl Header {
    fn new(descriptor: &'static TypeDescriptor) -> Self {
        Self {
            magic: OBJECT_MAGIC,
            descriptor,
            locking: OnceCell::new(),
            barrier: AtomicBool::new(false),
        }
    }
}

#[repr(C)]
struct Inner<T: ParcObject> {
    header: Header,
    value: ManuallyDrop<T>,
}

impl<T: ParcObject> Drop for Inner<T> {
    fn drop(&mut self) {
        log_object_destroyed(self.header.descriptor.name, &*self.value as *const T as *const u8);
        if self.value.destructor() {
            unsafe { ManuallyDrop::drop(&mut self.value) };
        }
    }
}

/// Shared handle to a reference counted instance
///
/// Cloning a handle acquires a reference; dropping it releases one.
pub struct Object<T: ParcObject> {
    inner: Arc<Inner<T>>,
}

impl<T: ParcObject> Object<T> {
    /// Create an instance with one reference
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                header: Header::new(T::descriptor()),
                value: ManuallyDrop::new(value),
            }),
        }
    }

    /// Take another reference to the same instance
    #[inline]
    pub fn acquire(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Release the reference held in `slot`, leaving it empty
    ///
    /// Returns the number of references remaining. The count is read just
    /// before the release, so with concurrent releases it is advisory: two
    /// threads may report the same number. Traps if `slot` holds nothing.
    pub fn release(slot: &mut Option<Self>) -> usize {
        match slot.take() {
            Some(object) => {
                let remaining = Arc::strong_count(&object.inner) - 1;
                drop(object);
                remaining
            }
            None => trap!(IllegalValue, "release of an empty {} slot", T::descriptor().name),
        }
    }

    #[inline]
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// True if both handles refer to the same instance
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Address of the value
    #[inline]
    pub fn address(&self) -> *const u8 {
        &*self.inner.value as *const T as *const u8
    }

    #[inline]
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        self.inner.header.descriptor
    }

    pub fn is_instance_of(&self, descriptor: &TypeDescriptor) -> bool {
        self.descriptor().is_subtype_of(descriptor)
    }

    pub fn info(&self) -> ObjectInfo {
        let descriptor = self.descriptor();
        ObjectInfo {
            name: descriptor.name,
            address: self.address(),
            references: self.reference_count(),
            length: descriptor.size,
            alignment: descriptor.alignment,
        }
    }

    pub fn is_valid(&self) -> bool {
        let header = &self.inner.header;
        header.magic == OBJECT_MAGIC
            && core::ptr::eq(header.descriptor, T::descriptor())
            && (header as *const Header as usize) < self.address() as usize
            && self.reference_count() > 0
            && (header.descriptor.lockable || header.locking.get().is_none())
    }

    pub fn assert_valid(&self) {
        trap_if!(
            !self.is_valid(),
            CorruptMemory,
            "{}@{:p} is not a valid object",
            self.descriptor().name,
            self.address()
        );
    }

    /// Mutable access when this is the only reference
    pub fn get_mut(&mut self) -> Option<&mut T> {
        Arc::get_mut(&mut self.inner).map(|inner| &mut *inner.value)
    }

    pub fn equals(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
            || (core::ptr::eq(self.descriptor(), other.descriptor()) && (**self).equals(other))
    }

    /// `equals` where either side may be absent; two absent sides are equal
    pub fn equals_optional(x: Option<&Self>, y: Option<&Self>) -> bool {
        match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => x.equals(y),
            _ => false,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        if Self::ptr_eq(self, other) {
            Ordering::Equal
        } else {
            (**self).compare(other)
        }
    }

    /// `compare` where an absent side orders before a present one
    pub fn compare_optional(x: Option<&Self>, y: Option<&Self>) -> Ordering {
        match (x, y) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.compare(y),
        }
    }

    #[inline]
    pub fn hash_code(&self) -> u64 {
        (**self).hash_code()
    }

    /// New instance holding a copy of the value
    pub fn copy(&self) -> Self {
        Self::new((**self).copy())
    }

    pub fn to_json(&self) -> serde_json::Value {
        (**self).to_json(&self.info())
    }

    pub fn display(&self, indentation: usize, out: &mut dyn Write) -> io::Result<()> {
        (**self).display(&self.info(), indentation, out)
    }

    fn locking(&self) -> &Locking {
        let header = &self.inner.header;
        trap_if!(
            !header.descriptor.lockable,
            IllegalValue,
            "{} instances are not lockable",
            header.descriptor.name
        );
        header.locking.get_or_init(Locking::new)
    }

    /// Block until this thread holds the instance lock
    ///
    /// The lock is not reentrant: locking it again from the owning thread
    /// traps.
    pub fn lock(&self) -> bool {
        self.locking().lock(self.descriptor().name, self.address())
    }

    pub fn try_lock(&self) -> bool {
        self.locking().try_lock(self.descriptor().name, self.address())
    }

    pub fn unlock(&self) -> bool {
        self.locking().unlock()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.header.locking.get().map_or(false, Locking::is_locked)
    }

    /// Wait for a notification; the caller must hold the instance lock
    pub fn wait(&self) {
        self.locking().wait(self.descriptor().name, self.address())
    }

    /// Wait at most `timeout`; true if notified
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.locking().wait_for(self.descriptor().name, self.address(), timeout)
    }

    /// Wait until `deadline`; true if notified
    pub fn wait_until(&self, deadline: Instant) -> bool {
        self.locking().wait_until(self.descriptor().name, self.address(), deadline)
    }

    pub fn notify(&self) {
        self.locking().notify()
    }

    pub fn notify_all(&self) {
        self.locking().notify_all()
    }

    /// Spin until the barrier flag is taken by this caller
    pub fn barrier_set(&self) -> bool {
        let barrier = &self.inner.header.barrier;
        while barrier
            .compare_exchange_weak(false, true, AtomicOrdering::Acquire, AtomicOrdering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        true
    }

    /// Spin until the barrier flag is released by this caller
    pub fn barrier_unset(&self) -> bool {
        let barrier = &self.inner.header.barrier;
        while barrier
            .compare_exchange_weak(true, false, AtomicOrdering::Release, AtomicOrdering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        true
    }
}

impl<T: ParcObject> Deref for Object<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: ParcObject> Clone for Object<T> {
    #[inline]
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<T: ParcObject> PartialEq for Object<T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<T: ParcObject> Hash for Object<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl<T: ParcObject> fmt::Display for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&(**self).describe(&self.info()))
    }
}

impl<T: ParcObject> fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.descriptor().name)
            .field("address", &self.address())
            .field("references", &self.reference_count())
            .field("value", &**self)
            .finish()
    }
}
