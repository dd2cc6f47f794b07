//! HashMap - chained hash table over reference counted objects
//!
//! Design: a vector of buckets, each a vector of entries scanned linearly.
//! Keys are copied on insert so the map owns them privately; values are
//! acquired and shared with the caller.
//!
//! Resizing is incremental around two thresholds:
//! - `put` doubles the capacity first when the load factor reached 0.75
//! - `remove` halves it when the load factor dropped to 0.25, but never
//!   below the capacity the map was created with
//!
//! Doubling at 3/4 leaves the map at 3/8; halving at 1/4 leaves it at 1/2,
//! so neither move immediately triggers the other.

#[cfg(test)]
mod tests;

use crate::logging::{log_hash_map_resize, perf};
use crate::object::{print_indented, Object, ObjectInfo, ParcObject, TypeDescriptor, OBJECT};
use core::hash::{Hash, Hasher};
use std::fmt;
use std::io::{self, Write};

/// Capacity used when zero is requested
pub const DEFAULT_CAPACITY: usize = 43;

const MAX_LOAD_FACTOR: f64 = 0.75;
const MIN_LOAD_FACTOR: f64 = MAX_LOAD_FACTOR / 3.0;

struct Entry<K: ParcObject, V: ParcObject> {
    key: Object<K>,
    value: Object<V>,
}

impl<K: ParcObject, V: ParcObject> Entry<K, V> {
    fn equals(&self, other: &Self) -> bool {
        self.key.equals(&other.key) && self.value.equals(&other.value)
    }

    fn copy(&self) -> Self {
        Self {
            key: self.key.copy(),
            value: self.value.acquire(),
        }
    }
}

/// Map from `Object<K>` to `Object<V>` keyed by `equals` and `hash_code`
pub struct HashMap<K: ParcObject, V: ParcObject> {
    buckets: Vec<Vec<Entry<K, V>>>,
    min_capacity: usize,
    size: usize,
}

fn empty_buckets<K: ParcObject, V: ParcObject>(capacity: usize) -> Vec<Vec<Entry<K, V>>> {
    (0..capacity).map(|_| Vec::new()).collect()
}

impl<K: ParcObject, V: ParcObject> HashMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Map with `capacity` buckets, which is also the floor for shrinking
    ///
    /// A capacity of 0 selects `DEFAULT_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        Self {
            buckets: empty_buckets(capacity),
            min_capacity: capacity,
            size: 0,
        }
    }

    /// `new` wrapped in an object handle
    pub fn create() -> Object<Self> {
        Object::new(Self::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.size as f64 / self.capacity() as f64
    }

    #[inline]
    fn bucket_of(&self, key: &Object<K>) -> usize {
        (key.hash_code() % self.capacity() as u64) as usize
    }

    fn find(&self, key: &Object<K>) -> Option<(usize, usize)> {
        let bucket = self.bucket_of(key);
        self.buckets[bucket]
            .iter()
            .position(|entry| key.equals(&entry.key))
            .map(|index| (bucket, index))
    }

    /// Rehash every entry into `new_capacity` buckets
    ///
    /// Ignored when `new_capacity` is below the minimum capacity. Entries
    /// keep their relative order within a bucket.
    fn resize(&mut self, new_capacity: usize) {
        if new_capacity < self.min_capacity {
            return;
        }
        let _timing = perf::track_if_enabled("hash_map_resize");
        let old_capacity = self.capacity();
        let old_buckets = std::mem::replace(&mut self.buckets, empty_buckets(new_capacity));
        for entry in old_buckets.into_iter().flatten() {
            let bucket = self.bucket_of(&entry.key);
            self.buckets[bucket].push(entry);
        }
        log_hash_map_resize(old_capacity, new_capacity, self.size);
    }

    /// Associate `value` with a copy of `key`
    ///
    /// An existing equal key keeps its stored copy and has its value
    /// replaced, unless it already holds this very instance.
    pub fn put(&mut self, key: &Object<K>, value: &Object<V>) -> &mut Self {
        if self.load_factor() >= MAX_LOAD_FACTOR {
            self.resize(self.capacity() * 2);
        }

        match self.find(key) {
            Some((bucket, index)) => {
                let entry = &mut self.buckets[bucket][index];
                if !Object::ptr_eq(&entry.value, value) {
                    entry.value = value.acquire();
                }
            }
            None => {
                let bucket = self.bucket_of(key);
                self.buckets[bucket].push(Entry {
                    key: key.copy(),
                    value: value.acquire(),
                });
                self.size += 1;
            }
        }
        self
    }

    /// The value stored under `key`
    pub fn get(&self, key: &Object<K>) -> Option<&Object<V>> {
        self.find(key)
            .map(|(bucket, index)| &self.buckets[bucket][index].value)
    }

    pub fn contains(&self, key: &Object<K>) -> bool {
        self.find(key).is_some()
    }

    /// Remove the entry for `key`; true if one was present
    ///
    /// Shrinks the table when the load factor falls to the lower threshold,
    /// whether or not the key was found.
    pub fn remove(&mut self, key: &Object<K>) -> bool {
        let removed = match self.find(key) {
            Some((bucket, index)) => {
                self.buckets[bucket].remove(index);
                self.size -= 1;
                true
            }
            None => false,
        };

        if self.load_factor() <= MIN_LOAD_FACTOR {
            self.resize(self.capacity() / 2);
        }
        removed
    }

    /// Spread of the chain lengths around the ideal length of 1
    ///
    /// The standard deviation of non-empty chain lengths from 1.0, weighted
    /// by the inverse load factor. 0.0 is an ideal spread, around 1.0 is a
    /// typical random spread, and values well above 1.5 indicate clumping.
    pub fn clustering_number(&self) -> f64 {
        let (total, variance) = self
            .buckets
            .iter()
            .filter(|bucket| !bucket.is_empty())
            .fold((0usize, 0f64), |(total, variance), bucket| {
                let deviation = bucket.len() as f64 - 1.0;
                (total + bucket.len(), variance + deviation * deviation)
            });

        if total == 0 {
            return 0.0;
        }
        let standard_deviation = (variance / total as f64).sqrt();
        standard_deviation * (self.capacity() as f64 / total as f64)
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Entries in bucket order, insertion order within a bucket
    pub fn iter(&self) -> impl Iterator<Item = (&Object<K>, &Object<V>)> + '_ {
        self.buckets
            .iter()
            .flatten()
            .map(|entry| (&entry.key, &entry.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Object<K>> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Object<V>> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Removal-capable cursor yielding the keys
    pub fn key_iterator(&mut self) -> KeyIterator<'_, K, V> {
        KeyIterator {
            cursor: Cursor::new(self),
        }
    }

    /// Removal-capable cursor yielding the values
    pub fn value_iterator(&mut self) -> ValueIterator<'_, K, V> {
        ValueIterator {
            cursor: Cursor::new(self),
        }
    }

    fn entries_equal(&self, other: &Self) -> bool {
        self.capacity() == other.capacity()
            && self.size == other.size
            && self.buckets.iter().zip(&other.buckets).all(|(x, y)| {
                x.len() == y.len() && x.iter().all(|a| y.iter().any(|b| a.equals(b)))
            })
    }

    fn copy_entries(&self) -> Self {
        Self {
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.iter().map(Entry::copy).collect())
                .collect(),
            min_capacity: self.min_capacity,
            size: self.size,
        }
    }
}

impl<K: ParcObject, V: ParcObject> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks buckets in index order; removal never triggers a resize
struct Cursor<'a, K: ParcObject, V: ParcObject> {
    map: &'a mut HashMap<K, V>,
    bucket: usize,
    next: usize,
    current: Option<(usize, usize)>,
}

impl<'a, K: ParcObject, V: ParcObject> Cursor<'a, K, V> {
    fn new(map: &'a mut HashMap<K, V>) -> Self {
        Self {
            map,
            bucket: 0,
            next: 0,
            current: None,
        }
    }

    fn advance(&mut self) -> Option<&Entry<K, V>> {
        while self.bucket < self.map.buckets.len() {
            if self.next < self.map.buckets[self.bucket].len() {
                let position = (self.bucket, self.next);
                self.next += 1;
                self.current = Some(position);
                return Some(&self.map.buckets[position.0][position.1]);
            }
            self.bucket += 1;
            self.next = 0;
        }
        self.current = None;
        None
    }

    fn remove(&mut self) -> bool {
        match self.current.take() {
            Some((bucket, index)) => {
                self.map.buckets[bucket].remove(index);
                self.map.size -= 1;
                self.next = index;
                true
            }
            None => false,
        }
    }
}

/// Keys of a `HashMap`, with removal of the last key returned
pub struct KeyIterator<'a, K: ParcObject, V: ParcObject> {
    cursor: Cursor<'a, K, V>,
}

impl<K: ParcObject, V: ParcObject> KeyIterator<'_, K, V> {
    /// Remove the entry whose key was returned last; false if there is none
    pub fn remove(&mut self) -> bool {
        self.cursor.remove()
    }
}

impl<K: ParcObject, V: ParcObject> Iterator for KeyIterator<'_, K, V> {
    type Item = Object<K>;

    fn next(&mut self) -> Option<Object<K>> {
        self.cursor.advance().map(|entry| entry.key.acquire())
    }
}

/// Values of a `HashMap`, with removal of the last value returned
pub struct ValueIterator<'a, K: ParcObject, V: ParcObject> {
    cursor: Cursor<'a, K, V>,
}

impl<K: ParcObject, V: ParcObject> ValueIterator<'_, K, V> {
    /// Remove the entry whose value was returned last; false if there is none
    pub fn remove(&mut self) -> bool {
        self.cursor.remove()
    }
}

impl<K: ParcObject, V: ParcObject> Iterator for ValueIterator<'_, K, V> {
    type Item = Object<V>;

    fn next(&mut self) -> Option<Object<V>> {
        self.cursor.advance().map(|entry| entry.value.acquire())
    }
}

// ============================================================================
// Object operations
// ============================================================================

// One descriptor serves every K and V; the map's own layout does not depend on them.
static HASH_MAP: TypeDescriptor = TypeDescriptor::extend::<(Vec<Vec<()>>, usize, usize)>(&OBJECT, "HashMap", true);

impl<K: ParcObject, V: ParcObject> ParcObject for HashMap<K, V> {
    fn descriptor() -> &'static TypeDescriptor {
        &HASH_MAP
    }

    /// Same capacity, same size, and each bucket holds the same entries
    fn equals(&self, other: &Self) -> bool {
        self.entries_equal(other)
    }

    fn hash_code(&self) -> u64 {
        self.keys()
            .fold(0u64, |sum, key| sum.wrapping_add(key.hash_code()))
    }

    /// Keys are copied, values shared
    fn copy(&self) -> Self {
        self.copy_entries()
    }

    fn describe(&self, _info: &ObjectInfo) -> String {
        self.iter()
            .map(|(key, value)| format!("{key} -> {value}\n"))
            .collect()
    }

    fn to_json(&self, _info: &ObjectInfo) -> serde_json::Value {
        let object = self
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }

    fn display(&self, info: &ObjectInfo, indentation: usize, out: &mut dyn Write) -> io::Result<()> {
        print_indented(out, indentation, format_args!("{}@{:p} {{", info.name, info.address))?;
        for (key, value) in self.iter() {
            print_indented(out, indentation + 1, format_args!("{key} -> {value}"))?;
        }
        print_indented(out, indentation, format_args!("}}"))
    }
}

impl<K: ParcObject, V: ParcObject> Clone for HashMap<K, V> {
    fn clone(&self) -> Self {
        self.copy_entries()
    }
}

impl<K: ParcObject, V: ParcObject> PartialEq for HashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries_equal(other)
    }
}

impl<K: ParcObject, V: ParcObject> Hash for HashMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(ParcObject::hash_code(self));
    }
}

impl<K: ParcObject, V: ParcObject> fmt::Debug for HashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(key, value)| (&**key, &**value)))
            .finish()
    }
}
