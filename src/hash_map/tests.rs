//! HashMap tests
//!
//! Test suite organized by component:
//! - Basic operations: put, get, contains, remove
//! - Ownership: key copies, shared values
//! - Resizing: growth, shrinking, minimum capacity
//! - Iteration: order and removal through cursors
//! - Object operations: equals, hash, copy, string forms
//! - Properties: agreement with std's HashMap

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::buffer::Buffer;
    use proptest::prelude::*;
    use std::collections::HashMap as StdHashMap;

    /// Key whose hash code is its number, so bucket placement is predictable
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Slot(u64);

    static SLOT: TypeDescriptor = TypeDescriptor::extend::<Slot>(&OBJECT, "Slot", false);

    impl ParcObject for Slot {
        fn descriptor() -> &'static TypeDescriptor {
            &SLOT
        }

        fn hash_code(&self) -> u64 {
            self.0
        }

        fn describe(&self, _info: &ObjectInfo) -> String {
            format!("slot{}", self.0)
        }
    }

    #[derive(Debug, Clone, PartialEq, Hash)]
    struct Label(String);

    static LABEL: TypeDescriptor = TypeDescriptor::extend::<Label>(&OBJECT, "Label", false);

    impl ParcObject for Label {
        fn descriptor() -> &'static TypeDescriptor {
            &LABEL
        }

        fn describe(&self, _info: &ObjectInfo) -> String {
            self.0.clone()
        }

        fn to_json(&self, _info: &ObjectInfo) -> serde_json::Value {
            serde_json::Value::String(self.0.clone())
        }
    }

    fn slot(n: u64) -> Object<Slot> {
        Object::new(Slot(n))
    }

    fn label(text: &str) -> Object<Label> {
        Object::new(Label(text.to_string()))
    }

    // ===== Basic Operations =====

    #[test]
    fn zero_capacity_selects_default() {
        let map: HashMap<Slot, Label> = HashMap::with_capacity(0);
        assert_eq!(map.capacity(), DEFAULT_CAPACITY);
        assert_eq!(map.min_capacity(), DEFAULT_CAPACITY);
        assert_eq!(HashMap::<Slot, Label>::new().capacity(), 43);
        assert!(map.is_empty());
    }

    #[test]
    fn put_then_get() {
        let mut map = HashMap::new();
        map.put(&slot(1), &label("one")).put(&slot(2), &label("two"));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&slot(1)).map(|v| v.0.as_str()), Some("one"));
        assert_eq!(map.get(&slot(2)).map(|v| v.0.as_str()), Some("two"));
        assert!(map.get(&slot(3)).is_none());
        assert!(map.contains(&slot(1)));
        assert!(!map.contains(&slot(3)));
    }

    #[test]
    fn put_existing_key_replaces_value() {
        let mut map = HashMap::new();
        let first = label("first");
        let second = label("second");
        map.put(&slot(7), &first);
        map.put(&slot(7), &second);

        assert_eq!(map.len(), 1);
        assert!(Object::ptr_eq(map.get(&slot(7)).unwrap(), &second));
        assert_eq!(first.reference_count(), 1);
        assert_eq!(second.reference_count(), 2);
    }

    #[test]
    fn put_same_value_instance_keeps_it() {
        let mut map = HashMap::new();
        let value = label("same");
        map.put(&slot(1), &value);
        map.put(&slot(1), &value);
        assert_eq!(value.reference_count(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let mut map = HashMap::new();
        map.put(&slot(4), &label("four"));
        assert!(map.remove(&slot(4)));
        assert!(!map.remove(&slot(4)));
        assert!(map.is_empty());
        assert!(!map.contains(&slot(4)));
    }

    #[test]
    fn colliding_keys_share_a_bucket() {
        let mut map = HashMap::with_capacity(10);
        map.put(&slot(3), &label("a"))
            .put(&slot(13), &label("b"))
            .put(&slot(23), &label("c"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&slot(13)).map(|v| v.0.as_str()), Some("b"));

        map.remove(&slot(13));
        assert_eq!(map.get(&slot(3)).map(|v| v.0.as_str()), Some("a"));
        assert_eq!(map.get(&slot(23)).map(|v| v.0.as_str()), Some("c"));
    }

    // ===== Ownership =====

    #[test]
    fn keys_are_copied_values_are_shared() {
        let mut map = HashMap::new();
        let key = slot(5);
        let value = label("five");
        map.put(&key, &value);

        assert_eq!(key.reference_count(), 1);
        assert_eq!(value.reference_count(), 2);
        let stored = map.keys().next().unwrap();
        assert!(!Object::ptr_eq(stored, &key));
        assert!(stored.equals(&key));

        drop(map);
        assert_eq!(value.reference_count(), 1);
    }

    #[test]
    fn buffer_keys_are_isolated_from_caller() {
        let mut map = HashMap::new();
        let key = Buffer::from_slice(b"alpha");
        map.put(&key, &label("a"));

        key.put_at(0, b'A');
        assert!(!map.contains(&key));
        assert!(map.contains(&Buffer::from_slice(b"alpha")));
    }

    // ===== Resizing =====

    #[test]
    fn grows_at_max_load_and_shrinks_at_min_load() {
        let mut map = HashMap::with_capacity(8);
        for n in 0..6 {
            map.put(&slot(n), &label("v"));
        }
        assert_eq!(map.capacity(), 8);

        // 6/8 reached the threshold, so the next put doubles first
        map.put(&slot(6), &label("v"));
        assert_eq!(map.capacity(), 16);
        assert_eq!(map.len(), 7);
        for n in 0..7 {
            assert!(map.contains(&slot(n)), "slot{n} lost in rehash");
        }

        map.remove(&slot(6));
        map.remove(&slot(5));
        assert_eq!(map.capacity(), 16);
        // 4/16 is at the lower threshold
        map.remove(&slot(4));
        assert_eq!(map.capacity(), 8);
        for n in 0..4 {
            assert!(map.contains(&slot(n)), "slot{n} lost in rehash");
        }

        for n in 0..4 {
            map.remove(&slot(n));
            assert_eq!(map.capacity(), 8);
        }
        assert!(map.is_empty());
    }

    #[test]
    fn never_shrinks_below_initial_capacity() {
        let mut map = HashMap::with_capacity(4);
        map.put(&slot(1), &label("v"));
        map.remove(&slot(1));
        map.remove(&slot(2));
        assert_eq!(map.capacity(), 4);
    }

    #[test]
    fn clustering_number_reflects_spread() {
        let mut spread = HashMap::with_capacity(64);
        for n in 0..32 {
            spread.put(&slot(n), &label("v"));
        }
        assert_eq!(spread.clustering_number(), 0.0);

        let mut clumped = HashMap::with_capacity(64);
        for n in 0..32 {
            clumped.put(&slot(n * 64), &label("v"));
        }
        assert!(clumped.clustering_number() > spread.clustering_number());
        assert!(clumped.clustering_number() > 1.5);

        let empty: HashMap<Slot, Label> = HashMap::new();
        assert_eq!(empty.clustering_number(), 0.0);
    }

    // ===== Iteration =====

    #[test]
    fn iteration_follows_buckets_then_insertion() {
        let mut map = HashMap::with_capacity(10);
        map.put(&slot(12), &label("c"))
            .put(&slot(2), &label("d"))
            .put(&slot(1), &label("a"))
            .put(&slot(11), &label("b"));

        let keys: Vec<u64> = map.keys().map(|key| key.0).collect();
        assert_eq!(keys, vec![1, 11, 12, 2]);
        let values: Vec<&str> = map.values().map(|value| value.0.as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn key_iterator_removes_without_resizing() {
        let mut map = HashMap::with_capacity(16);
        for n in 0..10 {
            map.put(&slot(n), &label("v"));
        }
        let capacity = map.capacity();

        let mut iterator = map.key_iterator();
        let mut visited = 0;
        while let Some(key) = iterator.next() {
            visited += 1;
            if key.0 % 2 == 0 {
                assert!(iterator.remove());
            }
        }
        assert_eq!(visited, 10);

        assert_eq!(map.len(), 5);
        assert_eq!(map.capacity(), capacity);
        assert!(map.keys().all(|key| key.0 % 2 == 1));
    }

    #[test]
    fn value_iterator_removes_colliding_entries() {
        let mut map = HashMap::with_capacity(4);
        map.put(&slot(0), &label("x"))
            .put(&slot(4), &label("y"))
            .put(&slot(8), &label("x"));

        let mut iterator = map.value_iterator();
        let mut seen = Vec::new();
        while let Some(value) = iterator.next() {
            seen.push(value.0.clone());
            if value.0 == "x" {
                iterator.remove();
            }
        }
        assert_eq!(seen, vec!["x", "y", "x"]);
        assert_eq!(map.len(), 1);
        assert!(map.contains(&slot(4)));
    }

    #[test]
    fn cursor_remove_needs_a_current_entry() {
        let mut map: HashMap<Slot, Label> = HashMap::new();
        map.put(&slot(1), &label("v"));
        let mut iterator = map.key_iterator();
        assert!(!iterator.remove());
        iterator.next();
        assert!(iterator.remove());
        assert!(!iterator.remove());
    }

    // ===== Object Operations =====

    #[test]
    fn equals_ignores_insertion_order() {
        let mut a = HashMap::with_capacity(4);
        a.put(&slot(0), &label("x")).put(&slot(4), &label("y"));
        let mut b = HashMap::with_capacity(4);
        b.put(&slot(4), &label("y")).put(&slot(0), &label("x"));

        assert!(a.equals(&b));
        assert_eq!(ParcObject::hash_code(&a), ParcObject::hash_code(&b));

        b.put(&slot(4), &label("z"));
        assert!(!a.equals(&b));
    }

    #[test]
    fn equals_requires_same_capacity() {
        let mut a = HashMap::with_capacity(4);
        let mut b = HashMap::with_capacity(8);
        a.put(&slot(1), &label("x"));
        b.put(&slot(1), &label("x"));
        assert!(!a.equals(&b));
    }

    #[test]
    fn hash_code_sums_key_hashes() {
        let mut map = HashMap::new();
        map.put(&slot(10), &label("a")).put(&slot(32), &label("b"));
        assert_eq!(ParcObject::hash_code(&map), 42);
    }

    #[test]
    fn copy_copies_keys_and_shares_values() {
        let value = label("shared");
        let mut map = HashMap::new();
        map.put(&slot(1), &value);

        let copy = ParcObject::copy(&map);
        assert!(copy.equals(&map));
        assert_eq!(value.reference_count(), 3);
        let original_key = map.keys().next().unwrap();
        let copied_key = copy.keys().next().unwrap();
        assert!(!Object::ptr_eq(original_key, copied_key));
        assert!(Object::ptr_eq(map.get(&slot(1)).unwrap(), copy.get(&slot(1)).unwrap()));
    }

    #[test]
    fn string_and_json_forms() {
        let mut inner: Object<HashMap<Slot, Label>> = HashMap::create();
        inner
            .get_mut()
            .expect("sole owner")
            .put(&slot(1), &label("one"));

        assert_eq!(inner.to_string(), "slot1 -> one\n");
        assert_eq!(inner.to_json(), serde_json::json!({ "slot1": "one" }));

        let mut out = Vec::new();
        inner.display(0, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HashMap@0x"));
        assert!(text.contains("    slot1 -> one"));
        assert!(inner.is_instance_of(&OBJECT));
    }

    // ===== Properties =====

    #[derive(Debug, Clone)]
    enum Op {
        Put(u64, u8),
        Remove(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..48, any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
            (0u64..48).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn agrees_with_std_map(initial in 1usize..16, ops in prop::collection::vec(op(), 0..200)) {
            let mut map = HashMap::with_capacity(initial);
            let mut model = StdHashMap::new();

            for op in &ops {
                let before = map.capacity();
                match *op {
                    Op::Put(k, v) => {
                        let grows = map.load_factor() >= 0.75;
                        map.put(&slot(k), &label(&v.to_string()));
                        model.insert(k, v.to_string());
                        prop_assert_eq!(map.capacity(), if grows { before * 2 } else { before });
                    }
                    Op::Remove(k) => {
                        prop_assert_eq!(map.remove(&slot(k)), model.remove(&k).is_some());
                        prop_assert!(map.capacity() == before || map.capacity() == before / 2);
                    }
                }
                prop_assert!(map.capacity() >= initial);
                prop_assert_eq!(map.len(), model.len());
            }

            for (k, v) in &model {
                prop_assert_eq!(map.get(&slot(*k)).map(|value| value.0.clone()), Some(v.clone()));
            }
            prop_assert_eq!(map.keys().count(), model.len());
        }
    }
}
