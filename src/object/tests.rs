//! Object runtime tests
//!
//! Test suite organized by component:
//! - Lifecycle: acquire/release counting and destruction
//! - Descriptors: supertype chain and instance checks
//! - Default operations: equals, compare, hash, copy, formatting
//! - Overrides: types replacing the default operations
//! - Locking: lock, try_lock, wait/notify across threads

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Debug, Clone, PartialEq, Hash)]
    struct Point {
        x: i32,
        y: i32,
    }

    static POINT: TypeDescriptor = TypeDescriptor::extend::<Point>(&OBJECT, "Point", true);

    impl ParcObject for Point {
        fn descriptor() -> &'static TypeDescriptor {
            &POINT
        }
    }

    /// Subtype of Point that orders by distance and renders itself
    #[derive(Debug, Clone, PartialEq, Hash)]
    struct Labelled {
        label: String,
        distance: u32,
    }

    static LABELLED: TypeDescriptor = TypeDescriptor::extend::<Labelled>(&POINT, "Labelled", false);

    impl ParcObject for Labelled {
        fn descriptor() -> &'static TypeDescriptor {
            &LABELLED
        }

        fn equals(&self, other: &Self) -> bool {
            self.distance == other.distance
        }

        fn compare(&self, other: &Self) -> Ordering {
            self.distance.cmp(&other.distance)
        }

        fn describe(&self, _info: &ObjectInfo) -> String {
            format!("{}:{}", self.label, self.distance)
        }

        fn to_json(&self, _info: &ObjectInfo) -> serde_json::Value {
            serde_json::json!({ "label": self.label, "distance": self.distance })
        }
    }

    static DESTROYED: AtomicUsize = AtomicUsize::new(0);
    static TORN_DOWN: AtomicUsize = AtomicUsize::new(0);

    /// Counts destructor calls; `keep` takes over teardown
    #[derive(Debug, Clone, PartialEq, Hash)]
    struct Counted {
        keep: bool,
        payload: Vec<u8>,
    }

    static COUNTED: TypeDescriptor = TypeDescriptor::extend::<Counted>(&OBJECT, "Counted", false);

    impl ParcObject for Counted {
        fn descriptor() -> &'static TypeDescriptor {
            &COUNTED
        }

        fn destructor(&mut self) -> bool {
            if self.keep {
                TORN_DOWN.fetch_add(1, AtomicOrdering::SeqCst);
                core::mem::take(&mut self.payload);
                false
            } else {
                DESTROYED.fetch_add(1, AtomicOrdering::SeqCst);
                true
            }
        }
    }

    // ===== Lifecycle =====

    #[test]
    fn acquire_release_counts() {
        let object = Object::new(Point { x: 1, y: 2 });
        assert_eq!(object.reference_count(), 1);

        let mut second = Some(object.acquire());
        assert_eq!(object.reference_count(), 2);
        assert!(Object::ptr_eq(&object, second.as_ref().unwrap()));

        assert_eq!(Object::release(&mut second), 1);
        assert!(second.is_none());
        assert_eq!(object.reference_count(), 1);
    }

    #[test]
    fn destroyed_exactly_once_on_last_release() {
        let before = DESTROYED.load(AtomicOrdering::SeqCst);

        let mut first = Some(Object::new(Counted { keep: false, payload: vec![1, 2, 3] }));
        let mut copies: Vec<Option<Object<Counted>>> = (0..5)
            .map(|_| Some(first.as_ref().unwrap().acquire()))
            .collect();

        for slot in copies.iter_mut() {
            Object::release(slot);
            assert_eq!(DESTROYED.load(AtomicOrdering::SeqCst), before);
        }

        assert_eq!(Object::release(&mut first), 0);
        assert_eq!(DESTROYED.load(AtomicOrdering::SeqCst), before + 1);
    }

    #[test]
    fn destructor_may_take_over_teardown() {
        let before = TORN_DOWN.load(AtomicOrdering::SeqCst);
        let mut slot = Some(Object::new(Counted { keep: true, payload: vec![9; 64] }));
        Object::release(&mut slot);
        assert_eq!(TORN_DOWN.load(AtomicOrdering::SeqCst), before + 1);
    }

    #[test]
    fn release_across_threads() {
        let object = Object::new(Point { x: 0, y: 0 });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mut local = Some(object.acquire());
                thread::spawn(move || {
                    Object::release(&mut local);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(object.reference_count(), 1);
    }

    #[test]
    fn concurrent_release_counts_stay_in_range() {
        let object = Object::new(Point { x: 0, y: 0 });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mut local = Some(object.acquire());
                thread::spawn(move || Object::release(&mut local))
            })
            .collect();
        for handle in handles {
            let remaining = handle.join().unwrap();
            assert!((1..=8).contains(&remaining), "remaining {remaining}");
        }
        assert_eq!(object.reference_count(), 1);
    }

    #[test]
    #[should_panic(expected = "release of an empty Point slot")]
    fn release_of_empty_slot_traps() {
        let mut slot: Option<Object<Point>> = Some(Object::new(Point { x: 0, y: 0 }));
        Object::release(&mut slot);
        Object::release(&mut slot);
    }

    #[test]
    fn get_mut_only_when_unique() {
        let mut object = Object::new(Point { x: 1, y: 1 });
        object.get_mut().unwrap().x = 5;
        assert_eq!(object.x, 5);

        let other = object.acquire();
        assert!(object.get_mut().is_none());
        drop(other);
        assert!(object.get_mut().is_some());
    }

    // ===== Descriptors =====

    #[test]
    fn instance_of_walks_chain() {
        let labelled = Object::new(Labelled { label: "a".into(), distance: 1 });
        assert!(labelled.is_instance_of(&LABELLED));
        assert!(labelled.is_instance_of(&POINT));
        assert!(labelled.is_instance_of(&OBJECT));

        let point = Object::new(Point { x: 0, y: 0 });
        assert!(!point.is_instance_of(&LABELLED));

        let names: Vec<&str> = LABELLED.chain().map(|d| d.name).collect();
        assert_eq!(names, ["Labelled", "Point", "Object"]);
    }

    #[test]
    fn fresh_objects_are_valid() {
        let point = Object::new(Point { x: 3, y: 4 });
        assert!(point.is_valid());
        point.assert_valid();
        assert_eq!(point.descriptor().size, core::mem::size_of::<Point>());
    }

    // ===== Default Operations =====

    #[test]
    fn byte_hashes_are_stable() {
        assert_eq!(hash_bytes(b"foobar"), hash_bytes(b"foobar"));
        assert_ne!(hash_bytes(b"foobar"), hash_bytes(b"foobaz"));

        let point = Point { x: 4, y: 2 };
        assert_eq!(ParcObject::hash_code(&point), ParcObject::hash_code(&point.clone()));
        assert_ne!(ParcObject::hash_code(&point), ParcObject::hash_code(&Point { x: 2, y: 4 }));
    }

    #[test]
    fn default_equality_is_by_value() {
        let a = Object::new(Point { x: 1, y: 2 });
        let b = Object::new(Point { x: 1, y: 2 });
        let c = Object::new(Point { x: 2, y: 1 });
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert_eq!(a.hash_code(), b.hash_code());
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_eq!(a.compare(&c), c.compare(&a).reverse());
    }

    /// Hash and Debug see only `shown`; equality sees both fields
    #[derive(Clone, PartialEq)]
    struct Shadowed {
        shown: u8,
        hidden: u8,
    }

    impl core::hash::Hash for Shadowed {
        fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
            self.shown.hash(state);
        }
    }

    impl fmt::Debug for Shadowed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Shadowed({})", self.shown)
        }
    }

    static SHADOWED: TypeDescriptor = TypeDescriptor::extend::<Shadowed>(&OBJECT, "Shadowed", false);

    impl ParcObject for Shadowed {
        fn descriptor() -> &'static TypeDescriptor {
            &SHADOWED
        }
    }

    #[test]
    fn default_compare_ties_when_hash_and_debug_agree() {
        let a = Shadowed { shown: 1, hidden: 1 };
        let b = Shadowed { shown: 1, hidden: 2 };
        assert!(!a.equals(&b));
        assert_eq!(a.compare(&b), Ordering::Equal);

        let c = Shadowed { shown: 2, hidden: 1 };
        assert_ne!(a.compare(&c), Ordering::Equal);
        assert_eq!(a.compare(&c), c.compare(&a).reverse());
    }

    #[test]
    fn optional_operands() {
        let a = Object::new(Point { x: 1, y: 2 });
        assert!(Object::<Point>::equals_optional(None, None));
        assert!(!Object::equals_optional(Some(&a), None));
        assert_eq!(Object::compare_optional(None, Some(&a)), Ordering::Less);
        assert_eq!(Object::compare_optional(Some(&a), None), Ordering::Greater);
        assert_eq!(Object::<Point>::compare_optional(None, None), Ordering::Equal);
    }

    #[test]
    fn copy_is_independent() {
        let original = Object::new(Point { x: 7, y: 8 });
        let copy = original.copy();
        assert!(!Object::ptr_eq(&original, &copy));
        assert!(original.equals(&copy));
        assert_eq!(copy.reference_count(), 1);
    }

    #[test]
    fn default_string_and_json() {
        let point = Object::new(Point { x: 1, y: 2 });
        let text = point.to_string();
        assert!(text.starts_with("Object@0x"));
        assert!(text.contains(".references=1"));
        assert!(text.contains(&format!(".objectLength = {}", core::mem::size_of::<Point>())));

        let json = point.to_json();
        assert_eq!(json["references"], 1);
        assert_eq!(json["objectLength"], core::mem::size_of::<Point>());
        assert_eq!(json["objectAlignment"], core::mem::align_of::<Point>());
        assert!(json["address"].as_str().unwrap().starts_with("0x"));
    }

    #[test]
    fn default_display_indents() {
        let point = Object::new(Point { x: 1, y: 2 });
        let mut out = Vec::new();
        point.display(2, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("        Point@0x"));
        assert!(text.trim_end().ends_with("{ .references=1 }"));
    }

    // ===== Overrides =====

    #[test]
    fn overrides_replace_defaults() {
        let near = Object::new(Labelled { label: "near".into(), distance: 1 });
        let also_near = Object::new(Labelled { label: "other".into(), distance: 1 });
        let far = Object::new(Labelled { label: "far".into(), distance: 10 });

        assert!(near.equals(&also_near));
        assert_eq!(near.compare(&far), Ordering::Less);
        assert_eq!(far.to_string(), "far:10");
        assert_eq!(near.to_json()["label"], "near");
    }

    // ===== Locking =====

    #[test]
    fn lock_and_unlock() {
        let point = Object::new(Point { x: 0, y: 0 });
        assert!(!point.is_locked());
        assert!(point.lock());
        assert!(point.is_locked());
        assert!(point.unlock());
        assert!(!point.is_locked());
        assert!(!point.unlock());
    }

    #[test]
    #[should_panic(expected = "recursive lock")]
    fn recursive_lock_traps() {
        let point = Object::new(Point { x: 0, y: 0 });
        point.lock();
        point.lock();
    }

    #[test]
    #[should_panic(expected = "not lockable")]
    fn unlockable_type_traps() {
        let labelled = Object::new(Labelled { label: String::new(), distance: 0 });
        labelled.lock();
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        let point = Object::new(Point { x: 0, y: 0 });
        point.lock();

        let shared = point.acquire();
        let acquired = thread::spawn(move || shared.try_lock()).join().unwrap();
        assert!(!acquired);

        point.unlock();
        assert!(point.try_lock());
        point.unlock();
    }

    #[test]
    fn lock_excludes_other_threads() {
        let counter = Object::new(Point { x: 0, y: 0 });
        let total = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.acquire();
                let total = Arc::clone(&total);
                thread::spawn(move || {
                    for _ in 0..100 {
                        counter.lock();
                        let seen = total.load(AtomicOrdering::Relaxed);
                        thread::yield_now();
                        total.store(seen + 1, AtomicOrdering::Relaxed);
                        counter.unlock();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(total.load(AtomicOrdering::SeqCst), 400);
    }

    #[test]
    fn wait_for_times_out_without_notify() {
        let point = Object::new(Point { x: 0, y: 0 });
        point.lock();
        let notified = point.wait_for(Duration::from_millis(10));
        assert!(!notified);
        assert!(point.is_locked());
        point.unlock();
    }

    #[test]
    fn wait_until_past_deadline_returns() {
        let point = Object::new(Point { x: 0, y: 0 });
        point.lock();
        assert!(!point.wait_until(Instant::now()));
        point.unlock();
    }

    #[test]
    fn wait_for_unbounded_timeout_waits_for_notify() {
        let point = Object::new(Point { x: 0, y: 0 });
        let ready = Arc::new(AtomicBool::new(false));

        point.lock();
        let notifier = {
            let point = point.acquire();
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                point.lock();
                ready.store(true, AtomicOrdering::SeqCst);
                point.notify();
                point.unlock();
            })
        };

        assert!(point.wait_for(Duration::MAX));
        assert!(ready.load(AtomicOrdering::SeqCst));
        assert!(point.is_locked());
        point.unlock();
        notifier.join().unwrap();
    }

    #[test]
    fn notify_wakes_waiter() {
        let point = Object::new(Point { x: 0, y: 0 });
        let ready = Arc::new(AtomicBool::new(false));

        point.lock();
        let waiter = {
            let point = point.acquire();
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                point.lock();
                ready.store(true, AtomicOrdering::SeqCst);
                point.notify();
                point.unlock();
            })
        };

        let mut notified = false;
        while !ready.load(AtomicOrdering::SeqCst) {
            notified |= point.wait_for(Duration::from_secs(5));
        }
        point.unlock();
        waiter.join().unwrap();
        assert!(notified || ready.load(AtomicOrdering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "without holding its lock")]
    fn wait_without_lock_traps() {
        let point = Object::new(Point { x: 0, y: 0 });
        point.wait_for(Duration::from_millis(1));
    }

    #[test]
    fn barrier_set_and_unset() {
        let point = Object::new(Point { x: 0, y: 0 });
        assert!(point.barrier_set());
        assert!(point.barrier_unset());
        assert!(point.barrier_set());
        assert!(point.barrier_unset());
    }
}
