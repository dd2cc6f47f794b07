//! RedBlackTree - ordered map driven by caller-supplied callbacks
//!
//! Design: nodes live in an arena (`Vec<Node>`) and refer to each other by
//! index. Index 0 is the shared `NIL` sentinel: always black, standing in
//! for every missing child and for the root's parent. Deletion may point the
//! sentinel's parent link at a real node while fixing up, exactly as in the
//! textbook algorithm, so the fix-up code needs no null checks.
//!
//! The tree does not depend on the object runtime. Ordering, copying,
//! equality and teardown of keys and values come from `Callbacks`; when an
//! optional callback is absent the tree falls back to `Clone`, `PartialEq`
//! or a plain drop.


use crate::trap;
use core::cmp::Ordering;
use std::fmt;

type NodeId = usize;

const NIL: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

struct Node<K, V> {
    entry: Option<(K, V)>,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
    color: Color,
}

impl<K, V> Node<K, V> {
    fn sentinel() -> Self {
        Self {
            entry: None,
            parent: NIL,
            left: NIL,
            right: NIL,
            color: Color::Black,
        }
    }
}

/// Key and value handling supplied by the owner of a tree
pub struct Callbacks<K, V> {
    /// Orders keys; required
    pub compare: fn(&K, &K) -> Ordering,
    /// Consumes a key the tree is discarding
    pub key_free: Option<fn(K)>,
    pub key_copy: Option<fn(&K) -> K>,
    pub value_equals: Option<fn(&V, &V) -> bool>,
    /// Consumes a value the tree is discarding
    pub value_free: Option<fn(V)>,
    pub value_copy: Option<fn(&V) -> V>,
}

impl<K, V> Callbacks<K, V> {
    /// Only a comparator; every other operation uses the fallback
    pub fn new(compare: fn(&K, &K) -> Ordering) -> Self {
        Self {
            compare,
            key_free: None,
            key_copy: None,
            value_equals: None,
            value_free: None,
            value_copy: None,
        }
    }
}

impl<K, V> Clone for Callbacks<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Callbacks<K, V> {}

impl<K, V> fmt::Debug for Callbacks<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("key_free", &self.key_free.is_some())
            .field("key_copy", &self.key_copy.is_some())
            .field("value_equals", &self.value_equals.is_some())
            .field("value_free", &self.value_free.is_some())
            .field("value_copy", &self.value_copy.is_some())
            .finish()
    }
}

/// Ordered key/value map with O(log n) insert, lookup and removal
pub struct RedBlackTree<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<NodeId>,
    root: NodeId,
    size: usize,
    callbacks: Callbacks<K, V>,
}

impl<K: Ord, V> RedBlackTree<K, V> {
    /// Tree ordered by `K`'s `Ord`
    pub fn new() -> Self {
        Self::with_callbacks(Callbacks::new(K::cmp))
    }
}

impl<K: Ord, V> Default for RedBlackTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RedBlackTree<K, V> {
    pub fn with_callbacks(callbacks: Callbacks<K, V>) -> Self {
        Self {
            nodes: vec![Node::sentinel()],
            free: Vec::new(),
            root: NIL,
            size: 0,
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &Callbacks<K, V> {
        &self.callbacks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    // ========================================================================
    // Node access
    // ========================================================================

    #[inline]
    fn parent(&self, node: NodeId) -> NodeId {
        self.nodes[node].parent
    }

    #[inline]
    fn left(&self, node: NodeId) -> NodeId {
        self.nodes[node].left
    }

    #[inline]
    fn right(&self, node: NodeId) -> NodeId {
        self.nodes[node].right
    }

    #[inline]
    fn color(&self, node: NodeId) -> Color {
        self.nodes[node].color
    }

    #[inline]
    fn set_color(&mut self, node: NodeId, color: Color) {
        self.nodes[node].color = color;
    }

    fn entry(&self, node: NodeId) -> &(K, V) {
        match &self.nodes[node].entry {
            Some(entry) => entry,
            None => trap!(InvalidState, "red-black node {} holds no entry", node),
        }
    }

    #[inline]
    fn key(&self, node: NodeId) -> &K {
        &self.entry(node).0
    }

    fn allocate_node(&mut self, key: K, value: V, parent: NodeId) -> NodeId {
        let node = Node {
            entry: Some((key, value)),
            parent,
            left: NIL,
            right: NIL,
            color: Color::Red,
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release_node(&mut self, node: NodeId) -> (K, V) {
        let entry = match self.nodes[node].entry.take() {
            Some(entry) => entry,
            None => trap!(InvalidState, "red-black node {} released twice", node),
        };
        self.nodes[node] = Node::sentinel();
        self.free.push(node);
        entry
    }

    fn free_key(&self, key: K) {
        match self.callbacks.key_free {
            Some(key_free) => key_free(key),
            None => drop(key),
        }
    }

    fn free_value(&self, value: V) {
        match self.callbacks.value_free {
            Some(value_free) => value_free(value),
            None => drop(value),
        }
    }

    fn find(&self, key: &K) -> NodeId {
        let compare = self.callbacks.compare;
        let mut node = self.root;
        while node != NIL {
            match compare(key, self.key(node)) {
                Ordering::Equal => return node,
                Ordering::Less => node = self.left(node),
                Ordering::Greater => node = self.right(node),
            }
        }
        NIL
    }

    fn minimum(&self, mut node: NodeId) -> NodeId {
        while self.left(node) != NIL {
            node = self.left(node);
        }
        node
    }

    fn maximum(&self, mut node: NodeId) -> NodeId {
        while self.right(node) != NIL {
            node = self.right(node);
        }
        node
    }

    fn successor(&self, mut node: NodeId) -> NodeId {
        if self.right(node) != NIL {
            return self.minimum(self.right(node));
        }
        let mut parent = self.parent(node);
        while parent != NIL && node == self.right(parent) {
            node = parent;
            parent = self.parent(parent);
        }
        parent
    }

    // ========================================================================
    // Rotations
    // ========================================================================

    /// Replace `old` with `new` in `old`'s parent
    fn replace_child(&mut self, old: NodeId, new: NodeId) {
        let parent = self.parent(old);
        if parent == NIL {
            self.root = new;
        } else if old == self.left(parent) {
            self.nodes[parent].left = new;
        } else {
            self.nodes[parent].right = new;
        }
        self.nodes[new].parent = parent;
    }

    fn rotate_left(&mut self, node: NodeId) {
        let pivot = self.right(node);
        let inner = self.left(pivot);
        self.nodes[node].right = inner;
        if inner != NIL {
            self.nodes[inner].parent = node;
        }
        self.replace_child(node, pivot);
        self.nodes[pivot].left = node;
        self.nodes[node].parent = pivot;
    }

    fn rotate_right(&mut self, node: NodeId) {
        let pivot = self.left(node);
        let inner = self.right(pivot);
        self.nodes[node].left = inner;
        if inner != NIL {
            self.nodes[inner].parent = node;
        }
        self.replace_child(node, pivot);
        self.nodes[pivot].right = node;
        self.nodes[node].parent = pivot;
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert `key` with `value`
    ///
    /// An equal key already present is updated in place: its old key and
    /// value are freed through the callbacks and the new pair installed.
    pub fn insert(&mut self, key: K, value: V) {
        let compare = self.callbacks.compare;
        let mut parent = NIL;
        let mut node = self.root;
        let mut go_left = false;

        while node != NIL {
            parent = node;
            match compare(&key, self.key(node)) {
                Ordering::Equal => {
                    if let Some((old_key, old_value)) = self.nodes[node].entry.replace((key, value)) {
                        self.free_key(old_key);
                        self.free_value(old_value);
                    }
                    return;
                }
                Ordering::Less => {
                    go_left = true;
                    node = self.left(node);
                }
                Ordering::Greater => {
                    go_left = false;
                    node = self.right(node);
                }
            }
        }

        let node = self.allocate_node(key, value, parent);
        if parent == NIL {
            self.root = node;
        } else if go_left {
            self.nodes[parent].left = node;
        } else {
            self.nodes[parent].right = node;
        }
        self.size += 1;
        self.fix_insert(node);
    }

    fn fix_insert(&mut self, mut node: NodeId) {
        while self.color(self.parent(node)) == Color::Red {
            let parent = self.parent(node);
            let grandparent = self.parent(parent);

            if parent == self.left(grandparent) {
                let uncle = self.right(grandparent);
                if self.color(uncle) == Color::Red {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    node = grandparent;
                } else {
                    if node == self.right(parent) {
                        node = parent;
                        self.rotate_left(node);
                    }
                    let parent = self.parent(node);
                    let grandparent = self.parent(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.left(grandparent);
                if self.color(uncle) == Color::Red {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    node = grandparent;
                } else {
                    if node == self.left(parent) {
                        node = parent;
                        self.rotate_right(node);
                    }
                    let parent = self.parent(node);
                    let grandparent = self.parent(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.rotate_left(grandparent);
                }
            }
        }
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Unlink `node`, rebalance, and hand back its entry
    ///
    /// A node with two children is replaced by its in-order successor, which
    /// takes over its position and color.
    fn unlink(&mut self, node: NodeId) -> (K, V) {
        let mut removed_color = self.color(node);
        let fixup;

        if self.left(node) == NIL {
            fixup = self.right(node);
            self.replace_child(node, fixup);
        } else if self.right(node) == NIL {
            fixup = self.left(node);
            self.replace_child(node, fixup);
        } else {
            let successor = self.minimum(self.right(node));
            removed_color = self.color(successor);
            fixup = self.right(successor);

            if self.parent(successor) == node {
                self.nodes[fixup].parent = successor;
            } else {
                self.replace_child(successor, fixup);
                let right = self.right(node);
                self.nodes[successor].right = right;
                self.nodes[right].parent = successor;
            }

            self.replace_child(node, successor);
            let left = self.left(node);
            self.nodes[successor].left = left;
            self.nodes[left].parent = successor;
            self.set_color(successor, self.color(node));
        }

        self.size -= 1;
        if removed_color == Color::Black {
            self.fix_remove(fixup);
        }
        self.nodes[NIL].parent = NIL;
        self.release_node(node)
    }

    fn fix_remove(&mut self, mut node: NodeId) {
        while node != self.root && self.color(node) == Color::Black {
            let parent = self.parent(node);

            if node == self.left(parent) {
                let mut sibling = self.right(parent);
                if self.color(sibling) == Color::Red {
                    self.set_color(sibling, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_left(parent);
                    sibling = self.right(self.parent(node));
                }

                if self.color(self.left(sibling)) == Color::Black && self.color(self.right(sibling)) == Color::Black {
                    self.set_color(sibling, Color::Red);
                    node = self.parent(node);
                } else {
                    if self.color(self.right(sibling)) == Color::Black {
                        let near = self.left(sibling);
                        self.set_color(near, Color::Black);
                        self.set_color(sibling, Color::Red);
                        self.rotate_right(sibling);
                        sibling = self.right(self.parent(node));
                    }
                    let parent = self.parent(node);
                    self.set_color(sibling, self.color(parent));
                    self.set_color(parent, Color::Black);
                    let far = self.right(sibling);
                    self.set_color(far, Color::Black);
                    self.rotate_left(parent);
                    node = self.root;
                }
            } else {
                let mut sibling = self.left(parent);
                if self.color(sibling) == Color::Red {
                    self.set_color(sibling, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_right(parent);
                    sibling = self.left(self.parent(node));
                }

                if self.color(self.left(sibling)) == Color::Black && self.color(self.right(sibling)) == Color::Black {
                    self.set_color(sibling, Color::Red);
                    node = self.parent(node);
                } else {
                    if self.color(self.left(sibling)) == Color::Black {
                        let near = self.right(sibling);
                        self.set_color(near, Color::Black);
                        self.set_color(sibling, Color::Red);
                        self.rotate_left(sibling);
                        sibling = self.left(self.parent(node));
                    }
                    let parent = self.parent(node);
                    self.set_color(sibling, self.color(parent));
                    self.set_color(parent, Color::Black);
                    let far = self.left(sibling);
                    self.set_color(far, Color::Black);
                    self.rotate_right(parent);
                    node = self.root;
                }
            }
        }
        self.set_color(node, Color::Black);
    }

    /// Remove `key`, returning its value to the caller
    ///
    /// The stored key is freed through the callbacks; the value is not.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let node = self.find(key);
        if node == NIL {
            return None;
        }
        let (key, value) = self.unlink(node);
        self.free_key(key);
        Some(value)
    }

    /// Remove `key`, freeing both the key and the value; true if present
    pub fn remove_and_destroy(&mut self, key: &K) -> bool {
        let node = self.find(key);
        if node == NIL {
            return false;
        }
        let (key, value) = self.unlink(node);
        self.free_key(key);
        self.free_value(value);
        true
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, key: &K) -> Option<&V> {
        match self.find(key) {
            NIL => None,
            node => Some(&self.entry(node).1),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key) != NIL
    }

    /// Smallest key
    pub fn first_key(&self) -> Option<&K> {
        match self.root {
            NIL => None,
            root => Some(self.key(self.minimum(root))),
        }
    }

    /// Largest key
    pub fn last_key(&self) -> Option<&K> {
        match self.root {
            NIL => None,
            root => Some(self.key(self.maximum(root))),
        }
    }

    /// Entries in ascending key order
    pub fn iter(&self) -> Iter<'_, K, V> {
        let next = match self.root {
            NIL => NIL,
            root => self.minimum(root),
        };
        Iter {
            tree: self,
            next,
            remaining: self.size,
        }
    }

    pub fn keys(&self) -> Vec<&K> {
        self.iter().map(|(key, _)| key).collect()
    }

    pub fn values(&self) -> Vec<&V> {
        self.iter().map(|(_, value)| value).collect()
    }

    /// Same keys by the comparator and pairwise equal values, in order
    ///
    /// Values compare with the `value_equals` callback. Without one they
    /// compare by identity: the stored values must be the same instances,
    /// which for owned values holds only when `other` is `self`. Use
    /// `equals_by_value` to fall back to `PartialEq` instead.
    pub fn equals(&self, other: &Self) -> bool {
        match self.callbacks.value_equals {
            Some(value_equals) => self.equals_with(other, value_equals),
            None => self.equals_with(other, |v1: &V, v2: &V| core::ptr::eq(v1, v2)),
        }
    }

    /// `equals`, with `PartialEq` standing in for a missing `value_equals`
    pub fn equals_by_value(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        match self.callbacks.value_equals {
            Some(value_equals) => self.equals_with(other, value_equals),
            None => self.equals_with(other, |v1: &V, v2: &V| v1 == v2),
        }
    }

    fn equals_with(&self, other: &Self, value_equals: impl Fn(&V, &V) -> bool) -> bool {
        let compare = self.callbacks.compare;
        self.size == other.size
            && self
                .iter()
                .zip(other.iter())
                .all(|((k1, v1), (k2, v2))| compare(k1, k2) == Ordering::Equal && value_equals(v1, v2))
    }

    /// Independent tree with the same callbacks and copied entries
    ///
    /// Uses the copy callbacks when present, `Clone` otherwise.
    pub fn copy(&self) -> Self
    where
        K: Clone,
        V: Clone,
    {
        let mut copy = Self::with_callbacks(self.callbacks);
        for (key, value) in self.iter() {
            let key = self.callbacks.key_copy.map_or_else(|| key.clone(), |key_copy| key_copy(key));
            let value = self
                .callbacks
                .value_copy
                .map_or_else(|| value.clone(), |value_copy| value_copy(value));
            copy.insert(key, value);
        }
        copy
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Number of black nodes on every root-to-nil path, if they agree
    pub fn black_height(&self) -> Option<usize> {
        self.subtree_black_height(self.root)
    }

    fn subtree_black_height(&self, node: NodeId) -> Option<usize> {
        if node == NIL {
            return Some(1);
        }
        let left = self.subtree_black_height(self.left(node))?;
        let right = self.subtree_black_height(self.right(node))?;
        if left != right {
            return None;
        }
        Some(left + usize::from(self.color(node) == Color::Black))
    }

    /// Check every structural property of the tree
    ///
    /// Root and sentinel are black, no red node has a red child, black
    /// heights agree, parent links are consistent, keys ascend strictly in
    /// order and the size matches the node count.
    pub fn check_invariants(&self) -> bool {
        if self.color(self.root) != Color::Black || self.color(NIL) != Color::Black {
            return false;
        }
        if self.root != NIL && self.parent(self.root) != NIL {
            return false;
        }
        if self.black_height().is_none() {
            return false;
        }

        let mut count = 0;
        let mut stack = Vec::new();
        if self.root != NIL {
            stack.push(self.root);
        }
        while let Some(node) = stack.pop() {
            count += 1;
            for child in [self.left(node), self.right(node)] {
                if child == NIL {
                    continue;
                }
                if self.parent(child) != node {
                    return false;
                }
                if self.color(node) == Color::Red && self.color(child) == Color::Red {
                    return false;
                }
                stack.push(child);
            }
        }

        let compare = self.callbacks.compare;
        let ascending = self
            .keys()
            .windows(2)
            .all(|pair| compare(pair[0], pair[1]) == Ordering::Less);

        ascending && count == self.size
    }
}

impl<K, V> Drop for RedBlackTree<K, V> {
    fn drop(&mut self) {
        let entries: Vec<(K, V)> = self.nodes.iter_mut().filter_map(|node| node.entry.take()).collect();
        for (key, value) in entries {
            self.free_key(key);
            self.free_value(value);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for RedBlackTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// In-order iterator over a `RedBlackTree`
pub struct Iter<'a, K, V> {
    tree: &'a RedBlackTree<K, V>,
    next: NodeId,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NIL {
            return None;
        }
        let node = self.next;
        self.next = self.tree.successor(node);
        self.remaining -= 1;
        let (key, value) = self.tree.entry(node);
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a RedBlackTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
