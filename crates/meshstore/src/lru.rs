//! Weight-bounded LRU (Least Recently Used) list
//!
//! Entries live in a slab of nodes linked into a doubly-linked recency list,
//! so lookups, promotion and eviction are all O(1). Capacity is a total
//! weight, not an entry count.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use ahash::RandomState;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    weight: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU list whose total entry weight is kept at or under `max_weight`.
///
/// A `max_weight` of zero disables eviction. Not thread-safe on its own;
/// the store wraps it in a mutex.
pub struct LruCache<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    weight: usize,
    max_weight: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty list bounded by `max_weight` (0 = unbounded)
    pub fn new(max_weight: usize) -> Self {
        Self {
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            head: None,
            tail: None,
            free_list: Vec::new(),
            weight: 0,
            max_weight,
        }
    }

    /// Look up `key`, promoting it to most-recently-used on a hit
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.promote(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or replace `key`, then evict from the tail until the total
    /// weight fits. Returns the evicted `(key, value)` pairs, oldest first.
    pub fn put(&mut self, key: K, value: V, weight: usize) -> Vec<(K, V)> {
        match self.map.get(&key).copied() {
            Some(idx) => {
                if let Some(node) = self.slot(idx) {
                    let old_weight = std::mem::replace(&mut node.weight, weight);
                    node.value = value;
                    self.weight = self.weight - old_weight + weight;
                }
                self.promote(idx);
            }
            None => {
                let node = Node {
                    key: key.clone(),
                    value,
                    weight,
                    prev: None,
                    next: None,
                };
                let idx = match self.free_list.pop() {
                    Some(idx) => {
                        self.nodes[idx] = Some(node);
                        idx
                    }
                    None => {
                        self.nodes.push(Some(node));
                        self.nodes.len() - 1
                    }
                };
                self.attach_front(idx);
                self.map.insert(key, idx);
                self.weight += weight;
            }
        }

        let mut evicted = Vec::new();
        if self.max_weight == 0 {
            return evicted;
        }
        while self.weight > self.max_weight {
            match self.pop_lru() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    /// Remove and return the least-recently-used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let tail_idx = self.tail?;
        self.detach(tail_idx);
        let node = self.nodes[tail_idx].take()?;
        self.map.remove(&node.key);
        self.free_list.push(tail_idx);
        self.weight -= node.weight;
        Some((node.key, node.value))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sum of entry weights
    pub fn weight(&self) -> usize {
        self.weight
    }

    /// Weight bound (0 = unbounded)
    pub fn max_weight(&self) -> usize {
        self.max_weight
    }

    fn slot(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(idx).and_then(Option::as_mut)
    }

    fn promote(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.detach(idx);
            self.attach_front(idx);
        }
    }

    /// Splice `idx` out of the recency list, leaving its links cleared
    fn detach(&mut self, idx: usize) {
        let Some(node) = self.slot(idx) else { return };
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev.and_then(|p| self.slot(p)) {
            Some(before) => before.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.slot(n)) {
            Some(after) => after.prev = prev,
            None => self.tail = prev,
        }
    }

    /// Link a detached `idx` in as the most-recently-used entry
    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head.replace(idx);
        if let Some(node) = self.slot(idx) {
            node.next = old_head;
        }
        match old_head.and_then(|h| self.slot(h)) {
            Some(head) => head.prev = Some(idx),
            None => self.tail = Some(idx),
        }
    }
}
