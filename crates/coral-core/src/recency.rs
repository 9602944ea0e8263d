//! Exact-LRU recency tracking.
//!
//! A doubly-linked list of keys ordered most-recent-first, backed by a
//! slab of nodes with index links instead of pointers, plus a key→node
//! map for O(1) lookup. Every live key appears in the list exactly
//! once; the tail is always the eviction victim.

use ahash::AHashMap;
use bytes::Bytes;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: Bytes,
    prev: usize,
    next: usize,
}

/// Most-recent-first key ordering with O(1) touch, remove, and tail pop.
#[derive(Debug)]
pub struct RecencyList {
    nodes: Vec<Node>,
    index: AHashMap<Bytes, usize>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl Default for RecencyList {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyList {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: AHashMap::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Marks `key` as most recently used, inserting it if unseen.
    pub fn touch(&mut self, key: &Bytes) {
        if let Some(&idx) = self.index.get(key) {
            if self.head != idx {
                self.unlink(idx);
                self.link_front(idx);
            }
            return;
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Node {
                    key: key.clone(),
                    prev: NIL,
                    next: NIL,
                };
                idx
            }
            None => {
                self.nodes.push(Node {
                    key: key.clone(),
                    prev: NIL,
                    next: NIL,
                });
                self.nodes.len() - 1
            }
        };
        self.index.insert(key.clone(), idx);
        self.link_front(idx);
    }

    /// Removes `key` from the list. Returns `true` if it was present.
    pub fn remove(&mut self, key: &Bytes) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.unlink(idx);
                self.free.push(idx);
                true
            }
            None => false,
        }
    }

    /// Removes and returns the least-recently-used key.
    pub fn pop_tail(&mut self) -> Option<Bytes> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        let key = self.nodes[idx].key.clone();
        self.unlink(idx);
        self.index.remove(&key);
        self.free.push(idx);
        Some(key)
    }

    /// The least-recently-used key, if any.
    pub fn tail_key(&self) -> Option<&Bytes> {
        (self.tail != NIL).then(|| &self.nodes[self.tail].key)
    }

    /// The most-recently-used key, if any.
    pub fn front_key(&self) -> Option<&Bytes> {
        (self.head != NIL).then(|| &self.nodes[self.head].key)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }
}
