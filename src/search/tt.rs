use crate::board::Move6;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub key: u64,
    pub depth: u32,
    pub score: f64,
    pub best: Option<Move6>,
    pub bound: Bound,
}

/// Transposition table keyed by (board, side to move, move number) hashes.
/// Bounded at `capacity`; overflow keeps the deepest 80% of entries, and a
/// shallower result never displaces a deeper one under the same key.
pub struct Tt {
    map: HashMap<u64, Entry>,
    capacity: usize,
}

pub const DEFAULT_TT_CAPACITY: usize = 1_000_000;

impl Tt {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Tt {
            map: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: u64) -> Option<&Entry> {
        self.map.get(&key)
    }

    pub fn put(&mut self, e: Entry) {
        if let Some(cur) = self.map.get(&e.key) {
            if cur.depth > e.depth {
                return;
            }
        }
        self.map.insert(e.key, e);
        if self.map.len() > self.capacity {
            self.shrink();
        }
    }

    fn shrink(&mut self) {
        let keep = (self.capacity * 4) / 5;
        let mut entries: Vec<Entry> = self.map.drain().map(|(_, e)| e).collect();
        entries.sort_by(|a, b| b.depth.cmp(&a.depth));
        entries.truncate(keep);
        self.map = entries.into_iter().map(|e| (e.key, e)).collect();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl Default for Tt {
    fn default() -> Self {
        Self::new()
    }
}
