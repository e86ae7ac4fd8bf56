//! Row cache: bounded, least-recently-used map from row number to row text.
//!
//! Entries live in a slab; a doubly linked list threaded through the slab
//! tracks recency, with the most recently used row at the head. Freed slots
//! are reused so the slab never grows past `capacity`.

use hashbrown::HashMap;

struct Slot {
    row: usize,
    text: String,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded LRU cache of raw row text.
pub struct RowCache {
    capacity: usize,
    map: HashMap<usize, usize>,
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl RowCache {
    /// Create a cache holding at most `capacity` rows (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Cached text for `row`, marking it most recently used.
    pub fn get(&mut self, row: usize) -> Option<&str> {
        let index = *self.map.get(&row)?;
        self.unlink(index);
        self.push_front(index);
        self.slots[index].as_ref().map(|s| s.text.as_str())
    }

    /// Insert or replace `row`, evicting the least recently used row when full.
    pub fn put(&mut self, row: usize, text: String) {
        if let Some(&index) = self.map.get(&row) {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.text = text;
            }
            self.unlink(index);
            self.push_front(index);
            return;
        }

        if self.map.len() >= self.capacity {
            self.evict();
        }

        let slot = Slot { row, text, prev: None, next: None };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.map.insert(row, index);
        self.push_front(index);
    }

    /// Drop the entry for `row`, returning its text.
    pub fn remove(&mut self, row: usize) -> Option<String> {
        let index = self.map.remove(&row)?;
        self.unlink(index);
        self.free.push(index);
        self.slots[index].take().map(|s| s.text)
    }

    pub fn contains(&self, row: usize) -> bool {
        self.map.contains_key(&row)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    fn evict(&mut self) {
        if let Some(tail) = self.tail {
            if let Some(row) = self.slots[tail].as_ref().map(|s| s.row) {
                self.remove(row);
            }
        }
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = match self.slots[index].as_ref() {
            Some(slot) => (slot.prev, slot.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(slot) = self.slots[p].as_mut() {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(slot) = self.slots[n].as_mut() {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(slot) = self.slots[index].as_mut() {
            slot.prev = None;
            slot.next = None;
        }
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(slot) = self.slots[index].as_mut() {
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(slot) = self.slots[h].as_mut() {
                slot.prev = Some(index);
            }
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let mut cache = RowCache::new(4);
        cache.put(0, "a|b".into());
        cache.put(1, "c|d".into());
        assert_eq!(cache.get(0), Some("a|b"));
        assert_eq!(cache.get(1), Some("c|d"));
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_replace_keeps_len() {
        let mut cache = RowCache::new(4);
        cache.put(0, "old".into());
        cache.put(0, "new".into());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(0), Some("new"));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = RowCache::new(2);
        cache.put(0, "zero".into());
        cache.put(1, "one".into());

        // Touch 0 so 1 becomes the eviction candidate
        assert!(cache.get(0).is_some());
        cache.put(2, "two".into());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = RowCache::new(8);
        for row in 0..100 {
            cache.put(row, format!("row{}", row));
            assert!(cache.len() <= 8);
        }
        // The last 8 rows survive
        for row in 92..100 {
            assert!(cache.contains(row));
        }
        assert!(cache.slots.len() <= 8);
    }

    #[test]
    fn test_remove_and_reuse_slot() {
        let mut cache = RowCache::new(3);
        cache.put(0, "a".into());
        cache.put(1, "b".into());
        assert_eq!(cache.remove(0), Some("a".to_string()));
        assert_eq!(cache.remove(0), None);
        cache.put(5, "f".into());
        assert_eq!(cache.slots.len(), 2);
        assert_eq!(cache.get(5), Some("f"));
        assert_eq!(cache.get(1), Some("b"));
    }

    #[test]
    fn test_clear() {
        let mut cache = RowCache::new(3);
        cache.put(0, "a".into());
        cache.put(1, "b".into());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(0), None);
        cache.put(2, "c".into());
        assert_eq!(cache.get(2), Some("c"));
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = RowCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(0, "a".into());
        cache.put(1, "b".into());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1), Some("b"));
    }
}
