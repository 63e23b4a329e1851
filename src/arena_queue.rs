//! Per-shard ring of arenas with head/active/tail cursors and an index-based `recycle`.
//!
//! Grounded on the original `arenaQueue`'s `alloc`/`recycle` pair, translated from raw
//! pointer links to slot-vector indices (see the design note on avoiding raw pointers):
//! every arena knows only its own id and its neighbours' ids in this queue's slot vector.

use crate::arena::{Arena, NONE};

pub struct ArenaQueue {
    slots: Vec<Arena>,
    head: u32,
    active: u32,
    tail: u32,
}

impl ArenaQueue {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: NONE,
            active: NONE,
            tail: NONE,
        }
    }

    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn active(&self) -> u32 {
        self.active
    }

    pub fn tail(&self) -> u32 {
        self.tail
    }

    pub fn set_active(&mut self, id: u32) {
        self.active = id;
    }

    pub fn get(&self, id: u32) -> &Arena {
        &self.slots[id as usize]
    }

    pub fn get_mut(&mut self, id: u32) -> &mut Arena {
        &mut self.slots[id as usize]
    }

    pub fn next_of(&self, id: u32) -> u32 {
        self.slots[id as usize].next
    }

    pub fn prev_of(&self, id: u32) -> u32 {
        self.slots[id as usize].prev
    }

    pub fn is_empty(&self) -> bool {
        self.head == NONE
    }

    /// Allocates a new arena of `capacity` bytes, reusing the first released slot if one
    /// exists, and appends it to the tail. `prev` is the id of the arena it follows, or
    /// `NONE` when this is the first arena in the queue.
    pub fn alloc(&mut self, prev: u32, capacity: u32) -> std::io::Result<u32> {
        let reused = self.slots.iter().position(|a| a.is_released());
        let id = match reused {
            Some(idx) => {
                self.slots[idx] = Arena::alloc(idx as u32, capacity)?;
                idx as u32
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Arena::alloc(idx, capacity)?);
                idx
            }
        };
        self.slots[id as usize].prev = prev;
        self.slots[id as usize].next = NONE;
        if prev != NONE {
            self.slots[prev as usize].next = id;
        }
        if self.head == NONE {
            self.head = id;
        }
        self.tail = id;
        Ok(id)
    }

    /// Rotates the ring so the arena just after `lo` becomes the new head and `lo`
    /// becomes the new tail, splicing the old head..lo prefix in after the old tail.
    /// `lo = NONE` is a no-op (nothing to recycle yet).
    pub fn recycle(&mut self, lo: u32) {
        if lo == NONE || lo == self.tail {
            return;
        }
        let new_head = self.slots[lo as usize].next;
        if new_head == NONE {
            return;
        }
        let old_head = self.head;
        let old_tail = self.tail;

        self.slots[old_tail as usize].next = old_head;
        self.slots[old_head as usize].prev = old_tail;
        self.slots[lo as usize].next = NONE;
        self.slots[new_head as usize].prev = NONE;

        self.head = new_head;
        self.tail = lo;
    }

    /// Walks `active.next .. tail`, resetting (not releasing) every non-empty arena,
    /// used after `recycle` to make the freed-but-allocated region reusable.
    pub fn reset_post_active(&mut self) -> u32 {
        let mut reset_count = 0u32;
        let mut cur = if self.active == NONE {
            NONE
        } else {
            self.slots[self.active as usize].next
        };
        while cur != NONE {
            let next = self.slots[cur as usize].next;
            if self.slots[cur as usize].used() > 0 {
                self.slots[cur as usize].reset();
                reset_count += 1;
            }
            cur = next;
        }
        reset_count
    }

    /// Counts allocated (not released) arenas strictly after `active`, walking to `tail`.
    pub fn count_post_active(&self) -> u32 {
        let mut count = 0u32;
        let mut cur = if self.active == NONE {
            NONE
        } else {
            self.slots[self.active as usize].next
        };
        while cur != NONE {
            if !self.slots[cur as usize].is_released() {
                count += 1;
            }
            cur = self.slots[cur as usize].next;
        }
        count
    }

    /// Releases `count` arenas walking backward from `tail`, unlinking each as it goes
    /// and moving `tail` to the last surviving arena.
    pub fn release_from_tail(&mut self, count: u32) -> u32 {
        let mut released = 0u32;
        while released < count && self.tail != NONE {
            let cur = self.tail;
            if cur == self.active {
                break;
            }
            let prev = self.slots[cur as usize].prev;
            self.slots[cur as usize].release();
            self.tail = prev;
            if prev != NONE {
                self.slots[prev as usize].next = NONE;
            } else {
                self.head = NONE;
            }
            released += 1;
        }
        released
    }

    /// Releases every arena in the ring and clears all cursors. Terminal operation.
    pub fn release_all(&mut self) -> u32 {
        let mut released = 0u32;
        for a in self.slots.iter_mut() {
            if !a.is_released() {
                a.release();
                released += 1;
            }
        }
        self.head = NONE;
        self.active = NONE;
        self.tail = NONE;
        released
    }

    /// Resets every arena's cursor to zero without releasing allocations.
    pub fn reset_all(&mut self) {
        for a in self.slots.iter_mut() {
            if !a.is_released() {
                a.reset();
            }
        }
        self.active = self.head;
    }
}

impl Default for ArenaQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_links_sequentially() {
        let mut q = ArenaQueue::new();
        let a0 = q.alloc(NONE, 16).unwrap();
        q.set_active(a0);
        let a1 = q.alloc(a0, 16).unwrap();
        assert_eq!(q.head(), a0);
        assert_eq!(q.tail(), a1);
        assert_eq!(q.next_of(a0), a1);
        assert_eq!(q.prev_of(a1), a0);
    }

    #[test]
    fn recycle_rotates_ring() {
        let mut q = ArenaQueue::new();
        let a0 = q.alloc(NONE, 16).unwrap();
        let a1 = q.alloc(a0, 16).unwrap();
        let a2 = q.alloc(a1, 16).unwrap();
        q.set_active(a2);
        // a0 and a1 are fully expired; a2 holds the first surviving entry.
        q.recycle(a1);
        assert_eq!(q.head(), a2);
        assert_eq!(q.tail(), a1);
        assert_eq!(q.next_of(a2), a0);
        assert_eq!(q.next_of(a0), a1);
        assert_eq!(q.next_of(a1), NONE);
    }

    #[test]
    fn release_from_tail_stops_at_active() {
        let mut q = ArenaQueue::new();
        let a0 = q.alloc(NONE, 16).unwrap();
        q.set_active(a0);
        let _a1 = q.alloc(a0, 16).unwrap();
        let _a2 = q.alloc(_a1, 16).unwrap();
        let released = q.release_from_tail(5);
        assert_eq!(released, 2);
        assert_eq!(q.tail(), a0);
    }
}
