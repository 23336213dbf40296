//! Open-addressing string interning table with tombstones.
//!
//! This mirrors the classic "find the canonical string or tell me where
//! to put it" table used by tree-walking and bytecode interpreters in
//! this family: probe from `hash mod capacity`, first empty-or-tombstone
//! slot wins an insert, and [`StringTable::find`] walks the full probe
//! sequence (skipping tombstones) comparing by hash then bytes.

use crate::object::{Obj, ObjHandle};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over raw bytes.
pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD_FACTOR: f64 = 0.75;

#[derive(Clone, Copy)]
enum Slot {
    Empty,
    Tombstone,
    Occupied { handle: ObjHandle, hash: u32 },
}

/// Entries include live occupants and tombstones; `live` counts only the
/// former and is what callers see as the table's length.
pub struct StringTable {
    entries: Vec<Slot>,
    entries_used: usize,
    live: usize,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    pub fn new() -> Self {
        StringTable {
            entries: Vec::new(),
            entries_used: 0,
            live: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns the canonical handle for `bytes` if an equal string was
    /// already interned, comparing candidates by length, hash, then bytes.
    pub fn find(&self, objects: &[Obj], bytes: &[u8], hash: u32) -> Option<ObjHandle> {
        if self.entries.is_empty() {
            return None;
        }
        let cap = self.entries.len();
        let mut index = (hash as usize) % cap;
        loop {
            match self.entries[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { handle, hash: h } => {
                    if h == hash {
                        if let Obj::Str(s) = &objects[handle.index()] {
                            if s.bytes.len() == bytes.len() && s.bytes.as_ref() == bytes {
                                return Some(handle);
                            }
                        }
                    }
                }
            }
            index = (index + 1) % cap;
        }
    }

    /// Records `handle` (already allocated and carrying `hash`) as the
    /// canonical copy. Callers must call [`StringTable::find`] first;
    /// this never checks for an existing duplicate.
    pub fn insert(&mut self, objects: &[Obj], handle: ObjHandle, hash: u32) {
        if self.entries.is_empty() || self.entries_used + 1 > self.capacity_threshold() {
            self.grow(objects);
        }
        let cap = self.entries.len();
        let mut index = (hash as usize) % cap;
        loop {
            match self.entries[index] {
                Slot::Empty => {
                    self.entries[index] = Slot::Occupied { handle, hash };
                    self.entries_used += 1;
                    self.live += 1;
                    return;
                }
                Slot::Tombstone => {
                    self.entries[index] = Slot::Occupied { handle, hash };
                    self.live += 1;
                    return;
                }
                Slot::Occupied { .. } => {}
            }
            index = (index + 1) % cap;
        }
    }

    fn capacity_threshold(&self) -> usize {
        ((self.entries.len().max(INITIAL_CAPACITY)) as f64 * MAX_LOAD_FACTOR) as usize
    }

    fn grow(&mut self, objects: &[Obj]) {
        let new_cap = if self.entries.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.entries.len() * 2
        };
        let old_entries = std::mem::replace(&mut self.entries, vec![Slot::Empty; new_cap]);
        self.entries_used = 0;
        self.live = 0;
        for slot in old_entries {
            if let Slot::Occupied { handle, hash } = slot {
                self.insert_no_grow(objects, handle, hash);
            }
        }
    }

    fn insert_no_grow(&mut self, _objects: &[Obj], handle: ObjHandle, hash: u32) {
        let cap = self.entries.len();
        let mut index = (hash as usize) % cap;
        loop {
            if let Slot::Empty = self.entries[index] {
                self.entries[index] = Slot::Occupied { handle, hash };
                self.entries_used += 1;
                self.live += 1;
                return;
            }
            index = (index + 1) % cap;
        }
    }
}
