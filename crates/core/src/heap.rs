//! The object heap: an append-only arena owning every allocated [`Obj`],
//! plus the string interning table.
//!
//! The original design behind this kind of interpreter links every heap
//! object into an intrusive list so the whole heap can be freed in one
//! pass at shutdown. Rust gives us that for free: `objects` is a plain
//! `Vec<Obj>`, dropping it frees every object exactly once, and a
//! [`ObjHandle`] is just an index rather than a raw pointer.

use crate::intern::{StringTable, fnv1a_hash};
use crate::object::{FunctionObj, NativeFn, NativeObj, Obj, ObjHandle, StrObj};
use crate::value::Value;

pub struct Heap {
    objects: Vec<Obj>,
    strings: StringTable,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: Vec::new(),
            strings: StringTable::new(),
        }
    }

    pub fn get(&self, handle: ObjHandle) -> &Obj {
        &self.objects[handle.index()]
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> &mut Obj {
        &mut self.objects[handle.index()]
    }

    fn alloc(&mut self, obj: Obj) -> ObjHandle {
        self.objects.push(obj);
        ObjHandle((self.objects.len() - 1) as u32)
    }

    /// Interns `bytes`, returning the existing handle if an equal string
    /// is already in the table, or allocating and registering a new one.
    pub fn intern_bytes(&mut self, bytes: &[u8]) -> ObjHandle {
        let hash = fnv1a_hash(bytes);
        if let Some(existing) = self.strings.find(&self.objects, bytes, hash) {
            return existing;
        }
        let handle = self.alloc(Obj::Str(StrObj {
            bytes: bytes.into(),
            hash,
        }));
        self.strings.insert(&self.objects, handle, hash);
        handle
    }

    pub fn intern_str(&mut self, s: &str) -> ObjHandle {
        self.intern_bytes(s.as_bytes())
    }

    /// Interns the concatenation of two strings without materializing an
    /// intermediate owned `String` when the result is already known.
    pub fn concat_strings(&mut self, a: ObjHandle, b: ObjHandle) -> ObjHandle {
        let mut combined = Vec::new();
        if let Obj::Str(s) = self.get(a) {
            combined.extend_from_slice(&s.bytes);
        }
        if let Obj::Str(s) = self.get(b) {
            combined.extend_from_slice(&s.bytes);
        }
        self.intern_bytes(&combined)
    }

    pub fn alloc_list(&mut self, items: Vec<Value>) -> ObjHandle {
        self.alloc(Obj::List(items))
    }

    pub fn alloc_function(&mut self, function: FunctionObj) -> ObjHandle {
        self.alloc(Obj::Function(function))
    }

    pub fn alloc_native(&mut self, name: &'static str, func: NativeFn) -> ObjHandle {
        self.alloc(Obj::Native(NativeObj { name, func }))
    }

    pub fn string_table_len(&self) -> usize {
        self.strings.len()
    }

    /// Looks up the canonical handle for `bytes` without interning,
    /// exposed for tests that check the interning invariant directly.
    pub fn find_string(&self, bytes: &[u8]) -> Option<ObjHandle> {
        let hash = fnv1a_hash(bytes);
        self.strings.find(&self.objects, bytes, hash)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_canonical_handle() {
        let mut heap = Heap::new();
        let a = heap.intern_str("hello");
        let b = heap.intern_str("hello");
        assert_eq!(a, b);
        assert_eq!(heap.string_table_len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_handles() {
        let mut heap = Heap::new();
        let a = heap.intern_str("hello");
        let b = heap.intern_str("world");
        assert_ne!(a, b);
        assert_eq!(heap.string_table_len(), 2);
    }

    #[test]
    fn find_string_matches_interned_copy() {
        let mut heap = Heap::new();
        let handle = heap.intern_str("needle");
        assert_eq!(heap.find_string(b"needle"), Some(handle));
        assert_eq!(heap.find_string(b"haystack"), None);
    }

    #[test]
    fn interning_survives_table_growth() {
        let mut heap = Heap::new();
        let mut handles = Vec::new();
        for i in 0..200 {
            handles.push((i, heap.intern_str(&format!("key-{i}"))));
        }
        for (i, handle) in &handles {
            assert_eq!(heap.find_string(format!("key-{i}").as_bytes()), Some(*handle));
        }
    }

    #[test]
    fn concat_strings_interns_result() {
        let mut heap = Heap::new();
        let a = heap.intern_str("foo");
        let b = heap.intern_str("bar");
        let c = heap.concat_strings(a, b);
        if let Obj::Str(s) = heap.get(c) {
            assert_eq!(s.as_str(), "foobar");
        } else {
            panic!("expected string");
        }
    }
}
