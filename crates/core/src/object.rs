//! Heap object kinds: strings, lists, functions, and natives.

use crate::chunk::Chunk;
use crate::value::Value;

/// A handle into [`crate::heap::Heap`]. Two handles compare equal iff they
/// name the same heap slot, which is what gives interned strings (and
/// every other object kind) pointer-identity equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle(pub(crate) u32);

impl ObjHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned byte string with its precomputed FNV-1a hash.
#[derive(Debug, Clone)]
pub struct StrObj {
    pub bytes: Box<[u8]>,
    pub hash: u32,
}

impl StrObj {
    pub fn as_str(&self) -> &str {
        // Source text is UTF-8 and we never split multi-byte sequences
        // when slicing lexemes, so this always succeeds.
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }
}

/// A compiled function: fixed arity, its own chunk, and an optional name
/// (absent for the implicit top-level `<script>` function).
#[derive(Debug, Clone)]
pub struct FunctionObj {
    pub arity: u8,
    pub chunk: Chunk,
    pub name: Option<ObjHandle>,
}

impl FunctionObj {
    pub fn new(arity: u8, name: Option<ObjHandle>) -> Self {
        FunctionObj {
            arity,
            chunk: Chunk::new(),
            name,
        }
    }
}

/// A native function's Rust-side implementation: given the heap (for
/// allocating/mutating objects) and the argument slice, produce a value
/// or a runtime error message.
pub type NativeFn = fn(&mut crate::heap::Heap, &[Value]) -> Result<Value, String>;

/// A builtin wrapping a Rust callback.
pub struct NativeObj {
    pub name: &'static str,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeObj({})", self.name)
    }
}

/// Every kind of heap-allocated object.
#[derive(Debug)]
pub enum Obj {
    Str(StrObj),
    List(Vec<Value>),
    Function(FunctionObj),
    Native(NativeObj),
}
