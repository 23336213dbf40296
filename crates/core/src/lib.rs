//! Ember Core: values, the object heap, and the bytecode chunk format.
//!
//! This crate holds the pieces shared by the compiler and the VM: the
//! tagged [`Value`] union, the [`Heap`] that owns every allocated
//! [`Obj`] and interns strings, and [`Chunk`], the growable byte vector
//! plus parallel line table and constant pool that a compiled function
//! carries around.
//!
//! # Modules
//!
//! - `value`: the `Value` enum and its truthiness/equality semantics
//! - `object`: heap object kinds (string, list, function, native)
//! - `heap`: arena owning every `Obj`, with string interning
//! - `intern`: open-addressing string table used by the heap
//! - `chunk`: bytecode chunk (code, line table, constant pool) and opcodes

pub mod chunk;
pub mod heap;
pub mod intern;
pub mod object;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use heap::Heap;
pub use object::{FunctionObj, NativeFn, NativeObj, Obj, ObjHandle, StrObj};
pub use value::{Value, is_falsey, values_equal};
