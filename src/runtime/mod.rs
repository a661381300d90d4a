//! Reference-counted runtime library.
//!
//! Every heap value (strings, arrays, objects) starts with a shared
//! [`heap::HeapHeader`] that carries an atomic refcount. Rust handles
//! (`RtString`, `RtArray<T>`, `RtObj<T>`) retain on `Clone` and release on
//! `Drop`; the last release runs the block's finalizer and frees it.
//!
//! Sharing implies immutability. Code that mutates a container it does not
//! uniquely own must copy first (`make_unique`); nothing here copies behind
//! the caller's back except growth paths that reallocate anyway.
//!
//! Unrecoverable conditions call [`trap::rt_trap`], which never returns.

pub mod array;
pub mod channels;
pub mod console;
pub mod date;
pub mod heap;
pub mod linewriter;
pub mod list;
pub mod math;
pub mod object;
pub mod string;
pub mod trap;
pub mod trie;

pub use array::{RtArray, RtStrArray};
pub use list::RtListI64;
pub use object::{FieldValue, RtInstance, RtObj};
pub use string::RtString;
pub use trap::{catch_trap, rt_trap, Trap, TrapKind};
pub use trie::{RtTrie, TrieValue};
