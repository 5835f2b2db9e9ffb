//! Compiler-visible layouts for the barert runtime.
//!
//! Everything in this crate is a contract with the ahead-of-time code
//! generator: generated code reads and writes these structures by fixed
//! offsets, so every type is `#[repr(C)]` and the offsets are checked by
//! compile-time assertions next to each definition.
//!
//! - [`layout`]: type descriptors, object/array/string headers, delegates
//! - [`cells`]: static-construction contexts and external-symbol fixup cells
//! - [`console`]: values passed across the console entry points

#![cfg_attr(not(test), no_std)]

pub mod cells;
pub mod console;
pub mod layout;

pub use cells::{ModuleFixupCell, MethodFixupCell, StaticClassConstructionContext};
pub use console::{ConsoleColor, ConsoleKey, ConsoleKeyInfo};
pub use layout::{
    ARRAY_BASE_SIZE, ARRAY_DATA_OFFSET, ArrayHeader, DelegateObject, ObjectHeader,
    STRING_BASE_SIZE, STRING_DATA_OFFSET, StringHeader, TypeDescriptor, TypeFlags,
};
