//! Weft Core: the shared IR foundation for the Weft compiler and runtime
//!
//! This crate defines everything the compiler, loader, and engine must agree
//! on byte-for-byte:
//!
//! - `cells`: the 64-bit tagged cell that is both the runtime instruction
//!   format and the legacy IR unit
//! - `blob`: the variable-length tag stream persisted in content-addressed
//!   blobs, and the blob kind identifiers
//! - `cid`: 32-byte SHA-256 content identifiers
//! - `prims`: the frozen primitive-ID table
//! - `layout`: the 32-byte heap header shared by array and string values

pub mod blob;
pub mod cells;
pub mod cid;
pub mod layout;
pub mod prims;

pub use blob::{BlobBuffer, BlobKind, BlobStreamError, BlobTag, TagReader};
pub use cells::{Cell, CellError, EXIT, LIT_MAX, LIT_MIN};
pub use cid::Cid;
