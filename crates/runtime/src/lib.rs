//! Weft Runtime: the threaded-code inner interpreter
//!
//! The engine consumes cell arrays produced by the loader: a stream of
//! packed [`weft_core::Cell`] values where `Xt` cells either dispatch a
//! primitive, call another cell array, or return (`Xt(0)` = EXIT), and
//! `Lit` cells push a value on the operand stack.
//!
//! The compiler treats this crate as an opaque dispatch surface: it
//! registers primitive IDs to obtain stable addresses, hands over a cell
//! array to run, and reads the operand stack afterwards.

pub mod engine;
pub mod error;
pub mod heap;

pub use engine::Engine;
pub use error::VmError;
pub use heap::Heap;
