//! On-heap value layout
//!
//! Arrays and strings share a 32-byte header followed by their payload:
//!
//! ```text
//! offset  0  count      u64   element count (string: byte length sans NUL)
//! offset  8  elem_size  u8    bytes per element (8 for arrays, 1 for strings)
//! offset  9  padding    7 bytes
//! offset 16  elem_type  u64   type tag of the elements (0 = untyped)
//! offset 24  reserved   u64
//! offset 32  payload    count * elem_size bytes (strings append a NUL)
//! ```
//!
//! The compiler's array-literal lowering writes this header with emitted
//! code, the compiler's string literals bake it into DATA blobs, and the
//! runtime's array/string primitives read it back.

pub const HEADER_SIZE: u64 = 32;
pub const COUNT_OFFSET: u64 = 0;
pub const ELEM_SIZE_OFFSET: u64 = 8;
pub const ELEM_TYPE_OFFSET: u64 = 16;
pub const PAYLOAD_OFFSET: u64 = 32;

/// Element size used by array values.
pub const ARRAY_ELEM_SIZE: u8 = 8;

/// Element size used by string values.
pub const STRING_ELEM_SIZE: u8 = 1;
