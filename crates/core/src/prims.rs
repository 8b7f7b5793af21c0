//! Frozen primitive-ID table
//!
//! These IDs are the compatibility surface between compiled blobs and the
//! engine: the assembly backend can be rebuilt without invalidating
//! previously compiled code, so the numbers never change.

/// Inline i64 literal marker (8-byte payload follows the tag).
pub const PRIM_LIT: u16 = 0;

pub const PRIM_ADD: u16 = 1;
pub const PRIM_SUB: u16 = 2;
pub const PRIM_MUL: u16 = 3;
pub const PRIM_DIV: u16 = 4;
pub const PRIM_MOD: u16 = 5;

pub const PRIM_DUP: u16 = 6;
pub const PRIM_DROP: u16 = 7;
pub const PRIM_SWAP: u16 = 8;
pub const PRIM_OVER: u16 = 9;
pub const PRIM_ROT: u16 = 10;

pub const PRIM_EQ: u16 = 11;
pub const PRIM_NE: u16 = 12;
pub const PRIM_LT: u16 = 13;
pub const PRIM_GT: u16 = 14;
pub const PRIM_LE: u16 = 15;
pub const PRIM_GE: u16 = 16;

pub const PRIM_AND: u16 = 17;
pub const PRIM_OR: u16 = 18;
pub const PRIM_XOR: u16 = 19;
pub const PRIM_NOT: u16 = 20;
pub const PRIM_LSHIFT: u16 = 21;
pub const PRIM_RSHIFT: u16 = 22;
pub const PRIM_ARSHIFT: u16 = 23;

pub const PRIM_LAND: u16 = 24;
pub const PRIM_LOR: u16 = 25;
pub const PRIM_LNOT: u16 = 26;
pub const PRIM_ZEROP: u16 = 27;
pub const PRIM_ZEROGT: u16 = 28;
pub const PRIM_ZEROLT: u16 = 29;

pub const PRIM_FETCH: u16 = 30;
pub const PRIM_STORE: u16 = 31;
pub const PRIM_CFETCH: u16 = 32;
pub const PRIM_CSTORE: u16 = 33;

pub const PRIM_TOR: u16 = 34;
pub const PRIM_FROMR: u16 = 35;
pub const PRIM_RFETCH: u16 = 36;
pub const PRIM_RDROP: u16 = 37;
pub const PRIM_TWOTOR: u16 = 38;
pub const PRIM_TWOFROMR: u16 = 39;

pub const PRIM_BRANCH: u16 = 40;
pub const PRIM_0BRANCH: u16 = 41;
pub const PRIM_EXECUTE: u16 = 42;
pub const PRIM_I0: u16 = 43;

pub const PRIM_FREE: u16 = 44;
pub const PRIM_ALLOC: u16 = 45;
pub const PRIM_IDENTITY: u16 = 46;
pub const PRIM_MEMCPY: u16 = 47;

pub const PRIM_ARRAY_LEN: u16 = 48;
pub const PRIM_STR_LEN: u16 = 49;
pub const PRIM_MUT: u16 = 50;
pub const PRIM_ARRAY_AT: u16 = 51;
pub const PRIM_ARRAY_SET: u16 = 52;
pub const PRIM_ARRAY_FILL: u16 = 53;
pub const PRIM_ARRAY_REV: u16 = 54;
pub const PRIM_ARRAY_CONCAT: u16 = 55;

/// Number of assigned primitive IDs (0..PRIM_COUNT).
pub const PRIM_COUNT: u16 = 56;

/// Size of the engine's fixed dispatch table.
pub const DISPATCH_TABLE_SIZE: usize = 256;
