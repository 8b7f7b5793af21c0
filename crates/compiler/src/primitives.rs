//! Primitive registration
//!
//! Registers every primitive with the engine (for a stable runtime
//! address), with the dictionary (name, signature, stable ID), and
//! returns the loader's dispatch table. IDs are frozen; see
//! `weft_core::prims`.

use crate::dict::{DictEntry, Dictionary};
use crate::error::CompileError;
use crate::immediate::Immediate;
use crate::types::TypeSig;
use weft_core::prims::*;
use weft_runtime::Engine;

/// Name, ID, and signature for every plain (non-immediate) primitive.
/// Overloads (same name, second signature) are listed adjacently.
const PRIMITIVES: &[(&str, u16, &str)] = &[
    // integer arithmetic
    ("+", PRIM_ADD, "i64 i64 -> i64"),
    ("-", PRIM_SUB, "i64 i64 -> i64"),
    ("*", PRIM_MUL, "i64 i64 -> i64"),
    ("/", PRIM_DIV, "i64 i64 -> i64"),
    ("%", PRIM_MOD, "i64 i64 -> i64"),
    // comparison
    ("=", PRIM_EQ, "i64 i64 -> bool"),
    ("<>", PRIM_NE, "i64 i64 -> bool"),
    ("<", PRIM_LT, "i64 i64 -> bool"),
    (">", PRIM_GT, "i64 i64 -> bool"),
    ("<=", PRIM_LE, "i64 i64 -> bool"),
    (">=", PRIM_GE, "i64 i64 -> bool"),
    // bitwise
    ("&", PRIM_AND, "i64 i64 -> i64"),
    ("|", PRIM_OR, "i64 i64 -> i64"),
    ("^", PRIM_XOR, "i64 i64 -> i64"),
    ("~", PRIM_NOT, "i64 -> i64"),
    ("<<", PRIM_LSHIFT, "i64 i64 -> i64"),
    (">>", PRIM_RSHIFT, "i64 i64 -> i64"),
    (">>>", PRIM_ARSHIFT, "i64 i64 -> i64"),
    // logical
    ("and", PRIM_LAND, "bool bool -> bool"),
    ("or", PRIM_LOR, "bool bool -> bool"),
    ("not", PRIM_LNOT, "bool -> bool"),
    ("0=", PRIM_ZEROP, "i64 -> bool"),
    ("0>", PRIM_ZEROGT, "i64 -> bool"),
    ("0<", PRIM_ZEROLT, "i64 -> bool"),
    // memory
    ("@", PRIM_FETCH, "ptr -> i64"),
    ("!", PRIM_STORE, "i64 ptr ->"),
    ("c@", PRIM_CFETCH, "ptr -> i64"),
    ("c!", PRIM_CSTORE, "i64 ptr ->"),
    // return stack
    (">r", PRIM_TOR, "i64 ->"),
    ("r>", PRIM_FROMR, "-> i64"),
    ("r@", PRIM_RFETCH, "-> i64"),
    ("rdrop", PRIM_RDROP, "->"),
    ("2>r", PRIM_TWOTOR, "i64 i64 ->"),
    ("2r>", PRIM_TWOFROMR, "-> i64 i64"),
    // control
    ("branch", PRIM_BRANCH, "->"),
    ("0branch", PRIM_0BRANCH, "i64 ->"),
    ("execute", PRIM_EXECUTE, "ptr ->"),
    ("i0", PRIM_I0, "-> i64"),
    // heap
    ("free", PRIM_FREE, "ptr ->"),
    ("free", PRIM_FREE, "array ->"),
    ("free", PRIM_FREE, "array_mut ->"),
    ("free", PRIM_FREE, "str_mut ->"),
    ("alloc", PRIM_ALLOC, "i64 -> ptr"),
    ("identity", PRIM_IDENTITY, "a -> a"),
    ("memcpy", PRIM_MEMCPY, "ptr ptr i64 ->"),
    // arrays and strings
    ("array-length", PRIM_ARRAY_LEN, "array -> i64"),
    ("array-length", PRIM_ARRAY_LEN, "array_mut -> i64"),
    ("str-length", PRIM_STR_LEN, "str -> i64"),
    ("str-length", PRIM_STR_LEN, "str_mut -> i64"),
    ("mut", PRIM_MUT, "array -> array_mut"),
    ("mut", PRIM_MUT, "str -> str_mut"),
    ("array-at", PRIM_ARRAY_AT, "array i64 -> i64"),
    ("array-at", PRIM_ARRAY_AT, "array_mut i64 -> i64"),
    ("array-set!", PRIM_ARRAY_SET, "i64 array_mut i64 ->"),
    ("array-fill!", PRIM_ARRAY_FILL, "i64 array_mut ->"),
    ("array-reverse!", PRIM_ARRAY_REV, "array_mut ->"),
    ("array-concat", PRIM_ARRAY_CONCAT, "array array -> array"),
];

/// Unicode spellings registered alongside their ASCII primaries.
const ALIASES: &[(&str, u16, &str)] = &[
    ("≠", PRIM_NE, "i64 i64 -> bool"),
    ("≤", PRIM_LE, "i64 i64 -> bool"),
    ("≥", PRIM_GE, "i64 i64 -> bool"),
    ("_", PRIM_IDENTITY, "a -> a"),
];

/// Register every primitive and immediate word. Returns the dispatch
/// table mapping primitive ID to runtime address (0 = unassigned).
pub fn register_primitives(
    dict: &mut Dictionary,
    engine: &mut Engine,
) -> Result<[u64; DISPATCH_TABLE_SIZE], CompileError> {
    let mut dispatch = [0u64; DISPATCH_TABLE_SIZE];

    for &(name, id, sig_text) in PRIMITIVES.iter().chain(ALIASES) {
        let addr = if dispatch[id as usize] != 0 {
            dispatch[id as usize]
        } else {
            let addr = engine.register_primitive(id);
            dispatch[id as usize] = addr;
            addr
        };
        let sig = TypeSig::parse(sig_text)?;
        dict.add(DictEntry::primitive(name, addr, id, sig));
    }

    // stack rearrangers run at compile time (they shuffle slots too) and
    // still need their runtime primitives in the table
    for (name, handler, id) in [
        ("dup", Immediate::Dup, PRIM_DUP),
        ("drop", Immediate::Drop, PRIM_DROP),
        ("swap", Immediate::Swap, PRIM_SWAP),
        ("over", Immediate::Over, PRIM_OVER),
        ("rot", Immediate::Rot, PRIM_ROT),
    ] {
        let addr = engine.register_primitive(id);
        dispatch[id as usize] = addr;
        dict.add(DictEntry::immediate_prim(name, handler, id, addr));
    }

    for (name, handler, sig_text) in [
        ("true", Immediate::True, "-> i64"),
        ("false", Immediate::False, "-> i64"),
        ("if", Immediate::If, "->"),
        ("times", Immediate::Times, "->"),
    ] {
        dict.add(DictEntry::immediate(name, handler, TypeSig::parse(sig_text)?));
    }

    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StackEntry, TypeId};

    fn setup() -> (Dictionary, [u64; DISPATCH_TABLE_SIZE]) {
        let mut dict = Dictionary::new();
        let mut engine = Engine::new();
        let dispatch = register_primitives(&mut dict, &mut engine).unwrap();
        (dict, dispatch)
    }

    #[test]
    fn test_core_primitives_registered() {
        let (dict, dispatch) = setup();
        for name in ["+", "-", "0branch", "execute", "alloc", "array-concat"] {
            let entry = dict.lookup(name).unwrap();
            assert!(entry.is_primitive, "{name} should be a primitive");
            let id = entry.prim_id.unwrap() as usize;
            assert_ne!(dispatch[id], 0, "{name} missing from dispatch table");
            assert_eq!(entry.addr, dispatch[id]);
        }
    }

    #[test]
    fn test_no_primitive_has_address_zero() {
        let (_, dispatch) = setup();
        for id in 1..PRIM_COUNT as usize {
            if id == PRIM_LIT as usize {
                continue;
            }
            assert_ne!(dispatch[id], 0, "primitive {id} has address 0");
        }
    }

    #[test]
    fn test_lit_marker_has_no_address() {
        let (_, dispatch) = setup();
        assert_eq!(dispatch[PRIM_LIT as usize], 0);
    }

    #[test]
    fn test_stack_ops_are_immediate() {
        let (dict, _) = setup();
        for name in ["dup", "drop", "swap", "over", "rot", "if", "times", "true"] {
            assert!(dict.lookup(name).unwrap().is_immediate, "{name}");
        }
    }

    #[test]
    fn test_unicode_aliases() {
        let (dict, _) = setup();
        assert_eq!(
            dict.lookup("≠").unwrap().prim_id,
            dict.lookup("<>").unwrap().prim_id
        );
        assert_eq!(
            dict.lookup("≥").unwrap().prim_id,
            dict.lookup(">=").unwrap().prim_id
        );
    }

    #[test]
    fn test_mut_overloads_resolve_by_type() {
        let (dict, _) = setup();
        let on_array = dict
            .lookup_typed("mut", &[StackEntry::plain(TypeId::Array)])
            .unwrap();
        assert_eq!(on_array.sig.outputs, vec![TypeId::ArrayMut]);
        let on_str = dict
            .lookup_typed("mut", &[StackEntry::plain(TypeId::Str)])
            .unwrap();
        assert_eq!(on_str.sig.outputs, vec![TypeId::StrMut]);
    }
}
