//! The dictionary
//!
//! Name to entry map with overload chains: adding prepends, so the newest
//! overload is found first by the plain lookup. The typed lookup scores
//! every overload of a name against the top of the compile-time stack and
//! returns the best match.

use crate::immediate::Immediate;
use crate::tokens::Token;
use crate::types::{StackEntry, TypeId, TypeSig};
use std::collections::HashMap;
use std::rc::Rc;
use weft_core::Cid;

/// An immutable dictionary record. Overloads of one name each get their
/// own entry.
#[derive(Debug, Clone)]
pub struct DictEntry {
    pub name: String,
    /// Runtime address for primitives; 0 when not a primitive.
    pub addr: u64,
    /// Blob CID for compiled user words.
    pub cid: Option<Cid>,
    /// Stable primitive ID for primitives.
    pub prim_id: Option<u16>,
    pub sig: TypeSig,
    pub is_primitive: bool,
    pub is_immediate: bool,
    /// Compile-time handler for immediate words.
    pub immediate: Option<Immediate>,
    /// Retained body for words compiled lazily per call context.
    pub tokens: Option<Rc<Vec<Token>>>,
    /// Signature specificity, used to break score ties.
    pub priority: i32,
}

impl DictEntry {
    pub fn primitive(name: &str, addr: u64, prim_id: u16, sig: TypeSig) -> Self {
        let priority = sig.priority();
        DictEntry {
            name: name.to_string(),
            addr,
            cid: None,
            prim_id: Some(prim_id),
            sig,
            is_primitive: true,
            is_immediate: false,
            immediate: None,
            tokens: None,
            priority,
        }
    }

    pub fn immediate(name: &str, handler: Immediate, sig: TypeSig) -> Self {
        let priority = sig.priority();
        DictEntry {
            name: name.to_string(),
            addr: 0,
            cid: None,
            prim_id: None,
            sig,
            is_primitive: false,
            is_immediate: true,
            immediate: Some(handler),
            tokens: None,
            priority,
        }
    }

    /// An immediate stack rearranger that also has a runtime primitive.
    pub fn immediate_prim(name: &str, handler: Immediate, prim_id: u16, addr: u64) -> Self {
        DictEntry {
            name: name.to_string(),
            addr,
            cid: None,
            prim_id: Some(prim_id),
            sig: TypeSig::default(),
            is_primitive: false,
            is_immediate: true,
            immediate: Some(handler),
            tokens: None,
            priority: 0,
        }
    }

    pub fn word(name: &str, cid: Cid, sig: TypeSig) -> Self {
        let priority = sig.priority();
        DictEntry {
            name: name.to_string(),
            addr: 0,
            cid: Some(cid),
            prim_id: None,
            sig,
            is_primitive: false,
            is_immediate: false,
            immediate: None,
            tokens: None,
            priority,
        }
    }

    pub fn lazy_word(name: &str, sig: TypeSig, tokens: Vec<Token>) -> Self {
        let priority = sig.priority();
        DictEntry {
            name: name.to_string(),
            addr: 0,
            cid: None,
            prim_id: None,
            sig,
            is_primitive: false,
            is_immediate: false,
            immediate: None,
            tokens: Some(Rc::new(tokens)),
            priority,
        }
    }
}

#[derive(Default)]
pub struct Dictionary {
    entries: HashMap<String, Vec<DictEntry>>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    /// Prepend an entry to its name's overload chain.
    pub fn add(&mut self, entry: DictEntry) {
        self.entries
            .entry(entry.name.clone())
            .or_default()
            .insert(0, entry);
    }

    /// Newest entry for a name. Used where overload selection does not
    /// matter: immediate discovery, primitive address resolution.
    pub fn lookup(&self, name: &str) -> Option<&DictEntry> {
        self.entries.get(name).and_then(|chain| chain.first())
    }

    /// Best-scoring overload for a name against the current stack.
    pub fn lookup_typed(&self, name: &str, stack: &[StackEntry]) -> Option<&DictEntry> {
        let chain = self.entries.get(name)?;
        let mut best: Option<(&DictEntry, i32)> = None;
        for entry in chain {
            let score = match_score(&entry.sig, stack);
            if score < 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((prev, prev_score)) => {
                    score > prev_score || (score == prev_score && entry.priority > prev.priority)
                }
            };
            if better {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, _)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|chain| chain.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Score a signature against the stack top. Exact concrete match +100 per
/// input, polymorphic +10, unknown stack entry +50; any mismatch (or a
/// stack that is too shallow) disqualifies.
fn match_score(sig: &TypeSig, stack: &[StackEntry]) -> i32 {
    let n = sig.inputs.len();
    if stack.len() < n {
        return -1;
    }
    let base = stack.len() - n;
    let mut score = 0;
    for (i, &expected) in sig.inputs.iter().enumerate() {
        let actual = stack[base + i].ty;
        if expected.is_polymorphic() {
            score += 10;
        } else if matches!(actual, TypeId::Unknown | TypeId::Any) {
            score += 50;
        } else if actual == expected {
            score += 100;
        } else {
            return -1;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, sig: &str) -> DictEntry {
        DictEntry::primitive(name, 0x1000, 1, TypeSig::parse(sig).unwrap())
    }

    fn stack(types: &[TypeId]) -> Vec<StackEntry> {
        types.iter().map(|&ty| StackEntry::plain(ty)).collect()
    }

    #[test]
    fn test_lookup_returns_newest() {
        let mut dict = Dictionary::new();
        dict.add(entry("mut", "array -> array_mut"));
        dict.add(entry("mut", "str -> str_mut"));
        let head = dict.lookup("mut").unwrap();
        assert_eq!(head.sig.inputs, vec![TypeId::Str]);
    }

    #[test]
    fn test_lookup_typed_picks_matching_overload() {
        let mut dict = Dictionary::new();
        dict.add(entry("mut", "array -> array_mut"));
        dict.add(entry("mut", "str -> str_mut"));

        let found = dict
            .lookup_typed("mut", &stack(&[TypeId::Array]))
            .unwrap();
        assert_eq!(found.sig.inputs, vec![TypeId::Array]);

        let found = dict.lookup_typed("mut", &stack(&[TypeId::Str])).unwrap();
        assert_eq!(found.sig.inputs, vec![TypeId::Str]);
    }

    #[test]
    fn test_concrete_beats_polymorphic() {
        let mut dict = Dictionary::new();
        dict.add(entry("len", "any -> i64"));
        dict.add(entry("len", "array -> i64"));
        let found = dict
            .lookup_typed("len", &stack(&[TypeId::Array]))
            .unwrap();
        assert!(found.sig.inputs[0].is_concrete());
    }

    #[test]
    fn test_unknown_stack_slot_scores_between() {
        let mut dict = Dictionary::new();
        dict.add(entry("f", "i64 -> i64"));
        // unknown on the stack still matches a concrete signature
        let found = dict.lookup_typed("f", &stack(&[TypeId::Unknown]));
        assert!(found.is_some());
    }

    #[test]
    fn test_mismatch_disqualifies() {
        let mut dict = Dictionary::new();
        dict.add(entry("f", "i64 -> i64"));
        assert!(dict.lookup_typed("f", &stack(&[TypeId::Bool])).is_none());
    }

    #[test]
    fn test_shallow_stack_disqualifies() {
        let mut dict = Dictionary::new();
        dict.add(entry("f", "i64 i64 -> i64"));
        assert!(dict.lookup_typed("f", &stack(&[TypeId::I64])).is_none());
    }

    #[test]
    fn test_priority_breaks_ties() {
        let mut dict = Dictionary::new();
        // both score +10 against an i64 (polymorphic inputs), but the
        // two-input entry is ineligible on a one-deep stack
        dict.add(entry("g", "any -> any"));
        dict.add(entry("g", "a -> a"));
        let found = dict.lookup_typed("g", &stack(&[TypeId::I64]));
        assert!(found.is_some());
    }
}
