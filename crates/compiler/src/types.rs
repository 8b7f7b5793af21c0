//! Type identifiers and signatures
//!
//! The type language is flat: nine concrete types, the top type `any`,
//! 26 single-letter type variables for polymorphic signatures, and
//! `unknown` for outputs whose variable never got bound. Signatures are
//! ordered input and output type lists split by `->` (or `→`).

use crate::error::CompileError;

/// A type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    I64,
    U64,
    F64,
    Ptr,
    Bool,
    /// Immutable string reference.
    Str,
    /// Mutable string reference.
    StrMut,
    /// Array reference, immutable by convention.
    Array,
    /// Mutable array reference.
    ArrayMut,
    /// Top type: matches anything.
    Any,
    /// Type variable `a`..`z` (0..26).
    Var(u8),
    /// An output variable that never resolved. Errors only at a
    /// specialization site.
    Unknown,
}

impl TypeId {
    /// Parse one signature token. Single letters `a`..`z` are variables.
    pub fn parse(token: &str) -> Option<TypeId> {
        match token {
            "i64" => Some(TypeId::I64),
            "u64" => Some(TypeId::U64),
            "f64" => Some(TypeId::F64),
            "ptr" => Some(TypeId::Ptr),
            "bool" => Some(TypeId::Bool),
            "str" => Some(TypeId::Str),
            "str_mut" => Some(TypeId::StrMut),
            "array" => Some(TypeId::Array),
            "array_mut" => Some(TypeId::ArrayMut),
            "any" => Some(TypeId::Any),
            _ => {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_lowercase() => {
                        Some(TypeId::Var(c as u8 - b'a'))
                    }
                    _ => None,
                }
            }
        }
    }

    pub fn is_concrete(self) -> bool {
        !matches!(self, TypeId::Any | TypeId::Var(_) | TypeId::Unknown)
    }

    /// `any` or a type variable: matches polymorphically.
    pub fn is_polymorphic(self) -> bool {
        matches!(self, TypeId::Any | TypeId::Var(_))
    }

    /// Types whose values are heap allocations the compiler tracks in slots.
    pub fn is_heap(self) -> bool {
        matches!(
            self,
            TypeId::Ptr | TypeId::Array | TypeId::ArrayMut | TypeId::StrMut
        )
    }

    /// On-heap type tag written into array headers. The numbering is
    /// frozen: it is read back by anything inspecting stored values.
    pub fn tag(self) -> u64 {
        match self {
            TypeId::Unknown => 0,
            TypeId::I64 => 1,
            TypeId::U64 => 2,
            TypeId::F64 => 3,
            TypeId::Ptr => 4,
            TypeId::Bool => 5,
            TypeId::Str => 6,
            TypeId::StrMut => 7,
            TypeId::Array => 8,
            TypeId::ArrayMut => 9,
            TypeId::Any => 10,
            TypeId::Var(v) => 11 + v as u64,
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeId::I64 => write!(f, "i64"),
            TypeId::U64 => write!(f, "u64"),
            TypeId::F64 => write!(f, "f64"),
            TypeId::Ptr => write!(f, "ptr"),
            TypeId::Bool => write!(f, "bool"),
            TypeId::Str => write!(f, "str"),
            TypeId::StrMut => write!(f, "str_mut"),
            TypeId::Array => write!(f, "array"),
            TypeId::ArrayMut => write!(f, "array_mut"),
            TypeId::Any => write!(f, "any"),
            TypeId::Var(v) => write!(f, "{}", (b'a' + v) as char),
            TypeId::Unknown => write!(f, "?"),
        }
    }
}

/// One compile-time stack entry: a type plus the heap slot it refers to,
/// if the value is an allocation owned by the word being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEntry {
    pub ty: TypeId,
    pub slot: Option<u32>,
}

impl StackEntry {
    pub fn plain(ty: TypeId) -> Self {
        StackEntry { ty, slot: None }
    }
}

/// A parsed type signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeSig {
    pub inputs: Vec<TypeId>,
    pub outputs: Vec<TypeId>,
}

impl TypeSig {
    /// Parse signature text like `"i64 i64 -> i64"` or `"a b -> b a"`.
    pub fn parse(text: &str) -> Result<TypeSig, CompileError> {
        Self::parse_tokens(text.split_whitespace())
    }

    /// Parse a signature from pre-split tokens.
    pub fn parse_tokens<'a>(
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Result<TypeSig, CompileError> {
        let mut sig = TypeSig::default();
        let mut seen_arrow = false;
        for token in tokens {
            if token == "->" || token == "→" {
                if seen_arrow {
                    return Err(CompileError::type_error(
                        "signature has more than one '->'",
                    ));
                }
                seen_arrow = true;
            } else {
                let ty = TypeId::parse(token).ok_or_else(|| {
                    CompileError::type_error(format!("unknown type '{token}' in signature"))
                })?;
                if seen_arrow {
                    sig.outputs.push(ty);
                } else {
                    sig.inputs.push(ty);
                }
            }
        }
        if !seen_arrow {
            return Err(CompileError::type_error("signature is missing '->'"));
        }
        Ok(sig)
    }

    /// True when no input or output needs a call-site type context.
    pub fn is_concrete(&self) -> bool {
        self.inputs.iter().chain(&self.outputs).all(|t| t.is_concrete())
    }

    /// Overload priority: concrete inputs outrank polymorphic ones.
    pub fn priority(&self) -> i32 {
        self.inputs
            .iter()
            .map(|t| {
                if t.is_concrete() {
                    100
                } else if t.is_polymorphic() {
                    10
                } else {
                    0
                }
            })
            .sum()
    }

    pub fn input_string(&self) -> String {
        format_types(&self.inputs)
    }

    pub fn output_string(&self) -> String {
        format_types(&self.outputs)
    }
}

impl std::fmt::Display for TypeSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.inputs.is_empty() {
            write!(f, "->")?;
        } else {
            write!(f, "{} ->", self.input_string())?;
        }
        if !self.outputs.is_empty() {
            write!(f, " {}", self.output_string())?;
        }
        Ok(())
    }
}

/// Render a type list as whitespace-separated signature text.
pub fn format_types(types: &[TypeId]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse whitespace-separated signature text back into a type list.
pub fn parse_type_list(text: &str) -> Result<Vec<TypeId>, CompileError> {
    text.split_whitespace()
        .map(|token| {
            TypeId::parse(token).ok_or_else(|| {
                CompileError::type_error(format!("unknown type '{token}' in stored signature"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concrete_sig() {
        let sig = TypeSig::parse("i64 i64 -> bool").unwrap();
        assert_eq!(sig.inputs, vec![TypeId::I64, TypeId::I64]);
        assert_eq!(sig.outputs, vec![TypeId::Bool]);
        assert!(sig.is_concrete());
    }

    #[test]
    fn test_parse_empty_sides() {
        let sig = TypeSig::parse("->").unwrap();
        assert!(sig.inputs.is_empty());
        assert!(sig.outputs.is_empty());

        let sig = TypeSig::parse("-> i64").unwrap();
        assert_eq!(sig.outputs, vec![TypeId::I64]);
    }

    #[test]
    fn test_parse_variables_and_unicode_arrow() {
        let sig = TypeSig::parse("a b → b a").unwrap();
        assert_eq!(sig.inputs, vec![TypeId::Var(0), TypeId::Var(1)]);
        assert_eq!(sig.outputs, vec![TypeId::Var(1), TypeId::Var(0)]);
        assert!(!sig.is_concrete());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(TypeSig::parse("int32 -> i64").is_err());
        // multi-letter names are not variables
        assert!(TypeSig::parse("ab -> i64").is_err());
    }

    #[test]
    fn test_missing_arrow_rejected() {
        assert!(TypeSig::parse("i64 i64").is_err());
    }

    #[test]
    fn test_priority_ranks_concrete_over_polymorphic() {
        let concrete = TypeSig::parse("i64 i64 -> i64").unwrap();
        let poly = TypeSig::parse("any any -> any").unwrap();
        assert!(concrete.priority() > poly.priority());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["i64 -> bool", "->", "-> i64", "a b -> b a"] {
            let sig = TypeSig::parse(text).unwrap();
            assert_eq!(sig.to_string(), text);
        }
    }

    #[test]
    fn test_heap_types() {
        assert!(TypeId::Array.is_heap());
        assert!(TypeId::ArrayMut.is_heap());
        assert!(TypeId::Ptr.is_heap());
        assert!(TypeId::StrMut.is_heap());
        assert!(!TypeId::Str.is_heap());
        assert!(!TypeId::I64.is_heap());
    }
}
