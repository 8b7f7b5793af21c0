//! Signature unification
//!
//! Unification runs left-to-right over a signature's inputs. Each type
//! variable binds to the first concrete type it meets; later occurrences
//! must agree with the binding. Output variables resolve through the
//! bindings; an output whose variable never bound becomes `unknown`,
//! which is only an error once it reaches a specialization site.

use crate::types::TypeId;

/// Bindings for the 26 single-letter type variables.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    slots: [Option<TypeId>; 26],
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn get(&self, var: u8) -> Option<TypeId> {
        self.slots[var as usize]
    }

    pub fn bind(&mut self, var: u8, ty: TypeId) {
        self.slots[var as usize] = Some(ty);
    }
}

/// Match one signature input against the type actually on the stack.
///
/// Stack entries never hold variables themselves: they are concrete,
/// `any`, or `unknown` (the latter two match anything without binding).
pub fn match_input(expected: TypeId, actual: TypeId, bindings: &mut Bindings) -> bool {
    if matches!(actual, TypeId::Any | TypeId::Unknown) {
        return true;
    }
    match expected {
        TypeId::Any => true,
        TypeId::Var(var) => match bindings.get(var) {
            Some(bound) => actual == bound,
            None => {
                bindings.bind(var, actual);
                true
            }
        },
        concrete => actual == concrete,
    }
}

/// Resolve one signature output through the bindings.
pub fn resolve_output(ty: TypeId, bindings: &Bindings) -> TypeId {
    match ty {
        TypeId::Var(var) => bindings.get(var).unwrap_or(TypeId::Unknown),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeSig;

    fn apply(sig: &str, stack: &[TypeId]) -> Option<Vec<TypeId>> {
        let sig = TypeSig::parse(sig).unwrap();
        let mut bindings = Bindings::new();
        assert_eq!(sig.inputs.len(), stack.len());
        for (&expected, &actual) in sig.inputs.iter().zip(stack) {
            if !match_input(expected, actual, &mut bindings) {
                return None;
            }
        }
        Some(
            sig.outputs
                .iter()
                .map(|&t| resolve_output(t, &bindings))
                .collect(),
        )
    }

    #[test]
    fn test_concrete_match() {
        assert_eq!(
            apply("i64 i64 -> i64", &[TypeId::I64, TypeId::I64]),
            Some(vec![TypeId::I64])
        );
    }

    #[test]
    fn test_concrete_mismatch() {
        assert_eq!(apply("i64 -> i64", &[TypeId::Bool]), None);
    }

    #[test]
    fn test_swap_shape() {
        assert_eq!(
            apply("a b -> b a", &[TypeId::I64, TypeId::Bool]),
            Some(vec![TypeId::Bool, TypeId::I64])
        );
    }

    #[test]
    fn test_variable_binds_first_then_must_agree() {
        assert_eq!(
            apply("a a -> a", &[TypeId::I64, TypeId::I64]),
            Some(vec![TypeId::I64])
        );
        assert_eq!(apply("a a -> a", &[TypeId::I64, TypeId::Bool]), None);
    }

    #[test]
    fn test_any_matches_without_binding() {
        assert_eq!(
            apply("any -> any", &[TypeId::Array]),
            Some(vec![TypeId::Any])
        );
    }

    #[test]
    fn test_unknown_stack_entry_matches() {
        assert_eq!(
            apply("i64 -> i64", &[TypeId::Unknown]),
            Some(vec![TypeId::I64])
        );
    }

    #[test]
    fn test_unbound_output_variable_is_unknown() {
        // `b` never appears in the inputs
        assert_eq!(
            apply("a -> b", &[TypeId::I64]),
            Some(vec![TypeId::Unknown])
        );
    }

    #[test]
    fn test_any_on_stack_does_not_bind_variable() {
        // any matched against `a` leaves `a` free; output falls to unknown
        assert_eq!(
            apply("a -> a", &[TypeId::Any]),
            Some(vec![TypeId::Unknown])
        );
    }
}
