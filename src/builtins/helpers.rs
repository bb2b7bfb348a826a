//! Shared utility functions for builtin implementations
//!
//! - Value extraction (numbers, strings)
//! - Result binding (match or bind pattern)

use std::cmp::Ordering;

use super::BuiltinResult;
use crate::term::{Bindings, Term};

// ============================================================================
// Value Extraction
// ============================================================================

/// Extract a numeric value from a literal term
pub fn get_number(term: &Term) -> Option<f64> {
    term.as_number()
}

/// Extract an integer, only for literals that are numeric and integral
pub fn get_integer(term: &Term) -> Option<i64> {
    let literal = term.as_literal()?;
    literal.as_number()?;
    literal.as_integer()
}

/// Extract the string form of a literal or IRI
pub fn get_string(term: &Term) -> Option<&str> {
    match term {
        Term::Literal(lit) => Some(lit.value()),
        Term::Uri(uri) => Some(uri.as_str()),
        _ => None,
    }
}

/// Value equality: numerically for two numbers, term identity otherwise
pub fn same_value(a: &Term, b: &Term) -> bool {
    match (get_number(a), get_number(b)) {
        (Some(x), Some(y)) if a.is_literal() && b.is_literal() => x == y,
        _ => a == b,
    }
}

/// Order two ground terms; only literals are ordered
pub fn compare_terms(a: &Term, b: &Term) -> Option<Ordering> {
    match (a.as_literal(), b.as_literal()) {
        (Some(x), Some(y)) => x.compare(y),
        _ => None,
    }
}

// ============================================================================
// Result Binding
// ============================================================================

/// Bind `value` to `target` if it is an unbound variable, otherwise succeed
/// only when `target` already holds the same value
pub fn match_or_bind(target: &Term, value: Term, bindings: &Bindings) -> BuiltinResult {
    match target {
        Term::Variable(var) => {
            let mut extended = bindings.clone();
            extended.insert(var.clone(), value);
            BuiltinResult::Success(extended)
        }
        bound if same_value(bound, &value) => BuiltinResult::Success(bindings.clone()),
        _ => BuiltinResult::Failure,
    }
}

/// Turn a test outcome into a result
pub fn check(outcome: bool, bindings: &Bindings) -> BuiltinResult {
    if outcome {
        BuiltinResult::Success(bindings.clone())
    } else {
        BuiltinResult::Failure
    }
}

/// Last argument, the output slot of binder builtins
pub fn split_output(args: &[Term]) -> Option<(&[Term], &Term)> {
    let (last, inputs) = args.split_last()?;
    Some((inputs, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Variable;

    #[test]
    fn test_same_value_numeric() {
        assert!(same_value(&Term::integer(2), &Term::typed_literal("2.0", crate::term::uri::ns::XSD_DECIMAL)));
        assert!(!same_value(&Term::integer(2), &Term::uri("http://ex/2")));
        assert!(same_value(&Term::uri("http://ex/a"), &Term::uri("http://ex/a")));
    }

    #[test]
    fn test_match_or_bind() {
        let bindings = Bindings::default();
        match match_or_bind(&Term::variable("x"), Term::integer(3), &bindings) {
            BuiltinResult::Success(b) => assert_eq!(b.get(&Variable::new("x")), Some(&Term::integer(3))),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            match_or_bind(&Term::integer(4), Term::integer(3), &bindings),
            BuiltinResult::Failure
        ));
    }

    #[test]
    fn test_get_integer_rejects_non_numeric() {
        assert_eq!(get_integer(&Term::integer(7)), Some(7));
        assert_eq!(get_integer(&Term::lang_literal("7", "en")), None);
        assert_eq!(get_integer(&Term::uri("http://ex/7")), None);
    }
}
