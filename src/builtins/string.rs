//! String builtins: `regex`, `strConcat`, `uriConcat`

use regex::Regex;
use tracing::debug;

use super::helpers::{get_string, match_or_bind, split_output};
use super::{BuiltinContext, BuiltinResult};
use crate::term::{Bindings, Term};

/// `regex(text, pattern, group1, ...)`: succeed when `pattern` matches
/// somewhere in `text`, binding capture groups to the remaining arguments
pub fn regex(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    let [text, pattern, groups @ ..] = args else {
        return BuiltinResult::Failure;
    };
    if !(text.is_ground() && pattern.is_ground()) {
        return BuiltinResult::NotReady;
    }
    let (Some(text), Some(pattern)) = (get_string(text), get_string(pattern)) else {
        return BuiltinResult::Failure;
    };
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            debug!(pattern, error = %e, "Invalid regex in rule");
            return BuiltinResult::Failure;
        }
    };
    let Some(captures) = re.captures(text) else {
        return BuiltinResult::Failure;
    };

    let mut current = bindings.clone();
    for (i, target) in groups.iter().enumerate() {
        let value = captures.get(i + 1).map_or("", |m| m.as_str());
        match match_or_bind(target, Term::literal(value), &current) {
            BuiltinResult::Success(next) => current = next,
            other => return other,
        }
    }
    BuiltinResult::Success(current)
}

/// Concatenate the string forms of every input, or None if one is unbound
fn concat_inputs(inputs: &[Term]) -> Option<String> {
    inputs
        .iter()
        .map(|term| term.is_ground().then(|| term.lexical()))
        .collect()
}

/// `strConcat(a, b, ..., out)`: `out` is the plain literal of the inputs joined
pub fn str_concat(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    let Some((inputs, out)) = split_output(args) else {
        return BuiltinResult::Failure;
    };
    match concat_inputs(inputs) {
        Some(joined) => match_or_bind(out, Term::literal(joined), bindings),
        None => BuiltinResult::NotReady,
    }
}

/// `uriConcat(a, b, ..., out)`: like `strConcat` but `out` is an IRI
pub fn uri_concat(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    let Some((inputs, out)) = split_output(args) else {
        return BuiltinResult::Failure;
    };
    match concat_inputs(inputs) {
        Some(joined) => match_or_bind(out, Term::uri(joined), bindings),
        None => BuiltinResult::NotReady,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::term::Variable;

    #[test]
    fn test_regex_groups() {
        let graph = Graph::new();
        let ctx = BuiltinContext::new(&graph);
        let args = [
            Term::literal("John Smith"),
            Term::literal(r"(\w+) (\w+)"),
            Term::variable("first"),
            Term::variable("last"),
        ];
        match regex(&args, &Bindings::default(), &ctx) {
            BuiltinResult::Success(b) => {
                assert_eq!(b.get(&Variable::new("first")), Some(&Term::literal("John")));
                assert_eq!(b.get(&Variable::new("last")), Some(&Term::literal("Smith")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_regex_no_match_and_bad_pattern() {
        let graph = Graph::new();
        let ctx = BuiltinContext::new(&graph);
        let b = Bindings::default();
        assert!(matches!(regex(&[Term::literal("abc"), Term::literal("^z")], &b, &ctx), BuiltinResult::Failure));
        assert!(matches!(regex(&[Term::literal("abc"), Term::literal("(")], &b, &ctx), BuiltinResult::Failure));
    }

    #[test]
    fn test_concat() {
        let graph = Graph::new();
        let ctx = BuiltinContext::new(&graph);
        let b = Bindings::default();
        let args = [Term::uri("http://ex/"), Term::literal("item"), Term::integer(1), Term::variable("u")];
        match uri_concat(&args, &b, &ctx) {
            BuiltinResult::Success(b) => assert_eq!(b.get(&Variable::new("u")), Some(&Term::uri("http://ex/item1"))),
            other => panic!("unexpected {:?}", other),
        }
        let pending = [Term::variable("a"), Term::variable("out")];
        assert!(matches!(str_concat(&pending, &b, &ctx), BuiltinResult::NotReady));
    }
}
