//! Node tests, graph lookups and node constructors

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::helpers::{check, match_or_bind};
use super::{BuiltinContext, BuiltinResult};
use crate::term::{Bindings, Term, Triple};

fn first(args: &[Term]) -> Option<&Term> {
    args.first()
}

pub fn is_literal(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    check(first(args).is_some_and(Term::is_literal), bindings)
}

pub fn not_literal(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    check(!first(args).is_some_and(Term::is_literal), bindings)
}

pub fn is_bnode(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    check(first(args).is_some_and(Term::is_blank), bindings)
}

pub fn not_bnode(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    check(!first(args).is_some_and(Term::is_blank), bindings)
}

pub fn bound(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    check(args.iter().all(Term::is_ground), bindings)
}

pub fn unbound(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    check(args.iter().all(Term::is_variable), bindings)
}

/// `noValue(s, p)` or `noValue(s, p, o)`: no triple in the graph matches.
/// Unbound arguments act as wildcards.
pub fn no_value(args: &[Term], bindings: &Bindings, ctx: &BuiltinContext) -> BuiltinResult {
    let pattern = match args {
        [s, p] => Triple::new(s.clone(), p.clone(), Term::variable("_noValueObject")),
        [s, p, o] => Triple::new(s.clone(), p.clone(), o.clone()),
        _ => return BuiltinResult::Failure,
    };
    check(!ctx.graph.has_match(&pattern, &Bindings::default()), bindings)
}

/// `makeTemp(?x)`: bind a fresh blank node
pub fn make_temp(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    match args {
        [target] => match_or_bind(target, Term::fresh_blank(), bindings),
        _ => BuiltinResult::Failure,
    }
}

fn skolem_hash(inputs: &[Term]) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    for term in inputs {
        if !term.is_ground() {
            return None;
        }
        term.to_string().hash(&mut hasher);
    }
    Some(hasher.finish())
}

/// `makeSkolem(?x, v1, ...)`: bind a blank node determined by the values,
/// so the same values always give the same node
pub fn make_skolem(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    let Some((target, inputs)) = args.split_first() else {
        return BuiltinResult::Failure;
    };
    match skolem_hash(inputs) {
        Some(hash) => match_or_bind(target, Term::blank(format!("sk{:016x}", hash)), bindings),
        None => BuiltinResult::NotReady,
    }
}

/// `makeNamedSkolem(?x, v1, ...)`: like `makeSkolem` but binds an IRI in
/// the namespace of the first IRI value
pub fn make_named_skolem(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    let Some((target, inputs)) = args.split_first() else {
        return BuiltinResult::Failure;
    };
    let Some(hash) = skolem_hash(inputs) else {
        return BuiltinResult::NotReady;
    };
    let namespace = inputs
        .iter()
        .find_map(Term::as_uri)
        .map_or("urn:skolem:", |uri| uri.namespace());
    match_or_bind(target, Term::uri(format!("{}sk{:016x}", namespace, hash)), bindings)
}

/// `print(...)` in a rule head
pub fn print(args: &[Term]) -> String {
    args.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::term::Variable;

    fn ex(local: &str) -> Term {
        Term::uri(format!("http://ex/{}", local))
    }

    fn bound_value(result: BuiltinResult, var: &str) -> Term {
        match result {
            BuiltinResult::Success(b) => b.get(&Variable::new(var)).cloned().unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_node_tests() {
        let graph = Graph::new();
        let ctx = BuiltinContext::new(&graph);
        let b = Bindings::default();
        assert!(matches!(is_literal(&[Term::literal("x")], &b, &ctx), BuiltinResult::Success(_)));
        assert!(matches!(is_literal(&[ex("a")], &b, &ctx), BuiltinResult::Failure));
        assert!(matches!(not_bnode(&[ex("a")], &b, &ctx), BuiltinResult::Success(_)));
        assert!(matches!(is_bnode(&[Term::blank("b0")], &b, &ctx), BuiltinResult::Success(_)));
        assert!(matches!(bound(&[Term::variable("x")], &b, &ctx), BuiltinResult::Failure));
        assert!(matches!(unbound(&[Term::variable("x")], &b, &ctx), BuiltinResult::Success(_)));
    }

    #[test]
    fn test_no_value() {
        let mut graph = Graph::new();
        graph.insert(Triple::new(ex("alice"), ex("knows"), ex("bob")));
        let ctx = BuiltinContext::new(&graph);
        let b = Bindings::default();
        assert!(matches!(no_value(&[ex("alice"), ex("knows")], &b, &ctx), BuiltinResult::Failure));
        assert!(matches!(no_value(&[ex("bob"), ex("knows")], &b, &ctx), BuiltinResult::Success(_)));
        assert!(matches!(
            no_value(&[ex("alice"), ex("knows"), ex("carol")], &b, &ctx),
            BuiltinResult::Success(_)
        ));
    }

    #[test]
    fn test_skolems_are_deterministic() {
        let graph = Graph::new();
        let ctx = BuiltinContext::new(&graph);
        let b = Bindings::default();
        let args = [Term::variable("x"), ex("alice"), Term::literal("role")];

        let first = bound_value(make_skolem(&args, &b, &ctx), "x");
        let second = bound_value(make_skolem(&args, &b, &ctx), "x");
        assert!(first.is_blank());
        assert_eq!(first, second);

        let named = bound_value(make_named_skolem(&args, &b, &ctx), "x");
        assert!(named.as_uri().unwrap().as_str().starts_with("http://ex/sk"));

        let temp_a = bound_value(make_temp(&[Term::variable("t")], &b, &ctx), "t");
        let temp_b = bound_value(make_temp(&[Term::variable("t")], &b, &ctx), "t");
        assert_ne!(temp_a, temp_b);
    }

    #[test]
    fn test_print_formats_terms() {
        assert_eq!(print(&[Term::literal("adult"), ex("alice")]), "\"adult\" <http://ex/alice>");
    }
}
