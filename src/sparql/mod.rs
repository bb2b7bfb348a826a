//! SPARQL 1.1 Update over a single in-memory graph
//!
//! Covers the update forms used by fixpoint batches:
//! - `INSERT DATA`, `DELETE DATA`
//! - `DELETE { } INSERT { } WHERE { }` and its single-template forms
//! - `DELETE WHERE { }`
//! - `CLEAR DEFAULT | ALL | NAMED`
//!
//! WHERE groups support basic graph patterns, `OPTIONAL`, `UNION`,
//! `MINUS`, `FILTER`, `BIND` and nested groups. Named graphs are not
//! modelled: `GRAPH` is rejected at parse time.

pub mod expr;
pub mod parser;
pub mod update;

pub use expr::{Expression, Function};
pub use parser::parse_update;
pub use update::{execute_update, UpdateOperation, UpdateRequest, UpdateResult};

use crate::graph::Graph;
use crate::term::{Bindings, Triple};

/// One element of a group graph pattern
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    /// A basic graph pattern
    Triples(Vec<Triple>),
    /// `OPTIONAL { ... }`
    Optional(GroupPattern),
    /// `{ ... } UNION { ... } ...`
    Union(Vec<GroupPattern>),
    /// `MINUS { ... }`
    Minus(GroupPattern),
    /// A nested `{ ... }`
    Group(GroupPattern),
    /// `FILTER expr`; applies to the whole enclosing group
    Filter(Expression),
    /// `BIND (expr AS ?var)`
    Bind(Expression, crate::term::Variable),
}

/// A `{ ... }` group graph pattern
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPattern {
    pub elements: Vec<PatternElement>,
}

impl GroupPattern {
    pub fn new(elements: Vec<PatternElement>) -> Self {
        GroupPattern { elements }
    }

    /// A group made of one basic graph pattern
    pub fn from_triples(triples: Vec<Triple>) -> Self {
        GroupPattern { elements: vec![PatternElement::Triples(triples)] }
    }

    /// Solutions of this group against `graph`
    pub fn evaluate(&self, graph: &Graph) -> Vec<Bindings> {
        evaluate_group(self, graph, vec![Bindings::default()])
    }
}

/// Evaluate `group` once for each input solution
pub(crate) fn evaluate_group(group: &GroupPattern, graph: &Graph, input: Vec<Bindings>) -> Vec<Bindings> {
    let mut solutions = input;
    let mut filters = Vec::new();

    for element in &group.elements {
        if solutions.is_empty() {
            break;
        }
        solutions = match element {
            PatternElement::Triples(patterns) => join_triples(patterns, graph, solutions),
            PatternElement::Optional(inner) => solutions
                .into_iter()
                .flat_map(|solution| {
                    let extended = evaluate_group(inner, graph, vec![solution.clone()]);
                    if extended.is_empty() {
                        vec![solution]
                    } else {
                        extended
                    }
                })
                .collect(),
            PatternElement::Union(branches) => branches
                .iter()
                .flat_map(|branch| evaluate_group(branch, graph, solutions.clone()))
                .collect(),
            PatternElement::Minus(inner) => {
                let removed = inner.evaluate(graph);
                solutions
                    .into_iter()
                    .filter(|solution| !removed.iter().any(|other| minus_excludes(solution, other)))
                    .collect()
            }
            PatternElement::Group(inner) => evaluate_group(inner, graph, solutions),
            PatternElement::Filter(expression) => {
                filters.push(expression);
                solutions
            }
            PatternElement::Bind(expression, var) => solutions
                .into_iter()
                .filter_map(|mut solution| {
                    if solution.contains_key(var) {
                        // rebinding an in-scope variable yields no solution
                        return None;
                    }
                    if let Some(value) = expression.evaluate(&solution, graph) {
                        solution.insert(var.clone(), value);
                    }
                    Some(solution)
                })
                .collect(),
        };
    }

    if filters.is_empty() {
        return solutions;
    }
    solutions
        .into_iter()
        .filter(|solution| filters.iter().all(|f| f.effective_boolean(solution, graph) == Some(true)))
        .collect()
}

fn join_triples(patterns: &[Triple], graph: &Graph, input: Vec<Bindings>) -> Vec<Bindings> {
    let mut solutions = input;
    for pattern in patterns {
        solutions = solutions
            .iter()
            .flat_map(|bindings| graph.match_pattern(pattern, bindings))
            .collect();
        if solutions.is_empty() {
            break;
        }
    }
    solutions
}

/// MINUS removes a solution when some right-hand solution shares at least
/// one variable with it and agrees on every shared variable
fn minus_excludes(left: &Bindings, right: &Bindings) -> bool {
    let mut shared = false;
    for (var, value) in right {
        if let Some(other) = left.get(var) {
            if other != value {
                return false;
            }
            shared = true;
        }
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Term, Variable};

    fn ex(local: &str) -> Term {
        Term::uri(format!("http://example.org/{}", local))
    }

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.insert(Triple::new(ex("alice"), ex("knows"), ex("bob")));
        graph.insert(Triple::new(ex("bob"), ex("knows"), ex("carol")));
        graph.insert(Triple::new(ex("alice"), ex("name"), Term::literal("Alice")));
        graph
    }

    #[test]
    fn test_optional_keeps_unmatched() {
        let group = GroupPattern::new(vec![
            PatternElement::Triples(vec![Triple::new(Term::variable("s"), ex("knows"), Term::variable("o"))]),
            PatternElement::Optional(GroupPattern::from_triples(vec![Triple::new(
                Term::variable("s"),
                ex("name"),
                Term::variable("n"),
            )])),
        ]);
        let solutions = group.evaluate(&sample());
        assert_eq!(solutions.len(), 2);
        let named = solutions.iter().filter(|s| s.contains_key(&Variable::new("n"))).count();
        assert_eq!(named, 1);
    }

    #[test]
    fn test_minus_removes_compatible() {
        let group = GroupPattern::new(vec![
            PatternElement::Triples(vec![Triple::new(Term::variable("s"), ex("knows"), Term::variable("o"))]),
            PatternElement::Minus(GroupPattern::from_triples(vec![Triple::new(
                Term::variable("s"),
                ex("name"),
                Term::variable("n"),
            )])),
        ]);
        let solutions = group.evaluate(&sample());
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get(&Variable::new("s")), Some(&ex("bob")));
    }

    #[test]
    fn test_union_concatenates() {
        let group = GroupPattern::new(vec![PatternElement::Union(vec![
            GroupPattern::from_triples(vec![Triple::new(Term::variable("x"), ex("knows"), ex("bob"))]),
            GroupPattern::from_triples(vec![Triple::new(Term::variable("x"), ex("knows"), ex("carol"))]),
        ])]);
        assert_eq!(group.evaluate(&sample()).len(), 2);
    }
}
