//! FILTER and BIND expressions
//!
//! Evaluation returns `None` for an expression error (unbound variable,
//! type mismatch); a FILTER treats that as false and a BIND leaves its
//! variable unbound.

use std::cmp::Ordering;

use regex::RegexBuilder;

use super::{evaluate_group, GroupPattern};
use crate::graph::Graph;
use crate::term::uri::ns;
use crate::term::{Bindings, Literal, Term, Variable};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Builtin functions callable in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Bound,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Str,
    Lang,
    Datatype,
    Iri,
    Concat,
    StrLen,
    UCase,
    LCase,
    Contains,
    StrStarts,
    StrEnds,
    Regex,
    SameTerm,
    If,
    Coalesce,
}

impl Function {
    /// Look up a function by its SPARQL keyword
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name.to_ascii_uppercase().as_str() {
            "BOUND" => Function::Bound,
            "ISIRI" | "ISURI" => Function::IsIri,
            "ISBLANK" => Function::IsBlank,
            "ISLITERAL" => Function::IsLiteral,
            "ISNUMERIC" => Function::IsNumeric,
            "STR" => Function::Str,
            "LANG" => Function::Lang,
            "DATATYPE" => Function::Datatype,
            "IRI" | "URI" => Function::Iri,
            "CONCAT" => Function::Concat,
            "STRLEN" => Function::StrLen,
            "UCASE" => Function::UCase,
            "LCASE" => Function::LCase,
            "CONTAINS" => Function::Contains,
            "STRSTARTS" => Function::StrStarts,
            "STRENDS" => Function::StrEnds,
            "REGEX" => Function::Regex,
            "SAMETERM" => Function::SameTerm,
            "IF" => Function::If,
            "COALESCE" => Function::Coalesce,
            _ => return None,
        };
        Some(function)
    }

    /// Accepted argument counts; `None` as the maximum means unbounded
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Concat | Function::Coalesce => (0, None),
            Function::Regex => (2, Some(3)),
            Function::Contains | Function::StrStarts | Function::StrEnds | Function::SameTerm => (2, Some(2)),
            Function::If => (3, Some(3)),
            _ => (1, Some(1)),
        }
    }
}

/// An expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Term),
    Variable(Variable),
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Negate(Box<Expression>),
    Compare(CompareOp, Box<Expression>, Box<Expression>),
    Arithmetic(ArithOp, Box<Expression>, Box<Expression>),
    Call(Function, Vec<Expression>),
    Exists(GroupPattern),
    NotExists(GroupPattern),
}

impl Expression {
    /// Value of the expression under `bindings`
    pub fn evaluate(&self, bindings: &Bindings, graph: &Graph) -> Option<Term> {
        match self {
            Expression::Constant(term) => Some(term.clone()),
            Expression::Variable(var) => bindings.get(var).cloned(),
            Expression::Or(a, b) => {
                // an error on one side is forgiven if the other is true
                match (a.effective_boolean(bindings, graph), b.effective_boolean(bindings, graph)) {
                    (Some(true), _) | (_, Some(true)) => Some(Term::boolean(true)),
                    (Some(false), Some(false)) => Some(Term::boolean(false)),
                    _ => None,
                }
            }
            Expression::And(a, b) => {
                match (a.effective_boolean(bindings, graph), b.effective_boolean(bindings, graph)) {
                    (Some(false), _) | (_, Some(false)) => Some(Term::boolean(false)),
                    (Some(true), Some(true)) => Some(Term::boolean(true)),
                    _ => None,
                }
            }
            Expression::Not(inner) => inner.effective_boolean(bindings, graph).map(|b| Term::boolean(!b)),
            Expression::Negate(inner) => {
                let value = inner.evaluate(bindings, graph)?;
                arithmetic(ArithOp::Sub, &Term::integer(0), &value)
            }
            Expression::Compare(op, a, b) => {
                let left = a.evaluate(bindings, graph)?;
                let right = b.evaluate(bindings, graph)?;
                compare(*op, &left, &right).map(Term::boolean)
            }
            Expression::Arithmetic(op, a, b) => {
                let left = a.evaluate(bindings, graph)?;
                let right = b.evaluate(bindings, graph)?;
                arithmetic(*op, &left, &right)
            }
            Expression::Call(function, args) => call(*function, args, bindings, graph),
            Expression::Exists(group) => {
                Some(Term::boolean(!evaluate_group(group, graph, vec![bindings.clone()]).is_empty()))
            }
            Expression::NotExists(group) => {
                Some(Term::boolean(evaluate_group(group, graph, vec![bindings.clone()]).is_empty()))
            }
        }
    }

    /// Effective boolean value, `None` on error
    pub fn effective_boolean(&self, bindings: &Bindings, graph: &Graph) -> Option<bool> {
        effective_boolean(&self.evaluate(bindings, graph)?)
    }
}

fn effective_boolean(term: &Term) -> Option<bool> {
    let literal = term.as_literal()?;
    let datatype = literal.datatype_uri();
    if datatype == ns::XSD_BOOLEAN {
        return literal.as_boolean();
    }
    if let Some(n) = numeric(literal) {
        return Some(n != 0.0 && !n.is_nan());
    }
    if datatype == ns::XSD_STRING || literal.language().is_some() {
        return Some(!literal.value().is_empty());
    }
    None
}

fn numeric(literal: &Literal) -> Option<f64> {
    if literal.is_plain() {
        return None;
    }
    literal.as_number()
}

fn compare(op: CompareOp, left: &Term, right: &Term) -> Option<bool> {
    let ordering = match (left.as_literal(), right.as_literal()) {
        (Some(a), Some(b)) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ if a.datatype() == b.datatype() => Some(a.value().cmp(b.value())),
            _ => None,
        },
        _ => None,
    };
    match (op, ordering) {
        (CompareOp::Eq, Some(ord)) => Some(ord == Ordering::Equal),
        (CompareOp::Ne, Some(ord)) => Some(ord != Ordering::Equal),
        (CompareOp::Eq, None) => Some(left == right),
        (CompareOp::Ne, None) => Some(left != right),
        (CompareOp::Lt, Some(ord)) => Some(ord.is_lt()),
        (CompareOp::Gt, Some(ord)) => Some(ord.is_gt()),
        (CompareOp::Le, Some(ord)) => Some(ord.is_le()),
        (CompareOp::Ge, Some(ord)) => Some(ord.is_ge()),
        _ => None,
    }
}

fn arithmetic(op: ArithOp, left: &Term, right: &Term) -> Option<Term> {
    let a = left.as_literal()?;
    let b = right.as_literal()?;
    let x = numeric(a)?;
    let y = numeric(b)?;
    let both_integer = a.datatype_uri() == ns::XSD_INTEGER && b.datatype_uri() == ns::XSD_INTEGER;

    if both_integer && op != ArithOp::Div {
        let (i, j) = (a.as_integer()?, b.as_integer()?);
        let result = match op {
            ArithOp::Add => i.checked_add(j),
            ArithOp::Sub => i.checked_sub(j),
            ArithOp::Mul => i.checked_mul(j),
            ArithOp::Div => None,
        };
        if let Some(result) = result {
            return Some(Term::integer(result));
        }
    }
    let result = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div if y == 0.0 => return None,
        ArithOp::Div => x / y,
    };
    result.is_finite().then(|| Term::number(result))
}

/// String argument: a simple or language-tagged literal
fn string_arg(term: &Term) -> Option<&Literal> {
    let literal = term.as_literal()?;
    (literal.is_plain() || literal.language().is_some()).then_some(literal)
}

/// Keep the language tag of `like` on a derived string
fn string_like(like: &Literal, value: String) -> Term {
    match like.language() {
        Some(lang) => Term::lang_literal(value, lang),
        None => Term::literal(value),
    }
}

fn call(function: Function, args: &[Expression], bindings: &Bindings, graph: &Graph) -> Option<Term> {
    // Functions that must not evaluate all their arguments up front
    match function {
        Function::Bound => {
            return match args.first()? {
                Expression::Variable(var) => Some(Term::boolean(bindings.contains_key(var))),
                _ => None,
            };
        }
        Function::If => {
            let condition = args.first()?.effective_boolean(bindings, graph)?;
            let branch = if condition { args.get(1)? } else { args.get(2)? };
            return branch.evaluate(bindings, graph);
        }
        Function::Coalesce => return args.iter().find_map(|arg| arg.evaluate(bindings, graph)),
        _ => {}
    }

    let values: Vec<Term> = args
        .iter()
        .map(|arg| arg.evaluate(bindings, graph))
        .collect::<Option<_>>()?;
    let first = values.first();

    match function {
        Function::IsIri => Some(Term::boolean(first?.is_uri())),
        Function::IsBlank => Some(Term::boolean(first?.is_blank())),
        Function::IsLiteral => Some(Term::boolean(first?.is_literal())),
        Function::IsNumeric => Some(Term::boolean(first?.as_literal().and_then(numeric).is_some())),
        Function::Str => match first? {
            Term::Uri(uri) => Some(Term::literal(uri.as_str())),
            Term::Literal(lit) => Some(Term::literal(lit.value())),
            _ => None,
        },
        Function::Lang => Some(Term::literal(first?.as_literal()?.language().unwrap_or(""))),
        Function::Datatype => Some(Term::uri(first?.as_literal()?.datatype_uri())),
        Function::Iri => match first? {
            Term::Uri(uri) => Some(Term::Uri(uri.clone())),
            Term::Literal(lit) if lit.is_plain() => Some(Term::uri(lit.value())),
            _ => None,
        },
        Function::Concat => {
            let literals: Vec<&Literal> = values.iter().map(string_arg).collect::<Option<_>>()?;
            let joined: String = literals.iter().map(|l| l.value()).collect();
            // the tag survives only if every argument carries the same one
            let lang = literals.first().and_then(|l| l.language());
            match lang {
                Some(tag) if literals.iter().all(|l| l.language() == Some(tag)) => {
                    Some(Term::lang_literal(joined, tag))
                }
                _ => Some(Term::literal(joined)),
            }
        }
        Function::StrLen => Some(Term::integer(string_arg(first?)?.value().chars().count() as i64)),
        Function::UCase => {
            let lit = string_arg(first?)?;
            Some(string_like(lit, lit.value().to_uppercase()))
        }
        Function::LCase => {
            let lit = string_arg(first?)?;
            Some(string_like(lit, lit.value().to_lowercase()))
        }
        Function::Contains | Function::StrStarts | Function::StrEnds => {
            let haystack = string_arg(values.first()?)?.value();
            let needle = string_arg(values.get(1)?)?.value();
            let found = match function {
                Function::Contains => haystack.contains(needle),
                Function::StrStarts => haystack.starts_with(needle),
                _ => haystack.ends_with(needle),
            };
            Some(Term::boolean(found))
        }
        Function::Regex => {
            let text = string_arg(values.first()?)?.value();
            let pattern = string_arg(values.get(1)?)?.value();
            let flags = match values.get(2) {
                Some(flags) => string_arg(flags)?.value(),
                None => "",
            };
            let re = RegexBuilder::new(pattern)
                .case_insensitive(flags.contains('i'))
                .multi_line(flags.contains('m'))
                .dot_matches_new_line(flags.contains('s'))
                .build()
                .ok()?;
            Some(Term::boolean(re.is_match(text)))
        }
        Function::SameTerm => Some(Term::boolean(values.first()? == values.get(1)?)),
        Function::Bound | Function::If | Function::Coalesce => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::Variable(Variable::new(name)))
    }

    fn constant(term: Term) -> Box<Expression> {
        Box::new(Expression::Constant(term))
    }

    fn bindings(pairs: &[(&str, Term)]) -> Bindings {
        pairs.iter().map(|(n, t)| (Variable::new(*n), t.clone())).collect()
    }

    #[test]
    fn test_numeric_comparison_across_types() {
        let graph = Graph::new();
        let expr = Expression::Compare(
            CompareOp::Lt,
            var("a"),
            constant(Term::typed_literal("2.5", ns::XSD_DECIMAL)),
        );
        let b = bindings(&[("a", Term::integer(2))]);
        assert_eq!(expr.effective_boolean(&b, &graph), Some(true));
    }

    #[test]
    fn test_unbound_is_error_but_or_forgives() {
        let graph = Graph::new();
        let unbound = Expression::Compare(CompareOp::Eq, var("missing"), constant(Term::integer(1)));
        assert_eq!(unbound.effective_boolean(&Bindings::default(), &graph), None);

        let forgiving = Expression::Or(Box::new(unbound), constant(Term::boolean(true)));
        assert_eq!(forgiving.effective_boolean(&Bindings::default(), &graph), Some(true));
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let graph = Graph::new();
        let expr = Expression::Arithmetic(ArithOp::Add, var("n"), constant(Term::integer(1)));
        let b = bindings(&[("n", Term::integer(41))]);
        assert_eq!(expr.evaluate(&b, &graph), Some(Term::integer(42)));

        let div = Expression::Arithmetic(ArithOp::Div, constant(Term::integer(1)), constant(Term::integer(0)));
        assert_eq!(div.evaluate(&b, &graph), None);
    }

    #[test]
    fn test_string_functions() {
        let graph = Graph::new();
        let b = bindings(&[("s", Term::uri("http://example.org/x")), ("l", Term::lang_literal("hi", "en"))]);

        let iri = Expression::Call(
            Function::Iri,
            vec![Expression::Call(
                Function::Concat,
                vec![
                    Expression::Call(Function::Str, vec![*var("s")]),
                    Expression::Constant(Term::literal("/copy")),
                ],
            )],
        );
        assert_eq!(iri.evaluate(&b, &graph), Some(Term::uri("http://example.org/x/copy")));

        let upper = Expression::Call(Function::UCase, vec![*var("l")]);
        assert_eq!(upper.evaluate(&b, &graph), Some(Term::lang_literal("HI", "en")));

        let bound = Expression::Call(Function::Bound, vec![*var("nope")]);
        assert_eq!(bound.evaluate(&b, &graph), Some(Term::boolean(false)));
    }

    #[test]
    fn test_regex_flags() {
        let graph = Graph::new();
        let expr = Expression::Call(
            Function::Regex,
            vec![
                Expression::Constant(Term::literal("Hello")),
                Expression::Constant(Term::literal("^hel")),
                Expression::Constant(Term::literal("i")),
            ],
        );
        assert_eq!(expr.effective_boolean(&Bindings::default(), &graph), Some(true));
    }
}
