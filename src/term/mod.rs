//! RDF term representations
//!
//! This module defines the data types shared by graphs, rules and update
//! patterns:
//! - IRIs (named nodes)
//! - Literals (with optional datatype or language tag)
//! - Blank nodes
//! - Variables (rule and query patterns only, never stored in a graph)

use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;

pub mod uri;
mod literal;
mod blank;
mod variable;

pub use uri::Uri;
pub use literal::{is_numeric_datatype, Datatype, Literal};
pub use blank::BlankNode;
pub use variable::Variable;

/// A term in an RDF triple or triple pattern
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// An IRI reference (named node)
    Uri(Arc<Uri>),
    /// A literal value
    Literal(Arc<Literal>),
    /// A blank node
    BlankNode(BlankNode),
    /// A variable (patterns only)
    Variable(Variable),
}

impl Term {
    /// Create an IRI term
    pub fn uri(s: impl Into<String>) -> Self {
        Term::Uri(Arc::new(Uri::new(s.into())))
    }

    /// Create a simple literal
    pub fn literal(s: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::plain(s.into())))
    }

    /// Create a typed literal
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::typed(value.into(), datatype.into())))
    }

    /// Create a language-tagged literal
    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::with_language(value.into(), lang.into())))
    }

    pub fn integer(value: i64) -> Self {
        Term::typed_literal(value.to_string(), uri::ns::XSD_INTEGER)
    }

    /// Numeric result of arithmetic: integral values stay `xsd:integer`
    pub fn number(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Term::integer(value as i64)
        } else {
            Term::typed_literal(value.to_string(), uri::ns::XSD_DOUBLE)
        }
    }

    pub fn boolean(value: bool) -> Self {
        Term::typed_literal(value.to_string(), uri::ns::XSD_BOOLEAN)
    }

    /// Create a blank node with a label
    pub fn blank(label: impl Into<Arc<str>>) -> Self {
        Term::BlankNode(BlankNode::labeled(label))
    }

    /// Create a fresh blank node
    pub fn fresh_blank() -> Self {
        Term::BlankNode(BlankNode::fresh())
    }

    /// Create a variable
    pub fn variable(name: impl Into<Arc<str>>) -> Self {
        Term::Variable(Variable::new(name))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if this term contains no variable
    pub fn is_ground(&self) -> bool {
        !self.is_variable()
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, Term::Uri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Get the IRI if this is an IRI term
    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Term::Uri(u) => Some(u),
            _ => None,
        }
    }

    /// Get the literal if this is a literal term
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric value of a numeric literal
    pub fn as_number(&self) -> Option<f64> {
        self.as_literal().and_then(Literal::as_number)
    }

    /// The string form used by string builtins: lexical form for literals,
    /// the IRI for named nodes, the label for blank nodes.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Uri(u) => u.as_str(),
            Term::Literal(l) => l.value(),
            Term::BlankNode(b) => b.label(),
            Term::Variable(v) => v.name(),
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{:?}", u),
            Term::Literal(l) => write!(f, "{:?}", l),
            Term::BlankNode(b) => write!(f, "{:?}", b),
            Term::Variable(v) => write!(f, "{:?}", v),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{}", u),
            Term::Literal(l) => write!(f, "{}", l),
            Term::BlankNode(b) => write!(f, "{}", b),
            Term::Variable(v) => write!(f, "{}", v),
        }
    }
}

/// A triple (statement) in RDF
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Triple { subject, predicate, object }
    }

    /// Check if this triple contains any variables
    pub fn has_variables(&self) -> bool {
        self.subject.is_variable() || self.predicate.is_variable() || self.object.is_variable()
    }

    /// Ground and well-formed as RDF: no variables, no literal subject,
    /// predicate is an IRI.
    pub fn is_valid_rdf(&self) -> bool {
        !self.has_variables() && !self.subject.is_literal() && self.predicate.is_uri()
    }

    /// Variables in this pattern, in subject-predicate-object order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(Term::as_variable)
    }
}

impl fmt::Debug for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {:?} .", self.subject, self.predicate, self.object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Bindings from variables to terms
pub type Bindings = FnvHashMap<Variable, Term>;

/// Apply bindings to a term, substituting variables
pub fn substitute(term: &Term, bindings: &Bindings) -> Term {
    match term {
        Term::Variable(v) => bindings.get(v).cloned().unwrap_or_else(|| term.clone()),
        _ => term.clone(),
    }
}

/// Apply bindings to a triple
pub fn substitute_triple(triple: &Triple, bindings: &Bindings) -> Triple {
    Triple {
        subject: substitute(&triple.subject, bindings),
        predicate: substitute(&triple.predicate, bindings),
        object: substitute(&triple.object, bindings),
    }
}

/// Unify a pattern term with a ground term, extending `bindings`.
/// Returns false on conflict.
pub fn unify_term(pattern: &Term, value: &Term, bindings: &mut Bindings) -> bool {
    match pattern {
        Term::Variable(v) => match bindings.get(v) {
            Some(bound) => bound == value,
            None => {
                bindings.insert(v.clone(), value.clone());
                true
            }
        },
        _ => pattern == value,
    }
}

/// Unify a triple pattern with a ground triple
pub fn unify_triple(pattern: &Triple, value: &Triple, bindings: &Bindings) -> Option<Bindings> {
    let mut extended = bindings.clone();
    if unify_term(&pattern.subject, &value.subject, &mut extended)
        && unify_term(&pattern.predicate, &value.predicate, &mut extended)
        && unify_term(&pattern.object, &value.object, &mut extended)
    {
        Some(extended)
    } else {
        None
    }
}
