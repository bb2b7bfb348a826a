//! In-memory RDF graph
//!
//! A graph is a set of ground triples. Insertion order is kept so that
//! serialization is stable, but equality is set equality.

mod ntriples;

pub use ntriples::{to_ntriples, write_ntriples};

use fnv::{FnvBuildHasher, FnvHashMap};
use indexmap::IndexSet;

use crate::term::{substitute_triple, unify_triple, Bindings, Term, Triple};

type TripleSet = IndexSet<Triple, FnvBuildHasher>;

/// A set of RDF triples with a predicate index for pattern matching
#[derive(Clone, Default)]
pub struct Graph {
    triples: TripleSet,
    by_predicate: FnvHashMap<Term, TripleSet>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple. Returns true if it was not already present.
    ///
    /// Triples containing variables are never stored.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if triple.has_variables() || self.triples.contains(&triple) {
            return false;
        }
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .insert(triple.clone());
        self.triples.insert(triple)
    }

    /// Remove a triple. Returns true if it was present.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        if !self.triples.swap_remove(triple) {
            return false;
        }
        if let Some(bucket) = self.by_predicate.get_mut(&triple.predicate) {
            bucket.swap_remove(triple);
            if bucket.is_empty() {
                self.by_predicate.remove(&triple.predicate);
            }
        }
        true
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Number of triples
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Clear all triples
    pub fn clear(&mut self) {
        self.triples.clear();
        self.by_predicate.clear();
    }

    /// Iterate over all triples in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Triples matching the given positions; `None` is a wildcard
    pub fn triples_matching<'a>(
        &'a self,
        subject: Option<&'a Term>,
        predicate: Option<&'a Term>,
        object: Option<&'a Term>,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        let filter = move |t: &&Triple| {
            subject.map_or(true, |s| &t.subject == s) && object.map_or(true, |o| &t.object == o)
        };
        match predicate {
            Some(p) => match self.by_predicate.get(p) {
                Some(bucket) => Box::new(bucket.iter().filter(filter)),
                None => Box::new(std::iter::empty()),
            },
            None => Box::new(self.triples.iter().filter(filter)),
        }
    }

    /// Match a pattern against the graph under existing bindings, returning
    /// every extension of those bindings
    pub fn match_pattern(&self, pattern: &Triple, bindings: &Bindings) -> Vec<Bindings> {
        let bound = substitute_triple(pattern, bindings);
        let matches = self
            .triples_matching(ground(&bound.subject), ground(&bound.predicate), ground(&bound.object))
            .filter_map(|triple| unify_triple(&bound, triple, bindings))
            .collect();
        matches
    }

    /// Conjunctive query over several patterns
    pub fn query(&self, patterns: &[Triple]) -> Vec<Bindings> {
        let mut results = vec![Bindings::default()];
        for pattern in patterns {
            results = results
                .iter()
                .flat_map(|bindings| self.match_pattern(pattern, bindings))
                .collect();
            if results.is_empty() {
                break;
            }
        }
        results
    }

    /// Whether any triple matches the pattern under the bindings
    pub fn has_match(&self, pattern: &Triple, bindings: &Bindings) -> bool {
        let bound = substitute_triple(pattern, bindings);
        let found = self
            .triples_matching(ground(&bound.subject), ground(&bound.predicate), ground(&bound.object))
            .any(|triple| unify_triple(&bound, triple, bindings).is_some());
        found
    }

    /// Triples of `self` that are absent from `other`
    pub fn difference(&self, other: &Graph) -> Graph {
        self.iter().filter(|t| !other.contains(t)).cloned().collect()
    }

    /// Whether every triple of `self` is in `other`
    pub fn is_subset(&self, other: &Graph) -> bool {
        self.len() <= other.len() && self.iter().all(|t| other.contains(t))
    }
}

fn ground(term: &Term) -> Option<&Term> {
    (!term.is_variable()).then_some(term)
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }
}

impl Eq for Graph {}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.insert(triple);
        }
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Graph::new();
        graph.extend(iter);
        graph
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = indexmap::set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph {{")?;
        for triple in &self.triples {
            writeln!(f, "  {:?}", triple)?;
        }
        write!(f, "}}")
    }
}
