//! SPARQL Update requests and their execution against a graph

use fnv::FnvHashMap;
use tracing::trace;

use super::GroupPattern;
use crate::error::{ReasonError, ReasonResult};
use crate::graph::Graph;
use crate::term::{substitute, Bindings, Term, Triple};

/// Target of `CLEAR` / `DROP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    Default,
    /// No named graphs exist, so this never removes anything
    Named,
    All,
}

/// One operation of an update request
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    /// `INSERT DATA { ... }`
    InsertData(Vec<Triple>),
    /// `DELETE DATA { ... }`
    DeleteData(Vec<Triple>),
    /// `DELETE { ... } INSERT { ... } WHERE { ... }`, including the forms
    /// with a single template and `DELETE WHERE`
    Modify {
        delete: Vec<Triple>,
        insert: Vec<Triple>,
        pattern: GroupPattern,
    },
    /// `CLEAR` / `DROP`
    Clear(ClearTarget),
}

/// An ordered batch of update operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    operations: Vec<UpdateOperation>,
}

impl UpdateRequest {
    pub fn new(operations: Vec<UpdateOperation>) -> Self {
        UpdateRequest { operations }
    }

    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Counts of triples actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub inserted: usize,
    pub deleted: usize,
}

impl UpdateResult {
    fn merge(&mut self, other: UpdateResult) {
        self.inserted += other.inserted;
        self.deleted += other.deleted;
    }
}

/// Run every operation of `request` against `graph`, in order.
///
/// Each operation sees the effects of the ones before it. Within a
/// `Modify`, the WHERE clause is evaluated once against the graph as it
/// was before the operation, then all deletions are applied, then all
/// insertions.
pub fn execute_update(request: &UpdateRequest, graph: &mut Graph) -> ReasonResult<UpdateResult> {
    let mut total = UpdateResult::default();
    for (index, operation) in request.operations().iter().enumerate() {
        let result = execute_operation(operation, graph)
            .map_err(|e| e.with_context("operation", (index + 1).to_string()))?;
        trace!(operation = index + 1, inserted = result.inserted, deleted = result.deleted, "Update applied");
        total.merge(result);
    }
    Ok(total)
}

fn execute_operation(operation: &UpdateOperation, graph: &mut Graph) -> ReasonResult<UpdateResult> {
    match operation {
        UpdateOperation::InsertData(triples) => {
            let mut fresh = FnvHashMap::default();
            let mut result = UpdateResult::default();
            for triple in triples {
                let triple = relabel_blanks(triple, &mut fresh);
                if !triple.is_valid_rdf() {
                    return Err(ReasonError::update_execution(format!("Cannot insert non-RDF triple {}", triple)));
                }
                if graph.insert(triple) {
                    result.inserted += 1;
                }
            }
            Ok(result)
        }
        UpdateOperation::DeleteData(triples) => {
            let deleted = triples.iter().filter(|t| graph.remove(t)).count();
            Ok(UpdateResult { inserted: 0, deleted })
        }
        UpdateOperation::Modify { delete, insert, pattern } => {
            let solutions = pattern.evaluate(graph);

            let mut removals = Vec::new();
            let mut additions = Vec::new();
            for solution in &solutions {
                instantiate(delete, solution, None, &mut removals);
                let mut fresh = FnvHashMap::default();
                instantiate(insert, solution, Some(&mut fresh), &mut additions);
            }

            let mut result = UpdateResult::default();
            for triple in &removals {
                if graph.remove(triple) {
                    result.deleted += 1;
                }
            }
            for triple in additions {
                if graph.insert(triple) {
                    result.inserted += 1;
                }
            }
            Ok(result)
        }
        UpdateOperation::Clear(ClearTarget::Default | ClearTarget::All) => {
            let deleted = graph.len();
            graph.clear();
            Ok(UpdateResult { inserted: 0, deleted })
        }
        UpdateOperation::Clear(ClearTarget::Named) => Ok(UpdateResult::default()),
    }
}

/// Instantiate template triples under one solution. Triples left with
/// unbound variables or that are not valid RDF are skipped.
fn instantiate(
    template: &[Triple],
    solution: &Bindings,
    mut fresh: Option<&mut FnvHashMap<String, Term>>,
    out: &mut Vec<Triple>,
) {
    for pattern in template {
        let mut triple = Triple::new(
            substitute(&pattern.subject, solution),
            substitute(&pattern.predicate, solution),
            substitute(&pattern.object, solution),
        );
        if let Some(fresh) = fresh.as_deref_mut() {
            triple = relabel_blanks(&triple, fresh);
        }
        if triple.is_valid_rdf() {
            out.push(triple);
        }
    }
}

/// Replace each template blank node with a fresh one, consistently
/// within one `fresh` scope
fn relabel_blanks(triple: &Triple, fresh: &mut FnvHashMap<String, Term>) -> Triple {
    let mut relabel = |term: &Term| match term {
        Term::BlankNode(node) => fresh
            .entry(node.label().to_string())
            .or_insert_with(Term::fresh_blank)
            .clone(),
        other => other.clone(),
    };
    Triple::new(relabel(&triple.subject), relabel(&triple.predicate), relabel(&triple.object))
}
