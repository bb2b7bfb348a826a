//! Repeated SPARQL update batches run to a fixpoint
//!
//! The loop stops on cardinality alone: an iteration that leaves the
//! triple count no larger than before ends the run, even if it changed
//! which triples are present.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::{ErrorCode, ReasonError, ReasonResult};
use crate::graph::Graph;
use crate::sparql::{execute_update, parse_update, UpdateRequest};

/// Progress after one executed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationProgress {
    /// 1-based count of batches executed so far
    pub iteration: usize,
    /// Triple count after this batch
    pub triples: usize,
    pub elapsed: Duration,
}

/// Receives one call per executed batch
pub trait ProgressObserver {
    fn on_iteration(&mut self, progress: &IterationProgress);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&IterationProgress),
{
    fn on_iteration(&mut self, progress: &IterationProgress) {
        self(progress)
    }
}

/// Observer that logs each iteration at info
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_iteration(&mut self, progress: &IterationProgress) {
        info!(
            iteration = progress.iteration,
            triples = progress.triples,
            elapsed_ms = progress.elapsed.as_millis() as u64,
            "Fixpoint iteration"
        );
    }
}

/// Outcome of a fixpoint run
#[derive(Debug, Clone, Serialize)]
pub struct FixpointReport {
    pub iterations: usize,
    pub initial_triples: usize,
    pub triples: usize,
    /// The loop stopped at its cap while the graph was still growing
    pub cap_reached: bool,
    pub inserted: usize,
    pub deleted: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl FixpointReport {
    /// The non-fatal cap error, when the cap was hit
    pub fn cap_warning(&self, cap: usize) -> Option<ReasonError> {
        self.cap_reached.then(|| ReasonError::iteration_cap(cap, self.triples))
    }
}

/// A parsed update batch and the iteration cap it runs under
#[derive(Debug, Clone)]
pub struct FixpointUpdateLoop {
    request: UpdateRequest,
    cap: usize,
}

impl FixpointUpdateLoop {
    /// A cap of 0 is raised to 1: the batch always runs at least once
    pub fn new(request: UpdateRequest, cap: usize) -> Self {
        FixpointUpdateLoop { request, cap: cap.max(1) }
    }

    /// Parse update text from `source` under the default cap
    pub fn parse(text: &str, source: &str) -> ReasonResult<Self> {
        let request = parse_update(text, None).map_err(|e| e.into_reason_error(ErrorCode::UpdateParse, source))?;
        info!(source, operations = request.operations().len(), "Loaded update batch");
        Ok(Self::new(request, DEFAULT_MAX_ITERATIONS))
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(1);
        self
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn request(&self) -> &UpdateRequest {
        &self.request
    }

    /// Execute the batch against `graph` until an iteration does not
    /// strictly grow it, or until `cap` batches have run
    pub fn run(&self, graph: &mut Graph, observer: &mut dyn ProgressObserver) -> ReasonResult<FixpointReport> {
        let started = Instant::now();
        let initial_triples = graph.len();
        let mut report = FixpointReport {
            iterations: 0,
            initial_triples,
            triples: initial_triples,
            cap_reached: false,
            inserted: 0,
            deleted: 0,
            elapsed: Duration::ZERO,
        };

        loop {
            let before = graph.len();
            let iteration_started = Instant::now();
            let result = execute_update(&self.request, graph)
                .map_err(|e| e.with_context("iteration", (report.iterations + 1).to_string()))?;

            report.iterations += 1;
            report.inserted += result.inserted;
            report.deleted += result.deleted;
            report.triples = graph.len();
            observer.on_iteration(&IterationProgress {
                iteration: report.iterations,
                triples: report.triples,
                elapsed: iteration_started.elapsed(),
            });

            if report.triples <= before {
                break;
            }
            if report.iterations >= self.cap {
                report.cap_reached = true;
                if let Some(warning) = report.cap_warning(self.cap) {
                    warn!(code = warning.code.code(), "{}", warning.message);
                }
                break;
            }
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Term, Triple};

    const EX: &str = "PREFIX ex: <http://example.org/>\n";

    fn ex(local: &str) -> Term {
        Term::uri(format!("http://example.org/{}", local))
    }

    /// `n0 -> n1 -> ... -> n{len}` with only n0 reached
    fn chain(len: usize) -> Graph {
        let mut graph = Graph::new();
        graph.insert(Triple::new(ex("n0"), ex("state"), ex("Reached")));
        for i in 0..len {
            graph.insert(Triple::new(ex(&format!("n{}", i)), ex("next"), ex(&format!("n{}", i + 1))));
        }
        graph
    }

    fn propagate() -> FixpointUpdateLoop {
        FixpointUpdateLoop::parse(
            &format!("{}INSERT {{ ?y ex:state ex:Reached }} WHERE {{ ?x ex:state ex:Reached . ?x ex:next ?y }}", EX),
            "propagate.ru",
        )
        .unwrap()
    }

    #[test]
    fn test_stops_after_first_non_growing_iteration() {
        let mut graph = chain(5);
        let mut seen = Vec::new();
        let report = propagate()
            .run(&mut graph, &mut |p: &IterationProgress| seen.push((p.iteration, p.triples)))
            .unwrap();

        // five growing iterations, then one that adds nothing
        assert_eq!(report.iterations, 6);
        assert!(!report.cap_reached);
        assert_eq!(report.triples, 11);
        assert_eq!(report.inserted, 5);
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], (1, 7));
        assert_eq!(seen[5], (6, 11));
    }

    #[test]
    fn test_always_runs_once() {
        let update = FixpointUpdateLoop::parse(&format!("{}DELETE WHERE {{ ?s ex:missing ?o }}", EX), "noop.ru").unwrap();
        let mut graph = chain(2);
        let report = update.run(&mut graph, &mut LogProgress).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.triples, report.initial_triples);
    }

    #[test]
    fn test_stops_exactly_at_cap() {
        let update = FixpointUpdateLoop::parse(
            &format!("{}INSERT {{ _:copy ex:of ?s }} WHERE {{ ?s ?p ?o }}", EX),
            "grow.ru",
        )
        .unwrap()
        .with_cap(4);

        let mut graph = chain(1);
        let report = update.run(&mut graph, &mut LogProgress).unwrap();
        assert_eq!(report.iterations, 4);
        assert!(report.cap_reached);
        let warning = report.cap_warning(4).unwrap();
        assert_eq!(warning.code, ErrorCode::IterationCapExceeded);
    }

    #[test]
    fn test_zero_cap_still_runs_once() {
        let update = propagate().with_cap(0);
        assert_eq!(update.cap(), 1);
        let report = update.run(&mut chain(3), &mut LogProgress).unwrap();
        assert_eq!(report.iterations, 1);
        assert!(report.cap_reached);
    }

    #[test]
    fn test_shrinking_batch_stops() {
        let update = FixpointUpdateLoop::parse(&format!("{}DELETE WHERE {{ ?s ex:next ?o }}", EX), "drop.ru").unwrap();
        let mut graph = chain(3);
        let report = update.run(&mut graph, &mut LogProgress).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.deleted, 3);
    }

    #[test]
    fn test_malformed_update_is_parse_error() {
        let err = FixpointUpdateLoop::parse("INSERT { ?s ?p }", "bad.ru").unwrap_err();
        assert_eq!(err.code, ErrorCode::UpdateParse);
    }

    #[test]
    fn test_failing_batch_is_fatal() {
        let update =
            FixpointUpdateLoop::parse("INSERT DATA { \"lit\" <http://e/p> <http://e/o> }", "lit.ru").unwrap();
        let err = update.run(&mut Graph::new(), &mut LogProgress).unwrap_err();
        assert_eq!(err.code, ErrorCode::UpdateExecution);
        assert_eq!(err.context_field("iteration"), Some("1"));
    }
}
