//! Staged forward reasoning

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::cache::ReasonerCache;
use crate::error::{ReasonError, ReasonResult};
use crate::graph::Graph;
use crate::parser::{resolve_binding, PrefixTable};
use crate::reasoner::{ForwardEngine, ReasonerStats};
use crate::source::{read_rule_text, RuleSource};

/// One stage: a rule source and the engine compiled from it
#[derive(Debug, Clone)]
pub struct ReasoningStage {
    pub source: RuleSource,
    pub engine: Arc<ForwardEngine>,
}

impl ReasoningStage {
    pub fn new(source: RuleSource, engine: Arc<ForwardEngine>) -> Self {
        ReasoningStage { source, engine }
    }
}

/// What one stage did
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub source: String,
    pub position: usize,
    pub rules: usize,
    pub triples_in: usize,
    pub triples_out: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub stats: ReasonerStats,
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(elapsed.as_millis())
}

/// Final graph plus per-stage reports
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub graph: Graph,
    pub stages: Vec<StageReport>,
}

/// The prefix table for one request: `prefix` bound to the IRI the first
/// rule source declares for it, or to the empty string when it declares
/// none.
pub fn request_prefixes(first: &RuleSource, prefix: &str) -> ReasonResult<PrefixTable> {
    let text = read_rule_text(first)?;
    let mut table = PrefixTable::new();
    table.bind(&resolve_binding(&text, prefix, &first.location));
    Ok(table)
}

/// An ordered, non-empty chain of reasoning stages
#[derive(Debug, Clone)]
pub struct ReasoningPipeline {
    stages: Vec<ReasoningStage>,
}

impl ReasoningPipeline {
    pub fn new(stages: Vec<ReasoningStage>) -> ReasonResult<Self> {
        if stages.is_empty() {
            return Err(ReasonError::validation("A pipeline needs at least one rule source"));
        }
        Ok(ReasoningPipeline { stages })
    }

    /// Resolve every source through `cache`, all parsed under the prefix
    /// table taken from the first source
    pub fn from_sources(sources: &[RuleSource], prefix: &str, cache: &ReasonerCache) -> ReasonResult<Self> {
        let first = sources
            .first()
            .ok_or_else(|| ReasonError::empty_input("rule_paths"))?;
        let prefixes = request_prefixes(first, prefix)?;

        let stages = sources
            .iter()
            .map(|source| {
                let engine = cache.get_or_create(source, &prefixes)?;
                Ok(ReasoningStage::new(source.clone(), engine))
            })
            .collect::<ReasonResult<Vec<_>>>()?;
        Self::new(stages)
    }

    pub fn stages(&self) -> &[ReasoningStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage once, in order. Each stage's output is a fresh graph
    /// that becomes the next stage's input.
    pub fn run(&self, input: Graph) -> ReasonResult<PipelineOutput> {
        let mut current = input;
        let mut reports = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let started = Instant::now();
            let triples_in = current.len();
            let (next, stats) = stage
                .engine
                .closure(&current)
                .map_err(|e| e.with_context("stage", stage.source.position.to_string()))?;
            let elapsed = started.elapsed();

            info!(
                stage = stage.source.position,
                source = %stage.source,
                rules = stage.engine.rules().len(),
                triples_in,
                triples_out = next.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Stage complete"
            );
            reports.push(StageReport {
                source: stage.source.location.clone(),
                position: stage.source.position,
                rules: stage.engine.rules().len(),
                triples_in,
                triples_out: next.len(),
                elapsed,
                stats,
            });
            current = next;
        }

        Ok(PipelineOutput { graph: current, stages: reports })
    }
}
