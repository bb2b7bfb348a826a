//! Reasoning drivers built on the forward engine and the update executor
//!
//! - [`ReasoningPipeline`]: an ordered chain of rule-set stages. Each stage
//!   computes the closure of its input under its own rules and hands a
//!   fresh copy of the result to the next stage. There is one pass over the
//!   chain, never a combined closure over all stages.
//! - [`FixpointUpdateLoop`]: re-runs a batch of SPARQL updates until the
//!   triple count stops growing or an iteration cap is reached.
//!
//! # Usage
//!
//! ```ignore
//! use rulepipe::cache::ReasonerCache;
//! use rulepipe::reasoning::ReasoningPipeline;
//! use rulepipe::source::{load_graph, RuleSource};
//!
//! let cache = ReasonerCache::unbounded();
//! let sources = RuleSource::split_list("people.rules;orgs.rules");
//! let pipeline = ReasoningPipeline::from_sources(&sources, "my", &cache)?;
//! let output = pipeline.run(load_graph("data.ttl", None)?)?;
//! ```

mod fixpoint;
mod pipeline;

pub use fixpoint::{FixpointReport, FixpointUpdateLoop, IterationProgress, LogProgress, ProgressObserver};
pub use pipeline::{request_prefixes, PipelineOutput, ReasoningPipeline, ReasoningStage, StageReport};
