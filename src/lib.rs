//! rulepipe - staged rule reasoning over RDF graphs
//!
//! Runs ordered chains of forward-chaining rule sets over an RDF graph,
//! runs SPARQL update batches to a fixpoint, and serves both over HTTP
//! with a shared cache of compiled reasoners.
//!
//! # Architecture
//!
//! - [`term`], [`graph`]: RDF terms and an indexed in-memory graph
//! - [`parser`]: Turtle / N-Triples input, the forward rule language and
//!   per-call prefix tables
//! - [`reasoner`], [`builtins`]: the forward engine and its builtins
//! - [`sparql`]: the SPARQL update subset used by fixpoint batches
//! - [`reasoning`]: [`ReasoningPipeline`] and [`FixpointUpdateLoop`]
//! - [`cache`]: [`ReasonerCache`], one engine per rule source
//! - [`server`]: the reasoning service
//!
//! # Example
//!
//! ```rust
//! use rulepipe::parser::{parse_graph, PrefixTable, RdfFormat};
//! use rulepipe::reasoner::{EngineConfig, ForwardEngine};
//! use rulepipe::source::parse_rule_text;
//!
//! let data = parse_graph(
//!     "@prefix my: <http://example.org/onto#> .\n<http://example.org/a> a my:Person .",
//!     RdfFormat::Turtle,
//!     None,
//! )
//! .unwrap();
//!
//! let rules = parse_rule_text(
//!     "@prefix my: <http://example.org/onto#>.\n[r1: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]",
//!     "inline",
//!     &PrefixTable::new(),
//! )
//! .unwrap();
//!
//! let engine = ForwardEngine::new(rules, EngineConfig::default()).unwrap();
//! let (closed, stats) = engine.closure(&data).unwrap();
//! assert_eq!(closed.len(), 2);
//! assert_eq!(stats.triples_derived, 1);
//! ```

pub mod builtins;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod http_client;
pub mod logging;
pub mod parser;
pub mod reasoner;
pub mod reasoning;
pub mod server;
pub mod source;
pub mod sparql;
pub mod term;

// Re-export term and graph types
pub use graph::Graph;
pub use term::{Bindings, BlankNode, Literal, Term, Triple, Uri, Variable};

// Re-export parser types
pub use parser::{parse_graph, parse_rules, ParseError, PrefixBinding, PrefixTable, RdfFormat};

// Re-export engine types
pub use reasoner::{EngineConfig, ForwardEngine, ReasonerStats, Rule, RuleSet};
pub use builtins::{BuiltinRegistry, BuiltinResult};

// Re-export reasoning drivers
pub use reasoning::{FixpointReport, FixpointUpdateLoop, ReasoningPipeline, ReasoningStage};
pub use cache::ReasonerCache;
pub use source::RuleSource;

// Re-export configuration types
pub use config::{ConfigError, RulepipeConfig};

// Re-export error types
pub use error::{ErrorCode, ErrorContext, ErrorResponse, ReasonError, ReasonResult};
