//! Forward-chaining engine for rule sets
//!
//! Implements the core inference loop:
//! - Pattern matching with unification against the graph
//! - Builtin evaluation, deferred until their arguments are bound
//! - Naive rounds until a round derives nothing new
//!
//! Each rule fires at most once per distinct match of its body patterns,
//! so rules that mint blank nodes still reach a fixpoint.

mod rule;

pub use rule::{BodyAtom, BuiltinCall, HeadAtom, Rule, RuleSet};

use std::sync::Arc;

use fnv::FnvHashSet;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::builtins::{node, BuiltinContext, BuiltinRegistry, BuiltinResult};
use crate::error::{ErrorCode, ReasonError, ReasonResult};
use crate::graph::Graph;
use crate::term::{substitute, substitute_triple, Bindings, Term, Triple, Variable};

/// Configuration for the forward engine
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Maximum number of rounds; 0 means no limit
    pub max_rounds: usize,
}

/// Statistics from one closure computation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReasonerStats {
    pub rounds: usize,
    pub rules_fired: usize,
    pub triples_derived: usize,
    pub builtins_evaluated: usize,
}

/// Variables bound by a rule's body patterns; they identify a firing
struct CompiledRule {
    pattern_vars: Vec<Variable>,
}

/// A forward-chaining engine bound to one rule set.
///
/// Built once and shared: the engine holds no per-run state, so one
/// instance may compute closures for many graphs concurrently.
pub struct ForwardEngine {
    rules: Arc<RuleSet>,
    compiled: Vec<CompiledRule>,
    builtins: BuiltinRegistry,
    config: EngineConfig,
}

impl std::fmt::Debug for ForwardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardEngine")
            .field("source", &self.rules.source())
            .field("rules", &self.compiled.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ForwardEngine {
    /// Build an engine, checking every builtin the rules call
    pub fn new(rules: impl Into<Arc<RuleSet>>, config: EngineConfig) -> ReasonResult<Self> {
        let rules = rules.into();
        let builtins = BuiltinRegistry::new();

        for rule in rules.rules() {
            for atom in &rule.body {
                if let BodyAtom::Builtin(call) = atom {
                    check_call(&builtins, rules.source(), rule, call, false)?;
                }
            }
            for atom in &rule.head {
                if let HeadAtom::Action(call) = atom {
                    check_call(&builtins, rules.source(), rule, call, true)?;
                }
            }
        }

        let compiled = rules
            .rules()
            .iter()
            .map(|rule| {
                let mut pattern_vars: Vec<Variable> = Vec::new();
                for atom in &rule.body {
                    if let BodyAtom::Pattern(pattern) = atom {
                        for var in pattern.variables() {
                            if !pattern_vars.contains(var) {
                                pattern_vars.push(var.clone());
                            }
                        }
                    }
                }
                CompiledRule { pattern_vars }
            })
            .collect();

        debug!(source = rules.source(), rules = rules.len(), "Compiled rule set");
        Ok(ForwardEngine { rules, compiled, builtins, config })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Compute the closure of a copy of `input`
    pub fn closure(&self, input: &Graph) -> ReasonResult<(Graph, ReasonerStats)> {
        let mut graph = input.clone();
        let stats = self.run(&mut graph)?;
        Ok((graph, stats))
    }

    /// Run rounds over `graph` in place until nothing new is derived
    pub fn run(&self, graph: &mut Graph) -> ReasonResult<ReasonerStats> {
        let mut stats = ReasonerStats::default();
        let mut fired: FnvHashSet<(usize, Vec<Option<Term>>)> = FnvHashSet::default();

        loop {
            if self.config.max_rounds > 0 && stats.rounds >= self.config.max_rounds {
                return Err(ReasonError::new(
                    ErrorCode::RoundLimitExceeded,
                    format!(
                        "Rule set {} still deriving after {} rounds",
                        self.rules.source(),
                        stats.rounds
                    ),
                )
                .with_context("triples", graph.len().to_string()));
            }
            stats.rounds += 1;

            let derived = self.step(graph, &mut fired, &mut stats);
            let mut added = 0;
            for triple in derived {
                if graph.insert(triple) {
                    added += 1;
                }
            }
            stats.triples_derived += added;
            trace!(round = stats.rounds, added, total = graph.len(), "Round complete");

            if added == 0 {
                break;
            }
        }

        debug!(
            source = self.rules.source(),
            rounds = stats.rounds,
            derived = stats.triples_derived,
            fired = stats.rules_fired,
            "Closure complete"
        );
        Ok(stats)
    }

    /// One round: fire every rule against the graph as it stood at the
    /// start of the round, returning the candidate triples
    fn step(
        &self,
        graph: &Graph,
        fired: &mut FnvHashSet<(usize, Vec<Option<Term>>)>,
        stats: &mut ReasonerStats,
    ) -> Vec<Triple> {
        let ctx = BuiltinContext::new(graph);
        let mut derived = Vec::new();

        for (index, (rule, compiled)) in self.rules.rules().iter().zip(&self.compiled).enumerate() {
            let mut matches = Vec::new();
            self.match_body(&rule.body, &ctx, Bindings::default(), Vec::new(), stats, &mut matches);

            for bindings in matches {
                let key: Vec<Option<Term>> =
                    compiled.pattern_vars.iter().map(|v| bindings.get(v).cloned()).collect();
                if !fired.insert((index, key)) {
                    continue;
                }
                stats.rules_fired += 1;
                self.fire(rule, &bindings, graph, &mut derived);
            }
        }
        derived
    }

    /// Instantiate the head of `rule` under one body match
    fn fire(&self, rule: &Rule, bindings: &Bindings, graph: &Graph, derived: &mut Vec<Triple>) {
        for atom in &rule.head {
            match atom {
                HeadAtom::Triple(pattern) => {
                    let triple = substitute_triple(pattern, bindings);
                    if !triple.is_valid_rdf() {
                        trace!(rule = rule.label(), %triple, "Skipping non-RDF head triple");
                        continue;
                    }
                    if !graph.contains(&triple) {
                        derived.push(triple);
                    }
                }
                HeadAtom::Action(call) => {
                    let args: Vec<Term> = call.args.iter().map(|a| substitute(a, bindings)).collect();
                    info!(target: "rulepipe::print", rule = rule.label(), "{}", node::print(&args));
                }
            }
        }
    }

    /// Match body atoms left to right. Builtins that are not ready are
    /// retried after each later pattern binds more variables.
    fn match_body<'r>(
        &self,
        atoms: &'r [BodyAtom],
        ctx: &BuiltinContext,
        bindings: Bindings,
        deferred: Vec<&'r BuiltinCall>,
        stats: &mut ReasonerStats,
        out: &mut Vec<Bindings>,
    ) {
        let Some((atom, rest)) = atoms.split_first() else {
            if let Some((bindings, pending)) = self.retry_deferred(deferred, bindings, ctx, stats) {
                if pending.is_empty() {
                    out.push(bindings);
                }
            }
            return;
        };

        match atom {
            BodyAtom::Pattern(pattern) => {
                for extended in ctx.graph.match_pattern(pattern, &bindings) {
                    if let Some((extended, pending)) = self.retry_deferred(deferred.clone(), extended, ctx, stats) {
                        self.match_body(rest, ctx, extended, pending, stats, out);
                    }
                }
            }
            BodyAtom::Builtin(call) => match self.call_builtin(call, &bindings, ctx, stats) {
                BuiltinResult::Success(extended) => self.match_body(rest, ctx, extended, deferred, stats, out),
                BuiltinResult::Failure => {}
                BuiltinResult::NotReady => {
                    let mut deferred = deferred;
                    deferred.push(call);
                    self.match_body(rest, ctx, bindings, deferred, stats, out);
                }
            },
        }
    }

    /// Evaluate deferred builtins until none makes progress. Returns `None`
    /// if any fails, otherwise the extended bindings and those still waiting.
    fn retry_deferred<'r>(
        &self,
        mut pending: Vec<&'r BuiltinCall>,
        mut bindings: Bindings,
        ctx: &BuiltinContext,
        stats: &mut ReasonerStats,
    ) -> Option<(Bindings, Vec<&'r BuiltinCall>)> {
        loop {
            let before = pending.len();
            let mut waiting = Vec::new();
            for call in pending {
                match self.call_builtin(call, &bindings, ctx, stats) {
                    BuiltinResult::Success(extended) => bindings = extended,
                    BuiltinResult::Failure => return None,
                    BuiltinResult::NotReady => waiting.push(call),
                }
            }
            if waiting.is_empty() || waiting.len() == before {
                return Some((bindings, waiting));
            }
            pending = waiting;
        }
    }

    fn call_builtin(
        &self,
        call: &BuiltinCall,
        bindings: &Bindings,
        ctx: &BuiltinContext,
        stats: &mut ReasonerStats,
    ) -> BuiltinResult {
        stats.builtins_evaluated += 1;
        let args: Vec<Term> = call.args.iter().map(|a| substitute(a, bindings)).collect();
        self.builtins.evaluate(&call.name, &args, bindings, ctx)
    }
}

fn check_call(
    builtins: &BuiltinRegistry,
    source: &str,
    rule: &Rule,
    call: &BuiltinCall,
    in_head: bool,
) -> ReasonResult<()> {
    let Some(spec) = builtins.get(&call.name) else {
        return Err(ReasonError::rule_parse(format!(
            "{}: unknown builtin '{}' in rule {}",
            source,
            call.name,
            rule.label()
        ))
        .with_context("builtin", call.name.clone())
        .with_hint(format!("known builtins: {}", builtins.names().join(", "))));
    };
    if spec.is_action() != in_head {
        let place = if in_head { "head" } else { "body" };
        return Err(ReasonError::rule_parse(format!(
            "{}: builtin '{}' cannot appear in a rule {} (rule {})",
            source,
            call.name,
            place,
            rule.label()
        ))
        .with_context("builtin", call.name.clone()));
    }
    if !spec.accepts(call.args.len()) {
        return Err(ReasonError::rule_parse(format!(
            "{}: builtin '{}' called with {} arguments in rule {}",
            source,
            call.name,
            call.args.len(),
            rule.label()
        ))
        .with_context("builtin", call.name.clone()));
    }
    Ok(())
}
