//! Builtins for forward rules
//!
//! Body builtins are tests or binders called with their arguments already
//! substituted: anything still a variable is unbound. Head builtins are
//! actions run once per rule firing.
//!
//! - math: comparisons and arithmetic
//! - string: regex and concatenation
//! - node: node kind tests, `noValue`, blank node and skolem constructors

use std::collections::HashMap;

use crate::graph::Graph;
use crate::term::{Bindings, Term};

pub mod helpers;
pub mod math;
pub mod node;
pub mod string;

/// Result of evaluating a builtin
#[derive(Debug, Clone)]
pub enum BuiltinResult {
    /// The builtin succeeded with these bindings
    Success(Bindings),
    /// The builtin failed (no match)
    Failure,
    /// The builtin cannot be evaluated yet (insufficient bindings)
    NotReady,
}

/// What a builtin may look at besides its arguments
pub struct BuiltinContext<'a> {
    pub graph: &'a Graph,
}

impl<'a> BuiltinContext<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        BuiltinContext { graph }
    }
}

/// A body builtin function
pub type BuiltinFn = fn(&[Term], &Bindings, &BuiltinContext) -> BuiltinResult;

/// Where a builtin may appear
#[derive(Clone, Copy)]
pub enum BuiltinKind {
    Body(BuiltinFn),
    HeadAction,
}

/// A registered builtin with its accepted argument counts
#[derive(Clone, Copy)]
pub struct BuiltinSpec {
    pub kind: BuiltinKind,
    pub min_args: usize,
    /// `None` means no upper bound
    pub max_args: Option<usize>,
}

impl BuiltinSpec {
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, BuiltinKind::HeadAction)
    }
}

/// Registry of builtins by local name
pub struct BuiltinRegistry {
    builtins: HashMap<&'static str, BuiltinSpec>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    /// Create a registry with the standard builtins
    pub fn new() -> Self {
        let mut registry = BuiltinRegistry { builtins: HashMap::new() };

        registry.register_math();
        registry.register_string();
        registry.register_node();

        registry.builtins.insert(
            "print",
            BuiltinSpec { kind: BuiltinKind::HeadAction, min_args: 0, max_args: None },
        );
        registry
    }

    /// Register a body builtin
    pub fn register(&mut self, name: &'static str, min_args: usize, max_args: Option<usize>, f: BuiltinFn) {
        self.builtins.insert(name, BuiltinSpec { kind: BuiltinKind::Body(f), min_args, max_args });
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinSpec> {
        self.builtins.get(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Evaluate a body builtin; unknown names fail
    pub fn evaluate(&self, name: &str, args: &[Term], bindings: &Bindings, ctx: &BuiltinContext) -> BuiltinResult {
        match self.builtins.get(name).map(|spec| spec.kind) {
            Some(BuiltinKind::Body(f)) => f(args, bindings, ctx),
            _ => BuiltinResult::Failure,
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.builtins.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn register_math(&mut self) {
        self.register("equal", 2, Some(2), math::equal);
        self.register("notEqual", 2, Some(2), math::not_equal);
        self.register("lessThan", 2, Some(2), math::less_than);
        self.register("greaterThan", 2, Some(2), math::greater_than);
        self.register("le", 2, Some(2), math::less_or_equal);
        self.register("ge", 2, Some(2), math::greater_or_equal);
        self.register("sum", 3, Some(3), math::sum);
        self.register("difference", 3, Some(3), math::difference);
        self.register("product", 3, Some(3), math::product);
        self.register("quotient", 3, Some(3), math::quotient);
        self.register("min", 3, Some(3), math::min);
        self.register("max", 3, Some(3), math::max);
    }

    fn register_string(&mut self) {
        self.register("regex", 2, None, string::regex);
        self.register("strConcat", 1, None, string::str_concat);
        self.register("uriConcat", 1, None, string::uri_concat);
    }

    fn register_node(&mut self) {
        self.register("isLiteral", 1, Some(1), node::is_literal);
        self.register("notLiteral", 1, Some(1), node::not_literal);
        self.register("isBNode", 1, Some(1), node::is_bnode);
        self.register("notBNode", 1, Some(1), node::not_bnode);
        self.register("bound", 1, None, node::bound);
        self.register("unbound", 1, None, node::unbound);
        self.register("noValue", 2, Some(3), node::no_value);
        self.register("makeTemp", 1, Some(1), node::make_temp);
        self.register("makeSkolem", 1, None, node::make_skolem);
        self.register("makeNamedSkolem", 1, None, node::make_named_skolem);
    }
}
