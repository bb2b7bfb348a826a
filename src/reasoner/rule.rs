//! Forward rules and rule sets

use std::fmt;

use crate::term::{Term, Triple, Variable};

/// A builtin call `name(arg, ...)` in a rule body or head
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltinCall {
    pub name: String,
    pub args: Vec<Term>,
}

impl BuiltinCall {
    pub fn new(name: impl Into<String>, args: Vec<Term>) -> Self {
        BuiltinCall { name: name.into(), args }
    }
}

impl fmt::Display for BuiltinCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// One clause of a rule body
#[derive(Clone, Debug, PartialEq)]
pub enum BodyAtom {
    /// A triple pattern matched against the graph
    Pattern(Triple),
    /// A builtin test or binder
    Builtin(BuiltinCall),
}

/// One clause of a rule head
#[derive(Clone, Debug, PartialEq)]
pub enum HeadAtom {
    /// A triple asserted for every body match
    Triple(Triple),
    /// A side-effect action such as `print`
    Action(BuiltinCall),
}

/// A forward rule: body → head
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Name/identifier for the rule (optional)
    pub name: Option<String>,
    pub body: Vec<BodyAtom>,
    pub head: Vec<HeadAtom>,
}

impl Rule {
    pub fn new(body: Vec<BodyAtom>, head: Vec<HeadAtom>) -> Self {
        Rule { name: None, body, head }
    }

    /// Create a named rule
    pub fn named(name: impl Into<String>, body: Vec<BodyAtom>, head: Vec<HeadAtom>) -> Self {
        Rule { name: Some(name.into()), body, head }
    }

    /// Shorthand for a rule made only of triple patterns
    pub fn from_patterns(body: Vec<Triple>, head: Vec<Triple>) -> Self {
        Rule::new(
            body.into_iter().map(BodyAtom::Pattern).collect(),
            head.into_iter().map(HeadAtom::Triple).collect(),
        )
    }

    /// Name for log output
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Variables that appear in the head, in order of first appearance
    pub fn head_variables(&self) -> Vec<&Variable> {
        let mut vars: Vec<&Variable> = Vec::new();
        for atom in &self.head {
            let terms: Vec<&Term> = match atom {
                HeadAtom::Triple(t) => vec![&t.subject, &t.predicate, &t.object],
                HeadAtom::Action(call) => call.args.iter().collect(),
            };
            for var in terms.into_iter().filter_map(Term::as_variable) {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
        }
        vars
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        for atom in &self.body {
            match atom {
                BodyAtom::Pattern(t) => write!(f, "({} {} {}) ", t.subject, t.predicate, t.object)?,
                BodyAtom::Builtin(call) => write!(f, "{} ", call)?,
            }
        }
        write!(f, "->")?;
        for atom in &self.head {
            match atom {
                HeadAtom::Triple(t) => write!(f, " ({} {} {})", t.subject, t.predicate, t.object)?,
                HeadAtom::Action(call) => write!(f, " {}", call)?,
            }
        }
        write!(f, "]")
    }
}

/// The ordered rules parsed from one rule source. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    source: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(source: impl Into<String>, rules: Vec<Rule>) -> Self {
        RuleSet { source: source.into(), rules }
    }

    /// Where the rule text came from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_display() {
        let rule = Rule::named(
            "agent",
            vec![BodyAtom::Pattern(Triple::new(
                Term::variable("x"),
                Term::uri("http://ex/type"),
                Term::uri("http://ex/Person"),
            ))],
            vec![HeadAtom::Triple(Triple::new(
                Term::variable("x"),
                Term::uri("http://ex/type"),
                Term::uri("http://ex/Agent"),
            ))],
        );
        assert_eq!(
            rule.to_string(),
            "[agent: (?x <http://ex/type> <http://ex/Person>) -> (?x <http://ex/type> <http://ex/Agent>)]"
        );
    }

    #[test]
    fn test_head_variables() {
        let rule = Rule::new(
            vec![],
            vec![
                HeadAtom::Triple(Triple::new(Term::variable("x"), Term::uri("http://ex/p"), Term::variable("y"))),
                HeadAtom::Action(BuiltinCall::new("print", vec![Term::variable("x"), Term::variable("z")])),
            ],
        );
        let names: Vec<_> = rule.head_variables().into_iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }
}
