//! Forward rule text parser
//!
//! Reads Jena-style rule files:
//!
//! ```text
//! @prefix my: <http://example.org/onto#>.
//! # comments start with '#' or '//'
//! [agent: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]
//! [adult: (?p my:age ?a) greaterThan(?a, 17) -> (?p rdf:type my:Adult)]
//! ```
//!
//! Name resolution order for a prefixed name: the file's own `@prefix`
//! lines, then the caller's table, then `rdf`, `rdfs`, `xsd`, `owl`.

use super::{blank_node_label, numeric_literal, variable_name, word, Cursor, ParseError, PrefixTable};
use crate::reasoner::{BodyAtom, BuiltinCall, HeadAtom, Rule, RuleSet};
use crate::term::{Term, Triple};

/// Parse rule text from `source` under the given prefix table
pub fn parse_rules(text: &str, source: &str, prefixes: &PrefixTable) -> Result<RuleSet, ParseError> {
    let mut table = PrefixTable::standard();
    table.extend_from(prefixes);

    let mut parser = RuleParser { cursor: Cursor::new(text), prefixes: table };
    let rules = parser.parse_document()?;
    Ok(RuleSet::new(source, rules))
}

struct RuleParser<'a> {
    cursor: Cursor<'a>,
    prefixes: PrefixTable,
}

impl<'a> RuleParser<'a> {
    fn parse_document(&mut self) -> Result<Vec<Rule>, ParseError> {
        let mut rules = Vec::new();
        while !self.cursor.at_end() {
            if self.cursor.eat_str("@prefix") {
                self.parse_prefix()?;
            } else if self.cursor.starts_with("@include") {
                return Err(self.cursor.unsupported("@include"));
            } else if self.cursor.starts_with("[") {
                rules.push(self.parse_rule()?);
            } else {
                return Err(self.cursor.unexpected("'[' or @prefix"));
            }
        }
        Ok(rules)
    }

    /// `@prefix p: <iri>.` (the dot is optional)
    fn parse_prefix(&mut self) -> Result<(), ParseError> {
        let (prefix, local) = self.cursor.token("prefix name", super::prefixed_name)?;
        if !local.is_empty() {
            return Err(self.cursor.error(format!("malformed prefix declaration '{}:{}'", prefix, local)));
        }
        let iri = self.cursor.token("namespace IRI", super::iri_ref)?;
        self.prefixes.insert(prefix, iri);
        self.cursor.eat('.');
        Ok(())
    }

    /// `[name: body -> head]`
    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.cursor.expect('[')?;
        let name = self.parse_rule_name();

        let mut body = Vec::new();
        loop {
            if self.cursor.eat_str("->") {
                break;
            }
            if self.cursor.starts_with("<-") {
                return Err(self.cursor.unsupported("backward rule '<-'"));
            }
            if self.cursor.at_end() {
                return Err(ParseError::UnexpectedEof);
            }
            body.push(self.parse_body_atom()?);
            self.cursor.eat(',');
        }

        let mut head = Vec::new();
        loop {
            if self.cursor.eat(']') {
                break;
            }
            if self.cursor.starts_with("[") {
                return Err(self.cursor.unsupported("nested rule in head"));
            }
            if self.cursor.at_end() {
                return Err(ParseError::UnexpectedEof);
            }
            head.push(self.parse_head_atom()?);
            self.cursor.eat(',');
        }

        Ok(Rule { name, body, head })
    }

    /// Optional `name:` right after '['
    fn parse_rule_name(&mut self) -> Option<String> {
        self.cursor.skip_ws();
        let rest = self.cursor.rest();
        let end = rest.find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))?;
        if end == 0 || !rest[end..].starts_with(':') {
            return None;
        }
        let name = &rest[..end];
        self.cursor.eat_str(name);
        self.cursor.eat(':');
        Some(name.to_string())
    }

    fn parse_body_atom(&mut self) -> Result<BodyAtom, ParseError> {
        if self.cursor.starts_with("(") {
            return self.parse_triple_pattern().map(BodyAtom::Pattern);
        }
        self.parse_call().map(BodyAtom::Builtin)
    }

    fn parse_head_atom(&mut self) -> Result<HeadAtom, ParseError> {
        if self.cursor.starts_with("(") {
            return self.parse_triple_pattern().map(HeadAtom::Triple);
        }
        self.parse_call().map(HeadAtom::Action)
    }

    /// `(s p o)`, commas between terms allowed
    fn parse_triple_pattern(&mut self) -> Result<Triple, ParseError> {
        self.cursor.expect('(')?;
        let subject = self.parse_term()?;
        self.cursor.eat(',');
        let predicate = self.parse_term()?;
        self.cursor.eat(',');
        let object = self.parse_term()?;
        self.cursor.expect(')')?;
        Ok(Triple::new(subject, predicate, object))
    }

    /// `name(arg, ...)`
    fn parse_call(&mut self) -> Result<BuiltinCall, ParseError> {
        let name = self.cursor.token("builtin call or triple pattern", word)?;
        if !self.cursor.rest().starts_with('(') {
            return Err(self.cursor.unexpected(&format!("'(' after builtin name '{}'", name)));
        }
        self.cursor.expect('(')?;
        let mut args = Vec::new();
        while !self.cursor.eat(')') {
            if self.cursor.at_end() {
                return Err(ParseError::UnexpectedEof);
            }
            args.push(self.parse_term()?);
            self.cursor.eat(',');
        }
        Ok(BuiltinCall::new(name, args))
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        if let Some(name) = self.cursor.try_token(variable_name) {
            return Ok(Term::variable(name));
        }
        if let Some(iri) = self.cursor.try_iri(&self.prefixes)? {
            return Ok(Term::Uri(iri.into()));
        }
        if let Some(label) = self.cursor.try_token(blank_node_label) {
            return Ok(Term::blank(label));
        }
        if let Some(literal) = self.cursor.try_quoted_literal(&self.prefixes)? {
            return Ok(literal);
        }
        if let Some(number) = self.cursor.try_token(numeric_literal) {
            return Ok(Term::Literal(number.into()));
        }
        if self.cursor.eat_keyword("true") {
            return Ok(Term::boolean(true));
        }
        if self.cursor.eat_keyword("false") {
            return Ok(Term::boolean(false));
        }
        Err(self.cursor.unexpected("term"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PrefixBinding;

    fn my_table() -> PrefixTable {
        let mut table = PrefixTable::new();
        table.bind(&PrefixBinding::new("my", "http://example.org/onto#"));
        table
    }

    #[test]
    fn test_simple_rule() {
        let text = "[agent: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]";
        let rules = parse_rules(text, "agent.rules", &my_table()).unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules.source(), "agent.rules");
        let rule = &rules.rules()[0];
        assert_eq!(rule.name.as_deref(), Some("agent"));
        assert_eq!(
            rule.head,
            vec![HeadAtom::Triple(Triple::new(
                Term::variable("x"),
                Term::uri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
                Term::uri("http://example.org/onto#Agent"),
            ))]
        );
    }

    #[test]
    fn test_file_prefix_overrides_caller_table() {
        let text = "@prefix my: <http://other.org/#>.\n[r: (?x my:p ?y) -> (?y my:p ?x)]";
        let rules = parse_rules(text, "r.rules", &my_table()).unwrap();
        match &rules.rules()[0].body[0] {
            BodyAtom::Pattern(t) => assert_eq!(t.predicate, Term::uri("http://other.org/#p")),
            other => panic!("unexpected atom {:?}", other),
        }
    }

    #[test]
    fn test_builtins_comments_and_literals() {
        let text = "# adults\n\
                    // second comment style\n\
                    [adult: (?p my:age ?a), greaterThan(?a, 17), noValue(?p rdf:type my:Minor)\n\
                       -> (?p rdf:type my:Adult) (?p my:label 'grown up'@en) print('adult', ?p)]\n\
                    [(?s my:score 1.5) -> (?s my:scored true)]";
        let rules = parse_rules(text, "adult.rules", &my_table()).unwrap();

        assert_eq!(rules.len(), 2);
        let adult = &rules.rules()[0];
        assert_eq!(adult.body.len(), 3);
        assert_eq!(
            adult.body[1],
            BodyAtom::Builtin(BuiltinCall::new("greaterThan", vec![Term::variable("a"), Term::integer(17)]))
        );
        match &adult.body[2] {
            BodyAtom::Builtin(call) => assert_eq!(call.args.len(), 3),
            other => panic!("unexpected atom {:?}", other),
        }
        assert!(matches!(&adult.head[2], HeadAtom::Action(call) if call.name == "print"));
        assert_eq!(rules.rules()[1].name, None);
    }

    #[test]
    fn test_undefined_prefix() {
        let err = parse_rules("[r: (?x ex:p ?y) -> (?y ex:p ?x)]", "r.rules", &PrefixTable::new()).unwrap_err();
        assert_eq!(err, ParseError::UndefinedPrefix { prefix: "ex".into() });
    }

    #[test]
    fn test_rejects_backward_rules_and_include() {
        assert!(matches!(
            parse_rules("[r: (?x my:p ?y) <- (?y my:p ?x)]", "r", &my_table()),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(
            parse_rules("@include <RDFS>.", "r", &my_table()),
            Err(ParseError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_unterminated_rule() {
        assert_eq!(
            parse_rules("[r: (?x my:p ?y) -> (?y my:p ?x)", "r", &my_table()),
            Err(ParseError::UnexpectedEof)
        );
    }

    #[test]
    fn test_empty_prefix_binding_yields_relative_names() {
        let mut table = PrefixTable::new();
        table.bind(&PrefixBinding::new("my", ""));
        let rules = parse_rules("[r: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]", "r", &table).unwrap();
        match &rules.rules()[0].head[0] {
            HeadAtom::Triple(t) => assert_eq!(t.object, Term::uri("Agent")),
            other => panic!("unexpected atom {:?}", other),
        }
    }
}
