//! SPARQL Update text parser

use super::expr::{ArithOp, CompareOp, Expression, Function};
use super::update::{ClearTarget, UpdateOperation, UpdateRequest};
use super::{GroupPattern, PatternElement};
use crate::parser::{blank_node_label, numeric_literal, variable_name, word, Cursor, ParseError, PrefixTable};
use crate::term::uri::ns;
use crate::term::{Term, Triple, Uri, Variable};

/// How blank nodes and variables are treated in a triples block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermMode {
    /// Ground data: no variables
    Data,
    /// Templates: variables allowed, blank nodes kept
    Template,
    /// Patterns: blank nodes act as variables
    Pattern,
}

/// Parse a SPARQL update request.
///
/// `rdf`, `rdfs`, `xsd` and `owl` are predeclared; `PREFIX` lines may
/// rebind them.
pub fn parse_update(text: &str, base: Option<&str>) -> Result<UpdateRequest, ParseError> {
    let mut prefixes = PrefixTable::standard();
    if let Some(base) = base {
        prefixes.set_base(Uri::new(base.to_string()));
    }
    let mut parser = UpdateParser { cursor: Cursor::new(text), prefixes, anon: 0 };
    parser.parse_request()
}

struct UpdateParser<'a> {
    cursor: Cursor<'a>,
    prefixes: PrefixTable,
    anon: usize,
}

impl<'a> UpdateParser<'a> {
    fn parse_request(&mut self) -> Result<UpdateRequest, ParseError> {
        let mut operations = Vec::new();
        loop {
            self.parse_prologue()?;
            if self.cursor.at_end() {
                break;
            }
            operations.push(self.parse_operation()?);
            if !self.cursor.eat(';') {
                self.parse_prologue()?;
                if !self.cursor.at_end() {
                    return Err(self.cursor.unexpected("';' or end of update"));
                }
                break;
            }
        }
        Ok(UpdateRequest::new(operations))
    }

    fn parse_prologue(&mut self) -> Result<(), ParseError> {
        loop {
            if self.cursor.eat_keyword("PREFIX") {
                let (prefix, local) = self.cursor.token("prefix name", crate::parser::prefixed_name)?;
                if !local.is_empty() {
                    return Err(self.cursor.error(format!("malformed PREFIX '{}:{}'", prefix, local)));
                }
                let iri = self.cursor.token("namespace IRI", crate::parser::iri_ref)?;
                let namespace = self.prefixes.resolve_relative(iri);
                self.prefixes.insert(prefix, namespace.as_str());
            } else if self.cursor.eat_keyword("BASE") {
                let iri = self.cursor.token("base IRI", crate::parser::iri_ref)?;
                let base = self.prefixes.resolve_relative(iri);
                self.prefixes.set_base(base);
            } else {
                return Ok(());
            }
        }
    }

    fn parse_operation(&mut self) -> Result<UpdateOperation, ParseError> {
        if self.cursor.eat_keyword("INSERT") {
            if self.cursor.eat_keyword("DATA") {
                return Ok(UpdateOperation::InsertData(self.parse_quad_block(TermMode::Data)?));
            }
            let insert = self.parse_quad_block(TermMode::Template)?;
            let pattern = self.parse_where()?;
            return Ok(UpdateOperation::Modify { delete: Vec::new(), insert, pattern });
        }
        if self.cursor.eat_keyword("DELETE") {
            if self.cursor.eat_keyword("DATA") {
                return Ok(UpdateOperation::DeleteData(self.parse_quad_block(TermMode::Data)?));
            }
            if self.cursor.eat_keyword("WHERE") {
                let triples = self.parse_quad_block(TermMode::Pattern)?;
                return Ok(UpdateOperation::Modify {
                    delete: triples.clone(),
                    insert: Vec::new(),
                    pattern: GroupPattern::from_triples(triples),
                });
            }
            let delete = self.parse_quad_block(TermMode::Template)?;
            let insert = if self.cursor.eat_keyword("INSERT") {
                self.parse_quad_block(TermMode::Template)?
            } else {
                Vec::new()
            };
            let pattern = self.parse_where()?;
            return Ok(UpdateOperation::Modify { delete, insert, pattern });
        }
        if self.cursor.eat_keyword("CLEAR") || self.cursor.eat_keyword("DROP") {
            self.cursor.eat_keyword("SILENT");
            let target = if self.cursor.eat_keyword("DEFAULT") {
                ClearTarget::Default
            } else if self.cursor.eat_keyword("ALL") {
                ClearTarget::All
            } else if self.cursor.eat_keyword("NAMED") {
                ClearTarget::Named
            } else if self.cursor.peek_keyword("GRAPH") {
                return Err(self.cursor.unsupported("named graph target"));
            } else {
                return Err(self.cursor.unexpected("DEFAULT, NAMED or ALL"));
            };
            return Ok(UpdateOperation::Clear(target));
        }
        for keyword in ["WITH", "LOAD", "CREATE", "ADD", "MOVE", "COPY"] {
            if self.cursor.peek_keyword(keyword) {
                return Err(self.cursor.unsupported(keyword));
            }
        }
        Err(self.cursor.unexpected("update operation"))
    }

    fn parse_where(&mut self) -> Result<GroupPattern, ParseError> {
        if self.cursor.peek_keyword("USING") {
            return Err(self.cursor.unsupported("USING"));
        }
        self.cursor.eat_keyword("WHERE");
        self.parse_group()
    }

    /// `{ triples }` for data and templates
    fn parse_quad_block(&mut self, mode: TermMode) -> Result<Vec<Triple>, ParseError> {
        self.cursor.expect('{')?;
        let mut triples = Vec::new();
        loop {
            if self.cursor.eat('}') {
                return Ok(triples);
            }
            if self.cursor.at_end() {
                return Err(ParseError::UnexpectedEof);
            }
            if self.cursor.peek_keyword("GRAPH") {
                return Err(self.cursor.unsupported("GRAPH"));
            }
            self.parse_triples_same_subject(mode, &mut triples)?;
            self.cursor.eat('.');
        }
    }

    /// `{ ... }` group graph pattern
    fn parse_group(&mut self) -> Result<GroupPattern, ParseError> {
        self.cursor.expect('{')?;
        let mut elements = Vec::new();
        let mut triples = Vec::new();

        loop {
            if self.cursor.eat('}') {
                break;
            }
            if self.cursor.at_end() {
                return Err(ParseError::UnexpectedEof);
            }

            let element = if self.cursor.eat_keyword("OPTIONAL") {
                PatternElement::Optional(self.parse_group()?)
            } else if self.cursor.eat_keyword("MINUS") {
                PatternElement::Minus(self.parse_group()?)
            } else if self.cursor.eat_keyword("FILTER") {
                PatternElement::Filter(self.parse_constraint()?)
            } else if self.cursor.eat_keyword("BIND") {
                self.cursor.expect('(')?;
                let expression = self.parse_expression()?;
                if !self.cursor.eat_keyword("AS") {
                    return Err(self.cursor.unexpected("AS"));
                }
                let var = self.cursor.token("variable", variable_name)?;
                self.cursor.expect(')')?;
                PatternElement::Bind(expression, Variable::new(var))
            } else if self.cursor.starts_with("{") {
                let first = self.parse_group()?;
                if self.cursor.peek_keyword("UNION") {
                    let mut branches = vec![first];
                    while self.cursor.eat_keyword("UNION") {
                        branches.push(self.parse_group()?);
                    }
                    PatternElement::Union(branches)
                } else {
                    PatternElement::Group(first)
                }
            } else {
                for keyword in ["GRAPH", "SERVICE", "VALUES"] {
                    if self.cursor.peek_keyword(keyword) {
                        return Err(self.cursor.unsupported(keyword));
                    }
                }
                self.parse_triples_same_subject(TermMode::Pattern, &mut triples)?;
                self.cursor.eat('.');
                continue;
            };

            if !triples.is_empty() {
                elements.push(PatternElement::Triples(std::mem::take(&mut triples)));
            }
            elements.push(element);
            self.cursor.eat('.');
        }

        if !triples.is_empty() {
            elements.push(PatternElement::Triples(triples));
        }
        Ok(GroupPattern::new(elements))
    }

    // ------------------------------------------------------------------------
    // Triples
    // ------------------------------------------------------------------------

    fn parse_triples_same_subject(&mut self, mode: TermMode, out: &mut Vec<Triple>) -> Result<(), ParseError> {
        if self.cursor.starts_with("[") {
            let subject = self.parse_anon(mode, out)?;
            // `[ p o ] .` stands alone; a predicate list may follow
            if self.cursor.starts_with(".") || self.cursor.starts_with("}") {
                return Ok(());
            }
            return self.parse_predicate_object_list(&subject, mode, out);
        }
        let subject = self.parse_term(mode, out)?;
        self.parse_predicate_object_list(&subject, mode, out)
    }

    fn parse_predicate_object_list(
        &mut self,
        subject: &Term,
        mode: TermMode,
        out: &mut Vec<Triple>,
    ) -> Result<(), ParseError> {
        loop {
            let predicate = self.parse_verb(mode)?;
            loop {
                let object = self.parse_term(mode, out)?;
                out.push(Triple::new(subject.clone(), predicate.clone(), object));
                if !self.cursor.eat(',') {
                    break;
                }
            }
            if !self.cursor.eat(';') {
                return Ok(());
            }
            while self.cursor.eat(';') {}
            if self.cursor.starts_with(".") || self.cursor.starts_with("}") || self.cursor.starts_with("]") {
                return Ok(());
            }
        }
    }

    fn parse_verb(&mut self, mode: TermMode) -> Result<Term, ParseError> {
        if self.cursor.eat_keyword("a") {
            return Ok(Term::Uri(ns::rdf_type().into()));
        }
        if let Some(name) = self.cursor.try_token(variable_name) {
            return self.variable(name, mode);
        }
        match self.cursor.try_iri(&self.prefixes)? {
            Some(iri) => Ok(Term::Uri(iri.into())),
            None => Err(self.cursor.unexpected("predicate")),
        }
    }

    /// `[ p o ; ... ]` as a fresh node
    fn parse_anon(&mut self, mode: TermMode, out: &mut Vec<Triple>) -> Result<Term, ParseError> {
        self.cursor.expect('[')?;
        self.anon += 1;
        let node = match mode {
            TermMode::Pattern => Term::variable(format!("_anon{}", self.anon)),
            _ => Term::blank(format!("anon{}", self.anon)),
        };
        if !self.cursor.eat(']') {
            self.parse_predicate_object_list(&node, mode, out)?;
            self.cursor.expect(']')?;
        }
        Ok(node)
    }

    fn parse_term(&mut self, mode: TermMode, out: &mut Vec<Triple>) -> Result<Term, ParseError> {
        if let Some(name) = self.cursor.try_token(variable_name) {
            return self.variable(name, mode);
        }
        if let Some(iri) = self.cursor.try_iri(&self.prefixes)? {
            return Ok(Term::Uri(iri.into()));
        }
        if let Some(label) = self.cursor.try_token(blank_node_label) {
            return Ok(match mode {
                TermMode::Pattern => Term::variable(format!("_bnode_{}", label)),
                _ => Term::blank(label),
            });
        }
        if self.cursor.starts_with("[") {
            return self.parse_anon(mode, out);
        }
        if self.cursor.starts_with("(") {
            return Err(self.cursor.unsupported("RDF collection"));
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
        Err(self.cursor.unexpected("RDF term"))
    }

    fn variable(&self, name: &str, mode: TermMode) -> Result<Term, ParseError> {
        if mode == TermMode::Data {
            return Err(self.cursor.error(format!("variable ?{} not allowed in DATA block", name)));
        }
        Ok(Term::variable(name))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    /// FILTER argument: bracketed expression, function call or EXISTS
    fn parse_constraint(&mut self) -> Result<Expression, ParseError> {
        if self.cursor.starts_with("(") {
            self.cursor.expect('(')?;
            let expression = self.parse_expression()?;
            self.cursor.expect(')')?;
            return Ok(expression);
        }
        self.parse_primary()
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.cursor.eat_str("||") {
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_relational()?;
        while self.cursor.eat_str("&&") {
            let right = self.parse_relational()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_additive()?;
        let op = if self.cursor.eat_str("!=") {
            CompareOp::Ne
        } else if self.cursor.eat_str("<=") {
            CompareOp::Le
        } else if self.cursor.eat_str(">=") {
            CompareOp::Ge
        } else if self.cursor.eat('=') {
            CompareOp::Eq
        } else if self.cursor.eat('<') {
            CompareOp::Lt
        } else if self.cursor.eat('>') {
            CompareOp::Gt
        } else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        Ok(Expression::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.cursor.eat('+') {
                ArithOp::Add
            } else if self.cursor.eat('-') {
                ArithOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = Expression::Arithmetic(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.cursor.eat('*') {
                ArithOp::Mul
            } else if self.cursor.eat('/') {
                ArithOp::Div
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Expression::Arithmetic(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.cursor.starts_with("!") && !self.cursor.starts_with("!=") {
            self.cursor.expect('!')?;
            return Ok(Expression::Not(Box::new(self.parse_unary()?)));
        }
        if self.cursor.eat_str("-") {
            return Ok(Expression::Negate(Box::new(self.parse_unary()?)));
        }
        self.cursor.eat('+');
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        if self.cursor.eat('(') {
            let inner = self.parse_expression()?;
            self.cursor.expect(')')?;
            return Ok(inner);
        }
        if let Some(name) = self.cursor.try_token(variable_name) {
            return Ok(Expression::Variable(Variable::new(name)));
        }
        if let Some(literal) = self.cursor.try_quoted_literal(&self.prefixes)? {
            return Ok(Expression::Constant(literal));
        }
        if let Some(number) = self.cursor.try_token(numeric_literal) {
            return Ok(Expression::Constant(Term::Literal(number.into())));
        }
        if let Some(iri) = self.cursor.try_iri(&self.prefixes)? {
            if self.cursor.rest().starts_with('(') {
                return Err(self.cursor.unsupported(format!("extension function <{}>", iri.as_str())));
            }
            return Ok(Expression::Constant(Term::Uri(iri.into())));
        }
        if self.cursor.eat_keyword("NOT") {
            if !self.cursor.eat_keyword("EXISTS") {
                return Err(self.cursor.unexpected("EXISTS"));
            }
            return Ok(Expression::NotExists(self.parse_group()?));
        }
        if self.cursor.eat_keyword("EXISTS") {
            return Ok(Expression::Exists(self.parse_group()?));
        }
        if self.cursor.eat_keyword("true") {
            return Ok(Expression::Constant(Term::boolean(true)));
        }
        if self.cursor.eat_keyword("false") {
            return Ok(Expression::Constant(Term::boolean(false)));
        }

        let name = self.cursor.token("expression", word)?;
        let Some(function) = Function::from_name(name) else {
            return Err(self.cursor.unsupported(format!("function {}", name)));
        };
        let args = self.parse_arguments()?;
        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(self.cursor.error(format!("{} called with {} arguments", name, args.len())));
        }
        Ok(Expression::Call(function, args))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.cursor.expect('(')?;
        let mut args = Vec::new();
        if self.cursor.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.cursor.eat(')') {
                return Ok(args);
            }
            self.cursor.expect(',')?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(local: &str) -> Term {
        Term::uri(format!("http://example.org/{}", local))
    }

    #[test]
    fn test_insert_data_with_prefixes() {
        let request = parse_update(
            "PREFIX ex: <http://example.org/>\n\
             INSERT DATA { ex:alice a ex:Person ; ex:name \"Alice\", 'Al' . }",
            None,
        )
        .unwrap();

        match &request.operations()[0] {
            UpdateOperation::InsertData(triples) => {
                assert_eq!(triples.len(), 3);
                assert_eq!(triples[0], Triple::new(ex("alice"), Term::Uri(ns::rdf_type().into()), ex("Person")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_delete_insert_where() {
        let request = parse_update(
            "PREFIX ex: <http://example.org/>\n\
             DELETE { ?s ex:old ?o } INSERT { ?s ex:new ?o } WHERE { ?s ex:old ?o FILTER(?o != ex:skip) }",
            None,
        )
        .unwrap();
        match &request.operations()[0] {
            UpdateOperation::Modify { delete, insert, pattern } => {
                assert_eq!(delete.len(), 1);
                assert_eq!(insert.len(), 1);
                assert_eq!(pattern.elements.len(), 2);
                assert!(matches!(pattern.elements[1], PatternElement::Filter(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_multiple_operations() {
        let request = parse_update(
            "PREFIX ex: <http://example.org/>\n\
             INSERT DATA { ex:a ex:p ex:b } ;\n\
             # second operation\n\
             DELETE WHERE { ?x ex:p ?y } ;\n\
             CLEAR DEFAULT ;",
            None,
        )
        .unwrap();
        assert_eq!(request.operations().len(), 3);
        assert_eq!(request.operations()[2], UpdateOperation::Clear(ClearTarget::Default));
    }

    #[test]
    fn test_group_features() {
        let request = parse_update(
            "PREFIX ex: <http://example.org/>\n\
             INSERT { ?x ex:label ?l } WHERE {\n\
               { ?x a ex:A } UNION { ?x a ex:B }\n\
               OPTIONAL { ?x ex:name ?n }\n\
               BIND (CONCAT(\"item-\", STR(?x)) AS ?l)\n\
               FILTER NOT EXISTS { ?x ex:label ?any }\n\
               MINUS { ?x ex:hidden true }\n\
             }",
            None,
        )
        .unwrap();
        let UpdateOperation::Modify { pattern, .. } = &request.operations()[0] else {
            panic!("expected modify");
        };
        let kinds: Vec<&str> = pattern
            .elements
            .iter()
            .map(|e| match e {
                PatternElement::Union(_) => "union",
                PatternElement::Optional(_) => "optional",
                PatternElement::Bind(..) => "bind",
                PatternElement::Filter(_) => "filter",
                PatternElement::Minus(_) => "minus",
                PatternElement::Triples(_) => "triples",
                PatternElement::Group(_) => "group",
            })
            .collect();
        assert_eq!(kinds, vec!["union", "optional", "bind", "filter", "minus"]);
    }

    #[test]
    fn test_expression_precedence() {
        let request = parse_update(
            "INSERT { ?s <http://e/p> ?o } WHERE { ?s <http://e/q> ?o FILTER(?o > 1 + 2 * 3 && !BOUND(?z) || false) }",
            None,
        )
        .unwrap();
        let UpdateOperation::Modify { pattern, .. } = &request.operations()[0] else {
            panic!("expected modify");
        };
        let PatternElement::Filter(expr) = &pattern.elements[1] else {
            panic!("expected filter");
        };
        assert!(matches!(expr, Expression::Or(left, _) if matches!(**left, Expression::And(..))));
    }

    #[test]
    fn test_variables_rejected_in_data() {
        let err = parse_update("INSERT DATA { ?s <http://e/p> 1 }", None).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_unsupported_forms() {
        for text in [
            "LOAD <http://example.org/data.ttl>",
            "INSERT DATA { GRAPH <http://g> { <http://s> <http://p> <http://o> } }",
            "CLEAR GRAPH <http://g>",
            "WITH <http://g> DELETE { ?s ?p ?o } WHERE { ?s ?p ?o }",
        ] {
            assert!(
                matches!(parse_update(text, None), Err(ParseError::Unsupported { .. })),
                "{} should be unsupported",
                text
            );
        }
    }

    #[test]
    fn test_blank_nodes_in_patterns_become_variables() {
        let request = parse_update("DELETE WHERE { _:b <http://e/p> [] }", None).unwrap();
        let UpdateOperation::Modify { delete, .. } = &request.operations()[0] else {
            panic!("expected modify");
        };
        assert!(delete[0].subject.is_variable());
        assert!(delete[0].object.is_variable());
    }

    #[test]
    fn test_missing_operation_separator() {
        let err = parse_update("CLEAR ALL CLEAR ALL", None).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }
}
