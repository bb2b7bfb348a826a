//! Turtle and N-Triples reader
//!
//! N-Triples is read by the same parser, since every N-Triples document is
//! also a Turtle document. [`parse_graph`] hands RDF/XML to
//! [`super::rdfxml`].

use std::path::Path;

use super::rdfxml::parse_rdfxml;
use super::{blank_node_label, numeric_literal, Cursor, ParseError, PrefixTable};
use crate::graph::Graph;
use crate::term::uri::ns;
use crate::term::{Term, Triple, Uri};

/// Serializations the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RdfFormat {
    NTriples,
    #[default]
    Turtle,
    RdfXml,
}

impl RdfFormat {
    /// Pick a format from a file extension; unknown extensions read as Turtle
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("nt") => RdfFormat::NTriples,
            Some(ext) if ["rdf", "owl", "xml"].iter().any(|x| ext.eq_ignore_ascii_case(x)) => RdfFormat::RdfXml,
            _ => RdfFormat::Turtle,
        }
    }

    /// Pick a format from a media type such as `text/turtle; charset=utf-8`
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/n-triples" | "text/plain" => Some(RdfFormat::NTriples),
            "text/turtle" | "application/x-turtle" | "text/n3" => Some(RdfFormat::Turtle),
            "application/rdf+xml" | "application/owl+xml" => Some(RdfFormat::RdfXml),
            _ => None,
        }
    }

    /// Parse a user-supplied format name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nt" | "ntriples" | "n-triples" => Some(RdfFormat::NTriples),
            "ttl" | "turtle" | "n3" => Some(RdfFormat::Turtle),
            "rdf" | "rdfxml" | "rdf/xml" | "xml" => Some(RdfFormat::RdfXml),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            RdfFormat::NTriples => "application/n-triples",
            RdfFormat::Turtle => "text/turtle",
            RdfFormat::RdfXml => "application/rdf+xml",
        }
    }
}

/// Parse a document into a graph
pub fn parse_graph(text: &str, format: RdfFormat, base: Option<&str>) -> Result<Graph, ParseError> {
    let mut prefixes = match format {
        RdfFormat::NTriples => PrefixTable::new(),
        RdfFormat::Turtle => PrefixTable::standard(),
        RdfFormat::RdfXml => return parse_rdfxml(text, base),
    };
    if let Some(base) = base {
        prefixes.set_base(Uri::new(base.to_string()));
    }

    let mut parser = TurtleParser {
        cursor: Cursor::new(text),
        prefixes,
        graph: Graph::new(),
        anon_counter: 0,
    };
    parser.parse_document()?;
    Ok(parser.graph)
}

struct TurtleParser<'a> {
    cursor: Cursor<'a>,
    prefixes: PrefixTable,
    graph: Graph,
    anon_counter: usize,
}

impl<'a> TurtleParser<'a> {
    fn parse_document(&mut self) -> Result<(), ParseError> {
        while !self.cursor.at_end() {
            if self.cursor.starts_with("@") {
                self.parse_directive()?;
            } else if self.cursor.peek_keyword("PREFIX") || self.cursor.peek_keyword("BASE") {
                self.parse_sparql_directive()?;
            } else {
                self.parse_triples()?;
                self.cursor.expect('.')?;
            }
        }
        Ok(())
    }

    /// `@prefix p: <iri> .` or `@base <iri> .`
    fn parse_directive(&mut self) -> Result<(), ParseError> {
        if self.cursor.eat_str("@prefix") {
            self.parse_prefix_binding()?;
        } else if self.cursor.eat_str("@base") {
            self.parse_base()?;
        } else {
            return Err(self.cursor.unexpected("@prefix or @base"));
        }
        self.cursor.expect('.')
    }

    /// `PREFIX p: <iri>` or `BASE <iri>`, no trailing dot
    fn parse_sparql_directive(&mut self) -> Result<(), ParseError> {
        if self.cursor.eat_keyword("PREFIX") {
            self.parse_prefix_binding()
        } else {
            self.cursor.eat_keyword("BASE");
            self.parse_base()
        }
    }

    fn parse_prefix_binding(&mut self) -> Result<(), ParseError> {
        let (prefix, local) = self.cursor.token("prefix name", super::prefixed_name)?;
        if !local.is_empty() {
            return Err(self.cursor.error(format!("malformed prefix declaration '{}:{}'", prefix, local)));
        }
        let iri = self.cursor.token("namespace IRI", super::iri_ref)?;
        let namespace = self.prefixes.resolve_relative(iri);
        self.prefixes.insert(prefix, namespace.as_str());
        Ok(())
    }

    fn parse_base(&mut self) -> Result<(), ParseError> {
        let iri = self.cursor.token("base IRI", super::iri_ref)?;
        let base = self.prefixes.resolve_relative(iri);
        self.prefixes.set_base(base);
        Ok(())
    }

    fn parse_triples(&mut self) -> Result<(), ParseError> {
        if self.cursor.starts_with("[") {
            let subject = self.parse_blank_property_list()?;
            // `[ ... ] .` on its own is allowed
            if self.cursor.starts_with(".") {
                return Ok(());
            }
            return self.parse_predicate_object_list(&subject);
        }
        let subject = self.parse_subject()?;
        self.parse_predicate_object_list(&subject)
    }

    fn parse_subject(&mut self) -> Result<Term, ParseError> {
        if let Some(iri) = self.cursor.try_iri(&self.prefixes)? {
            return Ok(Term::Uri(iri.into()));
        }
        if let Some(label) = self.cursor.try_token(blank_node_label) {
            return Ok(Term::blank(label));
        }
        if self.cursor.starts_with("(") {
            return self.parse_collection();
        }
        Err(self.cursor.unexpected("subject"))
    }

    fn parse_predicate_object_list(&mut self, subject: &Term) -> Result<(), ParseError> {
        loop {
            let predicate = self.parse_predicate()?;
            loop {
                let object = self.parse_object()?;
                self.graph.insert(Triple::new(subject.clone(), predicate.clone(), object));
                if !self.cursor.eat(',') {
                    break;
                }
            }
            if !self.cursor.eat(';') {
                return Ok(());
            }
            while self.cursor.eat(';') {}
            // A trailing ';' may close the list
            if self.cursor.starts_with(".") || self.cursor.starts_with("]") {
                return Ok(());
            }
        }
    }

    fn parse_predicate(&mut self) -> Result<Term, ParseError> {
        if self.cursor.eat_keyword("a") {
            return Ok(Term::Uri(ns::rdf_type().into()));
        }
        match self.cursor.try_iri(&self.prefixes)? {
            Some(iri) => Ok(Term::Uri(iri.into())),
            None => Err(self.cursor.unexpected("predicate")),
        }
    }

    fn parse_object(&mut self) -> Result<Term, ParseError> {
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
        if self.cursor.starts_with("[") {
            return self.parse_blank_property_list();
        }
        if self.cursor.starts_with("(") {
            return self.parse_collection();
        }
        Err(self.cursor.unexpected("object"))
    }

    fn fresh_anon(&mut self) -> Term {
        self.anon_counter += 1;
        Term::blank(format!("anon{}", self.anon_counter))
    }

    /// `[ p o ; ... ]` or `[]`
    fn parse_blank_property_list(&mut self) -> Result<Term, ParseError> {
        self.cursor.expect('[')?;
        let node = self.fresh_anon();
        if !self.cursor.eat(']') {
            self.parse_predicate_object_list(&node)?;
            self.cursor.expect(']')?;
        }
        Ok(node)
    }

    /// `( item ... )` as an rdf:first / rdf:rest chain
    fn parse_collection(&mut self) -> Result<Term, ParseError> {
        self.cursor.expect('(')?;
        let mut items = Vec::new();
        while !self.cursor.eat(')') {
            if self.cursor.at_end() {
                return Err(ParseError::UnexpectedEof);
            }
            items.push(self.parse_object()?);
        }

        let mut head = Term::Uri(ns::rdf_nil().into());
        for item in items.into_iter().rev() {
            let cell = self.fresh_anon();
            self.graph.insert(Triple::new(cell.clone(), Term::Uri(ns::rdf_first().into()), item));
            self.graph.insert(Triple::new(cell.clone(), Term::Uri(ns::rdf_rest().into()), head));
            head = cell;
        }
        Ok(head)
    }
}
