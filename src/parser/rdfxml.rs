//! RDF/XML reader
//!
//! A direct scanner over the document text; no general XML tree is built.
//! Covers the node and property element forms ontologies are written in:
//! typed nodes, `rdf:about`/`rdf:ID`/`rdf:nodeID`, `rdf:resource`,
//! property attributes, `rdf:datatype`, `xml:lang`, `xml:base`, `rdf:li`
//! and the `Resource`, `Literal` and `Collection` parse types. Entities
//! declared in a DOCTYPE internal subset (`<!ENTITY owl "...">`) are
//! expanded in attribute values and text.

use fnv::FnvHashMap;

use super::ParseError;
use crate::graph::Graph;
use crate::term::uri::ns;
use crate::term::{Term, Triple, Uri};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// `rdf:` attributes that shape the graph rather than state a property
const SYNTAX_ATTRIBUTES: [&str; 8] = ["about", "ID", "nodeID", "resource", "parseType", "datatype", "bagID", "aboutEach"];

/// Parse an RDF/XML document into a graph
pub fn parse_rdfxml(text: &str, base: Option<&str>) -> Result<Graph, ParseError> {
    let mut reader = RdfXmlReader {
        source: text,
        rest: text,
        namespaces: vec![("xml".to_string(), XML_NAMESPACE.to_string())],
        base: base.map(|b| Uri::new(b.to_string())),
        lang: None,
        entities: FnvHashMap::default(),
        graph: Graph::new(),
        blank_counter: 0,
    };
    reader.parse_document()?;
    Ok(reader.graph)
}

fn rdf(local: &str) -> String {
    format!("{}{}", ns::RDF, local)
}

fn rdf_attribute<'t>(attrs: &'t [(String, String)], local: &str) -> Option<&'t str> {
    attrs
        .iter()
        .find(|(name, _)| name.strip_prefix(ns::RDF) == Some(local))
        .map(|(_, value)| value.as_str())
}

fn is_syntax_attribute(name: &str) -> bool {
    name.strip_prefix(ns::RDF).is_some_and(|local| SYNTAX_ATTRIBUTES.contains(&local))
}

struct StartTag<'a> {
    name: &'a str,
    attrs: Vec<(&'a str, String)>,
    empty: bool,
}

/// In-scope state an element may override for its descendants
struct Scope {
    namespaces: usize,
    base: Option<Uri>,
    lang: Option<String>,
}

struct RdfXmlReader<'a> {
    source: &'a str,
    rest: &'a str,
    namespaces: Vec<(String, String)>,
    base: Option<Uri>,
    lang: Option<String>,
    entities: FnvHashMap<String, String>,
    graph: Graph,
    blank_counter: usize,
}

impl<'a> RdfXmlReader<'a> {
    fn parse_document(&mut self) -> Result<(), ParseError> {
        self.skip_misc()?;
        let root = self.start_tag()?;

        let scope = self.enter(&root);
        let is_rdf_root = self.expand(root.name)? == rdf("RDF");
        if is_rdf_root {
            if !root.empty {
                self.node_elements(root.name)?;
            }
            self.leave(scope);
        } else {
            // a lone node element may stand in for rdf:RDF
            self.leave(scope);
            self.node_element(root)?;
        }

        self.skip_misc()?;
        if !self.rest.is_empty() {
            return Err(self.error("content after the document element"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Grammar
    // ------------------------------------------------------------------

    /// Node elements up to the end tag `end`
    fn node_elements(&mut self, end: &str) -> Result<Vec<Term>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_misc()?;
            if self.rest.starts_with("</") {
                self.end_tag(end)?;
                return Ok(nodes);
            }
            let tag = self.start_tag()?;
            nodes.push(self.node_element(tag)?);
        }
    }

    /// A node element; returns the node it describes
    fn node_element(&mut self, tag: StartTag<'a>) -> Result<Term, ParseError> {
        let scope = self.enter(&tag);
        let class = self.expand(tag.name)?;
        let attrs = self.qualified_attributes(&tag)?;

        let subject = self.subject(&attrs);
        if class != rdf("Description") {
            self.insert(subject.clone(), Term::uri(rdf("type")), Term::uri(class));
        }
        self.property_attributes(&subject, &attrs);
        if !tag.empty {
            self.property_elements(&subject, tag.name)?;
        }

        self.leave(scope);
        Ok(subject)
    }

    /// Property elements of `subject` up to the end tag `end`
    fn property_elements(&mut self, subject: &Term, end: &str) -> Result<(), ParseError> {
        let mut li = 0;
        loop {
            self.skip_misc()?;
            if self.rest.starts_with("</") {
                return self.end_tag(end);
            }
            let tag = self.start_tag()?;
            self.property_element(subject, tag, &mut li)?;
        }
    }

    fn property_element(&mut self, subject: &Term, tag: StartTag<'a>, li: &mut usize) -> Result<(), ParseError> {
        let scope = self.enter(&tag);
        let mut predicate = self.expand(tag.name)?;
        if predicate == rdf("li") {
            *li += 1;
            predicate = rdf(&format!("_{}", li));
        }
        let attrs = self.qualified_attributes(&tag)?;

        let object = if let Some(resource) = rdf_attribute(&attrs, "resource") {
            let object = self.iri(resource);
            self.property_attributes(&object, &attrs);
            self.close_empty_content(&tag)?;
            object
        } else if let Some(id) = rdf_attribute(&attrs, "nodeID") {
            let object = Term::blank(id);
            self.property_attributes(&object, &attrs);
            self.close_empty_content(&tag)?;
            object
        } else if let Some(parse_type) = rdf_attribute(&attrs, "parseType") {
            match parse_type {
                "Literal" => {
                    let xml = if tag.empty { "" } else { self.raw_content(tag.name)? };
                    Term::typed_literal(xml, rdf("XMLLiteral"))
                }
                "Collection" => {
                    let items = if tag.empty { Vec::new() } else { self.node_elements(tag.name)? };
                    self.list(items)
                }
                _ => {
                    let node = self.fresh_blank();
                    if !tag.empty {
                        self.property_elements(&node, tag.name)?;
                    }
                    node
                }
            }
        } else if tag.empty {
            if attrs.iter().any(|(name, _)| !is_syntax_attribute(name)) {
                let node = self.fresh_blank();
                self.property_attributes(&node, &attrs);
                node
            } else {
                self.literal(String::new(), &attrs)
            }
        } else {
            self.element_content(&tag, &attrs)?
        };

        self.insert(subject.clone(), Term::uri(predicate), object);
        self.leave(scope);
        Ok(())
    }

    /// Text or a single nested node element, then the end tag
    fn element_content(&mut self, tag: &StartTag<'a>, attrs: &[(String, String)]) -> Result<Term, ParseError> {
        let text = self.take_text()?;
        if self.rest.starts_with("</") {
            let literal = self.literal(self.decode(text), attrs);
            self.end_tag(tag.name)?;
            return Ok(literal);
        }
        if !text.trim().is_empty() {
            return Err(self.error(format!("mixed content in <{}>", tag.name)));
        }

        self.skip_misc()?;
        if self.rest.starts_with("</") {
            let literal = self.literal(text.to_string(), attrs);
            self.end_tag(tag.name)?;
            return Ok(literal);
        }
        let child = self.start_tag()?;
        let object = self.node_element(child)?;
        self.skip_misc()?;
        self.end_tag(tag.name)?;
        Ok(object)
    }

    /// Subject named by `rdf:about`, `rdf:ID` or `rdf:nodeID`, else a fresh blank node
    fn subject(&mut self, attrs: &[(String, String)]) -> Term {
        if let Some(about) = rdf_attribute(attrs, "about") {
            self.iri(about)
        } else if let Some(id) = rdf_attribute(attrs, "ID") {
            self.iri(&format!("#{}", id))
        } else if let Some(id) = rdf_attribute(attrs, "nodeID") {
            Term::blank(id)
        } else {
            self.fresh_blank()
        }
    }

    fn property_attributes(&mut self, subject: &Term, attrs: &[(String, String)]) {
        for (name, value) in attrs.iter().filter(|(name, _)| !is_syntax_attribute(name)) {
            let object = if *name == rdf("type") { self.iri(value) } else { self.plain_literal(value.clone()) };
            self.insert(subject.clone(), Term::uri(name.clone()), object);
        }
    }

    fn literal(&self, text: String, attrs: &[(String, String)]) -> Term {
        match rdf_attribute(attrs, "datatype") {
            Some(datatype) => Term::typed_literal(text, self.resolve(datatype).as_str()),
            None => self.plain_literal(text),
        }
    }

    fn plain_literal(&self, text: String) -> Term {
        match &self.lang {
            Some(lang) => Term::lang_literal(text, lang.as_str()),
            None => Term::literal(text),
        }
    }

    /// An `rdf:first`/`rdf:rest` chain over `items`
    fn list(&mut self, items: Vec<Term>) -> Term {
        let mut head = Term::uri(rdf("nil"));
        for item in items.into_iter().rev() {
            let cell = self.fresh_blank();
            self.insert(cell.clone(), Term::uri(rdf("first")), item);
            self.insert(cell.clone(), Term::uri(rdf("rest")), head);
            head = cell;
        }
        head
    }

    // ------------------------------------------------------------------
    // Scope and names
    // ------------------------------------------------------------------

    /// Apply the element's `xmlns`, `xml:base` and `xml:lang` declarations
    fn enter(&mut self, tag: &StartTag<'a>) -> Scope {
        let saved = Scope { namespaces: self.namespaces.len(), base: self.base.clone(), lang: self.lang.clone() };
        for (name, value) in &tag.attrs {
            if *name == "xmlns" {
                self.namespaces.push((String::new(), value.clone()));
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                self.namespaces.push((prefix.to_string(), value.clone()));
            }
        }
        for (name, value) in &tag.attrs {
            match *name {
                "xml:base" => self.base = Some(self.resolve(value)),
                "xml:lang" => self.lang = Some(value.clone()).filter(|lang| !lang.is_empty()),
                _ => {}
            }
        }
        saved
    }

    fn leave(&mut self, scope: Scope) {
        self.namespaces.truncate(scope.namespaces);
        self.base = scope.base;
        self.lang = scope.lang;
    }

    /// Expand `prefix:local` (or `local` in the default namespace)
    fn expand(&self, qname: &str) -> Result<String, ParseError> {
        let (prefix, local) = qname.split_once(':').unwrap_or(("", qname));
        self.namespaces
            .iter()
            .rev()
            .find(|(declared, _)| declared == prefix)
            .map(|(_, namespace)| format!("{}{}", namespace, local))
            .ok_or_else(|| ParseError::UndefinedPrefix { prefix: prefix.to_string() })
    }

    /// Namespace-qualified attributes with expanded names; `xmlns` and
    /// `xml:` attributes are dropped, as are unqualified ones
    fn qualified_attributes(&self, tag: &StartTag<'a>) -> Result<Vec<(String, String)>, ParseError> {
        let mut attrs = Vec::new();
        for (name, value) in &tag.attrs {
            if *name == "xmlns" || name.starts_with("xmlns:") || name.starts_with("xml:") || !name.contains(':') {
                continue;
            }
            attrs.push((self.expand(name)?, value.clone()));
        }
        Ok(attrs)
    }

    fn resolve(&self, reference: &str) -> Uri {
        match &self.base {
            Some(base) => base.resolve(reference),
            None => Uri::new(reference.to_string()),
        }
    }

    fn iri(&self, reference: &str) -> Term {
        Term::uri(self.resolve(reference).as_str())
    }

    fn fresh_blank(&mut self) -> Term {
        self.blank_counter += 1;
        Term::blank(format!("genid{}", self.blank_counter))
    }

    fn insert(&mut self, subject: Term, predicate: Term, object: Term) {
        self.graph.insert(Triple::new(subject, predicate, object));
    }

    // ------------------------------------------------------------------
    // Lexing
    // ------------------------------------------------------------------

    /// Skip whitespace, comments, processing instructions and DOCTYPE
    fn skip_misc(&mut self) -> Result<(), ParseError> {
        loop {
            self.rest = self.rest.trim_start();
            if self.rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if self.rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if self.rest.starts_with("<!DOCTYPE") {
                self.doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_past(&mut self, end: &str) -> Result<&'a str, ParseError> {
        let rest = self.rest;
        let pos = rest.find(end).ok_or(ParseError::UnexpectedEof)?;
        self.rest = &rest[pos + end.len()..];
        Ok(&rest[..pos])
    }

    fn doctype(&mut self) -> Result<(), ParseError> {
        let rest = self.rest;
        let head_end = rest.find(['[', '>']).ok_or(ParseError::UnexpectedEof)?;
        if rest[head_end..].starts_with('[') {
            self.rest = &rest[head_end + 1..];
            let subset = self.skip_past("]")?;
            self.declare_entities(subset);
        }
        self.skip_past(">")?;
        Ok(())
    }

    /// Record `<!ENTITY name "value">` declarations; parameter entities are skipped
    fn declare_entities(&mut self, subset: &str) {
        for declaration in subset.split("<!ENTITY").skip(1) {
            let Some((name, rest)) = declaration.trim_start().split_once(char::is_whitespace) else {
                continue;
            };
            if name == "%" {
                continue;
            }
            let rest = rest.trim_start();
            let Some(quote) = rest.chars().next().filter(|c| matches!(*c, '"' | '\'')) else {
                continue;
            };
            if let Some(end) = rest[1..].find(quote) {
                let value = self.decode(&rest[1..1 + end]);
                self.entities.insert(name.to_string(), value);
            }
        }
    }

    fn start_tag(&mut self) -> Result<StartTag<'a>, ParseError> {
        if !self.rest.starts_with('<') || self.rest.starts_with("</") {
            return Err(self.unexpected("start tag"));
        }
        self.rest = &self.rest[1..];
        let name = self.name();
        if name.is_empty() {
            return Err(self.unexpected("element name"));
        }

        let mut attrs = Vec::new();
        loop {
            self.rest = self.rest.trim_start();
            if let Some(rest) = self.rest.strip_prefix("/>") {
                self.rest = rest;
                return Ok(StartTag { name, attrs, empty: true });
            }
            if let Some(rest) = self.rest.strip_prefix('>') {
                self.rest = rest;
                return Ok(StartTag { name, attrs, empty: false });
            }

            let attr = self.name();
            if attr.is_empty() {
                return Err(self.unexpected("attribute name"));
            }
            let rest = self.rest.trim_start();
            let Some(rest) = rest.strip_prefix('=') else {
                return Err(self.unexpected("'='"));
            };
            self.rest = rest.trim_start();
            let quote = match self.rest.chars().next() {
                Some('"') => "\"",
                Some('\'') => "'",
                _ => return Err(self.unexpected("quoted attribute value")),
            };
            self.rest = &self.rest[1..];
            let raw = self.skip_past(quote)?;
            attrs.push((attr, self.decode(raw)));
        }
    }

    fn end_tag(&mut self, name: &str) -> Result<(), ParseError> {
        let after = self
            .rest
            .strip_prefix("</")
            .and_then(|r| r.strip_prefix(name))
            .map(str::trim_start)
            .and_then(|r| r.strip_prefix('>'));
        match after {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.unexpected(&format!("</{}>", name))),
        }
    }

    fn name(&mut self) -> &'a str {
        let rest = self.rest;
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '>' | '/' | '='))
            .unwrap_or(rest.len());
        self.rest = &rest[end..];
        &rest[..end]
    }

    /// Character data up to the next markup
    fn take_text(&mut self) -> Result<&'a str, ParseError> {
        let rest = self.rest;
        let end = rest.find('<').ok_or(ParseError::UnexpectedEof)?;
        self.rest = &rest[end..];
        Ok(&rest[..end])
    }

    /// Unparsed markup up to the end tag `name`, which is consumed
    fn raw_content(&mut self, name: &str) -> Result<&'a str, ParseError> {
        let rest = self.rest;
        let pos = rest.find(&format!("</{}", name)).ok_or(ParseError::UnexpectedEof)?;
        self.rest = &rest[pos..];
        self.end_tag(name)?;
        Ok(&rest[..pos])
    }

    /// An element carrying its object in attributes has no content of its own
    fn close_empty_content(&mut self, tag: &StartTag<'a>) -> Result<(), ParseError> {
        if !tag.empty {
            self.skip_misc()?;
            self.end_tag(tag.name)?;
        }
        Ok(())
    }

    /// Replace predefined, character and declared entity references
    fn decode(&self, raw: &str) -> String {
        if !raw.contains('&') {
            return raw.to_string();
        }
        let mut decoded = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(amp) = rest.find('&') {
            decoded.push_str(&rest[..amp]);
            rest = &rest[amp..];
            let replacement = rest.find(';').and_then(|semi| Some((semi, self.entity(&rest[1..semi])?)));
            match replacement {
                Some((semi, text)) => {
                    decoded.push_str(&text);
                    rest = &rest[semi + 1..];
                }
                None => {
                    decoded.push('&');
                    rest = &rest[1..];
                }
            }
        }
        decoded.push_str(rest);
        decoded
    }

    fn entity(&self, name: &str) -> Option<String> {
        let predefined = match name {
            "lt" => "<",
            "gt" => ">",
            "amp" => "&",
            "quot" => "\"",
            "apos" => "'",
            _ => {
                let code = match name.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => name.strip_prefix('#').and_then(|dec| dec.parse().ok()),
                };
                return match code {
                    Some(code) => char::from_u32(code).map(String::from),
                    None => self.entities.get(name).cloned(),
                };
            }
        };
        Some(predefined.to_string())
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    fn error(&self, message: impl Into<String>) -> ParseError {
        let consumed = &self.source[..self.source.len() - self.rest.len()];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        ParseError::Syntax { line, column, message: message.into() }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.rest.trim().is_empty() {
            return ParseError::UnexpectedEof;
        }
        let found: String = self.rest.chars().take(20).collect();
        self.error(format!("expected {}, found '{}'", expected, found))
    }
}
