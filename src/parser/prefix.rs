//! Prefix tables and the `my:` namespace lookup
//!
//! A [`PrefixTable`] is built per request and handed to every parse call
//! for that request. Nothing here is process-wide.

use indexmap::IndexMap;
use tracing::{info, warn};

use super::ParseError;
use crate::error::ReasonError;
use crate::term::uri::ns;
use crate::term::Uri;

/// One prefix → namespace IRI mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixBinding {
    pub prefix: String,
    pub iri: String,
}

impl PrefixBinding {
    pub fn new(prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), iri: iri.into() }
    }
}

/// Prefix mappings plus an optional base IRI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTable {
    prefixes: IndexMap<String, String>,
    base: Option<Uri>,
}

impl PrefixTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding `rdf`, `rdfs`, `xsd` and `owl`
    pub fn standard() -> Self {
        let mut table = Self::new();
        for (prefix, namespace) in ns::STANDARD_PREFIXES {
            table.insert(prefix, namespace);
        }
        table
    }

    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Add a binding, replacing any earlier one for the same prefix
    pub fn bind(&mut self, binding: &PrefixBinding) {
        self.insert(binding.prefix.clone(), binding.iri.clone());
    }

    /// Overlay every mapping of `other` onto this table
    pub fn extend_from(&mut self, other: &PrefixTable) {
        for (prefix, namespace) in &other.prefixes {
            self.prefixes.insert(prefix.clone(), namespace.clone());
        }
        if other.base.is_some() {
            self.base = other.base.clone();
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn set_base(&mut self, base: Uri) {
        self.base = Some(base);
    }

    pub fn base(&self) -> Option<&Uri> {
        self.base.as_ref()
    }

    pub fn resolve(&self, prefix: &str, local: &str) -> Result<Uri, ParseError> {
        match self.prefixes.get(prefix) {
            Some(namespace) => Ok(Uri::new(format!("{}{}", namespace, local))),
            None => Err(ParseError::UndefinedPrefix { prefix: prefix.to_string() }),
        }
    }

    /// Resolve a possibly relative IRI against the base, if one is set
    pub fn resolve_relative(&self, iri: &str) -> Uri {
        match &self.base {
            Some(base) => base.resolve(iri),
            None => Uri::new(iri.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }

    /// Bindings as owned pairs, sorted by prefix; used as part of cache keys
    pub fn to_bindings(&self) -> Vec<PrefixBinding> {
        let mut bindings: Vec<_> = self.iter().map(|(p, n)| PrefixBinding::new(p, n)).collect();
        bindings.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        bindings
    }
}

/// Find the namespace IRI declared for `prefix` in rule text.
///
/// Only lines that begin with `@prefix <prefix>: ` count; the IRI is the
/// text between the first `<` and the following `>` on that line.
pub fn find_prefix_iri(text: &str, prefix: &str) -> Option<String> {
    let pattern = format!("@prefix {}: ", prefix);
    text.lines()
        .filter(|line| line.starts_with(&pattern))
        .find_map(|line| {
            let open = line.find('<')?;
            let close = line[open + 1..].find('>')? + open + 1;
            Some(line[open + 1..close].to_string())
        })
}

/// Resolve the binding for `prefix` from the text of `source`.
///
/// A missing declaration is not an error: it is logged as a warning and the
/// prefix is bound to the empty string.
pub fn resolve_binding(text: &str, prefix: &str, source: &str) -> PrefixBinding {
    match find_prefix_iri(text, prefix) {
        Some(iri) => {
            info!(prefix, iri = %iri, source, "Found IRI for prefix");
            PrefixBinding::new(prefix, iri)
        }
        None => {
            let warning = ReasonError::prefix_unresolved(prefix, source);
            warn!(code = warning.code.code(), "{}", warning.message);
            PrefixBinding::new(prefix, "")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = "# vocabulary\n\
        @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>.\n\
        @prefix my: <http://example.org/onto#>.\n\
        [r1: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]\n";

    #[test]
    fn test_find_prefix_iri() {
        assert_eq!(find_prefix_iri(RULES, "my"), Some("http://example.org/onto#".to_string()));
        assert_eq!(find_prefix_iri(RULES, "ex"), None);
    }

    #[test]
    fn test_find_prefix_requires_line_start() {
        let indented = "  @prefix my: <http://example.org/onto#>.\n";
        assert_eq!(find_prefix_iri(indented, "my"), None);

        let longer_prefix = "@prefix myx: <http://example.org/other#>.\n";
        assert_eq!(find_prefix_iri(longer_prefix, "my"), None);
    }

    #[test]
    fn test_missing_prefix_binds_empty() {
        let binding = resolve_binding("[r: (?a ?b ?c) -> (?c ?b ?a)]", "my", "inline");
        assert_eq!(binding, PrefixBinding::new("my", ""));
    }

    #[test]
    fn test_table_resolution() {
        let mut table = PrefixTable::standard();
        table.bind(&PrefixBinding::new("my", "http://example.org/onto#"));

        assert_eq!(table.resolve("my", "Person").unwrap().as_str(), "http://example.org/onto#Person");
        assert_eq!(
            table.resolve("rdf", "type").unwrap().as_str(),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
        );
        assert_eq!(
            table.resolve("ex", "x"),
            Err(ParseError::UndefinedPrefix { prefix: "ex".into() })
        );
    }

    #[test]
    fn test_bindings_are_sorted() {
        let mut table = PrefixTable::new();
        table.insert("z", "http://z/");
        table.insert("a", "http://a/");
        let prefixes: Vec<_> = table.to_bindings().into_iter().map(|b| b.prefix).collect();
        assert_eq!(prefixes, vec!["a", "z"]);
    }
}
