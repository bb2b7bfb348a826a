//! IRI representation

use std::fmt;

/// An IRI reference
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    value: String,
}

impl Uri {
    /// Create a new IRI
    pub fn new(value: String) -> Self {
        Uri { value }
    }

    /// Get the IRI as a string slice
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Namespace part: everything up to and including the last `#`, `/` or `:`
    pub fn namespace(&self) -> &str {
        match self.value.rfind(['#', '/', ':']) {
            Some(pos) => &self.value[..=pos],
            None => &self.value,
        }
    }

    /// Local name: whatever follows the namespace
    pub fn local_name(&self) -> &str {
        &self.value[self.namespace().len()..]
    }

    /// Resolve a relative reference against this base
    pub fn resolve(&self, relative: &str) -> Uri {
        if is_absolute(relative) {
            return Uri::new(relative.to_string());
        }

        if relative.is_empty() {
            return self.clone();
        }

        if relative.starts_with('#') {
            let base = match self.value.find('#') {
                Some(pos) => &self.value[..pos],
                None => &self.value,
            };
            return Uri::new(format!("{}{}", base, relative));
        }

        if relative.starts_with('/') {
            if let Some(scheme_end) = self.value.find("://") {
                let authority_start = scheme_end + 3;
                let end = self.value[authority_start..]
                    .find('/')
                    .map(|p| authority_start + p)
                    .unwrap_or(self.value.len());
                return Uri::new(format!("{}{}", &self.value[..end], relative));
            }
        }

        let base = match self.value.rfind('/') {
            Some(pos) => &self.value[..=pos],
            None => &self.value,
        };
        Uri::new(format!("{}{}", base, relative))
    }
}

/// Whether a string carries a URI scheme (`scheme:...`)
pub fn is_absolute(s: &str) -> bool {
    match s.find(':') {
        Some(pos) if pos > 0 => {
            let scheme = &s[..pos];
            scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<")?;
        for c in self.value.chars() {
            match c {
                '\\' | '>' | '<' | '"' | '{' | '}' | '|' | '^' | '`' => write!(f, "\\u{:04X}", c as u32)?,
                c if (c as u32) <= 0x20 => write!(f, "\\u{:04X}", c as u32)?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str(">")
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Uri::new(s.to_string())
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Uri::new(s)
    }
}

/// Well-known namespace IRIs
pub mod ns {
    use super::Uri;

    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const OWL: &str = "http://www.w3.org/2002/07/owl#";

    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

    /// Prefixes every rule file and update batch may use without declaring them
    pub const STANDARD_PREFIXES: [(&str, &str); 4] = [("rdf", RDF), ("rdfs", RDFS), ("xsd", XSD), ("owl", OWL)];

    pub fn rdf_type() -> Uri { Uri::new(format!("{}type", RDF)) }
    pub fn rdf_first() -> Uri { Uri::new(format!("{}first", RDF)) }
    pub fn rdf_rest() -> Uri { Uri::new(format!("{}rest", RDF)) }
    pub fn rdf_nil() -> Uri { Uri::new(format!("{}nil", RDF)) }
}
