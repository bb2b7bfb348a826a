//! Literal value representation

use std::cmp::Ordering;
use std::fmt;

use super::uri::ns;

/// Datatype for a literal
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Simple literal, equivalent to `xsd:string`
    Plain,
    /// Language-tagged literal
    Language(String),
    /// Typed literal with datatype IRI
    Typed(String),
}

/// An RDF literal value
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    value: String,
    datatype: Datatype,
}

impl Literal {
    /// Create a simple literal
    pub fn plain(value: String) -> Self {
        Literal {
            value,
            datatype: Datatype::Plain,
        }
    }

    /// Create a typed literal. `xsd:string` collapses to a simple literal.
    pub fn typed(value: String, datatype: String) -> Self {
        if datatype == ns::XSD_STRING {
            return Literal::plain(value);
        }
        Literal {
            value,
            datatype: Datatype::Typed(datatype),
        }
    }

    /// Create a language-tagged literal
    pub fn with_language(value: String, lang: String) -> Self {
        Literal {
            value,
            datatype: Datatype::Language(lang.to_lowercase()),
        }
    }

    /// Get the lexical value
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn is_plain(&self) -> bool {
        matches!(self.datatype, Datatype::Plain)
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        match &self.datatype {
            Datatype::Language(lang) => Some(lang),
            _ => None,
        }
    }

    /// Datatype IRI, including the implicit ones of simple and tagged literals
    pub fn datatype_uri(&self) -> &str {
        match &self.datatype {
            Datatype::Plain => ns::XSD_STRING,
            Datatype::Language(_) => ns::RDF_LANG_STRING,
            Datatype::Typed(uri) => uri,
        }
    }

    /// Try to parse as an integer
    pub fn as_integer(&self) -> Option<i64> {
        self.value.trim().parse().ok()
    }

    /// Numeric value, for literals whose datatype is numeric or untyped
    pub fn as_number(&self) -> Option<f64> {
        match &self.datatype {
            Datatype::Language(_) => None,
            Datatype::Plain => self.value.trim().parse().ok(),
            Datatype::Typed(dt) if is_numeric_datatype(dt) => self.value.trim().parse().ok(),
            Datatype::Typed(_) => None,
        }
    }

    /// Try to parse as a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self.value.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Order two literals by value: numerically when both are numbers,
    /// lexically when both are strings of the same kind.
    pub fn compare(&self, other: &Literal) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        if self.datatype == other.datatype {
            return Some(self.value.cmp(&other.value));
        }
        None
    }
}

/// Whether a datatype IRI names one of the XSD numeric types
pub fn is_numeric_datatype(dt: &str) -> bool {
    let Some(local) = dt.strip_prefix(ns::XSD) else {
        return false;
    };
    matches!(
        local,
        "integer" | "decimal" | "double" | "float" | "int" | "long" | "short" | "byte"
            | "nonNegativeInteger" | "positiveInteger" | "negativeInteger" | "nonPositiveInteger"
            | "unsignedInt" | "unsignedLong" | "unsignedShort" | "unsignedByte"
    )
}

/// Escape a lexical form for N-Triples output
pub(crate) fn escape_lexical(value: &str, out: &mut impl fmt::Write) -> fmt::Result {
    for c in value.chars() {
        match c {
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        escape_lexical(&self.value, f)?;
        f.write_str("\"")?;
        match &self.datatype {
            Datatype::Plain => Ok(()),
            Datatype::Language(lang) => write!(f, "@{}", lang),
            Datatype::Typed(dt) => write!(f, "^^<{}>", dt),
        }
    }
}
