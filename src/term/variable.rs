//! Variables in rule bodies and update patterns

use std::fmt;
use std::sync::Arc;

/// A named variable (`?x`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    name: Arc<str>,
}

impl Variable {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Variable { name: name.into() }
    }

    /// Get the variable name, without the leading `?`
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}
