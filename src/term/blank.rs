//! Blank node representation

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter for generating unique blank node labels
static BLANK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A blank node, identified by its label
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankNode {
    label: Arc<str>,
}

impl BlankNode {
    /// Create a blank node with a label that no parsed document uses
    pub fn fresh() -> Self {
        let id = BLANK_COUNTER.fetch_add(1, Ordering::Relaxed);
        BlankNode {
            label: Arc::from(format!("genid{}", id)),
        }
    }

    /// Create a blank node with a label
    pub fn labeled(label: impl Into<Arc<str>>) -> Self {
        BlankNode { label: label.into() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.label)
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_blank_nodes_are_unique() {
        let b1 = BlankNode::fresh();
        let b2 = BlankNode::fresh();
        assert_ne!(b1, b2);
    }

    #[test]
    fn test_labeled_identity() {
        let b = BlankNode::labeled("x");
        assert_eq!(b.label(), "x");
        assert_eq!(b, BlankNode::labeled("x"));
        assert_eq!(format!("{}", b), "_:x");
    }
}
