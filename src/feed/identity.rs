//! Query identity — the parameter tuple that names a logical dataset
//!
//! Accumulated items are only valid for the identity they were fetched
//! under. Equality is the sole trigger for reset decisions: two identities
//! that compare equal address the same dataset, full stop. No field-by-field
//! diffing happens anywhere else in the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The contract an identity type must satisfy.
///
/// Blanket-implemented; any comparable, cloneable, thread-safe value works.
pub trait QueryIdentity: Clone + Eq + Send + Sync + fmt::Debug + 'static {}

impl<T: Clone + Eq + Send + Sync + fmt::Debug + 'static> QueryIdentity for T {}

/// A concrete two-field identity: whose data, and which kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub subject: String,
    pub category: String,
}

impl Query {
    pub fn new(subject: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            category: category.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_fields_mean_equal_identity() {
        assert_eq!(Query::new("bill", "browser"), Query::new("bill", "browser"));
    }

    #[test]
    fn any_field_difference_means_different_identity() {
        let base = Query::new("bill", "browser");
        assert_ne!(base, Query::new("susan", "browser"));
        assert_ne!(base, Query::new("bill", "voice"));
    }
}
