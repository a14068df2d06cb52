//! Input limits for dynamic queries
//!
//! Opt-in caps a [`Compiler`](crate::Compiler) built with [`Compiler::new`](crate::Compiler::new)
//! applies so that caller-supplied trees stay bounded:
//! - Maximum nesting depth of the condition tree
//! - Maximum number of condition nodes
//! - Maximum number of sort entries

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Default configuration for dynamic query input limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Maximum depth of the condition tree, root is depth 1 (default: 16)
    pub max_depth: usize,
    /// Maximum number of condition nodes (default: 256)
    pub max_conditions: usize,
    /// Maximum number of sort entries (default: 8)
    pub max_sort_fields: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_conditions: 256,
            max_sort_fields: 8,
        }
    }
}

impl QueryLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No caps at all; every well-formed request passes.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_depth: usize::MAX,
            max_conditions: usize::MAX,
            max_sort_fields: usize::MAX,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    #[must_use]
    pub fn with_max_conditions(mut self, max: usize) -> Self {
        self.max_conditions = max;
        self
    }

    #[must_use]
    pub fn with_max_sort_fields(mut self, max: usize) -> Self {
        self.max_sort_fields = max;
        self
    }

    /// Validate the depth of a node about to be visited.
    ///
    /// # Errors
    /// Returns `ValidationError::TooDeep` if `depth` exceeds the limit.
    pub fn validate_depth(&self, depth: usize) -> Result<(), ValidationError> {
        if depth > self.max_depth {
            return Err(ValidationError::TooDeep(self.max_depth));
        }
        Ok(())
    }

    /// Validate the number of condition nodes visited so far.
    ///
    /// # Errors
    /// Returns `ValidationError::TooManyConditions` if `count` exceeds the limit.
    pub fn validate_conditions(&self, count: usize) -> Result<(), ValidationError> {
        if count > self.max_conditions {
            return Err(ValidationError::TooManyConditions(self.max_conditions));
        }
        Ok(())
    }

    /// Validate the number of sort entries.
    ///
    /// # Errors
    /// Returns `ValidationError::TooManySortFields` if `count` exceeds the limit.
    pub fn validate_sort_count(&self, count: usize) -> Result<(), ValidationError> {
        if count > self.max_sort_fields {
            return Err(ValidationError::TooManySortFields(self.max_sort_fields));
        }
        Ok(())
    }
}
