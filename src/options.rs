//! Reader configuration surface.

use serde_derive::{Deserialize, Serialize};

/// Controls the strictness and resource budget of a [`crate::document::Reader`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// When `true`, any recorded [`crate::warning::Warning`] of [`crate::warning::Severity::Error`]
    /// is promoted to a hard [`crate::errors::Error`]. Lenient (`false`) by default because
    /// real-world PDFs routinely trip these.
    pub fail_on_warning: bool,
    /// Recursion bound for `resolve_deep`. The spec requires at least 64.
    pub max_resolve_depth: usize,
    /// Optional cap on the number of resolved objects kept in the object cache.
    /// `None` means unbounded (cleared only by `clear_cache`).
    pub object_cache_budget: Option<usize>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            fail_on_warning: false,
            max_resolve_depth: 64,
            object_cache_budget: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient() {
        let opts = ReaderOptions::default();
        assert!(!opts.fail_on_warning);
        assert_eq!(opts.max_resolve_depth, 64);
        assert_eq!(opts.object_cache_budget, None);
    }
}
