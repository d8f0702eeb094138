//! Non-fatal recoverable conditions, collected alongside results instead of logged.
//!
//! Mirrors the old `PdfWarnMsg` approach: real-world PDFs routinely misbehave in ways
//! that shouldn't abort extraction, but callers still deserve to know about them.

use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub severity: Severity,
    pub component: &'static str,
    pub message: String,
    pub page: Option<usize>,
}

impl Warning {
    pub fn warn(component: &'static str, message: impl Into<String>) -> Self {
        Warning {
            severity: Severity::Warning,
            component,
            message: message.into(),
            page: None,
        }
    }

    pub fn error(component: &'static str, message: impl Into<String>) -> Self {
        Warning {
            severity: Severity::Error,
            component,
            message: message.into(),
            page: None,
        }
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_page_attaches_page_index() {
        let w = Warning::warn("xref", "entry out of range").on_page(3);
        assert_eq!(w.page, Some(3));
        assert_eq!(w.severity, Severity::Warning);
    }
}
