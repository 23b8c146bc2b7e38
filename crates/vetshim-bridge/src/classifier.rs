//! Fault classification
//!
//! Decides which faults are worth surfacing to listeners. Everything is
//! buffered; only actionable faults are forwarded.

use crate::protocol::{FaultEvent, FaultKind};
use serde::{Deserialize, Serialize};

/// Classifier verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Forward to listeners
    pub has_actionable_error: bool,
    /// Category label attached to the event
    pub category: Option<String>,
}

impl Classification {
    /// Actionable verdict with category
    #[must_use]
    pub fn actionable(category: impl Into<String>) -> Self {
        Self {
            has_actionable_error: true,
            category: Some(category.into()),
        }
    }

    /// Non-actionable verdict with category
    #[must_use]
    pub fn ignorable(category: impl Into<String>) -> Self {
        Self {
            has_actionable_error: false,
            category: Some(category.into()),
        }
    }
}

/// Fault classifier collaborator
pub trait FaultClassifier: Send + Sync {
    /// Classify one event
    fn classify(&self, event: &FaultEvent) -> Classification;
}

/// Substring rule for [`PatternClassifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierRule {
    /// Case-sensitive message fragment
    pub needle: &'static str,
    /// Category assigned on match
    pub category: &'static str,
    /// Whether the match is actionable
    pub actionable: bool,
}

const fn rule(needle: &'static str, category: &'static str, actionable: bool) -> ClassifierRule {
    ClassifierRule {
        needle,
        category,
        actionable,
    }
}

/// Built-in classification table, first match wins
pub static DEFAULT_CLASSIFIER_RULES: &[ClassifierRule] = &[
    // Browser noise
    rule("ResizeObserver loop", "noise", false),
    rule("Non-Error promise rejection captured", "noise", false),
    rule("Warning: ", "react_warning", false),
    rule("Download the React DevTools", "noise", false),
    // Render failures
    rule("Component not found", "render_error", true),
    rule("Minified React error", "render_error", true),
    rule("Element type is invalid", "render_error", true),
    rule("Objects are not valid as a React child", "render_error", true),
    rule("Too many re-renders", "render_error", true),
    rule("Rendered more hooks than", "render_error", true),
    rule("Invalid hook call", "render_error", true),
    // Code errors
    rule("is not defined", "reference_error", true),
    rule("is not a function", "type_error", true),
    rule("Cannot read properties of", "type_error", true),
    rule("undefined is not an object", "type_error", true),
    rule("SyntaxError", "syntax_error", true),
    rule("Unexpected token", "syntax_error", true),
    // Network
    rule("Failed to fetch", "network_error", true),
    rule("NetworkError", "network_error", true),
];

/// Table-driven classifier
///
/// Cross-origin `Script error.` reports carry no detail and are treated as
/// noise.
#[derive(Debug, Clone, Copy)]
pub struct PatternClassifier {
    rules: &'static [ClassifierRule],
}

impl PatternClassifier {
    /// Classifier over the built-in table
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_CLASSIFIER_RULES,
        }
    }

    /// Classifier over a custom table
    #[must_use]
    pub fn with_rules(rules: &'static [ClassifierRule]) -> Self {
        Self { rules }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultClassifier for PatternClassifier {
    fn classify(&self, event: &FaultEvent) -> Classification {
        let message = event.message.trim();
        if message == "Script error." || message.is_empty() {
            return Classification::ignorable("noise");
        }

        if let Some(rule) = self.rules.iter().find(|r| message.contains(r.needle)) {
            return Classification {
                has_actionable_error: rule.actionable,
                category: Some(rule.category.to_string()),
            };
        }

        match event.kind {
            FaultKind::RuntimeError | FaultKind::UnhandledRejection => {
                Classification::actionable("unknown")
            }
            FaultKind::ConsoleError => Classification::actionable("console"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FaultPayload;
    use chrono::Utc;

    fn classify(kind: FaultKind, message: &str) -> Classification {
        let event = FaultEvent::from_payload(kind, FaultPayload::new(message), None, Utc::now());
        PatternClassifier::new().classify(&event)
    }

    #[test]
    fn noise_is_not_actionable() {
        for message in [
            "ResizeObserver loop limit exceeded",
            "Script error.",
            "   ",
            "Warning: Each child in a list should have a unique \"key\" prop.",
        ] {
            assert!(
                !classify(FaultKind::RuntimeError, message).has_actionable_error,
                "{message}"
            );
        }
    }

    #[test]
    fn code_errors_are_categorized() {
        let c = classify(FaultKind::RuntimeError, "ReferenceError: chartData is not defined");
        assert_eq!(c, Classification::actionable("reference_error"));

        let c = classify(
            FaultKind::RuntimeError,
            "TypeError: Cannot read properties of undefined (reading 'map')",
        );
        assert_eq!(c.category.as_deref(), Some("type_error"));

        let c = classify(FaultKind::RuntimeError, "Component not found: App");
        assert_eq!(c.category.as_deref(), Some("render_error"));
    }

    #[test]
    fn unmatched_defaults_by_kind() {
        assert_eq!(
            classify(FaultKind::UnhandledRejection, "boom"),
            Classification::actionable("unknown")
        );
        assert_eq!(
            classify(FaultKind::ConsoleError, "boom"),
            Classification::actionable("console")
        );
    }
}
