//! Findings and build diagnostics
//!
//! Every check in the pipeline reports through the same record shapes:
//! - [`ValidationFinding`] from the pattern validator and the package policy
//! - [`BundleError`] in the diagnostics of a build result
//!
//! The taxonomy is the closed [`FindingKind`] enum so new kinds force every
//! match to be revisited.

use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Whether a finding stops the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Reported, build continues
    Advisory,
    /// Build is rejected
    Blocking,
}

impl Severity {
    /// Check if severity blocks the build
    #[inline]
    #[must_use]
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Blocking)
    }
}

/// Finding taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Disallowed API pattern matched
    SecurityViolation,
    /// Package identifier on the block list
    ImportBlocked,
    /// Package identifier on neither list
    ImportUnvetted,
    /// Risky but boundary-respecting API usage
    DiscouragedPattern,
    /// External transpiler rejected the code
    TranspileFailure,
    /// Source was altered during transformation
    TransformNotice,
}

impl FindingKind {
    /// Severity this kind carries by default
    #[inline]
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            FindingKind::SecurityViolation
            | FindingKind::ImportBlocked
            | FindingKind::TranspileFailure => Severity::Blocking,
            FindingKind::ImportUnvetted
            | FindingKind::DiscouragedPattern
            | FindingKind::TransformNotice => Severity::Advisory,
        }
    }

    /// Stable label
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::SecurityViolation => "security_violation",
            FindingKind::ImportBlocked => "import_blocked",
            FindingKind::ImportUnvetted => "import_unvetted",
            FindingKind::DiscouragedPattern => "discouraged_pattern",
            FindingKind::TranspileFailure => "transpile_failure",
            FindingKind::TransformNotice => "transform_notice",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single source check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    /// Finding kind
    pub kind: FindingKind,
    /// Human-readable message
    pub message: String,
    /// Blocking or advisory
    pub severity: Severity,
    /// 1-based line of the match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column of the match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Text that triggered the finding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Remediation hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationFinding {
    /// Create finding with the kind's default severity
    #[must_use]
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: kind.default_severity(),
            line: None,
            column: None,
            matched_text: None,
            suggestion: None,
        }
    }

    /// With location
    #[inline]
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.line = Some(position.line);
        self.column = Some(position.column);
        self
    }

    /// With matched text
    #[inline]
    #[must_use]
    pub fn with_matched_text(mut self, text: impl Into<String>) -> Self {
        self.matched_text = Some(text.into());
        self
    }

    /// With optional suggestion
    #[inline]
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: Option<impl Into<String>>) -> Self {
        self.suggestion = suggestion.map(Into::into);
        self
    }

    /// With explicit severity
    #[inline]
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Check if finding blocks the build
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }
}

/// Diagnostic record attached to a build result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleError {
    /// Finding kind
    pub kind: FindingKind,
    /// Human-readable message
    pub message: String,
    /// 1-based line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Offending source line or matched text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Remediation hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl BundleError {
    /// Create message-only diagnostic
    #[must_use]
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            column: None,
            source: None,
            suggestion: None,
        }
    }

    /// With location
    #[inline]
    #[must_use]
    pub fn with_location(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// With source text
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

impl From<ValidationFinding> for BundleError {
    fn from(finding: ValidationFinding) -> Self {
        Self {
            kind: finding.kind,
            message: finding.message,
            line: finding.line,
            column: finding.column,
            source: finding.matched_text,
            suggestion: finding.suggestion,
        }
    }
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{}: {}", line, column, self.message),
            (Some(line), None) => write!(f, "{}: {}", line, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Errors and warnings collected during a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Blocking diagnostics
    pub errors: Vec<BundleError>,
    /// Advisory diagnostics
    pub warnings: Vec<BundleError>,
}

impl Diagnostics {
    /// Create empty diagnostics
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a finding by its severity
    pub fn push_finding(&mut self, finding: ValidationFinding) {
        if finding.is_blocking() {
            self.errors.push(finding.into());
        } else {
            self.warnings.push(finding.into());
        }
    }

    /// Route many findings by severity
    pub fn extend_findings(&mut self, findings: impl IntoIterator<Item = ValidationFinding>) {
        for finding in findings {
            self.push_finding(finding);
        }
    }

    /// Add blocking diagnostic
    #[inline]
    pub fn error(&mut self, error: BundleError) {
        self.errors.push(error);
    }

    /// Add advisory diagnostic
    #[inline]
    pub fn warning(&mut self, warning: BundleError) {
        self.warnings.push(warning);
    }

    /// Check if any diagnostic blocks the build
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_severities() {
        assert!(FindingKind::SecurityViolation.default_severity().is_blocking());
        assert!(FindingKind::ImportBlocked.default_severity().is_blocking());
        assert!(FindingKind::TranspileFailure.default_severity().is_blocking());
        assert!(!FindingKind::ImportUnvetted.default_severity().is_blocking());
        assert!(!FindingKind::DiscouragedPattern.default_severity().is_blocking());
        assert!(!FindingKind::TransformNotice.default_severity().is_blocking());
    }

    #[test]
    fn finding_builder() {
        let finding = ValidationFinding::new(FindingKind::ImportBlocked, "blocked: fs")
            .at(Position::new(3, 1))
            .with_matched_text("fs")
            .with_suggestion(Some("remove it"));

        assert!(finding.is_blocking());
        assert_eq!(finding.line, Some(3));
        assert_eq!(finding.column, Some(1));
        assert_eq!(finding.suggestion.as_deref(), Some("remove it"));
    }

    #[test]
    fn diagnostics_route_by_severity() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend_findings([
            ValidationFinding::new(FindingKind::SecurityViolation, "eval"),
            ValidationFinding::new(FindingKind::DiscouragedPattern, "innerHTML"),
            ValidationFinding::new(FindingKind::DiscouragedPattern, "promoted")
                .with_severity(Severity::Blocking),
        ]);

        assert_eq!(diagnostics.errors.len(), 2);
        assert_eq!(diagnostics.warnings.len(), 1);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn bundle_error_display() {
        let located = BundleError::new(FindingKind::TranspileFailure, "Unexpected token")
            .with_location(Some(4), Some(10));
        assert_eq!(located.to_string(), "4:10: Unexpected token");

        let bare = BundleError::new(FindingKind::TranspileFailure, "boom");
        assert_eq!(bare.to_string(), "boom");
    }

    #[test]
    fn finding_serializes_camel_case() {
        let finding = ValidationFinding::new(FindingKind::SecurityViolation, "eval")
            .with_matched_text("eval(");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "security_violation");
        assert_eq!(json["severity"], "blocking");
        assert_eq!(json["matchedText"], "eval(");
        assert!(json.get("line").is_none());
    }
}
