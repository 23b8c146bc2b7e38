//! Combined source check
//!
//! Runs the pattern validator and the package policy over one source and
//! splits the findings by severity. This is the first stage of a build and
//! the whole of the `check` command.

use crate::patterns::PatternValidator;
use crate::policy::PackagePolicy;
use vetshim_types::{Severity, SourceUnit, ValidationFinding};

/// Findings of a combined check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// Blocking findings, patterns first
    pub errors: Vec<ValidationFinding>,
    /// Advisory findings, patterns first
    pub warnings: Vec<ValidationFinding>,
}

impl Inspection {
    /// Check if any finding blocks the build
    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Promote every advisory finding to blocking
    #[must_use]
    pub fn promote_advisories(mut self) -> Self {
        let promoted = self
            .warnings
            .drain(..)
            .map(|f| f.with_severity(Severity::Blocking));
        self.errors.extend(promoted);
        self
    }

    /// Total finding count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Check if nothing was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pattern validator plus package policy
#[derive(Debug, Clone, Default)]
pub struct SourceGuard {
    patterns: PatternValidator,
    policy: PackagePolicy,
}

impl SourceGuard {
    /// Guard with built-in rules and lists
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With pattern validator
    #[inline]
    #[must_use]
    pub fn with_patterns(mut self, patterns: PatternValidator) -> Self {
        self.patterns = patterns;
        self
    }

    /// With package policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: PackagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Package policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &PackagePolicy {
        &self.policy
    }

    /// Run both checks
    #[must_use]
    pub fn inspect(&self, source: &SourceUnit) -> Inspection {
        let mut inspection = Inspection::default();
        for finding in self.patterns.validate(source) {
            if finding.is_blocking() {
                inspection.errors.push(finding);
            } else {
                inspection.warnings.push(finding);
            }
        }

        let report = self.policy.check_imports(source);
        inspection.errors.extend(report.errors);
        inspection.warnings.extend(report.warnings);

        tracing::debug!(
            "Inspected {}: {} error(s), {} warning(s)",
            source.app_id(),
            inspection.errors.len(),
            inspection.warnings.len()
        );
        inspection
    }
}
