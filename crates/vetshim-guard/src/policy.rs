//! Package allow/block policy
//!
//! Every non-relative module reference is normalized to a package
//! identifier and checked against two process-wide static lists:
//!
//! - **blocked**: error, with a remediation hint when one is known
//! - **allowed**: no finding
//! - anything else: warning, the package is unvetted
//!
//! Blocking always wins: an identifier on both lists is blocked.

use crate::imports::{ImportScanner, SpecifierKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vetshim_types::{FindingKind, SourceUnit, ValidationFinding};

/// Runtime packages every sandbox provides
pub const RUNTIME_PACKAGES: &[&str] = &["react", "react-dom"];

/// Policy outcome for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Rejected
    Blocked,
    /// Vetted and available
    Allowed,
    /// On neither list
    Unvetted,
}

/// One list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageRule {
    /// Normalized package identifier
    pub identifier: &'static str,
    /// Which list the entry belongs to
    pub disposition: Disposition,
    /// Remediation hint
    pub suggestion: Option<&'static str>,
}

const fn blocked(identifier: &'static str, suggestion: Option<&'static str>) -> PackageRule {
    PackageRule {
        identifier,
        disposition: Disposition::Blocked,
        suggestion,
    }
}

const fn allowed(identifier: &'static str) -> PackageRule {
    PackageRule {
        identifier,
        disposition: Disposition::Allowed,
        suggestion: None,
    }
}

const NODE_BUILTIN: Option<&str> = Some("Node built-ins are not available in the browser sandbox");
const USE_SANDBOX_FETCH: Option<&str> = Some("Use sandbox.fetch() for network access");
const NO_SERVER: Option<&str> =
    Some("Server frameworks cannot run in the preview; keep logic in React components");
const NO_PERSISTENCE: Option<&str> =
    Some("Keep data in React state; the host persists app records");
const NO_BACKEND_SDK: Option<&str> =
    Some("Backend SDKs are not available; the host provides data access");

/// Block list
pub static BLOCKED_PACKAGES: &[PackageRule] = &[
    // Node built-ins
    blocked("fs", NODE_BUILTIN),
    blocked("path", NODE_BUILTIN),
    blocked("os", NODE_BUILTIN),
    blocked("child_process", NODE_BUILTIN),
    blocked("cluster", NODE_BUILTIN),
    blocked("worker_threads", NODE_BUILTIN),
    blocked("net", NODE_BUILTIN),
    blocked("tls", NODE_BUILTIN),
    blocked("dgram", NODE_BUILTIN),
    blocked("http", NODE_BUILTIN),
    blocked("https", NODE_BUILTIN),
    blocked("http2", NODE_BUILTIN),
    blocked("crypto", Some("Use the Web Crypto API (crypto.randomUUID) or the uuid package")),
    blocked("process", NODE_BUILTIN),
    blocked("vm", Some("Dynamic code evaluation is not allowed")),
    blocked("node:", NODE_BUILTIN),
    // Servers
    blocked("express", NO_SERVER),
    blocked("koa", NO_SERVER),
    blocked("fastify", NO_SERVER),
    // HTTP clients
    blocked("axios", USE_SANDBOX_FETCH),
    blocked("node-fetch", USE_SANDBOX_FETCH),
    blocked("cross-fetch", USE_SANDBOX_FETCH),
    blocked("isomorphic-fetch", USE_SANDBOX_FETCH),
    blocked("got", USE_SANDBOX_FETCH),
    blocked("request", USE_SANDBOX_FETCH),
    blocked("superagent", USE_SANDBOX_FETCH),
    blocked("ky", USE_SANDBOX_FETCH),
    // Sockets
    blocked("ws", Some("Real-time sockets are not available; poll with sandbox.fetch()")),
    blocked(
        "socket.io-client",
        Some("Real-time sockets are not available; poll with sandbox.fetch()"),
    ),
    // Client persistence
    blocked("localforage", NO_PERSISTENCE),
    blocked("idb", NO_PERSISTENCE),
    blocked("idb-keyval", NO_PERSISTENCE),
    blocked("dexie", NO_PERSISTENCE),
    blocked("js-cookie", NO_PERSISTENCE),
    blocked("universal-cookie", NO_PERSISTENCE),
    // Backend SDKs
    blocked("firebase", NO_BACKEND_SDK),
    blocked("@supabase/supabase-js", NO_BACKEND_SDK),
    blocked("@aws-sdk", NO_BACKEND_SDK),
    blocked("mongodb", NO_BACKEND_SDK),
    blocked("pg", NO_BACKEND_SDK),
    // Evaluation and automation
    blocked("vm2", Some("Dynamic code evaluation is not allowed")),
    blocked("safe-eval", Some("Dynamic code evaluation is not allowed")),
    blocked("dotenv", Some("Environment variables are not available in the sandbox")),
    blocked("puppeteer", None),
    blocked("playwright", None),
    blocked("electron", None),
];

/// Allow list
pub static ALLOWED_PACKAGES: &[PackageRule] = &[
    allowed("react"),
    allowed("react-dom"),
    allowed("clsx"),
    allowed("date-fns"),
    allowed("uuid"),
    allowed("lodash"),
    allowed("tailwind-merge"),
    allowed("class-variance-authority"),
    allowed("lucide-react"),
    allowed("recharts"),
    allowed("framer-motion"),
    allowed("react-hook-form"),
    allowed("zod"),
    allowed("@hookform/resolvers"),
    allowed("@tanstack/react-table"),
    allowed("papaparse"),
    allowed("react-markdown"),
];

/// Reduce a module specifier to its package identifier
///
/// `@group/name/sub` → `@group/name`, `name/sub` → `name`.
#[must_use]
pub fn normalize(specifier: &str) -> &str {
    let specifier = specifier.trim();
    let mut parts = specifier.match_indices('/').map(|(i, _)| i);
    let cut = if specifier.starts_with('@') {
        parts.nth(1)
    } else {
        parts.next()
    };
    cut.map_or(specifier, |i| &specifier[..i])
}

/// Exact match or sub-path of a list entry
fn matches_entry(id: &str, entry: &str) -> bool {
    if entry.ends_with(':') {
        return id.starts_with(entry);
    }
    id == entry || id.strip_prefix(entry).is_some_and(|rest| rest.starts_with('/'))
}

/// Package policy over static allow/block lists
#[derive(Debug, Clone, Copy)]
pub struct PackagePolicy {
    blocked: &'static [PackageRule],
    allowed: &'static [PackageRule],
}

impl PackagePolicy {
    /// Policy over the built-in lists
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocked: BLOCKED_PACKAGES,
            allowed: ALLOWED_PACKAGES,
        }
    }

    /// Policy over custom lists
    #[inline]
    #[must_use]
    pub fn with_lists(blocked: &'static [PackageRule], allowed: &'static [PackageRule]) -> Self {
        Self { blocked, allowed }
    }

    fn block_entry(&self, id: &str) -> Option<&'static PackageRule> {
        let id = normalize(id);
        self.blocked.iter().find(|r| matches_entry(id, r.identifier))
    }

    /// Check if identifier is blocked
    #[must_use]
    pub fn is_blocked(&self, id: &str) -> bool {
        self.block_entry(id).is_some()
    }

    /// Check if identifier is allowed
    ///
    /// Blocked identifiers are never allowed.
    #[must_use]
    pub fn is_allowed(&self, id: &str) -> bool {
        if self.is_blocked(id) {
            return false;
        }
        let id = normalize(id);
        RUNTIME_PACKAGES.contains(&id)
            || self.allowed.iter().any(|r| matches_entry(id, r.identifier))
    }

    /// Disposition of identifier
    #[must_use]
    pub fn classify(&self, id: &str) -> Disposition {
        if self.is_blocked(id) {
            Disposition::Blocked
        } else if self.is_allowed(id) {
            Disposition::Allowed
        } else {
            Disposition::Unvetted
        }
    }

    /// Remediation hint for a blocked identifier
    #[must_use]
    pub fn suggestion_for(&self, id: &str) -> Option<&'static str> {
        self.block_entry(id).and_then(|r| r.suggestion)
    }

    /// Check every module reference in source
    ///
    /// Each distinct normalized identifier is reported once, at its first
    /// occurrence. Relative references are skipped.
    #[must_use]
    pub fn check_imports(&self, source: &SourceUnit) -> PolicyReport {
        let mut report = PolicyReport::default();
        let mut seen = HashSet::new();

        for reference in ImportScanner::new().scan(source) {
            match reference.specifier_kind() {
                SpecifierKind::Relative => continue,
                SpecifierKind::Remote => {
                    if seen.insert(reference.specifier.clone()) {
                        report.errors.push(
                            ValidationFinding::new(
                                FindingKind::ImportBlocked,
                                format!(
                                    "Remote module '{}' cannot be loaded",
                                    reference.specifier
                                ),
                            )
                            .at(reference.position)
                            .with_matched_text(reference.specifier.as_str())
                            .with_suggestion(Some("Use one of the pre-bundled packages")),
                        );
                    }
                }
                SpecifierKind::Package => {
                    let id = normalize(&reference.specifier);
                    if !seen.insert(id.to_string()) {
                        continue;
                    }
                    match self.classify(id) {
                        Disposition::Blocked => report.errors.push(
                            ValidationFinding::new(
                                FindingKind::ImportBlocked,
                                format!("Package '{id}' is not allowed in sandboxed apps"),
                            )
                            .at(reference.position)
                            .with_matched_text(reference.specifier.as_str())
                            .with_suggestion(self.suggestion_for(id)),
                        ),
                        Disposition::Unvetted => report.warnings.push(
                            ValidationFinding::new(
                                FindingKind::ImportUnvetted,
                                format!("Package '{id}' is not on the vetted list and may be unavailable"),
                            )
                            .at(reference.position)
                            .with_matched_text(reference.specifier.as_str()),
                        ),
                        Disposition::Allowed => {}
                    }
                }
            }
        }

        if !report.is_clean() {
            tracing::debug!(
                "Package policy for {}: {} blocked, {} unvetted",
                source.app_id(),
                report.errors.len(),
                report.warnings.len()
            );
        }
        report
    }
}

impl Default for PackagePolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Findings of a package policy check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyReport {
    /// Blocked packages
    pub errors: Vec<ValidationFinding>,
    /// Unvetted packages
    pub warnings: Vec<ValidationFinding>,
}

impl PolicyReport {
    /// Check if nothing was reported
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Errors followed by warnings
    #[must_use]
    pub fn into_findings(self) -> Vec<ValidationFinding> {
        let mut findings = self.errors;
        findings.extend(self.warnings);
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization() {
        assert_eq!(normalize("lodash"), "lodash");
        assert_eq!(normalize("lodash/debounce"), "lodash");
        assert_eq!(normalize("date-fns/locale/de"), "date-fns");
        assert_eq!(normalize("@tanstack/react-table"), "@tanstack/react-table");
        assert_eq!(normalize("@aws-sdk/client-s3/dist"), "@aws-sdk/client-s3");
        assert_eq!(normalize("@scope"), "@scope");
    }

    #[test]
    fn sub_paths_are_blocked() {
        let policy = PackagePolicy::new();
        assert!(policy.is_blocked("fs"));
        assert!(policy.is_blocked("fs/promises"));
        assert!(policy.is_blocked("@aws-sdk/client-s3"));
        assert!(policy.is_blocked("node:fs"));
        assert!(!policy.is_blocked("fsevents"));
        assert!(!policy.is_blocked("pathlib"));
    }

    #[test]
    fn runtime_packages_are_allowed() {
        let policy = PackagePolicy::with_lists(BLOCKED_PACKAGES, &[]);
        assert!(policy.is_allowed("react"));
        assert!(policy.is_allowed("react-dom/client"));
        assert!(!policy.is_allowed("recharts"));
    }

    #[test]
    fn blocked_overrides_allowed() {
        static BOTH: &[PackageRule] = &[PackageRule {
            identifier: "axios",
            disposition: Disposition::Allowed,
            suggestion: None,
        }];
        let policy = PackagePolicy::with_lists(BLOCKED_PACKAGES, BOTH);
        assert!(policy.is_blocked("axios"));
        assert!(!policy.is_allowed("axios"));
        assert_eq!(policy.classify("axios"), Disposition::Blocked);
    }

    #[test]
    fn classify_three_ways() {
        let policy = PackagePolicy::new();
        assert_eq!(policy.classify("express"), Disposition::Blocked);
        assert_eq!(policy.classify("recharts/lib/x"), Disposition::Allowed);
        assert_eq!(policy.classify("left-pad"), Disposition::Unvetted);
    }

    #[test]
    fn check_imports_reports_once_per_package() {
        let text = "import axios from 'axios';\nconst a2 = require('axios/lib/x');\nimport { z } from 'zod';\nimport pad from 'left-pad';\nimport Local from './Local';";
        let report = PackagePolicy::new().check_imports(&SourceUnit::anonymous(text));

        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert_eq!(error.kind, FindingKind::ImportBlocked);
        assert_eq!(error.line, Some(1));
        assert_eq!(
            error.suggestion.as_deref(),
            Some("Use sandbox.fetch() for network access")
        );

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, FindingKind::ImportUnvetted);
        assert_eq!(report.warnings[0].line, Some(4));
    }

    #[test]
    fn blocked_import_after_another_on_same_line() {
        let report = PackagePolicy::new().check_imports(&SourceUnit::anonymous(
            "import React from 'react'; import fs from 'fs';",
        ));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].matched_text.as_deref(), Some("fs"));
        assert_eq!(report.errors[0].column, Some(44));
    }

    #[test]
    fn remote_imports_are_blocked() {
        let report = PackagePolicy::new()
            .check_imports(&SourceUnit::anonymous("import x from 'https://cdn.test/x.js';"));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("https://cdn.test/x.js"));
    }

    #[test]
    fn lists_are_disjoint() {
        for rule in ALLOWED_PACKAGES {
            assert!(
                !PackagePolicy::new().is_blocked(rule.identifier),
                "{} is on both lists",
                rule.identifier
            );
        }
    }
}
