//! Pattern security validator
//!
//! Scans raw application source for API usage that would escape the
//! sandbox or persist data outside the host's control. Rules are plain
//! ordered static data; each compiles to one regex.
//!
//! Patterns tolerate arbitrary whitespace (including newlines) between a
//! call name and its parenthesis and around member-access dots, so
//! `eval  (` and `window\n  .open(` are caught the same as the compact
//! forms.
//!
//! The part of a match that is reported is the `hit` capture group when a
//! rule defines one. Rules use a leading `(?:^|[^\w$])` class instead of
//! lookbehind to anchor identifiers.

use crate::error::{GuardError, GuardResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use vetshim_types::{FindingKind, Severity, SourceUnit, ValidationFinding};

/// Sanctioned network accessor exposed to sandboxed apps
pub const SANCTIONED_FETCH: &str = "sandbox.fetch";

/// Rule category
///
/// Severity is a property of the category, never of an individual rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    /// `eval`, `Function` constructor, string timers
    DynamicEvaluation,
    /// Browser storage that outlives the preview
    PersistentStorage,
    /// Popups and navigation of this or other frames
    Navigation,
    /// Cookie access
    CookieAccess,
    /// `document.write` and friends
    DocumentOverwrite,
    /// Injecting script elements or worker scripts
    ScriptInjection,
    /// Raw HTML insertion
    MarkupInjection,
    /// Sockets, XHR, server-sent events
    RawNetworking,
    /// `fetch` that bypasses the sanctioned accessor
    DirectNetwork,
}

impl PatternCategory {
    /// Severity of findings in this category
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            PatternCategory::DynamicEvaluation
            | PatternCategory::PersistentStorage
            | PatternCategory::Navigation
            | PatternCategory::CookieAccess
            | PatternCategory::DocumentOverwrite
            | PatternCategory::ScriptInjection => Severity::Blocking,
            PatternCategory::MarkupInjection
            | PatternCategory::RawNetworking
            | PatternCategory::DirectNetwork => Severity::Advisory,
        }
    }

    /// Finding kind reported for this category
    #[must_use]
    pub fn finding_kind(self) -> FindingKind {
        if self.severity().is_blocking() {
            FindingKind::SecurityViolation
        } else {
            FindingKind::DiscouragedPattern
        }
    }
}

/// A single validator rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternRule {
    /// Stable rule identifier
    pub id: &'static str,
    /// Category (selects severity)
    pub category: PatternCategory,
    /// Regex source
    pub pattern: &'static str,
    /// Message reported on match
    pub message: &'static str,
    /// Remediation hint
    pub suggestion: Option<&'static str>,
}

/// Built-in rule table, in reporting order
pub static DEFAULT_RULES: &[PatternRule] = &[
    // Dynamic evaluation
    PatternRule {
        id: "eval-call",
        category: PatternCategory::DynamicEvaluation,
        pattern: r"(?:^|[^\w$.])(?P<hit>(?:(?:window|globalThis|self)\s*\.\s*)?eval\s*\()",
        message: "Dynamic code evaluation with eval() is not allowed",
        suggestion: Some("Parse data with JSON.parse or write the logic directly"),
    },
    PatternRule {
        id: "function-constructor",
        category: PatternCategory::DynamicEvaluation,
        pattern: r"(?:^|[^\w$.])(?P<hit>(?:new\s+)?(?:(?:window|globalThis|self)\s*\.\s*)?Function\s*\()",
        message: "The Function constructor evaluates strings as code and is not allowed",
        suggestion: Some("Define a regular function instead"),
    },
    PatternRule {
        id: "string-timer",
        category: PatternCategory::DynamicEvaluation,
        pattern: r#"(?:^|[^\w$])(?P<hit>set(?:Timeout|Interval)\s*\(\s*['"`])"#,
        message: "Timers with string arguments evaluate code and are not allowed",
        suggestion: Some("Pass a function: setTimeout(() => { ... }, delay)"),
    },
    // Persistent storage
    PatternRule {
        id: "web-storage",
        category: PatternCategory::PersistentStorage,
        pattern: r"(?P<hit>\b(?:localStorage|sessionStorage)\b)",
        message: "Browser storage is not available to sandboxed apps",
        suggestion: Some("Keep data in React state; the host persists app records"),
    },
    PatternRule {
        id: "indexed-db",
        category: PatternCategory::PersistentStorage,
        pattern: r"(?P<hit>\bindexedDB\b)",
        message: "IndexedDB is not available to sandboxed apps",
        suggestion: Some("Keep data in React state; the host persists app records"),
    },
    // Navigation
    PatternRule {
        id: "window-open",
        category: PatternCategory::Navigation,
        pattern: r"(?P<hit>\bwindow\s*\.\s*open\s*\()",
        message: "Opening new windows is not allowed",
        suggestion: Some("Render the content inside the app instead"),
    },
    PatternRule {
        id: "location-assignment",
        category: PatternCategory::Navigation,
        pattern: r"(?P<hit>(?:\b(?:window|document|self|top|parent)\s*\.\s*location(?:\s*\.\s*href)?|\blocation\s*\.\s*href)\s*=)[^=>]",
        message: "Navigating away from the app is not allowed",
        suggestion: Some("Use in-app state to switch views"),
    },
    PatternRule {
        id: "location-rebind",
        category: PatternCategory::Navigation,
        pattern: r"(?m)(?:^|[;{)]|=>|\}[ \t]*$)\s*(?P<hit>location\s*=)[^=>]",
        message: "Navigating away from the app is not allowed",
        suggestion: Some("Use in-app state to switch views"),
    },
    PatternRule {
        id: "location-method",
        category: PatternCategory::Navigation,
        pattern: r"(?P<hit>\blocation\s*\.\s*(?:assign|replace|reload)\s*\()",
        message: "Navigating away from the app is not allowed",
        suggestion: Some("Use in-app state to switch views"),
    },
    PatternRule {
        id: "frame-escape",
        category: PatternCategory::Navigation,
        pattern: r"(?P<hit>\b(?:top|parent|opener)\s*\.\s*(?:location|document|postMessage)\b)",
        message: "Accessing the host or opener frame is not allowed",
        suggestion: None,
    },
    // Cookies
    PatternRule {
        id: "document-cookie",
        category: PatternCategory::CookieAccess,
        pattern: r"(?P<hit>\bdocument\s*\.\s*cookie\b)",
        message: "Cookie access is not allowed",
        suggestion: Some("Keep data in React state; the host persists app records"),
    },
    // Document overwrite
    PatternRule {
        id: "document-write",
        category: PatternCategory::DocumentOverwrite,
        pattern: r"(?P<hit>\bdocument\s*\.\s*(?:writeln|write|open)\s*\()",
        message: "Overwriting the document is not allowed",
        suggestion: Some("Render through React instead"),
    },
    // Script injection
    PatternRule {
        id: "script-element",
        category: PatternCategory::ScriptInjection,
        pattern: r#"(?P<hit>\bcreateElement\s*\(\s*['"`](?i:script)['"`])"#,
        message: "Injecting script elements is not allowed",
        suggestion: Some("Use the pre-bundled libraries instead of loading scripts"),
    },
    PatternRule {
        id: "import-scripts",
        category: PatternCategory::ScriptInjection,
        pattern: r"(?:^|[^\w$.])(?P<hit>importScripts\s*\()",
        message: "Loading worker scripts is not allowed",
        suggestion: None,
    },
    // Markup injection
    PatternRule {
        id: "dangerous-html",
        category: PatternCategory::MarkupInjection,
        pattern: r"(?P<hit>\bdangerouslySetInnerHTML\b)",
        message: "dangerouslySetInnerHTML renders raw markup",
        suggestion: Some("Render text through JSX or use react-markdown"),
    },
    PatternRule {
        id: "inner-html-assignment",
        category: PatternCategory::MarkupInjection,
        pattern: r"(?P<hit>\.\s*(?:innerHTML|outerHTML)\s*=)[^=]",
        message: "Assigning innerHTML/outerHTML renders raw markup",
        suggestion: Some("Render text through JSX"),
    },
    PatternRule {
        id: "insert-adjacent-html",
        category: PatternCategory::MarkupInjection,
        pattern: r"(?P<hit>\binsertAdjacentHTML\s*\()",
        message: "insertAdjacentHTML renders raw markup",
        suggestion: Some("Render text through JSX"),
    },
    // Raw networking
    PatternRule {
        id: "raw-socket",
        category: PatternCategory::RawNetworking,
        pattern: r"(?P<hit>\bnew\s+(?:WebSocket|XMLHttpRequest|EventSource)\s*\()",
        message: "Raw network connections are not available in the sandbox",
        suggestion: Some("Use sandbox.fetch() for network access"),
    },
    // Direct network
    PatternRule {
        id: "direct-fetch",
        category: PatternCategory::DirectNetwork,
        pattern: r"(?:^|[^\w$.])(?P<hit>(?:(?:window|globalThis|self)\s*\.\s*)?fetch\s*\()",
        message: "Direct fetch() bypasses the sandbox network proxy",
        suggestion: Some("Use sandbox.fetch() for network access"),
    },
];

static DEFAULT_COMPILED: Lazy<Arc<[CompiledRule]>> = Lazy::new(|| {
    compile(DEFAULT_RULES)
        .expect("built-in pattern table compiles")
        .into()
});

#[derive(Debug)]
struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

impl CompiledRule {
    /// Skip matches the category exempts
    fn accepts(&self, text: &str, start: usize) -> bool {
        match self.rule.category {
            // `sandbox.fetch(` and any other member call, even split across lines
            PatternCategory::DirectNetwork => !preceded_by_member_access(text, start),
            // `<Map location="home" />` is a prop, not an assignment
            PatternCategory::Navigation if self.rule.id == "location-rebind" => {
                !inside_open_tag(text, start)
            }
            _ => true,
        }
    }
}

fn inside_open_tag(text: &str, start: usize) -> bool {
    let before = &text[..start];
    match before.rfind('<') {
        Some(open) if !before[open..].contains('>') => {
            before[open + 1..].starts_with(|c: char| c.is_ascii_alphabetic())
        }
        _ => false,
    }
}

fn preceded_by_member_access(text: &str, start: usize) -> bool {
    text[..start].trim_end().ends_with('.')
}

fn compile(rules: &[PatternRule]) -> GuardResult<Vec<CompiledRule>> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .map(|rule| {
            if !seen.insert(rule.id) {
                return Err(GuardError::DuplicateRule(rule.id.to_string()));
            }
            let regex = Regex::new(rule.pattern)
                .map_err(|e| GuardError::invalid_pattern(rule.id, e))?;
            Ok(CompiledRule { rule: *rule, regex })
        })
        .collect()
}

/// Compiled pattern validator
///
/// Cheap to clone; the compiled table is shared.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    rules: Arc<[CompiledRule]>,
}

impl PatternValidator {
    /// Validator over the built-in rule table
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Arc::clone(&DEFAULT_COMPILED),
        }
    }

    /// Validator over a custom rule table
    ///
    /// # Errors
    /// - `GuardError::InvalidPattern` if a rule's regex does not compile
    /// - `GuardError::DuplicateRule` if two rules share an id
    pub fn with_rules(rules: &[PatternRule]) -> GuardResult<Self> {
        let compiled = compile(rules)?;
        tracing::debug!("Compiled {} custom pattern rules", compiled.len());
        Ok(Self {
            rules: compiled.into(),
        })
    }

    /// Rules in reporting order
    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Scan source text
    ///
    /// Findings are ordered by rule, then by offset. Pure; the same input
    /// always yields the same findings.
    #[must_use]
    pub fn validate(&self, source: &SourceUnit) -> Vec<ValidationFinding> {
        let text = source.text();
        let index = source.line_index();
        let mut findings = Vec::new();

        for compiled in self.rules.iter() {
            for caps in compiled.regex.captures_iter(text) {
                let Some(hit) = caps.name("hit").or_else(|| caps.get(0)) else {
                    continue;
                };
                if !compiled.accepts(text, hit.start()) {
                    continue;
                }
                let rule = &compiled.rule;
                findings.push(
                    ValidationFinding::new(rule.category.finding_kind(), rule.message)
                        .with_severity(rule.category.severity())
                        .at(index.position(hit.start()))
                        .with_matched_text(hit.as_str().trim())
                        .with_suggestion(rule.suggestion),
                );
            }
        }

        if !findings.is_empty() {
            tracing::debug!(
                "Pattern scan of {} found {} issue(s)",
                source.app_id(),
                findings.len()
            );
        }
        findings
    }
}

impl Default for PatternValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan source with the built-in rule table
#[must_use]
pub fn validate(source: &SourceUnit) -> Vec<ValidationFinding> {
    PatternValidator::new().validate(source)
}
