//! Import reference scanning
//!
//! Extracts every module specifier a source refers to: static imports,
//! side-effect imports, re-exports, dynamic `import()` and `require()`.
//! Scanning is textual; the source does not have to parse.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use vetshim_types::{Position, SourceUnit};

/// How a module is referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import x from 'm'`
    Static,
    /// `import 'm'`
    SideEffect,
    /// `export { x } from 'm'`
    ReExport,
    /// `import('m')`
    Dynamic,
    /// `require('m')`
    Require,
}

/// What a specifier points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `/x`
    Relative,
    /// `https://...`, `data:...`
    Remote,
    /// Registry package identifier
    Package,
}

impl SpecifierKind {
    /// Classify a raw specifier
    #[must_use]
    pub fn of(specifier: &str) -> Self {
        if specifier.starts_with('.') || specifier.starts_with('/') {
            SpecifierKind::Relative
        } else if specifier.contains("://") || specifier.starts_with("data:") {
            SpecifierKind::Remote
        } else {
            SpecifierKind::Package
        }
    }
}

/// One module reference in a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReference {
    /// Specifier exactly as written
    pub specifier: String,
    /// Reference form
    pub kind: ImportKind,
    /// Position of the specifier
    pub position: Position,
    /// Byte offset of the specifier
    pub offset: usize,
}

impl ImportReference {
    /// Classify the specifier
    #[inline]
    #[must_use]
    pub fn specifier_kind(&self) -> SpecifierKind {
        SpecifierKind::of(&self.specifier)
    }

    /// Check if the reference is relative
    #[inline]
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.specifier_kind() == SpecifierKind::Relative
    }
}

static PATTERNS: Lazy<Vec<(ImportKind, Regex)>> = Lazy::new(|| {
    [
        (
            ImportKind::Static,
            r#"(?m)(?:^|[;}])[ \t]*import\s+(?:type\s+)?[\w$*{}\s,]+?\s*from\s*['"](?P<spec>[^'"\n]+)['"]"#,
        ),
        (
            ImportKind::SideEffect,
            r#"(?m)(?:^|[;}])[ \t]*import\s*['"](?P<spec>[^'"\n]+)['"]"#,
        ),
        (
            ImportKind::ReExport,
            r#"(?m)(?:^|[;}])[ \t]*export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"](?P<spec>[^'"\n]+)['"]"#,
        ),
        (
            ImportKind::Dynamic,
            r#"(?:^|[^\w$.])import\s*\(\s*['"`](?P<spec>[^'"`\n]+)['"`]\s*\)"#,
        ),
        (
            ImportKind::Require,
            r#"(?:^|[^\w$.])require\s*\(\s*['"`](?P<spec>[^'"`\n]+)['"`]\s*\)"#,
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("import pattern compiles")))
    .collect()
});

/// Scanner for module references
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportScanner;

impl ImportScanner {
    /// Create scanner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// All references in source order
    #[must_use]
    pub fn scan(&self, source: &SourceUnit) -> Vec<ImportReference> {
        let text = source.text();
        let index = source.line_index();
        let mut refs: Vec<ImportReference> = PATTERNS
            .iter()
            .flat_map(|(kind, regex)| {
                regex.captures_iter(text).filter_map(move |caps| {
                    caps.name("spec").map(|spec| (*kind, spec.start(), spec.as_str()))
                })
            })
            .map(|(kind, offset, specifier)| ImportReference {
                specifier: specifier.trim().to_string(),
                kind,
                position: index.position(offset),
                offset,
            })
            .collect();

        refs.sort_by_key(|r| r.offset);
        refs.dedup_by_key(|r| r.offset);
        refs
    }

    /// Non-relative references in source order
    #[must_use]
    pub fn package_references(&self, source: &SourceUnit) -> Vec<ImportReference> {
        self.scan(source)
            .into_iter()
            .filter(|r| !r.is_relative())
            .collect()
    }
}
