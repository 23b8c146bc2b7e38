//! Import and export rewriting
//!
//! Sandboxed apps are single files whose dependencies arrive as pre-loaded
//! bundles, so module syntax has to go before transpilation:
//!
//! - static imports are replaced by as many blank lines as they spanned,
//!   and their bindings are collected for the shim prelude
//! - `import('pkg')` and `require('pkg')` become bundle module lookups
//! - `export` keywords are flattened and the default export becomes the
//!   entry component
//!
//! Line numbers in the output match the input, so transpiler diagnostics
//! point at the user's own lines.

use crate::config::is_identifier;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use vetshim_bundles::BundleRegistry;
use vetshim_guard::SpecifierKind;
use vetshim_types::{FindingKind, LineIndex, Position, ValidationFinding};

/// Binding the entry component gets when the default export is anonymous
pub const ENTRY_BINDING: &str = "__VetshimEntry";

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)(?P<lead>^|[;}])[ \t]*import\s+(?P<clause>[\w$*{}\s,]+?)\s*from\s*['"](?P<spec>[^'"\n]+)['"][ \t]*;?"#,
    )
    .expect("static import pattern")
});

static SIDE_EFFECT_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(?P<lead>^|[;}])[ \t]*import\s*['"](?P<spec>[^'"\n]+)['"][ \t]*;?"#)
        .expect("side-effect import pattern")
});

static RE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)(?P<lead>^|[;}])[ \t]*export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"](?P<spec>[^'"\n]+)['"][ \t]*;?"#,
    )
    .expect("re-export pattern")
});

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<pre>^|[^\w$.])import\s*\(\s*['"`](?P<spec>[^'"`\n]+)['"`]\s*\)"#)
        .expect("dynamic import pattern")
});

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<pre>^|[^\w$.])require\s*\(\s*['"`](?P<spec>[^'"`\n]+)['"`]\s*\)"#)
        .expect("require pattern")
});

static EXPORT_DEFAULT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(?P<indent>[ \t]*)export[ \t]+default[ \t]+(?P<decl>(?:async[ \t]+)?function\b[ \t]*\*?|class\b)[ \t]*(?P<name>[A-Za-z_$][\w$]*)",
    )
    .expect("default declaration pattern")
});

static EXPORT_DEFAULT_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*export[ \t]+default[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*;?[ \t]*\r?$",
    )
    .expect("default identifier pattern")
});

static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export[ \t]*\{(?P<list>[^}]*)\}[ \t]*;?").expect("export list pattern")
});

static EXPORT_DEFAULT_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)export[ \t]+default[ \t]+")
        .expect("default expression pattern")
});

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(?P<indent>[ \t]*)export[ \t]+(?P<kw>(?:async[ \t]+)?function\b|const\b|let\b|var\b|class\b|abstract[ \t]+class\b|interface\b|type\b|enum\b)",
    )
    .expect("export declaration pattern")
});

/// How an imported name is bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    /// `import { imported as local } from 'pkg'`
    Named {
        /// Name exported by the package
        imported: String,
        /// Local binding
        local: String,
    },
    /// `import local from 'pkg'`
    Default {
        /// Local binding
        local: String,
    },
    /// `import * as local from 'pkg'`
    Namespace {
        /// Local binding
        local: String,
    },
}

impl ImportBinding {
    /// Local binding name
    #[must_use]
    pub fn local(&self) -> &str {
        match self {
            ImportBinding::Named { local, .. }
            | ImportBinding::Default { local }
            | ImportBinding::Namespace { local } => local,
        }
    }
}

/// Binding taken from a package import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageImport {
    /// Package specifier as written
    pub specifier: String,
    /// Bundle providing the package, if any
    pub bundle: Option<&'static str>,
    /// What the statement binds
    pub binding: ImportBinding,
    /// 1-based line of the statement
    pub line: u32,
}

/// Result of rewriting one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Module-free code, line-aligned with the input
    pub code: String,
    /// Bindings from static package imports, in source order
    pub imports: Vec<PackageImport>,
    /// Name the mount step renders
    pub entry_component: String,
    /// Advisory notices about dropped constructs
    pub notices: Vec<ValidationFinding>,
}

/// Rewrites module syntax against a bundle registry
#[derive(Debug, Clone, Copy)]
pub struct ImportRewriter<'a> {
    registry: &'a BundleRegistry,
}

impl<'a> ImportRewriter<'a> {
    /// Create rewriter
    #[must_use]
    pub fn new(registry: &'a BundleRegistry) -> Self {
        Self { registry }
    }

    /// Rewrite a directive-free source
    ///
    /// `default_entry` names the entry component when the source has no
    /// default export.
    #[must_use]
    pub fn rewrite(&self, text: &str, default_entry: &str) -> Rewrite {
        let mut imports = Vec::new();
        let mut notices = Vec::new();

        let code = blank_matches(text, &STATIC_IMPORT, |caps, position| {
            let spec = &caps["spec"];
            let bindings = parse_clause(&caps["clause"]);
            self.collect(spec, bindings, position, &mut imports, &mut notices);
        });

        let code = blank_matches(&code, &SIDE_EFFECT_IMPORT, |caps, position| {
            self.collect(&caps["spec"], Vec::new(), position, &mut imports, &mut notices);
        });

        let code = blank_matches(&code, &RE_EXPORT, |caps, position| {
            notices.push(
                ValidationFinding::new(
                    FindingKind::TransformNotice,
                    format!("Re-export from '{}' removed", &caps["spec"]),
                )
                .at(position)
                .with_matched_text(&caps["spec"]),
            );
        });

        let code = self.replace_calls(&code, &DYNAMIC_IMPORT, true, &mut notices);
        let code = self.replace_calls(&code, &REQUIRE_CALL, false, &mut notices);

        let (code, entry) = flatten_exports(&code);
        imports.sort_by_key(|i| i.line);
        notices.sort_by_key(|n| (n.line, n.column));
        let entry_component = entry.unwrap_or_else(|| default_entry.to_string());
        tracing::debug!(
            "Rewrote {} import binding(s), entry component '{}'",
            imports.len(),
            entry_component
        );

        Rewrite {
            code,
            imports,
            entry_component,
            notices,
        }
    }

    fn collect(
        &self,
        spec: &str,
        bindings: Vec<ImportBinding>,
        position: Position,
        imports: &mut Vec<PackageImport>,
        notices: &mut Vec<ValidationFinding>,
    ) {
        if SpecifierKind::of(spec) == SpecifierKind::Relative {
            notices.push(relative_notice(spec, position));
            return;
        }

        let bundle = self.registry.owner_of(spec).map(|b| b.name);
        if bundle.is_none() {
            push_unbundled_notice(spec, position, notices);
        }
        imports.extend(bindings.into_iter().map(|binding| PackageImport {
            specifier: spec.to_string(),
            bundle,
            binding,
            line: position.line,
        }));
    }

    fn replace_calls(
        &self,
        text: &str,
        pattern: &Regex,
        dynamic: bool,
        notices: &mut Vec<ValidationFinding>,
    ) -> String {
        let index = LineIndex::new(text);
        pattern
            .replace_all(text, |caps: &Captures| {
                let spec = &caps["spec"];
                let offset = caps.name("spec").map_or(0, |m| m.start());
                let position = index.position(offset);

                let lookup = match (SpecifierKind::of(spec), self.registry.owner_of(spec)) {
                    (SpecifierKind::Package, Some(bundle)) => {
                        format!("__vs.module({}, {})", js_string(bundle.name), js_string(spec))
                    }
                    (SpecifierKind::Relative, _) => {
                        notices.push(relative_notice(spec, position));
                        "__vs.inert.object".to_string()
                    }
                    _ => {
                        push_unbundled_notice(spec, position, notices);
                        "__vs.inert.object".to_string()
                    }
                };

                if dynamic {
                    format!("{}Promise.resolve({})", &caps["pre"], lookup)
                } else {
                    format!("{}{}", &caps["pre"], lookup)
                }
            })
            .into_owned()
    }
}

/// Replace each match with the newlines it contained
///
/// The statement boundary in `lead` is kept. Statements sharing a line
/// can consume each other's boundary, so passes repeat until nothing
/// matches.
fn blank_matches<F>(text: &str, pattern: &Regex, mut on_match: F) -> String
where
    F: FnMut(&Captures<'_>, Position),
{
    let mut code = text.to_string();
    while pattern.is_match(&code) {
        let index = LineIndex::new(&code);
        code = pattern
            .replace_all(&code, |caps: &Captures| {
                let lead = caps.name("lead").map_or("", |m| m.as_str());
                let start = caps.get(0).map_or(0, |m| m.start()) + lead.len();
                on_match(caps, index.position(start));
                format!("{}{}", lead, "\n".repeat(caps[0].matches('\n').count()))
            })
            .into_owned();
    }
    code
}

fn relative_notice(spec: &str, position: Position) -> ValidationFinding {
    ValidationFinding::new(
        FindingKind::TransformNotice,
        format!("Relative import '{spec}' removed; sandboxed apps are a single file"),
    )
    .at(position)
    .with_matched_text(spec)
    .with_suggestion(Some("Inline the imported code into this file"))
}

fn push_unbundled_notice(spec: &str, position: Position, notices: &mut Vec<ValidationFinding>) {
    let seen = notices
        .iter()
        .any(|n| n.matched_text.as_deref() == Some(spec) && n.message.contains("runtime bundle"));
    if seen {
        return;
    }
    tracing::warn!("Package '{}' has no runtime bundle; binding inert stand-ins", spec);
    notices.push(
        ValidationFinding::new(
            FindingKind::TransformNotice,
            format!("Package '{spec}' is not provided by any runtime bundle; its imports are inert"),
        )
        .at(position)
        .with_matched_text(spec)
        .with_suggestion(Some("Use a bundled package or implement the feature inline")),
    );
}

/// Parse the clause between `import` and `from`
fn parse_clause(clause: &str) -> Vec<ImportBinding> {
    let clause = clause.trim();
    if clause
        .strip_prefix("type")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '{'))
    {
        return Vec::new();
    }

    let (head, named) = match clause.find('{') {
        Some(open) => {
            let close = clause[open..].find('}').map_or(clause.len(), |c| open + c);
            (&clause[..open], Some(&clause[open + 1..close]))
        }
        None => (clause, None),
    };

    let mut bindings = Vec::new();
    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(rest) = part.strip_prefix('*') {
            let words: Vec<&str> = rest.split_whitespace().collect();
            if let ["as", local] = words.as_slice() {
                if is_identifier(local) {
                    bindings.push(ImportBinding::Namespace {
                        local: (*local).to_string(),
                    });
                }
            }
        } else if is_identifier(part) {
            bindings.push(ImportBinding::Default {
                local: part.to_string(),
            });
        }
    }

    for item in named.into_iter().flat_map(|n| n.split(',')) {
        let words: Vec<&str> = item.split_whitespace().collect();
        let (imported, local) = match words.as_slice() {
            [name] => (*name, *name),
            [imported, "as", local] if *imported != "type" => (*imported, *local),
            _ => continue,
        };
        if !is_identifier(local) {
            continue;
        }
        let binding = if imported == "default" {
            ImportBinding::Default {
                local: local.to_string(),
            }
        } else {
            ImportBinding::Named {
                imported: imported.to_string(),
                local: local.to_string(),
            }
        };
        bindings.push(binding);
    }
    bindings
}

/// Strip `export` keywords; returns the code and the default export name
fn flatten_exports(text: &str) -> (String, Option<String>) {
    let mut entry: Option<String> = None;

    let code = EXPORT_DEFAULT_DECL
        .replace_all(text, |caps: &Captures| {
            let name = &caps["name"];
            let decl = caps["decl"].trim_end();
            if name == "extends" {
                entry.get_or_insert_with(|| ENTRY_BINDING.to_string());
                return format!("{}const {} = {} {}", &caps["indent"], ENTRY_BINDING, decl, name);
            }
            entry.get_or_insert_with(|| name.to_string());
            format!("{}{} {}", &caps["indent"], decl, name)
        })
        .into_owned();

    let code = EXPORT_DEFAULT_IDENT
        .replace_all(&code, |caps: &Captures| {
            entry.get_or_insert_with(|| caps["name"].to_string());
            String::new()
        })
        .into_owned();

    let code = blank_matches(&code, &EXPORT_LIST, |caps, _| {
        for item in caps["list"].split(',') {
            let words: Vec<&str> = item.split_whitespace().collect();
            if let [name, "as", "default"] = words.as_slice() {
                entry.get_or_insert_with(|| (*name).to_string());
            }
        }
    });

    let code = EXPORT_DEFAULT_EXPR
        .replace_all(&code, |caps: &Captures| {
            entry.get_or_insert_with(|| ENTRY_BINDING.to_string());
            format!("{}const {} = ", &caps["indent"], ENTRY_BINDING)
        })
        .into_owned();

    let code = EXPORT_DECL.replace_all(&code, "${indent}${kw}").into_owned();
    (code, entry)
}

/// JSON string literal, valid as a JavaScript string
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
