//! Shim prelude generation
//!
//! Binds the names a rewritten source expects to the runtime bundles the
//! host has loaded under `globalThis.__VETSHIM_DEPS__`. Core bindings carry
//! no fallbacks; every other bundle gets per-name inert defaults so a
//! missing export degrades instead of throwing at load time.

use crate::rewrite::{js_string, ImportBinding, Rewrite};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use vetshim_bundles::{Bundle, BundleRegistry, BundleRequirementSet, ExportKind, CORE_BUNDLE};

/// Global the host installs loaded bundles under
pub const DEPS_GLOBAL: &str = "__VETSHIM_DEPS__";

/// Name the JSX transform needs in scope
const REACT: &str = "React";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][\w$]*").expect("identifier pattern"));

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|let|var|function\*?|class)\s+(?P<name>[A-Za-z_$][\w$]*)")
        .expect("declaration pattern")
});

static DESTRUCTURING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|let|var)\s*[{\[](?P<names>[^}\]=;]*)").expect("destructuring pattern")
});

/// Inert stand-in expression for an export kind
///
/// `None` for plain values, which default to `undefined` anyway.
#[must_use]
pub fn fallback_for(kind: ExportKind) -> Option<&'static str> {
    match kind {
        ExportKind::Component => Some("__vs.inert.component"),
        ExportKind::Function => Some("__vs.inert.fn"),
        ExportKind::Hook => Some("__vs.inert.hook"),
        ExportKind::Object => Some("__vs.inert.object"),
        ExportKind::Value => None,
    }
}

/// One name taken from a bundle namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimBinding {
    /// Name on the bundle namespace
    pub export: String,
    /// Local binding
    pub local: String,
    /// Default used when the bundle lacks the export
    pub fallback: Option<&'static str>,
}

impl ShimBinding {
    fn render(&self) -> String {
        let mut out = if self.export == self.local {
            self.export.clone()
        } else {
            format!("{}: {}", self.export, self.local)
        };
        if let Some(fallback) = self.fallback {
            out.push_str(" = ");
            out.push_str(fallback);
        }
        out
    }
}

/// Bindings planned for one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShimPlan {
    /// Core bindings, without fallbacks
    pub core: Vec<ShimBinding>,
    /// Bindings per non-core bundle, in requirement order
    pub bundles: IndexMap<&'static str, Vec<ShimBinding>>,
    /// Standalone statements for default, namespace and unbundled imports
    pub statements: Vec<String>,
}

impl ShimPlan {
    /// Core destructuring statement
    #[must_use]
    pub fn core_block(&self) -> String {
        destructure(CORE_BUNDLE, &self.core).unwrap_or_default()
    }

    /// Non-core destructuring statements followed by standalone statements
    #[must_use]
    pub fn prelude(&self) -> String {
        self.bundles
            .iter()
            .filter_map(|(bundle, bindings)| destructure(bundle, bindings))
            .chain(self.statements.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every local name the plan binds
    pub fn bound_names(&self) -> impl Iterator<Item = &str> {
        self.core
            .iter()
            .chain(self.bundles.values().flatten())
            .map(|b| b.local.as_str())
    }
}

fn destructure(bundle: &str, bindings: &[ShimBinding]) -> Option<String> {
    if bindings.is_empty() {
        return None;
    }
    let names: Vec<String> = bindings.iter().map(ShimBinding::render).collect();
    Some(format!(
        "const {{ {} }} = __vs.bundle({});",
        names.join(", "),
        js_string(bundle)
    ))
}

/// Plans shim bindings against a registry
#[derive(Debug, Clone, Copy)]
pub struct ShimGenerator<'a> {
    registry: &'a BundleRegistry,
}

impl<'a> ShimGenerator<'a> {
    /// Create generator
    #[must_use]
    pub fn new(registry: &'a BundleRegistry) -> Self {
        Self { registry }
    }

    /// Plan bindings for a rewritten source
    ///
    /// Needed names are the source's own imports plus every export of a
    /// required bundle that the code references and does not declare.
    #[must_use]
    pub fn plan(&self, required: &BundleRequirementSet, rewrite: &Rewrite) -> ShimPlan {
        let referenced = referenced_identifiers(&rewrite.code);
        let declared = declared_identifiers(&rewrite.code);
        let mut bound: HashSet<String> = HashSet::new();

        let mut plan = ShimPlan {
            bundles: required
                .iter()
                .filter(|name| *name != CORE_BUNDLE)
                .map(|name| (name, Vec::new()))
                .collect(),
            ..ShimPlan::default()
        };

        for import in &rewrite.imports {
            let local = import.binding.local();
            if !bound.insert(local.to_string()) {
                continue;
            }
            let bundle = import.bundle.and_then(|name| self.registry.get(name));
            match (bundle, &import.binding) {
                (Some(bundle), ImportBinding::Named { imported, local }) => {
                    plan.push(bundle, imported, local);
                }
                (Some(bundle), binding) if bundle.export(binding.local()).is_some() => {
                    plan.push(bundle, binding.local(), binding.local());
                }
                (Some(bundle), ImportBinding::Default { local }) => {
                    plan.statements.push(format!(
                        "const {} = __vs.defaultOf({}, {});",
                        local,
                        js_string(bundle.name),
                        js_string(&import.specifier)
                    ));
                }
                (Some(bundle), ImportBinding::Namespace { local }) => {
                    plan.statements.push(format!(
                        "const {} = __vs.module({}, {});",
                        local,
                        js_string(bundle.name),
                        js_string(&import.specifier)
                    ));
                }
                (None, binding) => {
                    let kind = match binding {
                        ImportBinding::Named { imported, .. } => ExportKind::infer(imported),
                        ImportBinding::Default { local } => ExportKind::infer(local),
                        ImportBinding::Namespace { .. } => ExportKind::Object,
                    };
                    plan.statements.push(format!(
                        "const {} = {};",
                        binding.local(),
                        fallback_for(kind).unwrap_or("undefined")
                    ));
                }
            }
        }

        if !bound.contains(REACT) && !declared.contains(REACT) {
            bound.insert(REACT.to_string());
            plan.core.insert(
                0,
                ShimBinding {
                    export: REACT.to_string(),
                    local: REACT.to_string(),
                    fallback: None,
                },
            );
        }

        for bundle in required.iter().filter_map(|name| self.registry.get(name)) {
            for export in bundle.exported_symbols {
                if referenced.contains(export.name)
                    && !declared.contains(export.name)
                    && bound.insert(export.name.to_string())
                {
                    plan.push(bundle, export.name, export.name);
                }
            }
        }

        tracing::debug!(
            "Shim plan: {} core binding(s), {} bundle binding(s), {} statement(s)",
            plan.core.len(),
            plan.bundles.values().map(Vec::len).sum::<usize>(),
            plan.statements.len()
        );
        plan
    }
}

impl ShimPlan {
    fn push(&mut self, bundle: &Bundle, export: &str, local: &str) {
        let binding = ShimBinding {
            export: export.to_string(),
            local: local.to_string(),
            fallback: None,
        };
        if bundle.name == CORE_BUNDLE {
            self.core.push(binding);
            return;
        }
        let kind = bundle
            .export(export)
            .map_or_else(|| ExportKind::infer(export), |e| e.kind);
        self.bundles.entry(bundle.name).or_default().push(ShimBinding {
            fallback: fallback_for(kind),
            ..binding
        });
    }
}

/// Identifiers used outside member position (`a.b` yields only `a`)
fn referenced_identifiers(code: &str) -> HashSet<&str> {
    IDENTIFIER
        .find_iter(code)
        .filter(|m| {
            let before = code[..m.start()].trim_end();
            !(before.ends_with('.') && !before.ends_with(".."))
        })
        .map(|m| m.as_str())
        .collect()
}

/// Names the code declares itself, at any depth
fn declared_identifiers(code: &str) -> HashSet<String> {
    let mut declared: HashSet<String> = DECLARATION
        .captures_iter(code)
        .map(|caps| caps["name"].to_string())
        .collect();

    for caps in DESTRUCTURING.captures_iter(code) {
        for part in caps["names"].split(',') {
            let local = part.rsplit(':').next().unwrap_or(part).trim();
            let local = local.trim_start_matches("...");
            if let Some(m) = IDENTIFIER.find(local).filter(|m| m.start() == 0) {
                declared.insert(m.as_str().to_string());
            }
        }
    }
    declared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::ImportRewriter;
    use pretty_assertions::assert_eq;
    use vetshim_bundles::BundleResolver;
    use vetshim_types::SourceUnit;

    fn plan(text: &str) -> ShimPlan {
        let resolver = BundleResolver::new();
        let required = resolver.analyze_imports(&SourceUnit::anonymous(text));
        let rewrite = ImportRewriter::new(resolver.registry()).rewrite(text, "App");
        ShimGenerator::new(resolver.registry()).plan(&required, &rewrite)
    }

    #[test]
    fn named_imports_get_fallbacks_outside_core() {
        let plan = plan(
            "import { useState } from 'react';\nimport { LineChart, Line as L } from 'recharts';\n",
        );
        assert_eq!(plan.core_block(), r#"const { React, useState } = __vs.bundle("core");"#);
        assert_eq!(
            plan.prelude(),
            r#"const { LineChart = __vs.inert.component, Line: L = __vs.inert.component } = __vs.bundle("charts");"#
        );
    }

    #[test]
    fn referenced_exports_are_bound_without_import() {
        let plan = plan("function App() {\n  const [n] = useState(0);\n  return <BarChart><Bar /></BarChart>;\n}\n");
        let names: Vec<_> = plan.bound_names().collect();
        assert!(names.contains(&"useState"));
        assert!(names.contains(&"BarChart"));
        assert!(names.contains(&"Bar"));
        assert!(!names.contains(&"App"));
    }

    #[test]
    fn local_declarations_shadow_exports() {
        let plan = plan("import { LineChart } from 'recharts';\nfunction Tooltip() { return null; }\nconst { format } = helpers;\nconst x = <LineChart><Tooltip /></LineChart>;\n");
        let names: Vec<_> = plan.bound_names().collect();
        assert!(!names.contains(&"Tooltip"));
        assert!(!names.contains(&"format"));
    }

    #[test]
    fn member_access_is_not_a_reference() {
        let plan = plan("const t = props.useState;\n");
        assert_eq!(plan.core_block(), r#"const { React } = __vs.bundle("core");"#);
    }

    #[test]
    fn default_and_namespace_imports() {
        let plan = plan("import Papa from 'papaparse';\nimport * as Icons from 'lucide-react';\nimport React from 'react';\n");
        assert_eq!(plan.core_block(), r#"const { React } = __vs.bundle("core");"#);
        assert_eq!(
            plan.prelude(),
            [
                r#"const { Papa = __vs.inert.object } = __vs.bundle("csv");"#,
                r#"const Icons = __vs.module("icons", "lucide-react");"#,
            ]
            .join("\n")
        );
    }

    #[test]
    fn default_import_without_matching_export_uses_module_default() {
        let plan = plan("import Chart from 'recharts';\n");
        assert_eq!(
            plan.statements,
            vec![r#"const Chart = __vs.defaultOf("charts", "recharts");"#.to_string()]
        );
    }

    #[test]
    fn unbundled_imports_bind_inert_values() {
        let plan = plan("import leftPad from 'left-pad';\nimport { Widget, useThing } from 'mystery-ui';\n");
        assert_eq!(
            plan.statements,
            vec![
                "const leftPad = __vs.inert.fn;".to_string(),
                "const Widget = __vs.inert.component;".to_string(),
                "const useThing = __vs.inert.hook;".to_string(),
            ]
        );
    }

    #[test]
    fn empty_bundles_emit_nothing() {
        let plan = plan("const a = 1;\n");
        assert_eq!(plan.prelude(), "");
        assert!(plan.bundles.contains_key("utils"));
    }

    #[test]
    fn declarations_are_collected() {
        let declared = declared_identifiers(
            "const { a, b: c, ...rest } = x;\nlet [d, e] = y;\nfunction* gen() {}\nclass Foo {}\n",
        );
        for name in ["a", "c", "rest", "d", "e", "gen", "Foo"] {
            assert!(declared.contains(name), "{name}");
        }
        assert!(!declared.contains("b"));
    }
}
