//! Usage-pattern detection
//!
//! Generated apps sometimes use a library through its global without
//! importing it (`<LineChart>` with no `import`). A substring table maps
//! such fragments to the bundle that provides them. False positives cost
//! one extra script load; false negatives break the app, so the table errs
//! wide.
//!
//! Component exports need no table entry: `<Name` for any bundle's
//! component export implies that bundle.

use crate::registry::{BundleRegistry, ExportKind};

/// Source fragment that implies a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsagePattern {
    /// Substring to look for
    pub needle: &'static str,
    /// Bundle it implies
    pub bundle: &'static str,
}

const fn usage(needle: &'static str, bundle: &'static str) -> UsagePattern {
    UsagePattern { needle, bundle }
}

/// Built-in usage table
pub static DEFAULT_USAGE_PATTERNS: &[UsagePattern] = &[
    // Charts
    usage("<ResponsiveContainer", "charts"),
    usage("<LineChart", "charts"),
    usage("<BarChart", "charts"),
    usage("<AreaChart", "charts"),
    usage("<PieChart", "charts"),
    usage("Recharts.", "charts"),
    // Icons
    usage("LucideIcons.", "icons"),
    usage("lucide.", "icons"),
    // Motion
    usage("<motion.", "motion"),
    usage("<AnimatePresence", "motion"),
    usage("motion(", "motion"),
    // Forms
    usage("useForm(", "forms"),
    usage("useFieldArray(", "forms"),
    usage("zodResolver(", "forms"),
    usage("z.object(", "forms"),
    usage("z.string(", "forms"),
    usage("z.number(", "forms"),
    // Tables
    usage("useReactTable(", "tables"),
    usage("flexRender(", "tables"),
    usage("getCoreRowModel(", "tables"),
    usage("createColumnHelper(", "tables"),
    // CSV
    usage("Papa.parse(", "csv"),
    usage("Papa.unparse(", "csv"),
    // Markdown
    usage("<ReactMarkdown", "markdown"),
];

/// Bundles implied by usage fragments, in table order
pub fn detect<'a>(
    patterns: &'a [UsagePattern],
    text: &'a str,
) -> impl Iterator<Item = &'static str> + 'a {
    patterns
        .iter()
        .filter(move |p| text.contains(p.needle))
        .map(|p| p.bundle)
}

/// Bundles whose component exports appear as JSX tags, in registry order
pub fn detect_component_tags<'a>(
    registry: &'a BundleRegistry,
    text: &'a str,
) -> impl Iterator<Item = &'static str> + 'a {
    registry
        .iter()
        .filter(move |bundle| {
            bundle
                .exported_symbols
                .iter()
                .any(|e| e.kind == ExportKind::Component && uses_tag(text, e.name))
        })
        .map(|bundle| bundle.name)
}

/// `<Name` not followed by more identifier characters
fn uses_tag(text: &str, name: &str) -> bool {
    let tag = format!("<{name}");
    text.match_indices(&tag).any(|(i, _)| {
        !text[i + tag.len()..].starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '$')
    })
}
