//! Static bundle registry
//!
//! A bundle is a pre-built script exposing one or more packages under a
//! single global namespace entry. Bundle identity is its name. Every
//! package identifier belongs to at most one bundle; [`BundleRegistry`]
//! rejects tables that break this.

use crate::error::{RegistryError, RegistryResult};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use vetshim_guard::PackagePolicy;
use ExportKind::{Component as C, Function as F, Hook as H, Object as O};

/// Bundle every build loads first
pub const CORE_BUNDLE: &str = "core";

/// Bundle every build loads second
pub const UTILS_BUNDLE: &str = "utils";

/// When the host loads a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Loaded before every app
    Always,
    /// Loaded only when a source needs it
    Lazy,
}

/// Shape of an exported symbol
///
/// Selects the inert stand-in bound when the bundle fails to provide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// Renderable component
    Component,
    /// Plain function
    Function,
    /// React hook
    Hook,
    /// Namespace-like object
    Object,
    /// Any other value
    Value,
}

impl ExportKind {
    /// Guess the kind of an export from its name
    ///
    /// `useThing` → hook, `Thing` → component, anything else → function.
    #[must_use]
    pub fn infer(name: &str) -> Self {
        let mut chars = name.chars();
        match chars.next() {
            Some('u') if name.starts_with("use") => {
                if name[3..].starts_with(|c: char| c.is_ascii_uppercase()) {
                    ExportKind::Hook
                } else {
                    ExportKind::Function
                }
            }
            Some(c) if c.is_ascii_uppercase() => ExportKind::Component,
            _ => ExportKind::Function,
        }
    }
}

/// Symbol a bundle exposes on its namespace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BundleExport {
    /// Exported name
    pub name: &'static str,
    /// Shape of the export
    pub kind: ExportKind,
}

/// Pre-built runtime bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Bundle name (identity)
    pub name: &'static str,
    /// Load strategy
    pub load_strategy: LoadStrategy,
    /// Package identifiers provided
    pub packages: &'static [&'static str],
    /// Symbols exposed on the namespace entry
    pub exported_symbols: &'static [BundleExport],
}

impl Bundle {
    /// Check if bundle provides a package (exact or sub-path)
    #[must_use]
    pub fn provides(&self, id: &str) -> bool {
        self.packages.iter().any(|pkg| package_matches(id, pkg))
    }

    /// Export by name
    #[must_use]
    pub fn export(&self, name: &str) -> Option<&'static BundleExport> {
        self.exported_symbols.iter().find(|e| e.name == name)
    }
}

/// `id == pkg` or `id` is a sub-path of `pkg`
#[must_use]
pub fn package_matches(id: &str, pkg: &str) -> bool {
    id == pkg || id.strip_prefix(pkg).is_some_and(|rest| rest.starts_with('/'))
}

const fn export(name: &'static str, kind: ExportKind) -> BundleExport {
    BundleExport { name, kind }
}

/// Built-in bundle table
pub static DEFAULT_BUNDLES: &[Bundle] = &[
    Bundle {
        name: CORE_BUNDLE,
        load_strategy: LoadStrategy::Always,
        packages: &["react", "react-dom"],
        exported_symbols: &[
            export("React", O),
            export("ReactDOM", O),
            export("useState", H),
            export("useEffect", H),
            export("useMemo", H),
            export("useCallback", H),
            export("useRef", H),
            export("useReducer", H),
            export("useContext", H),
            export("useLayoutEffect", H),
            export("useId", H),
            export("useTransition", H),
            export("createContext", F),
            export("forwardRef", F),
            export("memo", F),
            export("Fragment", C),
            export("StrictMode", C),
            export("Suspense", C),
        ],
    },
    Bundle {
        name: UTILS_BUNDLE,
        load_strategy: LoadStrategy::Always,
        packages: &[
            "clsx",
            "date-fns",
            "uuid",
            "lodash",
            "tailwind-merge",
            "class-variance-authority",
        ],
        exported_symbols: &[
            export("clsx", F),
            export("twMerge", F),
            export("cva", F),
            export("format", F),
            export("parseISO", F),
            export("addDays", F),
            export("subDays", F),
            export("differenceInDays", F),
            export("startOfWeek", F),
            export("endOfWeek", F),
            export("isSameDay", F),
            export("formatDistanceToNow", F),
            export("v4", F),
            export("_", O),
        ],
    },
    Bundle {
        name: "icons",
        load_strategy: LoadStrategy::Lazy,
        packages: &["lucide-react"],
        exported_symbols: &[
            export("Plus", C),
            export("Minus", C),
            export("Trash2", C),
            export("Edit", C),
            export("Pencil", C),
            export("Check", C),
            export("X", C),
            export("Search", C),
            export("Calendar", C),
            export("ChevronDown", C),
            export("ChevronUp", C),
            export("ChevronLeft", C),
            export("ChevronRight", C),
            export("Settings", C),
            export("Download", C),
            export("Upload", C),
            export("TrendingUp", C),
            export("TrendingDown", C),
        ],
    },
    Bundle {
        name: "charts",
        load_strategy: LoadStrategy::Lazy,
        packages: &["recharts"],
        exported_symbols: &[
            export("ResponsiveContainer", C),
            export("LineChart", C),
            export("Line", C),
            export("BarChart", C),
            export("Bar", C),
            export("AreaChart", C),
            export("Area", C),
            export("PieChart", C),
            export("Pie", C),
            export("Cell", C),
            export("XAxis", C),
            export("YAxis", C),
            export("CartesianGrid", C),
            export("Tooltip", C),
            export("Legend", C),
        ],
    },
    Bundle {
        name: "motion",
        load_strategy: LoadStrategy::Lazy,
        packages: &["framer-motion"],
        exported_symbols: &[export("motion", O), export("AnimatePresence", C)],
    },
    Bundle {
        name: "forms",
        load_strategy: LoadStrategy::Lazy,
        packages: &["react-hook-form", "zod", "@hookform/resolvers"],
        exported_symbols: &[
            export("useForm", H),
            export("useFieldArray", H),
            export("Controller", C),
            export("z", O),
            export("zodResolver", F),
        ],
    },
    Bundle {
        name: "tables",
        load_strategy: LoadStrategy::Lazy,
        packages: &["@tanstack/react-table"],
        exported_symbols: &[
            export("useReactTable", H),
            export("getCoreRowModel", F),
            export("getSortedRowModel", F),
            export("getFilteredRowModel", F),
            export("getPaginationRowModel", F),
            export("createColumnHelper", F),
            export("flexRender", F),
        ],
    },
    Bundle {
        name: "csv",
        load_strategy: LoadStrategy::Lazy,
        packages: &["papaparse"],
        exported_symbols: &[export("Papa", O)],
    },
    Bundle {
        name: "markdown",
        load_strategy: LoadStrategy::Lazy,
        packages: &["react-markdown"],
        exported_symbols: &[export("ReactMarkdown", C)],
    },
];

/// Validated bundle table with name lookup
#[derive(Debug, Clone)]
pub struct BundleRegistry {
    bundles: Vec<Bundle>,
    by_name: HashMap<&'static str, usize>,
}

impl BundleRegistry {
    /// Registry over the built-in table
    #[must_use]
    pub fn new() -> Self {
        DEFAULT_REGISTRY.clone()
    }

    /// Build registry from a bundle table
    ///
    /// # Errors
    /// - `RegistryError::DuplicateBundle` if two bundles share a name
    /// - `RegistryError::AmbiguousPackage` if a package id would match two bundles
    /// - `RegistryError::MissingRequired` if `core` or `utils` is absent
    pub fn from_bundles(bundles: &[Bundle]) -> RegistryResult<Self> {
        let mut by_name = HashMap::with_capacity(bundles.len());
        let mut owners: Vec<(&'static str, &'static str)> = Vec::new();

        for (idx, bundle) in bundles.iter().enumerate() {
            if by_name.insert(bundle.name, idx).is_some() {
                return Err(RegistryError::DuplicateBundle(bundle.name.to_string()));
            }
            for &pkg in bundle.packages {
                let clash = owners.iter().find(|(owner, other)| {
                    *owner != bundle.name
                        && (package_matches(pkg, other) || package_matches(other, pkg))
                });
                if let Some(&(owner, _)) = clash {
                    return Err(RegistryError::ambiguous(pkg, owner, bundle.name));
                }
                owners.push((bundle.name, pkg));
            }
        }

        for required in [CORE_BUNDLE, UTILS_BUNDLE] {
            if !by_name.contains_key(required) {
                return Err(RegistryError::MissingRequired(required.to_string()));
            }
        }

        Ok(Self {
            bundles: bundles.to_vec(),
            by_name,
        })
    }

    /// Bundle by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Bundle> {
        self.by_name.get(name).map(|&idx| &self.bundles[idx])
    }

    /// Check if a bundle exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Bundle that provides a package identifier
    #[must_use]
    pub fn owner_of(&self, id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.provides(id))
    }

    /// Bundles in table order
    pub fn iter(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.iter()
    }

    /// Bundle names in table order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.bundles.iter().map(|b| b.name).collect()
    }

    /// Number of bundles
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Registry packages the policy would reject
    ///
    /// Returns `(bundle, package)` pairs. A non-empty result means the
    /// bundle detector could load something the policy engine blocks.
    #[must_use]
    pub fn audit(&self, policy: &PackagePolicy) -> Vec<(&'static str, &'static str)> {
        self.bundles
            .iter()
            .flat_map(|b| b.packages.iter().map(move |&pkg| (b.name, pkg)))
            .filter(|&(_, pkg)| !policy.is_allowed(pkg))
            .collect()
    }
}

impl Default for BundleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<BundleRegistry> = Lazy::new(|| {
    BundleRegistry::from_bundles(DEFAULT_BUNDLES).expect("built-in bundle table is valid")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let registry = BundleRegistry::new();
        assert_eq!(registry.len(), DEFAULT_BUNDLES.len());
        assert_eq!(&registry.names()[..2], &[CORE_BUNDLE, UTILS_BUNDLE]);
    }

    #[test]
    fn owner_lookup_with_sub_paths() {
        let registry = BundleRegistry::new();
        assert_eq!(registry.owner_of("recharts").map(|b| b.name), Some("charts"));
        assert_eq!(registry.owner_of("date-fns/locale").map(|b| b.name), Some("utils"));
        assert_eq!(registry.owner_of("react-dom/client").map(|b| b.name), Some("core"));
        assert_eq!(
            registry.owner_of("@hookform/resolvers/zod").map(|b| b.name),
            Some("forms")
        );
        assert!(registry.owner_of("reactive").is_none());
    }

    #[test]
    fn default_registry_passes_policy_audit() {
        let registry = BundleRegistry::new();
        assert!(registry.audit(&PackagePolicy::new()).is_empty());
    }

    #[test]
    fn ambiguous_packages_are_rejected() {
        static TABLE: &[Bundle] = &[
            Bundle {
                name: CORE_BUNDLE,
                load_strategy: LoadStrategy::Always,
                packages: &["react"],
                exported_symbols: &[],
            },
            Bundle {
                name: UTILS_BUNDLE,
                load_strategy: LoadStrategy::Always,
                packages: &["lodash"],
                exported_symbols: &[],
            },
            Bundle {
                name: "fp",
                load_strategy: LoadStrategy::Lazy,
                packages: &["lodash/fp"],
                exported_symbols: &[],
            },
        ];
        let err = BundleRegistry::from_bundles(TABLE).unwrap_err();
        assert_eq!(err, RegistryError::ambiguous("lodash/fp", "utils", "fp"));
    }

    #[test]
    fn duplicate_and_missing_bundles_are_rejected() {
        let core = DEFAULT_BUNDLES[0];
        let err = BundleRegistry::from_bundles(&[core, core]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateBundle("core".to_string()));

        let err = BundleRegistry::from_bundles(&[core]).unwrap_err();
        assert_eq!(err, RegistryError::MissingRequired("utils".to_string()));
    }

    #[test]
    fn export_kind_inference() {
        assert_eq!(ExportKind::infer("useChart"), ExportKind::Hook);
        assert_eq!(ExportKind::infer("user"), ExportKind::Function);
        assert_eq!(ExportKind::infer("useless"), ExportKind::Function);
        assert_eq!(ExportKind::infer("BarChart"), ExportKind::Component);
        assert_eq!(ExportKind::infer("format"), ExportKind::Function);
    }

    #[test]
    fn export_lookup() {
        let registry = BundleRegistry::new();
        let charts = registry.get("charts").unwrap();
        assert_eq!(charts.export("LineChart").map(|e| e.kind), Some(ExportKind::Component));
        assert!(charts.export("Nope").is_none());
    }
}
