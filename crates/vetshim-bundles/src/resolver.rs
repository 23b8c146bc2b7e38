//! Bundle requirement resolution
//!
//! [`BundleResolver::analyze_imports`] computes which bundles a source
//! needs; [`BundleResolver::resolve`] turns those names into load
//! instructions for the host page.

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{Bundle, BundleRegistry, LoadStrategy, CORE_BUNDLE, UTILS_BUNDLE};
use crate::usage::{self, UsagePattern, DEFAULT_USAGE_PATTERNS};
use indexmap::IndexSet;
use serde::Serialize;
use vetshim_guard::ImportScanner;
use vetshim_types::SourceUnit;

/// Address prefix bundles are served under
pub const DEFAULT_BASE_PATH: &str = "/runtime-deps";

/// Address of a bundle script
///
/// `url_for("charts", "/runtime-deps/")` → `/runtime-deps/charts.js`
#[must_use]
pub fn url_for(name: &str, base_path: &str) -> String {
    format!("{}/{}.js", base_path.trim_end_matches('/'), name)
}

/// Ordered, duplicate-free bundle names
///
/// Always starts with `core`, `utils`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BundleRequirementSet(IndexSet<&'static str>);

impl BundleRequirementSet {
    /// Set holding only the always-loaded bundles
    #[must_use]
    pub fn new() -> Self {
        let mut names = IndexSet::new();
        names.insert(CORE_BUNDLE);
        names.insert(UTILS_BUNDLE);
        Self(names)
    }

    /// Append a bundle if absent
    ///
    /// Returns `true` when the name was new.
    pub fn insert(&mut self, name: &'static str) -> bool {
        self.0.insert(name)
    }

    /// Check membership
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Names in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    /// Number of bundles
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the set holds at least `core` and `utils`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Owned names in insertion order
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl Default for BundleRequirementSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes and resolves bundle requirements
#[derive(Debug, Clone)]
pub struct BundleResolver {
    registry: BundleRegistry,
    usage_patterns: &'static [UsagePattern],
    scanner: ImportScanner,
}

impl BundleResolver {
    /// Resolver over the built-in registry and usage table
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: BundleRegistry::new(),
            usage_patterns: DEFAULT_USAGE_PATTERNS,
            scanner: ImportScanner::new(),
        }
    }

    /// With registry
    ///
    /// # Errors
    /// `RegistryError::UnknownBundle` if the current usage table names a
    /// bundle the registry lacks.
    pub fn with_registry(mut self, registry: BundleRegistry) -> RegistryResult<Self> {
        self.registry = registry;
        self.check_usage_targets()?;
        Ok(self)
    }

    /// With usage table
    ///
    /// # Errors
    /// `RegistryError::UnknownBundle` if a pattern names a bundle the
    /// registry lacks.
    pub fn with_usage_patterns(mut self, patterns: &'static [UsagePattern]) -> RegistryResult<Self> {
        self.usage_patterns = patterns;
        self.check_usage_targets()?;
        Ok(self)
    }

    fn check_usage_targets(&self) -> RegistryResult<()> {
        match self
            .usage_patterns
            .iter()
            .find(|p| !self.registry.contains(p.bundle))
        {
            Some(p) => Err(RegistryError::UnknownBundle(p.bundle.to_string())),
            None => Ok(()),
        }
    }

    /// Registry in use
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    /// Bundles a source needs
    ///
    /// `core` and `utils` first, then owners of imported packages in
    /// source order, then bundles implied by usage fragments and by JSX
    /// tags naming a bundle's component exports.
    #[must_use]
    pub fn analyze_imports(&self, source: &SourceUnit) -> BundleRequirementSet {
        let mut required = BundleRequirementSet::new();

        for reference in self.scanner.package_references(source) {
            if let Some(bundle) = self.registry.owner_of(&reference.specifier) {
                if required.insert(bundle.name) {
                    tracing::debug!(
                        "'{}' requires bundle '{}'",
                        reference.specifier,
                        bundle.name
                    );
                }
            }
        }

        for name in usage::detect(self.usage_patterns, source.text()) {
            if required.insert(name) {
                tracing::debug!("Usage pattern requires bundle '{}'", name);
            }
        }

        for name in usage::detect_component_tags(&self.registry, source.text()) {
            if required.insert(name) {
                tracing::debug!("Component tag requires bundle '{}'", name);
            }
        }

        required
    }

    /// Load instructions for named bundles
    ///
    /// Order follows the input; duplicates are dropped.
    ///
    /// # Errors
    /// `RegistryError::UnknownBundle` for a name the registry lacks.
    pub fn resolve<I, S>(&self, names: I) -> RegistryResult<ResolvedBundles>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = IndexSet::new();
        for name in names {
            let name = name.as_ref();
            let bundle = self
                .registry
                .get(name)
                .ok_or_else(|| RegistryError::UnknownBundle(name.to_string()))?;
            seen.insert(bundle.name);
        }

        let bundles = seen
            .into_iter()
            .filter_map(|name| self.registry.get(name).copied())
            .collect();

        Ok(ResolvedBundles {
            bundles,
            base_path: DEFAULT_BASE_PATH.to_string(),
        })
    }
}

impl Default for BundleResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved bundles with their addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBundles {
    bundles: Vec<Bundle>,
    base_path: String,
}

impl ResolvedBundles {
    /// With base path
    #[inline]
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Base path bundles are served under
    #[inline]
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// All bundles in resolution order
    #[inline]
    #[must_use]
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    /// Bundles loaded before every app
    #[must_use]
    pub fn always(&self) -> Vec<&Bundle> {
        self.by_strategy(LoadStrategy::Always)
    }

    /// Bundles loaded on demand
    #[must_use]
    pub fn lazy(&self) -> Vec<&Bundle> {
        self.by_strategy(LoadStrategy::Lazy)
    }

    fn by_strategy(&self, strategy: LoadStrategy) -> Vec<&Bundle> {
        self.bundles
            .iter()
            .filter(|b| b.load_strategy == strategy)
            .collect()
    }

    /// Address of a bundle under this base path
    #[must_use]
    pub fn url_for(&self, name: &str) -> String {
        url_for(name, &self.base_path)
    }

    /// Serializable load manifest for the host page
    #[must_use]
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.bundles
            .iter()
            .map(|b| ManifestEntry {
                name: b.name.to_string(),
                strategy: b.load_strategy,
                url: self.url_for(b.name),
            })
            .collect()
    }
}

/// One entry of a load manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Bundle name
    pub name: String,
    /// Load strategy
    pub strategy: LoadStrategy,
    /// Script address
    pub url: String,
}
