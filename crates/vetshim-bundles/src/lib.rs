//! vetshim Bundles
//!
//! Maps package identifiers to pre-built runtime bundles and computes the
//! minimal bundle set a source needs.
//!
//! # Overview
//!
//! - **BundleRegistry**: validated static table of bundles
//! - **BundleResolver**: per-source requirement analysis and resolution
//! - **BundleRequirementSet**: ordered names, `core` and `utils` first
//! - **ResolvedBundles**: eager/lazy split, addresses, load manifest
//!
//! # Example
//!
//! ```rust
//! use vetshim_bundles::BundleResolver;
//! use vetshim_types::SourceUnit;
//!
//! let resolver = BundleResolver::new();
//! let source = SourceUnit::new("app-1", "import { LineChart } from 'recharts';");
//! let required = resolver.analyze_imports(&source);
//! assert_eq!(required.to_vec(), vec!["core", "utils", "charts"]);
//!
//! let resolved = resolver.resolve(required.iter()).unwrap();
//! assert_eq!(resolved.lazy().len(), 1);
//! assert_eq!(resolved.url_for("charts"), "/runtime-deps/charts.js");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod resolver;
pub mod usage;

// Re-exports
pub use error::{RegistryError, RegistryResult};
pub use registry::{
    package_matches, Bundle, BundleExport, BundleRegistry, ExportKind, LoadStrategy,
    CORE_BUNDLE, DEFAULT_BUNDLES, UTILS_BUNDLE,
};
pub use resolver::{
    url_for, BundleRequirementSet, BundleResolver, ManifestEntry, ResolvedBundles,
    DEFAULT_BASE_PATH,
};
pub use usage::{UsagePattern, DEFAULT_USAGE_PATTERNS};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for bundle resolution
    pub use crate::{
        Bundle, BundleRegistry, BundleRequirementSet, BundleResolver, ExportKind, LoadStrategy,
        ResolvedBundles,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
