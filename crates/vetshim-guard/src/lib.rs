//! vetshim Guard
//!
//! Source-level policy for untrusted application code.
//!
//! # Overview
//!
//! - **PatternValidator**: regex rule table for disallowed browser APIs
//! - **ImportScanner**: extracts module references from source text
//! - **PackagePolicy**: allow/block lists over normalized package ids
//! - **SourceGuard**: both checks combined, findings split by severity
//!
//! # Example
//!
//! ```rust
//! use vetshim_guard::{PackagePolicy, SourceGuard};
//! use vetshim_types::SourceUnit;
//!
//! let source = SourceUnit::new("app-1", "import axios from 'axios';\nlocalStorage.clear();");
//! let inspection = SourceGuard::new().inspect(&source);
//!
//! assert_eq!(inspection.errors.len(), 2);
//! assert!(PackagePolicy::new().is_blocked("axios"));
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod guard;
pub mod imports;
pub mod patterns;
pub mod policy;

// Re-exports
pub use error::{GuardError, GuardResult};
pub use guard::{Inspection, SourceGuard};
pub use imports::{ImportKind, ImportReference, ImportScanner, SpecifierKind};
pub use patterns::{PatternCategory, PatternRule, PatternValidator, DEFAULT_RULES, SANCTIONED_FETCH};
pub use policy::{
    normalize, Disposition, PackagePolicy, PackageRule, PolicyReport, ALLOWED_PACKAGES,
    BLOCKED_PACKAGES, RUNTIME_PACKAGES,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for source checks
    pub use crate::{
        Disposition, ImportScanner, Inspection, PackagePolicy, PatternValidator, SourceGuard,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
