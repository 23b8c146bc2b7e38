//! vetshim Types
//!
//! Vocabulary shared by every stage of the vetshim pipeline.
//!
//! # Overview
//!
//! - **SourceUnit**: immutable application source plus its owning app id
//! - **ValidationFinding**: result of a pattern or package check
//! - **BundleError** / **Diagnostics**: errors and warnings of a build
//! - **LineIndex**: byte offset → 1-based line/column mapping
//!
//! # Example
//!
//! ```rust
//! use vetshim_types::{FindingKind, SourceUnit, ValidationFinding};
//!
//! let unit = SourceUnit::new("app-1", "eval('1')");
//! let position = unit.line_index().position(0);
//! let finding = ValidationFinding::new(FindingKind::SecurityViolation, "eval is not allowed")
//!     .at(position);
//!
//! assert!(finding.is_blocking());
//! assert_eq!(finding.line, Some(1));
//! ```

#![warn(missing_docs)]

pub mod finding;
pub mod position;
pub mod source;

// Re-exports
pub use finding::{BundleError, Diagnostics, FindingKind, Severity, ValidationFinding};
pub use position::{LineIndex, Position};
pub use source::{AppId, SourceUnit};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with vetshim types
    pub use crate::{
        AppId, BundleError, Diagnostics, FindingKind, Position, Severity, SourceUnit,
        ValidationFinding,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
