//! Error types for the bundle registry
//!
//! Registry construction rejects tables that would make package ownership
//! ambiguous; resolution rejects names the registry does not know.

/// Bundle registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A package identifier would belong to two bundles
    #[error("package '{package}' is claimed by both '{first}' and '{second}'")]
    AmbiguousPackage {
        /// Package identifier
        package: String,
        /// Bundle registered first
        first: String,
        /// Bundle registered second
        second: String,
    },

    /// Two bundles share a name
    #[error("duplicate bundle name: '{0}'")]
    DuplicateBundle(String),

    /// Name not present in the registry
    #[error("unknown bundle: '{0}'")]
    UnknownBundle(String),

    /// Registry lacks a bundle every build needs
    #[error("registry is missing required bundle '{0}'")]
    MissingRequired(String),
}

impl RegistryError {
    /// Create ambiguous package error
    pub fn ambiguous(
        package: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::AmbiguousPackage {
            package: package.into(),
            first: first.into(),
            second: second.into(),
        }
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
