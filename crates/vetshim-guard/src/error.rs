//! Error types for the guard layer
//!
//! Checks themselves never fail; they report findings. Errors only arise
//! while compiling a rule table.

/// Guard construction errors
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Rule pattern does not compile
    #[error("invalid pattern for rule '{id}': {source}")]
    InvalidPattern {
        /// Rule identifier
        id: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// Two rules share an identifier
    #[error("duplicate rule id: '{0}'")]
    DuplicateRule(String),
}

impl GuardError {
    /// Create invalid pattern error for rule
    pub fn invalid_pattern(id: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            id: id.into(),
            source,
        }
    }
}

/// Result type alias for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_display() {
        let regex_err = regex::Regex::new("(").unwrap_err();
        let err = GuardError::invalid_pattern("broken", regex_err);
        assert!(err.to_string().starts_with("invalid pattern for rule 'broken'"));
    }

    #[test]
    fn duplicate_rule_display() {
        let err = GuardError::DuplicateRule("eval-call".to_string());
        assert_eq!(err.to_string(), "duplicate rule id: 'eval-call'");
    }
}
