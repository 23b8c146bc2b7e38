//! Source units and application identifiers
//!
//! A [`SourceUnit`] is the immutable input to every stage of the pipeline:
//! the raw application text plus the opaque id of the app it belongs to.

use crate::position::LineIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque application identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Create application id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AppId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AppId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Raw application source text plus its owner
///
/// Cloning is cheap; the text is shared and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    app_id: AppId,
    text: Arc<str>,
}

impl SourceUnit {
    /// Create source unit
    #[inline]
    #[must_use]
    pub fn new(app_id: impl Into<AppId>, text: impl Into<Arc<str>>) -> Self {
        Self {
            app_id: app_id.into(),
            text: text.into(),
        }
    }

    /// Create source unit with an anonymous owner
    ///
    /// Handy for pure checks where the app id is irrelevant.
    #[inline]
    #[must_use]
    pub fn anonymous(text: impl Into<Arc<str>>) -> Self {
        Self::new(AppId::new("anonymous"), text)
    }

    /// Owning application
    #[inline]
    #[must_use]
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Full source text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Size of the source in bytes
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    /// Build a line index for offset → position lookups
    #[must_use]
    pub fn line_index(&self) -> LineIndex<'_> {
        LineIndex::new(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_unit_accessors() {
        let unit = SourceUnit::new("app-1", "const a = 1;");
        assert_eq!(unit.app_id().as_str(), "app-1");
        assert_eq!(unit.text(), "const a = 1;");
        assert_eq!(unit.byte_len(), 12);
    }

    #[test]
    fn clone_shares_text() {
        let unit = SourceUnit::anonymous("x");
        let cloned = unit.clone();
        assert_eq!(unit, cloned);
        assert_eq!(cloned.app_id().to_string(), "anonymous");
    }

    #[test]
    fn app_id_serializes_transparently() {
        let id = AppId::new("tracker");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"tracker\"");
    }
}
