//! External transpiler boundary
//!
//! The pipeline never parses JSX or TypeScript itself. It hands the
//! rewritten source to a [`Transpiler`] and maps whatever comes back onto
//! build diagnostics.

pub mod command;

pub use command::CommandTranspiler;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Source dialect handed to the transpiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// JavaScript with JSX
    Jsx,
    /// TypeScript with JSX
    #[default]
    Tsx,
}

impl Dialect {
    /// Loader name understood by esbuild-compatible tools
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Jsx => "jsx",
            Dialect::Tsx => "tsx",
        }
    }
}

/// Output module format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// ES module syntax left as is
    #[default]
    Esm,
    /// Immediately invoked function expression
    Iife,
    /// CommonJS
    Cjs,
}

impl ModuleFormat {
    /// Format name understood by esbuild-compatible tools
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleFormat::Esm => "esm",
            ModuleFormat::Iife => "iife",
            ModuleFormat::Cjs => "cjs",
        }
    }
}

/// One transpile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileRequest {
    /// Rewritten source, line-aligned with the original
    pub code: String,
    /// Input dialect
    pub dialect: Dialect,
    /// Language target, e.g. `es2020`
    pub target: String,
    /// Output module format
    pub module_format: ModuleFormat,
    /// Minify whitespace and syntax; top-level names are kept
    pub minify: bool,
    /// Emit an inline source map
    pub sourcemap: bool,
}

impl TranspileRequest {
    /// Request with default settings
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            dialect: Dialect::default(),
            target: crate::config::DEFAULT_TARGET.to_string(),
            module_format: ModuleFormat::default(),
            minify: false,
            sourcemap: false,
        }
    }
}

/// Diagnostic reported by the transpiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranspileMessage {
    /// Message text
    pub text: String,
    /// 1-based line
    pub line: Option<u32>,
    /// 1-based column
    pub column: Option<u32>,
    /// Offending line
    pub line_text: Option<String>,
}

impl TranspileMessage {
    /// Message without location
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            line: None,
            column: None,
            line_text: None,
        }
    }

    /// With location
    #[inline]
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// With offending line
    #[inline]
    #[must_use]
    pub fn with_line_text(mut self, line_text: impl Into<String>) -> Self {
        self.line_text = Some(line_text.into());
        self
    }
}

/// Successful transpile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOutput {
    /// Plain JavaScript
    pub code: String,
    /// Non-fatal diagnostics
    pub warnings: Vec<TranspileMessage>,
}

impl TranspileOutput {
    /// Output without warnings
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            warnings: Vec::new(),
        }
    }
}

/// Failed transpile
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transpile failed with {} error(s)", messages.len())]
pub struct TranspileFailure {
    /// Fatal diagnostics, at least one
    pub messages: Vec<TranspileMessage>,
}

impl TranspileFailure {
    /// Failure carrying a single message
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            messages: vec![TranspileMessage::new(text)],
        }
    }
}

impl From<TranspileMessage> for TranspileFailure {
    fn from(message: TranspileMessage) -> Self {
        Self {
            messages: vec![message],
        }
    }
}

/// JSX/TypeScript to JavaScript compiler
#[async_trait]
pub trait Transpiler: Send + Sync {
    /// Transpile one source
    async fn transpile(&self, request: TranspileRequest) -> Result<TranspileOutput, TranspileFailure>;

    /// Get transpiler name
    fn name(&self) -> &str {
        "transpiler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let request = TranspileRequest::new("const a = <div />;");
        assert_eq!(request.dialect, Dialect::Tsx);
        assert_eq!(request.module_format, ModuleFormat::Esm);
        assert_eq!(request.target, "es2020");
        assert!(!request.minify);
    }

    #[test]
    fn failure_display_counts_messages() {
        let failure = TranspileFailure {
            messages: vec![
                TranspileMessage::new("a").at(1, 2),
                TranspileMessage::new("b"),
            ],
        };
        assert_eq!(failure.to_string(), "transpile failed with 2 error(s)");
    }

    #[test]
    fn dialect_and_format_deserialize_lowercase() {
        let dialect: Dialect = serde_json::from_str("\"jsx\"").unwrap();
        let format: ModuleFormat = serde_json::from_str("\"iife\"").unwrap();
        assert_eq!(dialect, Dialect::Jsx);
        assert_eq!(format.as_str(), "iife");
    }
}
