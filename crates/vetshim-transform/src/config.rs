//! Pipeline configuration

use crate::error::{TransformError, TransformResult};
use crate::transpiler::{Dialect, ModuleFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vetshim_bundles::DEFAULT_BASE_PATH;

/// Default language target
pub const DEFAULT_TARGET: &str = "es2020";

/// Default id of the mount container
pub const DEFAULT_ROOT_ELEMENT_ID: &str = "root";

/// Entry component used when the source has no default export
pub const DEFAULT_ENTRY_COMPONENT: &str = "App";

/// Build pipeline configuration
///
/// Every field is optional in TOML:
///
/// ```toml
/// base_path = "/static/deps"
/// dialect = "jsx"
/// strict = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Address prefix bundles are served under
    pub base_path: String,
    /// Transpiler language target
    pub target: String,
    /// Source dialect
    pub dialect: Dialect,
    /// Transpiler output format
    pub module_format: ModuleFormat,
    /// Id of the element the app mounts into
    pub root_element_id: String,
    /// Entry component when the source has no default export
    pub default_entry_component: String,
    /// Promote advisory findings to errors for every build
    pub strict: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            target: DEFAULT_TARGET.to_string(),
            dialect: Dialect::default(),
            module_format: ModuleFormat::default(),
            root_element_id: DEFAULT_ROOT_ELEMENT_ID.to_string(),
            default_entry_component: DEFAULT_ENTRY_COMPONENT.to_string(),
            strict: false,
        }
    }
}

impl PipelineConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigParse` for malformed TOML or unknown keys, `InvalidConfig`
    /// for values that fail validation.
    pub fn from_toml_str(text: &str) -> TransformResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigRead` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> TransformResult<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| TransformError::config_read(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Check field values
    ///
    /// # Errors
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> TransformResult<()> {
        if self.target.trim().is_empty() {
            return Err(TransformError::invalid_config("target", "must not be empty"));
        }
        if self.root_element_id.is_empty()
            || self.root_element_id.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        {
            return Err(TransformError::invalid_config(
                "root_element_id",
                "must be a non-empty id without quotes or whitespace",
            ));
        }
        if !is_identifier(&self.default_entry_component) {
            return Err(TransformError::invalid_config(
                "default_entry_component",
                format!("'{}' is not a JavaScript identifier", self.default_entry_component),
            ));
        }
        Ok(())
    }

    /// With base path
    #[inline]
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// With target
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// With dialect
    #[inline]
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// With module format
    #[inline]
    #[must_use]
    pub fn with_module_format(mut self, module_format: ModuleFormat) -> Self {
        self.module_format = module_format;
        self
    }

    /// With root element id
    #[inline]
    #[must_use]
    pub fn with_root_element_id(mut self, id: impl Into<String>) -> Self {
        self.root_element_id = id.into();
        self
    }

    /// With default entry component
    #[inline]
    #[must_use]
    pub fn with_default_entry_component(mut self, name: impl Into<String>) -> Self {
        self.default_entry_component = name.into();
        self
    }

    /// With strict
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Per-build options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    /// Minify transpiler output
    pub minify: bool,
    /// Emit an inline source map
    pub source_maps: bool,
    /// Promote advisory findings to errors
    pub strict: bool,
}

impl BuildOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With minify
    #[inline]
    #[must_use]
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// With source maps
    #[inline]
    #[must_use]
    pub fn with_source_maps(mut self, source_maps: bool) -> Self {
        self.source_maps = source_maps;
        self
    }

    /// With strict
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
