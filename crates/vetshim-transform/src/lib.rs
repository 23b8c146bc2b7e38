//! vetshim Transform
//!
//! Turns vetted application source into a self-contained payload for the
//! sandbox.
//!
//! # Overview
//!
//! - **BuildPipeline**: validate, resolve, rewrite, shim, transpile, assemble
//! - **ImportRewriter**: removes module syntax without moving lines
//! - **ShimGenerator**: binds needed names to loaded runtime bundles
//! - **Transpiler**: async boundary to an external JSX/TypeScript compiler
//! - **PipelineConfig**: TOML-loadable settings
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use vetshim_transform::{
//!     BuildOptions, BuildPipeline, TranspileFailure, TranspileOutput, TranspileRequest,
//!     Transpiler,
//! };
//!
//! struct PassThrough;
//!
//! #[async_trait]
//! impl Transpiler for PassThrough {
//!     async fn transpile(
//!         &self,
//!         request: TranspileRequest,
//!     ) -> Result<TranspileOutput, TranspileFailure> {
//!         Ok(TranspileOutput::new(request.code))
//!     }
//! }
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let pipeline = BuildPipeline::new(Arc::new(PassThrough));
//! let result = runtime.block_on(pipeline.build(
//!     "import { LineChart } from 'recharts';\nexport default function App() { return null; }\n",
//!     "app-1",
//!     BuildOptions::default(),
//! ));
//!
//! assert!(result.success);
//! assert_eq!(result.required_bundles, vec!["core", "utils", "charts"]);
//! assert!(result.executable_payload.unwrap().contains("__vs.bundle(\"charts\")"));
//! ```

#![warn(missing_docs)]

pub mod assemble;
pub mod config;
pub mod directives;
pub mod error;
pub mod pipeline;
pub mod rewrite;
pub mod shim;
pub mod transpiler;

// Re-exports
pub use assemble::{assemble, fingerprint, strip_timestamp_lines, PayloadParts, TIMESTAMP_MARKER};
pub use config::{
    BuildOptions, PipelineConfig, DEFAULT_ENTRY_COMPONENT, DEFAULT_ROOT_ELEMENT_ID, DEFAULT_TARGET,
};
pub use directives::strip_directives;
pub use error::{TransformError, TransformResult};
pub use pipeline::{BuildPipeline, BuildResult, BuildStats};
pub use rewrite::{ImportBinding, ImportRewriter, PackageImport, Rewrite, ENTRY_BINDING};
pub use shim::{fallback_for, ShimBinding, ShimGenerator, ShimPlan, DEPS_GLOBAL};
pub use transpiler::{
    CommandTranspiler, Dialect, ModuleFormat, TranspileFailure, TranspileMessage,
    TranspileOutput, TranspileRequest, Transpiler,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building payloads
    pub use crate::{
        BuildOptions, BuildPipeline, BuildResult, PipelineConfig, TranspileFailure,
        TranspileOutput, TranspileRequest, Transpiler,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
