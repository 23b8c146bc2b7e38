//! Build pipeline
//!
//! Orchestrates one build from raw source to executable payload:
//!
//! ```text
//! Validate → (fail fast) → Resolve Bundles → Strip Directives/Imports
//!          → Generate Shim Prelude → Invoke Transpiler → Assemble → Return
//! ```
//!
//! A build never returns an error. Every problem, including a transpiler
//! that panics, ends up as a diagnostic on the [`BuildResult`]. Builds share
//! no mutable state, so one pipeline can serve concurrent requests.

use crate::assemble::{assemble, fingerprint, PayloadParts};
use crate::config::{BuildOptions, PipelineConfig};
use crate::directives::strip_directives;
use crate::error::TransformResult;
use crate::rewrite::ImportRewriter;
use crate::shim::ShimGenerator;
use crate::transpiler::{
    TranspileFailure, TranspileMessage, TranspileOutput, TranspileRequest, Transpiler,
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use vetshim_bridge::{Clock, SystemClock};
use vetshim_bundles::{BundleResolver, ManifestEntry};
use vetshim_guard::SourceGuard;
use vetshim_types::{AppId, BundleError, Diagnostics, FindingKind, SourceUnit};

/// Size and timing of one build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    /// Source size in bytes
    pub input_size: usize,
    /// Payload size in bytes, 0 on failure
    pub output_size: usize,
    /// Wall-clock build time
    pub build_time_ms: u64,
}

/// Outcome of one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// Whether a payload was produced
    pub success: bool,
    /// Script to hand to the sandbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_payload: Option<String>,
    /// Errors and warnings
    pub diagnostics: Diagnostics,
    /// Bundles the host must load, in order
    pub required_bundles: Vec<String>,
    /// Size and timing
    pub stats: BuildStats,
    /// blake3 digest of the payload without timestamp lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl BuildResult {
    fn failed(diagnostics: Diagnostics, required_bundles: Vec<String>, stats: BuildStats) -> Self {
        Self {
            success: false,
            executable_payload: None,
            diagnostics,
            required_bundles,
            stats,
            fingerprint: None,
        }
    }

    /// Blocking diagnostics
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[BundleError] {
        &self.diagnostics.errors
    }

    /// Advisory diagnostics
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[BundleError] {
        &self.diagnostics.warnings
    }
}

/// Source-to-payload build pipeline
pub struct BuildPipeline {
    config: PipelineConfig,
    guard: SourceGuard,
    resolver: BundleResolver,
    transpiler: Arc<dyn Transpiler>,
    clock: Arc<dyn Clock>,
}

impl BuildPipeline {
    /// Pipeline with default config, guard and registry
    #[must_use]
    pub fn new(transpiler: Arc<dyn Transpiler>) -> Self {
        Self {
            config: PipelineConfig::default(),
            guard: SourceGuard::new(),
            resolver: BundleResolver::new(),
            transpiler,
            clock: Arc::new(SystemClock),
        }
    }

    /// With config
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// With guard
    #[inline]
    #[must_use]
    pub fn with_guard(mut self, guard: SourceGuard) -> Self {
        self.guard = guard;
        self
    }

    /// With resolver
    #[inline]
    #[must_use]
    pub fn with_resolver(mut self, resolver: BundleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// With clock for the `@built-at` header
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Bundle resolver
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &BundleResolver {
        &self.resolver
    }

    /// Load manifest for a build's required bundles under the configured base path
    ///
    /// # Errors
    /// `TransformError::Registry` for names the registry lacks.
    pub fn manifest(&self, bundles: &[String]) -> TransformResult<Vec<ManifestEntry>> {
        Ok(self
            .resolver
            .resolve(bundles)?
            .with_base_path(self.config.base_path.clone())
            .manifest())
    }

    /// Build a payload from raw source
    pub async fn build(
        &self,
        source: &str,
        app_id: impl Into<AppId>,
        options: BuildOptions,
    ) -> BuildResult {
        let unit = SourceUnit::new(app_id, source);
        self.build_unit(&unit, options).await
    }

    /// Build a payload from a source unit
    #[tracing::instrument(
        name = "build",
        skip_all,
        fields(app_id = %unit.app_id(), bytes = unit.byte_len())
    )]
    pub async fn build_unit(&self, unit: &SourceUnit, options: BuildOptions) -> BuildResult {
        let started = Instant::now();
        let mut diagnostics = Diagnostics::new();
        let mut stats = BuildStats {
            input_size: unit.byte_len(),
            ..BuildStats::default()
        };

        // Validate
        let mut inspection = self.guard.inspect(unit);
        if options.strict || self.config.strict {
            inspection = inspection.promote_advisories();
        }
        let blocked = inspection.is_blocked();
        diagnostics.extend_findings(inspection.errors);
        diagnostics.extend_findings(inspection.warnings);
        if blocked {
            stats.build_time_ms = elapsed_ms(started);
            tracing::info!(
                "Build rejected for {}: {} blocking finding(s)",
                unit.app_id(),
                diagnostics.errors.len()
            );
            return BuildResult::failed(diagnostics, Vec::new(), stats);
        }

        // Resolve bundles
        let required = self.resolver.analyze_imports(unit);
        let required_bundles = required.to_vec();
        tracing::debug!("Required bundles: {}", required_bundles.join(", "));

        // Strip directives and imports
        let registry = self.resolver.registry();
        let stripped = strip_directives(unit.text());
        let rewrite = ImportRewriter::new(registry)
            .rewrite(&stripped, &self.config.default_entry_component);
        for notice in &rewrite.notices {
            diagnostics.warning(notice.clone().into());
        }

        // Shim prelude
        let plan = ShimGenerator::new(registry).plan(&required, &rewrite);

        // Transpile
        let request = TranspileRequest {
            code: rewrite.code.clone(),
            dialect: self.config.dialect,
            target: self.config.target.clone(),
            module_format: self.config.module_format,
            minify: options.minify,
            sourcemap: options.source_maps,
        };
        let output = match self.transpile(request).await {
            Ok(output) => output,
            Err(failure) => {
                tracing::warn!(
                    "Transpile failed for {}: {} error(s)",
                    unit.app_id(),
                    failure.messages.len()
                );
                for message in failure.messages {
                    diagnostics.error(to_bundle_error(unit, message, FindingKind::TranspileFailure));
                }
                stats.build_time_ms = elapsed_ms(started);
                return BuildResult::failed(diagnostics, required_bundles, stats);
            }
        };
        for warning in output.warnings {
            diagnostics.warning(to_bundle_error(unit, warning, FindingKind::TransformNotice));
        }

        // Assemble
        let core_block = plan.core_block();
        let prelude = plan.prelude();
        let payload = assemble(&PayloadParts {
            app_id: unit.app_id().as_str(),
            bundles: &required_bundles,
            built_at: self.clock.now(),
            core_block: &core_block,
            prelude: &prelude,
            code: &output.code,
            entry_component: &rewrite.entry_component,
            root_element_id: &self.config.root_element_id,
        });

        stats.output_size = payload.len();
        stats.build_time_ms = elapsed_ms(started);
        tracing::info!(
            "Built {} ({} bytes → {} bytes, {} warning(s)) in {}ms",
            unit.app_id(),
            stats.input_size,
            stats.output_size,
            diagnostics.warnings.len(),
            stats.build_time_ms
        );

        BuildResult {
            success: true,
            fingerprint: Some(fingerprint(&payload)),
            executable_payload: Some(payload),
            diagnostics,
            required_bundles,
            stats,
        }
    }

    /// The single awaited step; panics become failures
    async fn transpile(&self, request: TranspileRequest) -> Result<TranspileOutput, TranspileFailure> {
        tracing::debug!(
            "Invoking {} transpiler on {} bytes",
            self.transpiler.name(),
            request.code.len()
        );
        match AssertUnwindSafe(self.transpiler.transpile(request))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::warn!("Transpiler panicked: {}", reason);
                Err(TranspileFailure::message(format!("Transpiler panicked: {reason}")))
            }
        }
    }
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("config", &self.config)
            .field("transpiler", &self.transpiler.name())
            .finish_non_exhaustive()
    }
}

/// Transpiler lines match source lines, so the user's own line is quoted
fn to_bundle_error(unit: &SourceUnit, message: TranspileMessage, kind: FindingKind) -> BundleError {
    let source = message.line_text.or_else(|| {
        message
            .line
            .and_then(|line| unit.line_index().line_text(line))
            .map(str::to_string)
    });
    BundleError::new(kind, message.text)
        .with_location(message.line, message.column)
        .with_source(source)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use async_trait::async_trait;
    use vetshim_bundles::RegistryError;

    /// Echoes its input, recording nothing
    struct Echo;

    #[async_trait]
    impl Transpiler for Echo {
        async fn transpile(
            &self,
            request: TranspileRequest,
        ) -> Result<TranspileOutput, TranspileFailure> {
            Ok(TranspileOutput::new(request.code))
        }
    }

    fn pipeline() -> BuildPipeline {
        BuildPipeline::new(Arc::new(Echo))
    }

    #[test]
    fn manifest_rejects_unknown_bundles() {
        let err = pipeline()
            .manifest(&["core".to_string(), "maps".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::Registry(RegistryError::UnknownBundle(ref name)) if name == "maps"
        ));
    }

    #[tokio::test]
    async fn clean_source_builds() {
        let result = pipeline()
            .build("export default function App() { return null; }\n", "a", BuildOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(result.required_bundles, vec!["core", "utils"]);
        let payload = result.executable_payload.unwrap();
        assert!(payload.contains("function App() { return null; }"));
        assert_eq!(result.stats.output_size, payload.len());
        assert!(result.fingerprint.is_some());
    }

    #[tokio::test]
    async fn blocked_source_has_no_payload_or_bundles() {
        let result = pipeline()
            .build("eval('1');\n", "a", BuildOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.executable_payload.is_none());
        assert!(result.required_bundles.is_empty());
        assert_eq!(result.errors()[0].kind, FindingKind::SecurityViolation);
    }

    #[test]
    fn panic_messages() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(text.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = BuildResult::failed(Diagnostics::new(), vec!["core".into()], BuildStats {
            input_size: 3,
            output_size: 0,
            build_time_ms: 1,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["requiredBundles"][0], "core");
        assert_eq!(json["stats"]["inputSize"], 3);
        assert_eq!(json["stats"]["buildTimeMs"], 1);
        assert!(json.get("executablePayload").is_none());
        assert!(json.get("fingerprint").is_none());
    }
}
