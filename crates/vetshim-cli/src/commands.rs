//! Subcommand implementations

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use vetshim_bundles::{BundleResolver, ManifestEntry};
use vetshim_guard::SourceGuard;
use vetshim_transform::{BuildOptions, BuildPipeline, BuildResult, CommandTranspiler, PipelineConfig};
use vetshim_types::{BundleError, Diagnostics, SourceUnit};

pub(crate) struct CheckArgs {
    pub(crate) file: PathBuf,
    pub(crate) strict: bool,
    pub(crate) json: bool,
}

pub(crate) struct BundlesArgs {
    pub(crate) file: PathBuf,
    pub(crate) base_path: Option<String>,
    pub(crate) json: bool,
}

pub(crate) struct BuildArgs {
    pub(crate) file: PathBuf,
    pub(crate) app_id: Option<String>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) out: Option<PathBuf>,
    pub(crate) esbuild: PathBuf,
    pub(crate) options: BuildOptions,
    pub(crate) json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    file: String,
    blocked: bool,
    diagnostics: Diagnostics,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BundlesReport {
    file: String,
    required_bundles: Vec<String>,
    manifest: Vec<ManifestEntry>,
}

async fn read_source(path: &Path, app_id: Option<&str>) -> Result<SourceUnit> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let app_id = match app_id {
        Some(id) => id.to_string(),
        None => default_app_id(path),
    };
    Ok(SourceUnit::new(app_id, text))
}

/// File stem, or `app` when the path has none
fn default_app_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("app")
        .to_string()
}

pub(crate) async fn check(args: CheckArgs) -> Result<ExitCode> {
    let unit = read_source(&args.file, None).await?;
    let mut inspection = SourceGuard::new().inspect(&unit);
    if args.strict {
        inspection = inspection.promote_advisories();
    }
    let blocked = inspection.is_blocked();
    tracing::info!(
        "Checked {}: {} error(s), {} warning(s)",
        args.file.display(),
        inspection.errors.len(),
        inspection.warnings.len()
    );

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend_findings(inspection.errors);
    diagnostics.extend_findings(inspection.warnings);

    if args.json {
        let report = CheckReport {
            file: args.file.display().to_string(),
            blocked,
            diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_diagnostics(&args.file, &diagnostics);
        println!(
            "{}: {}",
            args.file.display(),
            if blocked { "BLOCKED" } else { "OK" }
        );
    }

    Ok(exit_code(!blocked))
}

pub(crate) async fn bundles(args: BundlesArgs) -> Result<ExitCode> {
    let unit = read_source(&args.file, None).await?;
    let resolver = BundleResolver::new();
    let required = resolver.analyze_imports(&unit);
    let mut resolved = resolver.resolve(required.iter())?;
    if let Some(base_path) = args.base_path {
        resolved = resolved.with_base_path(base_path);
    }
    let manifest = resolved.manifest();

    if args.json {
        let report = BundlesReport {
            file: args.file.display().to_string(),
            required_bundles: required.to_vec(),
            manifest,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &manifest {
            println!("{:<10} {:<7} {}", entry.name, strategy_label(entry), entry.url);
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) async fn build(args: BuildArgs) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let unit = read_source(&args.file, args.app_id.as_deref()).await?;

    let transpiler = Arc::new(CommandTranspiler::new(&args.esbuild));
    let pipeline = BuildPipeline::new(transpiler).with_config(config);
    let result = pipeline.build_unit(&unit, args.options).await;

    if let (Some(out), Some(payload)) = (&args.out, &result.executable_payload) {
        tokio::fs::write(out, payload)
            .await
            .with_context(|| format!("failed to write {}", out.display()))?;
        tracing::info!("Wrote payload to {}", out.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_diagnostics(&args.file, &result.diagnostics);
        print_summary(&result, args.out.is_none());
    }

    Ok(exit_code(result.success))
}

fn print_summary(result: &BuildResult, print_payload: bool) {
    if !result.success {
        eprintln!("build failed with {} error(s)", result.errors().len());
        return;
    }
    match (&result.executable_payload, print_payload) {
        (Some(payload), true) => println!("{payload}"),
        _ => eprintln!(
            "built {} bytes in {}ms (bundles: {})",
            result.stats.output_size,
            result.stats.build_time_ms,
            result.required_bundles.join(", ")
        ),
    }
}

fn print_diagnostics(file: &Path, diagnostics: &Diagnostics) {
    for error in &diagnostics.errors {
        eprintln!("{}", render("error", file, error));
    }
    for warning in &diagnostics.warnings {
        eprintln!("{}", render("warning", file, warning));
    }
}

fn render(level: &str, file: &Path, diagnostic: &BundleError) -> String {
    let mut out = format!(
        "{}[{}] {}:{}",
        level,
        diagnostic.kind,
        file.display(),
        diagnostic
    );
    if let Some(source) = &diagnostic.source {
        out.push_str(&format!("\n    | {}", source.trim_end()));
    }
    if let Some(suggestion) = &diagnostic.suggestion {
        out.push_str(&format!("\n    = help: {suggestion}"));
    }
    out
}

fn strategy_label(entry: &ManifestEntry) -> &'static str {
    match entry.strategy {
        vetshim_bundles::LoadStrategy::Always => "always",
        vetshim_bundles::LoadStrategy::Lazy => "lazy",
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vetshim_types::FindingKind;

    #[test]
    fn renders_location_source_and_help() {
        let mut error = BundleError::new(FindingKind::ImportBlocked, "Package 'axios' is blocked")
            .with_location(Some(1), Some(19))
            .with_source(Some("import axios from 'axios';".into()));
        error.suggestion = Some("Use sandbox.fetch() for network access".into());

        assert_eq!(
            render("error", Path::new("app.tsx"), &error),
            "error[import_blocked] app.tsx:1:19: Package 'axios' is blocked\n    | import axios from 'axios';\n    = help: Use sandbox.fetch() for network access"
        );
    }

    #[test]
    fn renders_message_only() {
        let warning = BundleError::new(FindingKind::TransformNotice, "Re-export removed");
        assert_eq!(
            render("warning", Path::new("a.jsx"), &warning),
            "warning[transform_notice] a.jsx:Re-export removed"
        );
    }

    #[test]
    fn app_id_from_file_stem() {
        assert_eq!(default_app_id(Path::new("/tmp/habit-tracker.tsx")), "habit-tracker");
        assert_eq!(default_app_id(Path::new("/")), "app");
    }
}
