use chrono::Duration;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Write;
use std::sync::Arc;
use vetshim_bridge::Clock;
use vetshim_bundles::BundleRegistry;
use vetshim_test_utils::{
    fixed_clock, setup_pipeline, CountingTranspiler, FailingTranspiler, PanickingTranspiler,
    ADVISORY_SOURCE, BLOCKED_SOURCE, DASHBOARD_SOURCE,
};
use vetshim_transform::{
    strip_directives, strip_timestamp_lines, BuildOptions, Dialect, ImportRewriter,
    PipelineConfig,
};
use vetshim_types::FindingKind;

#[tokio::test]
async fn test_blocked_source_never_reaches_transpiler() {
    let transpiler = CountingTranspiler::new();
    let pipeline = setup_pipeline(transpiler.clone());

    let result = pipeline
        .build(BLOCKED_SOURCE, "app-1", BuildOptions::default())
        .await;

    assert!(!result.success);
    assert!(result.executable_payload.is_none());
    assert!(result.required_bundles.is_empty());
    assert_eq!(transpiler.calls(), 0);

    let kinds: Vec<_> = result.errors().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&FindingKind::SecurityViolation));
    assert!(kinds.contains(&FindingKind::ImportBlocked));
}

#[tokio::test]
async fn test_blocked_import_sharing_a_line_is_rejected() {
    let transpiler = CountingTranspiler::new();
    let pipeline = setup_pipeline(transpiler.clone());

    let result = pipeline
        .build(
            "import React from 'react'; import fs from 'fs';\nexport default function App() { return null; }\n",
            "a",
            BuildOptions::default(),
        )
        .await;

    assert!(!result.success);
    assert_eq!(transpiler.calls(), 0);
    assert_eq!(result.errors()[0].kind, FindingKind::ImportBlocked);
    assert_eq!(result.errors()[0].column, Some(44));
}

#[tokio::test]
async fn test_dashboard_builds_with_bundles_and_bindings() {
    let transpiler = CountingTranspiler::new();
    let pipeline = setup_pipeline(transpiler.clone());

    let result = pipeline
        .build(DASHBOARD_SOURCE, "dash", BuildOptions::default())
        .await;

    assert!(result.success, "{:?}", result.diagnostics);
    assert!(result.warnings().is_empty());
    assert_eq!(transpiler.calls(), 1);
    assert_eq!(result.required_bundles, vec!["core", "utils", "charts", "icons"]);

    let request = transpiler.last_request().unwrap();
    assert_eq!(request.code.lines().count(), DASHBOARD_SOURCE.lines().count());
    assert!(!request.code.contains("import "));
    assert!(!request.code.contains("use client"));
    assert!(request.code.contains("function Dashboard()"));

    let payload = result.executable_payload.unwrap();
    assert!(payload.starts_with("// @vetshim app=dash bundles=core,utils,charts,icons\n"));
    assert!(payload.contains(r#"const { React, useState, useMemo } = __vs.bundle("core");"#));
    assert!(payload.contains(r#"LineChart = __vs.inert.component"#));
    assert!(payload.contains(r#"const { Plus = __vs.inert.component, Trash2 = __vs.inert.component } = __vs.bundle("icons");"#));
    assert!(payload.contains(r#"const { format = __vs.inert.fn } = __vs.bundle("utils");"#));
    assert!(payload.contains("typeof Dashboard === 'undefined'"));
    assert_eq!(result.stats.input_size, DASHBOARD_SOURCE.len());
    assert_eq!(result.stats.output_size, payload.len());
}

#[tokio::test]
async fn test_unimported_icon_tag_is_bound_from_its_bundle() {
    let pipeline = setup_pipeline(CountingTranspiler::new());
    let result = pipeline
        .build(
            "export default function App() {\n  return <button><Plus size={16} /></button>;\n}\n",
            "a",
            BuildOptions::default(),
        )
        .await;

    assert!(result.success, "{:?}", result.diagnostics);
    assert_eq!(result.required_bundles, vec!["core", "utils", "icons"]);
    assert!(result
        .executable_payload
        .unwrap()
        .contains(r#"const { Plus = __vs.inert.component } = __vs.bundle("icons");"#));
}

#[tokio::test]
async fn test_identical_input_is_idempotent_modulo_timestamp() {
    let clock = fixed_clock();
    let pipeline = setup_pipeline(CountingTranspiler::new())
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

    let first = pipeline
        .build(DASHBOARD_SOURCE, "dash", BuildOptions::default())
        .await;
    clock.advance(Duration::minutes(5));
    let second = pipeline
        .build(DASHBOARD_SOURCE, "dash", BuildOptions::default())
        .await;

    let first_payload = first.executable_payload.unwrap();
    let second_payload = second.executable_payload.unwrap();
    assert_ne!(first_payload, second_payload);
    assert_eq!(
        strip_timestamp_lines(&first_payload),
        strip_timestamp_lines(&second_payload)
    );
    assert_eq!(first.fingerprint, second.fingerprint);
    assert!(first_payload.contains("// @built-at 2024-01-01T00:00:00.000Z"));
}

#[tokio::test]
async fn test_transpile_errors_point_at_user_lines() {
    let source = "import { useState } from 'react';\n\nconst a = x y;\nexport default function App() { return null; }\n";
    let pipeline = setup_pipeline(FailingTranspiler::syntax_error(3, 13));

    let result = pipeline.build(source, "a", BuildOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.required_bundles, vec!["core", "utils"]);
    let error = &result.errors()[0];
    assert_eq!(error.kind, FindingKind::TranspileFailure);
    assert_eq!(error.line, Some(3));
    assert_eq!(error.column, Some(13));
    assert_eq!(error.source.as_deref(), Some("const a = x y;"));
}

#[tokio::test]
async fn test_transpiler_panic_becomes_diagnostic() {
    let pipeline = setup_pipeline(Arc::new(PanickingTranspiler));

    let result = pipeline
        .build(DASHBOARD_SOURCE, "a", BuildOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, FindingKind::TranspileFailure);
    assert!(result.errors()[0].message.contains("transpiler exploded"));
}

#[tokio::test]
async fn test_advisories_warn_unless_strict() {
    let transpiler = CountingTranspiler::new();
    let pipeline = setup_pipeline(transpiler.clone());

    let relaxed = pipeline
        .build(ADVISORY_SOURCE, "a", BuildOptions::default())
        .await;
    assert!(relaxed.success);
    let kinds: Vec<_> = relaxed.warnings().iter().map(|w| w.kind).collect();
    assert!(kinds.contains(&FindingKind::ImportUnvetted));
    assert!(kinds.contains(&FindingKind::DiscouragedPattern));
    assert!(kinds.contains(&FindingKind::TransformNotice));
    assert!(relaxed
        .executable_payload
        .unwrap()
        .contains("const confetti = __vs.inert.fn;"));

    let strict = pipeline
        .build(ADVISORY_SOURCE, "a", BuildOptions::default().with_strict(true))
        .await;
    assert!(!strict.success);
    assert!(strict.warnings().is_empty());
    assert_eq!(transpiler.calls(), 1);
}

#[tokio::test]
async fn test_config_file_drives_pipeline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "base_path = \"/static/deps/\"\ndialect = \"jsx\"\nroot_element_id = \"app\"\nstrict = true"
    )
    .unwrap();
    let config = PipelineConfig::load(file.path()).unwrap();

    let transpiler = CountingTranspiler::new();
    let pipeline = setup_pipeline(transpiler.clone()).with_config(config);

    let blocked = pipeline
        .build(ADVISORY_SOURCE, "a", BuildOptions::default())
        .await;
    assert!(!blocked.success);

    let built = pipeline
        .build(DASHBOARD_SOURCE, "a", BuildOptions::default().with_minify(true))
        .await;
    assert!(built.success);
    let request = transpiler.last_request().unwrap();
    assert_eq!(request.dialect, Dialect::Jsx);
    assert!(request.minify);
    assert!(built
        .executable_payload
        .unwrap()
        .contains(r#"document.getElementById("app")"#));

    let manifest = pipeline.manifest(&built.required_bundles).unwrap();
    assert_eq!(manifest[2].url, "/static/deps/charts.js");
}

#[tokio::test]
async fn test_build_result_json_shape() {
    let pipeline = setup_pipeline(CountingTranspiler::new());
    let result = pipeline
        .build(BLOCKED_SOURCE, "a", BuildOptions::default())
        .await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["diagnostics"]["errors"].as_array().unwrap().len() >= 2);
    assert!(json.get("executablePayload").is_none());
    assert!(json["stats"]["buildTimeMs"].is_u64());
}

fn source_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "'use client';",
        "import React from 'react';",
        "import { LineChart,\n  Line } from 'recharts';",
        "import './styles.css';",
        "export { a as default };",
        "export const a = 1;",
        "const b = await import('papaparse');",
        "export default function App() {}",
        "",
        "  return <div />;",
    ])
}

proptest! {
    #[test]
    fn prop_rewrite_preserves_line_count(lines in prop::collection::vec(source_line(), 0..20)) {
        let text = lines.join("\n");
        let registry = BundleRegistry::new();
        let stripped = strip_directives(&text);
        let rewrite = ImportRewriter::new(&registry).rewrite(&stripped, "App");

        prop_assert_eq!(rewrite.code.matches('\n').count(), text.matches('\n').count());
        prop_assert!(!rewrite.code.contains("import "));
    }
}
