use proptest::prelude::*;
use vetshim_bundles::{BundleResolver, LoadStrategy, DEFAULT_BUNDLES};
use vetshim_guard::PackagePolicy;
use vetshim_types::SourceUnit;

#[test]
fn test_every_registry_package_is_allowed() {
    let policy = PackagePolicy::new();
    for bundle in DEFAULT_BUNDLES {
        for pkg in bundle.packages {
            assert!(policy.is_allowed(pkg), "{pkg} in '{}' is not allowed", bundle.name);
        }
    }
}

#[test]
fn test_every_allowed_package_has_a_bundle() {
    let resolver = BundleResolver::new();
    for rule in vetshim_guard::ALLOWED_PACKAGES {
        assert!(
            resolver.registry().owner_of(rule.identifier).is_some(),
            "{} has no bundle",
            rule.identifier
        );
    }
}

#[test]
fn test_dashboard_source() {
    let text = r#"import React, { useState } from 'react';
import { useReactTable, getCoreRowModel } from '@tanstack/react-table';
import { motion } from 'framer-motion';
import ReactMarkdown from 'react-markdown';

export default function Dashboard() {
  return <motion.div><ReactMarkdown>{notes}</ReactMarkdown></motion.div>;
}
"#;
    let resolver = BundleResolver::new();
    let required = resolver.analyze_imports(&SourceUnit::new("dash", text));
    assert_eq!(
        required.to_vec(),
        vec!["core", "utils", "tables", "motion", "markdown"]
    );

    let resolved = resolver.resolve(required.iter()).unwrap();
    assert!(resolved
        .lazy()
        .iter()
        .all(|b| b.load_strategy == LoadStrategy::Lazy));

    let manifest = serde_json::to_value(resolved.manifest()).unwrap();
    assert_eq!(manifest[2]["name"], "tables");
    assert_eq!(manifest[2]["strategy"], "lazy");
    assert_eq!(manifest[2]["url"], "/runtime-deps/tables.js");
}

#[test]
fn test_requirement_set_serializes_as_list() {
    let required = BundleResolver::new().analyze_imports(&SourceUnit::anonymous(""));
    let json = serde_json::to_string(&required).unwrap();
    assert_eq!(json, r#"["core","utils"]"#);
}

proptest! {
    #[test]
    fn prop_core_and_utils_always_lead(text in "\\PC{0,200}") {
        let required = BundleResolver::new().analyze_imports(&SourceUnit::anonymous(text));
        let names = required.to_vec();
        prop_assert_eq!(&names[..2], &["core".to_string(), "utils".to_string()]);

        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), names.len());
    }
}
