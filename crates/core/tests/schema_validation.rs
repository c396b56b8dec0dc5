//! Validates the fixture bundles against the JSON Schema at
//! schema/bundle-schema.json, and checks that the schema agrees with the
//! engine's own validator on them.

use std::path::{Path, PathBuf};

fn load_validator() -> jsonschema::Validator {
    let schema_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/bundle-schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

/// Bundle files in a fixture directory (answers and expectation files skipped).
fn collect_bundle_files(kind: &str) -> Vec<PathBuf> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(kind);
    let mut paths: Vec<_> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("Failed to list {}: {}", dir.display(), e))
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
                .is_some_and(|stem| !stem.contains('.'))
        })
        .collect();
    paths.sort();
    paths
}

fn read(path: &Path) -> serde_json::Value {
    let src = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&src).unwrap()
}

#[test]
fn positive_fixtures_match_schema() {
    let validator = load_validator();
    let mut tested = 0usize;
    let mut failures = Vec::new();

    for path in collect_bundle_files("positive") {
        let instance = read(&path);
        if let Err(error) = validator.validate(&instance) {
            failures.push(format!("{}: {}", path.display(), error));
        }
        if let Err(error) = tally_core::validate(&instance) {
            failures.push(format!("{}: engine rejected: {}", path.display(), error));
        }
        tested += 1;
    }

    assert!(tested > 0, "No fixture bundles found -- check paths");
    assert!(
        failures.is_empty(),
        "Schema validation failed for {} of {} files:\n{}",
        failures.len(),
        tested,
        failures.join("\n")
    );
}

#[test]
fn graph_errors_are_schema_valid() {
    // Cycles and dangling references are structural, not schema, problems.
    let validator = load_validator();
    for name in ["cycle.json", "missing_variable.json"] {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures/negative")
            .join(name);
        let instance = read(&path);
        assert!(validator.is_valid(&instance), "{}", path.display());
    }
}

#[test]
fn schema_rejects_what_the_engine_rejects() {
    let validator = load_validator();
    let cases = [
        serde_json::json!({ "variables": {} }),
        serde_json::json!({ "version_id": "", "variables": {} }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "formula", "expression": { "op": "sum" } } } }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "rule", "expression": { "op": "average" } } } }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "rule", "expression": { "op": "sum", "inputs": [{ "name": "Q1" }] } } } }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "rule", "expression": { "op": "weighted_sum", "inputs": [], "weights": ["1"] } } } }),
        // Unknown keys at every level.
        serde_json::json!({ "version_id": "v", "notes": "x", "variables": {} }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "rule", "label": "X", "expression": { "op": "sum" } } } }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "rule", "expression": { "op": "sum", "inputs": [], "weights": [1] } } } }),
        serde_json::json!({ "version_id": "v", "variables": { "x": { "type": "rule", "expression": { "op": "sum", "inputs": [{ "answer": "Q1", "literal": 1 }] } } } }),
    ];
    for case in &cases {
        assert!(!validator.is_valid(case), "schema accepted {}", case);
        assert!(tally_core::validate(case).is_err(), "engine accepted {}", case);
    }
}
