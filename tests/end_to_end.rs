//! End-to-end tests for the `trait-pipeline` binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn pipeline(out_dir: &Path, source: &str) -> Command {
    let mut cmd = Command::cargo_bin("trait-pipeline").unwrap();
    cmd.arg("--source")
        .arg(fixture(source))
        .arg("--out-dir")
        .arg(out_dir)
        .arg("--config")
        .arg(fixture("pipeline.yaml"));
    cmd
}

fn read(path: PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_run_writes_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    pipeline(dir.path(), "traits.json")
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[DERIVE] Loaded 51 traits (48 facets, 2 composites)",
        ))
        .stdout(predicate::str::contains(
            r#"  c_ha_peacemaker: {"betray": 6.4, "cheat": 9.6, "lie": 14.4}"#,
        ))
        .stdout(predicate::str::contains(
            "[DERIVE] All derived values in range [0, 30]: YES",
        ))
        .stdout(predicate::str::contains("[OK] Migrated 51 traits"))
        .stdout(predicate::str::contains("[OK] locale keys: ko=102, en=102"));

    let runtime = read(dir.path().join("trait_defs_v2.json"));
    let runtime = runtime.as_array().unwrap();
    assert_eq!(runtime.len(), 51);

    let sincere = runtime.iter().find(|t| t["id"] == json!("f_sincere")).unwrap();
    assert_eq!(sincere["category"], json!("facet"));
    assert_eq!(sincere["t_on"], json!(0.9));
    assert_eq!(sincere["t_off"], json!(0.84));
    assert_eq!(sincere["mutex_group"], json!("H_sincerity"));
    assert!(sincere.get("name_en").is_none());

    let psycho = runtime
        .iter()
        .find(|t| t["id"] == json!("d_psychopath_primary"))
        .unwrap();
    assert_eq!(psycho["category"], json!("dark"));
    assert_eq!(psycho["violation_override"], json!(true));
    assert_eq!(psycho["rarity_bonus"], json!(1.2));

    let violation = read(dir.path().join("violation_mappings.json"));
    let lie: Vec<&str> = violation["lie"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["trait_id"].as_str().unwrap())
        .collect();
    assert_eq!(
        lie,
        vec!["d_psychopath_primary", "f_deceptive", "f_fair_minded", "f_sincere"]
    );

    let emotion = read(dir.path().join("emotion_mappings.json"));
    let buckets: Vec<&String> = emotion.as_object().unwrap().keys().collect();
    assert_eq!(buckets, vec!["sensitivity", "baseline", "mult"]);

    let ko = read(dir.path().join("locales/ko/traits.json"));
    assert_eq!(ko["TRAIT_f_sincere_NAME"], json!("f_sincere 이름"));
    let en_events = read(dir.path().join("locales/en/traits_events.json"));
    assert_eq!(en_events["UI_TRAIT_NO_DOMINANT"], json!("No dominant traits"));
}

#[test]
fn test_derive_preserves_source_records() {
    let dir = tempfile::tempdir().unwrap();
    pipeline(dir.path(), "traits.json")
        .arg("derive")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "(1 skipped: dark tetrad, 1 skipped: already set)",
        ));

    let source = read(fixture("traits.json"));
    let derived = read(dir.path().join("trait_definitions_derived.json"));
    assert_eq!(source.as_array().unwrap().len(), derived.as_array().unwrap().len());

    for (before, after) in source.as_array().unwrap().iter().zip(derived.as_array().unwrap()) {
        if before["id"] == json!("c_ha_peacemaker") {
            assert_eq!(
                after["effects"]["stress_modifiers"]["violation_stress"],
                json!({"betray": 6.4, "cheat": 9.6, "lie": 14.4})
            );
            assert_eq!(after["name_en"], before["name_en"]);
        } else {
            assert_eq!(before, after);
        }
    }
    assert!(!dir.path().join("trait_defs_v2.json").exists());
}

#[test]
fn test_derivation_is_idempotent() {
    let first = tempfile::tempdir().unwrap();
    pipeline(first.path(), "traits.json").arg("derive").assert().success();
    let derived_path = first.path().join("trait_definitions_derived.json");

    let second = tempfile::tempdir().unwrap();
    Command::cargo_bin("trait-pipeline")
        .unwrap()
        .arg("--source")
        .arg(&derived_path)
        .arg("--out-dir")
        .arg(second.path())
        .arg("--config")
        .arg(fixture("pipeline.yaml"))
        .arg("derive")
        .assert()
        .success();

    assert_eq!(
        read(derived_path),
        read(second.path().join("trait_definitions_derived.json"))
    );
}

#[test]
fn test_malformed_record_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    pipeline(dir.path(), "traits_malformed.json")
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("f_broken"))
        .stderr(predicate::str::contains("condition.direction"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_validation_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    // built-in tables expect 374 keys per locale
    Command::cargo_bin("trait-pipeline")
        .unwrap()
        .arg("--source")
        .arg(fixture("traits.json"))
        .arg("--out-dir")
        .arg(dir.path())
        .arg("migrate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[FAIL] Migration validation failed:"))
        .stdout(predicate::str::contains(" - ko locale key count mismatch: 102"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_source_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("trait-pipeline")
        .unwrap()
        .arg("--source")
        .arg(dir.path().join("nope.json"))
        .arg("--out-dir")
        .arg(dir.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_key_table_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("old_keys.json");
    std::fs::write(&table, r#"{"TRAIT_f_sincere_NAME": "Sincere"}"#).unwrap();
    let out = dir.path().join("out");

    pipeline(&out, "traits.json")
        .arg("--key-table")
        .arg(&table)
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[WARN] runtime keys missing from existing key tables: 101",
        ))
        .stderr(predicate::str::contains("TRAIT_f_sincere_DESC"));
}
