//! Batch pipeline: load, transform and validate, then commit.
//!
//! ```text
//! source ─▶ TraitCorpus ─┬─▶ StressDeriver ─────────▶ trait_definitions_derived.json
//!                        ├─▶ HybridTransformer ─────▶ trait_defs_v2.json
//!                        ├─▶ CrossReferences ───────▶ {behavior,emotion,violation}_mappings.json
//!                        └─▶ build_locales ─────────▶ locales/<lang>/traits{,_events}.json
//!                                  │
//!                           ValidationGate ─(any failure)─▶ nothing written
//!                                  │
//!                           FileHandler::commit
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::PipelineConfig;
use crate::corpus::TraitCorpus;
use crate::derive::{DerivationOutcome, StressDeriver};
use crate::error::Result;
use crate::hybrid::{HybridTransformer, RuntimeTrait};
use crate::locale::{build_locales, load_key_table, warn_missing_references, LocaleBundle};
use crate::mappings::CrossReferences;
use crate::utilities::file_handler::FileHandler;
use crate::validation::{MigrationOutputs, ValidationGate, ValidationReport};

pub const DERIVED_ARTIFACT: &str = "trait_definitions_derived.json";
pub const RUNTIME_ARTIFACT: &str = "trait_defs_v2.json";
pub const BEHAVIOR_ARTIFACT: &str = "behavior_mappings.json";
pub const EMOTION_ARTIFACT: &str = "emotion_mappings.json";
pub const VIOLATION_ARTIFACT: &str = "violation_mappings.json";

/// Derived maps echoed in the summary.
const SAMPLE_LIMIT: usize = 2;

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Derivation artifact only.
    Derive,
    /// Hybrid model, maps and locale tables.
    Migrate,
    /// Both, in one commit.
    Run,
}

impl RunMode {
    fn derives(self) -> bool {
        matches!(self, Self::Derive | Self::Run)
    }

    fn migrates(self) -> bool {
        matches!(self, Self::Migrate | Self::Run)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Derive => write!(f, "derive"),
            Self::Migrate => write!(f, "migrate"),
            Self::Run => write!(f, "run"),
        }
    }
}

/// Paths for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source: PathBuf,
    pub out_dir: PathBuf,
    /// Existing key tables to check runtime keys against.
    pub key_tables: Vec<PathBuf>,
}

// ============================================================================
// Summaries
// ============================================================================

/// What the derivation stage did.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveSummary {
    pub loaded: usize,
    pub facets: usize,
    pub composites: usize,
    pub derived: usize,
    pub skipped_dark: usize,
    pub skipped_already_set: usize,
    pub samples: Vec<(String, BTreeMap<String, f64>)>,
    pub output: PathBuf,
    pub in_range: bool,
    pub range: (f64, f64),
}

impl DeriveSummary {
    fn new(corpus: &TraitCorpus, outcome: &DerivationOutcome, config: &PipelineConfig, output: PathBuf) -> Self {
        Self {
            loaded: corpus.len(),
            facets: corpus.facets().count(),
            composites: corpus.composites().count(),
            derived: outcome.derived.len(),
            skipped_dark: outcome.skipped_dark,
            skipped_already_set: outcome.skipped_already_set,
            samples: outcome.derived.iter().take(SAMPLE_LIMIT).cloned().collect(),
            output,
            in_range: outcome.all_values_in_range(config),
            range: (config.stress.min, config.stress.max),
        }
    }
}

impl fmt::Display for DeriveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[DERIVE] Loaded {} traits ({} facets, {} composites)",
            self.loaded, self.facets, self.composites
        )?;
        writeln!(
            f,
            "[DERIVE] Derived violation_stress for {} composites ({} skipped: dark tetrad, {} skipped: already set)",
            self.derived, self.skipped_dark, self.skipped_already_set
        )?;
        writeln!(f, "[DERIVE] Sample derived values:")?;
        if self.samples.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (trait_id, values) in &self.samples {
            writeln!(f, "  {}: {}", trait_id, inline_map(values))?;
        }
        writeln!(f, "[DERIVE] Saved to {}", self.output.display())?;
        write!(
            f,
            "[DERIVE] All derived values in range [{}, {}]: {}",
            self.range.0,
            self.range.1,
            if self.in_range { "YES" } else { "NO" }
        )
    }
}

/// `{"a": 1.0, "b": 2.5}`, keys sorted.
fn inline_map(values: &BTreeMap<String, f64>) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|(k, v)| format!("{}: {}", Value::from(k.as_str()), float_repr(*v)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// Shortest round-trip float text, always with a fractional part.
fn float_repr(v: f64) -> String {
    let text = v.to_string();
    if text.contains(['.', 'e', 'E']) || !v.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

/// What the migration stage produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrateSummary {
    pub migrated: usize,
    pub output: PathBuf,
    pub behavior_actions: usize,
    pub emotion_buckets: BTreeMap<&'static str, usize>,
    pub violation_actions: usize,
    /// `(locale code, key count)` in configured order.
    pub locale_keys: Vec<(String, usize)>,
    pub missing_references: Option<usize>,
}

impl fmt::Display for MigrateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[OK] Migrated {} traits -> {}", self.migrated, self.output.display())?;
        writeln!(f, "[OK] behavior actions: {}", self.behavior_actions)?;
        let bucket = |name: &str| self.emotion_buckets.get(name).copied().unwrap_or(0);
        writeln!(
            f,
            "[OK] emotion buckets: sensitivity={}, baseline={}, mult={}",
            bucket("sensitivity"),
            bucket("baseline"),
            bucket("mult")
        )?;
        writeln!(f, "[OK] violation actions: {}", self.violation_actions)?;
        let locales: Vec<String> = self
            .locale_keys
            .iter()
            .map(|(code, n)| format!("{}={}", code, n))
            .collect();
        write!(f, "[OK] locale keys: {}", locales.join(", "))?;
        if let Some(missing) = self.missing_references {
            write!(f, "\n[WARN] runtime keys missing from existing key tables: {}", missing)?;
        }
        Ok(())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub mode: RunMode,
    pub derive: Option<DeriveSummary>,
    pub migrate: Option<MigrateSummary>,
    /// Every artifact path written, in staging order.
    pub written: Vec<PathBuf>,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections: Vec<String> = self
            .derive
            .iter()
            .map(ToString::to_string)
            .chain(self.migrate.iter().map(ToString::to_string))
            .collect();
        f.write_str(&sections.join("\n"))
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Outputs of the migration stage, owned until staged.
struct Migration {
    runtime: Vec<RuntimeTrait>,
    refs: CrossReferences,
    locales: Vec<LocaleBundle>,
    missing_references: Option<usize>,
}

/// One configured batch run.
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, options: PipelineOptions) -> Self {
        Self { config, options }
    }

    /// Execute `mode`.  Nothing is written unless every check passes.
    pub fn run(&self, mode: RunMode) -> Result<PipelineReport> {
        log::info!("starting {} from {}", mode, self.options.source.display());
        let corpus = TraitCorpus::load(&self.options.source, self.config)?;
        let gate = ValidationGate::new(self.config);
        let mut report = ValidationReport::new();
        let mut files = FileHandler::new(&self.options.out_dir);

        let mut derive_summary = None;
        if mode.derives() {
            let deriver = StressDeriver::new(self.config)?;
            let outcome = deriver.derive_corpus(&corpus);
            report.merge(gate.validate_derivation(&corpus, &deriver, &outcome));
            files.stage_json(DERIVED_ARTIFACT, &outcome.artifact)?;
            derive_summary = Some(DeriveSummary::new(
                &corpus,
                &outcome,
                self.config,
                self.artifact_path(DERIVED_ARTIFACT),
            ));
        }

        let mut migrate_summary = None;
        if mode.migrates() {
            let migration = self.migrate(&corpus)?;
            report.merge(gate.validate_migration(
                &corpus,
                MigrationOutputs {
                    runtime: &migration.runtime,
                    refs: &migration.refs,
                    locales: &migration.locales,
                },
            ));
            self.stage_migration(&mut files, &migration)?;
            migrate_summary = Some(MigrateSummary {
                migrated: migration.runtime.len(),
                output: self.artifact_path(RUNTIME_ARTIFACT),
                behavior_actions: migration.refs.behavior.len(),
                emotion_buckets: migration.refs.emotion.bucket_sizes(),
                violation_actions: migration.refs.violation.len(),
                locale_keys: migration
                    .locales
                    .iter()
                    .map(|b| (b.code.clone(), b.traits.len()))
                    .collect(),
                missing_references: migration.missing_references,
            });
        }

        if !report.is_ok() {
            log::warn!(
                "validation failed with {} error(s); {} staged artifact(s) discarded",
                report.failures().len(),
                files.pending_paths().len()
            );
        }
        report.into_result()?;

        let written = files.commit()?;
        log::info!("committed {} artifact(s) to {}", written.len(), self.options.out_dir.display());

        Ok(PipelineReport {
            mode,
            derive: derive_summary,
            migrate: migrate_summary,
            written,
        })
    }

    fn migrate(&self, corpus: &TraitCorpus) -> Result<Migration> {
        let runtime = HybridTransformer::new(self.config).transform_corpus(corpus);
        let refs = CrossReferences::extract(corpus, self.config);
        let locales = build_locales(corpus, self.config)?;

        let missing_references = if self.options.key_tables.is_empty() {
            None
        } else {
            let mut missing = 0;
            for path in &self.options.key_tables {
                let table = load_key_table(path)?;
                missing += warn_missing_references(&runtime, path, &table);
            }
            Some(missing)
        };

        Ok(Migration {
            runtime,
            refs,
            locales,
            missing_references,
        })
    }

    fn stage_migration(&self, files: &mut FileHandler, m: &Migration) -> Result<()> {
        files.stage_json(RUNTIME_ARTIFACT, &m.runtime)?;
        files.stage_json(BEHAVIOR_ARTIFACT, &m.refs.behavior)?;
        files.stage_json(EMOTION_ARTIFACT, &m.refs.emotion)?;
        files.stage_json(VIOLATION_ARTIFACT, &m.refs.violation)?;
        for bundle in &m.locales {
            files.stage_json(bundle.traits_path(), &bundle.traits)?;
            files.stage_json(bundle.events_path(), &bundle.events)?;
        }
        Ok(())
    }

    fn artifact_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.options.out_dir.join(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::testing::complete_setup;
    use crate::validation::CheckKind;
    use serde_json::json;

    fn setup(document: &Value) -> (tempfile::TempDir, PipelineOptions) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("traits.json");
        std::fs::write(&source, serde_json::to_string_pretty(document).unwrap()).unwrap();
        let options = PipelineOptions {
            source,
            out_dir: dir.path().join("out"),
            key_tables: Vec::new(),
        };
        (dir, options)
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_run_writes_every_artifact() {
        let (config, document) = complete_setup();
        let (_dir, options) = setup(&document);
        let out = options.out_dir.clone();
        let report = Pipeline::new(&config, options).run(RunMode::Run).unwrap();

        assert_eq!(report.written.len(), 9);
        for name in [
            DERIVED_ARTIFACT,
            RUNTIME_ARTIFACT,
            BEHAVIOR_ARTIFACT,
            EMOTION_ARTIFACT,
            VIOLATION_ARTIFACT,
            "locales/ko/traits.json",
            "locales/en/traits.json",
            "locales/ko/traits_events.json",
            "locales/en/traits_events.json",
        ] {
            assert!(out.join(name).exists(), "missing {}", name);
        }

        let runtime = read(&out.join(RUNTIME_ARTIFACT));
        assert_eq!(runtime.as_array().unwrap().len(), document.as_array().unwrap().len());
        let violation = read(&out.join(VIOLATION_ARTIFACT));
        assert_eq!(
            violation["harm_innocent"],
            json!([{"trait_id": "d_psychopath_primary", "base_stress": 0.0, "alpha": 1.2}])
        );
    }

    #[test]
    fn test_source_is_never_written() {
        let (config, document) = complete_setup();
        let (_dir, options) = setup(&document);
        let source = options.source.clone();
        let before = std::fs::read(&source).unwrap();
        Pipeline::new(&config, options).run(RunMode::Run).unwrap();
        assert_eq!(std::fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_derive_mode_only_writes_derived() {
        let (config, document) = complete_setup();
        let (_dir, options) = setup(&document);
        let out = options.out_dir.clone();
        let report = Pipeline::new(&config, options).run(RunMode::Derive).unwrap();
        assert_eq!(report.written, vec![out.join(DERIVED_ARTIFACT)]);
        assert!(report.migrate.is_none());

        let summary = report.derive.unwrap();
        assert_eq!(summary.derived, 1);
        assert_eq!(summary.skipped_dark, 1);
        assert_eq!(summary.skipped_already_set, 1);
        assert!(summary.in_range);

        let derived = read(&out.join(DERIVED_ARTIFACT));
        let charmer = derived
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["id"] == json!("c_hx_charmer"))
            .unwrap();
        assert_eq!(charmer["effects"]["stress_modifiers"]["violation_stress"], json!({}));
        // unknown fields survive
        assert_eq!(charmer["name_en"], json!("Charmer"));
    }

    #[test]
    fn test_validation_failure_writes_nothing() {
        let (mut config, document) = complete_setup();
        config.expected_locale_keys = Some(374);
        let (_dir, options) = setup(&document);
        let out = options.out_dir.clone();
        let err = Pipeline::new(&config, options).run(RunMode::Run).unwrap_err();
        assert!(err.is_validation());
        assert!(!out.exists());
    }

    #[test]
    fn test_malformed_record_writes_nothing() {
        let (config, mut document) = complete_setup();
        document
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "f_bad", "condition": {"facet": "H_sincerity", "direction": "sideways", "threshold": 0.5}}));
        let (_dir, options) = setup(&document);
        let out = options.out_dir.clone();
        let err = Pipeline::new(&config, options).run(RunMode::Run).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationShape { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_migrate_rejects_out_of_range_source_stress() {
        let (config, mut document) = complete_setup();
        for t in document.as_array_mut().unwrap() {
            if t["id"] == json!("f_fair_minded") {
                t["effects"]["stress_modifiers"]["violation_stress"]["cheat"] = json!(45.0);
            }
        }
        let (_dir, options) = setup(&document);
        let out = options.out_dir.clone();
        let err = Pipeline::new(&config, options).run(RunMode::Migrate).unwrap_err();
        match err {
            PipelineError::Validation(report) => {
                assert!(report.has(CheckKind::StressRange));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_composite_without_conditions_is_migrated() {
        let (mut config, mut document) = complete_setup();
        let traits = document.as_array_mut().unwrap();
        traits.push(json!({"id": "c_empty", "condition": {"all": []}}));
        config.expected_locale_keys = Some(2 * traits.len());
        let (_dir, options) = setup(&document);
        let out = options.out_dir.clone();
        Pipeline::new(&config, options).run(RunMode::Run).unwrap();

        let runtime = read(&out.join(RUNTIME_ARTIFACT));
        let empty = runtime
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["id"] == json!("c_empty"))
            .unwrap();
        assert_eq!(empty["category"], json!("composite"));
        assert_eq!(empty["conditions"], json!([]));
        assert_eq!(empty["rarity_bonus"], json!(1.0));
    }

    #[test]
    fn test_key_table_references_counted() {
        let (config, document) = complete_setup();
        let (dir, mut options) = setup(&document);
        let table = dir.path().join("old_keys.json");
        std::fs::write(&table, r#"{"TRAIT_f_sincere_NAME": "Sincere"}"#).unwrap();
        options.key_tables.push(table);

        let report = Pipeline::new(&config, options).run(RunMode::Migrate).unwrap();
        let missing = report.migrate.unwrap().missing_references;
        let records = document.as_array().unwrap().len();
        assert_eq!(missing, Some(2 * records - 1));
    }

    #[test]
    fn test_summary_lines() {
        let (config, document) = complete_setup();
        let (_dir, options) = setup(&document);
        let report = Pipeline::new(&config, options).run(RunMode::Run).unwrap();
        let text = report.to_string();
        assert!(text.contains("[DERIVE] Loaded 51 traits (48 facets, 2 composites)"));
        assert!(text.contains(
            "[DERIVE] Derived violation_stress for 1 composites (1 skipped: dark tetrad, 1 skipped: already set)"
        ));
        assert!(text.contains("  c_hx_charmer: {}"));
        assert!(text.contains("[DERIVE] All derived values in range [0, 30]: YES"));
        assert!(text.contains("[OK] Migrated 51 traits -> "));
        assert!(text.contains("[OK] emotion buckets: sensitivity=1, baseline=1, mult=0"));
        assert!(text.contains("[OK] locale keys: ko=102, en=102"));
    }

    #[test]
    fn test_inline_map_format() {
        let map = BTreeMap::from([("lie".to_string(), 16.8), ("betray".to_string(), 6.0)]);
        assert_eq!(inline_map(&map), r#"{"betray": 6.0, "lie": 16.8}"#);
        assert_eq!(inline_map(&BTreeMap::new()), "{}");
    }
}
