//! Validation gate, the all-or-nothing check run before any artifact is written.
//!
//! Every check runs and every failure is collected into one
//! [`ValidationReport`]; a non-empty report blocks the commit.

use std::fmt;

use crate::config::PipelineConfig;
use crate::corpus::TraitCorpus;
use crate::derive::{DerivationOutcome, Eligibility, StressDeriver};
use crate::error::PipelineError;
use crate::hybrid::RuntimeTrait;
use crate::locale::LocaleBundle;
use crate::mappings::{has_violation_entry, CrossReferences};
use crate::visitor::TextFieldFinder;

/// Tolerance for golden-value comparisons.
pub const GOLDEN_TOLERANCE: f64 = 0.001;

/// Values at or below this magnitude count as an explicit zero.
const ZERO_EPSILON: f64 = 1e-6;

/// The rarity bonus every 3-condition composite must carry.
const THREE_CONDITION_RARITY: f64 = 1.1;

/// Which check produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    TraitCount,
    StressRange,
    ZeroStress,
    MutexGroup,
    Golden,
    Rarity,
    TextField,
    LocaleKeys,
    EmptyMap,
    DerivedRange,
    DerivedPreserved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub check: CheckKind,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregated result of a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn has(&self, check: CheckKind) -> bool {
        self.failures.iter().any(|f| f.check == check)
    }

    pub fn push(&mut self, check: CheckKind, message: impl Into<String>) {
        self.failures.push(ValidationFailure {
            check,
            message: message.into(),
        });
    }

    /// Append another report's failures.
    pub fn merge(&mut self, other: ValidationReport) {
        self.failures.extend(other.failures);
    }

    /// `Ok` when clean, otherwise [`PipelineError::Validation`].
    pub fn into_result(self) -> Result<(), PipelineError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, " - {}", failure)?;
        }
        Ok(())
    }
}

/// Outputs of the migration stage, borrowed for checking.
#[derive(Debug, Clone, Copy)]
pub struct MigrationOutputs<'a> {
    pub runtime: &'a [RuntimeTrait],
    pub refs: &'a CrossReferences,
    pub locales: &'a [LocaleBundle],
}

/// Runs the structural, numeric and golden-value checks.
#[derive(Debug, Clone, Copy)]
pub struct ValidationGate<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ValidationGate<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Check the hybrid model, maps and locale tables against the source corpus.
    pub fn validate_migration(
        &self,
        corpus: &TraitCorpus,
        out: MigrationOutputs<'_>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        if out.runtime.len() != corpus.len() {
            report.push(
                CheckKind::TraitCount,
                format!("Count mismatch: {} -> {}", corpus.len(), out.runtime.len()),
            );
        }

        self.check_stress_range(corpus, &mut report);
        self.check_zero_stress(corpus, out.refs, &mut report);
        self.check_mutex_groups(out.runtime, &mut report);
        self.check_golden(out, &mut report);
        check_rarity(out.runtime, &mut report);
        self.check_text_fields(out.runtime, &mut report);
        self.check_locales(out.locales, &mut report);

        if out.refs.behavior.is_empty() {
            report.push(CheckKind::EmptyMap, "behavior_mappings is empty");
        }
        if out.refs.emotion.is_empty() {
            report.push(CheckKind::EmptyMap, "emotion_mappings is empty");
        }

        for failure in report.failures() {
            log::debug!("validation failure ({:?}): {}", failure.check, failure.message);
        }
        report
    }

    /// Check the derived artifact: bounds hold and authoritative records are untouched.
    pub fn validate_derivation(
        &self,
        corpus: &TraitCorpus,
        deriver: &StressDeriver<'_>,
        outcome: &DerivationOutcome,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        if outcome.artifact.len() != corpus.len() {
            report.push(
                CheckKind::TraitCount,
                format!(
                    "Derived artifact count mismatch: {} -> {}",
                    corpus.len(),
                    outcome.artifact.len()
                ),
            );
        }

        if !outcome.all_values_in_range(self.config) {
            report.push(
                CheckKind::DerivedRange,
                format!(
                    "violation_stress value outside [{}, {}] in derived artifact",
                    self.config.stress.min, self.config.stress.max
                ),
            );
        }

        for ((record, source), derived) in corpus
            .records()
            .iter()
            .zip(corpus.raw())
            .zip(&outcome.artifact)
        {
            if deriver.eligibility(record) == Eligibility::Derive {
                continue;
            }
            if source != derived {
                report.push(
                    CheckKind::DerivedPreserved,
                    format!("record changed by derivation: {}", record.id),
                );
            }
        }
        report
    }

    fn check_stress_range(&self, corpus: &TraitCorpus, report: &mut ValidationReport) {
        let bounds = self.config.stress;
        for record in corpus.records() {
            let Some(stress) = record.effects.violation_stress() else {
                continue;
            };
            for (action, value) in stress {
                if !bounds.contains(*value) {
                    report.push(
                        CheckKind::StressRange,
                        format!(
                            "violation_stress out of range [{}, {}]: {} / {} = {}",
                            bounds.min, bounds.max, record.id, action, value
                        ),
                    );
                }
            }
        }
    }

    fn check_zero_stress(&self, corpus: &TraitCorpus, refs: &CrossReferences, report: &mut ValidationReport) {
        for record in corpus.records() {
            let Some(stress) = record.effects.violation_stress() else {
                continue;
            };
            for (action, value) in stress {
                if value.abs() <= ZERO_EPSILON
                    && !has_violation_entry(&refs.violation, action, &record.id, 0.0)
                {
                    report.push(
                        CheckKind::ZeroStress,
                        format!("Zero violation stress not preserved: {} / {}", record.id, action),
                    );
                }
            }
        }
    }

    fn check_mutex_groups(&self, runtime: &[RuntimeTrait], report: &mut ValidationReport) {
        for (key, pair) in &self.config.mutex_pairs {
            for trait_id in pair {
                let Some(migrated) = find(runtime, trait_id) else {
                    report.push(CheckKind::MutexGroup, format!("Missing mutex trait: {}", trait_id));
                    continue;
                };
                match migrated.as_facet() {
                    None => report.push(
                        CheckKind::MutexGroup,
                        format!("Trait should be facet category: {}", trait_id),
                    ),
                    Some(facet) if &facet.mutex_group != key => report.push(
                        CheckKind::MutexGroup,
                        format!(
                            "Wrong mutex_group for {}: {} (expected {})",
                            trait_id, facet.mutex_group, key
                        ),
                    ),
                    Some(_) => {}
                }
            }
        }
    }

    fn check_golden(&self, out: MigrationOutputs<'_>, report: &mut ValidationReport) {
        let golden = &self.config.golden;

        for g in &golden.facets {
            let Some(migrated) = find(out.runtime, &g.trait_id) else {
                report.push(CheckKind::Golden, format!("Missing {}", g.trait_id));
                continue;
            };
            let Some(facet) = migrated.as_facet() else {
                report.push(
                    CheckKind::Golden,
                    format!("{} should be facet category, got {}", g.trait_id, migrated.category()),
                );
                continue;
            };
            for (name, expected, actual) in [
                ("t_on", g.t_on, facet.t_on),
                ("t_off", g.t_off, facet.t_off),
                ("salience_center", g.salience_center, facet.salience_center),
            ] {
                if let Some(expected) = expected {
                    if !close(actual, expected) {
                        report.push(
                            CheckKind::Golden,
                            format!("{} {} mismatch: {} (expected {})", g.trait_id, name, actual, expected),
                        );
                    }
                }
            }
        }

        for g in &golden.composites {
            let Some(migrated) = find(out.runtime, &g.trait_id) else {
                report.push(CheckKind::Golden, format!("Missing {}", g.trait_id));
                continue;
            };
            if let Some(category) = &g.category {
                if migrated.category() != category {
                    report.push(
                        CheckKind::Golden,
                        format!("{} category should be {}, got {}", g.trait_id, category, migrated.category()),
                    );
                }
            }
            let Some(composite) = migrated.as_composite() else {
                report.push(CheckKind::Golden, format!("{} is not a composite", g.trait_id));
                continue;
            };
            if let Some(expected) = g.violation_override {
                if composite.violation_override.unwrap_or(false) != expected {
                    report.push(
                        CheckKind::Golden,
                        format!("{} violation_override should be {}", g.trait_id, expected),
                    );
                }
            }
            if let Some(expected) = g.rarity_bonus {
                if !close(composite.rarity_bonus, expected) {
                    report.push(
                        CheckKind::Golden,
                        format!("{} rarity_bonus mismatch: {}", g.trait_id, composite.rarity_bonus),
                    );
                }
            }
        }

        for g in &golden.violations {
            if !has_violation_entry(&out.refs.violation, &g.action, &g.trait_id, g.base_stress) {
                report.push(
                    CheckKind::Golden,
                    format!(
                        "violation_mappings missing {} -> {}({})",
                        g.action, g.trait_id, g.base_stress
                    ),
                );
            }
        }
    }

    fn check_text_fields(&self, runtime: &[RuntimeTrait], report: &mut ValidationReport) {
        let tree = match serde_json::to_value(runtime) {
            Ok(tree) => tree,
            Err(e) => {
                report.push(CheckKind::TextField, format!("cannot inspect runtime model: {}", e));
                return;
            }
        };
        if let Some(hit) = TextFieldFinder::new(&self.config.text_fields).find(&tree).first() {
            report.push(
                CheckKind::TextField,
                format!(
                    "forbidden localized field {} exists in trait_defs_v2: {}",
                    hit.field,
                    hit.owner_id.as_deref().unwrap_or(&hit.path)
                ),
            );
        }
    }

    fn check_locales(&self, locales: &[LocaleBundle], report: &mut ValidationReport) {
        let Some(expected) = self.config.expected_locale_keys else {
            return;
        };
        for bundle in locales {
            if bundle.traits.len() != expected {
                report.push(
                    CheckKind::LocaleKeys,
                    format!(
                        "{} locale key count mismatch: {} (expected {})",
                        bundle.code,
                        bundle.traits.len(),
                        expected
                    ),
                );
            }
        }
    }
}

fn check_rarity(runtime: &[RuntimeTrait], report: &mut ValidationReport) {
    let mut found = false;
    for composite in runtime.iter().filter_map(RuntimeTrait::as_composite) {
        if composite.conditions.len() != 3 {
            continue;
        }
        found = true;
        if !close(composite.rarity_bonus, THREE_CONDITION_RARITY) {
            report.push(
                CheckKind::Rarity,
                format!("rarity_bonus mismatch for 3-condition trait {}", composite.id),
            );
        }
    }
    if !found {
        report.push(
            CheckKind::Rarity,
            "No 3-condition composite trait found to validate rarity_bonus=1.1",
        );
    }
}

fn find<'r>(runtime: &'r [RuntimeTrait], trait_id: &str) -> Option<&'r RuntimeTrait> {
    runtime.iter().find(|t| t.id() == trait_id)
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= GOLDEN_TOLERANCE
}

// ============================================================================
// Tests
// ============================================================================
