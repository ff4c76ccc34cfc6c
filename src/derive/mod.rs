//! Composite violation-stress derivation.
//!
//! A composite is a conjunction of facet conditions, so the stress of acting
//! against it is derived from the stress of its constituent facets:
//!
//! ```text
//! condition tokens ──resolve──▶ facet ids ──lookup──▶ {action: stress}
//!        sum per action × decay factor ──round(1)──▶ clamp [0, 30] ──▶ drop < 1.0
//! ```
//!
//! Dark-tetrad composites and composites that already carry an explicit map
//! are authoritative and never touched.  The result is written into a copy of
//! the corpus; the source records are not mutated.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::{ConfigError, PipelineConfig};
use crate::corpus::{FacetViolationMap, TraitCorpus, TraitRecord};
use crate::utilities::rounding::round_to;

/// Which rung of the decay ladder selected the factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayRule {
    /// The id names exactly two axes (`c_hx_…`).
    TwoAxis,
    /// A condition references another trait instead of a plain facet.
    TraitReference,
    /// Every token is a bare axis letter and there are enough of them.
    AxisOnly,
    Default,
}

/// Why a record was or was not derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Derive,
    SkipDark,
    SkipAlreadySet,
    /// Facets and records outside the composite id family.
    NotComposite,
}

/// Result of one derivation pass over a corpus.
#[derive(Debug, Clone)]
pub struct DerivationOutcome {
    /// The corpus copy with derived maps merged in.
    pub artifact: Vec<Value>,
    /// Derived maps in corpus order.
    pub derived: Vec<(String, BTreeMap<String, f64>)>,
    pub skipped_dark: usize,
    pub skipped_already_set: usize,
}

impl DerivationOutcome {
    /// Every violation-stress value in the artifact, derived or original,
    /// lies within the configured bounds.
    pub fn all_values_in_range(&self, config: &PipelineConfig) -> bool {
        self.artifact.iter().all(|trait_value| {
            violation_stress_of(trait_value).map_or(true, |map| {
                map.values()
                    .all(|v| v.as_f64().map_or(false, |v| config.stress.contains(v)))
            })
        })
    }
}

/// Derives violation-stress maps for composites that lack one.
#[derive(Debug, Clone)]
pub struct StressDeriver<'a> {
    config: &'a PipelineConfig,
    two_axis: Regex,
}

impl<'a> StressDeriver<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            two_axis: Regex::new(&config.decay.two_axis_pattern)?,
        })
    }

    pub fn eligibility(&self, record: &TraitRecord) -> Eligibility {
        if record.is_facet() {
            return Eligibility::NotComposite;
        }
        if record.dark {
            return Eligibility::SkipDark;
        }
        if !record.id.starts_with(&self.config.prefixes.composite) {
            return Eligibility::NotComposite;
        }
        if record.effects.violation_stress().is_some() {
            return Eligibility::SkipAlreadySet;
        }
        Eligibility::Derive
    }

    /// Select the decay rule.  Rules are tried in order and the first match wins,
    /// even when a later rule would also apply.
    pub fn decay_rule(&self, record: &TraitRecord) -> DecayRule {
        if self.two_axis.is_match(&record.id) {
            return DecayRule::TwoAxis;
        }

        let items = record.conditions();
        if items.iter().any(|item| item.trait_ref.is_some()) {
            return DecayRule::TraitReference;
        }

        let axis_only = !items.is_empty()
            && items
                .iter()
                .all(|item| self.config.is_axis(&item.condition.facet));
        if axis_only && items.len() >= self.config.decay.axis_only_min_conditions {
            return DecayRule::AxisOnly;
        }

        DecayRule::Default
    }

    pub fn decay_factor(&self, record: &TraitRecord) -> f64 {
        let d = &self.config.decay;
        match self.decay_rule(record) {
            DecayRule::TwoAxis => d.two_axis,
            DecayRule::TraitReference => d.trait_reference,
            DecayRule::AxisOnly => d.axis_only,
            DecayRule::Default => d.default,
        }
    }

    /// Derive the violation-stress map for one composite.
    ///
    /// Contributions are additive across every resolved facet of every
    /// condition; a facet reached twice counts twice.  Unresolvable tokens
    /// contribute nothing.
    pub fn derive(
        &self,
        record: &TraitRecord,
        facet_map: &FacetViolationMap,
    ) -> BTreeMap<String, f64> {
        let factor = self.decay_factor(record);
        let mut raw_sums: BTreeMap<String, f64> = BTreeMap::new();

        for item in record.conditions() {
            let c = &item.condition;
            for facet_id in self.config.resolve_condition(&c.facet, c.direction) {
                let Some(violation) = facet_map.get(facet_id) else {
                    continue;
                };
                for (action, value) in violation {
                    *raw_sums.entry(action.clone()).or_insert(0.0) += value;
                }
            }
        }

        let bounds = self.config.stress;
        raw_sums
            .into_iter()
            .filter_map(|(action, sum)| {
                let value = bounds.clamp(round_to(sum * factor, 1));
                (value >= bounds.noise_floor).then_some((action, value))
            })
            .collect()
    }

    /// Run derivation over the whole corpus, producing the side artifact.
    pub fn derive_corpus(&self, corpus: &TraitCorpus) -> DerivationOutcome {
        let facet_map = corpus.facet_violation_map();
        let mut artifact = corpus.raw().to_vec();
        let mut derived = Vec::new();
        let mut skipped_dark = 0;
        let mut skipped_already_set = 0;

        for (record, value) in corpus.records().iter().zip(artifact.iter_mut()) {
            match self.eligibility(record) {
                Eligibility::Derive => {}
                Eligibility::SkipDark => {
                    skipped_dark += 1;
                    continue;
                }
                Eligibility::SkipAlreadySet => {
                    skipped_already_set += 1;
                    continue;
                }
                Eligibility::NotComposite => continue,
            }

            let map = self.derive(record, &facet_map);
            log::debug!(
                "derived {} action(s) for {} ({:?})",
                map.len(),
                record.id,
                self.decay_rule(record)
            );
            set_violation_stress(value, &map);
            derived.push((record.id.clone(), map));
        }

        log::info!(
            "derived violation stress for {} composites ({} dark, {} already set)",
            derived.len(),
            skipped_dark,
            skipped_already_set
        );

        DerivationOutcome {
            artifact,
            derived,
            skipped_dark,
            skipped_already_set,
        }
    }
}

/// `effects.stress_modifiers.violation_stress` of a raw trait, when it is an object.
pub fn violation_stress_of(trait_value: &Value) -> Option<&Map<String, Value>> {
    trait_value
        .get("effects")?
        .get("stress_modifiers")?
        .get("violation_stress")?
        .as_object()
}

/// Merge a derived map into a raw trait.
///
/// The corpus loader has already checked that `effects` and
/// `stress_modifiers` are objects or null, so indexing cannot hit a scalar.
fn set_violation_stress(trait_value: &mut Value, derived: &BTreeMap<String, f64>) {
    let map: Map<String, Value> = derived
        .iter()
        .map(|(action, value)| (action.clone(), Value::from(*value)))
        .collect();
    trait_value["effects"]["stress_modifiers"]["violation_stress"] = Value::Object(map);
}

// ============================================================================
// Tests
// ============================================================================
