//! Hybrid runtime model: the two-level trait records a runtime evaluator reads.
//!
//! # Architecture
//!
//! ```text
//! TraitRecord (facet)      ──▶ RuntimeFacetTrait
//!   threshold + direction        hysteresis (t_on / t_off), sigmoid_s,
//!                                salience band, mutex group, axis
//!
//! TraitRecord (composite)  ──▶ RuntimeCompositeTrait
//!   AND-list of conditions       fuzzy band per condition, rarity bonus,
//!                                violation_override (dark only)
//! ```
//!
//! Runtime records reference display text only through `TRAIT_<id>_NAME` /
//! `TRAIT_<id>_DESC` keys.  The offsets and bounds below are fixed contract
//! values shared with the runtime evaluator.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::corpus::{ConditionItem, Direction, FacetCondition, TraitCorpus, TraitKind, TraitRecord};
use crate::utilities::rounding::r3;

/// Distance from the threshold at which a facet switches on.
pub const HYSTERESIS_ON_OFFSET: f64 = 0.02;
/// Distance from the threshold at which an active facet switches off.
pub const HYSTERESIS_OFF_OFFSET: f64 = 0.08;
pub const SALIENCE_CENTER_OFFSET: f64 = 0.05;
pub const SALIENCE_WIDTH: f64 = 0.12;
pub const SIGMOID_BASE: f64 = 0.012;
pub const SIGMOID_GAIN: f64 = 0.25;
pub const SIGMOID_MIN: f64 = 0.015;
pub const SIGMOID_MAX: f64 = 0.05;
pub const CONDITION_CENTER_OFFSET: f64 = 0.10;
pub const CONDITION_WIDTH: f64 = 0.20;
/// Conditions a composite may have before the rarity bonus starts growing.
pub const RARITY_FREE_CONDITIONS: usize = 2;
pub const RARITY_STEP: f64 = 0.1;

// ============================================================================
// Runtime records
// ============================================================================

/// Runtime form of a facet trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeFacetTrait {
    pub id: String,
    pub name_key: String,
    pub desc_key: String,
    pub valence: String,
    pub facet: String,
    pub direction: Direction,
    pub threshold: f64,
    /// Activation threshold.
    pub t_on: f64,
    /// Deactivation threshold, further from the pole than `t_on`.
    pub t_off: f64,
    pub sigmoid_s: f64,
    pub salience_center: f64,
    pub salience_width: f64,
    pub mutex_group: String,
    pub axis: String,
}

/// Fuzzy membership band for one composite condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBand {
    pub facet: String,
    pub direction: Direction,
    pub threshold: f64,
    pub cond_center: f64,
    pub cond_width: f64,
}

/// Runtime form of a composite (or dark-tetrad) trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeCompositeTrait {
    pub id: String,
    pub name_key: String,
    pub desc_key: String,
    pub valence: String,
    pub conditions: Vec<ConditionBand>,
    pub rarity_bonus: f64,
    /// Dark-tetrad only: violation stress must never be recomputed downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_override: Option<bool>,
}

/// A runtime trait record, tagged by `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RuntimeTrait {
    Facet(RuntimeFacetTrait),
    Composite(RuntimeCompositeTrait),
    Dark(RuntimeCompositeTrait),
}

impl RuntimeTrait {
    pub fn id(&self) -> &str {
        match self {
            Self::Facet(f) => &f.id,
            Self::Composite(c) | Self::Dark(c) => &c.id,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Facet(_) => "facet",
            Self::Composite(_) => "composite",
            Self::Dark(_) => "dark",
        }
    }

    pub fn name_key(&self) -> &str {
        match self {
            Self::Facet(f) => &f.name_key,
            Self::Composite(c) | Self::Dark(c) => &c.name_key,
        }
    }

    pub fn desc_key(&self) -> &str {
        match self {
            Self::Facet(f) => &f.desc_key,
            Self::Composite(c) | Self::Dark(c) => &c.desc_key,
        }
    }

    pub fn as_facet(&self) -> Option<&RuntimeFacetTrait> {
        match self {
            Self::Facet(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&RuntimeCompositeTrait> {
        match self {
            Self::Composite(c) | Self::Dark(c) => Some(c),
            Self::Facet(_) => None,
        }
    }
}

/// Display-name key for a trait.
pub fn name_key(trait_id: &str) -> String {
    format!("TRAIT_{}_NAME", trait_id)
}

/// Display-description key for a trait.
pub fn desc_key(trait_id: &str) -> String {
    format!("TRAIT_{}_DESC", trait_id)
}

/// `1.0 + 0.1 × max(0, n − 2)`.
pub fn rarity_bonus(condition_count: usize) -> f64 {
    let extra = condition_count.saturating_sub(RARITY_FREE_CONDITIONS);
    r3(1.0 + RARITY_STEP * extra as f64)
}

// ============================================================================
// Transformer
// ============================================================================

/// Converts classified source records into runtime records.
#[derive(Debug, Clone, Copy)]
pub struct HybridTransformer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> HybridTransformer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Transform every record, preserving corpus order.
    pub fn transform_corpus(&self, corpus: &TraitCorpus) -> Vec<RuntimeTrait> {
        let out: Vec<RuntimeTrait> = corpus.records().iter().map(|r| self.transform(r)).collect();
        log::info!("transformed {} traits into the hybrid model", out.len());
        out
    }

    pub fn transform(&self, record: &TraitRecord) -> RuntimeTrait {
        match &record.kind {
            TraitKind::Facet(condition) => {
                RuntimeTrait::Facet(self.transform_facet(record, condition))
            }
            TraitKind::Composite(items) => {
                let composite = self.transform_composite(record, items);
                if record.dark {
                    RuntimeTrait::Dark(composite)
                } else {
                    RuntimeTrait::Composite(composite)
                }
            }
        }
    }

    fn transform_facet(&self, record: &TraitRecord, c: &FacetCondition) -> RuntimeFacetTrait {
        let th = c.threshold;
        let (t_on, t_off, sigmoid_raw, salience_center) = match c.direction {
            Direction::High => (
                th - HYSTERESIS_ON_OFFSET,
                th - HYSTERESIS_OFF_OFFSET,
                SIGMOID_BASE + SIGMOID_GAIN * (1.0 - th),
                th - SALIENCE_CENTER_OFFSET,
            ),
            Direction::Low => (
                th + HYSTERESIS_ON_OFFSET,
                th + HYSTERESIS_OFF_OFFSET,
                SIGMOID_BASE + SIGMOID_GAIN * th,
                th + SALIENCE_CENTER_OFFSET,
            ),
        };

        let mutex_group = self
            .config
            .mutex_group_for(&record.id)
            .unwrap_or(&c.facet)
            .to_string();
        let axis = c
            .facet
            .split_once('_')
            .map_or(c.facet.as_str(), |(axis, _)| axis)
            .to_string();

        RuntimeFacetTrait {
            id: record.id.clone(),
            name_key: name_key(&record.id),
            desc_key: desc_key(&record.id),
            valence: record.valence.clone(),
            facet: c.facet.clone(),
            direction: c.direction,
            threshold: r3(th),
            t_on: r3(t_on),
            t_off: r3(t_off),
            sigmoid_s: r3(sigmoid_raw.clamp(SIGMOID_MIN, SIGMOID_MAX)),
            salience_center: r3(salience_center),
            salience_width: SALIENCE_WIDTH,
            mutex_group,
            axis,
        }
    }

    fn transform_composite(
        &self,
        record: &TraitRecord,
        items: &[ConditionItem],
    ) -> RuntimeCompositeTrait {
        let conditions: Vec<ConditionBand> = items
            .iter()
            .map(|item| {
                let c = &item.condition;
                let cond_center = match c.direction {
                    Direction::High => c.threshold - CONDITION_CENTER_OFFSET,
                    Direction::Low => c.threshold + CONDITION_CENTER_OFFSET,
                };
                ConditionBand {
                    facet: c.facet.clone(),
                    direction: c.direction,
                    threshold: r3(c.threshold),
                    cond_center: r3(cond_center),
                    cond_width: CONDITION_WIDTH,
                }
            })
            .collect();

        RuntimeCompositeTrait {
            id: record.id.clone(),
            name_key: name_key(&record.id),
            desc_key: desc_key(&record.id),
            valence: record.valence.clone(),
            rarity_bonus: rarity_bonus(conditions.len()),
            conditions,
            violation_override: record.dark.then_some(true),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
