//! Emotion-modifier entries, bucketed by modifier kind.
//!
//! Source keys look like `fear_sensitivity`, `anger_baseline` or
//! `joy_mult`.  A key with no recognised suffix is treated as a multiplier on
//! the whole key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::{Direction, TraitCorpus};
use crate::utilities::rounding::r3;

use super::{sort_entries, ActionMap, Attributed};

/// How a modifier applies to its emotion metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKind {
    Sensitivity,
    Baseline,
    Mult,
}

impl ModifierKind {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "sensitivity" => Some(Self::Sensitivity),
            "baseline" => Some(Self::Baseline),
            "mult" => Some(Self::Mult),
            _ => None,
        }
    }
}

/// Split a raw modifier key into its metric and kind.
///
/// The split happens at the last `_`; an unrecognised suffix or empty stem
/// keeps the whole key as a `mult` metric.
pub fn parse_emotion_key(key: &str) -> (&str, ModifierKind) {
    if let Some((stem, suffix)) = key.rsplit_once('_') {
        if !stem.is_empty() {
            if let Some(kind) = ModifierKind::from_suffix(suffix) {
                return (stem, kind);
            }
        }
    }
    (key, ModifierKind::Mult)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionEntry {
    pub trait_id: String,
    pub extreme_mult: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl Attributed for EmotionEntry {
    fn trait_id(&self) -> &str {
        &self.trait_id
    }
}

/// Metric maps per modifier kind.  Always serializes all three buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionMap {
    pub sensitivity: ActionMap<EmotionEntry>,
    pub baseline: ActionMap<EmotionEntry>,
    pub mult: ActionMap<EmotionEntry>,
}

impl EmotionMap {
    pub fn bucket(&self, kind: ModifierKind) -> &ActionMap<EmotionEntry> {
        match kind {
            ModifierKind::Sensitivity => &self.sensitivity,
            ModifierKind::Baseline => &self.baseline,
            ModifierKind::Mult => &self.mult,
        }
    }

    fn bucket_mut(&mut self, kind: ModifierKind) -> &mut ActionMap<EmotionEntry> {
        match kind {
            ModifierKind::Sensitivity => &mut self.sensitivity,
            ModifierKind::Baseline => &mut self.baseline,
            ModifierKind::Mult => &mut self.mult,
        }
    }

    /// Total metrics across all buckets.
    pub fn metric_count(&self) -> usize {
        self.sensitivity.len() + self.baseline.len() + self.mult.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metric_count() == 0
    }

    /// Metric counts keyed by bucket name, for summaries.
    pub fn bucket_sizes(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("sensitivity", self.sensitivity.len()),
            ("baseline", self.baseline.len()),
            ("mult", self.mult.len()),
        ])
    }
}

pub fn build_emotion_map(corpus: &TraitCorpus) -> EmotionMap {
    let mut map = EmotionMap::default();
    for record in corpus.records() {
        let Some(modifiers) = &record.effects.emotion_modifiers else {
            continue;
        };
        let condition = record.facet_condition();
        for (raw_key, value) in modifiers {
            let (metric, kind) = parse_emotion_key(raw_key);
            map.bucket_mut(kind)
                .entry(metric.to_string())
                .or_default()
                .push(EmotionEntry {
                    trait_id: record.id.clone(),
                    extreme_mult: r3(*value),
                    facet: condition.map(|c| c.facet.clone()),
                    direction: condition.map(|c| c.direction),
                });
        }
    }
    for kind in [ModifierKind::Sensitivity, ModifierKind::Baseline, ModifierKind::Mult] {
        sort_entries(map.bucket_mut(kind));
    }
    map
}
