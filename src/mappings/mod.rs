//! Cross-reference maps: action-indexed lookups over the source corpus.
//!
//! Three maps are extracted from the classified corpus (never from the
//! runtime model):
//!
//! - [`BehaviorMap`]: action → traits that weight it
//! - [`EmotionMap`]: `sensitivity` / `baseline` / `mult` → metric → traits
//! - [`ViolationMap`]: action → traits that feel stress when it is violated
//!
//! Outer keys are sorted (`BTreeMap`) and every entry list is stably sorted
//! by `trait_id`, so identical input always serializes identically.

pub mod behavior;
pub mod emotion;
pub mod violation;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::corpus::TraitCorpus;

pub use behavior::{build_behavior_map, BehaviorEntry, BehaviorMap, BehaviorSource};
pub use emotion::{build_emotion_map, parse_emotion_key, EmotionEntry, EmotionMap, ModifierKind};
pub use violation::{build_violation_map, has_violation_entry, ViolationEntry, ViolationMap};

/// Key → trait-attributed entries.
pub type ActionMap<E> = BTreeMap<String, Vec<E>>;

/// An entry attributed to one source trait.
pub trait Attributed {
    fn trait_id(&self) -> &str;
}

/// Stable-sort every entry list by trait id.
pub(crate) fn sort_entries<E: Attributed>(map: &mut ActionMap<E>) {
    for entries in map.values_mut() {
        entries.sort_by(|a, b| a.trait_id().cmp(b.trait_id()));
    }
}

/// All three maps from one corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReferences {
    pub behavior: BehaviorMap,
    pub emotion: EmotionMap,
    pub violation: ViolationMap,
}

impl CrossReferences {
    pub fn extract(corpus: &TraitCorpus, config: &PipelineConfig) -> Self {
        let refs = Self {
            behavior: build_behavior_map(corpus),
            emotion: build_emotion_map(corpus),
            violation: build_violation_map(corpus, config.violation_alpha),
        };
        log::info!(
            "extracted {} behavior actions, {} emotion metrics, {} violation actions",
            refs.behavior.len(),
            refs.emotion.metric_count(),
            refs.violation.len()
        );
        refs
    }
}
