//! Action → behavior-weight entries.

use serde::{Deserialize, Serialize};

use crate::corpus::{Direction, TraitCorpus, TraitRecord};
use crate::utilities::rounding::r3;

use super::{sort_entries, ActionMap, Attributed};

pub type BehaviorMap = ActionMap<BehaviorEntry>;

/// Where a behavior weight came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorSource {
    Facet,
    Composite,
}

/// One trait's weight on an action.
///
/// Facet entries also carry the facet condition so a runtime can scale the
/// weight by how far past threshold the agent sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEntry {
    pub trait_id: String,
    pub extreme_val: f64,
    pub source: BehaviorSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl Attributed for BehaviorEntry {
    fn trait_id(&self) -> &str {
        &self.trait_id
    }
}

impl BehaviorEntry {
    fn new(record: &TraitRecord, value: f64) -> Self {
        let condition = record.facet_condition();
        Self {
            trait_id: record.id.clone(),
            extreme_val: r3(value),
            source: if condition.is_some() {
                BehaviorSource::Facet
            } else {
                BehaviorSource::Composite
            },
            facet: condition.map(|c| c.facet.clone()),
            direction: condition.map(|c| c.direction),
            threshold: condition.map(|c| r3(c.threshold)),
        }
    }
}

pub fn build_behavior_map(corpus: &TraitCorpus) -> BehaviorMap {
    let mut map = BehaviorMap::new();
    for record in corpus.records() {
        let Some(weights) = &record.effects.behavior_weights else {
            continue;
        };
        for (action, value) in weights {
            map.entry(action.clone())
                .or_default()
                .push(BehaviorEntry::new(record, *value));
        }
    }
    sort_entries(&mut map);
    map
}
