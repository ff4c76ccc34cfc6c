//! Action → violation-stress entries.
//!
//! Built from every record's explicit `violation_stress` map, dark-tetrad
//! included.  Zero is a meaningful value here and is kept as an entry.

use serde::{Deserialize, Serialize};

use crate::corpus::TraitCorpus;
use crate::utilities::rounding::r3;

use super::{sort_entries, ActionMap, Attributed};

pub type ViolationMap = ActionMap<ViolationEntry>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEntry {
    pub trait_id: String,
    pub base_stress: f64,
    /// Amplification exponent applied at runtime.
    pub alpha: f64,
}

impl Attributed for ViolationEntry {
    fn trait_id(&self) -> &str {
        &self.trait_id
    }
}

pub fn build_violation_map(corpus: &TraitCorpus, alpha: f64) -> ViolationMap {
    let mut map = ViolationMap::new();
    for record in corpus.records() {
        let Some(stress) = record.effects.violation_stress() else {
            continue;
        };
        for (action, value) in stress {
            map.entry(action.clone()).or_default().push(ViolationEntry {
                trait_id: record.id.clone(),
                base_stress: r3(*value),
                alpha,
            });
        }
    }
    sort_entries(&mut map);
    map
}

/// Whether `map` holds `action → trait_id` with the given base stress (±0.001).
pub fn has_violation_entry(map: &ViolationMap, action: &str, trait_id: &str, base_stress: f64) -> bool {
    map.get(action).is_some_and(|entries| {
        entries
            .iter()
            .any(|e| e.trait_id == trait_id && (e.base_stress - base_stress).abs() <= 0.001)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use serde_json::json;

    #[test]
    fn test_zero_values_are_kept() {
        let corpus = TraitCorpus::from_document(
            json!([
                {
                    "id": "f_sincere",
                    "condition": {"facet": "H_sincerity", "direction": "high", "threshold": 0.92},
                    "effects": {"stress_modifiers": {"violation_stress": {"lie": 14.0}}}
                },
                {
                    "id": "d_psychopath_primary",
                    "condition": {"all": [
                        {"facet": "H", "direction": "low", "threshold": 0.2},
                        {"facet": "A", "direction": "low", "threshold": 0.25}
                    ]},
                    "effects": {"stress_modifiers": {"violation_stress": {"harm_innocent": 0.0, "lie": 0.0}}}
                }
            ]),
            &PipelineConfig::builtin().unwrap(),
        )
        .unwrap();
        let map = build_violation_map(&corpus, 1.2);

        assert!(has_violation_entry(&map, "lie", "f_sincere", 14.0));
        assert!(has_violation_entry(&map, "harm_innocent", "d_psychopath_primary", 0.0));
        assert!(!has_violation_entry(&map, "harm_innocent", "f_sincere", 0.0));
        assert_eq!(map["lie"][0].trait_id, "d_psychopath_primary");
        assert_eq!(map["lie"][1].alpha, 1.2);
    }
}
