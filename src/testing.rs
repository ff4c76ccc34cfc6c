//! Corpus builders shared by unit tests.

use serde_json::{json, Value};

use crate::config::PipelineConfig;

/// A corpus that passes every gate check under `config`: one facet per
/// sub-dimension pole, the golden facets and dark trait, a 3-condition
/// composite and a composite with an explicit (empty) map.
pub(crate) fn complete_corpus(config: &PipelineConfig) -> Value {
    let mut traits = Vec::new();
    for (token, pair) in &config.sub_dimensions {
        for (id, direction, threshold) in [(&pair.high, "high", 0.8), (&pair.low, "low", 0.2)] {
            let threshold = match id.as_str() {
                "f_sincere" => 0.92,
                "f_deceptive" => 0.14,
                _ => threshold,
            };
            traits.push(json!({
                "id": id,
                "name_kr": format!("{} 이름", id),
                "name_en": id,
                "description_kr": "",
                "description_en": format!("Description of {}", id),
                "valence": "neutral",
                "condition": {"facet": token, "direction": direction, "threshold": threshold},
            }));
        }
    }

    for t in traits.iter_mut() {
        match t["id"].as_str() {
            Some("f_sincere") => {
                t["effects"] = json!({
                    "behavior_weights": {"lie": -0.9, "confess": 0.6},
                    "emotion_modifiers": {"guilt_sensitivity": 1.4},
                    "stress_modifiers": {"violation_stress": {"lie": 14.0, "betray": 8.0}}
                });
            }
            Some("f_deceptive") => {
                t["effects"] = json!({
                    "behavior_weights": {"lie": 0.8},
                    "stress_modifiers": {"violation_stress": {"lie": 0.0}}
                });
            }
            Some("f_fair_minded") => {
                t["effects"] = json!({"stress_modifiers": {"violation_stress": {"cheat": 12.0}}});
            }
            _ => {}
        }
    }

    traits.push(json!({
        "id": "c_hx_charmer",
        "name_en": "Charmer",
        "valence": "negative",
        "condition": {"all": [
            {"facet": "H", "direction": "low", "threshold": 0.3},
            {"facet": "X", "direction": "high", "threshold": 0.7},
            {"facet": "A_gentleness", "direction": "high", "threshold": 0.6}
        ]},
        "effects": {"emotion_modifiers": {"pride_baseline": 0.1}}
    }));
    traits.push(json!({
        "id": "c_honest_worker",
        "condition": {"all": [
            {"facet": "H_sincerity", "direction": "high", "threshold": 0.7},
            {"facet": "C_diligence", "direction": "high", "threshold": 0.7}
        ]},
        "effects": {"stress_modifiers": {"violation_stress": {}}}
    }));
    traits.push(json!({
        "id": "d_psychopath_primary",
        "valence": "negative",
        "condition": {"all": [
            {"facet": "H", "direction": "low", "threshold": 0.2},
            {"facet": "E_fearfulness", "direction": "low", "threshold": 0.2},
            {"facet": "A", "direction": "low", "threshold": 0.25},
            {"facet": "C_prudence", "direction": "low", "threshold": 0.3}
        ]},
        "effects": {"stress_modifiers": {"violation_stress": {"harm_innocent": 0.0, "lie": 0.0}}}
    }));

    Value::Array(traits)
}

/// Built-in config with the locale count matched to [`complete_corpus`].
pub(crate) fn complete_setup() -> (PipelineConfig, Value) {
    let mut config = PipelineConfig::builtin().unwrap();
    let corpus = complete_corpus(&config);
    let records = corpus.as_array().map_or(0, Vec::len);
    config.expected_locale_keys = Some(2 * records);
    (config, corpus)
}
