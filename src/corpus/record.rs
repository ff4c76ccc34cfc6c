//! Typed trait records, validated once at the load boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which pole of a facet or axis a condition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    High,
    Low,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single facet/direction/threshold triple.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetCondition {
    /// Facet token, e.g. `H_sincerity` (or a bare axis letter inside composites).
    pub facet: String,
    pub direction: Direction,
    pub threshold: f64,
}

/// One AND-condition of a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionItem {
    pub condition: FacetCondition,
    /// Set when the item also references another trait rather than a plain facet.
    pub trait_ref: Option<String>,
}

/// Classified condition shape.
#[derive(Debug, Clone, PartialEq)]
pub enum TraitKind {
    Facet(FacetCondition),
    Composite(Vec<ConditionItem>),
}

/// `effects.stress_modifiers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressModifiers {
    #[serde(default)]
    pub violation_stress: Option<BTreeMap<String, f64>>,
}

/// `effects`. Every sub-map is optional and absent maps stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    #[serde(default)]
    pub behavior_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub emotion_modifiers: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub stress_modifiers: Option<StressModifiers>,
}

impl Effects {
    /// The explicit violation-stress map, if the record carries one.
    pub fn violation_stress(&self) -> Option<&BTreeMap<String, f64>> {
        self.stress_modifiers
            .as_ref()
            .and_then(|s| s.violation_stress.as_ref())
    }
}

/// A validated source trait.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitRecord {
    pub id: String,
    /// Defaults to `"neutral"` when the source omits it.
    pub valence: String,
    pub kind: TraitKind,
    /// Dark-tetrad composite (reserved id prefix).
    pub dark: bool,
    pub effects: Effects,
}

impl TraitRecord {
    pub fn is_facet(&self) -> bool {
        matches!(self.kind, TraitKind::Facet(_))
    }

    pub fn facet_condition(&self) -> Option<&FacetCondition> {
        match &self.kind {
            TraitKind::Facet(c) => Some(c),
            TraitKind::Composite(_) => None,
        }
    }

    pub fn conditions(&self) -> &[ConditionItem] {
        match &self.kind {
            TraitKind::Facet(_) => &[],
            TraitKind::Composite(items) => items,
        }
    }
}
