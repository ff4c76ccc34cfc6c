//! Trait corpus loading and classification.
//!
//! The corpus is a JSON array of trait records.  Each record is classified
//! by its condition shape and its `effects` block is parsed into the typed
//! [`Effects`] schema.  Any record that fails either step aborts the whole
//! load with a [`PipelineError::ConfigurationShape`] naming the trait, the
//! offending field, and what was expected.
//!
//! The raw JSON values are kept alongside the typed records: the derivation
//! stage copies them verbatim into its side artifact and the locale stage
//! reads display text from them.

pub mod classify;
pub mod record;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde_json::Value;

use crate::config::{IdPrefixes, PipelineConfig};
use crate::error::{PipelineError, Result};

pub use classify::{classify, Classification, ShapeFault};
pub use record::{
    ConditionItem, Direction, Effects, FacetCondition, StressModifiers, TraitKind, TraitRecord,
};

/// Facet id → {action: violation stress}, from facets that carry an explicit map.
pub type FacetViolationMap = BTreeMap<String, BTreeMap<String, f64>>;

/// A loaded, fully classified corpus.
#[derive(Debug, Clone)]
pub struct TraitCorpus {
    raw: Vec<Value>,
    records: Vec<TraitRecord>,
    prefixes: IdPrefixes,
}

impl TraitCorpus {
    /// Read and classify a corpus file.
    pub fn load(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value =
            serde_json::from_str(&content).map_err(|source| PipelineError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let corpus = Self::from_document(document, config)?;
        log::info!(
            "loaded {} traits from {}",
            corpus.records.len(),
            path.display()
        );
        Ok(corpus)
    }

    /// Classify an already-parsed corpus document.
    pub fn from_document(document: Value, config: &PipelineConfig) -> Result<Self> {
        match document {
            Value::Array(items) => Self::from_values(items, config),
            other => Err(PipelineError::shape(
                "<corpus>",
                "$",
                "a list of trait records",
                type_name(&other),
            )),
        }
    }

    /// Classify a list of raw records.
    pub fn from_values(raw: Vec<Value>, config: &PipelineConfig) -> Result<Self> {
        let mut records = Vec::with_capacity(raw.len());
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        for (index, value) in raw.iter().enumerate() {
            let record = parse_record(index, value, config)?;
            if let Some(previous) = first_seen.insert(record.id.clone(), index) {
                return Err(PipelineError::shape(
                    record.id,
                    "id",
                    "a globally unique id",
                    format!("duplicate of record #{}", previous),
                ));
            }
            records.push(record);
        }

        Ok(Self {
            raw,
            records,
            prefixes: config.prefixes.clone(),
        })
    }

    pub fn records(&self) -> &[TraitRecord] {
        &self.records
    }

    /// The source values, index-aligned with [`Self::records`].
    pub fn raw(&self) -> &[Value] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in the facet family, by id prefix.
    ///
    /// Families follow the reserved prefixes, not the condition shape, so a
    /// record whose prefix and shape disagree is grouped by its prefix.
    pub fn facets(&self) -> impl Iterator<Item = &TraitRecord> {
        let prefix = &self.prefixes.facet;
        self.records.iter().filter(move |r| r.id.starts_with(prefix.as_str()))
    }

    /// Records in the composite family, by id prefix.  Dark-tetrad ids are not included.
    pub fn composites(&self) -> impl Iterator<Item = &TraitRecord> {
        let prefix = &self.prefixes.composite;
        self.records.iter().filter(move |r| r.id.starts_with(prefix.as_str()))
    }

    pub fn dark(&self) -> impl Iterator<Item = &TraitRecord> {
        self.records.iter().filter(|r| r.dark)
    }

    pub fn get(&self, trait_id: &str) -> Option<&TraitRecord> {
        self.records.iter().find(|r| r.id == trait_id)
    }

    /// Facet id → explicit violation-stress map.
    pub fn facet_violation_map(&self) -> FacetViolationMap {
        self.facets()
            .filter_map(|f| {
                f.effects
                    .violation_stress()
                    .map(|m| (f.id.clone(), m.clone()))
            })
            .collect()
    }
}

fn parse_record(index: usize, value: &Value, config: &PipelineConfig) -> Result<TraitRecord> {
    let fallback_id = format!("#{}", index);
    let Some(obj) = value.as_object() else {
        return Err(PipelineError::shape(
            fallback_id,
            "$",
            "a trait object",
            type_name(value),
        ));
    };

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        other => {
            return Err(PipelineError::shape(
                fallback_id,
                "id",
                "a non-empty string",
                other.map(type_name).unwrap_or("nothing"),
            ))
        }
    };

    let kind = match classify(obj.get("condition")) {
        Classification::Facet(c) => TraitKind::Facet(c),
        Classification::Composite(items) => TraitKind::Composite(items),
        Classification::Invalid(fault) => {
            return Err(PipelineError::shape(
                id,
                fault.field,
                fault.expected,
                fault.actual,
            ))
        }
    };

    let effects = match obj.get("effects") {
        None | Some(Value::Null) => Effects::default(),
        Some(raw) => serde_json::from_value::<Effects>(raw.clone()).map_err(|e| {
            PipelineError::shape(id.clone(), "effects", "numeric effect maps", e.to_string())
        })?,
    };

    let valence = match obj.get("valence") {
        None | Some(Value::Null) => "neutral".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(PipelineError::shape(
                id,
                "valence",
                "a string",
                other.to_string(),
            ))
        }
    };

    let dark = matches!(kind, TraitKind::Composite(_)) && config.is_dark(&id);

    Ok(TraitRecord {
        id,
        valence,
        kind,
        dark,
        effects,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================
