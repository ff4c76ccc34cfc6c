//! Display-key tables.
//!
//! Runtime records only carry `TRAIT_<id>_NAME` / `TRAIT_<id>_DESC` keys.
//! This module builds the per-locale tables those keys resolve against, plus
//! the fixed trait event templates, and checks runtime keys against any
//! existing key tables the caller supplies.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::PipelineConfig;
use crate::corpus::TraitCorpus;
use crate::error::{PipelineError, Result};
use crate::hybrid::{desc_key, name_key, RuntimeTrait};

/// Trait event templates per locale code, embedded at compile time.
const EMBEDDED_EVENTS_JSON: &str = include_str!("events.json");

/// Locale used for event templates when a configured locale has none.
const FALLBACK_LOCALE: &str = "en";

/// Key → display text, in insertion order.
pub type KeyTable = Map<String, Value>;

/// Everything written for one locale.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleBundle {
    pub code: String,
    pub traits: KeyTable,
    pub events: KeyTable,
}

impl LocaleBundle {
    pub fn traits_path(&self) -> PathBuf {
        Path::new("locales").join(&self.code).join("traits.json")
    }

    pub fn events_path(&self) -> PathBuf {
        Path::new("locales").join(&self.code).join("traits_events.json")
    }
}

/// The event templates for `code`, falling back to English.
pub fn event_templates(code: &str) -> Result<KeyTable> {
    let mut all: Map<String, Value> = serde_json::from_str(EMBEDDED_EVENTS_JSON)?;
    let picked = match all.remove(code) {
        Some(table) => table,
        None => {
            log::warn!(
                "no trait event templates for locale '{}', using '{}'",
                code,
                FALLBACK_LOCALE
            );
            all.remove(FALLBACK_LOCALE).unwrap_or_default()
        }
    };
    match picked {
        Value::Object(table) => Ok(table),
        _ => Ok(KeyTable::new()),
    }
}

/// Build one bundle per configured locale, keys in corpus order.
pub fn build_locales(corpus: &TraitCorpus, config: &PipelineConfig) -> Result<Vec<LocaleBundle>> {
    let mut bundles = Vec::with_capacity(config.locales.len());
    for locale in &config.locales {
        let mut traits = KeyTable::new();
        for (record, raw) in corpus.records().iter().zip(corpus.raw()) {
            traits.insert(
                name_key(&record.id),
                Value::String(text_of(raw.get(&locale.name_field))),
            );
            traits.insert(
                desc_key(&record.id),
                Value::String(text_of(raw.get(&locale.desc_field))),
            );
        }
        log::debug!("locale {}: {} trait keys", locale.code, traits.len());
        bundles.push(LocaleBundle {
            code: locale.code.clone(),
            traits,
            events: event_templates(&locale.code)?,
        });
    }
    Ok(bundles)
}

/// Missing or null text becomes an empty string; other scalars are stringified.
fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Existing key tables
// ============================================================================

/// Read a flat JSON key table.
pub fn load_key_table(path: impl AsRef<Path>) -> Result<KeyTable> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(table) => Ok(table),
        _ => Err(PipelineError::shape(
            "<key-table>",
            path.display().to_string(),
            "a JSON object of keys",
            "another JSON value",
        )),
    }
}

/// Runtime name/desc keys absent from `table`, in runtime order.
pub fn missing_references(runtime: &[RuntimeTrait], table: &KeyTable) -> Vec<String> {
    runtime
        .iter()
        .flat_map(|t| [t.name_key(), t.desc_key()])
        .filter(|key| !table.contains_key(*key))
        .map(str::to_string)
        .collect()
}

/// Log a warning for each runtime key missing from `table`; returns how many.
pub fn warn_missing_references(runtime: &[RuntimeTrait], source: &Path, table: &KeyTable) -> usize {
    let missing = missing_references(runtime, table);
    for key in &missing {
        log::warn!("key {} is not present in {}", key, source.display());
    }
    missing.len()
}
