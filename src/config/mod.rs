//! Pipeline configuration: the static tables every stage reads.
//!
//! The axis→facet tables, mutex pairs, decay rules, stress bounds and golden
//! fixtures are plain data.  They are loaded once (from the embedded
//! `defaults.yaml`, optionally overlaid with a user YAML file) and then passed
//! by reference into each stage, so every stage can be tested against a
//! substitute table.
//!
//! # Example override
//!
//! ```yaml
//! expected_locale_keys: 12
//! golden:
//!   composites: []
//! ```
//!
//! Mappings in an override file are merged key-by-key over the built-in
//! tables; sequences and scalars replace the built-in value wholesale.  An
//! explicit `null` replaces it too, so `expected_locale_keys: null` turns the
//! locale count check off.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::corpus::Direction;

/// Built-in tables, embedded at compile time.
const EMBEDDED_DEFAULTS_YAML: &str = include_str!("defaults.yaml");

/// Errors raised while loading or checking a [`PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing or deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The override file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The two-axis id pattern is not a valid regex.
    #[error("invalid two-axis id pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The tables are internally inconsistent.
    #[error("invalid pipeline config: {0}")]
    Invalid(String),
}

// ============================================================================
// Tables
// ============================================================================

/// Reserved id prefixes used to tell trait families apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdPrefixes {
    pub facet: String,
    pub composite: String,
    /// Dark-tetrad composites; their violation stress is authoritative.
    pub dark: String,
}

/// The canonical facets for each pole of one axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoleFacets {
    pub high: Vec<String>,
    pub low: Vec<String>,
}

impl PoleFacets {
    pub fn get(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::High => &self.high,
            Direction::Low => &self.low,
        }
    }
}

/// The single facet at each pole of one sub-dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolePair {
    pub high: String,
    pub low: String,
}

impl PolePair {
    pub fn get(&self, direction: Direction) -> &String {
        match direction {
            Direction::High => &self.high,
            Direction::Low => &self.low,
        }
    }
}

/// Decay factors for composite violation-stress derivation, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Regex matched against composite ids naming exactly two axes.
    pub two_axis_pattern: String,
    pub two_axis: f64,
    /// Any condition carries a `trait` reference.
    pub trait_reference: f64,
    /// Every facet token is a bare axis letter.
    pub axis_only: f64,
    pub axis_only_min_conditions: usize,
    pub default: f64,
}

/// Violation-stress value range and the floor below which derived values are noise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StressBounds {
    pub min: f64,
    pub max: f64,
    pub noise_floor: f64,
}

impl StressBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Which source text fields feed one locale's key table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleSpec {
    pub code: String,
    pub name_field: String,
    pub desc_field: String,
}

/// Expected runtime values for one facet trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetGolden {
    pub trait_id: String,
    #[serde(default)]
    pub t_on: Option<f64>,
    #[serde(default)]
    pub t_off: Option<f64>,
    #[serde(default)]
    pub salience_center: Option<f64>,
}

/// Expected runtime values for one composite trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeGolden {
    pub trait_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub violation_override: Option<bool>,
    #[serde(default)]
    pub rarity_bonus: Option<f64>,
}

/// An entry that must appear in the violation map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationGolden {
    pub action: String,
    pub trait_id: String,
    pub base_stress: f64,
}

/// Golden values checked by the validation gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoldenFixtures {
    #[serde(default)]
    pub facets: Vec<FacetGolden>,
    #[serde(default)]
    pub composites: Vec<CompositeGolden>,
    #[serde(default)]
    pub violations: Vec<ViolationGolden>,
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// Immutable configuration shared by every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Axis letters, e.g. `H`, `E`, `X`.
    pub axes: Vec<String>,
    pub prefixes: IdPrefixes,
    /// Axis letter → four canonical facets per pole.
    pub axis_facets: BTreeMap<String, PoleFacets>,
    /// Sub-dimension token (e.g. `H_sincerity`) → one facet per pole.
    pub sub_dimensions: BTreeMap<String, PolePair>,
    /// Mutex group key → the two opposite-pole facet ids.
    pub mutex_pairs: BTreeMap<String, [String; 2]>,
    pub decay: DecayConfig,
    pub stress: StressBounds,
    /// Amplification applied by the runtime consumer, never baked into stored values.
    pub violation_alpha: f64,
    /// Display text fields that must never reach the runtime model.
    pub text_fields: Vec<String>,
    pub locales: Vec<LocaleSpec>,
    /// Expected key count per locale table; `None` disables the check.
    pub expected_locale_keys: Option<usize>,
    pub golden: GoldenFixtures,
}

impl PipelineConfig {
    /// The built-in tables.
    pub fn builtin() -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(EMBEDDED_DEFAULTS_YAML)?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in tables overlaid with the mappings in `yaml`.
    pub fn from_yaml_overrides(yaml: &str) -> Result<Self, ConfigError> {
        let defaults: YamlValue = serde_yaml::from_str(EMBEDDED_DEFAULTS_YAML)?;
        let merged = match serde_yaml::from_str::<YamlValue>(yaml)? {
            // an empty document has no overrides
            YamlValue::Null => defaults,
            overrides => merge_yaml(defaults, overrides),
        };
        let config: Self = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an override file from disk.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded config overrides from {}", path.display());
        Self::from_yaml_overrides(&content)
    }

    /// Reject tables that would make the pipeline's invariants unsatisfiable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.axes.is_empty() {
            return Err(ConfigError::Invalid("axes must not be empty".into()));
        }
        for axis in self.axis_facets.keys() {
            if !self.is_axis(axis) {
                return Err(ConfigError::Invalid(format!(
                    "axis_facets key '{}' is not a declared axis",
                    axis
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for (key, [a, b]) in &self.mutex_pairs {
            if a == b {
                return Err(ConfigError::Invalid(format!(
                    "mutex pair '{}' must name two distinct facets, got '{}' twice",
                    key, a
                )));
            }
            for id in [a, b] {
                if !seen.insert(id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "facet '{}' appears in more than one mutex pair",
                        id
                    )));
                }
            }
        }

        let d = &self.decay;
        for (name, factor) in [
            ("two_axis", d.two_axis),
            ("trait_reference", d.trait_reference),
            ("axis_only", d.axis_only),
            ("default", d.default),
        ] {
            if !(factor > 0.0 && factor.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "decay.{} must be a positive number, got {}",
                    name, factor
                )));
            }
        }
        Regex::new(&d.two_axis_pattern)?;

        let s = &self.stress;
        if !(s.min <= s.noise_floor && s.noise_floor <= s.max) {
            return Err(ConfigError::Invalid(format!(
                "stress bounds must satisfy min <= noise_floor <= max, got {} / {} / {}",
                s.min, s.noise_floor, s.max
            )));
        }

        let mut codes = BTreeSet::new();
        for locale in &self.locales {
            if !codes.insert(locale.code.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "locale '{}' is declared twice",
                    locale.code
                )));
            }
        }
        Ok(())
    }

    pub fn is_axis(&self, token: &str) -> bool {
        self.axes.iter().any(|a| a == token)
    }

    pub fn is_dark(&self, trait_id: &str) -> bool {
        trait_id.starts_with(&self.prefixes.dark)
    }

    /// The facets an AND-condition token stands for.
    ///
    /// An axis token expands to that pole's canonical facets, a sub-dimension
    /// token to its single facet; anything else resolves to nothing.
    pub fn resolve_condition(&self, token: &str, direction: Direction) -> Vec<&str> {
        if let Some(poles) = self.axis_facets.get(token) {
            return poles.get(direction).iter().map(String::as_str).collect();
        }
        if let Some(pair) = self.sub_dimensions.get(token) {
            return vec![pair.get(direction).as_str()];
        }
        Vec::new()
    }

    /// The mutex group key configured for `trait_id`, if it belongs to a pair.
    pub fn mutex_group_for(&self, trait_id: &str) -> Option<&str> {
        self.mutex_pairs
            .iter()
            .find(|(_, pair)| pair.iter().any(|id| id == trait_id))
            .map(|(key, _)| key.as_str())
    }
}

/// Deep-merge `overrides` into `defaults`.
///
/// Mappings merge recursively; every other value in `overrides` replaces the
/// default outright.
fn merge_yaml(defaults: YamlValue, overrides: YamlValue) -> YamlValue {
    match (defaults, overrides) {
        (YamlValue::Mapping(mut base), YamlValue::Mapping(over)) => {
            for (key, value) in over {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            YamlValue::Mapping(base)
        }
        (_, over) => over,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_load() {
        let config = PipelineConfig::builtin().unwrap();
        assert_eq!(config.axes.len(), 6);
        assert_eq!(config.axis_facets.len(), 6);
        assert_eq!(config.sub_dimensions.len(), 24);
        assert_eq!(config.mutex_pairs.len(), 24);
        assert_eq!(config.violation_alpha, 1.2);
        assert_eq!(config.expected_locale_keys, Some(374));
    }

    #[test]
    fn test_resolve_axis_and_sub_dimension_tokens() {
        let config = PipelineConfig::builtin().unwrap();
        assert_eq!(
            config.resolve_condition("H", Direction::High),
            vec!["f_sincere", "f_fair_minded", "f_frugal", "f_modest"]
        );
        assert_eq!(
            config.resolve_condition("H_sincerity", Direction::Low),
            vec!["f_deceptive"]
        );
        assert!(config.resolve_condition("Z_unknown", Direction::High).is_empty());
    }

    #[test]
    fn test_mutex_group_lookup() {
        let config = PipelineConfig::builtin().unwrap();
        assert_eq!(config.mutex_group_for("f_sincere"), Some("H_sincerity"));
        assert_eq!(config.mutex_group_for("f_utilitarian"), Some("O_aesthetic"));
        assert_eq!(config.mutex_group_for("c_anything"), None);
    }

    #[test]
    fn test_overrides_merge_over_builtin() {
        let yaml = r#"
expected_locale_keys: 8
stress:
  max: 25.0
golden:
  composites: []
"#;
        let config = PipelineConfig::from_yaml_overrides(yaml).unwrap();
        assert_eq!(config.expected_locale_keys, Some(8));
        assert_eq!(config.stress.max, 25.0);
        // untouched siblings survive the merge
        assert_eq!(config.stress.noise_floor, 1.0);
        assert!(config.golden.composites.is_empty());
        assert_eq!(config.golden.facets.len(), 2);
        assert_eq!(config.mutex_pairs.len(), 24);
    }

    #[test]
    fn test_empty_override_is_builtin() {
        let config = PipelineConfig::from_yaml_overrides("").unwrap();
        assert_eq!(config.mutex_pairs.len(), 24);
    }

    #[test]
    fn test_null_disables_locale_count() {
        let config = PipelineConfig::from_yaml_overrides("expected_locale_keys: null").unwrap();
        assert_eq!(config.expected_locale_keys, None);
        // siblings keep their built-in values
        assert_eq!(config.violation_alpha, 1.2);
    }

    #[test]
    fn test_whitespace_only_override_is_builtin() {
        let config = PipelineConfig::from_yaml_overrides("\n# nothing here\n").unwrap();
        assert_eq!(config.expected_locale_keys, Some(374));
    }

    #[test]
    fn test_null_for_required_table_is_rejected() {
        let err = PipelineConfig::from_yaml_overrides("stress: null").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_rejects_degenerate_mutex_pair() {
        let yaml = "mutex_pairs:\n  H_sincerity: [f_sincere, f_sincere]\n";
        let err = PipelineConfig::from_yaml_overrides(yaml).unwrap_err();
        assert!(err.to_string().contains("two distinct facets"));
    }

    #[test]
    fn test_rejects_shared_mutex_member() {
        let yaml = "mutex_pairs:\n  Z_extra: [f_sincere, f_other]\n";
        let err = PipelineConfig::from_yaml_overrides(yaml).unwrap_err();
        assert!(err.to_string().contains("more than one mutex pair"));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let yaml = "decay:\n  two_axis_pattern: \"^c_(he\"\n";
        let err = PipelineConfig::from_yaml_overrides(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern(_)));
    }

    #[test]
    fn test_rejects_inverted_stress_bounds() {
        let yaml = "stress:\n  noise_floor: 40.0\n";
        assert!(PipelineConfig::from_yaml_overrides(yaml).is_err());
    }

    #[test]
    fn test_missing_override_file() {
        let err = PipelineConfig::from_yaml_file("/nonexistent/pipeline.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
