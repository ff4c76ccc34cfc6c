//! # trait-pipeline
//!
//! Deterministic migration of a flat personality-trait corpus into a
//! two-level hybrid runtime model.
//!
//! Facet traits (one facet condition) gain hysteresis thresholds, a sigmoid
//! steepness, a salience band and a mutex group.  Composite traits (an AND of
//! facet conditions) gain per-condition fuzzy bands and a rarity bonus.  A
//! separate pass derives violation stress for composites from their
//! constituent facets.  Every output is checked by a validation gate before
//! anything is written, and the source corpus is never modified.

pub mod config;
pub mod corpus;
pub mod derive;
pub mod error;
pub mod hybrid;
pub mod locale;
pub mod mappings;
pub mod pipeline;
pub mod utilities;
pub mod validation;
pub mod visitor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, PipelineConfig};
pub use corpus::{Direction, TraitCorpus, TraitRecord};
pub use derive::StressDeriver;
pub use error::{PipelineError, Result};
pub use hybrid::{HybridTransformer, RuntimeTrait};
pub use mappings::CrossReferences;
pub use pipeline::{Pipeline, PipelineOptions, PipelineReport, RunMode};
pub use validation::{ValidationGate, ValidationReport};
