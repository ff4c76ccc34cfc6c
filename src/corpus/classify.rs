//! Condition-shape classification.
//!
//! Classification is eager: a record is a facet, a composite, or invalid, and
//! the reason for an invalid shape is captured here rather than surfacing as a
//! later transform failure.

use serde_json::Value;

use super::record::{ConditionItem, Direction, FacetCondition};

/// What went wrong with a condition, phrased as expected-vs-actual.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFault {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl ShapeFault {
    fn new(field: impl Into<String>, expected: impl Into<String>, actual: &Value) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: describe(actual),
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Facet(FacetCondition),
    Composite(Vec<ConditionItem>),
    Invalid(ShapeFault),
}

/// Classify a record's `condition` value.
pub fn classify(condition: Option<&Value>) -> Classification {
    let Some(condition) = condition else {
        return Classification::Invalid(ShapeFault::new(
            "condition",
            "an object",
            &Value::Null,
        ));
    };
    let Some(obj) = condition.as_object() else {
        return Classification::Invalid(ShapeFault::new("condition", "an object", condition));
    };

    if let Some(all) = obj.get("all") {
        let Some(items) = all.as_array() else {
            return Classification::Invalid(ShapeFault::new("condition.all", "an array", all));
        };
        let mut parsed = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let prefix = format!("condition.all[{}]", i);
            let Some(item_obj) = item.as_object() else {
                return Classification::Invalid(ShapeFault::new(prefix, "an object", item));
            };
            let condition = match parse_triple(item_obj, &prefix) {
                Ok(c) => c,
                Err(fault) => return Classification::Invalid(fault),
            };
            let trait_ref = item_obj.get("trait").map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            parsed.push(ConditionItem {
                condition,
                trait_ref,
            });
        }
        return Classification::Composite(parsed);
    }

    match obj.get("facet") {
        Some(Value::String(facet)) if facet.contains('_') => {
            match parse_triple(obj, "condition") {
                Ok(c) => Classification::Facet(c),
                Err(fault) => Classification::Invalid(fault),
            }
        }
        Some(other) => Classification::Invalid(ShapeFault::new(
            "condition.facet",
            "a sub-dimension token such as \"H_sincerity\"",
            other,
        )),
        None => Classification::Invalid(ShapeFault::new(
            "condition",
            "either `facet` or an `all` list",
            condition,
        )),
    }
}

fn parse_triple(
    obj: &serde_json::Map<String, Value>,
    prefix: &str,
) -> Result<FacetCondition, ShapeFault> {
    let facet = match obj.get("facet") {
        Some(Value::String(s)) => s.clone(),
        other => {
            return Err(ShapeFault::new(
                format!("{}.facet", prefix),
                "a string",
                other.unwrap_or(&Value::Null),
            ))
        }
    };
    let direction = match obj.get("direction") {
        Some(Value::String(s)) => Direction::parse(s).ok_or_else(|| {
            ShapeFault::new(
                format!("{}.direction", prefix),
                "\"high\" or \"low\"",
                &Value::String(s.clone()),
            )
        })?,
        other => {
            return Err(ShapeFault::new(
                format!("{}.direction", prefix),
                "\"high\" or \"low\"",
                other.unwrap_or(&Value::Null),
            ))
        }
    };
    let threshold = match obj.get("threshold").and_then(Value::as_f64) {
        Some(t) => t,
        None => {
            return Err(ShapeFault::new(
                format!("{}.threshold", prefix),
                "a number",
                obj.get("threshold").unwrap_or(&Value::Null),
            ))
        }
    };
    Ok(FacetCondition {
        facet,
        direction,
        threshold,
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "nothing".to_string(),
        other => other.to_string(),
    }
}
