//! Depth-first visitor over JSON trees.
//!
//! Used to keep display text out of runtime artifacts: [`TextFieldFinder`]
//! reports any object carrying one of the configured text fields.

use serde_json::{Map, Value};

/// Called once for every JSON object in a tree, parents before children.
pub trait ObjectVisitor {
    /// `path` is a JSONPath-style location such as `$[3].conditions[0]`.
    fn visit_object(&mut self, path: &str, object: &Map<String, Value>);
}

pub fn walk<V: ObjectVisitor + ?Sized>(value: &Value, visitor: &mut V) {
    walk_at("$", value, visitor);
}

fn walk_at<V: ObjectVisitor + ?Sized>(path: &str, value: &Value, visitor: &mut V) {
    match value {
        Value::Object(object) => {
            visitor.visit_object(path, object);
            for (key, child) in object {
                walk_at(&format!("{}.{}", path, key), child, visitor);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk_at(&format!("{}[{}]", path, index), child, visitor);
            }
        }
        _ => {}
    }
}

/// One text field found in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFieldHit {
    /// Location of the object holding the field.
    pub path: String,
    pub field: String,
    /// The object's `id`, when it has a string one.
    pub owner_id: Option<String>,
}

/// Collects every occurrence of the given field names.
#[derive(Debug, Clone, Default)]
pub struct TextFieldFinder<'a> {
    fields: &'a [String],
    pub hits: Vec<TextFieldHit>,
}

impl<'a> TextFieldFinder<'a> {
    pub fn new(fields: &'a [String]) -> Self {
        Self {
            fields,
            hits: Vec::new(),
        }
    }

    /// Run over `value` and return the hits.
    pub fn find(mut self, value: &Value) -> Vec<TextFieldHit> {
        walk(value, &mut self);
        self.hits
    }
}

impl ObjectVisitor for TextFieldFinder<'_> {
    fn visit_object(&mut self, path: &str, object: &Map<String, Value>) {
        for field in self.fields {
            if object.contains_key(field) {
                self.hits.push(TextFieldHit {
                    path: path.to_string(),
                    field: field.clone(),
                    owner_id: object.get("id").and_then(Value::as_str).map(str::to_string),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Vec<String> {
        ["name_kr", "name_en", "description_kr", "description_en"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn tree() -> Value {
        json!([
            {"id": "f_a", "name_en": "A", "threshold": 0.9},
            {"id": "c_b", "conditions": [{"facet": "H", "description_kr": "설명"}]},
            {"id": "f_c", "valence": "positive"}
        ])
    }

    #[test]
    fn test_finder_reports_nested_fields() {
        let fields = fields();
        let hits = TextFieldFinder::new(&fields).find(&tree());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "$[0]");
        assert_eq!(hits[0].owner_id.as_deref(), Some("f_a"));
        assert_eq!(hits[1].path, "$[1].conditions[0]");
        assert_eq!(hits[1].field, "description_kr");
        assert_eq!(hits[1].owner_id, None);
    }

    #[test]
    fn test_scalars_are_ignored() {
        let fields = fields();
        assert!(TextFieldFinder::new(&fields).find(&json!("name_en")).is_empty());
        assert!(TextFieldFinder::new(&fields).find(&json!(3)).is_empty());
    }
}
