//! Structural validation of dynamic JSON payloads against tagged schemas.
//!
//! Every mutable sub-tree of a ticket's slot is governed by an explicit
//! template. The validator walks template and candidate together and
//! reports the first violation it finds, with a dotted path rooted at the
//! template itself. It never aggregates violations and never mutates its
//! inputs.

use serde_json::Value;
use thiserror::Error;

/// The JSON primitive kinds a template field can require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Null,
    Bool,
    Number,
    String,
}

impl PrimitiveKind {
    /// Type name as rendered in violation messages
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Null => "null",
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Number => "number",
            PrimitiveKind::String => "string",
        }
    }
}

/// An explicit template describing the required shape of a payload.
///
/// Object fields are ordered: presence checks and recursion follow the
/// declaration order, which fixes which violation is reported first.
/// Array templates carry a single representative element schema; every
/// candidate element is checked against it, and an empty candidate array
/// passes without per-element checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Primitive(PrimitiveKind),
    Array(Box<Schema>),
    Object(Vec<(String, Schema)>),
}

impl Schema {
    /// An object template with the given ordered fields
    pub fn object(fields: Vec<(&str, Schema)>) -> Schema {
        Schema::Object(
            fields
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
        )
    }

    /// An array template with the given element schema
    pub fn array(element: Schema) -> Schema {
        Schema::Array(Box::new(element))
    }

    pub fn string() -> Schema {
        Schema::Primitive(PrimitiveKind::String)
    }

    pub fn number() -> Schema {
        Schema::Primitive(PrimitiveKind::Number)
    }

    pub fn boolean() -> Schema {
        Schema::Primitive(PrimitiveKind::Bool)
    }
}

/// First structural violation found while matching a candidate payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A template key is absent from the candidate object.
    /// `path` is the containing object's path, empty at the template root.
    #[error("Missing property {key} at {path}")]
    MissingProperty { path: String, key: String },

    /// A candidate key does not appear in the template object
    #[error("Unexpected property {key} at {path}")]
    UnexpectedProperty { path: String, key: String },

    /// The candidate value has a different JSON type than the template
    #[error("Type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// JSON type name of a dynamic value, as rendered in violation messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check a candidate payload against a template.
///
/// `path_prefix` names the template root in reported paths; pass an empty
/// string when the template is anonymous, in which case a violation at
/// the root renders with an empty path.
///
/// Returns on the first violation; a passing candidate has exactly the
/// template's keys at every level and matching primitive types at every
/// leaf.
pub fn validate(template: &Schema, candidate: &Value, path_prefix: &str) -> Result<(), Violation> {
    let mut path: Vec<String> = Vec::new();
    if !path_prefix.is_empty() {
        path.push(path_prefix.to_string());
    }
    check(template, candidate, &mut path)
}

fn render(path: &[String]) -> String {
    path.join(".")
}

fn check(template: &Schema, candidate: &Value, path: &mut Vec<String>) -> Result<(), Violation> {
    match template {
        Schema::Object(fields) => {
            let map = match candidate {
                Value::Object(map) => map,
                other => {
                    return Err(Violation::TypeMismatch {
                        path: render(path),
                        expected: "object",
                        actual: json_type_name(other),
                    })
                }
            };

            // Every template key must be present before any candidate key
            // is judged unexpected.
            for (key, _) in fields {
                if !map.contains_key(key) {
                    return Err(Violation::MissingProperty {
                        path: render(path),
                        key: key.clone(),
                    });
                }
            }
            for key in map.keys() {
                if !fields.iter().any(|(name, _)| name == key) {
                    return Err(Violation::UnexpectedProperty {
                        path: render(path),
                        key: key.clone(),
                    });
                }
            }
            for (key, field_schema) in fields {
                path.push(key.clone());
                check(field_schema, &map[key.as_str()], path)?;
                path.pop();
            }
            Ok(())
        }
        Schema::Array(element) => {
            let items = match candidate {
                Value::Array(items) => items,
                other => {
                    return Err(Violation::TypeMismatch {
                        path: render(path),
                        expected: "array",
                        actual: json_type_name(other),
                    })
                }
            };
            for item in items {
                check(element, item, path)?;
            }
            Ok(())
        }
        Schema::Primitive(kind) => {
            let actual = json_type_name(candidate);
            if actual != kind.name() {
                return Err(Violation::TypeMismatch {
                    path: render(path),
                    expected: kind.name(),
                    actual,
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abc() -> Schema {
        Schema::object(vec![
            ("a", Schema::string()),
            ("b", Schema::string()),
            ("c", Schema::string()),
        ])
    }

    #[test]
    fn test_accepts_matching_candidate() {
        let candidate = json!({"a": "1", "b": "2", "c": "3"});
        assert_eq!(validate(&abc(), &candidate, ""), Ok(()));
    }

    #[test]
    fn test_missing_reported_before_unexpected() {
        // {a, c, extra} against {a, b, c}: b is reported missing before
        // extra is reported unexpected.
        let candidate = json!({"a": "1", "c": "3", "extra": "4"});
        let err = validate(&abc(), &candidate, "").unwrap_err();
        assert_eq!(
            err,
            Violation::MissingProperty {
                path: String::new(),
                key: "b".into()
            }
        );
    }

    #[test]
    fn test_unexpected_property_at_root_has_trailing_space() {
        let candidate = json!({"a": "1", "b": "2", "c": "3", "aaa": "4"});
        let err = validate(&abc(), &candidate, "").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected property aaa at ");
    }

    #[test]
    fn test_type_mismatch_message() {
        let template = Schema::object(vec![
            ("buy_fee", Schema::number()),
            ("sale_price", Schema::number()),
        ]);
        let candidate = json!({"buy_fee": 1.5, "sale_price": ""});
        let err = validate(&template, &candidate, "PriceDetailedInfo").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch at PriceDetailedInfo.sale_price: expected number, got string"
        );
    }

    #[test]
    fn test_declaration_order_decides_first_missing() {
        let candidate = json!({"c": "3"});
        let err = validate(&abc(), &candidate, "").unwrap_err();
        assert_eq!(
            err,
            Violation::MissingProperty {
                path: String::new(),
                key: "a".into()
            }
        );
    }

    #[test]
    fn test_nested_paths() {
        let template = Schema::object(vec![(
            "outer",
            Schema::object(vec![("inner", Schema::number())]),
        )]);
        let candidate = json!({"outer": {"inner": "nope"}});
        let err = validate(&template, &candidate, "Root").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch at Root.outer.inner: expected number, got string"
        );
    }

    #[test]
    fn test_array_elements_checked_against_representative() {
        let template = Schema::array(Schema::object(vec![("n", Schema::number())]));
        let good = json!([{"n": 1}, {"n": 2}]);
        assert_eq!(validate(&template, &good, "List"), Ok(()));

        let bad = json!([{"n": 1}, {"n": "2"}]);
        let err = validate(&template, &bad, "List").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch at List.n: expected number, got string"
        );
    }

    #[test]
    fn test_empty_candidate_array_passes() {
        let template = Schema::array(Schema::object(vec![("n", Schema::number())]));
        assert_eq!(validate(&template, &json!([]), ""), Ok(()));
    }

    #[test]
    fn test_non_object_candidate_is_type_mismatch() {
        let err = validate(&abc(), &json!(42), "Slot").unwrap_err();
        assert_eq!(
            err,
            Violation::TypeMismatch {
                path: "Slot".into(),
                expected: "object",
                actual: "number"
            }
        );
    }

    #[test]
    fn test_null_and_bool_primitives() {
        let template = Schema::object(vec![
            ("flag", Schema::boolean()),
            ("nothing", Schema::Primitive(PrimitiveKind::Null)),
        ]);
        let candidate = json!({"flag": true, "nothing": null});
        assert_eq!(validate(&template, &candidate, ""), Ok(()));

        let err = validate(&template, &json!({"flag": 1, "nothing": null}), "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch at flag: expected boolean, got number"
        );
    }
}
