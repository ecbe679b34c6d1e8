//! Declared structural contracts for generated JSON.
//!
//! A [`Shape`] lists the fields an object must carry, with their types and
//! cardinality. Checking reports the first offending field by path, such as
//! `angles[2].journey`.

use serde_json::Value;
use std::fmt;

/// A shape violation, with the path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error message.
    pub message: String,
    /// Path of the field that caused the error, if applicable.
    pub field: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field.as_deref() {
            Some(field) if !field.is_empty() => write!(f, "{}: {}", field, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Anything that can accept or reject a parsed candidate.
pub trait ShapeCheck: Send + Sync {
    /// Checks the candidate.
    fn check(&self, value: &Value) -> Result<(), ValidationError>;
}

impl<F> ShapeCheck for F
where
    F: Fn(&Value) -> Result<(), ValidationError> + Send + Sync,
{
    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        self(value)
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A string; `non_empty` rejects blank strings.
    Text {
        /// Whether blank strings are rejected.
        non_empty: bool,
    },
    /// Any JSON number.
    Number,
    /// A boolean.
    Bool,
    /// A nested object with its own shape.
    Object(Shape),
    /// A list whose length lies within `min..=max`.
    List {
        /// Shape of every item.
        item: Box<FieldType>,
        /// Minimum item count.
        min: usize,
        /// Maximum item count, if bounded.
        max: Option<usize>,
    },
    /// Any non-null value.
    Any,
}

impl FieldType {
    /// A string that may be blank.
    #[must_use]
    pub fn text() -> Self {
        Self::Text { non_empty: false }
    }

    /// A string that must not be blank.
    #[must_use]
    pub fn non_empty_text() -> Self {
        Self::Text { non_empty: true }
    }

    /// A list of `item` with `min..=max` elements.
    #[must_use]
    pub fn list_of(item: FieldType, min: usize, max: Option<usize>) -> Self {
        Self::List {
            item: Box::new(item),
            min,
            max,
        }
    }

    fn check(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        match self {
            Self::Text { non_empty } => {
                let text = value
                    .as_str()
                    .ok_or_else(|| mismatch(path, "a string", value))?;
                if *non_empty && text.trim().is_empty() {
                    return Err(ValidationError::for_field(path, "must not be empty"));
                }
                Ok(())
            }
            Self::Number => value
                .is_number()
                .then_some(())
                .ok_or_else(|| mismatch(path, "a number", value)),
            Self::Bool => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| mismatch(path, "a boolean", value)),
            Self::Object(shape) => shape.check_at(path, value),
            Self::List { item, min, max } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| mismatch(path, "a list", value))?;
                if items.len() < *min {
                    return Err(ValidationError::for_field(
                        path,
                        format!("expected at least {} items, found {}", min, items.len()),
                    ));
                }
                if let Some(max) = max {
                    if items.len() > *max {
                        return Err(ValidationError::for_field(
                            path,
                            format!("expected at most {} items, found {}", max, items.len()),
                        ));
                    }
                }
                for (index, entry) in items.iter().enumerate() {
                    item.check(&format!("{path}[{index}]"), entry)?;
                }
                Ok(())
            }
            Self::Any => Ok(()),
        }
    }
}

/// One declared field of a [`Shape`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Canonical field name.
    pub name: String,
    /// Equivalent names accepted in place of `name`.
    pub aliases: Vec<String>,
    /// Declared type.
    pub field_type: FieldType,
    /// Whether the field must be present and non-null.
    pub required: bool,
}

impl FieldRule {
    fn lookup<'a>(&self, object: &'a serde_json::Map<String, Value>) -> Option<&'a Value> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .find_map(|key| object.get(key).filter(|value| !value.is_null()))
    }
}

/// A declared object shape: a set of fields with types and cardinality.
///
/// Undeclared fields are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shape {
    fields: Vec<FieldRule>,
}

impl Shape {
    /// Creates an empty shape, which accepts any object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required field.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            aliases: Vec::new(),
            field_type,
            required: true,
        });
        self
    }

    /// Declares an optional field, checked only when present.
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            aliases: Vec::new(),
            field_type,
            required: false,
        });
        self
    }

    /// Declares a required field that may appear under any of `aliases`.
    #[must_use]
    pub fn required_with_aliases(
        mut self,
        name: impl Into<String>,
        aliases: &[&str],
        field_type: FieldType,
    ) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            field_type,
            required: true,
        });
        self
    }

    /// Returns the declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Checks `value` against this shape.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.check_at("", value)
    }

    fn check_at(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| mismatch(path, "an object", value))?;

        for rule in &self.fields {
            let field_path = if path.is_empty() {
                rule.name.clone()
            } else {
                format!("{}.{}", path, rule.name)
            };
            match rule.lookup(object) {
                Some(found) => rule.field_type.check(&field_path, found)?,
                None if rule.required => {
                    return Err(ValidationError::for_field(
                        field_path,
                        "required field is missing",
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }
}

impl ShapeCheck for Shape {
    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        self.validate(value)
    }
}

fn mismatch(path: &str, expected: &str, found: &Value) -> ValidationError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    };
    ValidationError::for_field(path, format!("expected {expected}, found {found}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_shape() -> Shape {
        Shape::new()
            .required("title", FieldType::non_empty_text())
            .required_with_aliases("summary", &["description"], FieldType::non_empty_text())
            .required("journey", FieldType::non_empty_text())
    }

    fn list_shape() -> Shape {
        Shape::new().required(
            "items",
            FieldType::list_of(FieldType::Object(record_shape()), 3, Some(5)),
        )
    }

    fn record(title: &str) -> Value {
        json!({"title": title, "summary": "s", "journey": "j"})
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(ValidationError::new("bad").to_string(), "bad");
        assert_eq!(
            ValidationError::for_field("items[0].title", "must not be empty").to_string(),
            "items[0].title: must not be empty"
        );
    }

    #[test]
    fn test_valid_payload_passes() {
        let value = json!({"items": [record("a"), record("b"), record("c")]});
        assert!(list_shape().validate(&value).is_ok());
    }

    #[test]
    fn test_cardinality_bounds() {
        let too_few = json!({"items": [record("a"), record("b")]});
        let err = list_shape().validate(&too_few).unwrap_err();
        assert_eq!(err.to_string(), "items: expected at least 3 items, found 2");

        let too_many = json!({"items": (0..6).map(|i| record(&i.to_string())).collect::<Vec<_>>()});
        let err = list_shape().validate(&too_many).unwrap_err();
        assert_eq!(err.to_string(), "items: expected at most 5 items, found 6");
    }

    #[test]
    fn test_missing_nested_field_reports_path() {
        let value = json!({"items": [
            record("a"),
            record("b"),
            {"title": "c", "summary": "s"},
        ]});
        let err = list_shape().validate(&value).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("items[2].journey"));
        assert_eq!(err.message, "required field is missing");
    }

    #[test]
    fn test_alias_is_accepted() {
        let value = json!({"title": "t", "description": "d", "journey": "j"});
        assert!(record_shape().validate(&value).is_ok());
    }

    #[test]
    fn test_blank_and_null_fields() {
        let blank = json!({"title": "  ", "summary": "s", "journey": "j"});
        assert_eq!(
            record_shape().validate(&blank).unwrap_err().to_string(),
            "title: must not be empty"
        );

        let null = json!({"title": "t", "summary": null, "journey": "j"});
        assert_eq!(
            record_shape().validate(&null).unwrap_err().to_string(),
            "summary: required field is missing"
        );
    }

    #[test]
    fn test_type_mismatch() {
        let err = list_shape().validate(&json!({"items": "nope"})).unwrap_err();
        assert_eq!(err.to_string(), "items: expected a list, found a string");

        let err = list_shape().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "expected an object, found a list");
    }

    #[test]
    fn test_optional_fields() {
        let shape = Shape::new()
            .optional("score", FieldType::Number)
            .optional("draft", FieldType::Bool);
        assert!(shape.validate(&json!({})).is_ok());
        assert!(shape.validate(&json!({"score": 1.5, "draft": false})).is_ok());
        assert!(shape.validate(&json!({"score": "high"})).is_err());
    }

    #[test]
    fn test_closure_shape_check() {
        let check = |value: &Value| {
            value
                .get("ok")
                .and_then(Value::as_bool)
                .filter(|ok| *ok)
                .map(|_| ())
                .ok_or_else(|| ValidationError::for_field("ok", "must be true"))
        };
        assert!(check.check(&json!({"ok": true})).is_ok());
        assert!(check.check(&json!({"ok": false})).is_err());
    }
}
