//! Declarative input contracts for request params and bodies.
//!
//! A [`Schema`] is an ordered list of named [`Field`]s. Validation walks the
//! declared fields only: unknown input keys are dropped, present values are
//! coerced and bounds-checked, and every failing field is reported at once.

pub mod error;
pub mod field;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use error::ValidationError;
pub use field::{Coercion, Field, FieldKind};

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(&'static str, Field)>,
}

impl Schema {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, field: Field) -> Self {
        self.fields.push((name, field));
        self
    }

    /// Validate `input` and return the normalized object containing only declared fields.
    pub fn validate(&self, input: &Value) -> Result<Map<String, Value>, ValidationError> {
        let object = match input {
            Value::Object(obj) => obj,
            _ => return Err(ValidationError::new("Expected a JSON object")),
        };

        let mut output = Map::new();
        let mut error = ValidationError::new("Validation failed");

        for (name, field) in &self.fields {
            match object.get(*name) {
                None => {
                    if field.required {
                        error.push(*name, "Required");
                    }
                }
                Some(value) => match field.check(value) {
                    Ok(normalized) => {
                        output.insert(name.to_string(), normalized);
                    }
                    Err(message) => error.push(*name, message),
                },
            }
        }

        if error.is_empty() {
            Ok(output)
        } else {
            Err(error)
        }
    }

    /// Validate and deserialize into the operation's typed input.
    pub fn parse<T: DeserializeOwned>(&self, input: &Value) -> Result<T, ValidationError> {
        let normalized = self.validate(input)?;
        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| ValidationError::new(format!("Invalid input: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn task_body() -> Schema {
        Schema::object()
            .field("title", Field::string().min_len(3).max_len(100))
            .field("description", Field::string().max_len(1000).optional().nullable())
            .field("dueDate", Field::date().optional().nullable())
            .field("priority", Field::integer().range(0, 2).optional().nullable())
    }

    #[test]
    fn accepts_valid_input_and_drops_unknown_keys() {
        let out = task_body()
            .validate(&json!({ "title": "Buy milk", "priority": 1, "extra": true }))
            .unwrap();
        assert_eq!(out.get("title"), Some(&json!("Buy milk")));
        assert_eq!(out.get("priority"), Some(&json!(1)));
        assert!(out.get("extra").is_none());
        assert!(out.get("description").is_none());
    }

    #[test]
    fn reports_every_failing_field() {
        let err = task_body()
            .validate(&json!({ "title": "ab", "priority": 3 }))
            .unwrap_err();
        assert_eq!(
            err.field_errors.get("title").map(String::as_str),
            Some("String must contain at least 3 character(s)")
        );
        assert_eq!(
            err.field_errors.get("priority").map(String::as_str),
            Some("Number must be less than or equal to 2")
        );
    }

    #[test]
    fn missing_required_field() {
        let err = task_body().validate(&json!({})).unwrap_err();
        assert_eq!(err.field_errors.get("title").map(String::as_str), Some("Required"));
    }

    #[test]
    fn length_counts_characters() {
        // three multibyte characters satisfy min_len(3)
        assert!(task_body().validate(&json!({ "title": "äöü" })).is_ok());
        let long = "x".repeat(101);
        assert!(task_body().validate(&json!({ "title": long })).is_err());
    }

    #[test]
    fn nullable_versus_optional() {
        let schema = Schema::object()
            .field("a", Field::integer().optional())
            .field("b", Field::integer().optional().nullable());

        assert!(schema.validate(&json!({ "a": null })).is_err());
        let out = schema.validate(&json!({ "b": null })).unwrap();
        assert_eq!(out.get("b"), Some(&Value::Null));
    }

    #[test]
    fn coerces_numeric_strings_only_when_declared() {
        let coerced = Schema::object().field("id", Field::integer().positive().coerce());
        let strict = Schema::object().field("id", Field::integer().positive());

        let out = coerced.validate(&json!({ "id": "42" })).unwrap();
        assert_eq!(out.get("id"), Some(&json!(42)));

        assert!(coerced.validate(&json!({ "id": "abc" })).is_err());
        assert!(coerced.validate(&json!({ "id": "0" })).is_err());
        assert!(strict.validate(&json!({ "id": "42" })).is_err());
    }

    #[test]
    fn rejects_fractional_integers() {
        let schema = Schema::object().field("n", Field::integer());
        assert!(schema.validate(&json!({ "n": 2.5 })).is_err());
        assert_eq!(schema.validate(&json!({ "n": 2.0 })).unwrap().get("n"), Some(&json!(2)));
    }

    #[test]
    fn normalizes_dates_and_times() {
        let schema = Schema::object()
            .field("d", Field::date())
            .field("t", Field::time());

        let out = schema
            .validate(&json!({ "d": "2024-03-01T10:00:00Z", "t": "09:30" }))
            .unwrap();
        assert_eq!(out.get("d"), Some(&json!("2024-03-01")));
        assert_eq!(out.get("t"), Some(&json!("09:30:00")));

        let err = schema.validate(&json!({ "d": "not-a-date", "t": "25:00" })).unwrap_err();
        assert_eq!(err.field_errors.get("d").map(String::as_str), Some("Invalid date format"));
        assert_eq!(err.field_errors.get("t").map(String::as_str), Some("Invalid time format"));
    }

    #[test]
    fn parse_into_typed_struct() {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            title: String,
            due_date: Option<chrono::NaiveDate>,
            priority: Option<i32>,
        }

        let body: Body = task_body()
            .parse(&json!({ "title": "Write report", "dueDate": "2024-05-06" }))
            .unwrap();
        assert_eq!(body.title, "Write report");
        assert_eq!(body.due_date, chrono::NaiveDate::from_ymd_opt(2024, 5, 6));
        assert_eq!(body.priority, None);
    }

    #[test]
    fn rejects_non_object_input() {
        let err = task_body().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.message, "Expected a JSON object");
    }
}
