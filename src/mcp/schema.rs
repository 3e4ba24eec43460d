//! Tool input schemas
//!
//! A typed subset of JSON Schema: an object with named, typed properties and
//! a list of required names. The same value is advertised in `tools/list` and
//! used to check arguments before a handler runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl PropertyType {
    fn matches(self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::Number => value.is_number(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Object => value.is_object(),
            PropertyType::Array => value.is_array(),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Object => "object",
            PropertyType::Array => "array",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl InputSchema {
    /// Empty object schema: accepts `{}`.
    pub fn object() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn required(mut self, name: &str, kind: PropertyType, description: &str) -> Self {
        self = self.optional(name, kind, description);
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn optional(mut self, name: &str, kind: PropertyType, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySchema {
                kind,
                description: description.to_string(),
            },
        );
        self
    }

    /// Check an argument object against this schema.
    ///
    /// Required properties must be present and non-null; declared properties
    /// must have the declared type. Undeclared keys are allowed.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), String> {
        for name in &self.required {
            match arguments.get(name) {
                None | Some(Value::Null) => {
                    return Err(format!("Missing required argument '{}'", name));
                }
                Some(_) => {}
            }
        }

        for (name, value) in arguments {
            let Some(property) = self.properties.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !property.kind.matches(value) {
                return Err(format!(
                    "Argument '{}' must be of type {}",
                    name, property.kind
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_schema() -> InputSchema {
        InputSchema::object()
            .required("query", PropertyType::String, "SQL query to execute")
            .optional("limit", PropertyType::Integer, "Row limit")
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_wire_format() {
        let value = serde_json::to_value(query_schema()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Row limit"},
                    "query": {"type": "string", "description": "SQL query to execute"}
                },
                "required": ["query"]
            })
        );
    }

    #[test]
    fn test_empty_schema_omits_required() {
        let value = serde_json::to_value(InputSchema::object()).unwrap();
        assert_eq!(value, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_missing_required() {
        let err = query_schema().validate(&args(json!({}))).unwrap_err();
        assert!(err.contains("'query'"));

        let err = query_schema()
            .validate(&args(json!({"query": null})))
            .unwrap_err();
        assert!(err.contains("'query'"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = query_schema()
            .validate(&args(json!({"query": 42})))
            .unwrap_err();
        assert_eq!(err, "Argument 'query' must be of type string");

        let err = query_schema()
            .validate(&args(json!({"query": "SELECT 1", "limit": 1.5})))
            .unwrap_err();
        assert!(err.contains("integer"));
    }

    #[test]
    fn test_accepts_valid_and_extra_arguments() {
        let schema = query_schema();
        assert!(schema
            .validate(&args(json!({"query": "SELECT 1", "limit": 5})))
            .is_ok());
        assert!(schema
            .validate(&args(json!({"query": "SELECT 1", "verbose": true})))
            .is_ok());
    }

    #[test]
    fn test_required_is_not_duplicated() {
        let schema = InputSchema::object()
            .required("a", PropertyType::String, "first")
            .required("a", PropertyType::String, "again");
        assert_eq!(schema.required, vec!["a".to_string()]);
        assert_eq!(schema.properties["a"].description, "again");
    }
}
