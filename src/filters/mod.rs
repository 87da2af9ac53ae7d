//! Search filter bindings
//!
//! Filters are owned by the caller. A search instance either works on the
//! caller's shared handle directly (mutable mode) or on a private deep copy.

use crate::params::{loose_eq, ParameterSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Field names that clash with pagination and are never used as filters
pub const RESERVED_PARAMETERS: [&str; 3] = ["limit", "offset", "total"];

/// Filters shared between the caller and a search instance
pub type SharedFilters = Arc<RwLock<SearchFilters>>;

/// Endpoint plus the fields that make up the search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    /// Endpoint the search is sent to
    pub endpoint_url: String,
    /// Filter fields in declaration order
    pub fields: Vec<Field>,
}

/// A named filter field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub value: FieldValue,
}

/// Either a plain value or a list of selectable options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Options(Vec<OptionItem>),
    Scalar(Value),
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Scalar(Value::Null)
    }
}

/// One selectable option of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: Value,
    #[serde(default)]
    pub checked: bool,
}

impl OptionItem {
    pub fn new(value: impl Into<Value>, checked: bool) -> Self {
        Self {
            value: value.into(),
            checked,
        }
    }
}

impl Field {
    /// Create a scalar field
    pub fn scalar(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Scalar(value.into()),
        }
    }

    /// Create an option list field
    pub fn options(name: impl Into<String>, options: Vec<OptionItem>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Options(options),
        }
    }

    /// Whether the name is reserved for pagination
    pub fn is_reserved(&self) -> bool {
        let name = self.name.to_lowercase();
        RESERVED_PARAMETERS.contains(&name.as_str())
    }

    /// The value this field contributes to the parameters, if any
    pub fn parameter_value(&self) -> Option<Value> {
        match &self.value {
            FieldValue::Options(options) => options
                .iter()
                .find(|item| item.checked)
                .map(|item| item.value.clone()),
            FieldValue::Scalar(value) => Some(value.clone()),
        }
    }
}

impl SearchFilters {
    /// Create filters for an endpoint
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Wrap into a handle that can be shared with a search instance
    pub fn shared(self) -> SharedFilters {
        Arc::new(RwLock::new(self))
    }

    /// Copy without reserved fields
    pub fn without_reserved(&self) -> Self {
        Self {
            endpoint_url: self.endpoint_url.clone(),
            fields: self
                .fields
                .iter()
                .filter(|field| !field.is_reserved())
                .cloned()
                .collect(),
        }
    }

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name == name && !field.is_reserved())
    }

    /// Parameters derived from the fields
    pub fn parameters(&self) -> ParameterSet {
        let mut parameters = ParameterSet::new();
        for field in self.fields.iter().filter(|f| !f.name.is_empty() && !f.is_reserved()) {
            if let Some(value) = field.parameter_value() {
                parameters.insert(field.name.clone(), value);
            }
        }
        parameters
    }

    /// Bind a value onto the field with the given name
    ///
    /// Option lists get exactly the matching option checked (nothing changes
    /// when no option matches); scalars are overwritten, with an empty string
    /// standing in for a missing value. Returns false if no such field exists.
    pub fn set_field(&mut self, name: &str, value: Option<&Value>) -> bool {
        let Some(field) = self
            .fields
            .iter_mut()
            .find(|field| field.name == name && !field.is_reserved())
        else {
            return false;
        };

        match &mut field.value {
            FieldValue::Options(options) => {
                if let Some(value) = value {
                    if options.iter().any(|item| loose_eq(&item.value, value)) {
                        for item in options.iter_mut() {
                            item.checked = loose_eq(&item.value, value);
                        }
                    }
                }
            }
            FieldValue::Scalar(current) => {
                *current = value
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SearchFilters {
        SearchFilters::new("/api/search")
            .with_field(Field::scalar("q", "shoes"))
            .with_field(Field::options(
                "category",
                vec![
                    OptionItem::new(1, false),
                    OptionItem::new(2, true),
                    OptionItem::new(3, false),
                ],
            ))
            .with_field(Field::options("brand", vec![OptionItem::new("acme", false)]))
            .with_field(Field::scalar("Limit", 99))
    }

    #[test]
    fn test_parameters_from_fields() {
        let parameters = sample().parameters();
        assert_eq!(parameters.get("q"), Some(&json!("shoes")));
        assert_eq!(parameters.get("category"), Some(&json!(2)));
        assert!(parameters.get("brand").is_none());
        assert!(parameters.get("Limit").is_none());
    }

    #[test]
    fn test_without_reserved() {
        let filters = sample().without_reserved();
        assert_eq!(filters.fields.len(), 3);
        assert!(filters.field("Limit").is_none());
    }

    #[test]
    fn test_set_field_checks_single_option() {
        let mut filters = sample();
        assert!(filters.set_field("category", Some(&json!("3"))));

        let Some(FieldValue::Options(options)) = filters.field("category").map(|f| f.value.clone())
        else {
            panic!("category should be an option list");
        };
        let checked: Vec<_> = options.iter().filter(|o| o.checked).collect();
        assert_eq!(checked.len(), 1);
        assert_eq!(checked[0].value, json!(3));
    }

    #[test]
    fn test_set_field_without_match_is_noop() {
        let mut filters = sample();
        assert!(filters.set_field("category", Some(&json!(42))));
        assert_eq!(filters.parameters().get("category"), Some(&json!(2)));
    }

    #[test]
    fn test_set_field_scalar_and_missing() {
        let mut filters = sample();
        assert!(filters.set_field("q", None));
        assert_eq!(filters.parameters().get("q"), Some(&json!("")));
        assert!(!filters.set_field("unknown", Some(&json!("x"))));
    }

    #[test]
    fn test_deserialize_field_shapes() {
        let filters: SearchFilters = serde_json::from_value(json!({
            "endpointUrl": "/api",
            "fields": [
                {"name": "q", "value": "red"},
                {"name": "size", "value": [{"value": "m", "checked": true}]}
            ]
        }))
        .unwrap();
        assert_eq!(filters.parameters().get("size"), Some(&json!("m")));
    }
}
