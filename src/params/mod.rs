//! Parameter resolution
//!
//! Builds the flat parameter set sent to the endpoint from five layered
//! sources. Later layers win:
//!
//! static extras < internal extras < filter fields < pagination < overwrites
//!
//! The watched view (static extras, filter fields and overwrites) is what live
//! search compares, so paging alone never re-triggers a search.

use crate::config::SearchConfig;
use indexmap::IndexMap;
use serde_json::Value;

/// Ordered name -> value mapping; insertion order is the serialization order
pub type ParameterSet = IndexMap<String, Value>;

/// The layered inputs of a parameter set
#[derive(Debug, Clone, Copy)]
pub struct ParameterSources<'a> {
    /// Caller-supplied static extras
    pub extra: &'a ParameterSet,
    /// Extras tracked by the instance (URL leftovers, group scoping)
    pub internal: &'a ParameterSet,
    /// Values derived from the filter fields
    pub filters: &'a ParameterSet,
    /// Pagination in wire form
    pub pagination: &'a ParameterSet,
    /// Explicit caller overwrites
    pub overwrites: &'a ParameterSet,
}

impl<'a> ParameterSources<'a> {
    /// Everything that would be sent right now
    pub fn resolve(&self, config: &SearchConfig) -> ParameterSet {
        let mut parameters = ParameterSet::new();
        merge_into(&mut parameters, self.extra);
        merge_into(&mut parameters, self.internal);
        merge_into(&mut parameters, self.filters);
        merge_into(&mut parameters, self.pagination);
        merge_into(&mut parameters, self.overwrites);
        prune_nulls(&mut parameters, config);
        parameters
    }

    /// The comparison basis for live search
    pub fn watched(&self) -> ParameterSet {
        let mut parameters = ParameterSet::new();
        merge_into(&mut parameters, self.extra);
        merge_into(&mut parameters, self.filters);
        merge_into(&mut parameters, self.overwrites);
        parameters
    }
}

/// Copy every entry of `source` into `target`; existing keys keep their position
pub fn merge_into(target: &mut ParameterSet, source: &ParameterSet) {
    for (name, value) in source {
        target.insert(name.clone(), value.clone());
    }
}

/// Drop null values unless the parameter is persistent
pub fn prune_nulls(parameters: &mut ParameterSet, config: &SearchConfig) {
    parameters.retain(|name, value| !value.is_null() || config.is_persistent(name));
}

/// String form of a parameter value
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Whether a value counts as "set"
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Compare two values the way query strings see them (`"12"` equals `12`)
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => value_to_string(a) == value_to_string(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(pairs: &[(&str, Value)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_layer_precedence() {
        let extra = set(&[("q", json!("extra")), ("siteId", json!(4))]);
        let internal = set(&[("q", json!("internal")), ("ref", json!("mail"))]);
        let filters = set(&[("q", json!("filter"))]);
        let pagination = set(&[("limit", json!(12)), ("offset", json!(0))]);
        let overwrites = set(&[("limit", json!(50))]);

        let sources = ParameterSources {
            extra: &extra,
            internal: &internal,
            filters: &filters,
            pagination: &pagination,
            overwrites: &overwrites,
        };
        let resolved = sources.resolve(&SearchConfig::default());

        assert_eq!(resolved.get("q"), Some(&json!("filter")));
        assert_eq!(resolved.get("limit"), Some(&json!(50)));
        assert_eq!(resolved.get("ref"), Some(&json!("mail")));
        let keys: Vec<_> = resolved.keys().cloned().collect();
        assert_eq!(keys, vec!["q", "siteId", "ref", "limit", "offset"]);
    }

    #[test]
    fn test_watched_ignores_pagination_and_internal() {
        let extra = set(&[("siteId", json!(4))]);
        let internal = set(&[("groups", json!("2"))]);
        let filters = set(&[("q", json!("red"))]);
        let pagination = set(&[("limit", json!(12))]);
        let overwrites = ParameterSet::new();

        let watched = ParameterSources {
            extra: &extra,
            internal: &internal,
            filters: &filters,
            pagination: &pagination,
            overwrites: &overwrites,
        }
        .watched();

        assert_eq!(watched, set(&[("siteId", json!(4)), ("q", json!("red"))]));
    }

    #[test]
    fn test_null_pruning_respects_persistent() {
        let mut parameters = set(&[("contextId", Value::Null), ("category", Value::Null)]);
        prune_nulls(&mut parameters, &SearchConfig::default());
        assert_eq!(parameters, set(&[("contextId", Value::Null)]));
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(value_to_string(&json!(12)), "12");
        assert_eq!(value_to_string(&Value::Null), "");
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(loose_eq(&json!("12"), &json!(12)));
        assert!(!loose_eq(&Value::Null, &json!("")));
    }
}
