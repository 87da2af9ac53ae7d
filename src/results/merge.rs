//! Merging appended pages into existing data

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Custom merge function: `(new, old) -> merged`
pub type MergeFn = Arc<dyn Fn(Value, Value) -> Value + Send + Sync>;

/// Strategy used to combine an appended page with the data already held
#[derive(Clone, Default)]
pub enum DataMerger {
    /// Concatenate arrays, old first
    #[default]
    Concat,
    /// Concatenate items per group id
    Grouped,
    /// Caller-supplied merge
    Custom(MergeFn),
}

impl DataMerger {
    /// Wrap a closure
    pub fn custom<F>(merge: F) -> Self
    where
        F: Fn(Value, Value) -> Value + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(merge))
    }

    /// Whether this is still the default strategy
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Concat)
    }

    /// The strategy to use: the default becomes `Grouped` in grouped mode
    pub fn effective(&self, grouped: bool) -> Self {
        if grouped && self.is_default() {
            Self::Grouped
        } else {
            self.clone()
        }
    }

    /// Merge `new` into `old`
    pub fn merge(&self, new: Value, old: Value) -> Value {
        match self {
            Self::Concat => merge_flat(new, old),
            Self::Grouped => merge_grouped(new, old),
            Self::Custom(merge) => merge(new, old),
        }
    }
}

impl fmt::Debug for DataMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concat => write!(f, "Concat"),
            Self::Grouped => write!(f, "Grouped"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Both arrays: old followed by new. Anything else: new replaces old.
pub fn merge_flat(new: Value, old: Value) -> Value {
    match (new, old) {
        (Value::Array(new), Value::Array(mut old)) => {
            old.extend(new);
            Value::Array(old)
        }
        (new, _) => new,
    }
}

/// Merge grouped responses (`{ groups: [{ id, items }, ...], ... }`)
///
/// Groups keep the old order; a group present in both gets the old items
/// followed by the new ones, old-only groups are kept as they were and
/// new-only groups follow at the end. The rest of the envelope comes from the
/// new response. Without usable new data the old data is kept.
pub fn merge_grouped(new: Value, old: Value) -> Value {
    let both_grouped = new.get("groups").map_or(false, Value::is_array)
        && old.get("groups").map_or(false, Value::is_array);
    if !both_grouped {
        return if new.is_null() { old } else { new };
    }

    let mut envelope = new;
    let new_groups = match envelope.get_mut("groups").map(Value::take) {
        Some(Value::Array(groups)) => groups,
        _ => Vec::new(),
    };
    let old_groups = match old {
        Value::Object(mut object) => match object.remove("groups") {
            Some(Value::Array(groups)) => groups,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut remaining: Vec<Option<Value>> = new_groups.into_iter().map(Some).collect();
    let mut compiled = Vec::with_capacity(old_groups.len() + remaining.len());

    for old_group in old_groups {
        let id = old_group.get("id").cloned();
        let matched = remaining.iter_mut().find(|slot| {
            slot.as_ref()
                .map_or(false, |group| id.is_some() && group.get("id") == id.as_ref())
        });
        match matched.and_then(Option::take) {
            Some(mut new_group) => {
                let mut items = items_of(&old_group);
                items.extend(items_of(&new_group));
                if let Some(object) = new_group.as_object_mut() {
                    object.insert("items".to_string(), Value::Array(items));
                }
                compiled.push(new_group);
            }
            None => compiled.push(old_group),
        }
    }
    compiled.extend(remaining.into_iter().flatten());

    if let Some(object) = envelope.as_object_mut() {
        object.insert("groups".to_string(), Value::Array(compiled));
    }
    envelope
}

fn items_of(group: &Value) -> Vec<Value> {
    group
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_merge_old_first() {
        assert_eq!(merge_flat(json!(["a"]), json!(["x"])), json!(["x", "a"]));
        assert_eq!(
            merge_flat(json!(["x", "y"]), json!(["a", "b"])),
            json!(["a", "b", "x", "y"])
        );
    }

    #[test]
    fn test_flat_merge_replaces_non_arrays() {
        assert_eq!(merge_flat(json!({"a": 1}), json!(["x"])), json!({"a": 1}));
        assert_eq!(merge_flat(json!(["a"]), Value::Null), json!(["a"]));
    }

    #[test]
    fn test_grouped_merge() {
        let old = json!({"groups": [{"id": 1, "items": ["x"]}, {"id": 2, "items": ["y"]}]});
        let new = json!({"groups": [{"id": 1, "items": ["a"]}], "facets": {"f": 1}});

        let merged = merge_grouped(new, old);
        assert_eq!(
            merged,
            json!({
                "groups": [{"id": 1, "items": ["x", "a"]}, {"id": 2, "items": ["y"]}],
                "facets": {"f": 1}
            })
        );
    }

    #[test]
    fn test_grouped_merge_keeps_new_only_groups() {
        let old = json!({"groups": [{"id": 1, "items": ["x"]}]});
        let new = json!({"groups": [{"id": 3, "items": ["c"]}, {"id": 1, "items": ["a"]}]});

        let merged = merge_grouped(new, old);
        assert_eq!(
            merged["groups"],
            json!([{"id": 1, "items": ["x", "a"]}, {"id": 3, "items": ["c"]}])
        );
    }

    #[test]
    fn test_grouped_merge_without_new_data() {
        let old = json!({"groups": [{"id": 1, "items": ["x"]}]});
        assert_eq!(merge_grouped(Value::Null, old.clone()), old);
    }

    #[test]
    fn test_effective_strategy() {
        assert!(matches!(DataMerger::default().effective(true), DataMerger::Grouped));
        assert!(matches!(DataMerger::default().effective(false), DataMerger::Concat));

        let custom = DataMerger::custom(|new, _old| new);
        assert!(matches!(custom.effective(true), DataMerger::Custom(_)));
        assert_eq!(custom.merge(json!(1), json!(2)), json!(1));
    }
}
