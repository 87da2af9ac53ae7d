//! URL synchronization
//!
//! Serializes parameters into a query string, computes the visible URL
//! (hidden and default-valued parameters left out, values remapped) and
//! mirrors it into the host. At startup the reverse direction restores
//! pagination, filter fields and extras from the current query.

use crate::config::SearchConfig;
use crate::filters::SearchFilters;
use crate::pagination::{parse_group_key, PageField, PaginationState};
use crate::params::{is_truthy, loose_eq, value_to_string, ParameterSet};
use crate::router::Router;
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

/// Serialize parameters to `key=value&...`
///
/// A parameter is kept when it is set, when it is persistent, or when it has a
/// declared default it differs from.
pub fn get_serialized_params(parameters: &ParameterSet, config: &SearchConfig) -> String {
    let mut pairs = Vec::with_capacity(parameters.len());
    for (key, value) in parameters {
        let persistent = config.is_persistent(key);
        let value = match value {
            Value::Array(options) => checked_option(options),
            other => other.clone(),
        };
        let differs_from_default = config
            .default_parameter_values
            .get(key)
            .map_or(false, |default| !loose_eq(&value, default));

        if is_truthy(&value) || differs_from_default || persistent {
            pairs.push(format!("{}={}", key, urlencoding::encode(&value_to_string(&value))));
        }
    }
    pairs.join("&")
}

fn checked_option(options: &[Value]) -> Value {
    options
        .iter()
        .find(|item| item.get("checked").map_or(false, is_truthy))
        .and_then(|item| item.get("value").cloned())
        .unwrap_or(Value::Null)
}

/// Query string as it should appear in the visible URL
pub fn visible_query(serialized: &str, config: &SearchConfig, hide_groups: bool) -> String {
    serialized
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(raw);

            if hide_groups && key == config.group_parameter {
                return None;
            }
            if default_value(key, config).map_or(false, |default| default == value) {
                return None;
            }
            if config.is_hidden(key) {
                return None;
            }

            let mapped = config
                .url_filter_mapping
                .get(key)
                .and_then(|mapping| mapping.get(&*value));
            Some(match mapped {
                Some(replacement) => format!("{}={}", key, urlencoding::encode(replacement)),
                None => format!("{}={}", key, raw),
            })
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Value at which a parameter is left out of the visible URL
fn default_value(key: &str, config: &SearchConfig) -> Option<String> {
    if let Some(default) = config.default_parameter_values.get(key) {
        return Some(value_to_string(default));
    }
    match key {
        "limit" => Some(config.limit.initial(None).to_string()),
        "offset" => Some("0".to_string()),
        _ => match parse_group_key(key)? {
            (PageField::Limit, id) => Some(config.limit.initial(Some(&id)).to_string()),
            (PageField::Offset, _) => Some("0".to_string()),
        },
    }
}

fn decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Write the visible URL for `serialized` into the host and return it
pub fn set_url_query(
    router: &dyn Router,
    config: &SearchConfig,
    serialized: &str,
    clear_hash: bool,
    hide_groups: bool,
) -> String {
    let location = router.location();
    let address = router.address();

    let query = visible_query(serialized, config, hide_groups);
    let mut url = if query.is_empty() {
        location.path.clone()
    } else {
        format!("{}?{}", location.path, query)
    };
    if !clear_hash {
        let hash = match &address {
            Some(current) => hash_of(current).to_string(),
            None => location.hash.clone(),
        };
        url.push_str(&hash);
    }

    let old_url = address.clone().unwrap_or_else(|| location.full_path.clone());
    if config.update_url_query_on_search && address.is_some() {
        router.replace_address(&url);
    }

    let route_update = &config.update_router_on_search;
    if route_update.is_enabled() && decode(&location.full_path) != decode(&url) {
        debug!("Updating route to {}", url);
        if route_update.push_history() {
            router.push(&url);
        } else {
            router.replace(&url);
        }
    }

    // The address bar keeps the pre-search URL when both mirrors are on
    if address.is_some() && route_update.is_enabled() && config.update_url_query_on_search {
        router.replace_address(&old_url);
    }

    url
}

fn hash_of(url: &str) -> &str {
    url.find('#').map_or("", |index| &url[index..])
}

/// Restore state from the URL query
///
/// Pagination keys fold into the pagination, other keys bind onto a filter
/// field of the same name or become internal extras. Afterwards every offset
/// is folded into its limit so a deep link fetches everything up to it.
pub fn mix_parameters_from_url(
    query: &[(String, String)],
    pagination: &mut PaginationState,
    filters: &mut SearchFilters,
    internal: &mut ParameterSet,
) {
    for (key, value) in query {
        if pagination.apply_url_param(key, value) {
            continue;
        }
        let value = Value::String(value.clone());
        if !filters.set_field(key, Some(&value)) {
            internal.insert(key.clone(), value);
        }
    }
    pagination.absorb_offsets();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitConfig, RouteUpdate};
    use crate::filters::{Field, OptionItem};
    use crate::pagination::Page;
    use crate::router::{MemoryRouter, Navigation};
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_serialize_skips_empty_values() {
        let config = SearchConfig::default();
        let parameters = params(&[
            ("q", json!("red shoes")),
            ("category", json!("")),
            ("contextId", Value::Null),
            ("limit", json!(12)),
            ("offset", json!(0)),
        ]);
        assert_eq!(
            get_serialized_params(&parameters, &config),
            "q=red%20shoes&contextId=&limit=12"
        );
    }

    #[test]
    fn test_serialize_declared_defaults() {
        let mut config = SearchConfig::default();
        config
            .default_parameter_values
            .insert("sort".to_string(), json!("relevance"));
        config
            .default_parameter_values
            .insert("stock".to_string(), json!(true));

        let parameters = params(&[("sort", json!("relevance")), ("stock", json!(false))]);
        assert_eq!(get_serialized_params(&parameters, &config), "sort=relevance&stock=false");
    }

    #[test]
    fn test_serialize_option_list() {
        let parameters = params(&[(
            "size",
            json!([{"value": "s", "checked": false}, {"value": "m", "checked": true}]),
        )]);
        assert_eq!(get_serialized_params(&parameters, &SearchConfig::default()), "size=m");
    }

    #[test]
    fn test_visible_query_suppression() {
        let mut config = SearchConfig::default();
        config.limit = serde_json::from_value(json!({"initial": 24, "value": 12})).unwrap();
        config
            .default_parameter_values
            .insert("sort".to_string(), json!("relevance"));

        let query = visible_query(
            "q=red&limit=24&offset=0&siteId=4&sort=relevance&groups=2",
            &config,
            true,
        );
        assert_eq!(query, "q=red");

        let query = visible_query("limit=12&offset=24", &config, false);
        assert_eq!(query, "limit=12&offset=24");
    }

    #[test]
    fn test_visible_query_grouped_defaults() {
        let mut config = SearchConfig::default();
        config.limit = serde_json::from_value::<LimitConfig>(json!({"1": {"initial": 18}})).unwrap();
        let query = visible_query("l1=18&o1=0&l2=12&o2=6", &config, false);
        assert_eq!(query, "o2=6");
    }

    #[test]
    fn test_visible_query_mapping() {
        let mut config = SearchConfig::default();
        config.url_filter_mapping.insert(
            "category".to_string(),
            [("12".to_string(), "shoes & boots".to_string())]
                .into_iter()
                .collect(),
        );
        let query = visible_query("category=12&q=x", &config, false);
        assert_eq!(query, "category=shoes%20%26%20boots&q=x");
    }

    #[test]
    fn test_set_url_query_address_bar() {
        let router = MemoryRouter::with_address_bar("/search?old=1#results");
        let url = set_url_query(&router, &SearchConfig::default(), "q=red", false, false);
        assert_eq!(url, "/search?q=red#results");
        assert_eq!(router.address(), Some(url));
        assert_eq!(router.location().full_path, "/search?old=1#results");
    }

    #[test]
    fn test_set_url_query_clear_hash() {
        let router = MemoryRouter::with_address_bar("/search#results");
        let url = set_url_query(&router, &SearchConfig::default(), "q=red", true, false);
        assert_eq!(url, "/search?q=red");
    }

    #[test]
    fn test_set_url_query_router_only() {
        let mut config = SearchConfig::default();
        config.update_url_query_on_search = false;
        config.update_router_on_search = RouteUpdate::Options { push_history: true };

        let router = MemoryRouter::new("/search#top");
        let url = set_url_query(&router, &config, "q=red%20shoes", false, false);
        assert_eq!(url, "/search?q=red%20shoes#top");
        assert_eq!(router.history(), vec![Navigation::Push(url.clone())]);

        set_url_query(&router, &config, "q=red%20shoes", false, false);
        assert_eq!(router.history().len(), 1);
    }

    #[test]
    fn test_set_url_query_restores_address_with_both_mirrors() {
        let mut config = SearchConfig::default();
        config.update_router_on_search = RouteUpdate::Toggle(true);

        let router = MemoryRouter::with_address_bar("/search?q=old");
        set_url_query(&router, &config, "q=new", false, false);
        assert_eq!(router.location().full_path, "/search?q=new");
        assert_eq!(router.address(), Some("/search?q=old".to_string()));
    }

    #[test]
    fn test_mix_parameters_from_url() {
        let mut pagination = PaginationState::Flat(Page::new(12, 0));
        let mut filters = SearchFilters::new("/api").with_field(Field::options(
            "category",
            vec![OptionItem::new("1", true), OptionItem::new("2", false)],
        ));
        let mut internal = ParameterSet::new();
        let query = vec![
            ("offset".to_string(), "20".to_string()),
            ("limit".to_string(), "10".to_string()),
            ("category".to_string(), "2".to_string()),
            ("ref".to_string(), "mail".to_string()),
        ];

        mix_parameters_from_url(&query, &mut pagination, &mut filters, &mut internal);

        assert_eq!(pagination.flat(), Some(Page::new(30, 0)));
        assert_eq!(filters.parameters().get("category"), Some(&json!("2")));
        assert_eq!(internal.get("ref"), Some(&json!("mail")));
    }
}
