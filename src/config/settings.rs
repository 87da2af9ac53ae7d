//! Settings structures for limbo-search configuration

use crate::error::{LimboError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Limit used whenever nothing usable is configured
pub const DEFAULT_LIMIT: u64 = 12;

/// Main search configuration
///
/// Every field has a default, so a partial YAML/JSON document only needs to
/// name the options it overrides. Field names follow the camelCase option
/// names consumers already use in their page configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    /// HTTP method used for the endpoint call
    pub call_method: CallMethod,
    /// Re-search automatically when watched parameters change
    pub enable_live_search: LiveSearch,
    /// Run a search as soon as the instance is created
    pub immediate_search: ImmediateSearch,
    /// Drop the URL hash when a new (non-append) search runs
    pub clear_router_hash_on_search: ClearHash,
    /// Page sizes, flat or per group id
    pub limit: LimitConfig,
    /// Use `l{id}`/`o{id}` pagination instead of `limit`/`offset`
    pub enable_grouped_search: bool,
    /// Parameter used to scope "fetch more" to a single group
    pub group_parameter: String,
    /// Mirror the search into the address bar
    pub update_url_query_on_search: bool,
    /// Mirror the search into the host router
    #[serde(alias = "updateVueRouteOnSearch")]
    pub update_router_on_search: RouteUpdate,
    /// Clear previous data when a search fails
    pub clear_search_data_on_error: bool,
    /// Operate directly on the caller's filters instead of a private copy
    pub allow_search_filters_mutation: bool,
    /// Pick up changes to the bound filters
    pub update_search_filters_on_binding_change: bool,
    /// Parameters that are always sent, empty or not
    pub persistent_parameters: Vec<String>,
    /// Parameters that are sent but never shown in the URL
    pub hidden_parameters: Vec<String>,
    /// Values for which a parameter is left out of the URL
    pub default_parameter_values: BTreeMap<String, Value>,
    /// Debounce delay in milliseconds
    pub search_delay: u64,
    /// Per-parameter value remapping applied to the visible URL
    pub url_filter_mapping: BTreeMap<String, BTreeMap<String, String>>,
    /// Extra options passed to the transport
    pub fetch_options: FetchOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            call_method: CallMethod::Get,
            enable_live_search: LiveSearch::default(),
            immediate_search: ImmediateSearch::default(),
            clear_router_hash_on_search: ClearHash::default(),
            limit: LimitConfig::default(),
            enable_grouped_search: false,
            group_parameter: "groups".to_string(),
            update_url_query_on_search: true,
            update_router_on_search: RouteUpdate::default(),
            clear_search_data_on_error: true,
            allow_search_filters_mutation: false,
            update_search_filters_on_binding_change: true,
            persistent_parameters: vec!["contextId".to_string()],
            hidden_parameters: vec![
                "siteId".to_string(),
                "contextId".to_string(),
                "pageId".to_string(),
                "cultureId".to_string(),
            ],
            default_parameter_values: BTreeMap::new(),
            search_delay: 0,
            url_filter_mapping: BTreeMap::new(),
            fetch_options: FetchOptions::default(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: SearchConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (LIMBO_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("LIMBO_CALL_METHOD") {
            match val.to_uppercase().as_str() {
                "GET" => self.call_method = CallMethod::Get,
                "POST" => self.call_method = CallMethod::Post,
                other => warn!("Ignoring unknown LIMBO_CALL_METHOD '{}'", other),
            }
        }
        if let Ok(val) = std::env::var("LIMBO_SEARCH_DELAY") {
            if let Ok(delay) = val.parse() {
                self.search_delay = delay;
            }
        }
        if let Ok(val) = std::env::var("LIMBO_GROUP_PARAMETER") {
            if !val.is_empty() {
                self.group_parameter = val;
            }
        }
        if let Ok(val) = std::env::var("LIMBO_ENABLE_GROUPED_SEARCH") {
            self.enable_grouped_search = val.parse().unwrap_or(self.enable_grouped_search);
        }
        if let Ok(val) = std::env::var("LIMBO_UPDATE_URL_QUERY") {
            self.update_url_query_on_search =
                val.parse().unwrap_or(self.update_url_query_on_search);
        }
        if let Ok(val) = std::env::var("LIMBO_CLEAR_DATA_ON_ERROR") {
            self.clear_search_data_on_error =
                val.parse().unwrap_or(self.clear_search_data_on_error);
        }
    }

    /// Reject configurations the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.enable_grouped_search && self.group_parameter.trim().is_empty() {
            return Err(LimboError::config(
                "groupParameter must not be empty when grouped search is enabled",
            ));
        }
        Ok(())
    }

    /// Whether a parameter is always sent
    pub fn is_persistent(&self, name: &str) -> bool {
        self.persistent_parameters.iter().any(|p| p == name)
    }

    /// Whether a parameter is kept out of the visible URL
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden_parameters.iter().any(|p| p == name)
    }

    /// Whether any form of URL synchronization is on
    pub fn syncs_url(&self) -> bool {
        self.update_url_query_on_search || self.update_router_on_search.is_enabled()
    }
}

/// HTTP method for the endpoint call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallMethod {
    #[default]
    Get,
    Post,
}

/// Live search policy: everything, nothing, or a named subset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiveSearch {
    Toggle(bool),
    Parameters(Vec<String>),
}

impl Default for LiveSearch {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

impl LiveSearch {
    /// Whether live search is on at all
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Toggle(enabled) => *enabled,
            Self::Parameters(_) => true,
        }
    }
}

/// Options for the search run at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmediateOptions {
    #[serde(default = "default_true")]
    pub use_url_query: bool,
    #[serde(default = "default_true")]
    pub ssr: bool,
}

/// Immediate search policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImmediateSearch {
    Toggle(bool),
    Options(ImmediateOptions),
}

impl Default for ImmediateSearch {
    fn default() -> Self {
        Self::Options(ImmediateOptions {
            use_url_query: true,
            ssr: true,
        })
    }
}

impl ImmediateSearch {
    /// Whether immediate search is configured at all
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Toggle(enabled) => *enabled,
            Self::Options(_) => true,
        }
    }

    /// Whether the instance searches right away on creation
    pub fn runs_on_init(&self) -> bool {
        match self {
            Self::Toggle(enabled) => *enabled,
            Self::Options(options) => options.ssr,
        }
    }

    /// Whether the initial search restores its state from the URL
    pub fn uses_url_query(&self) -> bool {
        match self {
            Self::Toggle(enabled) => *enabled,
            Self::Options(options) => options.use_url_query,
        }
    }
}

/// Hash clearing policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClearHash {
    Toggle(bool),
    Options {
        #[serde(rename = "includeInitialSearch", default)]
        include_initial_search: bool,
    },
}

impl Default for ClearHash {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

impl ClearHash {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Toggle(false))
    }

    pub fn include_initial_search(&self) -> bool {
        matches!(
            self,
            Self::Options {
                include_initial_search: true
            }
        )
    }
}

/// Router mirroring policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteUpdate {
    Toggle(bool),
    Options {
        #[serde(rename = "pushHistory", default)]
        push_history: bool,
    },
}

impl Default for RouteUpdate {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

impl RouteUpdate {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Toggle(false))
    }

    pub fn push_history(&self) -> bool {
        matches!(self, Self::Options { push_history: true })
    }
}

/// Initial and follow-up page size
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitPair {
    /// Size of the first page after a submit
    pub initial: Option<u64>,
    /// Size of each "fetch more" page
    pub value: Option<u64>,
}

/// Page size for a single list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitSpec {
    Count(u64),
    Pair(LimitPair),
}

impl LimitSpec {
    /// Limit applied on submit: initial, then value, then the raw number
    pub fn initial(&self) -> u64 {
        let limit = match self {
            Self::Count(count) => *count,
            Self::Pair(pair) => pair.initial.or(pair.value).unwrap_or(0),
        };
        non_zero_or_default(limit)
    }

    /// Limit applied on "fetch more"
    pub fn value(&self) -> u64 {
        let limit = match self {
            Self::Count(count) => *count,
            Self::Pair(pair) => pair.value.unwrap_or(0),
        };
        non_zero_or_default(limit)
    }
}

/// Limit configuration, either one spec or one per group id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitConfig {
    Single(LimitSpec),
    Grouped(BTreeMap<String, LimitSpec>),
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self::Single(LimitSpec::Pair(LimitPair {
            initial: Some(DEFAULT_LIMIT),
            value: Some(DEFAULT_LIMIT),
        }))
    }
}

impl LimitConfig {
    /// Spec that applies to the flat list (`None`) or to a group
    ///
    /// A single spec applies to every group; a grouped map has no flat entry.
    pub fn spec_for(&self, group: Option<&str>) -> Option<&LimitSpec> {
        match (self, group) {
            (Self::Single(spec), _) => Some(spec),
            (Self::Grouped(groups), Some(id)) => groups.get(id),
            (Self::Grouped(_), None) => None,
        }
    }

    /// Initial limit for the flat list or a group
    pub fn initial(&self, group: Option<&str>) -> u64 {
        self.spec_for(group)
            .map(LimitSpec::initial)
            .unwrap_or(DEFAULT_LIMIT)
    }

    /// Follow-up limit for the flat list or a group
    pub fn value(&self, group: Option<&str>) -> u64 {
        self.spec_for(group)
            .map(LimitSpec::value)
            .unwrap_or(DEFAULT_LIMIT)
    }

    /// Group ids named in a grouped configuration
    pub fn group_ids(&self) -> Vec<String> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Grouped(groups) => {
                let mut ids: Vec<String> = groups
                    .keys()
                    .filter(|key| crate::pagination::is_canonical_id(key))
                    .cloned()
                    .collect();
                ids.sort_by(|a, b| crate::pagination::compare_group_ids(a, b));
                ids
            }
        }
    }
}

/// Extra options handed to the transport with every call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchOptions {
    /// Additional request headers
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn non_zero_or_default(limit: u64) -> u64 {
    if limit == 0 {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.call_method, CallMethod::Get);
        assert_eq!(config.group_parameter, "groups");
        assert!(config.update_url_query_on_search);
        assert!(config.is_persistent("contextId"));
        assert!(config.is_hidden("siteId"));
        assert_eq!(config.limit.initial(None), DEFAULT_LIMIT);
        assert!(config.immediate_search.runs_on_init());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SearchConfig::from_yaml_str(
            r#"
callMethod: POST
searchDelay: 250
enableLiveSearch: [q, category]
updateVueRouteOnSearch:
  pushHistory: true
"#,
        )
        .unwrap();

        assert_eq!(config.call_method, CallMethod::Post);
        assert_eq!(config.search_delay, 250);
        assert_eq!(
            config.enable_live_search,
            LiveSearch::Parameters(vec!["q".to_string(), "category".to_string()])
        );
        assert!(config.update_router_on_search.push_history());
        assert_eq!(config.group_parameter, "groups");
    }

    #[test]
    fn test_limit_shapes() {
        let flat: LimitConfig = serde_json::from_str("24").unwrap();
        assert_eq!(flat.initial(None), 24);
        assert_eq!(flat.value(None), 24);

        let pair: LimitConfig = serde_json::from_str(r#"{"initial": 30, "value": 10}"#).unwrap();
        assert_eq!(pair.initial(None), 30);
        assert_eq!(pair.value(None), 10);

        let grouped: LimitConfig =
            serde_json::from_str(r#"{"1": {"initial": 18, "value": 12}, "2": 6}"#).unwrap();
        assert_eq!(grouped.initial(Some("1")), 18);
        assert_eq!(grouped.value(Some("1")), 12);
        assert_eq!(grouped.initial(Some("2")), 6);
        assert_eq!(grouped.initial(Some("3")), DEFAULT_LIMIT);
        assert_eq!(grouped.group_ids(), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_zero_limit_falls_back() {
        let zero: LimitConfig = serde_json::from_str("0").unwrap();
        assert_eq!(zero.initial(None), DEFAULT_LIMIT);

        let value_only: LimitConfig = serde_json::from_str(r#"{"value": 8}"#).unwrap();
        assert_eq!(value_only.initial(None), 8);
    }

    #[test]
    fn test_grouped_requires_group_parameter() {
        let result = SearchConfig::from_json_str(
            r#"{"enableGroupedSearch": true, "groupParameter": ""}"#,
        );
        assert!(matches!(result, Err(LimboError::Config { .. })));
    }

    #[test]
    fn test_policy_helpers() {
        let hash: ClearHash = serde_json::from_str(r#"{"includeInitialSearch": true}"#).unwrap();
        assert!(hash.is_enabled());
        assert!(hash.include_initial_search());

        let immediate: ImmediateSearch =
            serde_json::from_str(r#"{"useUrlQuery": false, "ssr": true}"#).unwrap();
        assert!(immediate.runs_on_init());
        assert!(!immediate.uses_url_query());
        assert!(!ImmediateSearch::Toggle(false).is_enabled());
    }
}
