//! Search data and request state types

use crate::error::SearchError;
use crate::pagination::{HasMoreItems, ServerPagination};
use serde::Serialize;
use serde_json::Value;

/// The fixed envelope holding everything a search produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchData {
    /// Result items (flat mode) or the whole grouped response (grouped mode)
    pub data: Value,
    /// Facets reported by the endpoint
    pub facets: Value,
    /// Server-reported pagination, authoritative for totals
    pub pagination: Option<ServerPagination>,
    /// Endpoint metadata
    pub meta: Value,
    /// Anything else the endpoint sends along
    pub misc: Value,
    /// Error of the last search, if it failed
    pub error: Option<SearchError>,
}

impl SearchData {
    /// Whether the last search failed
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Drop everything except the error
    pub fn clear(&mut self) {
        let error = self.error.take();
        *self = Self {
            error,
            ..Self::default()
        };
    }
}

/// Request lifecycle flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    /// A search has been requested at least once (or the instance is idle-ready)
    pub is_initiated: bool,
    /// A search is pending
    pub is_loading: bool,
    /// At least one search has settled
    pub has_fetched_once: bool,
    /// Whether more items exist; `None` before the first response
    pub has_more_items: Option<HasMoreItems>,
    /// The last search extended existing data
    pub is_append: bool,
    /// Set by consumers that track their own updates
    pub is_updated: bool,
}

impl SearchState {
    /// Flat "more items" flag; a grouped state counts as set once known
    pub fn has_more(&self) -> bool {
        match &self.has_more_items {
            None => false,
            Some(HasMoreItems::Flat(more)) => *more,
            Some(HasMoreItems::Grouped(_)) => true,
        }
    }

    /// "More items" flag of one group
    pub fn has_more_in_group(&self, id: &str) -> bool {
        self.has_more_items
            .as_ref()
            .map(|more| more.group(id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageTotals;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_clear_keeps_error() {
        let mut data = SearchData {
            data: json!([1, 2]),
            pagination: Some(ServerPagination::Flat(PageTotals::new(2, 0, 4))),
            error: Some(SearchError::from_response(Some(404), None)),
            ..Default::default()
        };
        data.clear();
        assert_eq!(data.data, Value::Null);
        assert!(data.pagination.is_none());
        assert!(data.has_error());
    }

    #[test]
    fn test_has_more_flags() {
        let mut state = SearchState::default();
        assert!(!state.has_more());

        state.has_more_items = Some(HasMoreItems::Flat(true));
        assert!(state.has_more());

        let mut groups = BTreeMap::new();
        groups.insert("1".to_string(), false);
        groups.insert("2".to_string(), true);
        state.has_more_items = Some(HasMoreItems::Grouped(groups));
        assert!(!state.has_more_in_group("1"));
        assert!(state.has_more_in_group("2"));
        assert!(!state.has_more_in_group("3"));
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(SearchState::default()).unwrap();
        assert_eq!(json["isLoading"], json!(false));
        assert_eq!(json["hasMoreItems"], Value::Null);
    }
}
