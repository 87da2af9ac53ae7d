//! Pagination model
//!
//! Tracks `{limit, offset}` either for one flat list or per group id, and
//! converts it to the wire form (`limit`/`offset` or `l{id}`/`o{id}`).
//! Server pagination is authoritative: after every successful response the
//! local state is resynchronized from it.

use crate::config::{LimitConfig, DEFAULT_LIMIT};
use crate::params::{value_to_string, ParameterSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use serde_json::{json, Value};
use std::collections::BTreeMap;

static GROUP_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([lo])(0|[1-9][0-9]*)$").expect("valid group key pattern"));

static CANONICAL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|[1-9][0-9]*)$").expect("valid group id pattern"));

/// Limit/offset pair for one list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Items already covered by this page and the ones before it
    pub fn consumed(&self) -> u64 {
        self.limit.saturating_add(self.offset)
    }
}

/// Server-reported pagination for one list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageTotals {
    pub limit: u64,
    pub offset: u64,
    pub total: u64,
}

impl PageTotals {
    pub fn new(limit: u64, offset: u64, total: u64) -> Self {
        Self {
            limit,
            offset,
            total,
        }
    }

    /// Read totals from a loosely typed object; missing or invalid numbers are 0
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(coerce_count).unwrap_or(0);
        Self {
            limit: field("limit"),
            offset: field("offset"),
            total: field("total"),
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }

    /// `limit + offset < total`
    pub fn has_more(&self) -> bool {
        self.page().consumed() < self.total
    }

    /// Items left after everything already fetched
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.page().consumed())
    }
}

/// Which half of a grouped wire key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    Limit,
    Offset,
}

/// Parse `l{id}` / `o{id}` keys
pub fn parse_group_key(key: &str) -> Option<(PageField, String)> {
    let caps = GROUP_KEY_RE.captures(key)?;
    let field = match &caps[1] {
        "l" => PageField::Limit,
        _ => PageField::Offset,
    };
    Some((field, caps[2].to_string()))
}

/// Whether a key is a canonical integer group id
pub fn is_canonical_id(key: &str) -> bool {
    CANONICAL_ID_RE.is_match(key)
}

/// Browser object key order: integer ids first in numeric order, then the
/// rest by name
pub fn compare_group_ids(a: &str, b: &str) -> Ordering {
    let numeric = |id: &str| {
        if is_canonical_id(id) {
            id.parse::<u64>().ok()
        } else {
            None
        }
    };
    match (numeric(a), numeric(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Entries of a group map in group id order
pub fn in_group_order<V>(groups: &BTreeMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = groups.iter().collect();
    entries.sort_by(|a, b| compare_group_ids(a.0, b.0));
    entries
}

fn serialize_in_group_order<S, V>(
    groups: &BTreeMap<String, V>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_map(in_group_order(groups))
}

/// Local pagination state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationState {
    Flat(Page),
    Grouped(BTreeMap<String, Page>),
}

impl PaginationState {
    /// Empty state in the right shape
    pub fn new(grouped: bool) -> Self {
        if grouped {
            Self::Grouped(BTreeMap::new())
        } else {
            Self::Flat(Page::default())
        }
    }

    /// Flat page, if in flat mode
    pub fn flat(&self) -> Option<Page> {
        match self {
            Self::Flat(page) => Some(*page),
            Self::Grouped(_) => None,
        }
    }

    /// Page of a group, if in grouped mode and known
    pub fn group(&self, id: &str) -> Option<Page> {
        match self {
            Self::Flat(_) => None,
            Self::Grouped(groups) => groups.get(id).copied(),
        }
    }

    /// Wire form of the pagination
    pub fn to_wire(&self) -> ParameterSet {
        let mut parameters = ParameterSet::new();
        match self {
            Self::Flat(page) => {
                parameters.insert("limit".to_string(), json!(page.limit));
                parameters.insert("offset".to_string(), json!(page.offset));
            }
            Self::Grouped(groups) => {
                for (id, page) in in_group_order(groups) {
                    parameters.insert(format!("l{}", id), json!(page.limit));
                    parameters.insert(format!("o{}", id), json!(page.offset));
                }
            }
        }
        parameters
    }

    /// Back to the configured initial limits and offset 0
    ///
    /// In grouped mode every configured group id is created if missing.
    pub fn reset(&mut self, limits: &LimitConfig) {
        match self {
            Self::Flat(page) => *page = Page::new(limits.initial(None), 0),
            Self::Grouped(groups) => {
                for id in limits.group_ids() {
                    groups.entry(id).or_default();
                }
                for (id, page) in groups.iter_mut() {
                    *page = Page::new(limits.initial(Some(id)), 0);
                }
            }
        }
    }

    /// Flat "fetch more": `offset += limit; limit = amount`
    pub fn advance(&mut self, amount: u64) {
        if let Self::Flat(page) = self {
            page.offset = page.consumed();
            page.limit = amount;
        }
    }

    /// Replace the flat page
    pub fn set_flat(&mut self, page: Page) {
        if let Self::Flat(current) = self {
            *current = page;
        }
    }

    /// Replace one group's page
    pub fn set_group(&mut self, id: &str, page: Page) {
        if let Self::Grouped(groups) = self {
            groups.insert(id.to_string(), page);
        }
    }

    /// Fold a URL query parameter into the state; returns whether it was a
    /// pagination parameter for the current mode
    pub fn apply_url_param(&mut self, key: &str, value: &str) -> bool {
        let key = key.to_lowercase();
        match self {
            Self::Flat(page) => match key.as_str() {
                "limit" => {
                    page.limit = parse_count(value).unwrap_or(DEFAULT_LIMIT);
                    true
                }
                "offset" => {
                    page.offset = parse_count(value).unwrap_or(0);
                    true
                }
                _ => false,
            },
            Self::Grouped(groups) => {
                let Some((field, id)) = parse_group_key(&key) else {
                    return false;
                };
                let page = groups.entry(id).or_default();
                match field {
                    PageField::Limit => page.limit = parse_count(value).unwrap_or(DEFAULT_LIMIT),
                    PageField::Offset => page.offset = parse_count(value).unwrap_or(0),
                }
                true
            }
        }
    }

    /// Turn a deep link into "everything up to that page": `limit += offset; offset = 0`
    pub fn absorb_offsets(&mut self) {
        let absorb = |page: &mut Page| {
            if page.offset > 0 {
                page.limit = page.consumed();
                page.offset = 0;
            }
        };
        match self {
            Self::Flat(page) => absorb(page),
            Self::Grouped(groups) => groups.values_mut().for_each(absorb),
        }
    }

    /// Take over server pagination after a successful response
    pub fn sync_from_server(&mut self, server: &ServerPagination) {
        match (self, server) {
            (Self::Flat(page), ServerPagination::Flat(totals)) => *page = totals.page(),
            (Self::Grouped(groups), ServerPagination::Grouped(totals)) => {
                for (id, totals) in totals {
                    groups.insert(id.clone(), totals.page());
                }
            }
            _ => {}
        }
    }
}

/// Pagination as reported by the server, stored in `SearchData`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerPagination {
    Flat(PageTotals),
    Grouped(#[serde(serialize_with = "serialize_in_group_order")] BTreeMap<String, PageTotals>),
}

impl ServerPagination {
    /// Flat totals, if flat
    pub fn flat(&self) -> Option<PageTotals> {
        match self {
            Self::Flat(totals) => Some(*totals),
            Self::Grouped(_) => None,
        }
    }

    /// Totals of one group, if grouped and known
    pub fn group(&self, id: &str) -> Option<PageTotals> {
        match self {
            Self::Flat(_) => None,
            Self::Grouped(groups) => groups.get(id).copied(),
        }
    }

    /// Read grouped totals from a loosely typed object (`{ "1": {...}, ... }`)
    pub fn grouped_from_value(value: Option<&Value>) -> BTreeMap<String, PageTotals> {
        value
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .map(|(id, totals)| (id.clone(), PageTotals::from_value(totals)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Recompute the "more items" flags
    pub fn has_more_items(&self) -> HasMoreItems {
        match self {
            Self::Flat(totals) => HasMoreItems::Flat(totals.has_more()),
            Self::Grouped(groups) => HasMoreItems::Grouped(
                groups
                    .iter()
                    .map(|(id, totals)| (id.clone(), totals.has_more()))
                    .collect(),
            ),
        }
    }
}

/// Whether more items exist, overall or per group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HasMoreItems {
    Flat(bool),
    Grouped(#[serde(serialize_with = "serialize_in_group_order")] BTreeMap<String, bool>),
}

impl HasMoreItems {
    /// Flat flag; in grouped mode whether any group has more
    pub fn any(&self) -> bool {
        match self {
            Self::Flat(more) => *more,
            Self::Grouped(groups) => groups.values().any(|more| *more),
        }
    }

    /// Flag of a single group
    pub fn group(&self, id: &str) -> bool {
        match self {
            Self::Flat(_) => false,
            Self::Grouped(groups) => groups.get(id).copied().unwrap_or(false),
        }
    }

    /// Set every flag to false, keeping the shape
    pub fn freeze(&mut self) {
        match self {
            Self::Flat(more) => *more = false,
            Self::Grouped(groups) => groups.values_mut().for_each(|more| *more = false),
        }
    }
}

/// Requested amount, falling back to the configured one; zero means "default"
pub fn resolve_amount(amount: Option<u64>, configured: u64) -> u64 {
    match amount.unwrap_or(configured) {
        0 => DEFAULT_LIMIT,
        amount => amount,
    }
}

/// Lenient integer parsing: leading whitespace, optional sign, leading digits
pub fn parse_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a non-negative count from text, clamping negatives to zero
pub fn parse_count(input: &str) -> Option<u64> {
    parse_int(input).map(|n| n.max(0) as u64)
}

/// Non-negative count from a loosely typed value
pub fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc().max(0.0) as u64),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

/// Group id of a response group (`{ "id": 1, ... }`)
pub fn group_id(group: &Value) -> Option<String> {
    group
        .get("id")
        .filter(|id| !id.is_null())
        .map(value_to_string)
}
