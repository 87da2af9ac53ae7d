//! Search instance
//!
//! `LimboSearch` is a cheap handle around one search instance. Operations
//! without the `_async` suffix start the search on the current tokio runtime
//! and return its join handle; the `_async` versions wait for it. Outside a
//! runtime nothing is started and those operations return `None`.

mod engine;
mod models;

pub use models::{RequestOptions, SearchOptions};

use crate::config::{LiveSearch, SearchConfig};
use crate::error::Result;
use crate::filters::FieldValue;
use crate::pagination::{resolve_amount, Page, PaginationState};
use crate::params::ParameterSet;
use crate::results::{SearchData, SearchState};
use engine::Engine;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a search instance
#[derive(Clone)]
pub struct LimboSearch {
    inner: Arc<Engine>,
}

impl LimboSearch {
    /// Build an instance without searching
    pub fn new(options: SearchOptions) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Engine::new(options)?),
        })
    }

    /// Build an instance and run its initial search
    pub async fn create(options: SearchOptions) -> Result<Self> {
        let search = Self::new(options)?;
        search.init().await;
        Ok(search)
    }

    /// Run the configured initial search and the `on_init` hook
    pub async fn init(&self) {
        let immediate = &self.inner.config.immediate_search;
        if !immediate.is_enabled() {
            self.reset_pagination();
            self.inner.slot.state().is_initiated = true;
        }

        if immediate.runs_on_init() {
            self.reset_pagination();
            if immediate.uses_url_query() {
                self.inner.mix_parameters_from_url();
                self.inner.snapshot_watched();
            }
            self.request_search(RequestOptions::default().with_delay(0))
                .await;
        }

        self.inner.hooks.on_init(self);
    }

    /// Key of the state slot
    pub fn search_key(&self) -> &str {
        &self.inner.key
    }

    /// Effective configuration
    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    /// Run a search; appending searches extend the existing data
    pub async fn request_search(&self, options: RequestOptions) {
        if let Some(ticket) = self.inner.begin(&options) {
            self.inner.run(options, ticket).await;
        }
    }

    fn spawn_search(&self, options: RequestOptions) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime, search '{}' not started", self.inner.key);
            return None;
        };
        let ticket = self.inner.begin(&options)?;
        let inner = self.inner.clone();
        Some(runtime.spawn(async move {
            inner.run(options, ticket).await;
        }))
    }

    fn prepare_submit(&self) {
        self.inner.local().internal.clear();
        self.reset_pagination();
    }

    /// Start a fresh search from the first page; `None` when disposed or
    /// called outside a tokio runtime
    pub fn submit(&self) -> Option<JoinHandle<()>> {
        self.prepare_submit();
        self.spawn_search(RequestOptions::default())
    }

    pub async fn submit_async(&self) {
        self.prepare_submit();
        self.request_search(RequestOptions::default()).await;
    }

    /// Fresh search with an explicit first page size
    pub fn submit_with_limit(&self, limit: u64) -> Option<JoinHandle<()>> {
        self.prepare_submit();
        self.spawn_search(limit_overwrite(limit))
    }

    pub async fn submit_with_limit_async(&self, limit: u64) {
        self.prepare_submit();
        self.request_search(limit_overwrite(limit)).await;
    }

    /// Move the flat pagination one page ahead; false if nothing to fetch
    fn prepare_fetch_more(&self, amount: Option<u64>) -> bool {
        if self.inner.is_disposed() {
            return false;
        }
        if self.inner.config.enable_grouped_search {
            debug!("fetch_more ignored in grouped mode, use fetch_more_group");
            return false;
        }
        let state = self.state();
        if state.is_loading || !state.has_more() {
            return false;
        }
        let amount = resolve_amount(amount, self.inner.config.limit.value(None));
        self.inner.local().pagination.advance(amount);
        true
    }

    /// Load the next page; `None` uses the configured page size
    pub fn fetch_more(&self, amount: Option<u64>) -> Option<JoinHandle<()>> {
        if !self.prepare_fetch_more(amount) {
            return None;
        }
        self.spawn_search(RequestOptions::append())
    }

    /// Load the next page and wait for it; false if there was nothing to load
    pub async fn fetch_more_async(&self, amount: Option<u64>) -> bool {
        if !self.prepare_fetch_more(amount) {
            return false;
        }
        self.request_search(RequestOptions::append()).await;
        true
    }

    fn prepare_fetch_all(&self) -> bool {
        if self.inner.is_disposed() || self.inner.config.enable_grouped_search {
            return false;
        }
        let data = self.search_data();
        if data.has_error() || !self.state().has_more() {
            return false;
        }
        let Some(totals) = data.pagination.and_then(|p| p.flat()) else {
            return false;
        };
        let page = Page::new(totals.remaining(), totals.page().consumed());
        self.inner.local().pagination.set_flat(page);
        true
    }

    /// Load every remaining item
    pub fn fetch_all(&self) -> Option<JoinHandle<()>> {
        if !self.prepare_fetch_all() {
            return None;
        }
        self.spawn_search(RequestOptions::append())
    }

    pub async fn fetch_all_async(&self) -> bool {
        if !self.prepare_fetch_all() {
            return false;
        }
        self.request_search(RequestOptions::append()).await;
        true
    }

    /// Scope the next search to one group and set its page
    fn prepare_group(&self, id: &str, amount: GroupAmount) -> bool {
        if self.inner.is_disposed() || !self.inner.config.enable_grouped_search {
            return false;
        }
        let data = self.search_data();
        if data.has_error() || !self.state().has_more_in_group(id) {
            return false;
        }

        let group_parameter = self.inner.config.group_parameter.clone();
        let mut local = self.inner.local();
        local
            .internal
            .insert(group_parameter, Value::String(id.to_string()));

        let Some(totals) = data.pagination.and_then(|p| p.group(id)) else {
            return false;
        };
        let limit = match amount {
            GroupAmount::Next(amount) => {
                resolve_amount(amount, self.inner.config.limit.value(Some(id)))
            }
            GroupAmount::Rest => totals.remaining(),
        };
        local
            .pagination
            .set_group(id, Page::new(limit, totals.page().consumed()));
        true
    }

    /// Load the next page of one group
    pub fn fetch_more_group(&self, id: &str, amount: Option<u64>) -> Option<JoinHandle<()>> {
        if !self.prepare_group(id, GroupAmount::Next(amount)) {
            return None;
        }
        self.spawn_search(RequestOptions::append())
    }

    pub async fn fetch_more_group_async(&self, id: &str, amount: Option<u64>) -> bool {
        if !self.prepare_group(id, GroupAmount::Next(amount)) {
            return false;
        }
        self.request_search(RequestOptions::append()).await;
        true
    }

    /// Load every remaining item of one group
    pub fn fetch_all_group(&self, id: &str) -> Option<JoinHandle<()>> {
        if !self.prepare_group(id, GroupAmount::Rest) {
            return None;
        }
        self.spawn_search(RequestOptions::append())
    }

    pub async fn fetch_all_group_async(&self, id: &str) -> bool {
        if !self.prepare_group(id, GroupAmount::Rest) {
            return false;
        }
        self.request_search(RequestOptions::append()).await;
        true
    }

    /// Back to the configured initial page sizes
    pub fn reset_pagination(&self) {
        self.inner.reset_pagination();
    }

    /// Back to a never-searched state
    pub fn reset_state(&self) {
        *self.inner.slot.state() = SearchState::default();
    }

    /// Mirror a serialized query (current parameters when `None`) into the URL
    pub fn set_url_query(&self, serialized: Option<&str>, clear_hash: bool) -> String {
        match serialized {
            Some(serialized) => self.inner.set_url_query(serialized, clear_hash),
            None => {
                let serialized = self.get_serialized_params(None);
                self.inner.set_url_query(&serialized, clear_hash)
            }
        }
    }

    /// Serialize parameters (current parameters when `None`)
    pub fn get_serialized_params(&self, parameters: Option<&ParameterSet>) -> String {
        match parameters {
            Some(parameters) => crate::url_sync::get_serialized_params(parameters, &self.inner.config),
            None => crate::url_sync::get_serialized_params(&self.parameters(), &self.inner.config),
        }
    }

    /// Parameters a fresh search would send
    pub fn parameters(&self) -> ParameterSet {
        self.inner.resolve_parameters()
    }

    /// Parameters live search reacts to
    pub fn watched_parameters(&self) -> ParameterSet {
        self.inner.watched_parameters()
    }

    /// Whether the group parameter is left out of the visible URL
    pub fn hide_groups_parameter(&self) -> bool {
        self.inner.hide_groups_parameter()
    }

    /// Bind a value onto a filter field; false if there is no such field
    pub fn set_field(&self, name: &str, value: Option<&Value>) -> bool {
        let found = self.inner.filters_mut().set_field(name, value);
        if found {
            self.check_live_search();
        }
        found
    }

    /// Current value of a filter field
    pub fn field_value(&self, name: &str) -> Option<FieldValue> {
        self.inner.filters().field(name).map(|field| field.value.clone())
    }

    /// Pick up changes the caller made to the bound filters
    pub fn refresh_filters(&self) -> Option<JoinHandle<()>> {
        let config = &self.inner.config;
        if config.update_search_filters_on_binding_change && !config.allow_search_filters_mutation {
            let copy = self
                .inner
                .source_filters
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .without_reserved();
            *self.inner.filters_mut() = copy;
        }
        self.check_live_search()
    }

    /// Replace the static extras
    pub fn set_extra_parameters(&self, parameters: ParameterSet) -> Option<JoinHandle<()>> {
        self.inner.local().extra = parameters;
        self.check_live_search()
    }

    /// Replace the overwrites
    pub fn set_parameter_overwrites(&self, parameters: ParameterSet) -> Option<JoinHandle<()>> {
        self.inner.local().overwrites = parameters;
        self.check_live_search()
    }

    /// Submit if live search is on and a watched parameter changed
    fn check_live_search(&self) -> Option<JoinHandle<()>> {
        let previous = self.inner.snapshot_watched();
        let live = &self.inner.config.enable_live_search;
        if !live.is_enabled() || !self.state().has_fetched_once {
            return None;
        }

        let current = self.inner.local().watched.clone();
        let changed = match live {
            LiveSearch::Toggle(_) => previous != current,
            LiveSearch::Parameters(names) => names
                .iter()
                .any(|name| previous.get(name) != current.get(name)),
        };
        if !changed {
            return None;
        }
        info!("Watched parameters of '{}' changed, searching", self.inner.key);
        self.submit()
    }

    /// Copy of the search data
    pub fn search_data(&self) -> SearchData {
        self.inner.slot.data_snapshot()
    }

    /// Copy of the request state
    pub fn state(&self) -> SearchState {
        self.inner.slot.state_snapshot()
    }

    /// Data as handed to consumers, after the output transformer
    pub fn output_data(&self) -> Value {
        let data = self.inner.slot.data().data.clone();
        self.inner.hooks.transform_output(data)
    }

    /// Current local pagination
    pub fn pagination(&self) -> PaginationState {
        self.inner.local().pagination.clone()
    }

    /// Parameters of the last successful search
    pub fn query_parameters(&self) -> Option<ParameterSet> {
        self.inner.local().query_parameters.clone()
    }

    /// Raw body of the last successful response
    pub fn latest_response(&self) -> Option<Value> {
        self.inner.local().latest_response.clone()
    }

    /// Target of the last request
    pub fn last_requested_url(&self) -> Option<String> {
        self.inner.local().last_requested_url.clone()
    }

    /// Cancel pending work and release the state slot; the instance is inert
    /// afterwards
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

enum GroupAmount {
    Next(Option<u64>),
    Rest,
}

fn limit_overwrite(limit: u64) -> RequestOptions {
    let mut parameter_overwrites = ParameterSet::new();
    parameter_overwrites.insert("limit".to_string(), json!(limit));
    RequestOptions {
        parameter_overwrites,
        ..RequestOptions::default()
    }
}
