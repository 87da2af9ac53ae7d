//! Request engine
//!
//! Runs at most one request per instance: debounces, cancels the previous
//! request, sends the new one and applies the response unless something
//! newer started in the meantime. Nothing escapes a search call; failures end
//! up in `SearchData::error`.

use super::models::{RequestOptions, SearchOptions};
use crate::config::{CallMethod, SearchConfig, SearchHooks};
use crate::error::{LimboError, Result, SearchError};
use crate::filters::{SearchFilters, SharedFilters};
use crate::network::{CancelSignal, Transport, TransportError, TransportRequest};
use crate::pagination::{group_id, HasMoreItems, PageTotals, PaginationState, ServerPagination};
use crate::params::{merge_into, ParameterSet, ParameterSources};
use crate::results::DataMerger;
use crate::router::Router;
use crate::store::{SearchSlot, StateStore};
use crate::url_sync;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Instance state that is not shared through the store
#[derive(Debug)]
pub(super) struct LocalState {
    /// Static extras from the caller
    pub extra: ParameterSet,
    /// Overwrites from the caller
    pub overwrites: ParameterSet,
    /// Extras picked up from the URL or set by group paging
    pub internal: ParameterSet,
    pub pagination: PaginationState,
    /// Parameters of the last successful search
    pub query_parameters: Option<ParameterSet>,
    /// Raw body of the last successful response
    pub latest_response: Option<Value>,
    pub last_requested_url: Option<String>,
    /// Watched parameters as of the last live search check
    pub watched: ParameterSet,
    /// Id handed to the most recent search
    sequence: u64,
    active_request: Option<(u64, AbortHandle)>,
    pending_delay: Option<(u64, AbortHandle)>,
}

impl LocalState {
    /// Forget the in-flight request if it is still the one with this id
    fn finish_request(&mut self, id: u64) {
        if matches!(self.active_request, Some((active, _)) if active == id) {
            self.active_request = None;
        }
    }
}

/// A search that passed `begin` and still has to run
pub(super) struct Ticket {
    id: u64,
    clear_hash: bool,
    debounce: Option<(Duration, AbortRegistration)>,
}

pub(super) struct Engine {
    pub key: String,
    pub config: SearchConfig,
    pub merger: DataMerger,
    pub hooks: Arc<dyn SearchHooks>,
    pub transport: Arc<dyn Transport>,
    pub router: Arc<dyn Router>,
    pub store: Arc<StateStore>,
    pub slot: Arc<SearchSlot>,
    /// Filters as handed in by the caller
    pub source_filters: SharedFilters,
    /// Filters the instance works on; the caller's handle in mutable mode
    pub filters: SharedFilters,
    local: Mutex<LocalState>,
    disposed: AtomicBool,
}

impl Engine {
    pub fn new(options: SearchOptions) -> Result<Self> {
        let SearchOptions {
            search_key,
            filters: source_filters,
            config,
            extra_parameters,
            parameter_overwrites,
            hooks,
            merger,
            transport,
            router,
            store,
        } = options;
        config.validate()?;

        let filters = if config.allow_search_filters_mutation {
            source_filters.clone()
        } else {
            let copy = read_filters(&source_filters).without_reserved();
            Arc::new(RwLock::new(copy))
        };
        let slot = store.get_or_create(&search_key);
        let local = LocalState {
            extra: extra_parameters,
            overwrites: parameter_overwrites,
            internal: ParameterSet::new(),
            pagination: PaginationState::new(config.enable_grouped_search),
            query_parameters: None,
            latest_response: None,
            last_requested_url: None,
            watched: ParameterSet::new(),
            sequence: 0,
            active_request: None,
            pending_delay: None,
        };

        let engine = Self {
            key: search_key,
            merger: merger.effective(config.enable_grouped_search),
            config,
            hooks,
            transport,
            router,
            store,
            slot,
            source_filters,
            filters,
            local: Mutex::new(local),
            disposed: AtomicBool::new(false),
        };
        engine.snapshot_watched();
        debug!("Created search '{}'", engine.key);
        Ok(engine)
    }

    pub fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn filters(&self) -> RwLockReadGuard<'_, SearchFilters> {
        read_filters(&self.filters)
    }

    pub fn filters_mut(&self) -> RwLockWriteGuard<'_, SearchFilters> {
        self.filters.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Everything that would be sent by a fresh search right now
    pub fn resolve_parameters(&self) -> ParameterSet {
        let filter_parameters = self.filters().parameters();
        let local = self.local();
        let pagination = local.pagination.to_wire();
        ParameterSources {
            extra: &local.extra,
            internal: &local.internal,
            filters: &filter_parameters,
            pagination: &pagination,
            overwrites: &local.overwrites,
        }
        .resolve(&self.config)
    }

    /// Parameters live search reacts to
    pub fn watched_parameters(&self) -> ParameterSet {
        let filter_parameters = self.filters().parameters();
        let local = self.local();
        let empty = ParameterSet::new();
        ParameterSources {
            extra: &local.extra,
            internal: &empty,
            filters: &filter_parameters,
            pagination: &empty,
            overwrites: &local.overwrites,
        }
        .watched()
    }

    /// Store the current watched parameters and return the previous ones
    pub fn snapshot_watched(&self) -> ParameterSet {
        let watched = self.watched_parameters();
        std::mem::replace(&mut self.local().watched, watched)
    }

    /// Whether the group parameter is only there because of group paging
    pub fn hide_groups_parameter(&self) -> bool {
        if !self.config.enable_grouped_search {
            return false;
        }
        let name = &self.config.group_parameter;
        let mut parameters = self.filters().parameters();
        let local = self.local();
        if !local.internal.contains_key(name) {
            return false;
        }
        merge_into(&mut parameters, &local.pagination.to_wire());
        merge_into(&mut parameters, &local.overwrites);
        match parameters.get(name) {
            Some(value) => !(crate::params::is_truthy(value) || self.config.is_persistent(name)),
            None => true,
        }
    }

    pub fn reset_pagination(&self) {
        self.local().pagination.reset(&self.config.limit);
    }

    /// Mirror a serialized query into the host URL
    pub fn set_url_query(&self, serialized: &str, clear_hash: bool) -> String {
        let hide_groups = self.hide_groups_parameter();
        url_sync::set_url_query(
            self.router.as_ref(),
            &self.config,
            serialized,
            clear_hash,
            hide_groups,
        )
    }

    /// Restore pagination, filter fields and extras from the current route
    pub fn mix_parameters_from_url(&self) {
        let query = self.router.location().query;
        let mut filters = self.filters_mut();
        let mut local = self.local();
        let local = &mut *local;
        url_sync::mix_parameters_from_url(
            &query,
            &mut local.pagination,
            &mut filters,
            &mut local.internal,
        );
    }

    /// Synchronous start of a search: flags it as loading, decides whether
    /// the hash gets cleared and registers the debounce, so the most recently
    /// started search is the one that runs. `None` once disposed.
    pub fn begin(&self, options: &RequestOptions) -> Option<Ticket> {
        if self.is_disposed() {
            return None;
        }
        let hash = self.router.location().hash;
        let clear = &self.config.clear_router_hash_on_search;

        let clear_hash = {
            let mut state = self.slot.state();
            let clear_hash = !options.append
                && !hash.is_empty()
                && clear.is_enabled()
                && (!self.config.immediate_search.is_enabled()
                    || state.has_fetched_once
                    || clear.include_initial_search());
            state.is_initiated = true;
            state.is_loading = true;
            clear_hash
        };

        let delay = options.delay.unwrap_or(self.config.search_delay);
        let mut local = self.local();
        local.sequence += 1;
        let id = local.sequence;
        if let Some((_, previous)) = local.pending_delay.take() {
            debug!("Search '{}' dropping a pending debounce", self.key);
            previous.abort();
        }
        let debounce = (delay > 0).then(|| {
            let (handle, registration) = AbortHandle::new_pair();
            local.pending_delay = Some((id, handle));
            (Duration::from_millis(delay), registration)
        });

        Some(Ticket {
            id,
            clear_hash,
            debounce,
        })
    }

    /// Asynchronous part of a search started with `begin`
    pub async fn run(&self, options: RequestOptions, ticket: Ticket) {
        let Ticket {
            id,
            clear_hash,
            debounce,
        } = ticket;
        if let Some((delay, registration)) = debounce {
            let sleep = tokio::time::sleep(delay);
            if Abortable::new(sleep, registration).await.is_err() {
                debug!("Search '{}' superseded during debounce", self.key);
                return;
            }
        }
        if self.is_disposed() {
            return;
        }

        if let Err(e) = self.execute(options, id, clear_hash).await {
            error!("Unexpected error during search '{}': {}", self.key, e);
            self.slot.state().is_loading = false;
            self.slot.data().error = Some(SearchError::unexpected(&e));
            self.local().finish_request(id);
        }

        self.hooks
            .on_after_search(self.slot.data_snapshot(), self.slot.state_snapshot());
    }

    async fn execute(&self, options: RequestOptions, id: u64, clear_hash: bool) -> Result<()> {
        let (handle, registration) = AbortHandle::new_pair();
        let previous = {
            let mut local = self.local();
            if matches!(local.pending_delay, Some((pending, _)) if pending == id) {
                local.pending_delay = None;
            }
            local.active_request.replace((id, handle.clone()))
        };
        if let Some((_, previous)) = previous {
            debug!("Cancelling previous request of '{}'", self.key);
            previous.abort();
        }

        let mut parameters = if options.append {
            let local = self.local();
            let mut parameters = local.query_parameters.clone().unwrap_or_default();
            merge_into(&mut parameters, &local.internal);
            merge_into(&mut parameters, &local.pagination.to_wire());
            parameters
        } else {
            self.resolve_parameters()
        };
        merge_into(&mut parameters, &options.parameter_overwrites);

        let serialized = url_sync::get_serialized_params(&parameters, &self.config);
        if self.config.syncs_url() {
            self.set_url_query(&serialized, clear_hash);
        }

        let endpoint = self.filters().endpoint_url.clone();
        if endpoint.trim().is_empty() {
            return Err(LimboError::orchestration("no endpoint URL to search"));
        }
        let (url, body) = match self.config.call_method {
            CallMethod::Get => (request_url(&endpoint, &serialized), None),
            CallMethod::Post => (endpoint, Some(self.hooks.transform_body(&parameters))),
        };

        self.local().last_requested_url = Some(url.clone());
        self.slot.state().is_append = options.append;

        let request = TransportRequest {
            url: url.clone(),
            method: self.config.call_method,
            body,
            signal: CancelSignal::new(handle.clone()),
            options: self.config.fetch_options.clone(),
        };
        debug!("Search '{}' requesting {}", self.key, url);

        let outcome = Abortable::new(self.transport.call(request), registration).await;
        let response = match outcome {
            Err(_) | Ok(Err(TransportError::Cancelled)) => {
                debug!("Request {} was cancelled", url);
                return Ok(());
            }
            Ok(Err(e)) => {
                self.handle_transport_error(&e, id, &handle);
                return Ok(());
            }
            Ok(Ok(response)) => response,
        };

        if self.is_stale(&handle, &url) {
            debug!("Discarding stale response from {}", url);
            return Ok(());
        }

        self.apply_response(response, options.append)?;
        self.local().finish_request(id);
        Ok(())
    }

    /// A response is stale once its request was cancelled, another target was
    /// requested, or a newer debounced search is waiting
    fn is_stale(&self, handle: &AbortHandle, url: &str) -> bool {
        let local = self.local();
        handle.is_aborted()
            || local.last_requested_url.as_deref() != Some(url)
            || local.pending_delay.is_some()
    }

    fn handle_transport_error(&self, e: &TransportError, id: u64, handle: &AbortHandle) {
        let superseded = handle.is_aborted() || self.local().pending_delay.is_some();
        if !superseded {
            warn!("Search '{}' failed: {}", self.key, e);
            let clear = self.config.clear_search_data_on_error;
            {
                let mut state = self.slot.state();
                state.has_fetched_once = true;
                if clear {
                    state.has_more_items = None;
                } else if self.config.enable_grouped_search {
                    if let Some(more) = state.has_more_items.as_mut() {
                        more.freeze();
                    }
                } else {
                    state.has_more_items = Some(HasMoreItems::Flat(false));
                }
                state.is_loading = false;
            }
            {
                let mut data = self.slot.data();
                if clear {
                    data.clear();
                }
                data.error = Some(e.to_search_error());
            }
            let mut local = self.local();
            if clear {
                local.latest_response = None;
            }
            local.finish_request(id);
        }
        self.hooks.on_response_error(e);
    }

    fn apply_response(&self, response: Value, append: bool) -> Result<()> {
        let transformed = self.hooks.transform_response(response.clone());
        let grouped = self.config.enable_grouped_search;

        let mut pagination = transformed.get("pagination").cloned().unwrap_or(Value::Null);
        if append {
            let previous = self.slot.data().pagination.clone();
            if let Some(previous) = previous {
                pagination = overlay(serde_json::to_value(previous)?, pagination);
            }
        }

        let server = if grouped {
            let mut totals = ServerPagination::grouped_from_value(Some(&pagination));
            let groups = transformed.get("groups").and_then(Value::as_array);
            for group in groups.into_iter().flatten() {
                if let Some(id) = group_id(group) {
                    totals.insert(id, PageTotals::from_value(group));
                }
            }
            ServerPagination::Grouped(totals)
        } else {
            ServerPagination::Flat(PageTotals::from_value(&pagination))
        };
        let has_more = server.has_more_items();

        let new_data = if grouped {
            transformed.clone()
        } else {
            transformed.get("data").cloned().unwrap_or(Value::Null)
        };
        let field = |name: &str| transformed.get(name).cloned().unwrap_or(Value::Null);

        let query_parameters = self.resolve_parameters();
        {
            let mut local = self.local();
            local.query_parameters = Some(query_parameters);
            local.latest_response = Some(response);
            local.pagination.sync_from_server(&server);
        }
        {
            let mut data = self.slot.data();
            data.error = None;
            data.data = if append {
                let old = data.data.take();
                self.merger.merge(new_data, old)
            } else {
                new_data
            };
            data.facets = field("facets");
            data.meta = field("meta");
            data.misc = field("misc");
            data.pagination = Some(server);
        }
        {
            let mut state = self.slot.state();
            state.has_fetched_once = true;
            state.has_more_items = Some(has_more);
            state.is_loading = false;
        }
        Ok(())
    }

    /// Cancel everything in flight and release the state slot
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut local = self.local();
            if let Some((_, handle)) = local.active_request.take() {
                handle.abort();
            }
            if let Some((_, handle)) = local.pending_delay.take() {
                handle.abort();
            }
        }
        self.store.release(&self.key);
        info!("Disposed search '{}'", self.key);
    }
}

fn read_filters(filters: &SharedFilters) -> RwLockReadGuard<'_, SearchFilters> {
    filters.read().unwrap_or_else(PoisonError::into_inner)
}

/// GET target for an endpoint and a serialized query
fn request_url(endpoint: &str, serialized: &str) -> String {
    if serialized.is_empty() {
        endpoint.to_string()
    } else if endpoint.contains('?') {
        format!("{}&{}", endpoint, serialized)
    } else {
        format!("{}?{}", endpoint, serialized)
    }
}

/// Shallow object merge, `top` wins; a non-object `top` keeps `base`
fn overlay(base: Value, top: Value) -> Value {
    match (base, top) {
        (Value::Object(mut base), Value::Object(top)) => {
            base.extend(top);
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, top) => top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_url() {
        assert_eq!(request_url("/api", ""), "/api");
        assert_eq!(request_url("/api", "q=a"), "/api?q=a");
        assert_eq!(request_url("/api?site=1", "q=a"), "/api?site=1&q=a");
    }

    #[test]
    fn test_finish_request_keeps_newer_request() {
        let (newer, _registration) = AbortHandle::new_pair();
        let mut local = LocalState {
            extra: ParameterSet::new(),
            overwrites: ParameterSet::new(),
            internal: ParameterSet::new(),
            pagination: PaginationState::new(false),
            query_parameters: None,
            latest_response: None,
            last_requested_url: None,
            watched: ParameterSet::new(),
            sequence: 2,
            active_request: Some((2, newer)),
            pending_delay: None,
        };

        local.finish_request(1);
        assert!(matches!(local.active_request, Some((2, _))));

        local.finish_request(2);
        assert!(local.active_request.is_none());
    }

    #[test]
    fn test_overlay() {
        assert_eq!(
            overlay(json!({"1": {"total": 3}, "2": {"total": 4}}), json!({"2": {"total": 5}})),
            json!({"1": {"total": 3}, "2": {"total": 5}})
        );
        assert_eq!(overlay(json!({"limit": 2}), Value::Null), json!({"limit": 2}));
    }
}
