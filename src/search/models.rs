//! Construction and request options

use crate::config::{DefaultHooks, SearchConfig, SearchHooks};
use crate::filters::SharedFilters;
use crate::network::Transport;
use crate::params::ParameterSet;
use crate::results::DataMerger;
use crate::router::Router;
use crate::store::StateStore;
use std::sync::Arc;

/// Everything a search instance is built from
#[derive(Clone)]
pub struct SearchOptions {
    /// Key of the state slot; instances with the same key share results
    pub search_key: String,
    /// Caller-owned filters
    pub filters: SharedFilters,
    /// Behaviour switches
    pub config: SearchConfig,
    /// Static parameters sent with every search
    pub extra_parameters: ParameterSet,
    /// Parameters that override everything else
    pub parameter_overwrites: ParameterSet,
    /// Transformers and lifecycle callbacks
    pub hooks: Arc<dyn SearchHooks>,
    /// How appended pages are merged
    pub merger: DataMerger,
    /// Endpoint transport
    pub transport: Arc<dyn Transport>,
    /// Host router
    pub router: Arc<dyn Router>,
    /// Registry holding the state slot
    pub store: Arc<StateStore>,
}

impl SearchOptions {
    /// Options with default configuration, default hooks and the global store
    pub fn new(
        search_key: impl Into<String>,
        filters: SharedFilters,
        transport: Arc<dyn Transport>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self {
            search_key: search_key.into(),
            filters,
            config: SearchConfig::default(),
            extra_parameters: ParameterSet::new(),
            parameter_overwrites: ParameterSet::new(),
            hooks: Arc::new(DefaultHooks),
            merger: DataMerger::default(),
            transport,
            router,
            store: StateStore::global(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_extra_parameters(mut self, parameters: ParameterSet) -> Self {
        self.extra_parameters = parameters;
        self
    }

    pub fn with_parameter_overwrites(mut self, parameters: ParameterSet) -> Self {
        self.parameter_overwrites = parameters;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SearchHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_merger(mut self, merger: DataMerger) -> Self {
        self.merger = merger;
        self
    }

    /// Use a private store instead of the global one
    pub fn with_store(mut self, store: Arc<StateStore>) -> Self {
        self.store = store;
        self
    }
}

/// Options of a single `request_search` call
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Debounce delay in milliseconds; `None` uses the configured delay
    pub delay: Option<u64>,
    /// Extend the existing data instead of replacing it
    pub append: bool,
    /// Parameters applied on top of everything for this call only
    pub parameter_overwrites: ParameterSet,
}

impl RequestOptions {
    /// A paging request
    pub fn append() -> Self {
        Self {
            append: true,
            ..Self::default()
        }
    }

    /// Override the debounce delay
    pub fn with_delay(mut self, delay: u64) -> Self {
        self.delay = Some(delay);
        self
    }
}
