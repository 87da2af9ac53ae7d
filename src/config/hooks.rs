//! Hook capability set
//!
//! Every hook has an identity (or no-op) default, so implementors only
//! override what they need.

use crate::network::TransportError;
use crate::params::ParameterSet;
use crate::results::{SearchData, SearchState};
use crate::search::LimboSearch;
use serde_json::Value;

/// Optional transformers and lifecycle callbacks for a search instance
pub trait SearchHooks: Send + Sync {
    /// Transform the raw endpoint response before it is applied
    fn transform_response(&self, response: Value) -> Value {
        response
    }

    /// Build the request body for POST calls
    fn transform_body(&self, parameters: &ParameterSet) -> Value {
        Value::Object(parameters.clone().into_iter().collect())
    }

    /// Transform data handed to consumers; stored data is left untouched
    fn transform_output(&self, data: Value) -> Value {
        data
    }

    /// Called once the instance is ready
    fn on_init(&self, _search: &LimboSearch) {}

    /// Called after every search with copies of the resulting data and state
    fn on_after_search(&self, _data: SearchData, _state: SearchState) {}

    /// Called when the transport reports a failed response
    fn on_response_error(&self, _error: &TransportError) {}
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl SearchHooks for DefaultHooks {}
