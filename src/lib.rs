//! Limbo Search: a client-side search state controller
//!
//! Builds query parameters from filter bindings, runs paginated and
//! cancellable requests against a search endpoint, merges the results into a
//! stable model and keeps the host URL in sync with the search.

pub mod config;
pub mod error;
pub mod filters;
pub mod network;
pub mod pagination;
pub mod params;
pub mod results;
pub mod router;
pub mod search;
pub mod store;
pub mod url_sync;

pub use config::{SearchConfig, SearchHooks};
pub use error::{LimboError, Result, SearchError};
pub use filters::{Field, FieldValue, OptionItem, SearchFilters, SharedFilters};
pub use network::{HttpTransport, Transport};
pub use results::{DataMerger, SearchData, SearchState};
pub use router::{MemoryRouter, Router};
pub use search::{LimboSearch, RequestOptions, SearchOptions};
pub use store::StateStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
