//! Host router contract
//!
//! The URL synchronizer reads the current location through `Router` and
//! writes the visible URL back through it. `MemoryRouter` keeps everything in
//! memory and records each navigation.

use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError, RwLock};
use url::Url;

static BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("valid base URL"));

/// Current route of the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Path without query or hash (`/products`)
    pub path: String,
    /// Hash including the leading `#`, or empty
    pub hash: String,
    /// Path, query and hash as navigated to
    pub full_path: String,
    /// Decoded query pairs in URL order
    pub query: Vec<(String, String)>,
}

impl Location {
    /// Parse a relative (`/p?q=1#top`) or absolute URL
    pub fn parse(input: &str) -> Self {
        let Ok(url) = BASE_URL.join(input) else {
            return Self {
                path: input.to_string(),
                full_path: input.to_string(),
                ..Self::default()
            };
        };

        let hash = url
            .fragment()
            .filter(|fragment| !fragment.is_empty())
            .map(|fragment| format!("#{}", fragment))
            .unwrap_or_default();
        let query = url.query_pairs().into_owned().collect();
        let mut full_path = url.path().to_string();
        if let Some(search) = url.query().filter(|q| !q.is_empty()) {
            full_path.push('?');
            full_path.push_str(search);
        }
        full_path.push_str(&hash);

        Self {
            path: url.path().to_string(),
            hash,
            full_path,
            query,
        }
    }
}

/// Router of the host application
pub trait Router: Send + Sync {
    /// Current route
    fn location(&self) -> Location;

    /// Navigate without adding a history entry
    fn replace(&self, url: &str);

    /// Navigate and add a history entry
    fn push(&self, url: &str);

    /// Current address bar URL (path, query and hash), if there is one
    fn address(&self) -> Option<String>;

    /// Rewrite the address bar without navigating
    fn replace_address(&self, url: &str);
}

/// One recorded navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Push(String),
    Replace(String),
    ReplaceAddress(String),
}

/// In-memory router
///
/// Created with `new` it behaves like a server render: there is no address
/// bar. `with_address_bar` adds one that follows router navigations.
#[derive(Debug, Default)]
pub struct MemoryRouter {
    route: RwLock<Location>,
    address: RwLock<Option<String>>,
    history: Mutex<Vec<Navigation>>,
}

impl MemoryRouter {
    /// Router positioned at `url`, without an address bar
    pub fn new(url: &str) -> Self {
        Self {
            route: RwLock::new(Location::parse(url)),
            ..Self::default()
        }
    }

    /// Router positioned at `url` with an address bar showing the same URL
    pub fn with_address_bar(url: &str) -> Self {
        let router = Self::new(url);
        let full_path = router.location().full_path;
        *router.address.write().unwrap_or_else(PoisonError::into_inner) = Some(full_path);
        router
    }

    /// Every navigation so far, oldest first
    pub fn history(&self) -> Vec<Navigation> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, navigation: Navigation) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(navigation);
    }

    fn navigate(&self, url: &str) {
        let location = Location::parse(url);
        let mut address = self.address.write().unwrap_or_else(PoisonError::into_inner);
        if address.is_some() {
            *address = Some(location.full_path.clone());
        }
        *self.route.write().unwrap_or_else(PoisonError::into_inner) = location;
    }
}

impl Router for MemoryRouter {
    fn location(&self) -> Location {
        self.route
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, url: &str) {
        self.record(Navigation::Replace(url.to_string()));
        self.navigate(url);
    }

    fn push(&self, url: &str) {
        self.record(Navigation::Push(url.to_string()));
        self.navigate(url);
    }

    fn address(&self) -> Option<String> {
        self.address
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_address(&self, url: &str) {
        let mut address = self.address.write().unwrap_or_else(PoisonError::into_inner);
        if address.is_some() {
            self.record(Navigation::ReplaceAddress(url.to_string()));
            *address = Some(url.to_string());
        }
    }
}
