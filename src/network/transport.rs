//! Transport contract between the request engine and an HTTP stack

use crate::config::{CallMethod, FetchOptions};
use crate::error::SearchError;
use async_trait::async_trait;
use futures::future::AbortHandle;
use serde_json::Value;
use thiserror::Error;

/// Cancellation signal attached to a single request
///
/// The engine owns the matching handle; once it aborts, the request is
/// superseded and its outcome is ignored.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    handle: AbortHandle,
}

impl CancelSignal {
    pub fn new(handle: AbortHandle) -> Self {
        Self { handle }
    }

    /// A signal nobody will ever cancel
    pub fn never() -> Self {
        let (handle, _registration) = AbortHandle::new_pair();
        Self { handle }
    }

    /// Whether the request has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

/// A single endpoint call
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Full target; for POST this is the bare endpoint
    pub url: String,
    /// HTTP method
    pub method: CallMethod,
    /// JSON body, only for POST
    pub body: Option<Value>,
    /// Cancellation signal of this request
    pub signal: CancelSignal,
    /// Pass-through options from the configuration
    pub options: FetchOptions,
}

/// Why a transport call did not produce a response body
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The request was cancelled before it completed
    #[error("Request cancelled")]
    Cancelled,

    /// The endpoint answered with a non-success status
    #[error("Endpoint responded with status {status}")]
    Status { status: u16, payload: Option<Value> },

    /// The endpoint could not be reached or the body was unreadable
    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status, if the endpoint answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Normalized payload for `SearchData::error`
    pub fn to_search_error(&self) -> SearchError {
        match self {
            Self::Status { status, payload } => {
                SearchError::from_response(Some(*status), payload.clone())
            }
            Self::Network(message) => SearchError::Transport {
                message: message.clone(),
                status: 500,
            },
            Self::Cancelled => SearchError::from_response(None, None),
        }
    }
}

/// Something that can execute endpoint calls
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a call and return the decoded JSON body
    async fn call(&self, request: TransportRequest) -> Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cancel_signal() {
        let (handle, _registration) = AbortHandle::new_pair();
        let signal = CancelSignal::new(handle.clone());
        assert!(!signal.is_cancelled());
        handle.abort();
        assert!(signal.is_cancelled());
        assert!(!CancelSignal::never().is_cancelled());
    }

    #[test]
    fn test_error_normalization() {
        let error = TransportError::Status {
            status: 404,
            payload: None,
        };
        assert_eq!(error.status(), Some(404));
        assert_eq!(
            error.to_search_error(),
            SearchError::Transport {
                message: SearchError::DEFAULT_MESSAGE.to_string(),
                status: 404
            }
        );

        let upstream = TransportError::Status {
            status: 400,
            payload: Some(json!({"message": "invalid facet"})),
        };
        assert_eq!(upstream.to_search_error().message(), "invalid facet");
        assert!(TransportError::Cancelled.is_cancelled());
    }
}
