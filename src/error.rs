//! Error types for limbo-search
//!
//! `LimboError` covers the fallible library surface (configuration loading,
//! transport construction, orchestration). `SearchError` is the normalized
//! payload stored in `SearchData::error` so consumers never see a thrown
//! error from a search call.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for limbo-search operations
pub type Result<T> = std::result::Result<T, LimboError>;

/// Main error type for limbo-search operations
#[derive(Error, Debug)]
pub enum LimboError {
    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Failure while preparing or applying a search
    #[error("Orchestration error: {message}")]
    Orchestration { message: String },
}

impl LimboError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an orchestration error
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration {
            message: message.into(),
        }
    }
}

/// Error payload exposed through `SearchData::error`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchError {
    /// The endpoint answered with a failure and supplied its own body
    Upstream(Value),
    /// The endpoint failed without a usable body
    Transport { message: String, status: u16 },
    /// Something went wrong outside the transport call
    Unexpected {
        message: String,
        #[serde(rename = "originalError")]
        original_error: String,
    },
}

impl SearchError {
    /// Fallback message used when nothing better is known
    pub const DEFAULT_MESSAGE: &'static str = "An unexpected error occurred";

    /// Build a transport error from a status and an optional upstream payload
    pub fn from_response(status: Option<u16>, payload: Option<Value>) -> Self {
        match payload {
            Some(payload) if !payload.is_null() => Self::Upstream(payload),
            _ => Self::Transport {
                message: Self::DEFAULT_MESSAGE.to_string(),
                status: status.filter(|s| *s != 0).unwrap_or(500),
            },
        }
    }

    /// Wrap an unexpected failure, keeping the original error text
    pub fn unexpected(error: &dyn std::fmt::Display) -> Self {
        let original_error = error.to_string();
        let message = if original_error.is_empty() {
            Self::DEFAULT_MESSAGE.to_string()
        } else {
            original_error.clone()
        };
        Self::Unexpected {
            message,
            original_error,
        }
    }

    /// Human readable message for the error
    pub fn message(&self) -> String {
        match self {
            Self::Upstream(payload) => payload
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(Self::DEFAULT_MESSAGE)
                .to_string(),
            Self::Transport { message, .. } | Self::Unexpected { message, .. } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_response_prefers_payload() {
        let error = SearchError::from_response(Some(422), Some(json!({"message": "bad"})));
        assert_eq!(error, SearchError::Upstream(json!({"message": "bad"})));
        assert_eq!(error.message(), "bad");
    }

    #[test]
    fn test_from_response_defaults_status() {
        let error = SearchError::from_response(None, None);
        assert_eq!(
            error,
            SearchError::Transport {
                message: SearchError::DEFAULT_MESSAGE.to_string(),
                status: 500
            }
        );
    }

    #[test]
    fn test_unexpected_serializes_original_error() {
        let error = SearchError::unexpected(&LimboError::orchestration("boom"));
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["message"], "Orchestration error: boom");
        assert_eq!(json["originalError"], "Orchestration error: boom");
    }
}
