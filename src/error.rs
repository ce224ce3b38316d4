// Error types
// One enum per failure domain; remote failures never escape a pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error body returned by both backends on a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("unknown composition {0:?} (expected stony, iron or cometary)")]
    UnknownComposition(String),
}

#[derive(Debug, Clone, Error)]
pub enum RemoteCallError {
    #[error("Request failed: {0}")]
    Network(String),
    #[error("{}", status_message(.status, .body))]
    Status {
        status: u16,
        body: Option<ApiErrorBody>,
    },
    #[error("Failed to parse response: {0}")]
    Malformed(String),
}

fn status_message(status: &u16, body: &Option<ApiErrorBody>) -> String {
    match body {
        Some(body) if !body.message.is_empty() => body.message.clone(),
        _ => format!("API returned status: {status}"),
    }
}

impl RemoteCallError {
    /// Human-readable message, or None when the failure carried no usable text.
    pub fn detail(&self) -> Option<String> {
        match self {
            RemoteCallError::Network(msg) | RemoteCallError::Malformed(msg)
                if msg.trim().is_empty() =>
            {
                None
            }
            _ => Some(self.to_string()),
        }
    }

    /// Backend error code, when the backend sent a structured body.
    pub fn code(&self) -> Option<&str> {
        match self {
            RemoteCallError::Status {
                body: Some(body), ..
            } if !body.code.is_empty() => Some(body.code.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteCallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteCallError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteCallError::Status {
                status: status.as_u16(),
                body: None,
            }
        } else {
            RemoteCallError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WidgetError {
    #[error("map widget failed to initialize: {0}")]
    Init(String),
    #[error("listener registration failed: {0}")]
    Listener(String),
    #[error("map widget failed to release: {0}")]
    Dispose(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Parse { key: &'static str, value: String },
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
