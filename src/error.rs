//! Error types for document loading, request synthesis and navigation.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Errors while loading and expanding an API description.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    // Document errors (exit code 2)
    #[error("unsupported reference \"{reference}\": only local references (#/...) are resolved")]
    UnsupportedReference { reference: String },

    #[error("reference \"{reference}\" does not point to anything in the document")]
    UnresolvedReference { reference: String },

    #[error("cyclic reference \"{reference}\" (chain: {})", chain.join(" -> "))]
    CyclicReference {
        reference: String,
        chain: Vec<String>,
    },

    #[error("invalid document: {message}")]
    InvalidDocument { message: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors that block building a request before anything is sent.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("required parameters are missing: {}", names.join(", "))]
    MissingRequiredParameters { names: Vec<String> },

    #[error("unsupported media type \"{media_type}\": only application/json bodies are sent")]
    UnsupportedMediaType { media_type: String },
}

impl RequestError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
///
/// Carries the status, headers and body of an error response when the server
/// answered at all. Network failures only have a message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportError {
    /// Error for a request that never produced a response.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Error for a response with a non-success status.
    pub fn status(status: u16, headers: Vec<(String, String)>, body: Option<Value>) -> Self {
        Self {
            status: Some(status),
            message: format!("server answered with status {}", status),
            headers,
            body,
        }
    }
}

/// Errors while calling operations and navigating resources.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("the API description has no usable server URL")]
    NoServerUrl,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("could not find data {key}")]
    NotFoundData { key: String },

    #[error("more than one link can provide {key}: {}", candidates.join(", "))]
    AmbiguousMatch { key: String, candidates: Vec<String> },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::Transport(_) => 3,
            ClientError::NoServerUrl => 2,
            ClientError::Request(e) => e.exit_code(),
            _ => 1,
        }
    }
}
