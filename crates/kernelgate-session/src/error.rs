use std::path::PathBuf;

use kernelgate_wire::{AuthError, FormatError, WireError};

/// Errors loading or validating session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The connection file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The connection file is not valid JSON.
    #[error("invalid connection file: {0}")]
    Json(#[from] serde_json::Error),

    /// The connection file asks for a scheme other than hmac-sha256.
    #[error("unsupported signature scheme '{0}'")]
    UnsupportedSignatureScheme(String),

    /// A required setting is missing or empty.
    #[error("invalid session config: {0}")]
    Invalid(String),
}

/// Errors surfaced to callers of session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Codec error while building a message.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The kernel has not announced its routing identity yet.
    #[error("routing identity for kernel {kernel_id} is not known yet")]
    MissingIdentity { kernel_id: String },

    /// The session was torn down.
    #[error("session for kernel {0} is closed")]
    SessionClosed(String),
}

/// Reasons an inbound frame set was dropped instead of dispatched.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Frame set or channel label is malformed.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Signature check failed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// The session was torn down.
    #[error("session for kernel {0} is closed")]
    SessionClosed(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
