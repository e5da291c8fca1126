/// Errors raised while decoding a frame set into a message.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The frame set does not have 6 parts (or 7 with a routing prefix).
    #[error("malformed frame count ({got} frames, expected 6 or 7)")]
    MalformedFrameCount { got: usize },

    /// The frame where the delimiter belongs holds something else.
    #[error("missing <IDS|MSG> delimiter at frame {position}")]
    MissingDelimiter { position: usize },

    /// One of the message parts is not a valid JSON object.
    #[error("invalid {part}: {reason}")]
    InvalidJson { part: &'static str, reason: String },

    /// The identity token is not of the form `kernel.<id>.<suffix>`.
    #[error("malformed identity token '{0}'")]
    MalformedIdentityToken(String),

    /// The channel name is not one of shell, iopub, stdin or control.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

/// Errors raised while authenticating a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The HMAC digest does not match the signed parts.
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Errors that can occur in codec operations.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Frame set could not be decoded.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Message failed authentication.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Outgoing message built without a `msg_type`.
    #[error("msg_type must not be empty")]
    EmptyMessageType,
}

pub type Result<T> = std::result::Result<T, WireError>;
