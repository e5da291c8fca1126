use std::fmt;
use std::io;

use kernelgate_session::{ConfigError, SessionError};
use kernelgate_wire::{AuthError, FormatError, WireError};

// Exit codes follow the DDR-0002 table shared with our other CLIs.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn format_error(context: &str, err: FormatError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

/// A bad signature is an authentication failure, not bad data.
pub fn auth_error(context: &str, err: AuthError) -> CliError {
    CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::Format(err) => format_error(context, err),
        WireError::Auth(err) => auth_error(context, err),
        WireError::EmptyMessageType => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::Io { source, .. } => io_error(context, source),
        ConfigError::Json(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Wire(err) => wire_error(context, err),
        SessionError::Config(err) => config_error(context, err),
        SessionError::MissingIdentity { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::SessionClosed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_mismatch_maps_to_permission_denied() {
        let err = wire_error("verify failed", WireError::Auth(AuthError::SignatureMismatch));
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn format_errors_map_to_data_invalid() {
        let err = wire_error(
            "decode failed",
            WireError::Format(FormatError::MalformedFrameCount { got: 3 }),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode failed: "));
    }

    #[test]
    fn missing_connection_file_is_a_usage_error() {
        let err = config_error(
            "load failed",
            ConfigError::Io {
                path: "/nope.json".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, USAGE);
    }
}
