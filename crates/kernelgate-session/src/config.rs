use std::fmt;
use std::path::Path;

use kernelgate_wire::SIGNATURE_SCHEME;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MAX_ID_LEN: usize = 256;

/// Settings supplied when a kernel is attached.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Kernel container id; used as `username` on outgoing headers.
    pub kernel_id: String,
    /// Session id stamped on outgoing headers.
    pub session_id: String,
    /// Shared HMAC secret. Empty disables signing.
    /// Treated as credential material and redacted in debug output.
    pub key: String,
}

impl SessionConfig {
    pub fn new(
        kernel_id: impl Into<String>,
        session_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            kernel_id: kernel_id.into(),
            session_id: session_id.into(),
            key: key.into(),
        }
    }

    /// Take the key from a kernel connection file.
    pub fn from_connection_info(
        kernel_id: impl Into<String>,
        session_id: impl Into<String>,
        info: &ConnectionInfo,
    ) -> Result<Self, ConfigError> {
        info.validate()?;
        Ok(Self::new(kernel_id, session_id, info.key.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_id("kernel_id", &self.kernel_id)?;
        validate_id("session_id", &self.session_id)
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("kernel_id", &self.kernel_id)
            .field("session_id", &self.session_id)
            .field("key", &format_args!("<redacted:{} bytes>", self.key.len()))
            .finish()
    }
}

/// The JSON connection file a kernel is launched with.
///
/// Only `key` and `signature_scheme` matter to message signing; the
/// endpoint fields are carried for the transport layer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_signature_scheme")]
    pub signature_scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iopub_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hb_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
}

fn default_signature_scheme() -> String {
    SIGNATURE_SCHEME.to_string()
}

impl ConnectionInfo {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let info: Self = serde_json::from_str(json)?;
        info.validate()?;
        Ok(info)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// A keyed connection must use hmac-sha256.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.key.is_empty() && self.signature_scheme != SIGNATURE_SCHEME {
            return Err(ConfigError::UnsupportedSignatureScheme(
                self.signature_scheme.clone(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("key", &format_args!("<redacted:{} bytes>", self.key.len()))
            .field("signature_scheme", &self.signature_scheme)
            .field("transport", &self.transport)
            .field("ip", &self.ip)
            .field("shell_port", &self.shell_port)
            .field("iopub_port", &self.iopub_port)
            .field("stdin_port", &self.stdin_port)
            .field("control_port", &self.control_port)
            .field("hb_port", &self.hb_port)
            .field("kernel_name", &self.kernel_name)
            .finish()
    }
}

fn validate_id(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.len() > MAX_ID_LEN {
        return Err(ConfigError::Invalid(format!(
            "invalid {field} length: {}",
            value.len()
        )));
    }
    Ok(())
}
