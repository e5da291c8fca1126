use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use kernelgate_session::{ConnectionInfo, SessionConfig};
use kernelgate_wire::JsonObject;

use crate::exit::{config_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod route;
pub mod verify;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and sign an outgoing message.
    Encode(EncodeArgs),
    /// Decode a frame set and check its signature.
    Verify(VerifyArgs),
    /// Replay recorded frame sets through a session router.
    Route(RouteArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Verify(args) => verify::run(args, format),
        Command::Route(args) => route::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Signing key and header identity shared by every message command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Shared HMAC key. Empty disables signing.
    #[arg(long, env = "KERNELGATE_KEY", default_value = "", hide_env_values = true)]
    pub key: String,
    /// Kernel connection file; its key takes precedence over --key.
    #[arg(long, value_name = "PATH")]
    pub connection_file: Option<PathBuf>,
    /// Session id stamped on outgoing headers.
    #[arg(long, env = "KERNELGATE_SESSION", default_value = "kernelgate")]
    pub session: String,
    /// Kernel container id, used as header username.
    #[arg(long, env = "KERNELGATE_KERNEL_ID", default_value = "kernelgate")]
    pub kernel_id: String,
}

impl SessionArgs {
    pub fn to_config(&self) -> CliResult<SessionConfig> {
        let config = match &self.connection_file {
            Some(path) => {
                let info = ConnectionInfo::from_path(path)
                    .map_err(|err| config_error("failed to load connection file", err))?;
                SessionConfig::from_connection_info(&self.kernel_id, &self.session, &info)
                    .map_err(|err| config_error("invalid connection file", err))?
            }
            None => SessionConfig::new(&self.kernel_id, &self.session, &self.key),
        };
        config
            .validate()
            .map_err(|err| config_error("invalid session settings", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Message type, e.g. kernel_info_request.
    #[arg(long, short = 't')]
    pub msg_type: String,
    /// Content as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub content: Option<String>,
    /// Parent header as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub parent_header: Option<String>,
    /// Metadata as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub metadata: Option<String>,
    /// Kernel identity token (kernel.<id>.<suffix>); prefixes the routing frame.
    #[arg(long, value_name = "TOKEN")]
    pub identity_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// JSON array of frame strings. Default: stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// JSON Lines of {"channel": ..., "frames": [...]}. Default: stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Message types to handle on every channel (comma-separated).
    #[arg(long = "handle", value_name = "MSG_TYPE", value_delimiter = ',')]
    pub handle: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Read a file, or stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(input)
        }
    }
}

pub fn parse_object(flag: &str, value: Option<&str>) -> CliResult<JsonObject> {
    match value {
        None => Ok(JsonObject::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|err| CliError::new(USAGE, format!("--{flag} is not a JSON object: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_defaults_to_empty() {
        assert!(parse_object("content", None).unwrap().is_empty());
    }

    #[test]
    fn parse_object_rejects_non_objects() {
        let err = parse_object("content", Some("[1,2]")).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("--content"));
    }

    #[test]
    fn session_args_without_file_use_key() {
        let args = SessionArgs {
            key: "abc123".to_string(),
            connection_file: None,
            session: "S1".to_string(),
            kernel_id: "k1".to_string(),
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.key, "abc123");
        assert_eq!(config.session_id, "S1");
    }

    #[test]
    fn session_args_reject_empty_session() {
        let args = SessionArgs {
            key: String::new(),
            connection_file: None,
            session: String::new(),
            kernel_id: "k1".to_string(),
        };
        assert_eq!(args.to_config().unwrap_err().code, USAGE);
    }
}
