use bytes::Bytes;
use kernelgate_wire::{decode, verify_strict, ProtocolMessage, Signer};
use serde::Serialize;

use crate::cmd::{read_input, VerifyArgs};
use crate::exit::{auth_error, format_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct VerifyOutput<'a> {
    valid: bool,
    signed: bool,
    msg_id: &'a str,
    msg_type: &'a str,
    username: &'a str,
    session: &'a str,
    date: &'a str,
    version: &'a str,
    identities: usize,
}

pub fn run(args: VerifyArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(args.file.as_deref())?;
    let frames = parse_frames(&input)?;
    let config = args.session.to_config()?;
    let signer = Signer::new(config.key);

    let message = decode(&frames).map_err(|err| format_error("decode failed", err))?;
    verify_strict(&message, &signer).map_err(|err| {
        tracing::warn!(msg_type = message.msg_type(), "signature mismatch");
        auth_error("verify failed", err)
    })?;

    print_summary(&message, signer.is_enabled(), format);
    Ok(SUCCESS)
}

/// Frames arrive as a JSON array of strings.
pub fn parse_frames(input: &str) -> CliResult<Vec<Bytes>> {
    let texts: Vec<String> = serde_json::from_str(input.trim()).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("input is not a JSON array of frame strings: {err}"),
        )
    })?;
    Ok(texts.into_iter().map(Bytes::from).collect())
}

fn print_summary(message: &ProtocolMessage, signed: bool, format: OutputFormat) {
    let header = message.header();
    let out = VerifyOutput {
        valid: true,
        signed,
        msg_id: &header.msg_id,
        msg_type: &header.msg_type,
        username: &header.username,
        session: &header.session,
        date: &header.date,
        version: &header.version,
        identities: message.identities().len(),
    };
    let rows = [
        ("valid", out.valid.to_string()),
        ("signed", out.signed.to_string()),
        ("msg_id", out.msg_id.to_string()),
        ("msg_type", out.msg_type.to_string()),
        ("username", out.username.to_string()),
        ("session", out.session.to_string()),
        ("date", out.date.to_string()),
        ("version", out.version.to_string()),
        ("identities", out.identities.to_string()),
    ];
    print_record(&out, &rows, format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_frames_accepts_string_arrays() {
        let frames = parse_frames("[\"<IDS|MSG>\", \"\"]\n").unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), b"<IDS|MSG>");
    }

    #[test]
    fn parse_frames_rejects_other_json() {
        assert_eq!(parse_frames("{\"frames\":[]}").unwrap_err().code, DATA_INVALID);
        assert_eq!(parse_frames("[1,2]").unwrap_err().code, DATA_INVALID);
    }
}
