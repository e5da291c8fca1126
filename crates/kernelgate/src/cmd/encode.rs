use kernelgate_session::KernelSession;
use kernelgate_wire::MessageDraft;

use crate::cmd::{parse_object, EncodeArgs};
use crate::exit::{format_error, session_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let draft = MessageDraft::new(args.msg_type.as_str())
        .with_parent_header(parse_object("parent-header", args.parent_header.as_deref())?)
        .with_metadata(parse_object("metadata", args.metadata.as_deref())?)
        .with_content(parse_object("content", args.content.as_deref())?);

    let config = args.session.to_config()?;
    let session =
        KernelSession::new(config).map_err(|err| session_error("invalid session", err))?;

    let frames = match &args.identity_token {
        Some(token) => {
            session
                .bootstrap_identity(token)
                .map_err(|err| format_error("invalid --identity-token", err))?;
            session.build_outgoing(&draft)
        }
        None => session.encode(&draft),
    }
    .map_err(|err| session_error("encode failed", err))?;

    tracing::debug!(
        msg_type = %args.msg_type,
        frames = frames.len(),
        signed = session.signer().is_enabled(),
        "message encoded"
    );
    print_frames(&frames, format);
    Ok(SUCCESS)
}
