use std::sync::Arc;

use bytes::Bytes;
use kernelgate_session::{ChannelRouter, KernelSession, RouteOutcome};
use kernelgate_wire::{decode, Channel, ProtocolMessage};
use serde::{Deserialize, Serialize};

use crate::cmd::{read_input, RouteArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

/// One recorded delivery: the channel label and the raw frames.
#[derive(Deserialize)]
struct Recorded {
    channel: String,
    frames: Vec<String>,
}

#[derive(Serialize)]
struct RouteRow {
    line: usize,
    channel: String,
    msg_type: Option<String>,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
struct RouteSummary {
    kernel_id: String,
    identity: Option<String>,
    dispatched: u64,
    unhandled: u64,
    failed: u64,
    dropped: u64,
    skipped: u64,
    messages: Vec<RouteRow>,
}

pub fn run(args: RouteArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(args.file.as_deref())?;
    let config = args.session.to_config()?;
    let session =
        Arc::new(KernelSession::new(config).map_err(|err| session_error("invalid session", err))?);
    register_handlers(&session, &args.handle);

    let router = ChannelRouter::new(Arc::clone(&session));
    let mut rows = Vec::new();
    let mut skipped = 0;

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let recorded: Recorded = match serde_json::from_str(line) {
            Ok(recorded) => recorded,
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "skipping unreadable line");
                skipped += 1;
                rows.push(RouteRow {
                    line: line_no,
                    channel: String::new(),
                    msg_type: None,
                    outcome: "skipped",
                    reason: Some(err.to_string()),
                });
                continue;
            }
        };

        let frames: Vec<Bytes> = recorded.frames.into_iter().map(Bytes::from).collect();
        let msg_type = decode(&frames).ok().map(|m| m.msg_type().to_string());
        let (outcome, reason) = match router.handle_message(&recorded.channel, &frames) {
            RouteOutcome::Dispatched => ("dispatched", None),
            RouteOutcome::Unhandled => ("unhandled", None),
            RouteOutcome::HandlerFailed => ("failed", None),
            RouteOutcome::Dropped(err) => ("dropped", Some(err.to_string())),
        };
        rows.push(RouteRow {
            line: line_no,
            channel: recorded.channel,
            msg_type,
            outcome,
            reason,
        });
    }

    let stats = router.stats();
    let summary = RouteSummary {
        kernel_id: session.kernel_id().to_string(),
        identity: session.identity().map(str::to_string),
        dispatched: stats.dispatched,
        unhandled: stats.unhandled,
        failed: stats.failed,
        dropped: stats.dropped,
        skipped,
        messages: rows,
    };
    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn register_handlers(session: &KernelSession, msg_types: &[String]) {
    let tables = session.tables();
    for msg_type in msg_types {
        for table in [tables.shell(), tables.iopub(), tables.stdin()] {
            table.register(msg_type.as_str(), |channel: Channel, message: &ProtocolMessage| {
                tracing::info!(
                    channel = %channel,
                    msg_type = message.msg_type(),
                    msg_id = %message.header().msg_id,
                    "message handled"
                );
            });
        }
    }
}

fn print_summary(summary: &RouteSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            let mut table = new_table(vec!["LINE", "CHANNEL", "MSG_TYPE", "OUTCOME", "REASON"]);
            for row in &summary.messages {
                table.add_row(vec![
                    row.line.to_string(),
                    row.channel.clone(),
                    row.msg_type.clone().unwrap_or_default(),
                    row.outcome.to_string(),
                    row.reason.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
            println!(
                "dispatched={} unhandled={} failed={} dropped={} skipped={} identity={}",
                summary.dispatched,
                summary.unhandled,
                summary.failed,
                summary.dropped,
                summary.skipped,
                summary.identity.as_deref().unwrap_or("-")
            );
        }
        OutputFormat::Pretty => {
            for row in &summary.messages {
                println!(
                    "line={} channel={} msg_type={} outcome={}{}",
                    row.line,
                    row.channel,
                    row.msg_type.as_deref().unwrap_or("-"),
                    row.outcome,
                    row.reason
                        .as_deref()
                        .map(|r| format!(" reason=\"{r}\""))
                        .unwrap_or_default()
                );
            }
            println!(
                "dispatched={} unhandled={} failed={} dropped={} skipped={} identity={}",
                summary.dispatched,
                summary.unhandled,
                summary.failed,
                summary.dropped,
                summary.skipped,
                summary.identity.as_deref().unwrap_or("-")
            );
        }
    }
}
