//! Route replay example: attach a session, register handlers and feed it a
//! short scripted exchange as a kernel would send it.
//!
//! Run with:
//!   cargo run -p kernelgate --example route-replay

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kernelgate::session::{ChannelRouter, KernelSession, RouteOutcome, SessionConfig};
use kernelgate::wire::{encode, Channel, MessageDraft, ProtocolMessage, Signer};

const KERNEL_ID: &str = "replay-kernel";
const SESSION_ID: &str = "replay-session";
const KEY: &str = "replay-secret";
const IDENTITY_TOKEN: &str = "kernel.b1a0e4c3-bb70-49c3-b1f1-b6d79b5f0edf.status";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let session = Arc::new(KernelSession::new(SessionConfig::new(
        KERNEL_ID, SESSION_ID, KEY,
    ))?);

    let statuses = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&statuses);
    session.tables().iopub().register(
        "status",
        move |channel: Channel, message: &ProtocolMessage| {
            seen.fetch_add(1, Ordering::Relaxed);
            eprintln!(
                "[{channel}] status execution_state={}",
                message.content().get("execution_state").unwrap_or(&serde_json::Value::Null)
            );
        },
    );
    session.tables().shell().register(
        "kernel_info_reply",
        |channel: Channel, message: &ProtocolMessage| {
            eprintln!("[{channel}] kernel_info_reply msg_id={}", message.header().msg_id);
        },
    );

    let router = ChannelRouter::new(Arc::clone(&session));
    let kernel_signer = Signer::new(KEY);

    // The first status arrives behind the kernel's routing prefix frame.
    let mut busy = encode(
        &MessageDraft::new("status").with_content(state("busy")),
        KERNEL_ID,
        SESSION_ID,
        &kernel_signer,
    )?;
    busy.insert(0, IDENTITY_TOKEN.into());

    let info = encode(&MessageDraft::new("kernel_info_reply"), KERNEL_ID, SESSION_ID, &kernel_signer)?;
    let forged = encode(&MessageDraft::new("status"), KERNEL_ID, SESSION_ID, &Signer::new("wrong"))?;
    let stream = encode(&MessageDraft::new("stream"), KERNEL_ID, SESSION_ID, &kernel_signer)?;

    let script = [
        ("iopub", busy),
        ("control", info.clone()),
        ("shell", info),
        ("iopub", forged),
        ("iopub", stream.clone()),
        ("heartbeat", stream),
    ];
    for (channel, frames) in &script {
        match router.handle_message(channel, frames) {
            RouteOutcome::Dispatched => eprintln!("{channel}: dispatched"),
            RouteOutcome::Unhandled => eprintln!("{channel}: no handler"),
            RouteOutcome::HandlerFailed => eprintln!("{channel}: handler failed"),
            RouteOutcome::Dropped(err) => eprintln!("{channel}: dropped ({err})"),
        }
    }

    // With the identity known, replies can be addressed to the kernel.
    let request = session.build_outgoing(&MessageDraft::new("kernel_info_request"))?;
    eprintln!(
        "outgoing: {} frames addressed to {}",
        request.len(),
        session.identity().unwrap_or("-")
    );

    let stats = router.stats();
    println!(
        "dispatched={} unhandled={} failed={} dropped={} statuses={}",
        stats.dispatched,
        stats.unhandled,
        stats.failed,
        stats.dropped,
        statuses.load(Ordering::Relaxed)
    );
    Ok(())
}

fn state(execution_state: &str) -> kernelgate::wire::JsonObject {
    let mut content = kernelgate::wire::JsonObject::new();
    content.insert(
        "execution_state".to_string(),
        serde_json::Value::String(execution_state.to_string()),
    );
    content
}
