use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use kernelgate_wire::{decode, verify_strict, Channel, FormatError};

use crate::dispatch::DispatchOutcome;
use crate::error::RouteError;
use crate::session::KernelSession;

/// What the router did with one inbound frame set.
#[derive(Debug)]
pub enum RouteOutcome {
    /// A handler received the message.
    Dispatched,
    /// The message was valid but no handler is registered for its type.
    Unhandled,
    /// The handler panicked; the router keeps serving.
    HandlerFailed,
    /// The message was rejected and not dispatched.
    Dropped(RouteError),
}

impl RouteOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched)
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

/// Counter snapshot for one router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub dispatched: u64,
    pub unhandled: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Routes inbound frame sets for one kernel session.
///
/// One router serves all four channels; it can be shared across the
/// per-channel readers.
#[derive(Debug)]
pub struct ChannelRouter {
    session: Arc<KernelSession>,
    dispatched: AtomicU64,
    unhandled: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelRouter {
    pub fn new(session: Arc<KernelSession>) -> Self {
        Self {
            session,
            dispatched: AtomicU64::new(0),
            unhandled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &Arc<KernelSession> {
        &self.session
    }

    /// Transport entry point: channel label plus raw frames.
    ///
    /// Never fails; rejected messages are logged and reported as
    /// [`RouteOutcome::Dropped`].
    pub fn handle_message(&self, channel: &str, frames: &[Bytes]) -> RouteOutcome {
        match channel.parse::<Channel>() {
            Ok(channel) => self.handle(channel, frames),
            Err(err) => {
                tracing::warn!(
                    channel,
                    frames = frames.len(),
                    kernel_id = self.session.kernel_id(),
                    error = %err,
                    "dropping message on unknown channel"
                );
                self.dropped.fetch_add(1, Ordering::Relaxed);
                RouteOutcome::Dropped(err.into())
            }
        }
    }

    /// Route on an already-resolved channel, logging and counting the outcome.
    pub fn handle(&self, channel: Channel, frames: &[Bytes]) -> RouteOutcome {
        match self.route(channel, frames) {
            Ok(DispatchOutcome::Handled) => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                RouteOutcome::Dispatched
            }
            Ok(DispatchOutcome::Unhandled) => {
                self.unhandled.fetch_add(1, Ordering::Relaxed);
                RouteOutcome::Unhandled
            }
            Ok(DispatchOutcome::HandlerFailed) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                RouteOutcome::HandlerFailed
            }
            Err(err) => {
                tracing::warn!(
                    channel = %channel,
                    frames = frames.len(),
                    kernel_id = self.session.kernel_id(),
                    error = %err,
                    "dropping message"
                );
                self.dropped.fetch_add(1, Ordering::Relaxed);
                RouteOutcome::Dropped(err)
            }
        }
    }

    /// Decode, authenticate, bootstrap identity, then dispatch.
    ///
    /// A message that fails authentication never touches session state.
    pub fn route(&self, channel: Channel, frames: &[Bytes]) -> Result<DispatchOutcome, RouteError> {
        if self.session.is_closed() {
            return Err(RouteError::SessionClosed(
                self.session.kernel_id().to_string(),
            ));
        }

        let message = decode(frames)?;
        verify_strict(&message, self.session.signer())?;

        if let Err(err) = self.session.bootstrap_if_absent(&message) {
            log_bad_token(channel, message.msg_type(), &err);
        }

        Ok(self
            .session
            .tables()
            .for_channel(channel)
            .dispatch(channel, &message))
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

fn log_bad_token(channel: Channel, msg_type: &str, err: &FormatError) {
    tracing::warn!(
        channel = %channel,
        msg_type,
        error = %err,
        "ignoring malformed identity token"
    );
}
