use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use kernelgate_wire::{Channel, ProtocolMessage};

/// Business logic for one message type.
///
/// Handlers receive messages that are already authenticated and whose
/// kernel identity has been resolved.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, channel: Channel, message: &ProtocolMessage);
}

impl<F> MessageHandler for F
where
    F: Fn(Channel, &ProtocolMessage) + Send + Sync,
{
    fn handle(&self, channel: Channel, message: &ProtocolMessage) {
        self(channel, message)
    }
}

/// What a table did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler was registered and invoked.
    Handled,
    /// No handler is registered for the message type.
    Unhandled,
    /// The handler panicked. The table stays usable.
    HandlerFailed,
}

/// Registry of message-type handlers for one logical channel.
pub struct DispatchTable {
    name: &'static str,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl DispatchTable {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Table name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a handler. Returns true when it replaced an earlier one.
    pub fn register(
        &self,
        msg_type: impl Into<String>,
        handler: impl MessageHandler + 'static,
    ) -> bool {
        self.register_shared(msg_type, Arc::new(handler))
    }

    /// Register a handler shared with other tables or types.
    pub fn register_shared(
        &self,
        msg_type: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(msg_type.into(), handler)
            .is_some()
    }

    /// Remove a handler. Returns true when one was registered.
    pub fn unregister(&self, msg_type: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(msg_type)
            .is_some()
    }

    pub fn is_registered(&self, msg_type: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(msg_type)
    }

    /// Registered message types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort_unstable();
        types
    }

    /// Hand the message to the handler for its `msg_type`.
    ///
    /// An unregistered type is a no-op with a diagnostic. A panicking
    /// handler is contained here and reported as
    /// [`DispatchOutcome::HandlerFailed`].
    pub fn dispatch(&self, channel: Channel, message: &ProtocolMessage) -> DispatchOutcome {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message.msg_type())
            .cloned();

        match handler {
            Some(handler) => {
                match catch_unwind(AssertUnwindSafe(|| handler.handle(channel, message))) {
                    Ok(()) => DispatchOutcome::Handled,
                    Err(payload) => {
                        tracing::error!(
                            table = self.name,
                            channel = %channel,
                            msg_type = message.msg_type(),
                            panic = panic_message(payload.as_ref()),
                            "message handler panicked"
                        );
                        DispatchOutcome::HandlerFailed
                    }
                }
            }
            None => {
                tracing::debug!(
                    table = self.name,
                    channel = %channel,
                    msg_type = message.msg_type(),
                    "no handler registered; message ignored"
                );
                DispatchOutcome::Unhandled
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("name", &self.name)
            .field("types", &self.registered_types())
            .finish()
    }
}

/// The dispatch tables of one kernel session.
///
/// Shell and control share a single table instance.
#[derive(Debug, Clone)]
pub struct ChannelTables {
    shell: Arc<DispatchTable>,
    iopub: Arc<DispatchTable>,
    stdin: Arc<DispatchTable>,
}

impl ChannelTables {
    pub fn new() -> Self {
        Self {
            shell: Arc::new(DispatchTable::new("shell")),
            iopub: Arc::new(DispatchTable::new("iopub")),
            stdin: Arc::new(DispatchTable::new("stdin")),
        }
    }

    pub fn shell(&self) -> &Arc<DispatchTable> {
        &self.shell
    }

    pub fn iopub(&self) -> &Arc<DispatchTable> {
        &self.iopub
    }

    pub fn stdin(&self) -> &Arc<DispatchTable> {
        &self.stdin
    }

    /// Same instance as [`ChannelTables::shell`].
    pub fn control(&self) -> &Arc<DispatchTable> {
        &self.shell
    }

    /// Table that serves `channel`.
    pub fn for_channel(&self, channel: Channel) -> &Arc<DispatchTable> {
        match channel {
            Channel::Shell | Channel::Control => &self.shell,
            Channel::IoPub => &self.iopub,
            Channel::Stdin => &self.stdin,
        }
    }
}

impl Default for ChannelTables {
    fn default() -> Self {
        Self::new()
    }
}
