use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use bytes::Bytes;
use kernelgate_wire::identity::TOKEN_PREFIX;
use kernelgate_wire::{
    encode, encode_message, parse_identity_token, FormatError, MessageDraft, ProtocolMessage,
    Signer,
};

use crate::config::SessionConfig;
use crate::dispatch::ChannelTables;
use crate::error::{Result, SessionError};

/// Result of an identity bootstrap attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// This call stored the identity.
    Set(String),
    /// An identity was already stored; it is returned unchanged.
    AlreadySet(String),
    /// The message carried no identity token.
    NoToken,
}

impl Bootstrap {
    /// The stored identity, if any.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Set(id) | Self::AlreadySet(id) => Some(id),
            Self::NoToken => None,
        }
    }
}

/// One attached kernel: its signing key, session id, routing identity and
/// dispatch tables.
///
/// The routing identity is single-assignment. Concurrent first messages on
/// different channels race to set it; exactly one value wins and every later
/// read observes it.
pub struct KernelSession {
    kernel_id: String,
    session_id: String,
    signer: Signer,
    identity: OnceLock<String>,
    closed: AtomicBool,
    tables: ChannelTables,
}

impl KernelSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let SessionConfig {
            kernel_id,
            session_id,
            key,
        } = config;

        tracing::debug!(
            kernel_id = %kernel_id,
            session = %session_id,
            signed = !key.is_empty(),
            "kernel session created"
        );

        Ok(Self {
            kernel_id,
            session_id,
            signer: Signer::new(key),
            identity: OnceLock::new(),
            closed: AtomicBool::new(false),
            tables: ChannelTables::new(),
        })
    }

    pub fn kernel_id(&self) -> &str {
        &self.kernel_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn tables(&self) -> &ChannelTables {
        &self.tables
    }

    /// Routing identity, once bootstrapped.
    pub fn identity(&self) -> Option<&str> {
        self.identity.get().map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop further dispatch. Returns false if the session was already closed.
    ///
    /// Handlers already running are not interrupted.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            tracing::debug!(kernel_id = %self.kernel_id, "kernel session closed");
        }
        first
    }

    /// Store the identity carried by `token` unless one is already set.
    ///
    /// Once set, later tokens are not parsed at all.
    pub fn bootstrap_identity(&self, token: &str) -> std::result::Result<Bootstrap, FormatError> {
        if let Some(existing) = self.identity.get() {
            return Ok(Bootstrap::AlreadySet(existing.clone()));
        }

        let id = parse_identity_token(token)?;
        let mut stored_here = false;
        let winner = self.identity.get_or_init(|| {
            stored_here = true;
            id.to_string()
        });

        if stored_here {
            tracing::debug!(kernel_id = %self.kernel_id, identity = %winner, "routing identity set");
            Ok(Bootstrap::Set(winner.clone()))
        } else {
            Ok(Bootstrap::AlreadySet(winner.clone()))
        }
    }

    /// Bootstrap from an authenticated message.
    ///
    /// The header `identity` field is preferred. Otherwise a routing prefix
    /// frame of the form `kernel.<id>.<topic>` is used.
    pub fn bootstrap_if_absent(
        &self,
        message: &ProtocolMessage,
    ) -> std::result::Result<Bootstrap, FormatError> {
        if let Some(existing) = self.identity.get() {
            return Ok(Bootstrap::AlreadySet(existing.clone()));
        }

        match identity_token(message) {
            Some(token) => self.bootstrap_identity(token),
            None => Ok(Bootstrap::NoToken),
        }
    }

    /// Sign an outgoing message for this session.
    ///
    /// Returns `[delimiter, signature, header, parent_header, metadata, content]`.
    pub fn encode(&self, draft: &MessageDraft) -> Result<Vec<Bytes>> {
        self.ensure_open()?;
        Ok(encode(draft, &self.kernel_id, &self.session_id, &self.signer)?)
    }

    /// Sign an outgoing message and keep it in structured form.
    pub fn encode_message(&self, draft: &MessageDraft) -> Result<ProtocolMessage> {
        self.ensure_open()?;
        Ok(encode_message(
            draft,
            &self.kernel_id,
            &self.session_id,
            &self.signer,
        )?)
    }

    /// Frames addressed to this kernel: the routing identity followed by the
    /// signed message.
    ///
    /// Fails with [`SessionError::MissingIdentity`] until the kernel has
    /// announced itself.
    pub fn build_outgoing(&self, draft: &MessageDraft) -> Result<Vec<Bytes>> {
        self.ensure_open()?;
        let identity = self
            .identity
            .get()
            .ok_or_else(|| SessionError::MissingIdentity {
                kernel_id: self.kernel_id.clone(),
            })?;

        let body = encode(draft, &self.kernel_id, &self.session_id, &self.signer)?;
        let mut frames = Vec::with_capacity(body.len() + 1);
        frames.push(Bytes::copy_from_slice(identity.as_bytes()));
        frames.extend(body);
        Ok(frames)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed(self.kernel_id.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for KernelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSession")
            .field("kernel_id", &self.kernel_id)
            .field("session_id", &self.session_id)
            .field("signer", &self.signer)
            .field("identity", &self.identity.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn identity_token(message: &ProtocolMessage) -> Option<&str> {
    if let Some(token) = message.header().identity_token() {
        return Some(token);
    }

    let frame = message.identities().first()?;
    let token = std::str::from_utf8(frame).ok()?;
    token
        .strip_prefix(TOKEN_PREFIX)
        .filter(|rest| rest.starts_with('.'))
        .map(|_| token)
}
