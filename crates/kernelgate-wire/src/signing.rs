use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;
use crate::message::SignedParts;

type HmacSha256 = Hmac<Sha256>;

/// Signature scheme name used in kernel connection files.
pub const SIGNATURE_SCHEME: &str = "hmac-sha256";

/// HMAC-SHA256 signer keyed with a kernel's shared secret.
///
/// An empty key disables signing: outgoing signatures are empty and every
/// message verifies.
#[derive(Clone, Default)]
pub struct Signer {
    key: Vec<u8>,
}

impl Signer {
    /// Create a signer from the shared secret.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// A signer with signing disabled.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// True when a non-empty key is configured.
    pub fn is_enabled(&self) -> bool {
        !self.key.is_empty()
    }

    /// Lowercase hex HMAC over header, parent_header, metadata and content,
    /// in that order. Empty when signing is disabled.
    pub fn sign(&self, parts: &SignedParts) -> String {
        match self.keyed_mac(parts) {
            Ok(Some(mac)) => hex::encode(mac.finalize().into_bytes()),
            Ok(None) => String::new(),
            Err(_) => {
                // Left empty so the peer rejects it.
                tracing::error!(key_len = self.key.len(), "hmac key rejected; message left unsigned");
                String::new()
            }
        }
    }

    /// Check `signature` against the parts in constant time.
    pub fn verify(&self, parts: &SignedParts, signature: &str) -> Result<(), AuthError> {
        let Some(mac) = self.keyed_mac(parts)? else {
            return Ok(());
        };
        let expected = hex::decode(signature).map_err(|_| AuthError::SignatureMismatch)?;
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::SignatureMismatch)
    }

    /// `Ok(None)` only when signing is disabled. A key the MAC refuses is
    /// a mismatch, never a pass.
    fn keyed_mac(&self, parts: &SignedParts) -> Result<Option<HmacSha256>, AuthError> {
        if self.key.is_empty() {
            return Ok(None);
        }
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| AuthError::SignatureMismatch)?;
        for part in parts.as_slices() {
            mac.update(part);
        }
        Ok(Some(mac))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("key", &format_args!("<redacted:{} bytes>", self.key.len()))
            .finish()
    }
}
