//! Jupyter wire-protocol codec with HMAC-SHA256 message signing.
//!
//! Every message travels as a multipart frame set:
//! - optional routing identity frames
//! - the literal `<IDS|MSG>` delimiter
//! - a hex HMAC-SHA256 signature over the four JSON parts
//! - header, parent_header, metadata and content, each a JSON object
//!
//! Decoding and verification return values; nothing here panics on bad input.

pub mod channel;
pub mod codec;
pub mod error;
pub mod header;
pub mod identity;
pub mod message;
pub mod signing;

pub use channel::Channel;
pub use codec::{decode, encode, encode_message, verify, verify_strict, BODY_FRAMES};
pub use error::{AuthError, FormatError, Result, WireError};
pub use header::{now_timestamp, Header, IDENTITY_FIELD, PROTOCOL_VERSION};
pub use identity::parse_identity_token;
pub use message::{JsonObject, MessageDraft, ProtocolMessage, SignedParts, DELIMITER};
pub use signing::{Signer, SIGNATURE_SCHEME};
