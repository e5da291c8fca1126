use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::header::Header;

/// Frame separating routing identities from the message body.
pub const DELIMITER: &str = "<IDS|MSG>";

/// JSON object type used for parent_header, metadata and content.
pub type JsonObject = Map<String, Value>;

/// The four signed parts exactly as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParts {
    pub header: Bytes,
    pub parent_header: Bytes,
    pub metadata: Bytes,
    pub content: Bytes,
}

impl SignedParts {
    /// Parts in signing order.
    pub fn as_slices(&self) -> [&[u8]; 4] {
        [
            self.header.as_ref(),
            self.parent_header.as_ref(),
            self.metadata.as_ref(),
            self.content.as_ref(),
        ]
    }
}

/// A decoded (or freshly built) protocol message.
///
/// The parsed parts and their wire bytes are kept together. Setters
/// re-serialize the part they touch, so a message changed after signing no
/// longer verifies.
#[derive(Debug, Clone)]
pub struct ProtocolMessage {
    identities: Vec<Bytes>,
    signature: String,
    header: Header,
    parent_header: JsonObject,
    metadata: JsonObject,
    content: JsonObject,
    parts: SignedParts,
}

impl ProtocolMessage {
    pub(crate) fn from_wire(
        identities: Vec<Bytes>,
        signature: String,
        header: Header,
        parent_header: JsonObject,
        metadata: JsonObject,
        content: JsonObject,
        parts: SignedParts,
    ) -> Self {
        Self {
            identities,
            signature,
            header,
            parent_header,
            metadata,
            content,
            parts,
        }
    }

    /// Routing identity frames that preceded the delimiter.
    pub fn identities(&self) -> &[Bytes] {
        &self.identities
    }

    /// Hex signature as received (or as computed for outgoing messages).
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The literal delimiter frame.
    pub fn delimiter(&self) -> &'static str {
        DELIMITER
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    pub fn parent_header(&self) -> &JsonObject {
        &self.parent_header
    }

    pub fn metadata(&self) -> &JsonObject {
        &self.metadata
    }

    pub fn content(&self) -> &JsonObject {
        &self.content
    }

    /// Wire bytes the signature covers.
    pub fn signed_parts(&self) -> &SignedParts {
        &self.parts
    }

    /// Replace the parent header.
    pub fn set_parent_header(&mut self, parent_header: JsonObject) -> Result<()> {
        self.parts.parent_header = Bytes::from(serde_json::to_vec(&parent_header)?);
        self.parent_header = parent_header;
        Ok(())
    }

    /// Replace the metadata.
    pub fn set_metadata(&mut self, metadata: JsonObject) -> Result<()> {
        self.parts.metadata = Bytes::from(serde_json::to_vec(&metadata)?);
        self.metadata = metadata;
        Ok(())
    }

    /// Replace the content.
    pub fn set_content(&mut self, content: JsonObject) -> Result<()> {
        self.parts.content = Bytes::from(serde_json::to_vec(&content)?);
        self.content = content;
        Ok(())
    }

    /// Frames in wire order: identities, delimiter, signature, then the
    /// four signed parts.
    pub fn to_frames(&self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(self.identities.len() + 6);
        frames.extend(self.identities.iter().cloned());
        frames.push(Bytes::from_static(DELIMITER.as_bytes()));
        frames.push(Bytes::from(self.signature.clone()));
        frames.push(self.parts.header.clone());
        frames.push(self.parts.parent_header.clone());
        frames.push(self.parts.metadata.clone());
        frames.push(self.parts.content.clone());
        frames
    }
}

/// Caller-supplied body of an outgoing message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    pub msg_type: String,
    pub parent_header: JsonObject,
    pub metadata: JsonObject,
    pub content: JsonObject,
}

impl MessageDraft {
    /// Draft with empty parent_header, metadata and content.
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            ..Self::default()
        }
    }

    pub fn with_parent_header(mut self, parent_header: JsonObject) -> Self {
        self.parent_header = parent_header;
        self
    }

    pub fn with_metadata(mut self, metadata: JsonObject) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_content(mut self, content: JsonObject) -> Self {
        self.content = content;
        self
    }
}
