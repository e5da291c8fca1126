use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Messaging protocol version stamped on every outgoing header.
pub const PROTOCOL_VERSION: &str = "5.1";

/// Header field carrying the kernel's identity token.
pub const IDENTITY_FIELD: &str = "identity";

/// Message header.
///
/// The six protocol fields are required on decode. Anything else the peer
/// sends is kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Unique message id (UUID v4 for messages built here).
    pub msg_id: String,
    /// Sender name; the kernel container id for outgoing messages.
    pub username: String,
    /// Session id the message belongs to.
    pub session: String,
    /// ISO 8601 creation timestamp.
    pub date: String,
    /// Message type, e.g. `kernel_info_request`.
    pub msg_type: String,
    /// Protocol version.
    pub version: String,
    /// Additional, non-standard header fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    /// Build a fresh header with a new `msg_id` and the current UTC time.
    pub fn new(
        msg_type: impl Into<String>,
        username: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            username: username.into(),
            session: session.into(),
            date: now_timestamp(),
            msg_type: msg_type.into(),
            version: PROTOCOL_VERSION.to_string(),
            extra: Map::new(),
        }
    }

    /// The identity token carried in the header, if any.
    pub fn identity_token(&self) -> Option<&str> {
        self.extra.get(IDENTITY_FIELD).and_then(Value::as_str)
    }
}

/// Current UTC time as ISO 8601 with microsecond precision, e.g.
/// `2024-05-16T09:12:44.081233Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_header_fills_protocol_fields() {
        let header = Header::new("kernel_info_request", "container-1", "S1");

        assert_eq!(header.msg_type, "kernel_info_request");
        assert_eq!(header.username, "container-1");
        assert_eq!(header.session, "S1");
        assert_eq!(header.version, PROTOCOL_VERSION);
        assert!(Uuid::parse_str(&header.msg_id).is_ok());
        assert!(header.extra.is_empty());
    }

    #[test]
    fn msg_ids_are_unique() {
        let a = Header::new("status", "u", "s");
        let b = Header::new("status", "u", "s");
        assert_ne!(a.msg_id, b.msg_id);
    }

    #[test]
    fn timestamp_is_utc_with_micros() {
        let date = now_timestamp();
        assert!(date.ends_with('Z'), "{date}");
        let (_, fraction) = date.split_once('.').expect("sub-second part");
        assert_eq!(fraction.len(), "123456Z".len());
        assert!(chrono::DateTime::parse_from_rfc3339(&date).is_ok());
    }

    #[test]
    fn extra_fields_survive_roundtrip() {
        let raw = r#"{"msg_id":"1","username":"u","session":"s","date":"d","msg_type":"status","version":"5.3","identity":"kernel.abc.status"}"#;
        let header: Header = serde_json::from_str(raw).unwrap();

        assert_eq!(header.identity_token(), Some("kernel.abc.status"));

        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["identity"], "kernel.abc.status");
        assert_eq!(value["version"], "5.3");
    }

    #[test]
    fn missing_required_field_fails() {
        let raw = r#"{"msg_id":"1","username":"u","session":"s","date":"d","version":"5.3"}"#;
        assert!(serde_json::from_str::<Header>(raw).is_err());
    }
}
