use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{AuthError, FormatError, Result, WireError};
use crate::header::Header;
use crate::message::{JsonObject, MessageDraft, ProtocolMessage, SignedParts, DELIMITER};
use crate::signing::Signer;

/// Frames from the delimiter to the content, inclusive.
pub const BODY_FRAMES: usize = 6;

/// Routing identity frames accepted ahead of the delimiter.
pub const MAX_ROUTING_PREFIX: usize = 1;

/// Decode a frame set into a message.
///
/// Wire layout:
/// ```text
/// [identity]? <IDS|MSG> signature header parent_header metadata content
/// ```
/// The four JSON parts must each be an object. Decoding never checks the
/// signature; see [`verify`].
pub fn decode(frames: &[Bytes]) -> std::result::Result<ProtocolMessage, FormatError> {
    if frames.len() < BODY_FRAMES || frames.len() > BODY_FRAMES + MAX_ROUTING_PREFIX {
        return Err(FormatError::MalformedFrameCount { got: frames.len() });
    }

    let prefix = frames.len() - BODY_FRAMES;
    let (identities, body) = frames.split_at(prefix);
    if body[0].as_ref() != DELIMITER.as_bytes() {
        return Err(FormatError::MissingDelimiter { position: prefix });
    }

    let signature = std::str::from_utf8(&body[1])
        .map_err(|err| FormatError::InvalidJson {
            part: "signature",
            reason: err.to_string(),
        })?
        .to_string();

    let header: Header = parse_part("header", &body[2])?;
    if header.msg_type.is_empty() {
        return Err(FormatError::InvalidJson {
            part: "header",
            reason: "msg_type is empty".to_string(),
        });
    }
    let parent_header: JsonObject = parse_part("parent_header", &body[3])?;
    let metadata: JsonObject = parse_part("metadata", &body[4])?;
    let content: JsonObject = parse_part("content", &body[5])?;

    let parts = SignedParts {
        header: body[2].clone(),
        parent_header: body[3].clone(),
        metadata: body[4].clone(),
        content: body[5].clone(),
    };

    Ok(ProtocolMessage::from_wire(
        identities.to_vec(),
        signature,
        header,
        parent_header,
        metadata,
        content,
        parts,
    ))
}

/// True when the message signature matches its signed parts.
pub fn verify(message: &ProtocolMessage, signer: &Signer) -> bool {
    verify_strict(message, signer).is_ok()
}

/// Like [`verify`], returning the failure reason.
pub fn verify_strict(
    message: &ProtocolMessage,
    signer: &Signer,
) -> std::result::Result<(), AuthError> {
    signer.verify(message.signed_parts(), message.signature())
}

/// Build and sign an outgoing message.
///
/// `username` is the kernel container id and `session` the session id.
pub fn encode_message(
    draft: &MessageDraft,
    username: &str,
    session: &str,
    signer: &Signer,
) -> Result<ProtocolMessage> {
    if draft.msg_type.is_empty() {
        return Err(WireError::EmptyMessageType);
    }

    let header = Header::new(draft.msg_type.clone(), username, session);
    let parts = SignedParts {
        header: Bytes::from(serde_json::to_vec(&header)?),
        parent_header: Bytes::from(serde_json::to_vec(&draft.parent_header)?),
        metadata: Bytes::from(serde_json::to_vec(&draft.metadata)?),
        content: Bytes::from(serde_json::to_vec(&draft.content)?),
    };
    let signature = signer.sign(&parts);
    tracing::trace!(
        msg_type = %header.msg_type,
        msg_id = %header.msg_id,
        signed = !signature.is_empty(),
        "message encoded"
    );

    Ok(ProtocolMessage::from_wire(
        Vec::new(),
        signature,
        header,
        draft.parent_header.clone(),
        draft.metadata.clone(),
        draft.content.clone(),
        parts,
    ))
}

/// Build, sign and serialize an outgoing message.
///
/// Returns `[delimiter, signature, header, parent_header, metadata, content]`.
pub fn encode(
    draft: &MessageDraft,
    username: &str,
    session: &str,
    signer: &Signer,
) -> Result<Vec<Bytes>> {
    Ok(encode_message(draft, username, session, signer)?.to_frames())
}

fn parse_part<T: DeserializeOwned>(
    part: &'static str,
    raw: &[u8],
) -> std::result::Result<T, FormatError> {
    serde_json::from_slice(raw).map_err(|err| FormatError::InvalidJson {
        part,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn signed_frames(signer: &Signer) -> Vec<Bytes> {
        let draft = MessageDraft::new("execute_request")
            .with_content(object(json!({"code": "print(1)", "silent": false})))
            .with_metadata(object(json!({"trace": "abc"})));
        encode(&draft, "container-7", "S1", signer).unwrap()
    }

    #[test]
    fn encode_produces_six_frames_in_wire_order() {
        let frames = signed_frames(&Signer::new("abc123"));

        assert_eq!(frames.len(), BODY_FRAMES);
        assert_eq!(frames[0].as_ref(), DELIMITER.as_bytes());
        assert_eq!(frames[1].len(), 64);

        let header: serde_json::Value = serde_json::from_slice(&frames[2]).unwrap();
        assert_eq!(header["msg_type"], "execute_request");
        assert_eq!(header["username"], "container-7");
        assert_eq!(header["session"], "S1");
        assert_eq!(header["version"], crate::header::PROTOCOL_VERSION);
        assert_eq!(frames[3].as_ref(), b"{}");
    }

    #[test]
    fn encode_is_compact_json() {
        let frames = signed_frames(&Signer::new("abc123"));
        for frame in &frames[2..] {
            let text = std::str::from_utf8(frame).unwrap();
            assert!(!text.contains(": "), "{text}");
            assert!(!text.contains(", "), "{text}");
        }
    }

    #[test]
    fn decode_roundtrips_encoded_message() {
        let signer = Signer::new("abc123");
        let built = encode_message(
            &MessageDraft::new("comm_msg").with_content(object(json!({"data": [1, 2, 3]}))),
            "container-7",
            "S1",
            &signer,
        )
        .unwrap();

        let decoded = decode(&built.to_frames()).unwrap();

        assert_eq!(decoded.header(), built.header());
        assert_eq!(decoded.parent_header(), built.parent_header());
        assert_eq!(decoded.metadata(), built.metadata());
        assert_eq!(decoded.content(), built.content());
        assert_eq!(decoded.signature(), built.signature());
        assert!(decoded.identities().is_empty());
        assert!(verify(&decoded, &signer));
    }

    #[test]
    fn decode_accepts_one_routing_prefix() {
        let mut frames = vec![Bytes::from_static(b"kernel.abc.status")];
        frames.extend(signed_frames(&Signer::new("abc123")));

        let message = decode(&frames).unwrap();
        assert_eq!(message.identities().len(), 1);
        assert_eq!(message.identities()[0].as_ref(), b"kernel.abc.status");
        assert_eq!(message.msg_type(), "execute_request");
    }

    #[test]
    fn wrong_frame_counts_are_rejected() {
        let frames = signed_frames(&Signer::new("abc123"));

        for len in [0, 1, 5] {
            let err = decode(&frames[..len]).unwrap_err();
            assert!(matches!(err, FormatError::MalformedFrameCount { got } if got == len));
        }

        let mut long = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        long.extend(frames);
        assert!(matches!(
            decode(&long),
            Err(FormatError::MalformedFrameCount { got: 8 })
        ));
    }

    #[test]
    fn misplaced_delimiter_is_rejected() {
        let mut frames = signed_frames(&Signer::new("abc123"));
        frames[0] = Bytes::from_static(b"<IDS|NOPE>");
        assert!(matches!(
            decode(&frames),
            Err(FormatError::MissingDelimiter { position: 0 })
        ));
    }

    #[test]
    fn non_object_parts_are_invalid_json() {
        let base = signed_frames(&Signer::new("abc123"));
        let cases = [
            (2, "header"),
            (3, "parent_header"),
            (4, "metadata"),
            (5, "content"),
        ];

        for (index, expected) in cases {
            for bad in [&b"{not-json"[..], b"[1,2]", b"\"text\""] {
                let mut frames = base.clone();
                frames[index] = Bytes::copy_from_slice(bad);
                let err = decode(&frames).unwrap_err();
                assert!(
                    matches!(err, FormatError::InvalidJson { part, .. } if part == expected),
                    "frame {index} with {bad:?}"
                );
            }
        }
    }

    #[test]
    fn header_without_msg_type_is_invalid() {
        let mut frames = signed_frames(&Signer::new("abc123"));
        frames[2] = Bytes::from_static(
            br#"{"msg_id":"1","username":"u","session":"s","date":"d","msg_type":"","version":"5.1"}"#,
        );
        assert!(matches!(
            decode(&frames),
            Err(FormatError::InvalidJson { part: "header", .. })
        ));
    }

    #[test]
    fn non_utf8_signature_is_invalid() {
        let mut frames = signed_frames(&Signer::new("abc123"));
        frames[1] = Bytes::from_static(&[0xff, 0xfe]);
        assert!(matches!(
            decode(&frames),
            Err(FormatError::InvalidJson {
                part: "signature",
                ..
            })
        ));
    }

    #[test]
    fn single_byte_mutation_in_any_signed_part_fails_verify() {
        let signer = Signer::new("abc123");
        let frames = signed_frames(&signer);

        for index in 2..BODY_FRAMES {
            for pos in 0..frames[index].len() {
                let mut bytes = frames[index].to_vec();
                // Swap a digit/letter for another printable character so the
                // JSON usually stays parseable and reaches verification.
                bytes[pos] = if bytes[pos] == b'1' { b'2' } else { b'1' };
                let mut tampered = frames.clone();
                tampered[index] = Bytes::from(bytes);

                if let Ok(message) = decode(&tampered) {
                    assert!(
                        !verify(&message, &signer),
                        "frame {index} byte {pos} mutation verified"
                    );
                }
            }
        }
    }

    #[test]
    fn verify_uses_received_bytes_not_reserialization() {
        let signer = Signer::new("abc123");
        let header = br#"{"msg_id": "1", "username": "u", "session": "s", "date": "d", "msg_type": "status", "version": "5.3"}"#;
        let parts = SignedParts {
            header: Bytes::from_static(header),
            parent_header: Bytes::from_static(b"{ }"),
            metadata: Bytes::from_static(b"{}"),
            content: Bytes::from_static(br#"{"execution_state": "idle"}"#),
        };
        let signature = signer.sign(&parts);

        let frames = vec![
            Bytes::from_static(DELIMITER.as_bytes()),
            Bytes::from(signature),
            parts.header.clone(),
            parts.parent_header.clone(),
            parts.metadata.clone(),
            parts.content.clone(),
        ];
        let message = decode(&frames).unwrap();
        assert!(verify(&message, &signer));
    }

    #[test]
    fn setters_invalidate_signature() {
        let signer = Signer::new("abc123");
        let mut message = decode(&signed_frames(&signer)).unwrap();
        assert!(verify(&message, &signer));

        message.set_content(object(json!({"x": 1}))).unwrap();

        assert_eq!(message.content().get("x"), Some(&json!(1)));
        assert_eq!(message.signed_parts().content.as_ref(), br#"{"x":1}"#);
        assert_eq!(
            verify_strict(&message, &signer),
            Err(AuthError::SignatureMismatch)
        );
    }

    #[test]
    fn empty_msg_type_cannot_be_encoded() {
        let err = encode(&MessageDraft::new(""), "u", "s", &Signer::new("k")).unwrap_err();
        assert!(matches!(err, WireError::EmptyMessageType));
    }

    #[test]
    fn unsigned_messages_carry_empty_signature() {
        let frames = encode(
            &MessageDraft::new("kernel_info_request"),
            "u",
            "s",
            &Signer::disabled(),
        )
        .unwrap();
        assert!(frames[1].is_empty());
        assert!(verify(&decode(&frames).unwrap(), &Signer::disabled()));
        assert!(!verify(&decode(&frames).unwrap(), &Signer::new("abc123")));
    }
}
