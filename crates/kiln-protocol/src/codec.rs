use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{KilnMessage, MAX_MESSAGE_SIZE};

/// Size of the frame header: 4-byte length plus 1-byte type tag.
pub const HEADER_LEN: usize = 5;

/// Codec for encoding/decoding kiln protocol messages.
///
/// Frame layout:
/// ```text
/// [4 bytes: big-endian length of tag + payload]
/// [1 byte:  message type tag]
/// [N bytes: bincode payload]
/// ```
pub struct KilnCodec;

impl KilnCodec {
    /// Encode a framed message.
    pub fn encode(msg: &KilnMessage) -> ProtocolResult<Vec<u8>> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(KilnMessage, usize)> {
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = Self::frame_len([data[0], data[1], data[2], data[3]])?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_tagged(data[4], &data[HEADER_LEN..total])?;
        Ok((msg, total))
    }

    /// Validate a length prefix and return it.
    fn frame_len(prefix: [u8; 4]) -> ProtocolResult<usize> {
        let len = u32::from_be_bytes(prefix) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(len)
    }

    fn decode_tagged(tag: u8, payload: &[u8]) -> ProtocolResult<KilnMessage> {
        let msg = Self::decode_payload(payload)?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &KilnMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<KilnMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Write one framed message to a byte stream.
    pub async fn write_message<W>(writer: &mut W, msg: &KilnMessage) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed message from a byte stream.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly before a new frame.
    pub async fn read_message<R>(reader: &mut R) -> ProtocolResult<Option<KilnMessage>>
    where
        R: AsyncRead + Unpin,
    {
        let mut prefix = [0u8; 4];
        match reader.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = Self::frame_len(prefix)?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        tracing::trace!(tag = body[0], len, "frame read");
        Self::decode_tagged(body[0], &body[1..]).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;
    use kiln_store::{ObjectKind, StoredObject};
    use kiln_types::{BitId, ObjectId};

    fn object() -> StoredObject {
        StoredObject::new(ObjectId::new("acme/button"), ObjectKind::Symlink, b"{}".to_vec())
    }

    macro_rules! roundtrip_test {
        ($name:ident, $msg:expr) => {
            #[test]
            fn $name() {
                let msg = $msg;
                let encoded = KilnCodec::encode(&msg).unwrap();
                let (decoded, consumed) = KilnCodec::decode(&encoded).unwrap();
                assert_eq!(consumed, encoded.len());
                assert_eq!(decoded, msg);
            }
        };
    }

    roundtrip_test!(hello_roundtrip, KilnMessage::Hello {
        version: PROTOCOL_VERSION,
        scope: "home".into(),
    });

    roundtrip_test!(fetch_request_roundtrip, KilnMessage::FetchRequest {
        ids: vec![BitId::parse("acme/button@0.0.1").unwrap(), BitId::parse("acme/x").unwrap()],
    });

    roundtrip_test!(fetch_response_roundtrip, KilnMessage::FetchResponse {
        items: vec![
            FetchItem::Found {
                requested: BitId::parse("acme/button").unwrap(),
                objects: vec![object()],
            },
            FetchItem::Missing {
                requested: BitId::parse("acme/gone").unwrap(),
            },
        ],
    });

    roundtrip_test!(put_response_roundtrip, KilnMessage::PutResponse {
        results: vec![
            PutResult::Accepted { id: ObjectId::new("a/b@0.0.1") },
            PutResult::Rejected {
                id: ObjectId::new("a/c@0.0.1"),
                reason: RejectReason::Conflict,
                detail: "exists".into(),
            },
        ],
    });

    roundtrip_test!(error_roundtrip, KilnMessage::error(error_codes::NOT_FOUND, "not found"));

    #[test]
    fn type_tags_unique() {
        let msgs = [
            KilnMessage::Hello { version: 1, scope: String::new() },
            KilnMessage::HelloAck { version: 1, scope: String::new() },
            KilnMessage::FetchRequest { ids: vec![] },
            KilnMessage::FetchResponse { items: vec![] },
            KilnMessage::PutRequest { objects: vec![] },
            KilnMessage::PutResponse { results: vec![] },
            KilnMessage::error(0, ""),
        ];
        let mut tags: Vec<u8> = msgs.iter().map(KilnMessage::type_tag).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }

    #[test]
    fn decode_truncated() {
        let err = KilnCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let err = KilnCodec::decode(&[0u8, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_oversized_length() {
        let len = (MAX_MESSAGE_SIZE as u32 + 2).to_be_bytes();
        let data = [len[0], len[1], len[2], len[3], 1];
        assert!(matches!(
            KilnCodec::decode(&data),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn decode_rejects_wrong_tag() {
        let mut encoded = KilnCodec::encode(&KilnMessage::FetchRequest { ids: vec![] }).unwrap();
        encoded[4] = KilnMessage::error(0, "").type_tag();
        assert!(matches!(
            KilnCodec::decode(&encoded),
            Err(ProtocolError::InvalidMessageType(255))
        ));
    }

    #[tokio::test]
    async fn stream_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let msg = KilnMessage::PutRequest { objects: vec![object()] };
        KilnCodec::write_message(&mut client, &msg).await.unwrap();
        KilnCodec::write_message(&mut client, &KilnMessage::error(1, "x")).await.unwrap();
        drop(client);

        let first = KilnCodec::read_message(&mut server).await.unwrap();
        assert_eq!(first, Some(msg));
        let second = KilnCodec::read_message(&mut server).await.unwrap();
        assert!(matches!(second, Some(KilnMessage::Error { code: 1, .. })));
        assert_eq!(KilnCodec::read_message(&mut server).await.unwrap(), None);
    }
}
