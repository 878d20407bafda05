use serde::{Deserialize, Serialize};

use crate::error::CodecResult;

/// Trait for encoding and decoding envelopes that cross a byte-oriented carrier.
///
/// Envelope payloads are dynamic JSON values, so only self-describing formats
/// can round-trip them.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Encode a serializable value into bytes
    fn encode<T: Serialize>(&self, data: &T) -> CodecResult<Vec<u8>>;

    /// Decode bytes into a deserializable value
    fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CodecResult<T>;
}

/// Default codec (JSON codec)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, data: &T) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(data)?)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CodecResult<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// MessagePack codec - compact binary, cross-language compatible.
/// Structs are written as maps so the envelope keeps its `type`/`payload` keys.
#[cfg(feature = "codec-messagepack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

#[cfg(feature = "codec-messagepack")]
impl Codec for MessagePackCodec {
    fn encode<T: Serialize>(&self, data: &T) -> CodecResult<Vec<u8>> {
        rmp_serde::to_vec_named(data)
            .map_err(|e| crate::error::CodecError::Serialization(e.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CodecResult<T> {
        rmp_serde::from_slice(data)
            .map_err(|e| crate::error::CodecError::Serialization(e.to_string()))
    }
}

/// CBOR codec - binary JSON (RFC 8949), self-describing
#[cfg(feature = "codec-cbor")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

#[cfg(feature = "codec-cbor")]
impl Codec for CborCodec {
    fn encode<T: Serialize>(&self, data: &T) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(data, &mut buf)
            .map_err(|e| crate::error::CodecError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CodecResult<T> {
        ciborium::from_reader(data)
            .map_err(|e| crate::error::CodecError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;
    use serde_json::json;

    #[test]
    fn test_json_envelope_shape() {
        let envelope = Envelope::new("notify", Some(json!({ "message": "hi" })));
        let bytes = JsonCodec.encode(&envelope).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\"type\":\"notify\""));
        assert!(text.contains("\"payload\":{\"message\":\"hi\"}"));

        let decoded: Envelope = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_json_keeps_empty_payload_key() {
        let bytes = JsonCodec.encode(&Envelope::empty("ready")).unwrap();
        assert_eq!(bytes, br#"{"type":"ready","payload":null}"#);
    }

    #[test]
    fn test_json_rejects_garbage() {
        let result: CodecResult<Envelope> = JsonCodec.decode(b"not json");
        assert!(matches!(
            result,
            Err(crate::error::CodecError::Serialization(_))
        ));
    }

    #[cfg(feature = "codec-messagepack")]
    #[test]
    fn test_messagepack_envelope() {
        let envelope = Envelope::new("update", Some(json!({ "id": 123, "value": "test" })));
        let bytes = MessagePackCodec.encode(&envelope).unwrap();
        let decoded: Envelope = MessagePackCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[cfg(feature = "codec-cbor")]
    #[test]
    fn test_cbor_envelope() {
        let envelope = Envelope::empty("clear");
        let bytes = CborCodec.encode(&envelope).unwrap();
        let decoded: Envelope = CborCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }
}
