pub mod kind;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use self::kind::MessageKind;
use crate::error::{CodecError, CodecResult};

/// Wire-level record carried between a channel and its transports.
///
/// `payload` is `None` for kinds that carry no data. The serialized form
/// always contains the `payload` key so receivers can match on shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Envelope for a kind without payload
    pub fn empty(kind: impl Into<String>) -> Self {
        Self::new(kind, None)
    }

    /// Build an envelope for kind `K`. Payloads serializing to `null` are stored as absent.
    pub fn typed<K: MessageKind>(payload: &K::Payload) -> CodecResult<Self> {
        let value = serde_json::to_value(payload)?;
        let payload = match value {
            Value::Null => None,
            value => Some(value),
        };
        Ok(Self::new(K::TYPE, payload))
    }

    /// Whether this envelope carries kind `K`
    pub fn is<K: MessageKind>(&self) -> bool {
        self.kind == K::TYPE
    }

    /// Decode the payload. An absent payload decodes as JSON `null`.
    pub fn decode_payload<T: for<'de> Deserialize<'de>>(&self) -> CodecResult<T> {
        let value = self.payload.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            CodecError::InvalidEnvelope(format!("payload of '{}': {}", self.kind, e))
        })
    }

    /// Reject envelopes that cannot be routed
    pub fn validate(&self) -> CodecResult<()> {
        if self.kind.is_empty() {
            return Err(CodecError::InvalidEnvelope(
                "empty message type".to_string(),
            ));
        }
        Ok(())
    }
}
