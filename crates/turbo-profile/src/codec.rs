//! Per-field value codecs.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;

use crate::CodecError;

/// Encodes field values before they are stored and decodes them after reads.
pub trait Compressor: Send + Sync {
    /// Encode an in-memory value into its stored form.
    fn encode(&self, value: &Value) -> Result<Value, CodecError>;

    /// Decode a stored value back into its in-memory form.
    fn decode(&self, encoded: &Value) -> Result<Value, CodecError>;
}

/// Stores values as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Compressor for IdentityCodec {
    fn encode(&self, value: &Value) -> Result<Value, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, encoded: &Value) -> Result<Value, CodecError> {
        Ok(encoded.clone())
    }
}

/// Stores each value as base64-encoded JSON text, e.g. `"b64:eyJhIjoxfQ"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64JsonCodec;

impl Base64JsonCodec {
    const MARKER: &'static str = "b64:";
}

impl Compressor for Base64JsonCodec {
    fn encode(&self, value: &Value) -> Result<Value, CodecError> {
        let json = serde_json::to_vec(value)?;
        Ok(Value::String(format!("{}{}", Self::MARKER, STANDARD.encode(json))))
    }

    fn decode(&self, encoded: &Value) -> Result<Value, CodecError> {
        let text = encoded
            .as_str()
            .and_then(|s| s.strip_prefix(Self::MARKER))
            .ok_or_else(|| CodecError::Decode("missing b64 marker".to_string()))?;
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Encode `value`, keeping it raw if the codec fails.
pub(crate) fn encode_or_raw(codec: &dyn Compressor, field: &str, value: &Value) -> Value {
    codec.encode(value).unwrap_or_else(|err| {
        tracing::warn!(field, error = %err, "failed to encode field, storing raw value");
        value.clone()
    })
}

/// Decode `encoded`, keeping it raw if the codec fails.
pub(crate) fn decode_or_raw(codec: &dyn Compressor, field: &str, encoded: &Value) -> Value {
    codec.decode(encoded).unwrap_or_else(|err| {
        tracing::warn!(field, error = %err, "failed to decode field, keeping raw value");
        encoded.clone()
    })
}
