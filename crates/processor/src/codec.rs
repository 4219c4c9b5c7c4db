//! Typed payload codecs
//!
//! Operators exchange bytes; a [`Codec`] is the typed boundary where those bytes
//! become values. Malformed input (absent fields, wrong JSON types) surfaces as a
//! [`DecodeError`] rather than a panic.

use crate::error::{DecodeError, ProcessorError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Converts values to and from their wire form
pub trait Codec<T>: Send + Sync + Debug {
    /// Encode a value to bytes
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes into a value
    fn decode(&self, bytes: &[u8]) -> std::result::Result<T, DecodeError>;

    /// Codec name used in error messages
    fn name(&self) -> &'static str;
}

/// JSON codec for any serde type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ProcessorError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<T, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::new("json", e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Compact binary codec for any serde type
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<T> Codec<T> for BincodeCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| ProcessorError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<T, DecodeError> {
        bincode::deserialize(bytes).map_err(|e| DecodeError::new("bincode", e.to_string()))
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}

/// Plain UTF-8 text, used for keys such as city or channel names
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<String, DecodeError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| DecodeError::new("string", e.to_string()))
    }

    fn name(&self) -> &'static str {
        "string"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        city: String,
        price: f64,
    }

    #[test]
    fn test_json_codec() {
        let codec = JsonCodec;
        let order = Order {
            city: "Mumbai".to_string(),
            price: 100.0,
        };

        let bytes = codec.encode(&order).unwrap();
        let decoded: Order = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn test_json_missing_field_is_decode_error() {
        let err = Codec::<Order>::decode(&JsonCodec, br#"{"city":"Pune"}"#).unwrap_err();
        assert_eq!(err.codec, "json");
        assert!(err.reason.contains("price"));
    }

    #[test]
    fn test_json_wrong_type_is_decode_error() {
        let result = Codec::<Order>::decode(&JsonCodec, br#"{"city":"Pune","price":"cheap"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_bincode_codec_rejects_truncated_input() {
        let codec = BincodeCodec;
        let bytes = codec.encode(&(7u64, 3.5f64)).unwrap();
        let result: std::result::Result<(u64, f64), _> = codec.decode(&bytes[..4]);
        assert_eq!(result.unwrap_err().codec, "bincode");
    }

    #[test]
    fn test_string_codec() {
        let codec = StringCodec;
        assert_eq!(codec.encode(&"Delhi".to_string()).unwrap(), b"Delhi".to_vec());
        assert_eq!(codec.decode(b"Delhi").unwrap(), "Delhi");
        assert!(codec.decode(&[0xff, 0xfe]).is_err());
    }
}
