//! Body codecs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Encoding or decoding failure reported by a [`Codec`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Wire format for request and response bodies.
///
/// A codec is chosen per body parameter (see
/// [`HandlerBuilder::body_with`](crate::HandlerBuilder::body_with)); JSON is
/// the default.
///
/// # Examples
///
/// ```
/// use ferrous_web::{Codec, CodecError};
/// use serde::{de::DeserializeOwned, Serialize};
///
/// /// Accepts `key=value&...` bodies.
/// struct FormCodec;
///
/// impl Codec for FormCodec {
///     fn content_type(&self) -> &'static str {
///         "application/x-www-form-urlencoded"
///     }
///
///     fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
///         let pairs: serde_json::Map<String, serde_json::Value> = url::form_urlencoded::parse(bytes)
///             .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
///             .collect();
///         serde_json::from_value(pairs.into()).map_err(|e| CodecError(e.to_string()))
///     }
///
///     fn encode<T: Serialize>(&self, _value: &T) -> Result<Vec<u8>, CodecError> {
///         Err(CodecError("form encoding is not supported".into()))
///     }
/// }
/// ```
pub trait Codec: Send + Sync + 'static {
    /// Media type this codec reads and writes, without parameters.
    fn content_type(&self) -> &'static str;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Whether a request `Content-Type` header value is acceptable.
    ///
    /// Compares the media type case-insensitively and ignores parameters
    /// such as `charset`.
    fn accepts(&self, header: &str) -> bool {
        let essence = header.split(';').next().unwrap_or("").trim();
        essence.eq_ignore_ascii_case(self.content_type())
    }
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError(e.to_string()))
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ignores_parameters_and_case() {
        let codec = JsonCodec;
        assert!(codec.accepts("application/json"));
        assert!(codec.accepts("Application/JSON; charset=utf-8"));
        assert!(!codec.accepts("text/plain"));
    }

    #[test]
    fn decode_error_is_reported() {
        let err = JsonCodec.decode::<u32>(b"\"x\"").unwrap_err();
        assert!(err.0.contains("invalid type"));
    }
}
