//! Dispatcher configuration.
//!
//! Options are plain data. They can be built in code or deserialized from
//! whatever source the host application already reads; every field has a
//! default so partial documents work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

/// Runtime options applied by the dispatcher and the built-in stages.
///
/// Registered as a singleton when the app is sealed, so handlers can inject
/// it.
///
/// # Examples
///
/// ```
/// use ferrous_web::DispatchOptions;
///
/// let opts: DispatchOptions = serde_json::from_str(r#"{ "max_body_bytes": 1024 }"#).unwrap();
/// assert_eq!(opts.max_body_bytes, 1024);
/// assert_eq!(opts.request_id_header, "x-request-id");
/// assert!(!opts.expose_internal_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Largest body a body parameter will decode.
    pub max_body_bytes: usize,
    /// Include internal error messages in 5xx response bodies.
    pub expose_internal_errors: bool,
    /// Header carrying the request id in and out.
    pub request_id_header: String,
    /// Requests slower than this are logged at `warn`.
    pub slow_request_threshold_ms: Option<u64>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
            expose_internal_errors: false,
            request_id_header: "x-request-id".to_string(),
            slow_request_threshold_ms: None,
        }
    }
}

impl DispatchOptions {
    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.max_body_bytes == 0 {
            return Err(RegistrationError::InvalidOptions(
                "max_body_bytes must be greater than zero".into(),
            ));
        }
        if http::HeaderName::from_bytes(self.request_id_header.as_bytes()).is_err() {
            return Err(RegistrationError::InvalidOptions(format!(
                "`{}` is not a valid header name",
                self.request_id_header
            )));
        }
        Ok(())
    }

    pub fn slow_request_threshold(&self) -> Option<Duration> {
        self.slow_request_threshold_ms.map(Duration::from_millis)
    }

    pub(crate) fn request_id_header_name(&self) -> http::HeaderName {
        http::HeaderName::from_bytes(self.request_id_header.as_bytes())
            .unwrap_or_else(|_| http::HeaderName::from_static("x-request-id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_header_name() {
        let opts = DispatchOptions {
            request_id_header: "bad header".into(),
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(RegistrationError::InvalidOptions(_))
        ));
    }

    #[test]
    fn defaults_are_valid() {
        let opts = DispatchOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.slow_request_threshold(), None);
    }
}
