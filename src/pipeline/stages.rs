//! Built-in pipeline stages.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::{HeaderName, HeaderValue};
use tracing::Instrument;

use super::{Next, Stage};
use crate::config::DispatchOptions;
use crate::error::DispatchError;
use crate::http::{Request, Response};

/// Request id seeded into the request scope by [`RequestIdStage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Assigns a request id, or keeps the one the client sent.
///
/// The id is seeded into the request scope as [`RequestId`] (handlers can
/// inject it) and echoed on the response. Generated ids are UUID v4.
#[derive(Debug, Clone)]
pub struct RequestIdStage {
    header: HeaderName,
}

impl Default for RequestIdStage {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("x-request-id"),
        }
    }
}

impl RequestIdStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(header: HeaderName) -> Self {
        Self { header }
    }

    /// Uses the header configured in `options`.
    pub fn from_options(options: &DispatchOptions) -> Self {
        Self::with_header(options.request_id_header_name())
    }
}

#[async_trait]
impl Stage for RequestIdStage {
    fn name(&self) -> &str {
        "request-id"
    }

    async fn handle(&self, mut req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        let incoming = req
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let id = incoming.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let value = HeaderValue::from_str(&id).ok();
        if let Some(value) = &value {
            req.headers_mut().insert(self.header.clone(), value.clone());
        }
        next.scope().insert_instance(RequestId(id));

        let mut res = next.run(req).await?;
        if let Some(value) = value {
            res.headers.insert(self.header.clone(), value);
        }
        Ok(res)
    }
}

/// Wraps each request in a `tracing` span and writes an access log line.
///
/// Place it after [`RequestIdStage`] so the span carries the request id.
#[derive(Debug, Clone, Default)]
pub struct TracingStage {
    slow_threshold: Option<Duration>,
}

impl TracingStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests slower than `threshold` are logged at `warn`.
    pub fn with_slow_threshold(threshold: Duration) -> Self {
        Self {
            slow_threshold: Some(threshold),
        }
    }

    pub fn from_options(options: &DispatchOptions) -> Self {
        Self {
            slow_threshold: options.slow_request_threshold(),
        }
    }
}

#[async_trait]
impl Stage for TracingStage {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        let request_id = next
            .scope()
            .try_get_local::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        let span = tracing::info_span!(
            "request",
            method = %req.method(),
            path = req.path(),
            route = req.route().unwrap_or(""),
            request_id = %request_id,
        );

        let start = Instant::now();
        let result = next.run(req).instrument(span.clone()).await;
        let elapsed = start.elapsed();

        let _entered = span.enter();
        let status = match &result {
            Ok(res) => res.status,
            Err(e) => e.status(),
        };
        match self.slow_threshold {
            Some(threshold) if elapsed > threshold => {
                tracing::warn!(status = status.as_u16(), elapsed = ?elapsed, "slow request")
            }
            _ => tracing::info!(status = status.as_u16(), elapsed = ?elapsed, "request completed"),
        }
        result
    }
}
