//! Middleware pipeline.
//!
//! Stages run in registration order on the way in and in reverse order on
//! the way out. Continuation is index-driven: [`Next`] holds the remaining
//! slice of stages, the endpoint and the request scope.

pub mod stages;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::handler::BoxFuture;
use crate::http::{Request, Response};
use crate::provider::Scope;

pub use stages::{RequestId, RequestIdStage, TracingStage};

/// One middleware stage.
///
/// A stage may call `next.run(req)`, answer on its own without calling it,
/// or inspect and transform what comes back. Returning an error from the
/// stage itself should use [`PipelineStageError`](crate::PipelineStageError)
/// so the dispatcher can tell it apart from handler failures.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use ferrous_web::{DispatchError, Next, PipelineStageError, Request, Response, Stage};
/// use http::StatusCode;
///
/// struct RequireApiKey;
///
/// #[async_trait]
/// impl Stage for RequireApiKey {
///     async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
///         if req.headers().contains_key("x-api-key") {
///             next.run(req).await
///         } else {
///             Err(PipelineStageError::new("api-key", "missing key")
///                 .tagged(StatusCode::UNAUTHORIZED)
///                 .into())
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Name used in logs and in stage errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError>;
}

/// Innermost step of the pipeline, run after the last stage.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: Request, scope: &Scope) -> Result<Response, DispatchError>;
}

/// Continuation handed to each stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    endpoint: &'a dyn Endpoint,
    scope: &'a Scope,
}

impl<'a> Next<'a> {
    /// The request scope, for resolving or seeding per-request services.
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// Runs the rest of the pipeline.
    pub async fn run(self, req: Request) -> Result<Response, DispatchError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                    scope: self.scope,
                };
                tracing::trace!(stage = stage.name(), "entering stage");
                stage.handle(req, next).await
            }
            None => self.endpoint.call(req, self.scope).await,
        }
    }
}

/// Ordered stage list, shared read-only across requests.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn push<S: Stage>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn push_arc(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs `req` through every stage and then `endpoint`.
    pub async fn run(
        &self,
        req: Request,
        scope: &Scope,
        endpoint: &dyn Endpoint,
    ) -> Result<Response, DispatchError> {
        Next {
            stages: &self.stages,
            endpoint,
            scope,
        }
        .run(req)
        .await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Stage built from a closure. See [`stage_fn`].
pub struct FnStage<F> {
    name: &'static str,
    f: F,
}

/// Wraps a closure as a [`Stage`].
///
/// ```
/// use ferrous_web::{stage_fn, Pipeline};
/// use http::{HeaderValue, header::CACHE_CONTROL};
///
/// let mut pipeline = Pipeline::new();
/// pipeline.push(stage_fn("no-cache", |req, next| {
///     Box::pin(async move {
///         let mut res = next.run(req).await?;
///         res.headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
///         Ok(res)
///     })
/// }));
/// assert_eq!(pipeline.names(), vec!["no-cache"]);
/// ```
pub fn stage_fn<F>(name: &'static str, f: F) -> FnStage<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response, DispatchError>>
        + Send
        + Sync
        + 'static,
{
    FnStage { name, f }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response, DispatchError>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        (self.f)(req, next).await
    }
}
