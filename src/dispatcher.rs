//! Request dispatch.
//!
//! A [`Dispatcher`] is the sealed, read-only form of an [`App`](crate::App).
//! Each request walks the phases of [`DispatchPhase`] in order; any failure
//! jumps to `Errored`, where it is mapped to a response. The request scope
//! is released exactly once on every exit path, cancellation included.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use http::header::ALLOW;
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;

use crate::binding::{bind_request, resolve_dependencies};
use crate::cancellation::CancellationToken;
use crate::config::DispatchOptions;
use crate::error::{DispatchError, RouteError};
use crate::handler::HandlerDescriptor;
use crate::http::{Request, Response};
use crate::pipeline::{Endpoint, Pipeline, RequestId};
use crate::provider::{Scope, ServiceProvider};
use crate::routing::{PathParams, RouteTable};

/// Lifecycle phase of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchPhase {
    Matching,
    Piping,
    Binding,
    Resolving,
    Invoking,
    Responding,
    Errored,
}

impl DispatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPhase::Matching => "matching",
            DispatchPhase::Piping => "piping",
            DispatchPhase::Binding => "binding",
            DispatchPhase::Resolving => "resolving",
            DispatchPhase::Invoking => "invoking",
            DispatchPhase::Responding => "responding",
            DispatchPhase::Errored => "errored",
        }
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[inline]
fn enter(phase: DispatchPhase) {
    tracing::trace!(phase = phase.as_str(), "dispatch phase");
}

/// What the router learned about the request, seeded into every request
/// scope before the pipeline runs.
///
/// ```
/// use ferrous_web::{App, HandlerDescriptor, Request, RequestContext};
/// use http::Method;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut app = App::new();
/// app.get(
///     "/orders/{id}",
///     HandlerDescriptor::builder()
///         .inject::<RequestContext>()
///         .handle(|args| async move {
///             let ctx = args.dependency::<RequestContext>()?;
///             Ok(format!("{} {}", ctx.route(), ctx.params().get("id").unwrap_or("")))
///         })
///         .unwrap(),
/// )
/// .unwrap();
///
/// let dispatcher = app.seal().await.unwrap();
/// let res = dispatcher.dispatch(Request::new(Method::GET, "/orders/7")).await;
/// assert_eq!(res.body_text(), "/orders/{id} 7");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    route: Arc<str>,
    params: PathParams,
    headers: HeaderMap,
}

impl RequestContext {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Pattern of the matched route, as registered.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

struct DispatcherInner {
    routes: RouteTable<HandlerDescriptor>,
    pipeline: Pipeline,
    provider: ServiceProvider,
    options: Arc<DispatchOptions>,
}

/// Sealed request dispatcher. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub(crate) fn new(
        routes: RouteTable<HandlerDescriptor>,
        pipeline: Pipeline,
        provider: ServiceProvider,
        options: Arc<DispatchOptions>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                routes,
                pipeline,
                provider,
                options,
            }),
        }
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.inner.provider
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.inner.options
    }

    pub fn routes(&self) -> &RouteTable<HandlerDescriptor> {
        &self.inner.routes
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Dispatches one request. Never fails: every error becomes a response.
    pub async fn dispatch(&self, req: Request) -> Response {
        match self.run(req, None).await {
            Some(res) => res,
            // Only reachable with a token.
            None => Response::new(http::StatusCode::SERVICE_UNAVAILABLE),
        }
    }

    /// Like [`dispatch`](Self::dispatch), but abandons the request when
    /// `token` fires. Returns `None` if it was abandoned.
    ///
    /// The token is seeded into the request scope, so handlers can watch it
    /// too. Scoped instances built before the cancellation are still released.
    pub async fn dispatch_with_cancellation(
        &self,
        req: Request,
        token: &CancellationToken,
    ) -> Option<Response> {
        self.run(req, Some(token)).await
    }

    async fn run(&self, mut req: Request, cancel: Option<&CancellationToken>) -> Option<Response> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!("request cancelled before dispatch");
            return None;
        }
        let start = Instant::now();

        enter(DispatchPhase::Matching);
        let found = match self.inner.routes.match_route(req.method(), req.path()) {
            Ok(found) => found,
            Err(e) => return Some(self.error_response(e.into(), None)),
        };
        let route = found.route;

        let scope = self.inner.provider.create_scope();
        scope.insert_instance(RequestContext {
            method: req.method().clone(),
            path: req.path().to_string(),
            route: route.pattern().raw(),
            params: found.params.clone(),
            headers: req.headers().clone(),
        });
        if let Some(token) = cancel {
            scope.insert_instance(token.clone());
        }
        req.set_route(route.pattern().raw());

        let endpoint = HandlerEndpoint {
            descriptor: route.value(),
            params: found.params,
            options: &self.inner.options,
        };

        enter(DispatchPhase::Piping);
        let work = self.inner.pipeline.run(req, &scope, &endpoint);
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = work => Some(result),
            },
            None => Some(work.await),
        };

        let response = match outcome {
            Some(Ok(res)) => Some(res),
            Some(Err(e)) => Some(self.error_response(e, Some(&scope))),
            None => {
                tracing::debug!(route = route.pattern().as_str(), "request cancelled");
                None
            }
        };

        scope.release().await;
        tracing::trace!(
            route = route.pattern().as_str(),
            elapsed = ?start.elapsed(),
            "request finished"
        );
        response
    }

    fn error_response(&self, err: DispatchError, scope: Option<&Scope>) -> Response {
        enter(DispatchPhase::Errored);
        let status = err.status();
        let phase = err.phase();
        let chain = match &err {
            DispatchError::Dependency(e) => e.chain().join(" -> "),
            _ => String::new(),
        };
        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                phase = phase.as_str(),
                kind = err.kind(),
                chain = %chain,
                error = %err,
                "request failed"
            );
        } else {
            tracing::warn!(
                status = status.as_u16(),
                phase = phase.as_str(),
                kind = err.kind(),
                error = %err,
                "request rejected"
            );
        }

        let message = if status.is_server_error() && !self.inner.options.expose_internal_errors {
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            err.to_string()
        };
        let parameter = match &err {
            DispatchError::Binding(b) => Some(b.parameter.as_str()),
            _ => None,
        };
        let mut res = Response::json(
            status,
            &ErrorBody {
                error: err.kind(),
                message,
                parameter,
            },
        );

        if let DispatchError::Route(RouteError::MethodNotAllowed { allowed, .. }) = &err {
            let joined = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&joined) {
                res.headers.insert(ALLOW, value);
            }
        }
        if let Some(id) = scope.and_then(|s| s.try_get_local::<RequestId>()) {
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                res.headers
                    .insert(self.inner.options.request_id_header_name(), value);
            }
        }
        res
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.routes.len())
            .field("pipeline", &self.inner.pipeline)
            .field("services", &self.inner.provider.len())
            .finish()
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter: Option<&'a str>,
}

/// Innermost pipeline step: bind, resolve, invoke.
struct HandlerEndpoint<'a> {
    descriptor: &'a HandlerDescriptor,
    params: PathParams,
    options: &'a DispatchOptions,
}

#[async_trait]
impl Endpoint for HandlerEndpoint<'_> {
    async fn call(&self, req: Request, scope: &Scope) -> Result<Response, DispatchError> {
        enter(DispatchPhase::Binding);
        let specs = self.descriptor.params();
        let mut args = bind_request(specs, &req, &self.params, self.options)?;

        enter(DispatchPhase::Resolving);
        resolve_dependencies(specs, &mut args, scope)?;

        enter(DispatchPhase::Invoking);
        let res = self.descriptor.invoke(args).await?;

        enter(DispatchPhase::Responding);
        Ok(res)
    }
}
