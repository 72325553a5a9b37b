//! Error types for registration, resolution and request dispatch.
//!
//! Each component owns a small error enum. [`DispatchError`] gathers the
//! per-request ones at the dispatcher boundary, where they are mapped to a
//! status code.

use http::{Method, StatusCode};
use thiserror::Error;

use crate::dispatcher::DispatchPhase;

/// Dependency injection errors
///
/// Represents the conditions that can occur while the container resolves a
/// capability. Resolution chains are listed outermost first, so the last
/// entry is the capability that failed.
///
/// # Examples
///
/// ```rust
/// use ferrous_web::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound { name, chain }) => {
///         assert_eq!(name, "alloc::string::String");
///         assert_eq!(chain, vec!["alloc::string::String"]);
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiError {
    /// Capability not registered
    #[error("unresolved dependency `{name}` (resolution chain: {})", .chain.join(" -> "))]
    NotFound {
        name: &'static str,
        chain: Vec<&'static str>,
    },
    /// Type downcast failed
    #[error("type mismatch for `{0}`")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (scoped from root, or captured by a singleton)
    #[error("lifetime error resolving `{name}`: {reason}")]
    WrongLifetime {
        name: &'static str,
        reason: &'static str,
    },
    /// A factory reported its own failure
    #[error("factory for `{name}` failed: {message}")]
    Factory { name: &'static str, message: String },
}

impl DiError {
    /// Builds a [`DiError::Factory`] for capability `T`.
    ///
    /// ```rust
    /// use ferrous_web::DiError;
    ///
    /// struct Pool;
    /// let err = DiError::factory::<Pool>("connection refused");
    /// assert!(err.to_string().contains("connection refused"));
    /// ```
    pub fn factory<T: ?Sized + 'static>(message: impl Into<String>) -> Self {
        DiError::Factory {
            name: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    /// Resolution chain carried by the error, if any.
    pub fn chain(&self) -> &[&'static str] {
        match self {
            DiError::NotFound { chain, .. } => chain,
            DiError::Circular(path) => path,
            _ => &[],
        }
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;

/// Request matching failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No route pattern matches the path under any method.
    #[error("no route matches `{path}`")]
    NoMatch { path: String },
    /// The path matches, but only under other methods.
    #[error("method {method} is not allowed for `{path}`")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

/// Startup failures. These abort composition and are never swallowed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("route {method} `{pattern}` is already registered")]
    DuplicateRoute { method: Method, pattern: String },
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("body parameter `{second}` conflicts with `{first}`: the payload can be consumed once")]
    DuplicateBody { first: String, second: String },
    #[error("parameter `{0}` is declared twice")]
    DuplicateParameter(String),
    #[error("path parameter `{parameter}` does not appear in `{pattern}`")]
    UnknownPathParameter { pattern: String, parameter: String },
    #[error("cannot {what} after the dispatcher has been sealed")]
    LateRegistration { what: &'static str },
    #[error("invalid dispatch options: {0}")]
    InvalidOptions(String),
    #[error("startup resolution failed: {0}")]
    Prewarm(#[from] DiError),
}

/// A handler parameter could not be produced from the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot bind parameter `{parameter}`{}: {reason}", .raw.as_ref().map(|r| format!(" from {:?}", r)).unwrap_or_default())]
pub struct BindingError {
    pub parameter: String,
    pub raw: Option<String>,
    pub reason: String,
}

impl BindingError {
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            raw: None,
            reason: reason.into(),
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

/// Failure raised by application handler code.
///
/// A handler that sets `status` has produced a structured result and keeps
/// that status; otherwise the dispatcher answers 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Failure of a pipeline stage itself, as opposed to one it propagates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineStageError {
    pub stage: String,
    pub message: String,
    /// Status tag chosen by the stage; untagged failures answer 500.
    pub status: Option<StatusCode>,
}

impl PipelineStageError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn tagged(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

/// Every per-request failure the dispatcher maps to a response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Dependency(#[from] DiError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Stage(#[from] PipelineStageError),
}

impl DispatchError {
    /// Status code the dispatcher answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Route(RouteError::NoMatch { .. }) => StatusCode::NOT_FOUND,
            DispatchError::Route(RouteError::MethodNotAllowed { .. }) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            DispatchError::Binding(_) => StatusCode::BAD_REQUEST,
            DispatchError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Handler(e) => e.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            DispatchError::Stage(e) => e.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Lifecycle phase the error originated in.
    pub fn phase(&self) -> DispatchPhase {
        match self {
            DispatchError::Route(_) => DispatchPhase::Matching,
            DispatchError::Stage(_) => DispatchPhase::Piping,
            DispatchError::Binding(_) => DispatchPhase::Binding,
            DispatchError::Dependency(_) => DispatchPhase::Resolving,
            DispatchError::Handler(_) => DispatchPhase::Invoking,
        }
    }

    /// Short machine-readable kind, used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Route(RouteError::NoMatch { .. }) => "no_match",
            DispatchError::Route(RouteError::MethodNotAllowed { .. }) => "method_not_allowed",
            DispatchError::Binding(_) => "binding",
            DispatchError::Dependency(DiError::NotFound { .. }) => "unresolved_dependency",
            DispatchError::Dependency(DiError::Circular(_)) => "cyclic_dependency",
            DispatchError::Dependency(_) => "dependency",
            DispatchError::Handler(_) => "handler",
            DispatchError::Stage(_) => "pipeline_stage",
        }
    }
}
