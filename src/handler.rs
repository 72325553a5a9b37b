//! Handler descriptors: declared parameters plus the invocation thunk.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::binding::codec::{Codec, JsonCodec};
use crate::binding::{BoundArgs, ParamSpec};
use crate::error::{HandlerError, RegistrationError};
use crate::http::{IntoResponse, Response};
use crate::routing::PathPattern;

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased handler invocation.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, args: BoundArgs) -> BoxFuture<'static, Result<Response, HandlerError>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, args: BoundArgs) -> BoxFuture<'static, Result<Response, HandlerError>> {
        let fut = (self)(args);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

/// Immutable description of an endpoint: what it binds and how to call it.
///
/// # Examples
///
/// ```
/// use ferrous_web::{HandlerDescriptor, Json, ParamSource};
///
/// struct Catalog;
///
/// let descriptor = HandlerDescriptor::builder()
///     .path::<u64>("id")
///     .query::<bool>("verbose")
///     .inject::<Catalog>()
///     .handle(|mut args| async move {
///         let id: u64 = args.take("id")?;
///         let _catalog = args.dependency::<Catalog>()?;
///         Ok(Json(id))
///     })
///     .unwrap();
///
/// assert_eq!(descriptor.params().len(), 3);
/// assert_eq!(descriptor.params()[1].source(), &ParamSource::Query { required: false });
/// ```
#[derive(Clone)]
pub struct HandlerDescriptor {
    params: Arc<[ParamSpec]>,
    handler: Arc<dyn Handler>,
}

impl HandlerDescriptor {
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub(crate) fn invoke(&self, args: BoundArgs) -> BoxFuture<'static, Result<Response, HandlerError>> {
        self.handler.call(args)
    }

    /// Checks that every path parameter names a segment of `pattern`.
    pub(crate) fn check_against(&self, pattern: &PathPattern) -> Result<(), RegistrationError> {
        for spec in self.params.iter() {
            if *spec.source() == crate::binding::ParamSource::Path && !pattern.has_param(spec.name()) {
                return Err(RegistrationError::UnknownPathParameter {
                    pattern: pattern.as_str().to_string(),
                    parameter: spec.name().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Declares handler parameters in order, then finishes with
/// [`handle`](Self::handle).
///
/// Declaration errors (a second body parameter, a repeated name) are kept
/// and reported by `handle`, so chains stay fluent.
#[derive(Default)]
pub struct HandlerBuilder {
    params: Vec<ParamSpec>,
    error: Option<RegistrationError>,
}

impl HandlerBuilder {
    /// Path parameter converted with `FromStr`.
    pub fn path<T>(self, name: &str) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: fmt::Display,
    {
        self.push(ParamSpec::path::<T>(name))
    }

    /// Optional query parameter, bound as `Option<T>`.
    pub fn query<T>(self, name: &str) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: fmt::Display,
    {
        self.push(ParamSpec::query::<T>(name, false))
    }

    /// Required query parameter, bound as `T`.
    pub fn required_query<T>(self, name: &str) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: fmt::Display,
    {
        self.push(ParamSpec::query::<T>(name, true))
    }

    /// JSON body parameter.
    pub fn body<T>(self, name: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.body_with::<T, _>(name, JsonCodec)
    }

    /// Body parameter decoded with `codec`.
    pub fn body_with<T, C>(self, name: &str, codec: C) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        C: Codec,
    {
        self.push(ParamSpec::body::<T, C>(name, codec))
    }

    /// Dependency resolved from the request scope.
    pub fn inject<T: Send + Sync + 'static>(self) -> Self {
        self.push(ParamSpec::dependency::<T>())
    }

    /// Trait dependency resolved from the request scope.
    pub fn inject_trait<T: ?Sized + Send + Sync + 'static>(self) -> Self {
        self.push(ParamSpec::trait_dependency::<T>())
    }

    fn push(mut self, spec: ParamSpec) -> Self {
        if self.error.is_some() {
            return self;
        }
        if spec.is_body() {
            if let Some(first) = self.params.iter().find(|p| p.is_body()) {
                self.error = Some(RegistrationError::DuplicateBody {
                    first: first.name().to_string(),
                    second: spec.name().to_string(),
                });
                return self;
            }
        }
        if self.params.iter().any(|p| p.name() == spec.name()) {
            self.error = Some(RegistrationError::DuplicateParameter(spec.name().to_string()));
            return self;
        }
        self.params.push(spec);
        self
    }

    /// Finishes the descriptor with its handler.
    pub fn handle<F, Fut, R>(self, handler: F) -> Result<HandlerDescriptor, RegistrationError>
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: IntoResponse,
    {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(HandlerDescriptor {
            params: self.params.into(),
            handler: Arc::new(handler),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_body_is_rejected() {
        #[derive(serde::Deserialize)]
        struct A;
        #[derive(serde::Deserialize)]
        struct B;

        let err = HandlerDescriptor::builder()
            .body::<A>("a")
            .body::<B>("b")
            .handle(|_args| async { Ok(()) })
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateBody {
                first: "a".into(),
                second: "b".into()
            }
        );
    }

    #[test]
    fn repeated_name_is_rejected() {
        let err = HandlerDescriptor::builder()
            .path::<u32>("id")
            .query::<u32>("id")
            .handle(|_args| async { Ok(()) })
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateParameter("id".into()));
    }

    #[test]
    fn path_params_must_exist_in_pattern() {
        let d = HandlerDescriptor::builder()
            .path::<u32>("id")
            .handle(|_args| async { Ok(()) })
            .unwrap();
        assert!(d.check_against(&PathPattern::parse("/x/{id}").unwrap()).is_ok());
        assert!(matches!(
            d.check_against(&PathPattern::parse("/x/{key}").unwrap()),
            Err(RegistrationError::UnknownPathParameter { .. })
        ));
    }
}
