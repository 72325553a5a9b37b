//! Request binding: turning request data and container services into handler
//! arguments.
//!
//! Binding runs in two passes, mirroring the dispatcher phases. The request
//! pass converts path, query and body parameters and fails with a
//! [`BindingError`]; the resolving pass pulls dependency parameters from the
//! request scope and fails with a [`DiError`](crate::DiError). Each pass
//! reports the first failure in declaration order, and the handler only runs
//! when both succeed.

pub mod codec;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::config::DispatchOptions;
use crate::error::{BindingError, DiResult, HandlerError};
use crate::http::Request;
use crate::provider::Scope;
use crate::routing::PathParams;
use crate::traits::Resolver;

use self::codec::{Codec, CodecError};

type BoxAny = Box<dyn Any + Send>;

/// Where a handler parameter comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    Path,
    Query { required: bool },
    Body { content_type: &'static str },
    Dependency,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Path => f.write_str("path"),
            ParamSource::Query { required: true } => f.write_str("query (required)"),
            ParamSource::Query { required: false } => f.write_str("query"),
            ParamSource::Body { content_type } => write!(f, "body ({})", content_type),
            ParamSource::Dependency => f.write_str("dependency"),
        }
    }
}

enum TextFailure {
    Missing,
    Invalid(String),
}

type TextExtract = Arc<dyn Fn(Option<&str>) -> Result<BoxAny, TextFailure> + Send + Sync>;
type BodyExtract = Arc<dyn Fn(&[u8]) -> Result<BoxAny, CodecError> + Send + Sync>;
type AcceptsContentType = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type DependencyExtract = Arc<dyn Fn(&Scope) -> DiResult<BoxAny> + Send + Sync>;

#[derive(Clone)]
enum Extract {
    Text(TextExtract),
    Body(BodyExtract, AcceptsContentType),
    Dependency(DependencyExtract),
}

/// One declared handler parameter.
#[derive(Clone)]
pub struct ParamSpec {
    name: Arc<str>,
    source: ParamSource,
    type_name: &'static str,
    extract: Extract,
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl ParamSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ParamSource {
        &self.source
    }

    /// Target type of the parameter.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn path<T>(name: &str) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: fmt::Display,
    {
        Self {
            name: Arc::from(name),
            source: ParamSource::Path,
            type_name: std::any::type_name::<T>(),
            extract: Extract::Text(Arc::new(|raw: Option<&str>| -> Result<BoxAny, TextFailure> {
                let raw = raw.ok_or(TextFailure::Missing)?;
                parse::<T>(raw).map(|v| Box::new(v) as BoxAny)
            })),
        }
    }

    pub(crate) fn query<T>(name: &str, required: bool) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: fmt::Display,
    {
        let extract: TextExtract = if required {
            Arc::new(|raw: Option<&str>| -> Result<BoxAny, TextFailure> {
                let raw = raw.ok_or(TextFailure::Missing)?;
                parse::<T>(raw).map(|v| Box::new(v) as BoxAny)
            })
        } else {
            Arc::new(|raw: Option<&str>| -> Result<BoxAny, TextFailure> {
                match raw {
                    Some(raw) => parse::<T>(raw).map(|v| Box::new(Some(v)) as BoxAny),
                    None => Ok(Box::new(None::<T>) as BoxAny),
                }
            })
        };
        Self {
            name: Arc::from(name),
            source: ParamSource::Query { required },
            type_name: std::any::type_name::<T>(),
            extract: Extract::Text(extract),
        }
    }

    pub(crate) fn body<T, C>(name: &str, codec: C) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        C: Codec,
    {
        let content_type = codec.content_type();
        let codec = Arc::new(codec);
        let accepts = {
            let codec = codec.clone();
            Arc::new(move |header: &str| codec.accepts(header)) as AcceptsContentType
        };
        let decode = Arc::new(move |bytes: &[u8]| {
            codec.decode::<T>(bytes).map(|v| Box::new(v) as BoxAny)
        }) as BodyExtract;
        Self {
            name: Arc::from(name),
            source: ParamSource::Body { content_type },
            type_name: std::any::type_name::<T>(),
            extract: Extract::Body(decode, accepts),
        }
    }

    pub(crate) fn dependency<T: Send + Sync + 'static>() -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            name: Arc::from(type_name),
            source: ParamSource::Dependency,
            type_name,
            extract: Extract::Dependency(Arc::new(|scope: &Scope| {
                scope.get::<T>().map(|v| Box::new(v) as BoxAny)
            })),
        }
    }

    pub(crate) fn trait_dependency<T: ?Sized + Send + Sync + 'static>() -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            name: Arc::from(type_name),
            source: ParamSource::Dependency,
            type_name,
            extract: Extract::Dependency(Arc::new(|scope: &Scope| {
                scope.get_trait::<T>().map(|v| Box::new(v) as BoxAny)
            })),
        }
    }

    pub(crate) fn is_body(&self) -> bool {
        matches!(self.source, ParamSource::Body { .. })
    }
}

fn parse<T>(raw: &str) -> Result<T, TextFailure>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| TextFailure::Invalid(e.to_string()))
}

struct Slot {
    name: Arc<str>,
    type_name: &'static str,
    value: Option<BoxAny>,
}

/// Arguments bound for one handler invocation, in declaration order.
///
/// Request-sourced values are taken by parameter name (or position);
/// dependencies are read by type. Optional query parameters are bound as
/// `Option<T>`.
pub struct BoundArgs {
    slots: Vec<Slot>,
}

impl fmt::Debug for BoundArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| (&*s.name, s.value.is_some())))
            .finish()
    }
}

impl BoundArgs {
    /// Moves out the value bound to `name`.
    pub fn take<T: 'static>(&mut self, name: &str) -> Result<T, HandlerError> {
        let index = self
            .slots
            .iter()
            .position(|s| &*s.name == name)
            .ok_or_else(|| HandlerError::new(format!("no parameter named `{}`", name)))?;
        self.take_at(index)
    }

    /// Moves out the value bound at declaration position `index`.
    pub fn take_at<T: 'static>(&mut self, index: usize) -> Result<T, HandlerError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| HandlerError::new(format!("no parameter at position {}", index)))?;
        let value = slot.value.take().ok_or_else(|| {
            HandlerError::new(format!("parameter `{}` was already taken", slot.name))
        })?;
        match value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(original) => {
                let message = format!(
                    "parameter `{}` is bound as `{}`, not `{}`",
                    slot.name,
                    slot.type_name,
                    std::any::type_name::<T>()
                );
                slot.value = Some(original);
                Err(HandlerError::new(message))
            }
        }
    }

    /// Resolved dependency of type `T`.
    pub fn dependency<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, HandlerError> {
        self.shared::<Arc<T>>(std::any::type_name::<T>())
    }

    /// Resolved trait dependency.
    pub fn trait_dependency<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<T>, HandlerError> {
        self.shared::<Arc<T>>(std::any::type_name::<T>())
    }

    fn shared<A: Clone + 'static>(&self, name: &str) -> Result<A, HandlerError> {
        self.slots
            .iter()
            .find(|s| &*s.name == name)
            .and_then(|s| s.value.as_ref())
            .and_then(|v| v.downcast_ref::<A>())
            .cloned()
            .ok_or_else(|| HandlerError::new(format!("dependency `{}` was not declared", name)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Request pass: binds path, query and body parameters.
///
/// Dependency slots are left empty for [`resolve_dependencies`].
pub(crate) fn bind_request(
    params: &[ParamSpec],
    req: &Request,
    path: &PathParams,
    options: &DispatchOptions,
) -> Result<BoundArgs, BindingError> {
    let query: Vec<(Cow<'_, str>, Cow<'_, str>)> = req
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).collect())
        .unwrap_or_default();
    let query_value = |name: &str| {
        query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_ref())
    };

    let mut slots = Vec::with_capacity(params.len());
    for spec in params {
        let value = match (&spec.source, &spec.extract) {
            (ParamSource::Path, Extract::Text(convert)) => {
                Some(bind_text(spec, convert, path.get(&spec.name))?)
            }
            (ParamSource::Query { .. }, Extract::Text(convert)) => {
                Some(bind_text(spec, convert, query_value(&*spec.name))?)
            }
            (ParamSource::Body { .. }, Extract::Body(decode, accepts)) => {
                Some(bind_body(spec, decode, accepts, req, options)?)
            }
            _ => None,
        };
        slots.push(Slot {
            name: spec.name.clone(),
            type_name: spec.type_name,
            value,
        });
    }
    Ok(BoundArgs { slots })
}

fn bind_text(
    spec: &ParamSpec,
    convert: &TextExtract,
    raw: Option<&str>,
) -> Result<BoxAny, BindingError> {
    convert(raw).map_err(|failure| match failure {
        TextFailure::Missing => BindingError::new(&*spec.name, "required value is missing"),
        TextFailure::Invalid(reason) => {
            BindingError::new(&*spec.name, reason).with_raw(raw.unwrap_or_default())
        }
    })
}

fn bind_body(
    spec: &ParamSpec,
    decode: &BodyExtract,
    accepts: &AcceptsContentType,
    req: &Request,
    options: &DispatchOptions,
) -> Result<BoxAny, BindingError> {
    let body = req.body();
    if body.is_empty() {
        return Err(BindingError::new(&*spec.name, "request body is empty"));
    }
    if body.len() > options.max_body_bytes {
        return Err(BindingError::new(
            &*spec.name,
            format!("payload exceeds {} bytes", options.max_body_bytes),
        ));
    }
    if let Some(header) = req.headers().get(CONTENT_TYPE) {
        let header = header.to_str().unwrap_or_default();
        if !accepts(header) {
            return Err(BindingError::new(
                &*spec.name,
                format!("unsupported content type `{}`", header),
            ));
        }
    }
    decode(&body[..]).map_err(|e| BindingError::new(&*spec.name, e.0))
}

/// Resolving pass: fills dependency slots from the request scope.
pub(crate) fn resolve_dependencies(
    params: &[ParamSpec],
    args: &mut BoundArgs,
    scope: &Scope,
) -> DiResult<()> {
    for (spec, slot) in params.iter().zip(args.slots.iter_mut()) {
        if let Extract::Dependency(resolve) = &spec.extract {
            slot.value = Some(resolve(scope)?);
        }
    }
    Ok(())
}
