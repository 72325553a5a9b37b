//! # ferrous-web
//!
//! Typed HTTP routing, request binding and middleware dispatch on top of a
//! scoped dependency injection container.
//!
//! ## Features
//!
//! - **Route table**: `{name}` parameters and `{*rest}` wildcards, with
//!   deterministic literal > parameter > wildcard precedence
//! - **Typed binding**: path, query and body values converted into handler
//!   arguments, with 400 responses that name the failing parameter
//! - **Scoped container**: singleton, scoped and transient lifetimes, cycle
//!   detection with the full resolution chain, deterministic release
//! - **Pipeline**: async middleware stages wrapped around every handler
//! - **Dispatcher**: one request scope per request, released exactly once on
//!   every exit path, including cancellation
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_web::{App, HandlerDescriptor, Json, Request, RequestIdStage};
//! use http::{Method, StatusCode};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct Greeter { greeting: String }
//! struct VisitCounter(AtomicU64);
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = App::new();
//! app.services(|services| {
//!     services.add_singleton(Greeter { greeting: "hello".to_string() });
//!     services.add_scoped_factory::<VisitCounter, _>(|_| Ok(VisitCounter(AtomicU64::new(0))));
//! })?;
//! app.use_stage(RequestIdStage::new())?;
//! app.get(
//!     "/hello/{name}",
//!     HandlerDescriptor::builder()
//!         .path::<String>("name")
//!         .inject::<Greeter>()
//!         .inject::<VisitCounter>()
//!         .handle(|mut args| async move {
//!             let name: String = args.take("name")?;
//!             let greeter = args.dependency::<Greeter>()?;
//!             let visits = args.dependency::<VisitCounter>()?;
//!             visits.0.fetch_add(1, Ordering::Relaxed);
//!             Ok(Json(format!("{}, {}", greeter.greeting, name)))
//!         })?,
//! )?;
//!
//! let dispatcher = app.seal().await?;
//! let res = dispatcher.dispatch(Request::new(Method::GET, "/hello/ada")).await;
//! assert_eq!(res.status, StatusCode::OK);
//! assert_eq!(res.body_text(), "\"hello, ada\"");
//! assert!(res.headers.contains_key("x-request-id"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: created once and shared by every request
//! - **Scoped**: created once per request scope, released when it ends
//! - **Transient**: created fresh on every resolution
//!
//! ## Trait Resolution
//!
//! ```rust
//! use ferrous_web::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 1_700_000_000 }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton_trait::<dyn Clock>(Arc::new(FixedClock));
//!
//! let provider = services.build();
//! let clock = provider.get_trait::<dyn Clock>().unwrap();
//! assert_eq!(clock.now(), 1_700_000_000);
//! ```
//!
//! ## Errors
//!
//! Registration problems surface as [`RegistrationError`] and abort startup.
//! Per-request failures are [`DispatchError`]s and are mapped to responses:
//! 404 and 405 for matching, 400 for binding, 500 for dependency failures and
//! unstructured handler errors.

pub mod app;
pub mod binding;
pub mod cancellation;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod http;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod pipeline;
pub mod provider;
pub mod routing;
pub mod traits;

#[cfg(feature = "tower")]
mod tower_integration;

// Internal modules
mod internal;
mod prewarm;
mod registration;

pub use app::{App, AppModule};
pub use binding::codec::{Codec, CodecError, JsonCodec};
pub use binding::{BoundArgs, ParamSource, ParamSpec};
pub use cancellation::CancellationToken;
pub use collection::ServiceCollection;
pub use config::DispatchOptions;
pub use descriptors::ServiceDescriptor;
pub use dispatcher::{DispatchPhase, Dispatcher, RequestContext};
pub use error::{
    BindingError, DiError, DiResult, DispatchError, HandlerError, PipelineStageError,
    RegistrationError, RouteError,
};
pub use handler::{BoxFuture, HandlerBuilder, HandlerDescriptor};
pub use crate::http::{IntoResponse, Json, Request, Response};
pub use key::{key_of_trait, key_of_type, Key};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use pipeline::{stage_fn, Endpoint, Next, Pipeline, RequestId, RequestIdStage, Stage, TracingStage};
pub use provider::{ResolverContext, Scope, ServiceProvider};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
