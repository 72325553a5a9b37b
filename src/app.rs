//! Composition root.
//!
//! [`App`] collects services, routes and pipeline stages at startup, then
//! [`seal`](App::seal)s them into a [`Dispatcher`]. Everything registered
//! after sealing is rejected.

use std::fmt;
use std::mem;
use std::sync::Arc;

use http::Method;

use crate::collection::ServiceCollection;
use crate::config::DispatchOptions;
use crate::dispatcher::Dispatcher;
use crate::error::RegistrationError;
use crate::handler::HandlerDescriptor;
use crate::pipeline::{Pipeline, Stage};
use crate::routing::{PathPattern, RouteTable};

/// A reusable group of registrations.
///
/// # Example
///
/// ```rust
/// use ferrous_web::{App, AppModule, HandlerDescriptor, RegistrationError};
///
/// struct Greeting(&'static str);
///
/// struct GreetingModule;
///
/// impl AppModule for GreetingModule {
///     fn register(self, app: &mut App) -> Result<(), RegistrationError> {
///         app.services(|s| {
///             s.add_singleton(Greeting("hello"));
///         })?;
///         app.get(
///             "/greet",
///             HandlerDescriptor::builder()
///                 .inject::<Greeting>()
///                 .handle(|args| async move { Ok(args.dependency::<Greeting>()?.0) })?,
///         )?;
///         Ok(())
///     }
/// }
///
/// let mut app = App::new();
/// app.add_module(GreetingModule).unwrap();
/// assert_eq!(app.route_count(), 1);
/// ```
pub trait AppModule {
    fn register(self, app: &mut App) -> Result<(), RegistrationError>;
}

/// Builder for a [`Dispatcher`].
///
/// # Examples
///
/// ```
/// use ferrous_web::{App, HandlerDescriptor, Json, Request, TracingStage};
/// use http::{Method, StatusCode};
///
/// struct Catalog { currency: &'static str }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut app = App::new();
/// app.services(|s| {
///     s.add_singleton(Catalog { currency: "EUR" });
/// })?
/// .use_stage(TracingStage::new())?
/// .get(
///     "/products/{id}",
///     HandlerDescriptor::builder()
///         .path::<u64>("id")
///         .inject::<Catalog>()
///         .handle(|mut args| async move {
///             let id: u64 = args.take("id")?;
///             let catalog = args.dependency::<Catalog>()?;
///             Ok(Json(serde_json::json!({ "id": id, "currency": catalog.currency })))
///         })?,
/// )?;
///
/// let dispatcher = app.seal().await?;
/// let res = dispatcher.dispatch(Request::new(Method::GET, "/products/42")).await;
/// assert_eq!(res.status, StatusCode::OK);
/// assert_eq!(res.body_text(), r#"{"currency":"EUR","id":42}"#);
///
/// let res = dispatcher.dispatch(Request::new(Method::GET, "/products/abc")).await;
/// assert_eq!(res.status, StatusCode::BAD_REQUEST);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct App {
    services: ServiceCollection,
    routes: RouteTable<HandlerDescriptor>,
    pipeline: Pipeline,
    options: DispatchOptions,
    sealed: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self, what: &'static str) -> Result<(), RegistrationError> {
        if self.sealed {
            return Err(RegistrationError::LateRegistration { what });
        }
        Ok(())
    }

    /// Replaces the dispatch options after validating them.
    pub fn configure(&mut self, options: DispatchOptions) -> Result<&mut Self, RegistrationError> {
        self.guard("configure the app")?;
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Registers services through `f`.
    pub fn services<F>(&mut self, f: F) -> Result<&mut Self, RegistrationError>
    where
        F: FnOnce(&mut ServiceCollection),
    {
        self.guard("register a dependency")?;
        f(&mut self.services);
        Ok(self)
    }

    /// Registers a route.
    ///
    /// Fails on an invalid pattern, on a path parameter the pattern does not
    /// declare, and on a duplicate (method, pattern) pair.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        descriptor: HandlerDescriptor,
    ) -> Result<&mut Self, RegistrationError> {
        self.guard("register a route")?;
        let pattern = PathPattern::parse(pattern)?;
        descriptor.check_against(&pattern)?;
        self.routes.insert(method, pattern, descriptor)?;
        Ok(self)
    }

    pub fn get(
        &mut self,
        pattern: &str,
        descriptor: HandlerDescriptor,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::GET, pattern, descriptor)
    }

    pub fn post(
        &mut self,
        pattern: &str,
        descriptor: HandlerDescriptor,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::POST, pattern, descriptor)
    }

    pub fn put(
        &mut self,
        pattern: &str,
        descriptor: HandlerDescriptor,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::PUT, pattern, descriptor)
    }

    pub fn patch(
        &mut self,
        pattern: &str,
        descriptor: HandlerDescriptor,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::PATCH, pattern, descriptor)
    }

    pub fn delete(
        &mut self,
        pattern: &str,
        descriptor: HandlerDescriptor,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::DELETE, pattern, descriptor)
    }

    /// Appends a pipeline stage.
    pub fn use_stage<S: Stage>(&mut self, stage: S) -> Result<&mut Self, RegistrationError> {
        self.guard("add a pipeline stage")?;
        self.pipeline.push(stage);
        Ok(self)
    }

    pub fn add_module<M: AppModule>(&mut self, module: M) -> Result<&mut Self, RegistrationError> {
        self.guard("add a module")?;
        module.register(self)?;
        Ok(self)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Freezes the app into a [`Dispatcher`].
    ///
    /// Registers the [`DispatchOptions`] as a singleton and resolves every
    /// prewarmed capability; a failure there aborts startup. The app is
    /// sealed even if this fails.
    pub async fn seal(&mut self) -> Result<Dispatcher, RegistrationError> {
        self.guard("seal the app")?;
        self.sealed = true;

        let options = Arc::new(mem::take(&mut self.options));
        let mut services = mem::take(&mut self.services);
        services.add_singleton((*options).clone());

        let routes = mem::take(&mut self.routes);
        let pipeline = mem::take(&mut self.pipeline);
        let provider = services.build_ready().await.map_err(|e| {
            tracing::error!(error = %e, chain = %e.chain().join(" -> "), "startup resolution failed");
            RegistrationError::from(e)
        })?;

        tracing::info!(
            routes = routes.len(),
            stages = pipeline.len(),
            services = provider.len(),
            "dispatcher sealed"
        );
        Ok(Dispatcher::new(routes, pipeline, provider, options))
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("services", &self.services.len())
            .field("routes", &self.routes.len())
            .field("pipeline", &self.pipeline)
            .field("options", &self.options)
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiError;
    use crate::traits::Resolver;

    fn noop() -> HandlerDescriptor {
        HandlerDescriptor::builder()
            .handle(|_args| async { Ok(()) })
            .unwrap()
    }

    #[tokio::test]
    async fn registration_after_seal_is_rejected() {
        let mut app = App::new();
        app.get("/", noop()).unwrap();
        app.seal().await.unwrap();

        assert_eq!(
            app.get("/late", noop()).unwrap_err(),
            RegistrationError::LateRegistration {
                what: "register a route"
            }
        );
        assert!(matches!(
            app.services(|_| {}),
            Err(RegistrationError::LateRegistration { .. })
        ));
        assert!(matches!(
            app.seal().await,
            Err(RegistrationError::LateRegistration { .. })
        ));
    }

    #[test]
    fn unknown_path_parameter_fails_registration() {
        let descriptor = HandlerDescriptor::builder()
            .path::<u32>("id")
            .handle(|_args| async { Ok(()) })
            .unwrap();
        let mut app = App::new();
        assert!(matches!(
            app.get("/users/{user_id}", descriptor),
            Err(RegistrationError::UnknownPathParameter { .. })
        ));
        assert_eq!(app.route_count(), 0);
    }

    #[test]
    fn invalid_options_rejected() {
        let mut app = App::new();
        let options = DispatchOptions {
            max_body_bytes: 0,
            ..DispatchOptions::default()
        };
        assert!(matches!(
            app.configure(options),
            Err(RegistrationError::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn prewarm_failure_aborts_seal() {
        struct NeedsDb;
        struct Db;

        let mut app = App::new();
        app.services(|s| {
            s.add_singleton_factory::<NeedsDb, _>(|r| {
                r.get::<Db>()?;
                Ok(NeedsDb)
            });
            s.prewarm::<NeedsDb>();
        })
        .unwrap();

        match app.seal().await {
            Err(RegistrationError::Prewarm(DiError::NotFound { chain, .. })) => {
                assert_eq!(chain.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
