/// Middleware stages wrapped around real handlers.
use async_trait::async_trait;
use ferrous_web::{
    stage_fn, App, DispatchError, Dispatcher, HandlerDescriptor, HandlerError, Next,
    PipelineStageError, Request, RequestId, RequestIdStage, Resolver, Response, Stage,
    TracingStage,
};
use http::header::HeaderName;
use http::{HeaderValue, Method, StatusCode};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Recording {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl Stage for Recording {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        self.log.lock().unwrap().push(format!("{}:in", self.name));
        let res = next.run(req).await;
        self.log.lock().unwrap().push(format!("{}:out", self.name));
        res
    }
}

struct RequireKey;

#[async_trait]
impl Stage for RequireKey {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        match req.headers().get("x-api-key") {
            Some(key) if key == "secret" => next.run(req).await,
            Some(_) => Err(PipelineStageError::new("require-key", "bad key")
                .tagged(StatusCode::UNAUTHORIZED)
                .into()),
            None => Ok(Response::text(StatusCode::UNAUTHORIZED, "key required")),
        }
    }
}

async fn app_with(log: &Log, extra: impl FnOnce(&mut App)) -> Dispatcher {
    let mut app = App::new();
    app.use_stage(Recording {
        name: "outer",
        log: log.clone(),
    })
    .unwrap();
    extra(&mut app);
    app.use_stage(Recording {
        name: "inner",
        log: log.clone(),
    })
    .unwrap();

    let l = log.clone();
    app.get(
        "/work",
        HandlerDescriptor::builder()
            .handle(move |_args| {
                let l = l.clone();
                async move {
                    l.lock().unwrap().push("handler".into());
                    Ok("done")
                }
            })
            .unwrap(),
    )
    .unwrap();
    app.get(
        "/fail",
        HandlerDescriptor::builder()
            .handle(|_args| async { Err::<(), _>(HandlerError::new("exploded")) })
            .unwrap(),
    )
    .unwrap();
    app.seal().await.unwrap()
}

#[tokio::test]
async fn stages_wrap_handler_in_onion_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = app_with(&log, |_| {}).await;

    let res = dispatcher.dispatch(Request::new(Method::GET, "/work")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["outer:in", "inner:in", "handler", "inner:out", "outer:out"]
    );
    assert_eq!(dispatcher.pipeline().names(), vec!["outer", "inner"]);
}

#[tokio::test]
async fn short_circuit_skips_inner_stages_and_handler() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = app_with(&log, |app| {
        app.use_stage(RequireKey).unwrap();
    })
    .await;

    let res = dispatcher.dispatch(Request::new(Method::GET, "/work")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body_text(), "key required");
    assert_eq!(*log.lock().unwrap(), vec!["outer:in", "outer:out"]);
}

#[tokio::test]
async fn tagged_stage_error_keeps_its_status() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = app_with(&log, |app| {
        app.use_stage(RequireKey).unwrap();
    })
    .await;

    let req = Request::new(Method::GET, "/work")
        .with_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("wrong"));
    let res = dispatcher.dispatch(req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body_text().contains("pipeline_stage"));
}

#[tokio::test]
async fn untagged_stage_error_is_500() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = app_with(&log, |app| {
        app.use_stage(stage_fn("broken", |_req, _next| {
            Box::pin(async { Err(PipelineStageError::new("broken", "no backend").into()) })
        }))
        .unwrap();
    })
    .await;

    let res = dispatcher.dispatch(Request::new(Method::GET, "/work")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!res.body_text().contains("no backend"));
}

#[tokio::test]
async fn stages_observe_handler_errors() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let seen: Arc<Mutex<Option<StatusCode>>> = Arc::new(Mutex::new(None));
    let s = seen.clone();
    let dispatcher = app_with(&log, move |app| {
        let s = s.clone();
        app.use_stage(stage_fn("observer", move |req, next| {
            let s = s.clone();
            Box::pin(async move {
                let result = next.run(req).await;
                if let Err(e) = &result {
                    *s.lock().unwrap() = Some(e.status());
                }
                result
            })
        }))
        .unwrap();
    })
    .await;

    let res = dispatcher.dispatch(Request::new(Method::GET, "/fail")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(*seen.lock().unwrap(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(!log.lock().unwrap().contains(&"handler".to_string()));
}

#[tokio::test]
async fn request_id_is_generated_propagated_and_injectable() {
    init_tracing();
    let mut app = App::new();
    app.use_stage(RequestIdStage::new())
        .unwrap()
        .use_stage(TracingStage::new())
        .unwrap()
        .use_stage(stage_fn("scope-reader", |req, next| {
            Box::pin(async move {
                let id = next.scope().get::<RequestId>()?;
                let mut res = next.run(req).await?;
                res.headers.insert(
                    HeaderName::from_static("x-seen-by-stage"),
                    HeaderValue::from_str(id.as_str()).unwrap(),
                );
                Ok(res)
            })
        }))
        .unwrap();
    app.get(
        "/id",
        HandlerDescriptor::builder()
            .inject::<RequestId>()
            .handle(|args| async move { Ok(args.dependency::<RequestId>()?.to_string()) })
            .unwrap(),
    )
    .unwrap();
    let dispatcher = app.seal().await.unwrap();

    let res = dispatcher.dispatch(Request::new(Method::GET, "/id")).await;
    let header = res.headers["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(header.len(), 36);
    assert_eq!(res.body_text(), header);
    assert_eq!(res.headers["x-seen-by-stage"], header.as_str());

    let req = Request::new(Method::GET, "/id").with_header(
        HeaderName::from_static("x-request-id"),
        HeaderValue::from_static("client-42"),
    );
    let res = dispatcher.dispatch(req).await;
    assert_eq!(res.headers["x-request-id"], "client-42");
    assert_eq!(res.body_text(), "client-42");
}

#[tokio::test]
async fn request_id_is_echoed_on_errors() {
    let mut app = App::new();
    app.use_stage(RequestIdStage::new()).unwrap();
    app.get(
        "/boom",
        HandlerDescriptor::builder()
            .handle(|_args| async {
                Err::<(), _>(HandlerError::with_status(StatusCode::CONFLICT, "already exists"))
            })
            .unwrap(),
    )
    .unwrap();
    let dispatcher = app.seal().await.unwrap();

    let req = Request::new(Method::GET, "/boom").with_header(
        HeaderName::from_static("x-request-id"),
        HeaderValue::from_static("trace-me"),
    );
    let res = dispatcher.dispatch(req).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.headers["x-request-id"], "trace-me");
    assert!(res.body_text().contains("already exists"));
}
