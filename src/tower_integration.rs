//! `tower::Service` adapter, so a [`Dispatcher`] can sit behind any
//! tower-compatible server.

use std::convert::Infallible;
use std::task::{Context, Poll};

use bytes::Bytes;

use crate::dispatcher::Dispatcher;
use crate::handler::BoxFuture;
use crate::http::Request;

impl tower::Service<http::Request<Bytes>> for Dispatcher {
    type Response = http::Response<Bytes>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Bytes>) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move {
            let res = dispatcher.dispatch(Request::from(req)).await;
            Ok(res.into_http())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{App, HandlerDescriptor};
    use bytes::Bytes;
    use http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_http_requests() {
        let mut app = App::new();
        app.get(
            "/ping",
            HandlerDescriptor::builder()
                .handle(|_args| async { Ok("pong") })
                .unwrap(),
        )
        .unwrap();
        let dispatcher = app.seal().await.unwrap();

        let req = http::Request::get("/ping").body(Bytes::new()).unwrap();
        let res = dispatcher.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), &Bytes::from_static(b"pong"));

        let req = http::Request::post("/ping").body(Bytes::new()).unwrap();
        let res = dispatcher.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()["allow"], "GET");
    }
}
