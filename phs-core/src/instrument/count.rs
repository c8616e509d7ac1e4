use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{Request, Response};
use prometheus::IntCounterVec;
use tower::{Layer, Service};

use crate::metrics::Curried;

/// Layer that counts completed requests by status code and method.
#[derive(Clone)]
pub struct CountLayer {
    counter: Curried<IntCounterVec>,
}

impl CountLayer {
    pub fn new(counter: Curried<IntCounterVec>) -> Self {
        Self { counter }
    }
}

impl<S> Layer<S> for CountLayer {
    type Service = Count<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Count {
            inner,
            counter: self.counter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Count<S> {
    inner: S,
    counter: Curried<IntCounterVec>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for Count<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let counter = self.counter.clone();
        let method = req.method().clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            counter.inc(response.status().as_str(), method.as_str());
            Ok(response)
        })
    }
}
