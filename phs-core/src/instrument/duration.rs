use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Request, Response};
use tower::{Layer, Service};

use crate::metrics::{Curried, ObserverVec};

/// Layer that observes request latency in seconds.
///
/// Works with any [`ObserverVec`]; the server chain uses it once for the
/// histogram and once for the summary.
#[derive(Clone)]
pub struct DurationLayer<V> {
    observer: Curried<V>,
}

impl<V> DurationLayer<V> {
    pub fn new(observer: Curried<V>) -> Self {
        Self { observer }
    }
}

impl<S, V: Clone> Layer<S> for DurationLayer<V> {
    type Service = ObserveDuration<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        ObserveDuration {
            inner,
            observer: self.observer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ObserveDuration<S, V> {
    inner: S,
    observer: Curried<V>,
}

impl<S, V, ReqBody, ResBody> Service<Request<ReqBody>> for ObserveDuration<S, V>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    V: ObserverVec,
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
        let observer = self.observer.clone();
        let method = req.method().clone();
        let start = Instant::now();

        Box::pin(async move {
            let response = inner.call(req).await?;
            observer.observe(
                response.status().as_str(),
                method.as_str(),
                start.elapsed().as_secs_f64(),
            );
            Ok(response)
        })
    }
}
