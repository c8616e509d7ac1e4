use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Buf;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body::{Body, Frame, SizeHint};
use prometheus::HistogramVec;
use tower::{Layer, Service};

use crate::metrics::Curried;

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Approximate size of a request on the wire: request line, headers and
/// the announced body length. The body itself is never read.
pub fn approximate_request_size<B: Body>(req: &Request<B>) -> u64 {
    let mut size = req.uri().to_string().len() as u64;
    size += req.method().as_str().len() as u64;
    size += format!("{:?}", req.version()).len() as u64;
    for (name, value) in req.headers() {
        size += (name.as_str().len() + value.len()) as u64;
    }
    size += content_length(req.headers())
        .or_else(|| req.body().size_hint().exact())
        .unwrap_or(0);
    size
}

/// Layer that observes the approximate request size in bytes.
#[derive(Clone)]
pub struct RequestSizeLayer {
    observer: Curried<HistogramVec>,
}

impl RequestSizeLayer {
    pub fn new(observer: Curried<HistogramVec>) -> Self {
        Self { observer }
    }
}

impl<S> Layer<S> for RequestSizeLayer {
    type Service = RequestSize<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestSize {
            inner,
            observer: self.observer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequestSize<S> {
    inner: S,
    observer: Curried<HistogramVec>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestSize<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Body + Send + 'static,
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
        let size = approximate_request_size(&req);

        Box::pin(async move {
            let response = inner.call(req).await?;
            observer.observe(response.status().as_str(), method.as_str(), size as f64);
            Ok(response)
        })
    }
}

/// Layer that observes the number of response body bytes sent.
///
/// The response body is wrapped in a [`SizedBody`] that adds up data frames
/// as they are polled. A body with an exact size hint is observed as soon as
/// the response is produced. Anything else is observed once the stream ends
/// or the body is dropped, so an aborted download counts what was sent.
///
/// Without an observer the body is only wrapped, which keeps the response
/// type of a handler the same whether or not response sizes are measured.
#[derive(Clone)]
pub struct ResponseSizeLayer {
    observer: Option<Curried<HistogramVec>>,
}

impl ResponseSizeLayer {
    pub fn new(observer: Option<Curried<HistogramVec>>) -> Self {
        Self { observer }
    }
}

impl<S> Layer<S> for ResponseSizeLayer {
    type Service = ResponseSize<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseSize {
            inner,
            observer: self.observer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ResponseSize<S> {
    inner: S,
    observer: Option<Curried<HistogramVec>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ResponseSize<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Body + Send + 'static,
{
    type Response = Response<SizedBody<ResBody>>;
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

        Box::pin(async move {
            let response = inner.call(req).await?;
            let pending = observer.map(|observer| PendingObservation {
                observer,
                code: response.status(),
                method,
                bytes: 0,
            });
            Ok(response.map(|body| SizedBody::new(body, pending)))
        })
    }
}

struct PendingObservation {
    observer: Curried<HistogramVec>,
    code: StatusCode,
    method: Method,
    bytes: u64,
}

impl PendingObservation {
    fn observe(self) {
        self.observer
            .observe(self.code.as_str(), self.method.as_str(), self.bytes as f64);
    }
}

/// Response body that counts the data bytes passing through it.
pub struct SizedBody<B> {
    inner: Pin<Box<B>>,
    pending: Option<PendingObservation>,
}

impl<B: Body> SizedBody<B> {
    fn new(inner: B, mut pending: Option<PendingObservation>) -> Self {
        if let Some(exact) = inner.size_hint().exact() {
            if let Some(mut observation) = pending.take() {
                observation.bytes = exact;
                observation.observe();
            }
        }
        Self {
            inner: Box::pin(inner),
            pending,
        }
    }
}

impl<B> SizedBody<B> {
    fn finish(&mut self) {
        if let Some(observation) = self.pending.take() {
            observation.observe();
        }
    }
}

impl<B: Body> Body for SizedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = this.inner.as_mut().poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(data), Some(observation)) = (frame.data_ref(), this.pending.as_mut())
                {
                    observation.bytes += data.remaining() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for SizedBody<B> {
    fn drop(&mut self) {
        self.finish();
    }
}
