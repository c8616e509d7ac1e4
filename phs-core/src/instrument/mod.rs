//! Tower layers that observe requests into [`ServerMetrics`].
//!
//! [`wrap`] stacks one layer per configured instrument around a handler,
//! outermost first: in-flight, count, duration histogram, duration summary,
//! request size, response size. Exit-side observations therefore happen
//! innermost first, after the handler has produced its response. Response
//! sizes of streamed bodies are the exception: they are observed when the
//! body has been sent.

mod count;
mod duration;
mod in_flight;
mod size;

use prometheus::HistogramVec;
use tower::util::Either;
use tower::ServiceBuilder;
use tracing::debug;

use crate::metrics::{Curried, ServerMetrics, SummaryVec};

pub use count::{Count, CountLayer};
pub use duration::{DurationLayer, ObserveDuration};
pub use in_flight::{InFlight, InFlightLayer};
pub use size::{
    approximate_request_size, RequestSize, RequestSizeLayer, ResponseSize, ResponseSizeLayer,
    SizedBody,
};

type WithRequestSize<S> = Either<RequestSize<S>, S>;
type WithPercentiles<S> = Either<ObserveDuration<S, SummaryVec>, S>;
type WithHistogram<S> = Either<ObserveDuration<S, HistogramVec>, S>;

/// A handler wrapped by [`wrap`].
///
/// The response size layer is always present because it changes the body
/// type; it only counts bytes when response sizes are configured.
pub type Instrumented<S> =
    InFlight<Count<WithHistogram<WithPercentiles<WithRequestSize<ResponseSize<S>>>>>>;

/// Wrap `handler` with every instrument present in `metrics`, labeling all
/// observations with `handler_name`.
///
/// Wrapping several handlers (or the same one twice) against the same
/// metrics is fine; observations with equal labels land in the same series.
pub fn wrap<S>(handler: S, handler_name: &str, metrics: &ServerMetrics) -> Instrumented<S> {
    debug!(
        handler = handler_name,
        duration = metrics.request_duration.is_some(),
        percentiles = metrics.request_duration_percentiles.is_some(),
        request_size = metrics.request_size.is_some(),
        response_size = metrics.response_size.is_some(),
        "Instrumenting handler"
    );

    ServiceBuilder::new()
        .layer(InFlightLayer::new(metrics.requests_inflight.clone()))
        .layer(CountLayer::new(Curried::new(
            metrics.requests_total.clone(),
            [handler_name],
        )))
        .option_layer(
            metrics
                .request_duration
                .clone()
                .map(|vec| DurationLayer::new(Curried::new(vec, [handler_name]))),
        )
        .option_layer(
            metrics
                .request_duration_percentiles
                .clone()
                .map(|vec| DurationLayer::new(Curried::new(vec, [handler_name]))),
        )
        .option_layer(
            metrics
                .request_size
                .clone()
                .map(|vec| RequestSizeLayer::new(Curried::new(vec, [handler_name]))),
        )
        .layer(ResponseSizeLayer::new(
            metrics
                .response_size
                .clone()
                .map(|vec| Curried::new(vec, [handler_name])),
        ))
        .service(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_buckets;
    use crate::metrics::ServerMetricsConfig;
    use bytes::Bytes;
    use futures_util::future::join_all;
    use futures_util::{stream, StreamExt};
    use http::{Request, Response, StatusCode};
    use http_body::Frame;
    use http_body_util::{BodyExt, StreamBody};
    use prometheus::Registry;
    use std::convert::Infallible;
    use tower::ServiceExt;

    async fn ok(_req: Request<String>) -> Result<Response<String>, Infallible> {
        Ok(Response::new(String::from("ok")))
    }

    async fn teapot(_req: Request<String>) -> Result<Response<String>, Infallible> {
        let mut response = Response::new(String::new());
        *response.status_mut() = StatusCode::IM_A_TEAPOT;
        Ok(response)
    }

    fn metrics(config: &ServerMetricsConfig) -> (Registry, ServerMetrics) {
        let registry = Registry::new();
        let metrics = ServerMetrics::register(config, &registry).unwrap();
        (registry, metrics)
    }

    fn family_names(registry: &Registry) -> Vec<String> {
        registry
            .gather()
            .iter()
            .map(|mf| mf.get_name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_minimal_chain_counts_only() {
        let (registry, metrics) = metrics(&ServerMetricsConfig::default());
        let service = wrap(tower::service_fn(ok), "p1", &metrics);

        service.oneshot(Request::new(String::new())).await.unwrap();

        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["200", "GET", "p1"])
                .get(),
            1
        );
        assert_eq!(metrics.requests_inflight.get(), 0);
        assert_eq!(
            family_names(&registry),
            vec![
                "http_server_requests_inflight".to_string(),
                "http_server_requests_total".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_full_chain_observes_everything() {
        let (_registry, metrics) = metrics(&ServerMetricsConfig::with_defaults());
        let service = wrap(tower::service_fn(teapot), "p1", &metrics);

        service.oneshot(Request::new(String::new())).await.unwrap();

        let labels = ["418", "GET", "p1"];
        assert_eq!(metrics.requests_total.with_label_values(&labels).get(), 1);
        for vec in [
            metrics.request_duration.as_ref(),
            metrics.request_size.as_ref(),
            metrics.response_size.as_ref(),
        ] {
            assert_eq!(vec.unwrap().with_label_values(&labels).get_sample_count(), 1);
        }
        let summary = metrics
            .request_duration_percentiles
            .as_ref()
            .unwrap()
            .get_metric_with_label_values(&labels)
            .unwrap();
        assert_eq!(summary.get_sample_count(), 1);
    }

    #[tokio::test]
    async fn test_only_configured_layers_observe() {
        let config = ServerMetricsConfig {
            response_size_buckets: Some(parse_buckets("1;10;100").unwrap()),
            ..Default::default()
        };
        let (registry, metrics) = metrics(&config);
        let service = wrap(tower::service_fn(ok), "p1", &metrics);

        service.oneshot(Request::new(String::new())).await.unwrap();

        let names = family_names(&registry);
        assert!(names.contains(&"http_server_response_size".to_string()));
        assert!(!names.contains(&"http_server_request_duration".to_string()));
        assert!(!names.contains(&"http_server_request_size".to_string()));
        let histogram = metrics
            .response_size
            .unwrap()
            .with_label_values(&["200", "GET", "p1"]);
        assert_eq!(histogram.get_sample_sum(), 2.0);
    }

    #[tokio::test]
    async fn test_streamed_response_size_is_observed() {
        let config = ServerMetricsConfig {
            response_size_buckets: Some(parse_buckets("100;1000").unwrap()),
            ..Default::default()
        };
        let (_registry, metrics) = metrics(&config);
        let handler = tower::service_fn(|_req: Request<String>| async {
            let chunks = [Bytes::from(vec![b'x'; 100]), Bytes::from(vec![b'y'; 100])];
            let frames = stream::iter(chunks).map(|data| Ok::<_, Infallible>(Frame::data(data)));
            Ok::<_, Infallible>(Response::new(StreamBody::new(frames)))
        });
        let service = wrap(handler, "p1", &metrics);

        let response = service.oneshot(Request::new(String::new())).await.unwrap();
        let sent = response.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(sent.len(), 200);
        let histogram = metrics
            .response_size
            .unwrap()
            .with_label_values(&["200", "GET", "p1"]);
        assert_eq!(histogram.get_sample_count(), 1);
        assert_eq!(histogram.get_sample_sum(), 200.0);
    }

    #[tokio::test]
    async fn test_two_chains_share_series() {
        let (_registry, metrics) = metrics(&ServerMetricsConfig::with_defaults());
        let first = wrap(tower::service_fn(ok), "p1", &metrics);
        let second = wrap(tower::service_fn(ok), "p1", &metrics);

        first.oneshot(Request::new(String::new())).await.unwrap();
        second.oneshot(Request::new(String::new())).await.unwrap();

        let labels = ["200", "GET", "p1"];
        assert_eq!(metrics.requests_total.with_label_values(&labels).get(), 2);
        assert_eq!(
            metrics
                .request_duration
                .unwrap()
                .with_label_values(&labels)
                .get_sample_count(),
            2
        );
    }

    #[tokio::test]
    async fn test_handler_names_are_kept_apart() {
        let (_registry, metrics) = metrics(&ServerMetricsConfig::default());
        wrap(tower::service_fn(ok), "cheap", &metrics)
            .oneshot(Request::new(String::new()))
            .await
            .unwrap();
        wrap(tower::service_fn(ok), "expensive", &metrics)
            .oneshot(Request::new(String::new()))
            .await
            .unwrap();

        for handler in ["cheap", "expensive"] {
            assert_eq!(
                metrics
                    .requests_total
                    .with_label_values(&["200", "GET", handler])
                    .get(),
                1
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_all_counted() {
        const REQUESTS: u64 = 200;
        let (_registry, metrics) = metrics(&ServerMetricsConfig::with_defaults());
        let service = wrap(tower::service_fn(ok), "p1", &metrics);

        let handles = (0..REQUESTS).map(|_| {
            let service = service.clone();
            tokio::spawn(service.oneshot(Request::new(String::new())))
        });
        for result in join_all(handles).await {
            result.unwrap().unwrap();
        }

        let labels = ["200", "GET", "p1"];
        assert_eq!(metrics.requests_total.with_label_values(&labels).get(), REQUESTS);
        assert_eq!(metrics.requests_inflight.get(), 0);
        assert_eq!(
            metrics
                .request_duration_percentiles
                .unwrap()
                .get_metric_with_label_values(&labels)
                .unwrap()
                .get_sample_count(),
            REQUESTS
        );
    }
}
