use prometheus::{HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;

use super::error::RegistrationError;
use super::summary::SummaryVec;
use super::{Registration, NAMESPACE, SERVER_LABELS, SERVER_SUBSYSTEM};
use crate::config::{BucketConfig, PercentileConfig};

const DEFAULT_DURATION_BUCKETS: [f64; 11] = [
    1e-3, 2e-3, 4e-3, 8e-3, 16e-3, 32e-3, 64e-3, 128e-3, 256e-3, 512e-3, 1024e-3,
];

const DEFAULT_SIZE_BUCKETS: [f64; 7] = [
    256.0,
    512.0,
    1024.0,
    2048.0,
    4096.0,
    1024.0 * 1024.0,
    10.0 * 1024.0 * 1024.0,
];

/// Which optional server metrics exist, and their buckets/objectives.
///
/// `None` (or an empty config) disables the metric.
#[derive(Debug, Clone, Default)]
pub struct ServerMetricsConfig {
    pub request_duration_buckets: Option<BucketConfig>,
    pub request_duration_percentiles: Option<PercentileConfig>,
    pub request_size_buckets: Option<BucketConfig>,
    pub response_size_buckets: Option<BucketConfig>,
}

impl ServerMetricsConfig {
    /// Every metric enabled with the stock buckets and objectives.
    pub fn with_defaults() -> Self {
        Self {
            request_duration_buckets: Some(BucketConfig::from_static(&DEFAULT_DURATION_BUCKETS)),
            request_duration_percentiles: Some(super::default_percentiles()),
            request_size_buckets: Some(BucketConfig::from_static(&DEFAULT_SIZE_BUCKETS)),
            response_size_buckets: Some(BucketConfig::from_static(&DEFAULT_SIZE_BUCKETS)),
        }
    }
}

/// Server side request instruments.
///
/// The in-flight gauge and the request counter always exist; the others only
/// when configured.
#[derive(Clone)]
pub struct ServerMetrics {
    pub requests_inflight: IntGauge,
    pub requests_total: IntCounterVec,
    pub request_duration: Option<HistogramVec>,
    pub request_duration_percentiles: Option<SummaryVec>,
    pub request_size: Option<HistogramVec>,
    pub response_size: Option<HistogramVec>,
}

impl ServerMetrics {
    /// Create the configured instruments and register them with `registry`.
    ///
    /// Registering into a registry that already holds these metrics fails
    /// with [`RegistrationError::AlreadyRegistered`]. On any error the
    /// metrics registered so far are removed again, so the same registry can
    /// be retried with a corrected config.
    pub fn register(
        config: &ServerMetricsConfig,
        registry: &Registry,
    ) -> Result<Self, RegistrationError> {
        let mut registration = Registration::new(registry, SERVER_SUBSYSTEM, &SERVER_LABELS);

        let requests_inflight = registration.register(
            "requests_inflight",
            IntGauge::with_opts(
                Opts::new(
                    "requests_inflight",
                    "A gauge of requests currently being served",
                )
                .namespace(NAMESPACE)
                .subsystem(SERVER_SUBSYSTEM),
            ),
        )?;

        let requests_total = registration.register(
            "requests_total",
            IntCounterVec::new(
                Opts::new("requests_total", "http server side requests counter")
                    .namespace(NAMESPACE)
                    .subsystem(SERVER_SUBSYSTEM),
                &SERVER_LABELS,
            ),
        )?;

        let request_duration = registration.histogram_vec(
            "request_duration",
            "server side requests latencies in seconds",
            config.request_duration_buckets.as_ref(),
        )?;

        let request_duration_percentiles = registration.summary_vec(
            "request_duration_percentile",
            "server side requests latencies percentiles",
            config.request_duration_percentiles.as_ref(),
        )?;

        let request_size = registration.histogram_vec(
            "request_size",
            "server side request size in bytes",
            config.request_size_buckets.as_ref(),
        )?;

        let response_size = registration.histogram_vec(
            "response_size",
            "server side response size in bytes",
            config.response_size_buckets.as_ref(),
        )?;

        registration.commit();
        info!(
            duration = request_duration.is_some(),
            percentiles = request_duration_percentiles.is_some(),
            request_size = request_size.is_some(),
            response_size = response_size.is_some(),
            "Registered server metrics"
        );

        Ok(Self {
            requests_inflight,
            requests_total,
            request_duration,
            request_duration_percentiles,
            request_size,
            response_size,
        })
    }
}
