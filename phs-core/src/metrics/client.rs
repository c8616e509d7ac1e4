use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};
use tracing::info;

use super::error::RegistrationError;
use super::summary::SummaryVec;
use super::{Registration, CLIENT_LABELS, CLIENT_SUBSYSTEM, NAMESPACE};
use crate::config::{BucketConfig, PercentileConfig};

const DEFAULT_DURATION_BUCKETS: [f64; 10] = [
    1e-3, 2e-3, 4e-3, 8e-3, 16e-3, 32e-3, 64e-3, 128e-3, 256e-3, 512e-3,
];

/// Which optional client metrics exist, and their buckets/objectives.
#[derive(Debug, Clone, Default)]
pub struct ClientMetricsConfig {
    pub request_duration_buckets: Option<BucketConfig>,
    pub request_duration_percentiles: Option<PercentileConfig>,
}

impl ClientMetricsConfig {
    pub fn with_defaults() -> Self {
        Self {
            request_duration_buckets: Some(BucketConfig::from_static(&DEFAULT_DURATION_BUCKETS)),
            request_duration_percentiles: Some(super::default_percentiles()),
        }
    }
}

/// Outgoing request instruments, labeled by endpoint and action.
#[derive(Clone)]
pub struct ClientMetrics {
    pub requests_total: IntCounterVec,
    pub request_duration: Option<HistogramVec>,
    pub request_duration_percentiles: Option<SummaryVec>,
}

impl ClientMetrics {
    /// Same contract as [`ServerMetrics::register`](super::ServerMetrics::register).
    pub fn register(
        config: &ClientMetricsConfig,
        registry: &Registry,
    ) -> Result<Self, RegistrationError> {
        let mut registration = Registration::new(registry, CLIENT_SUBSYSTEM, &CLIENT_LABELS);

        let requests_total = registration.register(
            "requests_total",
            IntCounterVec::new(
                Opts::new("requests_total", "http client side requests counter")
                    .namespace(NAMESPACE)
                    .subsystem(CLIENT_SUBSYSTEM),
                &CLIENT_LABELS,
            ),
        )?;

        let request_duration = registration.histogram_vec(
            "requests_duration",
            "client side requests latencies in seconds",
            config.request_duration_buckets.as_ref(),
        )?;

        let request_duration_percentiles = registration.summary_vec(
            "request_duration_percentile",
            "client side requests latencies percentiles",
            config.request_duration_percentiles.as_ref(),
        )?;

        registration.commit();
        info!(
            duration = request_duration.is_some(),
            percentiles = request_duration_percentiles.is_some(),
            "Registered client metrics"
        );

        Ok(Self {
            requests_total,
            request_duration,
            request_duration_percentiles,
        })
    }
}
