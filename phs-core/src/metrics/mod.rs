//! Request metrics backed by a `prometheus` registry.
//!
//! Every metric is named `http_<subsystem>_<name>` with subsystem `server` or
//! `client`. Optional metrics are created only when their bucket or objective
//! configuration is present and non-empty.

mod client;
mod error;
mod observer;
pub(crate) mod quantile;
mod server;
mod summary;

use prometheus::core::Collector;
use prometheus::{Histogram, HistogramOpts, HistogramVec, Registry};
use tracing::{debug, warn};

use crate::config::{BucketConfig, PercentileConfig};

pub use client::{ClientMetrics, ClientMetricsConfig};
pub use error::RegistrationError;
pub use observer::{Curried, ObserverVec};
pub use server::{ServerMetrics, ServerMetricsConfig};
pub use summary::{Summary, SummaryOpts, SummaryVec, DEFAULT_AGE_BUCKETS, DEFAULT_MAX_AGE};

pub const NAMESPACE: &str = "http";
pub const SERVER_SUBSYSTEM: &str = "server";
pub const CLIENT_SUBSYSTEM: &str = "client";

pub const SERVER_LABELS: [&str; 3] = ["code", "method", "handler"];
pub const CLIENT_LABELS: [&str; 4] = ["code", "method", "endpoint", "action"];

/// p50 ±5%, p90 ±1%, p99 ±0.1%.
pub(crate) fn default_percentiles() -> PercentileConfig {
    [(0.5, 0.05), (0.9, 0.01), (0.99, 0.001)]
        .into_iter()
        .collect()
}

/// Registers collectors into a registry as one unit.
///
/// Everything registered through a `Registration` is unregistered again when
/// it is dropped before [`Registration::commit`], so a failed setup leaves
/// the registry as it found it.
pub(crate) struct Registration<'a> {
    registry: &'a Registry,
    subsystem: &'static str,
    labels: &'static [&'static str],
    added: Vec<Box<dyn Collector>>,
}

impl<'a> Registration<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        subsystem: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            registry,
            subsystem,
            labels,
            added: Vec::new(),
        }
    }

    /// Register a freshly built collector, reporting failures under its
    /// fully qualified name.
    pub(crate) fn register<C>(
        &mut self,
        name: &str,
        collector: prometheus::Result<C>,
    ) -> Result<C, RegistrationError>
    where
        C: Collector + Clone + 'static,
    {
        let fq_name = format!("{NAMESPACE}_{}_{name}", self.subsystem);
        let collector =
            collector.map_err(|e| RegistrationError::from_backend(fq_name.clone(), e))?;
        self.registry
            .register(Box::new(collector.clone()))
            .map_err(|e| RegistrationError::from_backend(fq_name.clone(), e))?;
        self.added.push(Box::new(collector.clone()));
        debug!("Registered metric {}", fq_name);
        Ok(collector)
    }

    pub(crate) fn histogram_vec(
        &mut self,
        name: &str,
        help: &str,
        buckets: Option<&BucketConfig>,
    ) -> Result<Option<HistogramVec>, RegistrationError> {
        let Some(buckets) = buckets.filter(|b| !b.is_empty()) else {
            return Ok(None);
        };
        let opts = HistogramOpts::new(name, help)
            .namespace(NAMESPACE)
            .subsystem(self.subsystem)
            .buckets(buckets.to_vec());
        // Bucket bounds are only checked once a child exists; build one up
        // front so bad bounds fail here instead of on the first observation.
        let vec = Histogram::with_opts(opts.clone())
            .and_then(|_| HistogramVec::new(opts, self.labels));
        self.register(name, vec).map(Some)
    }

    pub(crate) fn summary_vec(
        &mut self,
        name: &str,
        help: &str,
        objectives: Option<&PercentileConfig>,
    ) -> Result<Option<SummaryVec>, RegistrationError> {
        let Some(objectives) = objectives.filter(|o| !o.is_empty()) else {
            return Ok(None);
        };
        let opts = SummaryOpts::new(name, help)
            .namespace(NAMESPACE)
            .subsystem(self.subsystem)
            .objectives(objectives.clone());
        self.register(name, SummaryVec::new(opts, self.labels)).map(Some)
    }

    /// Keep everything registered so far.
    pub(crate) fn commit(mut self) {
        self.added.clear();
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        for collector in self.added.drain(..) {
            if let Err(e) = self.registry.unregister(collector) {
                warn!("Failed to roll back {} metric: {}", self.subsystem, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_percentiles() {
        let objectives = default_percentiles();
        assert_eq!(objectives.len(), 3);
        assert_eq!(objectives.get(0.5), Some(0.05));
        assert_eq!(objectives.get(0.9), Some(0.01));
        assert_eq!(objectives.get(0.99), Some(0.001));
    }

    #[test]
    fn test_disabled_histogram_is_not_registered() {
        let registry = Registry::new();
        let mut registration = Registration::new(&registry, SERVER_SUBSYSTEM, &SERVER_LABELS);
        assert!(registration.histogram_vec("x", "help", None).unwrap().is_none());
        let empty = BucketConfig::from_static(&[]);
        assert!(registration
            .histogram_vec("x", "help", Some(&empty))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_summary_registration_conflict() {
        let registry = Registry::new();
        let objectives = default_percentiles();
        let mut first = Registration::new(&registry, CLIENT_SUBSYSTEM, &CLIENT_LABELS);
        first.summary_vec("lat", "help", Some(&objectives)).unwrap();
        first.commit();

        let mut second = Registration::new(&registry, CLIENT_SUBSYSTEM, &CLIENT_LABELS);
        let err = second
            .summary_vec("lat", "help", Some(&objectives))
            .err()
            .expect("second registration must fail");
        assert!(matches!(err, RegistrationError::AlreadyRegistered(_)));
        assert_eq!(err.metric_name(), "http_client_lat");
    }

    #[test]
    fn test_uncommitted_registration_is_rolled_back() {
        let registry = Registry::new();
        let buckets = BucketConfig::from_static(&[1.0]);
        {
            let mut registration = Registration::new(&registry, SERVER_SUBSYSTEM, &SERVER_LABELS);
            registration
                .histogram_vec("x", "help", Some(&buckets))
                .unwrap()
                .unwrap()
                .with_label_values(&["200", "GET", "p1"])
                .observe(0.5);
            assert_eq!(registry.gather().len(), 1);
        }
        assert!(registry.gather().is_empty());

        let mut registration = Registration::new(&registry, SERVER_SUBSYSTEM, &SERVER_LABELS);
        assert!(registration
            .histogram_vec("x", "help", Some(&buckets))
            .unwrap()
            .is_some());
    }
}
