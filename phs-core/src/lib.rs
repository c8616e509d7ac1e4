pub mod config;
pub mod http;
pub mod instrument;
pub mod metrics;
pub mod settings;

pub use config::{parse_buckets, parse_percentiles, BucketConfig, ParseError, PercentileConfig};
pub use crate::http::MonitoredClient;
pub use instrument::{wrap, Instrumented};
pub use metrics::{
    ClientMetrics, ClientMetricsConfig, RegistrationError, ServerMetrics, ServerMetricsConfig,
};
