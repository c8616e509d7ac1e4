//! Metric settings as they appear in configuration files.
//!
//! Every value is a bucket or percentile string (`"0.1;0.5;1"`,
//! `"50;90:0.2;99"`). A missing value, an empty one or one of `no`, `false`,
//! `off`, `none` disables the metric.

use serde::Deserialize;
use tracing::debug;

use crate::config::{parse_buckets, parse_percentiles, BucketConfig, ParseError, PercentileConfig};
use crate::metrics::{ClientMetricsConfig, ServerMetricsConfig};

const DISABLED: [&str; 4] = ["no", "false", "off", "none"];

#[derive(Debug, Deserialize, Clone, Default)]
#[readonly::make]
pub struct ServerMetricsSettings {
    pub request_duration_buckets: Option<String>,
    pub request_duration_percentiles: Option<String>,
    pub request_size_buckets: Option<String>,
    pub response_size_buckets: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[readonly::make]
pub struct ClientMetricsSettings {
    pub request_duration_buckets: Option<String>,
    pub request_duration_percentiles: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[readonly::make]
pub struct MetricsSettings {
    #[serde(default)]
    pub server: ServerMetricsSettings,
    #[serde(default)]
    pub client: ClientMetricsSettings,
}

fn enabled<'a>(key: &str, value: &'a Option<String>) -> Option<&'a str> {
    let value = value.as_deref().map(str::trim)?;
    if value.is_empty() || DISABLED.iter().any(|d| value.eq_ignore_ascii_case(d)) {
        debug!("Metric setting {} is disabled", key);
        return None;
    }
    Some(value)
}

fn buckets(key: &str, value: &Option<String>) -> Result<Option<BucketConfig>, ParseError> {
    enabled(key, value).map(parse_buckets).transpose()
}

fn percentiles(key: &str, value: &Option<String>) -> Result<Option<PercentileConfig>, ParseError> {
    enabled(key, value).map(parse_percentiles).transpose()
}

impl ServerMetricsSettings {
    pub fn to_config(&self) -> Result<ServerMetricsConfig, ParseError> {
        Ok(ServerMetricsConfig {
            request_duration_buckets: buckets(
                "request_duration_buckets",
                &self.request_duration_buckets,
            )?,
            request_duration_percentiles: percentiles(
                "request_duration_percentiles",
                &self.request_duration_percentiles,
            )?,
            request_size_buckets: buckets("request_size_buckets", &self.request_size_buckets)?,
            response_size_buckets: buckets("response_size_buckets", &self.response_size_buckets)?,
        })
    }
}

impl ClientMetricsSettings {
    pub fn to_config(&self) -> Result<ClientMetricsConfig, ParseError> {
        Ok(ClientMetricsConfig {
            request_duration_buckets: buckets(
                "request_duration_buckets",
                &self.request_duration_buckets,
            )?,
            request_duration_percentiles: percentiles(
                "request_duration_percentiles",
                &self.request_duration_percentiles,
            )?,
        })
    }
}

impl MetricsSettings {
    pub fn server_config(&self) -> Result<ServerMetricsConfig, ParseError> {
        self.server.to_config()
    }

    pub fn client_config(&self) -> Result<ClientMetricsConfig, ParseError> {
        self.client.to_config()
    }
}
