use config::{Config, ConfigError, Environment, File};
use phs_core::settings::metrics::MetricsSettings;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
#[readonly::make]
pub struct ApiSettings {
    pub bind_address: String,
}

#[derive(Debug, Deserialize, Clone)]
#[readonly::make]
pub struct ExporterSettings {
    pub bind_address: String,
}

/// Behaviour of the demo handlers.
#[derive(Debug, Deserialize, Clone)]
#[readonly::make]
pub struct DemoSettings {
    /// Where `/expensive` fetches its upstream data from.
    pub cheap_url: String,
    /// Share of requests answered with an internal server error.
    pub failure_rate: f64,
    /// Upper bound of the simulated work in `/expensive`.
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub exporter: ExporterSettings,
    pub demo: DemoSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl Settings {
    pub fn get_environment() -> Environment {
        Environment::default()
            .prefix("PHS")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("api.bind_address", "0.0.0.0:5080")?
            .set_default("exporter.bind_address", "0.0.0.0:5201")?
            .set_default("demo.cheap_url", "http://127.0.0.1:5080/cheap")?
            .set_default("demo.failure_rate", 0.1)?
            .set_default("demo.max_delay_ms", 5000u64)
    }

    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("PHS_RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Self::get_environment())
            .build()?
            .try_deserialize()
    }

    /// Settings from a single file, without environment overrides.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()
    }

    /// Replace the port of the API bind address.
    pub fn with_port(mut self, port: u16) -> Self {
        let host = self
            .api
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.api = ApiSettings {
            bind_address: format!("{host}:{port}"),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let settings: Settings = Settings::builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.api.bind_address, "0.0.0.0:5080");
        assert_eq!(settings.exporter.bind_address, "0.0.0.0:5201");
        assert_eq!(settings.demo.failure_rate, 0.1);

        // No metric strings configured: only the mandatory metrics remain.
        let server = settings.metrics.server_config().unwrap();
        assert!(server.request_duration_buckets.is_none());
    }

    #[test]
    fn test_default_file() {
        let settings = Settings::from_file("config/default").unwrap();
        let server = settings.metrics.server_config().unwrap();
        assert_eq!(server.request_duration_buckets.unwrap().len(), 11);
        assert_eq!(server.request_duration_percentiles.unwrap().len(), 3);
        let client = settings.metrics.client_config().unwrap();
        assert_eq!(client.request_duration_buckets.unwrap().len(), 10);
    }

    #[test]
    fn test_metric_settings_from_env() {
        env::set_var(
            "PHS__METRICS__SERVER__REQUEST_SIZE_BUCKETS",
            "10;100;1000",
        );
        env::set_var("PHS__METRICS__SERVER__RESPONSE_SIZE_BUCKETS", "off");

        let settings: Settings = Settings::builder()
            .unwrap()
            .add_source(File::with_name("config/default"))
            .add_source(Settings::get_environment())
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        env::remove_var("PHS__METRICS__SERVER__REQUEST_SIZE_BUCKETS");
        env::remove_var("PHS__METRICS__SERVER__RESPONSE_SIZE_BUCKETS");

        let server = settings.metrics.server_config().unwrap();
        assert_eq!(
            server.request_size_buckets.unwrap().as_slice(),
            &[10.0, 100.0, 1000.0]
        );
        assert!(server.response_size_buckets.is_none());
    }

    #[test]
    fn test_with_port() {
        let settings = Settings::from_file("config/default").unwrap().with_port(6000);
        assert_eq!(settings.api.bind_address, "0.0.0.0:6000");
    }
}
