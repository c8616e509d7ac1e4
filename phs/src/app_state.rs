use std::sync::Arc;

use anyhow::Context;
use phs_core::{ClientMetrics, MonitoredClient, ServerMetrics};
use prometheus::Registry;
use tracing::info;

use crate::settings::config::Settings;
use crate::stop_flag;

pub const CHEAP_ENDPOINT: &str = "cheap:get";
pub const EXPENSIVE_ACTION: &str = "expensive";

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub stop_flag: stop_flag::StopFlag,
    pub registry: Registry,
    pub server_metrics: ServerMetrics,
    /// Used by `/expensive` to call the cheap endpoint.
    pub cheap_client: MonitoredClient,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    /// Build the state around a fresh registry.
    pub fn from_settings(
        settings: Settings,
        stop_flag: stop_flag::StopFlag,
    ) -> anyhow::Result<SharedAppState> {
        let registry = Registry::new();

        let server_config = settings
            .metrics
            .server_config()
            .context("Invalid metrics.server settings")?;
        let server_metrics = ServerMetrics::register(&server_config, &registry)?;

        let client_config = settings
            .metrics
            .client_config()
            .context("Invalid metrics.client settings")?;
        let client_metrics = ClientMetrics::register(&client_config, &registry)?;

        let cheap_client = MonitoredClient::new(
            reqwest::Client::new(),
            &client_metrics,
            CHEAP_ENDPOINT,
            EXPENSIVE_ACTION,
        );
        info!("Metrics registered");

        Ok(Arc::new(AppState {
            settings,
            stop_flag,
            registry,
            server_metrics,
            cheap_client,
        }))
    }
}
