use std::time::Duration;

use axum::{extract::State, http::StatusCode};
use rand::Rng;
use tracing::{info, warn};

use crate::app_state::SharedAppState;

/// Fetch the cheap endpoint, then simulate work for a random time.
///
/// Failing requests skip most of the work.
pub async fn expensive_handler(State(state): State<SharedAppState>) -> (StatusCode, String) {
    let demo = &state.settings.demo;
    let (fail, delay) = {
        let mut rng = rand::thread_rng();
        let fail = rng.gen_bool(demo.failure_rate.clamp(0.0, 1.0));
        let delay = Duration::from_millis(rng.gen_range(0..=demo.max_delay_ms));
        (fail, delay)
    };
    let delay = if fail { delay / 1000 } else { delay };

    let upstream = match state
        .cheap_client
        .send(state.cheap_client.get(&demo.cheap_url))
        .await
    {
        Ok(response) => response.text().await,
        Err(e) => Err(e),
    };
    match upstream {
        Ok(body) => info!("Upstream returned {:?}", body),
        Err(e) => {
            warn!("Request to {} failed: {}", demo.cheap_url, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
        }
    }

    tokio::time::sleep(delay).await;

    let status = if fail {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    info!(fail, status = status.as_u16(), ?delay, "expensive");
    (status, format!("{:.3} Seconds", delay.as_secs_f64()))
}
