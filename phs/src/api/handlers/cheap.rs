use axum::{extract::State, http::StatusCode};
use rand::Rng;
use tracing::info;

use crate::app_state::SharedAppState;

pub async fn cheap_handler(State(state): State<SharedAppState>) -> (StatusCode, &'static str) {
    let fail = rand::thread_rng().gen_bool(state.settings.demo.failure_rate.clamp(0.0, 1.0));
    let status = if fail {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    info!(fail, status = status.as_u16(), "cheap");
    (status, "Cheap")
}
