use axum::{handler::Handler, Router};
use phs_core::wrap;
use tower_http::trace::TraceLayer;

use super::handlers::{cheap::cheap_handler, expensive::expensive_handler};
use crate::app_state::SharedAppState;

pub struct ApiRoutes;

impl ApiRoutes {
    /// Demo endpoints, each wrapped in its own instrumentation chain.
    pub fn create(state: SharedAppState) -> Router {
        let metrics = &state.server_metrics;
        let cheap = wrap(cheap_handler.with_state(state.clone()), "cheap", metrics);
        let expensive = wrap(
            expensive_handler.with_state(state.clone()),
            "expensive",
            metrics,
        );

        Router::new()
            .route_service("/cheap", cheap)
            .route_service("/expensive", expensive)
            .layer(TraceLayer::new_for_http())
    }
}
