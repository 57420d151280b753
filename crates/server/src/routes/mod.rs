pub mod carrier_ws;
pub mod metrics;
pub mod offer;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<_> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/offer", post(offer::handle_offer))
        .route("/media", get(carrier_ws::handle_carrier_ws))
        .route("/webhooks/answer", post(webhooks::handle_answer))
        .route("/webhooks/hangup", post(webhooks::handle_hangup))
        .route("/webhooks/playback-ended", post(webhooks::handle_playback_ended))
        .route("/metrics", get(metrics::handle_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
