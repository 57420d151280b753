//! `/metrics` Prometheus text exposition (spec §4.9).

use std::sync::Arc;

use axum::extract::State;

use crate::state::AppState;

pub async fn handle_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.set_gauge("active_sessions", &[], state.sessions.session_count() as i64);
    state.metrics.render_prometheus()
}
