//! WebRTC-HD `/offer` signalling (spec §4, §6): capacity is acquired
//! before the offer is accepted. The SDP/ICE negotiation itself is out of
//! scope (spec non-goal); this route only performs the admission decision
//! and mints the call id the media path will key off of.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use voxgate_capacity::{CapacityDecision, TenantCaps};
use voxgate_core::ids::{CallId, TenantId};

use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub tenant_id: String,
    pub sdp: String,
}

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub call_id: String,
}

pub async fn handle_offer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OfferRequest>,
) -> Result<Json<OfferResponse>> {
    let call_id = CallId::generate();
    let tenant_id = TenantId::new(body.tenant_id.clone());

    let tenant_config = voxgate_config::load(&state.tenant_config, &body.tenant_id).await.ok();
    let caps = tenant_config
        .as_ref()
        .map(|c| TenantCaps {
            concurrency_override: Some(c.caps.max_concurrent_calls_tenant),
            rpm_override: Some(c.caps.max_calls_per_minute_tenant),
            default_concurrency: state.config.runtime.capacity.tenant_concurrency_cap_default,
            default_rpm: state.config.runtime.capacity.tenant_calls_per_min_cap_default,
        })
        .unwrap_or(TenantCaps {
            concurrency_override: None,
            rpm_override: None,
            default_concurrency: state.config.runtime.capacity.tenant_concurrency_cap_default,
            default_rpm: state.config.runtime.capacity.tenant_calls_per_min_cap_default,
        });

    let decision = state
        .capacity
        .try_acquire(
            &call_id,
            &tenant_id,
            caps,
            state.config.runtime.capacity.global_concurrency_cap,
            state.config.runtime.capacity.ttl_seconds,
        )
        .await?;
    state
        .metrics
        .incr("capacity_decisions_total", &[("result", decision.label())], 1);
    if decision != CapacityDecision::Ok {
        return Err(ServerError::AtCapacity);
    }

    // SDP answer negotiation is handled by a WebRTC media engine outside
    // this crate's scope; only the admission decision and the call id live
    // here. `body.sdp` is accepted (and validated non-empty) so the route
    // shape matches what a real negotiation would consume.
    if body.sdp.trim().is_empty() {
        state.capacity.release(&call_id, &tenant_id).await.ok();
        return Err(ServerError::BadRequest("empty SDP offer".to_string()));
    }

    state.sessions.create_session(call_id.clone(), tenant_id);

    Ok(Json(OfferResponse {
        call_id: call_id.to_string(),
    }))
}
