//! Carrier webhook routes (spec §6): answer, hangup, and `playback.ended`.
//! Capacity is acquired on the answer webhook, before the call is ever
//! registered with the Session Manager (spec §4.8 "capacity acquired
//! before accepting the offer" generalizes to "before admitting the call").

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use voxgate_capacity::{CapacityDecision, TenantCaps};
use voxgate_core::ids::{CallId, TenantId};
use voxgate_session::{PlaybackAuthority, SessionConfig, SessionRuntime, Transport as SessionTransport};

use crate::error::{Result, ServerError};
use crate::pipeline::CallPipeline;
use crate::state::{ActiveCall, AppState};

#[derive(Debug, Deserialize)]
pub struct AnswerWebhook {
    pub call_control_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub codec: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HangupWebhook {
    pub call_control_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackEndedWebhook {
    pub call_control_id: String,
}

pub async fn handle_answer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnswerWebhook>,
) -> Result<()> {
    let call_id = CallId::new(body.call_control_id);
    let tenant_id = TenantId::new(body.tenant_id.clone());

    let tenant_config = voxgate_config::load(&state.tenant_config, &body.tenant_id)
        .await
        .ok();
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

    state.sessions.create_session(call_id.clone(), tenant_id);

    let clients = state.clients.build();
    let mut runtime = SessionRuntime::with_metrics(
        call_id.clone(),
        SessionTransport::Pstn,
        state.clock.clone(),
        SessionConfig::from_runtime(&state.config.runtime),
        clients,
        state.metrics.clone(),
    );
    runtime.answer().await?;

    let pipeline = CallPipeline::new(
        body.codec.as_deref().unwrap_or("pcmu"),
        voxgate_media::ingest::Transport::Pstn,
        &state.config.runtime,
        Arc::new(crate::clients::WhisperSttTransport::new(
            state.http.clone(),
            state.config.stt_whisper_url.clone(),
            tenant_config.as_ref().and_then(|c| c.stt.language.clone()),
        )),
        state.clock.clone(),
        state.metrics.clone(),
    )?;

    state.calls.insert(
        call_id,
        Arc::new(ActiveCall {
            runtime: tokio::sync::Mutex::new(runtime),
            pipeline: tokio::sync::Mutex::new(pipeline),
        }),
    );

    Ok(())
}

pub async fn handle_hangup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HangupWebhook>,
) -> Result<()> {
    let call_id = CallId::new(body.call_control_id);
    if let Some((_, call)) = state.calls.remove(&call_id) {
        let in_flight = call.pipeline.lock().await.stt.in_flight();
        let mut runtime = call.runtime.lock().await;
        runtime.hangup(&in_flight).await?;
    }
    state.sessions.teardown(&call_id, "carrier_hangup").await?;
    Ok(())
}

pub async fn handle_playback_ended(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlaybackEndedWebhook>,
) -> Result<()> {
    let call_id = CallId::new(body.call_control_id);
    let call = state
        .calls
        .get(&call_id)
        .map(|e| e.clone())
        .ok_or_else(|| ServerError::NotFound(call_id.to_string()))?;
    let mut runtime = call.runtime.lock().await;
    runtime.playback_ended(PlaybackAuthority::Webhook).await?;
    Ok(())
}
