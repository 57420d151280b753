//! Offer/webhook flow against the real route handlers, with stub
//! collaborator clients swapped in for the carrier/LLM/TTS/WAV-store/STT
//! network calls. No TCP listener is started: axum handlers are plain async
//! functions, so the extractors are constructed directly.

use std::sync::Arc;

use axum::extract::{Json, Query, State};
use dashmap::DashMap;
use voxgate_capacity::in_process::InProcessCapacityStore;
use voxgate_config::InProcessTenantConfigStore;
use voxgate_core::ids::CallId;
use voxgate_core::metrics::MetricsRegistry;
use voxgate_core::time::Clock;
use voxgate_session::{CallSessionState, CarrierClient, LlmClient, TtsClient, Turn, WavStore};
use voxgate_server::config::ServerConfig;
use voxgate_server::routes::offer::{handle_offer, OfferRequest};
use voxgate_server::routes::webhooks::{handle_answer, handle_hangup, AnswerWebhook, HangupWebhook};
use voxgate_server::state::{AppState, SessionClientsFactory};

struct StubCarrier;
#[async_trait::async_trait]
impl CarrierClient for StubCarrier {
    async fn answer(&self, _call_id: &CallId) -> voxgate_session::Result<()> {
        Ok(())
    }
    async fn play(&self, _call_id: &CallId, _url: &str) -> voxgate_session::Result<()> {
        Ok(())
    }
    async fn stop_playback(&self, _call_id: &CallId) -> voxgate_session::Result<()> {
        Ok(())
    }
    async fn hangup(&self, _call_id: &CallId) -> voxgate_session::Result<()> {
        Ok(())
    }
}

struct StubLlm;
#[async_trait::async_trait]
impl LlmClient for StubLlm {
    async fn reply(&self, _history: &[Turn]) -> voxgate_session::Result<String> {
        Ok("Hello there.".to_string())
    }
}

struct StubTts;
#[async_trait::async_trait]
impl TtsClient for StubTts {
    async fn synthesize(&self, _text: &str) -> voxgate_session::Result<Vec<u8>> {
        Ok(b"RIFF....WAVE".to_vec())
    }
}

struct StubWavStore;
#[async_trait::async_trait]
impl WavStore for StubWavStore {
    async fn store(&self, call_id: &CallId, turn_id: u64, _bytes: Vec<u8>) -> voxgate_session::Result<String> {
        Ok(format!("https://wav.example/{}/{}", call_id.as_str(), turn_id))
    }
}

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_env();
    config.redis_url = None;
    config
}

fn test_state() -> Arc<AppState> {
    let clients = SessionClientsFactory::new(
        Arc::new(StubCarrier),
        Arc::new(StubLlm),
        Arc::new(StubTts),
        Arc::new(StubWavStore),
    );
    let capacity: Arc<dyn voxgate_capacity::CapacityStore> = Arc::new(InProcessCapacityStore::new());
    let clock = Clock::wall();
    let sessions = voxgate_session::SessionManager::new(capacity.clone(), clock.clone(), 600_000);

    Arc::new(AppState {
        config: test_config(),
        clock,
        http: reqwest::Client::new(),
        metrics: MetricsRegistry::new(),
        capacity,
        tenant_config: Arc::new(InProcessTenantConfigStore::new()),
        sessions,
        calls: DashMap::new(),
        clients,
    })
}

#[tokio::test]
async fn offer_admits_and_mints_a_call_id() {
    let state = test_state();
    let resp = handle_offer(
        State(state),
        Json(OfferRequest {
            tenant_id: "tenant-a".to_string(),
            sdp: "v=0\r\n".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(!resp.0.call_id.is_empty());
}

#[tokio::test]
async fn offer_rejects_empty_sdp() {
    let state = test_state();
    let err = handle_offer(
        State(state),
        Json(OfferRequest {
            tenant_id: "tenant-a".to_string(),
            sdp: String::new(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, voxgate_server::error::ServerError::BadRequest(_)));
}

#[tokio::test]
async fn offer_rejects_when_globally_at_capacity() {
    let mut config = test_config();
    config.runtime.capacity.global_concurrency_cap = 0;
    let clients = SessionClientsFactory::new(
        Arc::new(StubCarrier),
        Arc::new(StubLlm),
        Arc::new(StubTts),
        Arc::new(StubWavStore),
    );
    let capacity: Arc<dyn voxgate_capacity::CapacityStore> = Arc::new(InProcessCapacityStore::new());
    let clock = Clock::wall();
    let sessions = voxgate_session::SessionManager::new(capacity.clone(), clock.clone(), 600_000);
    let state = Arc::new(AppState {
        config,
        clock,
        http: reqwest::Client::new(),
        metrics: MetricsRegistry::new(),
        capacity,
        tenant_config: Arc::new(InProcessTenantConfigStore::new()),
        sessions,
        calls: DashMap::new(),
        clients,
    });

    let err = handle_offer(
        State(state),
        Json(OfferRequest {
            tenant_id: "tenant-a".to_string(),
            sdp: "v=0\r\n".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, voxgate_server::error::ServerError::AtCapacity));
}

#[tokio::test]
async fn answer_webhook_registers_an_active_call_in_answered_state() {
    let state = test_state();
    handle_answer(
        State(state.clone()),
        Json(AnswerWebhook {
            call_control_id: "call-1".to_string(),
            tenant_id: "tenant-a".to_string(),
            codec: None,
        }),
    )
    .await
    .unwrap();

    let call_id = CallId::new("call-1");
    let call = state.calls.get(&call_id).expect("call should be registered");
    let runtime = call.runtime.lock().await;
    assert_eq!(runtime.session().state(), CallSessionState::Answered);
}

#[tokio::test]
async fn hangup_webhook_tears_down_the_session_and_removes_the_call() {
    let state = test_state();
    handle_answer(
        State(state.clone()),
        Json(AnswerWebhook {
            call_control_id: "call-2".to_string(),
            tenant_id: "tenant-a".to_string(),
            codec: None,
        }),
    )
    .await
    .unwrap();

    handle_hangup(
        State(state.clone()),
        Json(HangupWebhook {
            call_control_id: "call-2".to_string(),
        }),
    )
    .await
    .unwrap();

    let call_id = CallId::new("call-2");
    assert!(state.calls.get(&call_id).is_none());
    assert_eq!(state.sessions.session_count(), 0);
}

#[tokio::test]
async fn media_ws_query_extractor_parses_call_control_id() {
    use voxgate_server::routes::carrier_ws::CarrierWsQuery;
    let Query(q): Query<CarrierWsQuery> =
        Query::try_from_uri(&"http://x/media?call_control_id=abc-123".parse().unwrap()).unwrap();
    assert_eq!(q.call_control_id, "abc-123");
}
