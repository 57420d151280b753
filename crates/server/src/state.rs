//! Shared process state handed to every axum route: the clients, the
//! session manager, capacity/config stores, metrics, and the registry of
//! live per-call pipelines.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use voxgate_capacity::CapacityStore;
use voxgate_config::TenantConfigStore;
use voxgate_core::ids::CallId;
use voxgate_core::metrics::MetricsRegistry;
use voxgate_core::time::Clock;
use voxgate_session::{SessionClients, SessionManager, SessionRuntime};

use crate::config::ServerConfig;
use crate::pipeline::CallPipeline;

/// One active dialog: the orchestrating session runtime plus its media/STT
/// pipeline, driven exclusively by the task owning the carrier media
/// WebSocket (or the WebRTC peer connection) for this call.
pub struct ActiveCall {
    pub runtime: Mutex<SessionRuntime>,
    pub pipeline: Mutex<CallPipeline>,
}

pub struct AppState {
    pub config: ServerConfig,
    pub clock: Clock,
    pub http: reqwest::Client,
    pub metrics: MetricsRegistry,
    pub capacity: Arc<dyn CapacityStore>,
    pub tenant_config: Arc<dyn TenantConfigStore>,
    pub sessions: SessionManager,
    pub calls: DashMap<CallId, Arc<ActiveCall>>,
    pub clients: SessionClientsFactory,
}

/// Builds a fresh [`SessionClients`] bundle per call; the underlying
/// `reqwest::Client` and carrier/LLM/TTS endpoints are process-wide, but
/// `SessionClients` itself is owned per-`SessionRuntime`.
pub struct SessionClientsFactory {
    carrier: Arc<dyn voxgate_session::CarrierClient>,
    llm: Arc<dyn voxgate_session::LlmClient>,
    tts: Arc<dyn voxgate_session::TtsClient>,
    wav_store: Arc<dyn voxgate_session::WavStore>,
}

impl SessionClientsFactory {
    pub fn new(
        carrier: Arc<dyn voxgate_session::CarrierClient>,
        llm: Arc<dyn voxgate_session::LlmClient>,
        tts: Arc<dyn voxgate_session::TtsClient>,
        wav_store: Arc<dyn voxgate_session::WavStore>,
    ) -> Self {
        Self { carrier, llm, tts, wav_store }
    }

    pub fn build(&self) -> SessionClients {
        SessionClients {
            carrier: self.carrier.clone(),
            llm: self.llm.clone(),
            tts: self.tts.clone(),
            wav_store: self.wav_store.clone(),
        }
    }
}
