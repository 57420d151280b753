//! `reqwest`-backed implementations of the external collaborator traits
//! (spec §6, §7): carrier REST actions, LLM reply, Kokoro TTS synthesis,
//! filesystem WAV storage, and the Whisper-compatible STT transport.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use voxgate_core::ids::CallId;
use voxgate_session::{CarrierClient, LlmClient, Role, TtsClient, Turn, WavStore};
use voxgate_stt::driver::{SttResponse, SttTransport, TranscriptSource as SttTranscriptSource};

use crate::error::ServerError;

fn map_session_err(e: reqwest::Error, what: &str) -> voxgate_session::SessionError {
    match what {
        "carrier" => voxgate_session::SessionError::CarrierAction(e.to_string()),
        "llm" => voxgate_session::SessionError::LlmRequest(e.to_string()),
        "tts" => voxgate_session::SessionError::TtsRequest(e.to_string()),
        _ => voxgate_session::SessionError::WavStore(e.to_string()),
    }
}

/// Carrier PSTN control-plane actions (spec §6 "carrier REST actions:
/// answer/play/stop/hangup").
pub struct CarrierHttpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CarrierHttpClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self { http, base_url, api_key }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn action(&self, call_id: &CallId, action: &str, body: serde_json::Value) -> voxgate_session::Result<()> {
        self.request(reqwest::Method::POST, &format!("/calls/{call_id}/actions/{action}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_session_err(e, "carrier"))?
            .error_for_status()
            .map_err(|e| map_session_err(e, "carrier"))?;
        Ok(())
    }
}

#[async_trait]
impl CarrierClient for CarrierHttpClient {
    async fn answer(&self, call_id: &CallId) -> voxgate_session::Result<()> {
        self.action(call_id, "answer", json!({})).await
    }

    async fn play(&self, call_id: &CallId, url: &str) -> voxgate_session::Result<()> {
        self.action(call_id, "play", json!({ "audio_url": url })).await
    }

    async fn stop_playback(&self, call_id: &CallId) -> voxgate_session::Result<()> {
        self.action(call_id, "stop", json!({})).await
    }

    async fn hangup(&self, call_id: &CallId) -> voxgate_session::Result<()> {
        self.action(call_id, "hangup", json!({})).await
    }
}

#[derive(Serialize)]
struct LlmMessage {
    role: &'static str,
    content: String,
}

/// LLM reply endpoint (spec §7: on failure the caller substitutes the
/// fallback text, not this client -- this client only reports the error).
pub struct LlmHttpClient {
    http: reqwest::Client,
    url: String,
}

impl LlmHttpClient {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl LlmClient for LlmHttpClient {
    async fn reply(&self, history: &[Turn]) -> voxgate_session::Result<String> {
        let messages: Vec<LlmMessage> = history
            .iter()
            .map(|t| LlmMessage {
                role: match t.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: t.content.clone(),
            })
            .collect();

        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "messages": messages }))
            .send()
            .await
            .map_err(|e| map_session_err(e, "llm"))?
            .error_for_status()
            .map_err(|e| map_session_err(e, "llm"))?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| voxgate_session::SessionError::LlmRequest(e.to_string()))?;

        body.get("reply")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| voxgate_session::SessionError::LlmRequest("missing `reply` field".to_string()))
    }
}

/// Kokoro TTS synthesis endpoint (spec §6 `tts.mode = kokoro_http`).
pub struct KokoroTtsClient {
    http: reqwest::Client,
    url: String,
    voice: Option<String>,
}

impl KokoroTtsClient {
    pub fn new(http: reqwest::Client, url: String, voice: Option<String>) -> Self {
        Self { http, url, voice }
    }
}

#[async_trait]
impl TtsClient for KokoroTtsClient {
    async fn synthesize(&self, text: &str) -> voxgate_session::Result<Vec<u8>> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "input": text, "voice": self.voice }))
            .send()
            .await
            .map_err(|e| map_session_err(e, "tts"))?
            .error_for_status()
            .map_err(|e| map_session_err(e, "tts"))?;

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| voxgate_session::SessionError::TtsRequest(e.to_string()))
    }
}

/// Stores synthesized WAVs on local disk and serves them back via a public
/// base URL the carrier can fetch (spec §6 "audio.publicBaseUrl").
pub struct FilesystemWavStore {
    storage_dir: PathBuf,
    public_base_url: String,
}

impl FilesystemWavStore {
    pub fn new(storage_dir: impl Into<PathBuf>, public_base_url: String) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            public_base_url,
        }
    }
}

#[async_trait]
impl WavStore for FilesystemWavStore {
    async fn store(&self, call_id: &CallId, turn_id: u64, bytes: Vec<u8>) -> voxgate_session::Result<String> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| voxgate_session::SessionError::WavStore(e.to_string()))?;
        let filename = format!("{}-{}.wav", call_id.as_str(), turn_id);
        let path = self.storage_dir.join(&filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| voxgate_session::SessionError::WavStore(e.to_string()))?;
        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), filename))
    }
}

/// Whisper-compatible STT endpoint, multipart-free JSON body (wav as
/// base64) to match the dot-simple contract used across these collaborator
/// clients.
pub struct WhisperSttTransport {
    http: reqwest::Client,
    url: String,
    language: Option<String>,
}

impl WhisperSttTransport {
    pub fn new(http: reqwest::Client, url: String, language: Option<String>) -> Self {
        Self { http, url, language }
    }
}

#[async_trait]
impl SttTransport for WhisperSttTransport {
    async fn send_request(&self, wav: Vec<u8>, is_partial: bool) -> voxgate_stt::Result<SttResponse> {
        use base64::Engine;
        let wav_b64 = base64::engine::general_purpose::STANDARD.encode(&wav);

        let resp = self
            .http
            .post(&self.url)
            .json(&json!({
                "audio_base64": wav_b64,
                "partial": is_partial,
                "language": self.language,
            }))
            .send()
            .await
            .map_err(|e| voxgate_stt::SttError::RequestFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| voxgate_stt::SttError::RequestFailed(e.to_string()))?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| voxgate_stt::SttError::RequestFailed(e.to_string()))?;

        let text = body
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let is_final = body.get("is_final").and_then(|v| v.as_bool()).unwrap_or(!is_partial);

        Ok(SttResponse {
            text,
            source: if is_final {
                SttTranscriptSource::Final
            } else {
                SttTranscriptSource::Partial
            },
        })
    }
}

/// Convenience conversion so route handlers can `?` a `reqwest::Error`
/// directly into a [`ServerError`] where no collaborator-specific mapping
/// applies.
pub fn upstream(e: reqwest::Error) -> ServerError {
    ServerError::Upstream(e)
}
