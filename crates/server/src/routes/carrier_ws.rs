//! Carrier media WebSocket ingest (spec §4.3): `connected` / `start` /
//! `media` / `stop` events, one task per dialog (spec §5). Decoded PCM16
//! chunks flow `MediaIngest -> SttDriver -> SessionRuntime`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;
use voxgate_core::ids::CallId;
use voxgate_media::{candidate, ingest::Transport as MediaTransport};
use voxgate_session::{Transcript, TranscriptSource};
use voxgate_stt::driver::{DriverEvent, TranscriptSource as SttTranscriptSource};

use crate::pipeline::{CallPipeline, SessionGate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CarrierWsQuery {
    pub call_control_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum CarrierEvent {
    Connected,
    Start {
        #[serde(default)]
        stream_id: Option<String>,
        #[serde(default)]
        media_format: Option<MediaFormat>,
    },
    Media {
        #[serde(default)]
        sequence_number: Option<u64>,
        #[serde(default)]
        track: Option<String>,
        #[serde(flatten)]
        frame: Value,
    },
    Stop,
}

#[derive(Debug, Deserialize, Default)]
struct MediaFormat {
    #[serde(default)]
    encoding: Option<String>,
}

pub async fn handle_carrier_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<CarrierWsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.call_control_id, state))
}

async fn handle_socket(mut socket: WebSocket, call_control_id: String, state: Arc<AppState>) {
    let call_id = CallId::new(call_control_id);
    let Some(call) = state.calls.get(&call_id).map(|e| e.clone()) else {
        tracing::warn!(%call_id, "media stream opened for unknown call; closing");
        let _ = socket.close().await;
        return;
    };

    let mut stream_id = String::new();
    let mut utterance_elapsed_ms: u64 = 0;
    let chunk_ms = state.config.runtime.stt.chunk_ms;

    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(event) = serde_json::from_str::<CarrierEvent>(&text) else {
            tracing::debug!(%call_id, "unrecognized carrier ws frame");
            continue;
        };

        match event {
            CarrierEvent::Connected => {}
            CarrierEvent::Start { stream_id: sid, media_format } => {
                stream_id = sid.unwrap_or_default();
                let encoding = media_format.and_then(|f| f.encoding).unwrap_or_else(|| "pcmu".to_string());
                match CallPipeline::new(
                    &encoding,
                    MediaTransport::Pstn,
                    &state.config.runtime,
                    call.pipeline.lock().await.stt_transport.clone(),
                    state.clock.clone(),
                    state.metrics.clone(),
                ) {
                    Ok(pipeline) => *call.pipeline.lock().await = pipeline,
                    Err(e) => {
                        tracing::warn!(%call_id, error = %e, "failed to build codec pipeline");
                        break;
                    }
                }
            }
            CarrierEvent::Media { sequence_number, track, frame } => {
                if let Err(e) =
                    handle_media_frame(&call, &stream_id, sequence_number.unwrap_or(0), track, &frame, &mut utterance_elapsed_ms, chunk_ms)
                        .await
                {
                    tracing::debug!(%call_id, error = %e, "media frame handling failed");
                }
            }
            CarrierEvent::Stop => break,
        }
    }

    if let Some((_, call)) = state.calls.remove(&call_id) {
        let in_flight = call.pipeline.lock().await.stt.in_flight();
        let _ = call.runtime.lock().await.hangup(&in_flight).await;
    }
    let _ = state.sessions.teardown(&call_id, "media_stream_closed").await;
}

#[allow(clippy::too_many_arguments)]
async fn handle_media_frame(
    call: &crate::state::ActiveCall,
    stream_id: &str,
    sequence: u64,
    track: Option<String>,
    frame: &Value,
    utterance_elapsed_ms: &mut u64,
    chunk_ms: u64,
) -> crate::error::Result<()> {
    use voxgate_core::config::StreamTrack;

    let track = match track.as_deref() {
        Some("outbound") => StreamTrack::Outbound,
        _ => StreamTrack::Inbound,
    };

    let mut pipeline = call.pipeline.lock().await;
    if !pipeline.ingest.admit_frame(stream_id, sequence, track) {
        return Ok(());
    }

    let payload = match candidate::select_payload(frame, pipeline.codec.is_amrwb()) {
        Ok(p) => p,
        Err(_) => {
            pipeline.ingest.record_tiny_payload();
            return Ok(());
        }
    };

    let mut runtime = call.runtime.lock().await;
    runtime.note_inbound_media();
    let gate = SessionGate {
        listening: runtime.session().is_listening(),
        playback_active: runtime.session().is_playback_active(),
    };

    let events = pipeline.on_frame(&payload, &gate).await?;
    *utterance_elapsed_ms += chunk_ms;
    for event in events {
        match event {
            DriverEvent::SpeechStart => {
                *utterance_elapsed_ms = 0;
                runtime.speech_start().await?;
            }
            DriverEvent::UtteranceEnd => {
                let final_events = pipeline.finish_utterance().await?;
                for final_event in final_events {
                    if let DriverEvent::Transcript { text, source } = final_event {
                        let mapped = match source {
                            SttTranscriptSource::Final => TranscriptSource::Final,
                            SttTranscriptSource::Partial => TranscriptSource::PartialFallback,
                        };
                        runtime
                            .on_transcript(Transcript::new(text, mapped, *utterance_elapsed_ms))
                            .await?;
                    }
                }
            }
            DriverEvent::Transcript { .. } | DriverEvent::FinalResult { .. } | DriverEvent::SttRequestStart | DriverEvent::SttRequestEnd => {}
        }
    }

    if let Some(health_event) = pipeline.ingest.check_health() {
        runtime.ingest_event(health_event).await?;
    }

    Ok(())
}

/// Idle watchdog/dead-air tick: callers that want timer-driven reprompts
/// wire a `tokio::time::interval` against this per call (see `main.rs`'s
/// idle-sweep task for the process-wide analogue).
pub async fn dead_air_tick(call: &crate::state::ActiveCall) -> crate::error::Result<()> {
    let in_flight = call.pipeline.lock().await.stt.in_flight();
    call.runtime.lock().await.dead_air_fire(&in_flight).await?;
    Ok(())
}
