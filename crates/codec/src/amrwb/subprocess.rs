//! External AMR-WB decoder subprocess wrapper (spec §4.2 "AMR-WB" /
//! §6 `AMRWB_DECODER_CMD`). AMR-WB decode is delegated to an external
//! process (ffmpeg or a dedicated decoder binary) that speaks the same
//! `#!AMR-WB\n`-prefixed storage stream this crate writes to disk; we spawn
//! it once per call and reuse the same stdin/stdout pipe for every frame
//! batch rather than forking per frame.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use super::storage::frames_to_storage_bytes;
use super::AmrWbFrame;
use crate::error::{CodecError, Result};

const STORAGE_HEADER: &[u8] = b"#!AMR-WB\n";
/// 20 ms of 16 kHz mono PCM16 per AMR-WB frame.
const SAMPLES_PER_FRAME: usize = 320;
const FIRST_READ_TIMEOUT: Duration = Duration::from_millis(300);
const SUBSEQUENT_READ_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    pub command: String,
    pub args: Vec<String>,
    /// When true, a dangling partial-sample byte left over after a decode
    /// call surfaces as [`CodecError::Carryover`] (`stream_strict`). When
    /// false, the dangling byte is silently dropped (`stream_discard_carryover`,
    /// the default).
    pub strict_carryover: bool,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            command: "ffmpeg".to_string(),
            args: vec![
                "-f".to_string(),
                "amrwb".to_string(),
                "-i".to_string(),
                "pipe:0".to_string(),
                "-f".to_string(),
                "s16le".to_string(),
                "-ar".to_string(),
                "16000".to_string(),
                "pipe:1".to_string(),
            ],
            strict_carryover: true,
        }
    }
}

/// Drives the long-lived decoder child process: write storage-framed
/// AMR-WB, read back PCM16.
pub struct AmrWbSubprocessDecoder {
    config: SubprocessConfig,
    child: Option<Child>,
    header_written: bool,
    calls: u64,
}

impl AmrWbSubprocessDecoder {
    pub fn new(config: SubprocessConfig) -> Self {
        Self {
            config,
            child: None,
            header_written: false,
            calls: 0,
        }
    }

    fn ensure_spawned(&mut self) -> Result<&mut Child> {
        if self.child.is_none() {
            let child = Command::new(&self.config.command)
                .args(&self.config.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    CodecError::SubprocessUnavailable(format!(
                        "failed to spawn {}: {e}",
                        self.config.command
                    ))
                })?;
            self.child = Some(child);
        }
        Ok(self.child.as_mut().expect("just spawned"))
    }

    /// Decode one batch of storage frames. Returns exactly
    /// `frames.len() * SAMPLES_PER_FRAME` PCM16 samples, padding with
    /// silence on a short read and trimming on an over-length read.
    pub async fn decode(&mut self, frames: &[AmrWbFrame]) -> Result<Vec<i16>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let expected_samples = frames.len() * SAMPLES_PER_FRAME;
        let expected_bytes = expected_samples * 2;
        let header_written = self.header_written;
        let timeout = if self.calls == 0 {
            FIRST_READ_TIMEOUT
        } else {
            SUBSEQUENT_READ_TIMEOUT
        };
        // Snapshot the mutable bookkeeping up front so the `child` borrow
        // below doesn't overlap a borrow of `self` for these writes.
        self.header_written = true;
        self.calls += 1;

        let child = self.ensure_spawned()?;

        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| CodecError::SubprocessUnavailable("decoder stdin closed".into()))?;
        if !header_written {
            stdin
                .write_all(STORAGE_HEADER)
                .await
                .map_err(|e| CodecError::SubprocessUnavailable(format!("write header: {e}")))?;
        }
        stdin
            .write_all(&frames_to_storage_bytes(frames))
            .await
            .map_err(|e| CodecError::SubprocessUnavailable(format!("write frames: {e}")))?;

        let stdout = child
            .stdout
            .as_mut()
            .ok_or_else(|| CodecError::SubprocessUnavailable("decoder stdout closed".into()))?;

        let mut read_buf = vec![0u8; expected_bytes];
        let read_result =
            tokio::time::timeout(timeout, read_stream_best_effort(stdout, &mut read_buf)).await;

        let read_len = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                return Err(CodecError::SubprocessUnavailable(format!("read pcm: {e}")))
            }
            Err(_) => 0, // timeout: treat as a fully short read, pad with silence below
        };

        let mut pcm_bytes = read_buf[..read_len].to_vec();

        // A dangling partial sample in the raw stream never aligns to the
        // `expected_bytes` normalization below; strict mode surfaces it,
        // default mode drains it.
        let leftover = pcm_bytes.len() % 2;
        if leftover != 0 {
            if self.config.strict_carryover {
                return Err(CodecError::Carryover(leftover));
            }
            pcm_bytes.truncate(pcm_bytes.len() - leftover);
        }

        if pcm_bytes.len() < expected_bytes {
            pcm_bytes.resize(expected_bytes, 0);
        } else if pcm_bytes.len() > expected_bytes {
            // Over-length: trim from the front, keeping the most recent
            // (tail) samples rather than the stalest ones.
            let excess = pcm_bytes.len() - expected_bytes;
            pcm_bytes.drain(..excess);
        }

        let pcm16 = pcm_bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(pcm16)
    }
}

async fn read_stream_best_effort(
    stream: &mut (impl tokio::io::AsyncRead + Unpin),
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = stream.read(&mut buf[total..]).await?;
        if n == 0 {
            break; // child closed the pipe or has nothing buffered right now
        }
        total += n;
    }
    Ok(total)
}
