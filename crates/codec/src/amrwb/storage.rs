//! Canonical storage-frame encoding, consecutive-duplicate dedupe, and the
//! optional debug append-only `.awb` writer (spec §4.1 "Storage frame
//! validator", §6 `AMRWB_STORAGE_DEBUG_PATH`).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::AmrWbFrame;

const STORAGE_HEADER: &[u8] = b"#!AMR-WB\n";
const DEDUPE_WINDOW: usize = 32;

/// Encode canonical frames into the on-disk storage shape: one TOC byte
/// (F=0, frame type, quality, pad=0) followed by the frame's exact data
/// bytes, concatenated with no separators. The inverse of
/// [`super::validate_storage_frames`].
pub fn frames_to_storage_bytes(frames: &[AmrWbFrame]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        let toc = ((frame.frame_type & 0x0f) << 3) | if frame.quality { 0x04 } else { 0x00 };
        out.push(toc);
        out.extend_from_slice(&frame.data);
    }
    out
}

fn frame_hash(frame: &AmrWbFrame) -> u64 {
    // FNV-1a over frame_type/quality/data; cheap and collision-irrelevant
    // here since the dedupe is advisory (repeats get re-derived if missed).
    let mut hash: u64 = 0xcbf29ce484222325;
    let mut mix = |byte: u8| {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    };
    mix(frame.frame_type);
    mix(frame.quality as u8);
    for &b in &frame.data {
        mix(b);
    }
    hash
}

/// Sliding-window dedupe of consecutive identical speech storage frames.
/// Non-speech frames (SID/speech-lost/no-data) always pass through
/// unchanged; only repeated speech content within the last [`DEDUPE_WINDOW`]
/// frames is suppressed.
pub struct DedupeWindow {
    recent: VecDeque<u64>,
}

impl DedupeWindow {
    pub fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(DEDUPE_WINDOW),
        }
    }

    /// Returns `true` if `frame` should be written (is not a repeat of
    /// anything currently in the window), recording it either way so
    /// immediately-following repeats are caught next call.
    pub fn admit(&mut self, frame: &AmrWbFrame) -> bool {
        if !frame.is_speech() {
            return true;
        }
        let hash = frame_hash(frame);
        let is_repeat = self.recent.contains(&hash);
        if self.recent.len() == DEDUPE_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(hash);
        !is_repeat
    }
}

impl Default for DedupeWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only debug writer for a single `.awb` storage file. Writes are
/// serialized per path; the `#!AMR-WB\n` header is emitted exactly once, on
/// first open.
#[derive(Clone)]
pub struct StorageWriter {
    path: PathBuf,
    chain: Arc<Mutex<()>>,
    header_written: Arc<std::sync::atomic::AtomicBool>,
}

impl StorageWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chain: Arc::new(Mutex::new(())),
            header_written: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one frame's storage-encoded bytes to the file, creating it
    /// (and writing the header) on first use.
    pub async fn append(&self, frame: &AmrWbFrame) -> std::io::Result<()> {
        let _guard = self.chain.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        if !self.header_written.swap(true, std::sync::atomic::Ordering::SeqCst) {
            file.write_all(STORAGE_HEADER).await?;
        }
        file.write_all(&frames_to_storage_bytes(std::slice::from_ref(frame)))
            .await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amrwb::{validate_storage_frames, NO_DATA_FRAME_TYPE};

    #[test]
    fn storage_round_trips_through_validate() {
        let frames = vec![
            AmrWbFrame::new(0, true, vec![0x11; 17]),
            AmrWbFrame::new(NO_DATA_FRAME_TYPE, false, Vec::new()),
        ];
        let bytes = frames_to_storage_bytes(&frames);
        let (parsed, counts) = validate_storage_frames(&bytes);
        assert_eq!(parsed, frames);
        assert_eq!(counts.bad_f + counts.bad_ft + counts.bad_length, 0);
    }

    #[test]
    fn dedupe_drops_immediate_repeat_speech_frame() {
        let mut window = DedupeWindow::new();
        let frame = AmrWbFrame::new(0, true, vec![0x22; 17]);
        assert!(window.admit(&frame));
        assert!(!window.admit(&frame));
    }

    #[test]
    fn dedupe_drops_repeat_within_window_not_only_adjacent() {
        let mut window = DedupeWindow::new();
        let a = AmrWbFrame::new(0, true, vec![0xAA; 17]);
        let b = AmrWbFrame::new(0, true, vec![0xBB; 17]);
        assert!(window.admit(&a));
        assert!(window.admit(&b));
        assert!(!window.admit(&a));
    }

    #[test]
    fn dedupe_never_suppresses_non_speech_frames() {
        let mut window = DedupeWindow::new();
        let sid = AmrWbFrame::new(NO_DATA_FRAME_TYPE, false, Vec::new());
        assert!(window.admit(&sid));
        assert!(window.admit(&sid));
    }

    #[tokio::test]
    async fn writer_emits_header_once_then_appends() {
        let dir = std::env::temp_dir().join(format!("voxgate-awb-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("runtime_selected_storage.awb");
        let writer = StorageWriter::new(&path);
        let frame = AmrWbFrame::new(0, true, vec![0x33; 17]);
        writer.append(&frame).await.unwrap();
        writer.append(&frame).await.unwrap();
        let contents = tokio::fs::read(&path).await.unwrap();
        assert!(contents.starts_with(STORAGE_HEADER));
        let body = &contents[STORAGE_HEADER.len()..];
        assert_eq!(body.len(), 2 * (1 + 17));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
