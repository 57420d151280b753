//! Candidate payload selection from a carrier JSON media frame (spec §4.3).
//! Carriers disagree on where the base64 audio payload lives in the frame;
//! we look in every plausible spot and score each candidate rather than
//! trusting a single fixed path.

use base64::Engine;
use serde_json::Value;

use crate::error::{MediaError, Result};

const AMRWB_MIN_DECODED_LEN: usize = 6;
const DEFAULT_MIN_DECODED_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    looks_base64: bool,
    decoded_len: usize,
    string_len: usize,
}

fn looks_like_base64(s: &str) -> bool {
    !s.is_empty()
        && s.len() % 4 == 0
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
}

fn score_candidate(s: &str) -> (Score, Option<Vec<u8>>) {
    let decoded = base64::engine::general_purpose::STANDARD.decode(s).ok();
    let decoded_len = decoded.as_ref().map(Vec::len).unwrap_or(0);
    (
        Score {
            looks_base64: looks_like_base64(s),
            decoded_len,
            string_len: s.len(),
        },
        decoded,
    )
}

/// Pull every plausible string candidate out of a carrier media frame, in
/// the fixed precedence order the original system checks: `media.payload`,
/// `media.data.payload`, `media.data`, then a bare top-level `payload`.
fn gather_candidates(frame: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(s) = frame.pointer("/media/payload").and_then(Value::as_str) {
        out.push(s);
    }
    if let Some(s) = frame.pointer("/media/data/payload").and_then(Value::as_str) {
        out.push(s);
    }
    if let Some(s) = frame.pointer("/media/data").and_then(Value::as_str) {
        out.push(s);
    }
    if let Some(s) = frame.pointer("/payload").and_then(Value::as_str) {
        out.push(s);
    }
    out
}

/// Select and decode the best candidate payload in a carrier JSON frame,
/// applying the minimum-decoded-length noise gate for the active codec.
pub fn select_payload(frame: &Value, is_amrwb: bool) -> Result<Vec<u8>> {
    let candidates = gather_candidates(frame);
    if candidates.is_empty() {
        return Err(MediaError::NoCandidate);
    }

    let mut best: Option<(Score, Vec<u8>)> = None;
    for candidate in candidates {
        let (score, decoded) = score_candidate(candidate);
        if let Some(decoded) = decoded {
            let is_better = match &best {
                Some((best_score, _)) => score > *best_score,
                None => true,
            };
            if is_better {
                best = Some((score, decoded));
            }
        }
    }

    let (_, decoded) = best.ok_or(MediaError::NoCandidate)?;
    let min_len = if is_amrwb {
        AMRWB_MIN_DECODED_LEN
    } else {
        DEFAULT_MIN_DECODED_LEN
    };
    if decoded.len() < min_len {
        return Err(MediaError::BelowMinimumLength {
            got: decoded.len(),
            min: min_len,
        });
    }
    Ok(decoded)
}
