//! TTS segmentation and the single-consumer segment queue (spec §4.6 "TTS
//! segmentation", §9 "Single-consumer task queue for TTS segments").

use std::collections::VecDeque;

use crate::types::Transport;

const SENTENCE_BOUNDARIES: [char; 3] = ['.', '!', '?'];

/// Split `text` into TTS segments. On PSTN, the carrier's "play" action is
/// not a true completion signal, so segmentation is disabled and the whole
/// reply plays as one segment. On WebRTC, split at sentence boundaries once
/// each accumulated segment has reached its minimum character threshold
/// (`first_min_chars` for the first segment, `next_min_chars` after).
pub fn segment_reply(
    transport: Transport,
    text: &str,
    first_min_chars: usize,
    next_min_chars: usize,
) -> Vec<String> {
    if transport == Transport::Pstn || text.is_empty() {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        current.push(c);
        let at_boundary = SENTENCE_BOUNDARIES.contains(&c)
            && match chars.peek() {
                Some(&(_, next)) => next.is_whitespace(),
                None => true,
            };
        if !at_boundary {
            continue;
        }
        let min_chars = if segments.is_empty() {
            first_min_chars
        } else {
            next_min_chars
        };
        if current.trim().len() >= min_chars {
            segments.push(current.trim().to_string());
            current.clear();
        }
    }
    let remainder = current.trim();
    if !remainder.is_empty() {
        segments.push(remainder.to_string());
    }
    if segments.is_empty() {
        segments.push(text.trim().to_string());
    }
    segments
}

/// Ordered queue of pending TTS segments, drained by exactly one task per
/// call. Barge-in clears the queue but never aborts a synth request
/// already in flight for the segment currently playing.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    segments: VecDeque<String>,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_all(&mut self, segments: impl IntoIterator<Item = String>) {
        self.segments.extend(segments);
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop_front()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pstn_never_segments() {
        let segments = segment_reply(Transport::Pstn, "Hello there. How are you?", 1, 1);
        assert_eq!(segments, vec!["Hello there. How are you?".to_string()]);
    }

    #[test]
    fn webrtc_splits_at_sentence_boundaries_once_threshold_met() {
        let segments = segment_reply(
            Transport::WebRtcHd,
            "Hi. This is a longer second sentence here. And a third one.",
            2,
            10,
        );
        assert!(segments.len() >= 2);
        assert!(segments.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn empty_reply_segments_to_nothing() {
        assert!(segment_reply(Transport::WebRtcHd, "", 1, 1).is_empty());
    }

    #[test]
    fn queue_is_fifo_and_clears() {
        let mut queue = SegmentQueue::new();
        queue.enqueue_all(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(queue.pop(), Some("a".to_string()));
        queue.clear();
        assert!(queue.is_empty());
    }
}
