//! Octet-aligned AMR-WB payload parsing (RFC 4867 §4.4.1). Every TOC entry
//! and every frame starts on a byte boundary; used off the strict PSTN
//! ingest path (see [`super::Policy::AllowOctetFallback`]).

use crate::error::{CodecError, Result};

use super::{frame_type_bytes, is_reserved_frame_type, AmrWbFrame};

/// Parse an octet-aligned AMR-WB payload into its constituent frames.
///
/// `has_cmr` consumes one leading CMR octet before the TOC list, per RFC
/// 4867 §4.4.1's octet-aligned mode.
pub fn parse_octet_aligned(payload: &[u8], has_cmr: bool) -> Result<Vec<AmrWbFrame>> {
    let mut pos = 0usize;
    if has_cmr {
        if payload.is_empty() {
            return Err(CodecError::AmrWbParse("octet-aligned: missing CMR octet".into()));
        }
        pos += 1;
    }

    let mut tocs = Vec::new();
    loop {
        let Some(&toc) = payload.get(pos) else {
            return Err(CodecError::AmrWbParse("octet-aligned: truncated TOC list".into()));
        };
        pos += 1;
        let follows = (toc & 0x80) != 0;
        let frame_type = (toc >> 3) & 0x0f;
        let quality = (toc & 0x04) != 0;
        tocs.push((frame_type, quality));
        if !follows {
            break;
        }
    }

    let mut frames = Vec::with_capacity(tocs.len());
    for (frame_type, quality) in tocs {
        if is_reserved_frame_type(frame_type) {
            return Err(CodecError::AmrWbParse(format!(
                "octet-aligned: reserved frame type {frame_type}"
            )));
        }
        let len = frame_type_bytes(frame_type)?;
        if pos + len > payload.len() {
            return Err(CodecError::AmrWbParse(
                "octet-aligned: frame data runs past payload end".into(),
            ));
        }
        frames.push(AmrWbFrame::new(frame_type, quality, payload[pos..pos + len].to_vec()));
        pos += len;
    }

    if pos != payload.len() {
        return Err(CodecError::AmrWbParse(format!(
            "octet-aligned: {} trailing byte(s) after declared frames",
            payload.len() - pos
        )));
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amrwb::SID_FRAME_TYPE;

    fn toc(follows: bool, frame_type: u8, quality: bool) -> u8 {
        let mut b = (frame_type & 0x0f) << 3;
        if follows {
            b |= 0x80;
        }
        if quality {
            b |= 0x04;
        }
        b
    }

    #[test]
    fn parses_single_frame_no_cmr() {
        let mut payload = vec![toc(false, 0, true)];
        payload.extend(vec![0x11u8; frame_type_bytes(0).unwrap()]);
        let frames = parse_octet_aligned(&payload, false).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, 0);
        assert!(frames[0].quality);
    }

    #[test]
    fn parses_multiple_frames_with_cmr() {
        let mut payload = vec![0xF0u8]; // CMR octet
        payload.push(toc(true, SID_FRAME_TYPE, true));
        payload.extend(vec![0xAAu8; frame_type_bytes(SID_FRAME_TYPE).unwrap()]);
        payload.push(toc(false, 0, false));
        payload.extend(vec![0xBBu8; frame_type_bytes(0).unwrap()]);
        let frames = parse_octet_aligned(&payload, true).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_type, SID_FRAME_TYPE);
        assert_eq!(frames[1].frame_type, 0);
    }

    #[test]
    fn rejects_reserved_frame_type() {
        let payload = vec![toc(false, 10, false)];
        assert!(parse_octet_aligned(&payload, false).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut payload = vec![toc(false, 0, false)];
        payload.extend(vec![0x00u8; frame_type_bytes(0).unwrap()]);
        payload.push(0xFF); // stray trailing byte
        assert!(parse_octet_aligned(&payload, false).is_err());
    }
}
