//! Bandwidth-Efficient (BE) AMR-WB payload parsing and storage repacking
//! (RFC 4867 §4.4.2). Bit-packed, MSB-first, no inter-field padding; the
//! payload ends with zero-bit padding out to the next byte boundary only.
//!
//! This is the PSTN ingest path's only supported wire format (spec §9,
//! Open Question 1): [`super::Policy::BeOnly`] never falls back to
//! [`super::octet`].

use crate::error::{CodecError, Result};

use super::{frame_type_bits, frame_type_bytes, is_reserved_frame_type, AmrWbFrame};

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    fn read_bits(&mut self, count: usize) -> Result<u32> {
        if count > self.remaining_bits() {
            return Err(CodecError::AmrWbParse("BE: bitstream underrun".into()));
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.data[self.bit_pos / 8];
            let bit_in_byte = 7 - (self.bit_pos % 8);
            let bit = (byte >> bit_in_byte) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    fn read_bytes_bitwise(&mut self, num_bytes: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(num_bytes);
        let total_bits = num_bytes * 8;
        let mut bits_left = total_bits;
        while bits_left > 0 {
            let take = bits_left.min(8);
            let chunk = self.read_bits(take)?;
            out.push((chunk << (8 - take)) as u8);
            bits_left -= take;
        }
        Ok(out)
    }
}

struct BitWriter {
    bytes: Vec<u8>,
    bit_pos_in_byte: usize,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_pos_in_byte: 0,
        }
    }

    fn write_bits(&mut self, value: u32, count: usize) {
        for i in (0..count).rev() {
            let bit = (value >> i) & 1;
            if self.bit_pos_in_byte == 0 {
                self.bytes.push(0);
            }
            let last = self.bytes.last_mut().unwrap();
            *last |= (bit as u8) << (7 - self.bit_pos_in_byte);
            self.bit_pos_in_byte = (self.bit_pos_in_byte + 1) % 8;
        }
    }

    fn write_byte_field(&mut self, data: &[u8]) {
        for &byte in data {
            self.write_bits(byte as u32, 8);
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Parse a Bandwidth-Efficient AMR-WB payload. `has_cmr` consumes a leading
/// 4-bit Codec Mode Request before the TOC list.
pub fn parse_be(payload: &[u8], has_cmr: bool) -> Result<Vec<AmrWbFrame>> {
    let mut reader = BitReader::new(payload);
    if has_cmr {
        reader.read_bits(4)?;
    }

    let mut tocs = Vec::new();
    loop {
        let entry = reader.read_bits(6)?;
        let follows = (entry & 0x20) != 0;
        let frame_type = ((entry >> 1) & 0x0f) as u8;
        let quality = (entry & 0x01) != 0;
        tocs.push((frame_type, quality));
        if !follows {
            break;
        }
    }

    let mut frames = Vec::with_capacity(tocs.len());
    for (frame_type, quality) in tocs {
        if is_reserved_frame_type(frame_type) {
            return Err(CodecError::AmrWbParse(format!("BE: reserved frame type {frame_type}")));
        }
        let bits = frame_type_bits(frame_type)? as usize;
        if bits == 0 {
            frames.push(AmrWbFrame::new(frame_type, quality, Vec::new()));
            continue;
        }
        if bits > reader.remaining_bits() {
            return Err(CodecError::AmrWbParse("BE: frame data runs past payload end".into()));
        }
        let num_bytes = (bits + 7) / 8;
        let data = reader.read_bytes_bitwise(num_bytes)?;
        frames.push(AmrWbFrame::new(frame_type, quality, data));
    }

    if reader.remaining_bits() >= 8 {
        return Err(CodecError::AmrWbParse(
            "BE: unconsumed full byte(s) after declared frames".into(),
        ));
    }

    Ok(frames)
}

/// Repack canonical frames into a Bandwidth-Efficient wire payload: TOC
/// list then bit-packed frame data, byte-padded at the end. No CMR is
/// emitted; storage frames never carry one.
pub fn frames_to_be(frames: &[AmrWbFrame]) -> Result<Vec<u8>> {
    let mut writer = BitWriter::new();
    for (i, frame) in frames.iter().enumerate() {
        let follows = i + 1 < frames.len();
        let mut entry = (frame.frame_type as u32 & 0x0f) << 1;
        if follows {
            entry |= 0x20;
        }
        if frame.quality {
            entry |= 0x01;
        }
        writer.write_bits(entry, 6);
    }
    for frame in frames {
        let bits = frame_type_bits(frame.frame_type)? as usize;
        if bits == 0 {
            continue;
        }
        let expected_bytes = frame_type_bytes(frame.frame_type)?;
        if frame.data.len() != expected_bytes {
            return Err(CodecError::AmrWbParse(format!(
                "BE repack: frame type {} expects {} bytes, got {}",
                frame.frame_type,
                expected_bytes,
                frame.data.len()
            )));
        }
        let full_bytes = bits / 8;
        let remainder_bits = bits % 8;
        writer.write_byte_field(&frame.data[..full_bytes]);
        if remainder_bits > 0 {
            let last = frame.data[full_bytes] as u32 >> (8 - remainder_bits);
            writer.write_bits(last, remainder_bits);
        }
    }
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amrwb::NO_DATA_FRAME_TYPE;
    use proptest::prelude::*;

    #[test]
    fn round_trips_no_data_frame() {
        let frames = vec![AmrWbFrame::new(NO_DATA_FRAME_TYPE, true, Vec::new())];
        let wire = frames_to_be(&frames).unwrap();
        let parsed = parse_be(&wire, false).unwrap();
        assert_eq!(parsed, frames);
    }

    #[test]
    fn round_trips_speech_frame() {
        let bytes = frame_type_bytes(0).unwrap();
        let frames = vec![AmrWbFrame::new(0, true, vec![0xAB; bytes])];
        let wire = frames_to_be(&frames).unwrap();
        let parsed = parse_be(&wire, false).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].frame_type, 0);
    }

    proptest! {
        #[test]
        fn be_round_trip_is_bit_exact(frame_type in 0u8..=9, seed: u8) {
            let bits = frame_type_bits(frame_type).unwrap() as usize;
            let bytes = frame_type_bytes(frame_type).unwrap();
            let mut data: Vec<u8> = (0..bytes).map(|i| seed.wrapping_add(i as u8)).collect();
            // Canonical storage frames carry zero padding bits in the final
            // partial byte; mask those out so the round trip is exact.
            let remainder_bits = bits % 8;
            if remainder_bits > 0 {
                if let Some(last) = data.last_mut() {
                    *last &= 0xffu8 << (8 - remainder_bits);
                }
            }
            let frames = vec![AmrWbFrame::new(frame_type, true, data)];
            let wire = frames_to_be(&frames).unwrap();
            let parsed = parse_be(&wire, false).unwrap();
            prop_assert_eq!(parsed, frames);
        }
    }
}
