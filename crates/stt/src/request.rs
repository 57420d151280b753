//! Build a WAV byte buffer from pre-roll + accumulated speech PCM16 for one
//! STT request (spec §4.5 "Request lifecycle").

use crate::error::{Result, SttError};

pub fn build_wav(sample_rate_hz: u32, pcm16: &[i16]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| SttError::WavEncodeFailed(e.to_string()))?;
        for &sample in pcm16 {
            writer
                .write_sample(sample)
                .map_err(|e| SttError::WavEncodeFailed(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| SttError::WavEncodeFailed(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_wav_produces_riff_header() {
        let wav = build_wav(16_000, &[0, 1, -1, 100]).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }
}
