//! PCM codec and WAV container I/O.
//!
//! Decoding accepts every integer PCM width a WAV file can carry and yields
//! normalized `f64` samples. Encoding is only needed for stimulus generation,
//! so it targets 16-bit PCM exclusively.
//!
//! | Width | Interpretation | Full scale |
//! |-------|----------------|------------|
//! | 1 byte | unsigned, offset 128 | 128 |
//! | 2 bytes | signed little-endian | 32768 |
//! | 3 bytes | signed little-endian, sign-extended | 8388608 |
//! | 4 bytes | signed little-endian | 2147483648 |
//!
//! Decoded samples are not clamped. A processed file may legitimately carry
//! values whose magnitude reaches full scale, and the loudness meter must see
//! them unmodified. Encoding, on the other hand, clamps just below full scale.
//!
//! # Example
//!
//! ```rust
//! use compressor_validate::pcm;
//!
//! let bytes = pcm::encode_pcm16(&[0.5, -0.25], 2);
//! let samples = pcm::decode_pcm(&bytes, 2).unwrap();
//! let channels = pcm::deinterleave(&samples, 2).unwrap();
//!
//! assert_eq!(channels.len(), 2);
//! assert!((channels[1][0] - 0.5).abs() < 1.0 / 32768.0);
//! ```

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Largest magnitude written by [`encode_i16`] before scaling.
pub const ENCODE_LIMIT: f64 = 0.999969;

#[derive(Error, Debug)]
pub enum PcmError {
    #[error("Unsupported PCM sample width: {0} bytes")]
    UnsupportedSampleWidth(usize),
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),
    #[error("Unsupported bit depth: {0} bits")]
    UnsupportedBitDepth(u16),
    #[error("Unsupported sample format in {0}: only integer PCM is supported")]
    UnsupportedSampleFormat(String),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode interleaved little-endian PCM bytes into normalized samples.
///
/// Bytes that do not form a complete trailing sample are ignored.
pub fn decode_pcm(data: &[u8], sample_width: usize) -> Result<Vec<f64>, PcmError> {
    let samples = match sample_width {
        1 => data.iter().map(|&b| (b as f64 - 128.0) / 128.0).collect(),
        2 => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f64 / 32768.0)
            .collect(),
        3 => data
            .chunks_exact(3)
            .map(|c| {
                // Place the 24 bits in the top of an i32, then shift back down
                // so the sign bit propagates.
                let raw = i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8;
                raw as f64 / 8_388_608.0
            })
            .collect(),
        4 => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64 / 2_147_483_648.0)
            .collect(),
        other => return Err(PcmError::UnsupportedSampleWidth(other)),
    };
    Ok(samples)
}

/// Split frame-major interleaved samples into one buffer per channel.
///
/// A trailing partial frame is dropped so all channels have equal length.
pub fn deinterleave(samples: &[f64], channels: usize) -> Result<Vec<Vec<f64>>, PcmError> {
    if channels == 0 {
        return Err(PcmError::InvalidChannelCount(channels));
    }

    let frames = samples.len() / channels;
    let mut data = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in data.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    Ok(data)
}

/// Convert a normalized sample to a 16-bit integer.
pub fn encode_i16(sample: f64) -> i16 {
    let clamped = sample.clamp(-ENCODE_LIMIT, ENCODE_LIMIT);
    (clamped * 32767.0).round() as i16
}

/// Encode a mono signal as interleaved 16-bit PCM, fanned out to `channels`.
pub fn encode_pcm16(mono: &[f64], channels: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(mono.len() * channels * 2);
    for &sample in mono {
        let packed = encode_i16(sample).to_le_bytes();
        for _ in 0..channels {
            bytes.extend_from_slice(&packed);
        }
    }
    bytes
}

/// Write a mono signal to a 16-bit PCM WAV, replicated across `channels`.
pub fn write_wav_pcm16(
    path: impl AsRef<Path>,
    mono: &[f64],
    sample_rate: u32,
    channels: u16,
) -> Result<(), PcmError> {
    if channels == 0 {
        return Err(PcmError::InvalidChannelCount(0));
    }

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in mono {
        let value = encode_i16(sample);
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Decoded contents of a PCM WAV file.
#[derive(Debug, Clone)]
pub struct DecodedWav {
    pub sample_rate: u32,
    pub channels: usize,
    pub bits_per_sample: u16,
    /// One buffer per channel, all of equal length.
    pub data: Vec<Vec<f64>>,
}

impl DecodedWav {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }
}

/// Read an integer PCM WAV file into per-channel normalized buffers.
///
/// `hound` walks the data chunk using the container's block alignment, so a
/// 24-bit stream in 4-byte containers (`WAVE_FORMAT_EXTENSIBLE`) reads the
/// same as a packed one. Values are scaled by the same full-scale magnitudes
/// as [`decode_pcm`].
pub fn read_wav(path: impl AsRef<Path>) -> Result<DecodedWav, PcmError> {
    let path = path.as_ref();
    let mut reader = WavReader::new(BufReader::new(File::open(path)?))?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int {
        return Err(PcmError::UnsupportedSampleFormat(path.display().to_string()));
    }

    let full_scale = match spec.bits_per_sample {
        8 => 128.0,
        16 => 32_768.0,
        24 => 8_388_608.0,
        32 => 2_147_483_648.0,
        other => return Err(PcmError::UnsupportedBitDepth(other)),
    };

    let samples = reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f64 / full_scale))
        .collect::<Result<Vec<f64>, hound::Error>>()?;
    let data = deinterleave(&samples, spec.channels as usize)?;

    Ok(DecodedWav {
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
        bits_per_sample: spec.bits_per_sample,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_unsigned_8_bit() {
        let samples = decode_pcm(&[0, 128, 255], 1).unwrap();
        assert_eq!(samples, vec![-1.0, 0.0, 127.0 / 128.0]);
    }

    #[test]
    fn decodes_signed_16_bit() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i16::MIN.to_le_bytes());
        bytes.extend_from_slice(&16384i16.to_le_bytes());
        let samples = decode_pcm(&bytes, 2).unwrap();
        assert_eq!(samples, vec![-1.0, 0.5]);
    }

    #[test]
    fn decodes_24_bit_with_sign_extension() {
        // -1 (0xFFFFFF), full-scale negative (0x800000), +0.5 (0x400000)
        let bytes = [0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0x00, 0x00, 0x40];
        let samples = decode_pcm(&bytes, 3).unwrap();
        assert_eq!(samples[0], -1.0 / 8_388_608.0);
        assert_eq!(samples[1], -1.0);
        assert_eq!(samples[2], 0.5);
    }

    #[test]
    fn decodes_signed_32_bit() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i32::MIN.to_le_bytes());
        bytes.extend_from_slice(&(1i32 << 30).to_le_bytes());
        let samples = decode_pcm(&bytes, 4).unwrap();
        assert_eq!(samples, vec![-1.0, 0.5]);
    }

    #[test]
    fn rejects_unknown_width() {
        assert!(matches!(
            decode_pcm(&[0; 10], 5),
            Err(PcmError::UnsupportedSampleWidth(5))
        ));
        assert!(matches!(
            decode_pcm(&[], 0),
            Err(PcmError::UnsupportedSampleWidth(0))
        ));
    }

    #[test]
    fn trailing_partial_sample_is_ignored() {
        let samples = decode_pcm(&[0, 0, 0], 2).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn deinterleave_is_frame_major() {
        let data = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 2).unwrap();
        assert_eq!(data, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
    }

    #[test]
    fn deinterleave_rejects_zero_channels() {
        assert!(matches!(
            deinterleave(&[0.0; 4], 0),
            Err(PcmError::InvalidChannelCount(0))
        ));
    }

    #[test]
    fn encode_clamps_before_scaling() {
        assert_eq!(encode_i16(2.0), 32766);
        assert_eq!(encode_i16(-2.0), -32766);
        assert_eq!(encode_i16(0.0), 0);
    }

    #[test]
    fn pcm16_roundtrip_within_quantization() {
        for &x in &[0.0, 0.01, 0.1, -0.1, -0.3, 0.5, -0.73] {
            let bytes = encode_pcm16(&[x], 1);
            let decoded = decode_pcm(&bytes, 2).unwrap()[0];
            assert!(
                (decoded - x).abs() <= 1.0 / 32768.0,
                "{x} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn pcm16_roundtrip_near_full_scale() {
        // Encode scales by 32767 and decode divides by 32768, which adds up
        // to half a step of error at full scale.
        for &x in &[0.999, -0.999, ENCODE_LIMIT] {
            let decoded = decode_pcm(&encode_pcm16(&[x], 1), 2).unwrap()[0];
            assert!((decoded - x).abs() <= 1.5 / 32768.0, "{x} decoded as {decoded}");
        }
    }

    #[test]
    fn encode_fans_out_mono_to_all_channels() {
        let bytes = encode_pcm16(&[0.25], 3);
        assert_eq!(bytes.len(), 6);
        assert_eq!(&bytes[0..2], &bytes[2..4]);
        assert_eq!(&bytes[2..4], &bytes[4..6]);
    }

    #[test]
    fn decode_does_not_clamp_out_of_range_input() {
        // -32768 is beyond anything the encoder emits.
        let samples = decode_pcm(&i16::MIN.to_le_bytes(), 2).unwrap();
        assert!(samples[0] < -ENCODE_LIMIT);
    }

    #[test]
    fn wav_roundtrip_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tone.wav");
        let mono: Vec<f64> = (0..480).map(|i| (i as f64 * 0.05).sin() * 0.5).collect();

        write_wav_pcm16(&path, &mono, 48000, 2).unwrap();
        let wav = read_wav(&path).unwrap();

        assert_eq!(wav.sample_rate, 48000);
        assert_eq!(wav.channels, 2);
        assert_eq!(wav.bits_per_sample, 16);
        assert_eq!(wav.frames(), mono.len());
        for (a, b) in wav.data[0].iter().zip(&mono) {
            assert!((a - b).abs() <= 1.0 / 32768.0);
        }
        assert_eq!(wav.data[0], wav.data[1]);
    }

    #[test]
    fn reads_24_bit_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(4_194_304i32).unwrap();
        writer.write_sample(-8_388_608i32).unwrap();
        writer.finalize().unwrap();

        let wav = read_wav(&path).unwrap();
        assert_eq!(wav.data, vec![vec![0.5, -1.0]]);
    }

    /// WAVE_FORMAT_EXTENSIBLE mono file: 24 valid bits in 4-byte containers.
    fn extensible_24_in_32(samples: &[i32]) -> Vec<u8> {
        const PCM_GUID: [u8; 16] = [
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38,
            0x9B, 0x71,
        ];
        let data_len = (samples.len() * 4) as u32;

        let mut fmt = Vec::new();
        fmt.extend_from_slice(&0xFFFEu16.to_le_bytes()); // format tag
        fmt.extend_from_slice(&1u16.to_le_bytes()); // channels
        fmt.extend_from_slice(&48_000u32.to_le_bytes());
        fmt.extend_from_slice(&(48_000u32 * 4).to_le_bytes()); // byte rate
        fmt.extend_from_slice(&4u16.to_le_bytes()); // block align
        fmt.extend_from_slice(&32u16.to_le_bytes()); // container bits
        fmt.extend_from_slice(&22u16.to_le_bytes()); // extension size
        fmt.extend_from_slice(&24u16.to_le_bytes()); // valid bits
        fmt.extend_from_slice(&4u32.to_le_bytes()); // front center
        fmt.extend_from_slice(&PCM_GUID);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(4 + 8 + fmt.len() as u32 + 8 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&fmt);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn reads_24_bit_in_4_byte_containers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.wav");
        std::fs::write(&path, extensible_24_in_32(&[0x0040_0000, -0x0040_0000, 0, 0x0020_0000]))
            .unwrap();

        let wav = read_wav(&path).unwrap();
        assert_eq!(wav.bits_per_sample, 24);
        assert_eq!(wav.frames(), 4);

        // One sample per container: the stride never splits a value across
        // two containers, so signs and ordering survive.
        let data = &wav.data[0];
        assert!(data[0] > 0.0);
        assert!(data[1] < 0.0);
        assert_eq!(data[0], -data[1]);
        assert_eq!(data[2], 0.0);
        assert_eq!(data[0], 2.0 * data[3]);
    }

    #[test]
    fn rejects_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            read_wav(&path),
            Err(PcmError::UnsupportedSampleFormat(_))
        ));
    }
}
