//! 44-byte RIFF/WAVE header for raw PCM or IEEE-float capture files.

use crate::models::format::{AudioFormat, AudioSubtype};

pub const WAV_HEADER_SIZE: usize = 44;

/// Offset of the RIFF chunk size field.
const RIFF_SIZE_OFFSET: usize = 4;
/// Offset of the data chunk size field.
const DATA_SIZE_OFFSET: usize = 40;

/// `wFormatTag` value for a WAVE `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum WavFormatCode {
    Pcm = 1,
    IeeeFloat = 3,
}

impl WavFormatCode {
    /// Compressed subtypes have no plain WAVE representation.
    pub fn for_subtype(subtype: AudioSubtype) -> Option<Self> {
        match subtype {
            AudioSubtype::Pcm => Some(Self::Pcm),
            AudioSubtype::Float => Some(Self::IeeeFloat),
            AudioSubtype::Aac | AudioSubtype::Mp3 => None,
        }
    }
}

/// Build a header for `format` with `data_size` bytes of samples.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"          [4-7]    36 + data_size
/// [8-11]   "WAVE"          [12-15]  "fmt "
/// [16-19]  16              [20-21]  format code
/// [22-23]  channels        [24-27]  sample rate
/// [28-31]  byte rate       [32-33]  block align
/// [34-35]  bits/sample     [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &AudioFormat, code: WavFormatCode, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36u32.saturating_add(data_size)).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&(code as u16).to_le_bytes());
    header[22..24].copy_from_slice(&(format.channels as u16).to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&(format.block_align() as u16).to_le_bytes());
    header[34..36].copy_from_slice(&(format.bits_per_sample as u16).to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// The RIFF and data size fields for a finished file, as `(offset, bytes)` patches.
///
/// Sizes beyond the 32-bit limit are clamped.
pub fn size_patches(data_size: u64) -> [(u64, [u8; 4]); 2] {
    let data = u32::try_from(data_size).unwrap_or(u32::MAX);
    let riff = data.saturating_add(36);
    [
        (RIFF_SIZE_OFFSET as u64, riff.to_le_bytes()),
        (DATA_SIZE_OFFSET as u64, data.to_le_bytes()),
    ]
}
