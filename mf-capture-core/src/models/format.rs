//! Media format descriptors and the static subtype tables.
//!
//! Platform subtype identifiers are GUIDs whose first 32 bits carry a FourCC
//! (video) or a WAVE format tag (audio). The tables below map those codes to
//! typed subtypes and display names; anything not listed is "unrecognized"
//! and skipped during enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Pixel layout of an uncompressed or compressed video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoSubtype {
    Rgb32,
    Argb32,
    Rgb24,
    I420,
    Iyuv,
    Yv12,
    Nv12,
    Nv21,
    Yuy2,
    Uyvy,
    Ayuv,
    P010,
    P016,
    P210,
    P216,
    #[serde(rename = "v210")]
    V210,
    #[serde(rename = "v216")]
    V216,
    #[serde(rename = "v410")]
    V410,
    Y210,
    Y216,
    Y410,
    Y416,
    Mjpg,
    H264,
    Hevc,
}

/// (subtype, code, name). RGB layouts use D3DFORMAT values, the rest FourCCs.
static VIDEO_SUBTYPES: &[(VideoSubtype, u32, &str)] = &[
    (VideoSubtype::Rgb32, 22, "RGB32"),
    (VideoSubtype::Argb32, 21, "ARGB32"),
    (VideoSubtype::Rgb24, 20, "RGB24"),
    (VideoSubtype::I420, fourcc(b"I420"), "I420"),
    (VideoSubtype::Iyuv, fourcc(b"IYUV"), "IYUV"),
    (VideoSubtype::Yv12, fourcc(b"YV12"), "YV12"),
    (VideoSubtype::Nv12, fourcc(b"NV12"), "NV12"),
    (VideoSubtype::Nv21, fourcc(b"NV21"), "NV21"),
    (VideoSubtype::Yuy2, fourcc(b"YUY2"), "YUY2"),
    (VideoSubtype::Uyvy, fourcc(b"UYVY"), "UYVY"),
    (VideoSubtype::Ayuv, fourcc(b"AYUV"), "AYUV"),
    (VideoSubtype::P010, fourcc(b"P010"), "P010"),
    (VideoSubtype::P016, fourcc(b"P016"), "P016"),
    (VideoSubtype::P210, fourcc(b"P210"), "P210"),
    (VideoSubtype::P216, fourcc(b"P216"), "P216"),
    (VideoSubtype::V210, fourcc(b"v210"), "v210"),
    (VideoSubtype::V216, fourcc(b"v216"), "v216"),
    (VideoSubtype::V410, fourcc(b"v410"), "v410"),
    (VideoSubtype::Y210, fourcc(b"Y210"), "Y210"),
    (VideoSubtype::Y216, fourcc(b"Y216"), "Y216"),
    (VideoSubtype::Y410, fourcc(b"Y410"), "Y410"),
    (VideoSubtype::Y416, fourcc(b"Y416"), "Y416"),
    (VideoSubtype::Mjpg, fourcc(b"MJPG"), "MJPG"),
    (VideoSubtype::H264, fourcc(b"H264"), "H264"),
    (VideoSubtype::Hevc, fourcc(b"HEVC"), "HEVC"),
];

impl VideoSubtype {
    /// Look up a subtype by FourCC / D3DFORMAT code.
    pub fn from_code(code: u32) -> Option<Self> {
        VIDEO_SUBTYPES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(subtype, _, _)| *subtype)
    }

    pub fn code(self) -> u32 {
        self.entry().1
    }

    pub fn as_str(self) -> &'static str {
        self.entry().2
    }

    pub fn all() -> impl Iterator<Item = VideoSubtype> {
        VIDEO_SUBTYPES.iter().map(|(subtype, _, _)| *subtype)
    }

    fn entry(self) -> &'static (VideoSubtype, u32, &'static str) {
        VIDEO_SUBTYPES
            .iter()
            .find(|(subtype, _, _)| *subtype == self)
            .unwrap_or(&VIDEO_SUBTYPES[0])
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Mjpg | Self::H264 | Self::Hevc)
    }

    /// Minimum stride (bytes per row, no padding) for an image of `width` pixels.
    ///
    /// Returns `None` for compressed layouts, which have no row structure.
    pub fn default_stride(self, width: u32) -> Option<i32> {
        let w = i64::from(width);
        let stride = match self {
            Self::Nv12 | Self::Nv21 | Self::I420 | Self::Iyuv | Self::Yv12 => w,
            Self::P010 | Self::P016 | Self::P210 | Self::P216 | Self::Yuy2 | Self::Uyvy => w * 2,
            Self::Ayuv | Self::Y210 | Self::Y216 | Self::Y410 | Self::V216 | Self::V410 => w * 4,
            Self::Y416 => w * 8,
            // 6 pixels per 16 bytes, rows padded to 128 bytes.
            Self::V210 => (w + 47) / 48 * 128,
            // DIB rows are DWORD aligned.
            Self::Rgb24 => (w * 3 + 3) & !3,
            Self::Rgb32 | Self::Argb32 => w * 4,
            Self::Mjpg | Self::H264 | Self::Hevc => return None,
        };
        i32::try_from(stride).ok().filter(|s| *s != 0)
    }

    /// Planes of a `width` x `height` image in memory order; `None` for compressed layouts.
    pub fn planes(self, width: u32, height: u32) -> Option<Vec<PlaneLayout>> {
        let row_bytes = self.default_stride(width)? as usize;
        let luma = PlaneLayout {
            rows: height,
            row_bytes,
            pitch_divisor: 1,
        };
        let planes = match self {
            // Interleaved chroma at half height, same pitch.
            Self::Nv12 | Self::Nv21 | Self::P010 | Self::P016 => vec![
                luma,
                PlaneLayout {
                    rows: height / 2,
                    ..luma
                },
            ],
            Self::P210 | Self::P216 => vec![luma, luma],
            // U and V at half width and half height; their pitch is half the luma pitch.
            Self::I420 | Self::Iyuv | Self::Yv12 => {
                let chroma = PlaneLayout {
                    rows: height / 2,
                    row_bytes: row_bytes / 2,
                    pitch_divisor: 2,
                };
                vec![luma, chroma, chroma]
            }
            _ => vec![luma],
        };
        Some(planes)
    }
}

/// One plane of an uncompressed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub rows: u32,
    /// Bytes per row without padding.
    pub row_bytes: usize,
    /// The plane's pitch is the buffer stride divided by this.
    pub pitch_divisor: usize,
}

impl PlaneLayout {
    pub fn size(&self) -> usize {
        self.rows as usize * self.row_bytes
    }
}

impl fmt::Display for VideoSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample layout of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioSubtype {
    /// Integer PCM, interleaved.
    #[serde(rename = "PCM")]
    Pcm,
    /// IEEE float PCM, interleaved.
    #[serde(rename = "Float")]
    Float,
    #[serde(rename = "AAC")]
    Aac,
    #[serde(rename = "MP3")]
    Mp3,
}

/// (subtype, WAVE format tag, name).
static AUDIO_SUBTYPES: &[(AudioSubtype, u32, &str)] = &[
    (AudioSubtype::Pcm, 0x0001, "PCM"),
    (AudioSubtype::Float, 0x0003, "Float"),
    (AudioSubtype::Aac, 0x1610, "AAC"),
    (AudioSubtype::Mp3, 0x0055, "MP3"),
];

impl AudioSubtype {
    pub fn from_code(code: u32) -> Option<Self> {
        AUDIO_SUBTYPES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(subtype, _, _)| *subtype)
    }

    pub fn code(self) -> u32 {
        self.entry().1
    }

    pub fn as_str(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (AudioSubtype, u32, &'static str) {
        AUDIO_SUBTYPES
            .iter()
            .find(|(subtype, _, _)| *subtype == self)
            .unwrap_or(&AUDIO_SUBTYPES[0])
    }

    /// Integer or float PCM: raw samples that can be written without decoding.
    pub fn is_pcm_family(self) -> bool {
        matches!(self, Self::Pcm | Self::Float)
    }
}

impl fmt::Display for AudioSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frame rate expressed as a ratio, exactly as the device reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second, or `None` when the denominator is zero.
    pub fn fps(&self) -> Option<f64> {
        if self.denominator == 0 {
            return None;
        }
        Some(f64::from(self.numerator) / f64::from(self.denominator))
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Frame-rate interval some drivers advertise instead of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRateRange {
    pub min: FrameRate,
    pub max: FrameRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoFormat {
    pub subtype: VideoSubtype,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub frame_rate_range: Option<FrameRateRange>,
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {}",
            self.width, self.height, self.subtype, self.frame_rate
        )?;
        if let Some(fps) = self.frame_rate.fps() {
            write!(f, " ({:.2}fps)", fps)?;
        }
        if let Some(range) = self.frame_rate_range {
            write!(f, " range {}..{}", range.min, range.max)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub subtype: AudioSubtype,
    pub channels: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
}

impl AudioFormat {
    /// All three geometry fields are strictly positive.
    pub fn is_complete(&self) -> bool {
        self.channels > 0 && self.sample_rate > 0 && self.bits_per_sample > 0
    }

    /// Bytes per interleaved frame (one sample for every channel).
    pub fn block_align(&self) -> u32 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Multi-channel PCM from capture devices is always interleaved (LRLR...).
        write!(
            f,
            "chn={} {} {}Hz {}bit",
            self.channels, self.subtype, self.sample_rate, self.bits_per_sample
        )
    }
}

/// One natively supported format of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormatDescriptor {
    Video(VideoFormat),
    Audio(AudioFormat),
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video(v) => v.fmt(f),
            Self::Audio(a) => a.fmt(f),
        }
    }
}

/// The format a session ended up with, plus geometry derived at acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NegotiatedFormat {
    Video {
        format: VideoFormat,
        /// Bytes per row; negative means bottom-up row order. Never zero.
        default_stride: i32,
    },
    Audio { format: AudioFormat },
}

impl fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video {
                format,
                default_stride,
            } => write!(f, "{} stride={}", format, default_stride),
            Self::Audio { format } => format.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_round_trip_for_table() {
        assert_eq!(VideoSubtype::from_code(0x3231_564E), Some(VideoSubtype::Nv12));
        assert_eq!(VideoSubtype::Nv12.code(), 0x3231_564E);
        assert_eq!(VideoSubtype::from_code(22), Some(VideoSubtype::Rgb32));
        assert_eq!(VideoSubtype::from_code(fourcc(b"RGBP")), None);
    }

    #[test]
    fn names_come_from_static_table() {
        assert_eq!(VideoSubtype::V210.to_string(), "v210");
        assert_eq!(VideoSubtype::Mjpg.to_string(), "MJPG");
        assert_eq!(AudioSubtype::Float.to_string(), "Float");
        assert_eq!(AudioSubtype::from_code(0x1610), Some(AudioSubtype::Aac));
        assert_eq!(AudioSubtype::from_code(0x0161), None);
        assert_eq!(VideoSubtype::all().count(), 25);
    }

    #[test]
    fn nv12_stride_equals_width() {
        assert_eq!(VideoSubtype::Nv12.default_stride(1280), Some(1280));
        let planes = VideoSubtype::Nv12.planes(1280, 720).unwrap();
        assert_eq!(planes.iter().map(PlaneLayout::size).sum::<usize>(), 1280 * 720 * 3 / 2);
    }

    #[test]
    fn planar_chroma_is_quarter_size() {
        let planes = VideoSubtype::I420.planes(640, 480).unwrap();
        assert_eq!(planes.len(), 3);
        assert_eq!((planes[1].rows, planes[1].row_bytes, planes[1].pitch_divisor), (240, 320, 2));
        assert_eq!(VideoSubtype::P210.planes(8, 4).unwrap()[1].rows, 4);
        let rgb24 = PlaneLayout {
            rows: 2,
            row_bytes: 12,
            pitch_divisor: 1,
        };
        assert_eq!(VideoSubtype::Rgb24.planes(3, 2), Some(vec![rgb24]));
    }

    #[test]
    fn packed_and_rgb_strides() {
        assert_eq!(VideoSubtype::Yuy2.default_stride(640), Some(1280));
        assert_eq!(VideoSubtype::Rgb32.default_stride(640), Some(2560));
        // 3 * 3 = 9 bytes, DWORD aligned to 12.
        assert_eq!(VideoSubtype::Rgb24.default_stride(3), Some(12));
        assert_eq!(VideoSubtype::V210.default_stride(1920), Some(5120));
        assert_eq!(VideoSubtype::Y416.default_stride(10), Some(80));
    }

    #[test]
    fn compressed_has_no_stride() {
        assert_eq!(VideoSubtype::Mjpg.default_stride(1280), None);
        assert_eq!(VideoSubtype::H264.planes(1280, 720), None);
        assert_eq!(VideoSubtype::Nv12.default_stride(0), None);
    }

    #[test]
    fn frame_rate_guards_zero_denominator() {
        assert_eq!(FrameRate::new(30, 0).fps(), None);
        assert_eq!(FrameRate::new(30000, 1001).to_string(), "30000/1001");
        approx::assert_relative_eq!(FrameRate::new(30000, 1001).fps().unwrap(), 29.97, epsilon = 0.01);
    }

    #[test]
    fn audio_geometry() {
        let format = AudioFormat {
            subtype: AudioSubtype::Pcm,
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
        };
        assert!(format.is_complete());
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.byte_rate(), 192000);
        assert_eq!(format.to_string(), "chn=2 PCM 48000Hz 16bit");

        let partial = AudioFormat { channels: 0, ..format };
        assert!(!partial.is_complete());
    }

    #[test]
    fn video_format_display() {
        let format = VideoFormat {
            subtype: VideoSubtype::Nv12,
            width: 1280,
            height: 720,
            frame_rate: FrameRate::new(30, 1),
            frame_rate_range: None,
        };
        assert_eq!(format.to_string(), "1280x720 NV12 30/1 (30.00fps)");
    }

    #[test]
    fn descriptor_serializes_with_kind_tag() {
        let descriptor = FormatDescriptor::Audio(AudioFormat {
            subtype: AudioSubtype::Float,
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
        });
        let json = serde_json::to_value(descriptor).unwrap();
        assert_eq!(json["kind"], "audio");
        assert_eq!(json["subtype"], "Float");

        let video = serde_json::to_value(VideoSubtype::Nv12).unwrap();
        assert_eq!(video, "NV12");
    }
}
