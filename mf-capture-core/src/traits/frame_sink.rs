use std::borrow::Cow;

use crate::models::error::CaptureError;
use crate::models::format::{NegotiatedFormat, PlaneLayout, VideoSubtype};

/// A locked video frame, valid only for the duration of one sink call.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    /// The locked region in memory order.
    pub data: &'a [u8],
    /// Offset of scan line 0 (the top row of the image) within `data`.
    pub scan_line0: usize,
    /// Bytes between successive image rows; negative for bottom-up storage.
    pub stride: i32,
    pub width: u32,
    pub height: u32,
    pub subtype: VideoSubtype,
    /// The buffer's actual stride equals the stride cached at negotiation.
    pub stride_is_expected: bool,
}

impl<'a> VideoFrame<'a> {
    /// Image row `y` (0 = top), `|stride|` bytes long.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let pitch = self.stride.unsigned_abs() as usize;
        let offset = if self.stride < 0 {
            self.scan_line0.checked_sub(y as usize * pitch)?
        } else {
            self.scan_line0 + y as usize * pitch
        };
        self.data.get(offset..offset + pitch)
    }

    /// The frame's bytes in image order, all planes included, rows without padding.
    ///
    /// Top-down frames whose pitch has no padding borrow the locked memory;
    /// padded and bottom-up frames are copied row by row. Compressed frames
    /// are everything from scan line 0 on. `None` when the buffer is too short
    /// or a bottom-up frame has more than one plane.
    pub fn image_bytes(&self) -> Option<Cow<'a, [u8]>> {
        let Some(planes) = self.subtype.planes(self.width, self.height) else {
            return self.data.get(self.scan_line0..).map(Cow::Borrowed);
        };
        let total: usize = planes.iter().map(PlaneLayout::size).sum();

        if self.stride < 0 {
            let [plane] = planes.as_slice() else {
                return None;
            };
            let mut bytes = Vec::with_capacity(total);
            for y in 0..self.height {
                bytes.extend_from_slice(self.row(y)?.get(..plane.row_bytes)?);
            }
            return Some(Cow::Owned(bytes));
        }

        let pitch = self.stride as usize;
        if planes.iter().all(|p| pitch / p.pitch_divisor == p.row_bytes) {
            return self
                .data
                .get(self.scan_line0..self.scan_line0.checked_add(total)?)
                .map(Cow::Borrowed);
        }

        let mut bytes = Vec::with_capacity(total);
        let mut offset = self.scan_line0;
        for plane in &planes {
            let plane_pitch = pitch / plane.pitch_divisor;
            if plane_pitch < plane.row_bytes {
                return None;
            }
            for _ in 0..plane.rows {
                bytes.extend_from_slice(self.data.get(offset..offset + plane.row_bytes)?);
                offset += plane_pitch;
            }
        }
        Some(Cow::Owned(bytes))
    }
}

/// Destination for captured samples.
///
/// Calls are made on the platform's delivery thread with the session lock
/// held; keep them short. Returned errors are logged by the session and
/// never affect delivery.
pub trait FrameSink: Send + Sync {
    /// Called once per successful `start`, before any frame.
    fn on_format_negotiated(&self, _format: &NegotiatedFormat) -> Result<(), CaptureError> {
        Ok(())
    }

    fn on_video_frame(&self, frame: &VideoFrame<'_>) -> Result<(), CaptureError>;

    fn on_audio_frame(&self, data: &[u8]) -> Result<(), CaptureError>;
}
