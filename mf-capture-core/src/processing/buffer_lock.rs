//! RAII locks over platform sample buffers.
//!
//! Each guard unlocks exactly once, matching whichever lock it took, and
//! never unlocks after a failed lock.

use crate::models::error::StatusCode;
use crate::traits::platform::{Buffer2D, Locked2D, MediaBuffer};

#[derive(Clone, Copy)]
enum Held {
    None,
    Linear,
    TwoD,
}

/// Locks a video buffer through its 2-D view when the buffer has one,
/// otherwise through the flat lock with scan line 0 computed by hand.
pub struct VideoBufferLock<'a> {
    buffer: &'a dyn MediaBuffer,
    two_d: Option<&'a dyn Buffer2D>,
    held: Held,
}

impl<'a> VideoBufferLock<'a> {
    pub fn new(buffer: &'a dyn MediaBuffer) -> Self {
        Self {
            buffer,
            two_d: buffer.as_2d(),
            held: Held::None,
        }
    }

    /// Whether this buffer is locked through its row-addressable view.
    pub fn is_two_dimensional(&self) -> bool {
        self.two_d.is_some()
    }

    /// Lock and locate scan line 0.
    ///
    /// `default_stride` and `height` are only used for buffers without a 2-D
    /// view: a negative stride means the image is stored bottom-up, so scan
    /// line 0 is the last row in memory.
    pub fn lock(&mut self, default_stride: i32, height: u32) -> Result<Locked2D<'_>, StatusCode> {
        self.unlock();

        if let Some(two_d) = self.two_d {
            let locked = two_d.lock_2d(height)?;
            self.held = Held::TwoD;
            return Ok(locked);
        }

        let buffer = self.buffer;
        let bytes = buffer.lock()?;
        self.held = Held::Linear;
        let scan_line0 = if default_stride < 0 {
            default_stride.unsigned_abs() as usize * height.saturating_sub(1) as usize
        } else {
            0
        };
        Ok(Locked2D {
            bytes,
            scan_line0,
            stride: default_stride,
        })
    }

    pub fn unlock(&mut self) {
        match std::mem::replace(&mut self.held, Held::None) {
            Held::None => {}
            Held::Linear => self.buffer.unlock(),
            Held::TwoD => {
                if let Some(two_d) = self.two_d {
                    two_d.unlock_2d();
                }
            }
        }
    }
}

impl Drop for VideoBufferLock<'_> {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// Flat lock over an audio (or any contiguous) buffer.
pub struct LinearBufferLock<'a> {
    buffer: &'a dyn MediaBuffer,
    data: &'a [u8],
}

impl<'a> LinearBufferLock<'a> {
    pub fn lock(buffer: &'a dyn MediaBuffer) -> Result<Self, StatusCode> {
        let data = buffer.lock()?;
        Ok(Self { buffer, data })
    }

    /// The valid bytes of the buffer.
    pub fn data(&self) -> &[u8] {
        self.data
    }
}

impl Drop for LinearBufferLock<'_> {
    fn drop(&mut self) {
        self.buffer.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBuffer;

    #[test]
    fn prefers_two_d_view() {
        let buffer = MockBuffer::two_d(vec![1; 64], 48, -16);
        {
            let mut guard = VideoBufferLock::new(&buffer);
            assert!(guard.is_two_dimensional());
            let locked = guard.lock(16, 4).unwrap();
            assert_eq!(locked.stride, -16);
            assert_eq!(locked.scan_line0, 48);
        }
        assert_eq!(buffer.counters.get(), (0, 0, 1, 1));
    }

    #[test]
    fn linear_top_down_starts_at_buffer_start() {
        let buffer = MockBuffer::linear((0..64).collect());
        {
            let mut guard = VideoBufferLock::new(&buffer);
            let locked = guard.lock(16, 4).unwrap();
            assert_eq!(locked.scan_line0, 0);
            assert_eq!(locked.stride, 16);
        }
        assert_eq!(buffer.counters.get(), (1, 1, 0, 0));
    }

    #[test]
    fn linear_bottom_up_starts_at_last_row() {
        let buffer = MockBuffer::linear((0..64).collect());
        let mut guard = VideoBufferLock::new(&buffer);
        let locked = guard.lock(-16, 4).unwrap();
        assert_eq!(locked.scan_line0, 48);
        assert_eq!(locked.bytes[locked.scan_line0], 48);
    }

    #[test]
    fn failed_lock_is_never_unlocked() {
        let mut buffer = MockBuffer::linear(vec![0; 16]);
        buffer.fail_lock = true;
        {
            let mut guard = VideoBufferLock::new(&buffer);
            assert_eq!(guard.lock(4, 4).unwrap_err(), StatusCode::FAIL);
        }
        assert_eq!(buffer.counters.get(), (0, 0, 0, 0));

        let mut buffer = MockBuffer::two_d(vec![0; 16], 0, 4);
        buffer.fail_lock_2d = true;
        {
            let mut guard = VideoBufferLock::new(&buffer);
            assert!(guard.lock(4, 4).is_err());
        }
        assert_eq!(buffer.counters.get(), (0, 0, 0, 0));

        assert!(LinearBufferLock::lock(&MockBuffer {
            fail_lock: true,
            ..MockBuffer::linear(vec![])
        })
        .is_err());
    }

    #[test]
    fn explicit_unlock_then_drop_unlocks_once() {
        let buffer = MockBuffer::linear(vec![0; 16]);
        {
            let mut guard = VideoBufferLock::new(&buffer);
            guard.lock(4, 4).unwrap();
            guard.unlock();
            guard.unlock();
        }
        assert_eq!(buffer.counters.get(), (1, 1, 0, 0));
    }

    #[test]
    fn linear_lock_balances() {
        let buffer = MockBuffer::linear(vec![9; 10]);
        {
            let guard = LinearBufferLock::lock(&buffer).unwrap();
            assert_eq!(guard.data().len(), 10);
        }
        assert_eq!(buffer.counters.get(), (1, 1, 0, 0));
    }
}
