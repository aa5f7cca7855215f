//! In-memory platform used by unit tests across the crate.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::device::{DeviceKind, MajorType, StreamSelector};
use crate::models::error::{CaptureError, StatusCode};
use crate::models::format::{
    AudioSubtype, FrameRate, FrameRateRange, NegotiatedFormat, VideoSubtype,
};
use crate::models::state::SessionState;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::frame_sink::{FrameSink, VideoFrame};
use crate::traits::platform::{
    Buffer2D, DeviceActivation, DeviceBackend, Locked2D, MediaBuffer, MediaSample, MediaSource,
    MediaType, ReadSampleCallback, ReaderConfig, SourceReader, StreamFlags,
};

// --- media types ---

#[derive(Clone)]
pub struct MockMediaType {
    pub major: MajorType,
    pub code: Option<u32>,
    pub frame_size: Option<(u32, u32)>,
    pub frame_rate: Option<FrameRate>,
    pub frame_rate_range: Option<FrameRateRange>,
    pub stride: Arc<Mutex<Option<i32>>>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u32>,
}

impl MockMediaType {
    pub fn video(subtype: VideoSubtype, width: u32, height: u32, num: u32, den: u32) -> Self {
        Self {
            major: MajorType::Video,
            code: Some(subtype.code()),
            frame_size: Some((width, height)),
            frame_rate: Some(FrameRate::new(num, den)),
            frame_rate_range: None,
            stride: Arc::new(Mutex::new(None)),
            channels: None,
            sample_rate: None,
            bits_per_sample: None,
        }
    }

    pub fn audio(subtype: AudioSubtype, channels: u32, sample_rate: u32, bits: u32) -> Self {
        Self {
            major: MajorType::Audio,
            code: Some(subtype.code()),
            frame_size: None,
            frame_rate: None,
            frame_rate_range: None,
            stride: Arc::new(Mutex::new(None)),
            channels: Some(channels),
            sample_rate: Some(sample_rate),
            bits_per_sample: Some(bits),
        }
    }

    pub fn with_stride(self, stride: i32) -> Self {
        *self.stride.lock() = Some(stride);
        self
    }

    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn declared_stride(&self) -> Option<i32> {
        *self.stride.lock()
    }
}

impl MediaType for MockMediaType {
    fn major_type(&self) -> Option<MajorType> {
        Some(self.major)
    }

    fn subtype_code(&self) -> Option<u32> {
        self.code
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    fn frame_rate(&self) -> Option<FrameRate> {
        self.frame_rate
    }

    fn frame_rate_range(&self) -> Option<FrameRateRange> {
        self.frame_rate_range
    }

    fn default_stride(&self) -> Option<i32> {
        *self.stride.lock()
    }

    fn set_default_stride(&self, stride: i32) -> Result<(), CaptureError> {
        *self.stride.lock() = Some(stride);
        Ok(())
    }

    fn audio_channels(&self) -> Option<u32> {
        self.channels
    }

    fn audio_sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    fn audio_bits_per_sample(&self) -> Option<u32> {
        self.bits_per_sample
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- reader / source ---

/// `MF_E_SHUTDOWN`: the object was shut down.
pub const SHUT_DOWN: StatusCode = StatusCode(0xC00D_3E85_u32 as i32);

/// Observable state shared between a mock source, its readers and the test.
#[derive(Default)]
pub struct MockPlatformState {
    pub applied: Mutex<Vec<u32>>,
    pub read_requests: AtomicUsize,
    pub readers_created: AtomicUsize,
    pub readers_released: AtomicUsize,
    pub shutdowns: AtomicUsize,
    /// Set once the device is shut down; it accepts no further subscriptions.
    pub shut_down: AtomicBool,
    pub disable_converters: Mutex<Option<bool>>,
    pub disconnect_on_release: Mutex<Option<bool>>,
    pub callback: Mutex<Option<Weak<dyn ReadSampleCallback>>>,
    /// Read requests with an index >= this value fail.
    pub fail_read_from: Mutex<Option<usize>>,
    pub fail_create_reader: Mutex<bool>,
    /// Native type indexes whose `set_current_media_type` fails.
    pub reject_apply: Mutex<Vec<u32>>,
}

impl MockPlatformState {
    pub fn callback(&self) -> Option<Arc<dyn ReadSampleCallback>> {
        self.callback.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn reads(&self) -> usize {
        self.read_requests.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<u32> {
        self.applied.lock().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn shut_down_device(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

pub struct MockReader {
    natives: Vec<MockMediaType>,
    state: Arc<MockPlatformState>,
    disconnect: bool,
    _callback: Arc<dyn ReadSampleCallback>,
}

impl SourceReader for MockReader {
    fn native_media_type(&self, _stream: StreamSelector, index: u32) -> Option<Box<dyn MediaType>> {
        self.natives
            .get(index as usize)
            .map(|t| Box::new(t.clone()) as Box<dyn MediaType>)
    }

    fn set_current_media_type(
        &self,
        _stream: StreamSelector,
        media_type: &dyn MediaType,
    ) -> Result<(), CaptureError> {
        let mock = media_type
            .as_any()
            .downcast_ref::<MockMediaType>()
            .ok_or_else(|| CaptureError::resource("foreign media type", StatusCode::FAIL))?;
        let index = self
            .natives
            .iter()
            .position(|t| Arc::ptr_eq(&t.stride, &mock.stride))
            .ok_or_else(|| CaptureError::resource("unknown media type", StatusCode::FAIL))?
            as u32;
        if self.state.reject_apply.lock().contains(&index) {
            return Err(CaptureError::resource("SetCurrentMediaType", StatusCode::FAIL));
        }
        self.state.applied.lock().push(index);
        Ok(())
    }

    fn read_sample(&self, _stream: StreamSelector) -> Result<(), CaptureError> {
        let n = self.state.read_requests.fetch_add(1, Ordering::SeqCst);
        match *self.state.fail_read_from.lock() {
            Some(limit) if n >= limit => Err(CaptureError::Delivery(StatusCode::FAIL)),
            _ => Ok(()),
        }
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.state.readers_released.fetch_add(1, Ordering::SeqCst);
        // Like the platform default, a reader owns its device unless disconnected.
        if !self.disconnect {
            self.state.shut_down_device();
        }
    }
}

pub struct MockStream {
    pub major: MajorType,
    pub types: Vec<MockMediaType>,
}

pub struct MockSource {
    pub streams: Vec<MockStream>,
    pub fail_presentation: bool,
    pub state: Arc<MockPlatformState>,
}

impl MockSource {
    /// A source with one stream of `major` whose native list is `types`.
    pub fn new(major: MajorType, types: Vec<MockMediaType>) -> Self {
        Self {
            streams: vec![MockStream { major, types }],
            fail_presentation: false,
            state: Arc::new(MockPlatformState::default()),
        }
    }

    fn first_stream_types(&self, kind: MajorType) -> Vec<MockMediaType> {
        self.streams
            .iter()
            .find(|s| s.major == kind)
            .map(|s| s.types.clone())
            .unwrap_or_default()
    }
}

impl MediaSource for MockSource {
    fn stream_count(&self) -> Result<u32, CaptureError> {
        if self.fail_presentation {
            return Err(CaptureError::resource("CreatePresentationDescriptor", StatusCode::FAIL));
        }
        Ok(self.streams.len() as u32)
    }

    fn stream_major_type(&self, stream: u32) -> Result<MajorType, CaptureError> {
        self.streams
            .get(stream as usize)
            .map(|s| s.major)
            .ok_or_else(|| CaptureError::resource("GetStreamDescriptorByIndex", StatusCode::FAIL))
    }

    fn stream_media_types(&self, stream: u32) -> Result<Vec<Box<dyn MediaType>>, CaptureError> {
        let stream = self
            .streams
            .get(stream as usize)
            .ok_or_else(|| CaptureError::resource("GetStreamDescriptorByIndex", StatusCode::FAIL))?;
        Ok(stream
            .types
            .iter()
            .map(|t| Box::new(t.clone()) as Box<dyn MediaType>)
            .collect())
    }

    fn create_source_reader(&self, config: ReaderConfig) -> Result<Box<dyn SourceReader>, CaptureError> {
        if *self.state.fail_create_reader.lock() {
            return Err(CaptureError::resource("MFCreateSourceReaderFromMediaSource", StatusCode::FAIL));
        }
        if self.state.is_shut_down() {
            return Err(CaptureError::resource("MFCreateSourceReaderFromMediaSource", SHUT_DOWN));
        }
        *self.state.disable_converters.lock() = Some(config.disable_converters);
        *self.state.disconnect_on_release.lock() = Some(config.disconnect_source_on_release);
        *self.state.callback.lock() = Some(Arc::downgrade(&config.callback));
        self.state.readers_created.fetch_add(1, Ordering::SeqCst);

        let major = self
            .streams
            .first()
            .map(|s| s.major)
            .unwrap_or(MajorType::Other);
        Ok(Box::new(MockReader {
            natives: self.first_stream_types(major),
            state: Arc::clone(&self.state),
            disconnect: config.disconnect_source_on_release,
            _callback: config.callback,
        }))
    }

    fn shutdown(&self) -> Result<(), CaptureError> {
        self.state.shut_down_device();
        Ok(())
    }
}

// --- samples / buffers ---

#[derive(Default)]
pub struct LockCounters {
    pub locks: AtomicUsize,
    pub unlocks: AtomicUsize,
    pub locks_2d: AtomicUsize,
    pub unlocks_2d: AtomicUsize,
}

impl LockCounters {
    pub fn get(&self) -> (usize, usize, usize, usize) {
        (
            self.locks.load(Ordering::SeqCst),
            self.unlocks.load(Ordering::SeqCst),
            self.locks_2d.load(Ordering::SeqCst),
            self.unlocks_2d.load(Ordering::SeqCst),
        )
    }
}

#[derive(Clone)]
pub struct MockBuffer {
    pub data: Vec<u8>,
    /// `Some((scan_line0, stride))` when the buffer exposes a 2-D view.
    pub two_d: Option<(usize, i32)>,
    pub fail_lock: bool,
    pub fail_lock_2d: bool,
    pub counters: Arc<LockCounters>,
}

impl MockBuffer {
    pub fn linear(data: Vec<u8>) -> Self {
        Self {
            data,
            two_d: None,
            fail_lock: false,
            fail_lock_2d: false,
            counters: Arc::new(LockCounters::default()),
        }
    }

    pub fn two_d(data: Vec<u8>, scan_line0: usize, stride: i32) -> Self {
        Self {
            two_d: Some((scan_line0, stride)),
            ..Self::linear(data)
        }
    }
}

impl MediaBuffer for MockBuffer {
    fn lock(&self) -> Result<&[u8], StatusCode> {
        if self.fail_lock {
            return Err(StatusCode::FAIL);
        }
        self.counters.locks.fetch_add(1, Ordering::SeqCst);
        Ok(&self.data)
    }

    fn unlock(&self) {
        self.counters.unlocks.fetch_add(1, Ordering::SeqCst);
    }

    fn as_2d(&self) -> Option<&dyn Buffer2D> {
        self.two_d.map(|_| self as &dyn Buffer2D)
    }
}

impl Buffer2D for MockBuffer {
    fn lock_2d(&self, _height: u32) -> Result<Locked2D<'_>, StatusCode> {
        let (scan_line0, stride) = self.two_d.ok_or(StatusCode::FAIL)?;
        if self.fail_lock_2d {
            return Err(StatusCode::FAIL);
        }
        self.counters.locks_2d.fetch_add(1, Ordering::SeqCst);
        Ok(Locked2D {
            bytes: &self.data,
            scan_line0,
            stride,
        })
    }

    fn unlock_2d(&self) {
        self.counters.unlocks_2d.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockSample {
    pub buffers: Vec<MockBuffer>,
}

impl MockSample {
    pub fn with_buffer(buffer: MockBuffer) -> Self {
        Self {
            buffers: vec![buffer],
        }
    }
}

impl MediaSample for MockSample {
    fn buffer_count(&self) -> Result<u32, StatusCode> {
        Ok(self.buffers.len() as u32)
    }

    fn buffer(&self, index: u32) -> Result<Box<dyn MediaBuffer>, StatusCode> {
        self.buffers
            .get(index as usize)
            .cloned()
            .map(|b| Box::new(b) as Box<dyn MediaBuffer>)
            .ok_or(StatusCode::FAIL)
    }
}

/// Fire one completion at whatever callback the source's last reader registered.
pub fn deliver(
    state: &MockPlatformState,
    status: StatusCode,
    flags: StreamFlags,
    sample: Option<&MockSample>,
) {
    let callback = state.callback().expect("no callback registered");
    callback.on_read_sample(status, flags, 0, sample.map(|s| s as &dyn MediaSample));
}

// --- sink / delegate ---

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    pub stride: i32,
    pub stride_is_expected: bool,
    pub first_row: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingSink {
    pub formats: Mutex<Vec<NegotiatedFormat>>,
    pub frames: Mutex<Vec<RecordedFrame>>,
    pub audio: Mutex<Vec<Vec<u8>>>,
    pub fail: Mutex<bool>,
}

impl RecordingSink {
    pub fn calls(&self) -> usize {
        self.frames.lock().len() + self.audio.lock().len()
    }
}

impl FrameSink for RecordingSink {
    fn on_format_negotiated(&self, format: &NegotiatedFormat) -> Result<(), CaptureError> {
        self.formats.lock().push(*format);
        Ok(())
    }

    fn on_video_frame(&self, frame: &VideoFrame<'_>) -> Result<(), CaptureError> {
        self.frames.lock().push(RecordedFrame {
            width: frame.width,
            height: frame.height,
            stride: frame.stride,
            stride_is_expected: frame.stride_is_expected,
            first_row: frame.row(0).map(<[u8]>::to_vec).unwrap_or_default(),
        });
        if *self.fail.lock() {
            return Err(CaptureError::StorageError("sink failure".into()));
        }
        Ok(())
    }

    fn on_audio_frame(&self, data: &[u8]) -> Result<(), CaptureError> {
        self.audio.lock().push(data.to_vec());
        if *self.fail.lock() {
            return Err(CaptureError::StorageError("sink failure".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<SessionState>>,
    pub failures: Mutex<Vec<StatusCode>>,
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_delivery_failed(&self, status: StatusCode) {
        self.failures.lock().push(status);
    }
}

// --- devices ---

pub struct MockActivation {
    pub name: Result<String, CaptureError>,
    pub identity: Result<String, CaptureError>,
    pub endpoint: Option<String>,
    pub source: Option<Arc<MockSource>>,
}

impl MockActivation {
    pub fn new(name: &str, identity: &str, source: MockSource) -> Self {
        Self {
            name: Ok(name.into()),
            identity: Ok(identity.into()),
            endpoint: None,
            source: Some(Arc::new(source)),
        }
    }
}

impl DeviceActivation for MockActivation {
    fn friendly_name(&self) -> Result<String, CaptureError> {
        self.name.clone()
    }

    fn identity(&self) -> Result<String, CaptureError> {
        self.identity.clone()
    }

    fn audio_endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }

    fn activate(&self) -> Result<Arc<dyn MediaSource>, CaptureError> {
        self.source
            .clone()
            .map(|s| s as Arc<dyn MediaSource>)
            .ok_or_else(|| CaptureError::resource("ActivateObject", StatusCode::FAIL))
    }
}

pub struct MockBackend {
    pub devices: Mutex<Vec<(DeviceKind, MockActivationFactory)>>,
    pub fail_enumeration: bool,
}

/// Factory so each `enumerate` call produces fresh activations.
pub type MockActivationFactory = Box<dyn Fn() -> MockActivation + Send + Sync>;

impl MockBackend {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            fail_enumeration: false,
        }
    }

    pub fn add(&self, kind: DeviceKind, factory: impl Fn() -> MockActivation + Send + Sync + 'static) {
        self.devices.lock().push((kind, Box::new(factory)));
    }
}

impl DeviceBackend for MockBackend {
    fn enumerate(&self, kind: DeviceKind) -> Result<Vec<Box<dyn DeviceActivation>>, CaptureError> {
        if self.fail_enumeration {
            return Err(CaptureError::resource("MFEnumDeviceSources", StatusCode::FAIL));
        }
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, factory)| Box::new(factory()) as Box<dyn DeviceActivation>)
            .collect())
    }

    fn open_device(
        &self,
        kind: DeviceKind,
        identity: &str,
        _name: Option<&str>,
    ) -> Result<Arc<dyn MediaSource>, CaptureError> {
        let devices = self.devices.lock();
        for (k, factory) in devices.iter() {
            if *k != kind {
                continue;
            }
            let activation = factory();
            // Either subsystem's identity resolves: match ignoring the interface class suffix.
            let known = activation.identity.clone().unwrap_or_default();
            if same_device(&known, identity) {
                return activation.activate();
            }
        }
        Err(CaptureError::DeviceNotAvailable(identity.to_string()))
    }
}

fn same_device(a: &str, b: &str) -> bool {
    let stem = |s: &str| s.split("#{").next().unwrap_or(s).to_ascii_lowercase();
    stem(a) == stem(b)
}
