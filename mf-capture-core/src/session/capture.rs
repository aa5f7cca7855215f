use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::directory::device_directory::DeviceDirectory;
use crate::models::capture_metadata::SessionDiagnostics;
use crate::models::config::VideoTarget;
use crate::models::device::DeviceKind;
use crate::models::error::{CaptureError, StatusCode};
use crate::models::format::NegotiatedFormat;
use crate::models::state::SessionState;
use crate::negotiation::negotiator::FormatNegotiator;
use crate::processing::buffer_lock::{LinearBufferLock, VideoBufferLock};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::frame_sink::{FrameSink, VideoFrame};
use crate::traits::platform::{
    DeviceBackend, MediaSample, MediaSource, ReadSampleCallback, ReaderConfig, SourceReader,
    StreamFlags,
};

/// Mutable session state, protected by one `parking_lot::Mutex` that also
/// serializes the whole delivery callback against `start` and `stop`.
struct SessionInner {
    state: SessionState,
    source: Option<Arc<dyn MediaSource>>,
    reader: Option<Box<dyn SourceReader>>,
    target: VideoTarget,
    negotiated: Option<NegotiatedFormat>,
    diagnostics: SessionDiagnostics,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

/// Events collected under the lock and delivered to the delegate after it is released.
enum Notice {
    State(SessionState),
    DeliveryFailed(StatusCode),
}

/// Single-device, single-format capture session.
///
/// Always lives in an `Arc`: the platform keeps its own strong reference as
/// the asynchronous delivery target while a subscription exists. Owners
/// should hold a [`CaptureHandle`], which stops the session when dropped.
///
/// ```text
/// Idle ──start──▶ Starting ──primed──▶ Delivering ──stop──▶ Idle
///                    │
///                    └─ negotiation / subscription / priming failure ─▶ Idle
/// ```
pub struct CaptureSession {
    kind: DeviceKind,
    identity: String,
    name: String,
    sink: Arc<dyn FrameSink>,
    inner: Mutex<SessionInner>,
}

impl CaptureSession {
    pub fn new(
        kind: DeviceKind,
        identity: impl Into<String>,
        name: impl Into<String>,
        source: Arc<dyn MediaSource>,
        sink: Arc<dyn FrameSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            identity: identity.into(),
            name: name.into(),
            sink,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                source: Some(source),
                reader: None,
                target: VideoTarget::default(),
                negotiated: None,
                diagnostics: SessionDiagnostics::default(),
                delegate: None,
            }),
        })
    }

    /// Resolve `identity` through `directory` and wrap the device in an idle session.
    pub fn open<B: DeviceBackend>(
        directory: &DeviceDirectory<B>,
        kind: DeviceKind,
        identity: &str,
        name: &str,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Arc<Self>, CaptureError> {
        let source = directory.resolve(kind, identity, Some(name))?;
        log::info!("opened {} device \"{}\"", kind, name);
        Ok(Self::new(kind, identity, name, source, sink))
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.inner.lock().diagnostics.clone()
    }

    pub fn negotiated_format(&self) -> Option<NegotiatedFormat> {
        self.inner.lock().negotiated
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        self.inner.lock().delegate = Some(delegate);
    }

    /// Change the video target used by the next `start`. Idle sessions only.
    pub fn set_video_target(&self, target: VideoTarget) -> Result<(), CaptureError> {
        target.validate().map_err(CaptureError::ConfigurationFailed)?;
        let mut inner = self.inner.lock();
        if !inner.state.is_idle() {
            return Err(CaptureError::PreconditionViolation(format!(
                "cannot change the video target while {}",
                inner.state
            )));
        }
        inner.target = target;
        Ok(())
    }

    /// Subscribe to the device, negotiate a format and prime the delivery loop.
    ///
    /// Rejected without side effects unless the session is idle with a device
    /// and no subscription. A negotiation failure releases the subscription but
    /// keeps the device, so the caller may retry with another target. A
    /// priming failure shuts the device down and releases everything.
    pub fn start(self: &Arc<Self>) -> Result<(), CaptureError> {
        let mut notices = Vec::new();
        let mut released: Option<Box<dyn SourceReader>> = None;
        let mut released_source: Option<Arc<dyn MediaSource>> = None;

        let (result, delegate) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_idle() {
                return Err(CaptureError::PreconditionViolation(format!(
                    "start while {}",
                    inner.state
                )));
            }
            if inner.reader.is_some() {
                return Err(CaptureError::PreconditionViolation(
                    "a delivery subscription already exists".into(),
                ));
            }
            let Some(source) = inner.source.clone() else {
                return Err(CaptureError::PreconditionViolation(
                    "session has no device".into(),
                ));
            };

            inner.state = SessionState::Starting;
            notices.push(Notice::State(SessionState::Starting));
            inner.diagnostics = SessionDiagnostics::default();

            let outcome = self.start_locked(&mut inner, source.as_ref());
            if let Err(e) = &outcome {
                log::warn!("{} \"{}\": start failed: {}", self.kind, self.name, e);
                released = inner.reader.take();
                inner.negotiated = None;
                if matches!(e, CaptureError::Delivery(_)) {
                    released_source = inner.source.take();
                }
                inner.state = SessionState::Idle;
                notices.push(Notice::State(SessionState::Idle));
            } else {
                notices.push(Notice::State(SessionState::Delivering));
            }
            (outcome, inner.delegate.clone())
        };

        // Subscription before device.
        drop(released);
        drop(released_source);

        deliver_notices(delegate.as_deref(), notices);
        result.map_err(|e| match e {
            CaptureError::Delivery(status) => CaptureError::resource("priming read request", status),
            other => other,
        })
    }

    fn start_locked(
        self: &Arc<Self>,
        inner: &mut SessionInner,
        source: &dyn MediaSource,
    ) -> Result<(), CaptureError> {
        let callback: Arc<dyn ReadSampleCallback> = Arc::clone(self) as Arc<dyn ReadSampleCallback>;
        let reader = source.create_source_reader(ReaderConfig {
            disable_converters: true,
            disconnect_source_on_release: true,
            callback,
        })?;
        let reader = inner.reader.insert(reader);

        let negotiated = FormatNegotiator::new(reader.as_ref(), self.kind).negotiate(&inner.target)?;
        inner.negotiated = Some(negotiated);
        if let Err(e) = self.sink.on_format_negotiated(&negotiated) {
            log::warn!("sink rejected negotiated format {}: {}", negotiated, e);
        }

        inner.state = SessionState::Delivering;
        if let Err(e) = reader.read_sample(self.kind.first_stream()) {
            if let Err(shutdown) = source.shutdown() {
                log::warn!("device shutdown after failed priming: {}", shutdown);
            }
            return Err(CaptureError::Delivery(e.status().unwrap_or(StatusCode::FAIL)));
        }

        log::info!("{} \"{}\" delivering {}", self.kind, self.name, negotiated);
        Ok(())
    }

    /// Release the subscription, then the device. Idempotent.
    ///
    /// Once this returns no further sink call or read request happens: a
    /// callback already waiting on the session lock observes `Idle` and returns.
    pub fn stop(&self) {
        let (reader, source, was, delegate) = {
            let mut inner = self.inner.lock();
            let was = inner.state;
            inner.state = SessionState::Idle;
            (inner.reader.take(), inner.source.take(), was, inner.delegate.clone())
        };

        drop(reader);
        if let Some(source) = source {
            if let Err(e) = source.shutdown() {
                log::debug!("device shutdown on stop: {}", e);
            }
            drop(source);
            log::info!("{} \"{}\" stopped", self.kind, self.name);
        }

        if !was.is_idle() {
            deliver_notices(delegate.as_deref(), vec![Notice::State(SessionState::Idle)]);
        }
    }

    /// Buffer 0 of `sample` to the sink. `Err` halts the delivery loop.
    fn handle_sample(
        &self,
        inner: &mut SessionInner,
        timestamp: i64,
        sample: &dyn MediaSample,
    ) -> Result<(), StatusCode> {
        inner.diagnostics.samples_delivered += 1;
        inner.diagnostics.last_timestamp = Some(timestamp);
        log::trace!("{} sample @{}", self.kind, timestamp);

        let count = sample.buffer_count()?;
        if count > 1 {
            inner.diagnostics.multi_buffer_samples += 1;
            log::debug!("{} sample has {} buffers, delivering the first", self.kind, count);
        }
        let buffer = sample.buffer(0)?;
        let delivered = match inner.negotiated {
            Some(NegotiatedFormat::Video {
                format,
                default_stride,
            }) => {
                let mut guard = VideoBufferLock::new(buffer.as_ref());
                match guard.lock(default_stride, format.height) {
                    Ok(locked) => {
                        let frame = VideoFrame {
                            data: locked.bytes,
                            scan_line0: locked.scan_line0,
                            stride: locked.stride,
                            width: format.width,
                            height: format.height,
                            subtype: format.subtype,
                            stride_is_expected: locked.stride == default_stride,
                        };
                        Some((locked.bytes.len(), self.sink.on_video_frame(&frame)))
                    }
                    Err(status) => {
                        log::warn!("video buffer lock failed: {}", status);
                        None
                    }
                }
            }
            Some(NegotiatedFormat::Audio { .. }) => match LinearBufferLock::lock(buffer.as_ref()) {
                Ok(guard) => Some((guard.data().len(), self.sink.on_audio_frame(guard.data()))),
                Err(status) => {
                    log::warn!("audio buffer lock failed: {}", status);
                    None
                }
            },
            None => None,
        };

        match delivered {
            Some((bytes, result)) => {
                inner.diagnostics.bytes_delivered += bytes as u64;
                if let Err(e) = result {
                    inner.diagnostics.sink_failures += 1;
                    log::warn!("sink failed: {}", e);
                }
            }
            None => inner.diagnostics.lock_failures += 1,
        }
        Ok(())
    }
}

impl ReadSampleCallback for CaptureSession {
    fn on_read_sample(
        &self,
        status: StatusCode,
        flags: StreamFlags,
        timestamp: i64,
        sample: Option<&dyn MediaSample>,
    ) {
        let (failure, delegate) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_delivering() {
                log::trace!("{} callback while {}, ignored", self.kind, inner.state);
                return;
            }
            inner.diagnostics.callbacks += 1;

            let outcome = if status.is_failure() {
                Err(status)
            } else {
                if flags.is_stream_tick() {
                    inner.diagnostics.stream_ticks += 1;
                }
                let handled = match sample {
                    Some(sample) => self.handle_sample(&mut inner, timestamp, sample),
                    None => {
                        inner.diagnostics.empty_callbacks += 1;
                        Ok(())
                    }
                };
                handled.and_then(|()| match inner.reader.as_ref() {
                    Some(reader) => reader
                        .read_sample(self.kind.first_stream())
                        .map_err(|e| e.status().unwrap_or(StatusCode::FAIL)),
                    None => Err(StatusCode::FAIL),
                })
            };

            match outcome {
                Ok(()) => return,
                Err(status) => (status, inner.delegate.clone()),
            }
        };

        if failure.is_device_lost() {
            log::error!("{} \"{}\": device lost, delivery halted", self.kind, self.name);
        } else {
            log::error!("{} \"{}\": delivery halted with {}", self.kind, self.name, failure);
        }
        deliver_notices(delegate.as_deref(), vec![Notice::DeliveryFailed(failure)]);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn deliver_notices(delegate: Option<&dyn CaptureDelegate>, notices: Vec<Notice>) {
    let Some(delegate) = delegate else {
        return;
    };
    for notice in notices {
        match notice {
            Notice::State(state) => delegate.on_state_changed(state),
            Notice::DeliveryFailed(status) => delegate.on_delivery_failed(status),
        }
    }
}

/// Owner's handle to a session. Dropping it stops the session, which breaks
/// the platform's reference so the session itself can be freed.
pub struct CaptureHandle {
    session: Arc<CaptureSession>,
}

impl CaptureHandle {
    pub fn new(session: Arc<CaptureSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }
}

impl Deref for CaptureHandle {
    type Target = CaptureSession;

    fn deref(&self) -> &CaptureSession {
        &self.session
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.session.stop();
    }
}
