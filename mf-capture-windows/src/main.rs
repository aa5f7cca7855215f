//! `mf-capture`: list capture devices, then capture from the first matching
//! video and audio device for the configured duration.
//!
//! Usage: `mf-capture [config.json]`. Without a file the defaults apply.

#[cfg(target_os = "windows")]
fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match harness::run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {
    env_logger::init();
    log::error!("mf-capture requires Windows Media Foundation");
    std::process::exit(1);
}

#[cfg(target_os = "windows")]
mod harness {
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use mf_capture_core::{
        CaptureConfiguration, CaptureDelegate, CaptureError, CaptureHandle, CaptureSession,
        DeviceDirectory, DeviceKind, FileSink, SessionState, StatusCode,
    };
    use mf_capture_windows::{MediaFoundationRuntime, MfDeviceBackend};

    /// Logs session events; the harness has no other consumer for them.
    struct LogDelegate {
        label: String,
    }

    impl CaptureDelegate for LogDelegate {
        fn on_state_changed(&self, state: SessionState) {
            log::info!("{}: {}", self.label, state);
        }

        fn on_delivery_failed(&self, status: StatusCode) {
            if status.is_device_lost() {
                log::error!("{}: device lost", self.label);
            } else {
                log::error!("{}: delivery halted ({})", self.label, status);
            }
        }
    }

    fn load_configuration() -> Result<CaptureConfiguration, CaptureError> {
        match std::env::args_os().nth(1) {
            Some(path) => CaptureConfiguration::load(Path::new(&path)),
            None => {
                let config = CaptureConfiguration::default();
                config.validate().map_err(CaptureError::ConfigurationFailed)?;
                Ok(config)
            }
        }
    }

    pub fn run() -> Result<(), CaptureError> {
        let config = load_configuration()?;
        std::fs::create_dir_all(&config.output_directory)
            .map_err(|e| CaptureError::StorageError(format!("{}: {}", config.output_directory.display(), e)))?;

        // Declared first so it drops last, after every session and device.
        let runtime = MediaFoundationRuntime::start()?;
        let directory = DeviceDirectory::new(MfDeviceBackend::new());

        let mut captures = Vec::new();
        for kind in [DeviceKind::Video, DeviceKind::Audio] {
            let devices = directory.list_devices(kind)?;
            let enabled = match kind {
                DeviceKind::Video => config.enable_video_capture,
                DeviceKind::Audio => config.enable_audio_capture,
            };
            if !enabled {
                continue;
            }

            let device = devices.into_iter().find(|device| match &config.device_name_filter {
                Some(needle) => device.name_contains(needle),
                None => true,
            });
            let Some(device) = device else {
                log::warn!("no {} device to capture from", kind);
                continue;
            };

            let sink = Arc::new(FileSink::for_device(&config, &device));
            let session = CaptureSession::open(&directory, kind, &device.identity, &device.name, sink.clone())?;
            session.set_delegate(Arc::new(LogDelegate {
                label: format!("{} \"{}\"", kind, device.name),
            }));
            if kind == DeviceKind::Video {
                session.set_video_target(config.video_target.clone())?;
            }

            match session.start() {
                Ok(()) => captures.push((CaptureHandle::new(session), sink)),
                Err(e) => log::error!("{} \"{}\" did not start: {}", kind, device.name, e),
            }
        }

        if captures.is_empty() {
            log::warn!("nothing is capturing");
        } else {
            thread::sleep(Duration::from_secs_f64(config.capture_duration_secs));
        }

        for (handle, sink) in captures {
            let diagnostics = handle.diagnostics();
            log::info!(
                "{} \"{}\": {} samples, {} bytes, {} ticks, {} sink failures",
                handle.kind(),
                handle.name(),
                diagnostics.samples_delivered,
                diagnostics.bytes_delivered,
                diagnostics.stream_ticks,
                diagnostics.sink_failures
            );
            drop(handle);

            match sink.finish() {
                Ok(result) => log::info!(
                    "wrote {} ({} frames, sha256 {})",
                    result.file_path.display(),
                    result.metadata.frames_written,
                    result.metadata.checksum
                ),
                Err(e) => log::error!("finalizing {} failed: {}", sink.file_path().display(), e),
            }
        }

        drop(runtime);
        Ok(())
    }
}
