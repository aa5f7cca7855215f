use crate::models::error::StatusCode;
use crate::models::state::SessionState;

/// Event delegate for capture session notifications.
///
/// Called from whichever thread drives the session: the caller's thread for
/// state changes made by `start`/`stop`, a platform thread for delivery
/// failures. Never called while the session lock is held, so implementations
/// may call back into the session (for example `stop` after a device loss).
pub trait CaptureDelegate: Send + Sync {
    fn on_state_changed(&self, _state: SessionState) {}

    /// The delivery loop halted. `status.is_device_lost()` means the device went away.
    fn on_delivery_failed(&self, _status: StatusCode) {}
}
