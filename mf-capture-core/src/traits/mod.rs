pub mod capture_delegate;
pub mod frame_sink;
pub mod platform;
