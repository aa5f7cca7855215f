pub mod buffer_lock;
pub mod wav_format;
