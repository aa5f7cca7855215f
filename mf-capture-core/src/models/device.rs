use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::FormatDescriptor;

/// Capture device category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Video,
    Audio,
}

impl DeviceKind {
    pub fn major_type(self) -> MajorType {
        match self {
            Self::Video => MajorType::Video,
            Self::Audio => MajorType::Audio,
        }
    }

    /// Selector for the first stream of this kind's major type.
    pub fn first_stream(self) -> StreamSelector {
        match self {
            Self::Video => StreamSelector::FirstVideo,
            Self::Audio => StreamSelector::FirstAudio,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media category of a stream or media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    Video,
    Audio,
    Other,
}

/// Which stream of a delivery subscription an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSelector {
    FirstVideo,
    FirstAudio,
}

/// A capture device as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub name: String,
    /// Platform symbolic link. Opaque; stable across runs but not across subsystems.
    pub identity: String,
    /// Endpoint id the WASAPI subsystem uses for the same audio device.
    pub audio_endpoint: Option<String>,
    pub formats: Vec<FormatDescriptor>,
}

impl DeviceDescriptor {
    /// Case-sensitive substring match on the display name.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.contains(needle)
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\" ({})", self.kind, self.name, self.identity)?;
        if let Some(endpoint) = &self.audio_endpoint {
            write!(f, " endpoint={}", endpoint)?;
        }
        Ok(())
    }
}
