use std::fmt;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → starting → delivering
///   ↑        │           │
///   └────────┴── stop ───┘
/// ```
///
/// A failed `start` rolls back to `Idle`. A fatal delivery status leaves the
/// session in `Delivering` with no further callbacks until `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Starting,
    Delivering,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_delivering(&self) -> bool {
        matches!(self, Self::Delivering)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Delivering => "delivering",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
