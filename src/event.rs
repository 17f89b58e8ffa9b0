use serde::{Deserialize, Serialize};

/// One line of the event stream read by the host process.
///
/// Serialized as `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ProgressEvent {
    Status(String),
    Progress(Progress),
    Complete(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Always within `0.0..=100.0`.
    pub percent: f64,
    /// Bytes per second.
    pub speed: Option<f64>,
    /// Seconds.
    pub eta: Option<f64>,
}

impl ProgressEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Progress(_) => "progress",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }

    /// Serializes to a single line, without the trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
