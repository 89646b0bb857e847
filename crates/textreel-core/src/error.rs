//! Error types for textreel.

use thiserror::Error;

use crate::types::FrameKind;

/// Result type alias using textreel's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for textreel.
#[derive(Error, Debug)]
pub enum Error {
    // Flow control
    #[error("{0} queue is full")]
    QueueFull(FrameKind),

    #[error("{0} queue is empty")]
    QueueEmpty(FrameKind),

    #[error("Clock drift of {drift_us} us exceeds the resync threshold")]
    ClockDriftExceeded { drift_us: i64 },

    #[error("{0} stream exhausted")]
    DecodeExhausted(FrameKind),

    #[error("Band at {frequency_hz} Hz skipped: {reason}")]
    AnalysisDegenerate {
        frequency_hz: u32,
        reason: DegenerateReason,
    },

    // Resource errors
    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    // Collaborator errors
    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a spectral band produced no measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    /// The band frequency lies above half the sample rate.
    AboveNyquist,
    /// No samples were available for the analysis window.
    EmptyWindow,
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AboveNyquist => f.write_str("above Nyquist"),
            Self::EmptyWindow => f.write_str("empty window"),
        }
    }
}

impl Error {
    /// Returns true for expected conditions that callers branch on every cycle.
    pub const fn is_flow_control(&self) -> bool {
        matches!(
            self,
            Self::QueueFull(_)
                | Self::QueueEmpty(_)
                | Self::ClockDriftExceeded { .. }
                | Self::DecodeExhausted(_)
                | Self::AnalysisDegenerate { .. }
        )
    }

    /// Returns true if this error ends playback of the current playlist item.
    ///
    /// The session is expected to skip to the next entry, not to exit.
    pub const fn ends_current_item(&self) -> bool {
        matches!(self, Self::Allocation { .. } | Self::Collaborator(_))
    }
}
