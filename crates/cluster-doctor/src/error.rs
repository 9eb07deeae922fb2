//! Error types for the diagnostic engine.
//!
//! Only [`DoctorError`] ever reaches the caller of a diagnostic run. Probe-level
//! failures are [`ApiError`]s that get folded into check results instead.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a [`crate::ClusterApi`] call.
///
/// The `Display` text is what the suggestion resolver classifies on, so the
/// wording of the underlying client errors is passed through untouched.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("diagnostic deadline exceeded")]
    DeadlineExceeded,

    #[error("diagnostic run cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),
}

impl ApiError {
    /// Build an error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// True when the call was aborted by cancellation or the run deadline,
    /// as opposed to failing on its own.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Engine-level errors.
#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("failed to fetch cluster info: {0}")]
    ClusterInfo(#[source] ApiError),

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("failed to create Kubernetes client: {0}")]
    Client(String),

    #[error("failed to render report: {0}")]
    Render(String),
}

/// Result type for engine operations
pub type DoctorResult<T> = Result<T, DoctorError>;
