//! Error types for workflow configuration, navigation and submission.

use thiserror::Error;

/// Trigger error code for a call that exceeded its timeout.
pub const CODE_TIMEOUT: &str = "TIMEOUT";
/// Trigger error code for DNS, connection and other transport failures.
pub const CODE_NETWORK_ERROR: &str = "NETWORK_ERROR";
/// Trigger error code for a 2xx response whose body is not JSON.
pub const CODE_INVALID_JSON: &str = "INVALID_JSON";
/// Trigger error code for a parsed response that reports `success != true`.
pub const CODE_WEBHOOK_ERROR: &str = "WEBHOOK_ERROR";
/// Trigger error code for a call aborted because its instance was discarded.
pub const CODE_CANCELLED: &str = "CANCELLED";

/// Errors found while building or loading a workflow configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Workflow id cannot be empty")]
    EmptyId,

    #[error("Workflow '{0}' must have at least one step")]
    NoSteps(String),

    #[error("Step {0} has an empty id")]
    EmptyStepId(usize),

    #[error("Duplicate step id '{0}'")]
    DuplicateStep(String),

    #[error("Duplicate field id '{0}'")]
    DuplicateField(String),

    #[error("Field '{field}' has min {min} greater than max {max}")]
    InvalidRange { field: String, min: f64, max: f64 },

    #[error("Field '{field}' default value {value} is outside its allowed range")]
    DefaultOutOfRange { field: String, value: String },

    #[error("Tip rule '{rule}' targets unknown {kind} '{target}'")]
    UnknownTipTarget {
        rule: String,
        kind: &'static str,
        target: String,
    },

    #[error("Workflow '{0}' has no submit handler")]
    MissingSubmit(String),
}

/// Errors returned by explicit navigation requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Step {target} is not reachable from step {current}")]
    StepLocked { target: usize, current: usize },
}

/// Broad classification of a [`TriggerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerErrorKind {
    /// The call never completed (timeout, network failure).
    Transport,
    /// The endpoint answered but not per contract (non-2xx, invalid JSON).
    Protocol,
    /// The endpoint understood the request and declined it.
    Business,
    /// The owning instance was discarded while the call was in flight.
    Cancelled,
}

/// Failure of a webhook trigger call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TriggerError {
    pub message: String,
    pub code: Option<String>,
    pub status_code: Option<u16>,
}

impl TriggerError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status_code: None,
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the HTTP-like status code.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn timeout() -> Self {
        Self::new("Webhook request timed out")
            .with_code(CODE_TIMEOUT)
            .with_status(408)
    }

    pub fn network(detail: impl std::fmt::Display) -> Self {
        Self::new(format!("Network error: {}", detail)).with_code(CODE_NETWORK_ERROR)
    }

    /// Non-2xx response. The body text becomes the code.
    pub fn http_status(status: u16, status_text: &str, body: impl Into<String>) -> Self {
        Self::new(format!("Webhook request failed: {}", status_text))
            .with_code(body)
            .with_status(status)
    }

    pub fn invalid_json() -> Self {
        Self::new("Webhook returned an invalid JSON response")
            .with_code(CODE_INVALID_JSON)
            .with_status(502)
    }

    pub fn webhook(message: impl Into<String>) -> Self {
        Self::new(message).with_code(CODE_WEBHOOK_ERROR)
    }

    pub fn cancelled() -> Self {
        Self::new("Webhook request was cancelled").with_code(CODE_CANCELLED)
    }

    /// Classify this error.
    pub fn kind(&self) -> TriggerErrorKind {
        match self.code.as_deref() {
            Some(CODE_TIMEOUT) | Some(CODE_NETWORK_ERROR) => TriggerErrorKind::Transport,
            Some(CODE_WEBHOOK_ERROR) => TriggerErrorKind::Business,
            Some(CODE_CANCELLED) => TriggerErrorKind::Cancelled,
            _ => TriggerErrorKind::Protocol,
        }
    }
}

/// Errors reported by external collaborators (persistence, auth, storage).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Errors produced by a submit handler.
///
/// The submission state machine catches every variant and turns it into the
/// instance's `failed` phase with [`SubmitError::user_message`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Unauthorized: please sign in and try again")]
    Unauthorized,

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error("Could not save your request: {0}")]
    Persistence(String),

    #[error("{0}")]
    Rejected(String),
}

impl SubmitError {
    /// Message shown to the user. Never empty.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "Submission failed. Please try again.".to_string()
        } else {
            message
        }
    }

    /// Machine-readable code, when the failure came from a trigger call.
    pub fn code(&self) -> Option<&str> {
        match self {
            SubmitError::Trigger(err) => err.code.as_deref(),
            SubmitError::Unauthorized => Some("UNAUTHORIZED"),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed with unchanged input.
    ///
    /// Informational only; nothing in this crate retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Trigger(err) if err.kind() == TriggerErrorKind::Transport)
    }
}

impl From<ServiceError> for SubmitError {
    fn from(err: ServiceError) -> Self {
        SubmitError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_error_classification() {
        assert_eq!(TriggerError::timeout().kind(), TriggerErrorKind::Transport);
        assert_eq!(TriggerError::network("refused").kind(), TriggerErrorKind::Transport);
        assert_eq!(TriggerError::invalid_json().kind(), TriggerErrorKind::Protocol);
        assert_eq!(
            TriggerError::http_status(500, "Internal Server Error", "boom").kind(),
            TriggerErrorKind::Protocol
        );
        assert_eq!(TriggerError::webhook("nope").kind(), TriggerErrorKind::Business);
        assert_eq!(TriggerError::cancelled().kind(), TriggerErrorKind::Cancelled);
    }

    #[test]
    fn test_timeout_shape() {
        let err = TriggerError::timeout();
        assert_eq!(err.code.as_deref(), Some("TIMEOUT"));
        assert_eq!(err.status_code, Some(408));
    }

    #[test]
    fn test_submit_error_messages() {
        let err = SubmitError::from(TriggerError::network("ECONNRESET"));
        assert_eq!(err.user_message(), "Network error: ECONNRESET");
        assert_eq!(err.code(), Some("NETWORK_ERROR"));
        assert!(err.is_retryable());

        assert!(!SubmitError::from(TriggerError::webhook("quota exceeded")).is_retryable());
        assert!(!SubmitError::Unauthorized.user_message().is_empty());
        assert_eq!(
            SubmitError::Rejected("  ".to_string()).user_message(),
            "Submission failed. Please try again."
        );
    }
}
