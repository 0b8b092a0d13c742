//! Error taxonomy for the audit pipeline.
//!
//! Only `Validation` and `Storage` ever reach the original caller of
//! `log_event`; every other kind is absorbed inside the pipeline and
//! surfaced through its own internal logging.

use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Required fields missing or malformed; rejected before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The rule store was unreachable; the cached rule set stays in effect.
    #[error("rule load failed: {0}")]
    RuleLoad(String),

    /// A single alert channel failed to deliver.
    #[error("alert delivery failed on {channel}: {message}")]
    ChannelDelivery { channel: String, message: String },

    /// An automated response action failed.
    #[error("auto-response {action} failed: {message}")]
    AutoResponse { action: String, message: String },

    /// The durable write failed. Fatal to the specific `log_event` call.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl AuditError {
    /// Whether this error kind is propagated to the original caller.
    pub fn is_caller_visible(&self) -> bool {
        matches!(self, AuditError::Validation(_) | AuditError::Storage(_))
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(err: rusqlite::Error) -> Self {
        AuditError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Storage(err.to_string())
    }
}
