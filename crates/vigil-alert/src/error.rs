use vigil_store::error::StoreError;

/// Errors returned by the alert engine's public operations.
///
/// Metric lookup misses are deliberately absent: an unavailable metric is
/// "no value this tick", recovered inside the evaluation pass rather than
/// surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// The condition string is not one of the supported operators.
    #[error("Alert: unsupported condition operator: {0}")]
    InvalidCondition(String),

    /// A rule update contained a field the engine does not know.
    #[error("Alert: invalid update field: {0}")]
    InvalidField(String),

    #[error("Alert: rule not found (id={0})")]
    RuleNotFound(String),

    #[error("Alert: alert not found (id={0})")]
    AlertNotFound(String),

    /// The underlying store failed; propagated to the caller.
    #[error("Alert: persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, AlertError>;
