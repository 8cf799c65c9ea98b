/// Errors that can occur at the persistence boundary.
///
/// # Examples
///
/// ```rust
/// use vigil_store::error::StoreError;
///
/// let err = StoreError::NotFound {
///     entity: "alert_rule",
///     id: "rule-99".to_string(),
/// };
/// assert!(err.to_string().contains("alert_rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required record was not found.
    #[error("Store: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated (e.g. duplicate rule name).
    #[error("Store: conflict: {0}")]
    Conflict(String),

    /// JSON serialization or deserialization failure.
    #[error("Store: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic store error for cases not covered by other variants.
    #[error("Store: {0}")]
    Other(String),
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
