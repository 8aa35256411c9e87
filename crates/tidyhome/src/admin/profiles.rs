use async_trait::async_trait;

/// Privilege lookup against the profile table.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `is_superuser` for the subject, or `None` when no profile row exists.
    async fn superuser_flag(&self, subject: &str) -> Result<Option<bool>, ProfileError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile lookup rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected profile payload: {0}")]
    Decode(String),
}
