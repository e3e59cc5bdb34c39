use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait UserProvider: Send + Sync {
    async fn find_by_subject_id(&self, id: UserId) -> Result<Option<User>, UserError>;

    /// Resolve a login identifier and secret to a subject.
    /// Unknown, inactive and wrong-password all come back as `InvalidCredentials`.
    async fn verify_credentials(&self, identifier: &str, secret: &str)
    -> Result<UserId, UserError>;
}
