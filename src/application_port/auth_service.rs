use crate::domain_model::*;
use crate::domain_port::{StoreError, UserError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of every auth operation that crosses the service boundary.
///
/// Token-format, ownership and credential failures all collapse into
/// `Unauthorized`; callers never learn which check rejected them.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Store(e) => AuthError::Storage(e),
        }
    }
}

impl From<UserError> for AuthError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::InvalidCredentials => AuthError::Unauthorized,
            UserError::Store(e) => AuthError::Storage(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    Enforce,
    /// Read claims of a token that may already be past `exp`; signature still verified.
    Skip,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_expires_in: Duration,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub trait TokenCodec: Send + Sync {
    fn encode(&self, claims: &AccessClaims) -> Result<AccessToken, AuthError>;
    fn decode(&self, token: &str, expiry: ExpiryCheck) -> Result<AccessClaims, DecodeError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, UserError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, UserError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn issue_session(&self, user_id: UserId) -> Result<Session, AuthError>;
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, AuthError>;
    async fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError>;
    async fn authenticate(&self, access_token: &str) -> Result<UserId, AuthError>;
    async fn revoke_current(&self, access_token: &str) -> Result<(), AuthError>;
    async fn current_user(&self, access_token: &str) -> Result<User, AuthError>;
}
