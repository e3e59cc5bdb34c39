use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Store(String),
}

/// Rows removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub revoked_access_tokens: u64,
    pub refresh_tokens: u64,
}

/// Denylist of access-token ids plus the table of live refresh tokens.
///
/// Every lookup must observe any mutation that completed before it.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError>;

    /// Idempotent; revoking an id that is already present succeeds.
    async fn revoke(&self, entry: &RevokedAccessToken) -> Result<(), StoreError>;

    async fn find_refresh_token(
        &self,
        token_hash: &RefreshTokenHash,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Mint a random refresh token and persist its hash, retrying on id collision.
    async fn create_refresh_token(
        &self,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, StoreError>;

    /// Returns `true` only for the call that actually removed the row.
    async fn delete_refresh_token(&self, token_hash: &RefreshTokenHash)
    -> Result<bool, StoreError>;

    /// Drop denylist and refresh rows with `expires_at <= now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError>;
}
