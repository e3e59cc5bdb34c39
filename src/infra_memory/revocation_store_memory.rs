use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

const MAX_CREATE_ATTEMPTS: usize = 3;

/// Process-local store. Per-key operations are atomic, which gives
/// compare-and-delete semantics for refresh tokens.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    revoked: DashMap<TokenId, RevokedAccessToken>,
    refresh_tokens: DashMap<RefreshTokenHash, RefreshTokenRecord>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.revoked.contains_key(token_id))
    }

    async fn revoke(&self, entry: &RevokedAccessToken) -> Result<(), StoreError> {
        self.revoked.entry(entry.token_id).or_insert(*entry);
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &RefreshTokenHash,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .refresh_tokens
            .get(token_hash)
            .map(|r| r.value().clone()))
    }

    async fn create_refresh_token(
        &self,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, StoreError> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let token = RefreshToken::generate();
            let record = RefreshTokenRecord {
                token_hash: token.hash(),
                user_id,
                created_at,
                expires_at,
            };
            if let Entry::Vacant(slot) = self.refresh_tokens.entry(record.token_hash.clone()) {
                slot.insert(record.clone());
                return Ok(IssuedRefreshToken { token, record });
            }
        }
        Err(StoreError::Store(
            "could not allocate a unique refresh token".to_string(),
        ))
    }

    async fn delete_refresh_token(
        &self,
        token_hash: &RefreshTokenHash,
    ) -> Result<bool, StoreError> {
        Ok(self.refresh_tokens.remove(token_hash).is_some())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();
        self.revoked.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                report.revoked_access_tokens += 1;
            }
            keep
        });
        self.refresh_tokens.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                report.refresh_tokens += 1;
            }
            keep
        });
        Ok(report)
    }
}
