use crate::domain_model::UserId;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of an opaque refresh token; 43 symbols of a 64-symbol alphabet is ~258 bits.
const REFRESH_TOKEN_LEN: usize = 43;

/// `jti` of an access token.
#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct TokenId(pub uuid::Uuid);

impl TokenId {
    pub fn new_random() -> Self {
        TokenId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TokenId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(TokenId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

/// Claims carried by a signed access token. Timestamps have whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessClaims {
    pub subject: UserId,
    pub token_id: TokenId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessClaims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

impl RefreshToken {
    pub fn generate() -> Self {
        RefreshToken(nanoid::nanoid!(REFRESH_TOKEN_LEN))
    }

    pub fn hash(&self) -> RefreshTokenHash {
        RefreshTokenHash(hex::encode(Sha256::digest(self.0.as_bytes())))
    }
}

/// Hex SHA-256 of a refresh token. Stores key refresh records by this, never by the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct RefreshTokenHash(pub String);

impl fmt::Display for RefreshTokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: RefreshTokenHash,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A freshly minted refresh token: the plaintext for the client and the stored record.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: RefreshToken,
    pub record: RefreshTokenRecord,
}

/// Denylist entry. Only meaningful until `expires_at`; after that the token fails expiry anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevokedAccessToken {
    pub token_id: TokenId,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl From<&AccessClaims> for RevokedAccessToken {
    fn from(claims: &AccessClaims) -> Self {
        RevokedAccessToken {
            token_id: claims.token_id,
            user_id: claims.subject,
            expires_at: claims.expires_at,
        }
    }
}

/// Drops sub-second precision so timestamps survive a trip through JWT `iat`/`exp`.
pub fn whole_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_refresh_tokens_are_long_and_distinct() {
        let a = RefreshToken::generate();
        let b = RefreshToken::generate();
        assert_eq!(a.0.len(), REFRESH_TOKEN_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn refresh_hash_is_stable_hex_sha256() {
        let token = RefreshToken("abc".to_string());
        assert_eq!(
            token.hash().0,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(token.hash(), token.hash());
    }

    #[test]
    fn claims_expire_at_the_boundary() {
        let now = whole_seconds(Utc::now());
        let claims = AccessClaims {
            subject: UserId::new_random(),
            token_id: TokenId::new_random(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(10),
        };
        assert!(!claims.is_expired_at(now + chrono::Duration::seconds(9)));
        assert!(claims.is_expired_at(now + chrono::Duration::seconds(10)));
    }
}
