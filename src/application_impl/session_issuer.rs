use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, RevocationStore};
use crate::logger::*;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct SessionLifetimes {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl SessionLifetimes {
    /// Rejects lifetimes that are zero or that push `expires_at` past what
    /// `DateTime<Utc>` can hold when counted from `from`.
    pub fn check(&self, from: DateTime<Utc>) -> Result<(), AuthError> {
        for ttl in [self.access_ttl, self.refresh_ttl] {
            if ttl.is_zero() {
                return Err(AuthError::Internal("token lifetime must be non-zero".to_string()));
            }
            expires_after(from, ttl)?;
        }
        Ok(())
    }
}

fn expires_after(from: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .ok_or_else(|| AuthError::Internal(format!("token lifetime {ttl:?} is out of range")))
}

impl Default for SessionLifetimes {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),        // 15 minutes
            refresh_ttl: Duration::from_secs(14 * 24 * 60 * 60), // 14 days
        }
    }
}

/// Mints an access/refresh pair for a subject that has already been authenticated.
pub struct SessionIssuer {
    token_codec: Arc<dyn TokenCodec>,
    revocation_store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    lifetimes: SessionLifetimes,
}

impl SessionIssuer {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        revocation_store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
        lifetimes: SessionLifetimes,
    ) -> Self {
        Self {
            token_codec,
            revocation_store,
            clock,
            lifetimes,
        }
    }

    pub async fn issue(&self, user_id: UserId) -> Result<Session, AuthError> {
        let issued_at = whole_seconds(self.clock.now());
        let claims = AccessClaims {
            subject: user_id,
            token_id: TokenId::new_random(),
            issued_at,
            expires_at: expires_after(issued_at, self.lifetimes.access_ttl)?,
        };
        let access_token = self.token_codec.encode(&claims)?;

        let refresh = self
            .revocation_store
            .create_refresh_token(
                user_id,
                issued_at,
                expires_after(issued_at, self.lifetimes.refresh_ttl)?,
            )
            .await?;

        debug!(%user_id, token_id = %claims.token_id, "session issued");

        Ok(Session {
            access_token,
            refresh_token: refresh.token,
            access_expires_in: self.lifetimes.access_ttl,
            access_expires_at: claims.expires_at,
            refresh_expires_at: refresh.record.expires_at,
        })
    }
}
