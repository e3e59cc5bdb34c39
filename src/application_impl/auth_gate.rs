use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::RevocationStore;
use crate::logger::*;
use std::sync::Arc;

/// Request-time check: signature, expiry, then one denylist lookup.
pub struct AuthGate {
    token_codec: Arc<dyn TokenCodec>,
    revocation_store: Arc<dyn RevocationStore>,
}

impl AuthGate {
    pub fn new(token_codec: Arc<dyn TokenCodec>, revocation_store: Arc<dyn RevocationStore>) -> Self {
        Self {
            token_codec,
            revocation_store,
        }
    }

    pub async fn authenticate(&self, access_token: &str) -> Result<UserId, AuthError> {
        let claims = self.verify(access_token).await?;
        Ok(claims.subject)
    }

    /// Sign-out: denylist the presented token for the rest of its natural lifetime.
    /// The subject's refresh token is left alone.
    pub async fn revoke_current(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.verify(access_token).await?;
        self.revocation_store
            .revoke(&RevokedAccessToken::from(&claims))
            .await?;
        info!(user_id = %claims.subject, token_id = %claims.token_id, "access token revoked");
        Ok(())
    }

    async fn verify(&self, access_token: &str) -> Result<AccessClaims, AuthError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(AuthError::Unauthorized);
        }

        let claims = self
            .token_codec
            .decode(access_token, ExpiryCheck::Enforce)
            .map_err(|reason| {
                debug!(%reason, "access token rejected");
                AuthError::Unauthorized
            })?;

        if self.revocation_store.is_revoked(&claims.token_id).await? {
            debug!(token_id = %claims.token_id, "access token is revoked");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }
}
