use super::SessionIssuer;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, RevocationStore, StoreError, UserError, UserProvider};
use crate::logger::*;
use std::sync::Arc;

const TOKEN_TYPE_PREFIX: &str = "Bearer ";

/// Why a refresh attempt was turned down. Only ever logged; callers see `Unauthorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RefreshRejection {
    #[error("blank access or refresh token")]
    BlankInput,
    #[error("access token rejected: {0}")]
    AccessToken(DecodeError),
    #[error("subject no longer exists")]
    UnknownSubject,
    #[error("refresh token not found")]
    UnknownRefreshToken,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("refresh token belongs to another subject")]
    SubjectMismatch,
    #[error("refresh token consumed concurrently")]
    AlreadyConsumed,
}

/// Failure of a single refresh step: either a rejection or an infrastructure error.
enum StepError {
    Rejected(RefreshRejection),
    Auth(AuthError),
}

impl From<RefreshRejection> for StepError {
    fn from(rejection: RefreshRejection) -> Self {
        StepError::Rejected(rejection)
    }
}

impl From<AuthError> for StepError {
    fn from(error: AuthError) -> Self {
        StepError::Auth(error)
    }
}

impl From<StoreError> for StepError {
    fn from(error: StoreError) -> Self {
        StepError::Auth(error.into())
    }
}

impl From<UserError> for StepError {
    fn from(error: UserError) -> Self {
        StepError::Auth(error.into())
    }
}

/// Trades a (possibly expired) access token plus its live refresh token for a new pair.
///
/// Steps run in order and the first failure ends the attempt:
/// decode access token (expiry skipped), resolve refresh token, check its expiry,
/// check ownership, then revoke, consume and reissue. Nothing is mutated before
/// ownership is established, except deleting a refresh record found already expired.
pub struct RefreshCoordinator {
    token_codec: Arc<dyn TokenCodec>,
    revocation_store: Arc<dyn RevocationStore>,
    user_provider: Arc<dyn UserProvider>,
    session_issuer: Arc<SessionIssuer>,
    clock: Arc<dyn Clock>,
}

impl RefreshCoordinator {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        revocation_store: Arc<dyn RevocationStore>,
        user_provider: Arc<dyn UserProvider>,
        session_issuer: Arc<SessionIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_codec,
            revocation_store,
            user_provider,
            session_issuer,
            clock,
        }
    }

    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        match self.run(access_token, refresh_token).await {
            Ok(session) => Ok(session),
            Err(StepError::Rejected(reason)) => {
                debug!(%reason, "refresh rejected");
                Err(AuthError::Unauthorized)
            }
            Err(StepError::Auth(error)) => {
                warn!(%error, "refresh failed");
                Err(error)
            }
        }
    }

    async fn run(&self, access_token: &str, refresh_token: &str) -> Result<Session, StepError> {
        let (access_token, refresh_token) = Self::normalize(access_token, refresh_token)?;
        let claims = self.decode_access_token(access_token)?;
        self.ensure_subject_exists(claims.subject).await?;
        let record = self.resolve_refresh_token(refresh_token).await?;
        self.ensure_unexpired(&record).await?;
        Self::ensure_ownership(&claims, &record)?;
        self.rotate(&claims, &record).await
    }

    fn normalize<'a>(
        access_token: &'a str,
        refresh_token: &'a str,
    ) -> Result<(&'a str, RefreshToken), RefreshRejection> {
        let access_token = access_token.trim();
        let access_token = access_token
            .strip_prefix(TOKEN_TYPE_PREFIX)
            .unwrap_or(access_token)
            .trim();
        let refresh_token = refresh_token.trim();
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(RefreshRejection::BlankInput);
        }
        Ok((access_token, RefreshToken(refresh_token.to_string())))
    }

    fn decode_access_token(&self, access_token: &str) -> Result<AccessClaims, RefreshRejection> {
        self.token_codec
            .decode(access_token, ExpiryCheck::Skip)
            .map_err(RefreshRejection::AccessToken)
    }

    async fn ensure_subject_exists(&self, subject: UserId) -> Result<(), StepError> {
        match self.user_provider.find_by_subject_id(subject).await? {
            Some(_) => Ok(()),
            None => Err(RefreshRejection::UnknownSubject.into()),
        }
    }

    async fn resolve_refresh_token(
        &self,
        refresh_token: RefreshToken,
    ) -> Result<RefreshTokenRecord, StepError> {
        self.revocation_store
            .find_refresh_token(&refresh_token.hash())
            .await?
            .ok_or(StepError::Rejected(RefreshRejection::UnknownRefreshToken))
    }

    async fn ensure_unexpired(&self, record: &RefreshTokenRecord) -> Result<(), StepError> {
        if record.is_expired_at(self.clock.now()) {
            self.revocation_store
                .delete_refresh_token(&record.token_hash)
                .await?;
            return Err(RefreshRejection::RefreshTokenExpired.into());
        }
        Ok(())
    }

    fn ensure_ownership(
        claims: &AccessClaims,
        record: &RefreshTokenRecord,
    ) -> Result<(), RefreshRejection> {
        if record.user_id != claims.subject {
            return Err(RefreshRejection::SubjectMismatch);
        }
        Ok(())
    }

    // revoke, then consume, then issue; a concurrent authenticate with the old
    // token sees either "still valid" or "revoked", never anything in between.
    async fn rotate(
        &self,
        claims: &AccessClaims,
        record: &RefreshTokenRecord,
    ) -> Result<Session, StepError> {
        self.revocation_store
            .revoke(&RevokedAccessToken::from(claims))
            .await?;

        if !self
            .revocation_store
            .delete_refresh_token(&record.token_hash)
            .await?
        {
            return Err(RefreshRejection::AlreadyConsumed.into());
        }

        let session = self.session_issuer.issue(claims.subject).await?;
        info!(user_id = %claims.subject, old_token_id = %claims.token_id, "session refreshed");
        Ok(session)
    }
}
