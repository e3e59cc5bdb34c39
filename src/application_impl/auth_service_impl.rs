use super::{AuthGate, RefreshCoordinator, SessionIssuer, SessionLifetimes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, RevocationStore, UserProvider};
use crate::logger::*;
use std::sync::Arc;

pub struct RealAuthService {
    user_provider: Arc<dyn UserProvider>,
    session_issuer: Arc<SessionIssuer>,
    refresh_coordinator: RefreshCoordinator,
    auth_gate: AuthGate,
}

impl RealAuthService {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        revocation_store: Arc<dyn RevocationStore>,
        user_provider: Arc<dyn UserProvider>,
        clock: Arc<dyn Clock>,
        lifetimes: SessionLifetimes,
    ) -> Self {
        let session_issuer = Arc::new(SessionIssuer::new(
            token_codec.clone(),
            revocation_store.clone(),
            clock.clone(),
            lifetimes,
        ));
        let refresh_coordinator = RefreshCoordinator::new(
            token_codec.clone(),
            revocation_store.clone(),
            user_provider.clone(),
            session_issuer.clone(),
            clock,
        );
        let auth_gate = AuthGate::new(token_codec, revocation_store);

        Self {
            user_provider,
            session_issuer,
            refresh_coordinator,
            auth_gate,
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn issue_session(&self, user_id: UserId) -> Result<Session, AuthError> {
        self.session_issuer.issue(user_id).await
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(AuthError::Unauthorized);
        }

        let user_id = self
            .user_provider
            .verify_credentials(identifier.trim(), secret)
            .await
            .inspect_err(|error| debug!(%error, "sign in rejected"))?;

        self.session_issuer.issue(user_id).await
    }

    async fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError> {
        self.refresh_coordinator
            .refresh(access_token, refresh_token)
            .await
    }

    async fn authenticate(&self, access_token: &str) -> Result<UserId, AuthError> {
        self.auth_gate.authenticate(access_token).await
    }

    async fn revoke_current(&self, access_token: &str) -> Result<(), AuthError> {
        self.auth_gate.revoke_current(access_token).await
    }

    async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let user_id = self.auth_gate.authenticate(access_token).await?;
        self.user_provider
            .find_by_subject_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }
}
