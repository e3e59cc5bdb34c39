use crate::application_port::CredentialHasher;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

struct StoredUser {
    user: User,
    password_hash: String,
    is_active: bool,
}

/// Users kept in process memory; identifiers are emails, matched case-insensitively.
pub struct MemoryUserProvider {
    hasher: Arc<dyn CredentialHasher>,
    users: DashMap<UserId, StoredUser>,
    by_email: DashMap<String, UserId>,
}

impl MemoryUserProvider {
    pub fn new(hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            hasher,
            users: DashMap::new(),
            by_email: DashMap::new(),
        }
    }

    pub async fn insert_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<UserId, UserError> {
        let password_hash = self.hasher.hash_password(password).await?;
        let user = User {
            id: UserId::new_random(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let id = user.id;
        self.by_email.insert(email.to_lowercase(), id);
        self.users.insert(
            id,
            StoredUser {
                user,
                password_hash,
                is_active: true,
            },
        );
        Ok(id)
    }

    pub fn set_active(&self, id: UserId, is_active: bool) {
        if let Some(mut stored) = self.users.get_mut(&id) {
            stored.is_active = is_active;
        }
    }

    pub fn remove_user(&self, id: UserId) {
        if let Some((_, stored)) = self.users.remove(&id) {
            self.by_email.remove(&stored.user.email.to_lowercase());
        }
    }
}

#[async_trait::async_trait]
impl UserProvider for MemoryUserProvider {
    async fn find_by_subject_id(&self, id: UserId) -> Result<Option<User>, UserError> {
        Ok(self.users.get(&id).map(|r| r.value().user.clone()))
    }

    async fn verify_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<UserId, UserError> {
        let id = self
            .by_email
            .get(&identifier.to_lowercase())
            .map(|r| *r.value())
            .ok_or(UserError::InvalidCredentials)?;
        // Clone out of the map so no shard lock is held across the await.
        let (password_hash, is_active) = self
            .users
            .get(&id)
            .map(|r| (r.value().password_hash.clone(), r.value().is_active))
            .ok_or(UserError::InvalidCredentials)?;

        if !is_active {
            return Err(UserError::InvalidCredentials);
        }
        if !self.hasher.verify_password(secret, &password_hash).await? {
            return Err(UserError::InvalidCredentials);
        }
        Ok(id)
    }
}
