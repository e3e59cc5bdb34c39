use crate::application_port::CredentialHasher;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::sync::Arc;

pub struct MySqlUserProvider {
    pool: MySqlPool,
    hasher: Arc<dyn CredentialHasher>,
}

impl MySqlUserProvider {
    pub fn new(pool: MySqlPool, hasher: Arc<dyn CredentialHasher>) -> Self {
        MySqlUserProvider { pool, hasher }
    }

    fn row_to_user(row: MySqlRow) -> Result<User, UserError> {
        Ok(User {
            id: row
                .try_get("id")
                .map_err(|e| UserError::Store(e.to_string()))?,
            email: row
                .try_get("email")
                .map_err(|e| UserError::Store(e.to_string()))?,
            name: row
                .try_get("name")
                .map_err(|e| UserError::Store(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| UserError::Store(e.to_string()))?,
        })
    }
}

#[async_trait::async_trait]
impl UserProvider for MySqlUserProvider {
    async fn find_by_subject_id(&self, id: UserId) -> Result<Option<User>, UserError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, name, created_at
FROM app_user
WHERE id = ?
"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_user).transpose()
    }

    async fn verify_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<UserId, UserError> {
        let row = sqlx::query(
            r#"
SELECT id, password_hash, is_active
FROM app_user
WHERE email = ?
"#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::Store(e.to_string()))?
        .ok_or(UserError::InvalidCredentials)?;

        let id: UserId = row
            .try_get("id")
            .map_err(|e| UserError::Store(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| UserError::Store(e.to_string()))?;
        let is_active: bool = row
            .try_get("is_active")
            .map_err(|e| UserError::Store(e.to_string()))?;

        if !is_active {
            return Err(UserError::InvalidCredentials);
        }
        if !self.hasher.verify_password(secret, &password_hash).await? {
            return Err(UserError::InvalidCredentials);
        }
        Ok(id)
    }
}
