use super::util::{is_dup_key, store_err};
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const MAX_CREATE_ATTEMPTS: usize = 3;

pub struct MySqlRevocationStore {
    pool: MySqlPool,
}

impl MySqlRevocationStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRevocationStore { pool }
    }

    fn row_to_refresh_record(row: MySqlRow) -> Result<RefreshTokenRecord, StoreError> {
        Ok(RefreshTokenRecord {
            token_hash: row
                .try_get("token_hash")
                .map_err(store_err("token_hash decode"))?,
            user_id: row
                .try_get("user_id")
                .map_err(store_err("user_id decode"))?,
            created_at: row
                .try_get("created_at")
                .map_err(store_err("created_at decode"))?,
            expires_at: row
                .try_get("expires_at")
                .map_err(store_err("expires_at decode"))?,
        })
    }
}

#[async_trait::async_trait]
impl RevocationStore for MySqlRevocationStore {
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
SELECT 1 FROM revoked_access_token
WHERE token_id = ?
LIMIT 1
"#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err("is_revoked"))?;

        Ok(row.is_some())
    }

    async fn revoke(&self, entry: &RevokedAccessToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO revoked_access_token (token_id, user_id, expires_at)
VALUES (?, ?, ?)
ON DUPLICATE KEY UPDATE token_id = token_id
"#,
        )
        .bind(entry.token_id)
        .bind(entry.user_id)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err("revoke"))?;

        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &RefreshTokenHash,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT token_hash, user_id, created_at, expires_at
FROM refresh_token
WHERE token_hash = ?
"#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err("find_refresh_token"))?;

        row_opt.map(Self::row_to_refresh_record).transpose()
    }

    async fn create_refresh_token(
        &self,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, StoreError> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let token = RefreshToken::generate();
            let record = RefreshTokenRecord {
                token_hash: token.hash(),
                user_id,
                created_at,
                expires_at,
            };

            let res = sqlx::query(
                r#"
INSERT INTO refresh_token (token_hash, user_id, created_at, expires_at)
VALUES (?, ?, ?, ?)
"#,
            )
            .bind(&record.token_hash)
            .bind(record.user_id)
            .bind(record.created_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .await;

            match res {
                Ok(_) => return Ok(IssuedRefreshToken { token, record }),
                Err(e) if is_dup_key(&e) => {
                    warn!(attempt, "refresh token hash collision, retrying");
                }
                Err(e) => return Err(store_err("create_refresh_token")(e)),
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
        let res = sqlx::query(
            r#"
DELETE FROM refresh_token
WHERE token_hash = ?
"#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(store_err("delete_refresh_token"))?;

        Ok(res.rows_affected() == 1)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let revoked = sqlx::query(
            r#"
DELETE FROM revoked_access_token
WHERE expires_at <= ?
"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err("sweep revoked"))?;

        let refresh = sqlx::query(
            r#"
DELETE FROM refresh_token
WHERE expires_at <= ?
"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err("sweep refresh"))?;

        Ok(SweepReport {
            revoked_access_tokens: revoked.rows_affected(),
            refresh_tokens: refresh.rows_affected(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn connect() -> MySqlPool {
        let dsn = std::env::var("TOKENGATE_TEST_MYSQL_DSN")
            .unwrap_or_else(|_| "mysql://root@127.0.0.1:3306/tokengate_test".to_string());
        let pool = MySqlPool::connect(&dsn).await.unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    #[ignore = "needs a running MySQL; set TOKENGATE_TEST_MYSQL_DSN"]
    async fn revoke_twice_keeps_one_row() {
        let store = MySqlRevocationStore::new(connect().await);
        let entry = RevokedAccessToken {
            token_id: TokenId::new_random(),
            user_id: UserId::new_random(),
            expires_at: whole_seconds(Utc::now()) + Duration::minutes(5),
        };

        store.revoke(&entry).await.unwrap();
        store.revoke(&entry).await.unwrap();
        assert!(store.is_revoked(&entry.token_id).await.unwrap());

        let (rows,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM revoked_access_token WHERE token_id = ?")
                .bind(entry.token_id)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(rows, 1);
    }
}
