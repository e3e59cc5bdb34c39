use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisWrite, Script, ToRedisArgs};
use std::collections::HashMap;

const MAX_CREATE_ATTEMPTS: usize = 3;

// Claim, fill and EXPIREAT in one server-side step so a record never exists
// without its TTL. Returns 0 when the key is already taken.
const CREATE_REFRESH_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'user_id', ARGV[1], 'created_at', ARGV[2], 'expires_at', ARGV[3])
redis.call('EXPIREAT', KEYS[1], ARGV[3])
return 1
"#;

/// Redis-backed store. Every key expires at the row's `expires_at`, so Redis
/// itself does the garbage collection and `sweep_expired` has nothing to do.
pub struct RedisRevocationStore {
    conn: ConnectionManager,
    prefix: String,
    create_refresh: Script,
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRevocationStore {
            conn,
            prefix: prefix.into(),
            create_refresh: Script::new(CREATE_REFRESH_SCRIPT),
        }
    }

    fn revoked_key(&self, token_id: &TokenId) -> String {
        format!("{}:revoked:{}", self.prefix, token_id)
    }

    fn refresh_key(&self, token_hash: &RefreshTokenHash) -> String {
        format!("{}:refresh:{}", self.prefix, token_hash)
    }

    fn parse_refresh_record(
        token_hash: &RefreshTokenHash,
        fields: &HashMap<String, String>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        Ok(RefreshTokenRecord {
            token_hash: token_hash.clone(),
            user_id: field(fields, "user_id")?
                .parse::<UserId>()
                .map_err(|e| StoreError::Store(format!("user_id decode: {e}")))?,
            created_at: timestamp_field(fields, "created_at")?,
            expires_at: timestamp_field(fields, "expires_at")?,
        })
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, StoreError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| StoreError::Store(format!("refresh record missing {name}")))
}

fn timestamp_field(
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<DateTime<Utc>, StoreError> {
    let secs = field(fields, name)?
        .parse::<i64>()
        .map_err(|e| StoreError::Store(format!("{name} decode: {e}")))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| StoreError::Store(format!("{name} out of range")))
}

impl ToRedisArgs for UserId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let key = self.revoked_key(token_id);
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(exists)
    }

    async fn revoke(&self, entry: &RevokedAccessToken) -> Result<(), StoreError> {
        let key = self.revoked_key(&entry.token_id);
        let mut conn = self.conn.clone();
        // NX keeps the first write; a repeat revoke is a no-op.
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(&entry.user_id)
            .arg("NX")
            .arg("EXAT")
            .arg(entry.expires_at.timestamp())
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &RefreshTokenHash,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let key = self.refresh_key(token_hash);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Self::parse_refresh_record(token_hash, &fields).map(Some)
    }

    async fn create_refresh_token(
        &self,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, StoreError> {
        let mut conn = self.conn.clone();
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let token = RefreshToken::generate();
            let record = RefreshTokenRecord {
                token_hash: token.hash(),
                user_id,
                created_at,
                expires_at,
            };
            let key = self.refresh_key(&record.token_hash);

            let created: i64 = self
                .create_refresh
                .key(&key)
                .arg(&user_id)
                .arg(created_at.timestamp())
                .arg(expires_at.timestamp())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| StoreError::Store(e.to_string()))?;
            if created == 0 {
                warn!(attempt, "refresh token hash collision, retrying");
                continue;
            }

            return Ok(IssuedRefreshToken { token, record });
        }

        Err(StoreError::Store(
            "could not allocate a unique refresh token".to_string(),
        ))
    }

    async fn delete_refresh_token(
        &self,
        token_hash: &RefreshTokenHash,
    ) -> Result<bool, StoreError> {
        let key = self.refresh_key(token_hash);
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(&key)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(removed == 1)
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        Ok(SweepReport::default())
    }
}
