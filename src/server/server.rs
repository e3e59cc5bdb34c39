use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::RevocationSweeper;
use crate::settings::{self, Settings};
use anyhow::anyhow;
use sqlx::MySqlPool;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pools: Vec<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // A missing signing key is fatal here, never a per-request error.
        let jwt_config = load_jwt_config(&settings.auth)?;
        let lifetimes = session_lifetimes(&settings.auth)?;
        if settings.sweeper.interval().is_zero() {
            return Err(anyhow!("sweeper.interval_secs must be non-zero"));
        }
        let token_codec: Arc<dyn TokenCodec> =
            Arc::new(JwtHs256Codec::new(jwt_config, clock.clone()));
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let mut pools = Vec::new();

        let revocation_store: Arc<dyn RevocationStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemoryRevocationStore::new()),
            "mysql" => {
                let pool = connect_mysql(settings.store.mysql_dsn.as_deref(), "store").await?;
                if settings.store.run_migrations {
                    sqlx::migrate!().run(&pool).await?;
                    info!("migrations applied");
                }
                pools.push(pool.clone());
                Arc::new(MySqlRevocationStore::new(pool))
            }
            "redis" => {
                let dsn = settings
                    .store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.redis_dsn is required for the redis backend"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisRevocationStore::new(
                    redis_manager,
                    settings.store.redis_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let user_provider: Arc<dyn UserProvider> = match settings.users.backend.as_str() {
            "memory" => {
                let provider = MemoryUserProvider::new(credential_hasher.clone());
                for seed in &settings.users.seed {
                    let password = std::env::var(&seed.password_env)
                        .map_err(|_| anyhow!("{} is not set", seed.password_env))?;
                    provider.insert_user(&seed.email, &seed.name, &password).await?;
                    info!(email = %seed.email, "seeded user");
                }
                Arc::new(provider)
            }
            "mysql" => {
                let pool = connect_mysql(settings.users.mysql_dsn.as_deref(), "users").await?;
                pools.push(pool.clone());
                Arc::new(MySqlUserProvider::new(pool, credential_hasher.clone()))
            }
            other => return Err(anyhow!("Unknown users backend: {}", other)),
        };

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            token_codec,
            revocation_store.clone(),
            user_provider,
            clock.clone(),
            lifetimes,
        ));

        let cancel = CancellationToken::new();
        let sweeper = RevocationSweeper::new(
            revocation_store,
            clock,
            settings.sweeper.interval(),
            cancel.clone(),
        );
        let sweeper_handle = tokio::spawn(async move {
            sweeper.run().await;
        });

        info!(
            store = %settings.store.backend,
            users = %settings.users.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pools,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        self.cancel.cancel();

        let handle = self
            .sweeper_handle
            .lock()
            .ok()
            .and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        for pool in &self.pools {
            pool.close().await;
        }
    }
}

async fn connect_mysql(dsn: Option<&str>, section: &str) -> anyhow::Result<MySqlPool> {
    let dsn = dsn.ok_or_else(|| anyhow!("{section}.mysql_dsn is required for the mysql backend"))?;
    Ok(MySqlPool::connect(dsn).await?)
}

fn session_lifetimes(auth: &settings::Auth) -> anyhow::Result<SessionLifetimes> {
    let lifetimes = SessionLifetimes {
        access_ttl: auth.access_ttl(),
        refresh_ttl: auth.refresh_ttl(),
    };
    lifetimes
        .check(chrono::Utc::now())
        .map_err(|e| anyhow!("auth.access_ttl_secs / auth.refresh_ttl_secs: {e}"))?;
    Ok(lifetimes)
}

fn read_key(id: &str, env: &str) -> anyhow::Result<SigningKey> {
    let secret = std::env::var(env).map_err(|_| anyhow!("signing key {id}: {env} is not set"))?;
    if secret.is_empty() {
        return Err(anyhow!("signing key {id}: {env} is empty"));
    }
    Ok(SigningKey {
        id: id.to_string(),
        secret: secret.into_bytes(),
    })
}

pub fn load_jwt_config(auth: &settings::Auth) -> anyhow::Result<JwtConfig> {
    let active_key = read_key(&auth.signing_key_id, &auth.signing_key_env)?;
    let retired_keys = auth
        .retired_keys
        .iter()
        .map(|key| read_key(&key.id, &key.env))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(JwtConfig {
        issuer: auth.issuer.clone(),
        audience: auth.audience.clone(),
        active_key,
        retired_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_settings(env: &str) -> settings::Auth {
        settings::Auth {
            issuer: "tokengate.test".to_string(),
            audience: "api".to_string(),
            access_ttl_secs: 60,
            refresh_ttl_secs: 600,
            signing_key_id: "k1".to_string(),
            signing_key_env: env.to_string(),
            retired_keys: vec![],
        }
    }

    #[test]
    fn lifetimes_must_fit_a_timestamp() {
        assert!(session_lifetimes(&auth_settings("UNUSED")).is_ok());

        let mut auth = auth_settings("UNUSED");
        auth.refresh_ttl_secs = u64::MAX;
        let err = session_lifetimes(&auth).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");

        let mut auth = auth_settings("UNUSED");
        auth.access_ttl_secs = 0;
        assert!(session_lifetimes(&auth).is_err());
    }

    #[test]
    fn missing_signing_key_is_fatal() {
        let err = load_jwt_config(&auth_settings("TOKENGATE_TEST_KEY_THAT_IS_NEVER_SET"))
            .unwrap_err();
        assert!(err.to_string().contains("is not set"));
    }

    #[test]
    fn signing_key_is_read_from_environment() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("TOKENGATE_TEST_KEY_PRESENT", "s3cret") };
        let cfg = load_jwt_config(&auth_settings("TOKENGATE_TEST_KEY_PRESENT")).unwrap();
        assert_eq!(cfg.active_key.id, "k1");
        assert_eq!(cfg.active_key.secret, b"s3cret".to_vec());
        assert!(cfg.retired_keys.is_empty());
    }
}
