//! Shared fixture: in-memory adapters wired into a real auth service, driven by a manual clock.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokengate::application_impl::*;
use tokengate::application_port::*;
use tokengate::domain_model::*;
use tokengate::domain_port::*;
use tokengate::infra_memory::*;

pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);
pub const PASSWORD: &str = "correct horse battery staple";

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(whole_seconds(Utc::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Stand-in hasher so tests don't pay for Argon2.
pub struct PlainHasher;

#[async_trait::async_trait]
impl CredentialHasher for PlainHasher {
    async fn hash_password(&self, password: &str) -> Result<String, UserError> {
        Ok(format!("plain:{password}"))
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, UserError> {
        Ok(password_hash == format!("plain:{password}"))
    }
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "tokengate.test".to_string(),
        audience: "api".to_string(),
        active_key: SigningKey {
            id: "test-1".to_string(),
            secret: b"integration-test-secret".to_vec(),
        },
        retired_keys: vec![],
    }
}

pub fn lifetimes() -> SessionLifetimes {
    SessionLifetimes {
        access_ttl: ACCESS_TTL,
        refresh_ttl: REFRESH_TTL,
    }
}

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub codec: Arc<JwtHs256Codec>,
    pub store: Arc<MemoryRevocationStore>,
    pub users: Arc<MemoryUserProvider>,
    pub service: Arc<RealAuthService>,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryRevocationStore::new());
        let codec = Arc::new(JwtHs256Codec::new(jwt_config(), clock.clone()));
        let users = Arc::new(MemoryUserProvider::new(Arc::new(PlainHasher)));
        let service = Arc::new(RealAuthService::new(
            codec.clone(),
            store.clone(),
            users.clone(),
            clock.clone(),
            lifetimes(),
        ));

        Self {
            clock,
            codec,
            store,
            users,
            service,
        }
    }

    pub async fn add_user(&self, email: &str) -> UserId {
        self.users
            .insert_user(email, "Test User", PASSWORD)
            .await
            .unwrap()
    }
}
