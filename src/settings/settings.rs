use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub store: Store,
    pub sweeper: Sweeper,
    pub users: Users,
}

/// Token lifetimes and key material. Secrets are never in the file, only the
/// names of the environment variables holding them.
#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub signing_key_id: String,
    pub signing_key_env: String,
    #[serde(default)]
    pub retired_keys: Vec<RetiredKey>,
}

impl Auth {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct RetiredKey {
    pub id: String,
    pub env: String,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub tls: Option<Tls>,
}

#[derive(Debug, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory", "mysql" or "redis"
    pub mysql_dsn: Option<String>,
    pub redis_dsn: Option<String>,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_redis_prefix() -> String {
    "tokengate".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Sweeper {
    pub interval_secs: u64,
}

impl Sweeper {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct Users {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
    /// Accounts created at startup by the memory backend.
    #[serde(default)]
    pub seed: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub name: String,
    pub password_env: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_settings_parse() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        assert_eq!(settings.store.backend, "memory");
        assert_eq!(settings.auth.access_ttl(), Duration::from_secs(15 * 60));
        assert!(settings.auth.refresh_ttl() > settings.auth.access_ttl());
        assert!(settings.http.tls.is_none());
        assert_eq!(settings.users.seed.len(), 1);
        assert_eq!(settings.users.seed[0].password_env, "TOKENGATE_DEV_PASSWORD");
    }

    #[test]
    fn release_settings_parse() {
        let settings = parse_settings(Some("settings/release.toml")).unwrap();
        assert_eq!(settings.store.backend, "mysql");
        assert!(settings.store.mysql_dsn.is_some());
        assert_eq!(settings.auth.retired_keys.len(), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
