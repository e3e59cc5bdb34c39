use crate::application_port::CredentialHasher;
use crate::domain_port::UserError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, UserError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| UserError::Store(format!("hash error: {e}")))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, UserError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| UserError::Store(format!("invalid PHC hash: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(UserError::Store(format!("verify error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("hunter2").await.unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify_password("hunter2", &hash).await.unwrap());
        assert!(!hasher.verify_password("hunter3", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn unparsable_hash_is_an_error() {
        let result = Argon2PasswordHasher
            .verify_password("hunter2", "not-a-phc-string")
            .await;
        assert!(matches!(result, Err(UserError::Store(_))));
    }
}
