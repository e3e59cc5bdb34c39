use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::Clock;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct SigningKey {
    pub id: String,
    pub secret: Vec<u8>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Signing material for access tokens. Tokens are signed with `active_key`;
/// `retired_keys` are still accepted for verification until dropped from config.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub active_key: SigningKey,
    pub retired_keys: Vec<SigningKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    jti: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        JwtHs256Codec { cfg, clock }
    }

    fn key_for(&self, kid: Option<&str>) -> Option<&SigningKey> {
        let kid = kid?;
        std::iter::once(&self.cfg.active_key)
            .chain(self.cfg.retired_keys.iter())
            .find(|key| key.id == kid)
    }

    // `exp` is checked against the injected clock, not by jsonwebtoken.
    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = false;
        v.leeway = 0;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(secs, 0).ok_or(DecodeError::Malformed)
}

impl TokenCodec for JwtHs256Codec {
    fn encode(&self, claims: &AccessClaims) -> Result<AccessToken, AuthError> {
        let jwt_claims = JwtClaims {
            sub: claims.subject.to_string(),
            jti: claims.token_id.to_string(),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
        };
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.cfg.active_key.id.clone());

        let token = encode(
            &header,
            &jwt_claims,
            &EncodingKey::from_secret(&self.cfg.active_key.secret),
        )
        .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(AccessToken(token))
    }

    fn decode(&self, token: &str, expiry: ExpiryCheck) -> Result<AccessClaims, DecodeError> {
        let header = decode_header(token).map_err(|_| DecodeError::Malformed)?;
        if header.alg != Algorithm::HS256 {
            return Err(DecodeError::Malformed);
        }
        let key = self
            .key_for(header.kid.as_deref())
            .ok_or(DecodeError::BadSignature)?;

        let data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(&key.secret),
            &self.validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => DecodeError::BadSignature,
            _ => DecodeError::Malformed,
        })?;

        let jwt_claims = data.claims;
        let claims = AccessClaims {
            subject: jwt_claims
                .sub
                .parse::<UserId>()
                .map_err(|_| DecodeError::Malformed)?,
            token_id: jwt_claims
                .jti
                .parse::<TokenId>()
                .map_err(|_| DecodeError::Malformed)?,
            issued_at: from_timestamp(jwt_claims.iat)?,
            expires_at: from_timestamp(jwt_claims.exp)?,
        };

        if expiry == ExpiryCheck::Enforce && claims.is_expired_at(self.clock.now()) {
            return Err(DecodeError::Expired);
        }
        Ok(claims)
    }
}
