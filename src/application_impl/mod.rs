mod auth_gate;
mod auth_service_impl;
mod credential_hasher_argon2;
mod refresh_coordinator;
mod session_issuer;
mod token_codec_jwt;

pub use auth_gate::*;
pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use refresh_coordinator::*;
pub use session_issuer::*;
pub use token_codec_jwt::*;
