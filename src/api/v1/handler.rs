use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::reject;

const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub token_type: &'static str,
    pub access_expires_in: u64,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        SessionResponse {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: TOKEN_TYPE,
            access_expires_in: session.access_expires_in.as_secs(),
            access_expires_at: session.access_expires_at,
            refresh_expires_at: session.refresh_expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub identifier: String,
    pub secret: String,
}

pub async fn sign_in(
    body: SignInRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = auth_service
        .sign_in(&body.identifier, &body.secret)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SessionResponse::from(
        session,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = auth_service
        .refresh(&body.access_token, &body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SessionResponse::from(
        session,
    ))))
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {}

pub async fn sign_out(
    access_token: String,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .revoke_current(&access_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SignOutResponse {})))
}

pub async fn current_user(
    access_token: String,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user = auth_service
        .current_user(&access_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(user)))
}
