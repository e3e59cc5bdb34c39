use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let sign_in = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("sign_in"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(auth_service.clone()))
        .and_then(handler::sign_in);

    let refresh = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(auth_service.clone()))
        .and_then(handler::refresh);

    let sign_out = warp::delete()
        .and(warp::path("auth"))
        .and(warp::path("sign_out"))
        .and(warp::path::end())
        .and(with_bearer())
        .and(with(auth_service.clone()))
        .and_then(handler::sign_out);

    let user = warp::get()
        .and(warp::path("auth"))
        .and(warp::path("user"))
        .and(warp::path::end())
        .and(with_bearer())
        .and(with(auth_service))
        .and_then(handler::current_user);

    sign_in.or(refresh).or(sign_out).or(user)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Pulls the raw access token out of `Authorization: Bearer <token>`.
fn with_bearer() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        |header: String| async move {
            match header.strip_prefix("Bearer ") {
                Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
                _ => Err(reject::custom(ApiErrorCode::Unauthorized)),
            }
        },
    )
}
