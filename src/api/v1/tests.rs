use super::*;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use serde_json::{Value, json};
use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

/// Keeps handler tests fast; Argon2 is covered on its own.
struct PlainHasher;

#[async_trait::async_trait]
impl CredentialHasher for PlainHasher {
    async fn hash_password(&self, password: &str) -> Result<String, UserError> {
        Ok(format!("plain:{password}"))
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, UserError> {
        Ok(password_hash == format!("plain:{password}"))
    }
}

async fn service() -> Arc<dyn AuthService> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(
        JwtConfig {
            issuer: "tokengate.test".to_string(),
            audience: "api".to_string(),
            active_key: SigningKey {
                id: "k1".to_string(),
                secret: b"api-test-secret".to_vec(),
            },
            retired_keys: vec![],
        },
        clock.clone(),
    ));
    let users = MemoryUserProvider::new(Arc::new(PlainHasher));
    users
        .insert_user("ada@example.com", "Ada", "correct horse")
        .await
        .unwrap();

    Arc::new(RealAuthService::new(
        codec,
        Arc::new(MemoryRevocationStore::new()),
        Arc::new(users),
        clock,
        SessionLifetimes::default(),
    ))
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn sign_in_then_fetch_current_user() {
    let api = routes(service().await).recover(recover_error);

    let res = warp::test::request()
        .method("POST")
        .path("/auth/sign_in")
        .json(&json!({"identifier": "ada@example.com", "secret": "correct horse"}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res.body());
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["access_expires_in"], 900);
    let access = body["data"]["access_token"].as_str().unwrap().to_string();

    let res = warp::test::request()
        .method("GET")
        .path("/auth/user")
        .header("authorization", bearer(&access))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res.body());
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["name"], "Ada");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let api = routes(service().await).recover(recover_error);

    let res = warp::test::request()
        .method("POST")
        .path("/auth/sign_in")
        .json(&json!({"identifier": "ada@example.com", "secret": "wrong"}))
        .reply(&api)
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res.body());
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "Unauthorized");
}

#[tokio::test]
async fn sign_out_makes_the_token_unusable() {
    let svc = service().await;
    let session = svc.sign_in("ada@example.com", "correct horse").await.unwrap();
    let api = routes(svc).recover(recover_error);

    let res = warp::test::request()
        .method("DELETE")
        .path("/auth/sign_out")
        .header("authorization", bearer(&session.access_token.0))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    for (method, path) in [("GET", "/auth/user"), ("DELETE", "/auth/sign_out")] {
        let res = warp::test::request()
            .method(method)
            .path(path)
            .header("authorization", bearer(&session.access_token.0))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
    }
}

#[tokio::test]
async fn refresh_accepts_prefixed_access_token_and_rotates() {
    let svc = service().await;
    let session = svc.sign_in("ada@example.com", "correct horse").await.unwrap();
    let api = routes(svc).recover(recover_error);
    let request = json!({
        "access_token": bearer(&session.access_token.0),
        "refresh_token": session.refresh_token.0,
    });

    let res = warp::test::request()
        .method("POST")
        .path("/auth/refresh")
        .json(&request)
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res.body());
    assert_ne!(body["data"]["access_token"], session.access_token.0.as_str());
    assert_ne!(body["data"]["refresh_token"], session.refresh_token.0.as_str());

    let replay = warp::test::request()
        .method("POST")
        .path("/auth/refresh")
        .json(&request)
        .reply(&api)
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_non_bearer_authorization_is_unauthorized() {
    let api = routes(service().await).recover(recover_error);

    let res = warp::test::request()
        .method("GET")
        .path("/auth/user")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = warp::test::request()
        .method("GET")
        .path("/auth/user")
        .header("authorization", "Basic YWRhOnB3")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let api = routes(service().await).recover(recover_error);

    let res = warp::test::request()
        .method("POST")
        .path("/auth/sign_in")
        .header("content-type", "application/json")
        .body("{\"identifier\": 42}")
        .reply(&api)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
