//! Request handlers for the bridge endpoints.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, header};
use serde::Deserialize;

use crate::AuthResult;
use crate::error::AuthError;
use crate::provider::{Provider, ProviderCredential};
use crate::resolver::{IdentitySummary, LoginResponse};
use crate::token::{SessionClaims, TokenCheck};

use super::AppState;

/// Caller key for admission control: the first address in
/// `X-Forwarded-For` when present, the peer address otherwise.
fn caller_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|first| first.trim().to_string())
        .filter(|first| !first.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AuthError::invalid_credential("missing Authorization header"))?
        .to_str()
        .map_err(|_| AuthError::invalid_credential("malformed Authorization header"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::invalid_credential("expected a bearer token"))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub provider: Provider,
    pub credential: ProviderCredential,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> AuthResult<Json<LoginResponse>> {
    let caller = caller_key(&headers, peer);
    let response = state
        .resolver
        .social_login(&caller, request.provider, &request.credential)
        .await?;
    Ok(Json(response))
}

/// `POST /auth/anonymous`
pub async fn anonymous(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> AuthResult<Json<LoginResponse>> {
    let caller = caller_key(&headers, peer);
    let response = state.resolver.create_anonymous(&caller).await?;
    Ok(Json(response))
}

/// `POST /auth/link` — bearer token names the anonymous identity.
pub async fn link(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> AuthResult<Json<LoginResponse>> {
    let caller = caller_key(&headers, peer);
    let token = bearer_token(&headers)?;
    let response = state
        .resolver
        .link_provider(&caller, token, request.provider, &request.credential)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// `POST /auth/verify` — mandatory gate, fails with 401 on a bad token.
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> AuthResult<Json<SessionClaims>> {
    let claims = state.resolver.verify_token(&request.token)?;
    Ok(Json(claims))
}

/// `POST /auth/check` — optional authentication, always 200 with a
/// validity report.
pub async fn check(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Json<TokenCheck> {
    Json(state.resolver.check_token(&request.token))
}

#[derive(Debug, Deserialize)]
pub struct SetClaimsRequest {
    pub uid: String,
    pub claims: BTreeMap<String, String>,
}

/// `POST /auth/claims` — administrative, bearer token must hold
/// `role=admin`.
pub async fn set_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SetClaimsRequest>,
) -> AuthResult<Json<IdentitySummary>> {
    let token = bearer_token(&headers)?;
    let identity = state
        .resolver
        .set_custom_claims(token, &request.uid, request.claims)
        .await?;
    Ok(Json(identity))
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.9:4120".parse().unwrap()
    }

    #[test]
    fn test_caller_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(caller_key(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_caller_key_falls_back_to_peer() {
        assert_eq!(caller_key(&HeaderMap::new(), peer()), "192.0.2.9");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(caller_key(&headers, peer()), "192.0.2.9");
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(bearer_token(&headers).is_err());

        assert!(bearer_token(&HeaderMap::new()).is_err());
    }
}
