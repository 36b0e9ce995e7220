//! Kakao login provider client.
//!
//! Kakao issues an opaque access token; the only way to validate it is to
//! call the provider's user introspection endpoint. Every validation is an
//! outbound HTTP call with a bounded timeout. On a non-success status the
//! client distinguishes a rejected token (4xx, `InvalidCredential`) from an
//! unavailable upstream (5xx, timeout, connect failure,
//! `TransientProviderError`). No retry happens here.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{ExternalProfile, Provider, ProviderClient, ProviderCredential};
use crate::AuthResult;
use crate::config::IntrospectionProviderConfig;
use crate::error::AuthError;

/// Validates Kakao opaque access tokens via introspection.
pub struct KakaoClient {
    http: reqwest::Client,
    endpoint: Url,
}

/// Kakao user introspection response body.
#[derive(Debug, Deserialize)]
struct KakaoUserResponse {
    id: i64,
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
}

#[derive(Debug, Deserialize)]
struct KakaoAccount {
    #[serde(default)]
    profile: Option<KakaoProfile>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    is_email_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct KakaoProfile {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
}

impl KakaoClient {
    /// Builds a client from the Kakao provider configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the HTTP client cannot be built.
    pub fn new(config: &IntrospectionProviderConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("kakao http client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ProviderClient for KakaoClient {
    fn provider(&self) -> Provider {
        Provider::Kakao
    }

    async fn validate(&self, credential: &ProviderCredential) -> AuthResult<ExternalProfile> {
        let ProviderCredential::AccessToken { access_token } = credential else {
            return Err(AuthError::invalid_credential(
                "kakao expects an opaque access token credential",
            ));
        };

        let response = self
            .http
            .get(self.endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!(status = %status, "kakao rejected access token");
            return Err(AuthError::invalid_credential(format!(
                "kakao rejected token with status {status}"
            )));
        }
        if !status.is_success() {
            tracing::warn!(status = %status, "kakao introspection unavailable");
            return Err(AuthError::transient_provider(
                "kakao",
                format!("introspection returned status {status}"),
            ));
        }

        let body: KakaoUserResponse = response
            .json()
            .await
            .map_err(|e| AuthError::transient_provider("kakao", format!("bad response body: {e}")))?;

        Ok(profile_from_response(body))
    }
}

/// Maps a reqwest send failure to the error taxonomy.
///
/// Timeouts and connection failures are upstream availability problems,
/// never a statement about the credential.
fn classify_send_error(error: reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::transient_provider("kakao", "introspection request timed out")
    } else {
        AuthError::transient_provider("kakao", format!("introspection request failed: {error}"))
    }
}

fn profile_from_response(body: KakaoUserResponse) -> ExternalProfile {
    let mut profile = ExternalProfile::new(Provider::Kakao, body.id.to_string());

    if let Some(account) = body.kakao_account {
        if let Some(kakao_profile) = account.profile {
            profile.display_name = kakao_profile.nickname;
            profile.photo_url = kakao_profile.profile_image_url;
        }
        profile.email = account.email;
        profile.email_verified = account.is_email_verified;
    }

    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    // HTTP status mapping is covered by the wiremock integration tests;
    // these pin the pure pieces.

    #[test]
    fn test_profile_from_full_response() {
        let body: KakaoUserResponse = serde_json::from_str(
            r#"{
                "id": 12345,
                "kakao_account": {
                    "profile": {
                        "nickname": "지도사랑",
                        "profile_image_url": "https://img.example.com/p.jpg"
                    },
                    "email": "user@example.com",
                    "is_email_verified": true
                }
            }"#,
        )
        .unwrap();

        let profile = profile_from_response(body);
        assert_eq!(profile.provider, Provider::Kakao);
        assert_eq!(profile.provider_user_id, "12345");
        assert_eq!(profile.display_name.as_deref(), Some("지도사랑"));
        assert_eq!(profile.email_verified, Some(true));
    }

    #[test]
    fn test_profile_from_minimal_response() {
        let body: KakaoUserResponse = serde_json::from_str(r#"{"id": 99}"#).unwrap();
        let profile = profile_from_response(body);

        assert_eq!(profile.provider_user_id, "99");
        assert!(profile.display_name.is_none());
        assert!(profile.email.is_none());
    }

    #[tokio::test]
    async fn test_rejects_wrong_credential_kind() {
        let config = IntrospectionProviderConfig::default();
        let client = KakaoClient::new(&config).unwrap();

        let err = client
            .validate(&ProviderCredential::IdToken {
                id_token: "jwt".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_credential");
    }
}
