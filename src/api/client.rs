//! HTTP client for the Galley account backend.
//!
//! This module bridges a third-party provider token to an application
//! session (`login`) and performs Bearer-authenticated profile updates.
//! It never touches the session store - callers persist the returned
//! session, keeping this client testable against raw response fixtures.

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{Session, UserProfile};

use super::AuthError;

/// HTTP request timeout in seconds.
/// Sign-in and profile edits are small requests; failing fast keeps the
/// pending state in the UI short.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Envelope for `/api/login` responses
#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: String,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Envelope for profile update responses
#[derive(Debug, Deserialize)]
struct UserResponse {
    status: String,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    message: Option<String>,
}

/// Error envelope the backend uses for every failure
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { message: Some(m) }) => m,
        _ => body.to_string(),
    }
}

/// Account backend client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange a provider-issued token for an application session.
    ///
    /// No automatic retry: whether and when to retry a failed sign-in is the
    /// caller's decision.
    pub async fn login(&self, provider_token: &str) -> Result<Session, AuthError> {
        let url = format!("{}/api/login", self.base_url);
        debug!(url = %url, "exchanging provider token");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "access_token": provider_token }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_login_response(status, &body)
    }

    /// Change the display name; returns a new session with the backend's
    /// authoritative user record and the same access token.
    pub async fn update_username(
        &self,
        session: &Session,
        new_name: &str,
    ) -> Result<Session, AuthError> {
        // Mirrors the backend rule so an empty edit never leaves the client
        if new_name.trim().is_empty() {
            return Err(AuthError::ValidationRejected(
                "Username cannot be empty".to_string(),
            ));
        }
        self.update_profile(
            session,
            "/api/update_username",
            serde_json::json!({ "new_username": new_name }),
        )
        .await
    }

    /// Change the profile picture (base64 image data).
    pub async fn update_picture(
        &self,
        session: &Session,
        new_picture: &str,
    ) -> Result<Session, AuthError> {
        if new_picture.trim().is_empty() {
            return Err(AuthError::ValidationRejected(
                "Missing new picture".to_string(),
            ));
        }
        self.update_profile(
            session,
            "/api/update_picture",
            serde_json::json!({ "new_picture": new_picture }),
        )
        .await
    }

    async fn update_profile(
        &self,
        session: &Session,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Session, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "updating profile");

        let response = self
            .client
            .post(&url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", session.access_token),
            )
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let user = parse_user_response(status, &text)?;
        Ok(session.with_user(user))
    }
}

fn parse_login_response(status: StatusCode, body: &str) -> Result<Session, AuthError> {
    if !status.is_success() {
        return Err(AuthError::from_status(status, &error_message(body), true));
    }

    match serde_json::from_str::<LoginResponse>(body) {
        Ok(LoginResponse {
            status,
            user: Some(user),
            access_token: Some(token),
            ..
        }) if status == "success" => Ok(Session::new(user, token)),
        Ok(LoginResponse { message, .. }) => {
            // The backend answered but declined to issue a session
            Err(AuthError::ProviderRejected(
                message.unwrap_or_else(|| "sign-in was not accepted".to_string()),
            ))
        }
        Err(e) => {
            warn!(error = %e, "unparseable login response");
            Err(AuthError::ProviderRejected(
                "malformed response from the sign-in server".to_string(),
            ))
        }
    }
}

fn parse_user_response(status: StatusCode, body: &str) -> Result<UserProfile, AuthError> {
    if !status.is_success() {
        return Err(AuthError::from_status(status, &error_message(body), false));
    }

    match serde_json::from_str::<UserResponse>(body) {
        Ok(UserResponse {
            status,
            user: Some(user),
            ..
        }) if status == "success" => Ok(user),
        Ok(UserResponse { message, .. }) => Err(AuthError::ValidationRejected(
            message.unwrap_or_else(|| "update was not accepted".to_string()),
        )),
        Err(e) => {
            warn!(error = %e, "unparseable update response");
            Err(AuthError::NetworkUnavailable(
                "malformed response from the server".to_string(),
            ))
        }
    }
}
