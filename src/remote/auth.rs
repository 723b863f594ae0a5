use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::{is_secure_endpoint, read_limited_bytes, LimitedReadError};
use crate::session::{Session, SessionIdentity};

const AUTH_TIMEOUT: Duration = Duration::from_secs(20);

/// Auth responses are small JSON documents; anything past this is rejected.
pub const MAX_AUTH_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB

const MIN_PASSWORD_LENGTH: usize = 8;
const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,
    #[error("Sign-in succeeded but no session was issued")]
    NoSession,
    #[error("{0}")]
    Rejected(String),
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Auth response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid auth response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid session lifetime from auth service: {0}s")]
    InvalidExpiry(i64),
    #[error("Insecure auth URL: HTTPS required (except localhost for testing)")]
    InsecureEndpoint,
}

impl From<LimitedReadError> for AuthError {
    fn from(e: LimitedReadError) -> Self {
        match e {
            LimitedReadError::TooLarge(limit) => AuthError::ResponseTooLarge(limit),
            LimitedReadError::Network(e) => AuthError::Network(e),
        }
    }
}

/// Local password rules checked before a sign-up request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least 8 characters long")]
    TooShort,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one number")]
    MissingNumber,
    #[error("Password must contain at least one special character")]
    MissingSpecialChar,
}

/// Check a new password against the sign-up rules, reporting the first
/// rule it breaks.
pub fn validate_password(password: &str) -> Result<(), PasswordPolicyError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordPolicyError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingNumber);
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(PasswordPolicyError::MissingSpecialChar);
    }
    Ok(())
}

#[derive(Deserialize)]
struct SessionResponse {
    session: Option<IssuedSession>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedSession {
    access_token: String,
    access_token_expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    user: IssuedUser,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedUser {
    id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl IssuedSession {
    fn into_session(self, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let lifetime = self.access_token_expires_in;
        let expires_at = ChronoDuration::try_seconds(lifetime)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(AuthError::InvalidExpiry(lifetime))?;

        Ok(Session {
            identity: SessionIdentity::new(self.user.id),
            email: self.user.email,
            display_name: self.user.display_name,
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at,
        })
    }
}

/// Email/password client for the hosted auth service.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exchange credentials for a session. No retries: a failure goes back to
    /// the user, who resubmits.
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, AuthError> {
        self.check_endpoint()?;

        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let response = self.post_json("signin/email-password", &body).await?;

        let status = response.status();
        if matches!(status.as_u16(), 400 | 401 | 403) {
            tracing::info!(status = status.as_u16(), "Sign-in rejected by auth service");
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_AUTH_RESPONSE_SIZE).await?;
        let parsed: SessionResponse = serde_json::from_slice(&bytes)?;
        let session = parsed.session.ok_or(AuthError::NoSession)?.into_session(Utc::now())?;

        tracing::info!(identity = %session.identity, "Signed in");
        Ok(session)
    }

    /// Register a new account with the `user` role.
    ///
    /// Returns `None` when the account was created but the service wants the
    /// address verified before issuing a session. Rejections (address in use,
    /// password refused by the server) carry the service's message.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        display_name: &str,
    ) -> Result<Option<Session>, AuthError> {
        self.check_endpoint()?;

        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
            "options": {
                "displayName": display_name,
                "metadata": { "name": display_name },
                "allowedRoles": ["user"],
                "defaultRole": "user",
            },
        });
        let response = self.post_json("signup/email-password", &body).await?;

        let status = response.status();
        let bytes = read_limited_bytes(response, MAX_AUTH_RESPONSE_SIZE).await?;
        if status.is_client_error() {
            tracing::info!(status = status.as_u16(), "Sign-up rejected by auth service");
            return Err(match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => AuthError::Rejected(body.message),
                Err(_) => AuthError::HttpStatus(status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(AuthError::HttpStatus(status.as_u16()));
        }

        let parsed: SessionResponse = serde_json::from_slice(&bytes)?;
        match parsed.session {
            Some(issued) => {
                let session = issued.into_session(Utc::now())?;
                tracing::info!(identity = %session.identity, "Signed up");
                Ok(Some(session))
            }
            None => {
                tracing::info!("Signed up, awaiting email verification");
                Ok(None)
            }
        }
    }

    /// Invalidate the session on the auth service.
    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.check_endpoint()?;

        let body = serde_json::json!({
            "refreshToken": session.refresh_token.as_ref().map(|t| t.expose_secret().to_string()),
        });
        let request = self
            .http
            .post(format!("{}/signout", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", session.access_token.expose_secret()),
            )
            .body(body.to_string());

        let response = tokio::time::timeout(AUTH_TIMEOUT, request.send())
            .await
            .map_err(|_| AuthError::Timeout)?
            .map_err(AuthError::Network)?;

        if !response.status().is_success() {
            return Err(AuthError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(identity = %session.identity, "Signed out remotely");
        Ok(())
    }

    async fn post_json(
        &self,
        route: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        let request = self
            .http
            .post(format!("{}/{}", self.base_url, route))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());

        tokio::time::timeout(AUTH_TIMEOUT, request.send())
            .await
            .map_err(|_| AuthError::Timeout)?
            .map_err(AuthError::Network)
    }

    fn check_endpoint(&self) -> Result<(), AuthError> {
        if is_secure_endpoint(&self.base_url) {
            Ok(())
        } else {
            tracing::error!(auth_url = %self.base_url, "Rejecting non-HTTPS auth URL");
            Err(AuthError::InsecureEndpoint)
        }
    }
}
