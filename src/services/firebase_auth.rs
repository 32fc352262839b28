// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication client (email/password REST API).
//!
//! Handles:
//! - Account creation and password sign-in
//! - Local sign-out (Firebase has no client-side revocation)
//! - Session persistence to a JSON file between runs
//! - Refresh-token exchange when the ID token has expired
//! - Mapping Firebase error codes to readable messages

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::models::{Credentials, Session};
use crate::services::auth_provider::{AuthEvent, AuthProvider, AUTH_EVENT_CAPACITY};

const IDENTITY_HOST: &str = "identitytoolkit.googleapis.com";
const SECURE_TOKEN_HOST: &str = "securetoken.googleapis.com";

/// ID tokens live an hour; used when the response omits `expiresIn`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Firebase Auth provider.
pub struct FirebaseAuth {
    http: reqwest::Client,
    api_key: Option<String>,
    identity_url: String,
    token_url: String,
    session_file: Option<PathBuf>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl FirebaseAuth {
    /// Create a client for the configured project.
    ///
    /// For local development with emulator, set FIREBASE_AUTH_EMULATOR_HOST.
    pub fn new(config: &Config) -> Self {
        let (identity_url, token_url) = match &config.auth_emulator_host {
            Some(host) => {
                tracing::info!(host = %host, "Using Firebase Auth Emulator");
                (
                    format!("http://{}/{}/v1", host, IDENTITY_HOST),
                    format!("http://{}/{}/v1", host, SECURE_TOKEN_HOST),
                )
            }
            None => (
                format!("https://{}/v1", IDENTITY_HOST),
                format!("https://{}/v1", SECURE_TOKEN_HOST),
            ),
        };

        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Self {
            http: reqwest::Client::new(),
            api_key: config.firebase_api_key.clone(),
            identity_url,
            token_url,
            session_file: config.session_file.clone(),
            current: RwLock::new(None),
            events,
        }
    }

    /// A client with no project behind it. Reports not-ready.
    pub fn unconfigured() -> Self {
        let mut config = Config::test_default();
        config.firebase_api_key = None;
        config.auth_emulator_host = None;
        Self::new(&config)
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(SessionError::ProviderUnavailable)
    }

    /// Exchange the refresh token for a new ID token and publish `TokenRefreshed`.
    pub async fn refresh_session(&self) -> Result<Session> {
        let current = self
            .current
            .read()
            .await
            .clone()
            .ok_or_else(|| SessionError::Auth("Not signed in".to_string()))?;

        let session = self.exchange_refresh_token(&current).await?;
        self.store_session(&session).await;
        let _ = self.events.send(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    // ─── REST Calls ──────────────────────────────────────────────────────────

    /// POST `accounts:{method}` with email + password.
    async fn password_request(
        &self,
        method: &str,
        credentials: &Credentials,
    ) -> Result<Session> {
        let url = format!("{}/accounts:{}", self.identity_url, method);
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
            "returnSecureToken": true,
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key()?)])
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::Internal(anyhow::anyhow!("Auth request failed: {}", e)))?;

        let tokens: PasswordSignInResponse = check_response_json(response).await?;
        let expires_in = parse_expires_in(tokens.expires_in.as_deref());

        Ok(Session {
            user_id: tokens.local_id,
            email: tokens.email.unwrap_or_else(|| credentials.email.clone()),
            access_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }

    async fn exchange_refresh_token(&self, session: &Session) -> Result<Session> {
        let url = format!("{}/token", self.token_url);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key()?)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                SessionError::Internal(anyhow::anyhow!("Token refresh request failed: {}", e))
            })?;

        let tokens: RefreshTokenResponse = check_response_json(response).await?;
        let expires_in = parse_expires_in(tokens.expires_in.as_deref());

        // Prefer what the new token says about the user; the emulator issues
        // unsigned tokens that do not parse, so keep the old values then.
        let email = decode_id_token_claims(&tokens.id_token)
            .and_then(|claims| claims.email)
            .unwrap_or_else(|| session.email.clone());

        tracing::info!(user_id = %tokens.user_id, "ID token refreshed");

        Ok(Session {
            user_id: tokens.user_id,
            email,
            access_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }

    // ─── Session Storage ─────────────────────────────────────────────────────

    async fn store_session(&self, session: &Session) {
        *self.current.write().await = Some(session.clone());

        let Some(path) = &self.session_file else {
            return;
        };
        let result = match serde_json::to_vec_pretty(session) {
            Ok(bytes) => tokio::fs::write(path, bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(error) = result {
            tracing::warn!(path = %path.display(), error = %error, "Failed to persist session");
        }
    }

    async fn clear_session(&self) -> Option<Session> {
        let previous = self.current.write().await.take();

        if let Some(path) = &self.session_file {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove session file")
                }
            }
        }

        previous
    }

    async fn load_persisted_session(&self) -> Option<Session> {
        let path = self.session_file.as_ref()?;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read session file");
                return None;
            }
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Discarding malformed session file");
                None
            }
        }
    }

    async fn establish(&self, session: &Session) {
        self.store_session(session).await;
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
    }
}

impl AuthProvider for FirebaseAuth {
    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        self.api_key()?;

        let cached = self.current.read().await.clone();
        let session = match cached {
            Some(session) => session,
            None => match self.load_persisted_session().await {
                Some(session) => session,
                None => return Ok(None),
            },
        };

        if !session.is_expired_at(Utc::now()) {
            *self.current.write().await = Some(session.clone());
            return Ok(Some(session));
        }

        tracing::info!(user_id = %session.user_id, "Stored session expired, refreshing");
        match self.exchange_refresh_token(&session).await {
            Ok(refreshed) => {
                self.store_session(&refreshed).await;
                Ok(Some(refreshed))
            }
            Err(SessionError::Auth(message)) => {
                tracing::warn!(user_id = %session.user_id, error = %message, "Refresh rejected, dropping session");
                self.clear_session().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.password_request("signUp", credentials).await?;
        tracing::info!(user_id = %session.user_id, "Firebase account created");
        // Firebase signs the new account in immediately.
        self.establish(&session).await;
        Ok(session)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let session = self
            .password_request("signInWithPassword", credentials)
            .await?;
        self.establish(&session).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.api_key()?;
        if let Some(session) = self.clear_session().await {
            tracing::debug!(user_id = %session.user_id, "Firebase session dropped");
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }
}

// ─── Wire Types ──────────────────────────────────────────────────────────────

/// Response from `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordSignInResponse {
    id_token: String,
    refresh_token: String,
    local_id: String,
    email: Option<String>,
    /// Seconds, as a string
    expires_in: Option<String>,
}

/// Response from the secure token endpoint.
#[derive(Debug, Deserialize)]
struct RefreshTokenResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorResponse {
    error: FirebaseErrorBody,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    message: String,
}

/// Claims read from a Firebase ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

impl IdTokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Read the claims of an ID token without verifying its signature.
///
/// The backend verifies tokens; the client only needs the user fields.
pub fn decode_id_token_claims(token: &str) -> Option<IdTokenClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<IdTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

fn parse_expires_in(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
}

/// Check response status and parse the JSON body, mapping Firebase errors.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // 4xx with an error code is a rejection of the request itself
        if status.is_client_error() {
            if let Ok(error) = serde_json::from_str::<FirebaseErrorResponse>(&body) {
                return Err(SessionError::Auth(auth_error_message(&error.error.message)));
            }
        }

        tracing::error!(status = %status, body = %body, "Firebase Auth request failed");
        return Err(SessionError::Internal(anyhow::anyhow!(
            "Firebase Auth HTTP {}",
            status
        )));
    }

    response
        .json()
        .await
        .map_err(|e| SessionError::Internal(anyhow::anyhow!("JSON parse error: {}", e)))
}

/// Turn a Firebase error message (`CODE` or `CODE : detail`) into text for
/// the user, keeping the code in parentheses.
pub fn auth_error_message(raw: &str) -> String {
    let (code, detail) = match raw.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (raw.trim(), None),
    };

    let readable = match code {
        "EMAIL_EXISTS" => "Email is already registered",
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password"
        }
        "INVALID_EMAIL" => "Email address is badly formatted",
        "MISSING_PASSWORD" => "Password is required",
        "WEAK_PASSWORD" => detail.unwrap_or("Password is too weak"),
        "USER_DISABLED" => "This account has been disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later",
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            "Session expired, please sign in again"
        }
        _ => return raw.trim().to_string(),
    };

    format!("{} ({})", readable, code)
}
