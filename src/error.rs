// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types shared by the session manager and its backends.

/// Errors surfaced to callers of the session manager.
///
/// Every variant is returned to the immediate caller; the manager performs no
/// retries. Activity logging is the only best-effort path and never produces
/// one of these for the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Backend is not configured; authentication is disabled")]
    ProviderUnavailable,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SessionError {
    /// True when the backend was never configured (no request was attempted).
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, SessionError::ProviderUnavailable)
    }

    /// True when the auth provider rejected credentials or an account request.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SessionError::Auth(_))
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
