//! Session, credential and manager-state models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::models::UserProfile;

/// Provider-issued proof of authentication.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    /// Bearer token for backend requests (Firebase ID token)
    pub access_token: String,
    pub refresh_token: String,
    /// When `access_token` stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Email + password pair sent to the auth provider.
#[derive(Clone, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Account creation request: credentials plus the public username.
#[derive(Debug, Clone, Validate)]
pub struct SignUpRequest {
    #[validate(nested)]
    pub credentials: Credentials,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

impl SignUpRequest {
    pub fn new(email: &str, password: &str, username: &str) -> Self {
        Self {
            credentials: Credentials::new(email, password),
            username: username.trim().to_string(),
        }
    }
}

/// What the session manager currently knows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    /// The provider has not reported anything yet.
    #[default]
    Uninitialized,
    /// Initial session check in flight. Not the same as signed out.
    Loading,
    /// Signed in. `profile` is `None` only if the profile fetch failed.
    Authenticated {
        session: Session,
        profile: Option<UserProfile>,
    },
    /// Confirmed: nobody is signed in.
    Anonymous,
}

impl SessionState {
    /// True once the state is known (signed in or out).
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated { .. } | SessionState::Anonymous
        )
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session().map(|s| s.user_id.as_str())
    }
}

/// One-shot events published to consumers (toasts, celebrations).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// First sign-in since local midnight. The consumer shows the
    /// celebration and records the login activity.
    FirstLoginOfDay { user_id: String },
    /// The session is valid but its profile could not be loaded.
    ProfileSyncFailed { user_id: String, message: String },
    /// A sign-in has been fully applied, first-login check included.
    /// Always follows any `FirstLoginOfDay` for the same sign-in.
    SignInApplied { user_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            user_id: "uid-1".to_string(),
            email: "alice@x.com".to_string(),
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_at: DateTime::parse_from_rfc3339("2026-03-10T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_debug_hides_tokens() {
        let debug = format!("{:?}", session());
        assert!(debug.contains("uid-1"));
        assert!(!debug.contains("secret"));

        let debug = format!("{:?}", Credentials::new("a@x.com", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_expiry() {
        let s = session();
        assert!(!s.is_expired_at(s.expires_at - chrono::Duration::seconds(1)));
        assert!(s.is_expired_at(s.expires_at));
    }

    #[test]
    fn test_empty_credentials_fail_validation() {
        assert!(Credentials::new("", "pw").validate().is_err());
        assert!(Credentials::new("a@x.com", "").validate().is_err());
        assert!(Credentials::new("  ", "pw").validate().is_err());
        assert!(Credentials::new("a@x.com", "pw").validate().is_ok());
    }

    #[test]
    fn test_sign_up_requires_username() {
        assert!(SignUpRequest::new("a@x.com", "pw", "").validate().is_err());
        assert!(SignUpRequest::new("", "pw", "alice").validate().is_err());
        assert!(SignUpRequest::new("a@x.com", "pw", "alice").validate().is_ok());
    }

    #[test]
    fn test_state_accessors() {
        assert!(SessionState::default().is_loading());
        assert!(!SessionState::Loading.is_settled());
        assert!(SessionState::Anonymous.is_settled());
        assert!(SessionState::Anonymous.session().is_none());

        let state = SessionState::Authenticated {
            session: session(),
            profile: None,
        };
        assert!(state.is_authenticated());
        assert_eq!(state.user_id(), Some("uid-1"));
        assert!(state.profile().is_none());
    }
}
