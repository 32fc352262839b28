//! Contract between the session manager and an external auth provider.

use std::future::Future;

use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{Credentials, Session};

/// Capacity of provider event channels. Slow subscribers that fall further
/// behind than this resynchronize from `current_session`.
pub const AUTH_EVENT_CAPACITY: usize = 16;

/// Session-change notification pushed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// The session known at startup (restored or absent).
    InitialSession(Option<Session>),
    /// An interactive sign-in completed.
    SignedIn(Session),
    /// Sign-out or external invalidation (expiry, revocation).
    SignedOut,
    /// Same user, new tokens.
    TokenRefreshed(Session),
}

/// Session issuance and invalidation keyed by email + password.
pub trait AuthProvider: Send + Sync + 'static {
    /// False when the provider is not configured; callers must not issue requests.
    fn is_ready(&self) -> bool;

    /// Register for session-change events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// The session the provider currently holds, if any.
    fn current_session(&self) -> impl Future<Output = Result<Option<Session>>> + Send;

    /// Create an account. Whether this also signs the user in is up to the
    /// provider; if it does, it publishes `SignedIn`.
    fn sign_up(&self, credentials: &Credentials) -> impl Future<Output = Result<Session>> + Send;

    /// Authenticate and publish `SignedIn` on success.
    fn sign_in(&self, credentials: &Credentials) -> impl Future<Output = Result<Session>> + Send;

    /// Drop the current session and publish `SignedOut`.
    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;
}
