//! In-process auth provider with the same event semantics as Firebase.
//!
//! Password strength is not checked; only duplicate accounts and wrong
//! credentials are rejected.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};

use crate::error::{Result, SessionError};
use crate::models::{Credentials, Session};
use crate::services::auth_provider::{AuthEvent, AuthProvider, AUTH_EVENT_CAPACITY};

const SESSION_TTL_SECS: i64 = 60 * 60;

struct Account {
    user_id: String,
    password: String,
}

/// Accounts and the current session kept in memory. Clones share state.
#[derive(Clone)]
pub struct MemoryAuth {
    inner: Arc<Inner>,
}

struct Inner {
    ready: bool,
    sign_in_on_sign_up: bool,
    accounts: DashMap<String, Account>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryAuth {
    /// Provider where sign-up only creates the account.
    pub fn new() -> Self {
        Self::build(true, false)
    }

    /// Provider where sign-up also signs the new user in.
    pub fn signing_in_on_sign_up() -> Self {
        Self::build(true, true)
    }

    /// Provider that reports not-ready, like an unconfigured backend.
    pub fn unconfigured() -> Self {
        Self::build(false, false)
    }

    fn build(ready: bool, sign_in_on_sign_up: bool) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                ready,
                sign_in_on_sign_up,
                accounts: DashMap::new(),
                current: RwLock::new(None),
                events,
            }),
        }
    }

    /// Invalidate the current session from outside, as token expiry would.
    pub async fn expire_session(&self) {
        let previous = self.inner.current.write().await.take();
        if let Some(session) = previous {
            tracing::info!(user_id = %session.user_id, "Session expired");
            let _ = self.inner.events.send(AuthEvent::SignedOut);
        }
    }

    /// Number of live subscriptions to session events.
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    fn check_ready(&self) -> Result<()> {
        if self.inner.ready {
            Ok(())
        } else {
            Err(SessionError::ProviderUnavailable)
        }
    }

    fn issue_session(user_id: &str, email: &str) -> Session {
        Session {
            user_id: user_id.to_string(),
            email: email.to_string(),
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: uuid::Uuid::new_v4().to_string(),
            expires_at: Utc::now() + Duration::seconds(SESSION_TTL_SECS),
        }
    }

    async fn establish(&self, session: &Session) {
        *self.inner.current.write().await = Some(session.clone());
        let _ = self.inner.events.send(AuthEvent::SignedIn(session.clone()));
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for MemoryAuth {
    fn is_ready(&self) -> bool {
        self.inner.ready
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        self.check_ready()?;
        Ok(self.inner.current.read().await.clone())
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        self.check_ready()?;

        let user_id = uuid::Uuid::new_v4().to_string();
        match self.inner.accounts.entry(credentials.email.to_lowercase()) {
            Entry::Occupied(_) => {
                return Err(SessionError::Auth(
                    "Email is already registered (EMAIL_EXISTS)".to_string(),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    user_id: user_id.clone(),
                    password: credentials.password.clone(),
                });
            }
        }

        let session = Self::issue_session(&user_id, &credentials.email);
        if self.inner.sign_in_on_sign_up {
            self.establish(&session).await;
        }
        Ok(session)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        self.check_ready()?;
        let user_id = self
            .inner
            .accounts
            .get(&credentials.email.to_lowercase())
            .filter(|account| account.password == credentials.password)
            .map(|account| account.user_id.clone())
            .ok_or_else(|| {
                SessionError::Auth("Invalid email or password (INVALID_LOGIN_CREDENTIALS)".into())
            })?;

        let session = Self::issue_session(&user_id, &credentials.email);
        self.establish(&session).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.check_ready()?;
        self.inner.current.write().await.take();
        let _ = self.inner.events.send(AuthEvent::SignedOut);
        Ok(())
    }
}
