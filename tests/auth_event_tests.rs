// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider events the manager must follow: token refreshes and a
//! subscription that falls behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use odyssey_session::db::{DataStore, MemoryDb};
use odyssey_session::error::Result;
use odyssey_session::models::{Credentials, ProfileUpdate, Session, UserProfile};
use odyssey_session::services::auth_provider::AUTH_EVENT_CAPACITY;
use odyssey_session::services::{AuthEvent, AuthProvider, MemoryAuth};
use odyssey_session::SessionManager;
use tokio::sync::broadcast;

mod common;
use common::{wait_for_state, wait_sign_in_applied};

/// Provider whose events are pushed by the test.
struct ScriptedAuth {
    inner: MemoryAuth,
    events: broadcast::Sender<AuthEvent>,
    session_reads: Arc<AtomicUsize>,
}

impl AuthProvider for ScriptedAuth {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        self.session_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.current_session().await
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        self.inner.sign_up(credentials).await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        self.inner.sign_in(credentials).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.inner.sign_out().await
    }
}

struct Harness {
    manager: SessionManager<ScriptedAuth, MemoryDb>,
    auth: MemoryAuth,
    db: MemoryDb,
    events: broadcast::Sender<AuthEvent>,
    session_reads: Arc<AtomicUsize>,
}

async fn harness() -> Harness {
    let auth = MemoryAuth::new();
    let db = MemoryDb::new();
    let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
    let session_reads = Arc::new(AtomicUsize::new(0));

    let manager = SessionManager::start(
        ScriptedAuth {
            inner: auth.clone(),
            events: events.clone(),
            session_reads: Arc::clone(&session_reads),
        },
        db.clone(),
    );
    manager.wait_until_settled().await;

    Harness {
        manager,
        auth,
        db,
        events,
        session_reads,
    }
}

/// Account with a profile row, signed in at the provider.
async fn account(h: &Harness, email: &str, username: &str) -> Session {
    let creds = Credentials::new(email, "secret1");
    let created = h.auth.sign_up(&creds).await.unwrap();
    h.db.create_profile(&UserProfile::new_account(
        &created.user_id,
        username,
        email,
        "2026-03-10T09:00:00Z",
    ))
    .await
    .unwrap();
    h.auth.sign_in(&creds).await.unwrap()
}

async fn push_sign_in(h: &Harness, session: &Session) {
    let mut notices = h.manager.subscribe_notices();
    h.events.send(AuthEvent::SignedIn(session.clone())).unwrap();
    wait_sign_in_applied(&mut notices, &session.user_id).await;
}

#[tokio::test]
async fn test_token_refresh_for_same_user_keeps_profile() {
    let h = harness().await;
    let session = account(&h, "mia@x.com", "mia").await;
    push_sign_in(&h, &session).await;
    let cached = h.manager.profile().unwrap();

    // A store change the manager has not re-read.
    h.db.update_profile(
        &session.user_id,
        &ProfileUpdate {
            coins: Some(7),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let refreshed = Session {
        access_token: "rotated-access".to_string(),
        refresh_token: "rotated-refresh".to_string(),
        ..session.clone()
    };
    h.events
        .send(AuthEvent::TokenRefreshed(refreshed.clone()))
        .unwrap();

    let state = wait_for_state(&h.manager, |s| {
        s.session().is_some_and(|x| x.access_token == "rotated-access")
    })
    .await;
    assert_eq!(state.session(), Some(&refreshed));
    assert_eq!(state.profile(), Some(&cached));
    assert_eq!(state.profile().unwrap().coins, 0);
}

#[tokio::test]
async fn test_token_refresh_for_other_user_reauthenticates() {
    let h = harness().await;
    let mia = account(&h, "mia@x.com", "mia").await;
    push_sign_in(&h, &mia).await;

    let noa = account(&h, "noa@x.com", "noa").await;
    h.events.send(AuthEvent::TokenRefreshed(noa.clone())).unwrap();

    let state = wait_for_state(&h.manager, |s| s.user_id() == Some(noa.user_id.as_str())).await;
    assert_eq!(state.session(), Some(&noa));
    assert_eq!(state.profile().unwrap().username, "noa");
}

#[tokio::test]
async fn test_lagged_subscription_resyncs_from_provider() {
    let h = harness().await;
    assert_eq!(h.session_reads.load(Ordering::SeqCst), 1);
    let session = account(&h, "ola@x.com", "ola").await;

    // Overflow the channel before the event task gets to run.
    for _ in 0..AUTH_EVENT_CAPACITY + 5 {
        h.events.send(AuthEvent::SignedOut).unwrap();
    }
    push_sign_in(&h, &session).await;

    assert_eq!(h.session_reads.load(Ordering::SeqCst), 2);
    let state = h.manager.state();
    assert_eq!(state.user_id(), Some(session.user_id.as_str()));
    assert_eq!(state.profile().unwrap().username, "ola");
}
