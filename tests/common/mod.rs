// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::time::Duration;

use odyssey_session::db::{DataStore, FirestoreDb, MemoryDb};
use odyssey_session::models::{SessionNotice, SessionState};
use odyssey_session::services::{AuthProvider, MemoryAuth};
use odyssey_session::SessionManager;
use tokio::sync::broadcast;

/// Upper bound for anything driven by the event task.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(5);

#[allow(dead_code)]
pub type TestManager = SessionManager<MemoryAuth, MemoryDb>;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Start a manager over fresh in-memory backends and wait for the initial
/// session check.
#[allow(dead_code)]
pub async fn start_manager() -> (TestManager, MemoryAuth, MemoryDb) {
    let auth = MemoryAuth::new();
    let db = MemoryDb::new();
    let manager = SessionManager::start(auth.clone(), db.clone());
    manager.wait_until_settled().await;
    (manager, auth, db)
}

/// Wait until `pred` holds for the published state.
#[allow(dead_code)]
pub async fn wait_for_state<A, S, F>(manager: &SessionManager<A, S>, pred: F) -> SessionState
where
    A: AuthProvider,
    S: DataStore,
    F: FnMut(&SessionState) -> bool,
{
    let mut rx = manager.subscribe_state();
    let state = tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("Timed out waiting for session state")
        .expect("State channel closed");
    SessionState::clone(&state)
}

/// Wait for the next `FirstLoginOfDay` notice, skipping other notices.
#[allow(dead_code)]
pub async fn wait_first_login(notices: &mut broadcast::Receiver<SessionNotice>) -> String {
    tokio::time::timeout(WAIT, async {
        loop {
            if let SessionNotice::FirstLoginOfDay { user_id } =
                notices.recv().await.expect("Notice channel closed")
            {
                return user_id;
            }
        }
    })
    .await
    .expect("Timed out waiting for first-login notice")
}

/// Wait until the sign-in of `user_id` has been fully applied.
#[allow(dead_code)]
pub async fn wait_sign_in_applied(notices: &mut broadcast::Receiver<SessionNotice>, user_id: &str) {
    tokio::time::timeout(WAIT, async {
        loop {
            match notices.recv().await.expect("Notice channel closed") {
                SessionNotice::SignInApplied { user_id: applied } if applied == user_id => return,
                _ => {}
            }
        }
    })
    .await
    .expect("Timed out waiting for sign-in to apply")
}

/// Sign up and sign in, then wait until the sign-in event has been fully
/// applied (including the automatic first-login check).
#[allow(dead_code)]
pub async fn sign_up_and_in(manager: &TestManager, email: &str, username: &str) -> String {
    manager
        .sign_up(email, "secret1", username)
        .await
        .expect("sign up failed");

    let mut notices = manager.subscribe_notices();
    let session = manager
        .sign_in(email, "secret1")
        .await
        .expect("sign in failed");
    wait_sign_in_applied(&mut notices, &session.user_id).await;
    session.user_id
}
