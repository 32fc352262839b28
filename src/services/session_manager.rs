// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session & activity manager.
//!
//! Owns the in-memory view of who is signed in and their profile, wraps the
//! auth provider and data store, and detects the first login of the day.
//!
//! State flows one way: only the manager writes the `watch` channel, and
//! consumers get receivers. Provider events are applied by a single task
//! owned by a [`Subscription`] guard, so dropping the manager unsubscribes.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use validator::Validate;

use crate::db::DataStore;
use crate::error::{Result, SessionError};
use crate::models::{
    ActivityKind, ActivityRecord, Credentials, ProfileUpdate, Session, SessionNotice,
    SessionState, SignUpRequest, UserProfile,
};
use crate::services::auth_provider::{AuthEvent, AuthProvider};
use crate::time_utils::{format_utc_rfc3339, start_of_local_day};

const NOTICE_CAPACITY: usize = 16;

/// Coordinates the auth provider, the data store and the cached session.
///
/// Construct once at startup with [`SessionManager::start`] and hand out
/// references. Must be created inside a Tokio runtime.
pub struct SessionManager<A: AuthProvider, S: DataStore> {
    shared: Arc<Shared<A, S>>,
    subscription: Option<Subscription>,
}

/// State shared between the public handle and the event task.
struct Shared<A, S> {
    auth: A,
    store: S,
    state: watch::Sender<SessionState>,
    notices: broadcast::Sender<SessionNotice>,
    /// Profile written by the last sign-up, until that user authenticates.
    created: Mutex<Option<UserProfile>>,
}

/// Owns the event task; aborting it drops the provider receiver.
struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<A: AuthProvider, S: DataStore> SessionManager<A, S> {
    /// Subscribe to the provider and begin the initial session check.
    ///
    /// With an unconfigured provider the manager settles on `Anonymous`
    /// immediately and never subscribes.
    pub fn start(auth: A, store: S) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let shared = Arc::new(Shared {
            auth,
            store,
            state,
            notices,
            created: Mutex::new(None),
        });

        if !shared.is_provider_ready() {
            tracing::warn!("Backend not configured, session manager disabled");
            shared.state.send_replace(SessionState::Anonymous);
            return Self {
                shared,
                subscription: None,
            };
        }

        shared.state.send_replace(SessionState::Loading);
        let events = shared.auth.subscribe();
        let task = tokio::spawn(Arc::clone(&shared).run(events));
        tracing::debug!("Subscribed to auth events");

        Self {
            shared,
            subscription: Some(Subscription { task }),
        }
    }

    /// Release the provider subscription and wait for the event task to stop.
    pub async fn shutdown(mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.task.abort();
            let _ = (&mut subscription.task).await;
            tracing::debug!("Auth event subscription released");
        }
    }

    // ─── Read Side ───────────────────────────────────────────────────────────

    pub fn is_provider_ready(&self) -> bool {
        self.shared.is_provider_ready()
    }

    /// True until the initial session check has finished.
    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.state.borrow().session().cloned()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.shared.state.borrow().profile().cloned()
    }

    /// Read-only view of state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.shared.notices.subscribe()
    }

    /// Wait until the state is known to be signed in or signed out.
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut rx = self.shared.state.subscribe();
        let settled = rx
            .wait_for(SessionState::is_settled)
            .await
            .map(|state| SessionState::clone(&state));
        settled.unwrap_or_else(|_| self.state())
    }

    // ─── Account Operations ──────────────────────────────────────────────────

    /// Create an account and its profile row with default values.
    ///
    /// Does not sign in unless the provider does so itself.
    pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<Session> {
        self.shared.ensure_ready()?;
        let request = SignUpRequest::new(email, password, username);
        request
            .validate()
            .map_err(|e| SessionError::Auth(e.to_string()))?;

        let session = self
            .shared
            .auth
            .sign_up(&request.credentials)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-up rejected"))?;

        let now = format_utc_rfc3339(Utc::now());
        let profile =
            UserProfile::new_account(&session.user_id, &request.username, &session.email, &now);

        if let Err(e) = self.shared.store.create_profile(&profile).await {
            tracing::error!(user_id = %session.user_id, error = %e, "Failed to create profile");
            return Err(e);
        }

        // The provider may have signed the user in before the row existed.
        self.shared.hand_over_created(profile);

        tracing::info!(user_id = %session.user_id, username = %request.username, "Account created");
        Ok(session)
    }

    /// Authenticate. The cached session is updated when the provider's
    /// sign-in event arrives, not by this call.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.shared.ensure_ready()?;
        let credentials = Credentials::new(email, password);
        credentials
            .validate()
            .map_err(|e| SessionError::Auth(e.to_string()))?;

        let session = self
            .shared
            .auth
            .sign_in(&credentials)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-in rejected"))?;

        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    /// Clear the cached session immediately, then ask the provider to end it.
    ///
    /// The provider is always asked: a sign-in whose event has not been
    /// applied yet is invisible in the cache but live at the provider.
    pub async fn sign_out(&self) -> Result<()> {
        self.shared.ensure_ready()?;

        let previous = self.shared.state.send_replace(SessionState::Anonymous);
        self.shared.auth.sign_out().await?;

        match previous.user_id() {
            Some(user_id) => tracing::info!(user_id = %user_id, "Signed out"),
            None => tracing::debug!("Sign-out with no cached session"),
        }
        Ok(())
    }

    // ─── Profile Operations ──────────────────────────────────────────────────

    /// Write `update` (plus a fresh `updated_at`), then re-read the whole
    /// profile into the cache. On any failure the cache is left as it was.
    ///
    /// Does nothing when signed out.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        self.shared.ensure_ready()?;
        let Some(user_id) = self.shared.current_user_id() else {
            tracing::warn!("Profile update ignored: not signed in");
            return Ok(());
        };

        let update = update.touched(&format_utc_rfc3339(Utc::now()));
        self.shared
            .store
            .update_profile(&user_id, &update)
            .await
            .inspect_err(|e| tracing::warn!(user_id = %user_id, error = %e, "Profile write failed"))?;

        let profile = self.shared.store.get_profile(&user_id).await?.ok_or_else(|| {
            SessionError::Persistence(format!("Profile {} missing after update", user_id))
        })?;
        self.shared.replace_profile(&user_id, profile);

        tracing::info!(user_id = %user_id, fields = ?update.field_paths(), "Profile updated");
        Ok(())
    }

    /// Re-read the signed-in user's profile into the cache.
    pub async fn refresh_profile(&self) -> Result<Option<UserProfile>> {
        self.shared.ensure_ready()?;
        let Some(user_id) = self.shared.current_user_id() else {
            return Ok(None);
        };

        let profile = self.shared.store.get_profile(&user_id).await?;
        if let Some(profile) = &profile {
            self.shared.replace_profile(&user_id, profile.clone());
        }
        Ok(profile)
    }

    // ─── Activity Operations ─────────────────────────────────────────────────

    /// Whether the signed-in user has no login recorded since local midnight.
    ///
    /// Also stamps `last_active`. Not atomic with the login write that
    /// follows: two concurrent checks can both return `true`.
    pub async fn check_if_first_login_of_day(&self) -> Result<bool> {
        self.check_first_login_of_day_at(Local::now()).await
    }

    /// [`check_if_first_login_of_day`](Self::check_if_first_login_of_day)
    /// with the day boundary taken from `now`'s timezone.
    pub async fn check_first_login_of_day_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<bool> {
        self.shared.ensure_ready()?;
        self.shared
            .first_login_of_day(start_of_local_day(&now), now.with_timezone(&Utc))
            .await
    }

    /// Append an activity record for the signed-in user.
    ///
    /// Best-effort: failures are logged, never returned.
    pub async fn record_activity(&self, kind: ActivityKind, payload: Option<serde_json::Value>) {
        self.record_activity_at(kind, payload, Utc::now()).await
    }

    pub async fn record_activity_at(
        &self,
        kind: ActivityKind,
        payload: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) {
        if !self.shared.is_provider_ready() {
            tracing::warn!(activity_type = %kind, "Activity not recorded: backend not configured");
            return;
        }
        let Some(user_id) = self.shared.current_user_id() else {
            tracing::warn!(activity_type = %kind, "Activity not recorded: not signed in");
            return;
        };

        let record = ActivityRecord::new(&user_id, kind, &format_utc_rfc3339(at), payload);
        match self.shared.store.insert_activity(&record).await {
            Ok(()) => tracing::debug!(user_id = %user_id, activity_type = %kind, "Activity recorded"),
            Err(e) => tracing::warn!(
                user_id = %user_id,
                activity_type = %kind,
                error = %e,
                "Failed to record activity"
            ),
        }
    }

    /// The signed-in user's newest activity records.
    pub async fn recent_activities(&self, limit: u32) -> Result<Vec<ActivityRecord>> {
        self.shared.ensure_ready()?;
        let Some(user_id) = self.shared.current_user_id() else {
            return Ok(Vec::new());
        };
        self.shared.store.recent_activities(&user_id, limit).await
    }
}

impl<A: AuthProvider, S: DataStore> Shared<A, S> {
    fn is_provider_ready(&self) -> bool {
        self.auth.is_ready() && self.store.is_ready()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_provider_ready() {
            Ok(())
        } else {
            Err(SessionError::ProviderUnavailable)
        }
    }

    fn current_user_id(&self) -> Option<String> {
        self.state.borrow().user_id().map(str::to_string)
    }

    /// Cache a sign-up profile if its user is already signed in, else park
    /// it for `authenticate`. Both happen under the state lock.
    fn hand_over_created(&self, profile: UserProfile) {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated {
                session,
                profile: cached,
            } if session.user_id == profile.id => {
                *cached = Some(profile);
                true
            }
            _ => {
                *self.created.lock().unwrap_or_else(PoisonError::into_inner) = Some(profile);
                false
            }
        });
    }

    /// Take the sign-up profile if it belongs to `user_id`.
    fn take_created(&self, user_id: &str) -> Option<UserProfile> {
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        match created.as_ref() {
            Some(profile) if profile.id == user_id => created.take(),
            _ => None,
        }
    }

    /// Swap in `profile` if `user_id` is still the signed-in user.
    fn replace_profile(&self, user_id: &str, profile: UserProfile) {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated {
                session,
                profile: cached,
            } if session.user_id == user_id => {
                *cached = Some(profile);
                true
            }
            _ => false,
        });
    }

    async fn first_login_of_day(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool> {
        let Some(user_id) = self.current_user_id() else {
            tracing::debug!("First-login check skipped: not signed in");
            return Ok(false);
        };

        let existing = self
            .store
            .find_activity_since(&user_id, ActivityKind::Login, since)
            .await?;

        // Stamped whatever the answer; the cached profile is not patched.
        let stamp = ProfileUpdate::last_active(&format_utc_rfc3339(now));
        if let Err(e) = self.store.update_profile(&user_id, &stamp).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to update last_active");
        }

        let first = existing.is_none();
        tracing::debug!(user_id = %user_id, first_login_of_day = first, "First-login check");
        Ok(first)
    }

    // ─── Event Task ──────────────────────────────────────────────────────────

    async fn run(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        self.resync().await;

        loop {
            match events.recv().await {
                Ok(event) => self.apply(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth events dropped, resynchronizing");
                    self.resync().await;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Auth provider closed its event channel");
                    break;
                }
            }
        }
    }

    /// Apply whatever session the provider holds right now.
    async fn resync(&self) {
        let session = match self.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Initial session check failed, treating as signed out");
                None
            }
        };
        self.apply(AuthEvent::InitialSession(session)).await;
    }

    async fn apply(&self, event: AuthEvent) {
        match event {
            AuthEvent::InitialSession(Some(session)) => self.authenticate(session).await,
            AuthEvent::InitialSession(None) | AuthEvent::SignedOut => {
                let previous = self.state.send_replace(SessionState::Anonymous);
                if let Some(user_id) = previous.user_id() {
                    tracing::info!(user_id = %user_id, "Session ended");
                }
            }
            AuthEvent::SignedIn(session) => {
                let user_id = session.user_id.clone();
                self.authenticate(session).await;
                self.celebrate_first_login().await;
                let _ = self.notices.send(SessionNotice::SignInApplied { user_id });
            }
            AuthEvent::TokenRefreshed(session) => {
                let same_user = self.current_user_id().as_deref() == Some(session.user_id.as_str());
                if same_user {
                    self.state.send_modify(|state| {
                        if let SessionState::Authenticated { session: cached, .. } = state {
                            *cached = session;
                        }
                    });
                } else {
                    self.authenticate(session).await;
                }
            }
        }
    }

    /// Fetch the profile, then publish `Authenticated`. A failed fetch still
    /// authenticates, with no profile.
    ///
    /// A sign-up may create the row after the fetch but before the publish.
    /// The created profile is picked up under the state lock, so either this
    /// publish or the sign-up's `replace_profile` sees it.
    async fn authenticate(&self, session: Session) {
        let user_id = session.user_id.clone();

        let (fetched, failure) = match self.store.get_profile(&user_id).await {
            Ok(Some(profile)) => (Some(profile), None),
            Ok(None) => (None, Some("profile not found".to_string())),
            Err(e) => (None, Some(e.to_string())),
        };

        let mut cached = false;
        self.state.send_modify(|state| {
            let created = self.take_created(&user_id);
            let profile = fetched.or(created);
            cached = profile.is_some();
            *state = SessionState::Authenticated { session, profile };
        });

        if let (false, Some(message)) = (cached, failure) {
            self.notify_profile_sync_failed(&user_id, &message);
        }
        tracing::info!(user_id = %user_id, "Session active");
    }

    fn notify_profile_sync_failed(&self, user_id: &str, message: &str) {
        tracing::warn!(user_id = %user_id, error = %message, "Profile unavailable for session");
        let _ = self.notices.send(SessionNotice::ProfileSyncFailed {
            user_id: user_id.to_string(),
            message: message.to_string(),
        });
    }

    async fn celebrate_first_login(&self) {
        let now = Local::now();
        match self
            .first_login_of_day(start_of_local_day(&now), now.with_timezone(&Utc))
            .await
        {
            Ok(true) => {
                if let Some(user_id) = self.current_user_id() {
                    tracing::info!(user_id = %user_id, "First login of the day");
                    let _ = self.notices.send(SessionNotice::FirstLoginOfDay { user_id });
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "First-login check failed"),
        }
    }
}
