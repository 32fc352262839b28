//! In-process row store.
//!
//! Implements the same contract as [`FirestoreDb`](crate::db::FirestoreDb),
//! including string comparison of stored timestamps, so manager behavior is
//! identical on either backend. Used by tests and by the CLI when no Firebase
//! project is configured for persistence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::db::DataStore;
use crate::error::{Result, SessionError};
use crate::models::{ActivityKind, ActivityRecord, ProfileUpdate, UserProfile};
use crate::time_utils::format_utc_rfc3339;

/// In-memory profile table and activity log. Clones share storage.
#[derive(Clone)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

struct Inner {
    ready: bool,
    fail_writes: AtomicBool,
    profiles: DashMap<String, UserProfile>,
    activities: RwLock<Vec<ActivityRecord>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::with_readiness(true)
    }

    /// A store that reports not-ready, like an unconfigured backend.
    pub fn unconfigured() -> Self {
        Self::with_readiness(false)
    }

    fn with_readiness(ready: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                ready,
                fail_writes: AtomicBool::new(false),
                profiles: DashMap::new(),
                activities: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Make every subsequent write fail (reads keep working).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored activity records, across all users.
    pub async fn activity_count(&self) -> usize {
        self.inner.activities.read().await.len()
    }

    fn check_ready(&self) -> Result<()> {
        if self.inner.ready {
            Ok(())
        } else {
            Err(SessionError::ProviderUnavailable)
        }
    }

    fn check_writable(&self) -> Result<()> {
        self.check_ready()?;
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Persistence(
                "write rejected by store".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for MemoryDb {
    fn is_ready(&self) -> bool {
        self.inner.ready
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.check_ready()?;
        Ok(self.inner.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        self.check_writable()?;
        match self.inner.profiles.entry(profile.id.clone()) {
            Entry::Occupied(_) => Err(SessionError::Persistence(format!(
                "profile {} already exists",
                profile.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(())
            }
        }
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        self.check_writable()?;
        let mut profile = self
            .inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| SessionError::Persistence(format!("profile {} not found", user_id)))?;
        profile.apply(update);
        Ok(())
    }

    async fn find_activity_since(
        &self,
        user_id: &str,
        kind: ActivityKind,
        since: DateTime<Utc>,
    ) -> Result<Option<ActivityRecord>> {
        self.check_ready()?;
        let since = format_utc_rfc3339(since);

        let activities = self.inner.activities.read().await;
        Ok(activities
            .iter()
            .find(|r| {
                r.user_id == user_id && r.activity_type == kind && r.activity_date >= since
            })
            .cloned())
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<()> {
        self.check_writable()?;
        self.inner.activities.write().await.push(record.clone());
        Ok(())
    }

    async fn recent_activities(&self, user_id: &str, limit: u32) -> Result<Vec<ActivityRecord>> {
        self.check_ready()?;

        let activities = self.inner.activities.read().await;
        let mut records: Vec<ActivityRecord> = activities
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.activity_date.cmp(&a.activity_date));
        records.truncate(limit as usize);
        Ok(records)
    }
}
