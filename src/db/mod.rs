//! Database layer: profile and activity-log row storage.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ActivityKind, ActivityRecord, ProfileUpdate, UserProfile};

/// Collection names as constants.
pub mod collections {
    /// User profiles (keyed by auth user ID)
    pub const PROFILES: &str = "profiles";
    /// Append-only activity log
    pub const USER_ACTIVITIES: &str = "user_activities";
}

/// Row storage the session manager needs from the backend.
///
/// Every activity query is restricted to a single owning user.
pub trait DataStore: Send + Sync + 'static {
    /// False when the backend is not configured; callers must not issue requests.
    fn is_ready(&self) -> bool;

    fn get_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>>> + Send;

    /// Create the profile row. Fails if it already exists.
    fn create_profile(&self, profile: &UserProfile) -> impl Future<Output = Result<()>> + Send;

    /// Write only the fields set in `update`.
    fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Any one record of `kind` for the user dated at or after `since`.
    fn find_activity_since(
        &self,
        user_id: &str,
        kind: ActivityKind,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<ActivityRecord>>> + Send;

    fn insert_activity(&self, record: &ActivityRecord) -> impl Future<Output = Result<()>> + Send;

    /// The user's newest records first.
    fn recent_activities(
        &self,
        user_id: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>>> + Send;
}
