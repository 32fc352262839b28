//! User profile model for storage and the UI.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Rank assigned to every new account.
pub const DEFAULT_RANK: &str = "Novice";

/// User profile stored in Firestore (`profiles/{id}`).
///
/// Created once at sign-up; afterwards only changed through
/// [`ProfileUpdate`] writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    /// Auth user ID (also used as document ID)
    pub id: String,
    pub username: String,
    pub email: String,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// When the account was created (ISO 8601)
    pub created_at: String,
    /// Last profile write (ISO 8601)
    pub updated_at: String,
    /// Last time the user was seen signing in (ISO 8601)
    pub last_active: String,
    /// Consecutive days with a login
    pub streak_days: u32,
    pub coins: u32,
    pub rank: String,
    pub completed_courses: u32,
    pub created_blogs: u32,
    pub is_clan_admin: bool,
}

impl UserProfile {
    /// Profile for a freshly created account.
    pub fn new_account(id: &str, username: &str, email: &str, now: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            avatar_url: None,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            last_active: now.to_string(),
            streak_days: 1,
            coins: 0,
            rank: DEFAULT_RANK.to_string(),
            completed_courses: 0,
            created_blogs: 0,
            is_clan_admin: false,
        }
    }

    /// Apply the fields present in `update`, leaving the rest untouched.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(username) = &update.username {
            self.username = username.clone();
        }
        if let Some(avatar_url) = &update.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(updated_at) = &update.updated_at {
            self.updated_at = updated_at.clone();
        }
        if let Some(last_active) = &update.last_active {
            self.last_active = last_active.clone();
        }
        if let Some(streak_days) = update.streak_days {
            self.streak_days = streak_days;
        }
        if let Some(coins) = update.coins {
            self.coins = coins;
        }
        if let Some(rank) = &update.rank {
            self.rank = rank.clone();
        }
        if let Some(completed_courses) = update.completed_courses {
            self.completed_courses = completed_courses;
        }
        if let Some(created_blogs) = update.created_blogs {
            self.created_blogs = created_blogs;
        }
        if let Some(is_clan_admin) = update.is_clan_admin {
            self.is_clan_admin = is_clan_admin;
        }
    }
}

/// Partial profile write. Only `Some` fields are sent to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_courses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_blogs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_clan_admin: Option<bool>,
}

impl ProfileUpdate {
    /// Update that only stamps `last_active`.
    pub fn last_active(now: &str) -> Self {
        Self {
            last_active: Some(now.to_string()),
            ..Self::default()
        }
    }

    /// Same update with `updated_at` set to `now`.
    pub fn touched(mut self, now: &str) -> Self {
        self.updated_at = Some(now.to_string());
        self
    }

    /// Document field paths this update writes (Firestore update mask).
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.username.is_some() {
            paths.push("username");
        }
        if self.avatar_url.is_some() {
            paths.push("avatar_url");
        }
        if self.updated_at.is_some() {
            paths.push("updated_at");
        }
        if self.last_active.is_some() {
            paths.push("last_active");
        }
        if self.streak_days.is_some() {
            paths.push("streak_days");
        }
        if self.coins.is_some() {
            paths.push("coins");
        }
        if self.rank.is_some() {
            paths.push("rank");
        }
        if self.completed_courses.is_some() {
            paths.push("completed_courses");
        }
        if self.created_blogs.is_some() {
            paths.push("created_blogs");
        }
        if self.is_clan_admin.is_some() {
            paths.push("is_clan_admin");
        }
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.field_paths().is_empty()
    }
}
