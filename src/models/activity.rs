// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity log model for storage and the dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Kind of user action recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActivityKind {
    Login,
    CourseCompletion,
    BlogCreation,
    ClanCreation,
    PostCreation,
}

impl ActivityKind {
    /// Value stored in the `activity_type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Login => "login",
            ActivityKind::CourseCompletion => "course_completion",
            ActivityKind::BlogCreation => "blog_creation",
            ActivityKind::ClanCreation => "clan_creation",
            ActivityKind::PostCreation => "post_creation",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(ActivityKind::Login),
            "course_completion" => Ok(ActivityKind::CourseCompletion),
            "blog_creation" => Ok(ActivityKind::BlogCreation),
            "clan_creation" => Ok(ActivityKind::ClanCreation),
            "post_creation" => Ok(ActivityKind::PostCreation),
            other => Err(format!("unknown activity type: {}", other)),
        }
    }
}

/// Append-only activity record in Firestore (`user_activities/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityRecord {
    /// Random ID (also used as document ID)
    pub id: String,
    /// Owning user ID
    pub user_id: String,
    pub activity_type: ActivityKind,
    /// When the action happened (RFC3339, `Z` suffix)
    pub activity_date: String,
    /// Free-form details (course ID, blog title, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub payload: Option<serde_json::Value>,
}

impl ActivityRecord {
    pub fn new(
        user_id: &str,
        activity_type: ActivityKind,
        activity_date: &str,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            activity_type,
            activity_date: activity_date.to_string(),
            payload,
        }
    }
}
