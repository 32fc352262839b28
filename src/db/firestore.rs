// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (one document per user)
//! - User activities (append-only log, queried per user)
//!
//! The first-login query filters on `user_id`, `activity_type` and a range on
//! `activity_date`, which needs a composite index on those three fields.

use chrono::{DateTime, Utc};
use firestore::FirestoreWritePrecondition;

use crate::db::{collections, DataStore};
use crate::error::{Result, SessionError};
use crate::models::{ActivityKind, ActivityRecord, ProfileUpdate, UserProfile};
use crate::time_utils::format_utc_rfc3339;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            SessionError::Persistence(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            SessionError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// A client with no backend behind it.
    ///
    /// Reports not-ready; every operation fails with `ProviderUnavailable`.
    pub fn unconfigured() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if unconfigured.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or(SessionError::ProviderUnavailable)
    }
}

impl DataStore for FirestoreDb {
    fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        let _: UserProfile = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        // Without the precondition Firestore upserts a partial document.
        let _: UserProfile = self
            .get_client()?
            .fluent()
            .update()
            .fields(update.field_paths())
            .in_col(collections::PROFILES)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(update)
            .execute()
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn find_activity_since(
        &self,
        user_id: &str,
        kind: ActivityKind,
        since: DateTime<Utc>,
    ) -> Result<Option<ActivityRecord>> {
        let user_id = user_id.to_string();
        let since = format_utc_rfc3339(since);

        let records: Vec<ActivityRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USER_ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("activity_type").eq(kind.as_str()),
                    q.field("activity_date")
                        .greater_than_or_equal(since.clone()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))?;

        Ok(records.into_iter().next())
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<()> {
        let _: ActivityRecord = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USER_ACTIVITIES)
            .document_id(&record.id)
            .object(record)
            .execute()
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn recent_activities(&self, user_id: &str, limit: u32) -> Result<Vec<ActivityRecord>> {
        let user_id = user_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::USER_ACTIVITIES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            // Sort by date descending
            .order_by([(
                "activity_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))
    }
}
