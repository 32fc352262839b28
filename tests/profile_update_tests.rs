// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{TimeZone, Utc};
use odyssey_session::db::DataStore;
use odyssey_session::models::{ActivityKind, ProfileUpdate};
use odyssey_session::SessionError;

mod common;
use common::{sign_up_and_in, start_manager};

#[tokio::test]
async fn test_update_refreshes_cached_profile() {
    let (manager, _, db) = start_manager().await;
    let user_id = sign_up_and_in(&manager, "sam@x.com", "sam").await;
    let before = manager.profile().unwrap();

    manager
        .update_profile(ProfileUpdate {
            coins: Some(50),
            rank: Some("Apprentice".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let cached = manager.profile().unwrap();
    assert_eq!(cached.coins, 50);
    assert_eq!(cached.rank, "Apprentice");
    assert_eq!(cached.username, "sam");
    assert!(cached.updated_at >= before.updated_at);

    // The cache is whatever the store holds after the write.
    assert_eq!(cached, db.get_profile(&user_id).await.unwrap().unwrap());
}

#[tokio::test]
async fn test_failed_update_leaves_cache_unchanged() {
    let (manager, _, db) = start_manager().await;
    sign_up_and_in(&manager, "tia@x.com", "tia").await;
    let before = manager.profile().unwrap();

    db.set_fail_writes(true);
    let err = manager
        .update_profile(ProfileUpdate {
            coins: Some(999),
            is_clan_admin: Some(true),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Persistence(_)));
    assert_eq!(manager.profile().unwrap(), before);
}

#[tokio::test]
async fn test_update_when_signed_out_is_noop() {
    let (manager, _, _) = start_manager().await;

    manager
        .update_profile(ProfileUpdate {
            coins: Some(10),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(manager.profile().is_none());
}

#[tokio::test]
async fn test_refresh_profile_picks_up_external_writes() {
    let (manager, _, db) = start_manager().await;
    let user_id = sign_up_and_in(&manager, "uma@x.com", "uma").await;

    db.update_profile(
        &user_id,
        &ProfileUpdate {
            completed_courses: Some(3),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(manager.profile().unwrap().completed_courses, 0);

    let refreshed = manager.refresh_profile().await.unwrap().unwrap();
    assert_eq!(refreshed.completed_courses, 3);
    assert_eq!(manager.profile().unwrap().completed_courses, 3);
}

#[tokio::test]
async fn test_recent_activities_newest_first() {
    let (manager, _, _) = start_manager().await;
    sign_up_and_in(&manager, "vic@x.com", "vic").await;

    for (hour, kind) in [
        (8, ActivityKind::Login),
        (10, ActivityKind::BlogCreation),
        (12, ActivityKind::PostCreation),
    ] {
        let at = Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap();
        manager.record_activity_at(kind, None, at).await;
    }

    let recent = manager.recent_activities(2).await.unwrap();
    let kinds: Vec<_> = recent.iter().map(|r| r.activity_type).collect();
    assert_eq!(kinds, [ActivityKind::PostCreation, ActivityKind::BlogCreation]);
    assert_eq!(recent[0].activity_date, "2026-03-10T12:00:00Z");
}

#[tokio::test]
async fn test_recent_activities_when_signed_out_is_empty() {
    let (manager, _, _) = start_manager().await;
    assert!(manager.recent_activities(5).await.unwrap().is_empty());
}
