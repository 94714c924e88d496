// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! `FIRESTORE_EMULATOR_HOST` to point at it. Without it they are skipped.

use userbase::error::AppError;
use userbase::models::{NewUser, ProfileFields};

mod common;
use common::test_db;

/// Unique suffix so tests can share one emulator instance.
fn unique_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$not.a.real.hash".to_string(),
        firstname: "Test".to_string(),
        lastname: "User".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_and_look_up_user() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let username = format!("ada.{suffix}");

    let created = db
        .create_user(new_user(&username, &format!("ada{suffix}@example.com")))
        .await
        .unwrap();
    assert!(created.id > 0);

    let by_id = db.get_user(created.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, username);
    assert_eq!(by_id.firstname, "Test");

    let by_name = db.find_user_by_username(&username).await.unwrap().unwrap();
    assert_eq!(by_name.id, created.id);

    assert!(db
        .find_user_by_username(&format!("nobody.{suffix}"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_username_or_email_is_rejected() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let username = format!("grace_{suffix}");
    let email = format!("grace{suffix}@example.com");

    let original = db.create_user(new_user(&username, &email)).await.unwrap();

    let same_name = db
        .create_user(new_user(&username, &format!("other{suffix}@example.com")))
        .await;
    assert!(matches!(same_name, Err(AppError::BadRequest(_))));

    let same_email = db
        .create_user(new_user(&format!("other_{suffix}"), &email))
        .await;
    assert!(matches!(same_email, Err(AppError::BadRequest(_))));

    // The original account is untouched
    let fetched = db.find_user_by_username(&username).await.unwrap().unwrap();
    assert_eq!(fetched.id, original.id);
    assert_eq!(fetched.email, email);
}

#[tokio::test]
async fn test_concurrent_sign_ups_get_distinct_ids() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();

    let (a, b) = tokio::join!(
        db.create_user(new_user(
            &format!("a_{suffix}"),
            &format!("a{suffix}@example.com")
        )),
        db.create_user(new_user(
            &format!("b_{suffix}"),
            &format!("b{suffix}@example.com")
        )),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);

    // Each id still holds the account that claimed it
    assert_eq!(db.get_user(a.id).await.unwrap().unwrap().username, a.username);
    assert_eq!(db.get_user(b.id).await.unwrap().unwrap().username, b.username);
}

#[tokio::test]
async fn test_concurrent_claims_on_one_username() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let username = format!("race_{suffix}");

    let (a, b) = tokio::join!(
        db.create_user(new_user(&username, &format!("a{suffix}@example.com"))),
        db.create_user(new_user(&username, &format!("b{suffix}@example.com"))),
    );

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let winner = a.or(b).unwrap();
    let stored = db.find_user_by_username(&username).await.unwrap().unwrap();
    assert_eq!(stored.id, winner.id);
    assert_eq!(stored.email, winner.email);
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_profile_create_update_and_second_create() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let user = db
        .create_user(new_user(
            &format!("lin_{suffix}"),
            &format!("lin{suffix}@example.com"),
        ))
        .await
        .unwrap();

    assert!(db.get_profile(user.id).await.unwrap().is_none());

    let created = db
        .create_profile(
            user.id,
            ProfileFields {
                bio: Some("Engineer".to_string()),
                location: Some("Boston".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.user_id, user.id);

    let updated = db
        .update_profile(
            user.id,
            ProfileFields {
                website_url: Some("https://example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.bio.as_deref(), Some("Engineer"));
    assert_eq!(updated.website_url.as_deref(), Some("https://example.com"));

    let again = db.create_profile(user.id, ProfileFields::default()).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    // The second create did not reset the stored profile
    let stored = db.get_profile(user.id).await.unwrap().unwrap();
    assert_eq!(stored.id, created.id);
    assert_eq!(stored.bio.as_deref(), Some("Engineer"));
}

#[tokio::test]
async fn test_concurrent_profile_creates_keep_one() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let user = db
        .create_user(new_user(
            &format!("kim_{suffix}"),
            &format!("kim{suffix}@example.com"),
        ))
        .await
        .unwrap();

    let fields = |bio: &str| ProfileFields {
        bio: Some(bio.to_string()),
        ..Default::default()
    };
    let (a, b) = tokio::join!(
        db.create_profile(user.id, fields("first")),
        db.create_profile(user.id, fields("second")),
    );

    assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    let winner = a.or(b).unwrap();
    let stored = db.get_profile(user.id).await.unwrap().unwrap();
    assert_eq!(stored.bio, winner.bio);
}

#[tokio::test]
async fn test_update_without_profile_is_none() {
    require_emulator!();

    let db = test_db().await;
    let missing = db
        .update_profile(unique_suffix(), ProfileFields::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}
