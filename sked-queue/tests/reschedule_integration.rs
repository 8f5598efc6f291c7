//! Integration tests for sked-queue reschedule

mod common;

use common::{fail, insert, post, publish, setup_test_env};
use libskedcast::types::{Platform, PostStatus};
use predicates::prelude::*;

#[tokio::test]
async fn test_reschedule_with_relative_duration() {
    let env = setup_test_env().await;
    let now = chrono::Utc::now().timestamp();
    let id = insert(&env, post(Platform::Facebook, "move me").scheduled_for(now + 60)).await;

    env.cmd().args(["reschedule", &id, "2h"]).assert().success();

    let stored = env.db().await.get_post(&id).await.unwrap().unwrap();
    let at = stored.scheduled_at.unwrap();
    assert!((now + 7_100..=now + 7_300).contains(&at), "scheduled_at {}", at);
    assert_eq!(stored.status, PostStatus::Scheduled);
}

#[tokio::test]
async fn test_reschedule_with_rfc3339() {
    let env = setup_test_env().await;
    let id = insert(&env, post(Platform::YouTube, "exact")).await;

    env.cmd()
        .args(["reschedule", &id, "2030-01-02T03:04:05Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2030-01-02T03:04:05"));

    let stored = env.db().await.get_post(&id).await.unwrap().unwrap();
    assert_eq!(stored.scheduled_at, Some(1_893_553_445));
}

#[tokio::test]
async fn test_reschedule_failed_post_keeps_it_failed() {
    let env = setup_test_env().await;
    let id = insert(&env, post(Platform::Instagram, "failed")).await;
    fail(&env, &id, "boom", None).await;

    env.cmd().args(["reschedule", &id, "30m"]).assert().success();

    let stored = env.db().await.get_post(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Failed);
    assert!(stored.scheduled_at.is_some());
}

#[tokio::test]
async fn test_reschedule_ready_post_to_now() {
    let env = setup_test_env().await;
    let later = chrono::Utc::now().timestamp() + 3600;
    let id = insert(&env, post(Platform::Facebook, "sooner")).await;
    env.db()
        .await
        .set_scheduled_at(&id, PostStatus::Ready, Some(later))
        .await
        .unwrap();

    env.cmd()
        .args(["reschedule", &id, "now"])
        .assert()
        .success()
        .stdout(predicate::str::contains("immediate"));

    let stored = env.db().await.get_post(&id).await.unwrap().unwrap();
    assert_eq!(stored.scheduled_at, None);
}

#[tokio::test]
async fn test_reschedule_published_post_rejected() {
    let env = setup_test_env().await;
    let id = insert(&env, post(Platform::Facebook, "done")).await;
    publish(&env, &id, "1_2", "https://www.facebook.com/1_2").await;

    env.cmd()
        .args(["reschedule", &id, "1h"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("is published"));
}

#[tokio::test]
async fn test_reschedule_bad_time() {
    let env = setup_test_env().await;
    let id = insert(&env, post(Platform::Facebook, "x")).await;

    env.cmd()
        .args(["reschedule", &id, "not a time"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Could not parse schedule string"));
}

#[tokio::test]
async fn test_reschedule_unknown_post() {
    let env = setup_test_env().await;

    env.cmd()
        .args(["reschedule", "missing", "1h"])
        .assert()
        .code(3);
}
