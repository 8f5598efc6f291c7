//! Shared fixtures for sked-queue integration tests

#![allow(dead_code)]

use assert_cmd::Command;
use libskedcast::types::{Platform, PostStatus, PublishFailure, ScheduledPost, SocialAccount};
use libskedcast::vault::TokenCipher;
use libskedcast::Database;
use secrecy::ExposeSecret;
use std::fs;
use tempfile::TempDir;

/// Claim owner used when tests drive posts through publish states directly
pub const TEST_OWNER: &str = "sked-queue-tests";

pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_path: String,
    pub db_path: String,
    pub identity: String,
}

impl TestEnv {
    pub async fn db(&self) -> Database {
        Database::new(&self.db_path).await.unwrap()
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("sked-queue").unwrap();
        cmd.env("SKEDCAST_CONFIG", &self.config_path)
            .env("SKEDCAST_VAULT_IDENTITY", &self.identity)
            .env_remove("SKEDCAST_DB_PATH")
            .env_remove("SKEDCAST_LOG_LEVEL")
            .env_remove("RUST_LOG");
        cmd
    }
}

/// Config, database with one account per platform, and a vault identity
pub async fn setup_test_env() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("skedcast.db");

    fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n",
            db_path.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let cipher = TokenCipher::generate();
    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    let now = chrono::Utc::now().timestamp();
    for platform in Platform::all() {
        db.create_account(&SocialAccount {
            id: format!("acct-{}", platform),
            user_id: "user-1".to_string(),
            platform,
            external_account_id: format!("{}-ext", platform),
            access_token: cipher.seal("token").unwrap(),
            refresh_token: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    }

    TestEnv {
        config_path: config_path.to_string_lossy().to_string(),
        db_path: db_path.to_string_lossy().to_string(),
        identity: cipher.identity_string().expose_secret().to_string(),
        temp_dir,
    }
}

pub fn post(platform: Platform, content: &str) -> ScheduledPost {
    ScheduledPost::new(
        "user-1".to_string(),
        format!("acct-{}", platform),
        platform,
        content.to_string(),
    )
}

pub async fn insert(env: &TestEnv, post: ScheduledPost) -> String {
    let id = post.id.clone();
    env.db().await.create_post(&post).await.unwrap();
    id
}

/// Drive a ready post into `failed` the way a publish attempt would
pub async fn fail(env: &TestEnv, post_id: &str, message: &str, response: Option<&str>) {
    let db = env.db().await;
    assert!(db.claim_post(post_id, PostStatus::Ready, None, TEST_OWNER).await.unwrap());
    let failure = PublishFailure {
        message: message.to_string(),
        platform_response: response.map(str::to_string),
        failed_at: chrono::Utc::now().timestamp(),
    };
    assert!(db.mark_failed(post_id, TEST_OWNER, &failure).await.unwrap());
}

pub async fn publish(env: &TestEnv, post_id: &str, remote_id: &str, url: &str) {
    let db = env.db().await;
    assert!(db.claim_post(post_id, PostStatus::Ready, None, TEST_OWNER).await.unwrap());
    assert!(db
        .mark_published(post_id, TEST_OWNER, remote_id, url, chrono::Utc::now().timestamp())
        .await
        .unwrap());
}
