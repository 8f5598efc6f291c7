//! Operator and upstream transitions of the post state machine
//!
//! Publishing transitions (`ready -> publishing -> published|failed`) belong
//! to the orchestrator. Everything else a caller may do to a post lives here,
//! and every change is a single conditional write on the current status.

use crate::db::Database;
use crate::error::{Result, SkedcastError};
use crate::types::{PostStatus, ScheduledPost};

#[derive(Clone)]
pub struct Lifecycle {
    db: Database,
}

impl Lifecycle {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// `failed -> ready`, clearing stored failure diagnostics
    ///
    /// Never invoked automatically; a failed post only comes back through
    /// an explicit operator action.
    pub async fn retry(&self, post_id: &str) -> Result<ScheduledPost> {
        let post = self.load(post_id).await?;
        if post.status != PostStatus::Failed {
            return Err(rejected(&post, "failed"));
        }

        if !self.db.reset_failed(post_id).await? {
            return Err(self.lost_race(post_id, "failed").await);
        }

        tracing::info!(post_id = %post_id, platform = %post.platform, "Post moved back to ready");
        self.load(post_id).await
    }

    /// `scheduled -> generating`, taken by the upstream content step
    pub async fn begin_generation(&self, post_id: &str) -> Result<()> {
        let post = self.load(post_id).await?;
        if post.status != PostStatus::Scheduled {
            return Err(rejected(&post, "scheduled"));
        }

        if !self
            .db
            .transition(post_id, PostStatus::Scheduled, PostStatus::Generating)
            .await?
        {
            return Err(self.lost_race(post_id, "scheduled").await);
        }

        tracing::debug!(post_id = %post_id, "Content generation started");
        Ok(())
    }

    /// Fix the post's content and make it publishable
    ///
    /// Accepts `generating` and `scheduled` posts.
    pub async fn mark_ready(&self, post_id: &str, content: &str) -> Result<()> {
        let post = self.load(post_id).await?;
        if !matches!(post.status, PostStatus::Generating | PostStatus::Scheduled) {
            return Err(rejected(&post, "generating or scheduled"));
        }
        if !self.db.set_content_ready(post_id, post.status, content).await? {
            return Err(self.lost_race(post_id, "generating or scheduled").await);
        }

        tracing::info!(post_id = %post_id, "Post content ready");
        Ok(())
    }

    /// Move a post's publish time
    ///
    /// Allowed while the post is `scheduled`, `ready` or `failed`. `None`
    /// means "as soon as ready", which a `scheduled` post cannot use since
    /// it would never become due.
    pub async fn reschedule(&self, post_id: &str, when: Option<i64>) -> Result<ScheduledPost> {
        let post = self.load(post_id).await?;
        if !matches!(
            post.status,
            PostStatus::Scheduled | PostStatus::Ready | PostStatus::Failed
        ) {
            return Err(rejected(&post, "scheduled, ready or failed"));
        }
        if post.status == PostStatus::Scheduled && when.is_none() {
            return Err(SkedcastError::InvalidInput(format!(
                "Post {} is scheduled and needs a publish time",
                post_id
            )));
        }

        if !self.db.set_scheduled_at(post_id, post.status, when).await? {
            return Err(self.lost_race(post_id, "scheduled, ready or failed").await);
        }

        tracing::info!(post_id = %post_id, scheduled_at = ?when, "Post rescheduled");
        self.load(post_id).await
    }

    async fn load(&self, post_id: &str) -> Result<ScheduledPost> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or_else(|| SkedcastError::NotFound(format!("Post {}", post_id)))
    }

    /// Build the rejection after a conditional write matched nothing
    async fn lost_race(&self, post_id: &str, expected: &str) -> SkedcastError {
        match self.load(post_id).await {
            Ok(post) => rejected(&post, expected),
            Err(e) => e,
        }
    }
}

fn rejected(post: &ScheduledPost, expected: &str) -> SkedcastError {
    SkedcastError::InvalidState {
        post_id: post.id.clone(),
        status: post.status,
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Platform, PublishFailure, SocialAccount};

    async fn setup() -> (Database, Lifecycle, ScheduledPost) {
        let db = Database::in_memory().await.unwrap();
        let now = chrono::Utc::now().timestamp();
        let account = SocialAccount {
            id: "acct-1".to_string(),
            user_id: "user-1".to_string(),
            platform: Platform::Facebook,
            external_account_id: "page-1".to_string(),
            access_token: "sealed".to_string(),
            refresh_token: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        };
        db.create_account(&account).await.unwrap();

        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-1".to_string(),
            Platform::Facebook,
            "hello".to_string(),
        );
        db.create_post(&post).await.unwrap();

        (db.clone(), Lifecycle::new(db), post)
    }

    async fn fail(db: &Database, post_id: &str) {
        assert!(db.claim_post(post_id, PostStatus::Ready, None, "test-owner").await.unwrap());
        let failure = PublishFailure {
            message: "boom".to_string(),
            platform_response: Some("{\"error\":{}}".to_string()),
            failed_at: chrono::Utc::now().timestamp(),
        };
        assert!(db.mark_failed(post_id, "test-owner", &failure).await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_moves_failed_to_ready_and_clears_error() {
        let (db, lifecycle, post) = setup().await;
        fail(&db, &post.id).await;

        let retried = lifecycle.retry(&post.id).await.unwrap();
        assert_eq!(retried.status, PostStatus::Ready);
        assert!(retried.failure().is_none());
    }

    #[tokio::test]
    async fn test_retry_rejects_non_failed_posts() {
        let (_db, lifecycle, post) = setup().await;

        let err = lifecycle.retry(&post.id).await.unwrap_err();
        assert!(matches!(
            err,
            SkedcastError::InvalidState { status: PostStatus::Ready, .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_unknown_post() {
        let (_db, lifecycle, _post) = setup().await;
        assert!(matches!(
            lifecycle.retry("missing").await.unwrap_err(),
            SkedcastError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_generation_path() {
        let (db, lifecycle, _) = setup().await;
        let later = chrono::Utc::now().timestamp() + 3600;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-1".to_string(),
            Platform::Facebook,
            String::new(),
        )
        .scheduled_for(later);
        db.create_post(&post).await.unwrap();

        lifecycle.begin_generation(&post.id).await.unwrap();
        assert!(lifecycle.begin_generation(&post.id).await.is_err());

        lifecycle.mark_ready(&post.id, "final text").await.unwrap();
        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Ready);
        assert_eq!(stored.generated_content, "final text");
        assert_eq!(stored.scheduled_at, Some(later));
    }

    #[tokio::test]
    async fn test_mark_ready_rejects_published() {
        let (db, lifecycle, post) = setup().await;
        db.claim_post(&post.id, PostStatus::Ready, None, "test-owner").await.unwrap();
        db.mark_published(&post.id, "test-owner", "1_2", "https://www.facebook.com/1_2", 10)
            .await
            .unwrap();

        assert!(matches!(
            lifecycle.mark_ready(&post.id, "again").await.unwrap_err(),
            SkedcastError::InvalidState { status: PostStatus::Published, .. }
        ));
    }

    #[tokio::test]
    async fn test_reschedule_ready_and_failed() {
        let (db, lifecycle, post) = setup().await;
        let at = chrono::Utc::now().timestamp() + 600;

        let moved = lifecycle.reschedule(&post.id, Some(at)).await.unwrap();
        assert_eq!(moved.scheduled_at, Some(at));
        assert_eq!(moved.status, PostStatus::Ready);

        fail(&db, &post.id).await;
        let moved = lifecycle.reschedule(&post.id, None).await.unwrap();
        assert_eq!(moved.scheduled_at, None);
        assert_eq!(moved.status, PostStatus::Failed);
    }

    #[tokio::test]
    async fn test_reschedule_rejects_in_flight_and_published() {
        let (db, lifecycle, post) = setup().await;
        db.claim_post(&post.id, PostStatus::Ready, None, "test-owner").await.unwrap();

        assert!(matches!(
            lifecycle.reschedule(&post.id, Some(1)).await.unwrap_err(),
            SkedcastError::InvalidState { status: PostStatus::Publishing, .. }
        ));
    }

    #[tokio::test]
    async fn test_reschedule_scheduled_needs_time() {
        let (db, lifecycle, _) = setup().await;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-1".to_string(),
            Platform::Facebook,
            "later".to_string(),
        )
        .scheduled_for(chrono::Utc::now().timestamp() + 60);
        db.create_post(&post).await.unwrap();

        assert!(matches!(
            lifecycle.reschedule(&post.id, None).await.unwrap_err(),
            SkedcastError::InvalidInput(_)
        ));
    }
}
