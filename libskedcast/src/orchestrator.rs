//! Publishing orchestrator
//!
//! [`Orchestrator::publish`] is the single entry point both immediate publish
//! requests and the dispatcher's due-post scan funnel into. It owns the
//! `ready -> publishing -> published|failed` edges of the state machine.

use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapters::{AdapterRegistry, PlatformAdapter, PublishContent};
use crate::db::Database;
use crate::error::{DbError, Result, SkedcastError};
use crate::media;
use crate::notify::{spawn_notify, SyncEvent, SyncNotifier};
use crate::types::{
    MediaItem, PostStatus, PublishFailure, PublishOutcome, ScheduledPost, SocialAccount,
    YouTubeMetadata,
};
use crate::vault::CredentialVault;

/// Inputs gathered before the claim; building them touches no remote service
struct Prepared {
    account: SocialAccount,
    adapter: Arc<dyn PlatformAdapter>,
    media: Vec<MediaItem>,
    youtube: Option<YouTubeMetadata>,
}

#[derive(Clone)]
pub struct Orchestrator {
    db: Database,
    vault: Arc<CredentialVault>,
    adapters: AdapterRegistry,
    notifier: Option<Arc<dyn SyncNotifier>>,
    /// Identity written into every claim this orchestrator makes
    claim_owner: Arc<str>,
}

impl Orchestrator {
    pub fn new(db: Database, vault: Arc<CredentialVault>, adapters: AdapterRegistry) -> Self {
        Self {
            db,
            vault,
            adapters,
            notifier: None,
            claim_owner: Arc::from(format!("{}-{}", std::process::id(), Uuid::new_v4())),
        }
    }

    pub fn claim_owner(&self) -> &str {
        &self.claim_owner
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Publish a `ready` post now
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the post is not `ready` (including already
    ///   `published`); nothing is written and no request is made
    /// - `NotFound` / validation errors found before the claim, also without
    ///   any state change
    /// - any credential or platform error after the claim, in which case the
    ///   post has been moved to `failed` with the error text stored
    /// - `LostClaim` if the remote post was created but the claim had been
    ///   taken over and reset, carrying the external id so it is not lost
    pub async fn publish(&self, post_id: &str) -> Result<PublishOutcome> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| SkedcastError::NotFound(format!("Post {}", post_id)))?;

        if post.status != PostStatus::Ready {
            return Err(SkedcastError::InvalidState {
                post_id: post.id,
                status: post.status,
                expected: PostStatus::Ready.to_string(),
            });
        }

        let prepared = self.prepare(&post).await?;

        if !self
            .db
            .claim_post(&post.id, PostStatus::Ready, None, &self.claim_owner)
            .await? {
            let status = self
                .db
                .get_post(&post.id)
                .await?
                .map_or(PostStatus::Publishing, |p| p.status);
            return Err(SkedcastError::InvalidState {
                post_id: post.id,
                status,
                expected: PostStatus::Ready.to_string(),
            });
        }

        let span = tracing::info_span!("publish", post_id = %post.id, platform = %post.platform);
        self.execute(post, prepared).instrument(span).await
    }

    /// Publish a post the caller has already claimed into `publishing`
    ///
    /// Used by the dispatcher. A post that cannot be prepared is marked
    /// `failed`, since the claim already took it out of the queue.
    pub async fn publish_claimed(&self, post: ScheduledPost) -> Result<PublishOutcome> {
        let span = tracing::info_span!("publish", post_id = %post.id, platform = %post.platform);

        async move {
            let prepared = match self.prepare(&post).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    self.record_failure(&post, &e).await?;
                    return Err(e);
                }
            };
            self.execute(post, prepared).await
        }
        .instrument(span)
        .await
    }

    async fn prepare(&self, post: &ScheduledPost) -> Result<Prepared> {
        let account = self
            .db
            .get_account(&post.social_account_id)
            .await?
            .ok_or_else(|| {
                SkedcastError::NotFound(format!("Social account {}", post.social_account_id))
            })?;

        if account.platform != post.platform {
            return Err(SkedcastError::InvalidInput(format!(
                "Account {} is a {} account, post targets {}",
                account.id, account.platform, post.platform
            )));
        }

        let adapter = self.adapters.get(post.platform)?;
        let media = media::resolve_all(&self.db.get_post_media(&post.id).await?);
        let youtube = self.db.get_youtube_metadata(&post.id).await?;

        adapter.validate(&PublishContent {
            caption: &post.generated_content,
            media: &media,
            target: &post.platform_data.target,
            youtube: youtube.as_ref(),
        })?;

        Ok(Prepared {
            account,
            adapter,
            media,
            youtube,
        })
    }

    async fn execute(&self, post: ScheduledPost, prepared: Prepared) -> Result<PublishOutcome> {
        tracing::info!(
            sub_type = post.platform_data.target.sub_type(),
            media = prepared.media.len(),
            "Publishing post"
        );
        self.notify(SyncEvent::PublishStarted {
            post_id: post.id.clone(),
            platform: post.platform.to_string(),
        });

        let content = PublishContent {
            caption: &post.generated_content,
            media: &prepared.media,
            target: &post.platform_data.target,
            youtube: prepared.youtube.as_ref(),
        };

        let result = match self.vault.get_valid_credential(&prepared.account).await {
            Ok(token) => {
                prepared
                    .adapter
                    .publish(&token, &prepared.account.external_account_id, &content)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                let published_at = chrono::Utc::now().timestamp();
                if !self
                    .db
                    .mark_published(
                        &post.id,
                        &self.claim_owner,
                        &outcome.external_id,
                        &outcome.url,
                        published_at,
                    )
                    .await?
                {
                    tracing::error!(
                        external_id = %outcome.external_id,
                        url = %outcome.url,
                        "Post left the publishing state before its result was stored"
                    );
                    return Err(DbError::LostClaim {
                        post_id: post.id,
                        platform_post_id: outcome.external_id,
                        post_url: outcome.url,
                    }
                    .into());
                }

                tracing::info!(external_id = %outcome.external_id, url = %outcome.url, "Post published");
                self.notify(SyncEvent::Published {
                    post_id: post.id.clone(),
                    user_id: post.user_id.clone(),
                    platform: post.platform.to_string(),
                    platform_post_id: outcome.external_id.clone(),
                    post_url: outcome.url.clone(),
                });
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure(&post, &e).await?;
                Err(e)
            }
        }
    }

    async fn record_failure(&self, post: &ScheduledPost, error: &SkedcastError) -> Result<()> {
        let platform_response = match error {
            SkedcastError::Platform(e) => e.platform_response().map(str::to_string),
            _ => None,
        };
        let failure = PublishFailure {
            message: error.to_string(),
            platform_response,
            failed_at: chrono::Utc::now().timestamp(),
        };

        if self.db.mark_failed(&post.id, &self.claim_owner, &failure).await? {
            tracing::warn!(error = %error, "Post failed");
        } else {
            tracing::error!(error = %error, "Post left the publishing state before its failure was stored");
        }

        self.notify(SyncEvent::Failed {
            post_id: post.id.clone(),
            user_id: post.user_id.clone(),
            platform: post.platform.to_string(),
            error: failure.message,
        });
        Ok(())
    }

    fn notify(&self, event: SyncEvent) {
        if let Some(notifier) = &self.notifier {
            spawn_notify(notifier.clone(), event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::notify::EventBus;
    use crate::types::{MediaAsset, Platform, PublishTarget};
    use crate::vault::TokenCipher;
    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Facebook stand-in that records the token it was handed
    struct StubAdapter {
        calls: AtomicUsize,
        tokens: Mutex<Vec<String>>,
        fail_with: Option<PlatformError>,
    }

    impl StubAdapter {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                tokens: Mutex::new(Vec::new()),
                fail_with: None,
            })
        }

        fn failing(error: PlatformError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                tokens: Mutex::new(Vec::new()),
                fail_with: Some(error),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlatformAdapter for StubAdapter {
        fn platform(&self) -> Platform {
            Platform::Facebook
        }

        fn validate(&self, content: &PublishContent<'_>) -> Result<()> {
            if content.target == &PublishTarget::FacebookReels && content.videos() != 1 {
                return Err(PlatformError::Validation("reel needs one video".to_string()).into());
            }
            Ok(())
        }

        async fn publish(
            &self,
            token: &SecretString,
            account: &str,
            _content: &PublishContent<'_>,
        ) -> Result<PublishOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens
                .lock()
                .unwrap()
                .push(token.expose_secret().to_string());
            match &self.fail_with {
                Some(error) => Err(error.clone().into()),
                None => Ok(PublishOutcome {
                    external_id: format!("{}_42", account),
                    url: format!("https://www.facebook.com/{}_42", account),
                }),
            }
        }
    }

    struct Fixture {
        db: Database,
        orchestrator: Orchestrator,
        cipher: Arc<TokenCipher>,
    }

    async fn fixture(adapter: Arc<StubAdapter>) -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let cipher = Arc::new(TokenCipher::generate());
        let now = chrono::Utc::now().timestamp();

        db.create_account(&SocialAccount {
            id: "acct-fb".to_string(),
            user_id: "user-1".to_string(),
            platform: Platform::Facebook,
            external_account_id: "page-7".to_string(),
            access_token: cipher.seal("page-token").unwrap(),
            refresh_token: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

        let vault = Arc::new(CredentialVault::new(db.clone(), cipher.clone(), 60));
        let mut registry = AdapterRegistry::new();
        registry.register(adapter);

        Fixture {
            orchestrator: Orchestrator::new(db.clone(), vault, registry),
            db,
            cipher,
        }
    }

    async fn ready_post(db: &Database) -> ScheduledPost {
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-fb".to_string(),
            Platform::Facebook,
            "Hello page".to_string(),
        );
        db.create_post(&post).await.unwrap();
        post
    }

    #[tokio::test]
    async fn test_publish_ready_post() {
        let adapter = StubAdapter::ok();
        let f = fixture(adapter.clone()).await;
        let post = ready_post(&f.db).await;

        let outcome = f.orchestrator.publish(&post.id).await.unwrap();
        assert_eq!(outcome.external_id, "page-7_42");

        let stored = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Published);
        assert_eq!(stored.platform_post_id.as_deref(), Some("page-7_42"));
        assert_eq!(stored.post_url.as_deref(), Some("https://www.facebook.com/page-7_42"));
        assert!(stored.published_at.is_some());
        assert_eq!(adapter.tokens.lock().unwrap().as_slice(), ["page-token"]);
    }

    #[tokio::test]
    async fn test_second_publish_makes_no_remote_call() {
        let adapter = StubAdapter::ok();
        let f = fixture(adapter.clone()).await;
        let post = ready_post(&f.db).await;

        f.orchestrator.publish(&post.id).await.unwrap();
        let first = f.db.get_post(&post.id).await.unwrap().unwrap();

        let err = f.orchestrator.publish(&post.id).await.unwrap_err();
        assert!(matches!(
            err,
            SkedcastError::InvalidState { status: PostStatus::Published, .. }
        ));
        assert_eq!(adapter.calls(), 1);

        let second = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(first.published_at, second.published_at);
        assert_eq!(first.platform_post_id, second.platform_post_id);
    }

    #[tokio::test]
    async fn test_non_ready_post_is_rejected_without_side_effects() {
        let adapter = StubAdapter::ok();
        let f = fixture(adapter.clone()).await;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-fb".to_string(),
            Platform::Facebook,
            "Later".to_string(),
        )
        .scheduled_for(chrono::Utc::now().timestamp() - 10);
        f.db.create_post(&post).await.unwrap();
        let before = f.db.get_post(&post.id).await.unwrap().unwrap();

        let err = f.orchestrator.publish(&post.id).await.unwrap_err();
        assert!(err.is_preflight());
        assert_eq!(adapter.calls(), 0);

        let after = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(after.status, PostStatus::Scheduled);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_post_ready() {
        let adapter = StubAdapter::ok();
        let f = fixture(adapter.clone()).await;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-fb".to_string(),
            Platform::Facebook,
            "Reel without video".to_string(),
        )
        .with_target(PublishTarget::FacebookReels);
        f.db.create_post(&post).await.unwrap();

        let err = f.orchestrator.publish(&post.id).await.unwrap_err();
        assert!(matches!(err, SkedcastError::Platform(PlatformError::Validation(_))));
        assert_eq!(adapter.calls(), 0);
        assert_eq!(
            f.db.get_post(&post.id).await.unwrap().unwrap().status,
            PostStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_platform_error_marks_failed_with_raw_body() {
        let body = r#"{"error":{"message":"(#200) Permissions error","code":200}}"#;
        let adapter = StubAdapter::failing(PlatformError::Api {
            context: "Facebook feed post".to_string(),
            status: 403,
            body: body.to_string(),
        });
        let f = fixture(adapter.clone()).await;
        let post = ready_post(&f.db).await;

        assert!(f.orchestrator.publish(&post.id).await.is_err());

        let stored = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert!(stored.platform_post_id.is_none());
        assert!(stored.post_url.is_none());
        let failure = stored.failure().unwrap();
        assert_eq!(failure.platform_response.as_deref(), Some(body));
        assert!(failure.message.contains("Permissions error"));
        assert_eq!(stored.platform_data.target, PublishTarget::FacebookPage);
    }

    #[tokio::test]
    async fn test_unusable_credential_fails_without_adapter_call() {
        let adapter = StubAdapter::ok();
        let f = fixture(adapter.clone()).await;

        let other = TokenCipher::generate();
        let now = chrono::Utc::now().timestamp();
        f.db.create_account(&SocialAccount {
            id: "acct-bad".to_string(),
            user_id: "user-1".to_string(),
            platform: Platform::Facebook,
            external_account_id: "page-9".to_string(),
            access_token: other.seal("foreign").unwrap(),
            refresh_token: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-bad".to_string(),
            Platform::Facebook,
            "hi".to_string(),
        );
        f.db.create_post(&post).await.unwrap();

        let err = f.orchestrator.publish(&post.id).await.unwrap_err();
        assert!(matches!(err, SkedcastError::Credential(_)));
        assert_eq!(adapter.calls(), 0);
        assert_eq!(
            f.db.get_post(&post.id).await.unwrap().unwrap().status,
            PostStatus::Failed
        );
        assert!(f.cipher.open(&f.db.get_account("acct-fb").await.unwrap().unwrap().access_token).is_ok());
    }

    #[tokio::test]
    async fn test_claimed_post_that_cannot_be_prepared_is_failed() {
        let adapter = StubAdapter::ok();
        let f = fixture(adapter.clone()).await;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            "acct-fb".to_string(),
            Platform::Facebook,
            "reel".to_string(),
        )
        .with_target(PublishTarget::FacebookReels);
        f.db.create_post(&post).await.unwrap();

        let asset = MediaAsset::new(
            "user-1".to_string(),
            "uploads/gone".to_string(),
            MediaAsset::tombstone(1),
            Some("video/mp4".to_string()),
        );
        f.db.create_media_asset(&asset).await.unwrap();
        f.db.attach_media(&post.id, &[asset.id.clone()]).await.unwrap();

        assert!(f.db.claim_post(&post.id, PostStatus::Ready, None, f.orchestrator.claim_owner()).await.unwrap());
        let claimed = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert!(f.orchestrator.publish_claimed(claimed).await.is_err());

        let stored = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert_eq!(adapter.calls(), 0);
    }

    /// Publishes fine, but a restarted process expires the claim meanwhile
    struct TakeoverAdapter {
        db: Database,
        operator_retries: bool,
    }

    #[async_trait]
    impl PlatformAdapter for TakeoverAdapter {
        fn platform(&self) -> Platform {
            Platform::Facebook
        }

        fn validate(&self, _content: &PublishContent<'_>) -> Result<()> {
            Ok(())
        }

        async fn publish(
            &self,
            _token: &SecretString,
            account: &str,
            _content: &PublishContent<'_>,
        ) -> Result<PublishOutcome> {
            let cutoff = chrono::Utc::now().timestamp() + 1;
            for id in self.db.find_expired_claims(cutoff).await? {
                let failure = PublishFailure {
                    message: "interrupted".to_string(),
                    platform_response: None,
                    failed_at: cutoff,
                };
                self.db.expire_claim(&id, cutoff, &failure).await?;
                if self.operator_retries {
                    self.db.reset_failed(&id).await?;
                }
            }
            Ok(PublishOutcome {
                external_id: format!("{}_77", account),
                url: format!("https://www.facebook.com/{}_77", account),
            })
        }
    }

    fn takeover_orchestrator(f: &Fixture, operator_retries: bool) -> Orchestrator {
        let vault = Arc::new(CredentialVault::new(f.db.clone(), f.cipher.clone(), 60));
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(TakeoverAdapter {
            db: f.db.clone(),
            operator_retries,
        }));
        Orchestrator::new(f.db.clone(), vault, registry)
    }

    #[tokio::test]
    async fn test_result_after_claim_expiry_is_still_recorded() {
        let f = fixture(StubAdapter::ok()).await;
        let post = ready_post(&f.db).await;

        let outcome = takeover_orchestrator(&f, false).publish(&post.id).await.unwrap();
        assert_eq!(outcome.external_id, "page-7_77");

        let stored = f.db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Published);
        assert_eq!(stored.platform_post_id.as_deref(), Some("page-7_77"));
        assert!(stored.failure().is_none());
    }

    #[tokio::test]
    async fn test_result_after_operator_retry_surfaces_lost_claim() {
        let f = fixture(StubAdapter::ok()).await;
        let post = ready_post(&f.db).await;

        let err = takeover_orchestrator(&f, true).publish(&post.id).await.unwrap_err();
        match err {
            SkedcastError::Database(DbError::LostClaim {
                post_id,
                platform_post_id,
                post_url,
            }) => {
                assert_eq!(post_id, post.id);
                assert_eq!(platform_post_id, "page-7_77");
                assert_eq!(post_url, "https://www.facebook.com/page-7_77");
            }
            other => panic!("expected LostClaim, got {:?}", other),
        }
        assert_eq!(
            f.db.get_post(&post.id).await.unwrap().unwrap().status,
            PostStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_notifier_sees_outcome() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let adapter = StubAdapter::ok();
        let f = fixture(adapter).await;
        let orchestrator = f.orchestrator.clone().with_notifier(Arc::new(bus));
        let post = ready_post(&f.db).await;

        orchestrator.publish(&post.id).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(event);
        }
        assert!(seen.iter().any(|e| matches!(
            e,
            SyncEvent::Published { platform_post_id, .. } if platform_post_id == "page-7_42"
        )));
    }
}
