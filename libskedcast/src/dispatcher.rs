//! Due-post scan and worker pool
//!
//! Each [`Dispatcher::tick`] selects due posts, claims every one with a
//! conditional `-> publishing` write, and hands only the posts it won to a
//! bounded set of worker tasks. A post another process already claimed is
//! skipped, so no post ever has two publish attempts in flight.
//!
//! Claims are leases: startup recovery only fails attempts whose claim is
//! older than the lease, so a second process starting against the same
//! database leaves live attempts alone.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::db::{Database, DueCandidate};
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::types::{PostStatus, PublishFailure, PublishOutcome};

pub const INTERRUPTED_MESSAGE: &str = "publish attempt interrupted; remote state unknown";

/// Default claim lease, comfortably above the slowest video upload
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 3600;

/// What a single scan did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Due posts returned by the scan
    pub due: usize,
    /// Posts this dispatcher claimed and started
    pub claimed: usize,
    /// Due posts someone else claimed first
    pub lost: usize,
    /// Due posts whose stored data could not be read, failed in place
    pub unreadable: usize,
}

pub struct Dispatcher {
    db: Database,
    orchestrator: Orchestrator,
    workers: Arc<Semaphore>,
    batch_size: usize,
    claim_lease_secs: i64,
    in_flight: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(db: Database, orchestrator: Orchestrator, workers: usize, batch_size: usize) -> Self {
        Self {
            db,
            orchestrator,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            batch_size: batch_size.max(1),
            claim_lease_secs: DEFAULT_CLAIM_LEASE_SECS,
            in_flight: JoinSet::new(),
        }
    }

    pub fn with_claim_lease(mut self, secs: i64) -> Self {
        self.claim_lease_secs = secs.max(1);
        self
    }

    /// Publish a post immediately, bypassing the scan
    pub async fn schedule_immediate(&self, post_id: &str) -> Result<PublishOutcome> {
        self.orchestrator.publish(post_id).await
    }

    /// Fail posts left in `publishing` by a process that died mid-attempt
    ///
    /// Must run before the first tick. Only claims older than the lease are
    /// touched. Remote side effects of those attempts are unknown, so they
    /// wait for a manual retry like any other failure.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let cutoff = now - self.claim_lease_secs;
        let stuck = self.db.find_expired_claims(cutoff).await?;
        let mut recovered = 0;

        for post_id in stuck {
            let failure = PublishFailure {
                message: INTERRUPTED_MESSAGE.to_string(),
                platform_response: None,
                failed_at: now,
            };
            if self.db.expire_claim(&post_id, cutoff, &failure).await? {
                tracing::warn!(post_id = %post_id, "Interrupted publish attempt marked failed");
                recovered += 1;
            }
        }

        Ok(recovered)
    }

    /// Scan once and start a worker for every post claimed
    pub async fn tick(&mut self) -> Result<TickReport> {
        self.reap();

        let capacity = self.workers.available_permits().min(self.batch_size);
        if capacity == 0 {
            tracing::debug!(in_flight = self.in_flight.len(), "All workers busy");
            return Ok(TickReport::default());
        }

        let now = chrono::Utc::now().timestamp();
        let due = self.db.find_due_posts(now, capacity).await?;
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };
        let owner = self.orchestrator.claim_owner().to_string();

        for candidate in due {
            let mut post = match candidate {
                DueCandidate::Post(post) => post,
                DueCandidate::Unreadable { id, status, reason } => {
                    if self.fail_unreadable(&id, status, &reason, now, &owner).await? {
                        report.unreadable += 1;
                    } else {
                        report.lost += 1;
                    }
                    continue;
                }
            };

            let permit = match self.workers.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };

            if !self.db.claim_post(&post.id, post.status, Some(now), &owner).await? {
                tracing::debug!(post_id = %post.id, "Post already claimed");
                report.lost += 1;
                continue;
            }

            tracing::info!(post_id = %post.id, platform = %post.platform, from = %post.status, "Claimed post");
            post.status = PostStatus::Publishing;
            report.claimed += 1;

            let orchestrator = self.orchestrator.clone();
            self.in_flight.spawn(async move {
                let _permit = permit;
                let post_id = post.id.clone();
                if let Err(e) = orchestrator.publish_claimed(post).await {
                    tracing::debug!(post_id = %post_id, error = %e, "Publish attempt ended in failure");
                }
            });
        }

        Ok(report)
    }

    /// Claim a due row that no longer decodes and fail it with the decode error
    async fn fail_unreadable(
        &self,
        post_id: &str,
        status: PostStatus,
        reason: &str,
        now: i64,
        owner: &str,
    ) -> Result<bool> {
        if !self.db.claim_post(post_id, status, Some(now), owner).await? {
            return Ok(false);
        }

        let failure = PublishFailure {
            message: format!("Stored post could not be read: {}", reason),
            platform_response: None,
            failed_at: now,
        };
        let failed = self.db.mark_failed(post_id, owner, &failure).await?;
        tracing::error!(post_id = %post_id, reason = %reason, "Unreadable due post marked failed");
        Ok(failed)
    }

    /// Wait for every in-flight publish attempt to finish
    pub async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            log_join(joined);
        }
    }

    /// One scan, then wait for the attempts it started
    pub async fn run_once(&mut self) -> Result<TickReport> {
        let report = self.tick().await?;
        self.drain().await;
        Ok(report)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn reap(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            log_join(joined);
        }
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Publish worker panicked");
    }
}
