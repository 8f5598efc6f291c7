//! Database operations for Skedcast
//!
//! Every status change is a single conditional `UPDATE` guarded by the
//! expected current status; the returned `bool` reports whether this caller
//! won the transition.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DbError, Result, SkedcastError};
use crate::types::{
    MediaAsset, Platform, PlatformData, PostStatus, PrivacyStatus, PublishFailure, ScheduledPost,
    SocialAccount, YouTubeContentType, YouTubeMetadata,
};

const POST_COLUMNS: &str = "id, user_id, social_account_id, platform, status, scheduled_at, \
     generated_content, platform_data, platform_post_id, post_url, created_at, updated_at, \
     published_at";

/// Post counts grouped by status and platform
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub by_status: Vec<(PostStatus, i64)>,
    pub by_platform: Vec<(Platform, i64)>,
    /// Earliest `scheduled_at` among posts still waiting to publish
    pub next_scheduled_at: Option<i64>,
}

impl QueueStats {
    pub fn count(&self, status: PostStatus) -> i64 {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }

    pub fn total(&self) -> i64 {
        self.by_status.iter().map(|(_, n)| n).sum()
    }
}

/// A row picked up by the due scan
#[derive(Debug, Clone)]
pub enum DueCandidate {
    Post(ScheduledPost),
    /// Stored data that no longer decodes; carries enough to claim and fail it
    Unreadable {
        id: String,
        status: PostStatus,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        Self::migrate(pool).await
    }

    /// Private in-memory database on a single connection
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(DbError::SqlxError)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---------------------------------------------------------------------
    // Social accounts
    // ---------------------------------------------------------------------

    pub async fn create_account(&self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts
                (id, user_id, platform, external_account_id, access_token, refresh_token,
                 expires_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(account.platform.as_str())
        .bind(&account.external_account_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.expires_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, external_account_id, access_token, refresh_token,
                   expires_at, created_at, updated_at
            FROM social_accounts WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| account_from_row(&r)).transpose()
    }

    /// Replace an account's sealed tokens if its access token is still `expected_access_token`
    ///
    /// Returns `false` when another writer refreshed first; nothing is written then.
    pub async fn update_account_tokens(
        &self,
        account_id: &str,
        expected_access_token: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE social_accounts
            SET access_token = ?,
                refresh_token = COALESCE(?, refresh_token),
                expires_at = ?,
                updated_at = ?
            WHERE id = ? AND access_token = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(now)
        .bind(account_id)
        .bind(expected_access_token)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete an account together with its posts
    pub async fn delete_account(&self, account_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM scheduled_posts WHERE social_account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM social_accounts WHERE id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Media
    // ---------------------------------------------------------------------

    pub async fn create_media_asset(&self, asset: &MediaAsset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media_assets (id, user_id, storage_path, url, mime_type, size_bytes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&asset.id)
        .bind(&asset.user_id)
        .bind(&asset.storage_path)
        .bind(asset.url.to_string())
        .bind(&asset.mime_type)
        .bind(asset.size_bytes)
        .bind(asset.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_media_asset(&self, asset_id: &str) -> Result<Option<MediaAsset>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, storage_path, url, mime_type, size_bytes, created_at
            FROM media_assets WHERE id = ?
            "#,
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| media_from_row(&r)))
    }

    /// Soft-delete: the URL becomes a tombstone and the size drops to zero
    pub async fn tombstone_media_asset(&self, asset_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE media_assets SET url = ?, size_bytes = 0 WHERE id = ?
            "#,
        )
        .bind(MediaAsset::tombstone(now).to_string())
        .bind(asset_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Link assets to a post, in the given order, replacing earlier links
    pub async fn attach_media(&self, post_id: &str, asset_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM post_media WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        for (position, asset_id) in asset_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO post_media (post_id, media_asset_id, position) VALUES (?, ?, ?)",
            )
            .bind(post_id)
            .bind(asset_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Assets linked to a post, in attachment order
    pub async fn get_post_media(&self, post_id: &str) -> Result<Vec<MediaAsset>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.user_id, m.storage_path, m.url, m.mime_type, m.size_bytes, m.created_at
            FROM post_media pm
            JOIN media_assets m ON m.id = pm.media_asset_id
            WHERE pm.post_id = ?
            ORDER BY pm.position ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(media_from_row).collect())
    }

    // ---------------------------------------------------------------------
    // Posts
    // ---------------------------------------------------------------------

    pub async fn create_post(&self, post: &ScheduledPost) -> Result<()> {
        if post.platform_data.target.platform() != post.platform {
            return Err(SkedcastError::InvalidInput(format!(
                "Sub-type {} does not belong to platform {}",
                post.platform_data.target.sub_type(),
                post.platform
            )));
        }

        let platform_data = encode_platform_data(&post.platform_data)?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, user_id, social_account_id, platform, status, scheduled_at,
                 generated_content, platform_data, platform_post_id, post_url,
                 created_at, updated_at, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.social_account_id)
        .bind(post.platform.as_str())
        .bind(post.status.as_str())
        .bind(post.scheduled_at)
        .bind(&post.generated_content)
        .bind(platform_data)
        .bind(&post.platform_post_id)
        .bind(&post.post_url)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM scheduled_posts WHERE id = ?",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }

    /// List posts, newest first, optionally filtered by status
    pub async fn list_posts(
        &self,
        status: Option<PostStatus>,
        platform: Option<Platform>,
        limit: usize,
    ) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM scheduled_posts
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR platform = ?2)
            ORDER BY created_at DESC
            LIMIT ?3
            "#,
            POST_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(platform.map(|p| p.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .filter_map(|row| match post_from_row(row) {
                Ok(post) => Some(post),
                Err(e) => {
                    let id: String = row.get("id");
                    tracing::warn!(post_id = %id, error = %e, "Skipping unreadable post");
                    None
                }
            })
            .collect())
    }

    /// Candidates for the dispatcher scan at `now`, oldest due first
    ///
    /// A `ready` post is due when it has no time or its time has passed; a
    /// `scheduled` post only once its time has passed. Rows are decoded one
    /// by one so a single corrupt row cannot stall the scan.
    pub async fn find_due_posts(&self, now: i64, limit: usize) -> Result<Vec<DueCandidate>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM scheduled_posts
            WHERE (status = 'ready' AND (scheduled_at IS NULL OR scheduled_at <= ?1))
               OR (status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= ?1)
            ORDER BY COALESCE(scheduled_at, created_at) ASC
            LIMIT ?2
            "#,
            POST_COLUMNS
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            match post_from_row(row) {
                Ok(post) => candidates.push(DueCandidate::Post(post)),
                Err(e) => {
                    // The status column is filtered by the query, so it parses
                    // unless the row is damaged beyond the platform data.
                    let id: String = row.get("id");
                    match parse_column::<PostStatus>(row, "status") {
                        Ok(status) => candidates.push(DueCandidate::Unreadable {
                            id,
                            status,
                            reason: e.to_string(),
                        }),
                        Err(_) => {
                            tracing::warn!(post_id = %id, error = %e, "Skipping unreadable post")
                        }
                    }
                }
            }
        }

        Ok(candidates)
    }

    /// Ids of in-flight posts whose claim was taken at or before `cutoff`
    ///
    /// Claims without a timestamp predate leases and always count as expired.
    pub async fn find_expired_claims(&self, cutoff: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM scheduled_posts
            WHERE status = 'publishing' AND (claimed_at IS NULL OR claimed_at <= ?)
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Fail an in-flight post whose claim is still expired at `cutoff`
    ///
    /// The claim owner is kept so that owner can still record a late result
    /// through [`mark_published`](Self::mark_published).
    pub async fn expire_claim(
        &self,
        post_id: &str,
        cutoff: i64,
        failure: &PublishFailure,
    ) -> Result<bool> {
        let failure_json = failure_to_json(failure)?;

        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed',
                platform_data = json_set(
                    CASE WHEN json_valid(platform_data) THEN platform_data
                         ELSE json_object('unparsed', platform_data) END,
                    '$.error', json(?1)),
                updated_at = ?2
            WHERE id = ?3 AND status = 'publishing'
              AND (claimed_at IS NULL OR claimed_at <= ?4)
            "#,
        )
        .bind(failure_json)
        .bind(failure.failed_at)
        .bind(post_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a post between two non-publish states if it is still in `from`
    ///
    /// Only legal edges of the state machine are accepted. Edges into
    /// `publishing`, `published` and `failed` carry extra columns and go
    /// through [`claim_post`](Self::claim_post), [`mark_published`](Self::mark_published)
    /// and [`mark_failed`](Self::mark_failed) instead.
    pub async fn transition(&self, post_id: &str, from: PostStatus, to: PostStatus) -> Result<bool> {
        if !from.can_transition_to(to)
            || matches!(to, PostStatus::Publishing | PostStatus::Published | PostStatus::Failed)
        {
            return Err(SkedcastError::InvalidInput(format!(
                "Illegal status change {} -> {} for post {}",
                from, to, post_id
            )));
        }

        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE scheduled_posts SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(now)
        .bind(post_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Claim a post for publishing: `from -> publishing`
    ///
    /// The claim records `owner` and the claim time as a lease; only the
    /// owner may later resolve it. With `due_by`, the claim also requires the
    /// post to be due at that time, so a concurrent reschedule wins over a
    /// stale scan.
    pub async fn claim_post(
        &self,
        post_id: &str,
        from: PostStatus,
        due_by: Option<i64>,
        owner: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'publishing', claimed_by = ?1, claimed_at = ?2, updated_at = ?2
            WHERE id = ?3 AND status = ?4
              AND (?5 IS NULL OR scheduled_at IS NULL OR scheduled_at <= ?5)
            "#,
        )
        .bind(owner)
        .bind(now)
        .bind(post_id)
        .bind(from.as_str())
        .bind(due_by)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// `publishing -> published`, writing the external identity in the same statement
    ///
    /// Only the claim owner wins. An owner whose lease expired and was
    /// recovered to `failed` may still record the result, as long as nobody
    /// reset the post in between; the remote post exists either way.
    pub async fn mark_published(
        &self,
        post_id: &str,
        owner: &str,
        platform_post_id: &str,
        post_url: &str,
        published_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published',
                platform_post_id = ?1,
                post_url = ?2,
                published_at = ?3,
                platform_data = CASE WHEN json_valid(platform_data)
                                     THEN json_remove(platform_data, '$.error')
                                     ELSE platform_data END,
                updated_at = ?3
            WHERE id = ?4 AND claimed_by = ?5
              AND (status = 'publishing' OR (status = 'failed' AND platform_post_id IS NULL))
            "#,
        )
        .bind(platform_post_id)
        .bind(post_url)
        .bind(published_at)
        .bind(post_id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// `publishing -> failed` for the claim owner, storing diagnostics under
    /// `error` in the platform data
    pub async fn mark_failed(
        &self,
        post_id: &str,
        owner: &str,
        failure: &PublishFailure,
    ) -> Result<bool> {
        let failure_json = failure_to_json(failure)?;

        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed',
                platform_data = json_set(
                    CASE WHEN json_valid(platform_data) THEN platform_data
                         ELSE json_object('unparsed', platform_data) END,
                    '$.error', json(?1)),
                updated_at = ?2
            WHERE id = ?3 AND status = 'publishing' AND claimed_by = ?4
            "#,
        )
        .bind(failure_json)
        .bind(failure.failed_at)
        .bind(post_id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// `failed -> ready`, dropping stored diagnostics
    pub async fn reset_failed(&self, post_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'ready',
                platform_data = json_remove(platform_data, '$.error'),
                claimed_by = NULL,
                claimed_at = NULL,
                updated_at = ?
            WHERE id = ? AND status = 'failed'
            "#,
        )
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// `generating -> ready` with the final content
    pub async fn set_content_ready(&self, post_id: &str, from: PostStatus, content: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'ready', generated_content = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(content)
        .bind(now)
        .bind(post_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Change `scheduled_at` while the post is still in `expected`
    pub async fn set_scheduled_at(
        &self,
        post_id: &str,
        expected: PostStatus,
        scheduled_at: Option<i64>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE scheduled_posts SET scheduled_at = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(scheduled_at)
        .bind(now)
        .bind(post_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let status_rows =
            sqlx::query("SELECT status, COUNT(*) AS n FROM scheduled_posts GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        let mut by_status = Vec::new();
        for row in &status_rows {
            let status = parse_column::<PostStatus>(row, "status")?;
            by_status.push((status, row.get::<i64, _>("n")));
        }
        by_status.sort_by_key(|(status, _)| PostStatus::all().iter().position(|s| s == status));

        let platform_rows =
            sqlx::query("SELECT platform, COUNT(*) AS n FROM scheduled_posts GROUP BY platform")
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        let mut by_platform = Vec::new();
        for row in &platform_rows {
            let platform = parse_column::<Platform>(row, "platform")?;
            by_platform.push((platform, row.get::<i64, _>("n")));
        }
        by_platform.sort_by_key(|(platform, _)| platform.as_str());

        let next_scheduled_at: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MIN(scheduled_at) FROM scheduled_posts
            WHERE status IN ('scheduled', 'generating', 'ready') AND scheduled_at IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(QueueStats {
            by_status,
            by_platform,
            next_scheduled_at,
        })
    }

    // ---------------------------------------------------------------------
    // YouTube metadata
    // ---------------------------------------------------------------------

    pub async fn upsert_youtube_metadata(&self, post_id: &str, metadata: &YouTubeMetadata) -> Result<()> {
        let tags = serde_json::to_string(&metadata.tags).map_err(|e| DbError::CorruptRow {
            table: "youtube_metadata",
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO youtube_metadata (post_id, title, description, tags, privacy, content_type, category_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                tags = excluded.tags,
                privacy = excluded.privacy,
                content_type = excluded.content_type,
                category_id = excluded.category_id
            "#,
        )
        .bind(post_id)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(tags)
        .bind(metadata.privacy.as_str())
        .bind(metadata.content_type.as_str())
        .bind(&metadata.category_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_youtube_metadata(&self, post_id: &str) -> Result<Option<YouTubeMetadata>> {
        let row = sqlx::query(
            r#"
            SELECT title, description, tags, privacy, content_type, category_id
            FROM youtube_metadata WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags: String = row.get("tags");
        let tags = serde_json::from_str(&tags).map_err(|e| DbError::CorruptRow {
            table: "youtube_metadata",
            reason: format!("tags: {}", e),
        })?;

        let content_type = match row.get::<String, _>("content_type").as_str() {
            "shorts" => YouTubeContentType::Shorts,
            _ => YouTubeContentType::Video,
        };

        Ok(Some(YouTubeMetadata {
            title: row.get("title"),
            description: row.get("description"),
            tags,
            privacy: parse_column::<PrivacyStatus>(&row, "privacy")?,
            content_type,
            category_id: row.get("category_id"),
        }))
    }
}

fn encode_platform_data(data: &PlatformData) -> Result<String> {
    serde_json::to_string(data).map_err(|e| {
        DbError::CorruptRow {
            table: "scheduled_posts",
            reason: e.to_string(),
        }
        .into()
    })
}

fn failure_to_json(failure: &PublishFailure) -> Result<String> {
    serde_json::to_string(failure).map_err(|e| {
        DbError::CorruptRow {
            table: "scheduled_posts",
            reason: e.to_string(),
        }
        .into()
    })
}

fn parse_column<T: FromStr>(row: &SqliteRow, column: &'static str) -> Result<T> {
    let raw: String = row.get(column);
    raw.parse::<T>().map_err(|_| {
        DbError::CorruptRow {
            table: "scheduled_posts",
            reason: format!("unexpected {} '{}'", column, raw),
        }
        .into()
    })
}

fn post_from_row(row: &SqliteRow) -> Result<ScheduledPost> {
    let raw_data: String = row.get("platform_data");
    let platform_data: PlatformData =
        serde_json::from_str(&raw_data).map_err(|e| DbError::CorruptRow {
            table: "scheduled_posts",
            reason: format!("platform_data: {}", e),
        })?;

    Ok(ScheduledPost {
        id: row.get("id"),
        user_id: row.get("user_id"),
        social_account_id: row.get("social_account_id"),
        platform: parse_column(row, "platform")?,
        status: parse_column(row, "status")?,
        scheduled_at: row.get("scheduled_at"),
        generated_content: row.get("generated_content"),
        platform_data,
        platform_post_id: row.get("platform_post_id"),
        post_url: row.get("post_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        published_at: row.get("published_at"),
    })
}

fn account_from_row(row: &SqliteRow) -> Result<SocialAccount> {
    Ok(SocialAccount {
        id: row.get("id"),
        user_id: row.get("user_id"),
        platform: parse_column(row, "platform")?,
        external_account_id: row.get("external_account_id"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Unparseable stored URLs degrade to JSON null, which resolves to no media
fn media_from_row(row: &SqliteRow) -> MediaAsset {
    let raw_url: String = row.get("url");
    let url = serde_json::from_str(&raw_url).unwrap_or(serde_json::Value::Null);

    MediaAsset {
        id: row.get("id"),
        user_id: row.get("user_id"),
        storage_path: row.get("storage_path"),
        url,
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        created_at: row.get("created_at"),
    }
}
