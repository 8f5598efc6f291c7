//! Core types for Skedcast

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SkedcastError;

/// External social platform a post or account belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    YouTube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::YouTube => "youtube",
        }
    }

    pub fn all() -> [Platform; 3] {
        [Platform::Facebook, Platform::Instagram, Platform::YouTube]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SkedcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "youtube" => Ok(Platform::YouTube),
            other => Err(SkedcastError::InvalidInput(format!(
                "Unknown platform '{}'. Valid options: facebook, instagram, youtube",
                other
            ))),
        }
    }
}

/// Lifecycle state of a scheduled post
///
/// `Publishing` is the in-flight marker a dispatcher writes when it claims a
/// post; it is never visible as a stable state outside a publish attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Scheduled,
    Generating,
    Ready,
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Generating => "generating",
            PostStatus::Ready => "ready",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn all() -> [PostStatus; 6] {
        [
            PostStatus::Scheduled,
            PostStatus::Generating,
            PostStatus::Ready,
            PostStatus::Publishing,
            PostStatus::Published,
            PostStatus::Failed,
        ]
    }

    /// Legal edges of the post state machine.
    ///
    /// `Scheduled -> Publishing` exists only for due scheduled posts picked up
    /// by the dispatcher scan; the caller checks the due time.
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        use PostStatus::*;
        matches!(
            (self, next),
            (Scheduled, Generating)
                | (Scheduled, Ready)
                | (Generating, Ready)
                | (Scheduled, Publishing)
                | (Ready, Publishing)
                | (Publishing, Published)
                | (Publishing, Failed)
                | (Failed, Ready)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = SkedcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "generating" => Ok(PostStatus::Generating),
            "ready" => Ok(PostStatus::Ready),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(SkedcastError::InvalidInput(format!(
                "Unknown post status '{}'",
                other
            ))),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Platform sub-type of a post, one variant per `(platform, sub-type)` pair
///
/// Serialized with a `platform_type` discriminator so the stored attribute bag
/// reads like `{"platform_type": "instagram-reels", "share_to_feed": true}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "platform_type")]
pub enum PublishTarget {
    /// Page feed post: text only, photos, or a single video
    #[serde(rename = "facebook-page")]
    FacebookPage,

    #[serde(rename = "facebook-reels")]
    FacebookReels,

    /// One item publishes as a single container, two or more as a carousel
    #[serde(rename = "instagram-post")]
    InstagramPost,

    #[serde(rename = "instagram-carousel")]
    InstagramCarousel,

    #[serde(rename = "instagram-reels")]
    InstagramReels {
        #[serde(default = "default_true")]
        share_to_feed: bool,
    },

    #[serde(rename = "instagram-story")]
    InstagramStory,

    #[serde(rename = "youtube-video")]
    YouTubeVideo,

    #[serde(rename = "youtube-shorts")]
    YouTubeShorts,
}

impl PublishTarget {
    pub fn platform(&self) -> Platform {
        match self {
            PublishTarget::FacebookPage | PublishTarget::FacebookReels => Platform::Facebook,
            PublishTarget::InstagramPost
            | PublishTarget::InstagramCarousel
            | PublishTarget::InstagramReels { .. }
            | PublishTarget::InstagramStory => Platform::Instagram,
            PublishTarget::YouTubeVideo | PublishTarget::YouTubeShorts => Platform::YouTube,
        }
    }

    /// The `platform_type` discriminator value
    pub fn sub_type(&self) -> &'static str {
        match self {
            PublishTarget::FacebookPage => "facebook-page",
            PublishTarget::FacebookReels => "facebook-reels",
            PublishTarget::InstagramPost => "instagram-post",
            PublishTarget::InstagramCarousel => "instagram-carousel",
            PublishTarget::InstagramReels { .. } => "instagram-reels",
            PublishTarget::InstagramStory => "instagram-story",
            PublishTarget::YouTubeVideo => "youtube-video",
            PublishTarget::YouTubeShorts => "youtube-shorts",
        }
    }

    /// Default sub-type for a platform when a post does not name one
    pub fn default_for(platform: Platform) -> Self {
        match platform {
            Platform::Facebook => PublishTarget::FacebookPage,
            Platform::Instagram => PublishTarget::InstagramPost,
            Platform::YouTube => PublishTarget::YouTubeVideo,
        }
    }
}

/// Diagnostics recorded when a publish attempt ends in `failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishFailure {
    /// Human-readable error, including the platform's error text
    pub message: String,
    /// Raw remote payload, when the platform answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_response: Option<String>,
    pub failed_at: i64,
}

/// Persisted form of `platform_specific_data`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformData {
    #[serde(flatten)]
    pub target: PublishTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PublishFailure>,
}

impl PlatformData {
    pub fn new(target: PublishTarget) -> Self {
        Self {
            target,
            error: None,
        }
    }
}

/// The unit of publishing work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub user_id: String,
    pub social_account_id: String,
    pub platform: Platform,
    pub status: PostStatus,
    /// `None` means publish as soon as the post is ready
    pub scheduled_at: Option<i64>,
    pub generated_content: String,
    pub platform_data: PlatformData,
    /// Set only when `status == Published`
    pub platform_post_id: Option<String>,
    /// Set only when `status == Published`
    pub post_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub published_at: Option<i64>,
}

impl ScheduledPost {
    /// Create a new post in the `ready` state with the platform's default sub-type
    pub fn new(
        user_id: String,
        social_account_id: String,
        platform: Platform,
        generated_content: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            social_account_id,
            platform,
            status: PostStatus::Ready,
            scheduled_at: None,
            generated_content,
            platform_data: PlatformData::new(PublishTarget::default_for(platform)),
            platform_post_id: None,
            post_url: None,
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    pub fn with_target(mut self, target: PublishTarget) -> Self {
        self.platform_data.target = target;
        self
    }

    pub fn scheduled_for(mut self, at: i64) -> Self {
        self.scheduled_at = Some(at);
        self.status = PostStatus::Scheduled;
        self
    }

    /// Whether the dispatcher may pick this post up at `now`
    pub fn is_due(&self, now: i64) -> bool {
        let time_reached = self.scheduled_at.map_or(true, |at| at <= now);
        match self.status {
            PostStatus::Ready => time_reached,
            PostStatus::Scheduled => self.scheduled_at.is_some() && time_reached,
            _ => false,
        }
    }

    pub fn failure(&self) -> Option<&PublishFailure> {
        self.platform_data.error.as_ref()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    #[default]
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }
}

impl FromStr for PrivacyStatus {
    type Err = SkedcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(PrivacyStatus::Public),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "private" => Ok(PrivacyStatus::Private),
            other => Err(SkedcastError::InvalidInput(format!(
                "Unknown privacy status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum YouTubeContentType {
    #[default]
    Video,
    Shorts,
}

impl YouTubeContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            YouTubeContentType::Video => "video",
            YouTubeContentType::Shorts => "shorts",
        }
    }
}

/// Upload metadata owned by a YouTube post (zero or one per post)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct YouTubeMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub privacy: PrivacyStatus,
    pub content_type: YouTubeContentType,
    pub category_id: Option<String>,
}

/// An uploaded media file that posts may reference
///
/// `url` is the raw stored value: a single URL string, an ordered list of URLs,
/// or a tombstone object once the asset was deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub user_id: String,
    pub storage_path: String,
    pub url: serde_json::Value,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: i64,
}

impl MediaAsset {
    pub fn new(user_id: String, storage_path: String, url: serde_json::Value, mime_type: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            storage_path,
            url,
            mime_type,
            size_bytes: 0,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// The marker stored in place of the URL on deletion
    pub fn tombstone(deleted_at: i64) -> serde_json::Value {
        serde_json::json!({ "deleted": true, "deleted_at": deleted_at })
    }
}

/// Per-user, per-platform external identity
///
/// Tokens are sealed strings produced by the vault cipher, never plaintext.
#[derive(Debug, Clone)]
pub struct SocialAccount {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A resolved, classified media URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: String,
}

impl MediaItem {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            url: url.into(),
        }
    }
}

/// Confirmed external identity of a published post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub external_id: String,
    pub url: String,
}
