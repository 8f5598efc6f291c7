//! YouTube resumable uploads (Data API v3)
//!
//! The source video is downloaded, a resumable session is opened with the
//! snippet/status metadata, and the bytes are sent in `Content-Range` chunks.
//! `308 Resume Incomplete` continues; the final `200`/`201` carries the video
//! resource and is the only completion signal.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;

use super::{ensure_platform, invalid, PlatformAdapter, PublishContent};
use crate::config::YouTubeConfig;
use crate::error::{PlatformError, Result};
use crate::http::{HttpRequest, HttpTransport};
use crate::types::{
    MediaItem, MediaKind, Platform, PrivacyStatus, PublishOutcome, PublishTarget, YouTubeContentType,
};

pub const MAX_TITLE_CHARS: usize = 100;
const SHORTS_TAG: &str = "#Shorts";

/// Upload metadata after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: PrivacyStatus,
    pub category_id: String,
    pub shorts: bool,
}

impl ResolvedMetadata {
    /// Fill gaps from the caption: title from its first line, description from all of it
    pub fn resolve(content: &PublishContent<'_>, default_category: &str) -> Self {
        let metadata = content.youtube.cloned().unwrap_or_default();
        let shorts = *content.target == PublishTarget::YouTubeShorts
            || metadata.content_type == YouTubeContentType::Shorts;

        let base_title = metadata
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                content
                    .caption
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .unwrap_or("Untitled")
                    .to_string()
            });

        let title = if shorts && !base_title.to_lowercase().contains("#shorts") {
            let room = MAX_TITLE_CHARS - SHORTS_TAG.len() - 1;
            format!("{} {}", truncate_chars(base_title.trim(), room), SHORTS_TAG)
        } else {
            truncate_chars(base_title.trim(), MAX_TITLE_CHARS)
        };

        let description = metadata
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| content.caption.to_string());

        Self {
            title,
            description,
            tags: metadata.tags,
            privacy: metadata.privacy,
            category_id: metadata
                .category_id
                .unwrap_or_else(|| default_category.to_string()),
            shorts,
        }
    }

    fn resource(&self) -> serde_json::Value {
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            }
        })
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub struct YouTubeAdapter {
    transport: Arc<dyn HttpTransport>,
    upload_base_url: String,
    chunk_size: usize,
    default_category_id: String,
}

impl YouTubeAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &YouTubeConfig) -> Self {
        Self {
            transport,
            upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
            chunk_size: config.chunk_size_bytes,
            default_category_id: config.default_category_id.clone(),
        }
    }

    fn video<'a>(content: &PublishContent<'a>) -> Result<&'a MediaItem> {
        match content.media {
            [item] if item.kind == MediaKind::Video => Ok(item),
            [] => Err(invalid("YouTube upload needs a video")),
            _ => Err(invalid("YouTube upload takes exactly one video")),
        }
    }

    async fn open_session(
        &self,
        token: &str,
        metadata: &ResolvedMetadata,
        content_type: &str,
        length: usize,
    ) -> Result<String> {
        let request = HttpRequest::post(format!("{}/videos", self.upload_base_url))
            .bearer(token)
            .query("uploadType", "resumable")
            .query("part", "snippet,status")
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", length.to_string())
            .json(metadata.resource());

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("YouTube upload session")?;

        response
            .header("location")
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Posting(format!(
                    "YouTube upload session has no Location header: {}",
                    response.text()
                ))
                .into()
            })
    }

    async fn upload_chunks(
        &self,
        token: &str,
        session_url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let total = bytes.len();
        let mut offset = 0;

        while offset < total {
            let end = (offset + self.chunk_size).min(total);
            tracing::debug!(offset, end, total, "Uploading YouTube chunk");

            let request = HttpRequest::put(session_url)
                .bearer(token)
                .header("Content-Range", format!("bytes {}-{}/{}", offset, end - 1, total))
                .bytes(content_type, bytes[offset..end].to_vec());

            let response = self.transport.send(request).await?;
            match response.status {
                200 | 201 => return Ok(response.id_field("id", "YouTube upload")?),
                308 => {
                    // Range: bytes=0-N acknowledges everything through N
                    let next = response
                        .header("range")
                        .and_then(|r| r.rsplit('-').next())
                        .and_then(|n| n.trim().parse::<usize>().ok())
                        .map(|last| last + 1)
                        .unwrap_or(end);
                    if next <= offset {
                        return Err(PlatformError::Posting(format!(
                            "YouTube upload stalled at byte {} of {}",
                            offset, total
                        ))
                        .into());
                    }
                    offset = next;
                }
                _ => return Err(response.into_api_error("YouTube upload").into()),
            }
        }

        Err(PlatformError::Posting(
            "YouTube upload sent every byte without a completion response".to_string(),
        )
        .into())
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn validate(&self, content: &PublishContent<'_>) -> Result<()> {
        ensure_platform(Platform::YouTube, content.target)?;
        Self::video(content)?;

        if let Some(title) = content.youtube.and_then(|m| m.title.as_ref()) {
            if title.chars().count() > MAX_TITLE_CHARS {
                return Err(invalid(format!(
                    "YouTube titles are limited to {} characters",
                    MAX_TITLE_CHARS
                )));
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        token: &SecretString,
        account: &str,
        content: &PublishContent<'_>,
    ) -> Result<PublishOutcome> {
        self.validate(content)?;
        let video = Self::video(content)?;
        let token = token.expose_secret();
        let metadata = ResolvedMetadata::resolve(content, &self.default_category_id);

        let source = self
            .transport
            .send(HttpRequest::get(&video.url))
            .await?
            .ensure_success("YouTube source video download")?;
        let content_type = source
            .header("content-type")
            .filter(|ct| ct.starts_with("video/"))
            .unwrap_or("video/*")
            .to_string();
        if source.body.is_empty() {
            return Err(PlatformError::Posting(format!(
                "YouTube source video download: {} returned no data",
                video.url
            ))
            .into());
        }

        tracing::info!(channel = %account, bytes = source.body.len(), shorts = metadata.shorts, "Starting YouTube upload");

        let session_url = self
            .open_session(token, &metadata, &content_type, source.body.len())
            .await?;
        let video_id = self
            .upload_chunks(token, &session_url, &content_type, &source.body)
            .await?;

        let url = if metadata.shorts {
            format!("https://www.youtube.com/shorts/{}", video_id)
        } else {
            format!("https://www.youtube.com/watch?v={}", video_id)
        };

        Ok(PublishOutcome {
            external_id: video_id,
            url,
        })
    }
}
