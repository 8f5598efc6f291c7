//! Instagram publishing through media containers
//!
//! Every post type is "create container, poll until ready, publish". Carousels
//! first create one child container per item concurrently, poll all children,
//! then wrap them in a parent container that goes through the same
//! poll-then-publish step. Polling is bounded by `poll_attempts`.
//!
//! A publish call that fails after the container became ready is checked once
//! more: a container reporting `PUBLISHED` counts as success, so an operator
//! retry never posts twice.

use async_trait::async_trait;
use futures::future::try_join_all;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use super::{ensure_platform, invalid, PlatformAdapter, PublishContent};
use crate::config::{InstagramConfig, MetaConfig};
use crate::error::{PlatformError, Result};
use crate::http::{HttpRequest, HttpTransport};
use crate::types::{MediaItem, MediaKind, Platform, PublishOutcome, PublishTarget};

/// Fallback when the published media's permalink cannot be looked up
pub const PROFILE_FALLBACK_URL: &str = "https://www.instagram.com/";

/// Remote container state as reported by `status_code`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Published,
    Error,
    Expired,
    Unknown(String),
}

impl ContainerStatus {
    fn parse(code: &str) -> Self {
        match code {
            "IN_PROGRESS" => ContainerStatus::InProgress,
            "FINISHED" => ContainerStatus::Finished,
            "PUBLISHED" => ContainerStatus::Published,
            "ERROR" => ContainerStatus::Error,
            "EXPIRED" => ContainerStatus::Expired,
            other => ContainerStatus::Unknown(other.to_string()),
        }
    }
}

/// Container layout chosen for a post
#[derive(Debug)]
enum Plan<'a> {
    Single {
        item: &'a MediaItem,
        media_type: Option<&'static str>,
        share_to_feed: Option<bool>,
    },
    Carousel(&'a [MediaItem]),
}

pub struct InstagramAdapter {
    transport: Arc<dyn HttpTransport>,
    graph_url: String,
    poll_attempts: u32,
    poll_interval: Duration,
    max_carousel_items: usize,
}

impl InstagramAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, meta: &MetaConfig, config: &InstagramConfig) -> Self {
        Self {
            transport,
            graph_url: meta.graph_url(),
            poll_attempts: config.poll_attempts,
            poll_interval: config.poll_interval(),
            max_carousel_items: config.max_carousel_items,
        }
    }

    fn plan<'a>(&self, content: &PublishContent<'a>) -> Result<Plan<'a>> {
        let media = content.media;
        if media.is_empty() {
            return Err(invalid(format!(
                "{} requires media",
                content.target.sub_type()
            )));
        }

        match content.target {
            PublishTarget::InstagramPost => match media {
                [item] => Ok(Plan::Single {
                    item,
                    media_type: (item.kind == MediaKind::Video).then_some("REELS"),
                    share_to_feed: (item.kind == MediaKind::Video).then_some(true),
                }),
                _ => self.carousel(media),
            },
            PublishTarget::InstagramCarousel => {
                if media.len() < 2 {
                    return Err(invalid("Instagram carousel needs at least 2 items"));
                }
                self.carousel(media)
            }
            PublishTarget::InstagramReels { share_to_feed } => match media {
                [item] if item.kind == MediaKind::Video => Ok(Plan::Single {
                    item,
                    media_type: Some("REELS"),
                    share_to_feed: Some(*share_to_feed),
                }),
                _ => Err(invalid("Instagram reels need exactly one video")),
            },
            PublishTarget::InstagramStory => match media {
                [item] => Ok(Plan::Single {
                    item,
                    media_type: Some("STORIES"),
                    share_to_feed: None,
                }),
                _ => Err(invalid("Instagram stories take exactly one item")),
            },
            other => Err(invalid(format!(
                "Sub-type {} cannot be published to instagram",
                other.sub_type()
            ))),
        }
    }

    fn carousel<'a>(&self, media: &'a [MediaItem]) -> Result<Plan<'a>> {
        if media.len() > self.max_carousel_items {
            return Err(invalid(format!(
                "Instagram carousel takes at most {} items, got {}",
                self.max_carousel_items,
                media.len()
            )));
        }
        Ok(Plan::Carousel(media))
    }

    async fn create_container(
        &self,
        token: &str,
        account: &str,
        fields: Vec<(String, String)>,
        context: &str,
    ) -> Result<String> {
        let request = HttpRequest::post(format!("{}/{}/media", self.graph_url, account))
            .bearer(token)
            .form(fields);

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success(context)?;
        Ok(response.id_field("id", context)?)
    }

    fn media_fields(item: &MediaItem) -> Vec<(String, String)> {
        match item.kind {
            MediaKind::Image => vec![("image_url".to_string(), item.url.clone())],
            MediaKind::Video => vec![("video_url".to_string(), item.url.clone())],
        }
    }

    async fn create_child(&self, token: &str, account: &str, item: &MediaItem) -> Result<String> {
        let mut fields = vec![("is_carousel_item".to_string(), "true".to_string())];
        if item.kind == MediaKind::Video {
            fields.push(("media_type".to_string(), "VIDEO".to_string()));
        }
        fields.extend(Self::media_fields(item));

        self.create_container(token, account, fields, "Instagram carousel item")
            .await
    }

    async fn fetch_status(&self, token: &str, container_id: &str) -> Result<(ContainerStatus, u16, String)> {
        let request = HttpRequest::get(format!("{}/{}", self.graph_url, container_id))
            .bearer(token)
            .query("fields", "status_code");

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("Instagram container status")?;

        let body: serde_json::Value = response.json().unwrap_or_default();
        let code = body
            .get("status_code")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok((ContainerStatus::parse(code), response.status, response.text()))
    }

    /// Poll a container until it can be published
    ///
    /// Failed status requests consume an attempt like any other; the loop
    /// never runs more than `poll_attempts` times.
    pub async fn wait_until_ready(&self, token: &str, container_id: &str) -> Result<()> {
        for attempt in 1..=self.poll_attempts {
            match self.fetch_status(token, container_id).await {
                Ok((ContainerStatus::Finished | ContainerStatus::Published, _, _)) => {
                    tracing::debug!(container_id, attempt, "Container ready");
                    return Ok(());
                }
                Ok((ContainerStatus::Error | ContainerStatus::Expired, status, body)) => {
                    return Err(PlatformError::Api {
                        context: format!("Instagram container {}", container_id),
                        status,
                        body,
                    }
                    .into());
                }
                Ok((state, _, _)) => {
                    tracing::debug!(container_id, attempt, ?state, "Container not ready");
                }
                Err(e) => {
                    tracing::debug!(container_id, attempt, error = %e, "Container status check failed");
                }
            }

            if attempt < self.poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(PlatformError::Timeout(format!(
            "Instagram container {} not ready after {} attempts",
            container_id, self.poll_attempts
        ))
        .into())
    }

    async fn call_media_publish(&self, token: &str, account: &str, container_id: &str) -> Result<String> {
        let request = HttpRequest::post(format!("{}/{}/media_publish", self.graph_url, account))
            .bearer(token)
            .form([("creation_id", container_id)]);

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("Instagram media publish")?;
        Ok(response.id_field("id", "Instagram media publish")?)
    }

    /// Publish a ready container; returns the media id when the call answered
    async fn publish_container(&self, token: &str, account: &str, container_id: &str) -> Result<Option<String>> {
        let attempt = self.call_media_publish(token, account, container_id).await;

        match attempt {
            Ok(media_id) => Ok(Some(media_id)),
            Err(publish_error) => {
                tracing::warn!(
                    container_id,
                    error = %publish_error,
                    "Publish call failed, re-checking container"
                );
                match self.fetch_status(token, container_id).await {
                    Ok((ContainerStatus::Published, _, _)) => {
                        tracing::info!(container_id, "Container was published despite the failed call");
                        Ok(None)
                    }
                    _ => Err(publish_error),
                }
            }
        }
    }

    async fn permalink(&self, token: &str, media_id: &str) -> Option<String> {
        let request = HttpRequest::get(format!("{}/{}", self.graph_url, media_id))
            .bearer(token)
            .query("fields", "permalink");

        let response = self.transport.send(request).await.ok()?;
        if !response.is_success() {
            return None;
        }
        let body: serde_json::Value = response.json().ok()?;
        body.get("permalink")?.as_str().map(str::to_string)
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn validate(&self, content: &PublishContent<'_>) -> Result<()> {
        ensure_platform(Platform::Instagram, content.target)?;
        self.plan(content).map(|_| ())
    }

    async fn publish(
        &self,
        token: &SecretString,
        account: &str,
        content: &PublishContent<'_>,
    ) -> Result<PublishOutcome> {
        ensure_platform(Platform::Instagram, content.target)?;
        let plan = self.plan(content)?;
        let token = token.expose_secret();
        let caption = content.caption.to_string();

        let container_id = match plan {
            Plan::Single {
                item,
                media_type,
                share_to_feed,
            } => {
                let mut fields = Self::media_fields(item);
                if let Some(media_type) = media_type {
                    fields.push(("media_type".to_string(), media_type.to_string()));
                }
                if let Some(share) = share_to_feed {
                    fields.push(("share_to_feed".to_string(), share.to_string()));
                }
                if media_type != Some("STORIES") {
                    fields.push(("caption".to_string(), caption));
                }

                let id = self
                    .create_container(token, account, fields, "Instagram container create")
                    .await?;
                tracing::info!(container_id = %id, "Created Instagram container");
                self.wait_until_ready(token, &id).await?;
                id
            }
            Plan::Carousel(items) => {
                let children =
                    try_join_all(items.iter().map(|item| self.create_child(token, account, item))).await?;
                tracing::info!(children = children.len(), "Created Instagram carousel items");

                try_join_all(children.iter().map(|child| self.wait_until_ready(token, child))).await?;

                let fields = vec![
                    ("media_type".to_string(), "CAROUSEL".to_string()),
                    ("children".to_string(), children.join(",")),
                    ("caption".to_string(), caption),
                ];
                let id = self
                    .create_container(token, account, fields, "Instagram carousel create")
                    .await?;
                tracing::info!(container_id = %id, "Created Instagram carousel container");
                self.wait_until_ready(token, &id).await?;
                id
            }
        };

        let media_id = self.publish_container(token, account, &container_id).await?;

        let url = match media_id {
            Some(media_id) => self.permalink(token, &media_id).await,
            None => None,
        }
        .unwrap_or_else(|| PROFILE_FALLBACK_URL.to_string());

        Ok(PublishOutcome {
            external_id: container_id,
            url,
        })
    }
}
