//! Facebook Page publishing over the Graph API
//!
//! - text only: one `POST /{page}/feed`
//! - photos: parallel unpublished `POST /{page}/photos`, then one feed post
//!   attaching every uploaded photo id
//! - video: `POST /{page}/videos` with `file_url`; when the platform rejects
//!   that, a start/transfer/finish resumable upload of the downloaded bytes
//! - reels: `video_reels` start, hosted upload by URL (binary upload as
//!   fallback), then finish with `video_state=PUBLISHED`

use async_trait::async_trait;
use futures::future::try_join_all;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::{ensure_platform, invalid, PlatformAdapter, PublishContent};
use crate::config::MetaConfig;
use crate::error::{PlatformError, Result, SkedcastError};
use crate::http::{HttpRequest, HttpTransport, MultipartFile};
use crate::types::{MediaItem, MediaKind, Platform, PublishOutcome, PublishTarget};

/// Bytes per `transfer` request in the resumable fallback
const TRANSFER_CHUNK_BYTES: usize = 4 * 1024 * 1024;

pub struct FacebookAdapter {
    transport: Arc<dyn HttpTransport>,
    graph_url: String,
    rupload_url: String,
}

/// Shape of a Facebook page post after validation
enum PagePost<'a> {
    Text,
    Photos(Vec<&'a MediaItem>),
    Video(&'a MediaItem),
}

impl FacebookAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &MetaConfig) -> Self {
        Self {
            transport,
            graph_url: config.graph_url(),
            rupload_url: config.rupload_url(),
        }
    }

    fn page_post<'a>(content: &PublishContent<'a>) -> Result<PagePost<'a>> {
        let (images, videos) = (content.images(), content.videos());

        match (images, videos) {
            (0, 0) if content.caption.trim().is_empty() => {
                Err(invalid("Facebook post needs text or media"))
            }
            (0, 0) => Ok(PagePost::Text),
            (_, 0) => Ok(PagePost::Photos(content.media.iter().collect())),
            (0, 1) => Ok(PagePost::Video(&content.media[0])),
            (0, _) => Err(invalid("Facebook page posts support a single video")),
            _ => Err(invalid("Facebook page posts cannot mix photos and videos")),
        }
    }

    fn single_video<'a>(content: &PublishContent<'a>) -> Result<&'a MediaItem> {
        match content.media {
            [item] if item.kind == MediaKind::Video => Ok(item),
            _ => Err(invalid("Facebook reels need exactly one video")),
        }
    }

    async fn post_feed(
        &self,
        token: &str,
        page: &str,
        fields: Vec<(String, String)>,
    ) -> Result<String> {
        let request = HttpRequest::post(format!("{}/{}/feed", self.graph_url, page))
            .bearer(token)
            .form(fields);

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("Facebook feed post")?;
        Ok(response.id_field("id", "Facebook feed post")?)
    }

    async fn upload_unpublished_photo(&self, token: &str, page: &str, url: &str) -> Result<String> {
        let request = HttpRequest::post(format!("{}/{}/photos", self.graph_url, page))
            .bearer(token)
            .form([("url", url), ("published", "false")]);

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("Facebook photo upload")?;
        Ok(response.id_field("id", "Facebook photo upload")?)
    }

    async fn publish_photos(
        &self,
        token: &str,
        page: &str,
        caption: &str,
        photos: &[&MediaItem],
    ) -> Result<String> {
        tracing::debug!(count = photos.len(), "Uploading unpublished photos");

        let uploads = photos
            .iter()
            .map(|photo| self.upload_unpublished_photo(token, page, &photo.url));
        let photo_ids = try_join_all(uploads).await?;

        let mut fields = vec![("message".to_string(), caption.to_string())];
        for (index, id) in photo_ids.iter().enumerate() {
            fields.push((
                format!("attached_media[{}]", index),
                serde_json::json!({ "media_fbid": id }).to_string(),
            ));
        }

        self.post_feed(token, page, fields).await
    }

    async fn publish_video(&self, token: &str, page: &str, caption: &str, video: &MediaItem) -> Result<String> {
        let request = HttpRequest::post(format!("{}/{}/videos", self.graph_url, page))
            .bearer(token)
            .form([("file_url", video.url.as_str()), ("description", caption)]);

        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response.id_field("id", "Facebook video upload")?);
        }

        let rejected = response.text();
        tracing::info!(
            status = response.status,
            "Facebook rejected hosted video URL, falling back to resumable upload"
        );
        tracing::debug!(body = %rejected, "Hosted video URL rejection");
        self.resumable_video_upload(token, page, caption, video)
            .await
            .map_err(|e| note_rejected_fast_path(e, response.status, &rejected))
    }

    async fn resumable_video_upload(
        &self,
        token: &str,
        page: &str,
        caption: &str,
        video: &MediaItem,
    ) -> Result<String> {
        let bytes = download(self.transport.as_ref(), &video.url, "Facebook source video download").await?;
        let endpoint = format!("{}/{}/videos", self.graph_url, page);

        let start = self
            .transport
            .send(
                HttpRequest::post(&endpoint)
                    .bearer(token)
                    .form([
                        ("upload_phase", "start".to_string()),
                        ("file_size", bytes.len().to_string()),
                    ]),
            )
            .await?
            .ensure_success("Facebook video upload start")?;

        let session: serde_json::Value = start
            .json()
            .map_err(|e| PlatformError::Posting(format!("unparseable upload session: {}", e)))?;
        let session_id = json_str(&session, "upload_session_id")
            .ok_or_else(|| PlatformError::Posting(format!("no upload_session_id: {}", start.text())))?;
        let video_id = json_str(&session, "video_id")
            .ok_or_else(|| PlatformError::Posting(format!("no video_id: {}", start.text())))?;

        let mut start_offset = json_offset(&session, "start_offset").unwrap_or(0);
        let mut end_offset = json_offset(&session, "end_offset").unwrap_or(bytes.len());

        while start_offset < end_offset && start_offset < bytes.len() {
            let end = end_offset.min(bytes.len()).min(start_offset + TRANSFER_CHUNK_BYTES);
            tracing::debug!(start_offset, end, "Transferring video chunk");

            let chunk = MultipartFile {
                field: "video_file_chunk".to_string(),
                file_name: "chunk".to_string(),
                content_type: "application/octet-stream".to_string(),
                data: bytes[start_offset..end].to_vec(),
            };
            let response = self
                .transport
                .send(HttpRequest::post(&endpoint).bearer(token).multipart(
                    vec![
                        ("upload_phase".to_string(), "transfer".to_string()),
                        ("upload_session_id".to_string(), session_id.clone()),
                        ("start_offset".to_string(), start_offset.to_string()),
                    ],
                    Some(chunk),
                ))
                .await?
                .ensure_success("Facebook video upload transfer")?;

            let offsets: serde_json::Value = response
                .json()
                .map_err(|e| PlatformError::Posting(format!("unparseable transfer response: {}", e)))?;
            let next_start = json_offset(&offsets, "start_offset").unwrap_or(end);
            if next_start <= start_offset {
                return Err(PlatformError::Posting(format!(
                    "Facebook video upload made no progress: {}",
                    response.text()
                ))
                .into());
            }
            start_offset = next_start;
            end_offset = json_offset(&offsets, "end_offset").unwrap_or(bytes.len());
        }

        self.transport
            .send(
                HttpRequest::post(&endpoint)
                    .bearer(token)
                    .form([
                        ("upload_phase", "finish"),
                        ("upload_session_id", session_id.as_str()),
                        ("description", caption),
                    ]),
            )
            .await?
            .ensure_success("Facebook video upload finish")?;

        Ok(video_id)
    }

    async fn publish_reel(&self, token: &str, page: &str, caption: &str, video: &MediaItem) -> Result<String> {
        let endpoint = format!("{}/{}/video_reels", self.graph_url, page);

        let start = self
            .transport
            .send(
                HttpRequest::post(&endpoint)
                    .bearer(token)
                    .form([("upload_phase", "start")]),
            )
            .await?
            .ensure_success("Facebook reel start")?;
        let video_id = start.id_field("video_id", "Facebook reel start")?;

        let upload_url = format!("{}/{}", self.rupload_url, video_id);
        let hosted = self
            .transport
            .send(
                HttpRequest::post(&upload_url)
                    .header("Authorization", format!("OAuth {}", token))
                    .header("file_url", video.url.as_str()),
            )
            .await?;

        if !hosted.is_success() {
            let rejected = hosted.text();
            tracing::info!(
                status = hosted.status,
                "Hosted reel upload rejected, uploading bytes"
            );
            tracing::debug!(body = %rejected, "Hosted reel upload rejection");
            self.upload_reel_bytes(token, &upload_url, video)
                .await
                .map_err(|e| note_rejected_fast_path(e, hosted.status, &rejected))?;
        }

        let finish = self
            .transport
            .send(
                HttpRequest::post(&endpoint)
                    .bearer(token)
                    .form([
                        ("upload_phase", "finish"),
                        ("video_id", video_id.as_str()),
                        ("video_state", "PUBLISHED"),
                        ("description", caption),
                    ]),
            )
            .await?
            .ensure_success("Facebook reel finish")?;

        let body: serde_json::Value = finish.json().unwrap_or_default();
        if body.get("success").and_then(|v| v.as_bool()) == Some(false) {
            return Err(PlatformError::Api {
                context: "Facebook reel finish".to_string(),
                status: finish.status,
                body: finish.text(),
            }
            .into());
        }

        Ok(video_id)
    }

    async fn upload_reel_bytes(&self, token: &str, upload_url: &str, video: &MediaItem) -> Result<()> {
        let bytes = download(self.transport.as_ref(), &video.url, "Facebook source video download").await?;
        let size = bytes.len().to_string();
        self.transport
            .send(
                HttpRequest::post(upload_url)
                    .header("Authorization", format!("OAuth {}", token))
                    .header("offset", "0")
                    .header("file_size", size)
                    .bytes("application/octet-stream", bytes),
            )
            .await?
            .ensure_success("Facebook reel upload")?;
        Ok(())
    }
}

/// Mention the rejected hosted-URL attempt in a failed fallback's context
///
/// The failing call's own body stays in `body`, so `platform_response()` is unchanged.
fn note_rejected_fast_path(error: SkedcastError, status: u16, rejected: &str) -> SkedcastError {
    match error {
        SkedcastError::Platform(PlatformError::Api {
            context,
            status: fallback_status,
            body,
        }) => PlatformError::Api {
            context: format!(
                "{} (after hosted file_url upload was rejected with HTTP {}: {})",
                context, status, rejected
            ),
            status: fallback_status,
            body,
        }
        .into(),
        other => other,
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn validate(&self, content: &PublishContent<'_>) -> Result<()> {
        ensure_platform(Platform::Facebook, content.target)?;
        match content.target {
            PublishTarget::FacebookReels => Self::single_video(content).map(|_| ()),
            _ => Self::page_post(content).map(|_| ()),
        }
    }

    async fn publish(
        &self,
        token: &SecretString,
        account: &str,
        content: &PublishContent<'_>,
    ) -> Result<PublishOutcome> {
        self.validate(content)?;
        let token = token.expose_secret();

        if *content.target == PublishTarget::FacebookReels {
            let video = Self::single_video(content)?;
            tracing::info!(page = %account, "Publishing Facebook reel");
            let id = self.publish_reel(token, account, content.caption, video).await?;
            return Ok(PublishOutcome {
                url: format!("https://www.facebook.com/reel/{}", id),
                external_id: id,
            });
        }

        let id = match Self::page_post(content)? {
            PagePost::Text => {
                tracing::info!(page = %account, "Publishing Facebook text post");
                self.post_feed(
                    token,
                    account,
                    vec![("message".to_string(), content.caption.to_string())],
                )
                .await?
            }
            PagePost::Photos(photos) => {
                tracing::info!(page = %account, photos = photos.len(), "Publishing Facebook photo post");
                self.publish_photos(token, account, content.caption, &photos).await?
            }
            PagePost::Video(video) => {
                tracing::info!(page = %account, "Publishing Facebook video");
                self.publish_video(token, account, content.caption, video).await?
            }
        };

        Ok(PublishOutcome {
            url: format!("https://www.facebook.com/{}", id),
            external_id: id,
        })
    }
}

/// Fetch a media URL's bytes; a failure keeps the host's answer verbatim
pub(crate) async fn download(transport: &dyn HttpTransport, url: &str, context: &str) -> Result<Vec<u8>> {
    let response = transport
        .send(HttpRequest::get(url))
        .await?
        .ensure_success(context)?;

    if response.body.is_empty() {
        return Err(PlatformError::Posting(format!("{}: {} returned no data", context, url)).into());
    }
    Ok(response.body)
}

fn json_str(value: &serde_json::Value, field: &str) -> Option<String> {
    match value.get(field)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Graph returns offsets as decimal strings
fn json_offset(value: &serde_json::Value, field: &str) -> Option<usize> {
    json_str(value, field)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockReply, MockTransport};
    use crate::http::Method;
    use serde_json::json;

    fn adapter(mock: &Arc<MockTransport>) -> FacebookAdapter {
        FacebookAdapter::new(mock.clone(), &MetaConfig::default())
    }

    fn content<'a>(caption: &'a str, media: &'a [MediaItem], target: &'a PublishTarget) -> PublishContent<'a> {
        PublishContent {
            caption,
            media,
            target,
            youtube: None,
        }
    }

    fn token() -> SecretString {
        SecretString::from("page-token".to_string())
    }

    #[tokio::test]
    async fn test_text_post_is_single_feed_call() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(Method::Post, "/page-1/feed", MockReply::json(200, json!({"id": "page-1_99"})));

        let target = PublishTarget::FacebookPage;
        let outcome = adapter(&mock)
            .publish(&token(), "page-1", &content("Hello", &[], &target))
            .await
            .unwrap();

        assert_eq!(outcome.external_id, "page-1_99");
        assert_eq!(outcome.url, "https://www.facebook.com/page-1_99");
        assert_eq!(mock.request_count(), 1);

        let request = &mock.requests()[0];
        assert_eq!(request.form_value("message"), Some("Hello"));
        assert_eq!(request.header_value("authorization"), Some("Bearer page-token"));
    }

    #[tokio::test]
    async fn test_photos_upload_then_attach() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_when(
            Method::Post,
            "/page-1/photos",
            |r| r.form_value("url") == Some("https://cdn/1.jpg"),
            MockReply::json(200, json!({"id": "ph1"})),
        )
        .respond_when(
            Method::Post,
            "/page-1/photos",
            |r| r.form_value("url") == Some("https://cdn/2.jpg"),
            MockReply::json(200, json!({"id": "ph2"})),
        )
        .respond(Method::Post, "/page-1/feed", MockReply::json(200, json!({"id": "page-1_5"})));

        let media = [MediaItem::image("https://cdn/1.jpg"), MediaItem::image("https://cdn/2.jpg")];
        let target = PublishTarget::FacebookPage;
        let outcome = adapter(&mock)
            .publish(&token(), "page-1", &content("Two pics", &media, &target))
            .await
            .unwrap();
        assert_eq!(outcome.external_id, "page-1_5");

        for photo in mock.requests_to(Method::Post, "/page-1/photos") {
            assert_eq!(photo.form_value("published"), Some("false"));
        }
        let feed = &mock.requests_to(Method::Post, "/page-1/feed")[0];
        assert_eq!(feed.form_value("attached_media[0]"), Some(r#"{"media_fbid":"ph1"}"#));
        assert_eq!(feed.form_value("attached_media[1]"), Some(r#"{"media_fbid":"ph2"}"#));
    }

    #[tokio::test]
    async fn test_photo_failure_skips_feed_call() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            Method::Post,
            "/page-1/photos",
            MockReply::json(400, json!({"error": {"message": "bad image"}})),
        );

        let media = [MediaItem::image("https://cdn/1.jpg")];
        let target = PublishTarget::FacebookPage;
        let err = adapter(&mock)
            .publish(&token(), "page-1", &content("x", &media, &target))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("bad image"));
        assert_eq!(mock.calls(Method::Post, "/page-1/feed"), 0);
    }

    #[tokio::test]
    async fn test_video_fast_path() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(Method::Post, "/page-1/videos", MockReply::json(200, json!({"id": "vid-1"})));

        let media = [MediaItem::video("https://cdn/v.mp4")];
        let target = PublishTarget::FacebookPage;
        let outcome = adapter(&mock)
            .publish(&token(), "page-1", &content("clip", &media, &target))
            .await
            .unwrap();

        assert_eq!(outcome.external_id, "vid-1");
        let request = &mock.requests()[0];
        assert_eq!(request.form_value("file_url"), Some("https://cdn/v.mp4"));
    }

    #[tokio::test]
    async fn test_video_falls_back_to_resumable_upload() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_when(
            Method::Post,
            "/page-1/videos",
            |r| r.form_value("file_url").is_some(),
            MockReply::json(400, json!({"error": {"message": "url not reachable"}})),
        )
        .respond_when(
            Method::Post,
            "/page-1/videos",
            |r| r.form_value("upload_phase") == Some("start"),
            MockReply::json(
                200,
                json!({"upload_session_id": "sess-1", "video_id": "vid-2", "start_offset": "0", "end_offset": "5"}),
            ),
        )
        .respond_when(
            Method::Post,
            "/page-1/videos",
            |r| r.form_value("upload_phase") == Some("transfer"),
            MockReply::json(200, json!({"start_offset": "5", "end_offset": "5"})),
        )
        .respond_when(
            Method::Post,
            "/page-1/videos",
            |r| r.form_value("upload_phase") == Some("finish"),
            MockReply::json(200, json!({"success": true})),
        )
        .respond(Method::Get, "/v.mp4", MockReply::bytes(200, b"video".to_vec()));

        let media = [MediaItem::video("https://cdn/v.mp4")];
        let target = PublishTarget::FacebookPage;
        let outcome = adapter(&mock)
            .publish(&token(), "page-1", &content("clip", &media, &target))
            .await
            .unwrap();

        assert_eq!(outcome.external_id, "vid-2");
        let phases: Vec<String> = mock
            .requests_to(Method::Post, "/page-1/videos")
            .iter()
            .filter_map(|r| r.form_value("upload_phase").map(str::to_string))
            .collect();
        assert_eq!(phases, vec!["start", "transfer", "finish"]);
    }

    #[tokio::test]
    async fn test_reel_hosted_upload() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_when(
            Method::Post,
            "/page-1/video_reels",
            |r| r.form_value("upload_phase") == Some("start"),
            MockReply::json(200, json!({"video_id": "reel-1", "upload_url": "https://rupload/reel-1"})),
        )
        .respond_when(
            Method::Post,
            "/page-1/video_reels",
            |r| r.form_value("upload_phase") == Some("finish"),
            MockReply::json(200, json!({"success": true})),
        )
        .respond(Method::Post, "/reel-1", MockReply::json(200, json!({"success": true})));

        let media = [MediaItem::video("https://cdn/r.mp4")];
        let target = PublishTarget::FacebookReels;
        let outcome = adapter(&mock)
            .publish(&token(), "page-1", &content("reel", &media, &target))
            .await
            .unwrap();

        assert_eq!(outcome.url, "https://www.facebook.com/reel/reel-1");
        let upload = &mock.requests_to(Method::Post, "/reel-1")[0];
        assert_eq!(upload.header_value("file_url"), Some("https://cdn/r.mp4"));
        let finish = mock
            .requests_to(Method::Post, "/page-1/video_reels")
            .into_iter()
            .find(|r| r.form_value("upload_phase") == Some("finish"))
            .unwrap();
        assert_eq!(finish.form_value("video_state"), Some("PUBLISHED"));
    }

    #[tokio::test]
    async fn test_video_fallback_error_mentions_rejected_file_url() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_when(
            Method::Post,
            "/page-1/videos",
            |r| r.form_value("file_url").is_some(),
            MockReply::json(400, json!({"error": {"message": "url not reachable"}})),
        )
        .respond_when(
            Method::Post,
            "/page-1/videos",
            |r| r.form_value("upload_phase") == Some("start"),
            MockReply::json(500, json!({"error": {"message": "upload service down"}})),
        )
        .respond(Method::Get, "/v.mp4", MockReply::bytes(200, b"video".to_vec()));

        let media = [MediaItem::video("https://cdn/v.mp4")];
        let target = PublishTarget::FacebookPage;
        let err = adapter(&mock)
            .publish(&token(), "page-1", &content("clip", &media, &target))
            .await
            .unwrap_err();

        match err {
            SkedcastError::Platform(e) => {
                assert_eq!(
                    e.platform_response(),
                    Some(json!({"error": {"message": "upload service down"}}).to_string().as_str())
                );
                let message = e.to_string();
                assert!(message.contains("url not reachable"));
                assert!(message.contains("HTTP 400"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reel_falls_back_to_byte_upload() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_when(
            Method::Post,
            "/page-1/video_reels",
            |r| r.form_value("upload_phase") == Some("start"),
            MockReply::json(200, json!({"video_id": "reel-2"})),
        )
        .respond_when(
            Method::Post,
            "/page-1/video_reels",
            |r| r.form_value("upload_phase") == Some("finish"),
            MockReply::json(200, json!({"success": true})),
        )
        .respond_when(
            Method::Post,
            "/reel-2",
            |r| r.header_value("file_url").is_some(),
            MockReply::json(400, json!({"debug_info": {"message": "Failed to fetch file"}})),
        )
        .respond_when(
            Method::Post,
            "/reel-2",
            |r| r.header_value("offset").is_some(),
            MockReply::json(200, json!({"success": true})),
        )
        .respond(Method::Get, "/r.mp4", MockReply::bytes(200, b"reel-bytes".to_vec()));

        let media = [MediaItem::video("https://cdn/r.mp4")];
        let target = PublishTarget::FacebookReels;
        let outcome = adapter(&mock)
            .publish(&token(), "page-1", &content("reel", &media, &target))
            .await
            .unwrap();

        assert_eq!(outcome.external_id, "reel-2");
        assert_eq!(mock.calls(Method::Get, "/r.mp4"), 1);

        let uploads = mock.requests_to(Method::Post, "/reel-2");
        assert_eq!(uploads.len(), 2);
        let binary = &uploads[1];
        assert_eq!(binary.header_value("offset"), Some("0"));
        assert_eq!(binary.header_value("file_size"), Some("10"));
        assert_eq!(binary.header_value("authorization"), Some("OAuth page-token"));
        assert_eq!(
            binary.body,
            crate::http::RequestBody::Bytes {
                content_type: "application/octet-stream".to_string(),
                data: b"reel-bytes".to_vec(),
            }
        );

        let finish = mock
            .requests_to(Method::Post, "/page-1/video_reels")
            .into_iter()
            .find(|r| r.form_value("upload_phase") == Some("finish"))
            .unwrap();
        assert_eq!(finish.form_value("video_id"), Some("reel-2"));
        assert_eq!(finish.form_value("video_state"), Some("PUBLISHED"));
    }

    #[test]
    fn test_validation_rejects_unsupported_shapes() {
        let mock = Arc::new(MockTransport::new());
        let adapter = adapter(&mock);
        let page = PublishTarget::FacebookPage;
        let reels = PublishTarget::FacebookReels;

        let mixed = [MediaItem::image("https://cdn/a.jpg"), MediaItem::video("https://cdn/b.mp4")];
        assert!(adapter.validate(&content("x", &mixed, &page)).is_err());

        let two_videos = [MediaItem::video("https://cdn/a.mp4"), MediaItem::video("https://cdn/b.mp4")];
        assert!(adapter.validate(&content("x", &two_videos, &page)).is_err());

        assert!(adapter.validate(&content("  ", &[], &page)).is_err());
        assert!(adapter.validate(&content("reel", &[], &reels)).is_err());

        let image = [MediaItem::image("https://cdn/a.jpg")];
        assert!(adapter.validate(&content("reel", &image, &reels)).is_err());

        let story = PublishTarget::InstagramStory;
        assert!(adapter.validate(&content("x", &image, &story)).is_err());
        assert_eq!(mock.request_count(), 0);
    }
}
