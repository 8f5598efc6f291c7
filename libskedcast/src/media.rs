//! Media resolution: stored asset URL shapes to ordered, classified items
//!
//! Resolution is total. Tombstones, malformed values and unclassifiable
//! entries resolve to nothing instead of failing; whether "no media" is
//! acceptable is the adapter's decision.

use serde_json::Value;

use crate::types::{MediaAsset, MediaItem, MediaKind};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "avi", "mkv"];

/// URLs held by a stored URL value, in order
pub fn resolve_urls(value: &Value) -> Vec<String> {
    match value {
        Value::String(url) if !url.trim().is_empty() => vec![url.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .collect(),
        // tombstones and anything else
        _ => Vec::new(),
    }
}

pub fn is_tombstone(value: &Value) -> bool {
    value
        .get("deleted")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Classify by MIME type first, then by the URL's file extension
pub fn classify(mime_type: Option<&str>, url: &str) -> Option<MediaKind> {
    if let Some(mime) = mime_type {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            return Some(MediaKind::Image);
        }
        if mime.starts_with("video/") {
            return Some(MediaKind::Video);
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    if extension.contains('/') {
        return None;
    }

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Resolve one asset into its classified items
pub fn resolve_asset(asset: &MediaAsset) -> Vec<MediaItem> {
    if is_tombstone(&asset.url) {
        tracing::debug!(asset_id = %asset.id, "Media asset is tombstoned");
        return Vec::new();
    }

    resolve_urls(&asset.url)
        .into_iter()
        .filter_map(|url| match classify(asset.mime_type.as_deref(), &url) {
            Some(kind) => Some(MediaItem { kind, url }),
            None => {
                tracing::warn!(asset_id = %asset.id, url = %url, "Dropping media of unknown kind");
                None
            }
        })
        .collect()
}

/// Resolve a post's assets, preserving attachment order
pub fn resolve_all(assets: &[MediaAsset]) -> Vec<MediaItem> {
    assets.iter().flat_map(resolve_asset).collect()
}
