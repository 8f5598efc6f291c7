//! Platform adapters and the dispatch table that selects them
//!
//! Each adapter runs one platform's publishing protocol behind the uniform
//! [`PlatformAdapter`] interface. The orchestrator never branches on platform;
//! it asks the [`AdapterRegistry`] for the adapter keyed by `post.platform`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use libskedcast::adapters::AdapterRegistry;
//! use libskedcast::config::Config;
//! use libskedcast::http::ReqwestTransport;
//! use libskedcast::types::Platform;
//!
//! # fn example() -> libskedcast::error::Result<()> {
//! let config = Config::load()?;
//! let transport = Arc::new(ReqwestTransport::new(&config.http)?);
//! let registry = AdapterRegistry::standard(transport, &config);
//! let adapter = registry.get(Platform::Instagram)?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{PlatformError, Result, SkedcastError};
use crate::http::HttpTransport;
use crate::types::{MediaItem, MediaKind, Platform, PublishOutcome, PublishTarget, YouTubeMetadata};

pub mod facebook;
pub mod instagram;
pub mod youtube;

pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use youtube::YouTubeAdapter;

/// Everything an adapter needs to know about the post itself
#[derive(Debug, Clone, Copy)]
pub struct PublishContent<'a> {
    /// Platform-ready text
    pub caption: &'a str,
    /// Resolved media, in attachment order
    pub media: &'a [MediaItem],
    /// Sub-type selecting the adapter's protocol variant
    pub target: &'a PublishTarget,
    /// Only ever set for YouTube posts
    pub youtube: Option<&'a YouTubeMetadata>,
}

impl<'a> PublishContent<'a> {
    pub fn images(&self) -> usize {
        self.media.iter().filter(|m| m.kind == MediaKind::Image).count()
    }

    pub fn videos(&self) -> usize {
        self.media.iter().filter(|m| m.kind == MediaKind::Video).count()
    }
}

/// Uniform publishing interface implemented once per platform
///
/// Implementations must be stateless with respect to individual posts so a
/// single instance can serve every worker concurrently.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter publishes to
    fn platform(&self) -> Platform;

    /// Reject unsupported input shapes before any network call
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Validation` when the sub-type belongs to another
    /// platform or the media shape is not publishable for this sub-type (for
    /// example a carousel with fewer than two items, or a reel without video).
    fn validate(&self, content: &PublishContent<'_>) -> Result<()>;

    /// Run the platform protocol and return the confirmed external identity
    ///
    /// # Arguments
    ///
    /// * `token` - A usable access token from the credential vault
    /// * `account` - The external account id (page, Instagram user, channel)
    /// * `content` - What to publish
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Api` carrying the remote payload verbatim when
    /// the platform rejects a call, `PlatformError::Network`/`Timeout` for
    /// transport failures. Implementations call [`validate`](Self::validate)
    /// first and make no request if it fails.
    async fn publish(
        &self,
        token: &SecretString,
        account: &str,
        content: &PublishContent<'_>,
    ) -> Result<PublishOutcome>;
}

/// Dispatch table from platform to adapter
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Facebook, Instagram and YouTube adapters
    pub fn standard(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FacebookAdapter::new(transport.clone(), &config.meta)));
        registry.register(Arc::new(InstagramAdapter::new(
            transport.clone(),
            &config.meta,
            &config.instagram,
        )));
        registry.register(Arc::new(YouTubeAdapter::new(transport, &config.youtube)));
        registry
    }

    /// Register an adapter, replacing any existing one for its platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned().ok_or_else(|| {
            SkedcastError::InvalidInput(format!("No adapter registered for {}", platform))
        })
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.adapters.keys().copied().collect();
        platforms.sort_by_key(|p| p.as_str());
        platforms
    }
}

/// Shared guard: the sub-type must belong to the adapter's platform
pub(crate) fn ensure_platform(platform: Platform, target: &PublishTarget) -> Result<()> {
    if target.platform() != platform {
        return Err(PlatformError::Validation(format!(
            "Sub-type {} cannot be published to {}",
            target.sub_type(),
            platform
        ))
        .into());
    }
    Ok(())
}

pub(crate) fn invalid(message: impl Into<String>) -> SkedcastError {
    PlatformError::Validation(message.into()).into()
}
