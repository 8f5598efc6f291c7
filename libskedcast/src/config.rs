//! Configuration management for Skedcast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub instagram: InstagramConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between due-post scans
    pub poll_interval_secs: u64,
    /// Size of the publish worker pool
    pub workers: usize,
    /// Upper bound on posts claimed per scan
    pub batch_size: usize,
    /// Age after which an unfinished claim counts as abandoned at startup
    pub claim_lease_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            workers: 4,
            batch_size: 50,
            claim_lease_secs: crate::dispatcher::DEFAULT_CLAIM_LEASE_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// File holding an age x25519 identity (`AGE-SECRET-KEY-1...`)
    pub identity_file: Option<String>,
    /// Tokens expiring within this many seconds are refreshed
    pub refresh_skew_secs: i64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            identity_file: None,
            refresh_skew_secs: 60,
        }
    }
}

impl VaultConfig {
    /// Load the identity string from `SKEDCAST_VAULT_IDENTITY` or `identity_file`
    pub fn load_identity(&self) -> Result<String> {
        if let Ok(identity) = std::env::var("SKEDCAST_VAULT_IDENTITY") {
            return Ok(identity.trim().to_string());
        }

        let path = self
            .identity_file
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("vault.identity_file".to_string()))?;
        let path = shellexpand::tilde(path).to_string();
        let content = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;

        // age identity files may carry comment lines
        content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "vault.identity_file".to_string(),
                    reason: format!("{} contains no identity", path),
                }
                .into()
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: format!("skedcast/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Facebook and Instagram Graph API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    pub graph_base_url: String,
    pub api_version: String,
    pub rupload_base_url: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base_url: "https://graph.facebook.com".to_string(),
            api_version: "v19.0".to_string(),
            rupload_base_url: "https://rupload.facebook.com/video-upload".to_string(),
            app_id: None,
            app_secret: None,
        }
    }
}

impl MetaConfig {
    /// Versioned Graph API root, e.g. `https://graph.facebook.com/v19.0`
    pub fn graph_url(&self) -> String {
        format!(
            "{}/{}",
            self.graph_base_url.trim_end_matches('/'),
            self.api_version
        )
    }

    pub fn rupload_url(&self) -> String {
        format!(
            "{}/{}",
            self.rupload_base_url.trim_end_matches('/'),
            self.api_version
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub max_carousel_items: usize,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 20,
            poll_interval_ms: 3000,
            max_carousel_items: 10,
        }
    }
}

impl InstagramConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub upload_base_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub chunk_size_bytes: usize,
    pub default_category_id: String,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            upload_base_url: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            client_id: None,
            client_secret: None,
            chunk_size_bytes: 8 * 1024 * 1024,
            default_category_id: "22".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Best-effort sync fan-out endpoint (chatbot / search index)
    pub webhook_url: Option<String>,
}

/// Resumable upload chunks must be a multiple of this size
pub const YOUTUBE_CHUNK_GRANULARITY: usize = 256 * 1024;

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration, applying `SKEDCAST_DB_PATH`
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;

        if let Ok(db_path) = std::env::var("SKEDCAST_DB_PATH") {
            config.database.path = db_path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/skedcast/skedcast.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            vault: VaultConfig {
                identity_file: Some("~/.config/skedcast/vault.key".to_string()),
                ..VaultConfig::default()
            },
            http: HttpConfig::default(),
            meta: MetaConfig::default(),
            instagram: InstagramConfig::default(),
            youtube: YouTubeConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }

        if self.scheduler.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.workers".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if self.scheduler.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.poll_interval_secs".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if self.scheduler.claim_lease_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.claim_lease_secs".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if self.instagram.poll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "instagram.poll_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        let chunk = self.youtube.chunk_size_bytes;
        if chunk == 0 || chunk % YOUTUBE_CHUNK_GRANULARITY != 0 {
            return Err(ConfigError::InvalidValue {
                field: "youtube.chunk_size_bytes".to_string(),
                reason: format!("must be a positive multiple of {}", YOUTUBE_CHUNK_GRANULARITY),
            }
            .into());
        }

        Ok(())
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database.path).to_string()
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SKEDCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("skedcast").join("config.toml"))
}
