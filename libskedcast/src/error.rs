//! Error types for Skedcast

use thiserror::Error;

use crate::types::PostStatus;

pub type Result<T> = std::result::Result<T, SkedcastError>;

#[derive(Error, Debug)]
pub enum SkedcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Post {post_id} is {status}, expected {expected}")]
    InvalidState {
        post_id: String,
        status: PostStatus,
        expected: String,
    },
}

impl SkedcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SkedcastError::InvalidInput(_) => 3,
            SkedcastError::InvalidState { .. } => 3,
            SkedcastError::NotFound(_) => 3,
            SkedcastError::Config(_) => 2,
            SkedcastError::Credential(_) => 2,
            SkedcastError::Platform(PlatformError::Authentication(_)) => 2,
            SkedcastError::Platform(_) => 1,
            SkedcastError::Database(_) => 1,
        }
    }

    /// Whether the error was raised before any remote call could have been made.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            SkedcastError::InvalidInput(_)
                | SkedcastError::InvalidState { .. }
                | SkedcastError::NotFound(_)
                | SkedcastError::Platform(PlatformError::Validation(_))
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error(
        "Post {post_id} was published as {platform_post_id} ({post_url}) but its claim was \
         taken over before the result was stored"
    )]
    LostClaim {
        post_id: String,
        platform_post_id: String,
        post_url: String,
    },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// The remote platform rejected a call. `body` is the raw response payload.
    #[error("{context} failed (HTTP {status}): {body}")]
    Api {
        context: String,
        status: u16,
        body: String,
    },
}

impl PlatformError {
    /// Raw remote payload, if the platform answered at all.
    pub fn platform_response(&self) -> Option<&str> {
        match self {
            PlatformError::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No valid credential for account {0}")]
    Unavailable(String),

    #[error("Token decryption failed: {0}")]
    Decryption(String),

    #[error("Token encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid vault identity: {0}")]
    InvalidIdentity(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),
}
