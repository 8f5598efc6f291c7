//! Credential vault: sealed token storage and refresh-on-expiry
//!
//! Tokens live in `social_accounts` as opaque strings: age ciphertext for the
//! vault's own x25519 identity, base64 encoded. [`CredentialVault`] opens the
//! current access token, or performs exactly one refresh when it is expired,
//! persisting the new sealed token with a compare-and-swap on the old one.

use age::secrecy::ExposeSecret as _;
use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::config::{MetaConfig, YouTubeConfig};
use crate::db::Database;
use crate::error::{CredentialError, PlatformError, Result};
use crate::http::{HttpRequest, HttpTransport};
use crate::types::{Platform, SocialAccount};

/// Seals and opens token strings with an age x25519 identity
pub struct TokenCipher {
    identity: age::x25519::Identity,
}

impl TokenCipher {
    pub fn new(identity: age::x25519::Identity) -> Self {
        Self { identity }
    }

    /// Parse an `AGE-SECRET-KEY-1...` string
    pub fn from_identity_str(identity: &str) -> Result<Self> {
        let identity = age::x25519::Identity::from_str(identity.trim())
            .map_err(|e| CredentialError::InvalidIdentity(e.to_string()))?;
        Ok(Self { identity })
    }

    pub fn generate() -> Self {
        Self {
            identity: age::x25519::Identity::generate(),
        }
    }

    /// The secret identity string, for writing a key file
    pub fn identity_string(&self) -> SecretString {
        SecretString::from(self.identity.to_string().expose_secret().clone())
    }

    pub fn public_key(&self) -> String {
        self.identity.to_public().to_string()
    }

    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let recipient: Box<dyn age::Recipient + Send> = Box::new(self.identity.to_public());
        let encryptor = age::Encryptor::with_recipients(vec![recipient])
            .ok_or_else(|| CredentialError::Encryption("no recipients".to_string()))?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| CredentialError::Encryption(e.to_string()))?;
        writer
            .write_all(plaintext.as_bytes())
            .map_err(|e| CredentialError::Encryption(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CredentialError::Encryption(e.to_string()))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(encrypted))
    }

    pub fn open(&self, sealed: &str) -> Result<SecretString> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(sealed.trim())
            .map_err(|e| CredentialError::Decryption(format!("not base64: {}", e)))?;

        let decryptor = match age::Decryptor::new(&ciphertext[..]) {
            Ok(age::Decryptor::Recipients(d)) => d,
            Ok(_) => {
                return Err(CredentialError::Decryption(
                    "expected recipient-encrypted token".to_string(),
                )
                .into())
            }
            Err(e) => return Err(CredentialError::Decryption(e.to_string()).into()),
        };

        let mut reader = decryptor
            .decrypt(std::iter::once(&self.identity as &dyn age::Identity))
            .map_err(|e| CredentialError::Decryption(e.to_string()))?;

        let mut plaintext = Zeroizing::new(Vec::new());
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| CredentialError::Decryption(e.to_string()))?;

        let token = std::str::from_utf8(&plaintext)
            .map_err(|e| CredentialError::Decryption(format!("invalid UTF-8: {}", e)))?;
        Ok(SecretString::from(token.to_string()))
    }
}

/// Result of a successful refresh call
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Present when the platform rotates refresh tokens
    pub refresh_token: Option<SecretString>,
    pub expires_in: Option<i64>,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> std::result::Result<TokenGrant, PlatformError>;
}

#[derive(serde::Deserialize)]
struct GrantResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl GrantResponse {
    fn into_grant(self) -> TokenGrant {
        TokenGrant {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_in: self.expires_in,
        }
    }
}

/// OAuth2 refresh-token grant against Google's token endpoint
pub struct GoogleTokenRefresher {
    transport: Arc<dyn HttpTransport>,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl GoogleTokenRefresher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &YouTubeConfig) -> Self {
        Self {
            transport,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenRefresher for GoogleTokenRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> std::result::Result<TokenGrant, PlatformError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(PlatformError::Authentication(
                "youtube.client_id / youtube.client_secret not configured".to_string(),
            ));
        };

        let request = HttpRequest::post(&self.token_url).form([
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ]);

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("Google token refresh")?;

        let grant: GrantResponse = response
            .json()
            .map_err(|e| PlatformError::Authentication(format!("unparseable token response: {}", e)))?;
        Ok(grant.into_grant())
    }
}

/// Long-lived token exchange on the Graph API
pub struct MetaTokenRefresher {
    transport: Arc<dyn HttpTransport>,
    graph_url: String,
    app_id: Option<String>,
    app_secret: Option<String>,
}

impl MetaTokenRefresher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &MetaConfig) -> Self {
        Self {
            transport,
            graph_url: config.graph_url(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenRefresher for MetaTokenRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> std::result::Result<TokenGrant, PlatformError> {
        let (Some(app_id), Some(app_secret)) = (&self.app_id, &self.app_secret) else {
            return Err(PlatformError::Authentication(
                "meta.app_id / meta.app_secret not configured".to_string(),
            ));
        };

        let request = HttpRequest::get(format!("{}/oauth/access_token", self.graph_url))
            .query("grant_type", "fb_exchange_token")
            .query("client_id", app_id.as_str())
            .query("client_secret", app_secret.as_str())
            .query("fb_exchange_token", refresh_token.expose_secret());

        let response = self
            .transport
            .send(request)
            .await?
            .ensure_success("Meta token exchange")?;

        let grant: GrantResponse = response
            .json()
            .map_err(|e| PlatformError::Authentication(format!("unparseable token response: {}", e)))?;
        Ok(grant.into_grant())
    }
}

/// Hands out usable access tokens for social accounts
pub struct CredentialVault {
    db: Database,
    cipher: Arc<TokenCipher>,
    refreshers: HashMap<Platform, Arc<dyn TokenRefresher>>,
    refresh_skew_secs: i64,
}

impl CredentialVault {
    pub fn new(db: Database, cipher: Arc<TokenCipher>, refresh_skew_secs: i64) -> Self {
        Self {
            db,
            cipher,
            refreshers: HashMap::new(),
            refresh_skew_secs,
        }
    }

    pub fn with_refresher(mut self, platform: Platform, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refreshers.insert(platform, refresher);
        self
    }

    pub fn cipher(&self) -> &Arc<TokenCipher> {
        &self.cipher
    }

    fn is_fresh(&self, expires_at: Option<i64>, now: i64) -> bool {
        expires_at.map_or(true, |at| at - self.refresh_skew_secs > now)
    }

    /// Return a usable access token for `account`, refreshing it at most once
    ///
    /// Every failure (undecryptable token, missing refresher, rejected
    /// refresh) surfaces as [`CredentialError::Unavailable`] and leaves the
    /// stored account untouched.
    pub async fn get_valid_credential(&self, account: &SocialAccount) -> Result<SecretString> {
        let now = chrono::Utc::now().timestamp();

        if self.is_fresh(account.expires_at, now) {
            return self.cipher.open(&account.access_token).map_err(|e| {
                tracing::warn!(account_id = %account.id, error = %e, "Stored access token unusable");
                unavailable(account)
            });
        }

        tracing::info!(
            account_id = %account.id,
            platform = %account.platform,
            "Access token expired, refreshing"
        );

        let refresh_token = account
            .refresh_token
            .as_deref()
            .ok_or_else(|| {
                tracing::warn!(account_id = %account.id, "No refresh token stored");
                unavailable(account)
            })
            .and_then(|sealed| {
                self.cipher.open(sealed).map_err(|e| {
                    tracing::warn!(account_id = %account.id, error = %e, "Stored refresh token unusable");
                    unavailable(account)
                })
            })?;

        let refresher = self.refreshers.get(&account.platform).ok_or_else(|| {
            tracing::warn!(platform = %account.platform, "No token refresher registered");
            unavailable(account)
        })?;

        let grant = refresher.refresh(&refresh_token).await.map_err(|e| {
            tracing::warn!(account_id = %account.id, error = %e, "Token refresh rejected");
            unavailable(account)
        })?;

        let sealed_access = self.cipher.seal(grant.access_token.expose_secret())?;
        let sealed_refresh = grant
            .refresh_token
            .as_ref()
            .map(|t| self.cipher.seal(t.expose_secret()))
            .transpose()?;
        let expires_at = grant.expires_in.map(|secs| now + secs);

        let won = self
            .db
            .update_account_tokens(
                &account.id,
                &account.access_token,
                &sealed_access,
                sealed_refresh.as_deref(),
                expires_at,
            )
            .await?;

        if won {
            tracing::info!(account_id = %account.id, "Refreshed access token stored");
            return Ok(grant.access_token);
        }

        // Another worker refreshed first; use its token
        tracing::debug!(account_id = %account.id, "Concurrent refresh detected, re-reading account");
        let current = self
            .db
            .get_account(&account.id)
            .await?
            .ok_or_else(|| unavailable(account))?;

        if !self.is_fresh(current.expires_at, now) {
            return Err(unavailable(account));
        }
        self.cipher
            .open(&current.access_token)
            .map_err(|_| unavailable(account))
    }
}

fn unavailable(account: &SocialAccount) -> crate::error::SkedcastError {
    CredentialError::Unavailable(account.id.clone()).into()
}
