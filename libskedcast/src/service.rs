//! Service facade wiring the pipeline together from configuration
//!
//! `SkedcastService` owns the shared resources (database pool, vault cipher,
//! HTTP transport) and hands out the components built on them, so the daemon
//! and the queue CLI assemble the pipeline the same way.
//!
//! ```no_run
//! use libskedcast::service::SkedcastService;
//!
//! # async fn example() -> libskedcast::error::Result<()> {
//! let service = SkedcastService::new().await?;
//!
//! let mut dispatcher = service.dispatcher();
//! dispatcher.recover_interrupted().await?;
//! dispatcher.run_once().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::adapters::AdapterRegistry;
use crate::config::Config;
use crate::db::Database;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::lifecycle::Lifecycle;
use crate::notify::{EventBus, EventReceiver, FanoutNotifier, WebhookNotifier};
use crate::orchestrator::Orchestrator;
use crate::types::{Platform, PublishOutcome};
use crate::vault::{CredentialVault, GoogleTokenRefresher, MetaTokenRefresher, TokenCipher};

const EVENT_BUS_CAPACITY: usize = 256;

pub struct SkedcastService {
    config: Arc<Config>,
    db: Database,
    orchestrator: Orchestrator,
    lifecycle: Lifecycle,
    events: EventBus,
}

impl SkedcastService {
    /// Build the service from the default configuration file
    pub async fn new() -> Result<Self> {
        Self::from_config(Config::load()?).await
    }

    /// Build the service with the production HTTP transport
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or migrated, the vault identity
    /// cannot be loaded, or the HTTP client cannot be built.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Database::new(&config.database_path()).await?;
        let cipher = Arc::new(TokenCipher::from_identity_str(&config.vault.load_identity()?)?);
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(&config.http)?);
        Ok(Self::from_parts(config, db, cipher, transport))
    }

    /// Assemble the pipeline from already-built resources
    pub fn from_parts(
        config: Config,
        db: Database,
        cipher: Arc<TokenCipher>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let meta_refresher = Arc::new(MetaTokenRefresher::new(transport.clone(), &config.meta));
        let vault = CredentialVault::new(db.clone(), cipher, config.vault.refresh_skew_secs)
            .with_refresher(Platform::Facebook, meta_refresher.clone())
            .with_refresher(Platform::Instagram, meta_refresher)
            .with_refresher(
                Platform::YouTube,
                Arc::new(GoogleTokenRefresher::new(transport.clone(), &config.youtube)),
            );

        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let mut notifier = FanoutNotifier::new().with(Arc::new(events.clone()));
        if let Some(url) = &config.notifications.webhook_url {
            notifier = notifier.with(Arc::new(WebhookNotifier::new(transport.clone(), url.clone())));
        }

        let adapters = AdapterRegistry::standard(transport, &config);
        let orchestrator =
            Orchestrator::new(db.clone(), Arc::new(vault), adapters).with_notifier(Arc::new(notifier));

        Self {
            config: Arc::new(config),
            lifecycle: Lifecycle::new(db.clone()),
            db,
            orchestrator,
            events,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// A dispatcher sized by `[scheduler]`
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.db.clone(),
            self.orchestrator.clone(),
            self.config.scheduler.workers,
            self.config.scheduler.batch_size,
        )
        .with_claim_lease(self.config.scheduler.claim_lease_secs)
    }

    /// Publish a ready post now
    pub async fn schedule_immediate(&self, post_id: &str) -> Result<PublishOutcome> {
        self.orchestrator.publish(post_id).await
    }

    /// Receive publish lifecycle events from this process
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}
