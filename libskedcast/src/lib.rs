//! Skedcast - scheduled publishing to Facebook, Instagram and YouTube
//!
//! This library holds the publishing pipeline: the post state machine, the
//! due-post dispatcher, the orchestrator that feeds adapter results back into
//! the state machine, the per-platform adapters, and the credential vault.
//! The `sked-send` daemon and the `sked-queue` CLI are thin shells over it.

pub mod adapters;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod media;
pub mod notify;
pub mod orchestrator;
pub mod scheduling;
pub mod service;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use config::Config;
pub use db::{Database, QueueStats};
pub use dispatcher::Dispatcher;
pub use error::{Result, SkedcastError};
pub use lifecycle::Lifecycle;
pub use orchestrator::Orchestrator;
pub use service::SkedcastService;
pub use types::{Platform, PostStatus, PublishTarget, ScheduledPost};
