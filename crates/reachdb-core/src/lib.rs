//! Shared types and contracts for reachdb.
//!
//! Holds the normalized entities every platform source produces, the
//! [`PlatformSource`] capability contract, the [`MetricsStore`] persistence
//! contract, and configuration loading.

pub mod app_config;
pub mod config;
pub mod context;
pub mod platform;
pub mod run;
pub mod source;
pub mod sources;
pub mod store;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, TwitchCredentials, YoutubeCredentials};
pub use config::{load_app_config, load_app_config_from_env};
pub use context::{CancelHandle, CollectContext};
pub use platform::{Platform, UnknownPlatform};
pub use run::{RunCounts, RunOutcome, RunStatus, UnknownRunStatus};
pub use source::{PlatformSource, SourceError, SourceErrorKind};
pub use sources::{load_sources, parse_sources, SourceConfig, SourcesFile};
pub use store::{ensure_active, MetricsStore, StoreError};
pub use types::{AggregateMetrics, Comment, ContentItem, DateRange, ItemMetrics, Show};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[source] serde_yaml::Error),

    #[error("invalid sources configuration: {0}")]
    Validation(String),

    #[error("no sources could be configured: {0}")]
    NoSources(String),
}
