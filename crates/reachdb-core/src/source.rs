//! The capability contract every platform source implements.
//!
//! The collector only ever talks to a platform through [`PlatformSource`],
//! so sources are interchangeable and the collector never branches on
//! platform identity.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    AggregateMetrics, CollectContext, Comment, ContentItem, DateRange, ItemMetrics, Platform,
    Show,
};

/// Broad failure class of a [`SourceError`], used by callers to decide scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Authentication,
    Transport,
    Format,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{platform} authentication failed: {reason}")]
    Authentication { platform: Platform, reason: String },

    #[error("transport error during {context}: {reason}")]
    Transport { context: String, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed payload for {context}: {reason}")]
    Format { context: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl SourceError {
    #[must_use]
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::Authentication { .. } => SourceErrorKind::Authentication,
            SourceError::Transport { .. } | SourceError::UnexpectedStatus { .. } => {
                SourceErrorKind::Transport
            }
            SourceError::Format { .. } => SourceErrorKind::Format,
            SourceError::Cancelled => SourceErrorKind::Cancelled,
        }
    }

    pub fn format(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SourceError::Format {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transport(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SourceError::Transport {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

/// One platform's data source.
///
/// Contract details the collector relies on:
/// - every date range is half-open; an empty range yields `Ok(vec![])`.
/// - a platform with no comment feature returns `Ok(vec![])` from
///   [`PlatformSource::fetch_comments`]; `Err` always means the fetch failed.
/// - nothing here writes to storage.
#[async_trait]
pub trait PlatformSource: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch_show(&self, ctx: &CollectContext, show_name: &str) -> Result<Show, SourceError>;

    async fn fetch_items(
        &self,
        ctx: &CollectContext,
        show: &Show,
    ) -> Result<Vec<ContentItem>, SourceError>;

    async fn fetch_item_metrics(
        &self,
        ctx: &CollectContext,
        item: &ContentItem,
        range: DateRange,
    ) -> Result<Vec<ItemMetrics>, SourceError>;

    async fn fetch_aggregate_metrics(
        &self,
        ctx: &CollectContext,
        show: &Show,
        range: DateRange,
    ) -> Result<Vec<AggregateMetrics>, SourceError>;

    async fn fetch_comments(
        &self,
        ctx: &CollectContext,
        item: &ContentItem,
    ) -> Result<Vec<Comment>, SourceError>;
}
