//! YouTube source: Data API v3 for channels, videos and comments, Analytics
//! API v2 for daily metrics.

use async_trait::async_trait;
use chrono::NaiveDate;
use reachdb_core::{
    AggregateMetrics, CollectContext, Comment, ContentItem, DateRange, ItemMetrics, Platform,
    PlatformSource, Show, SourceError, YoutubeCredentials,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::http::{build_client, endpoint, parse_base_url, send_json};
use crate::parse_rfc3339;

pub const DEFAULT_DATA_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_ANALYTICS_API_URL: &str = "https://youtubeanalytics.googleapis.com/v2";

const ITEM_METRICS: &str = "views,likes,dislikes,comments,shares,estimatedMinutesWatched,\
                            averageViewDuration,subscribersGained,subscribersLost";
const CHANNEL_METRICS: &str =
    "views,likes,comments,shares,subscribersGained,subscribersLost,estimatedMinutesWatched";

pub struct YoutubeSource {
    client: Client,
    api_key: Option<String>,
    access_token: Option<String>,
    data_base: Url,
    analytics_base: Url,
}

impl YoutubeSource {
    /// Creates a source pointed at the production Google APIs.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be constructed.
    pub fn new(
        credentials: &YoutubeCredentials,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, SourceError> {
        Self::with_base_urls(
            credentials,
            timeout_secs,
            user_agent,
            DEFAULT_DATA_API_URL,
            DEFAULT_ANALYTICS_API_URL,
        )
    }

    /// Creates a source with custom API roots (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be constructed or a
    /// base URL is invalid.
    pub fn with_base_urls(
        credentials: &YoutubeCredentials,
        timeout_secs: u64,
        user_agent: &str,
        data_base_url: &str,
        analytics_base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            api_key: credentials.api_key.clone(),
            access_token: credentials.access_token.clone(),
            data_base: parse_base_url(data_base_url)?,
            analytics_base: parse_base_url(analytics_base_url)?,
        })
    }

    /// GET against the Data API. Prefers the API key; falls back to the
    /// OAuth token when only that is configured.
    async fn data_get(
        &self,
        ctx: &CollectContext,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<Value, SourceError> {
        let mut query = query.to_vec();
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }
        let url = endpoint(&self.data_base, path, &query)?;
        let mut request = self.client.get(url);
        if self.api_key.is_none() {
            if let Some(token) = &self.access_token {
                request = request.bearer_auth(token);
            }
        }
        send_json(ctx, Platform::Youtube, request, context).await
    }

    /// GET against the Analytics API, which requires OAuth. Without a token
    /// the key is sent and the API's 401/403 surfaces as an authentication error.
    async fn analytics_get(
        &self,
        ctx: &CollectContext,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<Value, SourceError> {
        let mut query = query.to_vec();
        let request = if let Some(token) = &self.access_token {
            self.client
                .get(endpoint(&self.analytics_base, "reports", &query)?)
                .bearer_auth(token)
        } else {
            if let Some(key) = &self.api_key {
                query.push(("key", key.as_str()));
            }
            self.client
                .get(endpoint(&self.analytics_base, "reports", &query)?)
        };
        send_json(ctx, Platform::Youtube, request, context).await
    }

    async fn lookup_channel(
        &self,
        ctx: &CollectContext,
        selector: &str,
        show_name: &str,
    ) -> Result<Option<Value>, SourceError> {
        let body = self
            .data_get(
                ctx,
                "channels",
                &[("part", "snippet,statistics"), (selector, show_name)],
                "channels",
            )
            .await?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    snippet: ChannelSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
    description: Option<String>,
    custom_url: Option<String>,
    default_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    id: SearchResultId,
    #[serde(default)]
    snippet: VideoSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    description: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThread {
    id: Option<String>,
    #[serde(default)]
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: Option<TopLevelComment>,
    total_reply_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    #[serde(default)]
    snippet: CommentSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_display: Option<String>,
    text_original: Option<String>,
    author_display_name: Option<String>,
    author_channel_id: Option<AuthorChannelId>,
    like_count: Option<i64>,
    published_at: Option<String>,
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorChannelId {
    value: Option<String>,
}

/// An Analytics `reports` response: named columns plus positional rows.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(default)]
    column_headers: Vec<ColumnHeader>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ColumnHeader {
    name: String,
}

struct ReportRow<'a> {
    headers: &'a [ColumnHeader],
    values: &'a [Value],
}

impl ReportRow<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.headers.iter().position(|h| h.name == name)?;
        self.values.get(idx)
    }

    fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(value_as_i64)
    }

    fn i32(&self, name: &str) -> Option<i32> {
        self.i64(name).and_then(|v| i32::try_from(v).ok())
    }

    fn day(&self) -> Result<NaiveDate, SourceError> {
        let raw = self
            .get("day")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::format("analytics report", "row has no day column"))?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| SourceError::format("analytics report", format!("day '{raw}': {e}")))
    }
}

impl Report {
    fn rows(&self) -> impl Iterator<Item = ReportRow<'_>> {
        self.rows.iter().map(|values| ReportRow {
            headers: &self.column_headers,
            values,
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn value_as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

fn parse_report(body: Value, context: &str) -> Result<Report, SourceError> {
    serde_json::from_value(body).map_err(|e| SourceError::format(context, e))
}

pub(crate) fn channel_to_show(raw: Value, show_name: &str) -> Result<Show, SourceError> {
    let channel: Channel =
        serde_json::from_value(raw.clone()).map_err(|e| SourceError::format("channels", e))?;
    let name = if channel.snippet.title.trim().is_empty() {
        show_name.to_string()
    } else {
        channel.snippet.title
    };

    Ok(Show {
        platform: Platform::Youtube,
        platform_id: channel.id,
        name,
        description: channel.snippet.description.filter(|d| !d.is_empty()),
        author: channel.snippet.custom_url,
        categories: Vec::new(),
        language: channel.snippet.default_language,
        raw_data: raw,
    })
}

pub(crate) fn search_to_items(body: &Value) -> Result<Vec<ContentItem>, SourceError> {
    let Some(entries) = body.get("items").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut items = Vec::with_capacity(entries.len());
    for raw in entries {
        let result: SearchResult =
            serde_json::from_value(raw.clone()).map_err(|e| SourceError::format("search", e))?;
        let Some(video_id) = result.id.video_id else {
            tracing::debug!("skipping search result without a videoId");
            continue;
        };
        items.push(ContentItem {
            url: Some(format!("https://www.youtube.com/watch?v={video_id}")),
            platform_item_id: video_id,
            title: result.snippet.title,
            description: result.snippet.description.filter(|d| !d.is_empty()),
            content_type: Some("youtube_video".to_string()),
            duration_seconds: None,
            published_at: parse_rfc3339(result.snippet.published_at.as_deref()),
            season_number: None,
            episode_number: None,
            raw_data: raw.clone(),
        });
    }
    Ok(items)
}

pub(crate) fn report_to_item_metrics(body: Value) -> Result<Vec<ItemMetrics>, SourceError> {
    let report = parse_report(body, "video analytics report")?;
    report
        .rows()
        .map(|row| {
            let mut m = ItemMetrics::for_date(row.day()?);
            m.views = row.i64("views");
            m.likes = row.i64("likes");
            m.dislikes = row.i64("dislikes");
            m.comments = row.i64("comments");
            m.shares = row.i64("shares");
            m.watch_time_minutes = row.i64("estimatedMinutesWatched");
            m.average_view_duration_seconds = row.i32("averageViewDuration");
            m.subscribers_gained = row.i32("subscribersGained");
            m.subscribers_lost = row.i32("subscribersLost");
            Ok(m)
        })
        .collect()
}

pub(crate) fn report_to_aggregate_metrics(
    body: Value,
) -> Result<Vec<AggregateMetrics>, SourceError> {
    let report = parse_report(body, "channel analytics report")?;
    report
        .rows()
        .map(|row| {
            let mut m = AggregateMetrics::for_date(row.day()?);
            m.total_views = row.i64("views");
            m.total_likes = row.i64("likes");
            m.total_comments = row.i64("comments");
            m.total_shares = row.i64("shares");
            m.subscribers_gained = row.i32("subscribersGained");
            m.subscribers_lost = row.i32("subscribersLost");
            m.total_watch_time_minutes = row.i64("estimatedMinutesWatched");
            Ok(m)
        })
        .collect()
}

pub(crate) fn threads_to_comments(body: Value) -> Result<Vec<Comment>, SourceError> {
    #[derive(Deserialize)]
    struct Threads {
        #[serde(default)]
        items: Vec<CommentThread>,
    }

    let threads: Threads =
        serde_json::from_value(body).map_err(|e| SourceError::format("commentThreads", e))?;

    Ok(threads
        .items
        .into_iter()
        .filter_map(|thread| {
            let id = thread.id?;
            let snippet = thread
                .snippet
                .top_level_comment
                .map(|c| c.snippet)
                .unwrap_or_default();
            Some(Comment {
                platform_comment_id: id,
                author_name: snippet.author_display_name,
                author_id: snippet.author_channel_id.and_then(|a| a.value),
                body: snippet
                    .text_display
                    .or(snippet.text_original)
                    .unwrap_or_default(),
                likes_count: snippet.like_count.and_then(|v| i32::try_from(v).ok()),
                reply_count: thread
                    .snippet
                    .total_reply_count
                    .and_then(|v| i32::try_from(v).ok()),
                parent_platform_comment_id: snippet.parent_id,
                published_at: parse_rfc3339(snippet.published_at.as_deref()),
            })
        })
        .collect())
}

/// Analytics `startDate`/`endDate` are both inclusive.
fn analytics_dates(range: DateRange) -> Option<(String, String)> {
    if range.is_empty() {
        return None;
    }
    let last = range.last_day()?;
    Some((
        range.start.format("%Y-%m-%d").to_string(),
        last.format("%Y-%m-%d").to_string(),
    ))
}

#[async_trait]
impl PlatformSource for YoutubeSource {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch_show(&self, ctx: &CollectContext, show_name: &str) -> Result<Show, SourceError> {
        let channel = match self.lookup_channel(ctx, "forUsername", show_name).await? {
            Some(channel) => channel,
            None => {
                tracing::debug!(show = %show_name, "no legacy username match, trying handle");
                self.lookup_channel(ctx, "forHandle", show_name)
                    .await?
                    .ok_or_else(|| {
                        SourceError::format("channels", format!("channel not found: {show_name}"))
                    })?
            }
        };
        channel_to_show(channel, show_name)
    }

    async fn fetch_items(
        &self,
        ctx: &CollectContext,
        show: &Show,
    ) -> Result<Vec<ContentItem>, SourceError> {
        let body = self
            .data_get(
                ctx,
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", show.platform_id.as_str()),
                    ("type", "video"),
                    ("order", "date"),
                    ("maxResults", "50"),
                ],
                "search",
            )
            .await?;
        search_to_items(&body)
    }

    async fn fetch_item_metrics(
        &self,
        ctx: &CollectContext,
        item: &ContentItem,
        range: DateRange,
    ) -> Result<Vec<ItemMetrics>, SourceError> {
        let Some((start, end)) = analytics_dates(range) else {
            return Ok(Vec::new());
        };
        let filter = format!("video=={}", item.platform_item_id);
        let body = self
            .analytics_get(
                ctx,
                &[
                    ("ids", "channel==MINE"),
                    ("startDate", start.as_str()),
                    ("endDate", end.as_str()),
                    ("metrics", ITEM_METRICS),
                    ("dimensions", "day"),
                    ("filters", filter.as_str()),
                ],
                "video analytics report",
            )
            .await?;
        report_to_item_metrics(body)
    }

    async fn fetch_aggregate_metrics(
        &self,
        ctx: &CollectContext,
        show: &Show,
        range: DateRange,
    ) -> Result<Vec<AggregateMetrics>, SourceError> {
        let Some((start, end)) = analytics_dates(range) else {
            return Ok(Vec::new());
        };
        let ids = format!("channel=={}", show.platform_id);
        let body = self
            .analytics_get(
                ctx,
                &[
                    ("ids", ids.as_str()),
                    ("startDate", start.as_str()),
                    ("endDate", end.as_str()),
                    ("metrics", CHANNEL_METRICS),
                    ("dimensions", "day"),
                ],
                "channel analytics report",
            )
            .await?;
        report_to_aggregate_metrics(body)
    }

    async fn fetch_comments(
        &self,
        ctx: &CollectContext,
        item: &ContentItem,
    ) -> Result<Vec<Comment>, SourceError> {
        let body = self
            .data_get(
                ctx,
                "commentThreads",
                &[
                    ("part", "snippet"),
                    ("videoId", item.platform_item_id.as_str()),
                    ("maxResults", "100"),
                    ("order", "relevance"),
                    ("textFormat", "plainText"),
                ],
                "commentThreads",
            )
            .await?;
        threads_to_comments(body)
    }
}

#[cfg(test)]
#[path = "youtube_test.rs"]
mod tests;
