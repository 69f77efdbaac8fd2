//! Twitch source backed by the Helix API.
//!
//! Twitch exposes no per-day history for videos, so each item gets a single
//! snapshot of its lifetime `view_count`, dated the last day of the window.
//! VOD chat has no REST endpoint; comments are reported as an empty list.

use async_trait::async_trait;
use reachdb_core::{
    AggregateMetrics, CollectContext, Comment, ContentItem, DateRange, ItemMetrics, Platform,
    PlatformSource, Show, SourceError, TwitchCredentials,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::http::{build_client, endpoint, parse_base_url, send_json};
use crate::parse_rfc3339;

pub const DEFAULT_HELIX_URL: &str = "https://api.twitch.tv/helix";
pub const DEFAULT_ID_URL: &str = "https://id.twitch.tv";

pub struct TwitchSource {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    access_token: RwLock<Option<String>>,
    helix_base: Url,
    id_base: Url,
}

impl std::fmt::Debug for TwitchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchSource")
            .field("client_id", &self.client_id)
            .field("helix_base", &self.helix_base.as_str())
            .finish_non_exhaustive()
    }
}

impl TwitchSource {
    /// Creates a source pointed at the production Twitch endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be constructed or
    /// no client id is configured.
    pub fn new(
        credentials: &TwitchCredentials,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, SourceError> {
        Self::with_base_urls(
            credentials,
            timeout_secs,
            user_agent,
            DEFAULT_HELIX_URL,
            DEFAULT_ID_URL,
        )
    }

    /// Creates a source with custom Helix and identity roots (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be constructed, a
    /// base URL is invalid, or no client id is configured.
    pub fn with_base_urls(
        credentials: &TwitchCredentials,
        timeout_secs: u64,
        user_agent: &str,
        helix_base_url: &str,
        id_base_url: &str,
    ) -> Result<Self, SourceError> {
        let client_id = credentials
            .client_id
            .clone()
            .ok_or_else(|| SourceError::Authentication {
                platform: Platform::Twitch,
                reason: "TWITCH_CLIENT_ID is not set".to_string(),
            })?;

        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            client_id,
            client_secret: credentials.client_secret.clone(),
            access_token: RwLock::new(credentials.access_token.clone()),
            helix_base: parse_base_url(helix_base_url)?,
            id_base: parse_base_url(id_base_url)?,
        })
    }

    /// Whether a client-credentials exchange is still needed before use.
    pub async fn needs_token(&self) -> bool {
        self.access_token.read().await.is_none()
    }

    /// Obtains an app access token through the client-credentials grant and
    /// stores it for subsequent requests.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Authentication`] if no client secret is
    /// configured or the identity service rejects the credentials, and
    /// [`SourceError::Transport`] / [`SourceError::Format`] for network or
    /// payload failures.
    pub async fn authenticate(&self, ctx: &CollectContext) -> Result<(), SourceError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let secret = self
            .client_secret
            .as_deref()
            .ok_or_else(|| SourceError::Authentication {
                platform: Platform::Twitch,
                reason: "TWITCH_CLIENT_SECRET is not set".to_string(),
            })?;

        let url = endpoint(
            &self.id_base,
            "oauth2/token",
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret),
                ("grant_type", "client_credentials"),
            ],
        )?;
        let body = send_json(ctx, Platform::Twitch, self.client.post(url), "oauth2 token").await?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| SourceError::format("oauth2 token", e))?;

        *self.access_token.write().await = Some(token.access_token);
        tracing::info!("obtained twitch app access token");
        Ok(())
    }

    async fn helix_get(
        &self,
        ctx: &CollectContext,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, SourceError> {
        let token = self
            .access_token
            .read()
            .await
            .clone()
            .ok_or_else(|| SourceError::Authentication {
                platform: Platform::Twitch,
                reason: "no access token available".to_string(),
            })?;

        let url = endpoint(&self.helix_base, path, query)?;
        let request = self
            .client
            .get(url)
            .header("Client-Id", &self.client_id)
            .bearer_auth(token);
        send_json(ctx, Platform::Twitch, request, path).await
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    #[serde(default)]
    login: String,
    #[serde(default)]
    display_name: String,
    description: Option<String>,
    broadcaster_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
    url: Option<String>,
    duration: Option<String>,
    created_at: Option<String>,
    published_at: Option<String>,
    #[serde(rename = "type")]
    video_type: Option<String>,
}

fn first_data_entry(body: &Value) -> Option<&Value> {
    body.get("data")
        .and_then(Value::as_array)
        .and_then(|d| d.first())
}

/// Parses Helix durations such as `"1h2m3s"`, `"45m10s"` or `"30s"`.
///
/// Returns `None` for anything else, including an empty string.
pub(crate) fn parse_duration(raw: &str) -> Option<i32> {
    if raw.is_empty() {
        return None;
    }

    let mut total: i32 = 0;
    let mut digits = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let multiplier = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        let value: i32 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(multiplier)?)?;
        digits.clear();
    }

    if digits.is_empty() {
        Some(total)
    } else {
        None
    }
}

pub(crate) fn user_to_show(raw: Value, show_name: &str) -> Result<Show, SourceError> {
    let user: HelixUser =
        serde_json::from_value(raw.clone()).map_err(|e| SourceError::format("users", e))?;

    let name = [user.display_name, user.login.clone()]
        .into_iter()
        .find(|n| !n.trim().is_empty())
        .unwrap_or_else(|| show_name.to_string());

    Ok(Show {
        platform: Platform::Twitch,
        platform_id: user.id,
        name,
        description: user.description.filter(|d| !d.is_empty()),
        author: Some(user.login).filter(|l| !l.is_empty()),
        categories: user
            .broadcaster_type
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect(),
        language: None,
        raw_data: raw,
    })
}

pub(crate) fn videos_to_items(body: &Value) -> Result<Vec<ContentItem>, SourceError> {
    let Some(entries) = body.get("data").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    entries
        .iter()
        .map(|raw| {
            let video: HelixVideo = serde_json::from_value(raw.clone())
                .map_err(|e| SourceError::format("videos", e))?;
            let published = video.published_at.as_deref().or(video.created_at.as_deref());
            Ok(ContentItem {
                platform_item_id: video.id,
                title: video.title,
                description: video.description.filter(|d| !d.is_empty()),
                content_type: Some(format!(
                    "twitch_{}",
                    video.video_type.as_deref().unwrap_or("video")
                )),
                url: video.url,
                duration_seconds: video.duration.as_deref().and_then(parse_duration),
                published_at: parse_rfc3339(published),
                season_number: None,
                episode_number: None,
                raw_data: raw.clone(),
            })
        })
        .collect()
}

#[async_trait]
impl PlatformSource for TwitchSource {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn fetch_show(&self, ctx: &CollectContext, show_name: &str) -> Result<Show, SourceError> {
        let body = self.helix_get(ctx, "users", &[("login", show_name)]).await?;
        let user = first_data_entry(&body)
            .cloned()
            .ok_or_else(|| SourceError::format("users", format!("user not found: {show_name}")))?;
        user_to_show(user, show_name)
    }

    async fn fetch_items(
        &self,
        ctx: &CollectContext,
        show: &Show,
    ) -> Result<Vec<ContentItem>, SourceError> {
        let body = self
            .helix_get(
                ctx,
                "videos",
                &[("user_id", show.platform_id.as_str()), ("first", "100")],
            )
            .await?;
        videos_to_items(&body)
    }

    async fn fetch_item_metrics(
        &self,
        ctx: &CollectContext,
        item: &ContentItem,
        range: DateRange,
    ) -> Result<Vec<ItemMetrics>, SourceError> {
        let Some(metric_date) = range.last_day() else {
            return Ok(Vec::new());
        };

        let body = self
            .helix_get(ctx, "videos", &[("id", item.platform_item_id.as_str())])
            .await?;
        let Some(video) = first_data_entry(&body) else {
            tracing::debug!(item = %item.platform_item_id, "video no longer listed");
            return Ok(Vec::new());
        };

        let mut metrics = ItemMetrics::for_date(metric_date);
        metrics.views = video.get("view_count").and_then(Value::as_i64);
        Ok(vec![metrics])
    }

    async fn fetch_aggregate_metrics(
        &self,
        ctx: &CollectContext,
        show: &Show,
        range: DateRange,
    ) -> Result<Vec<AggregateMetrics>, SourceError> {
        let Some(metric_date) = range.last_day() else {
            return Ok(Vec::new());
        };

        let body = self
            .helix_get(
                ctx,
                "channels/followers",
                &[("broadcaster_id", show.platform_id.as_str())],
            )
            .await?;

        let mut metrics = AggregateMetrics::for_date(metric_date);
        metrics.followers_total = body.get("total").and_then(Value::as_i64);
        Ok(vec![metrics])
    }

    async fn fetch_comments(
        &self,
        _ctx: &CollectContext,
        item: &ContentItem,
    ) -> Result<Vec<Comment>, SourceError> {
        tracing::debug!(item = %item.platform_item_id, "twitch has no VOD comment feed");
        Ok(Vec::new())
    }
}
