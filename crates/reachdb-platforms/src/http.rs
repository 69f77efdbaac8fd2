//! HTTP plumbing shared by the platform sources.
//!
//! Every request races the collection context's cancellation signal and maps
//! transport and status failures onto [`SourceError`].

use std::time::Duration;

use reachdb_core::{CollectContext, Platform, SourceError};
use reqwest::{Client, RequestBuilder, StatusCode, Url};

/// Builds the `reqwest` client every source uses.
///
/// # Errors
///
/// Returns [`SourceError::Transport`] if the client cannot be constructed.
pub(crate) fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()
        .map_err(|e| SourceError::transport("client construction", e))
}

/// Parses a base URL, normalising it to end with exactly one slash so
/// [`Url::join`] appends rather than replacing the last path segment.
///
/// # Errors
///
/// Returns [`SourceError::Format`] if `base_url` is not a valid URL.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, SourceError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| SourceError::format(format!("base URL '{base_url}'"), e))
}

/// Joins `path` onto `base` and appends the query pairs.
///
/// # Errors
///
/// Returns [`SourceError::Format`] if `path` cannot be joined.
pub(crate) fn endpoint(base: &Url, path: &str, query: &[(&str, &str)]) -> Result<Url, SourceError> {
    let mut url = base
        .join(path)
        .map_err(|e| SourceError::format(format!("endpoint '{path}'"), e))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}

/// Sends `request` and parses a 2xx body as JSON.
///
/// 401 and 403 become [`SourceError::Authentication`] for `platform`; any
/// other non-2xx status is [`SourceError::UnexpectedStatus`].
///
/// # Errors
///
/// - [`SourceError::Cancelled`] if `ctx` is cancelled before the response arrives.
/// - [`SourceError::Transport`] on network failure.
/// - [`SourceError::Format`] if the body is not JSON.
pub(crate) async fn send_json(
    ctx: &CollectContext,
    platform: Platform,
    request: RequestBuilder,
    context: &str,
) -> Result<serde_json::Value, SourceError> {
    if ctx.is_cancelled() {
        return Err(SourceError::Cancelled);
    }

    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::transport(context, e))?;
        let status = response.status();
        let url = response.url().clone();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Authentication {
                platform,
                reason: format!("HTTP {} from {}", status.as_u16(), redact_query(&url)),
            });
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact_query(&url),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::transport(context, e))?;
        serde_json::from_str(&body).map_err(|e| SourceError::format(context, e))
    };

    tokio::select! {
        biased;
        () = ctx.cancelled() => Err(SourceError::Cancelled),
        result = exchange => result,
    }
}

/// Strips the query string so API keys never reach logs or run records.
fn redact_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
