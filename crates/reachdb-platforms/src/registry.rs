//! Resolves `config/sources.yaml` entries into live platform sources.

use std::sync::Arc;

use reachdb_core::{AppConfig, ConfigError, Platform, PlatformSource, SourceConfig, SourcesFile};

use crate::{TwitchSource, YoutubeSource};

/// One enabled, credentialed entry ready for collection.
pub struct ConfiguredSource {
    pub source: Arc<dyn PlatformSource>,
    pub show: String,
}

impl std::fmt::Debug for ConfiguredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredSource")
            .field("platform", &self.source.platform())
            .field("show", &self.show)
            .finish()
    }
}

/// Sources in file order, plus the Twitch client if it still needs a token exchange.
#[derive(Debug, Default)]
pub struct SourceSet {
    pub sources: Vec<ConfiguredSource>,
    pub twitch_pending_auth: Option<Arc<TwitchSource>>,
}

/// Builds one source per enabled entry, sharing a client per platform.
///
/// Entries whose platform credentials are absent are skipped with a warning.
///
/// # Errors
///
/// Returns [`ConfigError::NoSources`] if no entry resolves, or
/// [`ConfigError::Validation`] if a platform client cannot be constructed.
pub fn build_sources(config: &AppConfig, file: &SourcesFile) -> Result<SourceSet, ConfigError> {
    let mut youtube: Option<Arc<YoutubeSource>> = None;
    let mut twitch: Option<Arc<TwitchSource>> = None;
    let mut set = SourceSet::default();

    for entry in file.enabled() {
        let source: Arc<dyn PlatformSource> = match entry.platform {
            Platform::Youtube => {
                if !config.youtube.is_configured() {
                    skip_unconfigured(entry, "YOUTUBE_API_KEY or YOUTUBE_ACCESS_TOKEN");
                    continue;
                }
                let client = match &youtube {
                    Some(client) => Arc::clone(client),
                    None => {
                        let client = Arc::new(
                            YoutubeSource::new(
                                &config.youtube,
                                config.http_timeout_secs,
                                &config.user_agent,
                            )
                            .map_err(|e| ConfigError::Validation(format!("youtube client: {e}")))?,
                        );
                        youtube = Some(Arc::clone(&client));
                        client
                    }
                };
                client
            }
            Platform::Twitch => {
                if !config.twitch.is_configured() {
                    skip_unconfigured(
                        entry,
                        "TWITCH_CLIENT_ID plus TWITCH_CLIENT_SECRET or TWITCH_ACCESS_TOKEN",
                    );
                    continue;
                }
                let client = match &twitch {
                    Some(client) => Arc::clone(client),
                    None => {
                        let client = Arc::new(
                            TwitchSource::new(
                                &config.twitch,
                                config.http_timeout_secs,
                                &config.user_agent,
                            )
                            .map_err(|e| ConfigError::Validation(format!("twitch client: {e}")))?,
                        );
                        if config.twitch.access_token.is_none() {
                            set.twitch_pending_auth = Some(Arc::clone(&client));
                        }
                        twitch = Some(Arc::clone(&client));
                        client
                    }
                };
                client
            }
        };

        tracing::debug!(platform = %entry.platform, show = %entry.show, "source configured");
        set.sources.push(ConfiguredSource {
            source,
            show: entry.show.clone(),
        });
    }

    if set.sources.is_empty() {
        return Err(ConfigError::NoSources(
            "no enabled source in the sources file has credentials configured".to_string(),
        ));
    }

    Ok(set)
}

fn skip_unconfigured(entry: &SourceConfig, needed: &str) {
    tracing::warn!(
        platform = %entry.platform,
        show = %entry.show,
        needed,
        "skipping source: credentials not configured"
    );
}
