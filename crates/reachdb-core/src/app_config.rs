use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Credentials for the YouTube Data and Analytics APIs.
#[derive(Clone, Default)]
pub struct YoutubeCredentials {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
}

impl YoutubeCredentials {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.access_token.is_some()
    }
}

/// Credentials for the Twitch Helix API.
///
/// With no `access_token`, one is obtained through the client-credentials
/// exchange at startup.
#[derive(Clone, Default)]
pub struct TwitchCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
}

impl TwitchCredentials {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && (self.access_token.is_some() || self.client_secret.is_some())
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub sources_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub lookback_days: u32,
    pub schedule_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub youtube: YoutubeCredentials,
    pub twitch: TwitchCredentials,
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for YoutubeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoutubeCredentials")
            .field("api_key", &redact(self.api_key.as_ref()))
            .field("access_token", &redact(self.access_token.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for TwitchCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(self.client_secret.as_ref()))
            .field("access_token", &redact(self.access_token.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("lookback_days", &self.lookback_days)
            .field("schedule_interval_secs", &self.schedule_interval_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("youtube", &self.youtube)
            .field("twitch", &self.twitch)
            .finish()
    }
}
