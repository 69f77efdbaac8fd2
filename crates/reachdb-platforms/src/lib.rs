//! Concrete platform sources and the registry that wires them from config.

mod http;
pub mod registry;
pub mod twitch;
pub mod youtube;

use chrono::{DateTime, Utc};

pub use registry::{build_sources, ConfiguredSource, SourceSet};
pub use twitch::TwitchSource;
pub use youtube::YoutubeSource;

/// Lenient RFC 3339 parse; platforms occasionally send empty or odd timestamps.
pub(crate) fn parse_rfc3339(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
