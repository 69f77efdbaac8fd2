//! Normalized entities shared by every platform source and the store.
//!
//! Sources produce these without storage ids; the collector pairs them with
//! the surrogate ids returned by the store when it persists them.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Platform;

/// A podcast show or social account on one platform.
///
/// Natural key: `(platform, platform_id)`. Descriptive fields are
/// overwritten on every upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub platform: Platform,
    /// Platform-native identifier, e.g. a YouTube channel id or Twitch user id.
    pub platform_id: String,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Free-form category/tag list as the platform reports it.
    pub categories: Vec<String>,
    pub language: Option<String>,
    pub raw_data: serde_json::Value,
}

/// An episode, video, stream or post owned by a [`Show`].
///
/// Natural key: `(show id, platform_item_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub platform_item_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Platform-specific kind, e.g. `"youtube_video"` or `"twitch_vod"`.
    pub content_type: Option<String>,
    pub url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub raw_data: serde_json::Value,
}

/// One day's metrics for a single [`ContentItem`].
///
/// Keyed by `(item id, metric_date)`; re-collecting the same date overwrites
/// the previous snapshot. Anything not yet mapped to a typed column goes in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetrics {
    pub metric_date: NaiveDate,
    pub views: Option<i64>,
    pub plays: Option<i64>,
    pub listeners: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub dislikes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub watch_time_minutes: Option<i64>,
    pub average_view_duration_seconds: Option<i32>,
    /// Fraction in `0.0..=1.0`.
    pub completion_rate: Option<f64>,
    pub subscribers_gained: Option<i32>,
    pub subscribers_lost: Option<i32>,
    pub followers_gained: Option<i32>,
    pub followers_lost: Option<i32>,
    pub extra: serde_json::Value,
}

impl ItemMetrics {
    /// An empty snapshot for `metric_date`; every counter is `None`.
    #[must_use]
    pub fn for_date(metric_date: NaiveDate) -> Self {
        Self {
            metric_date,
            extra: serde_json::Value::Object(serde_json::Map::new()),
            ..Self::default()
        }
    }
}

/// One day's account/show-wide metrics, keyed by `(show id, metric_date)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub metric_date: NaiveDate,
    pub followers_total: Option<i64>,
    pub followers_gained: Option<i32>,
    pub followers_lost: Option<i32>,
    pub subscribers_total: Option<i64>,
    pub subscribers_gained: Option<i32>,
    pub subscribers_lost: Option<i32>,
    pub total_views: Option<i64>,
    pub total_plays: Option<i64>,
    pub total_likes: Option<i64>,
    pub total_comments: Option<i64>,
    pub total_shares: Option<i64>,
    pub total_watch_time_minutes: Option<i64>,
    pub average_completion_rate: Option<f64>,
    pub extra: serde_json::Value,
}

impl AggregateMetrics {
    #[must_use]
    pub fn for_date(metric_date: NaiveDate) -> Self {
        Self {
            metric_date,
            extra: serde_json::Value::Object(serde_json::Map::new()),
            ..Self::default()
        }
    }
}

/// A viewer comment on a [`ContentItem`]. Never updated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub platform_comment_id: String,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub body: String,
    pub likes_count: Option<i32>,
    pub reply_count: Option<i32>,
    /// Platform id of the comment this one replies to, if any.
    pub parent_platform_comment_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A half-open range of calendar dates: `start` is included, `end` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The last `days` days up to and including `today`.
    ///
    /// `days == 0` yields an empty range.
    #[must_use]
    pub fn trailing_days(today: NaiveDate, days: u32) -> Self {
        let end = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// The last date inside the range, or `None` when it is empty.
    ///
    /// Useful for APIs whose end bound is inclusive.
    #[must_use]
    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            None
        } else {
            self.end.pred_opt()
        }
    }

    /// Number of dates in the range.
    #[must_use]
    pub fn len_days(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::try_from((self.end - self.start).num_days()).unwrap_or(0)
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn trailing_days_includes_today_and_excludes_tomorrow() {
        let range = DateRange::trailing_days(date(2026, 3, 10), 7);
        assert_eq!(range.start, date(2026, 3, 4));
        assert_eq!(range.end, date(2026, 3, 11));
        assert!(range.contains(date(2026, 3, 10)));
        assert!(range.contains(date(2026, 3, 4)));
        assert!(!range.contains(date(2026, 3, 11)));
        assert!(!range.contains(date(2026, 3, 3)));
        assert_eq!(range.len_days(), 7);
    }

    #[test]
    fn zero_day_window_is_empty() {
        let range = DateRange::trailing_days(date(2026, 3, 10), 0);
        assert!(range.is_empty());
        assert_eq!(range.len_days(), 0);
        assert_eq!(range.last_day(), None);
        assert!(!range.contains(date(2026, 3, 10)));
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = DateRange::new(date(2026, 3, 10), date(2026, 3, 1));
        assert!(range.is_empty());
        assert_eq!(range.len_days(), 0);
    }

    #[test]
    fn last_day_is_the_day_before_end() {
        let range = DateRange::new(date(2026, 1, 1), date(2026, 2, 1));
        assert_eq!(range.last_day(), Some(date(2026, 1, 31)));
    }

    #[test]
    fn display_shows_half_open_bounds() {
        let range = DateRange::new(date(2026, 1, 1), date(2026, 1, 8));
        assert_eq!(range.to_string(), "[2026-01-01, 2026-01-08)");
    }

    #[test]
    fn metrics_for_date_start_with_no_counters() {
        let m = ItemMetrics::for_date(date(2026, 1, 1));
        assert!(m.views.is_none());
        assert!(m.completion_rate.is_none());
        assert_eq!(m.extra, serde_json::json!({}));
    }
}
