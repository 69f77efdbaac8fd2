//! In-memory store and scripted source for exercising the collector.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reachdb_core::{
    ensure_active, AggregateMetrics, CancelHandle, CollectContext, Comment, ContentItem, DateRange, ItemMetrics,
    MetricsStore, Platform, PlatformSource, RunOutcome, Show, SourceError, StoreError,
};

#[derive(Debug, Clone)]
pub(crate) struct StoredRun {
    pub platform: Platform,
    pub started_at: DateTime<Utc>,
    pub outcome: Option<RunOutcome>,
    pub end_calls: u32,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    shows: HashMap<(Platform, String), (i64, Show)>,
    items: HashMap<(i64, String), (i64, ContentItem)>,
    item_metrics: BTreeMap<(i64, NaiveDate), ItemMetrics>,
    aggregates: BTreeMap<(i64, NaiveDate), AggregateMetrics>,
    comments: HashMap<(i64, String), Comment>,
    runs: BTreeMap<i64, StoredRun>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A [`MetricsStore`] with the same keying and cancellation rules as the
/// Postgres store, plus switches to make individual writes fail.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    fail_show_upsert: bool,
    fail_run_start: bool,
    fail_run_end: bool,
    /// Platform item ids whose upsert fails.
    failing_items: HashSet<String>,
    /// Metric dates whose item-metrics upsert fails.
    failing_metric_dates: HashSet<NaiveDate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_show_upsert(mut self) -> Self {
        self.fail_show_upsert = true;
        self
    }

    pub fn failing_run_start(mut self) -> Self {
        self.fail_run_start = true;
        self
    }

    pub fn failing_run_end(mut self) -> Self {
        self.fail_run_end = true;
        self
    }

    pub fn failing_item(mut self, platform_item_id: &str) -> Self {
        self.failing_items.insert(platform_item_id.to_string());
        self
    }

    pub fn failing_metric_date(mut self, metric_date: NaiveDate) -> Self {
        self.failing_metric_dates.insert(metric_date);
        self
    }

    pub fn show_count(&self) -> usize {
        self.tables.lock().unwrap().shows.len()
    }

    pub fn item_count(&self) -> usize {
        self.tables.lock().unwrap().items.len()
    }

    pub fn has_item(&self, platform_item_id: &str) -> bool {
        self.item_id(platform_item_id).is_some()
    }

    pub fn item_id(&self, platform_item_id: &str) -> Option<i64> {
        self.tables
            .lock()
            .unwrap()
            .items
            .values()
            .find(|(_, item)| item.platform_item_id == platform_item_id)
            .map(|(id, _)| *id)
    }

    pub fn item_metrics_for(&self, platform_item_id: &str) -> Vec<ItemMetrics> {
        let Some(item_id) = self.item_id(platform_item_id) else {
            return Vec::new();
        };
        self.tables
            .lock()
            .unwrap()
            .item_metrics
            .iter()
            .filter(|((id, _), _)| *id == item_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn item_metric_count(&self) -> usize {
        self.tables.lock().unwrap().item_metrics.len()
    }

    pub fn aggregate_count(&self) -> usize {
        self.tables.lock().unwrap().aggregates.len()
    }

    pub fn comments(&self) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .tables
            .lock()
            .unwrap()
            .comments
            .values()
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.platform_comment_id.cmp(&b.platform_comment_id));
        comments
    }

    pub fn runs(&self) -> Vec<StoredRun> {
        self.tables.lock().unwrap().runs.values().cloned().collect()
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn upsert_show(&self, ctx: &CollectContext, show: &Show) -> Result<i64, StoreError> {
        ensure_active(ctx, "upsert_show")?;
        if self.fail_show_upsert {
            return Err(StoreError::new("upsert_show", "injected failure"));
        }
        let mut t = self.tables.lock().unwrap();
        let key = (show.platform, show.platform_id.clone());
        let id = match t.shows.get(&key) {
            Some((id, _)) => *id,
            None => t.next_id(),
        };
        t.shows.insert(key, (id, show.clone()));
        Ok(id)
    }

    async fn upsert_item(
        &self,
        ctx: &CollectContext,
        show_id: i64,
        item: &ContentItem,
    ) -> Result<i64, StoreError> {
        ensure_active(ctx, "upsert_item")?;
        if self.failing_items.contains(&item.platform_item_id) {
            return Err(StoreError::new("upsert_item", "injected failure"));
        }
        let mut t = self.tables.lock().unwrap();
        let key = (show_id, item.platform_item_id.clone());
        let id = match t.items.get(&key) {
            Some((id, _)) => *id,
            None => t.next_id(),
        };
        t.items.insert(key, (id, item.clone()));
        Ok(id)
    }

    async fn upsert_item_metrics(
        &self,
        ctx: &CollectContext,
        item_id: i64,
        metrics: &ItemMetrics,
    ) -> Result<(), StoreError> {
        ensure_active(ctx, "upsert_item_metrics")?;
        if self.failing_metric_dates.contains(&metrics.metric_date) {
            return Err(StoreError::new("upsert_item_metrics", "injected failure"));
        }
        self.tables
            .lock()
            .unwrap()
            .item_metrics
            .insert((item_id, metrics.metric_date), metrics.clone());
        Ok(())
    }

    async fn upsert_aggregate_metrics(
        &self,
        ctx: &CollectContext,
        show_id: i64,
        metrics: &AggregateMetrics,
    ) -> Result<(), StoreError> {
        ensure_active(ctx, "upsert_aggregate_metrics")?;
        self.tables
            .lock()
            .unwrap()
            .aggregates
            .insert((show_id, metrics.metric_date), metrics.clone());
        Ok(())
    }

    async fn insert_comment(
        &self,
        ctx: &CollectContext,
        item_id: i64,
        comment: &Comment,
    ) -> Result<bool, StoreError> {
        ensure_active(ctx, "insert_comment")?;
        let mut t = self.tables.lock().unwrap();
        let key = (item_id, comment.platform_comment_id.clone());
        if t.comments.contains_key(&key) {
            return Ok(false);
        }
        t.comments.insert(key, comment.clone());
        Ok(true)
    }

    async fn record_run_start(
        &self,
        ctx: &CollectContext,
        platform: Platform,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        ensure_active(ctx, "record_run_start")?;
        if self.fail_run_start {
            return Err(StoreError::new("record_run_start", "injected failure"));
        }
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.runs.insert(
            id,
            StoredRun {
                platform,
                started_at,
                outcome: None,
                end_calls: 0,
            },
        );
        Ok(id)
    }

    async fn record_run_end(
        &self,
        ctx: &CollectContext,
        run_id: i64,
        outcome: &RunOutcome,
    ) -> Result<(), StoreError> {
        ensure_active(ctx, "record_run_end")?;
        let mut t = self.tables.lock().unwrap();
        let run = t
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| StoreError::new("record_run_end", "run not found"))?;
        run.end_calls += 1;
        if self.fail_run_end {
            return Err(StoreError::new("record_run_end", "injected failure"));
        }
        if run.outcome.is_some() {
            return Err(StoreError::new("record_run_end", "run is not running"));
        }
        run.outcome = Some(outcome.clone());
        Ok(())
    }
}

/// A [`PlatformSource`] that replays canned responses.
#[derive(Debug)]
pub(crate) struct ScriptedSource {
    pub platform: Platform,
    pub fail_show: bool,
    pub fail_items: bool,
    pub panic_on_items: bool,
    pub items: Vec<ContentItem>,
    pub metrics: HashMap<String, Vec<ItemMetrics>>,
    pub failing_metrics: HashSet<String>,
    /// `None` for a platform without comments.
    pub comments: Option<HashMap<String, Vec<Comment>>>,
    pub failing_comments: HashSet<String>,
    pub aggregates: Vec<AggregateMetrics>,
    pub fail_aggregates: bool,
    /// Cancel this handle once metrics for the named item are requested.
    pub cancel_on_metrics: Mutex<Option<(String, CancelHandle)>>,
    pub windows: Mutex<Vec<DateRange>>,
    pub shows_requested: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            fail_show: false,
            fail_items: false,
            panic_on_items: false,
            items: Vec::new(),
            metrics: HashMap::new(),
            failing_metrics: HashSet::new(),
            comments: Some(HashMap::new()),
            failing_comments: HashSet::new(),
            aggregates: Vec::new(),
            fail_aggregates: false,
            cancel_on_metrics: Mutex::new(None),
            windows: Mutex::new(Vec::new()),
            shows_requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_item(mut self, id: &str, metrics: Vec<ItemMetrics>, comments: Vec<Comment>) -> Self {
        self.items.push(item(id));
        self.metrics.insert(id.to_string(), metrics);
        if let Some(map) = self.comments.as_mut() {
            map.insert(id.to_string(), comments);
        }
        self
    }

    pub fn shows_requested(&self) -> Vec<String> {
        self.shows_requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformSource for ScriptedSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_show(&self, ctx: &CollectContext, show_name: &str) -> Result<Show, SourceError> {
        if ctx.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        self.shows_requested
            .lock()
            .unwrap()
            .push(show_name.to_string());
        if self.fail_show {
            return Err(SourceError::transport("fetch show", "connection refused"));
        }
        Ok(Show {
            platform: self.platform,
            platform_id: format!("{}-id", show_name.replace(' ', "-")),
            name: show_name.to_string(),
            description: None,
            author: None,
            categories: vec![],
            language: None,
            raw_data: serde_json::json!({}),
        })
    }

    async fn fetch_items(
        &self,
        _ctx: &CollectContext,
        _show: &Show,
    ) -> Result<Vec<ContentItem>, SourceError> {
        assert!(!self.panic_on_items, "scripted panic while listing items");
        if self.fail_items {
            return Err(SourceError::format("fetch items", "unexpected payload"));
        }
        Ok(self.items.clone())
    }

    async fn fetch_item_metrics(
        &self,
        _ctx: &CollectContext,
        item: &ContentItem,
        range: DateRange,
    ) -> Result<Vec<ItemMetrics>, SourceError> {
        self.windows.lock().unwrap().push(range);
        {
            let mut trigger = self.cancel_on_metrics.lock().unwrap();
            if trigger
                .as_ref()
                .is_some_and(|(id, _)| *id == item.platform_item_id)
            {
                if let Some((_, handle)) = trigger.take() {
                    handle.cancel();
                }
            }
        }
        if self.failing_metrics.contains(&item.platform_item_id) {
            return Err(SourceError::transport("fetch metrics", "timed out"));
        }
        Ok(self
            .metrics
            .get(&item.platform_item_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_aggregate_metrics(
        &self,
        _ctx: &CollectContext,
        _show: &Show,
        _range: DateRange,
    ) -> Result<Vec<AggregateMetrics>, SourceError> {
        if self.fail_aggregates {
            return Err(SourceError::transport("fetch aggregates", "timed out"));
        }
        Ok(self.aggregates.clone())
    }

    async fn fetch_comments(
        &self,
        _ctx: &CollectContext,
        item: &ContentItem,
    ) -> Result<Vec<Comment>, SourceError> {
        if self.failing_comments.contains(&item.platform_item_id) {
            return Err(SourceError::transport("fetch comments", "reset by peer"));
        }
        Ok(self
            .comments
            .as_ref()
            .and_then(|map| map.get(&item.platform_item_id).cloned())
            .unwrap_or_default())
    }
}

pub(crate) fn item(id: &str) -> ContentItem {
    ContentItem {
        platform_item_id: id.to_string(),
        title: format!("episode {id}"),
        description: None,
        content_type: None,
        url: None,
        duration_seconds: None,
        published_at: None,
        season_number: None,
        episode_number: None,
        raw_data: serde_json::json!({}),
    }
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn snapshot(metric_date: NaiveDate, views: i64) -> ItemMetrics {
    ItemMetrics {
        views: Some(views),
        ..ItemMetrics::for_date(metric_date)
    }
}

pub(crate) fn comment(id: &str, body: &str) -> Comment {
    Comment {
        platform_comment_id: id.to_string(),
        author_name: None,
        author_id: None,
        body: body.to_string(),
        likes_count: None,
        reply_count: None,
        parent_platform_comment_id: None,
        published_at: None,
    }
}
