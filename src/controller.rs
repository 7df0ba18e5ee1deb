//! Refresh controller: owns both timers and keeps the table, the row cache
//! and the aggregate counts consistent.
//!
//! Two periodic actions run on the UI thread:
//!
//! * the fast tick advances every countdown by one second through the row
//!   cache, touching nothing but countdown cells;
//! * the slow refresh asks for a new dataset. When one arrives it replaces the
//!   table contents wholesale, rebuilds the row cache, recomputes the counts,
//!   reapplies the active filter and rebuilds the row tooltips.
//!
//! Fetches themselves run elsewhere (see `source::Poller`); the controller
//! only decides when one is due and applies completions in arrival order.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::campaign::{Campaign, COLUMNS};
use crate::classify::{Classifier, Counts, Status, StatusFilter};
use crate::config::Settings;
use crate::rowcache::{CacheEntry, RowCache};
use crate::source::{FetchEvent, FetchResult};
use crate::table::{RowFilter, TableAdapter, TableRow};

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Deadlines of the two periodic actions.
#[derive(Clone, Debug)]
struct Schedule {
    tick_every: Duration,
    refresh_every: Duration,
    next_tick: Instant,
    next_refresh: Instant,
}

impl Schedule {
    fn starting_at(now: Instant, tick_every: Duration, refresh_every: Duration) -> Self {
        Self {
            tick_every,
            refresh_every,
            next_tick: now + tick_every,
            next_refresh: now + refresh_every,
        }
    }

    /// Most ticks replayed in one go after the loop fell behind.
    fn max_catch_up(&self) -> u32 {
        let ratio = self.refresh_every.as_millis() / self.tick_every.as_millis().max(1);
        u32::try_from(ratio).unwrap_or(u32::MAX).max(1)
    }
}

// ---------------------------------------------------------------------------
// RefreshController
// ---------------------------------------------------------------------------

pub struct RefreshController<A: TableAdapter> {
    table: A,
    cache: RowCache,
    classifier: Classifier,
    counts: Counts,
    status_filter: StatusFilter,
    search: String,
    tooltips: Vec<Option<String>>,
    tick_every: Duration,
    refresh_every: Duration,
    schedule: Option<Schedule>,
    loaded: bool,
    last_applied_request: u64,
    last_refresh: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl<A: TableAdapter> RefreshController<A> {
    pub fn new(mut table: A, settings: &Settings) -> Self {
        let classifier = Classifier::new(settings.upcoming_threshold, settings.translations.clone());

        let row_classifier = classifier.clone();
        table.register_row_created_hook(Box::new(move |_: usize, row: &Campaign| {
            Some(row_classifier.classify(row))
        }));

        Self {
            table,
            cache: RowCache::new(),
            classifier,
            counts: Counts::default(),
            status_filter: StatusFilter::All,
            search: String::new(),
            tooltips: Vec::new(),
            tick_every: settings.tick_interval(),
            refresh_every: settings.refresh_interval(),
            schedule: None,
            loaded: false,
            last_applied_request: 0,
            last_refresh: None,
            last_error: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Apply the initial fetch and start both timers.
    ///
    /// A falsy payload leaves the table unrendered; the next successful
    /// refresh populates it instead.
    pub fn startup(&mut self, initial: FetchResult, now: Instant) {
        match initial {
            Ok(Some(rows)) => self.apply_dataset(rows),
            Ok(None) => {
                tracing::info!("Initial payload was empty, waiting for the next refresh");
            }
            Err(e) => self.record_failure(e.to_string()),
        }
        self.schedule = Some(Schedule::starting_at(now, self.tick_every, self.refresh_every));
    }

    /// Run every tick that is due at `now` and report whether a refresh is
    /// due. Returns `false` before [`startup`](Self::startup).
    pub fn advance(&mut self, now: Instant) -> bool {
        let Some(mut schedule) = self.schedule.take() else {
            return false;
        };

        let max_ticks = schedule.max_catch_up();
        let mut ticks = 0;
        while now >= schedule.next_tick && ticks < max_ticks {
            self.tick();
            schedule.next_tick += schedule.tick_every;
            ticks += 1;
        }
        if now >= schedule.next_tick {
            tracing::debug!(ticks, "Tick timer fell behind, realigning");
            schedule.next_tick = now + schedule.tick_every;
        }

        let refresh_due = now >= schedule.next_refresh;
        if refresh_due {
            schedule.next_refresh += schedule.refresh_every;
            if now >= schedule.next_refresh {
                schedule.next_refresh = now + schedule.refresh_every;
            }
        }

        self.schedule = Some(schedule);
        refresh_due
    }

    /// Time left until the earliest timer fires.
    pub fn time_until_next(&self, now: Instant) -> Duration {
        match &self.schedule {
            Some(s) => s
                .next_tick
                .min(s.next_refresh)
                .saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Advance every countdown by one second. Counts are left alone; they
    /// only change when a refresh lands.
    pub fn tick(&mut self) -> usize {
        if self.cache.is_empty() {
            return 0;
        }
        self.cache.tick(&mut self.table, &self.classifier)
    }

    /// Apply a completed fetch. Completions are applied in arrival order,
    /// so a slow, older request can overwrite a newer one.
    pub fn on_fetch(&mut self, event: FetchEvent) {
        if event.request < self.last_applied_request {
            tracing::debug!(
                request = event.request,
                newest = self.last_applied_request,
                "Applying fetch that finished after a newer one"
            );
        }
        self.last_applied_request = self.last_applied_request.max(event.request);

        match event.result {
            Ok(Some(rows)) => {
                tracing::info!(
                    request = event.request,
                    rows = rows.len(),
                    elapsed_ms = event.elapsed.as_millis() as u64,
                    "Refreshed campaigns"
                );
                self.apply_dataset(rows);
            }
            Ok(None) => self.record_failure("endpoint returned an empty payload".to_string()),
            Err(e) => self.record_failure(e.to_string()),
        }
    }

    fn record_failure(&mut self, message: String) {
        tracing::warn!(error = %message, "Campaign refresh failed, keeping previous data");
        self.last_error = Some(message);
    }

    /// Replace the whole dataset and bring everything derived from it up to
    /// date.
    fn apply_dataset(&mut self, rows: Vec<Campaign>) {
        if self.loaded {
            self.table.clear_and_replace(rows);
        } else {
            self.table.load(rows);
            self.loaded = true;
        }

        self.cache.rebuild(&self.table, &self.classifier);
        self.counts = self.aggregate();
        tracing::debug!(
            rows = self.cache.len(),
            upcoming = self.counts.upcoming,
            active = self.counts.active,
            other = self.counts.other(),
            "Rebuilt row cache"
        );
        self.reapply_filter();
        self.refresh_decorations();

        self.last_refresh = Some(Utc::now());
        self.last_error = None;
    }

    fn aggregate(&self) -> Counts {
        let table = &self.table;
        self.classifier
            .aggregate((0..table.row_count()).filter_map(|i| table.row_data(i)))
    }

    fn refresh_decorations(&mut self) {
        self.tooltips = (0..self.table.row_count())
            .map(|i| self.table.row_data(i).and_then(Campaign::tooltip))
            .collect();
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.status_filter = filter;
        self.reapply_filter();
    }

    pub fn set_search(&mut self, query: &str) {
        self.search = query.to_string();
        self.reapply_filter();
    }

    fn build_filter(&self) -> Option<RowFilter> {
        let status = self.status_filter;
        let needle = self.search.trim().to_lowercase();
        if status == StatusFilter::All && needle.is_empty() {
            return None;
        }

        Some(Box::new(move |row: &TableRow| {
            status.matches(row.status().unwrap_or(Status::Other))
                && (needle.is_empty()
                    || COLUMNS.iter().any(|column| {
                        (column.filter_key)(&row.data)
                            .to_lowercase()
                            .contains(&needle)
                    }))
        }))
    }

    fn reapply_filter(&mut self) {
        let filter = self.build_filter();
        self.table.apply_custom_filter(filter);
        self.table.redraw();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn table(&self) -> &A {
        &self.table
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn cached_rows(&self) -> usize {
        self.cache.len()
    }

    /// Live countdown state of the row at `row_index`.
    pub fn live_entry(&self, row_index: usize) -> Option<&CacheEntry> {
        self.cache
            .get(row_index)
            .filter(|entry| entry.row_index == row_index)
    }

    pub fn tooltip(&self, row_index: usize) -> Option<&str> {
        self.tooltips.get(row_index).and_then(|t| t.as_deref())
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{DisplayOptions, COUNTDOWN_COLUMN};
    use crate::source::FetchError;
    use crate::table::{CampaignTable, CellContent, CellHandle, CellSink, RowCreatedHook};

    fn settings() -> Settings {
        Settings {
            tick_interval_ms: 1_000,
            refresh_interval_ms: 30_000,
            ..Settings::default()
        }
    }

    fn controller_table() -> CampaignTable {
        CampaignTable::new(
            DisplayOptions {
                datetime_format: "%H:%M".to_string(),
            },
            COUNTDOWN_COLUMN,
            false,
            Vec::new(),
        )
    }

    fn controller() -> RefreshController<CampaignTable> {
        RefreshController::new(controller_table(), &settings())
    }

    fn campaign(system: &str, active: bool, remaining: i64) -> Campaign {
        Campaign {
            solar_system_name: system.to_string(),
            active_campaign: if active { "Yes" } else { "No" }.to_string(),
            remaining_time_in_seconds: remaining,
            campaign_progress: if active {
                "60%<i title=\"Defenders making progress\">trending_up</i>62%".to_string()
            } else {
                "60%".to_string()
            },
            ..Default::default()
        }
    }

    fn dataset_a() -> Vec<Campaign> {
        vec![
            campaign("A1", true, -300),
            campaign("A2", false, 600),
            campaign("A3", false, 90_000),
        ]
    }

    fn dataset_b() -> Vec<Campaign> {
        vec![campaign("B1", false, 100), campaign("B2", false, 200)]
    }

    fn fetched(request: u64, result: FetchResult) -> FetchEvent {
        FetchEvent {
            request,
            elapsed: Duration::from_millis(5),
            result,
        }
    }

    fn systems(c: &RefreshController<CampaignTable>) -> Vec<String> {
        let table = c.table();
        let mut names: Vec<String> = (0..table.row_count())
            .map(|i| table.row_data(i).unwrap().solar_system_name.clone())
            .collect();
        names.sort();
        names
    }

    fn visible(c: &RefreshController<CampaignTable>) -> Vec<String> {
        let table = c.table();
        table
            .visible()
            .iter()
            .map(|i| table.row_data(*i).unwrap().solar_system_name.clone())
            .collect()
    }

    #[test]
    fn test_startup_loads_and_counts() {
        let mut c = controller();
        c.startup(Ok(Some(dataset_a())), Instant::now());
        assert!(c.is_loaded());
        assert_eq!(
            c.counts(),
            Counts {
                total: 3,
                upcoming: 1,
                active: 1
            }
        );
        assert_eq!(c.cached_rows(), 3);
        assert_eq!(c.tooltip(0), Some("Defenders making progress"));
        assert_eq!(c.tooltip(1), None);
        assert!(c.last_refresh().is_some());
    }

    #[test]
    fn test_startup_with_falsy_payload_skips_table() {
        let mut c = controller();
        let now = Instant::now();
        c.startup(Ok(None), now);
        assert!(!c.is_loaded());
        assert!(!c.table().is_loaded());
        assert_eq!(c.counts(), Counts::default());

        // Timers still run, and a later refresh can populate the table.
        assert!(c.advance(now + Duration::from_secs(30)));
        c.on_fetch(fetched(1, Ok(Some(dataset_b()))));
        assert!(c.is_loaded());
        assert_eq!(c.counts().total, 2);
    }

    #[test]
    fn test_refresh_replaces_never_merges() {
        let mut c = controller();
        c.startup(Ok(Some(dataset_a())), Instant::now());
        c.on_fetch(fetched(1, Ok(Some(dataset_b()))));
        assert_eq!(systems(&c), vec!["B1", "B2"]);
        assert_eq!(c.counts().total, 2);
        assert_eq!(c.cached_rows(), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_state() {
        let mut c = controller();
        c.startup(Ok(Some(dataset_a())), Instant::now());
        let counts = c.counts();

        let error = FetchError::Status(502);
        c.on_fetch(fetched(1, Err(error)));
        assert_eq!(systems(&c), vec!["A1", "A2", "A3"]);
        assert_eq!(c.counts(), counts);
        assert_eq!(c.last_error(), Some("endpoint answered with HTTP 502"));

        c.on_fetch(fetched(2, Ok(None)));
        assert_eq!(c.counts(), counts);
        assert!(c.last_error().is_some());

        c.on_fetch(fetched(3, Ok(Some(dataset_a()))));
        assert_eq!(c.last_error(), None);
    }

    #[test]
    fn test_ticks_do_not_touch_counts() {
        let mut c = controller();
        // One second above the upcoming threshold: the first tick crosses it.
        c.startup(Ok(Some(vec![campaign("E", false, 14_401)])), Instant::now());
        assert_eq!(c.counts().upcoming, 0);

        assert_eq!(c.tick(), 1);
        assert_eq!(c.counts().upcoming, 0);
        let row = c.table().row(0).unwrap();
        assert_eq!(row.cells[COUNTDOWN_COLUMN].text(), "0d 04h 00m 00s");

        c.on_fetch(fetched(1, Ok(Some(vec![campaign("E", false, 14_399)]))));
        assert_eq!(c.counts().upcoming, 1);
    }

    #[test]
    fn test_status_filter_uses_ticked_status() {
        let mut c = controller();
        c.startup(
            Ok(Some(vec![campaign("E", false, 14_401), campaign("F", false, 90_000)])),
            Instant::now(),
        );
        c.set_status_filter(StatusFilter::Upcoming);
        assert!(visible(&c).is_empty());

        c.set_status_filter(StatusFilter::All);
        c.tick();
        let row = c.table().row(0).unwrap();
        assert_eq!(row.status(), Some(Status::Upcoming));
        assert_eq!(c.live_entry(0).unwrap().remaining_seconds, 14_400);

        c.set_status_filter(StatusFilter::Upcoming);
        assert_eq!(visible(&c), vec!["E"]);

        // Search keeps working against the row data alongside the live status.
        c.set_search("f");
        assert!(visible(&c).is_empty());
        c.set_search("e");
        assert_eq!(visible(&c), vec!["E"]);
    }

    #[test]
    fn test_live_entry_matches_row_index() {
        let mut c = controller();
        assert!(c.live_entry(0).is_none());
        c.startup(Ok(Some(dataset_b())), Instant::now());
        let entry = c.live_entry(1).unwrap();
        assert_eq!(entry.row_index, 1);
        assert_eq!(entry.remaining_seconds, 200);
        assert!(!entry.active);
        assert!(c.live_entry(2).is_none());
    }

    #[test]
    fn test_advance_drives_both_timers() {
        let mut c = controller();
        let start = Instant::now();
        assert!(!c.advance(start));
        c.startup(Ok(Some(vec![campaign("T", false, 10)])), start);

        assert!(!c.advance(start + Duration::from_millis(500)));
        assert_eq!(
            c.time_until_next(start + Duration::from_millis(500)),
            Duration::from_millis(500)
        );

        assert!(!c.advance(start + Duration::from_millis(3_000)));
        let text = c.table().row(0).unwrap().cells[COUNTDOWN_COLUMN].text();
        assert_eq!(text, "0d 00h 00m 07s");

        assert!(c.advance(start + Duration::from_secs(30)));
        assert!(!c.advance(start + Duration::from_secs(31)));
        assert!(c.advance(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_catch_up_is_bounded() {
        let mut c = controller();
        let start = Instant::now();
        c.startup(Ok(Some(vec![campaign("T", false, 1_000)])), start);

        // An hour-long stall replays at most one refresh interval of ticks.
        assert!(c.advance(start + Duration::from_secs(3_600)));
        let text = c.table().row(0).unwrap().cells[COUNTDOWN_COLUMN].text();
        assert_eq!(text, "0d 00h 16m 10s");
    }

    #[test]
    fn test_filter_is_reapplied_after_refresh() {
        let mut c = controller();
        c.startup(Ok(Some(dataset_a())), Instant::now());
        c.set_status_filter(StatusFilter::Active);
        assert_eq!(visible(&c), vec!["A1"]);

        c.on_fetch(fetched(
            1,
            Ok(Some(vec![
                campaign("C1", true, -1),
                campaign("C2", false, 5),
                campaign("C3", true, -2),
            ])),
        ));
        let mut shown = visible(&c);
        shown.sort();
        assert_eq!(shown, vec!["C1", "C3"]);

        c.set_status_filter(StatusFilter::Upcoming);
        assert_eq!(visible(&c), vec!["C2"]);
    }

    #[test]
    fn test_search_combines_with_status() {
        let mut c = controller();
        c.startup(Ok(Some(dataset_a())), Instant::now());
        c.set_search("a2");
        assert_eq!(visible(&c), vec!["A2"]);

        c.set_status_filter(StatusFilter::Active);
        assert!(visible(&c).is_empty());

        c.set_search("");
        c.set_status_filter(StatusFilter::All);
        assert_eq!(visible(&c).len(), 3);
    }

    #[test]
    fn test_late_completion_still_overwrites() {
        let mut c = controller();
        c.startup(Ok(Some(dataset_a())), Instant::now());
        c.on_fetch(fetched(2, Ok(Some(dataset_b()))));
        c.on_fetch(fetched(1, Ok(Some(dataset_a()))));
        assert_eq!(systems(&c), vec!["A1", "A2", "A3"]);
    }

    /// Adapter that records every mutating call before forwarding it.
    struct Recorder {
        inner: CampaignTable,
        calls: Vec<&'static str>,
    }

    impl CellSink for Recorder {
        fn patch_cell_content(&mut self, handle: CellHandle, content: CellContent) -> bool {
            self.calls.push("patch");
            self.inner.patch_cell_content(handle, content)
        }
    }

    impl TableAdapter for Recorder {
        fn load(&mut self, rows: Vec<Campaign>) {
            self.calls.push("load");
            self.inner.load(rows)
        }
        fn clear_and_replace(&mut self, rows: Vec<Campaign>) {
            self.calls.push("clear_and_replace");
            self.inner.clear_and_replace(rows)
        }
        fn row_count(&self) -> usize {
            self.inner.row_count()
        }
        fn row_data(&self, index: usize) -> Option<&Campaign> {
            self.inner.row_data(index)
        }
        fn get_cell(&self, row: usize, column: usize) -> Option<CellHandle> {
            self.inner.get_cell(row, column)
        }
        fn redraw(&mut self) {
            self.calls.push("redraw");
            self.inner.redraw()
        }
        fn register_row_created_hook(&mut self, hook: RowCreatedHook) {
            self.calls.push("hook");
            self.inner.register_row_created_hook(hook)
        }
        fn apply_custom_filter(&mut self, predicate: Option<RowFilter>) {
            self.calls.push("filter");
            self.inner.apply_custom_filter(predicate)
        }
    }

    #[test]
    fn test_adapter_call_sequence() {
        let recorder = Recorder {
            inner: controller_table(),
            calls: Vec::new(),
        };
        let mut c = RefreshController::new(recorder, &settings());
        c.startup(Ok(Some(dataset_a())), Instant::now());
        assert_eq!(c.table().calls, vec!["hook", "load", "filter", "redraw"]);

        c.table.calls.clear();
        c.tick();
        assert_eq!(c.table().calls, vec!["patch", "patch", "patch"]);

        c.table.calls.clear();
        c.on_fetch(fetched(1, Ok(Some(dataset_b()))));
        assert_eq!(
            c.table().calls,
            vec!["clear_and_replace", "filter", "redraw"]
        );

        c.table.calls.clear();
        c.on_fetch(fetched(2, Err(FetchError::Status(502))));
        assert!(c.table().calls.is_empty());
    }
}

