//! Record Store
//!
//! Orchestrates persistence and notification for the two collections:
//! - Reads parse the whole collection from the backend on every call
//! - Writes read fresh, modify, and rewrite the whole collection
//! - Every write of this instance notifies subscribers before returning
//! - The change relay turns writes of other instances into `External` events
//!
//! Read-modify-write cycles of one instance are serialized by a mutex.
//! Between instances sharing a backend the last whole-collection write wins.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Interval, MissedTickBehavior};
use uuid::Uuid;

use super::backend::{checksum, InstanceId, KeyChange, StorageBackend};
use super::error::{StoreError, StoreResult};
use super::events::{Notifier, StoreEvent, Subscription};
use super::types::{
    generate_id, Alert, Collection, NewAlert, NewReport, Report, ReportStatus, UpdateOutcome,
};

/// Tuning knobs of a store instance
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Capacity of the async event channel
    pub event_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
        }
    }
}

/// State guarded by the writer lock
struct WriterState {
    /// Highest `createdAt` handed out so far, in unix millis
    last_created_ms: i64,
    /// Last CRC32 of each collection this instance wrote or already announced
    checksums: HashMap<Collection, u32>,
}

/// Persistent reports/alerts store with change notification
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    notifier: Arc<Notifier>,
    instance: InstanceId,
    writer: Mutex<WriterState>,
}

impl RecordStore {
    /// Create a store over a backend with default options
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    /// Create a store over a backend
    pub fn with_options(backend: Arc<dyn StorageBackend>, options: StoreOptions) -> Self {
        let instance = Uuid::new_v4();
        tracing::debug!(instance = %instance, backend = backend.kind(), "Record store created");

        Self {
            backend,
            notifier: Notifier::new(options.event_capacity),
            instance,
            writer: Mutex::new(WriterState {
                last_created_ms: 0,
                checksums: HashMap::new(),
            }),
        }
    }

    /// Name of the underlying backend
    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// All reports, most recent first.
    ///
    /// A missing, unreadable or malformed collection reads as empty.
    pub fn get_all_reports(&self) -> Vec<Report> {
        self.read_collection(Collection::Reports)
    }

    /// Reports submitted by one user, in collection order
    pub fn get_reports_by_user(&self, user_id: &str) -> Vec<Report> {
        self.get_all_reports()
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect()
    }

    /// Look up a single report
    pub fn get_report(&self, id: &str) -> Option<Report> {
        self.get_all_reports().into_iter().find(|r| r.id == id)
    }

    /// Create a report and prepend it to the collection
    pub fn add_report(&self, new_report: NewReport) -> StoreResult<Report> {
        let report = {
            let mut writer = self.lock_writer()?;
            let mut reports: Vec<Report> = self.load_for_write(Collection::Reports)?;

            let created_at = next_created_at(&mut writer);
            let id = unique_id(created_at, |id| reports.iter().any(|r| r.id == id));
            let report = new_report.into_report(id, created_at);

            reports.insert(0, report.clone());
            self.save(&mut writer, Collection::Reports, &reports)?;
            report
        };

        tracing::info!(
            report_id = %report.id,
            user_id = %report.user_id,
            kind = %report.kind,
            "Report created"
        );

        self.notifier.publish(StoreEvent::local(Collection::Reports));
        Ok(report)
    }

    /// Change the status of a report.
    ///
    /// Returns `NotFound` without touching the backend when no report has `id`.
    pub fn update_report_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> StoreResult<UpdateOutcome> {
        let (updated, previous) = {
            let mut writer = self.lock_writer()?;
            let mut reports: Vec<Report> = self.load_for_write(Collection::Reports)?;

            let Some(report) = reports.iter_mut().find(|r| r.id == id) else {
                tracing::warn!(report_id = %id, status = %status, "Status update for unknown report");
                return Ok(UpdateOutcome::NotFound);
            };

            let previous = report.status;
            report.status = status;
            let updated = report.clone();

            self.save(&mut writer, Collection::Reports, &reports)?;
            (updated, previous)
        };

        tracing::info!(
            report_id = %updated.id,
            from = %previous,
            to = %status,
            "Report status changed"
        );

        self.notifier.publish(StoreEvent::local(Collection::Reports));
        Ok(UpdateOutcome::Updated(updated))
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    /// All alerts, most recent first
    pub fn get_all_alerts(&self) -> Vec<Alert> {
        self.read_collection(Collection::Alerts)
    }

    /// Create an alert and prepend it to the collection
    pub fn add_alert(&self, new_alert: NewAlert) -> StoreResult<Alert> {
        let alert = {
            let mut writer = self.lock_writer()?;
            let mut alerts: Vec<Alert> = self.load_for_write(Collection::Alerts)?;

            let created_at = next_created_at(&mut writer);
            let id = unique_id(created_at, |id| alerts.iter().any(|a| a.id == id));
            let alert = new_alert.into_alert(id, created_at);

            alerts.insert(0, alert.clone());
            self.save(&mut writer, Collection::Alerts, &alerts)?;
            alert
        };

        tracing::info!(alert_id = %alert.id, author_id = %alert.author_id, "Alert published");

        self.notifier.publish(StoreEvent::local(Collection::Alerts));
        Ok(alert)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Register a callback for changes to either collection.
    ///
    /// Writes made through this instance invoke the callback synchronously
    /// before the write returns. Writes made elsewhere are delivered once the
    /// change relay (see [`RecordStore::start_change_relay`]) observes them.
    pub fn on_store_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Async stream of the same events
    pub fn subscribe_channel(&self) -> broadcast::Receiver<StoreEvent> {
        self.notifier.channel()
    }

    /// Start relaying changes written by other instances.
    ///
    /// Backend change signals from other origins are republished as
    /// `External` events. With `poll_interval` set, the backend is also
    /// re-read periodically and a changed CRC32 of a collection counts as an
    /// external write, which covers other processes sharing files or a database.
    /// Checksums of this instance's own writes are recorded while the write
    /// holds the writer lock, so polling never reports them as external.
    pub fn start_change_relay(
        self: &Arc<Self>,
        poll_interval: Option<Duration>,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let mut changes = self.backend.watch();
        match self.lock_writer() {
            Ok(mut writer) => {
                for collection in Collection::all() {
                    let current = self.collection_checksum(*collection);
                    writer.checksums.insert(*collection, current);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Cannot record initial checksums"),
        }

        tokio::spawn(async move {
            let mut ticker = poll_interval.map(|period| {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval
            });

            tracing::debug!(
                instance = %store.instance,
                polling = ?poll_interval,
                "Change relay started"
            );

            loop {
                tokio::select! {
                    biased;
                    change = changes.recv() => match change {
                        Ok(change) => store.relay_key_change(&change),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Change relay lagged, resyncing by checksum");
                            store.poll_collections();
                        }
                        Err(RecvError::Closed) => {
                            tracing::debug!("Backend change feed closed, stopping relay");
                            break;
                        }
                    },
                    _ = next_tick(&mut ticker) => store.poll_collections(),
                }
            }
        })
    }

    fn relay_key_change(&self, change: &KeyChange) {
        let Some(collection) = Collection::from_storage_key(&change.key) else {
            return;
        };

        // Our own writes were already announced synchronously
        if change.origin == Some(self.instance) {
            return;
        }

        // Already seen by polling, or overwritten since: nothing new to announce
        if self.detect_external(&[collection]).is_empty() {
            return;
        }

        tracing::debug!(collection = %collection, origin = ?change.origin, "External change relayed");
        self.notifier.publish(StoreEvent::external(collection));
    }

    fn poll_collections(&self) {
        for collection in self.detect_external(Collection::all()) {
            tracing::debug!(collection = %collection, "External change detected by polling");
            self.notifier.publish(StoreEvent::external(collection));
        }
    }

    /// Collections whose stored checksum differs from the last known one.
    ///
    /// Runs under the writer lock, so a write of this instance is either not
    /// on the backend yet or already recorded in `checksums`.
    fn detect_external(&self, collections: &[Collection]) -> Vec<Collection> {
        let mut writer = match self.lock_writer() {
            Ok(writer) => writer,
            Err(e) => {
                tracing::warn!(error = %e, "Change detection skipped");
                return Vec::new();
            }
        };

        collections
            .iter()
            .copied()
            .filter(|collection| {
                let current = self.collection_checksum(*collection);
                writer.checksums.insert(*collection, current) != Some(current)
            })
            .collect()
    }

    fn collection_checksum(&self, collection: Collection) -> u32 {
        match self.backend.get(collection.storage_key()) {
            Ok(value) => checksum(value.as_deref()),
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Checksum read failed");
                0
            }
        }
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Probe the backend with a read of the reports key
    pub fn check_backend(&self) -> StoreResult<()> {
        self.backend.get(Collection::Reports.storage_key()).map(|_| ())
    }

    /// Counts of records by status and of subscribers
    pub fn stats(&self) -> StoreStats {
        let reports = self.get_all_reports();
        let count = |status: ReportStatus| reports.iter().filter(|r| r.status == status).count();

        StoreStats {
            backend: self.backend.kind(),
            reports: reports.len(),
            pending: count(ReportStatus::Pending),
            in_progress: count(ReportStatus::InProgress),
            resolved: count(ReportStatus::Resolved),
            alerts: self.get_all_alerts().len(),
            subscribers: self.notifier.subscriber_count(),
        }
    }

    // ------------------------------------------------------------------
    // Persistence helpers
    // ------------------------------------------------------------------

    fn lock_writer(&self) -> StoreResult<MutexGuard<'_, WriterState>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::poisoned("record store writer"))
    }

    fn read_collection<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        match self.backend.get(collection.storage_key()) {
            Ok(Some(raw)) => parse_or_empty(collection, &raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Collection unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Like `read_collection`, but backend failures abort the write
    fn load_for_write<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<Vec<T>> {
        Ok(match self.backend.get(collection.storage_key())? {
            Some(raw) => parse_or_empty(collection, &raw),
            None => Vec::new(),
        })
    }

    fn save<T: Serialize>(
        &self,
        writer: &mut WriterState,
        collection: Collection,
        records: &[T],
    ) -> StoreResult<()> {
        let json = serde_json::to_string(records)?;
        self.backend
            .set(collection.storage_key(), &json, Some(self.instance))
            .map_err(|e| {
                tracing::error!(collection = %collection, error = %e, "Collection write failed");
                e
            })?;

        writer
            .checksums
            .insert(collection, checksum(Some(&json)));
        Ok(())
    }
}

fn parse_or_empty<T: DeserializeOwned>(collection: Collection, raw: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(collection = %collection, error = %e, "Malformed collection, treating as empty");
        Vec::new()
    })
}

/// Creation timestamp at millisecond precision, never earlier than the last one
fn next_created_at(writer: &mut WriterState) -> DateTime<Utc> {
    let now_ms = Utc::now().timestamp_millis();
    let millis = now_ms.max(writer.last_created_ms);
    writer.last_created_ms = millis;
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

fn unique_id(created_at: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate_id(created_at);
        if !taken(&id) {
            return id;
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub backend: &'static str,
    pub reports: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub alerts: usize,
    pub subscribers: usize,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backend: {}, Reports: {} ({} pending, {} in progress, {} resolved), Alerts: {}, Subscribers: {}",
            self.backend,
            self.reports,
            self.pending,
            self.in_progress,
            self.resolved,
            self.alerts,
            self.subscribers
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::{FileBackend, MemoryBackend, SqliteBackend};
    use crate::store::events::ChangeOrigin;
    use crate::store::types::{ReportKind, ALERTS_KEY, REPORTS_KEY};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn memory_store() -> (RecordStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::new(backend.clone());
        (store, backend)
    }

    fn suggestion(user: &str, title: &str) -> NewReport {
        NewReport::new(user, ReportKind::Suggestion, title, format!("{} please", title))
    }

    #[test]
    fn test_empty_store() {
        let (store, _) = memory_store();
        assert!(store.get_all_reports().is_empty());
        assert!(store.get_all_alerts().is_empty());
        let stats = store.stats();
        assert_eq!(stats.reports, 0);
        assert_eq!(stats.alerts, 0);
    }

    #[test]
    fn test_add_report_assigns_system_fields() {
        let (store, _) = memory_store();
        let input = NewReport::new("citizen-1", ReportKind::Feedback, "Potholes", "Main St")
            .location("Main St & 3rd");

        let created = store.add_report(input.clone()).unwrap();
        assert_eq!(created.status, ReportStatus::Pending);
        assert!(!created.id.is_empty());

        let all = store.get_all_reports();
        assert_eq!(all.len(), 1);
        let stored = &all[0];
        assert_eq!(stored, &created);
        assert_eq!(stored.user_id, input.user_id);
        assert_eq!(stored.kind, input.kind);
        assert_eq!(stored.title, input.title);
        assert_eq!(stored.description, input.description);
        assert_eq!(stored.location, input.location);
    }

    #[test]
    fn test_add_report_status_override() {
        let (store, _) = memory_store();
        let created = store
            .add_report(suggestion("u", "Park").status(ReportStatus::InProgress))
            .unwrap();
        assert_eq!(created.status, ReportStatus::InProgress);
    }

    #[test]
    fn test_ids_unique_and_timestamps_monotonic() {
        let (store, _) = memory_store();
        let mut ids = HashSet::new();
        let mut last = None;

        for i in 0..200 {
            let report = store.add_report(suggestion("u", &format!("r{}", i))).unwrap();
            assert!(ids.insert(report.id.clone()), "duplicate id {}", report.id);
            if let Some(prev) = last {
                assert!(report.created_at >= prev);
            }
            last = Some(report.created_at);
        }
    }

    #[test]
    fn test_reports_are_most_recent_first() {
        let (store, _) = memory_store();
        let first = store.add_report(suggestion("u", "first")).unwrap();
        let second = store.add_report(suggestion("u", "second")).unwrap();

        let all = store.get_all_reports();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[test]
    fn test_update_status_changes_only_target() {
        let (store, _) = memory_store();
        let a = store.add_report(suggestion("u1", "a")).unwrap();
        let b = store.add_report(suggestion("u2", "b")).unwrap();
        let c = store.add_report(suggestion("u1", "c")).unwrap();
        let before = store.get_all_reports();

        let outcome = store
            .update_report_status(&b.id, ReportStatus::Resolved)
            .unwrap();
        match outcome {
            UpdateOutcome::Updated(report) => {
                assert_eq!(report.id, b.id);
                assert_eq!(report.status, ReportStatus::Resolved);
            }
            UpdateOutcome::NotFound => panic!("Expected Updated"),
        }

        let after = store.get_all_reports();
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(after.iter()) {
            if old.id == b.id {
                assert_eq!(new.status, ReportStatus::Resolved);
                assert_eq!(
                    Report {
                        status: old.status,
                        ..new.clone()
                    },
                    *old
                );
            } else {
                assert_eq!(old, new);
            }
        }
        assert!(after.iter().any(|r| r.id == a.id));
        assert!(after.iter().any(|r| r.id == c.id));
    }

    #[test]
    fn test_any_status_transition_allowed() {
        let (store, _) = memory_store();
        let report = store.add_report(suggestion("u", "x")).unwrap();

        for status in [
            ReportStatus::Resolved,
            ReportStatus::Pending,
            ReportStatus::InProgress,
            ReportStatus::Resolved,
        ] {
            assert!(store
                .update_report_status(&report.id, status)
                .unwrap()
                .is_updated());
            assert_eq!(store.get_report(&report.id).unwrap().status, status);
        }
    }

    #[test]
    fn test_update_unknown_id_leaves_bytes_unchanged() {
        let (store, backend) = memory_store();
        store.add_report(suggestion("u", "x")).unwrap();
        let before = backend.get(REPORTS_KEY).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.on_store_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = store
            .update_report_status("nonexistent-id", ReportStatus::Resolved)
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert_eq!(backend.get(REPORTS_KEY).unwrap(), before);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reports_by_user_preserves_order() {
        let (store, _) = memory_store();
        for (user, title) in [("u1", "a"), ("u2", "b"), ("u1", "c"), ("u3", "d"), ("u1", "e")] {
            store.add_report(suggestion(user, title)).unwrap();
        }

        let expected: Vec<Report> = store
            .get_all_reports()
            .into_iter()
            .filter(|r| r.user_id == "u1")
            .collect();
        let mine = store.get_reports_by_user("u1");

        assert_eq!(mine, expected);
        let titles: Vec<&str> = mine.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["e", "c", "a"]);
        assert!(store.get_reports_by_user("nobody").is_empty());
    }

    #[test]
    fn test_malformed_collection_reads_as_empty() {
        let (store, backend) = memory_store();
        backend.set(REPORTS_KEY, "{not json", None).unwrap();
        backend.set(ALERTS_KEY, "[{\"id\": 3}]", None).unwrap();

        assert!(store.get_all_reports().is_empty());
        assert!(store.get_all_alerts().is_empty());

        // Writing over corrupt data starts a fresh collection
        store.add_report(suggestion("u", "fresh")).unwrap();
        assert_eq!(store.get_all_reports().len(), 1);
    }

    #[test]
    fn test_unavailable_backend_surfaces_errors() {
        let (store, backend) = memory_store();
        store.add_report(suggestion("u", "x")).unwrap();
        backend.set_available(false);

        assert!(store.get_all_reports().is_empty());
        assert!(matches!(
            store.add_report(suggestion("u", "y")),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.update_report_status("any", ReportStatus::Resolved),
            Err(StoreError::Unavailable(_))
        ));

        assert!(store.check_backend().is_err());

        backend.set_available(true);
        assert!(store.check_backend().is_ok());
        assert_eq!(store.get_all_reports().len(), 1);
    }

    #[test]
    fn test_quota_exceeded_is_surfaced_and_nothing_notified() {
        let backend = Arc::new(MemoryBackend::with_quota(400));
        let store = RecordStore::new(backend.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.on_store_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_alert(NewAlert::new("a", "t", "m")).unwrap();
        let long = "x".repeat(500);
        let err = store.add_alert(NewAlert::new("a", "t", long)).unwrap_err();

        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(store.get_all_alerts().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_alert_notifies_once_synchronously() {
        let (store, _) = memory_store();
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = store.on_store_update(move |event| {
            sink.lock().unwrap().push(*event);
        });

        let alert = store
            .add_alert(NewAlert::new("authority-1", "Road closed", "Bridge works"))
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], StoreEvent::local(Collection::Alerts));
        assert_eq!(store.get_all_alerts(), vec![alert]);
    }

    #[test]
    fn test_callback_may_read_store() {
        let (store, _) = memory_store();
        let store = Arc::new(store);
        let seen = Arc::new(AtomicUsize::new(0));

        let reader = Arc::clone(&store);
        let count = Arc::clone(&seen);
        let _sub = store.on_store_update(move |_| {
            count.store(reader.get_all_reports().len(), Ordering::SeqCst);
        });

        store.add_report(suggestion("u", "x")).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_callbacks() {
        let (store, _) = memory_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = store.on_store_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_report(suggestion("u", "x")).unwrap();
        sub.unsubscribe();
        store.add_report(suggestion("u", "y")).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().subscribers, 0);
    }

    #[test]
    fn test_fresh_store_reads_same_collection() {
        let dir = tempdir().unwrap();
        let (reports, alerts) = {
            let store = RecordStore::new(Arc::new(FileBackend::open(dir.path()).unwrap()));
            store.add_report(suggestion("u1", "a").location("Park")).unwrap();
            store.add_report(suggestion("u2", "b")).unwrap();
            store.add_alert(NewAlert::new("a1", "Heat", "Stay hydrated")).unwrap();
            (store.get_all_reports(), store.get_all_alerts())
        };

        let reopened = RecordStore::new(Arc::new(FileBackend::open(dir.path()).unwrap()));
        assert_eq!(reopened.get_all_reports(), reports);
        assert_eq!(reopened.get_all_alerts(), alerts);
    }

    #[test]
    fn test_sqlite_backed_store() {
        let store = RecordStore::new(Arc::new(SqliteBackend::open_in_memory().unwrap()));
        let report = store.add_report(suggestion("u", "x")).unwrap();
        store
            .update_report_status(&report.id, ReportStatus::InProgress)
            .unwrap();
        assert_eq!(
            store.get_report(&report.id).unwrap().status,
            ReportStatus::InProgress
        );
    }

    #[test]
    fn test_stats_counts_statuses() {
        let (store, _) = memory_store();
        let a = store.add_report(suggestion("u", "a")).unwrap();
        let b = store.add_report(suggestion("u", "b")).unwrap();
        store.add_report(suggestion("u", "c")).unwrap();
        store.update_report_status(&a.id, ReportStatus::Resolved).unwrap();
        store.update_report_status(&b.id, ReportStatus::InProgress).unwrap();
        store.add_alert(NewAlert::new("x", "y", "z")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.reports, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.alerts, 1);
    }

    #[tokio::test]
    async fn test_second_instance_observes_change() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = RecordStore::new(backend.clone());
        let observer = Arc::new(RecordStore::new(backend.clone()));

        let relay = observer.start_change_relay(None);
        let mut rx = observer.subscribe_channel();

        writer.add_alert(NewAlert::new("a", "Flood", "Avoid the river road")).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event relayed")
            .unwrap();
        assert_eq!(event, StoreEvent::external(Collection::Alerts));
        assert_eq!(observer.get_all_alerts().len(), 1);

        relay.abort();
    }

    #[tokio::test]
    async fn test_relay_skips_own_writes() {
        let store = Arc::new(RecordStore::new(Arc::new(MemoryBackend::new())));
        let relay = store.start_change_relay(None);
        let mut rx = store.subscribe_channel();

        store.add_report(suggestion("u", "x")).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.origin, ChangeOrigin::Local);

        let more = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(more.is_err(), "own write was relayed as external");

        relay.abort();
    }

    #[tokio::test]
    async fn test_polling_detects_other_process_writes() {
        let dir = tempdir().unwrap();
        // Separate backend objects share files but not change feeds
        let writer = RecordStore::new(Arc::new(FileBackend::open(dir.path()).unwrap()));
        let observer = Arc::new(RecordStore::new(Arc::new(
            FileBackend::open(dir.path()).unwrap(),
        )));

        let relay = observer.start_change_relay(Some(Duration::from_millis(20)));
        let mut rx = observer.subscribe_channel();

        writer.add_report(suggestion("u", "from elsewhere")).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("polling never saw the write")
            .unwrap();
        assert_eq!(event, StoreEvent::external(Collection::Reports));
        assert_eq!(observer.get_all_reports().len(), 1);

        relay.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_polling_never_reports_own_writes_as_external() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::new(Arc::new(
            FileBackend::open(dir.path()).unwrap(),
        )));
        let relay = store.start_change_relay(Some(Duration::from_millis(1)));
        let mut rx = store.subscribe_channel();

        let writer = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            for i in 0..300 {
                writer
                    .add_report(suggestion("u", &format!("report {}", i)))
                    .unwrap();
            }
        })
        .await
        .unwrap();

        // Give the relay a few more poll ticks
        tokio::time::sleep(Duration::from_millis(50)).await;
        relay.abort();

        let mut local = 0;
        let mut external = 0;
        while let Ok(event) = rx.try_recv() {
            match event.origin {
                ChangeOrigin::Local => local += 1,
                ChangeOrigin::External => external += 1,
            }
        }
        assert_eq!(local, 300);
        assert_eq!(external, 0);
    }

    #[test]
    fn test_concurrent_writes_through_one_instance_are_not_lost() {
        let (store, _) = memory_store();
        let store = Arc::new(store);

        let adders: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            store
                                .add_report(suggestion(&format!("user-{}", t), &format!("r{}", i)))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: Vec<String> = adders
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(store.get_all_reports().len(), 200);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 200);

        let updaters: Vec<_> = ids
            .chunks(25)
            .map(|chunk| {
                let store = Arc::clone(&store);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for id in &chunk {
                        let outcome = store
                            .update_report_status(id, ReportStatus::Resolved)
                            .unwrap();
                        assert!(outcome.is_updated());
                    }
                })
            })
            .collect();
        for handle in updaters {
            handle.join().unwrap();
        }

        let reports = store.get_all_reports();
        assert_eq!(reports.len(), 200);
        assert!(reports.iter().all(|r| r.status == ReportStatus::Resolved));
        for t in 0..8 {
            assert_eq!(store.get_reports_by_user(&format!("user-{}", t)).len(), 25);
        }
    }
}
