//! Recent-Connection Store
//!
//! Bounded, deduplicated, most-recent-first history of prior sessions.
//!
//! ## Rules
//!
//! - Identity of a record is `(address, transport_kind)`
//! - Recording a connection removes any record with the same identity, then
//!   inserts the new one at the front
//! - The store never holds more than [`MAX_RECENT_CONNECTIONS`] records
//!
//! ## Persistence
//!
//! The store is backed by a [`HistoryBackend`]. Every mutation saves the full
//! list; a failed save is logged and never fails the connect that caused it.

use crate::transport::TransportKind;
use crate::{ProtocolError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Hard upper bound on stored history entries
pub const MAX_RECENT_CONNECTIONS: usize = 10;

/// History configuration
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of records kept (clamped to [`MAX_RECENT_CONNECTIONS`])
    pub max_entries: usize,

    /// Write changes through to the backend
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: MAX_RECENT_CONNECTIONS,
            persist: true,
        }
    }
}

impl HistoryConfig {
    /// Effective capacity after clamping
    pub fn capacity(&self) -> usize {
        self.max_entries.clamp(1, MAX_RECENT_CONNECTIONS)
    }
}

/// A prior session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Name shown in the history list
    pub display_name: String,

    /// Network address, `USB`, or the Bluetooth target name
    pub address: String,

    /// Port for network connections
    #[serde(default)]
    pub port: Option<u16>,

    /// Transport used
    pub transport_kind: TransportKind,

    /// When the session was established
    pub last_connected: DateTime<Utc>,
}

impl ConnectionRecord {
    /// Create a record stamped with the current time
    pub fn new(
        display_name: impl Into<String>,
        address: impl Into<String>,
        port: Option<u16>,
        transport_kind: TransportKind,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
            port,
            transport_kind,
            last_connected: Utc::now(),
        }
    }

    /// Whether `other` denotes the same remote endpoint
    pub fn same_identity(&self, other: &ConnectionRecord) -> bool {
        self.matches(&other.address, other.transport_kind)
    }

    fn matches(&self, address: &str, kind: TransportKind) -> bool {
        self.address == address && self.transport_kind == kind
    }

    /// Human readable age of the record relative to `now`
    pub fn last_connected_label(&self, now: DateTime<Utc>) -> String {
        let age = now.signed_duration_since(self.last_connected);

        if age < ChronoDuration::minutes(1) {
            return "Just now".to_string();
        }
        if age < ChronoDuration::hours(1) {
            let minutes = age.num_minutes();
            return if minutes == 1 {
                "1 minute ago".to_string()
            } else {
                format!("{} minutes ago", minutes)
            };
        }

        let days = (now.date_naive() - self.last_connected.date_naive()).num_days();
        match days {
            d if d <= 0 => "Today".to_string(),
            1 => "Yesterday".to_string(),
            d => format!("{} days ago", d),
        }
    }

    /// Port as shown in the history list
    pub fn port_label(&self) -> String {
        self.port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Persistent storage for the history list
#[async_trait]
pub trait HistoryBackend: Send + Sync + Debug {
    /// Load the stored list (most recent first)
    async fn load(&self) -> Result<Vec<ConnectionRecord>>;

    /// Replace the stored list
    async fn save(&self, records: &[ConnectionRecord]) -> Result<()>;
}

/// Backend that keeps history only for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryHistoryBackend {
    records: Mutex<Vec<ConnectionRecord>>,
}

impl MemoryHistoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with records
    pub fn with_records(records: Vec<ConnectionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Records as last saved
    pub fn saved(&self) -> Vec<ConnectionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistoryBackend {
    async fn load(&self) -> Result<Vec<ConnectionRecord>> {
        Ok(self.saved())
    }

    async fn save(&self, records: &[ConnectionRecord]) -> Result<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| ProtocolError::invalid_state("history backend lock poisoned"))?;
        *stored = records.to_vec();
        Ok(())
    }
}

/// Backend storing history as a JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonHistoryBackend {
    path: PathBuf,
}

impl JsonHistoryBackend {
    /// Create a backend for the given file path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// File the history is stored in
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryBackend for JsonHistoryBackend {
    async fn load(&self) -> Result<Vec<ConnectionRecord>> {
        if !self.path.exists() {
            debug!("No history file at {}", self.path.display());
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).await.map_err(|e| {
            ProtocolError::from_io_error(e, &format!("reading {}", self.path.display()))
        })?;
        let records: Vec<ConnectionRecord> = serde_json::from_str(&contents)?;
        debug!(
            "Loaded {} history records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    async fn save(&self, records: &[ConnectionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating history directory: {}", parent.display());
                fs::create_dir_all(parent).await.map_err(|e| {
                    ProtocolError::from_io_error(e, &format!("creating {}", parent.display()))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, contents).await.map_err(|e| {
            ProtocolError::from_io_error(e, &format!("writing {}", self.path.display()))
        })?;
        Ok(())
    }
}

/// Bounded, deduplicated history of prior sessions
///
/// Cloning the store yields another handle onto the same list.
#[derive(Debug, Clone)]
pub struct RecentConnectionStore {
    records: Arc<watch::Sender<Vec<ConnectionRecord>>>,
    backend: Arc<dyn HistoryBackend>,
    config: HistoryConfig,
    save_lock: Arc<tokio::sync::Mutex<()>>,
}

impl RecentConnectionStore {
    /// Create an empty store without loading from the backend
    pub fn new(backend: Arc<dyn HistoryBackend>, config: HistoryConfig) -> Self {
        let (records, _) = watch::channel(Vec::new());
        Self {
            records: Arc::new(records),
            backend,
            config,
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create a store and populate it from the backend
    ///
    /// The loaded list is normalised (dedup, cap) before it is published.
    /// A backend that fails to load yields an empty store.
    pub async fn load(backend: Arc<dyn HistoryBackend>, config: HistoryConfig) -> Self {
        let store = Self::new(backend, config);

        match store.backend.load().await {
            Ok(loaded) => {
                let capacity = store.config.capacity();
                let mut normalised: Vec<ConnectionRecord> = Vec::with_capacity(capacity);
                for record in loaded {
                    if normalised.len() >= capacity {
                        break;
                    }
                    if !normalised.iter().any(|r| r.same_identity(&record)) {
                        normalised.push(record);
                    }
                }
                info!("Loaded {} recent connections", normalised.len());
                store.records.send_replace(normalised);
            }
            Err(e) => {
                warn!("Failed to load connection history: {}", e);
            }
        }

        store
    }

    /// Insert `record` following the dedup and cap rules
    pub fn insert_record(
        records: &mut Vec<ConnectionRecord>,
        record: ConnectionRecord,
        cap: usize,
    ) {
        records.retain(|r| !r.same_identity(&record));
        records.insert(0, record);
        records.truncate(cap);
    }

    /// Record a successful connection and persist the list
    pub async fn record(&self, record: ConnectionRecord) -> Result<()> {
        let capacity = self.config.capacity();
        debug!(
            "Recording connection {} ({})",
            record.address, record.transport_kind
        );
        self.records
            .send_modify(|records| Self::insert_record(records, record, capacity));
        self.persist().await
    }

    /// Remove the record with the given identity
    ///
    /// Returns `true` if a record was removed.
    pub async fn remove(&self, address: &str, kind: TransportKind) -> Result<bool> {
        let removed = self.records.send_if_modified(|records| {
            let before = records.len();
            records.retain(|r| !r.matches(address, kind));
            records.len() != before
        });
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Drop every record
    pub async fn clear(&self) -> Result<()> {
        self.records.send_if_modified(|records| {
            let changed = !records.is_empty();
            records.clear();
            changed
        });
        self.persist().await
    }

    /// Immutable snapshot of the list, most recent first
    pub fn snapshot(&self) -> Vec<ConnectionRecord> {
        self.records.borrow().clone()
    }

    /// Most recent record, if any
    pub fn latest(&self) -> Option<ConnectionRecord> {
        self.records.borrow().first().cloned()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Observe changes to the list
    pub fn subscribe(&self) -> watch::Receiver<Vec<ConnectionRecord>> {
        self.records.subscribe()
    }

    async fn persist(&self) -> Result<()> {
        if !self.config.persist {
            return Ok(());
        }

        // Snapshot under the lock so the last save always carries the newest list
        let _guard = self.save_lock.lock().await;
        let snapshot = self.snapshot();
        self.backend.save(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(address: &str, kind: TransportKind) -> ConnectionRecord {
        ConnectionRecord::new(format!("Computer at {}", address), address, Some(8080), kind)
    }

    fn memory_store() -> (RecentConnectionStore, Arc<MemoryHistoryBackend>) {
        let backend = Arc::new(MemoryHistoryBackend::new());
        let store = RecentConnectionStore::new(backend.clone(), HistoryConfig::default());
        (store, backend)
    }

    #[tokio::test]
    async fn test_record_deduplicates_and_moves_to_front() {
        let (store, _) = memory_store();

        store.record(record("10.0.0.1", TransportKind::Network)).await.unwrap();
        store.record(record("10.0.0.2", TransportKind::Network)).await.unwrap();

        let mut again = record("10.0.0.1", TransportKind::Network);
        again.display_name = "Renamed".to_string();
        store.record(again).await.unwrap();

        let records = store.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "10.0.0.1");
        assert_eq!(records[0].display_name, "Renamed");
        assert_eq!(records[1].address, "10.0.0.2");
    }

    #[tokio::test]
    async fn test_same_address_different_transport_is_distinct() {
        let (store, _) = memory_store();

        store.record(record("hostA", TransportKind::Network)).await.unwrap();
        store.record(record("hostA", TransportKind::ShortRange)).await.unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_capacity_never_exceeded() {
        let (store, backend) = memory_store();

        for i in 0..25 {
            store
                .record(record(&format!("10.0.0.{}", i), TransportKind::Network))
                .await
                .unwrap();
            assert!(store.len() <= MAX_RECENT_CONNECTIONS);
        }

        let records = store.snapshot();
        assert_eq!(records.len(), MAX_RECENT_CONNECTIONS);
        assert_eq!(records[0].address, "10.0.0.24");
        assert_eq!(records[9].address, "10.0.0.15");
        assert_eq!(backend.saved(), records);
    }

    #[test]
    fn test_configured_capacity_is_clamped() {
        let config = HistoryConfig {
            max_entries: 50,
            persist: true,
        };
        assert_eq!(config.capacity(), MAX_RECENT_CONNECTIONS);

        let config = HistoryConfig {
            max_entries: 0,
            persist: true,
        };
        assert_eq!(config.capacity(), 1);
    }

    #[tokio::test]
    async fn test_load_normalises_backend_contents() {
        let mut stored = Vec::new();
        stored.push(record("dup", TransportKind::Network));
        stored.push(record("dup", TransportKind::Network));
        for i in 0..15 {
            stored.push(record(&format!("host{}", i), TransportKind::Wired));
        }
        let backend = Arc::new(MemoryHistoryBackend::with_records(stored));

        let store = RecentConnectionStore::load(backend, HistoryConfig::default()).await;
        let records = store.snapshot();

        assert_eq!(records.len(), MAX_RECENT_CONNECTIONS);
        assert_eq!(records.iter().filter(|r| r.address == "dup").count(), 1);
    }

    #[tokio::test]
    async fn test_persist_disabled_skips_backend() {
        let backend = Arc::new(MemoryHistoryBackend::new());
        let store = RecentConnectionStore::new(
            backend.clone(),
            HistoryConfig {
                max_entries: 10,
                persist: false,
            },
        );

        store.record(record("10.0.0.1", TransportKind::Network)).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(backend.saved().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (store, backend) = memory_store();
        store.record(record("a", TransportKind::Network)).await.unwrap();
        store.record(record("b", TransportKind::Network)).await.unwrap();

        assert!(store.remove("a", TransportKind::Network).await.unwrap());
        assert!(!store.remove("a", TransportKind::Network).await.unwrap());
        assert_eq!(store.len(), 1);

        store.clear().await.unwrap();
        assert!(store.is_empty());
        assert!(backend.saved().is_empty());
    }

    #[test]
    fn test_last_connected_label() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap();
        let mut rec = record("a", TransportKind::Network);

        rec.last_connected = now - ChronoDuration::seconds(20);
        assert_eq!(rec.last_connected_label(now), "Just now");

        rec.last_connected = now - ChronoDuration::minutes(5);
        assert_eq!(rec.last_connected_label(now), "5 minutes ago");

        rec.last_connected = now - ChronoDuration::hours(3);
        assert_eq!(rec.last_connected_label(now), "Today");

        rec.last_connected = now - ChronoDuration::days(1);
        assert_eq!(rec.last_connected_label(now), "Yesterday");

        rec.last_connected = now - ChronoDuration::days(3);
        assert_eq!(rec.last_connected_label(now), "3 days ago");
    }

    #[test]
    fn test_port_label() {
        let mut rec = record("a", TransportKind::Network);
        assert_eq!(rec.port_label(), "8080");
        rec.port = None;
        assert_eq!(rec.port_label(), "N/A");
    }
}
