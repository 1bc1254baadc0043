//! Transfer Tracker
//!
//! Tracks named, independently progressing uploads, downloads and
//! compressions. Each record is keyed by a human-readable label derived from
//! the file or archive name.
//!
//! ## Lifecycle
//!
//! ```text
//! begin ──▶ InFlight ──advance──▶ ... ──complete──▶ Completed ──settle──▶ removed ──▶ continuation
//!              │
//!              ├──fail────▶ Failed ──settle──▶ removed
//!              └──cancel──▶ removed
//! ```
//!
//! Starting a transfer whose label is already tracked restarts it at 0.0.
//! The handle returned by the earlier `begin` becomes stale: its advance,
//! complete and fail calls are ignored, so an old task can never move the
//! restarted record.

use futures::Future;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default time a finished transfer stays visible
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Transfer configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// How long completed or failed records stay in the mapping
    pub settle_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// What a transfer is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    /// Local file to remote device
    Upload,
    /// Remote file to local storage
    Download,
    /// Archive creation on the remote device
    Compress,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferKind::Upload => write!(f, "upload"),
            TransferKind::Download => write!(f, "download"),
            TransferKind::Compress => write!(f, "compress"),
        }
    }
}

/// Terminal and non-terminal transfer states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Still progressing
    InFlight,
    /// Reached 1.0, waiting for the settle delay
    Completed,
    /// Provider reported an error, waiting for the settle delay
    Failed(String),
}

/// One tracked transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    /// Label the transfer is keyed by
    pub label: String,
    /// What the transfer is doing
    pub kind: TransferKind,
    /// Progress in `[0.0, 1.0]`
    pub progress: f64,
    /// Current state
    pub status: TransferStatus,
    token: Uuid,
}

impl TransferRecord {
    /// Progress as a whole percentage
    pub fn percent(&self) -> u8 {
        (self.progress * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Handle onto one `begin` of a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHandle {
    label: String,
    token: Uuid,
}

impl TransferHandle {
    /// Label of the transfer
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Shared tracker of in-flight transfers
///
/// Cloning the tracker yields another handle onto the same mapping.
#[derive(Debug, Clone)]
pub struct TransferTracker {
    records: Arc<watch::Sender<BTreeMap<String, TransferRecord>>>,
    config: TransferConfig,
}

impl Default for TransferTracker {
    fn default() -> Self {
        Self::new(TransferConfig::default())
    }
}

impl TransferTracker {
    /// Create an empty tracker
    pub fn new(config: TransferConfig) -> Self {
        let (records, _) = watch::channel(BTreeMap::new());
        Self {
            records: Arc::new(records),
            config,
        }
    }

    /// Start tracking `label` at 0.0, restarting it if already tracked
    pub fn begin(&self, label: impl Into<String>, kind: TransferKind) -> TransferHandle {
        let label = label.into();
        let token = Uuid::new_v4();
        let record = TransferRecord {
            label: label.clone(),
            kind,
            progress: 0.0,
            status: TransferStatus::InFlight,
            token,
        };

        self.records.send_modify(|records| {
            if records.insert(label.clone(), record).is_some() {
                debug!("Restarting transfer {}", label);
            }
        });
        debug!("Began {} {}", kind, label);

        TransferHandle { label, token }
    }

    /// Add `delta` to the progress, clamped to 1.0
    ///
    /// Negative deltas are ignored. Returns the new progress, or `None` if the
    /// handle is stale or the transfer already finished.
    pub fn advance(&self, handle: &TransferHandle, delta: f64) -> Option<f64> {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.update_in_flight(handle, |record| {
            record.progress = (record.progress + delta).min(1.0);
        })
    }

    /// Raise the progress to `fraction` if it is ahead of the current value
    pub fn advance_to(&self, handle: &TransferHandle, fraction: f64) -> Option<f64> {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.update_in_flight(handle, |record| {
            record.progress = record.progress.max(fraction);
        })
    }

    /// Mark the transfer complete and schedule its removal
    ///
    /// After the settle delay the record is removed and `continuation` runs.
    /// The continuation is skipped if the handle is stale, or if the record
    /// was cancelled or restarted during the settle delay. The returned task
    /// resolves to whether the continuation ran.
    pub fn complete<F>(&self, handle: &TransferHandle, continuation: F) -> JoinHandle<bool>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let marked = self
            .update_in_flight(handle, |record| {
                record.progress = 1.0;
                record.status = TransferStatus::Completed;
            })
            .is_some();

        if marked {
            info!("Transfer {} complete", handle.label);
        }

        let tracker = self.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            if !marked {
                return false;
            }
            tokio::time::sleep(tracker.config.settle_delay).await;
            if !tracker.remove_if_current(&handle) {
                debug!("Transfer {} left the tracker during settle", handle.label);
                return false;
            }
            continuation.await;
            true
        })
    }

    /// Mark the transfer failed and schedule its removal
    ///
    /// Returns `false` if the handle is stale or the transfer already finished.
    pub fn fail(&self, handle: &TransferHandle, message: impl Into<String>) -> bool {
        let message = message.into();
        let marked = self
            .update_in_flight(handle, |record| {
                record.status = TransferStatus::Failed(message.clone());
            })
            .is_some();

        if !marked {
            return false;
        }

        warn!("Transfer {} failed: {}", handle.label, message);
        let tracker = self.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(tracker.config.settle_delay).await;
            tracker.remove_if_current(&handle);
        });
        true
    }

    /// Remove the transfer immediately without running its continuation
    pub fn cancel(&self, handle: &TransferHandle) -> bool {
        let removed = self.remove_if_current(handle);
        if removed {
            info!("Transfer {} cancelled", handle.label);
        }
        removed
    }

    /// Progress of `label`, if tracked
    pub fn progress(&self, label: &str) -> Option<f64> {
        self.records.borrow().get(label).map(|r| r.progress)
    }

    /// Record for `label`, if tracked
    pub fn get(&self, label: &str) -> Option<TransferRecord> {
        self.records.borrow().get(label).cloned()
    }

    /// Whether `label` is tracked
    pub fn contains(&self, label: &str) -> bool {
        self.records.borrow().contains_key(label)
    }

    /// Label to progress mapping
    pub fn progress_map(&self) -> BTreeMap<String, f64> {
        self.records
            .borrow()
            .iter()
            .map(|(label, record)| (label.clone(), record.progress))
            .collect()
    }

    /// Immutable snapshot of every tracked record
    pub fn snapshot(&self) -> BTreeMap<String, TransferRecord> {
        self.records.borrow().clone()
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Observe changes to the mapping
    pub fn subscribe(&self) -> watch::Receiver<BTreeMap<String, TransferRecord>> {
        self.records.subscribe()
    }

    fn update_in_flight<F>(&self, handle: &TransferHandle, apply: F) -> Option<f64>
    where
        F: FnOnce(&mut TransferRecord),
    {
        let mut progress = None;
        self.records.send_if_modified(|records| {
            let Some(record) = records.get_mut(&handle.label) else {
                return false;
            };
            if record.token != handle.token || record.status != TransferStatus::InFlight {
                return false;
            }
            let before = record.clone();
            apply(record);
            progress = Some(record.progress);
            *record != before
        });
        progress
    }

    fn remove_if_current(&self, handle: &TransferHandle) -> bool {
        self.records.send_if_modified(|records| {
            let current = records
                .get(&handle.label)
                .is_some_and(|record| record.token == handle.token);
            if current {
                records.remove(&handle.label);
            }
            current
        })
    }
}

/// Progress sink handed to file data providers
///
/// Wraps one transfer handle so a provider can report progress without
/// being able to complete, fail or cancel the transfer.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tracker: TransferTracker,
    handle: TransferHandle,
}

impl ProgressReporter {
    /// Create a reporter for `handle`
    pub fn new(tracker: TransferTracker, handle: TransferHandle) -> Self {
        Self { tracker, handle }
    }

    /// Label of the transfer being reported
    pub fn label(&self) -> &str {
        self.handle.label()
    }

    /// Add `delta` to the progress
    pub fn advance(&self, delta: f64) -> Option<f64> {
        self.tracker.advance(&self.handle, delta)
    }

    /// Report `done` of `total` bytes
    pub fn report_bytes(&self, done: u64, total: u64) -> Option<f64> {
        if total == 0 {
            return self.tracker.advance_to(&self.handle, 1.0);
        }
        self.tracker.advance_to(&self.handle, done as f64 / total as f64)
    }
}
