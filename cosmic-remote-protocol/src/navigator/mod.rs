//! Remote Filesystem Navigator
//!
//! Owns the current [`RemotePath`] and the listing fetched for it. File
//! operations started from the navigator (upload, download, compress) are
//! registered with the shared [`TransferTracker`] so observers see them in
//! flight.
//!
//! ## Refresh ordering
//!
//! Every path change and refresh takes a sequence number together with the
//! path it fetches. A listing is only applied if no newer refresh started in
//! the meantime, so a slow response for a directory the user already left
//! never overwrites the listing of the directory they are in.
//!
//! ## Example
//!
//! ```rust,ignore
//! let navigator = RemoteNavigator::new(directories, files, viewer, tracker);
//! navigator.refresh().await?;
//! navigator.enter_directory("Documents").await?;
//! assert_eq!(navigator.path().to_string(), "/Documents");
//! ```

mod listing;
mod path;

pub use listing::{format_size, ListingQuery, RemoteEntry, SortOrder};
pub use path::{RemotePath, ROOT_SEGMENT};

use crate::transfer::{ProgressReporter, TransferHandle, TransferKind, TransferTracker};
use crate::{ProtocolError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Archive label used when more than one path is compressed
pub const DEFAULT_ARCHIVE_LABEL: &str = "Archive.zip";

/// Lists directories on the remote device
#[async_trait]
pub trait DirectoryProvider: Send + Sync + Debug {
    /// Entries of the directory at `path`
    async fn list(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>>;
}

/// Moves file data to and from the remote device
#[async_trait]
pub trait FileDataProvider: Send + Sync + Debug {
    /// Copy the local file at `source` to `destination` on the device
    async fn upload(
        &self,
        source: &Path,
        destination: &str,
        progress: ProgressReporter,
    ) -> Result<()>;

    /// Copy the remote file at `remote_path` to local storage
    async fn download(&self, remote_path: &str, progress: ProgressReporter) -> Result<()>;

    /// Create an archive of `paths` at `archive_path`, returning its size
    async fn create_archive(
        &self,
        paths: &[String],
        archive_path: &str,
        progress: ProgressReporter,
    ) -> Result<u64>;

    /// Delete `paths` on the device
    async fn delete(&self, paths: &[String]) -> Result<()>;

    /// Create a directory at `path` on the device
    async fn create_folder(&self, path: &str) -> Result<()>;
}

/// Shows a file to the user
pub trait FileViewer: Send + Sync + Debug {
    fn preview(&self, entry: &RemoteEntry) -> Result<()>;
}

/// Observable navigator state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigatorState {
    /// Current location
    pub path: RemotePath,
    /// Entries of `listing_path` as last fetched
    pub listing: Vec<RemoteEntry>,
    /// Directory `listing` belongs to
    pub listing_path: RemotePath,
    /// A refresh is in progress
    pub loading: bool,
    /// Message of the last failed refresh, cleared by the next success
    pub last_error: Option<String>,
}

/// A transfer started by the navigator
///
/// Awaiting [`TransferTask::wait`] resolves once the transfer settled and its
/// follow-up (refresh, synthesized entry) ran.
#[derive(Debug)]
pub struct TransferTask {
    handle: TransferHandle,
    join: JoinHandle<Result<()>>,
}

impl TransferTask {
    /// Label the transfer is tracked under
    pub fn label(&self) -> &str {
        self.handle.label()
    }

    /// Tracker handle of the transfer
    pub fn handle(&self) -> &TransferHandle {
        &self.handle
    }

    /// Whether the background task has finished
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the transfer and its follow-up
    pub async fn wait(self) -> Result<()> {
        let label = self.handle.label().to_string();
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ProtocolError::Cancelled(label)),
            Err(e) => Err(ProtocolError::invalid_state(format!(
                "transfer task for {} panicked: {}",
                label, e
            ))),
        }
    }

    fn abort(&self) {
        self.join.abort();
    }
}

/// Navigator over the remote device's filesystem
///
/// Cloning the navigator yields another handle onto the same state.
#[derive(Debug, Clone)]
pub struct RemoteNavigator {
    state: Arc<watch::Sender<NavigatorState>>,
    directories: Arc<dyn DirectoryProvider>,
    files: Arc<dyn FileDataProvider>,
    viewer: Arc<dyn FileViewer>,
    tracker: TransferTracker,
    refresh_seq: Arc<AtomicU64>,
}

impl RemoteNavigator {
    /// Create a navigator at the root with an empty listing
    pub fn new(
        directories: Arc<dyn DirectoryProvider>,
        files: Arc<dyn FileDataProvider>,
        viewer: Arc<dyn FileViewer>,
        tracker: TransferTracker,
    ) -> Self {
        let (state, _) = watch::channel(NavigatorState::default());
        Self {
            state: Arc::new(state),
            directories,
            files,
            viewer,
            tracker,
            refresh_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the whole state
    pub fn state(&self) -> NavigatorState {
        self.state.borrow().clone()
    }

    /// Current path
    pub fn path(&self) -> RemotePath {
        self.state.borrow().path.clone()
    }

    /// Current listing in fetch order
    pub fn listing(&self) -> Vec<RemoteEntry> {
        self.state.borrow().listing.clone()
    }

    /// Whether a refresh is in progress
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<NavigatorState> {
        self.state.subscribe()
    }

    /// Tracker transfers are registered with
    pub fn tracker(&self) -> &TransferTracker {
        &self.tracker
    }

    /// Filtered and sorted view of the current listing
    pub fn query(&self, query: &ListingQuery) -> Vec<RemoteEntry> {
        query.apply(&self.state.borrow().listing)
    }

    /// Re-fetch the listing of the current path
    pub async fn refresh(&self) -> Result<()> {
        self.navigate(|_| true).await
    }

    /// Enter the child directory `name`
    pub async fn enter_directory(&self, name: &str) -> Result<()> {
        if !RemotePath::is_valid_segment(name) {
            return Err(ProtocolError::invalid_state(format!(
                "'{}' is not a directory name",
                name
            )));
        }

        let known = self
            .state
            .borrow()
            .listing
            .iter()
            .any(|entry| entry.is_directory && entry.name == name);
        if !known {
            warn!("Entering {} which is not a directory in the listing", name);
        }

        self.navigate(|path| path.push(name)).await
    }

    /// Go to the parent directory; no-op at root
    pub async fn go_up(&self) -> Result<()> {
        self.navigate(|path| path.pop().is_some()).await
    }

    /// Go to the root directory
    pub async fn go_to_root(&self) -> Result<()> {
        self.navigate(|path| {
            path.reset();
            true
        })
        .await
    }

    /// Truncate the path to the first occurrence of `segment`; no-op if absent
    pub async fn go_to_segment(&self, segment: &str) -> Result<()> {
        self.navigate(|path| path.truncate_to(segment)).await
    }

    /// Upload a local file into the current directory
    ///
    /// The transfer is labelled with the file's base name. Once it settles
    /// the listing is refreshed.
    pub fn upload_file(&self, source: impl AsRef<Path>) -> Result<TransferTask> {
        let source: PathBuf = source.as_ref().to_path_buf();
        let label = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ProtocolError::invalid_state(format!("{} has no file name", source.display()))
            })?;
        let destination = self.path().join(&label);

        let handle = self.tracker.begin(label.clone(), TransferKind::Upload);
        info!("Uploading {} to {}", source.display(), destination);

        let navigator = self.clone();
        let task_handle = handle.clone();
        let join = tokio::spawn(async move {
            let reporter = ProgressReporter::new(navigator.tracker.clone(), task_handle.clone());
            let outcome = navigator
                .files
                .upload(&source, &destination, reporter)
                .await;
            let follow_up = navigator.clone();
            navigator
                .settle(&task_handle, outcome, async move {
                    if let Err(e) = follow_up.refresh().await {
                        warn!("Refresh after upload failed: {}", e);
                    }
                })
                .await
        });

        Ok(TransferTask { handle, join })
    }

    /// Download `paths`, one transfer per distinct path
    ///
    /// The listing is not changed.
    pub fn download(&self, paths: &[String]) -> Vec<TransferTask> {
        dedup(paths)
            .into_iter()
            .map(|remote_path| {
                let label = base_name(&remote_path).to_string();
                let handle = self.tracker.begin(label, TransferKind::Download);
                info!("Downloading {}", remote_path);

                let navigator = self.clone();
                let task_handle = handle.clone();
                let join = tokio::spawn(async move {
                    let reporter =
                        ProgressReporter::new(navigator.tracker.clone(), task_handle.clone());
                    let outcome = navigator.files.download(&remote_path, reporter).await;
                    navigator.settle(&task_handle, outcome, async {}).await
                });

                TransferTask { handle, join }
            })
            .collect()
    }

    /// Delete `paths`
    ///
    /// Matching entries leave the listing immediately. If the provider
    /// fails, the listing is refreshed and the error returned.
    pub async fn delete(&self, paths: &[String]) -> Result<()> {
        let paths = dedup(paths);
        if paths.is_empty() {
            return Ok(());
        }

        let targets: HashSet<&str> = paths.iter().map(String::as_str).collect();
        self.state.send_if_modified(|state| {
            let before = state.listing.len();
            state
                .listing
                .retain(|entry| !targets.contains(entry.full_path.as_str()));
            state.listing.len() != before
        });
        debug!("Optimistically removed {} paths", paths.len());

        if let Err(e) = self.files.delete(&paths).await {
            warn!("Delete failed, restoring listing: {}", e);
            if let Err(refresh_error) = self.refresh().await {
                warn!("Refresh after failed delete failed: {}", refresh_error);
            }
            return Err(e);
        }

        info!("Deleted {} paths", paths.len());
        Ok(())
    }

    /// Compress `paths` into an archive in the current directory
    ///
    /// Without a label the archive is named `<name>.zip` for a single path
    /// and [`DEFAULT_ARCHIVE_LABEL`] otherwise. When the transfer settles an
    /// entry for the archive is appended, provided the navigator is still in
    /// the directory compression started from.
    pub fn compress(&self, paths: &[String], archive_label: Option<&str>) -> Result<TransferTask> {
        let paths = dedup(paths);
        if paths.is_empty() {
            return Err(ProtocolError::invalid_state("nothing to compress"));
        }

        let label = match archive_label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => label.to_string(),
            None => archive_label_for(&paths),
        };
        if !RemotePath::is_valid_segment(&label) {
            return Err(ProtocolError::invalid_state(format!(
                "'{}' is not a valid archive name",
                label
            )));
        }

        let origin = self.path();
        let archive_path = origin.join(&label);
        let handle = self.tracker.begin(label.clone(), TransferKind::Compress);
        info!("Compressing {} paths into {}", paths.len(), archive_path);

        let navigator = self.clone();
        let task_handle = handle.clone();
        let join = tokio::spawn(async move {
            let reporter = ProgressReporter::new(navigator.tracker.clone(), task_handle.clone());
            let outcome = navigator
                .files
                .create_archive(&paths, &archive_path, reporter)
                .await;

            let size = outcome.as_ref().map(|size| *size).unwrap_or_default();
            let follow_up = navigator.clone();
            navigator
                .settle(&task_handle, outcome.map(|_| ()), async move {
                    let entry = RemoteEntry::file(label, archive_path, size, Utc::now());
                    follow_up.append_in(&origin, entry);
                })
                .await
        });

        Ok(TransferTask { handle, join })
    }

    /// Create the directory `name` in the current directory
    pub async fn create_folder(&self, name: &str) -> Result<RemoteEntry> {
        let name = name.trim();
        if !RemotePath::is_valid_segment(name) {
            return Err(ProtocolError::invalid_state(format!(
                "'{}' is not a valid folder name",
                name
            )));
        }

        let origin = self.path();
        let full_path = origin.join(name);
        self.files.create_folder(&full_path).await?;
        info!("Created folder {}", full_path);

        let entry = RemoteEntry::directory(name, full_path, Utc::now());
        self.append_in(&origin, entry.clone());
        Ok(entry)
    }

    /// Hand `entry` to the viewer
    pub fn preview_file(&self, entry: &RemoteEntry) -> Result<()> {
        debug!("Previewing {}", entry.full_path);
        self.viewer.preview(entry)
    }

    /// Cancel a transfer started by this navigator
    ///
    /// The record leaves the tracker immediately and the follow-up never
    /// runs. Returns `false` if the transfer had already left the tracker.
    pub fn cancel_transfer(&self, task: &TransferTask) -> bool {
        let removed = self.tracker.cancel(&task.handle);
        task.abort();
        removed
    }

    async fn navigate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut RemotePath) -> bool,
    {
        let mut request = None;
        self.state.send_if_modified(|state| {
            if !change(&mut state.path) {
                return false;
            }
            let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
            state.loading = true;
            request = Some((seq, state.path.clone()));
            true
        });

        let Some((seq, path)) = request else {
            debug!("Navigation left the path unchanged");
            return Ok(());
        };

        debug!("Fetching listing for {} (#{})", path, seq);
        let (entries, error) = match self.directories.list(&path).await {
            Ok(entries) => (Some(entries), None),
            Err(e) => (None, Some(e)),
        };
        let message = error.as_ref().map(ProtocolError::user_message);

        let applied = self.state.send_if_modified(|state| {
            if self.refresh_seq.load(Ordering::SeqCst) != seq || state.path != path {
                return false;
            }
            state.loading = false;
            state.last_error = message;
            match entries {
                Some(entries) => {
                    state.listing = entries
                        .into_iter()
                        .map(|mut entry| {
                            entry.full_path = path.join(&entry.name);
                            entry
                        })
                        .collect();
                }
                // A failed fetch keeps the listing only if it already
                // belongs to this path
                None if state.listing_path != path => state.listing.clear(),
                None => {}
            }
            state.listing_path = path.clone();
            true
        });

        if !applied {
            debug!("Discarding superseded listing for {} (#{})", path, seq);
            return Ok(());
        }

        match error {
            Some(e) => {
                warn!("Listing {} failed: {}", path, e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    async fn settle<F>(
        &self,
        handle: &TransferHandle,
        outcome: Result<()>,
        follow_up: F,
    ) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = outcome {
            if matches!(e, ProtocolError::Cancelled(_)) && !self.tracker.contains(handle.label())
            {
                return Err(e);
            }
            let message = e.to_string();
            self.tracker.fail(handle, message.clone());
            return Err(ProtocolError::TransferFailed {
                label: handle.label().to_string(),
                message,
            });
        }

        match self.tracker.complete(handle, follow_up).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProtocolError::Cancelled(handle.label().to_string())),
            Err(e) => Err(ProtocolError::invalid_state(format!(
                "settle task for {} failed: {}",
                handle.label(),
                e
            ))),
        }
    }

    fn append_in(&self, origin: &RemotePath, entry: RemoteEntry) {
        let appended = self.state.send_if_modified(|state| {
            if state.path != *origin || state.listing_path != *origin {
                return false;
            }
            state.listing.retain(|existing| existing.name != entry.name);
            state.listing.push(entry);
            true
        });
        if !appended {
            debug!("Left {} before entry could be appended", origin);
        }
    }
}

fn dedup(paths: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|path| !path.is_empty() && seen.insert(path.as_str()))
        .cloned()
        .collect()
}

fn base_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
}

fn archive_label_for(paths: &[String]) -> String {
    match paths {
        [single] => format!("{}.zip", base_name(single)),
        _ => DEFAULT_ARCHIVE_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/Documents/Resume.docx"), "Resume.docx");
        assert_eq!(base_name("/Music/Jazz/"), "Jazz");
        assert_eq!(base_name("notes.txt"), "notes.txt");
    }

    #[test]
    fn test_archive_label() {
        assert_eq!(
            archive_label_for(&["/Pictures/Beach.png".to_string()]),
            "Beach.png.zip"
        );
        assert_eq!(
            archive_label_for(&["/a".to_string(), "/b".to_string()]),
            "Archive.zip"
        );
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let paths = vec![
            "/b".to_string(),
            "/a".to_string(),
            "/b".to_string(),
            String::new(),
        ];
        assert_eq!(dedup(&paths), ["/b", "/a"]);
    }
}
