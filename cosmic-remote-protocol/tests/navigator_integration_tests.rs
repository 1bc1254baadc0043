//! Navigator Integration Tests
//!
//! Tests for the remote filesystem navigator including:
//! - Path navigation and listing refresh
//! - Superseded refresh handling
//! - Upload, download, compress and delete through the transfer tracker
//! - Stateless listing queries

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cosmic_remote_protocol::{
    DirectoryProvider, FileDataProvider, FileViewer, ListingQuery, ProgressReporter,
    ProtocolError, RemoteEntry, RemoteNavigator, RemotePath, Result, SortOrder, TransferStatus,
    TransferTracker,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock directory provider serving a fixed tree
#[derive(Debug, Default)]
struct MockDirectories {
    tree: HashMap<String, Vec<RemoteEntry>>,
    delays: HashMap<String, Duration>,
    fetches: AtomicUsize,
}

impl MockDirectories {
    fn sample() -> Self {
        let day = |d| Utc.with_ymd_and_hms(2024, 5, d, 9, 0, 0).unwrap();
        let mut tree = HashMap::new();
        tree.insert(
            "/".to_string(),
            vec![
                RemoteEntry::directory("Documents", "/Documents", day(5)),
                RemoteEntry::directory("Pictures", "/Pictures", day(10)),
                RemoteEntry::directory("Slow", "/Slow", day(1)),
                RemoteEntry::file("README.txt", "/README.txt", 1024, day(1)),
            ],
        );
        tree.insert(
            "/Documents".to_string(),
            vec![
                RemoteEntry::directory("Work", "/Documents/Work", day(3)),
                RemoteEntry::file("Resume.docx", "/Documents/Resume.docx", 500 * 1024, day(12)),
                // Provider reports a stale path
                RemoteEntry::file("Budget.xlsx", "/old/Budget.xlsx", 750 * 1024, day(5)),
            ],
        );
        tree.insert(
            "/Documents/Work".to_string(),
            vec![RemoteEntry::file("plan.pdf", "plan.pdf", 2048, day(2))],
        );
        tree.insert(
            "/Slow".to_string(),
            vec![RemoteEntry::file("late.bin", "/Slow/late.bin", 1, day(1))],
        );

        let mut delays = HashMap::new();
        delays.insert("/Slow".to_string(), Duration::from_secs(1));

        Self {
            tree,
            delays,
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryProvider for MockDirectories {
    async fn list(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let key = path.to_string();
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        self.tree
            .get(&key)
            .cloned()
            .ok_or_else(|| ProtocolError::provider(format!("{} not found", key)))
    }
}

/// Mock file data provider recording every call
#[derive(Debug, Default)]
struct MockFiles {
    fail: bool,
    delay: Duration,
    uploads: Mutex<Vec<(String, String)>>,
    downloads: Mutex<Vec<String>>,
    archives: Mutex<Vec<(Vec<String>, String)>>,
    deleted: Mutex<Vec<String>>,
    folders: Mutex<Vec<String>>,
}

impl MockFiles {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    async fn work(&self, progress: &ProgressReporter) -> Result<()> {
        progress.advance(0.5);
        tokio::time::sleep(self.delay + Duration::from_millis(100)).await;
        if self.fail {
            return Err(ProtocolError::provider("device storage full"));
        }
        progress.advance(0.5);
        Ok(())
    }
}

#[async_trait]
impl FileDataProvider for MockFiles {
    async fn upload(
        &self,
        source: &Path,
        destination: &str,
        progress: ProgressReporter,
    ) -> Result<()> {
        self.work(&progress).await?;
        self.uploads
            .lock()
            .unwrap()
            .push((source.display().to_string(), destination.to_string()));
        Ok(())
    }

    async fn download(&self, remote_path: &str, progress: ProgressReporter) -> Result<()> {
        self.work(&progress).await?;
        self.downloads.lock().unwrap().push(remote_path.to_string());
        Ok(())
    }

    async fn create_archive(
        &self,
        paths: &[String],
        archive_path: &str,
        progress: ProgressReporter,
    ) -> Result<u64> {
        self.work(&progress).await?;
        self.archives
            .lock()
            .unwrap()
            .push((paths.to_vec(), archive_path.to_string()));
        Ok(4 * 1024 * 1024)
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ProtocolError::provider("permission denied"));
        }
        self.deleted.lock().unwrap().extend(paths.iter().cloned());
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        if self.fail {
            return Err(ProtocolError::provider("read-only filesystem"));
        }
        self.folders.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

/// Mock viewer recording previewed entries
#[derive(Debug, Default)]
struct MockViewer {
    previewed: Mutex<Vec<String>>,
}

impl FileViewer for MockViewer {
    fn preview(&self, entry: &RemoteEntry) -> Result<()> {
        self.previewed.lock().unwrap().push(entry.full_path.clone());
        Ok(())
    }
}

struct Fixture {
    navigator: RemoteNavigator,
    directories: Arc<MockDirectories>,
    files: Arc<MockFiles>,
    viewer: Arc<MockViewer>,
    tracker: TransferTracker,
}

async fn fixture_with(files: MockFiles) -> Fixture {
    let directories = Arc::new(MockDirectories::sample());
    let files = Arc::new(files);
    let viewer = Arc::new(MockViewer::default());
    let tracker = TransferTracker::default();
    let navigator = RemoteNavigator::new(
        directories.clone(),
        files.clone(),
        viewer.clone(),
        tracker.clone(),
    );
    navigator.refresh().await.unwrap();
    Fixture {
        navigator,
        directories,
        files,
        viewer,
        tracker,
    }
}

async fn fixture() -> Fixture {
    fixture_with(MockFiles::default()).await
}

fn names(entries: &[RemoteEntry]) -> Vec<String> {
    entries.iter().map(|e| e.name.clone()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_enter_and_go_up() {
    let f = fixture().await;
    assert_eq!(f.navigator.listing().len(), 4);

    f.navigator.enter_directory("Documents").await.unwrap();
    assert_eq!(f.navigator.path().segments(), ["/", "Documents"]);
    assert_eq!(
        names(&f.navigator.listing()),
        ["Work", "Resume.docx", "Budget.xlsx"]
    );

    f.navigator.go_up().await.unwrap();
    assert_eq!(f.navigator.path().segments(), ["/"]);

    let fetches = f.directories.fetches();
    f.navigator.go_up().await.unwrap();
    assert_eq!(f.navigator.path().segments(), ["/"]);
    assert_eq!(f.directories.fetches(), fetches);
}

#[tokio::test(start_paused = true)]
async fn test_full_paths_follow_current_path() {
    let f = fixture().await;
    f.navigator.enter_directory("Documents").await.unwrap();

    let listing = f.navigator.listing();
    let budget = listing.iter().find(|e| e.name == "Budget.xlsx").unwrap();
    assert_eq!(budget.full_path, "/Documents/Budget.xlsx");

    f.navigator.enter_directory("Work").await.unwrap();
    assert_eq!(f.navigator.listing()[0].full_path, "/Documents/Work/plan.pdf");

    f.navigator.go_to_root().await.unwrap();
    assert!(f
        .navigator
        .listing()
        .iter()
        .all(|e| e.full_path == format!("/{}", e.name)));
}

#[tokio::test(start_paused = true)]
async fn test_go_to_segment() {
    let f = fixture().await;
    f.navigator.enter_directory("Documents").await.unwrap();
    f.navigator.enter_directory("Work").await.unwrap();

    let fetches = f.directories.fetches();
    f.navigator.go_to_segment("Missing").await.unwrap();
    assert_eq!(f.navigator.path().segments(), ["/", "Documents", "Work"]);
    assert_eq!(f.directories.fetches(), fetches);

    f.navigator.go_to_segment("Documents").await.unwrap();
    assert_eq!(f.navigator.path().segments(), ["/", "Documents"]);
    assert_eq!(f.navigator.listing().len(), 3);

    f.navigator.go_to_segment("/").await.unwrap();
    assert!(f.navigator.path().is_root());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_directory_name_is_a_precondition_error() {
    let f = fixture().await;
    let fetches = f.directories.fetches();
    for name in ["a/b", ".", ".."] {
        let err = f.navigator.enter_directory(name).await.unwrap_err();
        assert!(err.is_precondition(), "{} accepted", name);
    }
    assert!(f.navigator.path().is_root());

    f.navigator.enter_directory("Documents").await.unwrap();
    assert!(f.navigator.enter_directory("..").await.is_err());
    assert_eq!(f.navigator.path().to_string(), "/Documents");
    assert_eq!(f.directories.fetches(), fetches + 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_directory_surfaces_provider_error() {
    let f = fixture().await;
    let err = f.navigator.enter_directory("Nowhere").await.unwrap_err();
    assert!(matches!(err, ProtocolError::Provider(_)));

    let state = f.navigator.state();
    assert_eq!(state.path.segments(), ["/", "Nowhere"]);
    assert!(!state.loading);
    assert!(state.last_error.is_some());
    assert!(state.listing.is_empty());

    f.navigator.go_up().await.unwrap();
    assert!(f.navigator.state().last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_refresh_is_discarded() {
    let f = fixture().await;

    let slow = {
        let navigator = f.navigator.clone();
        tokio::spawn(async move { navigator.enter_directory("Slow").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(f.navigator.is_loading());
    assert_eq!(f.navigator.path().to_string(), "/Slow");

    f.navigator.go_to_root().await.unwrap();
    slow.await.unwrap().unwrap();

    let state = f.navigator.state();
    assert!(state.path.is_root());
    assert!(!state.loading);
    assert!(state.listing.iter().all(|e| e.name != "late.bin"));
    assert_eq!(state.listing.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_upload_tracks_progress_then_refreshes() {
    let f = fixture().await;
    f.navigator.enter_directory("Documents").await.unwrap();

    let task = f.navigator.upload_file("/home/user/report.pdf").unwrap();
    assert_eq!(task.label(), "report.pdf");
    assert_eq!(f.tracker.progress("report.pdf"), Some(0.0));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.tracker.progress("report.pdf"), Some(0.5));

    let fetches = f.directories.fetches();
    task.wait().await.unwrap();

    assert!(f.tracker.is_empty());
    assert_eq!(f.directories.fetches(), fetches + 1);
    assert_eq!(
        f.files.uploads.lock().unwrap().as_slice(),
        [(
            "/home/user/report.pdf".to_string(),
            "/Documents/report.pdf".to_string()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_upload_without_file_name_is_rejected() {
    let f = fixture().await;
    let err = f.navigator.upload_file("/").unwrap_err();
    assert!(err.is_precondition());
    assert!(f.tracker.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_upload_reaches_failed_state() {
    let f = fixture_with(MockFiles::failing()).await;

    let task = f.navigator.upload_file("/tmp/photo.jpg").unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let record = f.tracker.get("photo.jpg").unwrap();
    assert!(matches!(record.status, TransferStatus::Failed(_)));

    let err = task.wait().await.unwrap_err();
    assert!(matches!(err, ProtocolError::TransferFailed { ref label, .. } if label == "photo.jpg"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(f.tracker.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_download_does_not_touch_listing() {
    let f = fixture().await;
    f.navigator.enter_directory("Documents").await.unwrap();
    let before = f.navigator.listing();

    let paths = vec![
        "/Documents/Resume.docx".to_string(),
        "/Documents/Budget.xlsx".to_string(),
        "/Documents/Resume.docx".to_string(),
    ];
    let tasks = f.navigator.download(&paths);
    assert_eq!(tasks.len(), 2);
    assert_eq!(f.tracker.len(), 2);

    for task in tasks {
        task.wait().await.unwrap();
    }

    assert_eq!(f.navigator.listing(), before);
    assert!(f.tracker.is_empty());
    assert_eq!(f.files.downloads.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_removes_entries_optimistically() {
    let f = fixture_with(MockFiles::slow(Duration::from_secs(1))).await;
    let fetches = f.directories.fetches();

    let delete = {
        let navigator = f.navigator.clone();
        tokio::spawn(async move { navigator.delete(&["/README.txt".to_string()]).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(f.navigator.listing().iter().all(|e| e.name != "README.txt"));

    delete.await.unwrap().unwrap();
    assert_eq!(f.navigator.listing().len(), 3);
    assert_eq!(f.directories.fetches(), fetches);
    assert_eq!(
        f.files.deleted.lock().unwrap().as_slice(),
        ["/README.txt".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_restores_listing() {
    let f = fixture_with(MockFiles::failing()).await;

    let err = f
        .navigator
        .delete(&["/README.txt".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Provider(_)));
    assert!(f.navigator.listing().iter().any(|e| e.name == "README.txt"));
}

#[tokio::test(start_paused = true)]
async fn test_compress_appends_archive() {
    let f = fixture().await;
    f.navigator.enter_directory("Documents").await.unwrap();

    let task = f
        .navigator
        .compress(&["/Documents/Resume.docx".to_string()], None)
        .unwrap();
    assert_eq!(task.label(), "Resume.docx.zip");
    task.wait().await.unwrap();

    let listing = f.navigator.listing();
    let archive = listing.last().unwrap();
    assert_eq!(archive.name, "Resume.docx.zip");
    assert_eq!(archive.full_path, "/Documents/Resume.docx.zip");
    assert_eq!(archive.byte_size, 4 * 1024 * 1024);
    assert!(!archive.is_directory);

    let task = f
        .navigator
        .compress(
            &["/Documents/Resume.docx".to_string(), "/Documents/Work".to_string()],
            None,
        )
        .unwrap();
    assert_eq!(task.label(), "Archive.zip");
    task.wait().await.unwrap();
    assert_eq!(f.navigator.listing().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_compress_after_leaving_directory_does_not_append() {
    let f = fixture().await;
    f.navigator.enter_directory("Documents").await.unwrap();

    let task = f
        .navigator
        .compress(&["/Documents/Work".to_string()], Some("backup.zip"))
        .unwrap();
    f.navigator.go_up().await.unwrap();
    task.wait().await.unwrap();

    assert!(f.navigator.listing().iter().all(|e| e.name != "backup.zip"));
    assert_eq!(
        f.files.archives.lock().unwrap()[0].1,
        "/Documents/backup.zip"
    );
}

#[tokio::test(start_paused = true)]
async fn test_compress_nothing_is_rejected() {
    let f = fixture().await;
    assert!(f.navigator.compress(&[], None).unwrap_err().is_precondition());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_transfer_skips_follow_up() {
    let f = fixture_with(MockFiles::slow(Duration::from_secs(5))).await;
    let fetches = f.directories.fetches();

    let task = f.navigator.upload_file("/tmp/huge.iso").unwrap();
    assert!(f.navigator.cancel_transfer(&task));
    assert!(f.tracker.is_empty());

    let err = task.wait().await.unwrap_err();
    assert!(matches!(err, ProtocolError::Cancelled(_)));
    assert_eq!(f.directories.fetches(), fetches);
}

#[tokio::test(start_paused = true)]
async fn test_create_folder_appends_directory() {
    let f = fixture().await;
    let entry = f.navigator.create_folder("Projects").await.unwrap();

    assert!(entry.is_directory);
    assert_eq!(entry.full_path, "/Projects");
    assert!(f.navigator.listing().contains(&entry));
    assert_eq!(
        f.files.folders.lock().unwrap().as_slice(),
        ["/Projects".to_string()]
    );

    assert!(f.navigator.create_folder("").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_preview_delegates_to_viewer() {
    let f = fixture().await;
    let readme = f.navigator.listing()[3].clone();
    let before = f.navigator.state();

    f.navigator.preview_file(&readme).unwrap();

    assert_eq!(
        f.viewer.previewed.lock().unwrap().as_slice(),
        ["/README.txt".to_string()]
    );
    assert_eq!(f.navigator.state(), before);
}

#[tokio::test(start_paused = true)]
async fn test_query_is_stateless() {
    let f = fixture().await;
    let before = f.navigator.listing();

    let query = ListingQuery::sorted(SortOrder::NameDescending).with_directories_first(true);
    let sorted = f.navigator.query(&query);
    assert_eq!(names(&sorted), ["Slow", "Pictures", "Documents", "README.txt"]);

    let filtered = f.navigator.query(&ListingQuery::default().with_filter("readme"));
    assert_eq!(names(&filtered), ["README.txt"]);

    assert_eq!(f.navigator.listing(), before);
}

#[tokio::test(start_paused = true)]
async fn test_path_never_empty_under_navigation() {
    let f = fixture().await;
    let moves = [
        "enter:Documents",
        "up",
        "up",
        "enter:Documents",
        "enter:Work",
        "segment:Documents",
        "root",
        "segment:Work",
        "enter:Pictures",
        "up",
    ];

    for step in moves {
        let result = match step.split_once(':') {
            Some(("enter", name)) => f.navigator.enter_directory(name).await,
            Some(("segment", name)) => f.navigator.go_to_segment(name).await,
            _ if step == "up" => f.navigator.go_up().await,
            _ => f.navigator.go_to_root().await,
        };
        // Pictures is not in the mock tree
        let _ = result;

        let path = f.navigator.path();
        assert!(!path.segments().is_empty());
        assert_eq!(path.segments()[0], "/");
    }
}
