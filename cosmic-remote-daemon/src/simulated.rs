//! Simulated Collaborators
//!
//! Stand-ins for the device-facing collaborators so the managers can be
//! driven end to end without a device: timed connects, a sample directory
//! tree, progress that ticks at a fixed rate, and capture and input sinks
//! that only log.

use crate::config::{ConnectionConfig, TransferSection};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use cosmic_remote_protocol::{
    CaptureCollaborator, CommandSink, DirectoryProvider, FileDataProvider, FileViewer, LinkInfo,
    ProgressReporter, ProtocolError, RemoteCommand, RemoteEntry, RemotePath, Result,
    TransportConnector,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Devices reported by a Bluetooth scan
pub const SAMPLE_SHORT_RANGE_TARGETS: [&str; 3] = ["MacBook Pro", "Windows PC", "Linux Desktop"];

/// Connector that succeeds after a configured delay
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    config: ConnectionConfig,
}

impl SimulatedConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportConnector for SimulatedConnector {
    async fn open_wired(&self) -> Result<LinkInfo> {
        tokio::time::sleep(self.config.wired_delay()).await;
        Ok(LinkInfo::default())
    }

    async fn open_network(&self, address: &str, port: u16) -> Result<LinkInfo> {
        if port == 0 {
            return Err(ProtocolError::ConnectionRefused(format!(
                "{}:{} is not a valid endpoint",
                address, port
            )));
        }
        tokio::time::sleep(self.config.network_delay()).await;
        Ok(LinkInfo::default())
    }

    async fn open_short_range(&self, target: &str) -> Result<LinkInfo> {
        tokio::time::sleep(self.config.short_range_delay()).await;
        Ok(LinkInfo::named(target))
    }

    async fn discover_short_range_targets(&self) -> Result<Vec<String>> {
        tokio::time::sleep(self.config.scan_delay()).await;
        Ok(SAMPLE_SHORT_RANGE_TARGETS
            .iter()
            .map(|name| name.to_string())
            .collect())
    }

    async fn close_current(&self) -> Result<()> {
        debug!("Closing simulated link");
        Ok(())
    }
}

/// Directory provider serving a fixed sample tree
#[derive(Debug, Clone)]
pub struct SampleDirectories {
    delay: Duration,
}

impl SampleDirectories {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Entries of the sample tree at `path`
    ///
    /// Known directories have fixed contents; any other path gets five
    /// randomly typed files and two folders.
    pub fn entries_for(path: &RemotePath) -> Vec<RemoteEntry> {
        const MB: u64 = 1024 * 1024;
        let now = Utc::now();
        let ago = |days: i64| now - ChronoDuration::days(days);
        let dir = |name: &str, days: i64| RemoteEntry::directory(name, path.join(name), ago(days));
        let file = |name: &str, size: u64, days: i64| {
            RemoteEntry::file(name, path.join(name), size, ago(days))
        };

        match path.to_string().as_str() {
            "/" => vec![
                dir("Documents", 5),
                dir("Downloads", 2),
                dir("Pictures", 10),
                dir("Music", 15),
                dir("Videos", 20),
                file("README.txt", 1024, 30),
            ],
            "/Documents" => vec![
                dir("Work", 3),
                dir("Personal", 7),
                file("Project Plan.pdf", 2 * MB, 1),
                file("Resume.docx", 500 * 1024, 12),
                file("Budget.xlsx", 750 * 1024, 5),
            ],
            "/Pictures" => vec![
                dir("Vacation", 60),
                dir("Family", 90),
                file("Selfie.jpg", 3 * MB, 2),
                file("Beach.png", 5 * MB, 45),
                file("Mountains.jpg", 4 * MB, 30),
                file("Screenshot.png", MB, 0),
            ],
            "/Downloads" => vec![
                dir("Software", 10),
                file("Movie.mp4", 1500 * MB, 3),
                file("Book.pdf", 25 * MB, 7),
                file("Archive.zip", 100 * MB, 1),
                file("Installer.dmg", 200 * MB, 5),
            ],
            "/Music" => vec![
                dir("Rock", 100),
                dir("Jazz", 120),
                dir("Classical", 150),
                file("Favorite Song.mp3", 10 * MB, 2),
                file("New Album.m4a", 50 * MB, 1),
            ],
            "/Videos" => vec![
                dir("Movies", 30),
                dir("TV Shows", 45),
                file("Vacation.mp4", 500 * MB, 60),
                file("Birthday.mov", 300 * MB, 180),
                file("Tutorial.mp4", 200 * MB, 10),
            ],
            _ => {
                const TYPES: [&str; 9] =
                    ["txt", "pdf", "docx", "xlsx", "jpg", "png", "mp3", "mp4", "zip"];
                let mut entries: Vec<RemoteEntry> = (1..=5)
                    .map(|i| {
                        let ext = TYPES[fastrand::usize(..TYPES.len())];
                        let name = format!("File{}.{}", i, ext);
                        let modified =
                            now - ChronoDuration::seconds(fastrand::i64(0..=86_400 * 30));
                        RemoteEntry::file(
                            name.clone(),
                            path.join(&name),
                            fastrand::u64(1024..=10 * MB),
                            modified,
                        )
                    })
                    .collect();
                entries.push(dir("Folder A", 5));
                entries.push(dir("Folder B", 10));
                entries
            }
        }
    }
}

#[async_trait]
impl DirectoryProvider for SampleDirectories {
    async fn list(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>> {
        tokio::time::sleep(self.delay).await;
        Ok(Self::entries_for(path))
    }
}

/// File data provider advancing progress at a fixed rate
#[derive(Debug, Clone)]
pub struct SimulatedFiles {
    config: TransferSection,
}

impl SimulatedFiles {
    pub fn new(config: TransferSection) -> Self {
        Self { config }
    }

    async fn tick_until_done(&self, progress: &ProgressReporter, step: f64) -> Result<()> {
        let interval = self.config.tick_interval();
        loop {
            tokio::time::sleep(interval).await;
            match progress.advance(step) {
                Some(done) if done >= 1.0 => return Ok(()),
                Some(_) => {}
                None => {
                    return Err(ProtocolError::Cancelled(progress.label().to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl FileDataProvider for SimulatedFiles {
    async fn upload(
        &self,
        source: &Path,
        destination: &str,
        progress: ProgressReporter,
    ) -> Result<()> {
        if !source.is_file() {
            return Err(ProtocolError::provider(format!(
                "{} is not a readable file",
                source.display()
            )));
        }
        debug!("Simulating upload of {} to {}", source.display(), destination);
        self.tick_until_done(&progress, self.config.transfer_step).await
    }

    async fn download(&self, remote_path: &str, progress: ProgressReporter) -> Result<()> {
        debug!("Simulating download of {}", remote_path);
        self.tick_until_done(&progress, self.config.transfer_step).await
    }

    async fn create_archive(
        &self,
        paths: &[String],
        archive_path: &str,
        progress: ProgressReporter,
    ) -> Result<u64> {
        debug!(
            "Simulating compression of {} paths into {}",
            paths.len(),
            archive_path
        );
        self.tick_until_done(&progress, self.config.compress_step)
            .await?;
        Ok(1024 * 1024 * fastrand::u64(1..=10))
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        info!("Simulated delete of {} paths", paths.len());
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        info!("Simulated folder creation at {}", path);
        Ok(())
    }
}

/// Viewer that logs previews
#[derive(Debug, Default)]
pub struct LoggingViewer;

impl FileViewer for LoggingViewer {
    fn preview(&self, entry: &RemoteEntry) -> Result<()> {
        info!("Previewing file: {}", entry.name);
        Ok(())
    }
}

/// Capture collaborator that logs
#[derive(Debug, Default)]
pub struct LoggingCapture;

#[async_trait]
impl CaptureCollaborator for LoggingCapture {
    async fn start_recording(&self) -> Result<()> {
        info!("Started recording screen");
        Ok(())
    }

    async fn stop_recording(&self) -> Result<()> {
        info!("Stopped recording screen");
        Ok(())
    }

    async fn take_snapshot(&self) -> Result<()> {
        info!("Screenshot taken");
        Ok(())
    }
}

/// Command sink that logs
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl CommandSink for LoggingSink {
    async fn send(&self, command: &RemoteCommand) -> Result<()> {
        info!("Remote command: {}", serde_json::to_string(command)?);
        Ok(())
    }
}
