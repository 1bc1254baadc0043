//! Application Context
//!
//! Wires the protocol managers to the simulated collaborators according to
//! the loaded configuration.

use crate::config::Config;
use crate::simulated::{
    LoggingCapture, LoggingSink, LoggingViewer, SampleDirectories, SimulatedConnector,
    SimulatedFiles,
};
use anyhow::{Context, Result};
use cosmic_remote_protocol::{
    FastrandSampler, HistoryBackend, HistoryConfig, JsonHistoryBackend, MemoryHistoryBackend,
    RecentConnectionStore, RemoteControl, RemoteNavigator, SessionManager, StreamingController,
    TransferTracker, TransportKind,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Every manager of one remote session
pub struct App {
    pub config: Config,
    pub session: SessionManager,
    pub tracker: TransferTracker,
    pub navigator: RemoteNavigator,
    pub streaming: StreamingController,
    pub control: RemoteControl,
}

impl App {
    /// Build the managers, loading connection history from disk
    pub async fn new(config: Config) -> Result<Self> {
        let history_config = HistoryConfig::from(&config.history);
        let backend: Arc<dyn HistoryBackend> = if history_config.persist {
            let path = config.history_path();
            debug!("Connection history at {}", path.display());
            Arc::new(JsonHistoryBackend::new(path))
        } else {
            Arc::new(MemoryHistoryBackend::new())
        };
        let history = RecentConnectionStore::load(backend, history_config).await;

        let connector = Arc::new(SimulatedConnector::new(config.connection.clone()));
        let session = SessionManager::new(connector, history);

        let tracker = TransferTracker::new((&config.transfer).into());
        let navigator = RemoteNavigator::new(
            Arc::new(SampleDirectories::new(config.transfer.listing_delay())),
            Arc::new(SimulatedFiles::new(config.transfer.clone())),
            Arc::new(LoggingViewer),
            tracker.clone(),
        );

        let streaming = StreamingController::new(
            (&config.streaming).into(),
            Arc::new(FastrandSampler::default()),
            Arc::new(LoggingCapture),
        );

        let control = RemoteControl::new(session.clone(), Arc::new(LoggingSink));

        Ok(Self {
            config,
            session,
            tracker,
            navigator,
            streaming,
            control,
        })
    }

    /// Connect to the most recent device, falling back to USB
    pub async fn ensure_connected(&self) -> Result<String> {
        if self.session.is_connected() {
            return Ok(self.session.session().peer_label);
        }

        let result = match self.session.history().latest() {
            Some(record) => {
                info!(
                    "Reconnecting to {} via {}",
                    record.display_name, record.transport_kind
                );
                match record.transport_kind {
                    TransportKind::Network => {
                        let port = record.port.unwrap_or(self.config.connection.default_port);
                        self.session.connect_network(&record.address, port).await
                    }
                    TransportKind::Wired => self.session.connect_wired().await,
                    TransportKind::ShortRange => {
                        self.session
                            .select_short_range_target(Some(record.address.clone()));
                        self.session.connect_short_range().await
                    }
                }
            }
            None => self.session.connect_wired().await,
        };

        result.context("Failed to connect to a device")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_remote_protocol::ConnectionRecord;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.config_dir = dir.path().join("config");
        config.paths.data_dir = dir.path().join("data");
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_connected_falls_back_to_wired() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir)).await.unwrap();

        app.ensure_connected().await.unwrap();
        let session = app.session.session();
        assert!(session.is_connected());
        assert_eq!(session.transport_kind, TransportKind::Wired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_connected_reuses_latest_record() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        JsonHistoryBackend::new(config.history_path())
            .save(&[ConnectionRecord::new(
                "Computer at 10.0.0.7",
                "10.0.0.7",
                Some(9000),
                TransportKind::Network,
            )])
            .await
            .unwrap();

        let app = App::new(config).await.unwrap();
        app.ensure_connected().await.unwrap();

        assert_eq!(app.session.session().peer_label, "Computer at 10.0.0.7");
        assert_eq!(app.session.history().len(), 1);
    }
}
