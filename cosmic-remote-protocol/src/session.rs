//! Session Manager
//!
//! Owns the connection state of the single remote session and selects the
//! transport used to reach the device.
//!
//! ## State Machine
//!
//! ```text
//!            connect_*()                 success
//! Disconnected ─────────▶ Connecting ───────────▶ Connected
//!      ▲                      │                       │
//!      │       failure        │                       │
//!      ├──────────────────────┘                       │
//!      │    disconnect() / handle_transport_lost()    │
//!      └──────────────────────────────────────────────┘
//! ```
//!
//! A connect request issued while Connecting or Connected tears the current
//! link down first, so every attempt starts from Disconnected.
//!
//! ## Cancellation
//!
//! Each attempt is tagged with an epoch. `disconnect()` and transport loss
//! bump the epoch under the state lock, so an attempt that resolves later
//! cannot move the session back to Connected.

use crate::history::{ConnectionRecord, RecentConnectionStore};
use crate::transport::{LinkInfo, TransportConnector, TransportKind};
use crate::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Address recorded in history for wired sessions
pub const WIRED_ADDRESS: &str = "USB";

/// Peer label used for wired sessions
pub const WIRED_PEER_LABEL: &str = "USB Connected Device";

/// Session connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No link
    #[default]
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Link is open
    Connected,
}

impl ConnectionState {
    /// Check if the session is connected
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Why the session last left the Connected or Connecting state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// `disconnect()` was called, or a new connect replaced the session
    UserRequested,
    /// The transport signaled the link was lost
    TransportLost(String),
    /// The connect attempt failed
    ConnectFailed(String),
}

/// Snapshot of the remote session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Current connection state
    pub state: ConnectionState,

    /// Transport of the current or last attempt
    pub transport_kind: TransportKind,

    /// Name of the connected peer; empty unless connected
    pub peer_label: String,

    /// Bluetooth target chosen for `connect_short_range`
    pub selected_short_range_target: Option<String>,

    /// Reason of the most recent disconnect
    pub last_disconnect: Option<DisconnectReason>,
}

impl Session {
    /// Check if the session is connected
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

/// Completion of a connect call in `(success, message)` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// Whether the session is now connected
    pub success: bool,
    /// Message for the user
    pub message: String,
}

impl From<Result<String>> for ConnectOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(message) => Self {
                success: true,
                message,
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

/// Scheme and host prefix of connect codes shown by the companion app
pub const CONNECT_URI_PREFIX: &str = "icondesk://connect/";

/// Parse a connect code of the form `icondesk://connect/<address>:<port>`
///
/// ```rust
/// use cosmic_remote_protocol::session::parse_connect_uri;
///
/// let (address, port) = parse_connect_uri("icondesk://connect/192.168.1.100:8080").unwrap();
/// assert_eq!(address, "192.168.1.100");
/// assert_eq!(port, 8080);
/// ```
pub fn parse_connect_uri(uri: &str) -> Result<(String, u16)> {
    let invalid = || ProtocolError::InvalidAddress(uri.to_string());
    let rest = uri.trim().strip_prefix(CONNECT_URI_PREFIX).ok_or_else(invalid)?;
    let (address, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
    if address.is_empty() || address.contains(':') {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((address.to_string(), port))
}

#[derive(Debug, Clone)]
enum ConnectRequest {
    Wired,
    Network { address: String, port: u16 },
    ShortRange { target: String },
}

impl ConnectRequest {
    fn kind(&self) -> TransportKind {
        match self {
            ConnectRequest::Wired => TransportKind::Wired,
            ConnectRequest::Network { .. } => TransportKind::Network,
            ConnectRequest::ShortRange { .. } => TransportKind::ShortRange,
        }
    }

    fn describe(&self) -> String {
        match self {
            ConnectRequest::Wired => WIRED_ADDRESS.to_string(),
            ConnectRequest::Network { address, port } => format!("{}:{}", address, port),
            ConnectRequest::ShortRange { target } => target.clone(),
        }
    }

    fn peer_label(&self, link: LinkInfo) -> String {
        if let Some(name) = link.peer_name.filter(|n| !n.trim().is_empty()) {
            return name;
        }
        match self {
            ConnectRequest::Wired => WIRED_PEER_LABEL.to_string(),
            ConnectRequest::Network { address, .. } => format!("Computer at {}", address),
            ConnectRequest::ShortRange { target } => target.clone(),
        }
    }

    fn success_message(&self) -> String {
        match self {
            ConnectRequest::Wired => "USB connection established".to_string(),
            ConnectRequest::Network { address, .. } => {
                format!("Connected successfully to {}", address)
            }
            ConnectRequest::ShortRange { target } => {
                format!("Connected successfully to {} via Bluetooth", target)
            }
        }
    }

    fn history_record(&self, peer_label: &str) -> ConnectionRecord {
        match self {
            ConnectRequest::Wired => {
                ConnectionRecord::new(peer_label, WIRED_ADDRESS, None, TransportKind::Wired)
            }
            ConnectRequest::Network { address, port } => ConnectionRecord::new(
                peer_label,
                address.clone(),
                Some(*port),
                TransportKind::Network,
            ),
            ConnectRequest::ShortRange { target } => {
                ConnectionRecord::new(peer_label, target.clone(), None, TransportKind::ShortRange)
            }
        }
    }
}

/// Owner of the remote session
///
/// Cloning the manager yields another handle onto the same session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    session: Arc<watch::Sender<Session>>,
    targets: Arc<watch::Sender<Vec<String>>>,
    history: RecentConnectionStore,
    connector: Arc<dyn TransportConnector>,
    epoch: Arc<AtomicU64>,
}

impl SessionManager {
    /// Create a manager in the Disconnected state
    pub fn new(connector: Arc<dyn TransportConnector>, history: RecentConnectionStore) -> Self {
        let (session, _) = watch::channel(Session::default());
        let (targets, _) = watch::channel(Vec::new());
        Self {
            session: Arc::new(session),
            targets: Arc::new(targets),
            history,
            connector,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Immutable snapshot of the session
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Check if the session is connected
    pub fn is_connected(&self) -> bool {
        self.session.borrow().is_connected()
    }

    /// Observe session changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// History of prior sessions
    pub fn history(&self) -> &RecentConnectionStore {
        &self.history
    }

    /// Bluetooth targets found by the last scan
    pub fn targets(&self) -> Vec<String> {
        self.targets.borrow().clone()
    }

    /// Observe the scan list
    pub fn subscribe_targets(&self) -> watch::Receiver<Vec<String>> {
        self.targets.subscribe()
    }

    /// Select (or clear) the Bluetooth target used by `connect_short_range`
    pub fn select_short_range_target(&self, target: Option<String>) {
        self.session.send_if_modified(|s| {
            if s.selected_short_range_target == target {
                return false;
            }
            s.selected_short_range_target = target;
            true
        });
    }

    /// Scan for Bluetooth targets, replacing the previous list
    pub async fn scan_short_range_targets(&self) -> Result<Vec<String>> {
        debug!("Scanning for short-range targets");
        let found = self.connector.discover_short_range_targets().await?;
        info!("Found {} short-range targets", found.len());
        self.targets.send_replace(found.clone());
        Ok(found)
    }

    /// Connect over USB
    pub async fn connect_wired(&self) -> Result<String> {
        self.connect(ConnectRequest::Wired).await
    }

    /// Connect over the network to `address:port`
    pub async fn connect_network(&self, address: &str, port: u16) -> Result<String> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ProtocolError::InvalidAddress(address.to_string()));
        }
        self.connect(ConnectRequest::Network {
            address: address.to_string(),
            port,
        })
        .await
    }

    /// Connect over the network using a scanned connect code
    pub async fn connect_uri(&self, uri: &str) -> Result<String> {
        let (address, port) = parse_connect_uri(uri)?;
        self.connect_network(&address, port).await
    }

    /// Connect over Bluetooth to the selected target
    ///
    /// Fails with [`ProtocolError::NoTargetSelected`] before any state change
    /// when no target is selected.
    pub async fn connect_short_range(&self) -> Result<String> {
        let target = self
            .session
            .borrow()
            .selected_short_range_target
            .clone()
            .ok_or(ProtocolError::NoTargetSelected)?;
        self.connect(ConnectRequest::ShortRange { target }).await
    }

    /// Close the session
    ///
    /// The session is Disconnected as soon as this call starts running; no
    /// in-flight connect attempt can reconnect it afterwards. No-op if
    /// already disconnected.
    pub async fn disconnect(&self) {
        if !self.reset(DisconnectReason::UserRequested) {
            return;
        }
        info!("Disconnected");
        if let Err(e) = self.connector.close_current().await {
            warn!("Failed to close transport cleanly: {}", e);
        }
    }

    /// Hook for the transport to report a lost link
    ///
    /// Returns `true` if the session was connected or connecting.
    pub fn handle_transport_lost(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let changed = self.reset(DisconnectReason::TransportLost(message.clone()));
        if changed {
            warn!("Transport lost: {}", message);
        }
        changed
    }

    fn reset(&self, reason: DisconnectReason) -> bool {
        self.session.send_if_modified(|s| {
            if s.state == ConnectionState::Disconnected {
                return false;
            }
            self.epoch.fetch_add(1, Ordering::SeqCst);
            s.state = ConnectionState::Disconnected;
            s.peer_label.clear();
            s.last_disconnect = Some(reason);
            true
        })
    }

    async fn connect(&self, request: ConnectRequest) -> Result<String> {
        if self.session.borrow().state != ConnectionState::Disconnected {
            debug!("Replacing current session before connecting");
            self.disconnect().await;
        }

        let kind = request.kind();
        let epoch = self.session_epoch_begin(kind);
        info!("Connecting to {} via {}", request.describe(), kind);

        let opened = match &request {
            ConnectRequest::Wired => self.connector.open_wired().await,
            ConnectRequest::Network { address, port } => {
                self.connector.open_network(address, *port).await
            }
            ConnectRequest::ShortRange { target } => self.connector.open_short_range(target).await,
        };

        match opened {
            Ok(link) => {
                let peer_label = request.peer_label(link);
                let applied = self.session.send_if_modified(|s| {
                    if self.epoch.load(Ordering::SeqCst) != epoch {
                        return false;
                    }
                    s.state = ConnectionState::Connected;
                    s.peer_label = peer_label.clone();
                    s.last_disconnect = None;
                    true
                });

                if !applied {
                    debug!("Connect attempt to {} was superseded", request.describe());
                    if self.session.borrow().state == ConnectionState::Disconnected {
                        if let Err(e) = self.connector.close_current().await {
                            warn!("Failed to close superseded link: {}", e);
                        }
                    }
                    return Err(ProtocolError::Cancelled(format!(
                        "connection attempt to {} was superseded",
                        request.describe()
                    )));
                }

                info!("Connected to {} ({})", peer_label, kind);
                if let Err(e) = self.history.record(request.history_record(&peer_label)).await {
                    warn!("Failed to persist connection history: {}", e);
                }
                Ok(request.success_message())
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", request.describe(), e);
                let message = e.to_string();
                self.session.send_if_modified(|s| {
                    if self.epoch.load(Ordering::SeqCst) != epoch {
                        return false;
                    }
                    s.state = ConnectionState::Disconnected;
                    s.peer_label.clear();
                    s.last_disconnect = Some(DisconnectReason::ConnectFailed(message.clone()));
                    true
                });
                Err(e)
            }
        }
    }

    fn session_epoch_begin(&self, kind: TransportKind) -> u64 {
        let mut epoch = 0;
        self.session.send_modify(|s| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            s.state = ConnectionState::Connecting;
            s.transport_kind = kind;
            s.peer_label.clear();
        });
        epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryConfig, MemoryHistoryBackend};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct ScriptedConnector {
        fail_with: Mutex<Option<String>>,
        delay: Option<Duration>,
        closes: Mutex<u32>,
    }

    impl ScriptedConnector {
        async fn open(&self) -> Result<LinkInfo> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.fail_with.lock().unwrap().clone() {
                Some(msg) => Err(ProtocolError::Transport(msg)),
                None => Ok(LinkInfo::default()),
            }
        }
    }

    #[async_trait]
    impl TransportConnector for ScriptedConnector {
        async fn open_wired(&self) -> Result<LinkInfo> {
            self.open().await
        }

        async fn open_network(&self, _address: &str, _port: u16) -> Result<LinkInfo> {
            self.open().await
        }

        async fn open_short_range(&self, _target: &str) -> Result<LinkInfo> {
            self.open().await
        }

        async fn discover_short_range_targets(&self) -> Result<Vec<String>> {
            Ok(vec!["Laptop".to_string(), "Desktop".to_string()])
        }

        async fn close_current(&self) -> Result<()> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn manager_with(connector: Arc<ScriptedConnector>) -> SessionManager {
        let history = RecentConnectionStore::new(
            Arc::new(MemoryHistoryBackend::new()),
            HistoryConfig::default(),
        );
        SessionManager::new(connector, history)
    }

    #[tokio::test]
    async fn test_connect_network_success() {
        let manager = manager_with(Arc::new(ScriptedConnector::default()));

        let message = manager.connect_network("10.0.0.5", 9000).await.unwrap();
        assert!(message.contains("10.0.0.5"));

        let session = manager.session();
        assert!(session.is_connected());
        assert_eq!(session.transport_kind, TransportKind::Network);
        assert_eq!(session.peer_label, "Computer at 10.0.0.5");

        let latest = manager.history().latest().unwrap();
        assert_eq!(latest.address, "10.0.0.5");
        assert_eq!(latest.port, Some(9000));
        assert_eq!(latest.transport_kind, TransportKind::Network);
    }

    #[tokio::test]
    async fn test_connect_short_range_requires_target() {
        let manager = manager_with(Arc::new(ScriptedConnector::default()));
        let mut rx = manager.subscribe();

        let outcome = ConnectOutcome::from(manager.connect_short_range().await);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "no target selected");

        // No transition to Connecting happened
        assert!(!rx.has_changed().unwrap());
        assert_eq!(manager.session().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_short_range_uses_selected_target() {
        let manager = manager_with(Arc::new(ScriptedConnector::default()));

        let targets = manager.scan_short_range_targets().await.unwrap();
        manager.select_short_range_target(Some(targets[0].clone()));

        let message = manager.connect_short_range().await.unwrap();
        assert_eq!(message, "Connected successfully to Laptop via Bluetooth");
        assert_eq!(manager.session().peer_label, "Laptop");
        assert_eq!(manager.history().latest().unwrap().address, "Laptop");
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_disconnected() {
        let connector = Arc::new(ScriptedConnector::default());
        *connector.fail_with.lock().unwrap() = Some("cable unplugged".to_string());
        let manager = manager_with(connector);

        let err = manager.connect_wired().await.unwrap_err();
        assert!(err.to_string().contains("cable unplugged"));

        let session = manager.session();
        assert_eq!(session.state, ConnectionState::Disconnected);
        assert!(session.peer_label.is_empty());
        assert!(matches!(
            session.last_disconnect,
            Some(DisconnectReason::ConnectFailed(_))
        ));
        assert!(manager.history().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_clears_peer_label() {
        let connector = Arc::new(ScriptedConnector::default());
        let manager = manager_with(connector.clone());

        manager.connect_wired().await.unwrap();
        assert_eq!(manager.session().peer_label, WIRED_PEER_LABEL);

        manager.disconnect().await;
        let session = manager.session();
        assert!(!session.is_connected());
        assert!(session.peer_label.is_empty());
        assert_eq!(session.last_disconnect, Some(DisconnectReason::UserRequested));
        assert_eq!(*connector.closes.lock().unwrap(), 1);

        // Second disconnect is a no-op
        manager.disconnect().await;
        assert_eq!(*connector.closes.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_connect_is_a_hard_barrier() {
        let connector = Arc::new(ScriptedConnector {
            delay: Some(Duration::from_millis(1500)),
            ..Default::default()
        });
        let manager = manager_with(connector);

        let attempt = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect_network("10.0.0.9", 8080).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.session().state, ConnectionState::Connecting);
        manager.disconnect().await;

        let result = attempt.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::Cancelled(_))));
        assert_eq!(manager.session().state, ConnectionState::Disconnected);
        assert!(manager.history().is_empty());
    }

    #[tokio::test]
    async fn test_transport_lost_hook() {
        let manager = manager_with(Arc::new(ScriptedConnector::default()));
        assert!(!manager.handle_transport_lost("nothing to lose"));

        manager.connect_network("10.0.0.5", 9000).await.unwrap();
        assert!(manager.handle_transport_lost("wifi dropped"));

        let session = manager.session();
        assert_eq!(session.state, ConnectionState::Disconnected);
        assert_eq!(
            session.last_disconnect,
            Some(DisconnectReason::TransportLost("wifi dropped".to_string()))
        );
    }

    #[tokio::test]
    async fn test_reconnect_restarts_from_disconnected() {
        let connector = Arc::new(ScriptedConnector::default());
        let manager = manager_with(connector.clone());

        manager.connect_network("10.0.0.5", 9000).await.unwrap();
        manager.connect_wired().await.unwrap();

        assert_eq!(*connector.closes.lock().unwrap(), 1);
        let session = manager.session();
        assert_eq!(session.transport_kind, TransportKind::Wired);
        assert_eq!(manager.history().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_address_is_rejected() {
        let manager = manager_with(Arc::new(ScriptedConnector::default()));
        let err = manager.connect_network("  ", 9000).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
        assert_eq!(manager.session().state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_parse_connect_uri() {
        assert_eq!(
            parse_connect_uri("icondesk://connect/10.0.0.5:9000").unwrap(),
            ("10.0.0.5".to_string(), 9000)
        );
        for bad in [
            "http://connect/10.0.0.5:9000",
            "icondesk://connect/10.0.0.5",
            "icondesk://connect/:9000",
            "icondesk://connect/10.0.0.5:port",
            "icondesk://connect/a:b:9000",
        ] {
            assert!(matches!(
                parse_connect_uri(bad),
                Err(ProtocolError::InvalidAddress(_))
            ));
        }
    }
}
