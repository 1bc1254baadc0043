//! COSMIC Remote Protocol Core
//!
//! State managers for a companion-device remote session: connection and
//! transport selection, recent-connection history, remote filesystem
//! navigation, transfer tracking, screen-streaming quality control and
//! remote input.
//!
//! Each manager is an explicitly constructed, cloneable handle. State is
//! published through `tokio::sync::watch` channels so callers can render
//! live snapshots without re-issuing requests. The device itself is reached
//! through collaborator traits ([`TransportConnector`],
//! [`DirectoryProvider`], [`FileDataProvider`], [`CaptureCollaborator`],
//! [`CommandSink`]) implemented by the embedding application.

pub mod history;
pub mod navigator;
pub mod remote_input;
pub mod session;
pub mod streaming;
pub mod transfer;
pub mod transport;

mod error;

pub use error::{ProtocolError, Result};
pub use history::{
    ConnectionRecord, HistoryBackend, HistoryConfig, JsonHistoryBackend, MemoryHistoryBackend,
    RecentConnectionStore, MAX_RECENT_CONNECTIONS,
};
pub use navigator::{
    format_size, DirectoryProvider, FileDataProvider, FileViewer, ListingQuery, NavigatorState,
    RemoteEntry, RemoteNavigator, RemotePath, SortOrder, TransferTask, ROOT_SEGMENT,
};
pub use remote_input::{
    CommandSink, GamepadButton, KeyCode, MediaControl, NavigationButton, PointerAction,
    RemoteCommand, RemoteControl, SystemAction,
};
pub use session::{
    parse_connect_uri, ConnectOutcome, ConnectionState, DisconnectReason, Session,
    SessionManager, WIRED_ADDRESS, WIRED_PEER_LABEL,
};
pub use streaming::{
    format_data_usage, CaptureCollaborator, FastrandSampler, MetricSampler, QualityPreset,
    StreamingConfig, StreamingController, StreamingSession,
};
pub use transfer::{
    ProgressReporter, TransferConfig, TransferHandle, TransferKind, TransferRecord,
    TransferStatus, TransferTracker,
};
pub use transport::{LinkInfo, TransportConnector, TransportKind};

/// Default port of the companion app on the network transport
pub const DEFAULT_NETWORK_PORT: u16 = 8080;
