//! Transport Trait Abstraction
//!
//! Defines the interface the session manager uses to reach a remote device
//! over any of the supported channels (network, wired, short-range wireless).
//! The wire protocol, pairing and encryption live behind this trait.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Physical or logical channel used to reach the remote device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// TCP/IP over WiFi or Ethernet
    #[default]
    Network,

    /// USB cable
    Wired,

    /// Bluetooth
    ShortRange,
}

impl TransportKind {
    /// All transport kinds, in presentation order
    pub const ALL: [TransportKind; 3] = [
        TransportKind::Network,
        TransportKind::Wired,
        TransportKind::ShortRange,
    ];
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Network => write!(f, "WiFi"),
            TransportKind::Wired => write!(f, "USB"),
            TransportKind::ShortRange => write!(f, "Bluetooth"),
        }
    }
}

/// Information reported by the transport once a link is open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    /// Name the remote device announced, if any
    pub peer_name: Option<String>,
}

impl LinkInfo {
    /// Link with a device-announced name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            peer_name: Some(name.into()),
        }
    }
}

/// Lower transport layer consumed by [`crate::SessionManager`]
///
/// Every method resolves to success or a [`crate::ProtocolError`] carrying a
/// human-readable message. Implementations own retry policy; the session
/// manager never retries.
#[async_trait]
pub trait TransportConnector: Send + Sync + Debug {
    /// Open a USB link
    async fn open_wired(&self) -> Result<LinkInfo>;

    /// Open a network link to `address:port`
    async fn open_network(&self, address: &str, port: u16) -> Result<LinkInfo>;

    /// Open a Bluetooth link to a previously discovered target
    async fn open_short_range(&self, target: &str) -> Result<LinkInfo>;

    /// Scan for Bluetooth targets
    async fn discover_short_range_targets(&self) -> Result<Vec<String>>;

    /// Close whichever link is currently open
    ///
    /// Closing when nothing is open must succeed.
    async fn close_current(&self) -> Result<()>;
}
