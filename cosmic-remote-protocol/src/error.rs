//! Error handling for COSMIC Remote
//!
//! This module provides a single error type for every manager in the crate.
//! Errors are automatically converted from underlying library errors using `thiserror`.
//!
//! ## Error Categories
//!
//! ### Precondition Errors
//! The caller invoked an operation in a state where it cannot run:
//! - `NoTargetSelected`: short-range connect without a selected target
//! - `InvalidAddress`: network connect with an empty address
//! - `NotConnected`: remote input while the session is down
//!
//! These are returned synchronously and never retried.
//!
//! ### Transport and Provider Errors
//! Failures reported by the collaborators behind the transport, directory,
//! file data and capture traits. They travel through the same channel as a
//! successful completion and carry a human-readable message.
//!
//! ### Transfer Errors
//! `TransferFailed` marks the terminal failure of an upload, download or
//! compression. `Cancelled` marks a transfer or connect attempt that was
//! superseded or aborted.
//!
//! ## Logging Errors
//!
//! ```rust,ignore
//! use tracing::warn;
//!
//! if let Err(e) = store.record(record).await {
//!     warn!("Failed to persist connection history: {}", e);
//!     // Continue operation
//! }
//! ```

use thiserror::Error;

/// Result type for protocol operations
///
/// # Examples
///
/// ```rust
/// use cosmic_remote_protocol::Result;
///
/// fn example() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while driving a remote session
///
/// # Examples
///
/// ```rust
/// use cosmic_remote_protocol::ProtocolError;
///
/// let error = ProtocolError::NoTargetSelected;
/// assert_eq!(error.to_string(), "no target selected");
///
/// let error = ProtocolError::Transport("link dropped".to_string());
/// assert_eq!(error.to_string(), "Transport error: link dropped");
/// ```
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// I/O error (file system, network, etc.)
    ///
    /// Automatically converted from `std::io::Error`.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    ///
    /// Automatically converted from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport layer error
    ///
    /// Raised by a [`crate::TransportConnector`] when a link cannot be opened
    /// or is lost.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Network connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Connection timeout
    #[error("Connection timeout: {0}")]
    Timeout(String),

    /// Connection refused
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Network unreachable
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Short-range connect requested with no target selected
    #[error("no target selected")]
    NoTargetSelected,

    /// Network connect requested with an unusable address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Operation requires a connected session
    #[error("Not connected")]
    NotConnected,

    /// Remote directory or file data provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Capture collaborator error (recording, snapshots)
    #[error("Capture error: {0}")]
    Capture(String),

    /// A transfer reached its failed terminal state
    #[error("Transfer failed: {label}: {message}")]
    TransferFailed {
        /// Label of the transfer
        label: String,
        /// Message reported by the provider
        message: String,
    },

    /// Operation cancelled
    ///
    /// This error occurs when an operation is explicitly cancelled or
    /// superseded by a newer one.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid state
    ///
    /// This error occurs when an operation is attempted in an invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ProtocolError {
    /// Convert a generic I/O error into a more specific network error
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cosmic_remote_protocol::ProtocolError;
    /// use std::io::{Error, ErrorKind};
    ///
    /// let io_error = Error::new(ErrorKind::TimedOut, "connection timeout");
    /// let error = ProtocolError::from_io_error(io_error, "connecting to device");
    ///
    /// assert!(matches!(error, ProtocolError::Timeout(_)));
    /// ```
    pub fn from_io_error(error: std::io::Error, context: &str) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::TimedOut => ProtocolError::Timeout(format!("{}: {}", context, error)),
            ErrorKind::ConnectionRefused => {
                ProtocolError::ConnectionRefused(format!("{}: {}", context, error))
            }
            ErrorKind::NetworkUnreachable => {
                ProtocolError::NetworkUnreachable(format!("{}: {}", context, error))
            }
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                ProtocolError::NetworkError(format!(
                    "{}: connection interrupted ({})",
                    context, error
                ))
            }
            _ => ProtocolError::Io(error),
        }
    }

    /// Check if this error is recoverable (transient error that can be retried)
    ///
    /// The core never retries by itself; this only informs the caller.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cosmic_remote_protocol::ProtocolError;
    ///
    /// assert!(ProtocolError::Timeout("slow".to_string()).is_recoverable());
    /// assert!(!ProtocolError::NoTargetSelected.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout(_)
                | ProtocolError::NetworkError(_)
                | ProtocolError::NetworkUnreachable(_)
                | ProtocolError::ConnectionRefused(_)
                | ProtocolError::Transport(_)
                | ProtocolError::Io(_)
        )
    }

    /// Check if this error is a precondition failure raised before any work started
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProtocolError::NoTargetSelected
                | ProtocolError::InvalidAddress(_)
                | ProtocolError::NotConnected
                | ProtocolError::InvalidState(_)
        )
    }

    /// Get a user-friendly error message suitable for display in UI
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cosmic_remote_protocol::ProtocolError;
    ///
    /// assert_eq!(
    ///     ProtocolError::NotConnected.user_message(),
    ///     "No device connected. Connect to a device first."
    /// );
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            ProtocolError::NoTargetSelected => {
                "No device selected. Scan and pick a device first.".to_string()
            }
            ProtocolError::NotConnected => {
                "No device connected. Connect to a device first.".to_string()
            }
            ProtocolError::InvalidAddress(addr) => {
                format!("'{}' is not a valid address.", addr)
            }
            ProtocolError::Timeout(msg) => {
                format!("Connection timeout: {}. Check network connection.", msg)
            }
            ProtocolError::ConnectionRefused(_) => {
                "Connection refused. Check if the companion app is running on the device."
                    .to_string()
            }
            ProtocolError::NetworkUnreachable(_) => {
                "Network unreachable. Check if both devices are on the same network.".to_string()
            }
            ProtocolError::NetworkError(msg) => {
                format!("Network error: {}. Connection may be unstable.", msg)
            }
            ProtocolError::Transport(msg) => {
                format!(
                    "Transport error: {}. Check network, USB and Bluetooth connections.",
                    msg
                )
            }
            ProtocolError::Provider(msg) => format!("Remote device error: {}.", msg),
            ProtocolError::Capture(msg) => format!("Capture error: {}.", msg),
            ProtocolError::TransferFailed { label, message } => {
                format!("Transfer of '{}' failed: {}.", label, message)
            }
            ProtocolError::Cancelled(msg) => format!("Operation cancelled: {}.", msg),
            ProtocolError::Configuration(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            ProtocolError::InvalidState(msg) => format!("Invalid state: {}.", msg),
            ProtocolError::Io(e) => format!("I/O error: {}.", e),
            ProtocolError::Json(e) => format!("Data format error: {}.", e),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidState(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        ProtocolError::Provider(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ProtocolError::NoTargetSelected.to_string(), "no target selected");
        assert_eq!(ProtocolError::NotConnected.to_string(), "Not connected");

        let error = ProtocolError::TransferFailed {
            label: "report.pdf".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(error.to_string(), "Transfer failed: report.pdf: disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        use std::io::{Error, ErrorKind};

        let io_error = Error::new(ErrorKind::NotFound, "file not found");
        let protocol_error: ProtocolError = io_error.into();

        assert!(matches!(protocol_error, ProtocolError::Io(_)));
        assert!(protocol_error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_io_error_maps_network_kinds() {
        use std::io::{Error, ErrorKind};

        let error = ProtocolError::from_io_error(
            Error::new(ErrorKind::ConnectionRefused, "refused"),
            "opening link",
        );
        assert!(matches!(error, ProtocolError::ConnectionRefused(_)));
        assert!(error.is_recoverable());

        let error =
            ProtocolError::from_io_error(Error::new(ErrorKind::BrokenPipe, "pipe"), "sending");
        assert!(matches!(error, ProtocolError::NetworkError(_)));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(ProtocolError::NoTargetSelected.is_precondition());
        assert!(ProtocolError::InvalidAddress(String::new()).is_precondition());
        assert!(!ProtocolError::Transport("lost".to_string()).is_precondition());
        assert!(!ProtocolError::NoTargetSelected.is_recoverable());
    }
}
