//! COSMIC Remote Transport Layer
//!
//! The transport layer supports multiple channel kinds (network, wired,
//! short-range) through a common trait interface. Concrete links are
//! provided by the embedding application.

mod r#trait;

pub use r#trait::{LinkInfo, TransportConnector, TransportKind};
