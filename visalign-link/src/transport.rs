//! Transport layer abstraction

use crate::error::LinkError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use visalign_core::Endpoint;

/// Transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    /// Reliable byte stream over TCP
    Tcp,
    /// In-process recording transport
    Memory,
}

/// A byte pipe to the robot controller.
///
/// Implementations own at most one live handle. `connect` must drop any
/// existing handle before opening a new one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Open a new handle to `endpoint`, closing any previous one
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), LinkError>;

    /// Close the current handle
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Write the whole payload
    async fn send(&mut self, data: &Bytes) -> Result<(), LinkError>;

    /// Check if a handle is open
    fn is_connected(&self) -> bool;
}
