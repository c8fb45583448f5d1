//! Robot link: one connection, serialized sends, one reconnect per failure

use crate::error::LinkError;
use crate::memory::{MemoryLog, MemoryTransport};
use crate::tcp::TcpTransport;
use crate::transport::{Transport, TransportType};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use visalign_core::{Command, Endpoint};

/// Connection state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Commands written successfully, retries included
    pub sent: u64,
    /// Send calls that reported failure
    pub failed: u64,
    /// Reconnects triggered by a failed write
    pub reconnects: u64,
}

struct LinkInner {
    transport: Box<dyn Transport>,
    endpoint: Option<Endpoint>,
}

/// Stateful command link to the robot controller.
///
/// Every operation that touches the transport holds the same async mutex,
/// so at most one write is in flight and `disconnect` never closes the
/// handle under a running send. The state flag is readable without
/// waiting on that mutex but is only written while it is held.
pub struct RobotLink {
    inner: tokio::sync::Mutex<LinkInner>,
    state: RwLock<LinkState>,
    stats: Mutex<LinkStats>,
    transport_type: TransportType,
}

impl RobotLink {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let transport_type = transport.transport_type();
        Self {
            inner: tokio::sync::Mutex::new(LinkInner {
                transport,
                endpoint: None,
            }),
            state: RwLock::new(LinkState::Disconnected),
            stats: Mutex::new(LinkStats::default()),
            transport_type,
        }
    }

    /// Link over TCP
    pub fn tcp(connect_timeout: Duration) -> Self {
        Self::new(Box::new(TcpTransport::new(connect_timeout)))
    }

    /// Link over an in-memory transport, returning the log it records to
    pub fn memory() -> (Self, MemoryLog) {
        let log = MemoryLog::new();
        let link = Self::new(Box::new(MemoryTransport::new(log.clone())));
        (link, log)
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn stats(&self) -> LinkStats {
        *self.stats.lock()
    }

    /// Endpoint of the last connect request
    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.inner.lock().await.endpoint.clone()
    }

    /// Open a fresh connection, dropping any existing one first.
    ///
    /// Failure is reported, never raised: the link is left disconnected.
    pub async fn connect(&self, endpoint: Endpoint) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().await;
        inner.endpoint = Some(endpoint.clone());

        match self.open(&mut inner, &endpoint).await {
            Ok(()) => {
                info!("Connected to robot at {}", endpoint);
                Ok(())
            }
            Err(e) => {
                warn!("Connection to robot at {} failed: {}", endpoint, e);
                Err(e)
            }
        }
    }

    /// Send a best-effort `disconnected` notice, then close the handle.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.transport.is_connected() && !self.is_connected() {
            return;
        }

        if self.is_connected() {
            let notice = Bytes::from_static(Command::Disconnected.token().as_bytes());
            if let Err(e) = inner.transport.send(&notice).await {
                debug!("Disconnect notice not delivered: {}", e);
            }
        }

        self.set_state(LinkState::Disconnected);
        if let Err(e) = inner.transport.disconnect().await {
            debug!("Ignoring close error: {}", e);
        }
        info!("Disconnected from robot");
    }

    /// Send one command
    pub async fn send(&self, command: Command) -> Result<(), LinkError> {
        self.deliver(Bytes::from_static(command.token().as_bytes()))
            .await
    }

    /// Send an arbitrary token. Tokens must be ASCII without line breaks.
    pub async fn send_raw(&self, message: &str) -> Result<(), LinkError> {
        if message.is_empty() || !message.is_ascii() || message.contains(['\n', '\r']) {
            return Err(LinkError::InvalidPayload(message.to_string()));
        }
        self.deliver(Bytes::copy_from_slice(message.as_bytes())).await
    }

    async fn deliver(&self, payload: Bytes) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().await;
        let label = String::from_utf8_lossy(&payload).into_owned();

        if !self.is_connected() {
            warn!("Not connected, dropping {:?}", label);
            self.stats.lock().failed += 1;
            return Err(LinkError::NotConnected);
        }

        let first = match inner.transport.send(&payload).await {
            Ok(()) => {
                debug!("Sent {:?}", label);
                self.stats.lock().sent += 1;
                return Ok(());
            }
            Err(e) => e,
        };

        warn!("Write of {:?} failed: {}. Reconnecting...", label, first);
        let endpoint = match inner.endpoint.clone() {
            Some(endpoint) => endpoint,
            None => {
                self.close(&mut inner).await;
                self.stats.lock().failed += 1;
                return Err(first);
            }
        };

        self.stats.lock().reconnects += 1;
        if let Err(e) = self.open(&mut inner, &endpoint).await {
            error!("Reconnect to {} failed: {}", endpoint, e);
            self.stats.lock().failed += 1;
            return Err(e);
        }

        match inner.transport.send(&payload).await {
            Ok(()) => {
                info!("Resent {:?} after reconnect", label);
                self.stats.lock().sent += 1;
                Ok(())
            }
            Err(e) => {
                error!("Retry of {:?} failed: {}", label, e);
                self.close(&mut inner).await;
                self.stats.lock().failed += 1;
                Err(e)
            }
        }
    }

    async fn open(&self, inner: &mut LinkInner, endpoint: &Endpoint) -> Result<(), LinkError> {
        if inner.transport.is_connected() {
            if let Err(e) = inner.transport.disconnect().await {
                debug!("Ignoring close error on stale handle: {}", e);
            }
        }

        match inner.transport.connect(endpoint).await {
            Ok(()) => {
                self.set_state(LinkState::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected);
                Err(e)
            }
        }
    }

    async fn close(&self, inner: &mut LinkInner) {
        self.set_state(LinkState::Disconnected);
        if let Err(e) = inner.transport.disconnect().await {
            debug!("Ignoring close error: {}", e);
        }
    }

    fn set_state(&self, state: LinkState) {
        *self.state.write() = state;
    }
}
