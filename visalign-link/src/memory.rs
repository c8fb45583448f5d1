//! In-process transport that records traffic instead of writing to a socket

use crate::error::LinkError;
use crate::transport::{Transport, TransportType};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use visalign_core::Endpoint;

/// Something that happened on a memory transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    Connected { connection: u32, endpoint: Endpoint },
    ConnectFailed { endpoint: Endpoint },
    Delivered { connection: u32, payload: String },
    WriteFailed { connection: u32, payload: String },
    Closed { connection: u32 },
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<MemoryEvent>,
    failing_connects: usize,
    failing_writes: usize,
    refuse: bool,
    write_delay: Option<Duration>,
    next_connection: u32,
}

/// Shared view of a [`MemoryTransport`]'s traffic and failure script
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    state: Arc<Mutex<LogState>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connect attempts fail
    pub fn fail_next_connects(&self, count: usize) {
        self.state.lock().failing_connects = count;
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().failing_writes = count;
    }

    /// Refuse every connect attempt until cleared
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Hold every write for `delay` before it completes
    pub fn delay_writes(&self, delay: Duration) {
        self.state.lock().write_delay = Some(delay);
    }

    pub fn events(&self) -> Vec<MemoryEvent> {
        self.state.lock().events.clone()
    }

    /// Payloads that reached the robot, in order
    pub fn delivered(&self) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                MemoryEvent::Delivered { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Payloads delivered on one connection
    pub fn delivered_on(&self, connection: u32) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                MemoryEvent::Delivered { connection: c, payload } if *c == connection => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    MemoryEvent::Connected { .. } | MemoryEvent::ConnectFailed { .. }
                )
            })
            .count()
    }

    pub fn write_attempts(&self) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    MemoryEvent::Delivered { .. } | MemoryEvent::WriteFailed { .. }
                )
            })
            .count()
    }

    /// Id of the most recently opened connection
    pub fn last_connection(&self) -> Option<u32> {
        self.state
            .lock()
            .events
            .iter()
            .rev()
            .find_map(|event| match event {
                MemoryEvent::Connected { connection, .. } => Some(*connection),
                _ => None,
            })
    }

    /// Drain the recorded events, returning the delivered payloads in order
    pub fn take_delivered(&self) -> Vec<String> {
        self.state
            .lock()
            .events
            .drain(..)
            .filter_map(|event| match event {
                MemoryEvent::Delivered { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: MemoryEvent) {
        self.state.lock().events.push(event);
    }
}

/// Transport that keeps everything in memory. Used for dry runs and tests.
pub struct MemoryTransport {
    log: MemoryLog,
    connection: Option<u32>,
}

impl MemoryTransport {
    pub fn new(log: MemoryLog) -> Self {
        Self {
            log,
            connection: None,
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), LinkError> {
        if let Some(stale) = self.connection.take() {
            self.log.record(MemoryEvent::Closed { connection: stale });
        }

        let outcome = {
            let mut state = self.log.state.lock();
            if state.refuse || state.failing_connects > 0 {
                state.failing_connects = state.failing_connects.saturating_sub(1);
                None
            } else {
                state.next_connection += 1;
                Some(state.next_connection)
            }
        };

        match outcome {
            Some(connection) => {
                self.log.record(MemoryEvent::Connected {
                    connection,
                    endpoint: endpoint.clone(),
                });
                self.connection = Some(connection);
                Ok(())
            }
            None => {
                self.log.record(MemoryEvent::ConnectFailed {
                    endpoint: endpoint.clone(),
                });
                Err(LinkError::Transport(format!("connection to {} refused", endpoint)))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        if let Some(connection) = self.connection.take() {
            self.log.record(MemoryEvent::Closed { connection });
        }
        Ok(())
    }

    async fn send(&mut self, data: &Bytes) -> Result<(), LinkError> {
        let connection = self.connection.ok_or(LinkError::NotConnected)?;
        let payload = String::from_utf8_lossy(data).into_owned();

        let (fail, delay) = {
            let mut state = self.log.state.lock();
            let fail = state.failing_writes > 0;
            state.failing_writes = state.failing_writes.saturating_sub(1);
            (fail, state.write_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            self.log.record(MemoryEvent::WriteFailed { connection, payload });
            return Err(LinkError::Transport("broken pipe".to_string()));
        }

        debug!("memory transport delivered {:?} on connection {}", payload, connection);
        self.log.record(MemoryEvent::Delivered { connection, payload });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}
