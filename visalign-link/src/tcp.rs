//! TCP transport

use crate::error::LinkError;
use crate::transport::{Transport, TransportType};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;
use visalign_core::Endpoint;

/// Plain TCP stream to the robot controller
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), LinkError> {
        if let Some(mut stale) = self.stream.take() {
            let _ = stale.shutdown().await;
        }

        let address = (endpoint.host.as_str(), endpoint.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| LinkError::Timeout(endpoint.to_string()))??;
        stream.set_nodelay(true)?;

        debug!("TCP stream open to {}", endpoint);
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        match self.stream.take() {
            Some(mut stream) => stream.shutdown().await.map_err(LinkError::from),
            None => Ok(()),
        }
    }

    async fn send(&mut self, data: &Bytes) -> Result<(), LinkError> {
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
