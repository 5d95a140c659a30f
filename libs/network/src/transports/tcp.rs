//! TCP head
//!
//! Line-framed egress over a single TCP stream.

use super::{write_line, Head, WriteResult};
use crate::{Result, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct TcpHead {
    addr: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpHead {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            stream: Mutex::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }
}

#[async_trait]
impl Head for TcpHead {
    fn target(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    async fn connect(&self) -> Result<()> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                TransportError::timeout("TCP connect", self.connect_timeout.as_millis() as u64)
            })?
            .map_err(|e| {
                TransportError::network_with_source(format!("connect to {} failed", self.addr), e)
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!(addr = %self.addr, error = %e, "failed to set TCP_NODELAY");
        }

        *self.stream.lock().await = Some(stream);
        info!(addr = %self.addr, "TCP head connected");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(addr = %self.addr, error = %e, "error shutting down TCP stream");
            }
        }
        Ok(())
    }

    async fn write(&self, body: &[u8]) -> WriteResult {
        let mut slot = self.stream.lock().await;
        write_line(&mut *slot, &self.addr, body).await
    }
}
