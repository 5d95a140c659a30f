//! UDP head
//!
//! One datagram per message, no framing.

use super::{Head, WriteError, WriteResult};
use crate::{Result, TransportError};
use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Mutex;
use tracing::info;

pub struct UdpHead {
    addr: String,
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpHead {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            socket: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Head for UdpHead {
    fn target(&self) -> String {
        format!("udp://{}", self.addr)
    }

    async fn connect(&self) -> Result<()> {
        let remote = lookup_host(&self.addr)
            .await
            .map_err(|e| {
                TransportError::network_with_source(format!("resolve {} failed", self.addr), e)
            })?
            .next()
            .ok_or_else(|| TransportError::connection("no address resolved", &self.addr))?;

        let local = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TransportError::network_with_source("failed to bind UDP socket", e))?;
        socket.connect(remote).await.map_err(|e| {
            TransportError::network_with_source(format!("connect to {remote} failed"), e)
        })?;

        *self.socket.lock().await = Some(socket);
        info!(addr = %self.addr, "UDP head connected");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.socket.lock().await.take();
        Ok(())
    }

    async fn write(&self, body: &[u8]) -> WriteResult {
        let mut slot = self.socket.lock().await;
        let Some(socket) = slot.as_ref() else {
            return Err(WriteError::broken(TransportError::connection(
                "not connected",
                &self.addr,
            )));
        };

        match socket.send(body).await {
            Ok(n) => Ok(n),
            Err(e) => {
                *slot = None;
                Err(WriteError::broken(TransportError::network_with_source(
                    format!("send to {} failed", self.addr),
                    e,
                )))
            }
        }
    }
}
