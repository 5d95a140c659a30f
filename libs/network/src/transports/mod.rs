//! Sink heads
//!
//! A [`Head`] is the transport back-end of a sink: it owns at most one live
//! connection and writes one framed message at a time. A failed write tells
//! the caller whether the connection should be considered broken.

use crate::endpoint::Endpoint;
use crate::framing::encode_line;
use crate::{Result, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub mod file;
pub mod tcp;
pub mod udp;
pub mod unix;

pub use file::{open_target, BoxedWriter, FileHead};
pub use tcp::TcpHead;
pub use udp::UdpHead;
pub use unix::UnixHead;

/// A failed head write
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct WriteError {
    pub error: TransportError,
    /// The head dropped its connection and wants to be reconnected
    pub reconnect: bool,
}

impl WriteError {
    pub fn broken(error: TransportError) -> Self {
        Self {
            error,
            reconnect: true,
        }
    }

    pub fn transient(error: TransportError) -> Self {
        Self {
            error,
            reconnect: false,
        }
    }
}

pub type WriteResult = std::result::Result<usize, WriteError>;

/// Transport back-end of a sink
#[async_trait]
pub trait Head: Send + Sync {
    /// Human readable target, used in logs
    fn target(&self) -> String;

    /// (Re)establish the connection, replacing any previous one
    async fn connect(&self) -> Result<()>;

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and release the connection
    async fn stop(&self) -> Result<()>;

    /// Write one message, returning the number of bytes put on the wire
    async fn write(&self, body: &[u8]) -> WriteResult;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the head for a sink endpoint
pub fn head_for(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Arc<dyn Head>> {
    match endpoint {
        Endpoint::Tcp(addr) => Ok(Arc::new(TcpHead::new(addr.clone(), connect_timeout))),
        Endpoint::Udp(addr) => Ok(Arc::new(UdpHead::new(addr.clone()))),
        Endpoint::Unix(path) => Ok(Arc::new(UnixHead::new(path.clone(), connect_timeout))),
        Endpoint::File(target) => Ok(Arc::new(FileHead::new(target.clone()))),
        Endpoint::Http { .. } => Err(TransportError::configuration(
            "http is not a sink transport",
            Some("bind"),
        )),
    }
}

/// Write a CRLF-framed body to a stream slot.
///
/// On failure the stream is dropped from the slot so the next write reports
/// a missing connection until the head is reconnected.
pub(crate) async fn write_line<S>(slot: &mut Option<S>, target: &str, body: &[u8]) -> WriteResult
where
    S: AsyncWrite + Unpin,
{
    let Some(stream) = slot.as_mut() else {
        return Err(WriteError::broken(TransportError::connection(
            "not connected",
            target,
        )));
    };

    let frame = encode_line(body);
    match stream.write_all(&frame).await {
        Ok(()) => Ok(frame.len()),
        Err(e) => {
            *slot = None;
            Err(WriteError::broken(TransportError::network_with_source(
                format!("write to {target} failed"),
                e,
            )))
        }
    }
}
