//! Unix domain socket head

use super::{write_line, Head, WriteResult};
use crate::{Result, TransportError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct UnixHead {
    path: PathBuf,
    connect_timeout: Duration,
    stream: Mutex<Option<UnixStream>>,
}

impl UnixHead {
    pub fn new(path: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            connect_timeout,
            stream: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Head for UnixHead {
    fn target(&self) -> String {
        format!("unix://{}", self.path.display())
    }

    async fn connect(&self) -> Result<()> {
        let stream = tokio::time::timeout(self.connect_timeout, UnixStream::connect(&self.path))
            .await
            .map_err(|_| {
                TransportError::timeout("Unix connect", self.connect_timeout.as_millis() as u64)
            })?
            .map_err(|e| {
                TransportError::network_with_source(
                    format!("connect to {} failed", self.path.display()),
                    e,
                )
            })?;

        *self.stream.lock().await = Some(stream);
        info!(path = %self.path.display(), "Unix head connected");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(path = %self.path.display(), error = %e, "error shutting down Unix stream");
            }
        }
        Ok(())
    }

    async fn write(&self, body: &[u8]) -> WriteResult {
        let target = self.target();
        let mut slot = self.stream.lock().await;
        write_line(&mut *slot, &target, body).await
    }
}
