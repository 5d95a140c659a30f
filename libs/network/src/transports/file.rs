//! File head
//!
//! Writes CRLF-framed messages to standard output, standard error or a file
//! opened in append mode. Output is buffered until the caller flushes.

use super::{write_line, Head, WriteResult};
use crate::endpoint::FileTarget;
use crate::{Result, TransportError};
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Open a file target for writing; files are created and appended to
pub async fn open_target(target: &FileTarget) -> std::io::Result<BoxedWriter> {
    match target {
        FileTarget::Stdout => Ok(Box::new(tokio::io::stdout())),
        FileTarget::Stderr => Ok(Box::new(tokio::io::stderr())),
        FileTarget::Path(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            Ok(Box::new(file))
        }
    }
}

pub struct FileHead {
    target: FileTarget,
    writer: Mutex<Option<BufWriter<BoxedWriter>>>,
}

impl FileHead {
    pub fn new(target: FileTarget) -> Self {
        Self {
            target,
            writer: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Head for FileHead {
    fn target(&self) -> String {
        self.target.to_string()
    }

    async fn connect(&self) -> Result<()> {
        let writer = open_target(&self.target)
            .await
            .map_err(|e| TransportError::io(format!("open {} failed", self.target), e))?;

        let previous = self.writer.lock().await.replace(BufWriter::new(writer));
        if let Some(mut previous) = previous {
            if let Err(e) = previous.flush().await {
                warn!(target_file = %self.target, error = %e, "flush of replaced writer failed");
            }
        }
        debug!(target_file = %self.target, "file head opened");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer
                .flush()
                .await
                .map_err(|e| TransportError::io(format!("flush {} failed", self.target), e))?;
        }
        Ok(())
    }

    async fn write(&self, body: &[u8]) -> WriteResult {
        let target = self.target.to_string();
        let mut slot = self.writer.lock().await;
        write_line(&mut *slot, &target, body).await
    }

    async fn flush(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().await.as_mut() {
            writer
                .flush()
                .await
                .map_err(|e| TransportError::io(format!("flush {} failed", self.target), e))?;
        }
        Ok(())
    }
}
