//! Dumper: write each body plus a newline to stdout, stderr or a file

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_network::transports::{open_target, BoxedWriter};
use flow_network::FileTarget;
use flow_types::{Message, MessageStatus};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct Dumper {
    name: String,
    target: FileTarget,
    writer: Mutex<Option<BoxedWriter>>,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Dumper {
    pub fn new(name: &str, ctx: &Context, target: FileTarget) -> Self {
        Self {
            name: name.to_string(),
            target,
            writer: Mutex::new(None),
            state: Lifecycle::new(),
            metrics: ctx.metrics().actor(name),
        }
    }

    pub fn target(&self) -> &FileTarget {
        &self.target
    }
}

#[async_trait]
impl Actor for Dumper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if !self.state.begin_start() {
            return Ok(());
        }
        let writer = open_target(&self.target)
            .await
            .map_err(|e| ActorError::io(&self.name, e))?;
        *self.writer.lock().await = Some(writer);
        debug!(actor = %self.name, out = %self.target, "dumper opened");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.state.begin_stop() {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.flush().await.map_err(|e| ActorError::io(&self.name, e))?;
        }
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();

        let written = {
            let mut slot = self.writer.lock().await;
            match slot.as_mut() {
                Some(writer) => {
                    let mut line = Vec::with_capacity(msg.body().len() + 1);
                    line.extend_from_slice(msg.body());
                    line.push(b'\n');
                    match writer.write_all(&line).await {
                        Ok(()) => writer.flush().await,
                        Err(e) => Err(e),
                    }
                }
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "dumper is not started",
                )),
            }
        };

        let status = match written {
            Ok(()) => MessageStatus::Done,
            Err(e) => {
                warn!(actor = %self.name, out = %self.target, error = %e, "dump failed");
                self.metrics.record_failed();
                MessageStatus::Failed
            }
        };
        self.metrics.record_status(status);
        msg.complete(status);
        Ok(())
    }
}
