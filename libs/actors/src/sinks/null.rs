//! Null sink: completes everything `Done`

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_types::{Message, MessageStatus};
use std::sync::Arc;

pub struct NullSink {
    name: String,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl NullSink {
    pub fn new(name: &str, ctx: &Context) -> Self {
        Self {
            name: name.to_string(),
            state: Lifecycle::new(),
            metrics: ctx.metrics().actor(name),
        }
    }
}

#[async_trait]
impl Actor for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.state.begin_start();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.state.begin_stop();
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();
        self.metrics.record_status(MessageStatus::Done);
        msg.complete(MessageStatus::Done);
        Ok(())
    }
}
