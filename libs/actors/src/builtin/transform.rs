//! In-place message transforms
//!
//! A [`Transform`] rewrites a message before it is forwarded on the actor's
//! single outlet. Rejected messages are completed with the returned status
//! and never forwarded.

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{Context, Result};
use async_trait::async_trait;
use flow_config::defaults;
use flow_types::{Message, MessageStatus};
use std::sync::Arc;
use tracing::debug;

pub trait Transform: Send + Sync + 'static {
    /// Rewrite `msg`, or reject it with a terminal status
    fn apply(&self, msg: &mut Message) -> std::result::Result<(), MessageStatus>;
}

pub struct TransformActor<T> {
    name: String,
    transform: T,
    outlet: Outlet,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl<T: Transform> TransformActor<T> {
    pub fn new(name: &str, ctx: &Context, transform: T) -> Self {
        let metrics = ctx.metrics().actor(name);
        Self {
            name: name.to_string(),
            transform,
            outlet: Outlet::new(name, defaults::actors::OUTLET_CAPACITY, Arc::clone(&metrics)),
            state: Lifecycle::new(),
            metrics,
        }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }
}

#[async_trait]
impl<T: Transform> Actor for TransformActor<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.state.begin_start();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.state.begin_stop() {
            self.outlet.close().await;
        }
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        self.outlet.connect(nthreads, peer);
        Ok(())
    }

    async fn receive(&self, mut msg: Message) -> Result<()> {
        self.metrics.record_received();
        match self.transform.apply(&mut msg) {
            Ok(()) => self.outlet.send(msg).await,
            Err(status) => {
                debug!(actor = %self.name, status = %status, "message rejected");
                self.metrics.record_status(status);
                msg.complete(status);
                Ok(())
            }
        }
    }
}
