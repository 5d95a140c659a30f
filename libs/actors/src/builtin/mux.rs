//! Mux: many producers into one consumer

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, Params};
use flow_types::Message;
use std::sync::Arc;

pub fn build(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(Mux::new(name, ctx)))
}

pub struct Mux {
    name: String,
    outlet: Outlet,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Mux {
    pub fn new(name: &str, ctx: &Context) -> Self {
        let metrics = ctx.metrics().actor(name);
        Self {
            name: name.to_string(),
            outlet: Outlet::new(name, defaults::actors::OUTLET_CAPACITY, Arc::clone(&metrics)),
            state: Lifecycle::new(),
            metrics,
        }
    }
}

#[async_trait]
impl Actor for Mux {
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

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();
        self.outlet.send(msg).await
    }
}
