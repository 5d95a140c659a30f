//! Fanout: round-robin over peers
//!
//! Every `connect` adds a peer with its own queue. Each message goes to
//! exactly one peer, in rotation.

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, Params};
use flow_types::{Message, MessageStatus};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

pub fn build(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(Fanout::new(name, ctx)))
}

pub struct Fanout {
    name: String,
    outlets: RwLock<Vec<Arc<Outlet>>>,
    next: AtomicUsize,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Fanout {
    pub fn new(name: &str, ctx: &Context) -> Self {
        Self {
            name: name.to_string(),
            outlets: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
            state: Lifecycle::new(),
            metrics: ctx.metrics().actor(name),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.outlets.read().len()
    }
}

#[async_trait]
impl Actor for Fanout {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.state.begin_start();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.state.begin_stop() {
            let outlets = std::mem::take(&mut *self.outlets.write());
            for outlet in outlets {
                outlet.close().await;
            }
        }
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        let outlet = Arc::new(Outlet::new(
            &self.name,
            defaults::actors::OUTLET_CAPACITY,
            Arc::clone(&self.metrics),
        ));
        outlet.connect(nthreads, peer);
        self.outlets.write().push(outlet);
        Ok(())
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();

        let outlet = {
            let outlets = self.outlets.read();
            if outlets.is_empty() {
                None
            } else {
                let idx = self.next.fetch_add(1, Ordering::Relaxed) % outlets.len();
                Some(Arc::clone(&outlets[idx]))
            }
        };

        match outlet {
            Some(outlet) => outlet.send(msg).await,
            None => {
                warn!(actor = %self.name, "no peers connected");
                msg.complete(MessageStatus::Unroutable);
                Ok(())
            }
        }
    }
}
