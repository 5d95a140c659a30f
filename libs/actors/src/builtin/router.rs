//! Router: dispatch by the `sendto` metadata attribute
//!
//! Every connected peer gets its own queue keyed by the peer's name. A
//! message is routed to the queue named by its `sendto` attribute; messages
//! without one, or naming an unknown peer, complete `Unroutable`.

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, Params};
use flow_types::{Message, MessageStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Metadata attribute naming the destination peer
pub const ROUTE_KEY: &str = "sendto";

pub fn build(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(Router::new(name, ctx)))
}

pub struct Router {
    name: String,
    routes: RwLock<HashMap<String, Arc<Outlet>>>,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Router {
    pub fn new(name: &str, ctx: &Context) -> Self {
        Self {
            name: name.to_string(),
            routes: RwLock::new(HashMap::new()),
            state: Lifecycle::new(),
            metrics: ctx.metrics().actor(name),
        }
    }

    pub fn routes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Actor for Router {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.state.begin_start();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.state.begin_stop() {
            let routes = std::mem::take(&mut *self.routes.write());
            for (_, outlet) in routes {
                outlet.close().await;
            }
        }
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        let key = peer.name().to_string();
        let outlet = {
            let mut routes = self.routes.write();
            Arc::clone(routes.entry(key.clone()).or_insert_with(|| {
                Arc::new(Outlet::new(
                    &self.name,
                    defaults::actors::OUTLET_CAPACITY,
                    Arc::clone(&self.metrics),
                ))
            }))
        };
        outlet.connect(nthreads, peer);
        debug!(actor = %self.name, route = %key, "route added");
        Ok(())
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();

        let outlet = msg
            .meta(ROUTE_KEY)
            .and_then(|key| self.routes.read().get(&key).cloned());

        match outlet {
            Some(outlet) => outlet.send(msg).await,
            None => {
                warn!(actor = %self.name, route = ?msg.meta(ROUTE_KEY), "no route for message");
                msg.complete(MessageStatus::Unroutable);
                Ok(())
            }
        }
    }
}
