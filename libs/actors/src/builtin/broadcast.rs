//! Selective broadcast shared by Demux and Replicator
//!
//! Up to 64 peers, one queue each. A dispatch sends an independent copy to
//! every peer selected by a bit mask and collects each copy's terminal
//! status before a common deadline.

use crate::actor::Actor;
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{ActorError, Result};
use flow_config::defaults;
use flow_types::{Message, MessageStatus};
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub(crate) struct Broadcast {
    owner: String,
    outlets: RwLock<Vec<Arc<Outlet>>>,
    metrics: Arc<ActorMetrics>,
}

impl Broadcast {
    pub(crate) fn new(owner: &str, metrics: Arc<ActorMetrics>) -> Self {
        Self {
            owner: owner.to_string(),
            outlets: RwLock::new(Vec::new()),
            metrics,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.outlets.read().len()
    }

    pub(crate) fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        let mut outlets = self.outlets.write();
        if outlets.len() >= defaults::actors::MAX_PEERS {
            return Err(ActorError::PeerCap {
                actor: self.owner.clone(),
                cap: defaults::actors::MAX_PEERS,
            });
        }
        let outlet = Arc::new(Outlet::new(
            &self.owner,
            defaults::actors::OUTLET_CAPACITY,
            Arc::clone(&self.metrics),
        ));
        outlet.connect(nthreads, peer);
        outlets.push(outlet);
        Ok(())
    }

    /// Send a copy of `msg` to every peer whose bit is set in `mask` and
    /// return one status per selected peer. A peer that has not completed
    /// its copy by `deadline` reports `TimedOut`; its copy is abandoned.
    pub(crate) async fn dispatch(
        &self,
        msg: &Message,
        mask: u64,
        deadline: Duration,
    ) -> Vec<MessageStatus> {
        let selected: Vec<Arc<Outlet>> = {
            let outlets = self.outlets.read();
            outlets
                .iter()
                .enumerate()
                .filter(|(idx, _)| mask & (1u64 << idx) != 0)
                .map(|(_, outlet)| Arc::clone(outlet))
                .collect()
        };

        let until = Instant::now() + deadline;
        let deliveries = selected.into_iter().map(|outlet| {
            let copy = msg.copy();
            async move {
                let completion = copy.completion();
                let delivery = async {
                    outlet.send(copy).await?;
                    Ok::<_, ActorError>(completion.wait().await)
                };
                match tokio::time::timeout_at(until, delivery).await {
                    Ok(Ok(status)) => status,
                    Ok(Err(_)) => MessageStatus::Failed,
                    Err(_) => MessageStatus::TimedOut,
                }
            }
        });

        join_all(deliveries).await
    }

    pub(crate) async fn close(&self) {
        let outlets = std::mem::take(&mut *self.outlets.write());
        for outlet in outlets {
            outlet.close().await;
        }
    }
}

/// Mask selecting the first `width` peers
pub(crate) fn full_mask(width: usize) -> u64 {
    match width {
        0 => 0,
        w if w >= 64 => u64::MAX,
        w => (1u64 << w) - 1,
    }
}
