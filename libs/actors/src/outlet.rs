//! Outbound queues
//!
//! An [`Outlet`] is a bounded queue whose receiving end is shared by a pool
//! of worker tasks. Each worker pulls the next message and hands it to the
//! peer given to [`Outlet::connect`]. Connecting more than one peer to the
//! same outlet makes those peers compete for its messages.

use crate::actor::Actor;
use crate::metrics::ActorMetrics;
use crate::{ActorError, Result};
use flow_types::{Message, MessageStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Message>>>;

pub struct Outlet {
    owner: String,
    sender: Mutex<Option<mpsc::Sender<Message>>>,
    receiver: SharedReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<ActorMetrics>,
}

impl Outlet {
    pub fn new(owner: impl Into<String>, capacity: usize, metrics: Arc<ActorMetrics>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            owner: owner.into(),
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
            metrics,
        }
    }

    /// Enqueue `msg`, waiting while the queue is full
    pub async fn send(&self, msg: Message) -> Result<()> {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(ActorError::closed(&self.owner));
        };
        sender
            .send(msg)
            .await
            .map_err(|_| ActorError::closed(&self.owner))
    }

    /// Spawn `nthreads` workers delivering this outlet to `peer`
    pub fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) {
        let mut workers = self.workers.lock();
        for worker_id in 0..nthreads.max(1) {
            let handle = tokio::spawn(run_worker(
                self.owner.clone(),
                worker_id,
                Arc::clone(&self.receiver),
                Arc::clone(&peer),
                Arc::clone(&self.metrics),
            ));
            workers.push(handle);
        }
        debug!(actor = %self.owner, peer = %peer.name(), nthreads, "outlet connected");
    }

    /// Whether any peer has been connected and the workers are live
    pub fn has_peers(&self) -> bool {
        !self.workers.lock().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Close the queue and wait for the workers to drain it
    pub async fn close(&self) {
        self.sender.lock().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(actor = %self.owner, error = %e, "outlet worker panicked");
            }
        }
    }
}

async fn run_worker(
    owner: String,
    worker_id: usize,
    rx: SharedReceiver,
    peer: Arc<dyn Actor>,
    metrics: Arc<ActorMetrics>,
) {
    trace!(actor = %owner, peer = %peer.name(), worker_id, "outlet worker starting");
    let mut delivered = 0u64;

    loop {
        let msg = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(msg) = msg else {
            break;
        };

        let completion = msg.completion();
        match peer.receive(msg).await {
            Ok(()) => {
                metrics.record_sent();
                delivered += 1;
            }
            Err(e) => {
                metrics.record_failed();
                completion.complete(MessageStatus::Failed);
                warn!(actor = %owner, peer = %peer.name(), error = %e, "peer rejected message");
            }
        }
    }

    trace!(actor = %owner, worker_id, delivered, "outlet worker finished");
}
