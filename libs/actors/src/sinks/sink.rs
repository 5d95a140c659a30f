//! Reconnecting sink over a transport head
//!
//! A receive loop writes each message through the head and completes it
//! `Done` or `Failed`. When a write reports a broken connection the loop asks
//! the reconnect loop, which re-runs `Head::connect` under the configured
//! backoff. Requests coalesce: at most one is pending at a time.

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::defaults;
use flow_network::{Head, ReconnectPolicy};
use flow_types::{Message, MessageStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub struct SinkActor {
    name: String,
    head: Arc<dyn Head>,
    policy: ReconnectPolicy,
    inbound: Mutex<Option<mpsc::Sender<Message>>>,
    queue: Mutex<Option<mpsc::Receiver<Message>>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl SinkActor {
    pub fn new(name: &str, ctx: &Context, head: Arc<dyn Head>, policy: ReconnectPolicy) -> Self {
        let (tx, rx) = mpsc::channel(defaults::actors::SINK_QUEUE_CAPACITY);
        Self {
            name: name.to_string(),
            head,
            policy,
            inbound: Mutex::new(Some(tx)),
            queue: Mutex::new(Some(rx)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            state: Lifecycle::new(),
            metrics: ctx.metrics().actor(name),
        }
    }

    pub fn target(&self) -> String {
        self.head.target()
    }

    fn spawn_reconnect_loop(&self, mut requests: mpsc::Receiver<()>) {
        let owner = self.name.clone();
        let head = Arc::clone(&self.head);
        let policy = self.policy;
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            let target = head.target();
            loop {
                let request = tokio::select! {
                    _ = cancel.cancelled() => break,
                    request = requests.recv() => request,
                };
                if request.is_none() {
                    break;
                }

                let attempt = policy.run(&target, || head.connect());
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => break,
                    outcome = attempt => outcome,
                };
                match outcome {
                    Ok(attempts) => info!(actor = %owner, target = %target, attempts, "sink reconnected"),
                    Err(e) => {
                        error!(actor = %owner, target = %target, error = %e, "sink reconnect exhausted, giving up");
                        break;
                    }
                }
            }
            debug!(actor = %owner, "reconnect loop finished");
        });
    }

    fn spawn_receive_loop(&self, mut queue: mpsc::Receiver<Message>, reconnect: mpsc::Sender<()>) {
        let owner = self.name.clone();
        let head = Arc::clone(&self.head);
        let metrics = Arc::clone(&self.metrics);

        self.tracker.spawn(async move {
            while let Some(msg) = queue.recv().await {
                let status = match head.write(msg.body()).await {
                    Ok(_) => match head.flush().await {
                        Ok(()) => MessageStatus::Done,
                        Err(e) => {
                            warn!(actor = %owner, error = %e, "sink flush failed");
                            MessageStatus::Failed
                        }
                    },
                    Err(e) => {
                        debug!(actor = %owner, error = %e.error, reconnect = e.reconnect, "sink write failed");
                        if e.reconnect {
                            // A full channel already holds a pending request.
                            let _ = reconnect.try_send(());
                        }
                        MessageStatus::Failed
                    }
                };
                if status == MessageStatus::Failed {
                    metrics.record_failed();
                }
                metrics.record_status(status);
                msg.complete(status);
            }
            debug!(actor = %owner, "receive loop finished");
        });
    }
}

#[async_trait]
impl Actor for SinkActor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if !self.state.begin_start() {
            return Ok(());
        }
        let Some(queue) = self.queue.lock().take() else {
            return Err(ActorError::closed(&self.name));
        };
        self.head.start().await?;

        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        if let Err(e) = self.head.connect().await {
            warn!(actor = %self.name, target = %self.head.target(), error = %e, "initial connect failed, retrying in background");
            let _ = reconnect_tx.try_send(());
        }
        self.spawn_reconnect_loop(reconnect_rx);
        self.spawn_receive_loop(queue, reconnect_tx);

        info!(actor = %self.name, target = %self.head.target(), "sink started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.state.begin_stop() {
            return Ok(());
        }
        self.inbound.lock().take();
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.head.stop().await?;
        info!(actor = %self.name, "sink stopped");
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();
        let sender = self.inbound.lock().clone();
        let Some(sender) = sender else {
            return Err(ActorError::closed(&self.name));
        };
        sender
            .send(msg)
            .await
            .map_err(|_| ActorError::closed(&self.name))
    }
}
