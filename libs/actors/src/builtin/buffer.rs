//! Buffer: bounded queue with retries
//!
//! Producers enqueue into a bounded inbound queue and block while it is full.
//! A pool of `system.maxprocs` workers sends a copy of each message
//! downstream and waits for the copy's status. Delivered messages complete
//! the original; anything else is re-queued at the tail until `max_retry`
//! retries have been spent, after which the original completes with the last
//! status observed.

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, lenient, Params};
use flow_types::{Message, MessageStatus};
use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct BufferSettings {
    #[serde(default = "default_capacity", deserialize_with = "lenient::value")]
    pub capacity: usize,
    #[serde(default = "default_max_retry", deserialize_with = "lenient::value")]
    pub max_retry: u32,
    #[serde(default, deserialize_with = "lenient::value")]
    pub retry_delay_ms: u64,
}

fn default_capacity() -> usize {
    defaults::actors::BUFFER_CAPACITY
}

fn default_max_retry() -> u32 {
    defaults::actors::BUFFER_MAX_RETRY
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_retry: default_max_retry(),
            retry_delay_ms: 0,
        }
    }
}

impl BufferSettings {
    /// Pause before a retry, jittered into `[delay / 2, delay]`
    fn retry_delay(&self) -> Option<Duration> {
        if self.retry_delay_ms == 0 {
            return None;
        }
        let low = self.retry_delay_ms / 2;
        let ms = rand::thread_rng().gen_range(low..=self.retry_delay_ms);
        Some(Duration::from_millis(ms))
    }
}

pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let settings: BufferSettings = params.parse(name)?;
    if settings.capacity == 0 {
        return Err(ActorError::construction(name, "capacity must be at least 1"));
    }
    Ok(Arc::new(Buffer::new(name, ctx, settings)))
}

struct Entry {
    msg: Message,
    retries: u32,
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<Entry>>>;

pub struct Buffer {
    name: String,
    settings: BufferSettings,
    nworkers: usize,
    sender: Mutex<Option<mpsc::Sender<Entry>>>,
    queue: SharedQueue,
    workers: Mutex<Vec<JoinHandle<()>>>,
    outlet: Arc<Outlet>,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Buffer {
    pub fn new(name: &str, ctx: &Context, settings: BufferSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        let metrics = ctx.metrics().actor(name);
        Self {
            name: name.to_string(),
            nworkers: ctx.maxprocs(),
            settings,
            sender: Mutex::new(Some(tx)),
            queue: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
            outlet: Arc::new(Outlet::new(
                name,
                defaults::actors::OUTLET_CAPACITY,
                Arc::clone(&metrics),
            )),
            state: Lifecycle::new(),
            metrics,
        }
    }

    pub fn settings(&self) -> &BufferSettings {
        &self.settings
    }
}

#[async_trait]
impl Actor for Buffer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if !self.state.begin_start() {
            return Ok(());
        }
        let Some(requeue) = self.sender.lock().as_ref().map(mpsc::Sender::downgrade) else {
            return Err(ActorError::closed(&self.name));
        };

        let mut workers = self.workers.lock();
        for worker_id in 0..self.nworkers.max(1) {
            workers.push(tokio::spawn(run_worker(Worker {
                owner: self.name.clone(),
                worker_id,
                queue: Arc::clone(&self.queue),
                requeue: requeue.clone(),
                outlet: Arc::clone(&self.outlet),
                settings: self.settings.clone(),
            })));
        }
        debug!(actor = %self.name, workers = workers.len(), capacity = self.settings.capacity, "buffer started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.state.begin_stop() {
            return Ok(());
        }
        self.sender.lock().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(actor = %self.name, error = %e, "buffer worker panicked");
            }
        }
        self.outlet.close().await;
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        self.outlet.connect(nthreads, peer);
        Ok(())
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(ActorError::closed(&self.name));
        };
        sender
            .send(Entry { msg, retries: 0 })
            .await
            .map_err(|_| ActorError::closed(&self.name))
    }
}

struct Worker {
    owner: String,
    worker_id: usize,
    queue: SharedQueue,
    requeue: mpsc::WeakSender<Entry>,
    outlet: Arc<Outlet>,
    settings: BufferSettings,
}

impl Worker {
    async fn attempt(&self, msg: &Message) -> MessageStatus {
        if !self.outlet.has_peers() {
            return MessageStatus::Failed;
        }
        let copy = msg.copy();
        let completion = copy.completion();
        match self.outlet.send(copy).await {
            Ok(()) => completion.wait().await,
            Err(_) => MessageStatus::Failed,
        }
    }

    fn retry(&self, mut entry: Entry, status: MessageStatus) {
        entry.retries += 1;
        let Some(sender) = self.requeue.upgrade() else {
            entry.msg.complete(status);
            return;
        };
        match sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) | Err(TrySendError::Closed(entry)) => {
                trace!(actor = %self.owner, retries = entry.retries, "cannot requeue, giving up");
                entry.msg.complete(status);
            }
        }
    }
}

async fn run_worker(worker: Worker) {
    trace!(actor = %worker.owner, worker_id = worker.worker_id, "buffer worker starting");

    loop {
        let entry = {
            let mut queue = worker.queue.lock().await;
            queue.recv().await
        };
        let Some(entry) = entry else {
            break;
        };

        let status = worker.attempt(&entry.msg).await;
        if status.is_delivered() || entry.retries >= worker.settings.max_retry {
            entry.msg.complete(status);
            continue;
        }

        if let Some(delay) = worker.settings.retry_delay() {
            tokio::time::sleep(delay).await;
        }
        worker.retry(entry, status);
    }

    trace!(actor = %worker.owner, worker_id = worker.worker_id, "buffer worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, Recorder, Reply};

    fn settings(capacity: usize, max_retry: u32) -> BufferSettings {
        BufferSettings {
            capacity,
            max_retry,
            retry_delay_ms: 0,
        }
    }

    async fn submit(buffer: &Buffer, body: &str) -> MessageStatus {
        let msg = Message::new(body);
        let completion = msg.completion();
        buffer.receive(msg).await.unwrap();
        completion.wait().await
    }

    #[tokio::test]
    async fn test_retries_until_delivered() {
        let ctx = test_context(1);
        let buffer = Buffer::new("buf", &ctx, settings(8, 2));
        let sink = Recorder::new(
            "flaky",
            Reply::Script(vec![
                MessageStatus::Failed,
                MessageStatus::Failed,
                MessageStatus::Done,
            ]),
        );
        buffer.connect(1, sink.clone()).await.unwrap();
        buffer.start().await.unwrap();

        assert_eq!(submit(&buffer, "alpha").await, MessageStatus::Done);
        buffer.stop().await.unwrap();
        assert_eq!(sink.count(), 3);
        assert!(sink.bodies().iter().all(|b| b == b"alpha"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_last_status() {
        let ctx = test_context(2);
        let buffer = Buffer::new("buf", &ctx, settings(8, 3));
        let sink = Recorder::with_status("down", MessageStatus::TimedOut);
        buffer.connect(1, sink.clone()).await.unwrap();
        buffer.start().await.unwrap();

        assert_eq!(submit(&buffer, "x").await, MessageStatus::TimedOut);
        buffer.stop().await.unwrap();
        assert_eq!(sink.count(), 4);
    }

    #[tokio::test]
    async fn test_default_retry_bound() {
        let ctx = test_context(1);
        let buffer = Buffer::new("buf", &ctx, BufferSettings::default());
        let sink = Recorder::with_status("down", MessageStatus::Failed);
        buffer.connect(1, sink.clone()).await.unwrap();
        buffer.start().await.unwrap();

        assert_eq!(submit(&buffer, "x").await, MessageStatus::Failed);
        buffer.stop().await.unwrap();
        assert_eq!(sink.count(), 1 + defaults::actors::BUFFER_MAX_RETRY as usize);
    }

    #[tokio::test]
    async fn test_each_message_completes_once() {
        let ctx = test_context(4);
        let buffer = Buffer::new(
            "buf",
            &ctx,
            BufferSettings {
                retry_delay_ms: 2,
                ..settings(64, 1)
            },
        );
        let sink = Recorder::new(
            "half",
            Reply::Script(vec![MessageStatus::Failed, MessageStatus::Done]),
        );
        buffer.connect(2, sink.clone()).await.unwrap();
        buffer.start().await.unwrap();

        let mut completions = Vec::new();
        for i in 0..20 {
            let msg = Message::new(format!("m{i}"));
            completions.push(msg.completion());
            buffer.receive(msg).await.unwrap();
        }
        for c in &completions {
            assert!(c.wait().await.is_delivered());
        }
        buffer.stop().await.unwrap();
        assert_eq!(sink.count(), 21);
    }

    #[tokio::test]
    async fn test_without_peer_fails_and_stops() {
        let ctx = test_context(1);
        let buffer = Buffer::new("buf", &ctx, settings(4, 0));
        buffer.start().await.unwrap();
        assert_eq!(submit(&buffer, "x").await, MessageStatus::Failed);
        buffer.stop().await.unwrap();
        assert!(buffer.receive(Message::new("late")).await.is_err());
    }

    #[test]
    fn test_params() {
        let ctx = test_context(1);
        let params = Params::new().with("capacity", "8").with("max_retry", 2);
        assert!(build("b", &ctx, &params).is_ok());
        assert!(build("b", &ctx, &Params::new().with("capacity", 0)).is_err());
    }
}
