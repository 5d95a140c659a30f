//! Test actors

use async_trait::async_trait;
use flow_actors::{Actor, ActorError, Context, Params, Result};
use flow_types::{Message, MessageStatus};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CollectorParams {
    #[serde(default)]
    status: Option<MessageStatus>,
}

/// Terminal actor recording bodies and metadata
pub struct Collector {
    name: String,
    status: MessageStatus,
    received: Mutex<Vec<(Vec<u8>, HashMap<String, String>)>>,
}

impl Collector {
    pub fn build(name: &str, _ctx: &Context, params: &Params) -> Result<Arc<Self>> {
        let params: CollectorParams = params.parse(name)?;
        let status = params.status.unwrap_or(MessageStatus::Done);
        if !status.is_terminal() {
            return Err(ActorError::construction(name, "status must be terminal"));
        }
        Ok(Arc::new(Self {
            name: name.to_string(),
            status,
            received: Mutex::new(Vec::new()),
        }))
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|(body, _)| String::from_utf8_lossy(body).into_owned())
            .collect()
    }

    pub fn meta(&self, index: usize, key: &str) -> Option<String> {
        self.received.lock().get(index)?.1.get(key).cloned()
    }
}

#[async_trait]
impl Actor for Collector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.received
            .lock()
            .push((msg.body().to_vec(), msg.meta_snapshot()));
        msg.complete(self.status);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FlakyParams {
    #[serde(default)]
    fail_first: Option<usize>,
}

/// Sink failing the first deliveries of each distinct body
pub struct FlakySink {
    name: String,
    fail_first: usize,
    attempts: AtomicUsize,
    per_body: Mutex<HashMap<Vec<u8>, usize>>,
}

impl FlakySink {
    pub fn build(name: &str, _ctx: &Context, params: &Params) -> Result<Arc<Self>> {
        let params: FlakyParams = params.parse(name)?;
        Ok(Arc::new(Self {
            name: name.to_string(),
            fail_first: params.fail_first.unwrap_or(0),
            attempts: AtomicUsize::new(0),
            per_body: Mutex::new(HashMap::new()),
        }))
    }

    /// Deliveries seen, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Actor for FlakySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let seen = {
            let mut per_body = self.per_body.lock();
            let seen = per_body.entry(msg.body().to_vec()).or_insert(0);
            *seen += 1;
            *seen
        };
        let status = if seen <= self.fail_first {
            MessageStatus::Failed
        } else {
            MessageStatus::Done
        };
        msg.complete(status);
        Ok(())
    }
}

/// Sink holding every message without completing it
pub struct SilentSink {
    name: String,
    held: Mutex<Vec<Message>>,
}

impl SilentSink {
    pub fn build(name: &str, _ctx: &Context, _params: &Params) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            name: name.to_string(),
            held: Mutex::new(Vec::new()),
        }))
    }

    pub fn held(&self) -> usize {
        self.held.lock().len()
    }
}

#[async_trait]
impl Actor for SilentSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Held messages complete `Failed` as they are dropped
    async fn stop(&self) -> Result<()> {
        self.held.lock().clear();
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.held.lock().push(msg);
        Ok(())
    }
}
