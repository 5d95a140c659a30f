//! Test doubles shared by the unit tests

use crate::actor::Actor;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::FlowConfig;
use flow_types::{Message, MessageStatus, Metadata};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn test_context(maxprocs: usize) -> Context {
    let mut config = FlowConfig::default();
    config.system.maxprocs = maxprocs;
    Context::new(config)
}

/// How a [`Recorder`] completes what it receives
pub(crate) enum Reply {
    Status(MessageStatus),
    /// Statuses for successive messages; the last one repeats
    Script(Vec<MessageStatus>),
    /// Keep the message and never complete it
    Never,
}

/// Terminal actor that records every message
pub(crate) struct Recorder {
    name: String,
    reply: Reply,
    count: AtomicUsize,
    received: Mutex<Vec<(Vec<u8>, Metadata)>>,
    held: Mutex<Vec<Message>>,
    events: Option<EventLog>,
}

impl Recorder {
    pub(crate) fn new(name: &str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply,
            count: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
            events: None,
        })
    }

    pub(crate) fn done(name: &str) -> Arc<Self> {
        Self::new(name, Reply::Status(MessageStatus::Done))
    }

    pub(crate) fn with_status(name: &str, status: MessageStatus) -> Arc<Self> {
        Self::new(name, Reply::Status(status))
    }

    pub(crate) fn never(name: &str) -> Arc<Self> {
        Self::new(name, Reply::Never)
    }

    pub(crate) fn logged(name: &str, events: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: Reply::Status(MessageStatus::Done),
            count: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
            events: Some(Arc::clone(events)),
        })
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn bodies(&self) -> Vec<Vec<u8>> {
        self.received.lock().iter().map(|(b, _)| b.clone()).collect()
    }

    pub(crate) fn metas(&self) -> Vec<Metadata> {
        self.received.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    fn log(&self, event: &str) {
        if let Some(events) = &self.events {
            events.lock().push(format!("{event}:{}", self.name));
        }
    }
}

#[async_trait]
impl Actor for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.log("start");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log("stop");
        Ok(())
    }

    async fn connect(&self, _nthreads: usize, _peer: Arc<dyn Actor>) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "connect"))
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .push((msg.body().to_vec(), msg.meta_snapshot()));

        match &self.reply {
            Reply::Status(status) => {
                msg.complete(*status);
            }
            Reply::Script(script) => {
                let status = script
                    .get(n)
                    .or_else(|| script.last())
                    .copied()
                    .unwrap_or(MessageStatus::Done);
                msg.complete(status);
            }
            Reply::Never => self.held.lock().push(msg),
        }
        Ok(())
    }
}
