//! The actor contract
//!
//! Every pipeline node implements [`Actor`]. Messages enter through
//! [`Actor::receive`]; [`Actor::connect`] wires the node's outbound side to a
//! peer and spawns the worker tasks that feed it.

use crate::Result;
use async_trait::async_trait;
use flow_types::Message;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[async_trait]
pub trait Actor: Send + Sync {
    /// Stable name, unique within a pipeline
    fn name(&self) -> &str;

    /// Open sockets and spawn background tasks. Calling it again is a no-op.
    async fn start(&self) -> Result<()>;

    /// Close inbound queues, drain outbound workers and release resources.
    /// Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Deliver this actor's output to `peer` using `nthreads` worker tasks
    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()>;

    /// Hand a message to the actor. Ownership moves with the call; a message
    /// dropped without completion ends up `Failed`.
    async fn receive(&self, msg: Message) -> Result<()>;
}

impl fmt::Debug for dyn Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor").field("name", &self.name()).finish()
    }
}

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    New,
    Started,
    Stopped,
}

const NEW: u8 = 0;
const STARTED: u8 = 1;
const STOPPED: u8 = 2;

/// One-way `New → Started → Stopped` transitions
#[derive(Debug, Default)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn new() -> Self {
        Self(AtomicU8::new(NEW))
    }

    pub fn state(&self) -> ActorState {
        match self.0.load(Ordering::Acquire) {
            NEW => ActorState::New,
            STARTED => ActorState::Started,
            _ => ActorState::Stopped,
        }
    }

    /// Returns `true` for the single call that moves `New` to `Started`
    pub fn begin_start(&self) -> bool {
        self.0
            .compare_exchange(NEW, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns `true` for the single call that moves to `Stopped`
    pub fn begin_stop(&self) -> bool {
        self.0.swap(STOPPED, Ordering::AcqRel) != STOPPED
    }

    pub fn is_running(&self) -> bool {
        self.state() == ActorState::Started
    }
}
