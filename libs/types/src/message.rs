//! Message and completion signal
//!
//! A [`Message`] is an immutable body, a mutable metadata map and a one-shot
//! completion signal. The message itself is owned by whichever actor currently
//! holds it; passing it through a channel moves it. Anyone who needs the
//! result later (an ingress connection, a demultiplexer waiting on copies)
//! keeps a [`Completion`] handle obtained before handing the message off.
//!
//! Completion is first-write-wins: the first terminal status sticks and every
//! waiter, present or future, observes it.

use crate::MessageStatus;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::trace;

/// Metadata attributes attached to a message
pub type Metadata = HashMap<String, String>;

/// Shared one-shot completion signal
#[derive(Clone)]
pub struct Completion {
    state: Arc<watch::Sender<MessageStatus>>,
}

impl Completion {
    fn new() -> Self {
        let (state, _) = watch::channel(MessageStatus::New);
        Self {
            state: Arc::new(state),
        }
    }

    /// Signal completion. Returns `false` if the message was already complete
    /// or `status` is not terminal.
    pub fn complete(&self, status: MessageStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                false
            } else {
                *current = status;
                true
            }
        })
    }

    /// Current status, `New` while incomplete
    pub fn status(&self) -> MessageStatus {
        *self.state.borrow()
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_terminal()
    }

    /// Wait until the message is complete
    pub async fn wait(&self) -> MessageStatus {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let result = match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        result
    }

    /// Wait for completion, giving up after `deadline`
    pub async fn wait_timeout(&self, deadline: Duration) -> Option<MessageStatus> {
        tokio::time::timeout(deadline, self.wait()).await.ok()
    }

    /// Receive handle that yields the status once, then closes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wait_chan(&self) -> oneshot::Receiver<MessageStatus> {
        let (tx, rx) = oneshot::channel();
        let completion = self.clone();
        tokio::spawn(async move {
            let status = completion.wait().await;
            let _ = tx.send(status);
        });
        rx
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("status", &self.status())
            .finish()
    }
}

/// A unit of data flowing through the pipeline
pub struct Message {
    body: Bytes,
    meta: Mutex<Metadata>,
    completion: Completion,
}

impl Message {
    /// Create a message, copying `body` so the caller's buffer is not aliased
    pub fn new(body: impl AsRef<[u8]>) -> Self {
        Self::with_meta(body, Metadata::new())
    }

    /// Create a message with initial metadata
    pub fn with_meta(body: impl AsRef<[u8]>, meta: Metadata) -> Self {
        Self {
            body: Bytes::copy_from_slice(body.as_ref()),
            meta: Mutex::new(meta),
            completion: Completion::new(),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Cheap shared handle to the body bytes
    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Replace the body; used by transforming actors before forwarding
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn meta(&self, key: &str) -> Option<String> {
        self.meta.lock().get(key).cloned()
    }

    pub fn set_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.lock().insert(key.into(), value.into());
    }

    pub fn meta_keys(&self) -> Vec<String> {
        self.meta.lock().keys().cloned().collect()
    }

    /// Point-in-time copy of all metadata
    pub fn meta_snapshot(&self) -> Metadata {
        self.meta.lock().clone()
    }

    /// Signal completion, see [`Completion::complete`]
    pub fn complete(&self, status: MessageStatus) -> bool {
        self.completion.complete(status)
    }

    pub fn status(&self) -> MessageStatus {
        self.completion.status()
    }

    /// Block until the message is complete
    pub async fn wait(&self) -> MessageStatus {
        self.completion.wait().await
    }

    /// Receive handle yielding the terminal status exactly once
    pub fn wait_chan(&self) -> oneshot::Receiver<MessageStatus> {
        self.completion.wait_chan()
    }

    /// Completion handle that outlives hand-off of the message
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Deep copy of the body and metadata with a fresh, unlinked completion
    pub fn copy(&self) -> Message {
        Message {
            body: Bytes::copy_from_slice(&self.body),
            meta: Mutex::new(self.meta_snapshot()),
            completion: Completion::new(),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("body_len", &self.body.len())
            .field("meta", &*self.meta.lock())
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        // A message nobody completed was lost somewhere downstream.
        if self.completion.complete(MessageStatus::Failed) {
            trace!(body_len = self.body.len(), "message dropped before completion");
        }
    }
}
