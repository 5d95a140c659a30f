//! Demux: broadcast a copy to every peer and aggregate the outcomes
//!
//! The original completes `Done` when every copy is `Done`, `PartialSend`
//! when only some are, `Failed` when none are, and `TimedOut` when any peer
//! misses the deadline measured from entry.

use super::broadcast::{full_mask, Broadcast};
use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::{Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, lenient, Params};
use flow_types::{Message, MessageStatus};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DemuxParams {
    #[serde(default = "default_deadline_ms", deserialize_with = "lenient::value")]
    deadline_ms: u64,
}

fn default_deadline_ms() -> u64 {
    defaults::actors::DEMUX_DEADLINE_MS
}

pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let params: DemuxParams = params.parse(name)?;
    Ok(Arc::new(Demux::new(
        name,
        ctx,
        Duration::from_millis(params.deadline_ms),
    )))
}

pub struct Demux {
    name: String,
    peers: Broadcast,
    deadline: Duration,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Demux {
    pub fn new(name: &str, ctx: &Context, deadline: Duration) -> Self {
        let metrics = ctx.metrics().actor(name);
        Self {
            name: name.to_string(),
            peers: Broadcast::new(name, Arc::clone(&metrics)),
            deadline,
            state: Lifecycle::new(),
            metrics,
        }
    }
}

/// Demux aggregation rule
pub fn aggregate(outcomes: &[MessageStatus]) -> MessageStatus {
    if outcomes.is_empty() {
        return MessageStatus::Failed;
    }
    if outcomes.contains(&MessageStatus::TimedOut) {
        return MessageStatus::TimedOut;
    }
    let done = outcomes.iter().filter(|s| **s == MessageStatus::Done).count();
    match done {
        0 => MessageStatus::Failed,
        n if n == outcomes.len() => MessageStatus::Done,
        _ => MessageStatus::PartialSend,
    }
}

#[async_trait]
impl Actor for Demux {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.state.begin_start();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.state.begin_stop() {
            self.peers.close().await;
        }
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        self.peers.connect(nthreads, peer)
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();
        let mask = full_mask(self.peers.len());
        let outcomes = self.peers.dispatch(&msg, mask, self.deadline).await;
        let status = aggregate(&outcomes);
        self.metrics.record_status(status);
        msg.complete(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, Recorder};
    use crate::ActorError;
    use MessageStatus::*;

    async fn run(replies: Vec<Arc<Recorder>>) -> MessageStatus {
        let ctx = test_context(1);
        let demux = Demux::new("demux", &ctx, Duration::from_millis(50));
        for peer in &replies {
            demux.connect(1, peer.clone()).await.unwrap();
        }
        demux.start().await.unwrap();

        let msg = Message::new("frame");
        let completion = msg.completion();
        demux.receive(msg).await.unwrap();
        let status = completion.wait().await;
        demux.stop().await.unwrap();

        for peer in &replies {
            assert_eq!(peer.bodies(), vec![b"frame".to_vec()]);
        }
        status
    }

    #[test]
    fn test_aggregate_rule() {
        assert_eq!(aggregate(&[Done, Done, Done]), Done);
        assert_eq!(aggregate(&[Done, Done, Failed]), PartialSend);
        assert_eq!(aggregate(&[Failed, Failed, Failed]), Failed);
        assert_eq!(aggregate(&[Done, Done, TimedOut]), TimedOut);
        assert_eq!(aggregate(&[]), Failed);
    }

    #[tokio::test]
    async fn test_all_done() {
        let peers = vec![Recorder::done("a"), Recorder::done("b"), Recorder::done("c")];
        assert_eq!(run(peers).await, Done);
    }

    #[tokio::test]
    async fn test_partial() {
        let peers = vec![
            Recorder::done("a"),
            Recorder::done("b"),
            Recorder::with_status("c", Failed),
        ];
        assert_eq!(run(peers).await, PartialSend);
    }

    #[tokio::test]
    async fn test_all_failed() {
        let peers = vec![
            Recorder::with_status("a", Failed),
            Recorder::with_status("b", Failed),
            Recorder::with_status("c", Failed),
        ];
        assert_eq!(run(peers).await, Failed);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let peers = vec![Recorder::done("a"), Recorder::done("b"), Recorder::never("c")];
        assert_eq!(run(peers).await, TimedOut);
    }

    #[tokio::test]
    async fn test_peer_cap() {
        let ctx = test_context(1);
        let demux = Demux::new("demux", &ctx, Duration::from_millis(50));
        for i in 0..64 {
            demux.connect(1, Recorder::done(&format!("p{i}"))).await.unwrap();
        }
        let err = demux.connect(1, Recorder::done("extra")).await.unwrap_err();
        assert!(matches!(err, ActorError::PeerCap { cap: 64, .. }));
        demux.stop().await.unwrap();
    }

    #[test]
    fn test_default_deadline() {
        let ctx = test_context(1);
        assert!(build("d", &ctx, &Params::new()).is_ok());
        assert!(build("d", &ctx, &Params::new().with("deadline_ms", "oops")).is_err());
    }
}
