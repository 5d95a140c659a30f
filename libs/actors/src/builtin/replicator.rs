//! Replicator: broadcast to a mode-selected subset of peers
//!
//! Each message picks its peers through a bit mask derived from `mode`:
//! `all` selects every peer, `fanout` rotates a single bit across the peers
//! so N consecutive messages visit each of N peers once, and `rand` picks one
//! peer uniformly. Copies are awaited for 50 ms.

use super::broadcast::{full_mask, Broadcast};
use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, Params};
use flow_types::{Message, MessageStatus};
use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    All,
    Fanout,
    Rand,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Mode::All),
            "fanout" => Ok(Mode::Fanout),
            "rand" => Ok(Mode::Rand),
            "ncopy" => Err("replication mode 'ncopy' is reserved".to_string()),
            other => Err(format!("unknown replication mode '{other}'")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::All => "all",
            Mode::Fanout => "fanout",
            Mode::Rand => "rand",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct ReplicatorParams {
    #[serde(default)]
    mode: Option<String>,
}

pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let params: ReplicatorParams = params.parse(name)?;
    let mode = match params.mode {
        Some(mode) => mode
            .parse()
            .map_err(|reason: String| ActorError::construction(name, reason))?,
        None => Mode::All,
    };
    Ok(Arc::new(Replicator::new(name, ctx, mode)))
}

pub struct Replicator {
    name: String,
    mode: Mode,
    peers: Broadcast,
    mask: Mutex<u64>,
    deadline: Duration,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Replicator {
    pub fn new(name: &str, ctx: &Context, mode: Mode) -> Self {
        let metrics = ctx.metrics().actor(name);
        Self {
            name: name.to_string(),
            mode,
            peers: Broadcast::new(name, Arc::clone(&metrics)),
            mask: Mutex::new(1),
            deadline: Duration::from_millis(defaults::actors::DEMUX_DEADLINE_MS),
            state: Lifecycle::new(),
            metrics,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Peer selection for the next message
    fn next_mask(&self, width: usize) -> u64 {
        if width == 0 {
            return 0;
        }
        match self.mode {
            Mode::All => full_mask(width),
            Mode::Rand => 1u64 << rand::thread_rng().gen_range(0..width),
            Mode::Fanout => {
                let window = full_mask(width);
                let mut mask = self.mask.lock();
                if *mask & window == 0 {
                    *mask = 1;
                }
                let current = *mask;
                let next = current << 1;
                *mask = if next & window == 0 { 1 } else { next };
                current
            }
        }
    }
}

/// Replicator aggregation rule
pub fn aggregate(outcomes: &[MessageStatus]) -> MessageStatus {
    if outcomes.is_empty() {
        return MessageStatus::Failed;
    }
    if outcomes.iter().all(|s| *s == MessageStatus::Done) {
        return MessageStatus::Done;
    }
    if outcomes.iter().any(|s| s.is_delivered()) {
        return MessageStatus::PartialSend;
    }
    if outcomes.iter().all(|s| *s == MessageStatus::TimedOut) {
        return MessageStatus::TimedOut;
    }
    MessageStatus::Failed
}

#[async_trait]
impl Actor for Replicator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if self.state.begin_start() {
            debug!(actor = %self.name, mode = %self.mode, peers = self.peers.len(), "replicator started");
        }
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
        let mask = self.next_mask(self.peers.len());
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
    use MessageStatus::*;

    async fn replicator(mode: Mode, peers: &[Arc<Recorder>]) -> Replicator {
        let ctx = test_context(1);
        let rep = Replicator::new("rep", &ctx, mode);
        for peer in peers {
            rep.connect(1, peer.clone()).await.unwrap();
        }
        rep.start().await.unwrap();
        rep
    }

    async fn send(rep: &Replicator, body: &str) -> MessageStatus {
        let msg = Message::new(body);
        let completion = msg.completion();
        rep.receive(msg).await.unwrap();
        completion.wait().await
    }

    #[test]
    fn test_aggregate_rule() {
        assert_eq!(aggregate(&[Done, Done]), Done);
        assert_eq!(aggregate(&[Done, Failed]), PartialSend);
        assert_eq!(aggregate(&[PartialSend, Done]), PartialSend);
        assert_eq!(aggregate(&[TimedOut, TimedOut]), TimedOut);
        assert_eq!(aggregate(&[TimedOut, Failed]), Failed);
        assert_eq!(aggregate(&[Throttled]), Failed);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("fanout".parse::<Mode>(), Ok(Mode::Fanout));
        assert_eq!("ALL".parse::<Mode>(), Ok(Mode::All));
        assert!("ncopy".parse::<Mode>().unwrap_err().contains("reserved"));
        assert!("sideways".parse::<Mode>().is_err());

        let ctx = test_context(1);
        assert!(build("r", &ctx, &Params::new().with("mode", "ncopy")).is_err());
        assert!(build("r", &ctx, &Params::new()).is_ok());
    }

    #[tokio::test]
    async fn test_fanout_visits_each_peer_once() {
        let peers: Vec<_> = (0..4).map(|i| Recorder::done(&format!("p{i}"))).collect();
        let rep = replicator(Mode::Fanout, &peers).await;

        for i in 0..peers.len() {
            assert_eq!(send(&rep, &format!("m{i}")).await, Done);
        }
        rep.stop().await.unwrap();

        for (i, peer) in peers.iter().enumerate() {
            assert_eq!(peer.bodies(), vec![format!("m{i}").into_bytes()]);
        }
    }

    #[tokio::test]
    async fn test_rand_selects_exactly_one() {
        let peers: Vec<_> = (0..3).map(|i| Recorder::done(&format!("p{i}"))).collect();
        let rep = replicator(Mode::Rand, &peers).await;
        for i in 0..12 {
            assert_eq!(send(&rep, &format!("m{i}")).await, Done);
        }
        rep.stop().await.unwrap();

        let total: usize = peers.iter().map(|p| p.count()).sum();
        assert_eq!(total, 12);
    }

    #[tokio::test]
    async fn test_all_mode_partial_send() {
        let peers = vec![
            Recorder::done("a"),
            Recorder::done("b"),
            Recorder::with_status("c", Failed),
        ];
        let rep = replicator(Mode::All, &peers).await;
        for i in 0..10 {
            assert_eq!(send(&rep, &format!("f{i}")).await, PartialSend);
        }
        rep.stop().await.unwrap();

        for peer in &peers {
            assert_eq!(peer.count(), 10);
        }
    }

    #[tokio::test]
    async fn test_silent_peers_time_out() {
        let peers = vec![Recorder::never("a"), Recorder::never("b")];
        let rep = replicator(Mode::All, &peers).await;
        assert_eq!(send(&rep, "x").await, TimedOut);
        rep.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_peers_fails() {
        let rep = replicator(Mode::Fanout, &[]).await;
        assert_eq!(send(&rep, "x").await, Failed);
    }
}
