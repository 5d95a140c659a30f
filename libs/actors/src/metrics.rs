//! Per-actor counters
//!
//! The registry lives in the [`Context`](crate::Context); nothing is global.
//! Counters are lock-free atomics and snapshots are point-in-time copies.

use dashmap::DashMap;
use flow_types::MessageStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one actor
#[derive(Debug, Default)]
pub struct ActorMetrics {
    received: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    statuses: [AtomicU64; MessageStatus::TERMINAL.len()],
}

impl ActorMetrics {
    /// A message entered the actor
    #[inline]
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was handed to a peer
    #[inline]
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A hand-off or write failed
    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A terminal status was observed
    #[inline]
    pub fn record_status(&self, status: MessageStatus) {
        if let Some(idx) = MessageStatus::TERMINAL.iter().position(|s| *s == status) {
            self.statuses[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ActorMetricsSnapshot {
        let statuses = MessageStatus::TERMINAL
            .iter()
            .zip(self.statuses.iter())
            .filter_map(|(status, count)| {
                let count = count.load(Ordering::Relaxed);
                (count > 0).then(|| (status.as_str().to_string(), count))
            })
            .collect();

        ActorMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            statuses,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActorMetricsSnapshot {
    pub received: u64,
    pub sent: u64,
    pub failed: u64,
    /// Observed terminal statuses by label, zero counts omitted
    pub statuses: BTreeMap<String, u64>,
}

impl ActorMetricsSnapshot {
    pub fn status(&self, status: MessageStatus) -> u64 {
        self.statuses.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// Registry of actor counters keyed by actor name
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    actors: Arc<DashMap<String, Arc<ActorMetrics>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for `name`, created on first use
    pub fn actor(&self, name: &str) -> Arc<ActorMetrics> {
        if let Some(existing) = self.actors.get(name) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.actors.entry(name.to_string()).or_default().value())
    }

    pub fn get(&self, name: &str) -> Option<ActorMetricsSnapshot> {
        self.actors.get(name).map(|m| m.snapshot())
    }

    pub fn snapshot(&self) -> BTreeMap<String, ActorMetricsSnapshot> {
        self.actors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}
