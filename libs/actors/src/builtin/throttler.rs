//! Throttler: GCRA rate limiting
//!
//! Each bucket stores a theoretical arrival time (TAT) in monotonic
//! nanoseconds. A message is admitted when `now >= tat - burst`, which
//! moves the TAT forward by `interval`. Buckets are keyed by the metadata
//! attribute named by `msgkey`, or share one global bucket.

use crate::actor::{Actor, Lifecycle};
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::{defaults, lenient, Params};
use flow_types::{Message, MessageStatus};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::trace;

const NANOS_PER_SEC: i64 = 1_000_000_000;

#[derive(Debug, Deserialize)]
struct ThrottlerParams {
    #[serde(deserialize_with = "lenient::value")]
    rps: u64,
    #[serde(default)]
    msgkey: Option<String>,
}

pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let params: ThrottlerParams = params.parse(name)?;
    let throttler = Throttler::new(name, ctx, params.rps, params.msgkey)?;
    Ok(Arc::new(throttler))
}

/// Nanoseconds on a process-wide monotonic clock
fn monotonic_nanos() -> i64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(Instant::now);
    // Offset so a fresh bucket (now - 1) never goes negative.
    anchor.elapsed().as_nanos() as i64 + NANOS_PER_SEC
}

/// Per-key GCRA state
pub struct Gcra {
    interval: i64,
    burst: i64,
    buckets: RwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl Gcra {
    pub fn new(rps: u64) -> Self {
        let interval = NANOS_PER_SEC / rps.clamp(1, NANOS_PER_SEC as u64) as i64;
        Self {
            interval,
            burst: NANOS_PER_SEC - interval,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn bucket(&self, key: &str, now: i64) -> Arc<AtomicI64> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }
        let mut buckets = self.buckets.write();
        Arc::clone(
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(now - 1))),
        )
    }

    /// Admission check at the current instant
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, monotonic_nanos())
    }

    fn admit_at(&self, key: &str, mut now: i64) -> bool {
        let bucket = self.bucket(key, now);

        for _ in 0..defaults::actors::THROTTLER_CAS_ATTEMPTS {
            let tat = bucket.load(Ordering::Acquire);
            if now < tat - self.burst {
                return false;
            }
            let new_tat = now.max(tat) + self.interval;
            if bucket
                .compare_exchange(tat, new_tat, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
            now = monotonic_nanos().max(now);
        }
        false
    }
}

pub struct Throttler {
    name: String,
    msgkey: Option<String>,
    gcra: Gcra,
    outlet: Outlet,
    state: Lifecycle,
    metrics: Arc<ActorMetrics>,
}

impl Throttler {
    pub fn new(name: &str, ctx: &Context, rps: u64, msgkey: Option<String>) -> Result<Self> {
        if rps == 0 {
            return Err(ActorError::construction(name, "rps must be at least 1"));
        }
        let metrics = ctx.metrics().actor(name);
        Ok(Self {
            name: name.to_string(),
            msgkey,
            gcra: Gcra::new(rps),
            outlet: Outlet::new(name, defaults::actors::OUTLET_CAPACITY, Arc::clone(&metrics)),
            state: Lifecycle::new(),
            metrics,
        })
    }

    fn bucket_key(&self, msg: &Message) -> String {
        self.msgkey
            .as_deref()
            .and_then(|key| msg.meta(key))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Actor for Throttler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.state.begin_start();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.state.begin_stop() {
            self.outlet.close().await;
        }
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        self.outlet.connect(nthreads, peer);
        Ok(())
    }

    async fn receive(&self, msg: Message) -> Result<()> {
        self.metrics.record_received();
        let key = self.bucket_key(&msg);

        if self.gcra.admit(&key) {
            self.outlet.send(msg).await
        } else {
            trace!(actor = %self.name, bucket = %key, "throttled");
            self.metrics.record_status(MessageStatus::Throttled);
            msg.complete(MessageStatus::Throttled);
            Ok(())
        }
    }
}
