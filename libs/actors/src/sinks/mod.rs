//! Egress actors
//!
//! Sinks are pipeline leaves: they complete every message they receive and
//! reject `connect`.

use crate::actor::Actor;
use crate::{Context, Result};
use flow_config::{lenient, Params};
use flow_network::{head_for, Endpoint, FileTarget, ReconnectPolicy};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub mod dumper;
pub mod null;
pub mod sink;

pub use dumper::Dumper;
pub use null::NullSink;
pub use sink::SinkActor;

#[derive(Debug, Deserialize)]
struct SinkParams {
    bind: String,
    #[serde(default, deserialize_with = "lenient::option")]
    reconnect_attempts: Option<u32>,
    #[serde(default, deserialize_with = "lenient::option")]
    reconnect_delay_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient::option")]
    connect_timeout_ms: Option<u64>,
}

impl SinkParams {
    fn policy(&self) -> ReconnectPolicy {
        let mut policy = ReconnectPolicy::default();
        if let Some(attempts) = self.reconnect_attempts {
            policy.max_attempts = attempts.max(1);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            policy.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            policy.connect_timeout = Duration::from_millis(ms);
        }
        policy
    }
}

/// `core.sink`: head chosen from `bind` (`tcp://`, `udp://`, `unix://`,
/// `file://`, a bare path, `STDOUT` or `STDERR`)
pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let params: SinkParams = params.parse(name)?;
    let endpoint = Endpoint::parse(&params.bind)?;
    let policy = params.policy();
    let head = head_for(&endpoint, policy.connect_timeout)?;
    Ok(Arc::new(SinkActor::new(name, ctx, head, policy)))
}

/// `core.sink.null`
pub fn build_null(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(NullSink::new(name, ctx)))
}

#[derive(Debug, Deserialize)]
struct DumperParams {
    #[serde(default)]
    out: Option<String>,
}

/// `core.sink.dumper`
pub fn build_dumper(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let params: DumperParams = params.parse(name)?;
    let target = match params.out.as_deref() {
        Some(out) => FileTarget::parse(out)?,
        None => FileTarget::Stdout,
    };
    Ok(Arc::new(Dumper::new(name, ctx, target)))
}
