//! Ingress actors
//!
//! Receivers bind a listener, turn every incoming frame into a [`Message`],
//! hand it to their single outlet and wait a bounded time for its terminal
//! status, which is translated into a wire reply. They are pipeline sources:
//! `receive` is rejected.

use crate::actor::Actor;
use crate::metrics::ActorMetrics;
use crate::outlet::Outlet;
use crate::{ActorError, Context, Result};
use flow_config::{defaults, lenient, Params};
use flow_network::Endpoint;
use flow_types::{Message, MessageStatus};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub mod http;
pub mod stream;
pub mod udp;

pub use http::HttpReceiver;
pub use stream::{StreamKind, StreamReceiver};
pub use udp::UdpReceiver;

/// Reply word for a terminal status, sent CRLF-terminated on stream
/// connections and as the HTTP response body
pub fn reply_word(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Done => "OK",
        MessageStatus::PartialSend => "PARTSENT",
        MessageStatus::Invalid => "INVALID",
        MessageStatus::Failed | MessageStatus::New => "FAILED",
        MessageStatus::TimedOut => "TIMEOUT",
        MessageStatus::Unroutable => "UNROUTABLE",
        MessageStatus::Throttled => "THROTTLED",
    }
}

#[derive(Debug, Deserialize)]
struct ReceiverParams {
    bind: String,
    #[serde(default, deserialize_with = "lenient::option")]
    silent: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option")]
    timeout_ms: Option<u64>,
}

impl ReceiverParams {
    fn timeout(&self, default_ms: u64) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(default_ms))
    }
}

/// Outlet plus the per-message wait shared by every receiver
pub(crate) struct Ingress {
    outlet: Outlet,
    timeout: Duration,
    metrics: Arc<ActorMetrics>,
}

impl Ingress {
    pub(crate) fn new(owner: &str, ctx: &Context, timeout: Duration) -> Self {
        let metrics = ctx.metrics().actor(owner);
        Self {
            outlet: Outlet::new(owner, defaults::actors::OUTLET_CAPACITY, Arc::clone(&metrics)),
            timeout,
            metrics,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) {
        self.outlet.connect(nthreads, peer);
    }

    /// Enqueue `msg` and wait for its status; `TimedOut` once the timeout
    /// covering both the enqueue and the wait runs out
    pub(crate) async fn submit(&self, msg: Message) -> MessageStatus {
        self.metrics.record_received();
        let completion = msg.completion();
        let delivery = async {
            self.outlet.send(msg).await?;
            Ok::<_, ActorError>(completion.wait().await)
        };

        let status = match tokio::time::timeout(self.timeout, delivery).await {
            Ok(Ok(status)) => status,
            Ok(Err(_)) => MessageStatus::Failed,
            Err(_) => MessageStatus::TimedOut,
        };
        self.metrics.record_status(status);
        status
    }

    pub(crate) async fn close(&self) {
        self.outlet.close().await;
    }
}

/// `core.receiver`: pick the transport from the scheme of `bind`
pub fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    let parsed: ReceiverParams = params.parse(name)?;
    if !parsed.bind.contains("://") {
        return Err(ActorError::construction(
            name,
            format!("receiver bind '{}' needs a scheme", parsed.bind),
        ));
    }
    let endpoint = Endpoint::parse(&parsed.bind)?;
    build_endpoint(name, ctx, endpoint, &parsed)
}

pub fn build_tcp(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    build_with_scheme(name, ctx, params, "tcp")
}

pub fn build_udp(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    build_with_scheme(name, ctx, params, "udp")
}

pub fn build_unix(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    build_with_scheme(name, ctx, params, "unix")
}

pub fn build_http(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> {
    build_with_scheme(name, ctx, params, "http")
}

/// Concrete receivers take `bind` with or without their own scheme
fn build_with_scheme(
    name: &str,
    ctx: &Context,
    params: &Params,
    scheme: &str,
) -> Result<Arc<dyn Actor>> {
    let parsed: ReceiverParams = params.parse(name)?;
    let bind = if parsed.bind.contains("://") {
        parsed.bind.clone()
    } else {
        format!("{scheme}://{}", parsed.bind)
    };
    let endpoint = Endpoint::parse(&bind)?;
    if endpoint.scheme() != scheme {
        return Err(ActorError::construction(
            name,
            format!("expected a {scheme}:// bind, got '{}'", parsed.bind),
        ));
    }
    build_endpoint(name, ctx, endpoint, &parsed)
}

fn build_endpoint(
    name: &str,
    ctx: &Context,
    endpoint: Endpoint,
    params: &ReceiverParams,
) -> Result<Arc<dyn Actor>> {
    let silent = params.silent.unwrap_or(false);
    let stream_timeout = params.timeout(defaults::receivers::STREAM_TIMEOUT_MS);

    match endpoint {
        Endpoint::Tcp(addr) => Ok(Arc::new(StreamReceiver::new(
            name,
            ctx,
            StreamKind::Tcp(addr),
            silent,
            stream_timeout,
        ))),
        Endpoint::Unix(path) => Ok(Arc::new(StreamReceiver::new(
            name,
            ctx,
            StreamKind::Unix(path),
            silent,
            stream_timeout,
        ))),
        Endpoint::Udp(addr) => Ok(Arc::new(UdpReceiver::new(
            name,
            ctx,
            addr,
            params.timeout(defaults::receivers::UDP_TIMEOUT_MS),
        ))),
        Endpoint::Http { addr, path } => Ok(Arc::new(HttpReceiver::new(
            name,
            ctx,
            addr,
            path,
            params.timeout(defaults::receivers::HTTP_TIMEOUT_MS),
        ))),
        Endpoint::File(target) => Err(ActorError::construction(
            name,
            format!("cannot receive from file target '{target}'"),
        )),
    }
}
