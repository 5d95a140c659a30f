//! HTTP receiver
//!
//! `POST` or `PUT` to the configured path (default `/v1alpha1`). The body is
//! the message, query parameters become metadata, and the terminal status is
//! mapped onto a response code with the reply word as the body.

use super::{reply_word, Ingress};
use crate::actor::{Actor, Lifecycle};
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::defaults;
use flow_types::{Message, MessageStatus, Metadata};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Response code for a terminal status
pub fn http_status(status: MessageStatus) -> StatusCode {
    match status {
        MessageStatus::Done => StatusCode::OK,
        MessageStatus::PartialSend => StatusCode::CONFLICT,
        MessageStatus::Invalid => StatusCode::BAD_REQUEST,
        MessageStatus::Failed | MessageStatus::New => StatusCode::INTERNAL_SERVER_ERROR,
        MessageStatus::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        MessageStatus::Unroutable => StatusCode::NOT_ACCEPTABLE,
        MessageStatus::Throttled => StatusCode::TOO_MANY_REQUESTS,
    }
}

pub struct HttpReceiver {
    name: String,
    addr: String,
    path: Arc<str>,
    ingress: Arc<Ingress>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    local_addr: Mutex<Option<SocketAddr>>,
    state: Lifecycle,
}

impl HttpReceiver {
    pub fn new(
        name: &str,
        ctx: &Context,
        addr: impl Into<String>,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            addr: addr.into(),
            path: Arc::from(path.into()),
            ingress: Arc::new(Ingress::new(name, ctx, timeout)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            local_addr: Mutex::new(None),
            state: Lifecycle::new(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        if let Ok(addr) = self.addr.parse() {
            return Ok(addr);
        }
        tokio::net::lookup_host(&self.addr)
            .await
            .map_err(|e| ActorError::io(&self.name, e))?
            .next()
            .ok_or_else(|| {
                ActorError::construction(&self.name, format!("cannot resolve '{}'", self.addr))
            })
    }
}

#[async_trait]
impl Actor for HttpReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if !self.state.begin_start() {
            return Ok(());
        }
        let addr = self.resolve().await?;

        let ingress = Arc::clone(&self.ingress);
        let path = Arc::clone(&self.path);
        let make_svc = make_service_fn(move |_conn| {
            let ingress = Arc::clone(&ingress);
            let path = Arc::clone(&path);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(req, Arc::clone(&ingress), Arc::clone(&path))
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .map_err(|e| ActorError::construction(&self.name, format!("bind {addr}: {e}")))?
            .serve(make_svc);
        let bound = server.local_addr();
        *self.local_addr.lock() = Some(bound);

        let cancel = self.cancel.clone();
        let owner = self.name.clone();
        self.tracker.spawn(async move {
            let graceful = server.with_graceful_shutdown(async move { cancel.cancelled().await });
            if let Err(e) = graceful.await {
                error!(actor = %owner, error = %e, "http server failed");
            }
        });

        info!(actor = %self.name, local_addr = %bound, path = %self.path, "receiver listening");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.state.begin_stop() {
            return Ok(());
        }
        self.cancel.cancel();
        self.tracker.close();

        let drain = Duration::from_secs(defaults::receivers::HTTP_DRAIN_SECS);
        if tokio::time::timeout(drain, self.tracker.wait()).await.is_err() {
            warn!(actor = %self.name, drain_secs = drain.as_secs(), "http drain deadline exceeded");
        }
        self.ingress.close().await;
        info!(actor = %self.name, "receiver stopped");
        Ok(())
    }

    async fn connect(&self, nthreads: usize, peer: Arc<dyn Actor>) -> Result<()> {
        self.ingress.connect(nthreads, peer);
        Ok(())
    }

    async fn receive(&self, _msg: Message) -> Result<()> {
        Err(ActorError::unsupported(&self.name, "receive"))
    }
}

fn reply(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<Body>,
    ingress: Arc<Ingress>,
    path: Arc<str>,
) -> std::result::Result<Response<Body>, Infallible> {
    debug!(method = %req.method(), path = %req.uri().path(), "http request");

    if req.uri().path() != &*path {
        return Ok(reply(StatusCode::NOT_FOUND, "Not found"));
    }
    if req.method() != Method::POST && req.method() != Method::PUT {
        return Ok(reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    let meta: Metadata = req
        .uri()
        .query()
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) if !body.is_empty() => body,
        Ok(_) => return Ok(reply(StatusCode::BAD_REQUEST, reply_word(MessageStatus::Invalid))),
        Err(e) => {
            debug!(error = %e, "http body read failed");
            return Ok(reply(StatusCode::BAD_REQUEST, reply_word(MessageStatus::Invalid)));
        }
    };

    let status = ingress.submit(Message::with_meta(&body, meta)).await;
    Ok(reply(http_status(status), reply_word(status)))
}
