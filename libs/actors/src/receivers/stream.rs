//! TCP and Unix line receivers
//!
//! One task per connection reads newline-terminated frames, submits each
//! as a message and writes the reply word plus CRLF back, unless the
//! receiver is `silent`. Frames on one connection are handled in order.

use super::{reply_word, Ingress};
use crate::actor::{Actor, Lifecycle};
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_network::framing::{encode_line, trim_line};
use flow_types::Message;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Tcp(String),
    Unix(PathBuf),
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Tcp(addr) => write!(f, "tcp://{addr}"),
            StreamKind::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

pub struct StreamReceiver {
    name: String,
    kind: StreamKind,
    silent: bool,
    ingress: Arc<Ingress>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    local_addr: Mutex<Option<String>>,
    state: Lifecycle,
}

impl StreamReceiver {
    pub fn new(name: &str, ctx: &Context, kind: StreamKind, silent: bool, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            kind,
            silent,
            ingress: Arc::new(Ingress::new(name, ctx, timeout)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            local_addr: Mutex::new(None),
            state: Lifecycle::new(),
        }
    }

    /// Address actually bound, available once started
    pub fn local_addr(&self) -> Option<String> {
        self.local_addr.lock().clone()
    }

    fn bind_tcp(&self, listener: TcpListener) -> Result<()> {
        let bound = listener
            .local_addr()
            .map_err(|e| ActorError::io(&self.name, e))?;
        *self.local_addr.lock() = Some(bound.to_string());

        let ctx = self.connection_context();
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(actor = %ctx.owner, peer = %peer, "connection accepted");
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!(actor = %ctx.owner, error = %e, "failed to set TCP_NODELAY");
                            }
                            tracker.spawn(serve_connection(stream, ctx.clone()));
                        }
                        Err(e) => error!(actor = %ctx.owner, error = %e, "accept failed"),
                    },
                }
            }
        });
        Ok(())
    }

    fn bind_unix(&self, listener: UnixListener, path: &Path) {
        *self.local_addr.lock() = Some(path.display().to_string());

        let ctx = self.connection_context();
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            debug!(actor = %ctx.owner, "connection accepted");
                            tracker.spawn(serve_connection(stream, ctx.clone()));
                        }
                        Err(e) => error!(actor = %ctx.owner, error = %e, "accept failed"),
                    },
                }
            }
        });
    }

    fn connection_context(&self) -> ConnectionContext {
        ConnectionContext {
            owner: self.name.clone(),
            silent: self.silent,
            ingress: Arc::clone(&self.ingress),
            cancel: self.cancel.clone(),
        }
    }
}

#[async_trait]
impl Actor for StreamReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if !self.state.begin_start() {
            return Ok(());
        }

        match &self.kind {
            StreamKind::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| ActorError::io(&self.name, e))?;
                self.bind_tcp(listener)?;
            }
            StreamKind::Unix(path) => {
                if path.exists() {
                    std::fs::remove_file(path).map_err(|e| ActorError::io(&self.name, e))?;
                }
                let listener = UnixListener::bind(path).map_err(|e| ActorError::io(&self.name, e))?;
                self.bind_unix(listener, path);
            }
        }

        info!(
            actor = %self.name,
            bind = %self.kind,
            local_addr = ?self.local_addr(),
            silent = self.silent,
            timeout_ms = self.ingress.timeout().as_millis() as u64,
            "receiver listening"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.state.begin_stop() {
            return Ok(());
        }
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.ingress.close().await;

        if let StreamKind::Unix(path) = &self.kind {
            if let Err(e) = std::fs::remove_file(path) {
                debug!(actor = %self.name, error = %e, "socket file already gone");
            }
        }
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

#[derive(Clone)]
struct ConnectionContext {
    owner: String,
    silent: bool,
    ingress: Arc<Ingress>,
    cancel: CancellationToken,
}

async fn serve_connection<S>(stream: S, ctx: ConnectionContext)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut frames = 0u64;

    loop {
        line.clear();
        let read = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut line) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(actor = %ctx.owner, error = %e, "connection read failed");
                break;
            }
        }

        let frame = trim_line(&line);
        if frame.is_empty() {
            continue;
        }
        frames += 1;
        let status = ctx.ingress.submit(Message::new(frame)).await;

        if !ctx.silent {
            let reply = encode_line(reply_word(status).as_bytes());
            if let Err(e) = writer.write_all(&reply).await {
                debug!(actor = %ctx.owner, error = %e, "connection write failed");
                break;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(actor = %ctx.owner, error = %e, "connection shutdown failed");
    }
    debug!(actor = %ctx.owner, frames, "connection closed");
}
