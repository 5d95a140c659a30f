//! UDP receiver: one message per datagram, no reply

use super::Ingress;
use crate::actor::{Actor, Lifecycle};
use crate::{ActorError, Context, Result};
use async_trait::async_trait;
use flow_config::defaults;
use flow_network::framing::trim_line;
use flow_types::Message;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, trace};

pub struct UdpReceiver {
    name: String,
    addr: String,
    ingress: Arc<Ingress>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    local_addr: Mutex<Option<SocketAddr>>,
    state: Lifecycle,
}

impl UdpReceiver {
    pub fn new(name: &str, ctx: &Context, addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            addr: addr.into(),
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
}

#[async_trait]
impl Actor for UdpReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if !self.state.begin_start() {
            return Ok(());
        }
        let socket = UdpSocket::bind(&self.addr)
            .await
            .map_err(|e| ActorError::io(&self.name, e))?;
        let bound = socket.local_addr().map_err(|e| ActorError::io(&self.name, e))?;
        *self.local_addr.lock() = Some(bound);

        let owner = self.name.clone();
        let ingress = Arc::clone(&self.ingress);
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        self.tracker.spawn(async move {
            let mut buf = vec![0u8; defaults::receivers::UDP_MAX_DATAGRAM];
            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = socket.recv_from(&mut buf) => received,
                };
                match received {
                    Ok((len, from)) => {
                        let frame = trim_line(&buf[..len]);
                        if frame.is_empty() {
                            continue;
                        }
                        let msg = Message::new(frame);
                        let ingress = Arc::clone(&ingress);
                        let owner = owner.clone();
                        tracker.spawn(async move {
                            let status = ingress.submit(msg).await;
                            trace!(actor = %owner, from = %from, status = %status, "datagram handled");
                        });
                    }
                    Err(e) => error!(actor = %owner, error = %e, "datagram receive failed"),
                }
            }
        });

        info!(actor = %self.name, bind = %self.addr, local_addr = %bound, "receiver listening");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, Recorder};

    #[tokio::test]
    async fn test_datagrams_become_messages() {
        let ctx = test_context(1);
        let receiver = UdpReceiver::new("udp-in", &ctx, "127.0.0.1:0", Duration::from_millis(50));
        let sink = Recorder::done("sink");
        receiver.connect(1, sink.clone()).await.unwrap();
        receiver.start().await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"first\n", addr).await.unwrap();
        client.send_to(b"second", addr).await.unwrap();
        client.send_to(b"\r\n", addr).await.unwrap();

        for _ in 0..100 {
            if sink.count() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        receiver.stop().await.unwrap();

        let mut bodies = sink.bodies();
        bodies.sort();
        assert_eq!(bodies, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
