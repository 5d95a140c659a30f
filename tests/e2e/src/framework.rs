//! Pipeline harness and socket clients

use crate::fixtures::{Collector, FlakySink, SilentSink};
use anyhow::{Context as _, Result};
use dashmap::DashMap;
use flow_actors::{builder, Actor, Context, Factories, NativeBuiltin, Pipeline};
use flow_config::FlowConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// Reply wait used by [`LineClient::send`]
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// A running pipeline plus handles on its fixture actors
pub struct Harness {
    ctx: Context,
    pipeline: Pipeline,
    collectors: Arc<DashMap<String, Arc<Collector>>>,
    flaky: Arc<DashMap<String, Arc<FlakySink>>>,
    silent: Arc<DashMap<String, Arc<SilentSink>>>,
}

impl Harness {
    /// Build and start the pipeline described by `toml`
    pub async fn start(toml: &str) -> Result<Self> {
        let config = FlowConfig::from_toml_str(toml).context("invalid scenario config")?;
        let ctx = Context::new(config);

        let collectors: Arc<DashMap<String, Arc<Collector>>> = Arc::new(DashMap::new());
        let flaky: Arc<DashMap<String, Arc<FlakySink>>> = Arc::new(DashMap::new());
        let silent: Arc<DashMap<String, Arc<SilentSink>>> = Arc::new(DashMap::new());

        let seen = collectors.clone();
        let collector = builder(move |name, ctx, params| {
            let actor = Collector::build(name, ctx, params)?;
            seen.insert(name.to_string(), actor.clone());
            Ok(actor as Arc<dyn Actor>)
        });

        let seen = flaky.clone();
        let flaky_sink = builder(move |name, ctx, params| {
            let actor = FlakySink::build(name, ctx, params)?;
            seen.insert(name.to_string(), actor.clone());
            Ok(actor as Arc<dyn Actor>)
        });

        let seen = silent.clone();
        let silent_sink = builder(move |name, ctx, params| {
            let actor = SilentSink::build(name, ctx, params)?;
            seen.insert(name.to_string(), actor.clone());
            Ok(actor as Arc<dyn Actor>)
        });

        let plugins = NativeBuiltin::new()
            .with("collector", collector)
            .with("flaky", flaky_sink)
            .with("silent", silent_sink);

        let pipeline = Pipeline::new(&ctx, Factories::new(plugins))
            .await
            .context("pipeline assembly failed")?;
        pipeline.start().await.context("pipeline start failed")?;
        debug!(actors = pipeline.len(), "scenario pipeline running");

        Ok(Self {
            ctx,
            pipeline,
            collectors,
            flaky,
            silent,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Collector built for actor `name`
    pub fn collector(&self, name: &str) -> Option<Arc<Collector>> {
        self.collectors.get(name).map(|entry| entry.value().clone())
    }

    /// Flaky sink built for actor `name`
    pub fn flaky(&self, name: &str) -> Option<Arc<FlakySink>> {
        self.flaky.get(name).map(|entry| entry.value().clone())
    }

    /// Silent sink built for actor `name`
    pub fn silent(&self, name: &str) -> Option<Arc<SilentSink>> {
        self.silent.get(name).map(|entry| entry.value().clone())
    }

    pub async fn stop(self) -> Result<()> {
        self.pipeline.stop().await?;
        self.ctx.stop();
        Ok(())
    }
}

/// A loopback port that was free a moment ago
pub fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Line-framed client for the stream receivers
pub struct LineClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect to {addr}"))?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
        })
    }

    /// Send one frame and return the trimmed reply word
    pub async fn send(&mut self, frame: &str) -> Result<String> {
        self.push(frame).await?;
        let mut line = String::new();
        let read = tokio::time::timeout(REPLY_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .context("no reply in time")??;
        anyhow::ensure!(read > 0, "connection closed before reply");
        Ok(line.trim_end().to_string())
    }

    /// Send one frame without waiting for a reply
    pub async fn push(&mut self, frame: &str) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
