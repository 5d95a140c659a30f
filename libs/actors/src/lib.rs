//! # Flow Actors
//!
//! The actor runtime of the Flow relay daemon: the [`Actor`] contract, the
//! process [`Context`], outbound [`Outlet`](outlet::Outlet) worker pools, the
//! [`Pipeline`] assembled from configuration, and the built-in actors.
//!
//! ## Architecture
//!
//! ```text
//!  receivers            passthrough                 sinks
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │ tcp/unix │──▶│ mux, fanout, demux,      │──▶│ tcp/udp/ │
//! │ udp      │   │ replicator, router,      │   │ unix/file│
//! │ http     │   │ throttler, buffer,       │   │ null     │
//! └──────────┘   │ compressor, meta_parser, │   │ dumper   │
//!                │ base64                   │   └──────────┘
//!                └──────────────────────────┘
//! ```
//!
//! Every edge of the pipeline is serviced by `system.maxprocs` worker tasks.
//! Messages carry their own completion signal; receivers wait on it and
//! answer the client with the terminal status.
//!
//! ## Example
//!
//! ```no_run
//! use flow_actors::{Context, Factories, Pipeline};
//! use flow_config::FlowConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let ctx = Context::new(FlowConfig::load(None)?);
//! ctx.start()?;
//! let pipeline = Pipeline::new(&ctx, Factories::from_context(&ctx)).await?;
//! pipeline.start().await?;
//! tokio::signal::ctrl_c().await?;
//! pipeline.stop().await?;
//! ctx.stop();
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod builtin;
pub mod context;
pub mod error;
pub mod factory;
pub mod logging;
pub mod metrics;
pub mod outlet;
pub mod pipeline;
pub mod plugin;
pub mod receivers;
pub mod sinks;
pub mod topology;

#[cfg(test)]
mod testing;

pub use actor::{Actor, ActorState, Lifecycle};
pub use context::Context;
pub use error::{ActorError, Result};
pub use factory::{builder, Builder, Factories};
pub use metrics::{ActorMetricsSnapshot, MetricsRegistry};
pub use pipeline::Pipeline;
pub use plugin::{DynamicLibrary, NativeBuiltin, PluginLoader};
pub use topology::Topology;

pub use flow_config::Params;
pub use flow_types::{Message, MessageStatus};
