//! # Flow Configuration
//!
//! Configuration consumed by the Flow runtime:
//!
//! - **`system`**: `maxprocs`, the worker count per pipeline edge
//! - **`plugin`**: `path`, where `plugin.*` modules are loaded from
//! - **`log`**: level, output target and format for the logger
//! - **`actors`**: `name → { module, builder, params }`
//! - **`pipeline`**: `name → { connect = [peers] }`
//!
//! ## Usage
//!
//! ```rust
//! use flow_config::FlowConfig;
//!
//! let config = FlowConfig::from_toml_str(r#"
//! [actors.rcv]
//! module = "core.receiver"
//! params = { bind = "udp://127.0.0.1:5140" }
//!
//! [actors.out]
//! module = "core.sink.null"
//!
//! [pipeline.rcv]
//! connect = ["out"]
//! "#).unwrap();
//!
//! assert_eq!(config.pipeline["rcv"].connect, vec!["out"]);
//! ```

pub mod defaults;
pub mod flow_config;
pub mod params;

pub use flow_config::{ActorConfig, FlowConfig, LogConfig, LogFormat, PipelineEntry, PluginConfig, SystemConfig};
pub use params::{lenient, Params, ParamsError};
