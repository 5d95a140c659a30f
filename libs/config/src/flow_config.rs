//! Daemon configuration
//!
//! Layered loading: built-in defaults, then an optional TOML/YAML/JSON file,
//! then `FLOW__`-prefixed environment variables (`FLOW__SYSTEM__MAXPROCS=8`).

use crate::defaults;
use crate::params::Params;
use anyhow::{bail, Context, Result};
use config_crate::{Config, ConfigBuilder, Environment, File, FileFormat};
use config_crate::builder::DefaultState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FLOW";

/// Separator between the prefix and nested keys in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Complete daemon configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FlowConfig {
    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub plugin: PluginConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Actor definitions by name
    #[serde(default)]
    pub actors: BTreeMap<String, ActorConfig>,

    /// Outgoing edges by source actor name
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Worker tasks spawned per pipeline edge
    #[serde(default = "defaults::system::maxprocs")]
    pub maxprocs: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            maxprocs: defaults::system::maxprocs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PluginConfig {
    /// Directory searched for `plugin.*` shared objects
    #[serde(default = "default_plugin_path")]
    pub path: PathBuf,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            path: default_plugin_path(),
        }
    }
}

fn default_plugin_path() -> PathBuf {
    PathBuf::from(defaults::plugin::PATH)
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `flow_actors=debug,info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `stderr`, `stdout` or a file path
    #[serde(default = "default_log_output")]
    pub output: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    defaults::log::LEVEL.to_string()
}

fn default_log_output() -> String {
    defaults::log::OUTPUT.to_string()
}

/// One actor definition
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ActorConfig {
    /// `core.<kind>` or `plugin.<library>`
    pub module: String,

    /// Plugin symbol; ignored for core modules
    #[serde(default)]
    pub builder: Option<String>,

    #[serde(default)]
    pub params: Params,
}

/// Outgoing edges of one actor
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PipelineEntry {
    #[serde(default)]
    pub connect: Vec<String>,
}

impl FlowConfig {
    /// Load from an optional file with environment overrides, then expand
    /// and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder_with_defaults()?;

        if let Some(path) = path {
            if !path.exists() {
                bail!("configuration file not found: {}", path.display());
            }
            info!(path = %path.display(), "loading configuration");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Parse a TOML document on top of the defaults; no environment layer
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let builder = Self::builder_with_defaults()?
            .add_source(File::from_str(content, FileFormat::Toml));
        Self::finish(builder)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>> {
        Config::builder()
            .set_default("system.maxprocs", defaults::system::maxprocs() as i64)?
            .set_default("plugin.path", defaults::plugin::PATH)?
            .set_default("log.level", defaults::log::LEVEL)?
            .set_default("log.output", defaults::log::OUTPUT)?
            .set_default("log.format", defaults::log::FORMAT)
            .context("Failed to set configuration defaults")
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder.build().context("Failed to build configuration")?;
        let mut flow: FlowConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        flow.expand_env_vars()?;
        flow.validate()?;
        debug!(
            actors = flow.actors.len(),
            edges = flow.pipeline.values().map(|e| e.connect.len()).sum::<usize>(),
            "configuration loaded"
        );
        Ok(flow)
    }

    /// Expand `$VARS` and `~` in filesystem paths
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let raw = self.plugin.path.to_string_lossy().into_owned();
        let expanded = shellexpand::full(&raw).context("Failed to expand plugin path")?;
        self.plugin.path = PathBuf::from(expanded.as_ref());
        Ok(())
    }

    /// Structural checks the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.system.maxprocs == 0 {
            bail!("system.maxprocs must be at least 1");
        }

        for (name, actor) in &self.actors {
            if actor.module.trim().is_empty() {
                bail!("actor '{name}' has no module");
            }
        }

        for (source, entry) in &self.pipeline {
            if !self.actors.contains_key(source) {
                bail!("pipeline source '{source}' is not a defined actor");
            }
            for peer in &entry.connect {
                if !self.actors.contains_key(peer) {
                    bail!("pipeline '{source}' connects to undefined actor '{peer}'");
                }
            }
        }

        Ok(())
    }

    pub fn actor(&self, name: &str) -> Option<&ActorConfig> {
        self.actors.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[system]
maxprocs = 4

[plugin]
path = "/opt/flow/plugins"

[actors.tcp_rcv]
module = "core.receiver"
params = { bind = "tcp://127.0.0.1:3101", silent = "true" }

[actors.limiter]
module = "core.throttler"
params = { rps = 10 }

[actors.out]
module = "core.sink.null"

[pipeline.tcp_rcv]
connect = ["limiter"]

[pipeline.limiter]
connect = ["out"]
"#;

    #[test]
    fn test_load_from_toml_str() {
        let config = FlowConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.system.maxprocs, 4);
        assert_eq!(config.plugin.path, PathBuf::from("/opt/flow/plugins"));
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Text);

        let rcv = config.actor("tcp_rcv").unwrap();
        assert_eq!(rcv.module, "core.receiver");
        assert_eq!(rcv.params.get_str("bind").as_deref(), Some("tcp://127.0.0.1:3101"));
        assert_eq!(config.actor("limiter").unwrap().params.get_str("rps").as_deref(), Some("10"));
        assert_eq!(config.pipeline["tcp_rcv"].connect, vec!["limiter".to_string()]);
    }

    #[test]
    fn test_defaults_apply() {
        let config = FlowConfig::from_toml_str("").unwrap();
        assert!(config.system.maxprocs >= 1);
        assert_eq!(config.plugin.path, PathBuf::from(defaults::plugin::PATH));
        assert_eq!(config.log.output, "stderr");
        assert!(config.actors.is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flow.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = FlowConfig::load(Some(&path)).unwrap();
        assert_eq!(config.actors.len(), 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(FlowConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_undefined_peer_rejected() {
        let content = r#"
[actors.a]
module = "core.mux"

[pipeline.a]
connect = ["ghost"]
"#;
        let err = FlowConfig::from_toml_str(content).unwrap_err();
        assert!(format!("{err:#}").contains("ghost"));
    }

    #[test]
    fn test_zero_maxprocs_rejected() {
        let err = FlowConfig::from_toml_str("[system]\nmaxprocs = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("maxprocs"));
    }

    #[test]
    fn test_plugin_path_expansion() {
        std::env::set_var("FLOW_TEST_PLUGIN_ROOT", "/srv/flow");
        let config =
            FlowConfig::from_toml_str("[plugin]\npath = \"$FLOW_TEST_PLUGIN_ROOT/plugins\"\n")
                .unwrap();
        assert_eq!(config.plugin.path, PathBuf::from("/srv/flow/plugins"));
    }

    #[test]
    fn test_render_round_trips_through_toml() {
        let config = FlowConfig::from_toml_str(SAMPLE).unwrap();
        let rendered = config.to_toml_string().unwrap();
        let reparsed = FlowConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.actors.len(), config.actors.len());
        assert_eq!(reparsed.system.maxprocs, 4);
    }
}
