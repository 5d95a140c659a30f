//! Actor factories
//!
//! Modules are looked up by prefix: `core.*` in the built-in table,
//! `plugin.*` through the configured [`PluginLoader`].

use crate::builtin;
use crate::plugin::{DynamicLibrary, PluginLoader};
use crate::receivers;
use crate::sinks;
use crate::{Actor, ActorError, Context, Result};
use flow_config::{defaults, ActorConfig, Params};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Constructs one actor from its name, the context and its parameters
pub type Builder = Arc<dyn Fn(&str, &Context, &Params) -> Result<Arc<dyn Actor>> + Send + Sync>;

/// Wrap a closure or function as a [`Builder`]
pub fn builder<F>(f: F) -> Builder
where
    F: Fn(&str, &Context, &Params) -> Result<Arc<dyn Actor>> + Send + Sync + 'static,
{
    Arc::new(f)
}

const CORE_PREFIX: &str = "core.";
const PLUGIN_PREFIX: &str = "plugin.";

pub struct Factories {
    core: HashMap<String, Builder>,
    plugins: Box<dyn PluginLoader>,
}

impl Factories {
    /// Built-in table plus the given plugin loader
    pub fn new(plugins: impl PluginLoader + 'static) -> Self {
        Self {
            core: core_table(),
            plugins: Box::new(plugins),
        }
    }

    /// Built-in table plus shared objects from `plugin.path`
    pub fn from_context(ctx: &Context) -> Self {
        Self::new(DynamicLibrary::new(ctx.config().plugin.path.clone()))
    }

    /// Add or replace a `core.*` module
    pub fn register_core(&mut self, module: impl Into<String>, builder: Builder) {
        self.core.insert(module.into(), builder);
    }

    pub fn core_modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self.core.keys().map(String::as_str).collect();
        modules.sort_unstable();
        modules
    }

    /// Instantiate actor `name` as described by `config`
    pub fn build(&self, name: &str, config: &ActorConfig, ctx: &Context) -> Result<Arc<dyn Actor>> {
        let module = config.module.trim();
        debug!(actor = %name, module, "building actor");

        if module.starts_with(CORE_PREFIX) {
            let builder = self.core.get(module).ok_or_else(|| ActorError::UnknownModule {
                actor: name.to_string(),
                module: module.to_string(),
            })?;
            return builder(name, ctx, &config.params);
        }

        if let Some(plugin) = module.strip_prefix(PLUGIN_PREFIX) {
            let symbol = config
                .builder
                .as_deref()
                .unwrap_or(defaults::plugin::BUILDER_SYMBOL);
            return self.plugins.build(plugin, symbol, name, ctx, &config.params);
        }

        Err(ActorError::UnknownModule {
            actor: name.to_string(),
            module: module.to_string(),
        })
    }
}

fn core_table() -> HashMap<String, Builder> {
    let entries: [(&str, Builder); 19] = [
        ("core.receiver", builder(receivers::build)),
        ("core.receiver.tcp", builder(receivers::build_tcp)),
        ("core.receiver.udp", builder(receivers::build_udp)),
        ("core.receiver.unix", builder(receivers::build_unix)),
        ("core.receiver.http", builder(receivers::build_http)),
        ("core.mux", builder(builtin::mux::build)),
        ("core.fanout", builder(builtin::fanout::build)),
        ("core.demux", builder(builtin::demux::build)),
        ("core.replicator", builder(builtin::replicator::build)),
        ("core.router", builder(builtin::router::build)),
        ("core.throttler", builder(builtin::throttler::build)),
        ("core.buffer", builder(builtin::buffer::build)),
        ("core.compressor", builder(builtin::compressor::build)),
        ("core.meta_parser", builder(builtin::meta_parser::build)),
        ("core.base64.encode", builder(builtin::base64::build_encoder)),
        ("core.base64.decode", builder(builtin::base64::build_decoder)),
        ("core.sink", builder(sinks::build)),
        ("core.sink.null", builder(sinks::build_null)),
        ("core.sink.dumper", builder(sinks::build_dumper)),
    ];

    entries
        .into_iter()
        .map(|(module, builder)| (module.to_string(), builder))
        .collect()
}
