//! Actor plugins
//!
//! `plugin.<name>` modules are resolved through a [`PluginLoader`].
//! [`NativeBuiltin`] is an in-process registry of builder closures;
//! [`DynamicLibrary`] opens `<plugin.path>/<name>.so` and calls the exported
//! builder symbol.
//!
//! A plugin library declares its entry point with [`export_actor!`] and must
//! be built against the same `flow-actors` version as the host.

use crate::factory::Builder;
use crate::{Actor, ActorError, Context, Result};
use flow_config::{defaults, Params};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Signature of the symbol a plugin library exports
pub type PluginEntry = fn(&str, &Context, &Params) -> Result<Arc<dyn Actor>>;

pub trait PluginLoader: Send + Sync {
    /// Build actor `name` from plugin `plugin` using entry point `symbol`
    fn build(
        &self,
        plugin: &str,
        symbol: &str,
        name: &str,
        ctx: &Context,
        params: &Params,
    ) -> Result<Arc<dyn Actor>>;
}

/// Compile-time registry of plugin builders
#[derive(Default, Clone)]
pub struct NativeBuiltin {
    builders: HashMap<String, Builder>,
}

impl NativeBuiltin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `builder` for module `plugin.<plugin>`
    pub fn register(&mut self, plugin: impl Into<String>, builder: Builder) -> &mut Self {
        self.builders.insert(plugin.into(), builder);
        self
    }

    pub fn with(mut self, plugin: impl Into<String>, builder: Builder) -> Self {
        self.register(plugin, builder);
        self
    }
}

impl PluginLoader for NativeBuiltin {
    fn build(
        &self,
        plugin: &str,
        _symbol: &str,
        name: &str,
        ctx: &Context,
        params: &Params,
    ) -> Result<Arc<dyn Actor>> {
        let builder = self
            .builders
            .get(plugin)
            .ok_or_else(|| ActorError::plugin(plugin, "no builtin registered"))?;
        builder(name, ctx, params)
    }
}

/// Loads plugins from shared objects in a directory.
///
/// Libraries stay loaded for the lifetime of the loader.
pub struct DynamicLibrary {
    dir: PathBuf,
    libraries: Mutex<HashMap<String, Arc<libloading::Library>>>,
}

impl DynamicLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            libraries: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the shared object backing `plugin`
    pub fn library_path(&self, plugin: &str) -> PathBuf {
        self.dir
            .join(format!("{plugin}.{}", defaults::plugin::LIBRARY_EXTENSION))
    }

    fn library(&self, plugin: &str) -> Result<Arc<libloading::Library>> {
        let mut libraries = self.libraries.lock();
        if let Some(lib) = libraries.get(plugin) {
            return Ok(Arc::clone(lib));
        }

        let path = self.library_path(plugin);
        // SAFETY: loading runs the library's initialisers; plugin libraries
        // are trusted code from the configured plugin directory.
        let lib = unsafe { libloading::Library::new(&path) }.map_err(|e| {
            ActorError::plugin(plugin, format!("failed to open {}: {e}", path.display()))
        })?;
        info!(plugin, path = %path.display(), "plugin library loaded");

        let lib = Arc::new(lib);
        libraries.insert(plugin.to_string(), Arc::clone(&lib));
        Ok(lib)
    }
}

impl PluginLoader for DynamicLibrary {
    fn build(
        &self,
        plugin: &str,
        symbol: &str,
        name: &str,
        ctx: &Context,
        params: &Params,
    ) -> Result<Arc<dyn Actor>> {
        let lib = self.library(plugin)?;
        // SAFETY: the symbol is declared by `export_actor!` with the
        // `PluginEntry` signature.
        let entry: PluginEntry = unsafe {
            let sym = lib
                .get::<PluginEntry>(symbol.as_bytes())
                .map_err(|e| ActorError::plugin(plugin, format!("symbol '{symbol}': {e}")))?;
            *sym
        };
        entry(name, ctx, params)
    }
}

/// Export a builder function as a plugin entry point.
///
/// ```ignore
/// fn build(name: &str, ctx: &Context, params: &Params) -> Result<Arc<dyn Actor>> { ... }
/// flow_actors::export_actor!(build);
/// flow_actors::export_actor!(build_special, build);
/// ```
#[macro_export]
macro_rules! export_actor {
    ($builder:path) => {
        $crate::export_actor!(flow_build_actor, $builder);
    };
    ($symbol:ident, $builder:path) => {
        #[no_mangle]
        pub fn $symbol(
            name: &str,
            ctx: &$crate::Context,
            params: &$crate::Params,
        ) -> $crate::Result<::std::sync::Arc<dyn $crate::Actor>> {
            let entry: $crate::plugin::PluginEntry = $builder;
            entry(name, ctx, params)
        }
    };
}
