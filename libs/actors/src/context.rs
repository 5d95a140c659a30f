//! Process-wide context
//!
//! Shared read access to the configuration, the metrics registry and the
//! logger. Started once before the pipeline, stopped once after it.

use crate::actor::Lifecycle;
use crate::logging::Logger;
use crate::metrics::MetricsRegistry;
use crate::Result;
use flow_config::FlowConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: Arc<FlowConfig>,
    metrics: MetricsRegistry,
    logger: Mutex<Option<Logger>>,
    state: Lifecycle,
}

impl Context {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config: Arc::new(config),
                metrics: MetricsRegistry::new(),
                logger: Mutex::new(None),
                state: Lifecycle::new(),
            }),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.inner.config
    }

    /// Worker tasks per pipeline edge, at least one
    pub fn maxprocs(&self) -> usize {
        self.inner.config.system.maxprocs.max(1)
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.inner.metrics
    }

    /// Install the logger. Later calls are no-ops.
    pub fn start(&self) -> Result<()> {
        if !self.inner.state.begin_start() {
            return Ok(());
        }
        let logger = Logger::install(&self.inner.config.log)?;
        *self.inner.logger.lock() = Some(logger);
        info!(maxprocs = self.maxprocs(), "context started");
        Ok(())
    }

    /// Flush and release the logger
    pub fn stop(&self) {
        if !self.inner.state.begin_stop() {
            return;
        }
        info!("context stopped");
        self.inner.logger.lock().take();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("maxprocs", &self.maxprocs())
            .field("state", &self.inner.state.state())
            .finish()
    }
}
