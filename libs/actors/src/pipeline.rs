//! Pipeline assembly and lifecycle
//!
//! Actors are built from the `actors` section, wired along the `pipeline`
//! section and checked for cycles before any edge is connected. Start walks
//! the topological order so every consumer runs before its producers; stop
//! walks it backwards.

use crate::factory::Factories;
use crate::topology::Topology;
use crate::{Actor, ActorError, Context, Result};
use flow_config::PipelineEntry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct Pipeline {
    actors: HashMap<String, Arc<dyn Actor>>,
    order: Vec<String>,
    // Dropped after the actors: plugin code must outlive them.
    _factories: Option<Factories>,
}

impl Pipeline {
    /// Build every configured actor and wire the pipeline
    pub async fn new(ctx: &Context, factories: Factories) -> Result<Self> {
        let config = ctx.config();
        let mut actors = Vec::with_capacity(config.actors.len());
        for (name, actor_config) in &config.actors {
            actors.push(factories.build(name, actor_config, ctx)?);
        }

        let mut pipeline = Self::assemble(ctx, actors, &config.pipeline).await?;
        pipeline._factories = Some(factories);
        Ok(pipeline)
    }

    /// Wire already constructed actors along `edges`
    pub async fn assemble(
        ctx: &Context,
        actors: Vec<Arc<dyn Actor>>,
        edges: &BTreeMap<String, PipelineEntry>,
    ) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(actors.len());
        let mut topology = Topology::new();
        for actor in actors {
            let name = actor.name().to_string();
            if by_name.contains_key(&name) {
                return Err(ActorError::Duplicate(name));
            }
            topology.add_node(name.clone());
            by_name.insert(name, actor);
        }

        let mut wiring = Vec::new();
        for (from, entry) in edges {
            if !by_name.contains_key(from) {
                return Err(ActorError::UnresolvedPeer {
                    from: from.clone(),
                    peer: from.clone(),
                });
            }
            for peer in &entry.connect {
                if !by_name.contains_key(peer) {
                    return Err(ActorError::UnresolvedPeer {
                        from: from.clone(),
                        peer: peer.clone(),
                    });
                }
                topology.add_edge(from.clone(), peer.clone());
                wiring.push((from.clone(), peer.clone()));
            }
        }

        let order = topology.sort()?;
        let pipeline = Self {
            actors: by_name,
            order,
            _factories: None,
        };

        let nthreads = ctx.maxprocs();
        for (from, peer) in &wiring {
            let (Some(source), Some(target)) = (pipeline.actors.get(from), pipeline.actors.get(peer))
            else {
                continue;
            };
            if let Err(e) = source.connect(nthreads, Arc::clone(target)).await {
                error!(actor = %from, peer = %peer, error = %e, "connect failed");
                if let Err(stop_error) = pipeline.stop().await {
                    debug!(error = %stop_error, "cleanup after failed connect");
                }
                return Err(e);
            }
            debug!(actor = %from, peer = %peer, nthreads, "connected");
        }

        info!(actors = pipeline.actors.len(), edges = wiring.len(), "pipeline assembled");
        Ok(pipeline)
    }

    pub fn actor(&self, name: &str) -> Option<&Arc<dyn Actor>> {
        self.actors.get(name)
    }

    /// Start order: consumers before their producers
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Start every actor; the first failure aborts
    pub async fn start(&self) -> Result<()> {
        for name in &self.order {
            if let Some(actor) = self.actors.get(name) {
                actor.start().await?;
                debug!(actor = %name, "started");
            }
        }
        info!(actors = self.order.len(), "pipeline started");
        Ok(())
    }

    /// Stop every actor, producers first. Failures are logged and the first
    /// one is returned once all actors have been asked to stop.
    pub async fn stop(&self) -> Result<()> {
        let mut first_error = None;
        for name in self.order.iter().rev() {
            let Some(actor) = self.actors.get(name) else {
                continue;
            };
            match actor.stop().await {
                Ok(()) => debug!(actor = %name, "stopped"),
                Err(e) => {
                    error!(actor = %name, error = %e, "stop failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        info!("pipeline stopped");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("order", &self.order).finish()
    }
}
