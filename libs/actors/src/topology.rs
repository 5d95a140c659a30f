//! Directed acyclic graph of pipeline nodes
//!
//! Edges point from a node to the nodes it feeds. [`Topology::sort`] orders
//! every node after all of its successors, so walking the result forwards
//! starts consumers before producers and walking it backwards stops
//! producers first.

use crate::{ActorError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct Topology<N> {
    nodes: Vec<N>,
    edges: HashMap<N, Vec<N>>,
}

impl<N> Default for Topology<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: HashMap::new(),
        }
    }
}

impl<N> Topology<N>
where
    N: Clone + Eq + Hash + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; adding it twice is a no-op
    pub fn add_node(&mut self, node: N) {
        if !self.edges.contains_key(&node) {
            self.edges.insert(node.clone(), Vec::new());
            self.nodes.push(node);
        }
    }

    /// Add `from → to`, inserting either node if missing
    pub fn add_edge(&mut self, from: N, to: N) {
        self.add_node(from.clone());
        self.add_node(to.clone());
        if let Some(out) = self.edges.get_mut(&from) {
            if !out.contains(&to) {
                out.push(to);
            }
        }
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Direct successors of `node`
    pub fn successors(&self, node: &N) -> &[N] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first topological sort, successors first.
    ///
    /// Fails with [`ActorError::Cycle`] naming the node found on a cycle; a
    /// self-edge is a cycle.
    pub fn sort(&self) -> Result<Vec<N>> {
        let mut temporary = HashSet::new();
        let mut permanent = HashSet::new();
        let mut sorted = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            self.visit(node, &mut temporary, &mut permanent, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn visit(
        &self,
        node: &N,
        temporary: &mut HashSet<N>,
        permanent: &mut HashSet<N>,
        sorted: &mut Vec<N>,
    ) -> Result<()> {
        if permanent.contains(node) {
            return Ok(());
        }
        if temporary.contains(node) {
            return Err(ActorError::Cycle {
                node: node.to_string(),
            });
        }

        temporary.insert(node.clone());
        for next in self.successors(node) {
            self.visit(next, temporary, permanent, sorted)?;
        }
        temporary.remove(node);
        permanent.insert(node.clone());
        sorted.push(node.clone());
        Ok(())
    }
}
