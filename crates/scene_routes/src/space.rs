//! Execution spaces: scoped sets of nodes, root nodes, routes and DEF names.
//!
//! Every node belongs to exactly one [`ExecutionSpace`]. A route may only connect nodes of
//! the space that owns it, and propagation consults only the routes of the space owning the
//! changed node. Inline content and prototype bodies get their own child space.
use std::collections::{HashMap, HashSet};

use slotmap::SlotMap;
use tracing::warn;

use crate::error::{Error, Result};
use crate::node::{Node, NodeId};
use crate::route::Route;

slotmap::new_key_type! {
    /// Handle of an execution space in a [`crate::scene::Scene`].
    pub struct SpaceId;
}

/// What created a space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpaceKind {
    Scene,
    Inline,
    Proto,
}

#[derive(Debug)]
pub struct ExecutionSpace {
    kind: SpaceKind,
    parent: Option<SpaceId>,
    owner: Option<NodeId>,
    nodes: HashSet<NodeId>,
    root_nodes: Vec<NodeId>,
    routes: Vec<Route>,
    by_source: HashMap<(NodeId, usize), Vec<Route>>,
    def_names: HashMap<String, NodeId>,
    pub(crate) children: Vec<SpaceId>,
}

impl ExecutionSpace {
    pub(crate) fn new(kind: SpaceKind, parent: Option<SpaceId>, owner: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            owner,
            nodes: HashSet::new(),
            root_nodes: Vec::new(),
            routes: Vec::new(),
            by_source: HashMap::new(),
            def_names: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> SpaceKind {
        self.kind
    }

    pub fn parent(&self) -> Option<SpaceId> {
        self.parent
    }

    /// Node that owns this space, e.g. the `Inline` that loaded it.
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn children(&self) -> &[SpaceId] {
        &self.children
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn adopt(&mut self, node: NodeId) {
        self.nodes.insert(node);
    }

    #[inline]
    pub fn root_nodes(&self) -> &[NodeId] {
        &self.root_nodes
    }

    /// Appends a root node. Returns `false` if it already was a root.
    ///
    /// The change is visible immediately; nothing is deferred to the next tick.
    pub fn add_root_node(&mut self, node: NodeId) -> Result<bool> {
        if !self.nodes.contains(&node) {
            return Err(Error::UnknownNode);
        }
        if self.root_nodes.contains(&node) {
            return Ok(false);
        }
        self.root_nodes.push(node);
        Ok(true)
    }

    /// Detaches a root node without destroying it. Returns `false` if it was not a root.
    pub fn remove_root_node(&mut self, node: NodeId) -> bool {
        match self.root_nodes.iter().position(|&n| n == node) {
            Some(pos) => {
                self.root_nodes.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn named_node(&self, name: &str) -> Option<NodeId> {
        self.def_names.get(name).copied()
    }

    /// Binds a DEF name. A later binding of the same name replaces the earlier one.
    pub fn define_name(&mut self, name: impl Into<String>, node: NodeId) -> Result<()> {
        if !self.nodes.contains(&node) {
            return Err(Error::UnknownNode);
        }
        let name = name.into();
        if let Some(prev) = self.def_names.insert(name.clone(), node) {
            if prev != node {
                warn!("DEF name '{name}' rebound to a different node.");
            }
        }
        Ok(())
    }

    pub fn def_names(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.def_names.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Routes in the order they were added.
    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn has_route(&self, route: &Route) -> bool {
        self.routes_from(route.source, route.source_field)
            .contains(route)
    }

    /// Routes leaving `(node, field)`, in the order they were added.
    #[inline]
    pub fn routes_from(&self, node: NodeId, field: usize) -> &[Route] {
        self.by_source
            .get(&(node, field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Checks a route against this space and the node arena.
    ///
    /// Both ends must belong to this space, the source field must be readable, the
    /// destination field writable, and both fields must share one type.
    pub fn validate_route(&self, nodes: &SlotMap<NodeId, Node>, route: &Route) -> Result<()> {
        let source = nodes.get(route.source).ok_or(Error::UnknownNode)?;
        let dest = nodes.get(route.dest).ok_or(Error::UnknownNode)?;
        if !self.contains_node(route.source) || !self.contains_node(route.dest) {
            return Err(Error::InvalidRoute(
                "both ends must belong to the space adding the route".into(),
            ));
        }

        let from = source.field_declaration(route.source_field).ok_or_else(|| {
            Error::InvalidRoute(format!(
                "{} has no field #{}",
                source.type_name(),
                route.source_field
            ))
        })?;
        let to = dest.field_declaration(route.dest_field).ok_or_else(|| {
            Error::InvalidRoute(format!(
                "{} has no field #{}",
                dest.type_name(),
                route.dest_field
            ))
        })?;

        if !from.access.is_readable() {
            return Err(Error::InvalidRoute(format!(
                "{}.{} is an {} and cannot be routed from",
                source.type_name(),
                from.name,
                from.access.keyword()
            )));
        }
        if !to.access.is_writable() {
            return Err(Error::InvalidRoute(format!(
                "{}.{} is an {} and cannot be routed to",
                dest.type_name(),
                to.name,
                to.access.keyword()
            )));
        }
        if from.field_type != to.field_type {
            return Err(Error::InvalidRoute(format!(
                "type mismatch: {}.{} is {}, {}.{} is {}",
                source.type_name(),
                from.name,
                from.field_type,
                dest.type_name(),
                to.name,
                to.field_type
            )));
        }
        Ok(())
    }

    /// Validates and adds a route. Adding an existing route is a no-op returning `false`.
    pub fn add_route(&mut self, nodes: &SlotMap<NodeId, Node>, route: Route) -> Result<bool> {
        self.validate_route(nodes, &route)?;
        if self.has_route(&route) {
            return Ok(false);
        }
        self.routes.push(route);
        self.by_source
            .entry((route.source, route.source_field))
            .or_default()
            .push(route);
        Ok(true)
    }

    /// Removes a route. Removing a missing route is a no-op returning `false`.
    pub fn remove_route(&mut self, route: &Route) -> bool {
        let key = (route.source, route.source_field);
        let Some(list) = self.by_source.get_mut(&key) else {
            return false;
        };
        let Some(pos) = list.iter().position(|r| r == route) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.by_source.remove(&key);
        }
        self.routes.retain(|r| r != route);
        true
    }

    /// Forgets every trace of `node`: membership, root entry, DEF names and routes.
    pub(crate) fn detach_node(&mut self, node: NodeId) -> usize {
        self.nodes.remove(&node);
        self.remove_root_node(node);
        self.def_names.retain(|_, n| *n != node);

        let before = self.routes.len();
        self.routes.retain(|r| !r.touches(node));
        self.by_source.retain(|_, list| {
            list.retain(|r| !r.touches(node));
            !list.is_empty()
        });
        before - self.routes.len()
    }
}
