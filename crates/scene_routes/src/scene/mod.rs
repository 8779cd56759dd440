//! The owning runtime: node and space arenas, the field protocol and load management.
//!
//! [`Scene`] is single-threaded. Every mutation of node state happens on the thread that
//! owns it; content-loader threads only post completions, which [`Scene::process_routes`]
//! picks up at the start of the next tick.
//!
//! Field writes follow the setup protocol. While a node is in setup, [`Scene::set_value`]
//! stores values silently. After [`Scene::finish_setup`] every successful write marks the
//! field changed, queues it for route propagation and notifies sinks before returning.
pub mod propagate;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use slotmap::SlotMap;
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, SceneEvent};
use crate::field::{AccessMode, ArrayValue, FieldValue};
use crate::loader::cache::ContentCache;
use crate::loader::content::{CancelToken, Content, ContentLoader, ContentProvider, LoadJob};
use crate::node::load::LoadState;
use crate::node::registry::NodeTypeRegistry;
use crate::node::{Capability, Node, NodeContext, NodeId, NodeType};
use crate::report::{ErrorReporter, TracingReporter};
use crate::route::{Route, RouteSpec};
use crate::space::{ExecutionSpace, SpaceId, SpaceKind};

pub use propagate::{CascadeHook, CascadeStats, FnHook, HookContext};

/// A scene graph runtime.
pub struct Scene {
    config: RuntimeConfig,
    registry: Arc<NodeTypeRegistry>,
    nodes: SlotMap<NodeId, Node>,
    spaces: SlotMap<SpaceId, ExecutionSpace>,
    main_space: SpaceId,
    /// Changed `(node, field)` pairs not yet propagated, in change order.
    pending: VecDeque<(NodeId, usize)>,
    sensors: Vec<NodeId>,
    sinks: Vec<Box<dyn EventSink>>,
    reporter: Box<dyn ErrorReporter>,
    hooks: Vec<Box<dyn CascadeHook>>,
    loader: Option<ContentLoader>,
    cache: Arc<ContentCache>,
    time: Option<f64>,
}

impl Scene {
    /// Creates an empty scene using the built-in node types.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_registry(NodeTypeRegistry::standard(), config)
    }

    /// Creates an empty scene resolving node types through `registry`.
    pub fn with_registry(registry: Arc<NodeTypeRegistry>, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(registry, config))
    }

    fn assemble(registry: Arc<NodeTypeRegistry>, config: RuntimeConfig) -> Self {
        let mut spaces = SlotMap::with_key();
        let main_space = spaces.insert(ExecutionSpace::new(SpaceKind::Scene, None, None));
        Self {
            config,
            registry,
            nodes: SlotMap::with_key(),
            spaces,
            main_space,
            pending: VecDeque::new(),
            sensors: Vec::new(),
            sinks: Vec::new(),
            reporter: Box::new(TracingReporter),
            hooks: Vec::new(),
            loader: None,
            cache: Arc::new(ContentCache::new()),
            time: None,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    /// Replaces the diagnostic sink.
    pub fn set_reporter<R>(&mut self, reporter: R)
    where
        R: ErrorReporter + 'static,
    {
        self.reporter = Box::new(reporter);
    }

    pub fn reporter_mut(&mut self) -> &mut dyn ErrorReporter {
        self.reporter.as_mut()
    }

    /// Registers an event sink. Sinks receive events synchronously, in registration order.
    pub fn add_sink<S>(&mut self, sink: S)
    where
        S: EventSink + 'static,
    {
        self.sinks.push(Box::new(sink));
    }

    /// Registers a hook run once at the end of every tick.
    pub fn add_cascade_hook<H>(&mut self, hook: H)
    where
        H: CascadeHook + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Starts the content-loader pool fetching through `provider`.
    ///
    /// Replacing a provider shuts the previous pool down. Nodes it was still loading go back
    /// to [`LoadState::NotLoaded`] and are requested again from the new provider.
    pub fn set_content_provider<P>(&mut self, provider: P) -> Result<()>
    where
        P: ContentProvider + 'static,
    {
        let loader = ContentLoader::new(
            Arc::new(provider),
            self.config.max_loader_threads,
            self.cache.clone(),
        )?;

        let interrupted: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.load_state() == Some(LoadState::Loading))
            .map(|(id, _)| id)
            .collect();
        for &id in &interrupted {
            self.set_load_state(id, LoadState::NotLoaded)?;
        }
        self.loader = Some(loader);

        if !interrupted.is_empty() {
            debug!(count = interrupted.len(), "Restarting loads on the new provider.");
        }
        for id in interrupted {
            self.auto_load(id);
        }
        Ok(())
    }

    pub fn content_cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Timestamp of the last tick, if any tick ran.
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub(crate) fn emit(&mut self, event: SceneEvent) {
        for sink in self.sinks.iter_mut() {
            sink.send(event.clone());
        }
    }

    // Spaces

    pub fn main_space(&self) -> SpaceId {
        self.main_space
    }

    pub fn space(&self, id: SpaceId) -> Option<&ExecutionSpace> {
        self.spaces.get(id)
    }

    fn space_mut(&mut self, id: SpaceId) -> Result<&mut ExecutionSpace> {
        self.spaces.get_mut(id).ok_or(Error::UnknownSpace)
    }

    /// Creates a child space, e.g. for a prototype instance.
    pub fn create_space(&mut self, kind: SpaceKind, parent: SpaceId) -> Result<SpaceId> {
        self.create_owned_space(kind, parent, None)
    }

    pub(crate) fn create_owned_space(
        &mut self,
        kind: SpaceKind,
        parent: SpaceId,
        owner: Option<NodeId>,
    ) -> Result<SpaceId> {
        if !self.spaces.contains_key(parent) {
            return Err(Error::UnknownSpace);
        }
        let id = self
            .spaces
            .insert(ExecutionSpace::new(kind, Some(parent), owner));
        self.space_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Destroys a space, its child spaces and every node they own.
    pub fn remove_space(&mut self, id: SpaceId) -> Result<()> {
        if id == self.main_space {
            return Err(Error::Other("the main space cannot be removed".into()));
        }
        let space = self.spaces.remove(id).ok_or(Error::UnknownSpace)?;
        if let Some(parent) = space.parent().and_then(|p| self.spaces.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        for child in space.children().to_vec() {
            if self.spaces.contains_key(child) {
                self.remove_space(child)?;
            }
        }
        for node in space.nodes() {
            self.drop_node_storage(node);
        }
        Ok(())
    }

    // Nodes

    /// Creates a node of `type_name` in `space`. The node starts in setup.
    pub fn create_node(&mut self, space: SpaceId, type_name: &str) -> Result<NodeId> {
        if !self.spaces.contains_key(space) {
            return Err(Error::UnknownSpace);
        }
        let node_type = self.registry.resolve(type_name)?;
        let is_sensor = node_type.has_capability(Capability::Sensor);
        let id = self.nodes.insert(Node::new(node_type, space));
        self.space_mut(space)?.adopt(id);
        if is_sensor {
            self.sensors.push(id);
        }
        debug!(node = ?id, type_name, "Node created.");
        Ok(id)
    }

    /// Ends setup of a node. Later writes mark changes and notify.
    ///
    /// Loadable nodes with a URL start loading here when a content provider is set.
    pub fn finish_setup(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(Error::UnknownNode)?;
        if !node.in_setup {
            return Ok(());
        }
        node.in_setup = false;
        let node_type = node.node_type().clone();
        self.run_behavior(id, &node_type, |b, ctx| b.setup_finished(ctx));
        if node_type.has_capability(Capability::Loadable) {
            self.auto_load(id);
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Destroys a node, dropping its routes, DEF names and root entry.
    ///
    /// Other nodes may still hold its handle in node fields; such handles no longer resolve.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let space = self.nodes.get(id).ok_or(Error::UnknownNode)?.space;
        if let Some(space) = self.spaces.get_mut(space) {
            space.detach_node(id);
        }
        self.drop_node_storage(id);
        Ok(())
    }

    fn drop_node_storage(&mut self, id: NodeId) {
        let Some(mut node) = self.nodes.remove(id) else {
            return;
        };
        self.sensors.retain(|n| *n != id);
        self.pending.retain(|(n, _)| *n != id);
        if let Some(slot) = node.load.as_mut() {
            if let Some(token) = slot.cancel.take() {
                token.cancel();
            }
            if let Some(child) = slot.space.take() {
                if let Err(e) = self.remove_space(child) {
                    debug!(error = %e, "Inline space already gone.");
                }
            }
        }
    }

    /// Removes every node of `space` that cannot be reached from its root nodes through
    /// node-valued fields. Returns the removed handles.
    pub fn collect_unreachable(&mut self, space: SpaceId) -> Result<Vec<NodeId>> {
        let sp = self.spaces.get(space).ok_or(Error::UnknownSpace)?;
        let mut reachable: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = sp.root_nodes().to_vec();
        while let Some(id) = stack.pop() {
            if !sp.contains_node(id) || !reachable.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.referenced_nodes());
            }
        }

        let unreachable: Vec<NodeId> = sp.nodes().filter(|n| !reachable.contains(n)).collect();
        for id in &unreachable {
            self.remove_node(*id)?;
        }
        if !unreachable.is_empty() {
            debug!(count = unreachable.len(), "Collected unreachable nodes.");
        }
        Ok(unreachable)
    }

    // Field protocol

    pub fn field_value(&self, id: NodeId, index: usize) -> Result<&FieldValue> {
        self.nodes
            .get(id)
            .ok_or(Error::UnknownNode)?
            .field_value(index)
    }

    pub fn field_value_by_name(&self, id: NodeId, name: &str) -> Result<&FieldValue> {
        self.nodes
            .get(id)
            .ok_or(Error::UnknownNode)?
            .field_value_by_name(name)
    }

    /// Resolves a field name (any alias) on a node.
    pub fn field_index(&self, id: NodeId, name: &str) -> Result<usize> {
        let node = self.nodes.get(id).ok_or(Error::UnknownNode)?;
        node.field_index(name)
            .ok_or_else(|| Error::invalid_field(node.type_name(), name, "no such field"))
    }

    /// Sets a field from outside the node.
    ///
    /// Fails with [`Error::InvalidField`] when the index is out of range, the field does not
    /// accept the value's type, the field is an event output, or an initialize-only field is
    /// written after setup. Fails with [`Error::InvalidFieldValue`] when the value breaks a
    /// shape or domain constraint. A rejected value leaves the stored value unchanged.
    pub fn set_value(&mut self, id: NodeId, index: usize, value: impl Into<FieldValue>) -> Result<()> {
        self.write_field(id, index, value.into())
    }

    pub fn set_value_by_name(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<()> {
        let index = self.field_index(id, name)?;
        self.write_field(id, index, value.into())
    }

    pub fn set_bool(&mut self, id: NodeId, index: usize, value: bool) -> Result<()> {
        self.write_field(id, index, FieldValue::Bool(value))
    }

    pub fn set_int(&mut self, id: NodeId, index: usize, value: i32) -> Result<()> {
        self.write_field(id, index, FieldValue::Int32(value))
    }

    pub fn set_float(&mut self, id: NodeId, index: usize, value: f32) -> Result<()> {
        self.write_field(id, index, FieldValue::Float(value))
    }

    pub fn set_double(&mut self, id: NodeId, index: usize, value: f64) -> Result<()> {
        self.write_field(id, index, FieldValue::Double(value))
    }

    pub fn set_string(&mut self, id: NodeId, index: usize, value: impl Into<String>) -> Result<()> {
        self.write_field(id, index, FieldValue::String(value.into()))
    }

    pub fn set_node(&mut self, id: NodeId, index: usize, value: Option<NodeId>) -> Result<()> {
        self.write_field(id, index, FieldValue::Node(value))
    }

    /// Sets an integer array of which the first `count` elements are valid.
    pub fn set_int_array(&mut self, id: NodeId, index: usize, data: Vec<i32>, count: usize) -> Result<()> {
        let value = self.counted(id, index, data, count)?;
        self.write_field(id, index, FieldValue::Int32Array(value))
    }

    /// Sets a float array of which the first `count` elements are valid.
    pub fn set_float_array(&mut self, id: NodeId, index: usize, data: Vec<f32>, count: usize) -> Result<()> {
        let value = self.counted(id, index, data, count)?;
        self.write_field(id, index, FieldValue::FloatArray(value))
    }

    /// Sets a string array of which the first `count` elements are valid.
    pub fn set_string_array(
        &mut self,
        id: NodeId,
        index: usize,
        data: Vec<String>,
        count: usize,
    ) -> Result<()> {
        let value = self.counted(id, index, data, count)?;
        self.write_field(id, index, FieldValue::StringArray(value))
    }

    pub fn set_node_array(&mut self, id: NodeId, index: usize, nodes: Vec<NodeId>) -> Result<()> {
        self.write_field(id, index, FieldValue::nodes(nodes))
    }

    fn counted<T>(&self, id: NodeId, index: usize, data: Vec<T>, count: usize) -> Result<ArrayValue<T>> {
        let len = data.len();
        ArrayValue::with_count(data, count).ok_or_else(|| {
            let (type_name, field) = self
                .nodes
                .get(id)
                .map(|n| {
                    let field = n
                        .field_declaration(index)
                        .map(|d| d.name.clone())
                        .unwrap_or_else(|| format!("#{index}"));
                    (n.type_name().to_owned(), field)
                })
                .unwrap_or_default();
            Error::invalid_value(type_name, field, format!("count {count} exceeds array length {len}"))
        })
    }

    /// Whether a field changed since the last [`Self::check_field_changed`] on it.
    pub fn has_field_changed(&self, id: NodeId, index: usize) -> Result<bool> {
        Ok(self
            .nodes
            .get(id)
            .ok_or(Error::UnknownNode)?
            .has_field_changed(index))
    }

    /// Reads and clears a field's changed flag; used by renderer adapters.
    pub fn check_field_changed(&mut self, id: NodeId, index: usize) -> Result<bool> {
        Ok(self
            .nodes
            .get_mut(id)
            .ok_or(Error::UnknownNode)?
            .check_field_changed(index))
    }

    pub(crate) fn write_field(&mut self, id: NodeId, index: usize, value: FieldValue) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(Error::UnknownNode)?;
        let node_type = node.node_type().clone();
        let decl = node_type
            .table()
            .declaration(index)
            .ok_or_else(|| node_type.no_such_field(index))?;

        match decl.access {
            AccessMode::EventOut => {
                return Err(Error::invalid_field(
                    node_type.name(),
                    &decl.name,
                    "eventOut fields are written only by their node",
                ))
            }
            AccessMode::Field if !node.in_setup => {
                return Err(Error::invalid_field(
                    node_type.name(),
                    &decl.name,
                    "initialize-only field can only be set during setup",
                ))
            }
            _ => {}
        }
        decl.check_shape(node_type.name(), &value)?;
        node_type
            .behavior()
            .validate(index, decl, &value)
            .map_err(|reason| Error::invalid_value(node_type.name(), &decl.name, reason))?;

        node.values[index] = value;
        if node.in_setup {
            return Ok(());
        }
        self.mark_changed(id, index);
        self.apply_capabilities(id, index, &node_type);
        self.run_behavior(id, &node_type, |b, ctx| b.field_changed(ctx, index));
        Ok(())
    }

    /// Flags a field changed, queues it for propagation and notifies sinks.
    fn mark_changed(&mut self, id: NodeId, index: usize) {
        if let Some(flag) = self.nodes.get_mut(id).and_then(|n| n.changed.get_mut(index)) {
            *flag = true;
        }
        self.pending.push_back((id, index));
        self.emit(SceneEvent::FieldChanged { node: id, field: index });
    }

    /// Writes a node's own field on its behalf, bypassing access checks.
    fn set_internal(&mut self, id: NodeId, index: usize, value: FieldValue) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.values[index] = value;
        if !node.in_setup {
            self.mark_changed(id, index);
        }
    }

    pub(crate) fn run_behavior<F>(&mut self, id: NodeId, node_type: &Arc<NodeType>, f: F)
    where
        F: FnOnce(&dyn crate::node::NodeBehavior, &mut NodeContext<'_>),
    {
        let time = self.time.unwrap_or(0.0);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let mut ctx = NodeContext::new(id, node_type, &mut node.values, time);
        f(node_type.behavior(), &mut ctx);
        let outputs = ctx.into_outputs();
        if node.in_setup {
            return;
        }
        for index in outputs {
            self.mark_changed(id, index);
        }
    }

    fn apply_capabilities(&mut self, id: NodeId, index: usize, node_type: &NodeType) {
        let fields = node_type.standard;
        if let (Some(add), Some(children)) = (fields.add_children, fields.children) {
            if index == add {
                self.edit_children(id, add, children, |list, incoming| {
                    for n in incoming {
                        if !list.contains(n) {
                            list.push(*n);
                        }
                    }
                });
                return;
            }
        }
        if let (Some(remove), Some(children)) = (fields.remove_children, fields.children) {
            if index == remove {
                self.edit_children(id, remove, children, |list, outgoing| {
                    list.retain(|n| !outgoing.contains(n));
                });
                return;
            }
        }
        if fields.url == Some(index) {
            self.url_changed(id);
        } else if fields.url.is_some() && node_type.table().index_of("load") == Some(index) {
            self.load_toggled(id, index);
        }
    }

    fn edit_children<F>(&mut self, id: NodeId, input: usize, children: usize, edit: F)
    where
        F: FnOnce(&mut Vec<NodeId>, &[NodeId]),
    {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let incoming = node.values[input].node_refs();
        let mut list = node.values[children].node_refs();
        let before = list.clone();
        edit(&mut list, incoming.as_slice());
        if list != before {
            self.set_internal(id, children, FieldValue::nodes(list));
        }
    }

    // Main-space conveniences

    /// Root nodes of the main space.
    pub fn root_nodes(&self) -> &[NodeId] {
        self.spaces
            .get(self.main_space)
            .map(ExecutionSpace::root_nodes)
            .unwrap_or(&[])
    }

    /// Adds a root node to the main space; visible immediately.
    pub fn add_root_node(&mut self, node: NodeId) -> Result<bool> {
        self.add_root_node_in(self.main_space, node)
    }

    pub fn remove_root_node(&mut self, node: NodeId) -> Result<bool> {
        self.remove_root_node_in(self.main_space, node)
    }

    pub fn named_node(&self, name: &str) -> Option<NodeId> {
        self.named_node_in(self.main_space, name)
    }

    pub fn add_root_node_in(&mut self, space: SpaceId, node: NodeId) -> Result<bool> {
        if !self.nodes.contains_key(node) {
            return Err(Error::UnknownNode);
        }
        self.space_mut(space)?.add_root_node(node)
    }

    pub fn remove_root_node_in(&mut self, space: SpaceId, node: NodeId) -> Result<bool> {
        Ok(self.space_mut(space)?.remove_root_node(node))
    }

    pub fn named_node_in(&self, space: SpaceId, name: &str) -> Option<NodeId> {
        self.spaces.get(space)?.named_node(name)
    }

    pub fn define_name(&mut self, space: SpaceId, name: impl Into<String>, node: NodeId) -> Result<()> {
        self.space_mut(space)?.define_name(name, node)
    }

    // Routes

    /// Adds a route to the space owning its source node.
    pub fn add_route(&mut self, route: Route) -> Result<bool> {
        let space = self.nodes.get(route.source).ok_or(Error::UnknownNode)?.space;
        self.add_route_in(space, route)
    }

    /// Validates and adds a route to `space`. Returns `false` if it already existed.
    pub fn add_route_in(&mut self, space: SpaceId, route: Route) -> Result<bool> {
        let sp = self.spaces.get_mut(space).ok_or(Error::UnknownSpace)?;
        sp.add_route(&self.nodes, route)
    }

    /// Removes a route from the space owning its source node. Returns `false` if missing.
    pub fn remove_route(&mut self, route: &Route) -> bool {
        let Some(space) = self.nodes.get(route.source).map(|n| n.space) else {
            return false;
        };
        self.spaces
            .get_mut(space)
            .is_some_and(|sp| sp.remove_route(route))
    }

    /// Builds a route from field names, accepting any alias.
    pub fn route_by_name(
        &self,
        source: NodeId,
        source_field: &str,
        dest: NodeId,
        dest_field: &str,
    ) -> Result<Route> {
        Ok(Route::new(
            source,
            self.field_index(source, source_field)?,
            dest,
            self.field_index(dest, dest_field)?,
        ))
    }

    /// Resolves a textual route against the DEF names of `space` and adds it.
    pub fn add_route_spec(&mut self, space: SpaceId, statement: &RouteSpec) -> Result<bool> {
        let lookup = |name: &str| {
            self.named_node_in(space, name)
                .ok_or_else(|| Error::InvalidRoute(format!("no node named '{name}' in {statement}")))
        };
        let source = lookup(&statement.from_node)?;
        let dest = lookup(&statement.to_node)?;
        let route = self
            .route_by_name(source, &statement.from_field, dest, &statement.to_field)
            .map_err(|e| Error::InvalidRoute(format!("{statement}: {e}")))?;
        self.add_route_in(space, route)
    }

    // Loading

    /// Moves a loadable node to `state`, notifying sinks.
    ///
    /// Entering [`LoadState::Complete`] sends [`SceneEvent::ContentReady`]; every other
    /// transition sends [`SceneEvent::ContentStateChanged`].
    pub fn set_load_state(&mut self, id: NodeId, state: LoadState) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(Error::UnknownNode)?;
        let Some(field) = node.node_type().standard.url else {
            return Err(Error::invalid_field(
                node.type_name(),
                "url",
                "node type is not loadable",
            ));
        };
        let slot = node.load.get_or_insert_with(Default::default);
        slot.state = slot.state.transition(state)?;
        if state != LoadState::Loading {
            if let Some(token) = slot.cancel.take() {
                token.cancel();
            }
        }
        if state == LoadState::NotLoaded {
            slot.content = None;
            if let Some(child) = slot.space.take() {
                self.remove_space(child)?;
            }
        }

        let event = match state {
            LoadState::Complete => SceneEvent::ContentReady { node: id, field },
            _ => SceneEvent::ContentStateChanged {
                node: id,
                field,
                state,
            },
        };
        self.emit(event);
        Ok(())
    }

    /// Starts loading a node's `url` on the loader pool.
    ///
    /// The node must be in [`LoadState::NotLoaded`]. Without a content provider, or with an
    /// empty URL list, the node goes straight to [`LoadState::Failed`].
    pub fn request_load(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(id).ok_or(Error::UnknownNode)?;
        let urls: Vec<String> = node
            .node_type()
            .standard
            .url
            .and_then(|i| node.values[i].as_string_slice())
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        self.set_load_state(id, LoadState::Loading)?;

        if urls.is_empty() {
            self.reporter.warning_report("Loadable node has no url to load.", None);
            return self.set_load_state(id, LoadState::Failed);
        }
        let Some(loader) = self.loader.as_ref() else {
            self.reporter
                .warning_report("No content provider set; cannot load external content.", None);
            return self.set_load_state(id, LoadState::Failed);
        };

        let cancel = CancelToken::new();
        let ticket = match self.nodes.get_mut(id).and_then(|n| n.load.as_mut()) {
            Some(slot) => {
                slot.ticket += 1;
                slot.cancel = Some(cancel.clone());
                slot.ticket
            }
            None => return Err(Error::UnknownNode),
        };
        debug!(node = ?id, urls = ?urls, "Load requested.");
        let submitted = loader.submit(LoadJob {
            node: id,
            ticket,
            urls,
            cancel,
        });
        if let Err(e) = submitted {
            self.reporter
                .error_report("Could not queue content load.", Some(&e));
            self.set_load_state(id, LoadState::Failed)?;
        }
        Ok(())
    }

    /// Cancels a running load; the node returns to [`LoadState::NotLoaded`].
    pub fn cancel_load(&mut self, id: NodeId) -> Result<()> {
        self.set_load_state(id, LoadState::NotLoaded)
    }

    /// Flags every in-flight load as cancelled. Affected nodes return to
    /// [`LoadState::NotLoaded`] when the next tick drains the loader.
    pub fn terminate_loads(&mut self) -> usize {
        self.loader
            .as_ref()
            .map(ContentLoader::terminate_current)
            .unwrap_or(0)
    }

    /// Loads queued or running on the pool.
    pub fn pending_loads(&self) -> usize {
        self.loader.as_ref().map(ContentLoader::in_flight).unwrap_or(0)
    }

    /// Blocks until the loader pool is idle or `timeout` elapses.
    pub fn wait_for_loads(&self, timeout: Duration) -> bool {
        self.loader
            .as_ref()
            .map(|l| l.wait_idle(timeout))
            .unwrap_or(true)
    }

    /// Raw content of a loaded node.
    pub fn content(&self, id: NodeId) -> Option<Arc<Content>> {
        self.nodes.get(id)?.load_slot()?.content().cloned()
    }

    /// Space holding the parsed content of an `Inline`-like node.
    pub fn inline_space(&self, id: NodeId) -> Option<SpaceId> {
        self.nodes.get(id)?.load_slot()?.space()
    }

    fn wants_auto_load(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let load_enabled = node
            .field_value_by_name("load")
            .ok()
            .and_then(FieldValue::as_bool)
            .unwrap_or(true);
        let has_url = node
            .node_type()
            .standard
            .url
            .is_some_and(|i| node.values[i].valid_count() > 0);
        self.loader.is_some() && load_enabled && has_url && node.load_state() == Some(LoadState::NotLoaded)
    }

    fn auto_load(&mut self, id: NodeId) {
        if self.wants_auto_load(id) {
            if let Err(e) = self.request_load(id) {
                self.reporter.warning_report("Automatic content load failed to start.", Some(&e));
            }
        }
    }

    fn url_changed(&mut self, id: NodeId) {
        let state = self.nodes.get(id).and_then(Node::load_state);
        if matches!(state, Some(LoadState::Loading | LoadState::Complete | LoadState::Failed)) {
            if let Err(e) = self.set_load_state(id, LoadState::NotLoaded) {
                self.reporter.warning_report("Could not reset load state.", Some(&e));
            }
        }
        self.auto_load(id);
    }

    fn load_toggled(&mut self, id: NodeId, index: usize) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let enabled = node.values[index].as_bool().unwrap_or(true);
        if enabled {
            self.auto_load(id);
        } else if node.load_state() != Some(LoadState::NotLoaded) {
            if let Err(e) = self.set_load_state(id, LoadState::NotLoaded) {
                self.reporter.warning_report("Could not unload content.", Some(&e));
            }
        }
    }

    /// Parses classic-encoding text into the main space. See [`crate::loader::load_str`].
    pub fn load_str(&mut self, text: &str) -> Result<Vec<NodeId>> {
        let space = self.main_space;
        let roots = crate::loader::load_str(self, space, text)?;
        info!(roots = roots.len(), nodes = self.nodes.len(), "Scene content loaded.");
        Ok(roots)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::assemble(NodeTypeRegistry::standard(), RuntimeConfig::default())
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes.len())
            .field("spaces", &self.spaces.len())
            .field("pending", &self.pending.len())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}
