//! Nodes, node types and node behaviors.
//!
//! A [`NodeType`] bundles a frozen [`FieldTable`], the [`Capability`] set that installed its
//! standard fields, and a stateless [`NodeBehavior`]. Every [`Node`] instance shares its type
//! through an [`Arc`] and only owns its current values and change flags.
pub mod builtin;
pub mod load;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::field::{FieldDeclaration, FieldTable, FieldTableBuilder, FieldType, FieldValue};
use crate::node::load::{LoadSlot, LoadState};
use crate::space::SpaceId;

slotmap::new_key_type! {
    /// Handle of a node in a [`crate::scene::Scene`]'s node arena.
    pub struct NodeId;
}

/// Standard field groups a node type can be composed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// `metadata` SFNode.
    Metadata,
    /// `children` MFNode plus the `addChildren` / `removeChildren` inputs.
    Children,
    /// `enabled` and `isActive`; the type's behavior is ticked every frame.
    Sensor,
    /// `url` MFString; instances carry a load state.
    Loadable,
}

impl Capability {
    fn install(self, builder: FieldTableBuilder) -> FieldTableBuilder {
        match self {
            Capability::Metadata => {
                builder.exposed_field("metadata", FieldType::SFNode, FieldValue::Node(None))
            }
            Capability::Children => builder
                .exposed_field("children", FieldType::MFNode, FieldValue::nodes(Vec::new()))
                .event_in("addChildren", FieldType::MFNode)
                .event_in("removeChildren", FieldType::MFNode),
            Capability::Sensor => builder
                .exposed_field("enabled", FieldType::SFBool, true)
                .event_out("isActive", FieldType::SFBool),
            Capability::Loadable => builder.exposed_field(
                "url",
                FieldType::MFString,
                FieldValue::strings(Vec::<String>::new()),
            ),
        }
    }
}

/// How a [`Capability::Loadable`] type uses the content it fetches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Bytes kept on the node as they are, e.g. image data.
    #[default]
    Opaque,
    /// Text parsed as a scene into a child execution space.
    Scene,
}

/// Indices of capability-installed fields, resolved once per type.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StandardFields {
    pub(crate) children: Option<usize>,
    pub(crate) add_children: Option<usize>,
    pub(crate) remove_children: Option<usize>,
    pub(crate) enabled: Option<usize>,
    pub(crate) url: Option<usize>,
}

/// Type-specific logic attached to a node type.
///
/// Behaviors are shared by every instance of a type and hold no per-node state; anything
/// that must persist between calls lives in the node's own fields.
pub trait NodeBehavior: Send + Sync {
    /// Domain check run before a value is stored. `Err` carries the human-readable reason and
    /// leaves the stored value untouched.
    fn validate(
        &self,
        _index: usize,
        _declaration: &FieldDeclaration,
        _value: &FieldValue,
    ) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Called after a field was set outside of setup.
    fn field_changed(&self, _ctx: &mut NodeContext<'_>, _index: usize) {}

    /// Called once per tick for [`Capability::Sensor`] types while `enabled` is true.
    fn tick(&self, _ctx: &mut NodeContext<'_>) {}

    /// Called when the node leaves setup.
    fn setup_finished(&self, _ctx: &mut NodeContext<'_>) {}
}

/// Behavior of types that only store their values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passive;

impl NodeBehavior for Passive {}

/// View of one node handed to its [`NodeBehavior`].
pub struct NodeContext<'a> {
    id: NodeId,
    node_type: &'a NodeType,
    values: &'a mut [FieldValue],
    time: f64,
    outputs: Vec<usize>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        id: NodeId,
        node_type: &'a NodeType,
        values: &'a mut [FieldValue],
        time: f64,
    ) -> Self {
        Self {
            id,
            node_type,
            values,
            time,
            outputs: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Timestamp of the tick in progress, or of the last tick outside of one.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.node_type.table.index_of(name)
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    pub fn get_named(&self, name: &str) -> Option<&FieldValue> {
        self.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Writes one of the node's own fields from inside its behavior.
    ///
    /// Unlike external writes this may target event outputs. The change is marked and routed
    /// once the behavior returns.
    pub fn set_output(&mut self, index: usize, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let decl = self
            .node_type
            .table
            .declaration(index)
            .ok_or_else(|| self.node_type.no_such_field(index))?;
        decl.check_shape(&self.node_type.name, &value)?;
        self.values[index] = value;
        if !self.outputs.contains(&index) {
            self.outputs.push(index);
        }
        Ok(())
    }

    /// [`Self::set_output`] by field name.
    pub fn set_named(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::invalid_field(&self.node_type.name, name, "no such field"))?;
        self.set_output(index, value)
    }

    pub(crate) fn into_outputs(self) -> Vec<usize> {
        self.outputs
    }
}

/// Shared definition of a node type.
pub struct NodeType {
    name: String,
    table: FieldTable,
    capabilities: Vec<Capability>,
    content_kind: ContentKind,
    pub(crate) standard: StandardFields,
    behavior: Arc<dyn NodeBehavior>,
}

impl NodeType {
    pub fn builder(name: impl Into<String>) -> NodeTypeBuilder {
        NodeTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn content_kind(&self) -> ContentKind {
        self.content_kind
    }

    pub fn behavior(&self) -> &dyn NodeBehavior {
        self.behavior.as_ref()
    }

    pub(crate) fn no_such_field(&self, index: usize) -> Error {
        Error::invalid_field(
            &self.name,
            format!("#{index}"),
            format!("index out of range (type has {} fields)", self.table.num_fields()),
        )
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("fields", &self.table.num_fields())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Builder composing capabilities, own fields and a behavior into a [`NodeType`].
///
/// Capability fields come first, in [`Capability`] order, followed by the type's own fields
/// in the order they were declared.
pub struct NodeTypeBuilder {
    name: String,
    capabilities: Vec<Capability>,
    content_kind: ContentKind,
    fields: Vec<FieldDeclaration>,
    behavior: Option<Arc<dyn NodeBehavior>>,
}

impl NodeTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            content_kind: ContentKind::Opaque,
            fields: Vec::new(),
            behavior: None,
        }
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Implies [`Capability::Loadable`].
    pub fn content_kind(mut self, kind: ContentKind) -> Self {
        self.content_kind = kind;
        self.capability(Capability::Loadable)
    }

    pub fn declare(mut self, declaration: FieldDeclaration) -> Self {
        self.fields.push(declaration);
        self
    }

    pub fn field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<FieldValue>,
    ) -> Self {
        self.declare(FieldDeclaration::new(
            crate::field::AccessMode::Field,
            field_type,
            name,
            default,
        ))
    }

    pub fn exposed_field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<FieldValue>,
    ) -> Self {
        self.declare(FieldDeclaration::new(
            crate::field::AccessMode::ExposedField,
            field_type,
            name,
            default,
        ))
    }

    pub fn event_in(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.declare(FieldDeclaration::new(
            crate::field::AccessMode::EventIn,
            field_type,
            name,
            FieldValue::default_for(field_type),
        ))
    }

    pub fn event_out(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.declare(FieldDeclaration::new(
            crate::field::AccessMode::EventOut,
            field_type,
            name,
            FieldValue::default_for(field_type),
        ))
    }

    pub fn behavior<B>(mut self, behavior: B) -> Self
    where
        B: NodeBehavior + 'static,
    {
        self.behavior = Some(Arc::new(behavior));
        self
    }

    pub fn build(self) -> Result<NodeType> {
        let mut capabilities = self.capabilities;
        capabilities.sort();

        let mut builder = FieldTable::builder(&self.name);
        for cap in &capabilities {
            builder = cap.install(builder);
        }
        for decl in self.fields {
            builder = builder.declare(decl);
        }
        let table = builder.build()?;

        let standard = StandardFields {
            children: table.index_of("children").filter(|_| capabilities.contains(&Capability::Children)),
            add_children: table.index_of("addChildren").filter(|_| capabilities.contains(&Capability::Children)),
            remove_children: table
                .index_of("removeChildren")
                .filter(|_| capabilities.contains(&Capability::Children)),
            enabled: table.index_of("enabled").filter(|_| capabilities.contains(&Capability::Sensor)),
            url: table.index_of("url").filter(|_| capabilities.contains(&Capability::Loadable)),
        };

        Ok(NodeType {
            name: self.name,
            table,
            capabilities,
            content_kind: self.content_kind,
            standard,
            behavior: self.behavior.unwrap_or_else(|| Arc::new(Passive)),
        })
    }
}

/// One node instance.
#[derive(Debug)]
pub struct Node {
    node_type: Arc<NodeType>,
    pub(crate) values: Vec<FieldValue>,
    pub(crate) changed: Vec<bool>,
    pub(crate) in_setup: bool,
    pub(crate) space: SpaceId,
    pub(crate) load: Option<LoadSlot>,
}

impl Node {
    pub(crate) fn new(node_type: Arc<NodeType>, space: SpaceId) -> Self {
        let values = node_type.table.defaults();
        let changed = vec![false; values.len()];
        let load = node_type
            .has_capability(Capability::Loadable)
            .then(LoadSlot::default);
        Self {
            node_type,
            values,
            changed,
            in_setup: true,
            space,
            load,
        }
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.node_type
    }

    pub fn type_name(&self) -> &str {
        &self.node_type.name
    }

    #[inline]
    pub fn num_fields(&self) -> usize {
        self.node_type.table.num_fields()
    }

    #[inline]
    pub fn field_declaration(&self, index: usize) -> Option<&FieldDeclaration> {
        self.node_type.table.declaration(index)
    }

    #[inline]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.node_type.table.index_of(name)
    }

    #[inline]
    pub fn node_field_indices(&self) -> &[usize] {
        self.node_type.table.node_field_indices()
    }

    /// Current value of a field; [`Error::InvalidField`] when `index` is out of range.
    pub fn field_value(&self, index: usize) -> Result<&FieldValue> {
        self.values
            .get(index)
            .ok_or_else(|| self.node_type.no_such_field(index))
    }

    pub fn field_value_by_name(&self, name: &str) -> Result<&FieldValue> {
        let index = self
            .field_index(name)
            .ok_or_else(|| Error::invalid_field(self.type_name(), name, "no such field"))?;
        self.field_value(index)
    }

    /// Whether the field changed since the last [`Self::check_field_changed`] on it.
    pub fn has_field_changed(&self, index: usize) -> bool {
        self.changed.get(index).copied().unwrap_or(false)
    }

    /// Reads and clears the changed flag of a field.
    pub fn check_field_changed(&mut self, index: usize) -> bool {
        match self.changed.get_mut(index) {
            Some(flag) => std::mem::replace(flag, false),
            None => false,
        }
    }

    #[inline]
    pub fn is_in_setup(&self) -> bool {
        self.in_setup
    }

    /// Owning execution space.
    #[inline]
    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// Load state, for [`Capability::Loadable`] types only.
    pub fn load_state(&self) -> Option<LoadState> {
        self.load.as_ref().map(LoadSlot::state)
    }

    pub fn load_slot(&self) -> Option<&LoadSlot> {
        self.load.as_ref()
    }

    /// Node references held in all node-typed fields.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        self.node_field_indices()
            .iter()
            .flat_map(|&i| self.values[i].node_refs())
            .collect()
    }
}
