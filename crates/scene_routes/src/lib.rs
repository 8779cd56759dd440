#![forbid(unsafe_code)]
//! scene_routes: scene-graph runtime core for VRML97 / X3D style content.
//!
//! Modules:
//! - field: typed field values, field types and per-node-type field tables
//! - node: node types, behaviors, the type registry and the built-in node set
//! - space, route: execution spaces holding root nodes, DEF names and routes
//! - scene: the owning runtime, the field protocol and event propagation
//! - loader: classic-encoding reader, background content loading and its cache
//! - events, report: observation of a running scene and diagnostics
//!
//! Nodes carry typed fields described by a per-type [`field::FieldTable`]. Routes connect an
//! output field of one node to an input field of another, and [`Scene::process_routes`]
//! propagates changes along them once per tick until nothing changes any more.
//!
//! ```
//! use scene_routes::prelude::*;
//!
//! # fn main() -> scene_routes::Result<()> {
//! let mut scene = Scene::new(RuntimeConfig::default())?;
//! scene.load_str(
//!     "DEF A MetadataString { value \"hello\" }
//!      DEF B MetadataString {}
//!      ROUTE A.value_changed TO B.set_value",
//! )?;
//! let (a, b) = (scene.named_node("A").unwrap(), scene.named_node("B").unwrap());
//!
//! scene.set_value_by_name(a, "value", FieldValue::strings(["changed"]))?;
//! scene.process_routes(0.0)?;
//! let value = scene.field_value_by_name(b, "value")?;
//! assert_eq!(value.as_string_slice(), Some(&["changed".to_owned()][..]));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod field;
pub mod loader;
pub mod node;
pub mod report;
pub mod route;
pub mod scene;
pub mod space;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use events::{EventSink, SceneEvent};
pub use field::{AccessMode, FieldKind, FieldType, FieldValue};
pub use node::load::LoadState;
pub use node::registry::NodeTypeRegistry;
pub use node::{Capability, Node, NodeBehavior, NodeContext, NodeId, NodeType};
pub use report::{ErrorReporter, TracingReporter};
pub use route::{Route, RouteSpec};
pub use scene::{CascadeHook, CascadeStats, HookContext, Scene};
pub use space::{ExecutionSpace, SpaceId, SpaceKind};

#[cfg(test)]
mod tests;

/// Common imports.
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::events::{ChannelSink, EventSink, FnSink, SceneEvent};
    pub use crate::field::{AccessMode, ArrayValue, FieldType, FieldValue};
    pub use crate::loader::{ContentProvider, FileProvider, MemoryProvider};
    pub use crate::node::load::LoadState;
    pub use crate::node::{NodeId, NodeType};
    pub use crate::report::{ErrorReporter, VecReporter};
    pub use crate::route::Route;
    pub use crate::scene::{CascadeStats, FnHook, HookContext, Scene};
    pub use crate::space::SpaceId;
}
