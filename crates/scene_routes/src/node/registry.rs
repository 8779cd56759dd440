//! Registry of node types, keyed by type name.
//!
//! - Look up shared [`NodeType`] definitions with [`NodeTypeRegistry::get`].
//! - Register custom types next to the built-ins with [`NodeTypeRegistry::register`].
//! - Use [`NodeTypeRegistry::standard`] for the process-wide set of built-in types.
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::error::{Error, Result};
use crate::node::builtin;
use crate::node::NodeType;

/// Name-keyed set of node types. Every type is built once and shared by reference.
#[derive(Clone, Debug, Default)]
pub struct NodeTypeRegistry {
    types: HashMap<String, Arc<NodeType>>,
}

impl NodeTypeRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Shared registry holding the built-in types, built on first use.
    pub fn standard() -> Arc<NodeTypeRegistry> {
        static STANDARD: OnceLock<Arc<NodeTypeRegistry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| {
                let mut registry = NodeTypeRegistry::new();
                for ty in builtin::standard_types() {
                    registry.register(ty);
                }
                Arc::new(registry)
            })
            .clone()
    }

    /// A fresh registry seeded with the built-in types, for adding custom ones.
    pub fn with_standard_types() -> Self {
        NodeTypeRegistry::standard().as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registers a type under its own name, replacing any previous type of that name.
    pub fn register(&mut self, node_type: NodeType) -> Arc<NodeType> {
        let node_type = Arc::new(node_type);
        self.register_arc(node_type.clone());
        node_type
    }

    pub fn register_arc(&mut self, node_type: Arc<NodeType>) {
        if let Some(prev) = self.types.insert(node_type.name().to_owned(), node_type) {
            warn!("Node type '{}' was registered twice; keeping the newer one.", prev.name());
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.types.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<NodeType>> {
        self.types.get(name).cloned()
    }

    /// Like [`Self::get`], failing with [`Error::UnknownNodeType`].
    pub fn resolve(&self, name: &str) -> Result<Arc<NodeType>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownNodeType(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
