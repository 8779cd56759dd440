#![forbid(unsafe_code)]
//! Shared helpers for the example binaries.
use std::collections::HashSet;
use std::fmt::Write;

use scene_routes::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a `fmt` subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scene_routes=debug"));
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Renders the node graph below the roots of `space` as an indented outline.
pub fn outline(scene: &Scene, space: SpaceId) -> String {
    let mut out = String::new();
    let Some(sp) = scene.space(space) else {
        return out;
    };
    let mut seen = HashSet::new();
    for &root in sp.root_nodes() {
        outline_node(scene, root, 0, &mut seen, &mut out);
    }
    out
}

fn outline_node(
    scene: &Scene,
    id: NodeId,
    depth: usize,
    seen: &mut HashSet<NodeId>,
    out: &mut String,
) {
    let Some(node) = scene.node(id) else {
        let _ = writeln!(out, "{:indent$}<removed>", "", indent = depth * 2);
        return;
    };
    if !seen.insert(id) {
        let _ = writeln!(out, "{:indent$}USE {}", "", node.type_name(), indent = depth * 2);
        return;
    }
    let _ = writeln!(out, "{:indent$}{}", "", node.type_name(), indent = depth * 2);
    for &index in node.node_field_indices() {
        let Some(decl) = node.field_declaration(index) else {
            continue;
        };
        if !decl.access.is_readable() && decl.access != AccessMode::Field {
            continue;
        }
        let children = node.field_value(index).map(FieldValue::node_refs).unwrap_or_default();
        if children.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{:indent$}.{}", "", decl.name, indent = depth * 2 + 1);
        for child in children {
            outline_node(scene, child, depth + 1, seen, out);
        }
    }
}
