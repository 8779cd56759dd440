use std::sync::Arc;

use scene_routes::node::registry::NodeTypeRegistry;
use scene_routes::node::{NodeBehavior, NodeContext};
use scene_routes::prelude::*;
use scene_routes_examples::init_tracing;
use tracing::info;

/// Counts incoming `TRUE` events and reports the total.
struct Counter;

impl NodeBehavior for Counter {
    fn field_changed(&self, ctx: &mut NodeContext<'_>, index: usize) {
        if Some(index) != ctx.index_of("increment") {
            return;
        }
        if ctx.get(index).and_then(FieldValue::as_bool) != Some(true) {
            return;
        }
        let count = ctx.get_named("count").and_then(FieldValue::as_i32).unwrap_or(0);
        if let Err(e) = ctx.set_named("count_changed", count + 1) {
            tracing::warn!("Counter could not publish: {e}");
        }
        let _ = ctx.set_named("count", count + 1);
    }
}

/// Registers a node type of its own next to the built-in ones and routes into it.
fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut registry = NodeTypeRegistry::with_standard_types();
    registry.register(
        NodeType::builder("Counter")
            .event_in("increment", FieldType::SFBool)
            .field("count", FieldType::SFInt32, 0)
            .event_out("count_changed", FieldType::SFInt32)
            .behavior(Counter)
            .build()?,
    );

    let mut scene = Scene::with_registry(Arc::new(registry), RuntimeConfig::default())?;
    scene.load_str(
        "DEF Toggle BooleanToggle {}
         DEF Clicks Counter {}
         ROUTE Toggle.toggle_changed TO Clicks.increment",
    )?;
    let toggle = scene.named_node("Toggle").ok_or_else(|| anyhow::anyhow!("no Toggle"))?;
    let clicks = scene.named_node("Clicks").ok_or_else(|| anyhow::anyhow!("no Clicks"))?;

    for (i, time) in [0.0, 0.1, 0.2, 0.3].into_iter().enumerate() {
        scene.set_value_by_name(toggle, "set_boolean", true)?;
        scene.process_routes(time)?;
        info!(
            press = i + 1,
            toggle = %scene.field_value_by_name(toggle, "toggle")?,
            count = %scene.field_value_by_name(clicks, "count_changed")?,
            "Pressed."
        );
    }
    Ok(())
}
