//! Event propagation: one tick of the runtime.
//!
//! A tick drains finished loads, ticks enabled sensors, then runs the cascade: a FIFO over
//! changed `(node, field)` pairs where every change fires the routes its owning space holds
//! for that source. A fired route reads the source's value at that moment and writes it into
//! the destination, which may queue further changes; the cascade ends at the fixed point.
//!
//! Each route fires at most once per cascade. A route reached a second time is skipped and
//! counted in [`CascadeStats::loops_broken`], which is what ends cycles. With fan-in, a
//! destination keeps the last value delivered to it, while routes leaving it that already
//! fired keep what they delivered first.
//!
//! Writes made by [`CascadeHook`]s start a second cascade with its own set of fired routes,
//! so a hook's output reaches every route of the field it wrote.
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::events::SceneEvent;
use crate::field::FieldValue;
use crate::loader::content::{Content, LoadOutcome};
use crate::node::load::LoadState;
use crate::node::{ContentKind, Node, NodeId};
use crate::route::Route;
use crate::scene::Scene;
use crate::space::SpaceKind;

/// Counters for one call to [`Scene::process_routes`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CascadeStats {
    /// Timestamp the tick ran at, after clamping.
    pub time: f64,
    pub routes_fired: usize,
    /// Route deliveries rejected by their destination.
    pub errors: usize,
    /// Routes skipped because they already fired this tick.
    pub loops_broken: usize,
    /// Load results applied at the start of the tick.
    pub loads_completed: usize,
    /// Whether `max_cascade_steps` cut the cascade short.
    pub truncated: bool,
}

/// Called once at the end of every tick, e.g. by a script engine.
///
/// Changes made through the context are propagated before the tick ends.
pub trait CascadeHook {
    fn cascade_finished(&mut self, ctx: &mut HookContext<'_>);
}

/// Closure adapter for [`CascadeHook`].
pub struct FnHook<F>(pub F)
where
    F: FnMut(&mut HookContext<'_>);

impl<F> FnHook<F>
where
    F: FnMut(&mut HookContext<'_>),
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> CascadeHook for FnHook<F>
where
    F: FnMut(&mut HookContext<'_>),
{
    fn cascade_finished(&mut self, ctx: &mut HookContext<'_>) {
        (self.0)(ctx)
    }
}

/// Scene access handed to a [`CascadeHook`].
pub struct HookContext<'a> {
    scene: &'a mut Scene,
    time: f64,
}

impl HookContext<'_> {
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.scene.node(id)
    }

    pub fn named_node(&self, name: &str) -> Option<NodeId> {
        self.scene.named_node(name)
    }

    pub fn field_index(&self, id: NodeId, name: &str) -> Result<usize> {
        self.scene.field_index(id, name)
    }

    pub fn field_value(&self, id: NodeId, index: usize) -> Result<&FieldValue> {
        self.scene.field_value(id, index)
    }

    pub fn set_value(&mut self, id: NodeId, index: usize, value: impl Into<FieldValue>) -> Result<()> {
        self.scene.set_value(id, index, value)
    }

    pub fn set_value_by_name(&mut self, id: NodeId, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.scene.set_value_by_name(id, name, value)
    }
}

impl Scene {
    /// Runs one tick at `time`.
    ///
    /// Fails only on a bad timestamp: non-finite, or earlier than the previous tick while
    /// `reject_time_regression` is set. Everything that goes wrong inside the tick is
    /// reported and counted instead. [`SceneEvent::CascadeFinished`] is sent exactly once.
    pub fn process_routes(&mut self, time: f64) -> Result<CascadeStats> {
        let time = self.advance_clock(time)?;
        let mut stats = CascadeStats {
            time,
            ..Default::default()
        };
        self.drain_loads(&mut stats);
        self.tick_sensors();
        self.cascade(&mut HashSet::new(), &mut stats);

        if !self.hooks.is_empty() {
            let mut hooks = std::mem::take(&mut self.hooks);
            for hook in hooks.iter_mut() {
                let mut ctx = HookContext {
                    scene: &mut *self,
                    time,
                };
                hook.cascade_finished(&mut ctx);
            }
            self.hooks = hooks;
            self.cascade(&mut HashSet::new(), &mut stats);
        }

        debug!(
            time,
            routes_fired = stats.routes_fired,
            errors = stats.errors,
            loops_broken = stats.loops_broken,
            "Cascade finished."
        );
        self.emit(SceneEvent::CascadeFinished {
            time,
            routes_fired: stats.routes_fired,
        });
        Ok(stats)
    }

    /// Changes waiting for the next cascade.
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    fn advance_clock(&mut self, requested: f64) -> Result<f64> {
        if !requested.is_finite() {
            return Err(Error::Other(format!("tick time {requested} is not finite")));
        }
        match self.time {
            Some(previous) if requested < previous => {
                if self.config.reject_time_regression {
                    return Err(Error::TimeRegression {
                        previous,
                        requested,
                    });
                }
                self.reporter.warning_report(
                    &format!("Tick time {requested} is before {previous}; clamped."),
                    None,
                );
                Ok(previous)
            }
            _ => {
                self.time = Some(requested);
                Ok(requested)
            }
        }
    }

    fn drain_loads(&mut self, stats: &mut CascadeStats) {
        let Some(loader) = self.loader.as_ref() else {
            return;
        };
        for done in loader.drain() {
            let current = self
                .nodes
                .get(done.node)
                .and_then(|n| n.load.as_ref())
                .map(|slot| (slot.ticket, slot.state));
            if current != Some((done.ticket, LoadState::Loading)) {
                debug!(node = ?done.node, "Dropping stale load result.");
                continue;
            }

            stats.loads_completed += 1;
            let applied = match done.outcome {
                LoadOutcome::Loaded(content) => self.apply_content(done.node, content),
                LoadOutcome::Failed(reason) => {
                    self.reporter
                        .warning_report(&format!("Content load failed: {reason}"), None);
                    self.set_load_state(done.node, LoadState::Failed)
                }
                LoadOutcome::Cancelled => self.set_load_state(done.node, LoadState::NotLoaded),
            };
            if let Err(e) = applied {
                self.reporter
                    .error_report("Could not apply a load result.", Some(&e));
            }
        }
    }

    fn apply_content(&mut self, id: NodeId, content: Arc<Content>) -> Result<()> {
        let node = self.nodes.get(id).ok_or(Error::UnknownNode)?;
        let parent = node.space;
        let kind = node.node_type().content_kind();
        let inline_space = match kind {
            ContentKind::Opaque => None,
            ContentKind::Scene => {
                let Some(text) = content.as_text() else {
                    let e = Error::Content(format!("'{}' is not UTF-8 text", content.url()));
                    self.reporter
                        .fatal_error_report("Inline content could not be read.", Some(&e));
                    return self.set_load_state(id, LoadState::Failed);
                };
                let space = self.create_owned_space(SpaceKind::Inline, parent, Some(id))?;
                if crate::loader::load_str(self, space, text).is_err() {
                    self.remove_space(space)?;
                    return self.set_load_state(id, LoadState::Failed);
                }
                Some(space)
            }
        };

        if let Some(slot) = self.nodes.get_mut(id).and_then(|n| n.load.as_mut()) {
            slot.content = Some(content);
            slot.space = inline_space;
        }
        self.set_load_state(id, LoadState::Complete)
    }

    fn tick_sensors(&mut self) {
        for id in self.sensors.clone() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if node.in_setup {
                continue;
            }
            let node_type = node.node_type().clone();
            let enabled = node_type
                .standard
                .enabled
                .and_then(|i| node.values[i].as_bool())
                .unwrap_or(true);
            if enabled {
                self.run_behavior(id, &node_type, |b, ctx| b.tick(ctx));
            }
        }
    }

    fn cascade(&mut self, fired: &mut HashSet<Route>, stats: &mut CascadeStats) {
        while let Some((node, field)) = self.pending.pop_front() {
            let Some(space) = self.nodes.get(node).map(|n| n.space) else {
                continue;
            };
            let routes = match self.spaces.get(space) {
                Some(sp) => sp.routes_from(node, field).to_vec(),
                None => continue,
            };
            for route in routes {
                if !fired.insert(route) {
                    trace!(?route, "Route already fired this tick.");
                    stats.loops_broken += 1;
                    continue;
                }
                if stats.routes_fired >= self.config.max_cascade_steps {
                    let text = format!(
                        "Cascade stopped after {} route firings; pending events dropped.",
                        stats.routes_fired
                    );
                    self.reporter.warning_report(&text, None);
                    stats.truncated = true;
                    self.pending.clear();
                    return;
                }
                stats.routes_fired += 1;
                if let Err(e) = self.send_route(&route) {
                    stats.errors += 1;
                    self.reporter
                        .error_report(&format!("Route {route:?} could not deliver."), Some(&e));
                }
            }
        }
    }

    /// Copies the source's current value into the destination through the regular
    /// validated setter.
    pub(crate) fn send_route(&mut self, route: &Route) -> Result<()> {
        let value = self.field_value(route.source, route.source_field)?.clone();
        trace!(?route, %value, "Route fired.");
        self.write_field(route.dest, route.dest_field, value)
    }
}
