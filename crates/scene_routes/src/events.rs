//! Scene events and sinks for observing a running scene.
//!
//! A [`crate::scene::Scene`] sends [`SceneEvent`]s synchronously to every registered
//! [`EventSink`]:
//! - [`SceneEvent::FieldChanged`] after each successful set outside of setup.
//! - [`SceneEvent::ContentStateChanged`] on every load-state transition except into
//!   [`LoadState::Complete`], which sends [`SceneEvent::ContentReady`] instead.
//! - [`SceneEvent::CascadeFinished`] once at the end of every tick.
use crossbeam_channel::Sender;

use crate::node::load::LoadState;
use crate::node::NodeId;

/// Describes events emitted by a scene.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A field was set after its node left setup.
    FieldChanged {
        node: NodeId,
        field: usize,
    },

    /// A loadable node changed load state, other than into [`LoadState::Complete`].
    ContentStateChanged {
        node: NodeId,
        /// Index of the node's `url` field.
        field: usize,
        state: LoadState,
    },

    /// Loaded content is now usable.
    ContentReady {
        node: NodeId,
        field: usize,
    },

    /// A tick reached its fixed point.
    CascadeFinished {
        time: f64,
        routes_fired: usize,
    },
}

/// A generic event sink that accepts [`SceneEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: SceneEvent);

    fn send_many<I>(&mut self, events: I)
    where
        Self: Sized,
        I: IntoIterator<Item = SceneEvent>,
    {
        for e in events {
            self.send(e);
        }
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: SceneEvent) {}
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    #[inline]
    fn send(&mut self, event: SceneEvent) {
        (**self).send(event);
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(SceneEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(SceneEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(SceneEvent),
{
    #[inline]
    fn send(&mut self, event: SceneEvent) {
        (self.f)(event);
    }
}

/// Event sink that forwards events into a channel, for observers living elsewhere.
pub struct ChannelSink {
    tx: Sender<SceneEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<SceneEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    #[inline]
    fn send(&mut self, event: SceneEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
