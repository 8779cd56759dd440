//! Load-state machine for nodes whose content comes from a URL.
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loader::content::{CancelToken, Content};
use crate::space::SpaceId;

/// Where a loadable node is in fetching its external content.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Complete,
    Failed,
}

impl LoadState {
    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// `Loading -> NotLoaded` is a cancelled load; `Complete | Failed -> NotLoaded` is a reset
    /// after the URL changed.
    pub fn can_transition(self, to: LoadState) -> bool {
        use LoadState::*;
        matches!(
            (self, to),
            (NotLoaded, Loading)
                | (Loading, Complete)
                | (Loading, Failed)
                | (Loading, NotLoaded)
                | (Complete, NotLoaded)
                | (Failed, NotLoaded)
        )
    }

    pub fn transition(self, to: LoadState) -> Result<LoadState> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(Error::InvalidLoadState { from: self, to })
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadState::NotLoaded => "not loaded",
            LoadState::Loading => "loading",
            LoadState::Complete => "complete",
            LoadState::Failed => "failed",
        })
    }
}

/// Per-node load bookkeeping, present only on loadable node types.
#[derive(Debug, Default)]
pub struct LoadSlot {
    pub(crate) state: LoadState,
    /// Bumped on every new request so late results of a superseded request are dropped.
    pub(crate) ticket: u64,
    pub(crate) cancel: Option<CancelToken>,
    pub(crate) content: Option<Arc<Content>>,
    /// Child space holding parsed inline content.
    pub(crate) space: Option<SpaceId>,
}

impl LoadSlot {
    #[inline]
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Loaded bytes, if the last load completed and the type keeps raw content.
    pub fn content(&self) -> Option<&Arc<Content>> {
        self.content.as_ref()
    }

    pub fn space(&self) -> Option<SpaceId> {
        self.space
    }
}
