//! Snapshot-based undo/redo.
//!
//! The history is a bounded list of [`HistoryState`]s with a pointer to the
//! entry matching the live document. A snapshot is pushed *after* each
//! mutating operation, so undo restores the entry before the pointer and
//! redo the one after it:
//!
//! ```text
//! entries:  [s0] [s1] [s2] [s3]
//!                      ^ pointer    undo -> s1, redo -> s3
//! ```
//!
//! Pushing while the pointer is not at the end discards the entries after
//! it. When the list is full the oldest entry is evicted and the pointer
//! stays on the last index.
//!
//! Snapshots hold [`PixelBuffer`](crate::PixelBuffer) clones, which share
//! storage copy-on-write with the live layers. Neither side can observe
//! the other's later mutations.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::layer::{Layer, LayerId};
use crate::logging::targets;

/// Default number of retained snapshots.
pub const DEFAULT_CAPACITY: usize = 50;

/// An immutable capture of the layer list and active layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryState {
    layers: Vec<Layer>,
    active: Option<LayerId>,
    label: &'static str,
}

impl HistoryState {
    pub(crate) fn new(layers: Vec<Layer>, active: Option<LayerId>) -> Self {
        Self {
            layers,
            active,
            label: "",
        }
    }

    /// Attach a human-readable description of the action that produced it.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Captured layers, bottom to top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Captured active layer.
    pub fn active(&self) -> Option<LayerId> {
        self.active
    }

    /// Description of the action, e.g. `"Apply filter"`.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Bounded undo/redo stack with a pointer.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryState>,
    pointer: Option<usize>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    /// Create an empty history holding at most `capacity` snapshots (at
    /// least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            pointer: None,
            capacity,
        }
    }

    /// Record a snapshot, discarding any redo entries.
    pub fn push(&mut self, state: HistoryState) {
        if let Some(pointer) = self.pointer {
            let discarded = self.entries.len() - (pointer + 1);
            if discarded > 0 {
                self.entries.truncate(pointer + 1);
                debug!(
                    target: targets::HISTORY,
                    discarded,
                    "discarded redo branch"
                );
            }
        }

        trace!(
            target: targets::HISTORY,
            label = state.label(),
            layers = state.layers().len(),
            "snapshot"
        );
        self.entries.push_back(state);

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            trace!(
                target: targets::HISTORY,
                capacity = self.capacity,
                "evicted oldest snapshot"
            );
        }
        self.pointer = Some(self.entries.len() - 1);
    }

    /// Step back. Returns the state to restore, or `None` at the start.
    pub fn undo(&mut self) -> Option<&HistoryState> {
        let pointer = self.pointer.filter(|&p| p > 0)? - 1;
        self.pointer = Some(pointer);
        debug!(target: targets::HISTORY, pointer, "undo");
        self.entries.get(pointer)
    }

    /// Step forward. Returns the state to restore, or `None` at the end.
    pub fn redo(&mut self) -> Option<&HistoryState> {
        let pointer = self.pointer.filter(|&p| p + 1 < self.entries.len())? + 1;
        self.pointer = Some(pointer);
        debug!(target: targets::HISTORY, pointer, "redo");
        self.entries.get(pointer)
    }

    /// Whether [`undo`](Self::undo) would do anything.
    pub fn can_undo(&self) -> bool {
        self.pointer.is_some_and(|p| p > 0)
    }

    /// Whether [`redo`](Self::redo) would do anything.
    pub fn can_redo(&self) -> bool {
        self.pointer.is_some_and(|p| p + 1 < self.entries.len())
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no snapshot has been taken yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry matching the live document.
    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    /// Maximum number of retained snapshots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The entry at `index`, oldest first.
    pub fn get(&self, index: usize) -> Option<&HistoryState> {
        self.entries.get(index)
    }

    /// The entry the pointer is on.
    pub fn current(&self) -> Option<&HistoryState> {
        self.pointer.and_then(|p| self.entries.get(p))
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pointer = None;
    }
}
