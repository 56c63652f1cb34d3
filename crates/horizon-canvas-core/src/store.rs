//! The ordered layer list and active-layer selection.
//!
//! Index 0 is the bottom of the stack. Every lookup is by [`LayerId`]; an
//! unknown id turns an operation into a no-op reported through its return
//! value, never an error.

use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::history::HistoryState;
use crate::layer::{Layer, LayerId, LayerUpdate};
use crate::logging::targets;

/// Direction for [`LayerStore::reorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    /// Swap with the predecessor, one step towards index 0.
    Up,
    /// Swap with the successor.
    Down,
}

/// Owns the layers of a document in z-order.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
    active: Option<LayerId>,
    next_id: u64,
}

impl LayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an opaque white layer and make it active.
    ///
    /// Zero dimensions are raised to one pixel.
    pub fn create_layer(&mut self, name: impl Into<String>, width: u32, height: u32) -> LayerId {
        let id = self.allocate_id();
        self.insert(Layer::new(id, name, width.max(1), height.max(1)))
    }

    /// Append a layer holding `buffer` and make it active.
    pub fn push_layer(&mut self, name: impl Into<String>, buffer: PixelBuffer) -> LayerId {
        let id = self.allocate_id();
        self.insert(Layer::with_buffer(id, name, buffer))
    }

    fn insert(&mut self, layer: Layer) -> LayerId {
        let id = layer.id();
        debug!(
            target: targets::STORE,
            id = id.id(),
            name = layer.name(),
            width = layer.size().0,
            height = layer.size().1,
            "created layer"
        );

        self.layers.push(layer);
        self.active = Some(id);
        id
    }

    fn allocate_id(&mut self) -> LayerId {
        self.next_id += 1;
        LayerId::new(self.next_id)
    }

    /// Remove a layer.
    ///
    /// If it was active, the bottom-most remaining layer becomes active.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let Some(index) = self.index_of(id) else {
            debug!(target: targets::STORE, id = id.id(), "delete: unknown layer");
            return false;
        };

        self.layers.remove(index);
        if self.active == Some(id) {
            self.active = self.layers.first().map(Layer::id);
        }

        debug!(
            target: targets::STORE,
            id = id.id(),
            remaining = self.layers.len(),
            "deleted layer"
        );
        true
    }

    /// Select the active layer.
    pub fn set_active(&mut self, id: LayerId) -> bool {
        if self.index_of(id).is_none() {
            debug!(target: targets::STORE, id = id.id(), "set_active: unknown layer");
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Apply a partial update of display properties.
    pub fn update_props(&mut self, id: LayerId, update: &LayerUpdate) -> bool {
        let Some(layer) = self.layer_mut(id) else {
            debug!(target: targets::STORE, id = id.id(), "update_props: unknown layer");
            return false;
        };
        layer.apply_update(update);
        true
    }

    /// Move a layer one step up or down the stack.
    ///
    /// Returns `false` for unknown ids and at the ends of the stack.
    pub fn reorder(&mut self, id: LayerId, direction: ReorderDirection) -> bool {
        let Some(index) = self.index_of(id) else {
            debug!(target: targets::STORE, id = id.id(), "reorder: unknown layer");
            return false;
        };

        let target = match direction {
            ReorderDirection::Up => index.checked_sub(1),
            ReorderDirection::Down => Some(index + 1).filter(|&i| i < self.layers.len()),
        };
        let Some(target) = target else {
            return false;
        };

        self.layers.swap(index, target);
        debug!(
            target: targets::STORE,
            id = id.id(),
            from = index,
            to = target,
            "reordered layer"
        );
        true
    }

    /// Install a new current buffer. Its size may differ from the old one.
    pub fn replace_buffer(&mut self, id: LayerId, buffer: PixelBuffer) -> bool {
        let Some(layer) = self.layer_mut(id) else {
            debug!(target: targets::STORE, id = id.id(), "replace_buffer: unknown layer");
            return false;
        };
        layer.set_current(buffer);
        true
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Look up a layer.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    pub(crate) fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }

    /// Position of a layer in the stack.
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }

    /// The active layer id.
    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    /// The active layer.
    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layer(id))
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the store holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Largest width and height over every layer's current buffer,
    /// visible or not. `None` when empty.
    pub fn extent(&self) -> Option<(u32, u32)> {
        self.layers
            .iter()
            .map(|layer| layer.current().dimensions())
            .reduce(|(w, h), (lw, lh)| (w.max(lw), h.max(lh)))
    }

    /// Capture the undoable state.
    pub fn capture(&self) -> HistoryState {
        HistoryState::new(self.layers.clone(), self.active)
    }

    /// Replace the undoable state with a captured one.
    ///
    /// The id counter is not part of the captured state and keeps counting.
    pub fn restore(&mut self, state: &HistoryState) {
        self.layers = state.layers().to_vec();
        self.active = state.active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> (LayerStore, Vec<LayerId>) {
        let mut store = LayerStore::new();
        let ids = (0..n)
            .map(|i| store.create_layer(format!("Layer {}", i + 1), 4, 4))
            .collect();
        (store, ids)
    }

    fn order(store: &LayerStore) -> Vec<LayerId> {
        store.layers().iter().map(Layer::id).collect()
    }

    #[test]
    fn test_create_appends_and_activates() {
        let (store, ids) = store_with(3);
        assert_eq!(order(&store), ids);
        assert_eq!(store.active_id(), Some(ids[2]));
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);
    }

    #[test]
    fn test_zero_size_is_raised() {
        let mut store = LayerStore::new();
        let id = store.create_layer("tiny", 0, 0);
        assert_eq!(store.layer(id).unwrap().size(), (1, 1));
    }

    #[test]
    fn test_delete_active_promotes_first() {
        let (mut store, ids) = store_with(3);
        assert!(store.delete_layer(ids[2]));
        assert_eq!(store.active_id(), Some(ids[0]));
        assert!(!store.delete_layer(ids[2]));
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let (mut store, ids) = store_with(3);
        store.delete_layer(ids[0]);
        assert_eq!(store.active_id(), Some(ids[2]));
    }

    #[test]
    fn test_delete_last_clears_active() {
        let (mut store, ids) = store_with(1);
        store.delete_layer(ids[0]);
        assert_eq!(store.active_id(), None);
        assert!(store.extent().is_none());
    }

    #[test]
    fn test_reorder_boundaries() {
        let (mut store, ids) = store_with(3);
        assert!(!store.reorder(ids[0], ReorderDirection::Up));
        assert!(!store.reorder(ids[2], ReorderDirection::Down));
        assert_eq!(order(&store), ids);

        assert!(store.reorder(ids[1], ReorderDirection::Up));
        assert_eq!(order(&store), vec![ids[1], ids[0], ids[2]]);
        assert!(store.reorder(ids[1], ReorderDirection::Down));
        assert_eq!(order(&store), ids);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (mut store, ids) = store_with(1);
        let mut other = LayerStore::new();
        other.create_layer("x", 1, 1);
        other.create_layer("y", 1, 1);
        let stranger = other.create_layer("z", 1, 1);

        assert!(!store.set_active(stranger));
        assert!(!store.update_props(stranger, &LayerUpdate::new().with_visible(false)));
        assert!(!store.reorder(stranger, ReorderDirection::Up));
        assert!(!store.replace_buffer(stranger, PixelBuffer::new(1, 1)));
        assert_eq!(store.active_id(), Some(ids[0]));
    }

    #[test]
    fn test_replace_buffer_changes_extent_not_size() {
        let (mut store, ids) = store_with(2);
        store.replace_buffer(ids[0], PixelBuffer::new(10, 2));
        assert_eq!(store.extent(), Some((10, 4)));
        assert_eq!(store.layer(ids[0]).unwrap().size(), (4, 4));
    }

    #[test]
    fn test_restore_keeps_id_counter() {
        let (mut store, _) = store_with(2);
        let state = store.capture();
        let third = store.create_layer("c", 1, 1);
        store.restore(&state);
        assert_eq!(store.len(), 2);
        let fourth = store.create_layer("d", 1, 1);
        assert!(fourth > third);
    }
}
