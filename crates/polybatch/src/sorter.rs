//! Deferred draw-order optimization.
//!
//! [`BatchSorter`] collects [`SortableBatchable`] references over a frame and
//! hands them to a [`PolyBatch`] in an order that minimizes both flushes and
//! blending artifacts: opaque items first, grouped by texture equivalence,
//! then blended items sorted far to near from the current viewpoint.

use crate::{
    batchable::{Batchable, SortableBatchable},
    batch::PolyBatch,
};
use glam::Vec3;

/// Queues drawable references and replays them to an engine in optimized
/// order.
///
/// Opaque items join the first existing group whose lead item reports
/// equivalent textures, so grouping depends on insertion order when
/// equivalence is not transitive. Blended items are kept apart and depth
/// sorted at draw time.
pub struct BatchSorter<'a, T: SortableBatchable> {
    viewpoint: Vec3,
    opaque_groups: Vec<Vec<&'a T>>,
    blended: Vec<&'a T>,
    blended_sorted: bool,
}

impl<'a, T: SortableBatchable> BatchSorter<'a, T> {
    pub fn new() -> Self {
        Self::with_viewpoint(Vec3::ZERO)
    }

    pub fn with_viewpoint(viewpoint: Vec3) -> Self {
        Self {
            viewpoint,
            opaque_groups: Vec::new(),
            blended: Vec::new(),
            blended_sorted: false,
        }
    }

    /// Set the viewpoint used for depth sorting blended items. Typically the
    /// camera position, updated once per frame before drawing.
    pub fn set_viewpoint(&mut self, viewpoint: Vec3) {
        self.viewpoint = viewpoint;
        self.blended_sorted = false;
    }

    /// Queue an item. The reference is held until [`clear`](Self::clear) or
    /// [`flush`](Self::flush).
    pub fn add(&mut self, item: &'a T) {
        if item.is_opaque() {
            for group in &mut self.opaque_groups {
                if group[0].has_equivalent_textures(item) {
                    group.push(item);
                    return;
                }
            }
            self.opaque_groups.push(vec![item]);
        } else {
            self.blended.push(item);
            self.blended_sorted = false;
        }
    }

    /// Draw all queued items to the engine without clearing the queue, so
    /// the same set can be drawn again.
    pub fn draw<S: Batchable>(&mut self, batch: &mut PolyBatch<S>) {
        if !self.blended_sorted {
            let viewpoint = self.viewpoint;
            self.blended.sort_by(|a, b| {
                b.distance_squared(viewpoint)
                    .total_cmp(&a.distance_squared(viewpoint))
            });
            self.blended_sorted = true;
        }
        for group in &self.opaque_groups {
            for item in group {
                batch.draw(*item);
            }
        }
        for item in &self.blended {
            batch.draw(*item);
        }
    }

    /// Draw all queued items and clear the queue.
    pub fn flush<S: Batchable>(&mut self, batch: &mut PolyBatch<S>) {
        self.draw(batch);
        self.clear();
    }

    /// Drop all queued references without drawing.
    pub fn clear(&mut self) {
        self.opaque_groups.clear();
        self.blended.clear();
        self.blended_sorted = false;
    }

    pub fn is_empty(&self) -> bool {
        self.opaque_groups.is_empty() && self.blended.is_empty()
    }
}

impl<T: SortableBatchable> Default for BatchSorter<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
