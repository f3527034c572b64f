//! The drawable item contract.
//!
//! A [`Batchable`] is an object that can be drawn by a
//! [`PolyBatch`](crate::PolyBatch). It also serves as the template the engine
//! uses to set itself up: the template instance supplies the vertex layout,
//! primitive topology, and texture count shared by every instance of its
//! type.

use crate::{attributes::AttributeOffsets, attributes::VertexAttribute, state::RenderState};
use ahash::AHashMap;
use glam::Vec3;
use polybatch_gpu::Primitive;
use std::any::TypeId;

/// An item a [`PolyBatch`](crate::PolyBatch) can draw.
///
/// All instances of one concrete type must declare the same vertex
/// attributes, texture count, and primitive topology; the engine computes
/// them once from its template instance.
pub trait Batchable: 'static {
    /// Populate the vertex attributes used by this type. Called once, on the
    /// engine's template instance.
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>);

    /// The number of simultaneous textures drawn. Determines how many sampler
    /// uniforms the engine assigns. Must always return the same value.
    fn texture_count(&self) -> usize;

    /// The primitive topology. Must always return the same value.
    fn primitive(&self) -> Primitive;

    /// Push state changes shared by every instance of this type, regardless
    /// of per-instance parameters. Called on the template instance when a
    /// session begins. Must not call `begin`, `end`, or `apply_changes` on
    /// the state.
    fn prepare_shared_state(&self, state: &mut RenderState) {
        let _ = state;
    }

    /// Set pending state and texture bindings for this instance, and report
    /// whether the engine must flush before this item's geometry is queued.
    /// That is the case when a pending value changed or when remaining
    /// capacity is insufficient.
    ///
    /// `remaining_indices` is undefined for fixed-topology items and must not
    /// be checked by them.
    fn prepare_state(
        &self,
        state: &mut RenderState,
        remaining_vertices: usize,
        remaining_indices: usize,
    ) -> bool;

    /// Write this item's vertex data at `start` (a float offset) and return
    /// the number of vertices written.
    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        stride: usize,
    ) -> usize;

    /// Write this item's index values at `start`, offsetting each by
    /// `first_vertex`, and return the number of indices written. Never called
    /// for items that declare a [`fixed_topology`](Self::fixed_topology) or
    /// draw unindexed primitives.
    fn apply_indices(&self, indices: &mut [u16], start: usize, first_vertex: u16) -> usize {
        let _ = (indices, start, first_vertex);
        0
    }

    /// Reset drawing parameters for reuse with a new image. Texture
    /// references are kept, in the interest of speed.
    fn refresh(&mut self);

    /// Full reset, including dropping texture references.
    fn reset(&mut self);

    /// Loose batching-equivalence test used by the opaque grouping heuristic:
    /// whether this item's textures match `other`'s closely enough to share a
    /// flush. Not required to be transitive.
    fn has_equivalent_textures(&self, other: &Self) -> bool
    where
        Self: Sized;

    /// Constant per-instance topology, for types whose vertex and primitive
    /// counts never vary. Declaring this lets the engine precompute index
    /// patterns instead of calling [`apply_indices`](Self::apply_indices) per
    /// item. Must return the same value for every instance, or indices
    /// silently corrupt.
    fn fixed_topology(&self) -> Option<FixedTopology> {
        None
    }
}

/// A [`Batchable`] whose vertex and primitive counts are the same for every
/// instance, described by constants so the engine can generate all index data
/// up front.
pub trait FixedSizeBatchable: Batchable {
    const VERTICES_PER_ITEM: usize;
    const PRIMITIVES_PER_ITEM: usize;

    /// Fill `indices` with the index pattern for one item, using local vertex
    /// numbers `0..VERTICES_PER_ITEM`. The slice length is
    /// `PRIMITIVES_PER_ITEM` times the primitive's indices-per-primitive.
    fn populate_index_pattern(indices: &mut [u16]);
}

/// Constant topology descriptor derived from a [`FixedSizeBatchable`].
#[derive(Clone, Copy)]
pub struct FixedTopology {
    pub vertices_per_item: usize,
    pub primitives_per_item: usize,
    /// Writes the single-item index pattern in local vertex numbers.
    pub populate_pattern: fn(&mut [u16]),
}

impl FixedTopology {
    pub fn of<T: FixedSizeBatchable>() -> Self {
        Self {
            vertices_per_item: T::VERTICES_PER_ITEM,
            primitives_per_item: T::PRIMITIVES_PER_ITEM,
            populate_pattern: T::populate_index_pattern,
        }
    }

    /// Index count per item for the given topology.
    pub fn indices_per_item(&self, primitive: Primitive) -> usize {
        self.primitives_per_item * primitive.indices_per_primitive()
    }
}

impl std::fmt::Debug for FixedTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedTopology")
            .field("vertices_per_item", &self.vertices_per_item)
            .field("primitives_per_item", &self.primitives_per_item)
            .finish()
    }
}

/// A [`Batchable`] that can be ordered by a
/// [`BatchSorter`](crate::BatchSorter).
pub trait SortableBatchable: Batchable {
    /// Opaque items are grouped by texture equivalence and drawn first;
    /// non-opaque items are depth sorted and drawn after.
    fn is_opaque(&self) -> bool;

    /// Squared distance from the viewpoint, used for back-to-front ordering
    /// of blended items.
    fn distance_squared(&self, viewpoint: Vec3) -> f32;
}

/// Memoized single-item index patterns, keyed by concrete item type. Owned by
/// the engine instance; populated the first time each type is drawn.
#[derive(Debug, Default)]
pub struct IndexPatternCache {
    patterns: AHashMap<TypeId, Box<[u16]>>,
}

impl IndexPatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached pattern for item type `T`, generating it on first use.
    pub fn pattern_for<T: Batchable>(
        &mut self,
        topology: &FixedTopology,
        primitive: Primitive,
    ) -> &[u16] {
        self.patterns.entry(TypeId::of::<T>()).or_insert_with(|| {
            let mut pattern = vec![0u16; topology.indices_per_item(primitive)].into_boxed_slice();
            (topology.populate_pattern)(&mut pattern);
            pattern
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Quad2d;

    #[test]
    fn quad_topology_descriptor() {
        let topology = FixedTopology::of::<Quad2d>();
        assert_eq!(topology.vertices_per_item, 4);
        assert_eq!(topology.primitives_per_item, 2);
        assert_eq!(topology.indices_per_item(Primitive::Triangles), 6);
    }

    #[test]
    fn cache_generates_pattern_once_per_type() {
        let mut cache = IndexPatternCache::new();
        let topology = FixedTopology::of::<Quad2d>();

        let pattern = cache.pattern_for::<Quad2d>(&topology, Primitive::Triangles).to_vec();
        assert_eq!(pattern, vec![0, 2, 1, 0, 3, 2]);

        // Second lookup returns the memoized pattern.
        let again = cache.pattern_for::<Quad2d>(&topology, Primitive::Triangles);
        assert_eq!(again, &pattern[..]);
    }
}
