//! The lit 3D decal shape.

use crate::{
    attributes::{AttributeOffsets, AttributeUsage, VertexAttribute},
    batchable::{Batchable, FixedSizeBatchable, FixedTopology, SortableBatchable},
    items::{Quad3d, Texture, quad_index_pattern},
    state::RenderState,
};
use glam::Vec3;
use polybatch_gpu::Primitive;

/// A [`Quad3d`] with support for lighting through normal, tangent, and
/// binormal vertex attributes, plus normal and specular map samplers.
///
/// The tangent space is the quad's local frame carried through its rotation:
/// the normal faces +Z, the tangent +X, and the binormal +Y before rotation.
/// All three maps share the quad's texture coordinates; the diffuse map binds
/// to unit 0, the normal map to unit 1, and the specular map to unit 2.
///
/// Decal parameters live on the embedded [`Quad3d`].
#[derive(Debug, Clone)]
pub struct LitQuad3d {
    pub quad: Quad3d,
    normal_map: Option<Texture>,
    specular_map: Option<Texture>,
}

impl LitQuad3d {
    /// A lit decal that starts opaque.
    pub fn new() -> Self {
        Self {
            quad: Quad3d::new(),
            normal_map: None,
            specular_map: None,
        }
    }

    /// Sets the normal map, bound to texture unit 1.
    pub fn normal_map(&mut self, texture: Texture) -> &mut Self {
        self.normal_map = Some(texture);
        self
    }

    /// Sets the specular map, bound to texture unit 2.
    pub fn specular_map(&mut self, texture: Texture) -> &mut Self {
        self.specular_map = Some(texture);
        self
    }
}

impl Default for LitQuad3d {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for LitQuad3d {
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>) {
        self.quad.vertex_attributes(attributes);
        attributes.push(VertexAttribute::new(AttributeUsage::Normal, 3, "a_normal"));
        attributes.push(VertexAttribute::new(AttributeUsage::Tangent, 3, "a_tangent"));
        attributes.push(VertexAttribute::new(
            AttributeUsage::BiNormal,
            3,
            "a_binormal",
        ));
    }

    fn texture_count(&self) -> usize {
        3
    }

    fn primitive(&self) -> Primitive {
        Primitive::Triangles
    }

    fn prepare_shared_state(&self, state: &mut RenderState) {
        self.quad.prepare_shared_state(state);
    }

    fn prepare_state(
        &self,
        state: &mut RenderState,
        remaining_vertices: usize,
        remaining_indices: usize,
    ) -> bool {
        let mut needs_flush = self
            .quad
            .prepare_state(state, remaining_vertices, remaining_indices);
        if let Some(map) = self.normal_map {
            needs_flush |= state.set_texture_unit(Some(map.handle), 1);
        }
        if let Some(map) = self.specular_map {
            needs_flush |= state.set_texture_unit(Some(map.handle), 2);
        }
        needs_flush
    }

    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        stride: usize,
    ) -> usize {
        let written = self.quad.apply_vertices(vertices, start, offsets, stride);

        let normal = self.quad.rotation * Vec3::Z;
        let tangent = self.quad.rotation * Vec3::X;
        let binormal = self.quad.rotation * Vec3::Y;
        for (offset, vector) in [
            (offsets.normal, normal),
            (offsets.tangent, tangent),
            (offsets.binormal, binormal),
        ] {
            let mut i = start + offset;
            for _ in 0..written {
                vertices[i] = vector.x;
                vertices[i + 1] = vector.y;
                vertices[i + 2] = vector.z;
                i += stride;
            }
        }

        written
    }

    fn refresh(&mut self) {
        // The maps survive alongside the diffuse texture.
        self.quad.refresh();
    }

    fn reset(&mut self) {
        self.quad.reset();
        self.normal_map = None;
        self.specular_map = None;
    }

    fn has_equivalent_textures(&self, other: &Self) -> bool {
        let handle = |map: Option<Texture>| map.map(|t| t.handle);
        self.quad.has_equivalent_textures(&other.quad)
            && handle(self.normal_map) == handle(other.normal_map)
            && handle(self.specular_map) == handle(other.specular_map)
    }

    fn fixed_topology(&self) -> Option<FixedTopology> {
        Some(FixedTopology::of::<Self>())
    }
}

impl FixedSizeBatchable for LitQuad3d {
    const VERTICES_PER_ITEM: usize = 4;
    const PRIMITIVES_PER_ITEM: usize = 2;

    fn populate_index_pattern(indices: &mut [u16]) {
        quad_index_pattern(indices);
    }
}

impl SortableBatchable for LitQuad3d {
    fn is_opaque(&self) -> bool {
        self.quad.is_opaque()
    }

    fn distance_squared(&self, viewpoint: Vec3) -> f32 {
        self.quad.distance_squared(viewpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::VertexLayout;
    use polybatch_gpu::TextureHandle;

    fn offsets() -> AttributeOffsets {
        let mut attributes = Vec::new();
        LitQuad3d::new().vertex_attributes(&mut attributes);
        AttributeOffsets::new(VertexLayout::new(attributes))
    }

    fn tex(id: u64) -> Texture {
        Texture::new(TextureHandle(id), 8, 8)
    }

    #[test]
    fn layout_places_tangent_space_after_base_attributes() {
        let offs = offsets();
        // 3 position + 1 packed color + 2 texcoords, then three 3D vectors.
        assert_eq!(offs.layout().stride_floats(), 15);
        assert_eq!(offs.normal, 6);
        assert_eq!(offs.tangent, 9);
        assert_eq!(offs.binormal, 12);
    }

    #[test]
    fn identity_rotation_writes_axis_aligned_tangent_space() {
        let mut quad = LitQuad3d::new();
        quad.quad.size(2.0, 2.0);

        let offs = offsets();
        let mut vertices = vec![0.0; 60];
        let written = quad.apply_vertices(&mut vertices, 0, &offs, 15);
        assert_eq!(written, 4);

        for vertex in 0..4 {
            let base = vertex * 15;
            assert_eq!(&vertices[base + offs.normal..base + offs.normal + 3], &[0.0, 0.0, 1.0]);
            assert_eq!(&vertices[base + offs.tangent..base + offs.tangent + 3], &[1.0, 0.0, 0.0]);
            assert_eq!(
                &vertices[base + offs.binormal..base + offs.binormal + 3],
                &[0.0, 1.0, 0.0]
            );
        }
    }

    #[test]
    fn rotation_carries_the_tangent_space() {
        let mut quad = LitQuad3d::new();
        quad.quad.size(2.0, 2.0).rotate_x(std::f32::consts::FRAC_PI_2);

        let offs = offsets();
        let mut vertices = vec![0.0; 60];
        quad.apply_vertices(&mut vertices, 0, &offs, 15);

        // A quarter turn about X tips the normal from +Z to -Y and leaves the
        // tangent on +X.
        let normal = Vec3::new(
            vertices[offs.normal],
            vertices[offs.normal + 1],
            vertices[offs.normal + 2],
        );
        let tangent = Vec3::new(
            vertices[offs.tangent],
            vertices[offs.tangent + 1],
            vertices[offs.tangent + 2],
        );
        assert!(normal.abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), 1e-5));
        assert!(tangent.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn maps_bind_to_their_declared_units() {
        let mut state = RenderState::new();
        let mut quad = LitQuad3d::new();
        quad.normal_map(tex(2)).specular_map(tex(3));
        quad.quad.texture(tex(1));

        assert!(quad.prepare_state(&mut state, 100, 0));
        assert_eq!(state.texture_unit(0), Some(TextureHandle(1)));
        assert_eq!(state.texture_unit(1), Some(TextureHandle(2)));
        assert_eq!(state.texture_unit(2), Some(TextureHandle(3)));

        // Unchanged bindings on the second submission: no flush.
        assert!(!quad.prepare_state(&mut state, 100, 0));
    }

    #[test]
    fn reset_drops_the_maps() {
        let mut quad = LitQuad3d::new();
        quad.normal_map(tex(2)).specular_map(tex(3));

        let reference = LitQuad3d::new();
        assert!(!quad.has_equivalent_textures(&reference));

        quad.refresh();
        assert!(!quad.has_equivalent_textures(&reference));

        quad.reset();
        assert!(quad.has_equivalent_textures(&reference));
    }
}
