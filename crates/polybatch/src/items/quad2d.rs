//! The 2D sprite shape.

use crate::{
    attributes::{AttributeOffsets, VertexAttribute, base_attributes},
    batchable::{Batchable, FixedSizeBatchable, FixedTopology},
    color::PackedColor,
    items::{Texture, quad_index_pattern, write_quad_color_and_uvs},
    region::Region2d,
    state::RenderState,
};
use polybatch_gpu::Primitive;

/// A textured rectangle drawn in a 2D plane, commonly called a sprite.
///
/// The origin is relative to the bottom left corner of the texture region. It
/// is used for positioning, and as the center of rotation and scaling. Width
/// and height default to the texture region's pixel size unless set with
/// [`size`](Self::size).
#[derive(Debug, Clone)]
pub struct Quad2d {
    texture: Option<Texture>,
    pub(crate) region: Region2d,
    pub x: f32,
    pub y: f32,
    pub color: PackedColor,
    pub origin_x: f32,
    pub origin_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Counter-clockwise rotation about the origin, in degrees.
    pub rotation: f32,
    /// The number of times the texture coordinates are rotated clockwise by
    /// 90 degrees.
    pub coordinates_rotation: u32,
    width: f32,
    height: f32,
    size_set: bool,
}

impl Quad2d {
    pub fn new() -> Self {
        Self {
            texture: None,
            region: Region2d::full(),
            x: 0.0,
            y: 0.0,
            color: PackedColor::WHITE,
            origin_x: 0.0,
            origin_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            coordinates_rotation: 0,
            width: 0.0,
            height: 0.0,
            size_set: false,
        }
    }

    /// Sets the texture and resets the region to the full texture.
    pub fn texture(&mut self, texture: Texture) -> &mut Self {
        self.texture = Some(texture);
        self.region.set_full();
        self
    }

    /// Sets the UV region of the texture. V increases downward.
    pub fn region(&mut self, u: f32, v: f32, u2: f32, v2: f32) -> &mut Self {
        self.region.set(u, v, u2, v2);
        self
    }

    /// Sets the UV region in texel units of the current texture. Width and
    /// height may be negative to flip the region in place. Must be called
    /// after a texture has been set.
    pub fn region_texels(&mut self, x: i32, y: i32, width: i32, height: i32) -> &mut Self {
        if let Some(texture) = self.texture {
            self.region = Region2d::from_texels(x, y, width, height, texture.width, texture.height);
        }
        self
    }

    /// Flips the UV region from its current state.
    pub fn flip(&mut self, flip_x: bool, flip_y: bool) -> &mut Self {
        self.region.flip(flip_x, flip_y);
        self
    }

    pub fn size(&mut self, width: f32, height: f32) -> &mut Self {
        self.width = width;
        self.height = height;
        self.size_set = true;
        self
    }

    /// Sets the position of the bottom left of the texture region in world
    /// space.
    pub fn position(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets the center point for rotation and scaling, relative to the bottom
    /// left corner.
    pub fn origin(&mut self, origin_x: f32, origin_y: f32) -> &mut Self {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
        self
    }

    pub fn scale(&mut self, scale_x: f32, scale_y: f32) -> &mut Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Sets the counter-clockwise rotation about the origin, in degrees.
    pub fn rotation_degrees(&mut self, degrees: f32) -> &mut Self {
        self.rotation = degrees;
        self
    }

    /// Rotates the texture region 90 degrees in place by rotating the texture
    /// coordinates.
    pub fn rotate_coordinates_90(&mut self, clockwise: bool) -> &mut Self {
        self.coordinates_rotation += if clockwise { 1 } else { 3 };
        self
    }

    pub fn color(&mut self, color: PackedColor) -> &mut Self {
        self.color = color;
        self
    }

    pub fn rgba(&mut self, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        self.color = PackedColor::from_rgba(r, g, b, a);
        self
    }

    // Region-sized default unless size() was called.
    fn effective_size(&self) -> (f32, f32) {
        if self.size_set {
            return (self.width, self.height);
        }
        match self.texture {
            Some(texture) => (
                self.region.width_uv() * texture.width as f32,
                self.region.height_uv() * texture.height as f32,
            ),
            None => (0.0, 0.0),
        }
    }
}

impl Default for Quad2d {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for Quad2d {
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>) {
        attributes.extend(base_attributes(1, false, false));
    }

    fn texture_count(&self) -> usize {
        1
    }

    fn primitive(&self) -> Primitive {
        Primitive::Triangles
    }

    fn prepare_shared_state(&self, state: &mut RenderState) {
        state.set_depth_mask(false);
    }

    fn prepare_state(
        &self,
        state: &mut RenderState,
        remaining_vertices: usize,
        _remaining_indices: usize,
    ) -> bool {
        let mut needs_flush = false;
        if let Some(texture) = self.texture {
            needs_flush |= state.set_texture_unit(Some(texture.handle), 0);
        }
        needs_flush || remaining_vertices < 4
    }

    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        stride: usize,
    ) -> usize {
        write_quad_color_and_uvs(
            vertices,
            start,
            offsets,
            stride,
            self.color.to_vertex_float(),
            &self.region,
            self.coordinates_rotation,
        );

        let (width, height) = self.effective_size();

        // Corner points relative to the origin.
        let world_origin_x = self.x + self.origin_x;
        let world_origin_y = self.y + self.origin_y;
        let mut fx = -self.origin_x;
        let mut fy = -self.origin_y;
        let mut fx2 = width - self.origin_x;
        let mut fy2 = height - self.origin_y;

        if self.scale_x != 1.0 || self.scale_y != 1.0 {
            fx *= self.scale_x;
            fy *= self.scale_y;
            fx2 *= self.scale_x;
            fy2 *= self.scale_y;
        }

        let (x1, y1, x2, y2, x3, y3, x4, y4);
        if self.rotation != 0.0 {
            let (sin, cos) = self.rotation.to_radians().sin_cos();
            x1 = cos * fx - sin * fy;
            y1 = sin * fx + cos * fy;
            x2 = cos * fx - sin * fy2;
            y2 = sin * fx + cos * fy2;
            x3 = cos * fx2 - sin * fy2;
            y3 = sin * fx2 + cos * fy2;
            // The fourth corner closes the parallelogram.
            x4 = x1 + (x3 - x2);
            y4 = y3 - (y2 - y1);
        } else {
            x1 = fx;
            y1 = fy;
            x2 = fx;
            y2 = fy2;
            x3 = fx2;
            y3 = fy2;
            x4 = fx2;
            y4 = fy;
        }

        let mut i = start + offsets.position;
        vertices[i] = x1 + world_origin_x;
        vertices[i + 1] = y1 + world_origin_y;
        i += stride;
        vertices[i] = x2 + world_origin_x;
        vertices[i + 1] = y2 + world_origin_y;
        i += stride;
        vertices[i] = x3 + world_origin_x;
        vertices[i + 1] = y3 + world_origin_y;
        i += stride;
        vertices[i] = x4 + world_origin_x;
        vertices[i + 1] = y4 + world_origin_y;

        4
    }

    fn refresh(&mut self) {
        // Texture and region survive, in the interest of speed.
        self.x = 0.0;
        self.y = 0.0;
        self.origin_x = 0.0;
        self.origin_y = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.rotation = 0.0;
        self.coordinates_rotation = 0;
        self.color = PackedColor::WHITE;
        self.size_set = false;
    }

    fn reset(&mut self) {
        self.refresh();
        self.texture = None;
        self.region.set_full();
    }

    fn has_equivalent_textures(&self, other: &Self) -> bool {
        self.texture.map(|t| t.handle) == other.texture.map(|t| t.handle)
    }

    fn fixed_topology(&self) -> Option<FixedTopology> {
        Some(FixedTopology::of::<Self>())
    }
}

impl FixedSizeBatchable for Quad2d {
    const VERTICES_PER_ITEM: usize = 4;
    const PRIMITIVES_PER_ITEM: usize = 2;

    fn populate_index_pattern(indices: &mut [u16]) {
        quad_index_pattern(indices);
    }
}

/// A sprite sampled from one layer of a texture array.
///
/// Declares three-component texture coordinates; the region's array layer is
/// written into the third component of every vertex. Sprite parameters live
/// on the embedded [`Quad2d`].
#[derive(Debug, Clone)]
pub struct Quad2dArray {
    pub quad: Quad2d,
}

impl Quad2dArray {
    pub fn new() -> Self {
        Self {
            quad: Quad2d::new(),
        }
    }

    /// Sets the texture array layer to sample.
    pub fn layer(&mut self, layer: u32) -> &mut Self {
        self.quad.region.layer = layer;
        self
    }
}

impl Default for Quad2dArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for Quad2dArray {
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>) {
        attributes.extend(base_attributes(1, false, true));
    }

    fn texture_count(&self) -> usize {
        1
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
        self.quad
            .prepare_state(state, remaining_vertices, remaining_indices)
    }

    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        stride: usize,
    ) -> usize {
        let written = self.quad.apply_vertices(vertices, start, offsets, stride);

        let layer = self.quad.region.layer as f32;
        let mut i = start + offsets.texture_coordinate(0) + 2;
        for _ in 0..written {
            vertices[i] = layer;
            i += stride;
        }
        written
    }

    fn refresh(&mut self) {
        // The layer survives alongside the texture and region.
        self.quad.refresh();
    }

    fn reset(&mut self) {
        self.quad.reset();
    }

    fn has_equivalent_textures(&self, other: &Self) -> bool {
        self.quad.has_equivalent_textures(&other.quad)
    }

    fn fixed_topology(&self) -> Option<FixedTopology> {
        Some(FixedTopology::of::<Self>())
    }
}

impl FixedSizeBatchable for Quad2dArray {
    const VERTICES_PER_ITEM: usize = 4;
    const PRIMITIVES_PER_ITEM: usize = 2;

    fn populate_index_pattern(indices: &mut [u16]) {
        quad_index_pattern(indices);
    }
}
