//! Point-primitive shapes, drawn as screen-space squares.

use crate::{
    attributes::{AttributeOffsets, AttributeUsage, VertexAttribute},
    batchable::{Batchable, SortableBatchable},
    color::PackedColor,
    items::Texture,
    state::{Blending, RenderState},
};
use glam::Vec3;
use polybatch_gpu::{BlendFactor, Primitive};

fn point_attributes(attributes: &mut Vec<VertexAttribute>, position_3d: bool) {
    attributes.push(VertexAttribute::new(
        AttributeUsage::Position,
        if position_3d { 3 } else { 2 },
        "a_position",
    ));
    attributes.push(VertexAttribute::new(AttributeUsage::ColorPacked, 4, "a_color"));
    attributes.push(VertexAttribute::new(AttributeUsage::Generic, 1, "a_size"));
}

/// A point drawn as a square after projection, centered on its position, in a
/// 2D plane. One vertex per item, no indices. The size travels in the
/// `a_size` generic attribute; the shader must turn it into a point size.
#[derive(Debug, Clone)]
pub struct Point2d {
    texture: Option<Texture>,
    pub x: f32,
    pub y: f32,
    pub color: PackedColor,
    pub size: f32,
}

impl Point2d {
    pub fn new() -> Self {
        Self {
            texture: None,
            x: 0.0,
            y: 0.0,
            color: PackedColor::WHITE,
            size: 1.0,
        }
    }

    pub fn texture(&mut self, texture: Texture) -> &mut Self {
        self.texture = Some(texture);
        self
    }

    pub fn position(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn size(&mut self, size: f32) -> &mut Self {
        self.size = size;
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
}

impl Default for Point2d {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for Point2d {
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>) {
        point_attributes(attributes, false);
    }

    fn texture_count(&self) -> usize {
        1
    }

    fn primitive(&self) -> Primitive {
        Primitive::Points
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
        needs_flush || remaining_vertices < 1
    }

    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        _stride: usize,
    ) -> usize {
        vertices[start + offsets.position] = self.x;
        vertices[start + offsets.position + 1] = self.y;
        vertices[start + offsets.color0()] = self.color.to_vertex_float();
        vertices[start + offsets.generic(0)] = self.size;
        1
    }

    fn refresh(&mut self) {
        // Texture survives, in the interest of speed.
        self.x = 0.0;
        self.y = 0.0;
        self.size = 1.0;
        self.color = PackedColor::WHITE;
    }

    fn reset(&mut self) {
        self.refresh();
        self.texture = None;
    }

    fn has_equivalent_textures(&self, other: &Self) -> bool {
        self.texture.map(|t| t.handle) == other.texture.map(|t| t.handle)
    }
}

/// A point drawn as a square after projection, centered on its position, in
/// 3D space. Manages its own blending like [`Quad3d`](crate::items::Quad3d)
/// and can be depth sorted with a [`BatchSorter`](crate::BatchSorter).
#[derive(Debug, Clone)]
pub struct Point3d {
    texture: Option<Texture>,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub color: PackedColor,
    pub size: f32,
    pub opaque: bool,
    pub src_blend_factor: BlendFactor,
    pub dst_blend_factor: BlendFactor,
}

impl Point3d {
    pub fn new() -> Self {
        Self {
            texture: None,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            color: PackedColor::WHITE,
            size: 1.0,
            opaque: true,
            src_blend_factor: BlendFactor::SrcAlpha,
            dst_blend_factor: BlendFactor::OneMinusSrcAlpha,
        }
    }

    pub fn texture(&mut self, texture: Texture) -> &mut Self {
        self.texture = Some(texture);
        self
    }

    pub fn position(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    pub fn size(&mut self, size: f32) -> &mut Self {
        self.size = size;
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

    /// Disables blending. Blending is disabled by default.
    pub fn opaque(&mut self) -> &mut Self {
        self.opaque = true;
        self
    }

    /// Enables blending with the current blend factors.
    pub fn blend(&mut self) -> &mut Self {
        self.opaque = false;
        self
    }

    /// Enables blending and sets the blend function factors.
    pub fn blend_function(&mut self, src: BlendFactor, dst: BlendFactor) -> &mut Self {
        self.opaque = false;
        self.src_blend_factor = src;
        self.dst_blend_factor = dst;
        self
    }

    /// Enables blending with a commonly used factor pair.
    pub fn blend_preset(&mut self, blending: Blending) -> &mut Self {
        let (src, dst) = blending.factors();
        self.blend_function(src, dst)
    }
}

impl Default for Point3d {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for Point3d {
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>) {
        point_attributes(attributes, true);
    }

    fn texture_count(&self) -> usize {
        1
    }

    fn primitive(&self) -> Primitive {
        Primitive::Points
    }

    fn prepare_shared_state(&self, state: &mut RenderState) {
        state.set_depth_mask(true);
        state.set_depth_test(true);
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
        needs_flush |= state.set_blending(!self.opaque);
        if !self.opaque {
            needs_flush |= state.set_blend_function(self.src_blend_factor, self.dst_blend_factor);
        }
        needs_flush || remaining_vertices < 1
    }

    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        _stride: usize,
    ) -> usize {
        vertices[start + offsets.position] = self.x;
        vertices[start + offsets.position + 1] = self.y;
        vertices[start + offsets.position + 2] = self.z;
        vertices[start + offsets.color0()] = self.color.to_vertex_float();
        vertices[start + offsets.generic(0)] = self.size;
        1
    }

    fn refresh(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.z = 0.0;
        self.size = 1.0;
        self.color = PackedColor::WHITE;
        // Refresh is most common for on-the-fly drawing, so default to the
        // mode that needs no sorting.
        self.opaque = true;
        self.src_blend_factor = BlendFactor::SrcAlpha;
        self.dst_blend_factor = BlendFactor::OneMinusSrcAlpha;
    }

    fn reset(&mut self) {
        self.refresh();
        self.texture = None;
    }

    fn has_equivalent_textures(&self, other: &Self) -> bool {
        self.texture.map(|t| t.handle) == other.texture.map(|t| t.handle)
    }
}

impl SortableBatchable for Point3d {
    fn is_opaque(&self) -> bool {
        self.opaque
    }

    fn distance_squared(&self, viewpoint: Vec3) -> f32 {
        viewpoint.distance_squared(Vec3::new(self.x, self.y, self.z))
    }
}
