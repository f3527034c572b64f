//! Arbitrary triangulated polygon shapes.

use crate::{
    attributes::{AttributeOffsets, VertexAttribute, base_attributes},
    batchable::Batchable,
    color::PackedColor,
    items::Texture,
    region::Region2d,
    state::RenderState,
};
use polybatch_gpu::Primitive;
use std::sync::Arc;

/// A triangulated polygon mapped onto a texture region.
///
/// Vertices are x/y pairs in the region's pixel coordinate system; the UV
/// for each vertex is computed once at construction. Triangle indices refer
/// to the local vertex list. Regions are immutable and meant to be shared
/// between many [`Poly2d`] items via `Arc`.
#[derive(Debug, Clone)]
pub struct PolygonRegion {
    texture: Texture,
    vertices: Vec<f32>,
    texture_coords: Vec<f32>,
    triangles: Vec<u16>,
    width: f32,
    height: f32,
}

impl PolygonRegion {
    /// # Panics
    ///
    /// Panics when `vertices` is not a list of x/y pairs or a triangle index
    /// is out of range.
    pub fn new(texture: Texture, region: Region2d, vertices: Vec<f32>, triangles: Vec<u16>) -> Self {
        assert!(vertices.len() % 2 == 0, "polygon vertices must be x/y pairs");
        let vertex_count = vertices.len() / 2;
        assert!(
            triangles.iter().all(|&i| (i as usize) < vertex_count),
            "triangle index out of range"
        );

        let width = region.width_uv().abs() * texture.width as f32;
        let height = region.height_uv().abs() * texture.height as f32;

        let uv_width = region.width_uv();
        let uv_height = region.height_uv();
        let mut texture_coords = vec![0.0; vertices.len()];
        for i in (0..vertices.len()).step_by(2) {
            texture_coords[i] = region.u + uv_width * (vertices[i] / width);
            // Polygon space is y-up, UV space is y-down.
            texture_coords[i + 1] = region.v + uv_height * (1.0 - vertices[i + 1] / height);
        }

        Self {
            texture,
            vertices,
            texture_coords,
            triangles,
            width,
            height,
        }
    }

    pub fn texture(&self) -> Texture {
        self.texture
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn texture_coords(&self) -> &[f32] {
        &self.texture_coords
    }

    pub fn triangles(&self) -> &[u16] {
        &self.triangles
    }

    /// Region width in pixels.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Region height in pixels.
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn index_count(&self) -> usize {
        self.triangles.len()
    }
}

/// A polygon drawn in a 2D plane with color, position, scale, rotation, and
/// an origin offset. Width and height default to the polygon region's pixel
/// size; setting another size stretches the polygon proportionally.
#[derive(Debug, Clone)]
pub struct Poly2d {
    region: Option<Arc<PolygonRegion>>,
    num_vertices: usize,
    num_indices: usize,
    pub x: f32,
    pub y: f32,
    pub color: PackedColor,
    pub origin_x: f32,
    pub origin_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Counter-clockwise rotation about the origin, in degrees.
    pub rotation: f32,
    width: f32,
    height: f32,
    size_set: bool,
}

impl Poly2d {
    pub fn new() -> Self {
        Self {
            region: None,
            num_vertices: 0,
            num_indices: 0,
            x: 0.0,
            y: 0.0,
            color: PackedColor::WHITE,
            origin_x: 0.0,
            origin_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            width: 0.0,
            height: 0.0,
            size_set: false,
        }
    }

    /// Sets the polygon region.
    pub fn region(&mut self, region: Arc<PolygonRegion>) -> &mut Self {
        self.num_vertices = region.vertex_count();
        self.num_indices = region.index_count();
        self.region = Some(region);
        self
    }

    pub fn size(&mut self, width: f32, height: f32) -> &mut Self {
        self.width = width;
        self.height = height;
        self.size_set = true;
        self
    }

    pub fn position(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets the center point for rotation and scaling.
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

    pub fn color(&mut self, color: PackedColor) -> &mut Self {
        self.color = color;
        self
    }

    pub fn rgba(&mut self, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        self.color = PackedColor::from_rgba(r, g, b, a);
        self
    }
}

impl Default for Poly2d {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for Poly2d {
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
        remaining_indices: usize,
    ) -> bool {
        let mut needs_flush = false;
        if let Some(region) = &self.region {
            needs_flush = state.set_texture_unit(Some(region.texture().handle), 0);
        }
        needs_flush
            || remaining_vertices < self.num_vertices
            || remaining_indices < self.num_indices
    }

    fn apply_vertices(
        &self,
        vertices: &mut [f32],
        start: usize,
        offsets: &AttributeOffsets,
        stride: usize,
    ) -> usize {
        let Some(region) = &self.region else {
            return 0;
        };

        let (width, height) = if self.size_set {
            (self.width, self.height)
        } else {
            (region.width(), region.height())
        };

        let color = self.color.to_vertex_float();
        let mut ci = start + offsets.color0();
        for _ in 0..self.num_vertices {
            vertices[ci] = color;
            ci += stride;
        }

        let texture_coords = region.texture_coords();
        let mut tci = start + offsets.texture_coordinate(0);
        for uv in texture_coords.chunks_exact(2) {
            vertices[tci] = uv[0];
            vertices[tci + 1] = uv[1];
            tci += stride;
        }

        let world_origin_x = self.x + self.origin_x;
        let world_origin_y = self.y + self.origin_y;
        let sx = width / region.width();
        let sy = height / region.height();
        let (sin, cos) = self.rotation.to_radians().sin_cos();

        let region_vertices = region.vertices();
        let mut pi = start + offsets.position;
        for xy in region_vertices.chunks_exact(2) {
            let fx = (xy[0] * sx - self.origin_x) * self.scale_x;
            let fy = (xy[1] * sy - self.origin_y) * self.scale_y;
            vertices[pi] = cos * fx - sin * fy + world_origin_x;
            vertices[pi + 1] = sin * fx + cos * fy + world_origin_y;
            pi += stride;
        }

        self.num_vertices
    }

    fn apply_indices(&self, indices: &mut [u16], start: usize, first_vertex: u16) -> usize {
        let Some(region) = &self.region else {
            return 0;
        };
        for (slot, &index) in indices[start..].iter_mut().zip(region.triangles()) {
            *slot = index + first_vertex;
        }
        self.num_indices
    }

    fn refresh(&mut self) {
        // The region reference survives, in the interest of speed.
        self.x = 0.0;
        self.y = 0.0;
        self.origin_x = 0.0;
        self.origin_y = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.rotation = 0.0;
        self.color = PackedColor::WHITE;
        self.size_set = false;
    }

    fn reset(&mut self) {
        self.refresh();
        self.region = None;
        self.num_vertices = 0;
        self.num_indices = 0;
    }

    fn has_equivalent_textures(&self, other: &Self) -> bool {
        let handle = |poly: &Self| poly.region.as_ref().map(|r| r.texture().handle);
        handle(self) == handle(other)
    }
}
