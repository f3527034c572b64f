//! The 3D decal shape.

use crate::{
    attributes::{AttributeOffsets, VertexAttribute, base_attributes},
    batchable::{Batchable, FixedSizeBatchable, FixedTopology, SortableBatchable},
    color::PackedColor,
    items::{Texture, quad_index_pattern, write_quad_color_and_uvs},
    region::Region2d,
    state::{Blending, RenderState},
};
use glam::{Mat3, Quat, Vec3};
use polybatch_gpu::{BlendFactor, Primitive};

/// A textured rectangle drawn in 3D space, commonly called a decal.
///
/// The origin is relative to the center of the texture region and is in the
/// local coordinate system. A decal manages its own blending, so the engine's
/// blend function proxies are ineffective for it; blended decals are intended
/// to be depth sorted with a [`BatchSorter`](crate::BatchSorter).
#[derive(Debug, Clone)]
pub struct Quad3d {
    texture: Option<Texture>,
    region: Region2d,
    pub position: Vec3,
    pub rotation: Quat,
    pub color: PackedColor,
    pub origin_x: f32,
    pub origin_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// The number of times the texture coordinates are rotated clockwise by
    /// 90 degrees.
    pub coordinates_rotation: u32,
    pub opaque: bool,
    pub src_blend_factor: BlendFactor,
    pub dst_blend_factor: BlendFactor,
    width: f32,
    height: f32,
    size_set: bool,
}

impl Quad3d {
    /// A decal that starts opaque.
    pub fn new() -> Self {
        Self {
            texture: None,
            region: Region2d::full(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            color: PackedColor::WHITE,
            origin_x: 0.0,
            origin_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            coordinates_rotation: 0,
            opaque: true,
            src_blend_factor: BlendFactor::SrcAlpha,
            dst_blend_factor: BlendFactor::OneMinusSrcAlpha,
            width: 0.0,
            height: 0.0,
            size_set: false,
        }
    }

    /// A decal that starts with blending enabled, using a common factor pair.
    pub fn with_blending(blending: Blending) -> Self {
        let mut quad = Self::new();
        quad.blend_preset(blending);
        quad
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

    /// Sets the UV region in texel units of the current texture. Must be
    /// called after a texture has been set.
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

    /// Sets the center point for rotation and scaling, relative to the center
    /// of the texture region.
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

    /// Sets the position of the center (plus current origin offset) of the
    /// texture region in world space.
    pub fn position(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn translate(&mut self, amount: Vec3) -> &mut Self {
        self.position += amount;
        self
    }

    /// Sets the rotation to a specific quaternion.
    pub fn rotation(&mut self, rotation: Quat) -> &mut Self {
        self.rotation = rotation;
        self
    }

    /// Sets the rotation to an angle about an axis, in radians. The axis must
    /// be normalized.
    pub fn rotation_axis(&mut self, axis: Vec3, radians: f32) -> &mut Self {
        self.rotation = Quat::from_axis_angle(axis, radians);
        self
    }

    /// Sets the rotation to yaw, pitch and roll Euler angles, in radians.
    pub fn rotation_euler(&mut self, yaw: f32, pitch: f32, roll: f32) -> &mut Self {
        self.rotation = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, roll);
        self
    }

    /// Sets the rotation so the quad faces along `direction` with its top
    /// toward `up`. The inputs do not need to be normalized.
    pub fn rotation_direction(&mut self, direction: Vec3, up: Vec3) -> &mut Self {
        let direction = direction.normalize();
        let right = up.normalize().cross(direction).normalize();
        let up = direction.cross(right).normalize();
        self.rotation = Quat::from_mat3(&Mat3::from_cols(right, up, direction));
        self
    }

    /// Sets the rotation to look at the given position, relative to the
    /// current position.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) -> &mut Self {
        let direction = target - self.position;
        self.rotation_direction(direction, up)
    }

    /// Sets the rotation to face the camera, relative to the current
    /// position. The quad's top side is oriented to match the camera's up
    /// vector.
    pub fn billboard(&mut self, camera_position: Vec3, camera_up: Vec3) -> &mut Self {
        self.look_at(camera_position, camera_up)
    }

    /// Rotates the current orientation by a quaternion.
    pub fn rotate(&mut self, rotation: Quat) -> &mut Self {
        self.rotation *= rotation;
        self
    }

    /// Rotates from the current orientation about the X axis, in radians.
    pub fn rotate_x(&mut self, radians: f32) -> &mut Self {
        self.rotate(Quat::from_rotation_x(radians))
    }

    /// Rotates from the current orientation about the Y axis, in radians.
    pub fn rotate_y(&mut self, radians: f32) -> &mut Self {
        self.rotate(Quat::from_rotation_y(radians))
    }

    /// Rotates from the current orientation about the Z axis, in radians.
    pub fn rotate_z(&mut self, radians: f32) -> &mut Self {
        self.rotate(Quat::from_rotation_z(radians))
    }

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

impl Default for Quad3d {
    fn default() -> Self {
        Self::new()
    }
}

impl Batchable for Quad3d {
    fn vertex_attributes(&self, attributes: &mut Vec<VertexAttribute>) {
        attributes.extend(base_attributes(1, true, false));
    }

    fn texture_count(&self) -> usize {
        1
    }

    fn primitive(&self) -> Primitive {
        Primitive::Triangles
    }

    fn prepare_shared_state(&self, state: &mut RenderState) {
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
        let left = -width / 2.0;
        let right = left + width;
        let bottom = -height / 2.0;
        let top = bottom + height;

        // Bottom left, top left, top right, bottom right.
        let corners = [(left, bottom), (left, top), (right, top), (right, bottom)];
        let mut i = start + offsets.position;
        for (cx, cy) in corners {
            let local = Vec3::new(
                (cx - self.origin_x) * self.scale_x,
                (cy - self.origin_y) * self.scale_y,
                0.0,
            );
            let world = self.rotation * local + self.position;
            vertices[i] = world.x;
            vertices[i + 1] = world.y;
            vertices[i + 2] = world.z;
            i += stride;
        }

        4
    }

    fn refresh(&mut self) {
        self.position = Vec3::ZERO;
        self.rotation = Quat::IDENTITY;
        self.origin_x = 0.0;
        self.origin_y = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.coordinates_rotation = 0;
        self.color = PackedColor::WHITE;
        self.size_set = false;
        // Refresh is most common for on-the-fly drawing, so default to the
        // mode that needs no sorting.
        self.opaque = true;
        self.src_blend_factor = BlendFactor::SrcAlpha;
        self.dst_blend_factor = BlendFactor::OneMinusSrcAlpha;
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

impl FixedSizeBatchable for Quad3d {
    const VERTICES_PER_ITEM: usize = 4;
    const PRIMITIVES_PER_ITEM: usize = 2;

    fn populate_index_pattern(indices: &mut [u16]) {
        quad_index_pattern(indices);
    }
}

impl SortableBatchable for Quad3d {
    fn is_opaque(&self) -> bool {
        self.opaque
    }

    fn distance_squared(&self, viewpoint: Vec3) -> f32 {
        viewpoint.distance_squared(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::VertexLayout;
    use polybatch_gpu::TextureHandle;

    fn offsets() -> AttributeOffsets {
        AttributeOffsets::new(VertexLayout::new(base_attributes(1, true, false)))
    }

    fn corner(vertices: &[f32], index: usize) -> Vec3 {
        Vec3::new(
            vertices[index * 6],
            vertices[index * 6 + 1],
            vertices[index * 6 + 2],
        )
    }

    #[test]
    fn corners_centered_on_position() {
        let mut quad = Quad3d::new();
        quad.size(2.0, 2.0).position(0.0, 0.0, 5.0);

        let mut vertices = vec![0.0; 24];
        let written = quad.apply_vertices(&mut vertices, 0, &offsets(), 6);
        assert_eq!(written, 4);

        assert!(corner(&vertices, 0).abs_diff_eq(Vec3::new(-1.0, -1.0, 5.0), 1e-5));
        assert!(corner(&vertices, 2).abs_diff_eq(Vec3::new(1.0, 1.0, 5.0), 1e-5));
    }

    #[test]
    fn rotation_spins_corners_in_place() {
        let mut quad = Quad3d::new();
        quad.size(2.0, 2.0)
            .rotate_z(std::f32::consts::FRAC_PI_2);

        let mut vertices = vec![0.0; 24];
        quad.apply_vertices(&mut vertices, 0, &offsets(), 6);

        // Bottom left (-1, -1) turns a quarter counter-clockwise to (1, -1).
        assert!(corner(&vertices, 0).abs_diff_eq(Vec3::new(1.0, -1.0, 0.0), 1e-5));
    }

    #[test]
    fn blended_decal_requests_blend_state() {
        let mut state = RenderState::new();
        state.set_blending(false);

        let mut quad = Quad3d::new();
        quad.texture(Texture::new(TextureHandle(1), 8, 8))
            .blend_preset(Blending::Additive);

        assert!(quad.prepare_state(&mut state, 100, 0));
        assert!(state.is_blending_enabled());
        assert_eq!(state.blend_src_func(), BlendFactor::One);
        assert_eq!(state.blend_dst_func(), BlendFactor::One);

        // Unchanged state on the second submission: no flush.
        assert!(!quad.prepare_state(&mut state, 100, 0));
    }

    #[test]
    fn shared_state_enables_depth_testing() {
        let mut state = RenderState::new();
        Quad3d::new().prepare_shared_state(&mut state);
        assert!(state.is_depth_test_enabled());
    }

    #[test]
    fn distance_is_squared() {
        let mut quad = Quad3d::new();
        quad.position(0.0, 3.0, 4.0);
        assert_eq!(quad.distance_squared(Vec3::ZERO), 25.0);
    }

    #[test]
    fn billboard_faces_camera() {
        let mut quad = Quad3d::new();
        quad.size(2.0, 2.0)
            .position(0.0, 0.0, 0.0)
            .billboard(Vec3::new(0.0, 0.0, 10.0), Vec3::Y);

        let mut vertices = vec![0.0; 24];
        quad.apply_vertices(&mut vertices, 0, &offsets(), 6);

        // Facing +Z keeps the quad in the XY plane.
        for i in 0..4 {
            assert!(corner(&vertices, i).z.abs() < 1e-5);
        }
        assert!(corner(&vertices, 1).y > 0.9); // top left stays up
    }
}
