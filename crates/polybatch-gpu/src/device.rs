//! Trait abstracting the GPU operations the batch engine issues.
//!
//! The engine owns no GPU resources beyond one vertex/index buffer pair per
//! device, so the trait surface is small: upload the staged buffer ranges,
//! issue one draw call, and apply fixed-function state deltas.

use crate::types::*;

/// Abstraction over the draw-side GPU operations.
///
/// # Lifetime Considerations
///
/// No lifetimes: all parameters are values or transient slices, and handles
/// are `Copy`. This keeps the trait object-safe, so the engine holds an
/// `Arc<dyn DrawDevice>` and works identically against a real backend or the
/// recording mock.
///
/// # Borrow Checking Pattern
///
/// Methods take `&self`. Real backends typically wrap an API context that is
/// already internally synchronized; mock implementations use interior
/// mutability to record calls.
pub trait DrawDevice: Send + Sync {
    // Buffer uploads

    /// Upload the staged vertex floats for the next draw call.
    fn upload_vertices(&self, vertices: &[f32]);

    /// Upload the staged indices for the next draw call.
    ///
    /// In fixed-topology mode this is called once at engine construction with
    /// the full precomputed index buffer, never again afterwards.
    fn upload_indices(&self, indices: &[u16]);

    // Draw

    /// Issue one draw call for `count` vertices (unindexed topologies) or
    /// `count` indices (indexed topologies), starting at the beginning of the
    /// most recently uploaded ranges.
    fn draw(&self, primitive: Primitive, count: usize, shader: ShaderHandle);

    // Bindings

    /// Bind a texture to a texture unit.
    fn bind_texture(&self, texture: TextureHandle, unit: u32);

    /// Make a shader program current.
    fn bind_shader(&self, shader: ShaderHandle);

    // Uniforms

    /// Set a 4x4 matrix uniform (column-major) on a shader program.
    fn set_uniform_matrix(&self, shader: ShaderHandle, name: &str, matrix: &[f32; 16]);

    /// Set an integer uniform (used for sampler slots) on a shader program.
    fn set_uniform_int(&self, shader: ShaderHandle, name: &str, value: i32);

    // Fixed-function state

    fn set_blending(&self, enabled: bool);
    fn set_blend_function(&self, src: BlendFactor, dst: BlendFactor);
    fn set_blend_function_separate(
        &self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn set_depth_test(&self, enabled: bool);
    fn set_depth_func(&self, func: DepthFunc);
    fn set_depth_range(&self, near: f32, far: f32);
    fn set_depth_mask(&self, enabled: bool);
    fn set_face_culling(&self, enabled: bool);
    fn set_cull_face(&self, face: CullFace);
}

/// View a float vertex slice as raw bytes for backends that upload bytes.
pub fn vertex_bytes(vertices: &[f32]) -> &[u8] {
    bytemuck::cast_slice(vertices)
}

/// View an index slice as raw bytes for backends that upload bytes.
pub fn index_bytes(indices: &[u16]) -> &[u8] {
    bytemuck::cast_slice(indices)
}
