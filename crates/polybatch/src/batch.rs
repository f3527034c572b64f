//! The packer/flush controller.
//!
//! [`PolyBatch`] draws batched [`Batchable`] items, combining them into as
//! few device draw calls as possible. Items can only be drawn between calls
//! to [`begin`](PolyBatch::begin) and [`end`](PolyBatch::end). The queued
//! geometry can be flushed immediately with [`flush`](PolyBatch::flush);
//! flushes also happen automatically when `end` is called, when capacity
//! would be exceeded, or when an item needs different textures or
//! fixed-function state than the last (changing blend parameters, the
//! shader, or the projection matrix flushes too).
//!
//! The engine supplies its combined projection and transform matrices to the
//! shader under one uniform name, and one sampler-slot uniform per declared
//! texture, both configurable through [`BatchDescriptor`].

use crate::{
    attributes::{AttributeOffsets, VertexLayout},
    batchable::{Batchable, IndexPatternCache},
    state::RenderState,
};
use glam::Mat4;
use polybatch_gpu::{BlendFactor, DrawDevice, Primitive, ShaderHandle};
use std::sync::Arc;
use tracing::trace;

// Highest vertex number addressable by a 16-bit index buffer.
const MAX_VERTEX_INDEX: usize = 32767;

/// Shader uniform names the engine assigns.
#[derive(Debug, Clone)]
pub struct UniformNames {
    /// Name of the combined projection-times-transform matrix uniform.
    pub combined_matrix: String,
    /// Prefix for sampler uniforms; the texture unit is appended, so the
    /// default produces `u_texture0`, `u_texture1`, ...
    pub texture_base: String,
}

impl Default for UniformNames {
    fn default() -> Self {
        Self {
            combined_matrix: "u_proj_trans".into(),
            texture_base: "u_texture".into(),
        }
    }
}

impl UniformNames {
    pub fn texture(&self, slot: usize) -> String {
        format!("{}{}", self.texture_base, slot)
    }
}

/// Constructor-time configuration for a [`PolyBatch`].
#[derive(Debug, Clone)]
pub struct BatchDescriptor {
    /// The number of vertices the engine can batch at once. Maximum of
    /// 32767. For a fixed-topology template this is rounded down to a
    /// multiple of the item's vertex count.
    pub max_vertices: usize,
    /// The number of primitives (lines or triangles) the engine can batch at
    /// once. Must be 0 for a fixed-topology template, which gets its full
    /// index buffer precomputed instead. Ignored for point templates.
    pub max_primitives: usize,
    pub uniform_names: UniformNames,
}

impl BatchDescriptor {
    pub fn new(max_vertices: usize, max_primitives: usize) -> Self {
        Self {
            max_vertices,
            max_primitives,
            uniform_names: UniformNames::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FixedMode {
    vertices_per_item: usize,
    floats_per_item: usize,
    indices_per_item: usize,
}

/// Draws batched [`Batchable`] items of a common layout.
///
/// The engine is instantiated with a template item that defines the vertex
/// layout, primitive topology, and texture count it supports. Other item
/// types can be drawn into the same engine when their attributes are the
/// same, or a beginning subset, of the template's; this is not checked.
///
/// `T` is also the type returned when acquiring the reusable scratch item
/// with [`item`](Self::item).
pub struct PolyBatch<T: Batchable> {
    device: Arc<dyn DrawDevice>,
    // The scratch/template instance. Only `None` transiently while it is
    // being submitted.
    scratch: Option<T>,
    have_pending_scratch: bool,

    offsets: AttributeOffsets,
    stride: usize,
    vertices: Box<[f32]>,
    indices: Box<[u16]>,
    primitive: Primitive,
    uses_indices: bool,
    fixed: Option<FixedMode>,
    max_vertices: usize,
    max_indices: usize,
    texture_count: usize,

    // Write cursors. `vert_cursor` is a float offset; `epoch_vertices`
    // counts vertices since the last flush for variable-topology indexing.
    vert_cursor: usize,
    ind_cursor: usize,
    epoch_vertices: usize,

    // Count drawn by the most recent flush, for repeat_previous_flush.
    flushed_count: usize,
    flush_called: bool,
    reflush_used: bool,
    drawing: bool,

    /// Number of draw calls since the last `begin`.
    pub render_calls: usize,
    /// Number of draw calls, ever. Not reset unless set manually.
    pub total_render_calls: usize,

    projection: Mat4,
    transform: Mat4,
    shader: Option<ShaderHandle>,
    uniform_names: UniformNames,

    state: RenderState,
    pattern_cache: IndexPatternCache,
}

impl<T: Batchable> PolyBatch<T> {
    /// Construct an engine for the given template item type.
    ///
    /// `max_primitives` must be 0 for a fixed-topology template and greater
    /// than 0 for any other indexed template; it is ignored for point
    /// templates.
    ///
    /// # Panics
    ///
    /// Panics when `max_vertices` exceeds 32767 or the topology/budget
    /// combination is invalid.
    pub fn new(
        template: T,
        max_vertices: usize,
        max_primitives: usize,
        device: Arc<dyn DrawDevice>,
    ) -> Self {
        Self::with_descriptor(template, BatchDescriptor::new(max_vertices, max_primitives), device)
    }

    /// Construct with explicit uniform naming.
    pub fn with_descriptor(
        template: T,
        descriptor: BatchDescriptor,
        device: Arc<dyn DrawDevice>,
    ) -> Self {
        assert!(
            descriptor.max_vertices <= MAX_VERTEX_INDEX,
            "can't have more than 32767 vertices per batch: {}",
            descriptor.max_vertices
        );

        let mut attributes = Vec::new();
        template.vertex_attributes(&mut attributes);
        let layout = VertexLayout::new(attributes);
        let stride = layout.stride_floats();
        let offsets = AttributeOffsets::new(layout);

        let primitive = template.primitive();
        let uses_indices = primitive.is_indexed();
        let texture_count = template.texture_count();

        let mut max_vertices = descriptor.max_vertices;
        let mut fixed = None;
        let max_indices;
        if uses_indices {
            if let Some(topology) = template.fixed_topology() {
                assert_eq!(
                    descriptor.max_primitives, 0,
                    "a fixed-topology template requires a primitive budget of 0"
                );
                max_vertices -= max_vertices % topology.vertices_per_item;
                let indices_per_item = topology.indices_per_item(primitive);
                let items = max_vertices / topology.vertices_per_item;
                max_indices = items * indices_per_item;
                fixed = Some(FixedMode {
                    vertices_per_item: topology.vertices_per_item,
                    floats_per_item: topology.vertices_per_item * stride,
                    indices_per_item,
                });
            } else {
                assert!(
                    descriptor.max_primitives > 0,
                    "max_primitives must be greater than 0 unless the template has a fixed topology"
                );
                max_indices = descriptor.max_primitives * primitive.indices_per_primitive();
            }
        } else {
            max_indices = 0;
        }

        let vertices = vec![0.0; max_vertices * stride].into_boxed_slice();
        let mut indices = vec![0u16; max_indices].into_boxed_slice();

        // Fixed mode never rewrites indices, so the full buffer is generated
        // and uploaded exactly once, here.
        if let (Some(mode), Some(topology)) = (&fixed, template.fixed_topology()) {
            let mut pattern = vec![0u16; mode.indices_per_item];
            (topology.populate_pattern)(&mut pattern);
            for item in 0..max_vertices / mode.vertices_per_item {
                let base = (item * mode.vertices_per_item) as u16;
                for (j, &value) in pattern.iter().enumerate() {
                    indices[item * mode.indices_per_item + j] = value + base;
                }
            }
            device.upload_indices(&indices);
        }

        let mut state = RenderState::new();
        state.set_blending(true);
        state.set_blend_function(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);

        Self {
            device,
            scratch: Some(template),
            have_pending_scratch: false,
            offsets,
            stride,
            vertices,
            indices,
            primitive,
            uses_indices,
            fixed,
            max_vertices,
            max_indices,
            texture_count,
            vert_cursor: 0,
            ind_cursor: 0,
            epoch_vertices: 0,
            flushed_count: 0,
            flush_called: false,
            reflush_used: false,
            drawing: false,
            render_calls: 0,
            total_render_calls: 0,
            projection: Mat4::IDENTITY,
            transform: Mat4::IDENTITY,
            shader: None,
            uniform_names: descriptor.uniform_names,
            state,
            pattern_cache: IndexPatternCache::new(),
        }
    }

    /// Begin a drawing session.
    ///
    /// # Panics
    ///
    /// Panics if a session is already open or no shader has been assigned.
    pub fn begin(&mut self) {
        assert!(!self.drawing, "end() must be called before begin()");
        assert!(self.shader.is_some(), "a shader must be assigned before begin()");
        self.render_calls = 0;

        self.state.begin(&*self.device);
        if let Some(template) = &self.scratch {
            template.prepare_shared_state(&mut self.state);
        }
        self.state.apply_changes(&*self.device);
        let shader = self.require_shader();
        self.device.bind_shader(shader);
        self.apply_matrices();
        self.apply_texture_uniforms();

        self.drawing = true;
        self.flush_called = false;
        self.reflush_used = false;
    }

    /// End the session: final flush, device state back to defaults, and all
    /// transient texture references dropped.
    ///
    /// # Panics
    ///
    /// Panics if no session is open.
    pub fn end(&mut self) {
        assert!(self.drawing, "begin() must be called before end()");
        // Didn't reflush and didn't draw anything, so the next reflush must
        // use a count of 0.
        if !self.reflush_used && !self.flush_called {
            self.flushed_count = 0;
        }
        self.flush();
        self.drawing = false;

        self.state.end(&*self.device);
        self.state.clear_texture_units();
        if let Some(scratch) = &mut self.scratch {
            scratch.reset();
        }
    }

    /// Borrow the reusable scratch item, refreshed to drawing defaults. It
    /// is automatically queued for drawing on the next call to
    /// [`draw`](Self::draw), [`item`](Self::item), [`flush`](Self::flush),
    /// or [`end`](Self::end).
    ///
    /// Do not cache the returned reference across engine calls.
    pub fn item(&mut self) -> &mut T {
        self.submit_pending();
        self.have_pending_scratch = true;
        match self.scratch.as_mut() {
            Some(item) => {
                item.refresh();
                item
            }
            None => unreachable!("the scratch item is restored after every submit"),
        }
    }

    /// Queue an item for drawing. The item's vertex attributes must be the
    /// same as the template type's, or a beginning subset; its shared state
    /// and primitive topology must be equivalent. These criteria are not
    /// checked.
    ///
    /// # Panics
    ///
    /// Panics if no session is open.
    pub fn draw<U: Batchable>(&mut self, item: &U) {
        self.submit_pending();
        self.enqueue(item);
    }

    fn submit_pending(&mut self) {
        if !self.have_pending_scratch {
            return;
        }
        self.have_pending_scratch = false;
        if let Some(item) = self.scratch.take() {
            self.enqueue(&item);
            self.scratch = Some(item);
        }
    }

    fn enqueue<U: Batchable>(&mut self, item: &U) {
        assert!(self.drawing, "begin() must be called before drawing");
        if let Some(fixed) = self.fixed {
            let remaining = self.max_vertices - self.vert_cursor / self.stride;
            if item.prepare_state(&mut self.state, remaining, 0) {
                self.flush_queued();
            }
            item.apply_vertices(&mut self.vertices, self.vert_cursor, &self.offsets, self.stride);
            self.ind_cursor += fixed.indices_per_item;
            self.vert_cursor += fixed.floats_per_item;
        } else {
            let remaining_vertices = self.max_vertices - self.epoch_vertices;
            let remaining_indices = self.max_indices - self.ind_cursor;
            if item.prepare_state(&mut self.state, remaining_vertices, remaining_indices) {
                self.flush_queued();
            }
            if self.uses_indices {
                // Indices are epoch relative: the pattern is offset by the
                // vertex count written since the last flush.
                let base = self.epoch_vertices as u16;
                if let Some(topology) = item.fixed_topology() {
                    let pattern = self.pattern_cache.pattern_for::<U>(&topology, self.primitive);
                    for (j, &value) in pattern.iter().enumerate() {
                        self.indices[self.ind_cursor + j] = value + base;
                    }
                    self.ind_cursor += pattern.len();
                } else {
                    self.ind_cursor += item.apply_indices(&mut self.indices, self.ind_cursor, base);
                }
            }
            let added =
                item.apply_vertices(&mut self.vertices, self.vert_cursor, &self.offsets, self.stride);
            self.epoch_vertices += added;
            self.vert_cursor += added * self.stride;
        }
    }

    /// Submit the queued geometry now. With nothing queued this only applies
    /// pending render state, which realizes the very first item's state even
    /// before any geometry exists.
    ///
    /// # Panics
    ///
    /// Panics if no session is open.
    pub fn flush(&mut self) {
        assert!(self.drawing, "begin() must be called before flush()");
        self.submit_pending();
        self.flush_queued();
    }

    // Only reachable while a session is open.
    fn flush_queued(&mut self) {
        self.flush_called = true;
        if self.vert_cursor == 0 {
            self.state.apply_changes(&*self.device);
            return;
        }

        self.device.upload_vertices(&self.vertices[..self.vert_cursor]);
        if self.uses_indices && self.fixed.is_none() {
            self.device.upload_indices(&self.indices[..self.ind_cursor]);
        }
        self.flushed_count = if self.uses_indices {
            self.ind_cursor
        } else {
            self.vert_cursor / self.stride
        };
        let shader = self.require_shader();
        self.device.draw(self.primitive, self.flushed_count, shader);
        trace!(
            vertices = self.vert_cursor / self.stride,
            count = self.flushed_count,
            render_call = self.render_calls,
            "flush"
        );

        // Might have flushed to make room for a new item's state.
        self.state.apply_changes(&*self.device);

        self.vert_cursor = 0;
        self.epoch_vertices = 0;
        self.ind_cursor = 0;
        self.render_calls += 1;
        self.total_render_calls += 1;
    }

    /// Re-issue the exact draw call of the previous flush with zero CPU-side
    /// recomputation. Expert escape with no error checks: only valid when
    /// nothing drawn would differ from the prior flush, including textures
    /// and blend state. Note a flush may have occurred for reasons other
    /// than a manual [`flush`](Self::flush) call.
    pub fn repeat_previous_flush(&mut self) {
        if self.flushed_count != 0 {
            let shader = self.require_shader();
            self.device.draw(self.primitive, self.flushed_count, shader);
            self.render_calls += 1;
            self.total_render_calls += 1;
        }
        self.reflush_used = true;
    }

    /// Skip ahead by `count` fixed-topology items without writing any data,
    /// assuming the device buffers still hold correct data for them from the
    /// previous flush. Expert escape with no error checks; a no-op for
    /// variable-topology engines.
    pub fn redraw(&mut self, count: usize) {
        if let Some(fixed) = self.fixed {
            self.ind_cursor += count * fixed.indices_per_item;
            self.vert_cursor += count * fixed.floats_per_item;
        }
    }

    /// The render state, for adjusting drawing parameters before the next
    /// flush. Changes override any set by queued items awaiting that flush,
    /// except the not-yet-submitted scratch item, if any; later items may
    /// reverse them again in their own state preparation and trigger a
    /// flush.
    pub fn render_state(&mut self) -> &mut RenderState {
        &mut self.state
    }

    /// Assign the shader program. While a session is open this flushes and
    /// rebinds shader, matrices, and sampler uniforms immediately.
    pub fn set_shader(&mut self, shader: ShaderHandle) {
        if self.drawing {
            self.flush();
        }
        self.shader = Some(shader);
        if self.drawing {
            self.device.bind_shader(shader);
            self.apply_matrices();
            self.apply_texture_uniforms();
        }
    }

    pub fn shader(&self) -> Option<ShaderHandle> {
        self.shader
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        if self.drawing {
            self.flush();
        }
        self.projection = projection;
        if self.drawing {
            self.apply_matrices();
        }
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        if self.drawing {
            self.flush();
        }
        self.transform = transform;
        if self.drawing {
            self.apply_matrices();
        }
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    fn apply_matrices(&self) {
        if let Some(shader) = self.shader {
            let combined = self.projection * self.transform;
            self.device.set_uniform_matrix(
                shader,
                &self.uniform_names.combined_matrix,
                &combined.to_cols_array(),
            );
        }
    }

    fn apply_texture_uniforms(&self) {
        if let Some(shader) = self.shader {
            for slot in 0..self.texture_count {
                self.device
                    .set_uniform_int(shader, &self.uniform_names.texture(slot), slot as i32);
            }
        }
    }

    pub fn enable_blending(&mut self) {
        if self.state.is_blending_enabled() {
            return;
        }
        if self.drawing {
            self.flush();
        }
        self.state.set_blending(true);
    }

    pub fn disable_blending(&mut self) {
        if !self.state.is_blending_enabled() {
            return;
        }
        if self.drawing {
            self.flush();
        }
        self.state.set_blending(false);
    }

    pub fn set_blend_function(&mut self, src: BlendFactor, dst: BlendFactor) {
        if !self.state.is_blend_func_separate()
            && self.state.blend_src_func() == src
            && self.state.blend_dst_func() == dst
        {
            return;
        }
        if self.drawing {
            self.flush();
        }
        self.state.set_blend_function(src, dst);
    }

    pub fn set_blend_function_separate(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        if self.state.blend_src_func() == src_color
            && self.state.blend_dst_func() == dst_color
            && self.state.blend_src_func_alpha() == src_alpha
            && self.state.blend_dst_func_alpha() == dst_alpha
        {
            return;
        }
        if self.drawing {
            self.flush();
        }
        self.state
            .set_blend_function_separate(src_color, dst_color, src_alpha, dst_alpha);
    }

    pub fn is_blending_enabled(&self) -> bool {
        self.state.is_blending_enabled()
    }

    pub fn blend_src_func(&self) -> BlendFactor {
        self.state.blend_src_func()
    }

    pub fn blend_dst_func(&self) -> BlendFactor {
        self.state.blend_dst_func()
    }

    pub fn blend_src_func_alpha(&self) -> BlendFactor {
        self.state.blend_src_func_alpha()
    }

    pub fn blend_dst_func_alpha(&self) -> BlendFactor {
        self.state.blend_dst_func_alpha()
    }

    /// Whether a session is open.
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// The number of vertices that can be drawn between flushes.
    pub fn vertex_capacity(&self) -> usize {
        self.max_vertices
    }

    /// The number of items that can be drawn between flushes, or 0 for a
    /// variable-topology engine.
    pub fn item_capacity(&self) -> usize {
        match self.fixed {
            Some(fixed) => self.max_vertices / fixed.vertices_per_item,
            None => 0,
        }
    }

    fn require_shader(&self) -> ShaderHandle {
        match self.shader {
            Some(shader) => shader,
            None => panic!("a shader must be assigned before drawing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Poly2d, Quad2d};
    use polybatch_gpu::RecordingDevice;

    fn device() -> Arc<RecordingDevice> {
        Arc::new(RecordingDevice::new())
    }

    #[test]
    #[should_panic(expected = "32767")]
    fn rejects_vertex_budget_over_index_range() {
        let _ = PolyBatch::new(Quad2d::new(), 40000, 0, device());
    }

    #[test]
    #[should_panic(expected = "fixed-topology template")]
    fn rejects_fixed_template_with_primitive_budget() {
        let _ = PolyBatch::new(Quad2d::new(), 400, 100, device());
    }

    #[test]
    #[should_panic(expected = "max_primitives must be greater than 0")]
    fn rejects_variable_template_without_primitive_budget() {
        let _ = PolyBatch::new(Poly2d::new(), 400, 0, device());
    }

    #[test]
    fn fixed_mode_rounds_vertex_budget_down() {
        let batch = PolyBatch::new(Quad2d::new(), 10, 0, device());
        assert_eq!(batch.vertex_capacity(), 8);
        assert_eq!(batch.item_capacity(), 2);
    }

    #[test]
    #[should_panic(expected = "end() must be called before begin()")]
    fn rejects_nested_begin() {
        let device = device();
        let mut batch = PolyBatch::new(Quad2d::new(), 400, 0, device);
        batch.set_shader(ShaderHandle(1));
        batch.begin();
        batch.begin();
    }

    #[test]
    #[should_panic(expected = "begin() must be called before end()")]
    fn rejects_end_without_begin() {
        let mut batch = PolyBatch::new(Quad2d::new(), 400, 0, device());
        batch.set_shader(ShaderHandle(1));
        batch.end();
    }

    #[test]
    #[should_panic(expected = "begin() must be called before flush()")]
    fn rejects_flush_without_begin() {
        let mut batch = PolyBatch::new(Quad2d::new(), 400, 0, device());
        batch.set_shader(ShaderHandle(1));
        batch.flush();
    }

    #[test]
    #[should_panic(expected = "a shader must be assigned")]
    fn rejects_begin_without_shader() {
        let mut batch = PolyBatch::new(Quad2d::new(), 400, 0, device());
        batch.begin();
    }

    #[test]
    fn blend_parameters_configurable_before_begin() {
        let mut batch = PolyBatch::new(Quad2d::new(), 400, 0, device());
        batch.disable_blending();
        batch.set_blend_function(BlendFactor::One, BlendFactor::One);
        assert!(!batch.is_blending_enabled());
        assert_eq!(batch.blend_src_func(), BlendFactor::One);
    }
}
