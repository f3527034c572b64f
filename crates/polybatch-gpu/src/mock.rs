//! Mock implementation of DrawDevice for testing.
//!
//! This module provides a mock GPU device that records operations
//! without actually interacting with the GPU.

use crate::{device::DrawDevice, types::*};
use parking_lot::Mutex;

/// Records a GPU operation call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    UploadVertices {
        floats: usize,
    },
    UploadIndices {
        indices: Vec<u16>,
    },
    Draw {
        primitive: Primitive,
        count: usize,
        shader: ShaderHandle,
    },
    BindTexture {
        texture: TextureHandle,
        unit: u32,
    },
    BindShader {
        shader: ShaderHandle,
    },
    SetUniformMatrix {
        shader: ShaderHandle,
        name: String,
    },
    SetUniformInt {
        shader: ShaderHandle,
        name: String,
        value: i32,
    },
    SetBlending {
        enabled: bool,
    },
    SetBlendFunction {
        src: BlendFactor,
        dst: BlendFactor,
    },
    SetBlendFunctionSeparate {
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
    SetDepthTest {
        enabled: bool,
    },
    SetDepthFunc {
        func: DepthFunc,
    },
    SetDepthRange {
        near: f32,
        far: f32,
    },
    SetDepthMask {
        enabled: bool,
    },
    SetFaceCulling {
        enabled: bool,
    },
    SetCullFace {
        face: CullFace,
    },
}

/// Mock implementation of [`DrawDevice`] for testing.
///
/// Methods take `&self` but need to record into internal state, so the call
/// log lives behind a `parking_lot::Mutex` (the trait requires `Send + Sync`,
/// which rules out `RefCell`).
///
/// # Example
///
/// ```rust
/// use polybatch_gpu::{DrawDevice, Primitive, RecordingDevice, ShaderHandle};
///
/// let device = RecordingDevice::new();
/// device.upload_vertices(&[0.0; 8]);
/// device.draw(Primitive::Triangles, 6, ShaderHandle(1));
///
/// assert_eq!(device.draw_calls().len(), 1);
/// assert_eq!(device.call_count(), 2);
/// ```
pub struct RecordingDevice {
    /// Recorded calls for verification
    calls: Mutex<Vec<DeviceCall>>,
    /// Most recently uploaded vertex floats, kept for content assertions
    last_vertices: Mutex<Vec<f32>>,
}

impl RecordingDevice {
    /// Create a new recording device.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            last_vertices: Mutex::new(Vec::new()),
        }
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    /// Get only the recorded draw calls, in order.
    pub fn draw_calls(&self) -> Vec<DeviceCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Draw { .. }))
            .cloned()
            .collect()
    }

    /// Count calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get the vertex floats from the most recent upload.
    pub fn last_vertices(&self) -> Vec<f32> {
        self.last_vertices.lock().clone()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawDevice for RecordingDevice {
    fn upload_vertices(&self, vertices: &[f32]) {
        *self.last_vertices.lock() = vertices.to_vec();
        self.calls.lock().push(DeviceCall::UploadVertices {
            floats: vertices.len(),
        });
    }

    fn upload_indices(&self, indices: &[u16]) {
        self.calls.lock().push(DeviceCall::UploadIndices {
            indices: indices.to_vec(),
        });
    }

    fn draw(&self, primitive: Primitive, count: usize, shader: ShaderHandle) {
        self.calls.lock().push(DeviceCall::Draw {
            primitive,
            count,
            shader,
        });
    }

    fn bind_texture(&self, texture: TextureHandle, unit: u32) {
        self.calls
            .lock()
            .push(DeviceCall::BindTexture { texture, unit });
    }

    fn bind_shader(&self, shader: ShaderHandle) {
        self.calls.lock().push(DeviceCall::BindShader { shader });
    }

    fn set_uniform_matrix(&self, shader: ShaderHandle, name: &str, _matrix: &[f32; 16]) {
        self.calls.lock().push(DeviceCall::SetUniformMatrix {
            shader,
            name: name.to_string(),
        });
    }

    fn set_uniform_int(&self, shader: ShaderHandle, name: &str, value: i32) {
        self.calls.lock().push(DeviceCall::SetUniformInt {
            shader,
            name: name.to_string(),
            value,
        });
    }

    fn set_blending(&self, enabled: bool) {
        self.calls.lock().push(DeviceCall::SetBlending { enabled });
    }

    fn set_blend_function(&self, src: BlendFactor, dst: BlendFactor) {
        self.calls
            .lock()
            .push(DeviceCall::SetBlendFunction { src, dst });
    }

    fn set_blend_function_separate(
        &self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.calls.lock().push(DeviceCall::SetBlendFunctionSeparate {
            src,
            dst,
            src_alpha,
            dst_alpha,
        });
    }

    fn set_depth_test(&self, enabled: bool) {
        self.calls.lock().push(DeviceCall::SetDepthTest { enabled });
    }

    fn set_depth_func(&self, func: DepthFunc) {
        self.calls.lock().push(DeviceCall::SetDepthFunc { func });
    }

    fn set_depth_range(&self, near: f32, far: f32) {
        self.calls
            .lock()
            .push(DeviceCall::SetDepthRange { near, far });
    }

    fn set_depth_mask(&self, enabled: bool) {
        self.calls.lock().push(DeviceCall::SetDepthMask { enabled });
    }

    fn set_face_culling(&self, enabled: bool) {
        self.calls
            .lock()
            .push(DeviceCall::SetFaceCulling { enabled });
    }

    fn set_cull_face(&self, face: CullFace) {
        self.calls.lock().push(DeviceCall::SetCullFace { face });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let device = RecordingDevice::new();

        device.upload_vertices(&[0.0; 4]);
        device.draw(Primitive::Triangles, 6, ShaderHandle(7));

        let calls = device.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], DeviceCall::UploadVertices { floats: 4 });
        assert_eq!(
            calls[1],
            DeviceCall::Draw {
                primitive: Primitive::Triangles,
                count: 6,
                shader: ShaderHandle(7),
            }
        );
    }

    #[test]
    fn draw_calls_filters_state_changes() {
        let device = RecordingDevice::new();

        device.set_blending(true);
        device.draw(Primitive::Points, 1, ShaderHandle(0));
        device.set_depth_test(false);

        assert_eq!(device.call_count(), 3);
        assert_eq!(device.draw_calls().len(), 1);
    }

    #[test]
    fn keeps_last_vertex_upload() {
        let device = RecordingDevice::new();

        device.upload_vertices(&[1.0, 2.0]);
        device.upload_vertices(&[3.0, 4.0, 5.0]);

        assert_eq!(device.last_vertices(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn clear_resets_log() {
        let device = RecordingDevice::new();

        device.set_depth_mask(true);
        assert_eq!(device.call_count(), 1);

        device.clear();
        assert_eq!(device.call_count(), 0);
    }
}
