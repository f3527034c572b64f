//! Pending/current render-state reconciliation.
//!
//! [`RenderState`] stores up pending fixed-function state changes and texture
//! bindings and applies them on demand, emitting only the transitions that
//! actually changed. It remembers the applied state between flushes so a
//! session's worth of draws touches the device as little as possible.
//!
//! Pending changes can be made at any time, but can only be applied by
//! calling [`RenderState::apply_changes`] between [`RenderState::begin`] and
//! [`RenderState::end`].

use ahash::AHashMap;
use polybatch_gpu::{BlendFactor, CullFace, DepthFunc, DrawDevice, TextureHandle};

/// Commonly used blend factor pairs, for convenience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blending {
    /// `SrcAlpha`, `OneMinusSrcAlpha`
    Alpha,
    /// `One`, `OneMinusSrcAlpha`
    PremultipliedAlpha,
    /// `One`, `One`
    Additive,
}

impl Blending {
    pub fn factors(self) -> (BlendFactor, BlendFactor) {
        match self {
            Blending::Alpha => (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            Blending::PremultipliedAlpha => (BlendFactor::One, BlendFactor::OneMinusSrcAlpha),
            Blending::Additive => (BlendFactor::One, BlendFactor::One),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlendFuncs {
    src_color: BlendFactor,
    dst_color: BlendFactor,
    src_alpha: BlendFactor,
    dst_alpha: BlendFactor,
}

impl BlendFuncs {
    const DEFAULT: Self = Self {
        src_color: BlendFactor::One,
        dst_color: BlendFactor::Zero,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
    };

    fn is_separate(&self) -> bool {
        self.src_color != self.src_alpha || self.dst_color != self.dst_alpha
    }
}

/// The desired state for the next submitted primitives. Always fully
/// specified.
#[derive(Debug, Clone)]
struct PendingState {
    blending: bool,
    blend: BlendFuncs,
    depth_test: bool,
    depth_func: DepthFunc,
    depth_range: (f32, f32),
    depth_mask: bool,
    culling: bool,
    cull_face: CullFace,
    texture_units: AHashMap<u32, TextureHandle>,
}

impl PendingState {
    fn gpu_defaults() -> Self {
        Self {
            blending: false,
            blend: BlendFuncs::DEFAULT,
            depth_test: false,
            depth_func: DepthFunc::Less,
            depth_range: (0.0, 1.0),
            depth_mask: true,
            culling: false,
            cull_face: CullFace::Back,
            texture_units: AHashMap::new(),
        }
    }
}

/// What the device actually has applied. Scalar parameters are `Option` so a
/// session start can invalidate them, guaranteeing the first apply emits them
/// instead of skipping on a stale match.
#[derive(Debug, Clone)]
struct AppliedState {
    blending: bool,
    blend: Option<BlendFuncs>,
    depth_test: bool,
    depth_func: Option<DepthFunc>,
    depth_range: Option<(f32, f32)>,
    depth_mask: bool,
    culling: bool,
    cull_face: Option<CullFace>,
    texture_units: AHashMap<u32, TextureHandle>,
}

impl AppliedState {
    /// Toggles at hard GPU defaults, scalar parameters unknown.
    fn invalidated_defaults() -> Self {
        Self {
            blending: false,
            blend: None,
            depth_test: false,
            depth_func: None,
            depth_range: None,
            depth_mask: true,
            culling: false,
            cull_face: None,
            texture_units: AHashMap::new(),
        }
    }
}

/// Stores up pending state changes and textures to bind, and executes them on
/// demand, minimizing actual device calls.
///
/// Setters mutate the pending snapshot only and return whether the pending
/// value changed; item types use the returned flag to decide whether the
/// engine must flush before their geometry is queued. Parameter setters
/// (blend factors, cull face) report a change only while the corresponding
/// enable flag is pending-on, since the parameter is invisible to the device
/// otherwise.
#[derive(Debug)]
pub struct RenderState {
    current: AppliedState,
    pending: PendingState,
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            current: AppliedState::invalidated_defaults(),
            pending: PendingState::gpu_defaults(),
        }
    }

    /// Begin tracking device state. Forces the device toggles to hard
    /// defaults and invalidates cached scalar parameters so the first
    /// [`apply_changes`](Self::apply_changes) emits them. Any pending changes
    /// made earlier survive and will be applied then.
    ///
    /// Must be matched with a call to [`end`](Self::end).
    pub fn begin(&mut self, device: &dyn DrawDevice) {
        self.current = AppliedState::invalidated_defaults();
        device.set_depth_mask(true);
        device.set_depth_test(false);
        device.set_face_culling(false);
        device.set_blending(false);
    }

    /// Returns the device to hard defaults. Scalar parameters (blend factors,
    /// depth function and range, cull face) are left as-is; the pending
    /// snapshot is preserved for a later session.
    pub fn end(&mut self, device: &dyn DrawDevice) {
        let saved = std::mem::replace(&mut self.pending, PendingState::gpu_defaults());
        self.apply_changes(device);
        self.pending = saved;
    }

    /// Whether pending differs from applied in any field that is visible
    /// under the currently pending enable flags.
    pub fn has_pending_changes(&self) -> bool {
        let pending = &self.pending;
        let current = &self.current;

        if pending.depth_mask != current.depth_mask {
            return true;
        }

        if pending.depth_test != current.depth_test {
            return true;
        }

        if pending.depth_test {
            if Some(pending.depth_func) != current.depth_func {
                return true;
            }
            if Some(pending.depth_range) != current.depth_range {
                return true;
            }
        }

        if pending.blending != current.blending {
            return true;
        }

        if pending.blending && Some(pending.blend) != current.blend {
            return true;
        }

        if pending.culling != current.culling {
            return true;
        }

        if pending.culling && Some(pending.cull_face) != current.cull_face {
            return true;
        }

        pending
            .texture_units
            .iter()
            .any(|(unit, handle)| current.texture_units.get(unit) != Some(handle))
    }

    /// Applies the pending state changes and texture bindings to the device.
    /// Must be called between [`begin`](Self::begin) and [`end`](Self::end).
    pub fn apply_changes(&mut self, device: &dyn DrawDevice) {
        let pending = &self.pending;
        let current = &mut self.current;

        if pending.depth_mask != current.depth_mask {
            device.set_depth_mask(pending.depth_mask);
            current.depth_mask = pending.depth_mask;
        }

        if pending.depth_test != current.depth_test {
            device.set_depth_test(pending.depth_test);
            current.depth_test = pending.depth_test;
        }

        if pending.depth_test {
            if Some(pending.depth_func) != current.depth_func {
                device.set_depth_func(pending.depth_func);
                current.depth_func = Some(pending.depth_func);
            }
            if Some(pending.depth_range) != current.depth_range {
                device.set_depth_range(pending.depth_range.0, pending.depth_range.1);
                current.depth_range = Some(pending.depth_range);
            }
        }

        if pending.blending != current.blending {
            device.set_blending(pending.blending);
            current.blending = pending.blending;
        }

        if pending.blending && Some(pending.blend) != current.blend {
            let blend = pending.blend;
            if blend.is_separate() {
                device.set_blend_function_separate(
                    blend.src_color,
                    blend.dst_color,
                    blend.src_alpha,
                    blend.dst_alpha,
                );
            } else {
                device.set_blend_function(blend.src_color, blend.dst_color);
            }
            current.blend = Some(blend);
        }

        if pending.culling != current.culling {
            device.set_face_culling(pending.culling);
            current.culling = pending.culling;
        }

        if pending.culling && Some(pending.cull_face) != current.cull_face {
            device.set_cull_face(pending.cull_face);
            current.cull_face = Some(pending.cull_face);
        }

        // Per-unit diff, lowest unit first so binding order is deterministic.
        let mut changed: Vec<(u32, TextureHandle)> = pending
            .texture_units
            .iter()
            .filter(|(unit, handle)| current.texture_units.get(unit) != Some(handle))
            .map(|(unit, handle)| (*unit, *handle))
            .collect();
        changed.sort_by_key(|(unit, _)| *unit);
        for (unit, handle) in changed {
            device.bind_texture(handle, unit);
            current.texture_units.insert(unit, handle);
        }
    }

    /// Enables or disables depth buffer writing.
    /// Returns whether the pending depth mask state changed.
    pub fn set_depth_mask(&mut self, enabled: bool) -> bool {
        if self.pending.depth_mask != enabled {
            self.pending.depth_mask = enabled;
            return true;
        }
        false
    }

    /// Enables or disables depth testing.
    /// Returns whether the pending depth testing state changed.
    pub fn set_depth_test(&mut self, enabled: bool) -> bool {
        if self.pending.depth_test != enabled {
            self.pending.depth_test = enabled;
            return true;
        }
        false
    }

    /// Sets the depth test function with a depth range of 0 to 1. The
    /// parameters are only applied while depth testing is enabled.
    pub fn set_depth_func(&mut self, func: DepthFunc) -> bool {
        self.set_depth_func_range(func, 0.0, 1.0)
    }

    /// Sets the depth test function and range. The parameters are only
    /// applied while depth testing is enabled.
    /// Returns whether the pending parameters changed.
    pub fn set_depth_func_range(&mut self, func: DepthFunc, near: f32, far: f32) -> bool {
        if self.pending.depth_func != func || self.pending.depth_range != (near, far) {
            self.pending.depth_func = func;
            self.pending.depth_range = (near, far);
            return true;
        }
        false
    }

    /// Enables or disables blending.
    /// Returns whether the pending blending state changed.
    pub fn set_blending(&mut self, enabled: bool) -> bool {
        if self.pending.blending != enabled {
            self.pending.blending = enabled;
            return true;
        }
        false
    }

    /// Sets the blend function factors, shared by color and alpha.
    /// Returns whether the pending factors changed while blending is
    /// pending-enabled.
    pub fn set_blend_function(&mut self, src: BlendFactor, dst: BlendFactor) -> bool {
        self.set_blend_function_separate(src, dst, src, dst)
    }

    /// Sets the blend function with separate factors for the color and alpha
    /// components. Returns whether the pending factors changed while blending
    /// is pending-enabled.
    pub fn set_blend_function_separate(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> bool {
        let funcs = BlendFuncs {
            src_color,
            dst_color,
            src_alpha,
            dst_alpha,
        };
        if self.pending.blend != funcs {
            self.pending.blend = funcs;
            return self.pending.blending;
        }
        false
    }

    /// Enables or disables face culling.
    /// Returns whether the pending culling state changed.
    pub fn set_face_culling(&mut self, enabled: bool) -> bool {
        if self.pending.culling != enabled {
            self.pending.culling = enabled;
            return true;
        }
        false
    }

    /// Sets which face winding is culled. The parameter is only applied while
    /// face culling is enabled. Returns whether the pending value changed
    /// while culling is pending-enabled.
    pub fn set_cull_face(&mut self, face: CullFace) -> bool {
        if self.pending.cull_face != face {
            self.pending.cull_face = face;
            return self.pending.culling;
        }
        false
    }

    /// Sets the texture to be bound to the given unit, or clears the unit's
    /// pending binding with `None`.
    /// Returns whether the pending binding for the unit changed.
    pub fn set_texture_unit(&mut self, texture: Option<TextureHandle>, unit: u32) -> bool {
        match texture {
            Some(handle) => {
                if self.pending.texture_units.get(&unit) != Some(&handle) {
                    self.pending.texture_units.insert(unit, handle);
                    return true;
                }
                false
            }
            None => self.pending.texture_units.remove(&unit).is_some(),
        }
    }

    /// The texture pending for the given unit, if any.
    pub fn texture_unit(&self, unit: u32) -> Option<TextureHandle> {
        self.pending.texture_units.get(&unit).copied()
    }

    /// Cancels all pending texture bindings and drops all texture references,
    /// pending and applied.
    pub fn clear_texture_units(&mut self) {
        self.pending.texture_units.clear();
        self.current.texture_units.clear();
    }

    pub fn is_depth_mask_enabled(&self) -> bool {
        self.pending.depth_mask
    }

    pub fn is_depth_test_enabled(&self) -> bool {
        self.pending.depth_test
    }

    pub fn depth_func(&self) -> DepthFunc {
        self.pending.depth_func
    }

    pub fn depth_range(&self) -> (f32, f32) {
        self.pending.depth_range
    }

    pub fn is_blending_enabled(&self) -> bool {
        self.pending.blending
    }

    pub fn blend_src_func(&self) -> BlendFactor {
        self.pending.blend.src_color
    }

    pub fn blend_dst_func(&self) -> BlendFactor {
        self.pending.blend.dst_color
    }

    pub fn blend_src_func_alpha(&self) -> BlendFactor {
        self.pending.blend.src_alpha
    }

    pub fn blend_dst_func_alpha(&self) -> BlendFactor {
        self.pending.blend.dst_alpha
    }

    pub fn is_blend_func_separate(&self) -> bool {
        self.pending.blend.is_separate()
    }

    pub fn is_face_culling_enabled(&self) -> bool {
        self.pending.culling
    }

    pub fn cull_face(&self) -> CullFace {
        self.pending.cull_face
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polybatch_gpu::{DeviceCall, RecordingDevice};

    #[test]
    fn setters_report_pending_change_once() {
        let mut state = RenderState::new();
        assert!(state.set_blending(true));
        assert!(!state.set_blending(true));
        assert!(state.set_depth_test(true));
        assert!(!state.set_depth_test(true));
    }

    #[test]
    fn blend_factors_gated_on_pending_enable() {
        let mut state = RenderState::new();
        // Blending pending-off: factor change is invisible, no flush needed.
        assert!(!state.set_blend_function(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha));

        state.set_blending(true);
        // Same factors again: no pending change.
        assert!(!state.set_blend_function(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha));
        assert!(state.set_blend_function(BlendFactor::One, BlendFactor::One));
    }

    #[test]
    fn cull_face_gated_on_pending_enable() {
        let mut state = RenderState::new();
        assert!(!state.set_cull_face(CullFace::Front));
        state.set_face_culling(true);
        assert!(state.set_cull_face(CullFace::Back));
    }

    #[test]
    fn apply_emits_only_deltas() {
        let device = RecordingDevice::new();
        let mut state = RenderState::new();
        state.begin(&device);
        device.clear();

        state.set_blending(true);
        state.set_blend_function(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        state.apply_changes(&device);

        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::SetBlending { enabled: true },
                DeviceCall::SetBlendFunction {
                    src: BlendFactor::SrcAlpha,
                    dst: BlendFactor::OneMinusSrcAlpha,
                },
            ]
        );

        // Nothing new pending: second apply is silent.
        device.clear();
        state.apply_changes(&device);
        assert_eq!(device.call_count(), 0);
    }

    #[test]
    fn separate_factors_use_separate_call() {
        let device = RecordingDevice::new();
        let mut state = RenderState::new();
        state.begin(&device);
        device.clear();

        state.set_blending(true);
        state.set_blend_function_separate(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::One,
        );
        state.apply_changes(&device);

        assert!(
            device
                .calls()
                .iter()
                .any(|c| matches!(c, DeviceCall::SetBlendFunctionSeparate { .. }))
        );
    }

    #[test]
    fn depth_params_invisible_while_test_disabled() {
        let device = RecordingDevice::new();
        let mut state = RenderState::new();
        state.begin(&device);
        device.clear();

        state.set_depth_func(DepthFunc::LessEqual);
        assert!(!state.has_pending_changes());
        state.apply_changes(&device);
        assert_eq!(device.call_count(), 0);

        state.set_depth_test(true);
        assert!(state.has_pending_changes());
        state.apply_changes(&device);
        assert!(
            device
                .calls()
                .iter()
                .any(|c| matches!(c, DeviceCall::SetDepthFunc { func: DepthFunc::LessEqual }))
        );
    }

    #[test]
    fn texture_diff_is_per_unit() {
        let device = RecordingDevice::new();
        let mut state = RenderState::new();
        state.begin(&device);

        state.set_texture_unit(Some(TextureHandle(1)), 0);
        state.set_texture_unit(Some(TextureHandle(2)), 1);
        state.apply_changes(&device);
        device.clear();

        // Rebinding unit 1 only should touch unit 1 only.
        state.set_texture_unit(Some(TextureHandle(3)), 1);
        state.apply_changes(&device);
        assert_eq!(
            device.calls(),
            vec![DeviceCall::BindTexture {
                texture: TextureHandle(3),
                unit: 1,
            }]
        );
    }

    #[test]
    fn first_apply_after_begin_emits_invalidated_scalars() {
        let device = RecordingDevice::new();
        let mut state = RenderState::new();

        state.set_blending(true);
        state.set_blend_function(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        state.begin(&device);
        state.apply_changes(&device);
        device.clear();

        // A later session must re-emit the factors even though pending never
        // changed in between.
        state.end(&device);
        state.begin(&device);
        state.apply_changes(&device);
        assert!(
            device
                .calls()
                .iter()
                .any(|c| matches!(c, DeviceCall::SetBlendFunction { .. }))
        );
    }

    #[test]
    fn end_restores_defaults_and_keeps_pending() {
        let device = RecordingDevice::new();
        let mut state = RenderState::new();
        state.set_blending(true);
        state.begin(&device);
        state.apply_changes(&device);
        device.clear();

        state.end(&device);
        assert!(
            device
                .calls()
                .iter()
                .any(|c| matches!(c, DeviceCall::SetBlending { enabled: false }))
        );
        // Pending survives for reuse in a later session.
        assert!(state.is_blending_enabled());
    }
}
