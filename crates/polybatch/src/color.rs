//! RGBA8 color packed into the bits of a single float.

/// A color packed as four 8-bit channels, stored ABGR with red in the low
/// byte. The packed value travels through the vertex buffer as one float via
/// a bit cast, so a packed-color attribute costs a single float per vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedColor(u32);

impl PackedColor {
    pub const WHITE: Self = Self(0xffff_ffff);

    /// Pack from float channels in `0.0..=1.0`. Values outside the range are
    /// clamped.
    pub fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0) as u32;
        Self(to_byte(a) << 24 | to_byte(b) << 16 | to_byte(g) << 8 | to_byte(r))
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The packed bits reinterpreted as a float, for writing into a vertex
    /// buffer. The result is raw bit data, not a meaningful number.
    pub fn to_vertex_float(self) -> f32 {
        bytemuck::cast(self.0)
    }
}

impl Default for PackedColor {
    fn default() -> Self {
        Self::WHITE
    }
}
