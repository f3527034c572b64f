//! Minimal data to define a two-dimensional region of a texture or texture
//! array.

/// A UV rectangle plus an array layer. Coordinates are in the texture's
/// normalized UV space with V increasing downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region2d {
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub layer: u32,
}

impl Region2d {
    /// The full texture.
    pub fn full() -> Self {
        Self {
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
            layer: 0,
        }
    }

    pub fn new(u: f32, v: f32, u2: f32, v2: f32) -> Self {
        Self {
            u,
            v,
            u2,
            v2,
            layer: 0,
        }
    }

    /// A region given in texel units of a texture with the given dimensions.
    /// Width and height may be negative to flip the region in place.
    pub fn from_texels(x: i32, y: i32, width: i32, height: i32, tex_width: u32, tex_height: u32) -> Self {
        let inv_w = 1.0 / tex_width as f32;
        let inv_h = 1.0 / tex_height as f32;
        Self::new(
            x as f32 * inv_w,
            y as f32 * inv_h,
            (x + width) as f32 * inv_w,
            (y + height) as f32 * inv_h,
        )
    }

    pub fn set_full(&mut self) {
        *self = Self::full();
    }

    pub fn set(&mut self, u: f32, v: f32, u2: f32, v2: f32) {
        self.u = u;
        self.v = v;
        self.u2 = u2;
        self.v2 = v2;
    }

    pub fn flip(&mut self, x: bool, y: bool) {
        if x {
            std::mem::swap(&mut self.u, &mut self.u2);
        }
        if y {
            std::mem::swap(&mut self.v, &mut self.v2);
        }
    }

    /// Region width in normalized UV units. Negative when flipped.
    pub fn width_uv(&self) -> f32 {
        self.u2 - self.u
    }

    /// Region height in normalized UV units. Negative when flipped.
    pub fn height_uv(&self) -> f32 {
        self.v2 - self.v
    }
}

impl Default for Region2d {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_region_normalizes() {
        let region = Region2d::from_texels(16, 32, 16, 16, 64, 64);
        assert_eq!(region.u, 0.25);
        assert_eq!(region.v, 0.5);
        assert_eq!(region.u2, 0.5);
        assert_eq!(region.v2, 0.75);
    }

    #[test]
    fn flip_swaps_coordinates() {
        let mut region = Region2d::new(0.0, 0.2, 1.0, 0.8);
        region.flip(true, false);
        assert_eq!(region.u, 1.0);
        assert_eq!(region.u2, 0.0);
        assert_eq!(region.v, 0.2);

        region.flip(false, true);
        assert_eq!(region.v, 0.8);
        assert_eq!(region.v2, 0.2);
    }
}
