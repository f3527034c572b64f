//! Concrete drawable shapes.
//!
//! Each type in this module is a ready-made [`Batchable`](crate::Batchable)
//! in the plain-struct style: public parameter fields plus chained setters
//! that return `&mut Self`. A shape keeps its texture reference across
//! [`refresh`](crate::Batchable::refresh) so the common draw-many-then-swap
//! pattern stays cheap; [`reset`](crate::Batchable::reset) drops it.

mod lit_quad3d;
mod point;
mod poly;
mod quad2d;
mod quad3d;

pub use lit_quad3d::LitQuad3d;
pub use point::{Point2d, Point3d};
pub use poly::{Poly2d, PolygonRegion};
pub use quad2d::{Quad2d, Quad2dArray};
pub use quad3d::Quad3d;

use crate::{attributes::AttributeOffsets, region::Region2d};
use polybatch_gpu::TextureHandle;

/// A texture handle paired with its pixel dimensions, which shapes need for
/// texel-space regions and region-sized defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn new(handle: TextureHandle, width: u32, height: u32) -> Self {
        Self {
            handle,
            width,
            height,
        }
    }
}

// Counter-clockwise winding, two triangles per quad.
pub(crate) fn quad_index_pattern(indices: &mut [u16]) {
    indices.copy_from_slice(&[0, 2, 1, 0, 3, 2]);
}

// Writes the color and UV columns shared by both quad shapes. Vertex order is
// bottom left, top left, top right, bottom right; `coordinates_rotation`
// turns the UVs clockwise in 90 degree steps without moving the corners.
pub(crate) fn write_quad_color_and_uvs(
    vertices: &mut [f32],
    start: usize,
    offsets: &AttributeOffsets,
    stride: usize,
    color: f32,
    region: &Region2d,
    coordinates_rotation: u32,
) {
    let mut ci = start + offsets.color0();
    for _ in 0..4 {
        vertices[ci] = color;
        ci += stride;
    }

    let (u, v, u2, v2) = (region.u, region.v, region.u2, region.v2);
    let uvs: [(f32, f32); 4] = match coordinates_rotation % 4 {
        0 => [(u, v2), (u, v), (u2, v), (u2, v2)],
        1 => [(u2, v2), (u, v2), (u, v), (u2, v)],
        2 => [(u2, v), (u2, v2), (u, v2), (u, v)],
        _ => [(u, v), (u2, v), (u2, v2), (u, v2)],
    };
    let mut tci = start + offsets.texture_coordinate(0);
    for (tu, tv) in uvs {
        vertices[tci] = tu;
        vertices[tci + 1] = tv;
        tci += stride;
    }
}
