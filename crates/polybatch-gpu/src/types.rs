//! Handle and fixed-function state types shared across the device boundary.

/// Opaque handle to an externally owned texture.
///
/// The engine never creates or destroys textures. It only binds handles to
/// texture units while a drawing session is active, and drops all references
/// when the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque handle to an externally owned shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Point sprites. One vertex per primitive, no indices.
    Points,
    /// Line segments. Two indices per primitive.
    Lines,
    /// Triangles. Three indices per primitive.
    Triangles,
}

impl Primitive {
    /// Number of indices consumed per primitive, or 0 when the topology is
    /// drawn unindexed.
    pub fn indices_per_primitive(self) -> usize {
        match self {
            Primitive::Points => 0,
            Primitive::Lines => 2,
            Primitive::Triangles => 3,
        }
    }

    /// Whether draws of this topology go through the index buffer.
    pub fn is_indexed(self) -> bool {
        self.indices_per_primitive() != 0
    }
}

/// Source/destination blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Which face winding gets culled when face culling is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Front,
    Back,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_per_primitive() {
        assert_eq!(Primitive::Points.indices_per_primitive(), 0);
        assert_eq!(Primitive::Lines.indices_per_primitive(), 2);
        assert_eq!(Primitive::Triangles.indices_per_primitive(), 3);
    }

    #[test]
    fn only_points_are_unindexed() {
        assert!(!Primitive::Points.is_indexed());
        assert!(Primitive::Lines.is_indexed());
        assert!(Primitive::Triangles.is_indexed());
    }
}
