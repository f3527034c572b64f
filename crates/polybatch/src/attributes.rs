//! Vertex layout description and fast attribute offset lookup.
//!
//! A layout is computed once from a template item at engine construction time
//! and is immutable afterwards. All offsets are in float-size units.

use ahash::AHashMap;

/// What a vertex attribute is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeUsage {
    Position,
    /// Four color components packed into the bits of a single float.
    ColorPacked,
    TextureCoordinates,
    Generic,
    Normal,
    Tangent,
    BiNormal,
}

/// One named attribute slot in a vertex record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub usage: AttributeUsage,
    /// Declared component count (2 or 3 for positions and texture
    /// coordinates, 4 for packed color).
    pub components: usize,
    /// Shader attribute name.
    pub name: String,
}

impl VertexAttribute {
    pub fn new(usage: AttributeUsage, components: usize, name: impl Into<String>) -> Self {
        Self {
            usage,
            components,
            name: name.into(),
        }
    }

    /// Size of this attribute in floats. Packed color occupies one float
    /// regardless of its four declared components.
    pub fn size_floats(&self) -> usize {
        match self.usage {
            AttributeUsage::ColorPacked => 1,
            _ => self.components,
        }
    }
}

/// The conventional position + packed-color + texture-coordinate layout used
/// by quad and polygon items.
pub fn base_attributes(
    texture_count: usize,
    position_3d: bool,
    texcoord_3d: bool,
) -> Vec<VertexAttribute> {
    let mut attributes = vec![
        VertexAttribute::new(
            AttributeUsage::Position,
            if position_3d { 3 } else { 2 },
            "a_position",
        ),
        VertexAttribute::new(AttributeUsage::ColorPacked, 4, "a_color"),
    ];
    for i in 0..texture_count {
        attributes.push(VertexAttribute::new(
            AttributeUsage::TextureCoordinates,
            if texcoord_3d { 3 } else { 2 },
            format!("a_tex_coord{i}"),
        ));
    }
    attributes
}

/// An ordered, immutable sequence of vertex attributes with their computed
/// float offsets.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    offsets: Vec<usize>,
    stride: usize,
}

impl VertexLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        assert!(!attributes.is_empty(), "a vertex layout needs at least one attribute");
        let mut offsets = Vec::with_capacity(attributes.len());
        let mut stride = 0;
        for attribute in &attributes {
            offsets.push(stride);
            stride += attribute.size_floats();
        }
        Self {
            attributes,
            offsets,
            stride,
        }
    }

    /// Size of one vertex record in floats.
    pub fn stride_floats(&self) -> usize {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Float offset of the attribute at `index`.
    pub fn offset(&self, index: usize) -> usize {
        self.offsets[index]
    }
}

/// Fast and convenient access to attribute offsets, in float-size units.
///
/// Slot fields hold the offset of the n-th attribute of that usage, or 0 when
/// the layout has no such attribute (position is always present, so an unused
/// slot reading 0 only matters to item types that know they declared it).
#[derive(Debug, Clone)]
pub struct AttributeOffsets {
    layout: VertexLayout,
    by_name: AHashMap<String, usize>,
    pub position: usize,
    color: [usize; 4],
    texture_coordinate: [usize; 4],
    generic: [usize; 4],
    pub normal: usize,
    pub tangent: usize,
    pub binormal: usize,
}

impl AttributeOffsets {
    pub fn new(layout: VertexLayout) -> Self {
        let mut by_name = AHashMap::with_capacity(layout.attributes().len());
        let mut position = 0;
        let mut color = [0; 4];
        let mut texture_coordinate = [0; 4];
        let mut generic = [0; 4];
        let mut normal = 0;
        let mut tangent = 0;
        let mut binormal = 0;
        let (mut ci, mut tci, mut gi) = (0, 0, 0);

        for (i, attribute) in layout.attributes().iter().enumerate() {
            let offset = layout.offset(i);
            by_name.insert(attribute.name.clone(), offset);
            match attribute.usage {
                AttributeUsage::Position => position = offset,
                AttributeUsage::ColorPacked => {
                    if ci < 4 {
                        color[ci] = offset;
                        ci += 1;
                    }
                }
                AttributeUsage::TextureCoordinates => {
                    if tci < 4 {
                        texture_coordinate[tci] = offset;
                        tci += 1;
                    }
                }
                AttributeUsage::Generic => {
                    if gi < 4 {
                        generic[gi] = offset;
                        gi += 1;
                    }
                }
                AttributeUsage::Normal => normal = offset,
                AttributeUsage::Tangent => tangent = offset,
                AttributeUsage::BiNormal => binormal = offset,
            }
        }

        Self {
            layout,
            by_name,
            position,
            color,
            texture_coordinate,
            generic,
            normal,
            tangent,
            binormal,
        }
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Offset of the first packed-color attribute.
    pub fn color0(&self) -> usize {
        self.color[0]
    }

    /// Offset of the n-th packed-color attribute (0..=3).
    pub fn color(&self, index: usize) -> usize {
        self.color[index]
    }

    /// Offset of the n-th texture-coordinate attribute (0..=3).
    pub fn texture_coordinate(&self, index: usize) -> usize {
        self.texture_coordinate[index]
    }

    /// Offset of the n-th generic attribute (0..=3).
    pub fn generic(&self, index: usize) -> usize {
        self.generic[index]
    }

    /// Look an offset up by shader attribute name. Returns `None` if the
    /// layout has no attribute with that name.
    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
