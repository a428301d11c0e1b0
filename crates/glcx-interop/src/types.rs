//! Shape vocabulary shared by the rendering and compute sides.

use bitflags::bitflags;

/// Binding role of a rendering-side buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Array,
    ElementArray,
    PixelPack,
    PixelUnpack,
    Uniform,
    ShaderStorage,
}

/// Scalar component type, used both for buffer elements and for pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
    Double,
}

impl ElementType {
    pub fn size_bytes(self) -> u32 {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort | Self::HalfFloat => 2,
            Self::Int | Self::UnsignedInt | Self::Float => 4,
            Self::Double => 8,
        }
    }
}

/// Driver hint describing how the rendering side will use a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StreamDraw,
    StreamRead,
    StreamCopy,
    StaticDraw,
    StaticRead,
    StaticCopy,
    #[default]
    DynamicDraw,
    DynamicRead,
    DynamicCopy,
}

bitflags! {
    /// Flags handed to the compute driver when a resource is registered.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct RegisterFlags: u32 {
        const NONE = 0;
        const READ_ONLY = 1 << 0;
        const WRITE_DISCARD = 1 << 1;
        const SURFACE_LOAD_STORE = 1 << 2;
        const TEXTURE_GATHER = 1 << 3;
    }
}

/// Shape of a [`crate::SharedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub kind: BufferKind,
    pub num_elements: u32,
    pub element_type: ElementType,
    pub count_per_element: u32,
    pub register_flags: RegisterFlags,
    pub usage: BufferUsage,
}

impl BufferDesc {
    pub fn new(
        kind: BufferKind,
        num_elements: u32,
        element_type: ElementType,
        count_per_element: u32,
    ) -> Self {
        Self {
            kind,
            num_elements,
            element_type,
            count_per_element,
            register_flags: RegisterFlags::NONE,
            usage: BufferUsage::default(),
        }
    }

    /// A byte-addressed buffer of `size_bytes` bytes.
    pub fn bytes(kind: BufferKind, size_bytes: u32) -> Self {
        Self::new(kind, size_bytes, ElementType::Byte, 1)
    }

    pub fn with_register_flags(mut self, flags: RegisterFlags) -> Self {
        self.register_flags = flags;
        self
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Bytes occupied by one item (`count_per_element` scalars).
    pub fn stride_bytes(&self) -> Option<u64> {
        u64::from(self.element_type.size_bytes()).checked_mul(u64::from(self.count_per_element))
    }

    /// Total allocation size, or `None` on overflow.
    pub fn size_bytes(&self) -> Option<u64> {
        self.stride_bytes()?
            .checked_mul(u64::from(self.num_elements))
    }
}

/// Storage format of a rendering-side texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    R16F,
    Rgba16F,
    R32F,
    Rg32F,
    Rgba32F,
    R32Ui,
}

impl InternalFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::R32F | Self::R32Ui => 4,
            Self::R16F => 2,
            Self::Rgba16F | Self::Rg32F => 8,
            Self::Rgba32F => 16,
        }
    }
}

/// Channel order of client pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Red,
    Rg,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl PixelLayout {
    pub fn channels(self) -> u32 {
        match self {
            Self::Red => 1,
            Self::Rg => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Bytes per pixel when each channel is stored as `pixel_type`.
    pub fn bytes_per_pixel(self, pixel_type: ElementType) -> u32 {
        self.channels() * pixel_type.size_bytes()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    Linear,
    Nearest,
}

impl Filter {
    pub fn from_linear(sampling_linear: bool) -> Self {
        if sampling_linear {
            Self::Linear
        } else {
            Self::Nearest
        }
    }
}

/// Texture target a registered image is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2d,
}

/// Shape of a [`crate::RenderTexture`] / [`crate::SharedImage`].
///
/// `layout` and `pixel_type` describe the client data passed alongside the
/// descriptor at creation time, not the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub internal_format: InternalFormat,
    pub filter: Filter,
    pub border: u32,
    pub layout: PixelLayout,
    pub pixel_type: ElementType,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, internal_format: InternalFormat) -> Self {
        Self {
            width,
            height,
            internal_format,
            filter: Filter::Linear,
            border: 0,
            layout: PixelLayout::Rgba,
            pixel_type: ElementType::UnsignedByte,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_border(mut self, border: u32) -> Self {
        self.border = border;
        self
    }

    pub fn with_pixel_data(mut self, layout: PixelLayout, pixel_type: ElementType) -> Self {
        self.layout = layout;
        self.pixel_type = pixel_type;
        self
    }

    /// Bytes per row of storage, or `None` if it doesn't fit in a `u64`.
    pub fn row_bytes(&self) -> Option<u64> {
        u64::from(self.width).checked_mul(u64::from(self.internal_format.bytes_per_texel()))
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.row_bytes()?.checked_mul(u64::from(self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_desc_sizes() {
        let desc = BufferDesc::new(BufferKind::Array, 10, ElementType::Float, 3);
        assert_eq!(desc.stride_bytes(), Some(12));
        assert_eq!(desc.size_bytes(), Some(120));

        let bytes = BufferDesc::bytes(BufferKind::PixelUnpack, 64);
        assert_eq!(bytes.element_type, ElementType::Byte);
        assert_eq!(bytes.count_per_element, 1);
        assert_eq!(bytes.size_bytes(), Some(64));
    }

    #[test]
    fn buffer_desc_size_does_not_wrap() {
        let desc = BufferDesc::new(BufferKind::Array, u32::MAX, ElementType::Double, u32::MAX);
        assert_eq!(desc.stride_bytes(), Some(8 * u64::from(u32::MAX)));
        assert_eq!(desc.size_bytes(), None);
    }

    #[test]
    fn texture_desc_row_bytes_follow_internal_format() {
        let desc = TextureDesc::new(7, 3, InternalFormat::Rgba32F);
        assert_eq!(desc.row_bytes(), Some(7 * 16));
        assert_eq!(desc.size_bytes(), Some(7 * 16 * 3));
        assert_eq!(PixelLayout::Bgra.bytes_per_pixel(ElementType::Float), 16);
    }

    #[test]
    fn texture_desc_size_does_not_wrap() {
        let desc = TextureDesc::new(u32::MAX, u32::MAX, InternalFormat::Rgba32F);
        assert_eq!(desc.row_bytes(), Some(16 * u64::from(u32::MAX)));
        assert_eq!(desc.size_bytes(), None);
    }
}
