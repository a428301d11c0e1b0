//! Driver seams.
//!
//! The wrappers in this crate never talk to a vendor driver directly. Rendering-side
//! calls go through [`RenderApi`], compute-side interop calls go through
//! [`ComputeInterop`]. Every call is a single blocking round-trip. For tests and
//! headless use we provide a deterministic software implementation ([`SoftDriver`]).

mod soft;

use core::fmt;
use core::num::{NonZeroU32, NonZeroU64};

use thiserror::Error;

use crate::types::{
    BufferKind, BufferUsage, ElementType, PixelLayout, RegisterFlags, TextureDesc,
    TextureTarget,
};

pub use soft::{SoftDriver, SoftStats};

/// Rendering-side buffer object name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub NonZeroU32);

/// Rendering-side texture object name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub NonZeroU32);

/// Compute-side registration of a rendering resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub NonZeroU64);

/// Compute-side array backing a mapped image sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayHandle(pub NonZeroU64);

/// Address in the compute device's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    pub fn offset(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Compute stream that map/unmap calls are ordered on. Stream 0 is the default stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Stream(pub u64);

/// Direction of a compute-side memory copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKind {
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

/// Parameters of a 2D copy into a compute array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Copy2d {
    /// Destination x offset in bytes.
    pub dst_x_bytes: u64,
    /// Destination y offset in rows.
    pub dst_y: u32,
    pub src: DevicePtr,
    /// Distance between consecutive source rows, in bytes.
    pub src_pitch: u64,
    pub width_bytes: u64,
    pub height: u32,
    pub kind: CopyKind,
}

/// Names of the compute-interop entry points, for diagnostics and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCall {
    RegisterBuffer,
    RegisterImage,
    Unregister,
    Map,
    Unmap,
    MappedPointer,
    MappedArray,
    Memcpy2dToArray,
}

impl DriverCall {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterBuffer => "register_buffer",
            Self::RegisterImage => "register_image",
            Self::Unregister => "unregister",
            Self::Map => "map",
            Self::Unmap => "unmap",
            Self::MappedPointer => "mapped_pointer",
            Self::MappedArray => "mapped_array",
            Self::Memcpy2dToArray => "memcpy_2d_to_array",
        }
    }
}

impl fmt::Display for DriverCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status codes reported by the compute interop driver.
///
/// The numeric values are the driver's; `Other` carries codes we don't name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeStatus {
    Success,
    InvalidValue,
    MemoryAllocation,
    InvalidPitchValue,
    MapBufferObjectFailed,
    UnmapBufferObjectFailed,
    AlreadyMapped,
    NotMapped,
    NotMappedAsArray,
    NotMappedAsPointer,
    InvalidGraphicsContext,
    InvalidResourceHandle,
    Unknown,
    Other(u32),
}

impl ComputeStatus {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::InvalidValue,
            2 => Self::MemoryAllocation,
            12 => Self::InvalidPitchValue,
            205 => Self::MapBufferObjectFailed,
            206 => Self::UnmapBufferObjectFailed,
            208 => Self::AlreadyMapped,
            211 => Self::NotMapped,
            212 => Self::NotMappedAsArray,
            213 => Self::NotMappedAsPointer,
            219 => Self::InvalidGraphicsContext,
            400 => Self::InvalidResourceHandle,
            999 => Self::Unknown,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::InvalidValue => 1,
            Self::MemoryAllocation => 2,
            Self::InvalidPitchValue => 12,
            Self::MapBufferObjectFailed => 205,
            Self::UnmapBufferObjectFailed => 206,
            Self::AlreadyMapped => 208,
            Self::NotMapped => 211,
            Self::NotMappedAsArray => 212,
            Self::NotMappedAsPointer => 213,
            Self::InvalidGraphicsContext => 219,
            Self::InvalidResourceHandle => 400,
            Self::Unknown => 999,
            Self::Other(code) => code,
        }
    }

    /// Human-readable description, as the driver would report it.
    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "no error",
            Self::InvalidValue => "invalid argument",
            Self::MemoryAllocation => "out of memory",
            Self::InvalidPitchValue => "invalid pitch argument",
            Self::MapBufferObjectFailed => "mapping of buffer object failed",
            Self::UnmapBufferObjectFailed => "unmapping of buffer object failed",
            Self::AlreadyMapped => "resource already mapped",
            Self::NotMapped => "resource not mapped",
            Self::NotMappedAsArray => "resource not mapped as array",
            Self::NotMappedAsPointer => "resource not mapped as pointer",
            Self::InvalidGraphicsContext => "invalid OpenGL or DirectX context",
            Self::InvalidResourceHandle => "invalid resource handle",
            Self::Unknown | Self::Other(_) => "unknown error",
        }
    }
}

impl fmt::Display for ComputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description(), self.code())
    }
}

/// Failures reported by the rendering API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("out of memory allocating {size_bytes} bytes")]
    OutOfMemory { size_bytes: u64 },
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("no buffer bound to {0:?}")]
    NoBufferBound(BufferKind),
    #[error("no texture bound")]
    NoTextureBound,
    #[error("pixel data is {actual} bytes but {expected} are required")]
    DataTooSmall { expected: u64, actual: u64 },
    #[error("pixel data of {data_bytes_per_pixel} bytes/pixel does not match {internal_bytes_per_texel} bytes/texel storage")]
    FormatMismatch {
        data_bytes_per_pixel: u32,
        internal_bytes_per_texel: u32,
    },
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

/// Rendering API seam.
pub trait RenderApi {
    fn create_buffer(
        &self,
        kind: BufferKind,
        size_bytes: u64,
        usage: BufferUsage,
    ) -> Result<BufferId, RenderError>;
    fn delete_buffer(&self, id: BufferId);
    fn bind_buffer(&self, kind: BufferKind, id: Option<BufferId>) -> Result<(), RenderError>;

    fn create_texture_2d(
        &self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, RenderError>;
    fn delete_texture(&self, id: TextureId);
    fn bind_texture(&self, id: Option<TextureId>) -> Result<(), RenderError>;

    /// Re-specify mip 0 of the bound texture from the bound pixel-unpack buffer.
    ///
    /// Storage shape (`internal_format`, `width`, `height`) comes from `desc`; the
    /// buffer contents are interpreted as `layout`/`pixel_type`.
    fn tex_image_2d_from_unpack_buffer(
        &self,
        desc: &TextureDesc,
        layout: PixelLayout,
        pixel_type: ElementType,
    ) -> Result<(), RenderError>;
}

/// Compute interop seam.
pub trait ComputeInterop {
    fn register_buffer(
        &self,
        buffer: BufferId,
        flags: RegisterFlags,
    ) -> Result<ResourceHandle, ComputeStatus>;
    fn register_image(
        &self,
        texture: TextureId,
        target: TextureTarget,
        flags: RegisterFlags,
    ) -> Result<ResourceHandle, ComputeStatus>;
    fn unregister(&self, resource: ResourceHandle) -> Result<(), ComputeStatus>;

    fn map(&self, resource: ResourceHandle, stream: Stream) -> Result<(), ComputeStatus>;
    fn unmap(&self, resource: ResourceHandle, stream: Stream) -> Result<(), ComputeStatus>;

    /// Pointer and byte length of a mapped buffer resource.
    fn mapped_pointer(&self, resource: ResourceHandle)
        -> Result<(DevicePtr, u64), ComputeStatus>;
    /// Array backing one sub-resource of a mapped image resource.
    fn mapped_array(
        &self,
        resource: ResourceHandle,
        array_index: u32,
        mip_level: u32,
    ) -> Result<ArrayHandle, ComputeStatus>;

    fn memcpy_2d_to_array(&self, dst: ArrayHandle, copy: &Copy2d) -> Result<(), ComputeStatus>;
}

/// A driver that provides both halves of the interop.
pub trait Driver: RenderApi + ComputeInterop {}

impl<T: RenderApi + ComputeInterop> Driver for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip_through_from_code() {
        for status in [
            ComputeStatus::Success,
            ComputeStatus::InvalidValue,
            ComputeStatus::InvalidPitchValue,
            ComputeStatus::AlreadyMapped,
            ComputeStatus::NotMapped,
            ComputeStatus::InvalidResourceHandle,
            ComputeStatus::Unknown,
        ] {
            assert_eq!(ComputeStatus::from_code(status.code()), status);
        }
        assert_eq!(ComputeStatus::from_code(77), ComputeStatus::Other(77));
        assert_eq!(ComputeStatus::Other(77).description(), "unknown error");
    }

    #[test]
    fn status_display_includes_code_and_description() {
        assert_eq!(
            ComputeStatus::AlreadyMapped.to_string(),
            "resource already mapped (code 208)"
        );
    }
}
