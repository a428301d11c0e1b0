//! Copies between shared resources that never touch host memory.

use crate::buffer::SharedBuffer;
use crate::driver::{Copy2d, CopyKind, DevicePtr, Driver, DriverCall};
use crate::error::{CheckStatus, InteropError, Result};
use crate::image::SharedImage;
use crate::render::RenderTexture;
use crate::types::{BufferKind, ElementType, PixelLayout};

/// Re-specify `texture` from the contents of `buffer`.
///
/// The buffer is bound as the pixel-unpack source and interpreted as
/// `layout`/`pixel_type`; the texture keeps its internal format and dimensions. Both
/// bindings are cleared afterwards, also when the upload fails.
pub fn copy_buffer_to_texture<D: Driver>(
    buffer: &SharedBuffer<D>,
    texture: &RenderTexture<D>,
    layout: PixelLayout,
    pixel_type: ElementType,
) -> Result<()> {
    if buffer.is_mapped() {
        return Err(InteropError::AlreadyMapped);
    }
    let source = buffer.render_buffer().ok_or(InteropError::NotAllocated)?;
    let driver = buffer.context().driver();

    source.bind_as(BufferKind::PixelUnpack)?;
    let upload = texture.bind().and_then(|()| {
        driver
            .tex_image_2d_from_unpack_buffer(texture.desc(), layout, pixel_type)
            .map_err(InteropError::from)
    });
    let unbind_source = source.unbind_as(BufferKind::PixelUnpack);
    let unbind_texture = texture.unbind();

    upload?;
    unbind_source?;
    unbind_texture?;
    tracing::debug!(
        buffer = ?source.id(),
        texture = ?texture.id(),
        "uploaded texture from pixel-unpack buffer"
    );
    Ok(())
}

/// Copy a `width x height` block of `T` from device memory into `image`.
///
/// Source rows start `src_pitch` bytes apart; exactly `width * size_of::<T>()` bytes
/// are copied from each of the image's `height` rows.
pub fn copy_device_to_image<T: bytemuck::Pod, D: Driver>(
    src: DevicePtr,
    src_pitch: u64,
    image: &SharedImage<D>,
) -> Result<()> {
    let desc = *image.desc().ok_or(InteropError::NotAllocated)?;
    let width_bytes = u64::from(desc.width)
        .checked_mul(std::mem::size_of::<T>() as u64)
        .ok_or(InteropError::SizeOverflow)?;

    let lease = image.map()?;
    let array = lease.array()?;
    image
        .context()
        .driver()
        .memcpy_2d_to_array(
            array,
            &Copy2d {
                dst_x_bytes: 0,
                dst_y: 0,
                src,
                src_pitch,
                width_bytes,
                height: desc.height,
                kind: CopyKind::DeviceToDevice,
            },
        )
        .check(DriverCall::Memcpy2dToArray)?;
    lease.unmap()
}
