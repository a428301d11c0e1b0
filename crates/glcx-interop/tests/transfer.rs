mod common;

use glcx_interop::driver::{ComputeStatus, DriverCall, RenderError};
use glcx_interop::types::{
    BufferDesc, BufferKind, ElementType, InternalFormat, PixelLayout, TextureDesc,
};
use glcx_interop::{
    copy_buffer_to_texture, copy_device_to_image, InteropError, RegistrationPolicy,
    RenderTexture, Result, SharedBuffer, SharedImage,
};
use pretty_assertions::assert_eq;

#[test]
fn device_copy_with_packed_rows() -> Result<()> {
    let ctx = common::soft_context();
    let (width, height) = (5u32, 3u32);
    let image = SharedImage::with_desc(&ctx, TextureDesc::new(width, height, InternalFormat::Rgba8), None)?;

    let row_bytes = width as usize * 4;
    let src = ctx
        .driver()
        .alloc_device(&common::packed_rows(height as usize, row_bytes));
    copy_device_to_image::<[u8; 4], _>(src, row_bytes as u64, &image)?;

    let texture = image.texture_id().unwrap();
    assert_eq!(
        ctx.driver().texture_data(texture),
        Some(common::packed_rows(height as usize, row_bytes))
    );
    assert_eq!(ctx.driver().stats().copies_2d, 1);
    assert_eq!(ctx.driver().stats().maps, ctx.driver().stats().unmaps);
    Ok(())
}

#[test]
fn device_copy_honours_source_pitch() -> Result<()> {
    let ctx = common::soft_context();
    let (width, height) = (6u32, 4u32);
    let image = SharedImage::with_desc(&ctx, TextureDesc::new(width, height, InternalFormat::R32F), None)?;

    let row_bytes = width as usize * std::mem::size_of::<f32>();
    let pad = 40;
    let src = ctx
        .driver()
        .alloc_device(&common::pitched_rows(height as usize, row_bytes, pad));
    copy_device_to_image::<f32, _>(src, (row_bytes + pad) as u64, &image)?;

    let data = ctx.driver().texture_data(image.texture_id().unwrap()).unwrap();
    assert_eq!(data.len(), height as usize * row_bytes);
    assert_eq!(data, common::packed_rows(height as usize, row_bytes));
    assert!(!data.contains(&0xEE));
    Ok(())
}

#[test]
fn device_copy_only_covers_width_times_element_size() -> Result<()> {
    let ctx = common::soft_context();
    let image = SharedImage::with_desc(&ctx, TextureDesc::new(4, 2, InternalFormat::Rgba8), None)?;

    // One byte per texel copied into a four-byte-per-texel image touches the first quarter of each row.
    let src = ctx.driver().alloc_device(&[0xAB; 8]);
    copy_device_to_image::<u8, _>(src, 4, &image)?;

    let data = ctx.driver().texture_data(image.texture_id().unwrap()).unwrap();
    for row in data.chunks(16) {
        assert_eq!(&row[..4], &[0xAB; 4]);
        assert_eq!(&row[4..], &[0; 12]);
    }
    Ok(())
}

#[test]
fn pitch_narrower_than_a_row_is_rejected_and_the_lease_released() {
    let ctx = common::soft_context();
    let image =
        SharedImage::with_desc(&ctx, TextureDesc::new(4, 4, InternalFormat::Rgba8), None).unwrap();
    let src = ctx.driver().alloc_device(&[0; 64]);

    let err = copy_device_to_image::<[u8; 4], _>(src, 8, &image).unwrap_err();
    assert!(matches!(
        err,
        InteropError::DriverCallFailed {
            call: DriverCall::Memcpy2dToArray,
            status: ComputeStatus::InvalidPitchValue,
            ..
        }
    ));
    assert_eq!(ctx.driver().stats().maps, 1);
    assert_eq!(ctx.driver().stats().unmaps, 1);
}

#[test]
fn device_copy_into_unregistered_image_is_an_error() {
    let ctx = common::soft_context_with(RegistrationPolicy::Report);
    ctx.driver()
        .fail_next(DriverCall::RegisterImage, ComputeStatus::InvalidGraphicsContext);
    let image =
        SharedImage::with_desc(&ctx, TextureDesc::new(4, 4, InternalFormat::Rgba8), None).unwrap();
    let src = ctx.driver().alloc_device(&[0; 64]);

    assert!(matches!(
        copy_device_to_image::<[u8; 4], _>(src, 16, &image),
        Err(InteropError::NotRegistered)
    ));
    assert_eq!(ctx.driver().stats().maps, 0);
}

#[test]
fn device_copy_into_empty_image_is_an_error() {
    let ctx = common::soft_context();
    let image = SharedImage::new(&ctx);
    let src = ctx.driver().alloc_device(&[0; 4]);
    assert!(matches!(
        copy_device_to_image::<u8, _>(src, 4, &image),
        Err(InteropError::NotAllocated)
    ));
}

#[test]
fn buffer_upload_replaces_texture_contents_and_clears_bindings() -> Result<()> {
    let ctx = common::soft_context();
    let (width, height) = (3u32, 2u32);
    let pixels = common::packed_rows(height as usize, width as usize * 4);

    let buffer = SharedBuffer::with_desc(
        &ctx,
        BufferDesc::new(BufferKind::PixelUnpack, width * height, ElementType::UnsignedByte, 4),
    )?;
    ctx.driver()
        .write_buffer(buffer.buffer_id().unwrap(), 0, &pixels)?;
    let texture = RenderTexture::new(&ctx, TextureDesc::new(width, height, InternalFormat::Rgba8), None)?;

    copy_buffer_to_texture(&buffer, &texture, PixelLayout::Rgba, ElementType::UnsignedByte)?;

    assert_eq!(ctx.driver().texture_data(texture.id()), Some(pixels));
    assert_eq!(ctx.driver().stats().texture_uploads, 1);
    assert_eq!(ctx.driver().bound_buffer(BufferKind::PixelUnpack), None);
    assert_eq!(ctx.driver().bound_texture(), None);
    Ok(())
}

#[test]
fn buffer_upload_refuses_a_leased_buffer() {
    let ctx = common::soft_context();
    let buffer = SharedBuffer::with_desc(&ctx, BufferDesc::bytes(BufferKind::PixelUnpack, 16)).unwrap();
    let texture =
        RenderTexture::new(&ctx, TextureDesc::new(2, 2, InternalFormat::Rgba8), None).unwrap();

    let lease = buffer.map().unwrap();
    assert!(matches!(
        copy_buffer_to_texture(&buffer, &texture, PixelLayout::Rgba, ElementType::UnsignedByte),
        Err(InteropError::AlreadyMapped)
    ));
    drop(lease);

    copy_buffer_to_texture(&buffer, &texture, PixelLayout::Rgba, ElementType::UnsignedByte)
        .unwrap();
}

#[test]
fn failed_buffer_upload_still_clears_bindings() {
    let ctx = common::soft_context();
    let buffer = SharedBuffer::with_desc(&ctx, BufferDesc::bytes(BufferKind::PixelUnpack, 8)).unwrap();
    let texture =
        RenderTexture::new(&ctx, TextureDesc::new(2, 2, InternalFormat::Rgba8), None).unwrap();

    let err = copy_buffer_to_texture(&buffer, &texture, PixelLayout::Rgba, ElementType::UnsignedByte)
        .unwrap_err();
    assert!(matches!(
        err,
        InteropError::Render(RenderError::DataTooSmall {
            expected: 16,
            actual: 8
        })
    ));
    assert_eq!(ctx.driver().bound_buffer(BufferKind::PixelUnpack), None);
    assert_eq!(ctx.driver().bound_texture(), None);
    assert_eq!(ctx.driver().stats().texture_uploads, 0);
}

#[test]
fn kernel_output_reaches_a_shared_image_without_host_copies() -> Result<()> {
    let ctx = common::soft_context();
    let (width, height) = (4u32, 4u32);
    let frame = common::packed_rows(height as usize, width as usize * 4);

    let buffer = SharedBuffer::with_desc(
        &ctx,
        BufferDesc::new(BufferKind::PixelUnpack, width * height, ElementType::UnsignedByte, 4),
    )?;
    let image = SharedImage::with_desc(&ctx, TextureDesc::new(width, height, InternalFormat::Rgba8), None)?;

    {
        let lease = buffer.map()?;
        let ptr = lease.device_ptr()?;
        ctx.driver()
            .write_device(ptr, &frame)
            .map_err(|status| InteropError::driver(DriverCall::MappedPointer, status))?;
        lease.unmap()?;
    }

    copy_buffer_to_texture(
        &buffer,
        image.texture().unwrap(),
        PixelLayout::Bgra,
        ElementType::UnsignedByte,
    )?;
    assert_eq!(ctx.driver().texture_data(image.texture_id().unwrap()), Some(frame));
    Ok(())
}
