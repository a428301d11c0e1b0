//! Rendering-side objects the shared resources are built on.

use std::fmt;
use std::rc::Rc;

use crate::context::InteropContext;
use crate::driver::{BufferId, Driver, TextureId};
use crate::error::{InteropError, Result};
use crate::types::{BufferDesc, BufferKind, TextureDesc};

/// A rendering-side buffer object. Deleted on drop.
pub struct RenderBuffer<D: Driver> {
    ctx: Rc<InteropContext<D>>,
    id: BufferId,
    desc: BufferDesc,
    size_bytes: u64,
}

impl<D: Driver> RenderBuffer<D> {
    pub fn new(ctx: &Rc<InteropContext<D>>, desc: BufferDesc) -> Result<Self> {
        let size_bytes = desc.size_bytes().ok_or(InteropError::SizeOverflow)?;
        let id = ctx
            .driver()
            .create_buffer(desc.kind, size_bytes, desc.usage)?;
        tracing::debug!(?id, kind = ?desc.kind, size_bytes, "created render buffer");
        Ok(Self {
            ctx: Rc::clone(ctx),
            id,
            desc,
            size_bytes,
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Bind to the buffer's own binding point.
    pub fn bind(&self) -> Result<()> {
        self.bind_as(self.desc.kind)
    }

    pub fn unbind(&self) -> Result<()> {
        self.unbind_as(self.desc.kind)
    }

    pub fn bind_as(&self, kind: BufferKind) -> Result<()> {
        Ok(self.ctx.driver().bind_buffer(kind, Some(self.id))?)
    }

    pub fn unbind_as(&self, kind: BufferKind) -> Result<()> {
        Ok(self.ctx.driver().bind_buffer(kind, None)?)
    }
}

impl<D: Driver> Drop for RenderBuffer<D> {
    fn drop(&mut self) {
        self.ctx.driver().delete_buffer(self.id);
    }
}

impl<D: Driver> fmt::Debug for RenderBuffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBuffer")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// A rendering-side 2D texture. Deleted on drop.
pub struct RenderTexture<D: Driver> {
    ctx: Rc<InteropContext<D>>,
    id: TextureId,
    desc: TextureDesc,
}

impl<D: Driver> RenderTexture<D> {
    /// Create the texture, optionally initialised from `data` laid out as
    /// `desc.layout`/`desc.pixel_type`.
    pub fn new(ctx: &Rc<InteropContext<D>>, desc: TextureDesc, data: Option<&[u8]>) -> Result<Self> {
        let id = ctx.driver().create_texture_2d(&desc, data)?;
        tracing::debug!(
            ?id,
            width = desc.width,
            height = desc.height,
            format = ?desc.internal_format,
            "created render texture"
        );
        Ok(Self {
            ctx: Rc::clone(ctx),
            id,
            desc,
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn bind(&self) -> Result<()> {
        Ok(self.ctx.driver().bind_texture(Some(self.id))?)
    }

    pub fn unbind(&self) -> Result<()> {
        Ok(self.ctx.driver().bind_texture(None)?)
    }
}

impl<D: Driver> Drop for RenderTexture<D> {
    fn drop(&mut self) {
        self.ctx.driver().delete_texture(self.id);
    }
}

impl<D: Driver> fmt::Debug for RenderTexture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTexture")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InteropConfig;
    use crate::driver::SoftDriver;
    use crate::types::{ElementType, InternalFormat};

    #[test]
    fn render_buffer_is_deleted_on_drop() {
        let ctx = InteropContext::new(SoftDriver::new(), InteropConfig::default());
        let desc = BufferDesc::new(BufferKind::Array, 8, ElementType::Float, 4);
        let buffer = RenderBuffer::new(&ctx, desc).unwrap();
        assert_eq!(buffer.size_bytes(), 128);
        assert_eq!(ctx.driver().live_buffers(), 1);

        buffer.bind().unwrap();
        assert_eq!(ctx.driver().bound_buffer(BufferKind::Array), Some(buffer.id()));
        buffer.unbind().unwrap();
        assert_eq!(ctx.driver().bound_buffer(BufferKind::Array), None);

        drop(buffer);
        assert_eq!(ctx.driver().live_buffers(), 0);
        assert_eq!(ctx.driver().stats().buffers_deleted, 1);
    }

    #[test]
    fn render_texture_keeps_initial_data() {
        let ctx = InteropContext::new(SoftDriver::new(), InteropConfig::default());
        let desc = TextureDesc::new(2, 1, InternalFormat::Rgba8);
        let pixels = [1, 2, 3, 4, 5, 6, 7, 8];
        let texture = RenderTexture::new(&ctx, desc, Some(&pixels[..])).unwrap();
        assert_eq!(texture.width(), 2);
        assert_eq!(texture.height(), 1);
        assert_eq!(ctx.driver().texture_data(texture.id()), Some(pixels.to_vec()));

        drop(texture);
        assert_eq!(ctx.driver().live_textures(), 0);
    }
}
