//! Rendering textures shared with the compute side.

use std::fmt;
use std::rc::Rc;

use crate::context::InteropContext;
use crate::driver::{ArrayHandle, Driver, DriverCall, ResourceHandle, TextureId};
use crate::error::{CheckStatus, InteropError, Result};
use crate::render::RenderTexture;
use crate::types::{RegisterFlags, TextureDesc, TextureTarget};

/// A 2D rendering texture registered with the compute driver.
///
/// Mirrors [`crate::SharedBuffer`]: the registration is created after the texture and
/// released before it.
pub struct SharedImage<D: Driver> {
    ctx: Rc<InteropContext<D>>,
    texture: Option<RenderTexture<D>>,
    registration: Option<ResourceHandle>,
}

impl<D: Driver> SharedImage<D> {
    pub fn new(ctx: &Rc<InteropContext<D>>) -> Self {
        Self {
            ctx: Rc::clone(ctx),
            texture: None,
            registration: None,
        }
    }

    pub fn with_desc(
        ctx: &Rc<InteropContext<D>>,
        desc: TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        let mut image = Self::new(ctx);
        image.reinitialise(desc, data)?;
        Ok(image)
    }

    /// Replace the texture and its registration.
    ///
    /// `data`, when given, is laid out as `desc.layout`/`desc.pixel_type`. A `desc`
    /// whose storage size overflows is rejected before anything is released.
    pub fn reinitialise(&mut self, desc: TextureDesc, data: Option<&[u8]>) -> Result<()> {
        desc.size_bytes().ok_or(InteropError::SizeOverflow)?;
        self.release();

        let texture = RenderTexture::new(&self.ctx, desc, data)?;
        let id = texture.id();
        self.texture = Some(texture);

        match self
            .ctx
            .driver()
            .register_image(id, TextureTarget::Texture2d, RegisterFlags::NONE)
        {
            Ok(handle) => {
                tracing::debug!(?id, ?handle, "registered shared image");
                self.registration = Some(handle);
                Ok(())
            }
            Err(status) => self
                .ctx
                .registration_failed(DriverCall::RegisterImage, status),
        }
    }

    fn release(&mut self) {
        if let Some(handle) = self.registration.take() {
            self.ctx.release_registration(handle);
        }
        self.texture = None;
    }

    /// Open the compute-side lease.
    ///
    /// There is no local "already mapped" check; a second concurrent lease is refused
    /// by the driver.
    pub fn map(&self) -> Result<MappedImage<'_, D>> {
        let registration = self.registration.ok_or(InteropError::NotRegistered)?;
        self.ctx
            .driver()
            .map(registration, self.ctx.config().stream)
            .check(DriverCall::Map)?;
        Ok(MappedImage {
            image: self,
            registration,
        })
    }

    pub fn desc(&self) -> Option<&TextureDesc> {
        self.texture.as_ref().map(RenderTexture::desc)
    }

    pub fn texture(&self) -> Option<&RenderTexture<D>> {
        self.texture.as_ref()
    }

    pub fn texture_id(&self) -> Option<TextureId> {
        self.texture.as_ref().map(RenderTexture::id)
    }

    pub fn registration(&self) -> Option<ResourceHandle> {
        self.registration
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    pub fn context(&self) -> &Rc<InteropContext<D>> {
        &self.ctx
    }
}

impl<D: Driver> Drop for SharedImage<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Driver> fmt::Debug for SharedImage<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedImage")
            .field("texture", &self.texture)
            .field("registration", &self.registration)
            .finish()
    }
}

/// Compute-side lease on a [`SharedImage`].
pub struct MappedImage<'a, D: Driver> {
    image: &'a SharedImage<D>,
    registration: ResourceHandle,
}

impl<'a, D: Driver> MappedImage<'a, D> {
    /// Array backing mip level 0 of layer 0.
    pub fn array(&self) -> Result<ArrayHandle> {
        self.image
            .ctx
            .driver()
            .mapped_array(self.registration, 0, 0)
            .check(DriverCall::MappedArray)
    }

    pub fn image(&self) -> &'a SharedImage<D> {
        self.image
    }

    fn unmap_inner(&self) -> Result<()> {
        self.image
            .ctx
            .driver()
            .unmap(self.registration, self.image.ctx.config().stream)
            .check(DriverCall::Unmap)
    }

    /// Release the lease, returning any driver error.
    pub fn unmap(self) -> Result<()> {
        let result = self.unmap_inner();
        std::mem::forget(self);
        result
    }
}

impl<D: Driver> Drop for MappedImage<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.unmap_inner() {
            tracing::warn!("failed to unmap shared image: {err}");
        }
    }
}

impl<D: Driver> fmt::Debug for MappedImage<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedImage")
            .field("registration", &self.registration)
            .finish()
    }
}
