//! Rendering buffers shared with the compute side.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::context::InteropContext;
use crate::driver::{BufferId, DevicePtr, Driver, DriverCall, ResourceHandle};
use crate::error::{CheckStatus, InteropError, Result};
use crate::render::RenderBuffer;
use crate::types::{BufferDesc, BufferKind, BufferUsage, RegisterFlags};

/// A rendering-side buffer that is also registered with the compute driver.
///
/// The registration only exists while the rendering allocation does; both are
/// replaced together by [`SharedBuffer::reinitialise`] and released together on drop.
///
/// Compute access goes through [`SharedBuffer::map`], which hands out a
/// [`MappedBuffer`] lease. At most one lease is open at a time.
pub struct SharedBuffer<D: Driver> {
    ctx: Rc<InteropContext<D>>,
    desc: Option<BufferDesc>,
    buffer: Option<RenderBuffer<D>>,
    registration: Option<ResourceHandle>,
    // Access-rights state, not data: flipped through `&self` by the lease.
    mapped: Cell<bool>,
}

impl<D: Driver> SharedBuffer<D> {
    /// An empty buffer: no allocation, no registration.
    pub fn new(ctx: &Rc<InteropContext<D>>) -> Self {
        Self {
            ctx: Rc::clone(ctx),
            desc: None,
            buffer: None,
            registration: None,
            mapped: Cell::new(false),
        }
    }

    pub fn with_desc(ctx: &Rc<InteropContext<D>>, desc: BufferDesc) -> Result<Self> {
        let mut buffer = Self::new(ctx);
        buffer.reinitialise(desc)?;
        Ok(buffer)
    }

    pub fn with_size(
        ctx: &Rc<InteropContext<D>>,
        kind: BufferKind,
        size_bytes: u32,
        register_flags: RegisterFlags,
        usage: BufferUsage,
    ) -> Result<Self> {
        let mut buffer = Self::new(ctx);
        buffer.reinitialise_size(kind, size_bytes, register_flags, usage)?;
        Ok(buffer)
    }

    /// Replace the allocation and registration with ones shaped by `desc`.
    ///
    /// Any previous registration is released first (failures are logged, not returned).
    /// If the rendering allocation fails the buffer is left empty, with no desc.
    /// A zero-sized `desc` leaves the buffer empty without calling the compute driver.
    /// If registration fails the rendering allocation is kept; whether the failure is
    /// returned depends on the context's [`crate::RegistrationPolicy`].
    pub fn reinitialise(&mut self, desc: BufferDesc) -> Result<()> {
        let size_bytes = desc.size_bytes().ok_or(InteropError::SizeOverflow)?;

        self.release();
        self.desc = None;
        if size_bytes == 0 {
            tracing::debug!(kind = ?desc.kind, "zero-sized shared buffer left unallocated");
            self.desc = Some(desc);
            return Ok(());
        }

        let buffer = RenderBuffer::new(&self.ctx, desc)?;
        let id = buffer.id();
        self.buffer = Some(buffer);
        self.desc = Some(desc);

        match self.ctx.driver().register_buffer(id, desc.register_flags) {
            Ok(handle) => {
                tracing::debug!(?id, ?handle, flags = ?desc.register_flags, "registered shared buffer");
                self.registration = Some(handle);
                Ok(())
            }
            Err(status) => self
                .ctx
                .registration_failed(DriverCall::RegisterBuffer, status),
        }
    }

    /// Byte-sized variant of [`SharedBuffer::reinitialise`].
    pub fn reinitialise_size(
        &mut self,
        kind: BufferKind,
        size_bytes: u32,
        register_flags: RegisterFlags,
        usage: BufferUsage,
    ) -> Result<()> {
        self.reinitialise(
            BufferDesc::bytes(kind, size_bytes)
                .with_register_flags(register_flags)
                .with_usage(usage),
        )
    }

    /// Re-run the full allocation/registration sequence with `other`'s shape.
    ///
    /// Only configuration is copied; contents and registration are not shared.
    pub fn reinitialise_from(&mut self, other: &Self) -> Result<()> {
        match other.desc {
            Some(desc) => self.reinitialise(desc),
            None => {
                self.release();
                self.desc = None;
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        if let Some(handle) = self.registration.take() {
            self.ctx.release_registration(handle);
        }
        self.buffer = None;
    }

    /// Open the compute-side lease.
    pub fn map(&self) -> Result<MappedBuffer<'_, D>> {
        if self.mapped.get() {
            return Err(InteropError::AlreadyMapped);
        }
        let handle = self.registration.ok_or(InteropError::NotRegistered)?;
        self.ctx
            .driver()
            .map(handle, self.ctx.config().stream)
            .check(DriverCall::Map)?;
        self.mapped.set(true);
        Ok(MappedBuffer { buffer: self })
    }

    pub(crate) fn unmap(&self) -> Result<()> {
        if !self.mapped.get() {
            return Err(InteropError::NotMapped);
        }
        let handle = self.registration.ok_or(InteropError::NotRegistered)?;
        self.ctx
            .driver()
            .unmap(handle, self.ctx.config().stream)
            .check(DriverCall::Unmap)?;
        self.mapped.set(false);
        Ok(())
    }

    pub fn bind(&self) -> Result<()> {
        self.render_buffer().ok_or(InteropError::NotAllocated)?.bind()
    }

    pub fn unbind(&self) -> Result<()> {
        self.render_buffer().ok_or(InteropError::NotAllocated)?.unbind()
    }

    pub fn desc(&self) -> Option<&BufferDesc> {
        self.desc.as_ref()
    }

    pub fn render_buffer(&self) -> Option<&RenderBuffer<D>> {
        self.buffer.as_ref()
    }

    pub fn buffer_id(&self) -> Option<BufferId> {
        self.buffer.as_ref().map(RenderBuffer::id)
    }

    pub fn size_bytes(&self) -> u64 {
        self.buffer.as_ref().map_or(0, RenderBuffer::size_bytes)
    }

    pub fn registration(&self) -> Option<ResourceHandle> {
        self.registration
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.get()
    }

    pub fn context(&self) -> &Rc<InteropContext<D>> {
        &self.ctx
    }
}

impl<D: Driver> Drop for SharedBuffer<D> {
    fn drop(&mut self) {
        // Unregister before the rendering buffer is deleted.
        self.release();
    }
}

impl<D: Driver> fmt::Debug for SharedBuffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("desc", &self.desc)
            .field("buffer", &self.buffer)
            .field("registration", &self.registration)
            .field("mapped", &self.mapped.get())
            .finish()
    }
}

/// Compute-side lease on a [`SharedBuffer`].
///
/// The rendering API must not use the buffer while the lease is alive. Dropping the
/// lease unmaps the buffer; use [`MappedBuffer::unmap`] to observe unmap failures.
pub struct MappedBuffer<'a, D: Driver> {
    buffer: &'a SharedBuffer<D>,
}

impl<'a, D: Driver> MappedBuffer<'a, D> {
    /// Device address of the mapped memory.
    pub fn device_ptr(&self) -> Result<DevicePtr> {
        self.mapped_range().map(|(ptr, _)| ptr)
    }

    /// Device address and byte length as reported by the driver.
    ///
    /// The length is not checked against the buffer's declared size.
    pub fn mapped_range(&self) -> Result<(DevicePtr, u64)> {
        debug_assert!(self.buffer.is_mapped());
        let handle = self.buffer.registration.ok_or(InteropError::NotRegistered)?;
        self.buffer
            .ctx
            .driver()
            .mapped_pointer(handle)
            .check(DriverCall::MappedPointer)
    }

    pub fn buffer(&self) -> &'a SharedBuffer<D> {
        self.buffer
    }

    /// Release the lease, returning any driver error.
    pub fn unmap(self) -> Result<()> {
        let buffer = self.buffer;
        std::mem::forget(self);
        buffer.unmap()
    }
}

impl<D: Driver> Drop for MappedBuffer<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.buffer.unmap() {
            tracing::warn!("failed to unmap shared buffer: {err}");
        }
    }
}

impl<D: Driver> fmt::Debug for MappedBuffer<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("registration", &self.buffer.registration)
            .finish()
    }
}
