use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::num::{NonZeroU32, NonZeroU64};

use super::{
    ArrayHandle, BufferId, ComputeInterop, ComputeStatus, Copy2d, CopyKind, DevicePtr,
    DriverCall, RenderApi, RenderError, ResourceHandle, Stream, TextureId,
};
use crate::types::{
    BufferKind, BufferUsage, ElementType, PixelLayout, RegisterFlags, TextureDesc,
    TextureTarget,
};

const DEVICE_BASE: u64 = 0x1000_0000;
const DEVICE_ALIGN: u64 = 256;

/// Call counters kept by [`SoftDriver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftStats {
    pub buffers_created: u32,
    pub buffers_deleted: u32,
    pub textures_created: u32,
    pub textures_deleted: u32,
    pub texture_uploads: u32,
    pub registrations: u32,
    pub unregistrations: u32,
    pub maps: u32,
    pub unmaps: u32,
    pub copies_2d: u32,
}

#[derive(Debug)]
struct SoftBuffer {
    data: Vec<u8>,
    device_addr: u64,
}

#[derive(Debug)]
struct SoftTexture {
    desc: TextureDesc,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SoftTarget {
    Buffer(BufferId),
    Image(TextureId),
}

#[derive(Debug)]
struct SoftResource {
    target: SoftTarget,
    mapped: bool,
}

#[derive(Debug)]
struct SoftState {
    next_name: u32,
    next_handle: u64,
    next_device_addr: u64,
    buffers: HashMap<BufferId, SoftBuffer>,
    textures: HashMap<TextureId, SoftTexture>,
    bound_buffers: HashMap<BufferKind, BufferId>,
    bound_texture: Option<TextureId>,
    resources: HashMap<ResourceHandle, SoftResource>,
    arrays: HashMap<ArrayHandle, ResourceHandle>,
    allocations: BTreeMap<u64, Vec<u8>>,
    faults: HashMap<DriverCall, ComputeStatus>,
    memory_limit: Option<u64>,
    stream_ops: Vec<(DriverCall, Stream)>,
    stats: SoftStats,
}

impl SoftState {
    fn new() -> Self {
        Self {
            next_name: 1,
            next_handle: 1,
            next_device_addr: DEVICE_BASE,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound_buffers: HashMap::new(),
            bound_texture: None,
            resources: HashMap::new(),
            arrays: HashMap::new(),
            allocations: BTreeMap::new(),
            faults: HashMap::new(),
            memory_limit: None,
            stream_ops: Vec::new(),
            stats: SoftStats::default(),
        }
    }

    fn alloc_name(&mut self) -> NonZeroU32 {
        let name = NonZeroU32::new(self.next_name).unwrap_or(NonZeroU32::MIN);
        self.next_name = self.next_name.wrapping_add(1).max(1);
        name
    }

    fn alloc_handle(&mut self) -> NonZeroU64 {
        let handle = NonZeroU64::new(self.next_handle).unwrap_or(NonZeroU64::MIN);
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        handle
    }

    fn alloc_device_range(&mut self, len: u64) -> u64 {
        let addr = self.next_device_addr;
        let span = len.max(1).div_ceil(DEVICE_ALIGN) * DEVICE_ALIGN;
        self.next_device_addr = self.next_device_addr.saturating_add(span);
        addr
    }

    fn take_fault(&mut self, call: DriverCall) -> Result<(), ComputeStatus> {
        match self.faults.remove(&call) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn buffer_is_mapped(&self, id: BufferId) -> bool {
        self.resources
            .values()
            .any(|res| res.mapped && res.target == SoftTarget::Buffer(id))
    }

    /// Locate `[addr, addr + len)` in device memory as `(owner, offset)`.
    ///
    /// Buffer memory is only addressable while one of its registrations is mapped.
    fn locate(&self, addr: u64, len: u64) -> Option<(DeviceRegion, usize)> {
        let end = addr.checked_add(len)?;
        if let Some((&base, data)) = self.allocations.range(..=addr).next_back() {
            if end <= base + data.len() as u64 {
                return Some((DeviceRegion::Allocation(base), (addr - base) as usize));
            }
        }
        self.buffers.iter().find_map(|(&id, buf)| {
            let base = buf.device_addr;
            let in_range = addr >= base && end <= base + buf.data.len() as u64;
            (in_range && self.buffer_is_mapped(id))
                .then(|| (DeviceRegion::Buffer(id), (addr - base) as usize))
        })
    }

    fn device_bytes(&self, region: DeviceRegion) -> Option<&[u8]> {
        match region {
            DeviceRegion::Allocation(base) => self.allocations.get(&base).map(Vec::as_slice),
            DeviceRegion::Buffer(id) => self.buffers.get(&id).map(|buf| buf.data.as_slice()),
        }
    }

    fn device_bytes_mut(&mut self, region: DeviceRegion) -> Option<&mut [u8]> {
        match region {
            DeviceRegion::Allocation(base) => {
                self.allocations.get_mut(&base).map(Vec::as_mut_slice)
            }
            DeviceRegion::Buffer(id) => self.buffers.get_mut(&id).map(|buf| buf.data.as_mut_slice()),
        }
    }

    fn read_device(&self, addr: u64, len: u64) -> Option<Vec<u8>> {
        let (region, offset) = self.locate(addr, len)?;
        let bytes = self.device_bytes(region)?;
        Some(bytes[offset..offset + len as usize].to_vec())
    }

    fn resource(&self, handle: ResourceHandle) -> Result<&SoftResource, ComputeStatus> {
        self.resources
            .get(&handle)
            .ok_or(ComputeStatus::InvalidResourceHandle)
    }

    fn resource_mut(&mut self, handle: ResourceHandle) -> Result<&mut SoftResource, ComputeStatus> {
        self.resources
            .get_mut(&handle)
            .ok_or(ComputeStatus::InvalidResourceHandle)
    }
}

#[derive(Debug, Clone, Copy)]
enum DeviceRegion {
    Allocation(u64),
    Buffer(BufferId),
}

fn check_pixel_format(desc: &TextureDesc, layout: PixelLayout, pixel_type: ElementType) -> Result<(), RenderError> {
    let data_bytes_per_pixel = layout.bytes_per_pixel(pixel_type);
    let internal_bytes_per_texel = desc.internal_format.bytes_per_texel();
    if data_bytes_per_pixel != internal_bytes_per_texel {
        return Err(RenderError::FormatMismatch {
            data_bytes_per_pixel,
            internal_bytes_per_texel,
        });
    }
    Ok(())
}

/// Storage size of `desc` as a host allocation length.
fn texture_len(desc: &TextureDesc) -> Result<usize, RenderError> {
    let size_bytes = desc.size_bytes().ok_or(RenderError::OutOfMemory { size_bytes: u64::MAX })?;
    usize::try_from(size_bytes).map_err(|_| RenderError::OutOfMemory { size_bytes })
}

fn texture_storage(desc: &TextureDesc, data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let expected = texture_len(desc)? as u64;
    let actual = data.len() as u64;
    if actual < expected {
        return Err(RenderError::DataTooSmall { expected, actual });
    }
    Ok(data[..expected as usize].to_vec())
}

/// Deterministic in-process driver implementing both [`RenderApi`] and
/// [`ComputeInterop`].
///
/// Rendering objects are plain byte vectors; the compute side sees a flat device address
/// space made of explicit allocations ([`SoftDriver::alloc_device`]) plus buffer storage,
/// which is only addressable while the buffer is mapped. No pixel format conversion is
/// performed: client data must have the same bytes per pixel as the texture storage.
///
/// Not `Sync`; like the drivers it stands in for, it must be used from one thread.
#[derive(Debug)]
pub struct SoftDriver {
    state: RefCell<SoftState>,
}

impl Default for SoftDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftDriver {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SoftState::new()),
        }
    }

    /// A driver whose rendering API refuses any single allocation above `bytes`.
    pub fn with_memory_limit(bytes: u64) -> Self {
        let driver = Self::new();
        driver.state.borrow_mut().memory_limit = Some(bytes);
        driver
    }

    pub fn stats(&self) -> SoftStats {
        self.state.borrow().stats
    }

    /// Make the next call to `call` fail with `status`.
    pub fn fail_next(&self, call: DriverCall, status: ComputeStatus) {
        self.state.borrow_mut().faults.insert(call, status);
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_registrations(&self) -> usize {
        self.state.borrow().resources.len()
    }

    pub fn is_mapped(&self, resource: ResourceHandle) -> bool {
        self.state
            .borrow()
            .resources
            .get(&resource)
            .is_some_and(|res| res.mapped)
    }

    /// Successful map/unmap calls in issue order, with the stream each was issued on.
    pub fn stream_ops(&self) -> Vec<(DriverCall, Stream)> {
        self.state.borrow().stream_ops.clone()
    }

    pub fn bound_buffer(&self, kind: BufferKind) -> Option<BufferId> {
        self.state.borrow().bound_buffers.get(&kind).copied()
    }

    pub fn bound_texture(&self) -> Option<TextureId> {
        self.state.borrow().bound_texture
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&id).map(|buf| buf.data.clone())
    }

    pub fn texture_data(&self, id: TextureId) -> Option<Vec<u8>> {
        self.state.borrow().textures.get(&id).map(|tex| tex.data.clone())
    }

    /// Host-side write into a rendering buffer (a `glBufferSubData` equivalent).
    pub fn write_buffer(&self, id: BufferId, offset: usize, bytes: &[u8]) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        let buf = state
            .buffers
            .get_mut(&id)
            .ok_or(RenderError::UnknownBuffer(id))?;
        let dst = offset
            .checked_add(bytes.len())
            .and_then(|end| buf.data.get_mut(offset..end))
            .ok_or(RenderError::InvalidOperation("buffer write out of bounds"))?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    /// Allocate device memory initialised with `bytes`.
    pub fn alloc_device(&self, bytes: &[u8]) -> DevicePtr {
        let mut state = self.state.borrow_mut();
        let addr = state.alloc_device_range(bytes.len() as u64);
        state.allocations.insert(addr, bytes.to_vec());
        DevicePtr(addr)
    }

    pub fn read_device(&self, ptr: DevicePtr, len: usize) -> Option<Vec<u8>> {
        self.state.borrow().read_device(ptr.0, len as u64)
    }

    /// Write through a device pointer, the way a compute kernel would.
    pub fn write_device(&self, ptr: DevicePtr, bytes: &[u8]) -> Result<(), ComputeStatus> {
        let mut state = self.state.borrow_mut();
        let (region, offset) = state
            .locate(ptr.0, bytes.len() as u64)
            .ok_or(ComputeStatus::InvalidValue)?;
        let dst = state
            .device_bytes_mut(region)
            .ok_or(ComputeStatus::InvalidValue)?;
        dst[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl RenderApi for SoftDriver {
    fn create_buffer(
        &self,
        _kind: BufferKind,
        size_bytes: u64,
        _usage: BufferUsage,
    ) -> Result<BufferId, RenderError> {
        let len = usize::try_from(size_bytes).map_err(|_| RenderError::OutOfMemory { size_bytes })?;
        let mut state = self.state.borrow_mut();
        if state.memory_limit.is_some_and(|limit| size_bytes > limit) {
            return Err(RenderError::OutOfMemory { size_bytes });
        }
        let id = BufferId(state.alloc_name());
        let device_addr = state.alloc_device_range(size_bytes);
        state.buffers.insert(
            id,
            SoftBuffer {
                data: vec![0; len],
                device_addr,
            },
        );
        state.stats.buffers_created += 1;
        Ok(id)
    }

    fn delete_buffer(&self, id: BufferId) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&id).is_some() {
            state.bound_buffers.retain(|_, bound| *bound != id);
            state.stats.buffers_deleted += 1;
        }
    }

    fn bind_buffer(&self, kind: BufferKind, id: Option<BufferId>) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        match id {
            Some(id) => {
                if !state.buffers.contains_key(&id) {
                    return Err(RenderError::UnknownBuffer(id));
                }
                state.bound_buffers.insert(kind, id);
            }
            None => {
                state.bound_buffers.remove(&kind);
            }
        }
        Ok(())
    }

    fn create_texture_2d(
        &self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, RenderError> {
        let data = match data {
            Some(data) => {
                check_pixel_format(desc, desc.layout, desc.pixel_type)?;
                texture_storage(desc, data)?
            }
            None => vec![0; texture_len(desc)?],
        };
        let mut state = self.state.borrow_mut();
        let id = TextureId(state.alloc_name());
        state.textures.insert(id, SoftTexture { desc: *desc, data });
        state.stats.textures_created += 1;
        Ok(id)
    }

    fn delete_texture(&self, id: TextureId) {
        let mut state = self.state.borrow_mut();
        if state.textures.remove(&id).is_some() {
            if state.bound_texture == Some(id) {
                state.bound_texture = None;
            }
            state.stats.textures_deleted += 1;
        }
    }

    fn bind_texture(&self, id: Option<TextureId>) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        if let Some(id) = id {
            if !state.textures.contains_key(&id) {
                return Err(RenderError::UnknownTexture(id));
            }
        }
        state.bound_texture = id;
        Ok(())
    }

    fn tex_image_2d_from_unpack_buffer(
        &self,
        desc: &TextureDesc,
        layout: PixelLayout,
        pixel_type: ElementType,
    ) -> Result<(), RenderError> {
        check_pixel_format(desc, layout, pixel_type)?;
        let mut state = self.state.borrow_mut();
        let buffer = *state
            .bound_buffers
            .get(&BufferKind::PixelUnpack)
            .ok_or(RenderError::NoBufferBound(BufferKind::PixelUnpack))?;
        let texture = state.bound_texture.ok_or(RenderError::NoTextureBound)?;

        let src = state
            .buffers
            .get(&buffer)
            .ok_or(RenderError::UnknownBuffer(buffer))?;
        let data = texture_storage(desc, &src.data)?;

        let tex = state
            .textures
            .get_mut(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        tex.desc.width = desc.width;
        tex.desc.height = desc.height;
        tex.desc.internal_format = desc.internal_format;
        tex.data = data;
        state.stats.texture_uploads += 1;
        Ok(())
    }
}

impl ComputeInterop for SoftDriver {
    fn register_buffer(
        &self,
        buffer: BufferId,
        _flags: RegisterFlags,
    ) -> Result<ResourceHandle, ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::RegisterBuffer)?;
        let buf = state.buffers.get(&buffer).ok_or(ComputeStatus::InvalidValue)?;
        if buf.data.is_empty() {
            return Err(ComputeStatus::InvalidValue);
        }
        let handle = ResourceHandle(state.alloc_handle());
        state.resources.insert(
            handle,
            SoftResource {
                target: SoftTarget::Buffer(buffer),
                mapped: false,
            },
        );
        state.stats.registrations += 1;
        Ok(handle)
    }

    fn register_image(
        &self,
        texture: TextureId,
        _target: TextureTarget,
        _flags: RegisterFlags,
    ) -> Result<ResourceHandle, ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::RegisterImage)?;
        if !state.textures.contains_key(&texture) {
            return Err(ComputeStatus::InvalidValue);
        }
        let handle = ResourceHandle(state.alloc_handle());
        state.resources.insert(
            handle,
            SoftResource {
                target: SoftTarget::Image(texture),
                mapped: false,
            },
        );
        state.stats.registrations += 1;
        Ok(handle)
    }

    fn unregister(&self, resource: ResourceHandle) -> Result<(), ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::Unregister)?;
        state
            .resources
            .remove(&resource)
            .ok_or(ComputeStatus::InvalidResourceHandle)?;
        state.arrays.retain(|_, owner| *owner != resource);
        state.stats.unregistrations += 1;
        Ok(())
    }

    fn map(&self, resource: ResourceHandle, stream: Stream) -> Result<(), ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::Map)?;
        let res = state.resource_mut(resource)?;
        if res.mapped {
            return Err(ComputeStatus::AlreadyMapped);
        }
        res.mapped = true;
        state.stream_ops.push((DriverCall::Map, stream));
        state.stats.maps += 1;
        Ok(())
    }

    fn unmap(&self, resource: ResourceHandle, stream: Stream) -> Result<(), ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::Unmap)?;
        let res = state.resource_mut(resource)?;
        if !res.mapped {
            return Err(ComputeStatus::NotMapped);
        }
        res.mapped = false;
        state.arrays.retain(|_, owner| *owner != resource);
        state.stream_ops.push((DriverCall::Unmap, stream));
        state.stats.unmaps += 1;
        Ok(())
    }

    fn mapped_pointer(
        &self,
        resource: ResourceHandle,
    ) -> Result<(DevicePtr, u64), ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::MappedPointer)?;
        let res = state.resource(resource)?;
        if !res.mapped {
            return Err(ComputeStatus::NotMapped);
        }
        let SoftTarget::Buffer(id) = res.target else {
            return Err(ComputeStatus::NotMappedAsPointer);
        };
        let buf = state.buffers.get(&id).ok_or(ComputeStatus::InvalidResourceHandle)?;
        Ok((DevicePtr(buf.device_addr), buf.data.len() as u64))
    }

    fn mapped_array(
        &self,
        resource: ResourceHandle,
        array_index: u32,
        mip_level: u32,
    ) -> Result<ArrayHandle, ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::MappedArray)?;
        let res = state.resource(resource)?;
        if !res.mapped {
            return Err(ComputeStatus::NotMapped);
        }
        if !matches!(res.target, SoftTarget::Image(_)) {
            return Err(ComputeStatus::NotMappedAsArray);
        }
        // Only single-layer, single-mip 2D images exist here.
        if array_index != 0 || mip_level != 0 {
            return Err(ComputeStatus::InvalidValue);
        }
        let array = ArrayHandle(state.alloc_handle());
        state.arrays.insert(array, resource);
        Ok(array)
    }

    fn memcpy_2d_to_array(&self, dst: ArrayHandle, copy: &Copy2d) -> Result<(), ComputeStatus> {
        let mut state = self.state.borrow_mut();
        state.take_fault(DriverCall::Memcpy2dToArray)?;
        if copy.kind != CopyKind::DeviceToDevice {
            return Err(ComputeStatus::InvalidValue);
        }
        if copy.src_pitch < copy.width_bytes {
            return Err(ComputeStatus::InvalidPitchValue);
        }

        let owner = *state
            .arrays
            .get(&dst)
            .ok_or(ComputeStatus::InvalidResourceHandle)?;
        let SoftTarget::Image(texture) = state.resource(owner)?.target else {
            return Err(ComputeStatus::NotMappedAsArray);
        };
        let desc = state
            .textures
            .get(&texture)
            .ok_or(ComputeStatus::InvalidResourceHandle)?
            .desc;

        let row_bytes = desc.row_bytes().ok_or(ComputeStatus::InvalidValue)?;
        let x_end = copy
            .dst_x_bytes
            .checked_add(copy.width_bytes)
            .ok_or(ComputeStatus::InvalidValue)?;
        let y_end = u64::from(copy.dst_y) + u64::from(copy.height);
        if x_end > row_bytes || y_end > u64::from(desc.height) {
            return Err(ComputeStatus::InvalidValue);
        }

        let mut rows = Vec::with_capacity(copy.height as usize);
        for row in 0..u64::from(copy.height) {
            let addr = row
                .checked_mul(copy.src_pitch)
                .and_then(|off| copy.src.0.checked_add(off))
                .ok_or(ComputeStatus::InvalidValue)?;
            let bytes = state
                .read_device(addr, copy.width_bytes)
                .ok_or(ComputeStatus::InvalidValue)?;
            rows.push(bytes);
        }

        let tex = state
            .textures
            .get_mut(&texture)
            .ok_or(ComputeStatus::InvalidResourceHandle)?;
        for (row, bytes) in rows.iter().enumerate() {
            let start = ((u64::from(copy.dst_y) + row as u64) * row_bytes + copy.dst_x_bytes) as usize;
            tex.data[start..start + bytes.len()].copy_from_slice(bytes);
        }
        state.stats.copies_2d += 1;
        Ok(())
    }
}
