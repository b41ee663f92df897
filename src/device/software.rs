//! Software Device
//!
//! A CPU implementation of [`GraphicsDevice`]. It keeps real bytes for every
//! allocation, validates bindings and copies the way a strict backend would,
//! and executes recorded command buffers at submission time.
//!
//! # Memory Model
//!
//! | Memory type | Location       | Host-visible | Textures |
//! |-------------|----------------|--------------|----------|
//! | `0`         | `Device`       | ❌           | ✅       |
//! | `1`         | `DeviceUpload` | ✅           | ✅       |
//! | `2`         | `HostUpload`   | ✅           | ❌       |
//! | `3`         | `HostReadback` | ✅           | ❌       |
//!
//! Buffers live inside their bound memory block, so mapping a buffer and
//! reading a copy destination both see the block's bytes. Textures keep a
//! tightly packed byte vector per subresource.
//!
//! Everything submitted completes before `submit` returns, so fences are
//! signaled immediately. Waiting for a value nobody will signal is reported
//! as a failure instead of hanging.

use slotmap::SlotMap;

use super::{
    AccessLayoutStage, AccessStage, BarrierGroup, BufferBarrier, BufferCopy, BufferDesc, BufferId,
    BufferMemoryBinding, BufferTextureCopy, CommandAllocatorId, CommandBufferId, DeviceDesc,
    FenceId, GraphicsDevice, MemoryId, MemoryLocation, MemoryRequirement, MemoryType,
    TextureBarrier, TextureDesc, TextureId, TextureMemoryBinding, TextureUsage,
};
use crate::errors::{MemoryError, Result};
use crate::utils::is_aligned;

pub const MEMORY_TYPE_DEVICE: MemoryType = MemoryType(0);
pub const MEMORY_TYPE_DEVICE_UPLOAD: MemoryType = MemoryType(1);
pub const MEMORY_TYPE_HOST_UPLOAD: MemoryType = MemoryType(2);
pub const MEMORY_TYPE_HOST_READBACK: MemoryType = MemoryType(3);

/// Construction parameters of a [`SoftwareDevice`].
#[derive(Debug, Clone, Copy)]
pub struct SoftwareDeviceConfig {
    pub desc: DeviceDesc,
    /// Placement alignment reported for buffers.
    pub buffer_alignment: u64,
    /// Placement alignment reported for textures.
    pub texture_alignment: u64,
    /// When `false`, `DeviceUpload` requests report `Unsupported`.
    pub device_upload_supported: bool,
    /// Allocations larger than this fail with `OutOfMemory`.
    pub max_allocation_size: u64,
}

impl Default for SoftwareDeviceConfig {
    fn default() -> Self {
        Self {
            desc: DeviceDesc::default(),
            buffer_alignment: 256,
            texture_alignment: 65536,
            device_upload_supported: true,
            max_allocation_size: 1 << 32,
        }
    }
}

/// Counters describing the live state of a [`SoftwareDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub live_allocations: usize,
    pub allocated_bytes: u64,
    pub live_buffers: usize,
    pub live_textures: usize,
    pub live_fences: usize,
    pub live_command_buffers: usize,
    pub live_command_allocators: usize,
    pub submissions: u64,
    pub allocation_calls: u64,
}

// ─── Internal Types ───────────────────────────────────────────────────────────

struct MemoryBlock {
    memory_type: MemoryType,
    data: Vec<u8>,
}

struct BufferRecord {
    desc: BufferDesc,
    binding: Option<(MemoryId, u64)>,
    mapped: bool,
    state: AccessStage,
}

struct TextureRecord {
    desc: TextureDesc,
    binding: Option<(MemoryId, u64)>,
    subresources: Vec<Vec<u8>>,
    state: AccessLayoutStage,
}

enum Command {
    Barrier {
        buffers: Vec<BufferBarrier>,
        textures: Vec<TextureBarrier>,
    },
    CopyBuffer(BufferCopy),
    CopyBufferToTexture(BufferTextureCopy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordingState {
    Initial,
    Recording,
    Executable,
}

struct CommandBufferRecord {
    allocator: CommandAllocatorId,
    state: RecordingState,
    commands: Vec<Command>,
    /// Set when a command was recorded outside `begin`/`end`.
    invalid: bool,
}

/// Tightly packed size of one subresource.
fn packed_subresource_size(desc: &TextureDesc, mip: u32) -> u64 {
    let (width, height, depth) = desc.mip_extent(mip);
    desc.format.row_bytes(width) * u64::from(desc.format.block_rows(height)) * u64::from(depth)
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| MemoryError::OutOfMemory(format!("{value} bytes exceed the address space")))
}

// ─── Device ───────────────────────────────────────────────────────────────────

/// CPU reference backend.
pub struct SoftwareDevice {
    config: SoftwareDeviceConfig,
    memory: SlotMap<MemoryId, MemoryBlock>,
    buffers: SlotMap<BufferId, BufferRecord>,
    textures: SlotMap<TextureId, TextureRecord>,
    allocators: SlotMap<CommandAllocatorId, ()>,
    command_buffers: SlotMap<CommandBufferId, CommandBufferRecord>,
    fences: SlotMap<FenceId, u64>,
    submissions: u64,
    allocation_calls: u64,
    /// Number of further allocations that may succeed.
    allocation_budget: Option<u64>,
}

impl SoftwareDevice {
    #[must_use]
    pub fn new(config: SoftwareDeviceConfig) -> Self {
        Self {
            config,
            memory: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            allocators: SlotMap::with_key(),
            command_buffers: SlotMap::with_key(),
            fences: SlotMap::with_key(),
            submissions: 0,
            allocation_calls: 0,
            allocation_budget: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SoftwareDeviceConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            live_allocations: self.memory.len(),
            allocated_bytes: self.memory.values().map(|m| m.data.len() as u64).sum(),
            live_buffers: self.buffers.len(),
            live_textures: self.textures.len(),
            live_fences: self.fences.len(),
            live_command_buffers: self.command_buffers.len(),
            live_command_allocators: self.allocators.len(),
            submissions: self.submissions,
            allocation_calls: self.allocation_calls,
        }
    }

    /// Lets the next `count` allocations succeed and fails every one after.
    pub fn fail_allocations_after(&mut self, count: u64) {
        self.allocation_budget = Some(count);
    }

    /// Removes a limit set by [`fail_allocations_after`](Self::fail_allocations_after).
    pub fn clear_allocation_failure(&mut self) {
        self.allocation_budget = None;
    }

    /// Memory type backing `location`.
    pub fn memory_type_for(&self, location: MemoryLocation) -> Result<MemoryType> {
        match location {
            MemoryLocation::Device => Ok(MEMORY_TYPE_DEVICE),
            MemoryLocation::DeviceUpload if self.config.device_upload_supported => {
                Ok(MEMORY_TYPE_DEVICE_UPLOAD)
            }
            MemoryLocation::DeviceUpload => Err(MemoryError::Unsupported(
                "device-local host-visible memory is not available".into(),
            )),
            MemoryLocation::HostUpload => Ok(MEMORY_TYPE_HOST_UPLOAD),
            MemoryLocation::HostReadback => Ok(MEMORY_TYPE_HOST_READBACK),
        }
    }

    fn is_host_visible(memory_type: MemoryType) -> bool {
        memory_type != MEMORY_TYPE_DEVICE
    }

    fn accepts_textures(memory_type: MemoryType) -> bool {
        memory_type == MEMORY_TYPE_DEVICE || memory_type == MEMORY_TYPE_DEVICE_UPLOAD
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn buffer_binding(&self, buffer: BufferId) -> Option<(MemoryId, u64)> {
        self.buffers.get(buffer)?.binding
    }

    #[must_use]
    pub fn texture_binding(&self, texture: TextureId) -> Option<(MemoryId, u64)> {
        self.textures.get(texture)?.binding
    }

    #[must_use]
    pub fn memory_size(&self, memory: MemoryId) -> Option<u64> {
        self.memory.get(memory).map(|m| m.data.len() as u64)
    }

    #[must_use]
    pub fn memory_type(&self, memory: MemoryId) -> Option<MemoryType> {
        self.memory.get(memory).map(|m| m.memory_type)
    }

    #[must_use]
    pub fn is_mapped(&self, buffer: BufferId) -> bool {
        self.buffers.get(buffer).is_some_and(|b| b.mapped)
    }

    /// Bytes of a bound buffer as the device sees them.
    #[must_use]
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        let record = self.buffers.get(buffer)?;
        let (memory, offset) = record.binding?;
        let block = self.memory.get(memory)?;
        let start = usize::try_from(offset).ok()?;
        let end = start + usize::try_from(record.desc.size).ok()?;
        block.data.get(start..end)
    }

    /// Tightly packed bytes of subresource `(mip, layer)`.
    #[must_use]
    pub fn texture_subresource(&self, texture: TextureId, mip: u32, layer: u32) -> Option<&[u8]> {
        let record = self.textures.get(texture)?;
        if mip >= record.desc.mip_num || layer >= record.desc.layer_num {
            return None;
        }
        record
            .subresources
            .get(record.desc.subresource_index(mip, layer))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn buffer_state(&self, buffer: BufferId) -> Option<AccessStage> {
        self.buffers.get(buffer).map(|b| b.state)
    }

    #[must_use]
    pub fn texture_state(&self, texture: TextureId) -> Option<AccessLayoutStage> {
        self.textures.get(texture).map(|t| t.state)
    }

    #[must_use]
    pub fn fence_value(&self, fence: FenceId) -> Option<u64> {
        self.fences.get(fence).copied()
    }

    // ── Execution ──────────────────────────────────────────────────────────

    /// Resolves `[offset, offset + size)` of a bound buffer to a block range.
    fn resolve_buffer_range(
        &self,
        buffer: BufferId,
        offset: u64,
        size: u64,
    ) -> Result<(MemoryId, usize, usize)> {
        let record = self
            .buffers
            .get(buffer)
            .ok_or_else(|| MemoryError::Failure(format!("unknown buffer {buffer:?}")))?;
        let (memory, base) = record
            .binding
            .ok_or_else(|| MemoryError::Failure(format!("buffer {buffer:?} has no memory")))?;
        if offset + size > record.desc.size {
            return Err(MemoryError::Failure(format!(
                "range {offset}+{size} exceeds buffer {buffer:?} of {} bytes",
                record.desc.size
            )));
        }
        if !self.memory.contains_key(memory) {
            return Err(MemoryError::Failure(format!(
                "memory of buffer {buffer:?} was freed"
            )));
        }
        let start = to_usize(base + offset)?;
        Ok((memory, start, start + to_usize(size)?))
    }

    fn execute_copy_buffer(&mut self, copy: &BufferCopy) -> Result<()> {
        let (src_memory, src_start, src_end) =
            self.resolve_buffer_range(copy.src, copy.src_offset, copy.size)?;
        let (dst_memory, dst_start, dst_end) =
            self.resolve_buffer_range(copy.dst, copy.dst_offset, copy.size)?;

        let bytes = self.memory[src_memory].data[src_start..src_end].to_vec();
        self.memory[dst_memory].data[dst_start..dst_end].copy_from_slice(&bytes);
        Ok(())
    }

    fn execute_copy_buffer_to_texture(&mut self, copy: &BufferTextureCopy) -> Result<()> {
        let region = copy.dst;
        let desc = self
            .textures
            .get(region.texture)
            .map(|t| t.desc)
            .ok_or_else(|| MemoryError::Failure(format!("unknown texture {:?}", region.texture)))?;

        if region.mip >= desc.mip_num || region.layer >= desc.layer_num {
            return Err(MemoryError::Failure(format!(
                "subresource ({}, {}) out of range",
                region.mip, region.layer
            )));
        }
        let (mip_width, mip_height, mip_depth) = desc.mip_extent(region.mip);
        if region.x + region.width > mip_width
            || region.y + region.height > mip_height
            || region.z + region.depth > mip_depth
        {
            return Err(MemoryError::Failure("copy region exceeds the subresource".into()));
        }

        let format = desc.format;
        let props = format.props();
        if region.x % props.block_width != 0 || region.y % props.block_height != 0 {
            return Err(MemoryError::Failure(
                "copy region is not aligned to the format's blocks".into(),
            ));
        }

        let copy_row_bytes = to_usize(format.row_bytes(region.width))?;
        let copy_rows = format.block_rows(region.height) as usize;
        let dst_row_bytes = to_usize(format.row_bytes(mip_width))?;
        let dst_rows = format.block_rows(mip_height) as usize;
        let dst_x = to_usize(format.row_bytes(region.x))?;
        let dst_y = (region.y / props.block_height) as usize;

        let src_span = copy.slice_pitch * u64::from(region.depth.saturating_sub(1))
            + copy.row_pitch * (copy_rows.saturating_sub(1) as u64)
            + copy_row_bytes as u64;
        let (src_memory, src_start, _) =
            self.resolve_buffer_range(copy.src, copy.src_offset, src_span)?;

        let row_pitch = to_usize(copy.row_pitch)?;
        let slice_pitch = to_usize(copy.slice_pitch)?;
        let index = desc.subresource_index(region.mip, region.layer);
        let src = &self.memory[src_memory].data;
        let dst = &mut self.textures[region.texture].subresources[index];

        for z in 0..region.depth as usize {
            for row in 0..copy_rows {
                let from = src_start + z * slice_pitch + row * row_pitch;
                let to = ((region.z as usize + z) * dst_rows + dst_y + row) * dst_row_bytes + dst_x;
                dst[to..to + copy_row_bytes].copy_from_slice(&src[from..from + copy_row_bytes]);
            }
        }
        Ok(())
    }

    fn execute_barrier(&mut self, buffers: &[BufferBarrier], textures: &[TextureBarrier]) -> Result<()> {
        for barrier in buffers {
            let record = self.buffers.get_mut(barrier.buffer).ok_or_else(|| {
                MemoryError::Failure(format!("barrier on unknown buffer {:?}", barrier.buffer))
            })?;
            if record.state != barrier.before && barrier.before != AccessStage::NONE {
                log::warn!(
                    "Buffer {:?} barrier expects {:?} but resource is in {:?}",
                    barrier.buffer,
                    barrier.before,
                    record.state
                );
            }
            record.state = barrier.after;
        }
        for barrier in textures {
            let record = self.textures.get_mut(barrier.texture).ok_or_else(|| {
                MemoryError::Failure(format!("barrier on unknown texture {:?}", barrier.texture))
            })?;
            if record.state != barrier.before && barrier.before != AccessLayoutStage::UNDEFINED {
                log::warn!(
                    "Texture {:?} barrier expects {:?} but resource is in {:?}",
                    barrier.texture,
                    barrier.before,
                    record.state
                );
            }
            record.state = barrier.after;
        }
        Ok(())
    }

    fn execute(&mut self, commands: &[Command]) -> Result<()> {
        for command in commands {
            match command {
                Command::Barrier { buffers, textures } => self.execute_barrier(buffers, textures)?,
                Command::CopyBuffer(copy) => self.execute_copy_buffer(copy)?,
                Command::CopyBufferToTexture(copy) => self.execute_copy_buffer_to_texture(copy)?,
            }
        }
        Ok(())
    }

    fn record(&mut self, command_buffer: CommandBufferId, command: Command) {
        let Some(record) = self.command_buffers.get_mut(command_buffer) else {
            log::error!("Recording into unknown command buffer {command_buffer:?}");
            return;
        };
        if record.state == RecordingState::Recording {
            record.commands.push(command);
        } else {
            log::error!("Command buffer {command_buffer:?} is not recording");
            record.invalid = true;
        }
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new(SoftwareDeviceConfig::default())
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn desc(&self) -> &DeviceDesc {
        &self.config.desc
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId> {
        if desc.size == 0 {
            return Err(MemoryError::InvalidArgument("buffer size is zero".into()));
        }
        Ok(self.buffers.insert(BufferRecord {
            desc: *desc,
            binding: None,
            mapped: false,
            state: AccessStage::NONE,
        }))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 || desc.mip_num == 0 || desc.layer_num == 0 {
            return Err(MemoryError::InvalidArgument(format!(
                "texture has an empty dimension: {desc:?}"
            )));
        }
        let mut subresources = Vec::with_capacity(desc.subresource_count());
        for _layer in 0..desc.layer_num {
            for mip in 0..desc.mip_num {
                subresources.push(vec![0u8; to_usize(packed_subresource_size(desc, mip))?]);
            }
        }
        Ok(self.textures.insert(TextureRecord {
            desc: *desc,
            binding: None,
            subresources,
            state: AccessLayoutStage::UNDEFINED,
        }))
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        match self.buffers.remove(buffer) {
            Some(record) if record.mapped => {
                log::warn!("Buffer {buffer:?} destroyed while mapped");
            }
            Some(_) => {}
            None => log::error!("Destroying unknown buffer {buffer:?}"),
        }
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_none() {
            log::error!("Destroying unknown texture {texture:?}");
        }
    }

    fn buffer_desc(&self, buffer: BufferId) -> Option<BufferDesc> {
        self.buffers.get(buffer).map(|b| b.desc)
    }

    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(texture).map(|t| t.desc)
    }

    fn buffer_memory_requirement(
        &self,
        desc: &BufferDesc,
        location: MemoryLocation,
    ) -> Result<MemoryRequirement> {
        Ok(MemoryRequirement {
            memory_type: self.memory_type_for(location)?,
            size: desc.size,
            alignment: self.config.buffer_alignment,
            must_be_dedicated: false,
        })
    }

    fn texture_memory_requirement(
        &self,
        desc: &TextureDesc,
        location: MemoryLocation,
    ) -> Result<MemoryRequirement> {
        let memory_type = self.memory_type_for(location)?;
        if !Self::accepts_textures(memory_type) {
            return Err(MemoryError::Unsupported(format!(
                "textures cannot be placed in {location:?} memory"
            )));
        }
        let size = (0..desc.mip_num)
            .map(|mip| packed_subresource_size(desc, mip))
            .sum::<u64>()
            * u64::from(desc.layer_num);
        let must_be_dedicated = desc
            .usage
            .intersects(TextureUsage::COLOR_ATTACHMENT | TextureUsage::DEPTH_STENCIL_ATTACHMENT);

        Ok(MemoryRequirement {
            memory_type,
            size,
            alignment: self.config.texture_alignment,
            must_be_dedicated,
        })
    }

    fn allocate_memory(&mut self, memory_type: MemoryType, size: u64) -> Result<MemoryId> {
        if size == 0 {
            return Err(MemoryError::InvalidArgument("allocation size is zero".into()));
        }
        if memory_type.0 > MEMORY_TYPE_HOST_READBACK.0 {
            return Err(MemoryError::InvalidArgument(format!(
                "unknown memory type {memory_type:?}"
            )));
        }
        self.allocation_calls += 1;

        if let Some(budget) = self.allocation_budget.as_mut() {
            if *budget == 0 {
                return Err(MemoryError::OutOfMemory(format!(
                    "injected failure allocating {size} bytes"
                )));
            }
            *budget -= 1;
        }
        if size > self.config.max_allocation_size {
            return Err(MemoryError::OutOfMemory(format!(
                "{size} bytes exceed the {} byte allocation limit",
                self.config.max_allocation_size
            )));
        }

        Ok(self.memory.insert(MemoryBlock {
            memory_type,
            data: vec![0u8; to_usize(size)?],
        }))
    }

    fn free_memory(&mut self, memory: MemoryId) {
        if self.memory.remove(memory).is_none() {
            log::error!("Freeing unknown memory {memory:?}");
        }
    }

    fn bind_buffer_memory(&mut self, bindings: &[BufferMemoryBinding]) -> Result<()> {
        for binding in bindings {
            let record = self.buffers.get(binding.buffer).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown buffer {:?}", binding.buffer))
            })?;
            if record.binding.is_some() {
                return Err(MemoryError::InvalidArgument(format!(
                    "buffer {:?} is already bound",
                    binding.buffer
                )));
            }
            let block = self.memory.get(binding.memory).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown memory {:?}", binding.memory))
            })?;
            if !is_aligned(binding.offset, self.config.buffer_alignment) {
                return Err(MemoryError::InvalidArgument(format!(
                    "buffer offset {} violates alignment {}",
                    binding.offset, self.config.buffer_alignment
                )));
            }
            if binding.offset + record.desc.size > block.data.len() as u64 {
                return Err(MemoryError::InvalidArgument(format!(
                    "buffer {:?} does not fit at offset {} of a {} byte allocation",
                    binding.buffer,
                    binding.offset,
                    block.data.len()
                )));
            }
        }
        for binding in bindings {
            self.buffers[binding.buffer].binding = Some((binding.memory, binding.offset));
        }
        Ok(())
    }

    fn bind_texture_memory(&mut self, bindings: &[TextureMemoryBinding]) -> Result<()> {
        for binding in bindings {
            let record = self.textures.get(binding.texture).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown texture {:?}", binding.texture))
            })?;
            if record.binding.is_some() {
                return Err(MemoryError::InvalidArgument(format!(
                    "texture {:?} is already bound",
                    binding.texture
                )));
            }
            let block = self.memory.get(binding.memory).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown memory {:?}", binding.memory))
            })?;
            if !Self::accepts_textures(block.memory_type) {
                return Err(MemoryError::InvalidArgument(format!(
                    "memory type {:?} cannot hold textures",
                    block.memory_type
                )));
            }
            if !is_aligned(binding.offset, self.config.texture_alignment) {
                return Err(MemoryError::InvalidArgument(format!(
                    "texture offset {} violates alignment {}",
                    binding.offset, self.config.texture_alignment
                )));
            }
            let size: u64 = record.subresources.iter().map(|s| s.len() as u64).sum();
            if binding.offset + size > block.data.len() as u64 {
                return Err(MemoryError::InvalidArgument(format!(
                    "texture {:?} does not fit at offset {}",
                    binding.texture, binding.offset
                )));
            }
        }
        for binding in bindings {
            self.textures[binding.texture].binding = Some((binding.memory, binding.offset));
        }
        Ok(())
    }

    fn map_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> Result<&mut [u8]> {
        let record = self
            .buffers
            .get_mut(buffer)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown buffer {buffer:?}")))?;
        let (memory, base) = record
            .binding
            .ok_or_else(|| MemoryError::Failure(format!("buffer {buffer:?} has no memory")))?;
        if record.mapped {
            return Err(MemoryError::Failure(format!("buffer {buffer:?} is already mapped")));
        }
        if offset + size > record.desc.size {
            return Err(MemoryError::InvalidArgument(format!(
                "map range {offset}+{size} exceeds buffer of {} bytes",
                record.desc.size
            )));
        }
        let block = self
            .memory
            .get_mut(memory)
            .ok_or_else(|| MemoryError::Failure(format!("memory of buffer {buffer:?} was freed")))?;
        if !Self::is_host_visible(block.memory_type) {
            return Err(MemoryError::Failure(format!(
                "buffer {buffer:?} lives in memory the host cannot map"
            )));
        }

        record.mapped = true;
        let start = to_usize(base + offset)?;
        let end = start + to_usize(size)?;
        Ok(&mut block.data[start..end])
    }

    fn unmap_buffer(&mut self, buffer: BufferId) {
        match self.buffers.get_mut(buffer) {
            Some(record) if record.mapped => record.mapped = false,
            Some(_) => log::error!("Unmapping buffer {buffer:?} that is not mapped"),
            None => log::error!("Unmapping unknown buffer {buffer:?}"),
        }
    }

    fn create_command_allocator(&mut self) -> Result<CommandAllocatorId> {
        Ok(self.allocators.insert(()))
    }

    fn destroy_command_allocator(&mut self, allocator: CommandAllocatorId) {
        if self.allocators.remove(allocator).is_none() {
            log::error!("Destroying unknown command allocator {allocator:?}");
        }
    }

    fn create_command_buffer(&mut self, allocator: CommandAllocatorId) -> Result<CommandBufferId> {
        if !self.allocators.contains_key(allocator) {
            return Err(MemoryError::InvalidArgument(format!(
                "unknown command allocator {allocator:?}"
            )));
        }
        Ok(self.command_buffers.insert(CommandBufferRecord {
            allocator,
            state: RecordingState::Initial,
            commands: Vec::new(),
            invalid: false,
        }))
    }

    fn destroy_command_buffer(&mut self, command_buffer: CommandBufferId) {
        if self.command_buffers.remove(command_buffer).is_none() {
            log::error!("Destroying unknown command buffer {command_buffer:?}");
        }
    }

    fn begin_command_buffer(&mut self, command_buffer: CommandBufferId) -> Result<()> {
        let record = self.command_buffers.get_mut(command_buffer).ok_or_else(|| {
            MemoryError::InvalidArgument(format!("unknown command buffer {command_buffer:?}"))
        })?;
        if record.state != RecordingState::Initial {
            return Err(MemoryError::Failure(format!(
                "command buffer {command_buffer:?} must be reset before recording"
            )));
        }
        record.state = RecordingState::Recording;
        record.commands.clear();
        record.invalid = false;
        Ok(())
    }

    fn end_command_buffer(&mut self, command_buffer: CommandBufferId) -> Result<()> {
        let record = self.command_buffers.get_mut(command_buffer).ok_or_else(|| {
            MemoryError::InvalidArgument(format!("unknown command buffer {command_buffer:?}"))
        })?;
        if record.state != RecordingState::Recording {
            return Err(MemoryError::Failure(format!(
                "command buffer {command_buffer:?} is not recording"
            )));
        }
        record.state = RecordingState::Executable;
        Ok(())
    }

    fn reset_command_allocator(&mut self, allocator: CommandAllocatorId) {
        for record in self.command_buffers.values_mut() {
            if record.allocator == allocator {
                record.state = RecordingState::Initial;
                record.commands.clear();
                record.invalid = false;
            }
        }
    }

    fn record_barrier(&mut self, command_buffer: CommandBufferId, barriers: &BarrierGroup<'_>) {
        self.record(
            command_buffer,
            Command::Barrier {
                buffers: barriers.buffers.to_vec(),
                textures: barriers.textures.to_vec(),
            },
        );
    }

    fn record_copy_buffer_to_buffer(&mut self, command_buffer: CommandBufferId, copy: &BufferCopy) {
        self.record(command_buffer, Command::CopyBuffer(*copy));
    }

    fn record_copy_buffer_to_texture(
        &mut self,
        command_buffer: CommandBufferId,
        copy: &BufferTextureCopy,
    ) {
        self.record(command_buffer, Command::CopyBufferToTexture(*copy));
    }

    fn create_fence(&mut self, initial_value: u64) -> Result<FenceId> {
        Ok(self.fences.insert(initial_value))
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        if self.fences.remove(fence).is_none() {
            log::error!("Destroying unknown fence {fence:?}");
        }
    }

    fn submit(
        &mut self,
        command_buffers: &[CommandBufferId],
        signal: Option<(FenceId, u64)>,
    ) -> Result<()> {
        for &command_buffer in command_buffers {
            let record = self.command_buffers.get(command_buffer).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown command buffer {command_buffer:?}"))
            })?;
            if record.state != RecordingState::Executable || record.invalid {
                return Err(MemoryError::Failure(format!(
                    "command buffer {command_buffer:?} is not executable"
                )));
            }
        }
        if let Some((fence, _)) = signal
            && !self.fences.contains_key(fence)
        {
            return Err(MemoryError::InvalidArgument(format!("unknown fence {fence:?}")));
        }

        for &command_buffer in command_buffers {
            let commands = std::mem::take(&mut self.command_buffers[command_buffer].commands);
            let result = self.execute(&commands);
            self.command_buffers[command_buffer].commands = commands;
            result?;
        }
        self.submissions += 1;

        if let Some((fence, value)) = signal {
            let current = &mut self.fences[fence];
            *current = (*current).max(value);
        }
        Ok(())
    }

    fn wait_fence(&mut self, fence: FenceId, value: u64) -> Result<()> {
        let current = *self
            .fences
            .get(fence)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown fence {fence:?}")))?;
        if current < value {
            return Err(MemoryError::Failure(format!(
                "fence {fence:?} is at {current} and nothing will signal {value}"
            )));
        }
        Ok(())
    }
}
