//! Allocation Planner
//!
//! Packs a group of resources into the fewest physical allocations.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     AllocationPlanner                        │
//! │                                                              │
//! │  bins:      [AllocationBin]   one bump arena per memory type │
//! │  open_bins: type → bin index  (the arena still accepting)    │
//! │  dedicated: [DedicatedAllocation]                            │
//! │                                                              │
//! │  build()              pure grouping, queries only            │
//! │  allocation_count()   bins + dedicated                       │
//! │  allocate_and_bind()  one allocation per entry, then bind    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Placement is strictly append-order: each resource lands at the bin cursor
//! rounded up to its alignment. Nothing is reordered or best-fit, so packing
//! quality depends on the order the caller supplies. Buffers of a group are
//! placed before its textures.
//!
//! When a group carries a non-zero `preferred_memory_size`, a placement that
//! would push a non-empty bin past that size closes the bin and opens a fresh
//! one for the same memory type. A single resource larger than the preferred
//! size still gets a bin of its own.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::device::{
    BufferId, BufferMemoryBinding, DeviceDesc, GraphicsDevice, MemoryId, MemoryLocation,
    MemoryRequirement, MemoryType, TextureId, TextureMemoryBinding,
};
use crate::errors::{MemoryError, Result};
use crate::utils::align_up;

/// Resources that should share physical memory.
#[derive(Debug, Clone, Copy)]
pub struct ResourceGroupDesc<'a> {
    pub memory_location: MemoryLocation,
    pub buffers: &'a [BufferId],
    pub textures: &'a [TextureId],
    /// Soft upper bound for a single allocation, `0` for unbounded.
    pub preferred_memory_size: u64,
}

impl<'a> ResourceGroupDesc<'a> {
    #[must_use]
    pub fn new(memory_location: MemoryLocation) -> Self {
        Self {
            memory_location,
            buffers: &[],
            textures: &[],
            preferred_memory_size: 0,
        }
    }

    #[must_use]
    pub fn with_buffers(mut self, buffers: &'a [BufferId]) -> Self {
        self.buffers = buffers;
        self
    }

    #[must_use]
    pub fn with_textures(mut self, textures: &'a [TextureId]) -> Self {
        self.textures = textures;
        self
    }

    #[must_use]
    pub fn with_preferred_memory_size(mut self, size: u64) -> Self {
        self.preferred_memory_size = size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Buffer(BufferId),
    Texture(TextureId),
}

impl ResourceRef {
    #[inline]
    #[must_use]
    pub fn is_buffer(self) -> bool {
        matches!(self, Self::Buffer(_))
    }
}

/// A resource placed inside a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinMember {
    pub resource: ResourceRef,
    pub offset: u64,
    pub size: u64,
    pub alignment: u64,
}

/// Bump arena for one memory type.
///
/// `cursor` never decreases and every member ends at or before it.
#[derive(Debug, Clone)]
pub struct AllocationBin {
    memory_type: MemoryType,
    cursor: u64,
    members: Vec<BinMember>,
}

impl AllocationBin {
    fn new(memory_type: MemoryType) -> Self {
        Self {
            memory_type,
            cursor: 0,
            members: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Bytes the bin's allocation needs.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn members(&self) -> &[BinMember] {
        &self.members
    }

    /// Offset `resource` would receive if placed next.
    fn placement_offset(&self, resource: ResourceRef, requirement: &MemoryRequirement, granularity: u64) -> u64 {
        let offset = align_up(self.cursor, requirement.alignment);
        let follows_buffer = self.members.last().is_some_and(|m| m.resource.is_buffer());
        if !resource.is_buffer() && follows_buffer {
            align_up(offset, granularity)
        } else {
            offset
        }
    }

    fn push(&mut self, resource: ResourceRef, requirement: &MemoryRequirement, offset: u64) {
        self.members.push(BinMember {
            resource,
            offset,
            size: requirement.size,
            alignment: requirement.alignment,
        });
        self.cursor = offset + requirement.size;
    }
}

/// A resource that owns its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedicatedAllocation {
    pub resource: ResourceRef,
    pub requirement: MemoryRequirement,
}

/// Groups resources into bins and dedicated allocations.
#[derive(Debug, Clone)]
pub struct AllocationPlanner {
    memory_location: MemoryLocation,
    preferred_memory_size: u64,
    granularity: u64,
    bins: Vec<AllocationBin>,
    open_bins: FxHashMap<MemoryType, usize>,
    dedicated: Vec<DedicatedAllocation>,
}

impl AllocationPlanner {
    #[must_use]
    pub fn new(device_desc: &DeviceDesc, memory_location: MemoryLocation, preferred_memory_size: u64) -> Self {
        Self {
            memory_location,
            preferred_memory_size,
            granularity: device_desc.buffer_texture_granularity,
            bins: Vec::new(),
            open_bins: FxHashMap::default(),
            dedicated: Vec::new(),
        }
    }

    /// Runs the grouping pass for a whole group. Only queries the device.
    pub fn build<D: GraphicsDevice + ?Sized>(device: &D, group: &ResourceGroupDesc<'_>) -> Result<Self> {
        let mut planner = Self::new(device.desc(), group.memory_location, group.preferred_memory_size);
        for &buffer in group.buffers {
            planner.add_buffer(device, buffer)?;
        }
        for &texture in group.textures {
            planner.add_texture(device, texture)?;
        }
        Ok(planner)
    }

    pub fn add_buffer<D: GraphicsDevice + ?Sized>(&mut self, device: &D, buffer: BufferId) -> Result<()> {
        let desc = device
            .buffer_desc(buffer)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown buffer {buffer:?}")))?;
        let requirement = device.buffer_memory_requirement(&desc, self.memory_location)?;
        self.add(ResourceRef::Buffer(buffer), requirement);
        Ok(())
    }

    pub fn add_texture<D: GraphicsDevice + ?Sized>(&mut self, device: &D, texture: TextureId) -> Result<()> {
        let desc = device
            .texture_desc(texture)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown texture {texture:?}")))?;
        let requirement = device.texture_memory_requirement(&desc, self.memory_location)?;
        self.add(ResourceRef::Texture(texture), requirement);
        Ok(())
    }

    fn add(&mut self, resource: ResourceRef, requirement: MemoryRequirement) {
        if requirement.must_be_dedicated {
            self.dedicated.push(DedicatedAllocation {
                resource,
                requirement,
            });
            return;
        }

        if let Some(&index) = self.open_bins.get(&requirement.memory_type) {
            let bin = &mut self.bins[index];
            let offset = bin.placement_offset(resource, &requirement, self.granularity);
            let exceeds_preferred =
                self.preferred_memory_size != 0 && offset + requirement.size > self.preferred_memory_size;
            if !exceeds_preferred {
                bin.push(resource, &requirement, offset);
                return;
            }
        }

        let mut bin = AllocationBin::new(requirement.memory_type);
        bin.push(resource, &requirement, 0);
        self.open_bins.insert(requirement.memory_type, self.bins.len());
        self.bins.push(bin);
    }

    #[inline]
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.bins.len() + self.dedicated.len()
    }

    #[inline]
    #[must_use]
    pub fn bins(&self) -> &[AllocationBin] {
        &self.bins
    }

    #[inline]
    #[must_use]
    pub fn dedicated(&self) -> &[DedicatedAllocation] {
        &self.dedicated
    }

    /// Total bytes the plan allocates.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.bins.iter().map(AllocationBin::cursor).sum::<u64>()
            + self.dedicated.iter().map(|d| d.requirement.size).sum::<u64>()
    }

    /// Creates one allocation per bin (in bin order) followed by one per
    /// dedicated resource, binding every member at its planned offset.
    ///
    /// On failure every allocation made here is freed and the first error is
    /// returned.
    pub fn allocate_and_bind<D: GraphicsDevice + ?Sized>(&self, device: &mut D) -> Result<Vec<MemoryId>> {
        let mut allocations = Vec::with_capacity(self.allocation_count());

        if let Err(err) = self.realize(device, &mut allocations) {
            log::warn!(
                "Resource group allocation failed ({err}), releasing {} allocation(s)",
                allocations.len()
            );
            for memory in allocations {
                device.free_memory(memory);
            }
            return Err(err);
        }

        log::info!(
            "Allocated {} bytes for {:?} in {} allocation(s) ({} dedicated)",
            self.total_size(),
            self.memory_location,
            allocations.len(),
            self.dedicated.len()
        );
        Ok(allocations)
    }

    fn realize<D: GraphicsDevice + ?Sized>(&self, device: &mut D, allocations: &mut Vec<MemoryId>) -> Result<()> {
        for bin in &self.bins {
            let memory = device.allocate_memory(bin.memory_type, bin.cursor)?;
            allocations.push(memory);
            bind_members(device, memory, bin.members.iter().map(|m| (m.resource, m.offset)))?;
        }
        for entry in &self.dedicated {
            let memory = device.allocate_memory(entry.requirement.memory_type, entry.requirement.size)?;
            allocations.push(memory);
            bind_members(device, memory, std::iter::once((entry.resource, 0)))?;
        }
        Ok(())
    }
}

fn bind_members<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    memory: MemoryId,
    members: impl Iterator<Item = (ResourceRef, u64)>,
) -> Result<()> {
    let mut buffers: SmallVec<[BufferMemoryBinding; 8]> = SmallVec::new();
    let mut textures: SmallVec<[TextureMemoryBinding; 8]> = SmallVec::new();

    for (resource, offset) in members {
        match resource {
            ResourceRef::Buffer(buffer) => buffers.push(BufferMemoryBinding { buffer, memory, offset }),
            ResourceRef::Texture(texture) => textures.push(TextureMemoryBinding { texture, memory, offset }),
        }
    }

    if !buffers.is_empty() {
        device.bind_buffer_memory(&buffers)?;
    }
    if !textures.is_empty() {
        device.bind_texture_memory(&textures)?;
    }
    Ok(())
}

/// Number of allocations [`allocate_and_bind_memory`] would create for `group`.
///
/// Pure: only queries the device.
pub fn calculate_allocation_number<D: GraphicsDevice + ?Sized>(
    device: &D,
    group: &ResourceGroupDesc<'_>,
) -> Result<usize> {
    Ok(AllocationPlanner::build(device, group)?.allocation_count())
}

/// Plans `group` and realizes the plan.
///
/// The caller owns the returned allocations and frees them with
/// [`GraphicsDevice::free_memory`] once the resources are destroyed.
pub fn allocate_and_bind_memory<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    group: &ResourceGroupDesc<'_>,
) -> Result<Vec<MemoryId>> {
    AllocationPlanner::build(&*device, group)?.allocate_and_bind(device)
}
