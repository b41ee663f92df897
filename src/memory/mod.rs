//! Device Memory Planning
//!
//! - [`planner`]: bin-packs resource groups into physical allocations

pub mod planner;

pub use planner::{
    AllocationBin, AllocationPlanner, BinMember, DedicatedAllocation, ResourceGroupDesc,
    ResourceRef, allocate_and_bind_memory, calculate_allocation_number,
};

use crate::device::{BufferDesc, BufferId, GraphicsDevice, MemoryId, MemoryLocation};
use crate::errors::Result;

/// A buffer together with the memory it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundBuffer {
    pub buffer: BufferId,
    pub memory: Vec<MemoryId>,
    pub size: u64,
}

impl BoundBuffer {
    /// Creates `desc` in `location` and binds it through the planner.
    ///
    /// Nothing is left behind on failure.
    pub fn create<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        desc: &BufferDesc,
        location: MemoryLocation,
    ) -> Result<Self> {
        let buffer = device.create_buffer(desc)?;
        let group = ResourceGroupDesc::new(location).with_buffers(std::slice::from_ref(&buffer));
        match allocate_and_bind_memory(device, &group) {
            Ok(memory) => Ok(Self {
                buffer,
                memory,
                size: desc.size,
            }),
            Err(err) => {
                device.destroy_buffer(buffer);
                Err(err)
            }
        }
    }

    pub fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.destroy_buffer(self.buffer);
        for memory in self.memory {
            device.free_memory(memory);
        }
    }
}
