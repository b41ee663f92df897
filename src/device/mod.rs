//! Core Graphics Interface
//!
//! The memory planner, the streamer and the data uploader never talk to a
//! graphics API directly. They consume the [`GraphicsDevice`] trait, which each
//! backend implements once. The backend is picked when the caller constructs
//! the device object; there is no runtime lookup by name.
//!
//! # Contract
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       GraphicsDevice                         │
//! │                                                              │
//! │  queries     memory requirement, resource descs, alignments  │
//! │  memory      allocate / free / bind                          │
//! │  host data   map / unmap (upload + readback memory only)     │
//! │  commands    begin / end / barrier / copy                    │
//! │  execution   submit (+ fence signal) / wait / reset          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record calls do not fail: recording errors surface at submission time, the
//! way every explicit API reports them.
//!
//! [`software::SoftwareDevice`] is a complete CPU implementation used as the
//! null backend and by the test suite.

pub mod format;
pub mod software;
pub mod types;

pub use format::{Format, FormatProps};
pub use types::*;

use crate::errors::Result;

/// Backend entry points consumed by this crate.
pub trait GraphicsDevice {
    /// Alignment rules of this backend.
    fn desc(&self) -> &DeviceDesc;

    // ── Resources ─────────────────────────────────────────────────────────

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId>;
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;
    fn destroy_buffer(&mut self, buffer: BufferId);
    fn destroy_texture(&mut self, texture: TextureId);
    fn buffer_desc(&self, buffer: BufferId) -> Option<BufferDesc>;
    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc>;

    // ── Memory ────────────────────────────────────────────────────────────

    fn buffer_memory_requirement(
        &self,
        desc: &BufferDesc,
        location: MemoryLocation,
    ) -> Result<MemoryRequirement>;

    fn texture_memory_requirement(
        &self,
        desc: &TextureDesc,
        location: MemoryLocation,
    ) -> Result<MemoryRequirement>;

    fn allocate_memory(&mut self, memory_type: MemoryType, size: u64) -> Result<MemoryId>;
    fn free_memory(&mut self, memory: MemoryId);
    fn bind_buffer_memory(&mut self, bindings: &[BufferMemoryBinding]) -> Result<()>;
    fn bind_texture_memory(&mut self, bindings: &[TextureMemoryBinding]) -> Result<()>;

    // ── Host-side data movement ───────────────────────────────────────────

    /// Maps `size` bytes of `buffer` starting at `offset`.
    ///
    /// The returned slice is exclusively owned by the caller until
    /// [`unmap_buffer`](Self::unmap_buffer).
    fn map_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> Result<&mut [u8]>;
    fn unmap_buffer(&mut self, buffer: BufferId);

    // ── Command recording ─────────────────────────────────────────────────

    fn create_command_allocator(&mut self) -> Result<CommandAllocatorId>;
    fn destroy_command_allocator(&mut self, allocator: CommandAllocatorId);
    fn create_command_buffer(&mut self, allocator: CommandAllocatorId) -> Result<CommandBufferId>;
    fn destroy_command_buffer(&mut self, command_buffer: CommandBufferId);
    fn begin_command_buffer(&mut self, command_buffer: CommandBufferId) -> Result<()>;
    fn end_command_buffer(&mut self, command_buffer: CommandBufferId) -> Result<()>;
    fn reset_command_allocator(&mut self, allocator: CommandAllocatorId);

    fn record_barrier(&mut self, command_buffer: CommandBufferId, barriers: &BarrierGroup<'_>);
    fn record_copy_buffer_to_buffer(&mut self, command_buffer: CommandBufferId, copy: &BufferCopy);
    fn record_copy_buffer_to_texture(
        &mut self,
        command_buffer: CommandBufferId,
        copy: &BufferTextureCopy,
    );

    // ── Execution ─────────────────────────────────────────────────────────

    fn create_fence(&mut self, initial_value: u64) -> Result<FenceId>;
    fn destroy_fence(&mut self, fence: FenceId);

    /// Submits `command_buffers` in order, then signals `signal` if given.
    fn submit(
        &mut self,
        command_buffers: &[CommandBufferId],
        signal: Option<(FenceId, u64)>,
    ) -> Result<()>;

    /// Blocks until `fence` reaches `value`. There is no timeout.
    fn wait_fence(&mut self, fence: FenceId, value: u64) -> Result<()>;
}
