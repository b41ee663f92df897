//! Data types exchanged with the Core Graphics Interface.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::format::Format;

new_key_type! {
    pub struct BufferId;
    pub struct TextureId;
    pub struct MemoryId;
    pub struct CommandAllocatorId;
    pub struct CommandBufferId;
    pub struct FenceId;
}

// ============================================================================
// Memory
// ============================================================================

/// Where the caller intends a resource to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemoryLocation {
    /// Device-local, not host-visible.
    #[default]
    Device,
    /// Device-local and host-visible (resizable BAR class memory).
    DeviceUpload,
    /// Host memory the device can read.
    HostUpload,
    /// Host memory the device writes for CPU readback.
    HostReadback,
}

impl MemoryLocation {
    /// `true` for the two locations the CPU writes and the GPU reads.
    #[inline]
    #[must_use]
    pub fn is_upload(self) -> bool {
        matches!(self, Self::DeviceUpload | Self::HostUpload)
    }

    #[inline]
    #[must_use]
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::Device)
    }
}

/// Opaque backend classification of physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryType(pub u32);

/// Placement rules for one resource in one memory location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirement {
    pub memory_type: MemoryType,
    pub size: u64,
    pub alignment: u64,
    /// The resource must own its allocation.
    pub must_be_dedicated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMemoryBinding {
    pub buffer: BufferId,
    pub memory: MemoryId,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureMemoryBinding {
    pub texture: TextureId,
    pub memory: MemoryId,
    pub offset: u64,
}

// ============================================================================
// Resources
// ============================================================================

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const SHADER_RESOURCE         = 1 << 0;
        const SHADER_RESOURCE_STORAGE = 1 << 1;
        const VERTEX_BUFFER           = 1 << 2;
        const INDEX_BUFFER            = 1 << 3;
        const CONSTANT_BUFFER         = 1 << 4;
        const ARGUMENT_BUFFER         = 1 << 5;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const SHADER_RESOURCE          = 1 << 0;
        const SHADER_RESOURCE_STORAGE  = 1 << 1;
        const COLOR_ATTACHMENT         = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub size: u64,
    pub structure_stride: u32,
    pub usage: BufferUsage,
}

impl BufferDesc {
    #[must_use]
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            size,
            structure_stride: 0,
            usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub format: Format,
    pub width: u32,
    pub height: u32,
    /// Depth of a 3D texture, `1` otherwise.
    pub depth: u32,
    pub mip_num: u32,
    pub layer_num: u32,
    pub usage: TextureUsage,
}

impl TextureDesc {
    #[must_use]
    pub fn texture_2d(format: Format, width: u32, height: u32, mip_num: u32) -> Self {
        Self {
            format,
            width,
            height,
            depth: 1,
            mip_num,
            layer_num: 1,
            usage: TextureUsage::SHADER_RESOURCE,
        }
    }

    #[must_use]
    pub fn with_layers(mut self, layer_num: u32) -> Self {
        self.layer_num = layer_num;
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Extent of `mip` as `(width, height, depth)`, never smaller than one texel.
    #[inline]
    #[must_use]
    pub fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        (
            (self.width >> mip).max(1),
            (self.height >> mip).max(1),
            (self.depth >> mip).max(1),
        )
    }

    /// Subresources are ordered layer-major: `layer * mip_num + mip`.
    #[inline]
    #[must_use]
    pub fn subresource_count(&self) -> usize {
        self.mip_num as usize * self.layer_num as usize
    }

    #[inline]
    #[must_use]
    pub fn subresource_index(&self, mip: u32, layer: u32) -> usize {
        layer as usize * self.mip_num as usize + mip as usize
    }
}

// ============================================================================
// Barriers
// ============================================================================

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AccessBits: u32 {
        const INDEX_BUFFER             = 1 << 0;
        const VERTEX_BUFFER            = 1 << 1;
        const CONSTANT_BUFFER          = 1 << 2;
        const SHADER_RESOURCE          = 1 << 3;
        const SHADER_RESOURCE_STORAGE  = 1 << 4;
        const ARGUMENT_BUFFER          = 1 << 5;
        const COLOR_ATTACHMENT         = 1 << 6;
        const DEPTH_STENCIL_WRITE      = 1 << 7;
        const COPY_SOURCE              = 1 << 8;
        const COPY_DESTINATION         = 1 << 9;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct StageBits: u32 {
        const INDEX_INPUT     = 1 << 0;
        const VERTEX_SHADER   = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const COMPUTE_SHADER  = 1 << 3;
        const COPY            = 1 << 4;
        const ALL             = (1 << 5) - 1;
    }
}

/// Image layout of a texture between two barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    Undefined,
    General,
    CopySource,
    CopyDestination,
    ShaderResource,
    ShaderResourceStorage,
    ColorAttachment,
    DepthStencilAttachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessStage {
    pub access: AccessBits,
    pub stages: StageBits,
}

impl AccessStage {
    pub const NONE: Self = Self {
        access: AccessBits::empty(),
        stages: StageBits::empty(),
    };

    pub const COPY_DESTINATION: Self = Self {
        access: AccessBits::COPY_DESTINATION,
        stages: StageBits::COPY,
    };

    #[must_use]
    pub const fn new(access: AccessBits, stages: StageBits) -> Self {
        Self { access, stages }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessLayoutStage {
    pub access: AccessBits,
    pub layout: Layout,
    pub stages: StageBits,
}

impl AccessLayoutStage {
    pub const UNDEFINED: Self = Self {
        access: AccessBits::empty(),
        layout: Layout::Undefined,
        stages: StageBits::empty(),
    };

    pub const COPY_DESTINATION: Self = Self {
        access: AccessBits::COPY_DESTINATION,
        layout: Layout::CopyDestination,
        stages: StageBits::COPY,
    };

    #[must_use]
    pub const fn new(access: AccessBits, layout: Layout, stages: StageBits) -> Self {
        Self {
            access,
            layout,
            stages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: BufferId,
    pub before: AccessStage,
    pub after: AccessStage,
}

/// Transition covering every subresource of `texture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBarrier {
    pub texture: TextureId,
    pub before: AccessLayoutStage,
    pub after: AccessLayoutStage,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BarrierGroup<'a> {
    pub buffers: &'a [BufferBarrier],
    pub textures: &'a [TextureBarrier],
}

// ============================================================================
// Copies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src: BufferId,
    pub src_offset: u64,
    pub dst: BufferId,
    pub dst_offset: u64,
    pub size: u64,
}

/// A box inside one subresource. Offsets and extents are in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub texture: TextureId,
    pub mip: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl TextureRegion {
    /// The whole of subresource `(mip, layer)`.
    #[must_use]
    pub fn subresource(texture: TextureId, desc: &TextureDesc, mip: u32, layer: u32) -> Self {
        let (width, height, depth) = desc.mip_extent(mip);
        Self {
            texture,
            mip,
            layer,
            x: 0,
            y: 0,
            z: 0,
            width,
            height,
            depth,
        }
    }
}

/// Copy from a linear buffer layout into a texture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTextureCopy {
    pub src: BufferId,
    pub src_offset: u64,
    pub row_pitch: u64,
    pub slice_pitch: u64,
    pub dst: TextureRegion,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Alignment rules a backend imposes on placement and copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDesc {
    /// Row pitch alignment of a buffer used as a texture copy source.
    pub upload_buffer_texture_row_alignment: u64,
    /// Offset/slice pitch alignment of a buffer used as a texture copy source.
    pub upload_buffer_texture_slice_alignment: u64,
    pub constant_buffer_offset_alignment: u64,
    pub buffer_shader_resource_offset_alignment: u64,
    /// Extra spacing required when a texture follows buffers in one allocation.
    pub buffer_texture_granularity: u64,
}

impl Default for DeviceDesc {
    fn default() -> Self {
        Self {
            upload_buffer_texture_row_alignment: 256,
            upload_buffer_texture_slice_alignment: 512,
            constant_buffer_offset_alignment: 256,
            buffer_shader_resource_offset_alignment: 16,
            buffer_texture_granularity: 65536,
        }
    }
}
