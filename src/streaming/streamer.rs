//! Streamer
//!
//! Frame-pipelined upload of transient data (transforms, per-draw constants,
//! streamed texture regions) through one growing dynamic ring.
//!
//! # Frame Flow
//!
//! ```text
//!  Idle ──add_*()──▶ Accumulating ──commit()──▶ Committed ──upload_queued()──▶ Idle
//!                      │                          │
//!                      │ reserve slot offsets     │ grow ring, map slot,
//!                      │ copy payload to host     │ re-pitch, file copy
//!                      │ scratch                  │ queue, age garbage,
//!                      │                          │ advance
//! ```
//!
//! # Ring Layout
//!
//! ```text
//!  ┌──────────────┬──────────────┬──────────────┐
//!  │    slot 0    │    slot 1    │    slot 2    │   frame_in_flight_num = 2
//!  └──────────────┴──────────────┴──────────────┘
//!  ▲ offset_base = slot_size * frame_index
//! ```
//!
//! The ring is split into `frame_in_flight_num + 1` equal slots and a frame
//! only ever writes inside its own slot, so the GPU can still be reading
//! slot K while the CPU fills slot K + 1. Nothing here waits on the GPU; the
//! caller's frame pacing keeps the two apart.
//!
//! When a frame outgrows its slot, `commit` replaces the ring with one sized to
//! `align(frame_size, CHUNK) * slots` and retires the old buffer. The frame then
//! lands in the same slot index of the new ring, and `commit` returns where.
//! Retired buffers are destroyed once `frame_in_flight_num` further successful
//! commits have passed.

use std::ops::Range;

use bytemuck::Pod;

use crate::device::{
    BufferCopy, BufferDesc, BufferId, BufferTextureCopy, BufferUsage, CommandBufferId, DeviceDesc,
    Format, GraphicsDevice, MemoryLocation, TextureId, TextureRegion,
};
use crate::errors::{MemoryError, Result};
use crate::memory::BoundBuffer;
use crate::settings::{DYNAMIC_BUFFER_CHUNK_SIZE, StreamerSettings};
use crate::streaming::constant::ConstantRing;
use crate::upload::footprint::SubresourceFootprint;
use crate::utils::{align_down, align_up};

// ─── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDestination {
    pub buffer: BufferId,
    pub offset: u64,
}

/// Bytes to stream into the ring, optionally copied on to `dst`.
#[derive(Debug, Clone, Copy)]
pub struct BufferUpdateRequest<'a> {
    pub data: &'a [u8],
    pub dst: Option<BufferDestination>,
}

impl<'a> BufferUpdateRequest<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, dst: None }
    }

    #[must_use]
    pub fn to(mut self, buffer: BufferId, offset: u64) -> Self {
        self.dst = Some(BufferDestination { buffer, offset });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDestination {
    pub texture: TextureId,
    pub mip: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// A texture region to stream, described by its source layout.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpdateRequest<'a> {
    pub data: &'a [u8],
    pub data_row_pitch: u64,
    pub data_slice_pitch: u64,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub dst: Option<TextureDestination>,
}

impl<'a> TextureUpdateRequest<'a> {
    /// A tightly packed 2D region.
    #[must_use]
    pub fn packed(data: &'a [u8], format: Format, width: u32, height: u32) -> Self {
        let row_pitch = format.row_bytes(width);
        Self {
            data,
            data_row_pitch: row_pitch,
            data_slice_pitch: row_pitch * u64::from(format.block_rows(height)),
            format,
            width,
            height,
            depth: 1,
            dst: None,
        }
    }

    #[must_use]
    pub fn to(mut self, dst: TextureDestination) -> Self {
        self.dst = Some(dst);
        self
    }
}

// ─── Internal Types ───────────────────────────────────────────────────────────

struct PendingBuffer {
    payload: Range<usize>,
    local_offset: u64,
    dst: Option<BufferDestination>,
}

struct PendingTexture {
    payload: Range<usize>,
    src_row_pitch: u64,
    src_slice_pitch: u64,
    footprint: SubresourceFootprint,
    extent: (u32, u32, u32),
    local_offset: u64,
    dst: Option<TextureDestination>,
}

/// A replaced ring kept alive while in-flight frames may still read it.
struct GarbageBuffer {
    buffer: BoundBuffer,
    age_in_frames: u32,
}

// ─── Streamer ─────────────────────────────────────────────────────────────────

/// Per-frame upload ring. Not internally synchronized.
pub struct Streamer {
    settings: StreamerSettings,
    device_desc: DeviceDesc,

    constant: Option<ConstantRing>,
    dynamic: Option<BoundBuffer>,
    garbage: Vec<GarbageBuffer>,

    /// Payload bytes of this frame's requests.
    host_data: Vec<u8>,
    pending_buffers: Vec<PendingBuffer>,
    pending_textures: Vec<PendingTexture>,

    queued_buffer_copies: Vec<BufferCopy>,
    queued_texture_copies: Vec<BufferTextureCopy>,

    frame_index: u32,
    /// Bytes per frame slot. Zero until the ring exists.
    slot_size: u64,
    /// Every slot starts on a multiple of this.
    slot_alignment: u64,
    /// Global ring offset of the current frame's slot.
    offset_base: u64,
    /// Bytes reserved by this frame, measured from `offset_base`.
    frame_size: u64,
}

impl Streamer {
    pub fn new<D: GraphicsDevice + ?Sized>(device: &mut D, settings: &StreamerSettings) -> Result<Self> {
        settings.validate()?;

        let desc = *device.desc();
        let slot_alignment = desc
            .buffer_shader_resource_offset_alignment
            .max(desc.constant_buffer_offset_alignment)
            .max(desc.upload_buffer_texture_slice_alignment)
            .max(1);

        let mut streamer = Self {
            settings: *settings,
            device_desc: desc,
            constant: None,
            dynamic: None,
            garbage: Vec::new(),
            host_data: Vec::new(),
            pending_buffers: Vec::new(),
            pending_textures: Vec::new(),
            queued_buffer_copies: Vec::new(),
            queued_texture_copies: Vec::new(),
            frame_index: 0,
            slot_size: 0,
            slot_alignment,
            offset_base: 0,
            frame_size: 0,
        };

        let result = streamer.create_initial_buffers(device);
        if let Err(err) = result {
            streamer.destroy(device);
            return Err(err);
        }
        streamer.slot_size = streamer.slot_size_for(streamer.dynamic_capacity());
        Ok(streamer)
    }

    fn create_initial_buffers<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        if self.settings.constant_buffer_size > 0 {
            self.create_constant_region(
                device,
                self.settings.constant_buffer_size,
                self.settings.constant_buffer_memory_location,
            )?;
        }
        if self.settings.dynamic_buffer_size > 0 {
            let desc = self.dynamic_buffer_desc(self.settings.dynamic_buffer_size);
            self.dynamic = Some(BoundBuffer::create(
                device,
                &desc,
                self.settings.dynamic_buffer_memory_location,
            )?);
        }
        Ok(())
    }

    fn dynamic_buffer_desc(&self, size: u64) -> BufferDesc {
        BufferDesc::new(size, self.settings.dynamic_buffer_usage)
    }

    fn slot_size_for(&self, capacity: u64) -> u64 {
        let slots = u64::from(self.settings.ring_slot_num());
        align_down(capacity / slots, self.slot_alignment)
    }

    // ── Constant region ────────────────────────────────────────────────────

    /// Creates the fixed constant ring. Fails if one already exists or if
    /// `location` is not upload-class.
    pub fn create_constant_region<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        size: u64,
        location: MemoryLocation,
    ) -> Result<()> {
        if self.constant.is_some() {
            return Err(MemoryError::InvalidArgument(
                "streamer already owns a constant region".into(),
            ));
        }
        self.constant = Some(ConstantRing::create(device, size, location)?);
        Ok(())
    }

    /// Writes `data` into the constant ring and returns its offset.
    pub fn update_constant_region<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        data: &[u8],
    ) -> Result<u64> {
        self.constant
            .as_mut()
            .ok_or_else(|| MemoryError::InvalidArgument("streamer has no constant region".into()))?
            .update(device, data)
    }

    pub fn update_constants<D: GraphicsDevice + ?Sized, T: Pod>(
        &mut self,
        device: &mut D,
        value: &T,
    ) -> Result<u64> {
        self.constant
            .as_mut()
            .ok_or_else(|| MemoryError::InvalidArgument("streamer has no constant region".into()))?
            .update_pod(device, value)
    }

    // ── Accumulating ───────────────────────────────────────────────────────

    fn buffer_request_alignment(&self) -> u64 {
        let alignment = self.device_desc.buffer_shader_resource_offset_alignment;
        if self.settings.dynamic_buffer_usage.contains(BufferUsage::CONSTANT_BUFFER) {
            alignment.max(self.device_desc.constant_buffer_offset_alignment)
        } else {
            alignment
        }
    }

    /// Reserves `size` bytes in this frame's slot and returns the offset
    /// inside the slot.
    fn reserve(&mut self, size: u64, alignment: u64) -> u64 {
        let local = align_up(self.frame_size, alignment);
        self.frame_size = local + size;
        local
    }

    fn stash(&mut self, bytes: &[u8]) -> Range<usize> {
        let start = self.host_data.len();
        self.host_data.extend_from_slice(bytes);
        start..self.host_data.len()
    }

    /// Queues `request` for the next [`commit`](Self::commit) and returns the
    /// ring offset its bytes will occupy.
    ///
    /// The offset is `frame_offset_base() + local`. If `commit` has to grow the
    /// ring, the frame moves to the base `commit` returns and `local` is kept.
    /// The payload is copied, so `request.data` may be dropped right away.
    pub fn add_buffer_update_request(&mut self, request: &BufferUpdateRequest<'_>) -> Result<u64> {
        if request.data.is_empty() {
            return Err(MemoryError::InvalidArgument("empty buffer update request".into()));
        }

        let local_offset = self.reserve(request.data.len() as u64, self.buffer_request_alignment());
        let payload = self.stash(request.data);
        self.pending_buffers.push(PendingBuffer {
            payload,
            local_offset,
            dst: request.dst,
        });
        Ok(self.offset_base + local_offset)
    }

    /// Queues a texture region. Its footprint in the ring follows the
    /// backend's row and slice pitch alignment.
    pub fn add_texture_update_request(&mut self, request: &TextureUpdateRequest<'_>) -> Result<u64> {
        if request.width == 0 || request.height == 0 || request.depth == 0 {
            return Err(MemoryError::InvalidArgument(
                "texture update request has an empty extent".into(),
            ));
        }

        let footprint = SubresourceFootprint::new(
            request.format,
            request.width,
            request.height,
            request.depth,
            &self.device_desc,
        );
        if request.data_row_pitch < footprint.row_bytes {
            return Err(MemoryError::InvalidArgument(format!(
                "row pitch {} is smaller than a row of {} bytes",
                request.data_row_pitch, footprint.row_bytes
            )));
        }
        if request.depth > 1
            && request.data_slice_pitch < request.data_row_pitch * u64::from(footprint.rows)
        {
            return Err(MemoryError::InvalidArgument(format!(
                "slice pitch {} overlaps its rows",
                request.data_slice_pitch
            )));
        }
        let source_len = footprint.source_len(request.data_row_pitch, request.data_slice_pitch);
        if (request.data.len() as u64) < source_len {
            return Err(MemoryError::InvalidArgument(format!(
                "texture update needs {source_len} bytes but got {}",
                request.data.len()
            )));
        }

        let local_offset = self.reserve(
            footprint.size,
            self.device_desc.upload_buffer_texture_slice_alignment,
        );
        let payload = self.stash(&request.data[..source_len as usize]);
        self.pending_textures.push(PendingTexture {
            payload,
            src_row_pitch: request.data_row_pitch,
            src_slice_pitch: request.data_slice_pitch,
            footprint,
            extent: (request.width, request.height, request.depth),
            local_offset,
            dst: request.dst,
        });
        Ok(self.offset_base + local_offset)
    }

    // ── Committing ─────────────────────────────────────────────────────────

    /// Moves this frame's requests into its ring slot and advances to the
    /// next slot. Returns the global offset of the slot the frame was written
    /// to.
    ///
    /// On failure the pending requests stay queued and the frame does not
    /// advance, so the call can be retried. Retired rings only age on a
    /// commit that succeeds.
    pub fn commit<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<u64> {
        let mut retired = None;
        if self.frame_size > 0 {
            retired = self.ensure_capacity(device)?;
            if let Err(err) = self.copy_pending(device) {
                self.retire(retired);
                return Err(err);
            }
        }

        self.collect_garbage(device);
        self.retire(retired);

        let committed_base = self.offset_base;
        self.host_data.clear();
        self.pending_buffers.clear();
        self.pending_textures.clear();

        self.frame_index = (self.frame_index + 1) % self.settings.ring_slot_num();
        self.offset_base = self.slot_size * u64::from(self.frame_index);
        self.frame_size = 0;
        Ok(committed_base)
    }

    fn retire(&mut self, buffer: Option<BoundBuffer>) {
        if let Some(buffer) = buffer {
            self.garbage.push(GarbageBuffer {
                buffer,
                age_in_frames: 0,
            });
        }
    }

    fn collect_garbage<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        let frames_in_flight = self.settings.frame_in_flight_num;
        let mut index = 0;
        while index < self.garbage.len() {
            if self.garbage[index].age_in_frames >= frames_in_flight {
                let retired = self.garbage.swap_remove(index);
                log::debug!(
                    "Destroying retired {} byte dynamic ring",
                    retired.buffer.size
                );
                retired.buffer.destroy(device);
            } else {
                self.garbage[index].age_in_frames += 1;
                index += 1;
            }
        }
    }

    /// Grows the ring when this frame outgrows its slot. Returns the replaced
    /// ring, which in-flight frames may still be reading.
    fn ensure_capacity<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Option<BoundBuffer>> {
        if self.dynamic.is_some() && self.frame_size <= self.slot_size {
            return Ok(None);
        }

        let slot_size = align_up(self.frame_size, DYNAMIC_BUFFER_CHUNK_SIZE);
        let size = slot_size * u64::from(self.settings.ring_slot_num());
        let desc = self.dynamic_buffer_desc(size);
        let replacement =
            BoundBuffer::create(device, &desc, self.settings.dynamic_buffer_memory_location)?;

        log::info!(
            "Dynamic ring expanding capacity: {} -> {size} bytes",
            self.dynamic_capacity()
        );

        self.slot_size = slot_size;
        self.offset_base = slot_size * u64::from(self.frame_index);
        Ok(self.dynamic.replace(replacement))
    }

    fn copy_pending<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        let ring = self
            .dynamic
            .as_ref()
            .map(|d| d.buffer)
            .ok_or_else(|| MemoryError::Failure("dynamic ring is missing".into()))?;
        let base = self.offset_base;

        let window = device.map_buffer(ring, base, self.frame_size)?;
        for request in &self.pending_buffers {
            let src = &self.host_data[request.payload.clone()];
            let at = request.local_offset as usize;
            window[at..at + src.len()].copy_from_slice(src);
        }
        for request in &self.pending_textures {
            let src = &self.host_data[request.payload.clone()];
            let at = request.local_offset as usize;
            let dst = &mut window[at..at + request.footprint.size as usize];
            request
                .footprint
                .copy_rows(src, request.src_row_pitch, request.src_slice_pitch, dst);
        }
        device.unmap_buffer(ring);

        for request in &self.pending_buffers {
            if let Some(dst) = request.dst {
                self.queued_buffer_copies.push(BufferCopy {
                    src: ring,
                    src_offset: base + request.local_offset,
                    dst: dst.buffer,
                    dst_offset: dst.offset,
                    size: request.payload.len() as u64,
                });
            }
        }
        for request in &self.pending_textures {
            if let Some(dst) = request.dst {
                let (width, height, depth) = request.extent;
                self.queued_texture_copies.push(BufferTextureCopy {
                    src: ring,
                    src_offset: base + request.local_offset,
                    row_pitch: request.footprint.row_pitch,
                    slice_pitch: request.footprint.slice_pitch,
                    dst: TextureRegion {
                        texture: dst.texture,
                        mip: dst.mip,
                        layer: dst.layer,
                        x: dst.x,
                        y: dst.y,
                        z: dst.z,
                        width,
                        height,
                        depth,
                    },
                });
            }
        }
        Ok(())
    }

    // ── Uploading ──────────────────────────────────────────────────────────

    /// Records one copy per committed request that has a destination. Call
    /// after [`commit`](Self::commit) and before submitting `command_buffer`.
    ///
    /// Returns the number of copies recorded.
    pub fn upload_queued<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        command_buffer: CommandBufferId,
    ) -> usize {
        let count = self.queued_upload_count();
        for copy in self.queued_buffer_copies.drain(..) {
            device.record_copy_buffer_to_buffer(command_buffer, &copy);
        }
        for copy in self.queued_texture_copies.drain(..) {
            device.record_copy_buffer_to_texture(command_buffer, &copy);
        }
        count
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &StreamerSettings {
        &self.settings
    }

    #[must_use]
    pub fn constant_buffer(&self) -> Option<BufferId> {
        self.constant.as_ref().map(ConstantRing::buffer)
    }

    /// The constant ring, for reading its capacity and cursor.
    #[must_use]
    pub fn constant_ring(&self) -> Option<&ConstantRing> {
        self.constant.as_ref()
    }

    #[must_use]
    pub fn dynamic_buffer(&self) -> Option<BufferId> {
        self.dynamic.as_ref().map(|d| d.buffer)
    }

    #[must_use]
    pub fn dynamic_capacity(&self) -> u64 {
        self.dynamic.as_ref().map_or(0, |d| d.size)
    }

    /// Bytes one frame may reserve before `commit` grows the ring.
    #[must_use]
    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Global ring offset where the current frame's reservations start.
    #[must_use]
    pub fn frame_offset_base(&self) -> u64 {
        self.offset_base
    }

    #[must_use]
    pub fn garbage_count(&self) -> usize {
        self.garbage.len()
    }

    #[must_use]
    pub fn pending_request_count(&self) -> usize {
        self.pending_buffers.len() + self.pending_textures.len()
    }

    #[must_use]
    pub fn queued_upload_count(&self) -> usize {
        self.queued_buffer_copies.len() + self.queued_texture_copies.len()
    }

    /// Releases the rings and every retired buffer.
    pub fn destroy<D: GraphicsDevice + ?Sized>(mut self, device: &mut D) {
        if let Some(constant) = self.constant.take() {
            constant.destroy(device);
        }
        if let Some(dynamic) = self.dynamic.take() {
            dynamic.destroy(device);
        }
        for retired in self.garbage.drain(..) {
            retired.buffer.destroy(device);
        }
    }
}
