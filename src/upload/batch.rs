//! Data Uploader
//!
//! One-shot, blocking transfer of initial content into freshly bound
//! resources. Intended for scene loads, not per-frame traffic (use the
//! [`Streamer`](crate::streaming::Streamer) for that).
//!
//! # Passes
//!
//! ```text
//!  validate ─▶ create scratch ─▶ textures phase ─▶ buffers phase ─▶ teardown
//!                                  │
//!                                  ├─ barrier   before → COPY_DESTINATION
//!                                  ├─ pass      map staging @0, fill, unmap,
//!                                  │            record copies, submit, wait
//!                                  ├─ pass      ...
//!                                  └─ barrier   COPY_DESTINATION → after
//!                                               (recorded into the last pass)
//! ```
//!
//! Each pass packs as many whole texture subresources as fit in the staging
//! buffer. Buffers are split freely: a buffer larger than the staging buffer
//! resumes from its running content offset in the next pass. Subresources are
//! never split, so one whose aligned footprint exceeds the maximum staging size
//! is rejected with [`MemoryError::OutOfMemory`] before anything is created.

use smallvec::SmallVec;

use crate::device::{
    AccessLayoutStage, AccessStage, BarrierGroup, BufferBarrier, BufferCopy, BufferDesc, BufferId,
    BufferTextureCopy, BufferUsage, CommandAllocatorId, CommandBufferId, FenceId, GraphicsDevice,
    MemoryLocation, TextureBarrier, TextureDesc, TextureId, TextureRegion,
};
use crate::errors::{MemoryError, Result};
use crate::memory::BoundBuffer;
use crate::settings::UploadSettings;
use crate::upload::footprint::SubresourceFootprint;
use crate::utils::align_up;

/// Barriers recorded per call.
const MAX_BARRIERS_PER_CALL: usize = 256;

// ─── Requests ─────────────────────────────────────────────────────────────────

/// Source data of one texture subresource.
#[derive(Debug, Clone, Copy)]
pub struct TextureSubresourceUpload<'a> {
    pub data: &'a [u8],
    pub row_pitch: u64,
    /// Ignored for 2D subresources.
    pub slice_pitch: u64,
}

impl<'a> TextureSubresourceUpload<'a> {
    /// Tightly packed rows of `row_pitch` bytes.
    #[must_use]
    pub fn packed(data: &'a [u8], row_pitch: u64) -> Self {
        Self {
            data,
            row_pitch,
            slice_pitch: data.len() as u64,
        }
    }
}

/// Full content of one texture.
///
/// `subresources` is indexed by `layer * mip_num + mip`.
#[derive(Debug, Clone, Copy)]
pub struct TextureUploadDesc<'a> {
    pub subresources: &'a [TextureSubresourceUpload<'a>],
    pub texture: TextureId,
    pub before: AccessLayoutStage,
    pub after: AccessLayoutStage,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferUploadDesc<'a> {
    pub data: &'a [u8],
    pub buffer: BufferId,
    pub buffer_offset: u64,
    pub before: AccessStage,
    pub after: AccessStage,
}

/// Summary of a finished [`DataUploader::upload_data`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Submissions made, one per staging pass.
    pub submissions: u32,
    /// Size of the staging buffer that was used.
    pub staging_size: u64,
    /// Payload bytes transferred, excluding pitch padding.
    pub bytes_uploaded: u64,
}

// ─── Validation ───────────────────────────────────────────────────────────────

struct TexturePlan {
    desc: TextureDesc,
    footprints: Vec<SubresourceFootprint>,
}

struct UploadPlan {
    textures: Vec<TexturePlan>,
    staging_size: u64,
    payload_bytes: u64,
}

// ─── Scratch ──────────────────────────────────────────────────────────────────

/// Objects that live for one `upload_data` call.
#[derive(Default)]
struct Scratch {
    staging: Option<BoundBuffer>,
    allocator: Option<CommandAllocatorId>,
    command_buffer: Option<CommandBufferId>,
    fence: Option<FenceId>,
}

/// Handles of a fully created [`Scratch`].
#[derive(Clone, Copy)]
struct Submitter {
    staging: BufferId,
    staging_size: u64,
    allocator: CommandAllocatorId,
    command_buffer: CommandBufferId,
    fence: FenceId,
    fence_value: u64,
    submissions: u32,
}

impl Scratch {
    fn create<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        staging_size: u64,
    ) -> Result<Submitter> {
        let desc = BufferDesc::new(staging_size, BufferUsage::empty());
        let staging = BoundBuffer::create(device, &desc, MemoryLocation::HostUpload)?;
        let staging_id = staging.buffer;
        self.staging = Some(staging);

        let allocator = device.create_command_allocator()?;
        self.allocator = Some(allocator);
        let command_buffer = device.create_command_buffer(allocator)?;
        self.command_buffer = Some(command_buffer);
        let fence = device.create_fence(0)?;
        self.fence = Some(fence);

        Ok(Submitter {
            staging: staging_id,
            staging_size,
            allocator,
            command_buffer,
            fence,
            fence_value: 0,
            submissions: 0,
        })
    }

    fn release<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        if let Some(fence) = self.fence {
            device.destroy_fence(fence);
        }
        if let Some(command_buffer) = self.command_buffer {
            device.destroy_command_buffer(command_buffer);
        }
        if let Some(allocator) = self.allocator {
            device.destroy_command_allocator(allocator);
        }
        if let Some(staging) = self.staging {
            staging.destroy(device);
        }
    }
}

impl Submitter {
    fn begin<D: GraphicsDevice + ?Sized>(&self, device: &mut D) -> Result<()> {
        device.begin_command_buffer(self.command_buffer)
    }

    /// Ends, submits and waits for the command buffer, then resets it.
    fn flush<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        device.end_command_buffer(self.command_buffer)?;
        self.fence_value += 1;
        device.submit(&[self.command_buffer], Some((self.fence, self.fence_value)))?;
        device.wait_fence(self.fence, self.fence_value)?;
        device.reset_command_allocator(self.allocator);
        self.submissions += 1;
        log::debug!("Upload pass {} complete", self.submissions);
        Ok(())
    }
}

// ─── DataUploader ─────────────────────────────────────────────────────────────

/// Staged uploader for bulk initial data.
#[derive(Debug, Clone, Default)]
pub struct DataUploader {
    settings: UploadSettings,
}

impl DataUploader {
    #[must_use]
    pub fn new(settings: UploadSettings) -> Self {
        Self { settings }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Uploads every texture and buffer item, blocking until the GPU has
    /// consumed all of it.
    ///
    /// Each texture must be bound to memory and have one source entry per
    /// subresource. Scratch objects are destroyed whether or not the upload
    /// succeeds.
    pub fn upload_data<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        textures: &[TextureUploadDesc<'_>],
        buffers: &[BufferUploadDesc<'_>],
    ) -> Result<UploadStats> {
        self.settings.validate()?;
        let plan = self.plan(&*device, textures, buffers)?;
        if textures.is_empty() && buffers.is_empty() {
            return Ok(UploadStats::default());
        }

        let mut scratch = Scratch::default();
        let result = scratch.create(device, plan.staging_size).and_then(|mut submitter| {
            if !textures.is_empty() {
                upload_textures(device, &mut submitter, textures, &plan.textures)?;
            }
            if !buffers.is_empty() {
                upload_buffers(device, &mut submitter, buffers)?;
            }
            Ok(submitter.submissions)
        });
        scratch.release(device);

        let submissions = result?;
        log::info!(
            "Uploaded {} bytes ({} texture(s), {} buffer(s)) in {} pass(es) through {} byte staging",
            plan.payload_bytes,
            textures.len(),
            buffers.len(),
            submissions,
            plan.staging_size
        );
        Ok(UploadStats {
            submissions,
            staging_size: plan.staging_size,
            bytes_uploaded: plan.payload_bytes,
        })
    }

    /// Checks every item and sizes the staging buffer. Only queries the device.
    fn plan<D: GraphicsDevice + ?Sized>(
        &self,
        device: &D,
        textures: &[TextureUploadDesc<'_>],
        buffers: &[BufferUploadDesc<'_>],
    ) -> Result<UploadPlan> {
        let device_desc = *device.desc();
        let mut largest_footprint = 0;
        let mut payload_bytes = 0;
        let mut texture_plans = Vec::with_capacity(textures.len());

        for upload in textures {
            let desc = device.texture_desc(upload.texture).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown texture {:?}", upload.texture))
            })?;
            if upload.subresources.len() != desc.subresource_count() {
                return Err(MemoryError::InvalidArgument(format!(
                    "texture {:?} has {} subresources but {} were supplied",
                    upload.texture,
                    desc.subresource_count(),
                    upload.subresources.len()
                )));
            }

            let mut footprints = Vec::with_capacity(upload.subresources.len());
            for (index, source) in upload.subresources.iter().enumerate() {
                let mip = index as u32 % desc.mip_num;
                let (width, height, depth) = desc.mip_extent(mip);
                let footprint =
                    SubresourceFootprint::new(desc.format, width, height, depth, &device_desc);

                if source.row_pitch < footprint.row_bytes {
                    return Err(MemoryError::InvalidArgument(format!(
                        "subresource {index} of {:?}: row pitch {} is smaller than a row of {} bytes",
                        upload.texture, source.row_pitch, footprint.row_bytes
                    )));
                }
                let needed = footprint.source_len(source.row_pitch, source.slice_pitch);
                if (source.data.len() as u64) < needed {
                    return Err(MemoryError::InvalidArgument(format!(
                        "subresource {index} of {:?} needs {needed} bytes but got {}",
                        upload.texture,
                        source.data.len()
                    )));
                }
                if footprint.size > self.settings.max_staging_size {
                    return Err(MemoryError::OutOfMemory(format!(
                        "subresource {index} of {:?} needs {} staging bytes, limit is {}",
                        upload.texture, footprint.size, self.settings.max_staging_size
                    )));
                }

                largest_footprint = largest_footprint.max(footprint.size);
                payload_bytes +=
                    footprint.row_bytes * u64::from(footprint.rows) * u64::from(footprint.depth);
                footprints.push(footprint);
            }
            texture_plans.push(TexturePlan { desc, footprints });
        }

        for upload in buffers {
            if upload.data.is_empty() {
                return Err(MemoryError::InvalidArgument(format!(
                    "empty upload into buffer {:?}",
                    upload.buffer
                )));
            }
            let desc = device.buffer_desc(upload.buffer).ok_or_else(|| {
                MemoryError::InvalidArgument(format!("unknown buffer {:?}", upload.buffer))
            })?;
            let end = upload.buffer_offset + upload.data.len() as u64;
            if end > desc.size {
                return Err(MemoryError::InvalidArgument(format!(
                    "upload ends at {end}, past the {} byte buffer {:?}",
                    desc.size, upload.buffer
                )));
            }
            payload_bytes += upload.data.len() as u64;
        }

        Ok(UploadPlan {
            textures: texture_plans,
            staging_size: self.settings.min_staging_size.max(largest_footprint),
            payload_bytes,
        })
    }
}

// ─── Phases ───────────────────────────────────────────────────────────────────

fn upload_textures<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    submitter: &mut Submitter,
    textures: &[TextureUploadDesc<'_>],
    plans: &[TexturePlan],
) -> Result<()> {
    let slice_alignment = device.desc().upload_buffer_texture_slice_alignment;

    submitter.begin(device)?;
    record_texture_barriers(device, submitter.command_buffer, textures, |t| {
        (t.before, AccessLayoutStage::COPY_DESTINATION)
    });

    let mut item = 0;
    let mut subresource = 0;
    loop {
        let mut copies: SmallVec<[BufferTextureCopy; 16]> = SmallVec::new();
        let staging = device.map_buffer(submitter.staging, 0, submitter.staging_size)?;
        let mut cursor = 0;

        while item < textures.len() {
            let plan = &plans[item];
            let footprint = plan.footprints[subresource];
            let offset = align_up(cursor, slice_alignment);
            if offset + footprint.size > submitter.staging_size {
                break;
            }

            let source = &textures[item].subresources[subresource];
            let window = &mut staging[offset as usize..(offset + footprint.size) as usize];
            footprint.copy_rows(source.data, source.row_pitch, source.slice_pitch, window);

            let mip = subresource as u32 % plan.desc.mip_num;
            let layer = subresource as u32 / plan.desc.mip_num;
            copies.push(BufferTextureCopy {
                src: submitter.staging,
                src_offset: offset,
                row_pitch: footprint.row_pitch,
                slice_pitch: footprint.slice_pitch,
                dst: TextureRegion::subresource(textures[item].texture, &plan.desc, mip, layer),
            });
            cursor = offset + footprint.size;

            subresource += 1;
            if subresource == plan.footprints.len() {
                item += 1;
                subresource = 0;
            }
        }
        device.unmap_buffer(submitter.staging);

        for copy in &copies {
            device.record_copy_buffer_to_texture(submitter.command_buffer, copy);
        }

        if item == textures.len() {
            record_texture_barriers(device, submitter.command_buffer, textures, |t| {
                (AccessLayoutStage::COPY_DESTINATION, t.after)
            });
            return submitter.flush(device);
        }
        submitter.flush(device)?;
        submitter.begin(device)?;
    }
}

fn upload_buffers<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    submitter: &mut Submitter,
    buffers: &[BufferUploadDesc<'_>],
) -> Result<()> {
    submitter.begin(device)?;
    record_buffer_barriers(device, submitter.command_buffer, buffers, |b| {
        (b.before, AccessStage::COPY_DESTINATION)
    });

    let mut item = 0;
    let mut content_offset = 0;
    loop {
        let mut copies: SmallVec<[BufferCopy; 16]> = SmallVec::new();
        let staging = device.map_buffer(submitter.staging, 0, submitter.staging_size)?;
        let mut cursor = 0;

        while item < buffers.len() && cursor < submitter.staging_size {
            let upload = &buffers[item];
            let remaining = &upload.data[content_offset..];
            let chunk = remaining.len().min((submitter.staging_size - cursor) as usize);

            let at = cursor as usize;
            staging[at..at + chunk].copy_from_slice(&remaining[..chunk]);
            copies.push(BufferCopy {
                src: submitter.staging,
                src_offset: cursor,
                dst: upload.buffer,
                dst_offset: upload.buffer_offset + content_offset as u64,
                size: chunk as u64,
            });
            cursor += chunk as u64;

            content_offset += chunk;
            if content_offset == upload.data.len() {
                item += 1;
                content_offset = 0;
            }
        }
        device.unmap_buffer(submitter.staging);

        for copy in &copies {
            device.record_copy_buffer_to_buffer(submitter.command_buffer, copy);
        }

        if item == buffers.len() {
            record_buffer_barriers(device, submitter.command_buffer, buffers, |b| {
                (AccessStage::COPY_DESTINATION, b.after)
            });
            return submitter.flush(device);
        }
        submitter.flush(device)?;
        submitter.begin(device)?;
    }
}

// ─── Barriers ─────────────────────────────────────────────────────────────────

fn record_texture_barriers<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    command_buffer: CommandBufferId,
    textures: &[TextureUploadDesc<'_>],
    transition: impl Fn(&TextureUploadDesc<'_>) -> (AccessLayoutStage, AccessLayoutStage),
) {
    let mut batch: Vec<TextureBarrier> = Vec::with_capacity(textures.len().min(MAX_BARRIERS_PER_CALL));
    for chunk in textures.chunks(MAX_BARRIERS_PER_CALL) {
        batch.clear();
        batch.extend(chunk.iter().map(|t| {
            let (before, after) = transition(t);
            TextureBarrier {
                texture: t.texture,
                before,
                after,
            }
        }));
        device.record_barrier(
            command_buffer,
            &BarrierGroup {
                buffers: &[],
                textures: &batch,
            },
        );
    }
}

fn record_buffer_barriers<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    command_buffer: CommandBufferId,
    buffers: &[BufferUploadDesc<'_>],
    transition: impl Fn(&BufferUploadDesc<'_>) -> (AccessStage, AccessStage),
) {
    let mut batch: Vec<BufferBarrier> = Vec::with_capacity(buffers.len().min(MAX_BARRIERS_PER_CALL));
    for chunk in buffers.chunks(MAX_BARRIERS_PER_CALL) {
        batch.clear();
        batch.extend(chunk.iter().map(|b| {
            let (before, after) = transition(b);
            BufferBarrier {
                buffer: b.buffer,
                before,
                after,
            }
        }));
        device.record_barrier(
            command_buffer,
            &BarrierGroup {
                buffers: &batch,
                textures: &[],
            },
        );
    }
}
