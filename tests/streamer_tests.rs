//! Streamer Tests
//!
//! Tests for:
//! - Ring reservation offsets and byte-exact commits
//! - Texture re-pitching into the ring
//! - Ring growth and retired buffer lifetime
//! - Queued copies into destination resources
//! - Constant ring wraparound
//! - Failure handling (invalid requests, failed growth)

use myth_memory::device::software::SoftwareDevice;
use myth_memory::device::{
    BufferDesc, BufferUsage, Format, GraphicsDevice, MemoryLocation, TextureDesc,
};
use myth_memory::memory::{BoundBuffer, ResourceGroupDesc, allocate_and_bind_memory};
use myth_memory::streaming::{
    BufferUpdateRequest, ConstantRing, Streamer, TextureDestination, TextureUpdateRequest,
};
use myth_memory::{MemoryError, StreamerSettings};

const RING_SLOT: u64 = 64 * 1024;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Streamer without a constant ring.
fn dynamic_only(frame_in_flight_num: u32, dynamic_buffer_size: u64) -> StreamerSettings {
    StreamerSettings {
        constant_buffer_size: 0,
        dynamic_buffer_size,
        frame_in_flight_num,
        ..Default::default()
    }
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

fn ring_bytes<'a>(device: &'a SoftwareDevice, streamer: &Streamer) -> &'a [u8] {
    let ring = streamer.dynamic_buffer().expect("dynamic ring exists");
    device.buffer_contents(ring).expect("ring is bound")
}

// ============================================================================
// Reservation & Commit
// ============================================================================

#[test]
fn committed_bytes_match_at_returned_offsets() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;

    let a = pattern(100, 1);
    let b = pattern(3000, 2);
    let c = pattern(7, 3);
    let offset_a = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&a))?;
    let offset_b = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&b))?;
    let offset_c = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&c))?;

    assert_eq!(offset_a, 0);
    assert_eq!(offset_b, 112);
    assert_eq!(offset_c, 3120);
    assert_eq!(streamer.pending_request_count(), 3);

    streamer.commit(&mut device)?;

    let ring = ring_bytes(&device, &streamer);
    assert_eq!(&ring[offset_a as usize..][..a.len()], a.as_slice());
    assert_eq!(&ring[offset_b as usize..][..b.len()], b.as_slice());
    assert_eq!(&ring[offset_c as usize..][..c.len()], c.as_slice());
    assert_eq!(streamer.pending_request_count(), 0);
    Ok(())
}

#[test]
fn payload_is_copied_at_add_time() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;

    let offset = {
        let transient = vec![0x5Au8; 64];
        streamer.add_buffer_update_request(&BufferUpdateRequest::new(&transient))?
    };
    streamer.commit(&mut device)?;

    let ring = ring_bytes(&device, &streamer);
    assert!(ring[offset as usize..][..64].iter().all(|&b| b == 0x5A));
    Ok(())
}

#[test]
fn frames_advance_through_ring_slots() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;
    let data = pattern(1024, 9);

    let mut offsets = Vec::new();
    for _ in 0..4 {
        offsets.push(streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?);
        streamer.commit(&mut device)?;
    }

    // three slots: the fourth frame wraps back to the start
    assert_eq!(streamer.slot_size(), RING_SLOT);
    assert_eq!(offsets, vec![0, RING_SLOT, 2 * RING_SLOT, 0]);
    assert_eq!(streamer.frame_index(), 1);
    assert_eq!(streamer.frame_offset_base(), RING_SLOT);
    Ok(())
}

#[test]
fn commit_returns_the_slot_it_wrote() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[1u8; 16]))?;
    assert_eq!(streamer.commit(&mut device)?, 0);
    let offset = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[2u8; 16]))?;
    assert_eq!(streamer.commit(&mut device)?, offset);
    assert_eq!(streamer.commit(&mut device)?, 2 * RING_SLOT);
    Ok(())
}

#[test]
fn constant_usage_raises_request_alignment() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let settings = StreamerSettings {
        dynamic_buffer_usage: BufferUsage::CONSTANT_BUFFER,
        ..dynamic_only(2, 0)
    };
    let mut streamer = Streamer::new(&mut device, &settings)?;
    let data = [1u8; 10];

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?;
    let second = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?;

    assert_eq!(second, 256);
    Ok(())
}

#[test]
fn empty_frame_commit_leaves_ring_untouched() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;

    streamer.commit(&mut device)?;
    streamer.commit(&mut device)?;

    assert_eq!(streamer.dynamic_buffer(), None);
    assert_eq!(streamer.frame_index(), 2);
    assert_eq!(device.stats().live_buffers, 0);
    Ok(())
}

// ============================================================================
// Texture Requests
// ============================================================================

#[test]
fn texture_rows_are_repitched_in_the_ring() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;
    let texels = pattern(4 * 4 * 3, 7);

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[1, 2, 3]))?;
    let offset = streamer.add_texture_update_request(&TextureUpdateRequest::packed(
        &texels,
        Format::Rgba8Unorm,
        4,
        3,
    ))?;
    assert_eq!(offset % 512, 0);
    assert_eq!(offset, 512);

    streamer.commit(&mut device)?;

    let ring = ring_bytes(&device, &streamer);
    for row in 0..3 {
        let ring_row = &ring[offset as usize + row * 256..][..16];
        assert_eq!(ring_row, &texels[row * 16..(row + 1) * 16], "row {row}");
    }
    Ok(())
}

#[test]
fn texture_request_with_source_pitch_skips_padding() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;
    // two rows of 2 R8 texels, each followed by 6 bytes of padding
    let source = [1u8, 2, 0, 0, 0, 0, 0, 0, 3, 4];
    let request = TextureUpdateRequest {
        data: &source,
        data_row_pitch: 8,
        data_slice_pitch: 16,
        format: Format::R8Unorm,
        width: 2,
        height: 2,
        depth: 1,
        dst: None,
    };

    let offset = streamer.add_texture_update_request(&request)? as usize;
    streamer.commit(&mut device)?;

    let ring = ring_bytes(&device, &streamer);
    assert_eq!(&ring[offset..offset + 2], &[1, 2]);
    assert_eq!(&ring[offset + 256..offset + 258], &[3, 4]);
    Ok(())
}

#[test]
fn malformed_requests_are_rejected() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;

    assert!(matches!(
        streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[])),
        Err(MemoryError::InvalidArgument(_))
    ));

    let short = [0u8; 15];
    assert!(matches!(
        streamer.add_texture_update_request(&TextureUpdateRequest::packed(&short, Format::Rgba8Unorm, 2, 2)),
        Err(MemoryError::InvalidArgument(_))
    ));

    let empty = TextureUpdateRequest::packed(&short, Format::R8Unorm, 0, 1);
    assert!(matches!(
        streamer.add_texture_update_request(&empty),
        Err(MemoryError::InvalidArgument(_))
    ));

    let narrow = TextureUpdateRequest {
        data_row_pitch: 4,
        ..TextureUpdateRequest::packed(&[0u8; 64], Format::Rgba8Unorm, 2, 2)
    };
    assert!(matches!(
        streamer.add_texture_update_request(&narrow),
        Err(MemoryError::InvalidArgument(_))
    ));

    assert_eq!(streamer.pending_request_count(), 0);
    Ok(())
}

// ============================================================================
// Growth & Garbage
// ============================================================================

#[test]
fn wrapped_frame_never_overwrites_frames_in_flight() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;
    let original = streamer.dynamic_buffer().expect("dynamic ring exists");

    let mut offsets = Vec::new();
    for fill in [0x11u8, 0x22, 0x33] {
        let offset = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[fill; 10_000]))?;
        streamer.commit(&mut device)?;
        offsets.push(offset);
    }
    assert_eq!(offsets, vec![0, RING_SLOT, 2 * RING_SLOT]);

    // wraps to slot 0 but needs more than one slot
    let big = vec![0x44u8; 150_000];
    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&big))?;
    let base = streamer.commit(&mut device)?;

    assert_eq!(base, 0);
    assert_eq!(streamer.garbage_count(), 1);
    assert_eq!(streamer.dynamic_capacity(), 3 * RING_SLOT * 3);
    assert_eq!(streamer.slot_size(), 3 * RING_SLOT);
    assert_eq!(&ring_bytes(&device, &streamer)[..big.len()], big.as_slice());

    let retired = device.buffer_contents(original).expect("retired ring is alive");
    for (offset, fill) in offsets.iter().zip([0x11u8, 0x22, 0x33]) {
        let at = *offset as usize;
        assert!(retired[at..at + 10_000].iter().all(|&b| b == fill), "slot at {offset}");
    }
    Ok(())
}

#[test]
fn frames_stay_inside_their_slot() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[0x22u8; 4096]))?;
    streamer.commit(&mut device)?;
    // fills slot 1 exactly
    let full = vec![0x33u8; RING_SLOT as usize];
    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&full))?;
    streamer.commit(&mut device)?;

    assert_eq!(streamer.garbage_count(), 0);
    let ring = ring_bytes(&device, &streamer);
    assert!(ring[..4096].iter().all(|&b| b == 0x22));
    assert!(ring[RING_SLOT as usize..2 * RING_SLOT as usize].iter().all(|&b| b == 0x33));
    assert!(ring[2 * RING_SLOT as usize..].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn grown_frame_keeps_its_slot_index() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;
    streamer.commit(&mut device)?;

    let data = pattern(100_000, 12);
    let reserved = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?;
    assert_eq!(reserved, RING_SLOT);
    let base = streamer.commit(&mut device)?;

    // the slot grows to two chunks, so slot 1 now starts at 128 KiB
    assert_eq!(base, 2 * RING_SLOT);
    let local = (reserved - RING_SLOT) as usize;
    assert_eq!(&ring_bytes(&device, &streamer)[base as usize + local..][..data.len()], data.as_slice());
    Ok(())
}

#[test]
fn no_garbage_while_frames_fit() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;
    let ring = streamer.dynamic_buffer();
    let data = pattern(20_000, 4);

    for _ in 0..30 {
        streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?;
        streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?;
        streamer.commit(&mut device)?;
        assert_eq!(streamer.garbage_count(), 0);
    }

    assert_eq!(streamer.dynamic_buffer(), ring);
    assert_eq!(streamer.dynamic_capacity(), 3 * RING_SLOT);
    Ok(())
}

#[test]
fn first_commit_creates_ring_without_garbage() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;
    assert_eq!(streamer.dynamic_capacity(), 0);

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[0u8; 1000]))?;
    streamer.commit(&mut device)?;

    assert_eq!(streamer.dynamic_capacity(), 3 * RING_SLOT);
    assert_eq!(streamer.garbage_count(), 0);
    Ok(())
}

#[test]
fn overflow_triggers_exactly_one_growth() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;
    let original = streamer.dynamic_buffer();

    let big = pattern(200_000, 5);
    let offset = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&big))?;
    streamer.commit(&mut device)?;

    let grown = streamer.dynamic_buffer();
    assert_ne!(grown, original);
    assert_eq!(streamer.dynamic_capacity(), 4 * RING_SLOT * 3);
    assert_eq!(streamer.garbage_count(), 1);
    assert_eq!(&ring_bytes(&device, &streamer)[offset as usize..][..big.len()], big.as_slice());

    // the grown ring absorbs the same load without growing again
    for _ in 0..6 {
        streamer.add_buffer_update_request(&BufferUpdateRequest::new(&big))?;
        streamer.commit(&mut device)?;
        assert_eq!(streamer.dynamic_buffer(), grown);
    }
    Ok(())
}

#[test]
fn retired_ring_outlives_frames_in_flight() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;
    let small = pattern(512, 6);
    let big = pattern(200_000, 7);

    for _frame in 0..5 {
        streamer.add_buffer_update_request(&BufferUpdateRequest::new(&small))?;
        streamer.commit(&mut device)?;
    }
    assert_eq!(device.stats().live_buffers, 1);

    // frame 5 grows the ring
    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&big))?;
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 1);
    assert_eq!(device.stats().live_buffers, 2);

    // frames 6 and 7 keep the retired ring alive
    for _frame in 6..8 {
        streamer.commit(&mut device)?;
        assert_eq!(streamer.garbage_count(), 1);
        assert_eq!(device.stats().live_buffers, 2);
    }

    // frame 8 destroys it at the start of its commit
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 0);
    assert_eq!(device.stats().live_buffers, 1);
    assert_eq!(device.stats().live_allocations, 1);
    Ok(())
}

#[test]
fn failed_growth_keeps_pending_requests() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;
    let data = pattern(4096, 8);
    let offset = streamer.add_buffer_update_request(&BufferUpdateRequest::new(&data))?;

    device.fail_allocations_after(0);
    let result = streamer.commit(&mut device);

    assert!(matches!(result, Err(MemoryError::OutOfMemory(_))));
    assert_eq!(streamer.pending_request_count(), 1);
    assert_eq!(streamer.frame_index(), 0);
    assert_eq!(device.stats().live_buffers, 0);

    device.clear_allocation_failure();
    streamer.commit(&mut device)?;

    assert_eq!(streamer.pending_request_count(), 0);
    assert_eq!(&ring_bytes(&device, &streamer)[offset as usize..][..data.len()], data.as_slice());
    Ok(())
}

#[test]
fn failed_commits_do_not_age_retired_rings() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 3 * RING_SLOT))?;

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&vec![1u8; 100_000]))?;
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 1);

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&vec![2u8; 300_000]))?;
    device.fail_allocations_after(0);
    for _ in 0..3 {
        assert!(streamer.commit(&mut device).is_err());
    }
    assert_eq!(streamer.frame_index(), 1);
    assert_eq!(streamer.garbage_count(), 1);
    assert_eq!(streamer.pending_request_count(), 1);

    // the retry grows again; the first retired ring still needs two more frames
    device.clear_allocation_failure();
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 2);
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 2);
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 1);
    Ok(())
}

// ============================================================================
// Queued Uploads
// ============================================================================

#[test]
fn queued_copies_reach_their_destinations() -> anyhow::Result<()> {
    init_logger();
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;

    let target = BoundBuffer::create(
        &mut device,
        &BufferDesc::new(1024, BufferUsage::SHADER_RESOURCE),
        MemoryLocation::Device,
    )?;
    let texture = device.create_texture(&TextureDesc::texture_2d(Format::Rgba8Unorm, 8, 8, 1))?;
    allocate_and_bind_memory(
        &mut device,
        &ResourceGroupDesc::new(MemoryLocation::Device).with_textures(&[texture]),
    )?;

    let bytes = pattern(300, 10);
    let texels = pattern(4 * 4 * 4, 11);
    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&bytes).to(target.buffer, 64))?;
    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[9u8; 32]))?;
    streamer.add_texture_update_request(
        &TextureUpdateRequest::packed(&texels, Format::Rgba8Unorm, 4, 4).to(TextureDestination {
            texture,
            mip: 0,
            layer: 0,
            x: 4,
            y: 2,
            z: 0,
        }),
    )?;
    assert_eq!(streamer.queued_upload_count(), 0);

    streamer.commit(&mut device)?;
    assert_eq!(streamer.queued_upload_count(), 2);

    let allocator = device.create_command_allocator()?;
    let command_buffer = device.create_command_buffer(allocator)?;
    device.begin_command_buffer(command_buffer)?;
    assert_eq!(streamer.upload_queued(&mut device, command_buffer), 2);
    device.end_command_buffer(command_buffer)?;
    device.submit(&[command_buffer], None)?;

    assert_eq!(streamer.queued_upload_count(), 0);
    let contents = device.buffer_contents(target.buffer).expect("target is bound");
    assert_eq!(&contents[64..364], bytes.as_slice());
    assert!(contents[..64].iter().all(|&b| b == 0));

    let image = device.texture_subresource(texture, 0, 0).expect("texture exists");
    for row in 0..4 {
        let at = (2 + row) * 8 * 4 + 4 * 4;
        assert_eq!(&image[at..at + 16], &texels[row * 16..(row + 1) * 16], "row {row}");
    }
    Ok(())
}

// ============================================================================
// Constant Ring
// ============================================================================

#[test]
fn constant_ring_wraps_to_zero() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let settings = StreamerSettings {
        constant_buffer_size: 1024,
        ..Default::default()
    };
    let mut streamer = Streamer::new(&mut device, &settings)?;
    let data = [3u8; 100];

    let offsets: Vec<u64> = (0..5)
        .map(|_| streamer.update_constant_region(&mut device, &data))
        .collect::<Result<_, _>>()?;

    assert_eq!(offsets, vec![0, 256, 512, 768, 0]);
    Ok(())
}

#[test]
fn typed_constants_land_in_the_constant_buffer() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &StreamerSettings::default())?;
    let value: [f32; 4] = [1.0, 2.0, 3.0, 4.0];

    streamer.update_constant_region(&mut device, &[0xFF; 8])?;
    let offset = streamer.update_constants(&mut device, &value)?;

    assert_eq!(offset, 256);
    let buffer = streamer.constant_buffer().expect("constant ring exists");
    let contents = device.buffer_contents(buffer).expect("bound");
    assert_eq!(&contents[256..272], bytemuck::bytes_of(&value));

    let ring = streamer.constant_ring().expect("constant ring exists");
    assert_eq!(ring.capacity(), 64 * 1024);
    assert_eq!(ring.cursor(), 512);
    Ok(())
}

#[test]
fn standalone_constant_ring_takes_pod_values() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut ring = ConstantRing::create(&mut device, 512, MemoryLocation::HostUpload)?;
    let value: [u32; 2] = [0xDEAD_BEEF, 7];

    assert_eq!(ring.update_pod(&mut device, &value)?, 0);
    assert_eq!(ring.update_pod(&mut device, &value)?, 256);
    assert_eq!(ring.update_pod(&mut device, &value)?, 0);

    let contents = device.buffer_contents(ring.buffer()).expect("bound");
    assert_eq!(&contents[256..264], bytemuck::bytes_of(&value));
    ring.destroy(&mut device);
    assert_eq!(device.stats().live_buffers, 0);
    Ok(())
}

#[test]
fn constant_ring_rejects_device_local_memory() {
    let mut device = SoftwareDevice::default();

    let result = ConstantRing::create(&mut device, 1024, MemoryLocation::Device);
    assert!(matches!(result, Err(MemoryError::InvalidArgument(_))));

    let settings = StreamerSettings {
        constant_buffer_memory_location: MemoryLocation::Device,
        ..Default::default()
    };
    assert!(matches!(
        Streamer::new(&mut device, &settings),
        Err(MemoryError::InvalidArgument(_))
    ));
    assert_eq!(device.stats().live_buffers, 0);
}

#[test]
fn constant_update_rejects_oversized_and_missing_region() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut ring = ConstantRing::create(&mut device, 512, MemoryLocation::HostUpload)?;
    assert!(ring.update(&mut device, &[0u8; 513]).unwrap_err().is_out_of_memory());
    ring.destroy(&mut device);

    let mut streamer = Streamer::new(&mut device, &dynamic_only(2, 0))?;
    assert!(matches!(
        streamer.update_constant_region(&mut device, &[1, 2, 3]),
        Err(MemoryError::InvalidArgument(_))
    ));
    Ok(())
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn destroy_releases_rings_and_garbage() -> anyhow::Result<()> {
    let mut device = SoftwareDevice::default();
    let mut streamer = Streamer::new(&mut device, &StreamerSettings::default())?;

    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&[0u8; 100]))?;
    streamer.commit(&mut device)?;
    streamer.add_buffer_update_request(&BufferUpdateRequest::new(&vec![0u8; 300_000]))?;
    streamer.commit(&mut device)?;
    assert_eq!(streamer.garbage_count(), 1);

    streamer.destroy(&mut device);

    let stats = device.stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_allocations, 0);
    Ok(())
}

#[test]
fn invalid_settings_are_rejected() {
    let mut device = SoftwareDevice::default();
    let settings = StreamerSettings {
        frame_in_flight_num: 0,
        ..Default::default()
    };
    assert!(matches!(
        Streamer::new(&mut device, &settings),
        Err(MemoryError::InvalidArgument(_))
    ));
}
