//! Linear layout of texture data inside an upload buffer.
//!
//! A buffer used as a texture copy source must honor the backend's row pitch
//! and slice pitch alignment. CPU data usually arrives tightly packed (or with
//! its own pitches), so every copy into staging or ring memory goes through a
//! per-row loop that re-pitches the data.

use crate::device::{DeviceDesc, Format};
use crate::utils::align_up;

/// Aligned layout of one texture subresource (or region) in upload memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceFootprint {
    /// Bytes of payload in one row of blocks.
    pub row_bytes: u64,
    /// Block rows per slice.
    pub rows: u32,
    /// Slices (depth of a 3D region, `1` otherwise).
    pub depth: u32,
    /// Aligned distance between two rows.
    pub row_pitch: u64,
    /// Aligned distance between two slices.
    pub slice_pitch: u64,
    /// Total bytes occupied: `slice_pitch * depth`.
    pub size: u64,
}

impl SubresourceFootprint {
    #[must_use]
    pub fn new(format: Format, width: u32, height: u32, depth: u32, device: &DeviceDesc) -> Self {
        let row_bytes = format.row_bytes(width);
        let rows = format.block_rows(height);
        let row_pitch = align_up(row_bytes, device.upload_buffer_texture_row_alignment);
        let slice_pitch = align_up(
            row_pitch * u64::from(rows),
            device.upload_buffer_texture_slice_alignment,
        );

        Self {
            row_bytes,
            rows,
            depth,
            row_pitch,
            slice_pitch,
            size: slice_pitch * u64::from(depth),
        }
    }

    /// Smallest source length that covers every row when read with the given
    /// source pitches.
    #[must_use]
    pub fn source_len(&self, src_row_pitch: u64, src_slice_pitch: u64) -> u64 {
        if self.rows == 0 || self.depth == 0 {
            return 0;
        }
        src_slice_pitch * u64::from(self.depth - 1)
            + src_row_pitch * u64::from(self.rows - 1)
            + self.row_bytes
    }

    /// Copies `src` (laid out with the source pitches) into `dst` (laid out
    /// with this footprint's aligned pitches), one row at a time.
    ///
    /// `dst` must be at least [`size`](Self::size) bytes and `src` at least
    /// [`source_len`](Self::source_len) bytes.
    pub fn copy_rows(&self, src: &[u8], src_row_pitch: u64, src_slice_pitch: u64, dst: &mut [u8]) {
        let row_bytes = self.row_bytes as usize;
        for z in 0..u64::from(self.depth) {
            for y in 0..u64::from(self.rows) {
                let from = (z * src_slice_pitch + y * src_row_pitch) as usize;
                let to = (z * self.slice_pitch + y * self.row_pitch) as usize;
                dst[to..to + row_bytes].copy_from_slice(&src[from..from + row_bytes]);
            }
        }
    }
}
