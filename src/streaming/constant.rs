//! Constant Ring
//!
//! A fixed-capacity upload buffer for per-draw constants. Writes go straight
//! into mapped memory at a cursor that advances by the aligned write size and
//! wraps to zero when the next write would not fit. The buffer is never
//! resized.
//!
//! The ring does not track what the GPU is still reading: callers size it so
//! that one wrap spans more than the frames in flight.

use bytemuck::Pod;

use crate::device::{BufferDesc, BufferId, BufferUsage, GraphicsDevice, MemoryLocation};
use crate::errors::{MemoryError, Result};
use crate::memory::BoundBuffer;
use crate::utils::align_up;

pub struct ConstantRing {
    buffer: BoundBuffer,
    cursor: u64,
    alignment: u64,
}

impl ConstantRing {
    /// Creates a ring of `size` bytes in `location`, which must be an
    /// upload-class location.
    pub fn create<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        size: u64,
        location: MemoryLocation,
    ) -> Result<Self> {
        if !location.is_upload() {
            return Err(MemoryError::InvalidArgument(format!(
                "constant ring cannot live in {location:?} memory"
            )));
        }
        if size == 0 {
            return Err(MemoryError::InvalidArgument("constant ring size is zero".into()));
        }

        let alignment = device.desc().constant_buffer_offset_alignment;
        let desc = BufferDesc::new(size, BufferUsage::CONSTANT_BUFFER);
        let buffer = BoundBuffer::create(device, &desc, location)?;
        log::debug!("Created {size} byte constant ring in {location:?}");

        Ok(Self {
            buffer,
            cursor: 0,
            alignment,
        })
    }

    /// Copies `data` into the ring and returns its offset in the buffer.
    pub fn update<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, data: &[u8]) -> Result<u64> {
        let size = data.len() as u64;
        if size == 0 {
            return Err(MemoryError::InvalidArgument("empty constant update".into()));
        }
        if size > self.buffer.size {
            return Err(MemoryError::OutOfMemory(format!(
                "{size} byte constant update exceeds the {} byte ring",
                self.buffer.size
            )));
        }

        if self.cursor + size > self.buffer.size {
            self.cursor = 0;
        }
        let offset = self.cursor;

        let mapped = device.map_buffer(self.buffer.buffer, offset, size)?;
        mapped.copy_from_slice(data);
        device.unmap_buffer(self.buffer.buffer);

        self.cursor = offset + align_up(size, self.alignment);
        Ok(offset)
    }

    /// Typed form of [`update`](Self::update).
    pub fn update_pod<D: GraphicsDevice + ?Sized, T: Pod>(&mut self, device: &mut D, value: &T) -> Result<u64> {
        self.update(device, bytemuck::bytes_of(value))
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> BufferId {
        self.buffer.buffer
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.buffer.size
    }

    /// Offset the next write starts from, before wrapping.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        self.buffer.destroy(device);
    }
}
