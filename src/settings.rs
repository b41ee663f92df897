//! Streaming & Upload Configuration
//!
//! Plain data structs with documented defaults. Both derive `serde` traits with
//! `#[serde(default)]`, so a configuration file only needs to name the fields
//! it changes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_memory::settings::{StreamerSettings, UploadSettings};
//!
//! // Default: host-upload ring, two frames in flight, 64 KiB constant ring
//! let settings = StreamerSettings::default();
//!
//! // Triple buffering with a pre-sized dynamic ring
//! let settings = StreamerSettings {
//!     frame_in_flight_num: 3,
//!     dynamic_buffer_size: 4 * 1024 * 1024,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::device::{BufferUsage, MemoryLocation};
use crate::errors::{MemoryError, Result};

/// Growth granularity of the dynamic ring, per frame slot.
pub const DYNAMIC_BUFFER_CHUNK_SIZE: u64 = 64 * 1024;

/// Smallest staging buffer the data uploader creates.
pub const DEFAULT_MIN_STAGING_SIZE: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// StreamerSettings
// ---------------------------------------------------------------------------

/// Configuration of a [`Streamer`](crate::streaming::Streamer).
///
/// | Field                             | Default      |
/// |-----------------------------------|--------------|
/// | `constant_buffer_size`            | 64 KiB       |
/// | `constant_buffer_memory_location` | `HostUpload` |
/// | `dynamic_buffer_size`             | 0 (lazy)     |
/// | `dynamic_buffer_memory_location`  | `HostUpload` |
/// | `frame_in_flight_num`             | 2            |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerSettings {
    /// Capacity of the fixed constant ring. `0` disables it.
    pub constant_buffer_size: u64,
    /// Must be an upload-class location.
    pub constant_buffer_memory_location: MemoryLocation,
    /// Initial capacity of the dynamic ring. `0` creates it on first use.
    pub dynamic_buffer_size: u64,
    /// Must be an upload-class location.
    pub dynamic_buffer_memory_location: MemoryLocation,
    /// Extra usages of the dynamic ring, for callers that read it directly
    /// (as vertex or constant data) instead of copying out of it.
    #[serde(skip)]
    pub dynamic_buffer_usage: BufferUsage,
    /// Frames whose GPU work may still be in flight. The ring keeps one more
    /// slot than this.
    pub frame_in_flight_num: u32,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            constant_buffer_size: 64 * 1024,
            constant_buffer_memory_location: MemoryLocation::HostUpload,
            dynamic_buffer_size: 0,
            dynamic_buffer_memory_location: MemoryLocation::HostUpload,
            dynamic_buffer_usage: BufferUsage::empty(),
            frame_in_flight_num: 2,
        }
    }
}

impl StreamerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.frame_in_flight_num == 0 {
            return Err(MemoryError::InvalidArgument(
                "frame_in_flight_num must be at least 1".into(),
            ));
        }
        if !self.dynamic_buffer_memory_location.is_upload() {
            return Err(MemoryError::InvalidArgument(format!(
                "dynamic ring cannot live in {:?} memory",
                self.dynamic_buffer_memory_location
            )));
        }
        Ok(())
    }

    /// Number of logical slots in the dynamic ring.
    #[inline]
    #[must_use]
    pub fn ring_slot_num(&self) -> u32 {
        self.frame_in_flight_num + 1
    }
}

// ---------------------------------------------------------------------------
// UploadSettings
// ---------------------------------------------------------------------------

/// Configuration of a [`DataUploader`](crate::upload::DataUploader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// The staging buffer is never smaller than this.
    pub min_staging_size: u64,
    /// The staging buffer is never larger than this. A texture subresource
    /// whose aligned footprint exceeds it cannot be uploaded.
    pub max_staging_size: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            min_staging_size: DEFAULT_MIN_STAGING_SIZE,
            max_staging_size: 256 * 1024 * 1024,
        }
    }
}

impl UploadSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_staging_size == 0 || self.min_staging_size > self.max_staging_size {
            return Err(MemoryError::InvalidArgument(format!(
                "staging size range {}..={} is empty",
                self.min_staging_size, self.max_staging_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StreamerSettings::default().validate().is_ok());
        assert!(UploadSettings::default().validate().is_ok());
        assert_eq!(StreamerSettings::default().ring_slot_num(), 3);
    }

    #[test]
    fn streamer_rejects_zero_frames_in_flight() {
        let settings = StreamerSettings {
            frame_in_flight_num: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(MemoryError::InvalidArgument(_))));
    }

    #[test]
    fn streamer_rejects_device_local_ring() {
        let settings = StreamerSettings {
            dynamic_buffer_memory_location: MemoryLocation::Device,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn upload_rejects_inverted_staging_range() {
        let settings = UploadSettings {
            min_staging_size: 1024,
            max_staging_size: 512,
        };
        assert!(settings.validate().is_err());
    }
}
