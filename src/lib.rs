//! # Myth Memory
//!
//! Resource memory and streaming for explicit graphics backends.
//!
//! ```text
//!  scene load ──▶ memory::allocate_and_bind_memory ──▶ upload::DataUploader
//!                  (pack resources into few             (staged, blocking
//!                   physical allocations)                initial content)
//!
//!  every frame ──▶ streaming::Streamer
//!                   (frame-pipelined ring for transforms, constants and
//!                    streamed texture regions)
//! ```
//!
//! Everything talks to the GPU through [`device::GraphicsDevice`]. The
//! [`device::software::SoftwareDevice`] backend executes on the CPU and is
//! what the test suite runs against.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod device;
pub mod errors;
pub mod memory;
pub mod settings;
pub mod streaming;
pub mod upload;
pub mod utils;

pub use device::GraphicsDevice;
pub use device::software::SoftwareDevice;
pub use errors::{MemoryError, Result};
pub use memory::{
    AllocationPlanner, BoundBuffer, ResourceGroupDesc, allocate_and_bind_memory,
    calculate_allocation_number,
};
pub use settings::{StreamerSettings, UploadSettings};
pub use streaming::{BufferUpdateRequest, Streamer, TextureUpdateRequest};
pub use upload::{BufferUploadDesc, DataUploader, TextureUploadDesc, UploadStats};
