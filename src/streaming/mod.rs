//! Per-Frame Streaming
//!
//! - [`Streamer`]: growing dynamic ring for buffer and texture updates
//! - [`ConstantRing`]: fixed wrap-around ring for constants

pub mod constant;
pub mod streamer;

pub use constant::ConstantRing;
pub use streamer::{
    BufferDestination, BufferUpdateRequest, Streamer, TextureDestination, TextureUpdateRequest,
};
