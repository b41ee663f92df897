//! Bulk Uploads
//!
//! - [`batch`]: blocking staged uploader for initial resource content
//! - [`footprint`]: aligned texture layout shared with the streamer

pub mod batch;
pub mod footprint;

pub use batch::{
    BufferUploadDesc, DataUploader, TextureSubresourceUpload, TextureUploadDesc, UploadStats,
};
pub use footprint::SubresourceFootprint;
