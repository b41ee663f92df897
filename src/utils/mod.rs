//! Utility Module
//!
//! - [`align`]: alignment arithmetic used by every placement decision

pub mod align;

pub use align::{align_down, align_up, is_aligned};
