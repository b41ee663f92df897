//! Texel formats and the block properties the footprint math needs.
//!
//! Only the size of a texel block matters to this crate: how many texels it
//! spans horizontally/vertically and how many bytes it occupies. Everything a
//! format means to a shader lives in the backend.

/// Texel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    R16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    D32Float,
    Bc1RgbaUnorm,
    Bc3RgbaUnorm,
    Bc7RgbaUnorm,
}

/// Block layout of a [`Format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatProps {
    /// Texels covered by one block horizontally.
    pub block_width: u32,
    /// Texels covered by one block vertically.
    pub block_height: u32,
    /// Bytes per block.
    pub block_size: u32,
}

impl FormatProps {
    const fn texel(block_size: u32) -> Self {
        Self {
            block_width: 1,
            block_height: 1,
            block_size,
        }
    }

    const fn bc(block_size: u32) -> Self {
        Self {
            block_width: 4,
            block_height: 4,
            block_size,
        }
    }
}

impl Format {
    #[must_use]
    pub const fn props(self) -> FormatProps {
        match self {
            Self::R8Unorm => FormatProps::texel(1),
            Self::Rg8Unorm | Self::R16Float => FormatProps::texel(2),
            Self::Rgba8Unorm
            | Self::Rgba8Srgb
            | Self::Bgra8Unorm
            | Self::R32Float
            | Self::D32Float => FormatProps::texel(4),
            Self::Rgba16Float | Self::Rg32Float => FormatProps::texel(8),
            Self::Rgba32Float => FormatProps::texel(16),
            Self::Bc1RgbaUnorm => FormatProps::bc(8),
            Self::Bc3RgbaUnorm | Self::Bc7RgbaUnorm => FormatProps::bc(16),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_block_compressed(self) -> bool {
        self.props().block_width > 1
    }

    /// Bytes occupied by one row of blocks spanning `width` texels.
    #[inline]
    #[must_use]
    pub const fn row_bytes(self, width: u32) -> u64 {
        let props = self.props();
        width.div_ceil(props.block_width) as u64 * props.block_size as u64
    }

    /// Number of block rows spanning `height` texels.
    #[inline]
    #[must_use]
    pub const fn block_rows(self, height: u32) -> u32 {
        height.div_ceil(self.props().block_height)
    }
}
