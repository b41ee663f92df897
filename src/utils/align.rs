//! Alignment helpers shared by the planner, the streamer and the uploader.

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` does not need to be a power of two; `0` and `1` leave the
/// value unchanged.
#[inline]
#[must_use]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    if alignment.is_power_of_two() {
        (value + alignment - 1) & !(alignment - 1)
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// Rounds `value` down to a multiple of `alignment`.
#[inline]
#[must_use]
pub const fn align_down(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value - value % alignment
}

/// Returns `true` if `value` is a multiple of `alignment`.
#[inline]
#[must_use]
pub const fn is_aligned(value: u64, alignment: u64) -> bool {
    alignment <= 1 || value % alignment == 0
}
