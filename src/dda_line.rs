//! DDA (Digital Differential Analyzer) line interpolation.
//!
//! Fixed-point interpolator used by the gradient LUT builder to walk a
//! color channel between two stop values in integer arithmetic.

/// Fixed-point DDA line interpolator with configurable precision.
///
/// Interpolates from `y1` to `y2` over `count` steps with
/// `FRACTION_SHIFT` fractional bits.
pub struct DdaLineInterpolator<const FRACTION_SHIFT: i32> {
    y: i32,
    inc: i32,
    dy: i32,
}

impl<const FRACTION_SHIFT: i32> DdaLineInterpolator<FRACTION_SHIFT> {
    pub fn new(y1: i32, y2: i32, count: u32) -> Self {
        debug_assert!(count > 0);
        Self {
            y: y1,
            inc: ((y2 - y1) << FRACTION_SHIFT) / count as i32,
            dy: 0,
        }
    }

    /// Step forward one unit.
    #[inline]
    pub fn inc(&mut self) {
        self.dy += self.inc;
    }

    /// Current interpolated value.
    #[inline]
    pub fn y(&self) -> i32 {
        self.y + (self.dy >> FRACTION_SHIFT)
    }
}

// ============================================================================
// Tests
// ============================================================================
