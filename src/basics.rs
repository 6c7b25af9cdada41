//! Foundation types and constants.
//!
//! The most fundamental pieces everything else depends on: rounding
//! helpers for the fixed-point fetch paths, the pixel-format and
//! compositing-operator index spaces of the blend function matrix, and
//! the coverage scales used by constant span masks.

// ============================================================================
// Rounding and conversion functions
// ============================================================================

/// Round a double to the nearest integer (round half away from zero).
#[inline]
pub fn iround(v: f64) -> i32 {
    if v < 0.0 {
        (v - 0.5) as i32
    } else {
        (v + 0.5) as i32
    }
}

/// Round a double to the nearest unsigned integer (round half up).
#[inline]
pub fn uround(v: f64) -> u32 {
    (v + 0.5) as u32
}

/// Floor a double toward negative infinity, as a signed integer.
#[inline]
pub fn ifloor(v: f64) -> i32 {
    let i = v as i32;
    i - (i as f64 > v) as i32
}

/// Ceiling of a double as a signed integer.
#[inline]
pub fn iceil(v: f64) -> i32 {
    v.ceil() as i32
}

/// Compare two doubles within `epsilon`.
#[inline]
pub fn is_equal_eps(v1: f64, v2: f64, epsilon: f64) -> bool {
    (v1 - v2).abs() <= epsilon
}

// ============================================================================
// Coverage constants
// ============================================================================

/// Per-pixel coverage values are byte-valued; 255 is fully opaque.
pub type CoverType = u8;

pub const COVER_NONE: CoverType = 0;
pub const COVER_FULL: CoverType = 255;

/// Fully-opaque constant mask for 8-bit-channel spans.
///
/// Constant span masks use a "one past max" scale so that an opaque
/// multiply is exact: `x * 0x100 >> 8 == x`.
pub const CMASK_8_FULL: u32 = 0x100;

/// Fully-opaque constant mask for 16-bit-channel spans.
pub const CMASK_16_FULL: u32 = 0x1_0000;

// ============================================================================
// Pixel formats
// ============================================================================

/// Destination pixel format of the blend function matrix.
///
/// Formats index one dimension of the dispatch matrix, so the set here
/// is closed. All formats in this class use byte channels and 8-bit
/// (`Mask8`) span coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    /// 32-bit premultiplied ARGB, native-endian `0xAARRGGBB` words.
    Prgb32 = 0,
    /// 32-bit RGB with an ignored X byte; stored alpha is always 0xFF.
    Xrgb32 = 1,
    /// 8-bit alpha only.
    A8 = 2,
}

pub const PIXEL_FORMAT_COUNT: usize = 3;

impl PixelFormat {
    /// All formats, in matrix-index order.
    pub const ALL: [PixelFormat; PIXEL_FORMAT_COUNT] =
        [PixelFormat::Prgb32, PixelFormat::Xrgb32, PixelFormat::A8];

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(self) -> usize {
        match self {
            PixelFormat::Prgb32 | PixelFormat::Xrgb32 => 4,
            PixelFormat::A8 => 1,
        }
    }

    /// Bits per channel.
    #[inline]
    pub fn depth(self) -> u32 {
        match self {
            PixelFormat::Prgb32 | PixelFormat::Xrgb32 => 32,
            PixelFormat::A8 => 8,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// Compositing operators
// ============================================================================

/// Porter-Duff compositing operator.
///
/// Operators index the other dimension of the dispatch matrix. All
/// formulas operate on premultiplied colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompositeOp {
    Clear = 0,
    Src = 1,
    Dst = 2,
    SrcOver = 3,
    DstOver = 4,
    SrcIn = 5,
    DstIn = 6,
    SrcOut = 7,
    DstOut = 8,
    SrcAtop = 9,
    DstAtop = 10,
    Xor = 11,
    Plus = 12,
}

pub const COMPOSITE_OP_COUNT: usize = 13;

impl CompositeOp {
    /// All operators, in matrix-index order.
    pub const ALL: [CompositeOp; COMPOSITE_OP_COUNT] = [
        CompositeOp::Clear,
        CompositeOp::Src,
        CompositeOp::Dst,
        CompositeOp::SrcOver,
        CompositeOp::DstOver,
        CompositeOp::SrcIn,
        CompositeOp::DstIn,
        CompositeOp::SrcOut,
        CompositeOp::DstOut,
        CompositeOp::SrcAtop,
        CompositeOp::DstAtop,
        CompositeOp::Xor,
        CompositeOp::Plus,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Default for CompositeOp {
    fn default() -> Self {
        CompositeOp::SrcOver
    }
}

// ============================================================================
// Tests
// ============================================================================
