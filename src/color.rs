//! Color types and packed-channel arithmetic.
//!
//! Two color types flow through the pipeline:
//!
//! - [`Argb`] — non-premultiplied 8-bit ARGB, the form paint sources are
//!   described in (gradient stops, solid colors).
//! - [`Prgb32`] — premultiplied ARGB packed in one `u32` word
//!   (`0xAARRGGBB`), the native intermediate format of pattern fetch and
//!   of the blend kernels.
//!
//! The channel math operates on two packed 16-bit lanes at a time
//! (the `0x00FF00FF` split), which is what makes the portable kernels
//! reasonable without vectorization.

use crate::basics::CMASK_8_FULL;

// ============================================================================
// Argb — non-premultiplied ARGB color
// ============================================================================

/// Non-premultiplied ARGB color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argb {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Argb {
    #[inline]
    pub fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Opaque color from RGB components.
    #[inline]
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 255, r, g, b }
    }

    #[inline]
    pub fn from_u32(v: u32) -> Self {
        Self {
            a: (v >> 24) as u8,
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        }
    }

    #[inline]
    pub fn to_u32(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Premultiply into the packed pipeline format.
    #[inline]
    pub fn premultiply(self) -> Prgb32 {
        let a = self.a as u32;
        let r = mul_div_255(self.r as u32, a);
        let g = mul_div_255(self.g as u32, a);
        let b = mul_div_255(self.b as u32, a);
        Prgb32(a << 24 | r << 16 | g << 8 | b)
    }

    /// Interpolate toward `c` by `k` in [0, 1], per channel.
    pub fn gradient(self, c: Argb, k: f64) -> Argb {
        let lerp = |p: u8, q: u8| -> u8 {
            let v = p as f64 + (q as f64 - p as f64) * k;
            v.round().clamp(0.0, 255.0) as u8
        };
        Argb {
            a: lerp(self.a, c.a),
            r: lerp(self.r, c.r),
            g: lerp(self.g, c.g),
            b: lerp(self.b, c.b),
        }
    }
}

// ============================================================================
// Prgb32 — premultiplied packed ARGB
// ============================================================================

/// Premultiplied ARGB32 pixel, packed `0xAARRGGBB`.
///
/// The invariant `r, g, b <= a` holds for every value produced by
/// [`Argb::premultiply`] and by the compositing operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Prgb32(pub u32);

impl Prgb32 {
    pub const ZERO: Prgb32 = Prgb32(0);

    #[inline]
    pub fn alpha(self) -> u32 {
        self.0 >> 24
    }

    #[inline]
    pub fn is_opaque(self) -> bool {
        self.0 >= 0xFF00_0000
    }

    /// Multiply all four channels by `a` in 0..=255.
    #[inline]
    pub fn byte_mul(self, a: u32) -> Prgb32 {
        Prgb32(packed_mul_255(self.0, a))
    }

    /// Multiply all four channels by `m` in 0..=0x100 (constant-mask scale).
    #[inline]
    pub fn cmask_mul(self, m: u32) -> Prgb32 {
        debug_assert!(m <= CMASK_8_FULL);
        Prgb32(packed_mul_256(self.0, m))
    }

    /// Per-channel saturating add.
    #[inline]
    pub fn saturating_add(self, other: Prgb32) -> Prgb32 {
        let a = self.0.to_ne_bytes();
        let b = other.0.to_ne_bytes();
        Prgb32(u32::from_ne_bytes([
            a[0].saturating_add(b[0]),
            a[1].saturating_add(b[1]),
            a[2].saturating_add(b[2]),
            a[3].saturating_add(b[3]),
        ]))
    }

    /// `self + other` where the operands come from complementary
    /// multiplies and cannot overflow a channel.
    #[inline]
    pub fn add(self, other: Prgb32) -> Prgb32 {
        Prgb32(self.0.wrapping_add(other.0))
    }

    /// Blend toward `to` by a byte cover `m` in 0..=255.
    #[inline]
    pub fn lerp_255(self, to: Prgb32, m: u32) -> Prgb32 {
        // from*(255-m)/255 + to*m/255; the two parts cannot overflow.
        Prgb32(packed_mul_255(self.0, 255 - m).wrapping_add(packed_mul_255(to.0, m)))
    }

    /// Blend toward `to` by a constant mask `m` in 0..=0x100.
    ///
    /// Exact at the endpoints and for equal operands: the two weighted
    /// halves are summed before the shift, so no low bit is lost.
    #[inline]
    pub fn lerp_256(self, to: Prgb32, m: u32) -> Prgb32 {
        debug_assert!(m <= CMASK_8_FULL);
        let im = CMASK_8_FULL - m;
        let rb = ((self.0 & 0x00FF_00FF) * im + (to.0 & 0x00FF_00FF) * m) >> 8;
        let ag = ((self.0 >> 8) & 0x00FF_00FF) * im + ((to.0 >> 8) & 0x00FF_00FF) * m;
        Prgb32((rb & 0x00FF_00FF) | (ag & 0xFF00_FF00))
    }
}

// ============================================================================
// Packed helpers
// ============================================================================

/// `(c * a + 127) / 255` on each of the four packed byte channels,
/// `a` in 0..=255. Two 16-bit lanes per multiply.
#[inline]
pub fn packed_mul_255(c: u32, a: u32) -> u32 {
    let rb = (c & 0x00FF_00FF) * a;
    let rb = (rb + ((rb >> 8) & 0x00FF_00FF) + 0x0080_0080) >> 8;
    let ag = ((c >> 8) & 0x00FF_00FF) * a;
    let ag = (ag + ((ag >> 8) & 0x00FF_00FF) + 0x0080_0080) & 0xFF00_FF00;
    (rb & 0x00FF_00FF) | ag
}

/// `c * m >> 8` on each packed byte channel, `m` in 0..=0x100.
/// Exact for `m == 0x100`.
#[inline]
pub fn packed_mul_256(c: u32, m: u32) -> u32 {
    let rb = ((c & 0x00FF_00FF) * m) >> 8;
    let ag = ((c >> 8) & 0x00FF_00FF) * m;
    (rb & 0x00FF_00FF) | (ag & 0xFF00_FF00)
}

/// `(c * a + 127) / 255` for a single channel.
#[inline]
pub fn mul_div_255(c: u32, a: u32) -> u32 {
    let t = c * a + 0x80;
    (t + (t >> 8)) >> 8
}

/// Widen a byte cover (0..=255) to the constant-mask scale (0..=0x100),
/// so that 255 maps to exactly 0x100.
#[inline]
pub fn cover_to_cmask(m: u32) -> u32 {
    m + (m >> 7)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premultiply_opaque_is_identity() {
        let c = Argb::rgb(10, 20, 30).premultiply();
        assert_eq!(c.0, 0xFF0A_141E);
    }

    #[test]
    fn test_premultiply_half_alpha() {
        let c = Argb::new(128, 255, 0, 255).premultiply();
        assert_eq!(c.alpha(), 128);
        assert_eq!((c.0 >> 16) & 0xFF, 128);
        assert_eq!(c.0 & 0xFF, 128);
    }

    #[test]
    fn test_packed_mul_255_endpoints() {
        assert_eq!(packed_mul_255(0x80402010, 255), 0x80402010);
        assert_eq!(packed_mul_255(0x80402010, 0), 0);
    }

    #[test]
    fn test_packed_mul_255_matches_scalar() {
        for a in [0u32, 1, 63, 127, 128, 200, 254, 255] {
            let c = 0xFE_7F_40_01u32;
            let packed = packed_mul_255(c, a);
            for shift in [0, 8, 16, 24] {
                let ch = (c >> shift) & 0xFF;
                assert_eq!((packed >> shift) & 0xFF, mul_div_255(ch, a));
            }
        }
    }

    #[test]
    fn test_packed_mul_256_exact_full() {
        assert_eq!(packed_mul_256(0xFFAA5500, 0x100), 0xFFAA5500);
        assert_eq!(packed_mul_256(0xFFAA5500, 0), 0);
        assert_eq!(packed_mul_256(0xFF00FF00, 0x80), 0x7F007F00);
    }

    #[test]
    fn test_lerp_256_endpoints() {
        let d = Prgb32(0xFF00_0000);
        let s = Prgb32(0xFFFF_0000);
        assert_eq!(d.lerp_256(s, 0), d);
        assert_eq!(d.lerp_256(s, 0x100), s);
    }

    #[test]
    fn test_lerp_256_equal_operands_exact() {
        let v = Prgb32(0xFFAB_CD12);
        for m in [0u32, 1, 0x40, 0x80, 0xC0, 0xFF, 0x100] {
            assert_eq!(v.lerp_256(v, m), v, "m={m:#x}");
        }
    }

    #[test]
    fn test_lerp_255_endpoints() {
        let d = Prgb32(0xFF11_2233);
        let s = Prgb32(0xFFAA_BBCC);
        assert_eq!(d.lerp_255(s, 0), d);
        assert_eq!(d.lerp_255(s, 255), s);
    }

    #[test]
    fn test_cover_to_cmask() {
        assert_eq!(cover_to_cmask(0), 0);
        assert_eq!(cover_to_cmask(255), 0x100);
        assert_eq!(cover_to_cmask(127), 127);
        assert_eq!(cover_to_cmask(128), 129);
    }

    #[test]
    fn test_saturating_add() {
        let a = Prgb32(0x80C0_F010);
        let b = Prgb32(0x80C0_F010);
        assert_eq!(a.saturating_add(b), Prgb32(0xFFFF_FF20));
    }
}
