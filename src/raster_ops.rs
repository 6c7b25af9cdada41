//! Low-level blend kernels and their function-pointer contracts.
//!
//! Defines the six per-cell entry points of the dispatch matrix:
//!
//! - `cspan` / `cspan_a8` / `cspan_a8_const` — solid-color source with
//!   no mask, a per-pixel cover mask, or a constant mask;
//! - `vspan` / `vspan_a8` / `vspan_a8_const` — the same three for an
//!   arbitrary fetched source buffer.
//!
//! Width is implied by slice lengths: `dst` covers exactly the span's
//! pixels in destination bytes, `src` (vspan) and `msk` (a8) cover the
//! same pixels in [`Prgb32`] words and cover bytes respectively.
//!
//! The portable reference kernels are generic over a pixel-access type
//! and a compositing rule and are monomorphized into plain `fn`
//! pointers when the dispatch matrix is built. They are always correct
//! and never the fastest; vectorized alternatives overwrite individual
//! matrix cells at startup (see `function_map`).

use crate::basics::{CompositeOp, PixelFormat, CMASK_8_FULL};
use crate::color::{cover_to_cmask, Argb, Prgb32};

// ============================================================================
// Solid & Closure
// ============================================================================

/// Solid source for raster compositing: the original color and its
/// premultiplied form, so kernels never re-premultiply per span.
#[derive(Debug, Clone, Copy)]
pub struct Solid {
    pub argb: Argb,
    pub prgb: Prgb32,
}

impl Solid {
    pub fn new(argb: Argb) -> Self {
        Self {
            argb,
            prgb: argb.premultiply(),
        }
    }
}

/// Ancillary context passed to every blend call.
///
/// Carries palette links for indexed pixel sources/destinations. The
/// formats shipped in this matrix are direct-color, so the reference
/// kernels ignore it, but the contract keeps call sites stable when an
/// indexed format is added.
#[derive(Debug, Clone, Copy, Default)]
pub struct Closure<'a> {
    pub src_palette: Option<&'a [Prgb32]>,
    pub dst_palette: Option<&'a [Prgb32]>,
}

impl Closure<'_> {
    pub const NONE: Closure<'static> = Closure {
        src_palette: None,
        dst_palette: None,
    };
}

// ============================================================================
// Function pointer types
// ============================================================================

pub type CSpanFn = fn(dst: &mut [u8], src: &Solid, closure: &Closure);
pub type CSpanMskFn = fn(dst: &mut [u8], src: &Solid, msk: &[u8], closure: &Closure);
pub type CSpanMskConstFn = fn(dst: &mut [u8], src: &Solid, msk: u32, closure: &Closure);

pub type VSpanFn = fn(dst: &mut [u8], src: &[Prgb32], closure: &Closure);
pub type VSpanMskFn = fn(dst: &mut [u8], src: &[Prgb32], msk: &[u8], closure: &Closure);
pub type VSpanMskConstFn = fn(dst: &mut [u8], src: &[Prgb32], msk: u32, closure: &Closure);

/// The function group stored in one `[format][operator]` matrix cell.
#[derive(Clone, Copy)]
pub struct RasterFuncs {
    pub cspan: CSpanFn,
    pub cspan_a8: CSpanMskFn,
    pub cspan_a8_const: CSpanMskConstFn,
    pub vspan: VSpanFn,
    pub vspan_a8: VSpanMskFn,
    pub vspan_a8_const: VSpanMskConstFn,
}

// ============================================================================
// PixelAccess — destination format byte layout
// ============================================================================

/// Load/store one destination pixel as a premultiplied ARGB word.
pub trait PixelAccess {
    const BPP: usize;
    fn load(px: &[u8]) -> Prgb32;
    fn store(px: &mut [u8], v: Prgb32);
}

/// 32-bit premultiplied ARGB destination.
pub struct Prgb32Access;

impl PixelAccess for Prgb32Access {
    const BPP: usize = 4;

    #[inline]
    fn load(px: &[u8]) -> Prgb32 {
        Prgb32(u32::from_ne_bytes([px[0], px[1], px[2], px[3]]))
    }

    #[inline]
    fn store(px: &mut [u8], v: Prgb32) {
        px.copy_from_slice(&v.0.to_ne_bytes());
    }
}

/// 32-bit RGB destination with an ignored X byte; reads as opaque,
/// writes force the stored alpha byte to 0xFF.
pub struct Xrgb32Access;

impl PixelAccess for Xrgb32Access {
    const BPP: usize = 4;

    #[inline]
    fn load(px: &[u8]) -> Prgb32 {
        Prgb32(u32::from_ne_bytes([px[0], px[1], px[2], px[3]]) | 0xFF00_0000)
    }

    #[inline]
    fn store(px: &mut [u8], v: Prgb32) {
        px.copy_from_slice(&(v.0 | 0xFF00_0000).to_ne_bytes());
    }
}

/// 8-bit alpha-only destination; color channels are zero.
pub struct A8Access;

impl PixelAccess for A8Access {
    const BPP: usize = 1;

    #[inline]
    fn load(px: &[u8]) -> Prgb32 {
        Prgb32((px[0] as u32) << 24)
    }

    #[inline]
    fn store(px: &mut [u8], v: Prgb32) {
        px[0] = (v.0 >> 24) as u8;
    }
}

// ============================================================================
// CompositeRule — Porter-Duff formulas on premultiplied pixels
// ============================================================================

/// One compositing operator as a pure function of (dst, src).
pub trait CompositeRule {
    fn composite(d: Prgb32, s: Prgb32) -> Prgb32;
}

macro_rules! composite_rule {
    ($name:ident, |$d:ident, $s:ident| $body:expr) => {
        pub struct $name;
        impl CompositeRule for $name {
            #[inline]
            fn composite($d: Prgb32, $s: Prgb32) -> Prgb32 {
                $body
            }
        }
    };
}

composite_rule!(OpClear, |_d, _s| Prgb32::ZERO);
composite_rule!(OpSrc, |_d, s| s);
composite_rule!(OpDst, |d, _s| d);
composite_rule!(OpSrcOver, |d, s| s.add(d.byte_mul(255 - s.alpha())));
composite_rule!(OpDstOver, |d, s| d.add(s.byte_mul(255 - d.alpha())));
composite_rule!(OpSrcIn, |d, s| s.byte_mul(d.alpha()));
composite_rule!(OpDstIn, |d, s| d.byte_mul(s.alpha()));
composite_rule!(OpSrcOut, |d, s| s.byte_mul(255 - d.alpha()));
composite_rule!(OpDstOut, |d, s| d.byte_mul(255 - s.alpha()));
composite_rule!(OpSrcAtop, |d, s| s
    .byte_mul(d.alpha())
    .add(d.byte_mul(255 - s.alpha())));
composite_rule!(OpDstAtop, |d, s| d
    .byte_mul(s.alpha())
    .add(s.byte_mul(255 - d.alpha())));
composite_rule!(OpXor, |d, s| s
    .byte_mul(255 - d.alpha())
    .add(d.byte_mul(255 - s.alpha())));
composite_rule!(OpPlus, |d, s| s.saturating_add(d));

// ============================================================================
// Reference kernels
// ============================================================================

fn cspan<P: PixelAccess, O: CompositeRule>(dst: &mut [u8], src: &Solid, _closure: &Closure) {
    debug_assert_eq!(dst.len() % P::BPP, 0);
    for px in dst.chunks_exact_mut(P::BPP) {
        let d = P::load(px);
        P::store(px, O::composite(d, src.prgb));
    }
}

fn cspan_a8<P: PixelAccess, O: CompositeRule>(
    dst: &mut [u8],
    src: &Solid,
    msk: &[u8],
    _closure: &Closure,
) {
    debug_assert_eq!(dst.len(), msk.len() * P::BPP);
    for (px, &m) in dst.chunks_exact_mut(P::BPP).zip(msk) {
        let d = P::load(px);
        let c = O::composite(d, src.prgb);
        P::store(px, d.lerp_255(c, m as u32));
    }
}

fn cspan_a8_const<P: PixelAccess, O: CompositeRule>(
    dst: &mut [u8],
    src: &Solid,
    msk: u32,
    _closure: &Closure,
) {
    debug_assert!(msk <= CMASK_8_FULL);
    for px in dst.chunks_exact_mut(P::BPP) {
        let d = P::load(px);
        let c = O::composite(d, src.prgb);
        P::store(px, d.lerp_256(c, msk));
    }
}

fn vspan<P: PixelAccess, O: CompositeRule>(dst: &mut [u8], src: &[Prgb32], _closure: &Closure) {
    debug_assert_eq!(dst.len(), src.len() * P::BPP);
    for (px, &s) in dst.chunks_exact_mut(P::BPP).zip(src) {
        let d = P::load(px);
        P::store(px, O::composite(d, s));
    }
}

fn vspan_a8<P: PixelAccess, O: CompositeRule>(
    dst: &mut [u8],
    src: &[Prgb32],
    msk: &[u8],
    _closure: &Closure,
) {
    debug_assert_eq!(dst.len(), src.len() * P::BPP);
    debug_assert_eq!(src.len(), msk.len());
    for ((px, &s), &m) in dst.chunks_exact_mut(P::BPP).zip(src).zip(msk) {
        let d = P::load(px);
        let c = O::composite(d, s);
        P::store(px, d.lerp_255(c, m as u32));
    }
}

fn vspan_a8_const<P: PixelAccess, O: CompositeRule>(
    dst: &mut [u8],
    src: &[Prgb32],
    msk: u32,
    _closure: &Closure,
) {
    debug_assert!(msk <= CMASK_8_FULL);
    for (px, &s) in dst.chunks_exact_mut(P::BPP).zip(src) {
        let d = P::load(px);
        let c = O::composite(d, s);
        P::store(px, d.lerp_256(c, msk));
    }
}

// ============================================================================
// Cell construction
// ============================================================================

impl RasterFuncs {
    /// Monomorphize the six reference kernels for one access/rule pair.
    fn of<P: PixelAccess, O: CompositeRule>() -> RasterFuncs {
        RasterFuncs {
            cspan: cspan::<P, O>,
            cspan_a8: cspan_a8::<P, O>,
            cspan_a8_const: cspan_a8_const::<P, O>,
            vspan: vspan::<P, O>,
            vspan_a8: vspan_a8::<P, O>,
            vspan_a8_const: vspan_a8_const::<P, O>,
        }
    }

    fn reference_for<P: PixelAccess>(op: CompositeOp) -> RasterFuncs {
        match op {
            CompositeOp::Clear => Self::of::<P, OpClear>(),
            CompositeOp::Src => Self::of::<P, OpSrc>(),
            CompositeOp::Dst => Self::of::<P, OpDst>(),
            CompositeOp::SrcOver => Self::of::<P, OpSrcOver>(),
            CompositeOp::DstOver => Self::of::<P, OpDstOver>(),
            CompositeOp::SrcIn => Self::of::<P, OpSrcIn>(),
            CompositeOp::DstIn => Self::of::<P, OpDstIn>(),
            CompositeOp::SrcOut => Self::of::<P, OpSrcOut>(),
            CompositeOp::DstOut => Self::of::<P, OpDstOut>(),
            CompositeOp::SrcAtop => Self::of::<P, OpSrcAtop>(),
            CompositeOp::DstAtop => Self::of::<P, OpDstAtop>(),
            CompositeOp::Xor => Self::of::<P, OpXor>(),
            CompositeOp::Plus => Self::of::<P, OpPlus>(),
        }
    }

    /// The portable reference cell for a (format, operator) pair.
    /// Always correct on every CPU; the universal dispatch fallback.
    pub fn reference(format: PixelFormat, op: CompositeOp) -> RasterFuncs {
        match format {
            PixelFormat::Prgb32 => Self::reference_for::<Prgb32Access>(op),
            PixelFormat::Xrgb32 => Self::reference_for::<Xrgb32Access>(op),
            PixelFormat::A8 => Self::reference_for::<A8Access>(op),
        }
    }
}

/// Convert a byte cover to the constant-mask scale; re-exported here
/// because mask-walking callers pair it with `cspan_a8_const`.
#[inline]
pub fn cover_to_const_mask(cover: u8) -> u32 {
    cover_to_cmask(cover as u32)
}

// ============================================================================
// Tests
// ============================================================================
