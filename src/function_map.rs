//! The dispatch matrix: every (composite operator, pixel format) cell
//! resolved to concrete blend kernels at startup.
//!
//! The matrix is filled with the portable reference kernels first, then
//! a registration table of vectorized kernels overwrites individual
//! cells — each entry guarded by the CPU feature it requires, checked
//! once at startup. Every cell is always populated, so dispatch is one
//! bounds-free array read and lookups cannot fail.

use bitflags::bitflags;
use log::debug;
use once_cell::sync::Lazy;

use crate::basics::{CompositeOp, PixelFormat, COMPOSITE_OP_COUNT, PIXEL_FORMAT_COUNT};
use crate::raster_ops::RasterFuncs;

// ============================================================================
// CPU features
// ============================================================================

bitflags! {
    /// Instruction-set extensions relevant to kernel selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFeatures: u32 {
        const SSE2   = 1 << 0;
        const SSSE3  = 1 << 1;
        const SSE4_1 = 1 << 2;
        const AVX2   = 1 << 3;
        const NEON   = 1 << 4;
    }
}

impl CpuFeatures {
    /// Query the running CPU.
    pub fn detect() -> CpuFeatures {
        let mut f = CpuFeatures::empty();

        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if std::arch::is_x86_feature_detected!("sse2") {
                f |= CpuFeatures::SSE2;
            }
            if std::arch::is_x86_feature_detected!("ssse3") {
                f |= CpuFeatures::SSSE3;
            }
            if std::arch::is_x86_feature_detected!("sse4.1") {
                f |= CpuFeatures::SSE4_1;
            }
            if std::arch::is_x86_feature_detected!("avx2") {
                f |= CpuFeatures::AVX2;
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                f |= CpuFeatures::NEON;
            }
        }

        f
    }
}

// ============================================================================
// Override registration
// ============================================================================

/// One optimized-kernel registration: when `feature` is available, the
/// `apply` hook patches its kernels into the named matrix cell.
pub struct KernelOverride {
    pub feature: CpuFeatures,
    pub format: PixelFormat,
    pub op: CompositeOp,
    pub name: &'static str,
    pub apply: fn(&mut RasterFuncs),
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
static OVERRIDES: &[KernelOverride] = &[KernelOverride {
    feature: CpuFeatures::SSE2,
    format: PixelFormat::Prgb32,
    op: CompositeOp::SrcOver,
    name: "sse2 src-over prgb32",
    apply: |cell| {
        cell.cspan = sse2::cspan_src_over_prgb32;
        cell.vspan = sse2::vspan_src_over_prgb32;
    },
}];

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
static OVERRIDES: &[KernelOverride] = &[];

// ============================================================================
// FunctionMap
// ============================================================================

/// The fully-resolved kernel matrix.
pub struct FunctionMap {
    raster: [[RasterFuncs; PIXEL_FORMAT_COUNT]; COMPOSITE_OP_COUNT],
}

impl FunctionMap {
    /// A matrix holding only the portable reference kernels.
    pub fn reference() -> FunctionMap {
        let mut cell = RasterFuncs::reference(PixelFormat::Prgb32, CompositeOp::Clear);
        let mut raster = [[cell; PIXEL_FORMAT_COUNT]; COMPOSITE_OP_COUNT];
        for op in CompositeOp::ALL {
            for format in PixelFormat::ALL {
                cell = RasterFuncs::reference(format, op);
                raster[op.index()][format.index()] = cell;
            }
        }
        FunctionMap { raster }
    }

    /// Patch in every registered kernel whose CPU feature is present.
    pub fn apply_overrides(&mut self, features: CpuFeatures) {
        for ov in OVERRIDES {
            if features.contains(ov.feature) {
                debug!("kernel override: {}", ov.name);
                (ov.apply)(&mut self.raster[ov.op.index()][ov.format.index()]);
            }
        }
    }

    /// The kernel group for one (format, operator) cell.
    #[inline]
    pub fn get(&self, format: PixelFormat, op: CompositeOp) -> &RasterFuncs {
        &self.raster[op.index()][format.index()]
    }
}

static FUNCTION_MAP: Lazy<FunctionMap> = Lazy::new(|| {
    let features = CpuFeatures::detect();
    debug!("cpu features: {features:?}");
    let mut map = FunctionMap::reference();
    map.apply_overrides(features);
    map
});

/// The process-wide kernel group for a (format, operator) pair. Resolves
/// the matrix on first use; every subsequent call is an array read.
#[inline]
pub fn get_raster_ops(format: PixelFormat, op: CompositeOp) -> &'static RasterFuncs {
    FUNCTION_MAP.get(format, op)
}

// ============================================================================
// SSE2 kernels
// ============================================================================

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod sse2 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    use crate::color::Prgb32;
    use crate::raster_ops::{
        Closure, CompositeRule, OpSrcOver, PixelAccess, Prgb32Access, Solid,
    };

    /// `(v + 0x80 + ((v + 0x80) >> 8)) >> 8` on eight 16-bit lanes; the
    /// same div-by-255 rounding as the scalar kernels.
    #[inline]
    unsafe fn div_255_epi16(v: __m128i) -> __m128i {
        let t = _mm_add_epi16(v, _mm_set1_epi16(0x80));
        _mm_srli_epi16::<8>(_mm_add_epi16(t, _mm_srli_epi16::<8>(t)))
    }

    /// src-over on four packed pixels: `s + d * ia / 255` where `ia_lo`
    /// and `ia_hi` carry each pixel's inverse source alpha replicated
    /// across its four 16-bit lanes.
    #[inline]
    unsafe fn src_over_4(d: __m128i, s: __m128i, ia_lo: __m128i, ia_hi: __m128i) -> __m128i {
        let zero = _mm_setzero_si128();
        let d_lo = _mm_mullo_epi16(_mm_unpacklo_epi8(d, zero), ia_lo);
        let d_hi = _mm_mullo_epi16(_mm_unpackhi_epi8(d, zero), ia_hi);
        let blended = _mm_packus_epi16(div_255_epi16(d_lo), div_255_epi16(d_hi));
        _mm_add_epi8(s, blended)
    }

    #[target_feature(enable = "sse2")]
    unsafe fn cspan_impl(dst: &mut [u8], src: &Solid) {
        let s = _mm_set1_epi32(src.prgb.0 as i32);
        let ia = _mm_set1_epi16((255 - src.prgb.alpha()) as i16);

        let mut chunks = dst.chunks_exact_mut(16);
        for chunk in &mut chunks {
            let d = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);
            let out = src_over_4(d, s, ia, ia);
            _mm_storeu_si128(chunk.as_mut_ptr() as *mut __m128i, out);
        }
        for px in chunks.into_remainder().chunks_exact_mut(4) {
            let d = Prgb32Access::load(px);
            Prgb32Access::store(px, OpSrcOver::composite(d, src.prgb));
        }
    }

    #[target_feature(enable = "sse2")]
    unsafe fn vspan_impl(dst: &mut [u8], src: &[Prgb32]) {
        let zero = _mm_setzero_si128();

        let mut chunks = dst.chunks_exact_mut(16);
        let mut i = 0;
        for chunk in &mut chunks {
            let s = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
            let d = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);

            // Broadcast each pixel's alpha across its 16-bit lanes, then
            // invert.
            let s_lo = _mm_unpacklo_epi8(s, zero);
            let s_hi = _mm_unpackhi_epi8(s, zero);
            let a_lo = _mm_shufflehi_epi16::<0xFF>(_mm_shufflelo_epi16::<0xFF>(s_lo));
            let a_hi = _mm_shufflehi_epi16::<0xFF>(_mm_shufflelo_epi16::<0xFF>(s_hi));
            let full = _mm_set1_epi16(0xFF);
            let ia_lo = _mm_sub_epi16(full, a_lo);
            let ia_hi = _mm_sub_epi16(full, a_hi);

            let out = src_over_4(d, s, ia_lo, ia_hi);
            _mm_storeu_si128(chunk.as_mut_ptr() as *mut __m128i, out);
            i += 4;
        }
        for px in chunks.into_remainder().chunks_exact_mut(4) {
            let d = Prgb32Access::load(px);
            Prgb32Access::store(px, OpSrcOver::composite(d, src[i]));
            i += 1;
        }
    }

    // Registered only when SSE2 was detected, so the unchecked calls
    // are sound.

    pub fn cspan_src_over_prgb32(dst: &mut [u8], src: &Solid, _closure: &Closure) {
        unsafe { cspan_impl(dst, src) }
    }

    pub fn vspan_src_over_prgb32(dst: &mut [u8], src: &[Prgb32], _closure: &Closure) {
        unsafe { vspan_impl(dst, src) }
    }
}

// ============================================================================
// Tests
// ============================================================================
