//! Pattern context — instantiated paint-source state.
//!
//! A [`PatternContext`] binds one paint source (solid color, texture,
//! scaled image, or gradient) to a rendering operation. Everything
//! expensive happens once at init: gradient LUTs and scale tables are
//! precomputed, and the cheapest applicable fetch specialization (exact
//! vs. subpixel vs. transformed, repeat vs. reflect, pad vs. repeat) is
//! selected as a function pointer. After that the context is immutable;
//! `fetch` reads shared state only, so one context can serve any number
//! of rendering threads concurrently.
//!
//! Contexts are handed out as [`PatternHandle`]s. The handle's atomic
//! reference count supports lock-free concurrent acquire and release;
//! kind-specific resources are freed exactly once when the last holder
//! releases. Fetching through a released context is unrepresentable —
//! the handle keeps the context alive.

use std::fmt;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::basics::PixelFormat;
use crate::color::{Argb, Prgb32};
use crate::pattern_gradient::{ConicalGradientPattern, LinearGradientPattern, RadialGradientPattern};
use crate::pattern_scale::ScalePattern;
use crate::pattern_texture::TexturePattern;
use crate::trans_affine::TransAffine;

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a pattern `init_*` call.
///
/// Fetch itself cannot fail: unsupported combinations are rejected here,
/// never discovered later inside the fetch loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern/transform combination has no fetch implementation.
    #[error("unsupported pattern: {0}")]
    Unsupported(&'static str),

    /// A parameter is out of its documented domain.
    #[error("invalid pattern parameter: {0}")]
    InvalidParameter(&'static str),

    /// Precomputed tables (gradient LUT, scale tables) could not be
    /// allocated.
    #[error("pattern table allocation failed: {0}")]
    OutOfMemory(&'static str),
}

// ============================================================================
// ImageBuf — shared read-only source image
// ============================================================================

/// Read-only source image for texture and scale patterns, in the
/// pipeline's premultiplied intermediate format. Shared by reference
/// count so a context never copies the pixels.
pub struct ImageBuf {
    data: Vec<Prgb32>,
    width: u32,
    height: u32,
    /// Row stride in pixels (>= width).
    stride: usize,
}

impl ImageBuf {
    pub fn new(width: u32, height: u32, data: Vec<Prgb32>) -> Self {
        assert!(width > 0 && height > 0, "zero-sized image");
        assert_eq!(data.len(), width as usize * height as usize);
        Self {
            data,
            width,
            height,
            stride: width as usize,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[Prgb32] {
        let off = y as usize * self.stride;
        &self.data[off..off + self.width as usize]
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Prgb32 {
        self.data[y as usize * self.stride + x as usize]
    }
}

// ============================================================================
// PatternContext
// ============================================================================

/// Fetch entry point: write `dst.len()` pixels of device row `y`
/// starting at device column `x`, in the context's intermediate format.
pub(crate) type FetchFn = fn(&PatternContext, &mut [Prgb32], i32, i32);

/// Kind-specific precomputed state.
pub(crate) enum PatternKind {
    Solid(SolidPattern),
    Texture(TexturePattern),
    Scale(ScalePattern),
    Linear(LinearGradientPattern),
    Radial(RadialGradientPattern),
    Conical(ConicalGradientPattern),
}

pub(crate) struct SolidPattern {
    pub prgb: Prgb32,
}

/// One instantiated paint source. Immutable after init; see module docs
/// for the sharing contract.
pub struct PatternContext {
    pub(crate) fetch: FetchFn,
    pub(crate) format: PixelFormat,
    pub(crate) depth: u32,
    /// True only when the transform includes scale, shear, or rotation;
    /// never for pure translation (which keeps the cheap axis-aligned
    /// fetch paths valid).
    pub(crate) is_transformed: bool,
    pub(crate) matrix: TransAffine,
    pub(crate) inverse: TransAffine,
    pub(crate) kind: PatternKind,
}

impl PatternContext {
    /// Fetch `dst.len()` source pixels for device coordinates
    /// `(x..x+dst.len(), y)`.
    ///
    /// Callable repeatedly and from multiple threads; all specialization
    /// decisions were taken at init, so this is a single indirect call.
    #[inline]
    pub fn fetch(&self, dst: &mut [Prgb32], x: i32, y: i32) {
        (self.fetch)(self, dst, x, y)
    }

    /// Pixel format of fetched data.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bit depth of fetched data.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether the bound transform goes beyond pure translation.
    pub fn is_transformed(&self) -> bool {
        self.is_transformed
    }

    /// The flattened source-to-device transform this context was built
    /// for.
    pub fn matrix(&self) -> [f64; 6] {
        let mut m = [0.0; 6];
        self.matrix.store_to(&mut m);
        m
    }

    pub(crate) fn new_inner(matrix: &TransAffine, kind: PatternKind, fetch: FetchFn) -> Self {
        Self {
            fetch,
            format: PixelFormat::Prgb32,
            depth: 32,
            is_transformed: !matrix.is_translation_only(),
            matrix: *matrix,
            inverse: matrix.inverse(),
            kind,
        }
    }

    pub(crate) fn solid_kind(&self) -> &SolidPattern {
        match &self.kind {
            PatternKind::Solid(s) => s,
            _ => unreachable!("fetcher bound to wrong pattern kind"),
        }
    }

    // ------------------------------------------------------------------
    // Solid
    // ------------------------------------------------------------------

    /// Build a solid-color context. The color is premultiplied once
    /// here; fetch replicates it.
    ///
    /// Also the degradation target: patterns that collapse to a single
    /// color (one-stop gradients, 1x1 textures at identity) should use
    /// this fast path.
    pub fn init_solid(argb: Argb) -> Result<PatternHandle, PatternError> {
        debug!("pattern init: solid {:08x}", argb.to_u32());
        Ok(PatternHandle::new(Self::new_inner(
            &TransAffine::new(),
            PatternKind::Solid(SolidPattern {
                prgb: argb.premultiply(),
            }),
            fetch_solid,
        )))
    }

    pub(crate) fn init_solid_prgb(prgb: Prgb32) -> PatternHandle {
        PatternHandle::new(Self::new_inner(
            &TransAffine::new(),
            PatternKind::Solid(SolidPattern { prgb }),
            fetch_solid,
        ))
    }
}

fn fetch_solid(ctx: &PatternContext, dst: &mut [Prgb32], _x: i32, _y: i32) {
    dst.fill(ctx.solid_kind().prgb);
}

// ============================================================================
// PatternHandle — atomic shared ownership
// ============================================================================

/// Counted handle to an initialized [`PatternContext`].
///
/// `acquire` is an atomic increment; dropping a handle is an atomic
/// decrement that destroys the context (freeing its LUT/tables/image
/// reference) exactly once, when the count reaches zero — lock-free in
/// both directions.
pub struct PatternHandle(Arc<PatternContext>);

impl PatternHandle {
    pub(crate) fn new(ctx: PatternContext) -> Self {
        Self(Arc::new(ctx))
    }

    /// Take an additional reference, e.g. to hand the same context to
    /// another worker band.
    pub fn acquire(&self) -> PatternHandle {
        PatternHandle(Arc::clone(&self.0))
    }

    /// Current holder count (diagnostic).
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::ops::Deref for PatternHandle {
    type Target = PatternContext;

    fn deref(&self) -> &PatternContext {
        &self.0
    }
}

impl Clone for PatternHandle {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

// The context holds fn pointers and kind-specific tables, so the
// derived form is unavailable; report the shareable surface instead.
impl fmt::Debug for PatternHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternHandle")
            .field("format", &self.format)
            .field("depth", &self.depth)
            .field("is_transformed", &self.is_transformed)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_fetch_replicates_color() {
        let ctx = PatternContext::init_solid(Argb::new(128, 255, 0, 0)).unwrap();
        let expected = Argb::new(128, 255, 0, 0).premultiply();
        for (x, y, w) in [(0, 0, 1), (-50, 3000, 17), (1234, -7, 64)] {
            let mut dst = vec![Prgb32::ZERO; w];
            ctx.fetch(&mut dst, x, y);
            assert!(dst.iter().all(|&p| p == expected));
        }
    }

    #[test]
    fn test_solid_context_properties() {
        let ctx = PatternContext::init_solid(Argb::rgb(1, 2, 3)).unwrap();
        assert_eq!(ctx.format(), PixelFormat::Prgb32);
        assert_eq!(ctx.depth(), 32);
        assert!(!ctx.is_transformed());
    }

    #[test]
    fn test_handle_acquire_release() {
        let h = PatternContext::init_solid(Argb::rgb(0, 0, 0)).unwrap();
        assert_eq!(h.ref_count(), 1);
        let h2 = h.acquire();
        assert_eq!(h.ref_count(), 2);
        drop(h2);
        assert_eq!(h.ref_count(), 1);
    }

    #[test]
    fn test_handle_debug_is_printable() {
        // Init errors flow through `Result<PatternHandle, _>`, so the
        // handle must format for assertion diagnostics.
        let h = PatternContext::init_solid(Argb::rgb(1, 2, 3)).unwrap();
        let s = format!("{h:?}");
        assert!(s.contains("PatternHandle"));
        assert!(s.contains("Prgb32"));
    }

    #[test]
    fn test_image_buf_rows() {
        let img = ImageBuf::new(2, 2, vec![Prgb32(1), Prgb32(2), Prgb32(3), Prgb32(4)]);
        assert_eq!(img.row(1), &[Prgb32(3), Prgb32(4)]);
        assert_eq!(img.pixel(1, 0), Prgb32(2));
    }
}
