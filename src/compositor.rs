//! Scanline compositor — walks span lists and drives the blend kernels.
//!
//! One [`Compositor`] binds a destination format and a compositing
//! operator, resolving the kernel group once. `composite_row` then walks
//! a scanline's span list and calls the right kernel per span:
//!
//! - constant spans take the no-mask kernel when fully opaque, the
//!   constant-mask kernel otherwise;
//! - alpha-glyph spans take the per-pixel-mask kernels;
//! - extended-precision masks are folded to cover bytes first.
//!
//! Pattern sources are fetched span-by-span into a scratch buffer that
//! grows in aligned steps and is recycled across rows; spans carrying
//! cached fetch data skip the fetch entirely.
//!
//! Rows are independent, so whole-surface rendering can run band
//! parallel: [`composite_parallel`] splits the destination into disjoint
//! row slices and composites them on the global thread pool, sharing one
//! pattern context across all workers.

use log::trace;
use rayon::prelude::*;

use crate::basics::{CompositeOp, PixelFormat};
use crate::color::Prgb32;
use crate::function_map::get_raster_ops;
use crate::pattern::PatternHandle;
use crate::raster_ops::{Closure, RasterFuncs, Solid};
use crate::rendering_buffer::RenderingBuffer;
use crate::span::{SpanKind, SpanList8, SpanRef};

/// Scratch buffers grow in steps of this many pixels.
const SCRATCH_ALIGN: usize = 256;

/// What a span list gets composited with.
pub enum SpanSource {
    /// One color for every span.
    Solid(Solid),
    /// Per-pixel source fetched from a pattern context.
    Pattern(PatternHandle),
}

/// Span-list compositing pass for one (format, operator) binding.
pub struct Compositor {
    format: PixelFormat,
    funcs: &'static RasterFuncs,
    fetch_scratch: Vec<Prgb32>,
    cover_scratch: Vec<u8>,
}

impl Compositor {
    pub fn new(format: PixelFormat, op: CompositeOp) -> Self {
        trace!("compositor bound to {format:?}/{op:?}");
        Self {
            format,
            funcs: get_raster_ops(format, op),
            fetch_scratch: Vec::new(),
            cover_scratch: Vec::new(),
        }
    }

    /// Composite one scanline's spans into `row`, the destination bytes
    /// of scanline `y`. Span coordinates index pixels within the row;
    /// the list must lie inside it.
    pub fn composite_row(&mut self, row: &mut [u8], y: i32, source: &SpanSource, spans: &SpanList8) {
        let bpp = self.format.bpp();
        for span in spans.iter() {
            assert!(
                span.x1 as usize * bpp <= row.len(),
                "span [{},{}) exceeds row width",
                span.x0,
                span.x1,
            );
            let dst = &mut row[span.x0 as usize * bpp..span.x1 as usize * bpp];

            match source {
                SpanSource::Solid(solid) => self.solid_span(dst, solid, &span),
                SpanSource::Pattern(pattern) => {
                    let width = span.len();
                    grow_scratch(&mut self.fetch_scratch, width);
                    let src = &mut self.fetch_scratch[..width];
                    match span.data() {
                        Some(cached) => unpack_pixels(cached, src),
                        None => pattern.fetch(src, span.x0, y),
                    }
                    Self::pattern_span(self.funcs, &mut self.cover_scratch, dst, src, &span);
                }
            }
        }
    }

    fn solid_span(&mut self, dst: &mut [u8], solid: &Solid, span: &SpanRef<'_, crate::span::Mask8>) {
        let f = self.funcs;
        match span.kind() {
            SpanKind::Const => {
                if span.is_const_mask_opaque() {
                    (f.cspan)(dst, solid, &Closure::NONE);
                } else {
                    (f.cspan_a8_const)(dst, solid, span.const_mask(), &Closure::NONE);
                }
            }
            SpanKind::A8Glyph | SpanKind::AxGlyph => {
                (f.cspan_a8)(dst, solid, span.a8_mask(), &Closure::NONE);
            }
            SpanKind::AxExtra => {
                let covers = fold_extra_mask(&mut self.cover_scratch, span.variant_mask());
                (f.cspan_a8)(dst, solid, covers, &Closure::NONE);
            }
            SpanKind::Argb32Glyph | SpanKind::ArgbxxGlyph => reject_color_mask(span.kind()),
        }
    }

    fn pattern_span(
        funcs: &RasterFuncs,
        cover_scratch: &mut Vec<u8>,
        dst: &mut [u8],
        src: &[Prgb32],
        span: &SpanRef<'_, crate::span::Mask8>,
    ) {
        match span.kind() {
            SpanKind::Const => {
                if span.is_const_mask_opaque() {
                    (funcs.vspan)(dst, src, &Closure::NONE);
                } else {
                    (funcs.vspan_a8_const)(dst, src, span.const_mask(), &Closure::NONE);
                }
            }
            SpanKind::A8Glyph | SpanKind::AxGlyph => {
                (funcs.vspan_a8)(dst, src, span.a8_mask(), &Closure::NONE);
            }
            SpanKind::AxExtra => {
                let covers = fold_extra_mask(cover_scratch, span.variant_mask());
                (funcs.vspan_a8)(dst, src, covers, &Closure::NONE);
            }
            SpanKind::Argb32Glyph | SpanKind::ArgbxxGlyph => reject_color_mask(span.kind()),
        }
    }

    /// Composite one span list per scanline of `buf`, sequentially.
    /// `rows` must hold exactly one list per scanline, top-down.
    pub fn composite(
        &mut self,
        buf: &mut RenderingBuffer,
        source: &SpanSource,
        rows: &[SpanList8],
    ) {
        assert_eq!(rows.len(), buf.height() as usize, "one span list per row");
        for (y, spans) in rows.iter().enumerate() {
            self.composite_row(buf.row_mut(y as u32), y as i32, source, spans);
        }
    }
}

/// Composite one span list per scanline of `buf` on the global thread
/// pool. Each worker band keeps its own reference to the pattern
/// context; rows are disjoint slices, so no destination locking is
/// needed.
pub fn composite_parallel(
    buf: &mut RenderingBuffer,
    format: PixelFormat,
    op: CompositeOp,
    source: &SpanSource,
    rows: &[SpanList8],
) {
    assert_eq!(rows.len(), buf.height() as usize, "one span list per row");
    let stride = buf.stride();
    buf.data_mut()
        .par_chunks_mut(stride)
        .zip(rows.par_iter())
        .enumerate()
        .for_each(|(y, (row, spans))| {
            let mut c = Compositor::new(format, op);
            let band_source = match source {
                SpanSource::Solid(s) => SpanSource::Solid(*s),
                SpanSource::Pattern(p) => SpanSource::Pattern(p.acquire()),
            };
            c.composite_row(row, y as i32, &band_source, spans);
        });
}

fn grow_scratch(scratch: &mut Vec<Prgb32>, len: usize) {
    if scratch.len() < len {
        let aligned = (len + SCRATCH_ALIGN - 1) & !(SCRATCH_ALIGN - 1);
        scratch.resize(aligned, Prgb32::ZERO);
    }
}

/// Fold an extended-precision mask (one little-endian `u16` per pixel,
/// opaque at 0x100) down to cover bytes.
fn fold_extra_mask<'a>(scratch: &'a mut Vec<u8>, mask: &[u8]) -> &'a [u8] {
    let width = mask.len() / 2;
    if scratch.len() < width {
        let aligned = (width + SCRATCH_ALIGN - 1) & !(SCRATCH_ALIGN - 1);
        scratch.resize(aligned, 0);
    }
    for (out, pair) in scratch.iter_mut().zip(mask.chunks_exact(2)) {
        let m = u16::from_le_bytes([pair[0], pair[1]]) as u32;
        // 0x100 -> 0xFF, 0 -> 0, linear in between.
        *out = (m - (m >> 8)) as u8;
    }
    &scratch[..width]
}

/// Unpack cached fetch bytes (native-endian u32 per pixel) into pixels.
fn unpack_pixels(bytes: &[u8], out: &mut [Prgb32]) {
    debug_assert_eq!(bytes.len(), out.len() * 4);
    for (px, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *px = Prgb32(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
}

fn reject_color_mask(kind: SpanKind) -> ! {
    panic!("{kind:?} spans carry color masks and belong to the text renderer");
}

// ============================================================================
// Tests
// ============================================================================
