//! Scaled-image pattern fetchers.
//!
//! A scale context resizes a source image to a target pixel size once,
//! conceptually: instead of resampling into a second image it
//! precomputes per-axis lookup tables at init (source index and
//! interpolation weight for every destination column and row), then
//! fetches through the tables. The scaled image tiles across device
//! space.
//!
//! Two fetchers: nearest (index tables only) and bilinear (index plus
//! weight tables, blending the 2x2 source neighborhood).

use std::sync::Arc;

use log::debug;

use crate::basics::uround;
use crate::color::Prgb32;
use crate::pattern::{
    FetchFn, ImageBuf, PatternContext, PatternError, PatternHandle, PatternKind,
};
use crate::pattern_texture::{TextureExtend, TextureFilter};
use crate::trans_affine::TransAffine;

pub(crate) struct ScalePattern {
    pub image: Arc<ImageBuf>,
    /// Destination size the image is scaled to; the pattern tiles with
    /// this period.
    pub dw: u32,
    pub dh: u32,
    /// Integer device translation.
    pub dx: i32,
    pub dy: i32,
    /// Source column for each destination column (left neighbor for
    /// bilinear).
    pub xpoints: Vec<u32>,
    /// Source row for each destination row.
    pub ypoints: Vec<u32>,
    /// Weight toward the right neighbor, 0..=256 per destination column.
    /// Empty for nearest.
    pub xapoints: Vec<u32>,
    /// Weight toward the lower neighbor, 0..=256 per destination row.
    /// Empty for nearest.
    pub yapoints: Vec<u32>,
}

impl PatternContext {
    /// Build a context that draws `image` scaled to `dw` x `dh` pixels,
    /// tiled across device space. `matrix` must be translation-only;
    /// combined scale-plus-transform setups go through the transformed
    /// texture path instead.
    pub fn init_scale(
        image: Arc<ImageBuf>,
        dw: u32,
        dh: u32,
        filter: TextureFilter,
        matrix: &TransAffine,
    ) -> Result<PatternHandle, PatternError> {
        if dw == 0 || dh == 0 {
            return Err(PatternError::InvalidParameter("zero scale target size"));
        }
        if !matrix.is_translation_only() {
            return Err(PatternError::Unsupported(
                "scale pattern with a non-translation transform",
            ));
        }

        // Identity scale is an exact texture blit.
        if dw == image.width() && dh == image.height() {
            debug!("pattern init: identity scale degraded to texture");
            return PatternContext::init_texture(
                image,
                TextureExtend::Repeat,
                TextureFilter::Nearest,
                matrix,
            );
        }

        let sw = image.width();
        let sh = image.height();
        let bilinear = filter == TextureFilter::Bilinear;

        let (xpoints, xapoints) = build_axis_tables(sw, dw, bilinear)?;
        let (ypoints, yapoints) = build_axis_tables(sh, dh, bilinear)?;

        let fetch: FetchFn = if bilinear {
            fetch_scale_bilinear
        } else {
            fetch_scale_nearest
        };

        debug!("pattern init: scale {sw}x{sh} -> {dw}x{dh} ({filter:?})");

        Ok(PatternHandle::new(PatternContext::new_inner(
            matrix,
            PatternKind::Scale(ScalePattern {
                image,
                dw,
                dh,
                dx: matrix.tx.round() as i32,
                dy: matrix.ty.round() as i32,
                xpoints,
                ypoints,
                xapoints,
                yapoints,
            }),
            fetch,
        )))
    }

    pub(crate) fn scale_kind(&self) -> &ScalePattern {
        match &self.kind {
            PatternKind::Scale(s) => s,
            _ => unreachable!("fetcher bound to wrong pattern kind"),
        }
    }
}

/// Index and weight tables for scaling `src` source texels onto `dst`
/// destination pixels, sampling at pixel centers.
fn build_axis_tables(
    src: u32,
    dst: u32,
    bilinear: bool,
) -> Result<(Vec<u32>, Vec<u32>), PatternError> {
    let mut points = Vec::new();
    points
        .try_reserve_exact(dst as usize)
        .map_err(|_| PatternError::OutOfMemory("scale index table"))?;
    let mut weights = Vec::new();
    if bilinear {
        weights
            .try_reserve_exact(dst as usize)
            .map_err(|_| PatternError::OutOfMemory("scale weight table"))?;
    }

    let step = src as f64 / dst as f64;
    for i in 0..dst {
        let center = (i as f64 + 0.5) * step;
        if bilinear {
            let pos = center - 0.5;
            let left = pos.floor().max(0.0);
            let left_i = (left as u32).min(src - 1);
            let w = if left_i + 1 >= src {
                0
            } else {
                uround((pos - left) * 256.0).min(256)
            };
            points.push(left_i);
            weights.push(w);
        } else {
            points.push((center as u32).min(src - 1));
        }
    }
    Ok((points, weights))
}

#[inline]
fn wrap(i: i64, n: u32) -> usize {
    i.rem_euclid(n as i64) as usize
}

fn fetch_scale_nearest(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let s = ctx.scale_kind();
    let row = s.image.row(s.ypoints[wrap((y - s.dy) as i64, s.dh)]);

    let x0 = (x - s.dx) as i64;
    for (i, px) in dst.iter_mut().enumerate() {
        *px = row[s.xpoints[wrap(x0 + i as i64, s.dw)] as usize];
    }
}

fn fetch_scale_bilinear(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let s = ctx.scale_kind();
    let sw = s.image.width();
    let sh = s.image.height();

    let yi = wrap((y - s.dy) as i64, s.dh);
    let y0 = s.ypoints[yi];
    let y1 = (y0 + 1).min(sh - 1);
    let wy = s.yapoints[yi];
    let r0 = s.image.row(y0);
    let r1 = s.image.row(y1);

    let xb = (x - s.dx) as i64;
    for (i, px) in dst.iter_mut().enumerate() {
        let xi = wrap(xb + i as i64, s.dw);
        let x0 = s.xpoints[xi] as usize;
        let x1 = ((s.xpoints[xi] + 1).min(sw - 1)) as usize;
        let wx = s.xapoints[xi];
        let top = r0[x0].lerp_256(r0[x1], wx);
        let bot = r1[x0].lerp_256(r1[x1], wx);
        *px = top.lerp_256(bot, wy);
    }
}

// ============================================================================
// Tests
// ============================================================================
