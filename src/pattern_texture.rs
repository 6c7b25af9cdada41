//! Texture pattern fetchers.
//!
//! A texture context borrows a shared read-only image and replays it
//! across device space. Three specializations are chosen at init:
//!
//! - **exact** — the transform is translation-only and lands on whole
//!   texels; fetch is pure index remapping.
//! - **subpixel** — translation-only with a fractional offset; fetch
//!   bilinearly blends the 2x2 texel neighborhood with weights fixed at
//!   init time.
//! - **transformed** — scale/shear/rotation; each pixel is mapped
//!   through the inverse transform, with nearest or bilinear sampling.
//!
//! Edge handling is repeat (tile) or reflect (mirror every other tile),
//! also bound at init. The transformed paths implement repeat only;
//! reflect with an arbitrary transform has no fetcher and is rejected
//! at init.

use std::sync::Arc;

use log::debug;

use crate::color::Prgb32;
use crate::pattern::{
    FetchFn, ImageBuf, PatternContext, PatternError, PatternHandle, PatternKind,
};
use crate::trans_affine::TransAffine;

/// Texture edge handling outside the image rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureExtend {
    /// Tile the image.
    Repeat,
    /// Mirror every other tile.
    Reflect,
}

/// Sampling filter for the transformed fetch paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Bilinear,
}

pub(crate) struct TexturePattern {
    pub image: Arc<ImageBuf>,
    /// Device-to-texture x offset in 24.8 fixed point.
    pub u_base: i32,
    /// Device-to-texture y offset in 24.8 fixed point.
    pub v_base: i32,
}

impl PatternContext {
    /// Build a texture context for `image` under `matrix`.
    ///
    /// The fetch specialization (exact / subpixel / transformed) and
    /// edge handling are selected here, once.
    pub fn init_texture(
        image: Arc<ImageBuf>,
        extend: TextureExtend,
        filter: TextureFilter,
        matrix: &TransAffine,
    ) -> Result<PatternHandle, PatternError> {
        if !matrix.is_valid(1e-12) {
            return Err(PatternError::InvalidParameter("degenerate texture matrix"));
        }

        let transformed = !matrix.is_translation_only();
        if transformed && extend == TextureExtend::Reflect {
            return Err(PatternError::Unsupported(
                "reflect extend with a non-translation transform",
            ));
        }

        // A 1x1 texture under translation degrades to the solid fast path.
        if !transformed && image.width() == 1 && image.height() == 1 {
            debug!("pattern init: 1x1 texture degraded to solid");
            return Ok(PatternContext::init_solid_prgb(image.pixel(0, 0)));
        }

        // Device x maps to texture coordinate x + u_base/256.
        let u_base = fixed_8(-matrix.tx);
        let v_base = fixed_8(-matrix.ty);
        let subpixel = (u_base & 0xFF) != 0 || (v_base & 0xFF) != 0;

        let fetch: FetchFn = if transformed {
            match filter {
                TextureFilter::Nearest => fetch_transform_nearest_repeat,
                TextureFilter::Bilinear => fetch_transform_bilinear_repeat,
            }
        } else if subpixel {
            match extend {
                TextureExtend::Repeat => fetch_subxy_repeat,
                TextureExtend::Reflect => fetch_subxy_reflect,
            }
        } else {
            match extend {
                TextureExtend::Repeat => fetch_exact_repeat,
                TextureExtend::Reflect => fetch_exact_reflect,
            }
        };

        debug!(
            "pattern init: texture {}x{} {:?} {:?} (transformed={transformed}, subpixel={subpixel})",
            image.width(),
            image.height(),
            extend,
            filter,
        );

        Ok(PatternHandle::new(PatternContext::new_inner(
            matrix,
            PatternKind::Texture(TexturePattern {
                image,
                u_base,
                v_base,
            }),
            fetch,
        )))
    }

    pub(crate) fn texture_kind(&self) -> &TexturePattern {
        match &self.kind {
            PatternKind::Texture(t) => t,
            _ => unreachable!("fetcher bound to wrong pattern kind"),
        }
    }
}

#[inline]
fn fixed_8(v: f64) -> i32 {
    (v * 256.0).round() as i32
}

// ============================================================================
// Index remapping
// ============================================================================

#[inline]
fn map_repeat(i: i64, n: i64) -> usize {
    i.rem_euclid(n) as usize
}

#[inline]
fn map_reflect(i: i64, n: i64) -> usize {
    let m = i.rem_euclid(2 * n);
    if m < n {
        m as usize
    } else {
        (2 * n - 1 - m) as usize
    }
}

// ============================================================================
// Exact fetchers (whole-texel translation)
// ============================================================================

fn fetch_exact_repeat(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let t = ctx.texture_kind();
    let w = t.image.width() as i64;
    let h = t.image.height() as i64;
    let row = t.image.row(map_repeat(y as i64 + (t.v_base >> 8) as i64, h) as u32);

    let mut u = map_repeat(x as i64 + (t.u_base >> 8) as i64, w);
    for px in dst.iter_mut() {
        *px = row[u];
        u += 1;
        if u == w as usize {
            u = 0;
        }
    }
}

fn fetch_exact_reflect(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let t = ctx.texture_kind();
    let w = t.image.width() as i64;
    let h = t.image.height() as i64;
    let row = t.image.row(map_reflect(y as i64 + (t.v_base >> 8) as i64, h) as u32);

    let u0 = x as i64 + (t.u_base >> 8) as i64;
    for (i, px) in dst.iter_mut().enumerate() {
        *px = row[map_reflect(u0 + i as i64, w)];
    }
}

// ============================================================================
// Subpixel fetchers (fractional translation, fixed 2x2 weights)
// ============================================================================

#[inline]
fn bilerp(p00: Prgb32, p01: Prgb32, p10: Prgb32, p11: Prgb32, fx: u32, fy: u32) -> Prgb32 {
    let top = p00.lerp_256(p01, fx);
    let bot = p10.lerp_256(p11, fx);
    top.lerp_256(bot, fy)
}

fn fetch_subxy<const REFLECT: bool>(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let t = ctx.texture_kind();
    let w = t.image.width() as i64;
    let h = t.image.height() as i64;
    let map = if REFLECT { map_reflect } else { map_repeat };

    let fx = (t.u_base & 0xFF) as u32;
    let fy = (t.v_base & 0xFF) as u32;

    let vt = y as i64 + (t.v_base >> 8) as i64;
    let r0 = t.image.row(map(vt, h) as u32);
    let r1 = t.image.row(map(vt + 1, h) as u32);

    let ut = x as i64 + (t.u_base >> 8) as i64;
    for (i, px) in dst.iter_mut().enumerate() {
        let u0 = map(ut + i as i64, w);
        let u1 = map(ut + i as i64 + 1, w);
        *px = bilerp(r0[u0], r0[u1], r1[u0], r1[u1], fx, fy);
    }
}

fn fetch_subxy_repeat(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    fetch_subxy::<false>(ctx, dst, x, y)
}

fn fetch_subxy_reflect(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    fetch_subxy::<true>(ctx, dst, x, y)
}

// ============================================================================
// Transformed fetchers (inverse-mapped per pixel, repeat extend)
// ============================================================================

fn fetch_transform_nearest_repeat(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let t = ctx.texture_kind();
    let w = t.image.width() as i64;
    let h = t.image.height() as i64;

    // Walk the inverse-mapped row incrementally: one transform for the
    // start point, then constant per-pixel increments.
    let (mut tx, mut ty) = (x as f64 + 0.5, y as f64 + 0.5);
    ctx.inverse.transform(&mut tx, &mut ty);
    let dx = ctx.inverse.sx;
    let dy = ctx.inverse.shy;

    for px in dst.iter_mut() {
        let u = map_repeat(tx.floor() as i64, w);
        let v = map_repeat(ty.floor() as i64, h);
        *px = t.image.pixel(u as u32, v as u32);
        tx += dx;
        ty += dy;
    }
}

fn fetch_transform_bilinear_repeat(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let t = ctx.texture_kind();
    let w = t.image.width() as i64;
    let h = t.image.height() as i64;

    let (mut tx, mut ty) = (x as f64 + 0.5, y as f64 + 0.5);
    ctx.inverse.transform(&mut tx, &mut ty);
    let dx = ctx.inverse.sx;
    let dy = ctx.inverse.shy;

    for px in dst.iter_mut() {
        // Sample at texel centers.
        let sx = tx - 0.5;
        let sy = ty - 0.5;
        let u0 = sx.floor();
        let v0 = sy.floor();
        let fx = ((sx - u0) * 256.0) as u32;
        let fy = ((sy - v0) * 256.0) as u32;

        let u0 = u0 as i64;
        let v0 = v0 as i64;
        let ua = map_repeat(u0, w) as u32;
        let ub = map_repeat(u0 + 1, w) as u32;
        let va = map_repeat(v0, h) as u32;
        let vb = map_repeat(v0 + 1, h) as u32;

        *px = bilerp(
            t.image.pixel(ua, va),
            t.image.pixel(ub, va),
            t.image.pixel(ua, vb),
            t.image.pixel(ub, vb),
            fx,
            fy,
        );
        tx += dx;
        ty += dy;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Argb;

    fn checker2x2() -> Arc<ImageBuf> {
        // [ A B ]
        // [ C D ]
        Arc::new(ImageBuf::new(
            2,
            2,
            vec![
                Prgb32(0xFF00_0001),
                Prgb32(0xFF00_0002),
                Prgb32(0xFF00_0003),
                Prgb32(0xFF00_0004),
            ],
        ))
    }

    #[test]
    fn test_exact_repeat_tiles() {
        let ctx = PatternContext::init_texture(
            checker2x2(),
            TextureExtend::Repeat,
            TextureFilter::Nearest,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 5];
        ctx.fetch(&mut dst, 0, 0);
        assert_eq!(
            dst,
            vec![
                Prgb32(0xFF00_0001),
                Prgb32(0xFF00_0002),
                Prgb32(0xFF00_0001),
                Prgb32(0xFF00_0002),
                Prgb32(0xFF00_0001),
            ]
        );
        ctx.fetch(&mut dst, 0, 3); // row 3 wraps to image row 1
        assert_eq!(dst[0], Prgb32(0xFF00_0003));
    }

    #[test]
    fn test_exact_reflect_mirrors() {
        let img = Arc::new(ImageBuf::new(
            3,
            1,
            vec![Prgb32(1), Prgb32(2), Prgb32(3)],
        ));
        let ctx = PatternContext::init_texture(
            img,
            TextureExtend::Reflect,
            TextureFilter::Nearest,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 8];
        ctx.fetch(&mut dst, 0, 0);
        let vals: Vec<u32> = dst.iter().map(|p| p.0).collect();
        assert_eq!(vals, vec![1, 2, 3, 3, 2, 1, 1, 2]);
    }

    #[test]
    fn test_translation_shifts_exactly() {
        let ctx = PatternContext::init_texture(
            checker2x2(),
            TextureExtend::Repeat,
            TextureFilter::Nearest,
            &TransAffine::new_translation(1.0, 0.0),
        )
        .unwrap();
        assert!(!ctx.is_transformed());
        let mut dst = vec![Prgb32::ZERO; 2];
        ctx.fetch(&mut dst, 1, 0);
        // Device x=1 maps back to texel 0.
        assert_eq!(dst[0], Prgb32(0xFF00_0001));
    }

    #[test]
    fn test_subpixel_half_offset_blends() {
        let img = Arc::new(ImageBuf::new(
            2,
            1,
            vec![
                Argb::rgb(0, 0, 0).premultiply(),
                Argb::rgb(255, 255, 255).premultiply(),
            ],
        ));
        let ctx = PatternContext::init_texture(
            img,
            TextureExtend::Repeat,
            TextureFilter::Nearest,
            &TransAffine::new_translation(0.5, 0.0),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 1];
        ctx.fetch(&mut dst, 0, 0);
        let r = (dst[0].0 >> 16) & 0xFF;
        assert!((127..=128).contains(&r), "r={r}");
    }

    #[test]
    fn test_transformed_scale_is_flagged_and_samples() {
        let ctx = PatternContext::init_texture(
            checker2x2(),
            TextureExtend::Repeat,
            TextureFilter::Nearest,
            &TransAffine::new_scaling(2.0, 2.0),
        )
        .unwrap();
        assert!(ctx.is_transformed());
        let mut dst = vec![Prgb32::ZERO; 4];
        ctx.fetch(&mut dst, 0, 0);
        // 2x upscale: texel 0 covers device 0..2.
        assert_eq!(dst[0], Prgb32(0xFF00_0001));
        assert_eq!(dst[1], Prgb32(0xFF00_0001));
        assert_eq!(dst[2], Prgb32(0xFF00_0002));
    }

    #[test]
    fn test_reflect_with_transform_unsupported() {
        let err = PatternContext::init_texture(
            checker2x2(),
            TextureExtend::Reflect,
            TextureFilter::Nearest,
            &TransAffine::new_rotation(0.3),
        )
        .unwrap_err();
        assert!(matches!(err, PatternError::Unsupported(_)));
    }

    #[test]
    fn test_1x1_degrades_to_solid() {
        let img = Arc::new(ImageBuf::new(1, 1, vec![Prgb32(0xFF12_3456)]));
        let ctx = PatternContext::init_texture(
            img,
            TextureExtend::Repeat,
            TextureFilter::Nearest,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 3];
        ctx.fetch(&mut dst, 40, -2);
        assert!(dst.iter().all(|&p| p == Prgb32(0xFF12_3456)));
    }
}
