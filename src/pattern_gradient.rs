//! Gradient pattern fetchers.
//!
//! All three gradient shapes (linear, radial, conical) share one
//! mechanism: at init the color stops are resolved into a premultiplied
//! color lookup table, and fetch reduces each device pixel to a position
//! along that table. The LUT is built once with fixed-point DDA
//! interpolation between stops; fetch never touches the stop list.
//!
//! Shape math runs in gradient space: each fetch maps the device point
//! through the context's inverse transform, then steps incrementally
//! along the row.

use std::f64::consts::TAU;

use log::debug;

use crate::basics::iceil;
use crate::color::{Argb, Prgb32};
use crate::dda_line::DdaLineInterpolator;
use crate::pattern::{
    FetchFn, PatternContext, PatternError, PatternHandle, PatternKind,
};
use crate::trans_affine::TransAffine;

/// Smallest and largest LUT sizes for linear and radial gradients. The
/// size between these bounds tracks the gradient's device-space extent.
const LUT_SIZE_MIN: u32 = 32;
const LUT_SIZE_MAX: u32 = 1024;

/// Conical gradients always resolve angle to a fixed-size table.
const LUT_SIZE_CONICAL: u32 = 256;

/// How gradient positions outside [0, 1] map back into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientSpread {
    /// Clamp to the end colors.
    Pad,
    /// Tile the gradient.
    Repeat,
}

/// One gradient color stop. Offsets are clamped to [0, 1] at init.
#[derive(Debug, Clone, Copy)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Argb,
}

impl GradientStop {
    pub fn new(offset: f64, color: Argb) -> Self {
        Self { offset, color }
    }
}

pub(crate) struct LinearGradientPattern {
    pub lut: Vec<Prgb32>,
    /// Gradient-space origin.
    pub x0: f64,
    pub y0: f64,
    /// `(p1 - p0) / |p1 - p0|^2`; dotting a relative point with this
    /// yields the position along the gradient in [0, 1].
    pub ax: f64,
    pub ay: f64,
}

pub(crate) struct RadialGradientPattern {
    pub lut: Vec<Prgb32>,
    /// Center in gradient space.
    pub cx: f64,
    pub cy: f64,
    /// Focal point relative to the center, clamped inside the circle.
    pub fx: f64,
    pub fy: f64,
    pub r2: f64,
    /// `1 / (r^2 - (fx^2 + fy^2))`, the normalization of the focal
    /// distance formula.
    pub mul: f64,
}

pub(crate) struct ConicalGradientPattern {
    pub lut: Vec<Prgb32>,
    pub cx: f64,
    pub cy: f64,
    /// Base angle subtracted before the sweep is resolved.
    pub angle: f64,
}

// ============================================================================
// Init
// ============================================================================

impl PatternContext {
    /// Build a linear gradient from `(x0, y0)` to `(x1, y1)` in pattern
    /// space.
    pub fn init_linear(
        stops: &[GradientStop],
        spread: GradientSpread,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        matrix: &TransAffine,
    ) -> Result<PatternHandle, PatternError> {
        let stops = prepare_stops(stops)?;
        if let [only] = stops.as_slice() {
            debug!("pattern init: one-stop linear gradient degraded to solid");
            return Ok(PatternContext::init_solid_prgb(only.color.premultiply()));
        }

        let dx = x1 - x0;
        let dy = y1 - y0;
        let len2 = dx * dx + dy * dy;
        if len2 < 1e-12 {
            return Err(PatternError::InvalidParameter(
                "linear gradient with coincident endpoints",
            ));
        }

        // Size the LUT to the device-space length of the gradient vector.
        let (mut dxt, mut dyt) = (dx, dy);
        matrix.transform_2x2(&mut dxt, &mut dyt);
        let lut = build_lut(&stops, lut_size(dxt.hypot(dyt)))?;

        let fetch: FetchFn = match spread {
            GradientSpread::Pad => fetch_linear::<false>,
            GradientSpread::Repeat => fetch_linear::<true>,
        };

        debug!("pattern init: linear gradient, {} LUT entries", lut.len());

        Ok(PatternHandle::new(PatternContext::new_inner(
            matrix,
            PatternKind::Linear(LinearGradientPattern {
                lut,
                x0,
                y0,
                ax: dx / len2,
                ay: dy / len2,
            }),
            fetch,
        )))
    }

    /// Build a radial gradient centered at `(cx, cy)` with radius `r`
    /// and focal point `(fx, fy)`, all in pattern space. A focal point
    /// on or outside the circle is pulled just inside it.
    #[allow(clippy::too_many_arguments)]
    pub fn init_radial(
        stops: &[GradientStop],
        spread: GradientSpread,
        cx: f64,
        cy: f64,
        r: f64,
        fx: f64,
        fy: f64,
        matrix: &TransAffine,
    ) -> Result<PatternHandle, PatternError> {
        let stops = prepare_stops(stops)?;
        if let [only] = stops.as_slice() {
            debug!("pattern init: one-stop radial gradient degraded to solid");
            return Ok(PatternContext::init_solid_prgb(only.color.premultiply()));
        }
        if r <= 0.0 {
            return Err(PatternError::InvalidParameter(
                "radial gradient with non-positive radius",
            ));
        }

        // Focal offset relative to the center, kept strictly inside the
        // circle so the position formula stays finite.
        let mut fx = fx - cx;
        let mut fy = fy - cy;
        let fdist = fx.hypot(fy);
        if fdist >= r {
            let shrink = r * 0.99 / fdist;
            fx *= shrink;
            fy *= shrink;
        }
        let r2 = r * r;

        let scale = matrix.determinant().abs().sqrt();
        let lut = build_lut(&stops, lut_size(2.0 * r * scale))?;

        let fetch: FetchFn = match spread {
            GradientSpread::Pad => fetch_radial::<false>,
            GradientSpread::Repeat => fetch_radial::<true>,
        };

        debug!("pattern init: radial gradient, {} LUT entries", lut.len());

        Ok(PatternHandle::new(PatternContext::new_inner(
            matrix,
            PatternKind::Radial(RadialGradientPattern {
                lut,
                cx,
                cy,
                fx,
                fy,
                r2,
                mul: 1.0 / (r2 - (fx * fx + fy * fy)),
            }),
            fetch,
        )))
    }

    /// Build a conical (sweep) gradient around `(cx, cy)` starting at
    /// `angle` radians. The sweep wraps by construction, so there is no
    /// spread parameter.
    pub fn init_conical(
        stops: &[GradientStop],
        cx: f64,
        cy: f64,
        angle: f64,
        matrix: &TransAffine,
    ) -> Result<PatternHandle, PatternError> {
        let stops = prepare_stops(stops)?;
        if let [only] = stops.as_slice() {
            debug!("pattern init: one-stop conical gradient degraded to solid");
            return Ok(PatternContext::init_solid_prgb(only.color.premultiply()));
        }

        let lut = build_lut(&stops, LUT_SIZE_CONICAL)?;

        debug!("pattern init: conical gradient, {} LUT entries", lut.len());

        Ok(PatternHandle::new(PatternContext::new_inner(
            matrix,
            PatternKind::Conical(ConicalGradientPattern { lut, cx, cy, angle }),
            fetch_conical,
        )))
    }

    pub(crate) fn linear_kind(&self) -> &LinearGradientPattern {
        match &self.kind {
            PatternKind::Linear(g) => g,
            _ => unreachable!("fetcher bound to wrong pattern kind"),
        }
    }

    pub(crate) fn radial_kind(&self) -> &RadialGradientPattern {
        match &self.kind {
            PatternKind::Radial(g) => g,
            _ => unreachable!("fetcher bound to wrong pattern kind"),
        }
    }

    pub(crate) fn conical_kind(&self) -> &ConicalGradientPattern {
        match &self.kind {
            PatternKind::Conical(g) => g,
            _ => unreachable!("fetcher bound to wrong pattern kind"),
        }
    }
}

// ============================================================================
// Stop preparation and LUT build
// ============================================================================

/// Clamp, sort, and de-duplicate the stop list.
fn prepare_stops(stops: &[GradientStop]) -> Result<Vec<GradientStop>, PatternError> {
    if stops.is_empty() {
        return Err(PatternError::InvalidParameter("gradient without stops"));
    }
    let mut out: Vec<GradientStop> = stops
        .iter()
        .map(|s| GradientStop::new(s.offset.clamp(0.0, 1.0), s.color))
        .collect();
    // Stable by offset; of stops sharing an offset, the later one wins.
    out.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    out.dedup_by(|b, a| {
        if (a.offset - b.offset).abs() < 1e-9 {
            a.color = b.color;
            true
        } else {
            false
        }
    });
    Ok(out)
}

fn lut_size(device_extent: f64) -> u32 {
    if !device_extent.is_finite() {
        return LUT_SIZE_MAX;
    }
    (iceil(device_extent.clamp(0.0, LUT_SIZE_MAX as f64)) as u32)
        .clamp(LUT_SIZE_MIN, LUT_SIZE_MAX)
}

/// Resolve sorted stops into `size` premultiplied entries, running a
/// fixed-point DDA per channel between adjacent stops.
fn build_lut(stops: &[GradientStop], size: u32) -> Result<Vec<Prgb32>, PatternError> {
    debug_assert!(stops.len() >= 2);
    let mut lut = Vec::new();
    lut.try_reserve_exact(size as usize)
        .map_err(|_| PatternError::OutOfMemory("gradient LUT"))?;

    let last = size - 1;
    let pos = |offset: f64| -> u32 { (offset * last as f64).round() as u32 };

    // Pad up to the first stop.
    let first = stops[0];
    lut.resize(pos(first.offset) as usize, first.color.premultiply());

    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let i0 = pos(a.offset);
        let i1 = pos(b.offset);
        if i1 <= i0 {
            continue;
        }
        let count = i1 - i0;
        let mut da = DdaLineInterpolator::<14>::new(a.color.a as i32, b.color.a as i32, count);
        let mut dr = DdaLineInterpolator::<14>::new(a.color.r as i32, b.color.r as i32, count);
        let mut dg = DdaLineInterpolator::<14>::new(a.color.g as i32, b.color.g as i32, count);
        let mut db = DdaLineInterpolator::<14>::new(a.color.b as i32, b.color.b as i32, count);
        for _ in 0..count {
            lut.push(
                Argb::new(da.y() as u8, dr.y() as u8, dg.y() as u8, db.y() as u8).premultiply(),
            );
            da.inc();
            dr.inc();
            dg.inc();
            db.inc();
        }
    }

    // Pad out to the end; also makes the last entry exactly the last
    // stop's color.
    let end = stops[stops.len() - 1];
    lut.resize(size as usize, end.color.premultiply());
    Ok(lut)
}

// ============================================================================
// Fetchers
// ============================================================================

#[inline]
fn lut_entry<const REPEAT: bool>(lut: &[Prgb32], t: f64) -> Prgb32 {
    let len = lut.len();
    let i = if REPEAT {
        let q = t.rem_euclid(1.0);
        ((q * len as f64) as usize).min(len - 1)
    } else if t <= 0.0 {
        0
    } else if t >= 1.0 {
        len - 1
    } else {
        ((t * len as f64) as usize).min(len - 1)
    };
    lut[i]
}

fn fetch_linear<const REPEAT: bool>(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let g = ctx.linear_kind();

    // Position along the gradient is affine in device x; one inverse
    // transform for the row start, then a constant step.
    let (mut gx, mut gy) = (x as f64 + 0.5, y as f64 + 0.5);
    ctx.inverse.transform(&mut gx, &mut gy);
    let mut t = (gx - g.x0) * g.ax + (gy - g.y0) * g.ay;
    let dt = ctx.inverse.sx * g.ax + ctx.inverse.shy * g.ay;

    for px in dst.iter_mut() {
        *px = lut_entry::<REPEAT>(&g.lut, t);
        t += dt;
    }
}

fn fetch_radial<const REPEAT: bool>(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let g = ctx.radial_kind();

    let (mut gx, mut gy) = (x as f64 + 0.5, y as f64 + 0.5);
    ctx.inverse.transform(&mut gx, &mut gy);

    for px in dst.iter_mut() {
        // Distance ratio along the ray from the focal point through the
        // sample to the circle; 0 at the focus, 1 on the circle.
        let dx = gx - (g.cx + g.fx);
        let dy = gy - (g.cy + g.fy);
        let disc = g.r2 * (dx * dx + dy * dy) - {
            let c = dx * g.fy - dy * g.fx;
            c * c
        };
        let t = (dx * g.fx + dy * g.fy + disc.max(0.0).sqrt()) * g.mul;
        *px = lut_entry::<REPEAT>(&g.lut, t);
        gx += ctx.inverse.sx;
        gy += ctx.inverse.shy;
    }
}

fn fetch_conical(ctx: &PatternContext, dst: &mut [Prgb32], x: i32, y: i32) {
    let g = ctx.conical_kind();

    let (mut gx, mut gy) = (x as f64 + 0.5, y as f64 + 0.5);
    ctx.inverse.transform(&mut gx, &mut gy);

    for px in dst.iter_mut() {
        let a = (gy - g.cy).atan2(gx - g.cx) - g.angle;
        let t = (a / TAU).rem_euclid(1.0);
        *px = lut_entry::<true>(&g.lut, t);
        gx += ctx.inverse.sx;
        gy += ctx.inverse.shy;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bw_stops() -> Vec<GradientStop> {
        vec![
            GradientStop::new(0.0, Argb::rgb(0, 0, 0)),
            GradientStop::new(1.0, Argb::rgb(255, 255, 255)),
        ]
    }

    fn red(p: Prgb32) -> u32 {
        (p.0 >> 16) & 0xFF
    }

    #[test]
    fn test_lut_endpoints_are_stop_colors() {
        let lut = build_lut(&bw_stops(), 64).unwrap();
        assert_eq!(lut[0], Prgb32(0xFF00_0000));
        assert_eq!(lut[63], Prgb32(0xFFFF_FFFF));
    }

    #[test]
    fn test_lut_is_monotonic_between_stops() {
        let lut = build_lut(&bw_stops(), 256).unwrap();
        assert!(lut.windows(2).all(|w| red(w[0]) <= red(w[1])));
    }

    #[test]
    fn test_lut_entries_are_premultiplied() {
        let stops = vec![
            GradientStop::new(0.0, Argb::new(0, 255, 255, 255)),
            GradientStop::new(1.0, Argb::new(255, 255, 255, 255)),
        ];
        let lut = build_lut(&stops, 128).unwrap();
        for p in &lut {
            assert!(red(*p) <= p.alpha(), "non-premultiplied entry {:08x}", p.0);
        }
    }

    #[test]
    fn test_stops_sorted_and_clamped() {
        let stops = vec![
            GradientStop::new(2.0, Argb::rgb(3, 3, 3)),
            GradientStop::new(-1.0, Argb::rgb(1, 1, 1)),
            GradientStop::new(0.5, Argb::rgb(2, 2, 2)),
        ];
        let out = prepare_stops(&stops).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].offset, 0.0);
        assert_eq!(out[1].offset, 0.5);
        assert_eq!(out[2].offset, 1.0);
    }

    #[test]
    fn test_duplicate_offset_later_stop_wins() {
        let stops = vec![
            GradientStop::new(0.0, Argb::rgb(0, 0, 0)),
            GradientStop::new(0.5, Argb::rgb(10, 10, 10)),
            GradientStop::new(0.5, Argb::rgb(20, 20, 20)),
            GradientStop::new(1.0, Argb::rgb(255, 255, 255)),
        ];
        let out = prepare_stops(&stops).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].color, Argb::rgb(20, 20, 20));
    }

    #[test]
    fn test_no_stops_rejected() {
        let err = PatternContext::init_linear(
            &[],
            GradientSpread::Pad,
            0.0,
            0.0,
            1.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PatternError::InvalidParameter(_)));
    }

    #[test]
    fn test_single_stop_degrades_to_solid() {
        let stops = vec![GradientStop::new(0.3, Argb::rgb(9, 8, 7))];
        let ctx = PatternContext::init_linear(
            &stops,
            GradientSpread::Pad,
            0.0,
            0.0,
            100.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 4];
        ctx.fetch(&mut dst, 500, -17);
        assert!(dst.iter().all(|&p| p == Argb::rgb(9, 8, 7).premultiply()));
    }

    #[test]
    fn test_linear_horizontal_ramp() {
        let ctx = PatternContext::init_linear(
            &bw_stops(),
            GradientSpread::Pad,
            0.0,
            0.0,
            256.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 256];
        ctx.fetch(&mut dst, 0, 10);
        assert_eq!(red(dst[0]), 0);
        assert_eq!(red(dst[255]), 255);
        assert!(dst.windows(2).all(|w| red(w[0]) <= red(w[1])));
    }

    #[test]
    fn test_linear_pad_clamps_outside() {
        let ctx = PatternContext::init_linear(
            &bw_stops(),
            GradientSpread::Pad,
            0.0,
            0.0,
            64.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 2];
        ctx.fetch(&mut dst, -100, 0);
        assert_eq!(dst[0], Prgb32(0xFF00_0000));
        ctx.fetch(&mut dst, 200, 0);
        assert_eq!(dst[0], Prgb32(0xFFFF_FFFF));
    }

    #[test]
    fn test_linear_repeat_tiles() {
        let ctx = PatternContext::init_linear(
            &bw_stops(),
            GradientSpread::Repeat,
            0.0,
            0.0,
            64.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap();
        let mut a = vec![Prgb32::ZERO; 8];
        let mut b = vec![Prgb32::ZERO; 8];
        ctx.fetch(&mut a, 10, 0);
        ctx.fetch(&mut b, 10 + 64, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_linear_respects_transform() {
        // Gradient along x in pattern space, surface rotated 90 degrees:
        // the ramp must run along device y.
        let ctx = PatternContext::init_linear(
            &bw_stops(),
            GradientSpread::Pad,
            0.0,
            0.0,
            64.0,
            0.0,
            &TransAffine::new_rotation(std::f64::consts::FRAC_PI_2),
        )
        .unwrap();
        assert!(ctx.is_transformed());
        let mut row = vec![Prgb32::ZERO; 1];
        let mut near = vec![Prgb32::ZERO; 1];
        let mut far = vec![Prgb32::ZERO; 1];
        ctx.fetch(&mut near, 0, 2);
        ctx.fetch(&mut far, 0, 60);
        ctx.fetch(&mut row, 60, 2);
        assert!(red(near[0]) < red(far[0]));
        assert_eq!(red(row[0]), red(near[0]));
    }

    #[test]
    fn test_linear_coincident_points_rejected() {
        let err = PatternContext::init_linear(
            &bw_stops(),
            GradientSpread::Pad,
            5.0,
            5.0,
            5.0,
            5.0,
            &TransAffine::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PatternError::InvalidParameter(_)));
    }

    #[test]
    fn test_radial_center_and_edge() {
        let ctx = PatternContext::init_radial(
            &bw_stops(),
            GradientSpread::Pad,
            50.0,
            50.0,
            40.0,
            50.0,
            50.0,
            &TransAffine::new(),
        )
        .unwrap();
        let mut center = vec![Prgb32::ZERO; 1];
        let mut edge = vec![Prgb32::ZERO; 1];
        ctx.fetch(&mut center, 50, 50);
        ctx.fetch(&mut edge, 90, 50);
        assert!(red(center[0]) <= 4, "center {}", red(center[0]));
        assert_eq!(red(edge[0]), 255);
    }

    #[test]
    fn test_radial_zero_radius_rejected() {
        let err = PatternContext::init_radial(
            &bw_stops(),
            GradientSpread::Pad,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PatternError::InvalidParameter(_)));
    }

    #[test]
    fn test_radial_focus_outside_is_clamped() {
        // Focus far outside the circle must still produce finite output.
        let ctx = PatternContext::init_radial(
            &bw_stops(),
            GradientSpread::Pad,
            0.0,
            0.0,
            10.0,
            100.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap();
        let mut dst = vec![Prgb32::ZERO; 16];
        ctx.fetch(&mut dst, -8, 0);
    }

    #[test]
    fn test_conical_wraps_around() {
        let ctx = PatternContext::init_conical(
            &bw_stops(),
            0.0,
            0.0,
            0.0,
            &TransAffine::new(),
        )
        .unwrap();
        // Just above and just below the positive x axis land at the two
        // ends of the sweep.
        let mut above = vec![Prgb32::ZERO; 1];
        let mut below = vec![Prgb32::ZERO; 1];
        ctx.fetch(&mut above, 100, 1);
        ctx.fetch(&mut below, 100, -2);
        assert!(red(above[0]) < 8, "above {}", red(above[0]));
        assert!(red(below[0]) > 247, "below {}", red(below[0]));
    }
}
