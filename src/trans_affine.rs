//! Affine transformation matrix.
//!
//! 2D affine transformations used to bind a paint source's space to
//! device space: rotation, scaling, translation, skewing, composition,
//! and inversion. Pattern initialization needs one extra classification
//! the usual affine type does not carry: whether a transform is
//! translation-only, which selects the cheap axis-aligned fetch paths.

use crate::basics::is_equal_eps;

/// Epsilon for affine matrix comparisons.
pub const AFFINE_EPSILON: f64 = 1e-14;

/// Epsilon for the translation-only classification.
///
/// A transform whose linear part differs from identity by no more than
/// this is treated as pure translation and fetched through the
/// axis-aligned paths. The value sits well above the f64 rounding noise
/// accumulated by composing a handful of transforms, and far below any
/// scale factor that could move a sample by a visible fraction of a
/// pixel at realistic surface sizes.
pub const TRANSLATION_EPSILON: f64 = 1e-10;

/// 2D affine transformation matrix.
///
/// Stores six components: `[sx, shy, shx, sy, tx, ty]` representing the
/// matrix:
///
/// ```text
///   | sx  shx tx |
///   | shy  sy ty |
///   |  0    0  1 |
/// ```
///
/// Transform: `x' = x*sx + y*shx + tx`, `y' = x*shy + y*sy + ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransAffine {
    pub sx: f64,
    pub shy: f64,
    pub shx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl TransAffine {
    // ====================================================================
    // Construction
    // ====================================================================

    /// Identity matrix.
    pub fn new() -> Self {
        Self {
            sx: 1.0,
            shy: 0.0,
            shx: 0.0,
            sy: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn new_custom(sx: f64, shy: f64, shx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            sx,
            shy,
            shx,
            sy,
            tx,
            ty,
        }
    }

    pub fn new_translation(x: f64, y: f64) -> Self {
        Self::new_custom(1.0, 0.0, 0.0, 1.0, x, y)
    }

    pub fn new_scaling(x: f64, y: f64) -> Self {
        Self::new_custom(x, 0.0, 0.0, y, 0.0, 0.0)
    }

    pub fn new_rotation(a: f64) -> Self {
        Self::new_custom(a.cos(), a.sin(), -a.sin(), a.cos(), 0.0, 0.0)
    }

    pub fn from_array(m: &[f64; 6]) -> Self {
        Self::new_custom(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    // ====================================================================
    // Operations
    // ====================================================================

    /// Multiply by `m` (apply `m` after self).
    pub fn multiply(&mut self, m: &TransAffine) -> &mut Self {
        let t0 = self.sx * m.sx + self.shy * m.shx;
        let t2 = self.shx * m.sx + self.sy * m.shx;
        let t4 = self.tx * m.sx + self.ty * m.shx + m.tx;
        self.shy = self.sx * m.shy + self.shy * m.sy;
        self.sy = self.shx * m.shy + self.sy * m.sy;
        self.ty = self.tx * m.shy + self.ty * m.sy + m.ty;
        self.sx = t0;
        self.shx = t2;
        self.tx = t4;
        self
    }

    pub fn translate(&mut self, x: f64, y: f64) -> &mut Self {
        self.tx += x;
        self.ty += y;
        self
    }

    /// Invert in place. The caller must ensure the matrix is valid
    /// (non-degenerate determinant).
    pub fn invert(&mut self) -> &mut Self {
        let d = self.determinant_reciprocal();

        let t0 = self.sy * d;
        self.sy = self.sx * d;
        self.shy = -self.shy * d;
        self.shx = -self.shx * d;

        let t4 = -self.tx * t0 - self.ty * self.shx;
        self.ty = -self.tx * self.shy - self.ty * self.sy;

        self.sx = t0;
        self.tx = t4;
        self
    }

    /// Inverted copy.
    pub fn inverse(&self) -> TransAffine {
        let mut m = *self;
        m.invert();
        m
    }

    /// Apply to a point.
    #[inline]
    pub fn transform(&self, x: &mut f64, y: &mut f64) {
        let tmp = *x;
        *x = tmp * self.sx + *y * self.shx + self.tx;
        *y = tmp * self.shy + *y * self.sy + self.ty;
    }

    /// Apply the linear part only (no translation), e.g. to a direction
    /// vector.
    #[inline]
    pub fn transform_2x2(&self, x: &mut f64, y: &mut f64) {
        let tmp = *x;
        *x = tmp * self.sx + *y * self.shx;
        *y = tmp * self.shy + *y * self.sy;
    }

    pub fn store_to(&self, m: &mut [f64; 6]) {
        m[0] = self.sx;
        m[1] = self.shy;
        m[2] = self.shx;
        m[3] = self.sy;
        m[4] = self.tx;
        m[5] = self.ty;
    }

    // ====================================================================
    // Queries
    // ====================================================================

    pub fn determinant(&self) -> f64 {
        self.sx * self.sy - self.shy * self.shx
    }

    pub fn determinant_reciprocal(&self) -> f64 {
        1.0 / self.determinant()
    }

    pub fn is_valid(&self, epsilon: f64) -> bool {
        self.sx.abs() > epsilon && self.sy.abs() > epsilon
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.is_translation_only_eps(epsilon)
            && is_equal_eps(self.tx, 0.0, epsilon)
            && is_equal_eps(self.ty, 0.0, epsilon)
    }

    /// Whether the linear part is identity, i.e. the transform moves
    /// points by translation alone. Uses [`TRANSLATION_EPSILON`].
    ///
    /// Scale, shear, or rotation all fail this test; a bare translation
    /// of any magnitude passes it.
    #[inline]
    pub fn is_translation_only(&self) -> bool {
        self.is_translation_only_eps(TRANSLATION_EPSILON)
    }

    fn is_translation_only_eps(&self, epsilon: f64) -> bool {
        is_equal_eps(self.sx, 1.0, epsilon)
            && is_equal_eps(self.shy, 0.0, epsilon)
            && is_equal_eps(self.shx, 0.0, epsilon)
            && is_equal_eps(self.sy, 1.0, epsilon)
    }
}

impl Default for TransAffine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
