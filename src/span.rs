//! Span model — coverage intervals on one scanline.
//!
//! A span is one run of contiguous pixels `[x0, x1)` carrying either a
//! single constant coverage value (CMask) or per-pixel coverage data
//! (VMask). The rasterizer builds one x-ascending, non-overlapping,
//! singly linked list of spans per scanline and hands it to the
//! compositor, which only ever walks forward.
//!
//! Spans, their variant mask bytes, and any cached fetched-pixel data
//! are all allocated out of arenas owned by a [`SpanList`]; nothing is
//! freed per span, and `clear()` recycles the arenas for the next
//! scanline pass.
//!
//! The mask slot is an explicit tagged union ([`SpanMask`]): a constant
//! coverage value is a value, a variant mask is an offset into the mask
//! arena. Reading a span through the wrong accessor is a programming
//! error and asserts.

use std::marker::PhantomData;

use crate::basics::{CMASK_16_FULL, CMASK_8_FULL};

/// How many constant-coverage pixels make a CMask span worthwhile.
/// Minimum is 1; 4 or more is recommended so that vectorized constant
/// fills have room to pay off. A policy hint for the rasterizer, not a
/// correctness rule.
pub const SPAN_C_THRESHOLD: usize = 4;

// ============================================================================
// SpanKind
// ============================================================================

/// Span type tag (3-bit range).
///
/// `Const` is the only constant-mask kind; everything at or above
/// `A8Glyph` carries a per-pixel variant mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpanKind {
    /// One coverage value for the whole span.
    Const = 0,
    /// 8-bit alpha mask, one byte per pixel.
    A8Glyph = 1,
    /// Alpha mask at the channel width of the span class.
    AxGlyph = 2,
    /// Extended-precision alpha mask (twice the channel width).
    AxExtra = 3,
    /// Per-pixel ARGB32 color mask (subpixel glyph rendering).
    Argb32Glyph = 4,
    /// Per-pixel ARGB color mask at the span class channel width.
    ArgbxxGlyph = 5,
}

pub const SPAN_KIND_COUNT: usize = 6;

/// First variant kind; everything below is constant-mask.
const SPAN_V_BEGIN: u8 = SpanKind::A8Glyph as u8;

impl SpanKind {
    #[inline]
    pub fn is_const(self) -> bool {
        (self as u8) < SPAN_V_BEGIN
    }

    #[inline]
    pub fn is_variant(self) -> bool {
        (self as u8) >= SPAN_V_BEGIN
    }
}

// ============================================================================
// MaskDepth — 8-bit vs 16-bit span classes
// ============================================================================

/// Marker for the channel width of a span class.
///
/// The two implementations fix the opaque constant-mask value and the
/// per-kind mask advance table (bytes per pixel a variant mask consumes),
/// so code walking mask buffers needs no per-kind branching.
pub trait MaskDepth {
    /// Fully opaque constant mask ("one past max" scale).
    const CMASK_FULL: u32;
    /// Bytes of mask data per pixel, indexed by `SpanKind`.
    const ADVANCE: [usize; SPAN_KIND_COUNT];
}

/// 8-bit-channel span class (PRGB32, XRGB32, A8 destinations).
#[derive(Debug, Clone, Copy)]
pub struct Mask8;

impl MaskDepth for Mask8 {
    const CMASK_FULL: u32 = CMASK_8_FULL;
    const ADVANCE: [usize; SPAN_KIND_COUNT] = [0, 1, 1, 2, 4, 4];
}

/// 16-bit-channel span class (PRGB64, A16 destinations).
#[derive(Debug, Clone, Copy)]
pub struct Mask16;

impl MaskDepth for Mask16 {
    const CMASK_FULL: u32 = CMASK_16_FULL;
    const ADVANCE: [usize; SPAN_KIND_COUNT] = [0, 1, 2, 4, 4, 8];
}

/// Mask-buffer bytes a span of `kind` consumes for `width` pixels.
#[inline]
pub fn mask_advance<M: MaskDepth>(kind: SpanKind, width: usize) -> usize {
    width * M::ADVANCE[kind as usize]
}

// ============================================================================
// Span
// ============================================================================

/// Tagged mask slot of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanMask {
    /// Constant coverage value (0 = transparent, `CMASK_FULL` = opaque).
    Const(u32),
    /// Byte offset of this span's mask run in the list's mask arena.
    Variant { offset: u32 },
}

const SPAN_NIL: u32 = u32::MAX;

/// One span node. Immutable once built; `y` is implicit (a list belongs
/// to one scanline).
#[derive(Debug, Clone, Copy)]
struct Span {
    x0: i32,
    x1: i32,
    kind: SpanKind,
    mask: SpanMask,
    /// Offset into the fetched-pixel data arena, or `SPAN_NIL`.
    /// Used by patterns that cache fetch output per span.
    data: u32,
    /// Arena index of the next span on this scanline, or `SPAN_NIL`.
    next: u32,
}

// ============================================================================
// SpanRef — borrowed view of one span during a walk
// ============================================================================

/// Mask view resolved against the owning list's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskRef<'a> {
    Const(u32),
    Bytes(&'a [u8]),
}

/// Borrowed view of one span, yielded by [`SpanList::iter`].
#[derive(Debug, Clone, Copy)]
pub struct SpanRef<'a, M: MaskDepth> {
    pub x0: i32,
    pub x1: i32,
    kind: SpanKind,
    mask: MaskRef<'a>,
    data: Option<&'a [u8]>,
    _depth: PhantomData<M>,
}

impl<'a, M: MaskDepth> SpanRef<'a, M> {
    #[inline]
    pub fn len(&self) -> usize {
        (self.x1 - self.x0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false // x0 < x1 is a construction invariant
    }

    #[inline]
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.kind.is_const()
    }

    #[inline]
    pub fn is_variant(&self) -> bool {
        self.kind.is_variant()
    }

    /// Constant coverage value. Never call on a variant span.
    #[inline]
    pub fn const_mask(&self) -> u32 {
        assert!(self.kind.is_const(), "const_mask() on a variant span");
        match self.mask {
            MaskRef::Const(m) => m,
            MaskRef::Bytes(_) => unreachable!(),
        }
    }

    /// Whether this constant span is fully opaque.
    #[inline]
    pub fn is_const_mask_opaque(&self) -> bool {
        self.const_mask() == M::CMASK_FULL
    }

    /// The raw variant mask bytes. Never call on a constant span.
    #[inline]
    pub fn variant_mask(&self) -> &'a [u8] {
        assert!(self.kind.is_variant(), "variant_mask() on a const span");
        match self.mask {
            MaskRef::Bytes(b) => b,
            MaskRef::Const(_) => unreachable!(),
        }
    }

    /// Alpha-glyph mask bytes (one cover byte per pixel).
    #[inline]
    pub fn a8_mask(&self) -> &'a [u8] {
        assert!(
            matches!(self.kind, SpanKind::A8Glyph | SpanKind::AxGlyph),
            "a8_mask() on a {:?} span",
            self.kind
        );
        self.variant_mask()
    }

    /// The generic mask slot, without a kind assertion.
    #[inline]
    pub fn generic_mask(&self) -> MaskRef<'a> {
        self.mask
    }

    /// Cached fetched-pixel data, when the span was built extended.
    #[inline]
    pub fn data(&self) -> Option<&'a [u8]> {
        self.data
    }
}

// ============================================================================
// SpanList — per-scanline arena and list builder
// ============================================================================

/// One scanline's span list plus the arenas backing it.
///
/// The builder enforces the list invariants at insertion time:
/// `0 <= x0 < x1`, ascending non-overlapping order, and a mask slice of
/// exactly `mask_advance(kind, x1 - x0)` bytes for variant spans.
/// Violations are programmer errors and panic.
pub struct SpanList<M: MaskDepth> {
    spans: Vec<Span>,
    mask_bytes: Vec<u8>,
    data_bytes: Vec<u8>,
    head: u32,
    tail: u32,
    last_x1: i32,
    _depth: PhantomData<M>,
}

/// Span list for 8-bit-channel rendering.
pub type SpanList8 = SpanList<Mask8>;
/// Span list for 16-bit-channel rendering.
pub type SpanList16 = SpanList<Mask16>;

impl<M: MaskDepth> SpanList<M> {
    pub fn new() -> Self {
        Self {
            spans: Vec::new(),
            mask_bytes: Vec::new(),
            data_bytes: Vec::new(),
            head: SPAN_NIL,
            tail: SPAN_NIL,
            last_x1: 0,
            _depth: PhantomData,
        }
    }

    /// Number of spans in the list.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Recycle the arenas for the next scanline pass. Capacity is kept.
    pub fn clear(&mut self) {
        self.spans.clear();
        self.mask_bytes.clear();
        self.data_bytes.clear();
        self.head = SPAN_NIL;
        self.tail = SPAN_NIL;
        self.last_x1 = 0;
    }

    /// Append a constant-coverage span.
    pub fn add_const(&mut self, x0: i32, x1: i32, cover: u32) {
        assert!(cover <= M::CMASK_FULL, "const mask {cover:#x} out of range");
        self.push(x0, x1, SpanKind::Const, SpanMask::Const(cover), SPAN_NIL);
    }

    /// Append a variant-mask span; `mask` must hold exactly
    /// `mask_advance(kind, x1 - x0)` bytes and is copied into the arena.
    pub fn add_variant(&mut self, x0: i32, x1: i32, kind: SpanKind, mask: &[u8]) {
        self.add_variant_inner(x0, x1, kind, mask, SPAN_NIL);
    }

    /// Append an extended variant-mask span that additionally carries
    /// fetched pixel data (`data` is copied into the data arena).
    pub fn add_variant_with_data(
        &mut self,
        x0: i32,
        x1: i32,
        kind: SpanKind,
        mask: &[u8],
        data: &[u8],
    ) {
        let width = (x1 - x0).max(0) as usize;
        assert_eq!(data.len(), width * 4, "fetched data must be 4 bytes per pixel");
        let offset = self.data_bytes.len() as u32;
        self.data_bytes.extend_from_slice(data);
        self.add_variant_inner(x0, x1, kind, mask, offset);
    }

    fn add_variant_inner(&mut self, x0: i32, x1: i32, kind: SpanKind, mask: &[u8], data: u32) {
        assert!(kind.is_variant(), "add_variant with const kind");
        let width = (x1 - x0).max(0) as usize;
        assert_eq!(
            mask.len(),
            mask_advance::<M>(kind, width),
            "mask length does not match mask_advance({kind:?}, {width})"
        );
        let offset = self.mask_bytes.len() as u32;
        self.mask_bytes.extend_from_slice(mask);
        self.push(x0, x1, kind, SpanMask::Variant { offset }, data);
    }

    fn push(&mut self, x0: i32, x1: i32, kind: SpanKind, mask: SpanMask, data: u32) {
        assert!(x0 >= 0, "span x0 {x0} < 0");
        assert!(x1 >= 0, "span x1 {x1} < 0");
        assert!(x0 < x1, "span x0 {x0} >= x1 {x1}");
        assert!(
            self.spans.is_empty() || x0 >= self.last_x1,
            "span [{x0},{x1}) overlaps or precedes previous end {}",
            self.last_x1
        );

        let idx = self.spans.len() as u32;
        self.spans.push(Span {
            x0,
            x1,
            kind,
            mask,
            data,
            next: SPAN_NIL,
        });

        if self.head == SPAN_NIL {
            self.head = idx;
        } else {
            self.spans[self.tail as usize].next = idx;
        }
        self.tail = idx;
        self.last_x1 = x1;
    }

    /// Walk the list in x-ascending order.
    pub fn iter(&self) -> SpanIter<'_, M> {
        SpanIter {
            list: self,
            cursor: self.head,
        }
    }
}

impl<M: MaskDepth> Default for SpanList<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward iterator over a span list.
pub struct SpanIter<'a, M: MaskDepth> {
    list: &'a SpanList<M>,
    cursor: u32,
}

impl<'a, M: MaskDepth> Iterator for SpanIter<'a, M> {
    type Item = SpanRef<'a, M>;

    fn next(&mut self) -> Option<SpanRef<'a, M>> {
        if self.cursor == SPAN_NIL {
            return None;
        }
        let span = &self.list.spans[self.cursor as usize];
        self.cursor = span.next;

        let width = (span.x1 - span.x0) as usize;
        let mask = match span.mask {
            SpanMask::Const(m) => MaskRef::Const(m),
            SpanMask::Variant { offset } => {
                let len = mask_advance::<M>(span.kind, width);
                MaskRef::Bytes(&self.list.mask_bytes[offset as usize..offset as usize + len])
            }
        };
        let data = if span.data == SPAN_NIL {
            None
        } else {
            // Extended spans cache fetched pixels at 4 bytes each.
            let len = width * 4;
            Some(&self.list.data_bytes[span.data as usize..span.data as usize + len])
        };

        Some(SpanRef {
            x0: span.x0,
            x1: span.x1,
            kind: span.kind,
            mask,
            data,
            _depth: PhantomData,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
