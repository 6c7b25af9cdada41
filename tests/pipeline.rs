//! End-to-end pipeline tests: span lists through pattern contexts and
//! the dispatch matrix into destination surfaces.

use std::sync::Arc;
use std::thread;

use spanline::basics::CMASK_8_FULL;
use spanline::span::SpanList8;
use spanline::{
    composite_parallel, Argb, CompositeOp, Compositor, GradientSpread, GradientStop, ImageBuf,
    PatternContext, PixelFormat, Prgb32, RenderingBuffer, Solid, SpanKind, SpanSource,
    TextureExtend, TextureFilter, TransAffine,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn black_surface(w: u32, h: u32) -> RenderingBuffer {
    let mut buf = RenderingBuffer::new(w, h, PixelFormat::Prgb32);
    buf.fill_pixel(&0xFF00_0000u32.to_le_bytes());
    buf
}

#[test]
fn solid_const_span_over_black() {
    init_logging();
    let mut buf = black_surface(32, 1);
    let mut spans = SpanList8::new();
    spans.add_const(10, 20, CMASK_8_FULL);

    let red = SpanSource::Solid(Solid::new(Argb::rgb(255, 0, 0)));
    let mut c = Compositor::new(PixelFormat::Prgb32, CompositeOp::SrcOver);
    c.composite_row(buf.row_mut(0), 0, &red, &spans);

    for x in 0..32 {
        let want = if (10..20).contains(&x) { 0xFFFF_0000 } else { 0xFF00_0000 };
        assert_eq!(buf.pixel_u32(x, 0), want, "x={x}");
    }
}

#[test]
fn variant_ramp_white_over_black() {
    init_logging();
    let mut buf = black_surface(5, 1);
    let mut spans = SpanList8::new();
    spans.add_variant(0, 5, SpanKind::A8Glyph, &[0, 64, 128, 192, 255]);

    let white = SpanSource::Solid(Solid::new(Argb::rgb(255, 255, 255)));
    let mut c = Compositor::new(PixelFormat::Prgb32, CompositeOp::SrcOver);
    c.composite_row(buf.row_mut(0), 0, &white, &spans);

    let mut prev = 0;
    for x in 0..5 {
        let px = buf.pixel_u32(x, 0);
        let (r, g, b) = ((px >> 16) & 0xFF, (px >> 8) & 0xFF, px & 0xFF);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r >= prev, "not monotonic at x={x}");
        prev = r;
    }
    assert_eq!(buf.pixel_u32(0, 0), 0xFF00_0000);
    assert_eq!(buf.pixel_u32(4, 0), 0xFFFF_FFFF);
}

#[test]
fn gradient_fill_full_surface() {
    init_logging();
    let stops = [
        GradientStop::new(0.0, Argb::rgb(255, 0, 0)),
        GradientStop::new(0.5, Argb::rgb(0, 255, 0)),
        GradientStop::new(1.0, Argb::rgb(0, 0, 255)),
    ];
    let pattern = PatternContext::init_linear(
        &stops,
        GradientSpread::Pad,
        0.0,
        0.0,
        128.0,
        0.0,
        &TransAffine::new(),
    )
    .unwrap();

    let mut buf = black_surface(128, 8);
    let rows: Vec<SpanList8> = (0..8)
        .map(|_| {
            let mut l = SpanList8::new();
            l.add_const(0, 128, CMASK_8_FULL);
            l
        })
        .collect();

    let mut c = Compositor::new(PixelFormat::Prgb32, CompositeOp::Src);
    c.composite(&mut buf, &SpanSource::Pattern(pattern), &rows);

    // Red dominates the left edge, blue the right, green the middle.
    let left = buf.pixel_u32(2, 4);
    let mid = buf.pixel_u32(64, 4);
    let right = buf.pixel_u32(126, 4);
    assert!((left >> 16) & 0xFF > 200, "left {left:08x}");
    assert!((mid >> 8) & 0xFF > 200, "mid {mid:08x}");
    assert!(right & 0xFF > 200, "right {right:08x}");
    // Rows are identical for a horizontal gradient.
    assert_eq!(buf.pixel_u32(30, 0), buf.pixel_u32(30, 7));
}

#[test]
fn texture_tile_src_over() {
    init_logging();
    let image = Arc::new(ImageBuf::new(
        2,
        2,
        vec![
            Argb::rgb(255, 0, 0).premultiply(),
            Argb::rgb(0, 255, 0).premultiply(),
            Argb::rgb(0, 0, 255).premultiply(),
            Argb::rgb(255, 255, 255).premultiply(),
        ],
    ));
    let pattern = PatternContext::init_texture(
        Arc::clone(&image),
        TextureExtend::Repeat,
        TextureFilter::Nearest,
        &TransAffine::new(),
    )
    .unwrap();

    let mut buf = black_surface(8, 4);
    let rows: Vec<SpanList8> = (0..4)
        .map(|_| {
            let mut l = SpanList8::new();
            l.add_const(0, 8, CMASK_8_FULL);
            l
        })
        .collect();

    let mut c = Compositor::new(PixelFormat::Prgb32, CompositeOp::SrcOver);
    c.composite(&mut buf, &SpanSource::Pattern(pattern), &rows);

    assert_eq!(buf.pixel_u32(0, 0), 0xFFFF_0000);
    assert_eq!(buf.pixel_u32(1, 0), 0xFF00_FF00);
    assert_eq!(buf.pixel_u32(0, 1), 0xFF00_00FF);
    assert_eq!(buf.pixel_u32(1, 1), 0xFFFF_FFFF);
    // One tile right and down repeats.
    assert_eq!(buf.pixel_u32(6, 2), buf.pixel_u32(0, 0));
}

#[test]
fn pattern_context_shared_across_threads() {
    init_logging();
    let stops = [
        GradientStop::new(0.0, Argb::rgb(0, 0, 0)),
        GradientStop::new(1.0, Argb::rgb(255, 255, 255)),
    ];
    let pattern = PatternContext::init_linear(
        &stops,
        GradientSpread::Repeat,
        0.0,
        0.0,
        64.0,
        0.0,
        &TransAffine::new(),
    )
    .unwrap();

    // Every thread fetches the same rows through its own handle; results
    // must be identical because fetch reads shared immutable state only.
    let mut reference = vec![Prgb32::ZERO; 64];
    pattern.fetch(&mut reference, 0, 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let p = pattern.acquire();
            let want = reference.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let mut got = vec![Prgb32::ZERO; 64];
                    p.fetch(&mut got, 0, 0);
                    assert_eq!(got, want);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(pattern.ref_count(), 1);
}

#[test]
fn pattern_resources_freed_exactly_once() {
    init_logging();
    let image = Arc::new(ImageBuf::new(
        4,
        4,
        vec![Prgb32(0xFF80_8080); 16],
    ));
    let pattern = PatternContext::init_texture(
        Arc::clone(&image),
        TextureExtend::Repeat,
        TextureFilter::Nearest,
        &TransAffine::new(),
    )
    .unwrap();

    // The context holds one image reference regardless of handle count.
    assert_eq!(Arc::strong_count(&image), 2);
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let p = pattern.acquire();
            thread::spawn(move || {
                let mut dst = vec![Prgb32::ZERO; 8];
                p.fetch(&mut dst, 0, 0);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(Arc::strong_count(&image), 2);
    drop(pattern);
    assert_eq!(Arc::strong_count(&image), 1);
}

#[test]
fn parallel_render_shares_one_context() {
    init_logging();
    let stops = [
        GradientStop::new(0.0, Argb::rgb(255, 128, 0)),
        GradientStop::new(1.0, Argb::rgb(0, 128, 255)),
    ];
    let pattern = PatternContext::init_radial(
        &stops,
        GradientSpread::Pad,
        32.0,
        32.0,
        30.0,
        32.0,
        32.0,
        &TransAffine::new(),
    )
    .unwrap();

    let rows: Vec<SpanList8> = (0..64)
        .map(|_| {
            let mut l = SpanList8::new();
            l.add_const(0, 64, CMASK_8_FULL);
            l
        })
        .collect();

    let mut seq = black_surface(64, 64);
    let mut par = black_surface(64, 64);
    let source = SpanSource::Pattern(pattern.acquire());

    let mut c = Compositor::new(PixelFormat::Prgb32, CompositeOp::SrcOver);
    c.composite(&mut seq, &source, &rows);
    composite_parallel(
        &mut par,
        PixelFormat::Prgb32,
        CompositeOp::SrcOver,
        &source,
        &rows,
    );

    assert_eq!(seq.data(), par.data());
    drop(source);
    assert_eq!(pattern.ref_count(), 1);
}

#[test]
fn operators_agree_on_opaque_over() {
    init_logging();
    // Over an opaque destination, Src and SrcOver agree for an opaque
    // source.
    let mut a = black_surface(8, 1);
    let mut b = black_surface(8, 1);
    let mut spans = SpanList8::new();
    spans.add_const(0, 8, CMASK_8_FULL);
    let teal = SpanSource::Solid(Solid::new(Argb::rgb(0, 128, 128)));

    Compositor::new(PixelFormat::Prgb32, CompositeOp::Src).composite_row(
        a.row_mut(0),
        0,
        &teal,
        &spans,
    );
    Compositor::new(PixelFormat::Prgb32, CompositeOp::SrcOver).composite_row(
        b.row_mut(0),
        0,
        &teal,
        &spans,
    );
    assert_eq!(a.data(), b.data());
}

#[test]
fn dst_out_punches_hole() {
    init_logging();
    let mut buf = black_surface(8, 1);
    let mut spans = SpanList8::new();
    spans.add_const(2, 6, CMASK_8_FULL);
    let opaque = SpanSource::Solid(Solid::new(Argb::rgb(255, 255, 255)));

    let mut c = Compositor::new(PixelFormat::Prgb32, CompositeOp::DstOut);
    c.composite_row(buf.row_mut(0), 0, &opaque, &spans);

    assert_eq!(buf.pixel_u32(0, 0), 0xFF00_0000);
    assert_eq!(buf.pixel_u32(3, 0), 0);
    assert_eq!(buf.pixel_u32(7, 0), 0xFF00_0000);
}
