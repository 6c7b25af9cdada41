//! # spanline
//!
//! Scanline span compositing pipeline: the back half of a 2D raster
//! engine, from coverage spans to blended destination pixels.
//!
//! The pipeline has three cooperating pieces:
//!
//! 1. **Span model** — per-scanline lists of coverage intervals, either
//!    constant-coverage runs or per-pixel masks, built by a rasterizer
//!    and consumed strictly left to right.
//! 2. **Pattern contexts** — instantiated paint sources (solid colors,
//!    textures, scaled images, gradients) that resolve all their
//!    decisions at init time and then fetch pixels immutably, so one
//!    context serves any number of rendering threads.
//! 3. **Function dispatch matrix** — every (compositing operator, pixel
//!    format) pair resolved to concrete blend kernels at startup, with
//!    vectorized kernels patched over the portable ones per detected
//!    CPU feature.
//!
//! The [`compositor`] module ties them together: it walks span lists,
//! fetches pattern pixels span-by-span, and drives the matrix kernels
//! into a [`rendering_buffer::RenderingBuffer`], sequentially or band
//! parallel.

// Phase 1: Foundation Types & Math
pub mod basics;
pub mod color;
pub mod dda_line;
pub mod trans_affine;

// Phase 2: Span Model & Destination Surface
pub mod rendering_buffer;
pub mod span;

// Phase 3: Pattern Contexts
pub mod pattern;
pub mod pattern_gradient;
pub mod pattern_scale;
pub mod pattern_texture;

// Phase 4: Blend Kernels & Dispatch
pub mod function_map;
pub mod raster_ops;

// Phase 5: Compositor
pub mod compositor;

pub use basics::{CompositeOp, PixelFormat};
pub use color::{Argb, Prgb32};
pub use compositor::{composite_parallel, Compositor, SpanSource};
pub use function_map::{get_raster_ops, CpuFeatures, FunctionMap};
pub use pattern::{ImageBuf, PatternContext, PatternError, PatternHandle};
pub use pattern_gradient::{GradientSpread, GradientStop};
pub use pattern_texture::{TextureExtend, TextureFilter};
pub use raster_ops::{Closure, RasterFuncs, Solid};
pub use rendering_buffer::RenderingBuffer;
pub use span::{SpanKind, SpanList16, SpanList8};
pub use trans_affine::TransAffine;
