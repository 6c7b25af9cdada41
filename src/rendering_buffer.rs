//! Rendering buffer — row-oriented access to destination pixel data.
//!
//! Owns the destination bytes and exposes rows as slices. Rows are laid
//! out top-down with a fixed stride, so the whole buffer can also be
//! split into disjoint per-row chunks for band-parallel rendering.

use crate::basics::PixelFormat;

/// Owned rectangular pixel buffer for one destination surface.
pub struct RenderingBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl RenderingBuffer {
    /// Allocate a zeroed buffer of `width * height` pixels.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        assert!(width > 0 && height > 0, "zero-sized rendering buffer");
        let stride = width as usize * format.bpp();
        Self {
            data: vec![0; stride * height as usize],
            width,
            height,
            stride,
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row {y} out of range");
        let off = y as usize * self.stride;
        &self.data[off..off + self.stride]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row {y} out of range");
        let off = y as usize * self.stride;
        &mut self.data[off..off + self.stride]
    }

    /// The raw bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Fill every pixel with the same pixel bytes (`px.len()` must equal
    /// the format's bytes per pixel).
    pub fn fill_pixel(&mut self, px: &[u8]) {
        assert_eq!(px.len(), self.format.bpp());
        for chunk in self.data.chunks_exact_mut(px.len()) {
            chunk.copy_from_slice(px);
        }
    }

    /// Read one pixel as a packed little-endian word (for tests and
    /// pixel probes; not a hot path).
    pub fn pixel_u32(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.width && y < self.height);
        let bpp = self.format.bpp();
        let off = y as usize * self.stride + x as usize * bpp;
        let mut v = 0u32;
        for i in (0..bpp).rev() {
            v = v << 8 | self.data[off + i] as u32;
        }
        v
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_and_stride() {
        let buf = RenderingBuffer::new(10, 4, PixelFormat::Prgb32);
        assert_eq!(buf.stride(), 40);
        assert_eq!(buf.row(0).len(), 40);
        assert_eq!(buf.data().len(), 160);
    }

    #[test]
    fn test_rows_are_disjoint() {
        let mut buf = RenderingBuffer::new(4, 2, PixelFormat::A8);
        buf.row_mut(1).fill(7);
        assert!(buf.row(0).iter().all(|&b| b == 0));
        assert!(buf.row(1).iter().all(|&b| b == 7));
    }

    #[test]
    fn test_fill_and_probe() {
        let mut buf = RenderingBuffer::new(2, 2, PixelFormat::Prgb32);
        buf.fill_pixel(&0xFF00_00FFu32.to_le_bytes());
        assert_eq!(buf.pixel_u32(1, 1), 0xFF00_00FF);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_row_out_of_range() {
        let buf = RenderingBuffer::new(2, 2, PixelFormat::A8);
        buf.row(2);
    }
}
