//! Flattening of glyph alpha masks into one RGBA subtitle image.
//!
//! libass-style rasterizers emit a list of 8-bit coverage masks, each with
//! a single packed colour. The colour is `0xRRGGBBTT` where `TT` is
//! transparency (`0x00` opaque, `0xFF` invisible). Masks are blended in
//! order, source-over, into a premultiplied canvas.

use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::image::{PixelFormat, SubtitleImage};

/// One coverage mask positioned on the output canvas.
#[derive(Debug, Clone, Copy)]
pub struct GlyphMask<'a> {
    /// Left edge on the canvas; may be negative or past the right edge.
    pub dst_x: i32,
    /// Top edge on the canvas; may be negative or past the bottom edge.
    pub dst_y: i32,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows in `bitmap`.
    pub stride: usize,
    /// Coverage values, 0..=255.
    pub bitmap: &'a [u8],
    /// Packed `0xRRGGBBTT` colour.
    pub color: u32,
}

impl GlyphMask<'_> {
    fn rgba(&self) -> (u32, u32, u32, u32) {
        let r = (self.color >> 24) & 0xff;
        let g = (self.color >> 16) & 0xff;
        let b = (self.color >> 8) & 0xff;
        let a = 0xff - (self.color & 0xff);
        (r, g, b, a)
    }

    fn validate(&self) -> SubsyncResult<()> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        if self.stride < self.width as usize {
            return Err(SubsyncError::image(format!(
                "glyph stride {} is smaller than its width {}",
                self.stride, self.width
            )));
        }
        let needed = self.stride * (self.height as usize - 1) + self.width as usize;
        if self.bitmap.len() < needed {
            return Err(SubsyncError::image(format!(
                "glyph bitmap has {} bytes, needs {needed}",
                self.bitmap.len()
            )));
        }
        Ok(())
    }
}

const FULL: u32 = 255 * 255;

/// Blend `masks` in order onto a transparent `width x height` canvas.
///
/// Mask pixels outside the canvas are skipped.
pub fn flatten_glyphs(
    width: u32,
    height: u32,
    masks: &[GlyphMask<'_>],
) -> SubsyncResult<SubtitleImage> {
    if width == 0 || height == 0 {
        return Err(SubsyncError::invalid_dimensions(width as i64, height as i64));
    }

    let row_bytes = width as usize * PixelFormat::BYTES_PER_PIXEL;
    let mut canvas = vec![0u8; row_bytes * height as usize];

    for mask in masks {
        mask.validate()?;
        let (r, g, b, a) = mask.rgba();
        if a == 0 {
            continue;
        }

        // Visible part of the mask, in mask-local coordinates.
        let x0 = (-(mask.dst_x as i64)).max(0);
        let y0 = (-(mask.dst_y as i64)).max(0);
        let x1 = (mask.width as i64).min(width as i64 - mask.dst_x as i64);
        let y1 = (mask.height as i64).min(height as i64 - mask.dst_y as i64);
        if x1 <= x0 || y1 <= y0 {
            continue;
        }

        for my in y0..y1 {
            let src_row = &mask.bitmap[my as usize * mask.stride..];
            let cy = (mask.dst_y as i64 + my) as usize;
            for mx in x0..x1 {
                let v = u32::from(src_row[mx as usize]);
                if v == 0 {
                    continue;
                }
                let cx = (mask.dst_x as i64 + mx) as usize;
                let i = cy * row_bytes + cx * PixelFormat::BYTES_PER_PIXEL;
                let px = &mut canvas[i..i + 4];

                let aa = a * v;
                let inv = FULL - aa;
                px[0] = ((v * r * a + u32::from(px[0]) * inv) / FULL) as u8;
                px[1] = ((v * g * a + u32::from(px[1]) * inv) / FULL) as u8;
                px[2] = ((v * b * a + u32::from(px[2]) * inv) / FULL) as u8;
                px[3] = ((aa * 255 + u32::from(px[3]) * inv) / FULL) as u8;
            }
        }
    }

    SubtitleImage::from_pixels(width, height, PixelFormat::Rgba8Premul, canvas)
}
