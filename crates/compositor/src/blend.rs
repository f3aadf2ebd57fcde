//! CPU compositing of a subtitle image onto a decoded video frame.

use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::image::{PixelFormat, SubtitleImage};
use subsync_overlay_model::placement::{DestRect, Placement};

pub type PremulRgba8 = [u8; 4];

/// A mutable view of a decoded frame in premultiplied RGBA8.
#[derive(Debug)]
pub struct FrameSurface<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a mut [u8],
}

impl<'a> FrameSurface<'a> {
    /// Wrap a tightly packed frame.
    pub fn new(width: u32, height: u32, data: &'a mut [u8]) -> SubsyncResult<Self> {
        Self::with_stride(width, height, width as usize * PixelFormat::BYTES_PER_PIXEL, data)
    }

    /// Wrap a frame whose rows are `stride` bytes apart.
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: usize,
        data: &'a mut [u8],
    ) -> SubsyncResult<Self> {
        if width == 0 || height == 0 {
            return Err(SubsyncError::invalid_dimensions(width as i64, height as i64));
        }
        let row = width as usize * PixelFormat::BYTES_PER_PIXEL;
        if stride < row {
            return Err(SubsyncError::image(format!(
                "frame stride {stride} is smaller than a {width}px row"
            )));
        }
        let needed = stride * (height as usize - 1) + row;
        if data.len() < needed {
            return Err(SubsyncError::image(format!(
                "{width}x{height} frame needs {needed} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<PremulRgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride + x as usize * PixelFormat::BYTES_PER_PIXEL;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let i = y as usize * self.stride + x as usize * PixelFormat::BYTES_PER_PIXEL;
        &mut self.data[i..i + 4]
    }
}

/// Source-over of premultiplied `src` onto `dst`, scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Draw `image` onto `frame` at `placement`, scaling with nearest-neighbour
/// sampling and blending with the placement alpha.
///
/// Returns the frame rectangle that was touched, or `None` when nothing was
/// drawn (fully transparent or entirely off-frame).
pub fn composite_overlay(
    frame: &mut FrameSurface<'_>,
    image: &SubtitleImage,
    placement: &Placement,
) -> SubsyncResult<Option<DestRect>> {
    if image.pixels().is_none() {
        return Err(SubsyncError::unsupported(
            "texture images cannot be composited on the CPU",
        ));
    }
    if placement.alpha <= 0.0 {
        return Ok(None);
    }

    let rect = placement.dest_rect(frame.width(), frame.height());
    let Some(visible) = rect.clip_to(frame.width(), frame.height()) else {
        return Ok(None);
    };

    let iw = image.width() as i64;
    let ih = image.height() as i64;
    let rw = rect.width as i64;
    let rh = rect.height as i64;

    for fy in visible.y..visible.bottom() {
        let sy = ((fy - rect.y) * ih / rh).clamp(0, ih - 1) as u32;
        for fx in visible.x..visible.right() {
            let sx = ((fx - rect.x) * iw / rw).clamp(0, iw - 1) as u32;
            let Some(src) = image.pixel_premul(sx, sy) else {
                continue;
            };
            if src[3] == 0 {
                continue;
            }
            let px = frame.pixel_mut(fx as u32, fy as u32);
            let out = over([px[0], px[1], px[2], px[3]], src, placement.alpha);
            px.copy_from_slice(&out);
        }
    }

    Ok(Some(visible))
}
