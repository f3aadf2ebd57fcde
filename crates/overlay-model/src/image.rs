//! Subtitle images produced by a rasterizer.
//!
//! A [`SubtitleImage`] is either an owned RGBA pixel buffer or an opaque
//! GPU texture id. Images are shared between the cache and in-flight frames
//! as [`SharedImage`]; the image is released when the last reference drops,
//! which is the only place its release hook runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use subsync_common::error::{SubsyncError, SubsyncResult};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a subtitle image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ImageId(u64);

impl ImageId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img#{}", self.0)
    }
}

/// Byte layout of a pixel-buffer image. All formats are 4 bytes per pixel,
/// row-major, tightly packed, in R, G, B, A order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Premultiplied alpha.
    #[default]
    Rgba8Premul,
    /// Straight (non-premultiplied) alpha.
    Rgba8,
    /// No alpha channel; the fourth byte is ignored.
    Rgbx8,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Whether the format carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        !matches!(self, Self::Rgbx8)
    }

    /// Read one pixel as premultiplied RGBA.
    pub fn to_premul(self, px: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Rgba8Premul => px,
            Self::Rgba8 => {
                let a = u16::from(px[3]);
                [
                    mul_div255(u16::from(px[0]), a),
                    mul_div255(u16::from(px[1]), a),
                    mul_div255(u16::from(px[2]), a),
                    px[3],
                ]
            }
            Self::Rgbx8 => [px[0], px[1], px[2], 255],
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Opaque texture name owned by an external render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// Backing storage of a subtitle image.
#[derive(Debug)]
pub enum ImageSurface {
    /// CPU pixel buffer.
    Pixels { format: PixelFormat, data: Vec<u8> },
    /// Texture living in a GPU render context.
    Texture(TextureId),
}

/// Callback run once when an image is released.
pub type ReleaseHook = Box<dyn FnOnce(ImageId) + Send + Sync>;

/// A rasterized subtitle frame.
pub struct SubtitleImage {
    id: ImageId,
    width: u32,
    height: u32,
    surface: ImageSurface,
    release_hook: Option<ReleaseHook>,
}

/// Shared ownership of an image between the cache and in-flight frames.
pub type SharedImage = Arc<SubtitleImage>;

impl SubtitleImage {
    /// Wrap a tightly packed pixel buffer.
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> SubsyncResult<Self> {
        check_size(width, height)?;
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(PixelFormat::BYTES_PER_PIXEL);
        if data.len() != expected {
            return Err(SubsyncError::image(format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            id: ImageId::next(),
            width,
            height,
            surface: ImageSurface::Pixels { format, data },
            release_hook: None,
        })
    }

    /// A fully transparent premultiplied image.
    pub fn transparent(width: u32, height: u32) -> SubsyncResult<Self> {
        check_size(width, height)?;
        let len = (width as usize) * (height as usize) * PixelFormat::BYTES_PER_PIXEL;
        Self::from_pixels(width, height, PixelFormat::Rgba8Premul, vec![0; len])
    }

    /// Wrap a texture already resident in a render context.
    pub fn from_texture(width: u32, height: u32, texture: TextureId) -> SubsyncResult<Self> {
        check_size(width, height)?;
        Ok(Self {
            id: ImageId::next(),
            width,
            height,
            surface: ImageSurface::Texture(texture),
            release_hook: None,
        })
    }

    /// Attach a hook run exactly once when the image is released.
    pub fn with_release_hook(mut self, hook: impl FnOnce(ImageId) + Send + Sync + 'static) -> Self {
        self.release_hook = Some(Box::new(hook));
        self
    }

    /// Move into shared ownership.
    pub fn into_shared(self) -> SharedImage {
        Arc::new(self)
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn surface(&self) -> &ImageSurface {
        &self.surface
    }

    /// Whether the image carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        match &self.surface {
            ImageSurface::Pixels { format, .. } => format.has_alpha(),
            ImageSurface::Texture(_) => true,
        }
    }

    /// Pixel format, for CPU images.
    pub fn format(&self) -> Option<PixelFormat> {
        match &self.surface {
            ImageSurface::Pixels { format, .. } => Some(*format),
            ImageSurface::Texture(_) => None,
        }
    }

    /// Raw pixel bytes, for CPU images.
    pub fn pixels(&self) -> Option<&[u8]> {
        match &self.surface {
            ImageSurface::Pixels { data, .. } => Some(data),
            ImageSurface::Texture(_) => None,
        }
    }

    /// Texture name, for GPU images.
    pub fn texture(&self) -> Option<TextureId> {
        match &self.surface {
            ImageSurface::Texture(tex) => Some(*tex),
            ImageSurface::Pixels { .. } => None,
        }
    }

    /// Premultiplied RGBA value at `(x, y)`, for CPU images.
    pub fn pixel_premul(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let ImageSurface::Pixels { format, data } = &self.surface else {
            return None;
        };
        let i = ((y as usize) * (self.width as usize) + x as usize) * PixelFormat::BYTES_PER_PIXEL;
        let px = [data[i], data[i + 1], data[i + 2], data[i + 3]];
        Some(format.to_premul(px))
    }
}

fn check_size(width: u32, height: u32) -> SubsyncResult<()> {
    if width == 0 || height == 0 {
        return Err(SubsyncError::invalid_dimensions(width as i64, height as i64));
    }
    Ok(())
}

impl fmt::Debug for SubtitleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SubtitleImage");
        s.field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height);
        match &self.surface {
            ImageSurface::Pixels { format, data } => {
                s.field("format", format).field("bytes", &data.len());
            }
            ImageSurface::Texture(tex) => {
                s.field("texture", tex);
            }
        }
        s.field("release_hook", &self.release_hook.is_some())
            .finish()
    }
}

impl Drop for SubtitleImage {
    fn drop(&mut self) {
        if let Some(hook) = self.release_hook.take() {
            hook(self.id);
        }
    }
}
