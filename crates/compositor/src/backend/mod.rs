//! Presentation backends.
//!
//! A pipeline presents its subtitle image through exactly one backend,
//! chosen when the pipeline is built:
//! - [`CpuBackend`]: the renderable is the pixel buffer itself; the host
//!   blends it onto the decoded frame.
//! - [`GpuBackend`]: the image is uploaded into an external render context
//!   and the renderable is a texture handle the host binds and draws.

use std::sync::Arc;

use subsync_common::config::BackendKind;
use subsync_common::error::SubsyncResult;
use subsync_overlay_model::image::{ImageId, SharedImage, TextureId};
use subsync_overlay_model::placement::Placement;

pub mod cpu;
pub mod gpu;

pub use cpu::CpuBackend;
pub use gpu::{ContextHandle, GpuBackend, GpuSurface, GpuTexture, RenderContext};

/// What the host draws for the current frame.
#[derive(Debug, Clone)]
pub enum Renderable {
    /// CPU pixel buffer.
    Bitmap(SharedImage),
    /// Texture in the render context. The texture stays alive while any
    /// clone of this value does.
    Texture(Arc<GpuTexture>),
}

impl Renderable {
    /// Id of the subtitle image this renderable was produced from.
    pub fn image_id(&self) -> ImageId {
        match self {
            Self::Bitmap(image) => image.id(),
            Self::Texture(texture) => texture.image(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Bitmap(image) => (image.width(), image.height()),
            Self::Texture(texture) => (texture.width(), texture.height()),
        }
    }

    pub fn texture_id(&self) -> Option<TextureId> {
        match self {
            Self::Bitmap(_) => None,
            Self::Texture(texture) => Some(texture.id()),
        }
    }
}

/// Capability interface the compositor uses to present a subtitle image.
pub trait BackendAdapter: Send {
    /// Which presentation path this is.
    fn kind(&self) -> BackendKind;

    /// Feed the latest cache output. `None` means there is no image.
    fn update(&mut self, image: Option<&SharedImage>) -> SubsyncResult<()>;

    /// What to draw right now, if anything.
    fn current_renderable(&self) -> SubsyncResult<Option<Renderable>>;

    /// Where to draw it.
    fn placement(&self) -> Placement;

    /// Drop every presentation resource. Safe to call repeatedly.
    fn release(&mut self);
}

/// Recipe for the backend of each new pipeline.
#[derive(Debug, Clone, Default)]
pub enum BackendSpec {
    #[default]
    Cpu,
    Gpu(GpuSurface),
}

impl BackendSpec {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Cpu => BackendKind::Cpu,
            Self::Gpu(_) => BackendKind::Gpu,
        }
    }

    /// Build a fresh backend bound to `placement`.
    pub fn build(&self, placement: Placement) -> Box<dyn BackendAdapter> {
        match self {
            Self::Cpu => Box::new(CpuBackend::new(placement)),
            Self::Gpu(surface) => Box::new(GpuBackend::new(surface.clone(), placement)),
        }
    }
}
