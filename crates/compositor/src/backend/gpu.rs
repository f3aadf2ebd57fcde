//! GPU texture backend.
//!
//! Texture work goes through an external [`RenderContext`] whose lifetime
//! follows the drawing surface: it is initialized when the surface is
//! created and uninitialized when the surface is destroyed. Outside that
//! window every texture operation is refused with
//! [`SubsyncError::ContextInactive`].
//!
//! Each surface lifetime is an *epoch*. A texture belongs to the epoch it
//! was uploaded in; once the surface is destroyed, textures of that epoch
//! are dead and are never handed out or deleted again.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use subsync_common::config::BackendKind;
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::image::{ImageId, SharedImage, SubtitleImage, TextureId};
use subsync_overlay_model::placement::Placement;

use super::{BackendAdapter, Renderable};

/// Handle returned by [`RenderContext::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// External render context (GL, Vulkan, a compositor API, ...).
pub trait RenderContext: Send {
    /// Create the context for a new surface.
    fn initialize(&mut self) -> SubsyncResult<ContextHandle>;

    /// Upload a CPU image and return the new texture.
    fn upload(&mut self, handle: ContextHandle, image: &SubtitleImage) -> SubsyncResult<TextureId>;

    /// Free a texture created by [`upload`](Self::upload).
    fn delete_texture(&mut self, handle: ContextHandle, texture: TextureId);

    /// Destroy the context. Its textures die with it.
    fn uninitialize(&mut self, handle: ContextHandle);

    fn name(&self) -> &str {
        "render-context"
    }
}

struct SurfaceState {
    context: Box<dyn RenderContext>,
    handle: Option<ContextHandle>,
    epoch: u64,
}

/// Drawing-surface lifecycle shared by every GPU backend built for it.
///
/// Clones refer to the same surface.
#[derive(Clone)]
pub struct GpuSurface {
    inner: Arc<Mutex<SurfaceState>>,
}

impl GpuSurface {
    pub fn new(context: impl RenderContext + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SurfaceState {
                context: Box::new(context),
                handle: None,
                epoch: 0,
            })),
        }
    }

    /// Surface created: initialize the render context. Repeated calls while
    /// active do nothing.
    pub fn on_surface_created(&self) -> SubsyncResult<()> {
        let mut state = self.inner.lock();
        if state.handle.is_some() {
            tracing::debug!("Surface already active");
            return Ok(());
        }
        let handle = state.context.initialize()?;
        state.handle = Some(handle);
        state.epoch += 1;
        tracing::info!(
            context = %state.context.name(),
            handle = handle.0,
            epoch = state.epoch,
            "Render context initialized"
        );
        Ok(())
    }

    /// Surface destroyed: uninitialize the render context. Safe to call
    /// repeatedly.
    pub fn on_surface_destroyed(&self) {
        let mut state = self.inner.lock();
        if let Some(handle) = state.handle.take() {
            state.context.uninitialize(handle);
            tracing::info!(
                context = %state.context.name(),
                handle = handle.0,
                epoch = state.epoch,
                "Render context uninitialized"
            );
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().handle.is_some()
    }

    /// Current surface lifetime counter; bumps on every create.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    fn upload(&self, image: &SharedImage) -> SubsyncResult<GpuTexture> {
        let mut state = self.inner.lock();
        let Some(handle) = state.handle else {
            return Err(SubsyncError::context_inactive("upload"));
        };
        let id = state.context.upload(handle, image)?;
        tracing::debug!(
            image = %image.id(),
            texture = id.0,
            epoch = state.epoch,
            "Texture uploaded"
        );
        Ok(GpuTexture {
            id,
            width: image.width(),
            height: image.height(),
            image: image.id(),
            epoch: state.epoch,
            owner: Some(self.clone()),
            source: None,
        })
    }

    fn delete_texture(&self, texture: TextureId, epoch: u64) {
        let mut state = self.inner.lock();
        let Some(handle) = state.handle else {
            return;
        };
        if state.epoch == epoch {
            state.context.delete_texture(handle, texture);
            tracing::trace!(texture = texture.0, epoch, "Texture deleted");
        }
    }
}

impl fmt::Debug for GpuSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("GpuSurface")
            .field("context", &state.context.name())
            .field("handle", &state.handle)
            .field("epoch", &state.epoch)
            .finish()
    }
}

/// A texture presented by the GPU backend.
///
/// Textures uploaded by the backend are deleted when the last reference
/// drops, unless their surface epoch has already ended.
pub struct GpuTexture {
    id: TextureId,
    width: u32,
    height: u32,
    image: ImageId,
    epoch: u64,
    owner: Option<GpuSurface>,
    /// Keeps a rasterizer-provided texture image alive while presented.
    source: Option<SharedImage>,
}

impl GpuTexture {
    fn external(image: &SharedImage, id: TextureId, epoch: u64) -> Self {
        Self {
            id,
            width: image.width(),
            height: image.height(),
            image: image.id(),
            epoch,
            owner: None,
            source: Some(image.clone()),
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Subtitle image the texture shows.
    pub fn image(&self) -> ImageId {
        self.image
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTexture")
            .field("id", &self.id)
            .field("image", &self.image)
            .field("epoch", &self.epoch)
            .field("owned", &self.owner.is_some())
            .field("external", &self.source.is_some())
            .finish()
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        if let Some(surface) = &self.owner {
            surface.delete_texture(self.id, self.epoch);
        }
    }
}

/// Presents the subtitle image as a texture in the surface's render context.
#[derive(Debug)]
pub struct GpuBackend {
    surface: GpuSurface,
    placement: Placement,
    current: Option<Arc<GpuTexture>>,
}

impl GpuBackend {
    pub fn new(surface: GpuSurface, placement: Placement) -> Self {
        Self {
            surface,
            placement,
            current: None,
        }
    }

    pub fn surface(&self) -> &GpuSurface {
        &self.surface
    }
}

impl BackendAdapter for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn update(&mut self, image: Option<&SharedImage>) -> SubsyncResult<()> {
        let Some(image) = image else {
            self.current = None;
            return Ok(());
        };

        let epoch = self.surface.epoch();
        if let Some(current) = &self.current {
            if current.image() == image.id() && current.epoch() == epoch && self.surface.is_active()
            {
                return Ok(());
            }
        }

        let texture = match image.texture() {
            Some(id) if self.surface.is_active() => Ok(GpuTexture::external(image, id, epoch)),
            Some(_) => Err(SubsyncError::context_inactive("present")),
            None => self.surface.upload(image),
        };
        // On failure the old texture shows a superseded image; drop it too.
        match texture {
            Ok(texture) => {
                self.current = Some(Arc::new(texture));
                Ok(())
            }
            Err(e) => {
                self.current = None;
                Err(e)
            }
        }
    }

    fn current_renderable(&self) -> SubsyncResult<Option<Renderable>> {
        if !self.surface.is_active() {
            return Err(SubsyncError::context_inactive("current_renderable"));
        }
        let epoch = self.surface.epoch();
        Ok(self
            .current
            .as_ref()
            .filter(|texture| texture.epoch() == epoch)
            .map(|texture| Renderable::Texture(texture.clone())))
    }

    fn placement(&self) -> Placement {
        self.placement
    }

    fn release(&mut self) {
        self.current = None;
    }
}
