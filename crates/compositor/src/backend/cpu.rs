//! CPU bitmap backend.

use subsync_common::config::BackendKind;
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::image::SharedImage;
use subsync_overlay_model::placement::Placement;

use super::{BackendAdapter, Renderable};

/// Presents the subtitle pixel buffer directly.
#[derive(Debug)]
pub struct CpuBackend {
    placement: Placement,
    current: Option<SharedImage>,
}

impl CpuBackend {
    pub fn new(placement: Placement) -> Self {
        Self {
            placement,
            current: None,
        }
    }
}

impl BackendAdapter for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn update(&mut self, image: Option<&SharedImage>) -> SubsyncResult<()> {
        match image {
            Some(image) if image.pixels().is_none() => {
                // The previous bitmap has been superseded; never present it again.
                self.current = None;
                Err(SubsyncError::unsupported(format!(
                    "CPU backend cannot present texture image {}",
                    image.id()
                )))
            }
            Some(image) => {
                self.current = Some(image.clone());
                Ok(())
            }
            None => {
                self.current = None;
                Ok(())
            }
        }
    }

    fn current_renderable(&self) -> SubsyncResult<Option<Renderable>> {
        Ok(self.current.clone().map(Renderable::Bitmap))
    }

    fn placement(&self) -> Placement {
        self.placement
    }

    fn release(&mut self) {
        self.current = None;
    }
}
