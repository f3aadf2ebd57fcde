//! Render context without a GPU.
//!
//! Hands out texture ids and tracks which ones are alive so a simulation
//! can check that every uploaded texture was deleted or died with its
//! context.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_compositor::{ContextHandle, RenderContext};
use subsync_overlay_model::image::{SubtitleImage, TextureId};

/// Counters reported after a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeadlessStats {
    pub contexts: u64,
    pub uploads: u64,
    pub uploaded_bytes: u64,
    pub deletes: u64,
    /// Textures still alive when their context was uninitialized.
    pub lost_with_context: u64,
    /// Textures alive right now.
    pub live: u64,
}

#[derive(Default)]
struct Inner {
    next_handle: u64,
    next_texture: u32,
    live: HashSet<(ContextHandle, TextureId)>,
    stats: HeadlessStats,
}

/// Clones share state.
#[derive(Clone, Default)]
pub struct HeadlessContext {
    inner: Arc<Mutex<Inner>>,
}

impl HeadlessContext {
    pub fn stats(&self) -> HeadlessStats {
        let inner = self.inner.lock();
        HeadlessStats {
            live: inner.live.len() as u64,
            ..inner.stats
        }
    }
}

impl RenderContext for HeadlessContext {
    fn initialize(&mut self) -> SubsyncResult<ContextHandle> {
        let mut inner = self.inner.lock();
        inner.next_handle += 1;
        inner.stats.contexts += 1;
        Ok(ContextHandle(inner.next_handle))
    }

    fn upload(&mut self, handle: ContextHandle, image: &SubtitleImage) -> SubsyncResult<TextureId> {
        let Some(pixels) = image.pixels() else {
            return Err(SubsyncError::backend(format!(
                "image {} has no pixels to upload",
                image.id()
            )));
        };
        let mut inner = self.inner.lock();
        inner.next_texture += 1;
        let texture = TextureId(inner.next_texture);
        inner.live.insert((handle, texture));
        inner.stats.uploads += 1;
        inner.stats.uploaded_bytes += pixels.len() as u64;
        Ok(texture)
    }

    fn delete_texture(&mut self, handle: ContextHandle, texture: TextureId) {
        let mut inner = self.inner.lock();
        if inner.live.remove(&(handle, texture)) {
            inner.stats.deletes += 1;
        } else {
            tracing::warn!(handle = handle.0, texture = texture.0, "Unknown texture deleted");
        }
    }

    fn uninitialize(&mut self, handle: ContextHandle) {
        let mut inner = self.inner.lock();
        let before = inner.live.len();
        inner.live.retain(|(h, _)| *h != handle);
        let lost = (before - inner.live.len()) as u64;
        inner.stats.lost_with_context += lost;
    }

    fn name(&self) -> &str {
        "headless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_live_textures() {
        let mut context = HeadlessContext::default();
        let handle = context.initialize().unwrap();
        let image = SubtitleImage::transparent(2, 2).unwrap();

        let a = context.upload(handle, &image).unwrap();
        let _b = context.upload(handle, &image).unwrap();
        context.delete_texture(handle, a);
        context.uninitialize(handle);

        let stats = context.stats();
        assert_eq!(stats.uploads, 2);
        assert_eq!(stats.uploaded_bytes, 32);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.lost_with_context, 1);
        assert_eq!(stats.live, 0);
    }

    #[test]
    fn test_texture_images_cannot_be_uploaded() {
        let mut context = HeadlessContext::default();
        let handle = context.initialize().unwrap();
        let image = SubtitleImage::from_texture(2, 2, TextureId(9)).unwrap();
        assert!(context.upload(handle, &image).is_err());
    }
}
