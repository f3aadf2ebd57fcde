//! One compositing pipeline: dimensions, cache, placement and backend.
//!
//! A [`Pipeline`] is built complete for one [`PipelineConfig`] and never
//! changes its dimensions or placement afterwards. The active pipeline is
//! published through a [`PipelineSlot`]; frame calls clone the `Arc` out
//! of the slot and use that pipeline for the whole frame, so a frame sees
//! either the old pipeline or the new one, never a mix.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use subsync_common::clock::{FrameBudget, TimestampMs};
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::dimensions::PipelineConfig;
use subsync_overlay_model::image::SharedImage;
use subsync_overlay_model::placement::{DestRect, GeometryModel, Placement};

use crate::backend::{BackendAdapter, BackendSpec, Renderable};
use crate::blend::{composite_overlay, FrameSurface};
use crate::cache::{CacheStats, RasterCache};
use crate::raster::RasterizerService;

/// Everything the host needs to draw one frame's subtitle overlay.
///
/// Every field comes from the same pipeline.
#[derive(Debug, Clone)]
pub struct OverlayFrame {
    /// Pipeline that produced this frame.
    pub generation: u64,
    pub config: PipelineConfig,
    pub timestamp_ms: TimestampMs,
    /// Cache output; `None` until the first image arrives.
    pub image: Option<SharedImage>,
    /// What the backend presents; `None` means skip drawing.
    pub renderable: Option<Renderable>,
    pub placement: Placement,
}

impl OverlayFrame {
    pub fn should_draw(&self) -> bool {
        self.renderable.is_some()
    }

    /// Blend a bitmap overlay onto a decoded frame.
    ///
    /// Texture overlays are drawn by the host's render context and are
    /// rejected here.
    pub fn composite_onto(
        &self,
        frame: &mut FrameSurface<'_>,
    ) -> SubsyncResult<Option<DestRect>> {
        match &self.renderable {
            None => Ok(None),
            Some(Renderable::Bitmap(image)) => composite_overlay(frame, image, &self.placement),
            Some(Renderable::Texture(_)) => Err(SubsyncError::unsupported(
                "texture overlays are drawn by the render context",
            )),
        }
    }
}

/// The bound set of dimensions, cache, placement and backend.
pub struct Pipeline {
    generation: u64,
    config: PipelineConfig,
    placement: Placement,
    cache: RasterCache,
    backend: Mutex<Box<dyn BackendAdapter>>,
    torn_down: AtomicBool,
}

impl Pipeline {
    /// Build a complete pipeline for `config`.
    pub fn build(
        generation: u64,
        config: PipelineConfig,
        geometry: &GeometryModel,
        rasterizer: Arc<RasterizerService>,
        budget: FrameBudget,
        backend: &BackendSpec,
    ) -> Self {
        let placement = geometry.placement_for(&config);
        tracing::debug!(
            generation,
            config = %config,
            backend = ?backend.kind(),
            "Pipeline built"
        );
        Self {
            generation,
            config,
            placement,
            cache: RasterCache::new(rasterizer, budget),
            backend: Mutex::new(backend.build(placement)),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Produce the overlay for `timestamp_ms`.
    ///
    /// The backend lock is held for the whole call so that concurrent
    /// renders on one pipeline present images in the order they were
    /// fetched.
    pub fn render(&self, timestamp_ms: TimestampMs) -> OverlayFrame {
        let mut backend = self.backend.lock();
        let image = self
            .cache
            .get(timestamp_ms, self.config.width(), self.config.height());

        // A backend that could not take the cache's image may still hold an
        // older one; the frame must not pair the two.
        let renderable = match backend.update(image.as_ref()) {
            Err(e) => {
                log_backend_error(self.generation, "update", &e);
                None
            }
            Ok(()) => match backend.current_renderable() {
                Ok(renderable) => renderable,
                Err(e) => {
                    log_backend_error(self.generation, "current_renderable", &e);
                    None
                }
            },
        };

        OverlayFrame {
            generation: self.generation,
            config: self.config,
            timestamp_ms,
            image,
            renderable,
            placement: backend.placement(),
        }
    }

    /// Release the cached image and backend resources. Safe to call
    /// repeatedly. Frames still holding images keep them alive until they
    /// drop them.
    pub fn teardown(&self) {
        self.cache.release();
        self.backend.lock().release();
        if !self.torn_down.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                generation = self.generation,
                config = %self.config,
                "Pipeline torn down"
            );
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

fn log_backend_error(generation: u64, operation: &str, error: &SubsyncError) {
    match error {
        SubsyncError::ContextInactive { .. } => {
            tracing::debug!(generation, operation, error = %error, "Backend not presentable");
        }
        _ => {
            tracing::warn!(
                generation,
                operation,
                error = %error,
                "Backend error, skipping overlay"
            );
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("generation", &self.generation)
            .field("config", &self.config)
            .field("placement", &self.placement)
            .field("backend", &self.backend.lock().kind())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

const NO_TIMESTAMP: u64 = u64::MAX;

/// Shared handle to the active pipeline.
///
/// Frame calls read it; reconfiguration replaces its contents with one
/// write. Also remembers the last frame timestamp for pre-warming.
#[derive(Debug)]
pub struct PipelineSlot {
    active: RwLock<Option<Arc<Pipeline>>>,
    last_timestamp_ms: AtomicU64,
}

impl PipelineSlot {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
            last_timestamp_ms: AtomicU64::new(NO_TIMESTAMP),
        }
    }

    /// The active pipeline, if any.
    pub fn load(&self) -> Option<Arc<Pipeline>> {
        self.active.read().clone()
    }

    /// Publish `pipeline`, returning the one it replaced.
    pub fn replace(&self, pipeline: Arc<Pipeline>) -> Option<Arc<Pipeline>> {
        self.active.write().replace(pipeline)
    }

    /// Empty the slot, returning what it held.
    pub fn take(&self) -> Option<Arc<Pipeline>> {
        self.active.write().take()
    }

    pub fn record_timestamp(&self, timestamp_ms: TimestampMs) {
        self.last_timestamp_ms
            .store(timestamp_ms.min(NO_TIMESTAMP - 1), Ordering::Relaxed);
    }

    pub fn last_timestamp(&self) -> Option<TimestampMs> {
        match self.last_timestamp_ms.load(Ordering::Relaxed) {
            NO_TIMESTAMP => None,
            ts => Some(ts),
        }
    }
}

impl Default for PipelineSlot {
    fn default() -> Self {
        Self::new()
    }
}
