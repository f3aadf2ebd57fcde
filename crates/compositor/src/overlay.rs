//! Host-facing subtitle overlay.
//!
//! [`SubtitleOverlay`] wires the rasterizer service, the active pipeline
//! slot, the frame controller and the reconfiguration manager together.
//! Hosts feed it playback events and per-frame timestamps and get
//! [`OverlayFrame`]s back.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use subsync_common::clock::{FrameBudget, TimestampUs};
use subsync_common::config::{BackendKind, OverlayConfig};
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::dimensions::PipelineConfig;
use subsync_overlay_model::placement::GeometryModel;

use crate::backend::{BackendSpec, GpuSurface};
use crate::cache::CacheStats;
use crate::frame_sync::{FrameSyncController, SyncState};
use crate::pipeline::{OverlayFrame, PipelineSlot};
use crate::raster::{Rasterizer, RasterizerService};
use crate::reconfigure::{ReconfigurationManager, ReconfigureOutcome};

/// Construction options for a [`SubtitleOverlay`].
#[derive(Debug, Clone, Default)]
pub struct OverlayOptions {
    pub backend: BackendSpec,
    pub geometry: GeometryModel,
    pub budget: FrameBudget,
    /// Size of the first pipeline, before the player reports one.
    pub default_dimensions: Option<(u32, u32)>,
}

impl OverlayOptions {
    /// Options from configuration. A GPU backend needs the host's surface.
    pub fn from_config(
        config: &OverlayConfig,
        surface: Option<GpuSurface>,
    ) -> SubsyncResult<Self> {
        let backend = match (config.backend, surface) {
            (BackendKind::Cpu, _) => BackendSpec::Cpu,
            (BackendKind::Gpu, Some(surface)) => BackendSpec::Gpu(surface),
            (BackendKind::Gpu, None) => {
                return Err(SubsyncError::config(
                    "GPU backend selected but no render surface was provided",
                ))
            }
        };
        Ok(Self {
            backend,
            geometry: GeometryModel::from_defaults(&config.placement),
            budget: FrameBudget::from_millis(config.frame_budget_ms),
            default_dimensions: config.default_dimensions,
        })
    }

    pub fn with_backend(mut self, backend: BackendSpec) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_geometry(mut self, geometry: GeometryModel) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_default_dimensions(mut self, width: u32, height: u32) -> Self {
        self.default_dimensions = Some((width, height));
        self
    }
}

/// Player state as reported by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Notifications from the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    VideoSizeChanged { width: i64, height: i64 },
    StateChanged { state: PlaybackState },
}

/// Frame-synchronized subtitle overlay.
#[derive(Debug)]
pub struct SubtitleOverlay {
    rasterizer: Arc<RasterizerService>,
    frame_sync: FrameSyncController,
    reconfigure: ReconfigurationManager,
    slot: Arc<PipelineSlot>,
    playback: Mutex<PlaybackState>,
}

impl SubtitleOverlay {
    /// Create an overlay around `rasterizer`, initializing it.
    pub fn new(
        rasterizer: impl Rasterizer + 'static,
        options: OverlayOptions,
    ) -> SubsyncResult<Self> {
        Self::with_service(Arc::new(RasterizerService::new(rasterizer)), options)
    }

    /// Create an overlay around an existing rasterizer service.
    pub fn with_service(
        rasterizer: Arc<RasterizerService>,
        options: OverlayOptions,
    ) -> SubsyncResult<Self> {
        rasterizer.initialize()?;

        let slot = Arc::new(PipelineSlot::new());
        let reconfigure = ReconfigurationManager::new(
            slot.clone(),
            rasterizer.clone(),
            options.geometry,
            options.backend,
            options.budget,
        );
        if let Some((width, height)) = options.default_dimensions {
            reconfigure.install(PipelineConfig::new(width, height)?);
        }

        Ok(Self {
            rasterizer,
            frame_sync: FrameSyncController::new(slot.clone()),
            reconfigure,
            slot,
            playback: Mutex::new(PlaybackState::default()),
        })
    }

    /// Overlay for the frame presented at `presentation_time_us`; `None`
    /// before the first size is known.
    pub fn on_frame(&self, presentation_time_us: TimestampUs) -> Option<OverlayFrame> {
        self.frame_sync.on_frame(presentation_time_us)
    }

    /// Rebuild for a new video size.
    pub fn on_video_size_changed(
        &self,
        width: i64,
        height: i64,
    ) -> SubsyncResult<ReconfigureOutcome> {
        self.reconfigure.on_dimensions_changed(width, height)
    }

    /// Handle a playback-engine notification. Errors are logged, never
    /// surfaced to the player.
    pub fn handle_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::VideoSizeChanged { width, height } => {
                if let Err(e) = self.on_video_size_changed(width, height) {
                    tracing::debug!(error = %e, "Size change ignored");
                }
            }
            PlaybackEvent::StateChanged { state } => {
                let previous = std::mem::replace(&mut *self.playback.lock(), state);
                if previous != state {
                    tracing::info!(from = ?previous, to = ?state, "Playback state changed");
                }
            }
        }
    }

    /// Release the active pipeline. Frames draw nothing until the next size
    /// change. Safe to call repeatedly.
    pub fn release(&self) {
        self.reconfigure.teardown();
    }

    /// Release everything and shut the rasterizer down.
    pub fn shutdown(&self) {
        self.release();
        self.rasterizer.shutdown();
    }

    pub fn state(&self) -> SyncState {
        self.frame_sync.state()
    }

    pub fn playback_state(&self) -> PlaybackState {
        *self.playback.lock()
    }

    pub fn current_config(&self) -> Option<PipelineConfig> {
        self.slot.load().map(|pipeline| pipeline.config())
    }

    /// Counters of the active pipeline's cache.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.slot.load().map(|pipeline| pipeline.cache_stats())
    }

    /// Counters across every pipeline built so far.
    pub fn total_cache_stats(&self) -> CacheStats {
        self.reconfigure.total_cache_stats()
    }

    pub fn generation(&self) -> u64 {
        self.reconfigure.generation()
    }

    pub fn rasterizer(&self) -> &Arc<RasterizerService> {
        &self.rasterizer
    }
}
