//! Pipeline rebuild on video size changes.
//!
//! A size change builds a complete new pipeline first, optionally renders it
//! once at the last seen timestamp, then publishes it with a single slot
//! write. The old pipeline is torn down only after the swap; frames that
//! grabbed it before the swap finish on it and keep its image alive until
//! they are done.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use subsync_common::clock::FrameBudget;
use subsync_common::error::SubsyncResult;
use subsync_overlay_model::dimensions::PipelineConfig;
use subsync_overlay_model::placement::GeometryModel;

use crate::backend::BackendSpec;
use crate::cache::CacheStats;
use crate::pipeline::{Pipeline, PipelineSlot};
use crate::raster::RasterizerService;

/// What a reconfiguration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconfigureOutcome {
    /// First pipeline installed.
    Installed { to: PipelineConfig },
    /// Previous pipeline replaced and torn down.
    Replaced {
        from: PipelineConfig,
        to: PipelineConfig,
    },
    /// Same dimensions as the active pipeline; nothing changed.
    Unchanged { config: PipelineConfig },
}

/// Builds and swaps pipelines.
#[derive(Debug)]
pub struct ReconfigurationManager {
    slot: Arc<PipelineSlot>,
    rasterizer: Arc<RasterizerService>,
    geometry: GeometryModel,
    backend: BackendSpec,
    budget: FrameBudget,
    swap_lock: Mutex<()>,
    generation: AtomicU64,
    retired_stats: Mutex<CacheStats>,
}

impl ReconfigurationManager {
    pub fn new(
        slot: Arc<PipelineSlot>,
        rasterizer: Arc<RasterizerService>,
        geometry: GeometryModel,
        backend: BackendSpec,
        budget: FrameBudget,
    ) -> Self {
        Self {
            slot,
            rasterizer,
            geometry,
            backend,
            budget,
            swap_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            retired_stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Handle a "video size known/changed" notification.
    ///
    /// Non-positive dimensions are rejected and the active pipeline is left
    /// untouched.
    pub fn on_dimensions_changed(
        &self,
        width: i64,
        height: i64,
    ) -> SubsyncResult<ReconfigureOutcome> {
        let config = PipelineConfig::from_event(width, height).map_err(|e| {
            tracing::warn!(width, height, "Ignoring invalid video dimensions");
            e
        })?;
        Ok(self.install(config))
    }

    /// Make `config` the active configuration.
    pub fn install(&self, config: PipelineConfig) -> ReconfigureOutcome {
        let _swap = self.swap_lock.lock();

        if let Some(active) = self.slot.load() {
            if active.config() == config {
                tracing::debug!(config = %config, "Dimensions unchanged, keeping pipeline");
                return ReconfigureOutcome::Unchanged { config };
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pipeline = Arc::new(Pipeline::build(
            generation,
            config,
            &self.geometry,
            self.rasterizer.clone(),
            self.budget,
            &self.backend,
        ));

        if let Some(timestamp_ms) = self.slot.last_timestamp() {
            let frame = pipeline.render(timestamp_ms);
            tracing::debug!(
                generation,
                timestamp_ms,
                ready = frame.should_draw(),
                "Pre-warmed pipeline"
            );
        }

        match self.slot.replace(pipeline) {
            Some(previous) => {
                let from = previous.config();
                self.retire(&previous);
                tracing::info!(from = %from, to = %config, generation, "Pipeline reconfigured");
                ReconfigureOutcome::Replaced { from, to: config }
            }
            None => {
                tracing::info!(to = %config, generation, "Pipeline installed");
                ReconfigureOutcome::Installed { to: config }
            }
        }
    }

    /// Tear down the active pipeline, leaving the slot empty. Safe to call
    /// repeatedly and while frames are in flight.
    pub fn teardown(&self) {
        let _swap = self.swap_lock.lock();
        if let Some(previous) = self.slot.take() {
            self.retire(&previous);
            tracing::info!(config = %previous.config(), "Pipeline released");
        }
    }

    /// Cache counters across every pipeline this manager has built.
    pub fn total_cache_stats(&self) -> CacheStats {
        let mut total = *self.retired_stats.lock();
        if let Some(active) = self.slot.load() {
            total.merge(&active.cache_stats());
        }
        total
    }

    /// Number of pipelines built so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn retire(&self, pipeline: &Pipeline) {
        pipeline.teardown();
        self.retired_stats.lock().merge(&pipeline.cache_stats());
    }
}
