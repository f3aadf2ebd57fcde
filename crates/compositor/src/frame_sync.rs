//! Per-frame entry point.

use std::sync::Arc;

use serde::Serialize;
use subsync_common::clock::{us_to_ms, TimestampUs};

use crate::pipeline::{OverlayFrame, PipelineSlot};

/// Whether a pipeline is available to serve frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No video dimensions known yet; frames draw nothing.
    Unready,
    /// A pipeline is live.
    Active,
}

/// Turns presentation timestamps into overlay frames.
///
/// Called once per displayed video frame, at whatever interval the player
/// delivers them. Each call is independent: seeks and repeated timestamps
/// need no special handling.
#[derive(Debug, Clone)]
pub struct FrameSyncController {
    slot: Arc<PipelineSlot>,
}

impl FrameSyncController {
    pub fn new(slot: Arc<PipelineSlot>) -> Self {
        Self { slot }
    }

    pub fn state(&self) -> SyncState {
        match self.slot.load() {
            Some(_) => SyncState::Active,
            None => SyncState::Unready,
        }
    }

    /// Overlay for the frame presented at `presentation_time_us`.
    ///
    /// Returns `None` while unready. Never fails; rasterizer and backend
    /// problems degrade to the last good image or an undrawable frame.
    pub fn on_frame(&self, presentation_time_us: TimestampUs) -> Option<OverlayFrame> {
        let timestamp_ms = us_to_ms(presentation_time_us);
        self.slot.record_timestamp(timestamp_ms);

        let Some(pipeline) = self.slot.load() else {
            tracing::trace!(presentation_time_us, "Frame before configuration, nothing to draw");
            return None;
        };
        Some(pipeline.render(timestamp_ms))
    }
}
