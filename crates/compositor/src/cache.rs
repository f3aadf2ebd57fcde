//! Raster cache: the current subtitle image of one pipeline.
//!
//! Every frame goes through [`RasterCache::get`], which asks the rasterizer
//! for the image at the frame's timestamp and decides whether to keep the
//! held image or replace it. Failures and "nothing new" both fall back to
//! the last good image.
//!
//! The held image is the only mutable state shared between frame calls and
//! teardown. It is guarded by one lock that is held across the rasterizer
//! call, so a concurrent [`RasterCache::release`] waits for an in-flight
//! `get` instead of pulling the image out from under it. Images handed to
//! callers are reference counted; a superseded image is released when its
//! last in-flight user drops it.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use subsync_common::clock::{FrameBudget, TimestampMs};
use subsync_overlay_model::image::SharedImage;

use crate::raster::{RasterRequest, RasterizerService};

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls to `get`.
    pub requests: u64,
    /// New images stored.
    pub refreshes: u64,
    /// Rasterizer returned the image already held.
    pub unchanged: u64,
    /// Rasterizer had nothing new; last-good served.
    pub no_cue: u64,
    /// Rasterizer errors; last-good served.
    pub failures: u64,
    /// Images the cache let go of (superseded or released).
    pub releases: u64,
    /// Rasterizer calls slower than the frame budget.
    pub budget_overruns: u64,
}

impl CacheStats {
    /// Add another cache's counters into these.
    pub fn merge(&mut self, other: &CacheStats) {
        self.requests += other.requests;
        self.refreshes += other.refreshes;
        self.unchanged += other.unchanged;
        self.no_cue += other.no_cue;
        self.failures += other.failures;
        self.releases += other.releases;
        self.budget_overruns += other.budget_overruns;
    }
}

#[derive(Debug, Default)]
struct CacheState {
    current: Option<SharedImage>,
    stats: CacheStats,
}

/// Holds the most recently rasterized image for one pipeline.
#[derive(Debug)]
pub struct RasterCache {
    rasterizer: Arc<RasterizerService>,
    budget: FrameBudget,
    state: Mutex<CacheState>,
}

impl RasterCache {
    pub fn new(rasterizer: Arc<RasterizerService>, budget: FrameBudget) -> Self {
        Self {
            rasterizer,
            budget,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Image to show at `timestamp_ms` for a `width x height` target.
    ///
    /// Never fails: rasterizer errors are logged and the last good image is
    /// returned. `None` means there has been no image yet; skip drawing.
    ///
    /// A call that overruns the frame budget is counted and logged, but its
    /// image is still served: it is newer than the held one, and dropping it
    /// would leave a consistently slow rasterizer with nothing on screen.
    /// The frame budget never decides which image is shown.
    pub fn get(&self, timestamp_ms: TimestampMs, width: u32, height: u32) -> Option<SharedImage> {
        let request = RasterRequest {
            timestamp_ms,
            width,
            height,
        };

        let mut superseded = None;
        let current = {
            let mut state = self.state.lock();
            state.stats.requests += 1;

            let timer = self.budget.start();
            let result = self.rasterizer.rasterize(&request);
            let outcome = timer.finish();
            if outcome.overran() {
                state.stats.budget_overruns += 1;
                tracing::warn!(
                    timestamp_ms,
                    elapsed_ms = outcome.elapsed_ms(),
                    budget_ms = outcome.budget.as_millis() as u64,
                    "Rasterizer overran frame budget"
                );
            }

            match result {
                Ok(Some(image)) => {
                    let same = state
                        .current
                        .as_ref()
                        .is_some_and(|held| Arc::ptr_eq(held, &image));
                    if same {
                        state.stats.unchanged += 1;
                    } else {
                        tracing::debug!(
                            timestamp_ms,
                            image = %image.id(),
                            width = image.width(),
                            height = image.height(),
                            "Subtitle image refreshed"
                        );
                        superseded = state.current.replace(image);
                        if superseded.is_some() {
                            state.stats.releases += 1;
                        }
                        state.stats.refreshes += 1;
                    }
                }
                Ok(None) => {
                    state.stats.no_cue += 1;
                    tracing::trace!(timestamp_ms, "No new subtitle image, keeping last");
                }
                Err(e) => {
                    state.stats.failures += 1;
                    tracing::warn!(
                        timestamp_ms,
                        width,
                        height,
                        error = %e,
                        "Rasterizer failed, keeping last image"
                    );
                }
            }

            state.current.clone()
        };

        // Release hooks run outside the lock.
        drop(superseded);
        current
    }

    /// The held image without calling the rasterizer.
    pub fn current(&self) -> Option<SharedImage> {
        self.state.lock().current.clone()
    }

    /// Let go of the held image and mark the cache empty. Safe to call
    /// repeatedly; later calls do nothing.
    pub fn release(&self) {
        let released = {
            let mut state = self.state.lock();
            let released = state.current.take();
            if released.is_some() {
                state.stats.releases += 1;
            }
            released
        };
        if let Some(image) = released {
            tracing::debug!(image = %image.id(), "Subtitle image released");
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    pub fn rasterizer(&self) -> &Arc<RasterizerService> {
        &self.rasterizer
    }
}
