//! Subsync Compositor
//!
//! Frame-synchronized subtitle compositing. Once per displayed video frame
//! the host asks for the subtitle overlay at the frame's presentation time;
//! the compositor rasterizes (or reuses) the subtitle image, pairs it with
//! its placement, and hands it to a CPU or GPU presentation backend.
//!
//! # Pipeline Architecture
//!
//! ```text
//! playback engine ── on_frame(us) ──► FrameSyncController
//!                                          │ us / 1000
//!                                          ▼
//!                                   active Pipeline ◄──── ReconfigurationManager
//!                                          │                  ▲
//!                  ┌───────────────────────┤                  │
//!                  ▼                       ▼           video size changed
//!             RasterCache ──► Rasterizer  GeometryModel
//!                  │                       │
//!                  ▼                       ▼
//!            BackendAdapter (CPU bitmap | GPU texture) + Placement
//!                  │
//!                  ▼
//!             OverlayFrame ──► host compositor
//! ```
//!
//! A pipeline binds one video size to one cache, one placement, and one
//! backend. Size changes build a complete new pipeline and swap it in as a
//! single reference replacement; frames never see a half-updated pipeline.

pub mod backend;
pub mod blend;
pub mod cache;
pub mod frame_sync;
pub mod glyph;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod reconfigure;

pub use backend::{
    BackendAdapter, BackendSpec, ContextHandle, CpuBackend, GpuBackend, GpuSurface, GpuTexture,
    RenderContext, Renderable,
};
pub use blend::{composite_overlay, FrameSurface};
pub use cache::{CacheStats, RasterCache};
pub use frame_sync::{FrameSyncController, SyncState};
pub use glyph::{flatten_glyphs, GlyphMask};
pub use overlay::{OverlayOptions, PlaybackEvent, PlaybackState, SubtitleOverlay};
pub use pipeline::{OverlayFrame, Pipeline, PipelineSlot};
pub use raster::{RasterRequest, Rasterizer, RasterizerService};
pub use reconfigure::{ReconfigurationManager, ReconfigureOutcome};
