//! Play a cue sheet through a subtitle overlay without a player.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context};
use serde::Serialize;
use subsync_common::config::{AppConfig, BackendKind};
use subsync_compositor::{
    CacheStats, FrameSurface, GpuSurface, OverlayOptions, PlaybackEvent, PlaybackState,
    ReconfigureOutcome, Renderable, SubtitleOverlay,
};
use subsync_overlay_model::dimensions::PipelineConfig;

use crate::cues::{CueSheet, CueSheetRasterizer};
use crate::headless::{HeadlessContext, HeadlessStats};

pub struct SimulateArgs {
    pub cues: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_ms: Option<u64>,
    pub resize_at_ms: Option<u64>,
    pub resize_to: Option<String>,
    pub backend: Option<String>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub composite: bool,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    generated_at: String,
    cues: PathBuf,
    backend: BackendKind,
    fps: u32,
    duration_ms: u64,
    frames: u64,
    /// Frames with something to present.
    drawn: u64,
    /// Frames with a pipeline but nothing presentable.
    skipped: u64,
    /// Frames before any pipeline existed.
    unready: u64,
    distinct_images: usize,
    images_created: usize,
    images_released: usize,
    composited_pixels: u64,
    reconfigurations: Vec<ReconfigureOutcome>,
    generation: u64,
    final_config: Option<PipelineConfig>,
    cache: CacheStats,
    gpu: Option<HeadlessStats>,
}

pub fn run(args: SimulateArgs) -> anyhow::Result<()> {
    if args.fps == 0 {
        bail!("fps must be positive");
    }
    let resize = args
        .resize_at_ms
        .zip(args.resize_to.as_deref())
        .map(|(at, size)| parse_size(size).map(|(w, h)| (at, w, h)))
        .transpose()?;

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load(),
    };
    if let Some(backend) = &args.backend {
        config.overlay.backend = parse_backend(backend)?;
    }

    let sheet = CueSheet::load(&args.cues)?;
    let duration_ms = args.duration_ms.unwrap_or_else(|| sheet.end_ms());
    tracing::info!(
        cues = sheet.cues.len(),
        duration_ms,
        backend = ?config.overlay.backend,
        "Starting simulation"
    );

    let rasterizer = CueSheetRasterizer::new(sheet)?;
    let counters = rasterizer.counters();

    let headless = HeadlessContext::default();
    let surface = match config.overlay.backend {
        BackendKind::Gpu => {
            let surface = GpuSurface::new(headless.clone());
            surface.on_surface_created()?;
            Some(surface)
        }
        BackendKind::Cpu => None,
    };

    let options = OverlayOptions::from_config(&config.overlay, surface.clone())?;
    let overlay = SubtitleOverlay::new(rasterizer, options)?;

    let mut reconfigurations = Vec::new();
    overlay.handle_event(PlaybackEvent::StateChanged {
        state: PlaybackState::Buffering,
    });
    reconfigurations.push(
        overlay
            .on_video_size_changed(args.width as i64, args.height as i64)
            .context("Initial video size rejected")?,
    );
    overlay.handle_event(PlaybackEvent::StateChanged {
        state: PlaybackState::Ready,
    });

    let frame_us = 1_000_000 / u64::from(args.fps);
    let mut pending_resize = resize;
    let mut frames = 0u64;
    let mut drawn = 0u64;
    let mut skipped = 0u64;
    let mut unready = 0u64;
    let mut composited_pixels = 0u64;
    let mut images = HashSet::new();
    let mut canvas: Vec<u8> = Vec::new();

    let mut pts_us = 0u64;
    while pts_us / 1000 <= duration_ms {
        if let Some((at_ms, w, h)) = pending_resize {
            if pts_us / 1000 >= at_ms {
                match overlay.on_video_size_changed(w as i64, h as i64) {
                    Ok(outcome) => reconfigurations.push(outcome),
                    Err(e) => tracing::warn!(error = %e, "Resize rejected"),
                }
                pending_resize = None;
            }
        }

        frames += 1;
        match overlay.on_frame(pts_us) {
            None => unready += 1,
            Some(frame) => {
                if let Some(image) = &frame.image {
                    images.insert(image.id());
                }
                match &frame.renderable {
                    None => skipped += 1,
                    Some(renderable) => {
                        drawn += 1;
                        if args.composite && matches!(renderable, Renderable::Bitmap(_)) {
                            let (w, h) = (frame.config.width(), frame.config.height());
                            canvas.clear();
                            canvas.resize(frame.config.rgba_len(), 0);
                            let mut target = FrameSurface::new(w, h, &mut canvas)?;
                            if let Some(rect) = frame.composite_onto(&mut target)? {
                                composited_pixels += u64::from(rect.width) * u64::from(rect.height);
                            }
                        }
                    }
                }
            }
        }
        pts_us += frame_us;
    }

    overlay.handle_event(PlaybackEvent::StateChanged {
        state: PlaybackState::Ended,
    });
    let generation = overlay.generation();
    let final_config = overlay.current_config();
    overlay.shutdown();
    let cache = overlay.total_cache_stats();
    drop(overlay);
    if let Some(surface) = &surface {
        surface.on_surface_destroyed();
    }

    let report = SimulationReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        cues: args.cues,
        backend: config.overlay.backend,
        fps: args.fps,
        duration_ms,
        frames,
        drawn,
        skipped,
        unready,
        distinct_images: images.len(),
        images_created: counters.created(),
        images_released: counters.released(),
        composited_pixels,
        reconfigurations,
        generation,
        final_config,
        cache,
        gpu: surface.map(|_| headless.stats()),
    };
    tracing::info!(
        frames,
        drawn,
        images = report.images_created,
        released = report.images_released,
        "Simulation finished"
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn parse_size(value: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT, got {value:?}"))?;
    let w = w
        .trim()
        .parse()
        .with_context(|| format!("Invalid width in {value:?}"))?;
    let h = h
        .trim()
        .parse()
        .with_context(|| format!("Invalid height in {value:?}"))?;
    Ok((w, h))
}

fn parse_backend(value: &str) -> anyhow::Result<BackendKind> {
    match value.to_ascii_lowercase().as_str() {
        "cpu" => Ok(BackendKind::Cpu),
        "gpu" => Ok(BackendKind::Gpu),
        other => bail!("Unknown backend {other:?} (expected cpu or gpu)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_size("640X480").unwrap(), (640, 480));
        assert!(parse_size("1920").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("GPU").unwrap(), BackendKind::Gpu);
        assert_eq!(parse_backend("cpu").unwrap(), BackendKind::Cpu);
        assert!(parse_backend("metal").is_err());
    }
}
