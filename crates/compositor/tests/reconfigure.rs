mod support;

use std::sync::atomic::{AtomicBool, Ordering};

use subsync_common::error::SubsyncError;
use subsync_compositor::{OverlayOptions, ReconfigureOutcome, SubtitleOverlay, SyncState};
use subsync_overlay_model::dimensions::PipelineConfig;
use subsync_overlay_model::placement::GeometryModel;
use support::{ScriptLog, ScriptedRasterizer, Step};

/// Geometry whose placement differs between the two test sizes.
fn capped_geometry() -> GeometryModel {
    GeometryModel::default().with_max_width_px(1100)
}

fn overlay_with(steps: Vec<(u64, Step)>, fallback: Step) -> (SubtitleOverlay, ScriptLog) {
    let (rasterizer, log) = ScriptedRasterizer::new(steps);
    let overlay = SubtitleOverlay::new(
        rasterizer.with_fallback(fallback),
        OverlayOptions::default().with_geometry(capped_geometry()),
    )
    .unwrap();
    (overlay, log)
}

fn assert_consistent(frame: &subsync_compositor::OverlayFrame) {
    let geometry = capped_geometry();
    assert_eq!(frame.placement, geometry.placement_for(&frame.config));
    if let Some(image) = &frame.image {
        assert_eq!(
            (image.width(), image.height()),
            (frame.config.width(), frame.config.height()),
            "image from one pipeline paired with another's config"
        );
    }
}

#[test]
fn resize_mid_stream_never_mixes_pipelines() {
    let (overlay, _log) = overlay_with(vec![], Step::Image("cue"));
    let hd = PipelineConfig::new(1280, 720).unwrap();
    let other = PipelineConfig::new(1020, 820).unwrap();
    assert_ne!(
        capped_geometry().placement_for(&hd),
        capped_geometry().placement_for(&other)
    );

    overlay.on_video_size_changed(1280, 720).unwrap();
    let before = overlay.on_frame(40_000).unwrap();
    assert_eq!(before.config, hd);
    assert_consistent(&before);

    let outcome = overlay.on_video_size_changed(1020, 820).unwrap();
    assert_eq!(outcome, ReconfigureOutcome::Replaced { from: hd, to: other });

    let after = overlay.on_frame(80_000).unwrap();
    assert_eq!(after.config, other);
    assert_consistent(&after);

    // The frame taken before the swap is untouched by it.
    assert_eq!(before.config, hd);
    assert_consistent(&before);
    assert!(before.generation < after.generation);
}

#[test]
fn invalid_sizes_are_rejected_and_config_kept() {
    let (overlay, _log) = overlay_with(vec![], Step::Nothing);
    overlay.on_video_size_changed(1280, 720).unwrap();

    for (w, h) in [(0, 600), (600, -1), (0, 0), (-1280, 720)] {
        let err = overlay.on_video_size_changed(w, h).unwrap_err();
        assert!(matches!(err, SubsyncError::InvalidDimensions { .. }));
    }
    assert_eq!(
        overlay.current_config(),
        Some(PipelineConfig::new(1280, 720).unwrap())
    );
    assert_eq!(overlay.generation(), 1);
}

#[test]
fn invalid_first_size_leaves_overlay_unready() {
    let (overlay, _log) = overlay_with(vec![], Step::Nothing);
    assert!(overlay.on_video_size_changed(0, 600).is_err());
    assert_eq!(overlay.state(), SyncState::Unready);
    assert!(overlay.on_frame(0).is_none());
}

#[test]
fn old_image_released_once_after_swap() {
    let (overlay, log) = overlay_with(vec![(0, Step::Image("old"))], Step::Nothing);
    overlay.on_video_size_changed(1280, 720).unwrap();
    let old_id = overlay.on_frame(0).unwrap().image.unwrap().id();

    // Pre-warm renders the new pipeline at 0ms, producing a fresh image.
    overlay.on_video_size_changed(1020, 820).unwrap();
    assert_eq!(log.release_count(old_id), 1);

    overlay.release();
    overlay.release();
    assert_eq!(log.release_count(old_id), 1);
    assert_eq!(log.released_total(), log.created());
}

#[test]
fn prewarm_gives_first_frame_an_image_at_new_size() {
    let (overlay, log) = overlay_with(vec![(0, Step::Image("cue"))], Step::Nothing);
    overlay.on_video_size_changed(1280, 720).unwrap();
    overlay.on_frame(0);

    overlay.on_video_size_changed(1020, 820).unwrap();
    let frame = overlay.on_frame(40_000).unwrap();
    let image = frame.image.as_ref().unwrap();
    assert_eq!(log.label(image.id()), Some("cue"));
    assert_eq!((image.width(), image.height()), (1020, 820));
}

#[test]
fn repeated_identical_size_keeps_pipeline() {
    let (overlay, log) = overlay_with(vec![(0, Step::Image("A"))], Step::Nothing);
    overlay.on_video_size_changed(640, 360).unwrap();
    overlay.on_frame(0);

    let outcome = overlay.on_video_size_changed(640, 360).unwrap();
    assert!(matches!(outcome, ReconfigureOutcome::Unchanged { .. }));
    assert_eq!(overlay.generation(), 1);
    assert_eq!(log.released_total(), 0);
}

#[test]
fn concurrent_frames_and_resizes_stay_consistent() {
    let (overlay, log) = overlay_with(vec![], Step::Image("cue"));
    overlay.on_video_size_changed(1280, 720).unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let renderer = scope.spawn(|| {
            let mut frames = 0u64;
            let mut us = 0u64;
            loop {
                if let Some(frame) = overlay.on_frame(us) {
                    assert_consistent(&frame);
                    if let Some(image) = &frame.image {
                        assert!(!log.is_released(image.id()), "frame holds a released image");
                    }
                    frames += 1;
                }
                us += 16_667;
                if done.load(Ordering::SeqCst) {
                    break frames;
                }
            }
        });

        for i in 0..50 {
            let (w, h) = if i % 2 == 0 { (1020, 820) } else { (1280, 720) };
            overlay.on_video_size_changed(w, h).unwrap();
            std::thread::yield_now();
        }
        done.store(true, Ordering::SeqCst);
        assert!(renderer.join().unwrap() > 0);
    });

    overlay.release();
    assert_eq!(log.released_total(), log.created());
}

#[test]
fn release_during_frames_is_safe() {
    let (overlay, log) = overlay_with(vec![], Step::Image("cue"));
    overlay.on_video_size_changed(320, 240).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..200u64 {
                if let Some(frame) = overlay.on_frame(i * 1000) {
                    if let Some(image) = &frame.image {
                        assert!(!log.is_released(image.id()));
                    }
                }
            }
        });
        for _ in 0..20 {
            overlay.release();
            overlay.on_video_size_changed(320, 240).unwrap();
        }
    });

    overlay.release();
    assert_eq!(log.released_total(), log.created());
}
