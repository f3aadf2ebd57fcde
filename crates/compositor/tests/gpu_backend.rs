mod support;

use subsync_common::error::SubsyncError;
use subsync_compositor::{BackendSpec, GpuSurface, OverlayOptions, Renderable, SubtitleOverlay};
use subsync_overlay_model::image::TextureId;
use support::{ContextCall, RecordingContext, ScriptLog, ScriptedRasterizer, Step};

type Harness = (SubtitleOverlay, GpuSurface, RecordingContext, ScriptLog);

fn gpu_overlay(steps: Vec<(u64, Step)>) -> Harness {
    let context = RecordingContext::default();
    let surface = GpuSurface::new(context.clone());
    let (rasterizer, log) = ScriptedRasterizer::new(steps);
    let overlay = SubtitleOverlay::new(
        rasterizer,
        OverlayOptions::default()
            .with_backend(BackendSpec::Gpu(surface.clone()))
            .with_default_dimensions(1280, 720),
    )
    .unwrap();
    (overlay, surface, context, log)
}

#[test]
fn frames_outside_surface_window_draw_nothing() {
    let (overlay, _surface, context, _log) = gpu_overlay(vec![(0, Step::Image("A"))]);

    let frame = overlay.on_frame(0).unwrap();
    assert!(frame.image.is_some(), "cache still tracks the image");
    assert!(!frame.should_draw());
    assert!(context.calls().is_empty());
}

#[test]
fn uploads_once_and_reuses_texture_across_frames() {
    let (overlay, surface, context, log) = gpu_overlay(vec![
        (0, Step::Image("A")),
        (40, Step::Nothing),
        (80, Step::Same),
    ]);
    surface.on_surface_created().unwrap();

    let mut textures = Vec::new();
    for us in [0, 40_000, 80_000] {
        let frame = overlay.on_frame(us).unwrap();
        let Some(Renderable::Texture(texture)) = &frame.renderable else {
            panic!("expected a texture renderable");
        };
        assert_eq!(log.label(texture.image()), Some("A"));
        textures.push(texture.id());
    }
    assert_eq!(textures, vec![TextureId(1); 3]);
    assert_eq!(context.uploads(), 1);
}

#[test]
fn replaced_texture_is_deleted() {
    let (overlay, surface, context, _log) =
        gpu_overlay(vec![(0, Step::Image("A")), (40, Step::Image("B"))]);
    surface.on_surface_created().unwrap();

    overlay.on_frame(0);
    overlay.on_frame(40_000);
    assert_eq!(context.uploads(), 2);
    assert_eq!(context.deletes(), vec![TextureId(1)]);

    overlay.release();
    overlay.release();
    assert_eq!(context.deletes(), vec![TextureId(1), TextureId(2)]);
}

#[test]
fn surface_recreation_reuploads_current_image() {
    let (overlay, surface, context, _log) =
        gpu_overlay(vec![(0, Step::Image("A")), (40, Step::Nothing)]);
    surface.on_surface_created().unwrap();
    assert!(overlay.on_frame(0).unwrap().should_draw());

    surface.on_surface_destroyed();
    surface.on_surface_destroyed();
    assert!(!overlay.on_frame(40_000).unwrap().should_draw());

    surface.on_surface_created().unwrap();
    let frame = overlay.on_frame(40_000).unwrap();
    assert!(frame.should_draw());
    assert_eq!(context.uploads(), 2);

    // Textures of the destroyed context are never deleted through the new one.
    let calls = context.calls();
    assert!(!calls.contains(&ContextCall::Delete(
        subsync_compositor::ContextHandle(2),
        TextureId(1)
    )));
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, ContextCall::Uninitialize(_)))
            .count(),
        1
    );
}

#[test]
fn gpu_frames_cannot_be_cpu_composited() {
    let (overlay, surface, _context, _log) = gpu_overlay(vec![(0, Step::Image("A"))]);
    surface.on_surface_created().unwrap();
    let frame = overlay.on_frame(0).unwrap();

    let mut pixels = vec![0u8; 16];
    let mut target = subsync_compositor::FrameSurface::new(2, 2, &mut pixels).unwrap();
    assert!(matches!(
        frame.composite_onto(&mut target),
        Err(SubsyncError::Unsupported { .. })
    ));
}

#[test]
fn resize_builds_new_gpu_pipeline() {
    let (overlay, surface, context, _log) = gpu_overlay(vec![(0, Step::Image("A"))]);
    surface.on_surface_created().unwrap();
    overlay.on_frame(0);

    overlay.on_video_size_changed(1020, 820).unwrap();
    let frame = overlay.on_frame(0).unwrap();
    let renderable = frame.renderable.unwrap();
    assert_eq!(renderable.size(), (1020, 820));

    // Old pipeline's texture freed after the swap.
    assert!(context.deletes().contains(&TextureId(1)));
}
