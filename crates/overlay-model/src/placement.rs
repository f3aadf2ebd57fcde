//! Placement of the subtitle image over a video frame.
//!
//! The background anchor uses normalized device coordinates: `(0, 0)` is
//! the frame centre, `x` grows to the right and `y` grows upward, both in
//! `[-1, 1]`. The overlay anchor is the point of the subtitle image pinned
//! to the background anchor, normalized to `[0, 1]` from the image's
//! top-left corner.

use serde::{Deserialize, Serialize};
use subsync_common::config::PlacementDefaults;

use crate::dimensions::PipelineConfig;

/// Smallest scale a placement may carry.
pub const MIN_SCALE: f32 = 0.01;

/// A 2D normalized anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Overlay size as a fraction of the frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where and how a subtitle image is composited onto a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Point on the frame, in `[-1, 1]` with `y` up.
    pub background_anchor: Anchor,
    /// Point within the image, in `[0, 1]` from the top-left.
    pub overlay_anchor: Anchor,
    /// Drawn size relative to the frame; always positive.
    pub scale: Scale,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

impl Placement {
    /// Bottom-centred subtitle block: 70% of the way from the centre toward
    /// the bottom edge, image centred on that point, full frame size, opaque.
    pub const SUBTITLE_DEFAULT: Placement = Placement {
        background_anchor: Anchor::new(0.0, -0.7),
        overlay_anchor: Anchor::new(0.5, 0.5),
        scale: Scale::new(1.0, 1.0),
        alpha: 1.0,
    };

    /// Create a placement, clamping every field to its valid range.
    pub fn new(background_anchor: Anchor, overlay_anchor: Anchor, scale: Scale, alpha: f32) -> Self {
        Self {
            background_anchor: Anchor::new(
                clamp_or(background_anchor.x, -1.0, 1.0, 0.0),
                clamp_or(background_anchor.y, -1.0, 1.0, 0.0),
            ),
            overlay_anchor: Anchor::new(
                clamp_or(overlay_anchor.x, 0.0, 1.0, 0.5),
                clamp_or(overlay_anchor.y, 0.0, 1.0, 0.5),
            ),
            scale: Scale::new(
                clamp_or(scale.x, MIN_SCALE, f32::MAX, 1.0),
                clamp_or(scale.y, MIN_SCALE, f32::MAX, 1.0),
            ),
            alpha: clamp_or(alpha, 0.0, 1.0, 1.0),
        }
    }

    /// Build from configuration defaults.
    pub fn from_defaults(defaults: &PlacementDefaults) -> Self {
        let [bx, by] = defaults.background_anchor;
        let [ox, oy] = defaults.overlay_anchor;
        let [sx, sy] = defaults.scale;
        Self::new(
            Anchor::new(bx, by),
            Anchor::new(ox, oy),
            Scale::new(sx, sy),
            defaults.alpha,
        )
    }

    pub fn with_background_anchor(self, x: f32, y: f32) -> Self {
        Self::new(Anchor::new(x, y), self.overlay_anchor, self.scale, self.alpha)
    }

    pub fn with_overlay_anchor(self, x: f32, y: f32) -> Self {
        Self::new(self.background_anchor, Anchor::new(x, y), self.scale, self.alpha)
    }

    pub fn with_scale(self, x: f32, y: f32) -> Self {
        Self::new(self.background_anchor, self.overlay_anchor, Scale::new(x, y), self.alpha)
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self::new(self.background_anchor, self.overlay_anchor, self.scale, alpha)
    }

    /// Pixel rectangle the overlay covers on a `frame_width x frame_height`
    /// frame. The rectangle may extend past the frame edges; callers clip.
    pub fn dest_rect(&self, frame_width: u32, frame_height: u32) -> DestRect {
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let width = (fw * self.scale.x as f64).round().max(1.0);
        let height = (fh * self.scale.y as f64).round().max(1.0);

        // NDC to pixels, flipping y so that +1 is the top edge.
        let anchor_x = (self.background_anchor.x as f64 + 1.0) * 0.5 * fw;
        let anchor_y = (1.0 - self.background_anchor.y as f64) * 0.5 * fh;

        let x = anchor_x - self.overlay_anchor.x as f64 * width;
        let y = anchor_y - self.overlay_anchor.y as f64 * height;

        DestRect {
            x: x.round() as i64,
            y: y.round() as i64,
            width: width as u32,
            height: height as u32,
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::SUBTITLE_DEFAULT
    }
}

fn clamp_or(v: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if v.is_nan() {
        fallback
    } else {
        v.clamp(min, max)
    }
}

/// Overlay destination in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestRect {
    /// Left edge; may be negative.
    pub x: i64,
    /// Top edge; may be negative.
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl DestRect {
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    /// Intersection with a `width x height` frame, or `None` if the overlay
    /// is entirely off-frame.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<DestRect> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.right().min(width as i64);
        let y1 = self.bottom().min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(DestRect {
            x: x0,
            y: y0,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Placement policy for a pipeline.
///
/// `placement_for` is a pure function of the model and the config: the
/// same inputs always produce the same placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryModel {
    base: Placement,
    max_width_px: Option<u32>,
}

impl GeometryModel {
    pub fn new(base: Placement) -> Self {
        Self {
            base,
            max_width_px: None,
        }
    }

    pub fn from_defaults(defaults: &PlacementDefaults) -> Self {
        Self {
            base: Placement::from_defaults(defaults),
            max_width_px: defaults.max_width_px.filter(|w| *w > 0),
        }
    }

    /// Limit the drawn overlay width; height shrinks proportionally.
    pub fn with_max_width_px(mut self, max_width_px: u32) -> Self {
        self.max_width_px = Some(max_width_px.max(1));
        self
    }

    pub fn base(&self) -> Placement {
        self.base
    }

    /// Placement of the subtitle image for a pipeline of the given size.
    pub fn placement_for(&self, config: &PipelineConfig) -> Placement {
        let Some(max_width) = self.max_width_px else {
            return self.base;
        };

        let drawn_width = config.width() as f32 * self.base.scale.x;
        if drawn_width <= max_width as f32 {
            return self.base;
        }

        let factor = max_width as f32 / drawn_width;
        self.base
            .with_scale(self.base.scale.x * factor, self.base.scale.y * factor)
    }
}

impl Default for GeometryModel {
    fn default() -> Self {
        Self::new(Placement::SUBTITLE_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_matches_config_defaults() {
        let from_config = Placement::from_defaults(&PlacementDefaults::default());
        assert_eq!(from_config, Placement::SUBTITLE_DEFAULT);
        assert_eq!(Placement::default().alpha, 1.0);
    }

    #[test]
    fn test_new_clamps() {
        let p = Placement::new(
            Anchor::new(-3.0, 2.0),
            Anchor::new(1.5, -0.5),
            Scale::new(0.0, -1.0),
            7.0,
        );
        assert_eq!(p.background_anchor, Anchor::new(-1.0, 1.0));
        assert_eq!(p.overlay_anchor, Anchor::new(1.0, 0.0));
        assert_eq!(p.scale, Scale::new(MIN_SCALE, MIN_SCALE));
        assert_eq!(p.alpha, 1.0);

        let nan = Placement::SUBTITLE_DEFAULT.with_alpha(f32::NAN);
        assert_eq!(nan.alpha, 1.0);
    }

    #[test]
    fn test_dest_rect_centered() {
        let p = Placement::SUBTITLE_DEFAULT
            .with_background_anchor(0.0, 0.0)
            .with_scale(0.5, 0.5);
        let rect = p.dest_rect(1280, 720);
        assert_eq!(
            rect,
            DestRect {
                x: 320,
                y: 180,
                width: 640,
                height: 360
            }
        );
    }

    #[test]
    fn test_dest_rect_bottom_anchor() {
        // Anchor 70% toward the bottom: y = (1 + 0.7) / 2 * 720 = 612
        let p = Placement::SUBTITLE_DEFAULT.with_scale(1.0, 0.1);
        let rect = p.dest_rect(1280, 720);
        assert_eq!(rect.x, 0);
        assert_eq!(rect.width, 1280);
        assert_eq!(rect.height, 72);
        assert_eq!(rect.y, 612 - 36);
    }

    #[test]
    fn test_clip_to_frame() {
        let rect = DestRect {
            x: -10,
            y: 700,
            width: 100,
            height: 50,
        };
        assert_eq!(
            rect.clip_to(1280, 720),
            Some(DestRect {
                x: 0,
                y: 700,
                width: 90,
                height: 20
            })
        );

        let off = DestRect {
            x: 2000,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(off.clip_to(1280, 720), None);
    }

    #[test]
    fn test_max_width_caps_scale() {
        let model = GeometryModel::default().with_max_width_px(1920);
        let uhd = PipelineConfig::new(3840, 2160).unwrap();
        let p = model.placement_for(&uhd);
        assert!((p.scale.x - 0.5).abs() < 1e-6);
        assert!((p.scale.y - 0.5).abs() < 1e-6);

        let hd = PipelineConfig::new(1280, 720).unwrap();
        assert_eq!(model.placement_for(&hd), model.base());
    }

    #[test]
    fn test_overrides_do_not_touch_other_fields() {
        let p = Placement::SUBTITLE_DEFAULT.with_alpha(0.25);
        assert_eq!(p.alpha, 0.25);
        assert_eq!(p.scale, Placement::SUBTITLE_DEFAULT.scale);
        assert_eq!(p.background_anchor, Placement::SUBTITLE_DEFAULT.background_anchor);
    }

    proptest! {
        #[test]
        fn placement_for_is_pure(
            w in 1u32..8000,
            h in 1u32..8000,
            cap in proptest::option::of(1u32..4000),
            alpha in 0.0f32..=1.0,
        ) {
            let mut model = GeometryModel::new(Placement::SUBTITLE_DEFAULT.with_alpha(alpha));
            if let Some(cap) = cap {
                model = model.with_max_width_px(cap);
            }
            let config = PipelineConfig::new(w, h).unwrap();
            let other = PipelineConfig::new(h, w).unwrap();

            let first = model.placement_for(&config);
            let _ = model.placement_for(&other);
            let second = model.placement_for(&config);
            prop_assert_eq!(first, second);
            prop_assert!(first.scale.x > 0.0 && first.scale.y > 0.0);
            prop_assert!((0.0..=1.0).contains(&first.alpha));
        }
    }
}
