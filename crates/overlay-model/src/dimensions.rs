//! Video dimensions targeted by a compositing pipeline.

use serde::Serialize;
use subsync_common::error::{SubsyncError, SubsyncResult};

/// The video size the rasterizer targets for one pipeline instance.
///
/// A `PipelineConfig` is never mutated: a size change builds a new one.
/// Both dimensions are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PipelineConfig {
    video_width: u32,
    video_height: u32,
}

impl PipelineConfig {
    /// Create a config, rejecting zero dimensions.
    pub fn new(video_width: u32, video_height: u32) -> SubsyncResult<Self> {
        if video_width == 0 || video_height == 0 {
            return Err(SubsyncError::invalid_dimensions(
                video_width as i64,
                video_height as i64,
            ));
        }
        Ok(Self {
            video_width,
            video_height,
        })
    }

    /// Create a config from a playback-engine size notification.
    ///
    /// Playback engines report sizes as signed integers; anything
    /// non-positive or wider than `u32` is rejected.
    pub fn from_event(width: i64, height: i64) -> SubsyncResult<Self> {
        let w = u32::try_from(width).map_err(|_| SubsyncError::invalid_dimensions(width, height))?;
        let h =
            u32::try_from(height).map_err(|_| SubsyncError::invalid_dimensions(width, height))?;
        Self::new(w, h)
    }

    /// Video width in pixels.
    pub fn width(&self) -> u32 {
        self.video_width
    }

    /// Video height in pixels.
    pub fn height(&self) -> u32 {
        self.video_height
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.video_width as f64 / self.video_height as f64
    }

    /// Byte length of a tightly packed RGBA8 buffer at this size.
    pub fn rgba_len(&self) -> usize {
        (self.video_width as usize)
            .saturating_mul(self.video_height as usize)
            .saturating_mul(4)
    }
}

impl std::fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.video_width, self.video_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero() {
        assert!(PipelineConfig::new(0, 600).is_err());
        assert!(PipelineConfig::new(600, 0).is_err());
        assert!(PipelineConfig::new(1, 1).is_ok());
    }

    #[test]
    fn test_from_event_rejects_non_positive() {
        assert!(PipelineConfig::from_event(0, 600).is_err());
        assert!(PipelineConfig::from_event(600, -1).is_err());
        assert!(PipelineConfig::from_event(-1280, -720).is_err());
        assert!(PipelineConfig::from_event(i64::from(u32::MAX) + 1, 10).is_err());

        let config = PipelineConfig::from_event(1280, 720).unwrap();
        assert_eq!(config.width(), 1280);
        assert_eq!(config.height(), 720);
    }

    #[test]
    fn test_error_carries_original_values() {
        match PipelineConfig::from_event(600, -1) {
            Err(SubsyncError::InvalidDimensions { width, height }) => {
                assert_eq!((width, height), (600, -1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_derived_values() {
        let config = PipelineConfig::new(1280, 720).unwrap();
        assert!((config.aspect_ratio() - 16.0 / 9.0).abs() < 1e-9);
        assert_eq!(config.rgba_len(), 1280 * 720 * 4);
        assert_eq!(config.to_string(), "1280x720");
    }

    #[test]
    fn test_serde_shape() {
        let config = PipelineConfig::new(1020, 820).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"video_width":1020,"video_height":820}"#);
    }
}
