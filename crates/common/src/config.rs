//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SubsyncError, SubsyncResult};

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overlay pipeline settings.
    pub overlay: OverlayConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which presentation path a pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pixel buffer blended onto the decoded frame.
    #[default]
    Cpu,
    /// Texture handle from an external render context.
    Gpu,
}

/// Overlay pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Dimensions to build the first pipeline with, before the playback
    /// engine reports the real video size.
    pub default_dimensions: Option<(u32, u32)>,

    /// Presentation backend.
    pub backend: BackendKind,

    /// Rasterizer time budget per frame, in milliseconds.
    pub frame_budget_ms: u64,

    /// Geometry defaults.
    pub placement: PlacementDefaults,
}

/// Default placement of the subtitle image over the frame.
///
/// These are tunables, not a contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementDefaults {
    /// Anchor on the video frame in `[-1, 1]`, origin at centre, y up.
    pub background_anchor: [f32; 2],

    /// Anchor within the subtitle image in `[0, 1]`, origin top-left.
    pub overlay_anchor: [f32; 2],

    /// Size as a fraction of the frame dimensions.
    pub scale: [f32; 2],

    /// Opacity in `[0, 1]`.
    pub alpha: f32,

    /// Cap on the drawn overlay width, in pixels.
    pub max_width_px: Option<u32>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "subsync_compositor=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            default_dimensions: None,
            backend: BackendKind::Cpu,
            frame_budget_ms: 16,
            placement: PlacementDefaults::default(),
        }
    }
}

impl Default for PlacementDefaults {
    fn default() -> Self {
        Self {
            background_anchor: [0.0, -0.7],
            overlay_anchor: [0.5, 0.5],
            scale: [1.0, 1.0],
            alpha: 1.0,
            max_width_px: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> SubsyncResult<Self> {
        if !path.exists() {
            return Err(SubsyncError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> SubsyncResult<PathBuf> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> SubsyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> SubsyncResult<()> {
        let p = &self.overlay.placement;
        if p.background_anchor.iter().any(|v| !(-1.0..=1.0).contains(v)) {
            return Err(SubsyncError::config(format!(
                "background_anchor must be within [-1, 1], got {:?}",
                p.background_anchor
            )));
        }
        if p.overlay_anchor.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(SubsyncError::config(format!(
                "overlay_anchor must be within [0, 1], got {:?}",
                p.overlay_anchor
            )));
        }
        if p.scale.iter().any(|v| !(*v > 0.0)) {
            return Err(SubsyncError::config(format!(
                "scale must be positive, got {:?}",
                p.scale
            )));
        }
        if !(0.0..=1.0).contains(&p.alpha) {
            return Err(SubsyncError::config(format!(
                "alpha must be within [0, 1], got {}",
                p.alpha
            )));
        }
        if p.max_width_px == Some(0) {
            return Err(SubsyncError::config("max_width_px must be positive"));
        }
        if let Some((w, h)) = self.overlay.default_dimensions {
            if w == 0 || h == 0 {
                return Err(SubsyncError::invalid_dimensions(w as i64, h as i64));
            }
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("subsync").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.overlay.placement.background_anchor, [0.0, -0.7]);
        assert_eq!(config.overlay.backend, BackendKind::Cpu);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"overlay": {"backend": "gpu", "placement": {"alpha": 0.5}}}"#)
                .unwrap();
        assert_eq!(config.overlay.backend, BackendKind::Gpu);
        assert_eq!(config.overlay.placement.alpha, 0.5);
        assert_eq!(config.overlay.placement.scale, [1.0, 1.0]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = AppConfig::default();
        config.overlay.placement.alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.overlay.placement.scale = [1.0, 0.0];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.overlay.placement.background_anchor = [0.0, -1.2];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.overlay.default_dimensions = Some((0, 720));
        assert!(matches!(
            config.validate(),
            Err(SubsyncError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("subsync-config-{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.overlay.default_dimensions = Some((1280, 720));
        config.overlay.placement.max_width_px = Some(1600);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AppConfig::load_from(Path::new("/nonexistent/subsync/config.json")).unwrap_err();
        assert!(matches!(err, SubsyncError::FileNotFound { .. }));
    }
}
