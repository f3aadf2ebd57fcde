//! Error types shared across subsync crates.

use std::path::PathBuf;

/// Top-level error type for subsync operations.
#[derive(Debug, thiserror::Error)]
pub enum SubsyncError {
    #[error("Rasterizer error: {message}")]
    Rasterizer { message: String },

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Render context is not active: {operation}")]
    ContextInactive { operation: String },

    #[error("Invalid image: {message}")]
    Image { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SubsyncError.
pub type SubsyncResult<T> = Result<T, SubsyncError>;

impl SubsyncError {
    pub fn rasterizer(msg: impl Into<String>) -> Self {
        Self::Rasterizer {
            message: msg.into(),
        }
    }

    pub fn invalid_dimensions(width: i64, height: i64) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend {
            message: msg.into(),
        }
    }

    pub fn context_inactive(operation: impl Into<String>) -> Self {
        Self::ContextInactive {
            operation: operation.into(),
        }
    }

    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from the rasterizer and is safe to absorb
    /// with a last-good fallback.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rasterizer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert!(SubsyncError::rasterizer("x")
            .to_string()
            .starts_with("Rasterizer error:"));
        assert_eq!(
            SubsyncError::invalid_dimensions(0, 600).to_string(),
            "Invalid dimensions: 0x600"
        );
        assert!(SubsyncError::context_inactive("upload")
            .to_string()
            .contains("upload"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(SubsyncError::rasterizer("boom").is_transient());
        assert!(!SubsyncError::backend("boom").is_transient());
        assert!(!SubsyncError::invalid_dimensions(-1, 1).is_transient());
    }

    #[test]
    fn test_other_preserves_source() {
        let err = SubsyncError::Other(anyhow::Error::new(std::io::Error::other("boom")));
        assert!(err.to_string().contains("boom"));
    }
}
