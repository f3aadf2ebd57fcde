//! Rasterizer contract and lifecycle.
//!
//! The rasterizer (libass or similar) is an external service: it turns the
//! subtitle cue active at a timestamp into an image of the requested size.
//! The compositor only depends on the [`Rasterizer`] trait and drives its
//! lifecycle through [`RasterizerService`].

use parking_lot::RwLock;
use serde::Serialize;
use subsync_common::clock::TimestampMs;
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_overlay_model::image::SharedImage;

/// One rasterization request, derived per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RasterRequest {
    pub timestamp_ms: TimestampMs,
    pub width: u32,
    pub height: u32,
}

/// Renders the subtitle state at a point in time.
///
/// Return values:
/// - `Ok(Some(image))`: the image to show. Returning the same `Arc` as a
///   previous call means "unchanged".
/// - `Ok(None)`: nothing new to show at this time.
/// - `Err(_)`: the rasterizer failed.
///
/// To clear the screen when a cue ends, return a transparent image.
pub trait Rasterizer: Send + Sync {
    /// Render the subtitle state for `request`.
    fn rasterize(&self, request: &RasterRequest) -> SubsyncResult<Option<SharedImage>>;

    /// One-time setup (library init, font loading).
    fn initialize(&self) -> SubsyncResult<()> {
        Ok(())
    }

    /// Release library resources.
    fn shutdown(&self) {}

    /// Name for logging.
    fn name(&self) -> &str {
        "rasterizer"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceState {
    Uninitialized,
    Ready,
    ShutDown,
}

/// Owns a rasterizer and its init/shutdown lifecycle.
///
/// [`initialize`](Self::initialize) and [`shutdown`](Self::shutdown) are
/// idempotent. A rasterize call on an uninitialized service initializes it
/// first; a call after shutdown fails.
///
/// Rasterize calls hold the state read lock for their whole duration, so
/// `shutdown` waits for calls in flight and the rasterizer is never used
/// after its own teardown.
pub struct RasterizerService {
    inner: Box<dyn Rasterizer>,
    state: RwLock<ServiceState>,
}

impl RasterizerService {
    pub fn new(rasterizer: impl Rasterizer + 'static) -> Self {
        Self::from_boxed(Box::new(rasterizer))
    }

    pub fn from_boxed(rasterizer: Box<dyn Rasterizer>) -> Self {
        Self {
            inner: rasterizer,
            state: RwLock::new(ServiceState::Uninitialized),
        }
    }

    /// Initialize the rasterizer if it has not been already.
    pub fn initialize(&self) -> SubsyncResult<()> {
        let mut state = self.state.write();
        match *state {
            ServiceState::Ready => Ok(()),
            ServiceState::ShutDown => Err(SubsyncError::rasterizer(format!(
                "{} was shut down",
                self.inner.name()
            ))),
            ServiceState::Uninitialized => {
                self.inner.initialize()?;
                *state = ServiceState::Ready;
                tracing::info!(rasterizer = %self.inner.name(), "Rasterizer initialized");
                Ok(())
            }
        }
    }

    /// Shut the rasterizer down. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        if *state == ServiceState::Ready {
            self.inner.shutdown();
            tracing::info!(rasterizer = %self.inner.name(), "Rasterizer shut down");
        }
        *state = ServiceState::ShutDown;
    }

    pub fn is_ready(&self) -> bool {
        *self.state.read() == ServiceState::Ready
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Rasterize, initializing on first use.
    pub fn rasterize(&self, request: &RasterRequest) -> SubsyncResult<Option<SharedImage>> {
        if request.width == 0 || request.height == 0 {
            return Err(SubsyncError::invalid_dimensions(
                request.width as i64,
                request.height as i64,
            ));
        }

        loop {
            {
                let state = self.state.read();
                match *state {
                    ServiceState::Ready => return self.inner.rasterize(request),
                    ServiceState::ShutDown => {
                        return Err(SubsyncError::rasterizer(format!(
                            "{} was shut down",
                            self.inner.name()
                        )))
                    }
                    ServiceState::Uninitialized => {}
                }
            }
            // Either becomes Ready or reports the shutdown on the next pass.
            self.initialize()?;
        }
    }
}

impl std::fmt::Debug for RasterizerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterizerService")
            .field("rasterizer", &self.inner.name())
            .field("state", &*self.state.read())
            .finish()
    }
}
