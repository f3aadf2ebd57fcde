#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_compositor::{ContextHandle, RasterRequest, Rasterizer, RenderContext};
use subsync_overlay_model::image::{ImageId, SharedImage, SubtitleImage, TextureId};

const SCRIPTED_TEXTURE: TextureId = TextureId(900);

/// What the scripted rasterizer does at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A new image tagged with this label.
    Image(&'static str),
    /// A new texture-backed image tagged with this label.
    Texture(&'static str),
    /// The image returned last time, if it is still alive and the
    /// requested size has not changed.
    Same,
    /// No cue.
    Nothing,
    /// Rasterizer error.
    Fail,
}

/// Shared view of what the scripted rasterizer has done.
#[derive(Clone, Default)]
pub struct ScriptLog {
    requests: Arc<Mutex<Vec<RasterRequest>>>,
    labels: Arc<Mutex<HashMap<ImageId, &'static str>>>,
    released: Arc<Mutex<Vec<ImageId>>>,
}

impl ScriptLog {
    pub fn requests(&self) -> Vec<RasterRequest> {
        self.requests.lock().clone()
    }

    pub fn label(&self, id: ImageId) -> Option<&'static str> {
        self.labels.lock().get(&id).copied()
    }

    pub fn created(&self) -> usize {
        self.labels.lock().len()
    }

    pub fn is_released(&self, id: ImageId) -> bool {
        self.released.lock().contains(&id)
    }

    pub fn release_count(&self, id: ImageId) -> usize {
        self.released.lock().iter().filter(|r| **r == id).count()
    }

    /// Labels of released images, in release order.
    pub fn released_labels(&self) -> Vec<&'static str> {
        let labels = self.labels.lock();
        self.released
            .lock()
            .iter()
            .filter_map(|id| labels.get(id).copied())
            .collect()
    }

    pub fn released_total(&self) -> usize {
        self.released.lock().len()
    }
}

/// Rasterizer driven by a per-millisecond script.
pub struct ScriptedRasterizer {
    steps: HashMap<u64, Step>,
    fallback: Step,
    last: Mutex<Weak<SubtitleImage>>,
    log: ScriptLog,
}

impl ScriptedRasterizer {
    pub fn new(steps: impl IntoIterator<Item = (u64, Step)>) -> (Self, ScriptLog) {
        let log = ScriptLog::default();
        let rasterizer = Self {
            steps: steps.into_iter().collect(),
            fallback: Step::Nothing,
            last: Mutex::new(Weak::new()),
            log: log.clone(),
        };
        (rasterizer, log)
    }

    pub fn with_fallback(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    fn make_image(
        &self,
        label: &'static str,
        width: u32,
        height: u32,
        texture: bool,
    ) -> SubsyncResult<SharedImage> {
        let released = self.log.released.clone();
        let image = if texture {
            SubtitleImage::from_texture(width, height, SCRIPTED_TEXTURE)?
        } else {
            SubtitleImage::transparent(width, height)?
        };
        let image = image
            .with_release_hook(move |id| released.lock().push(id))
            .into_shared();
        self.log.labels.lock().insert(image.id(), label);
        Ok(image)
    }
}

impl Rasterizer for ScriptedRasterizer {
    fn rasterize(&self, request: &RasterRequest) -> SubsyncResult<Option<SharedImage>> {
        self.log.requests.lock().push(*request);
        let step = self
            .steps
            .get(&request.timestamp_ms)
            .copied()
            .unwrap_or(self.fallback);

        match step {
            Step::Image(label) | Step::Texture(label) => {
                let texture = matches!(step, Step::Texture(_));
                let image = self.make_image(label, request.width, request.height, texture)?;
                *self.last.lock() = Arc::downgrade(&image);
                Ok(Some(image))
            }
            Step::Same => Ok(self.last.lock().upgrade().filter(|image| {
                (image.width(), image.height()) == (request.width, request.height)
            })),
            Step::Nothing => Ok(None),
            Step::Fail => Err(SubsyncError::rasterizer(format!(
                "scripted failure at {}ms",
                request.timestamp_ms
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Calls a [`RecordingContext`] received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCall {
    Initialize(ContextHandle),
    Upload(ContextHandle, TextureId, ImageId),
    Delete(ContextHandle, TextureId),
    Uninitialize(ContextHandle),
}

/// Render context that records every call.
#[derive(Clone, Default)]
pub struct RecordingContext {
    calls: Arc<Mutex<Vec<ContextCall>>>,
    next_handle: Arc<Mutex<u64>>,
    next_texture: Arc<Mutex<u32>>,
}

impl RecordingContext {
    pub fn calls(&self) -> Vec<ContextCall> {
        self.calls.lock().clone()
    }

    pub fn uploads(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ContextCall::Upload(..)))
            .count()
    }

    pub fn deletes(&self) -> Vec<TextureId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ContextCall::Delete(_, tex) => Some(*tex),
                _ => None,
            })
            .collect()
    }
}

impl RenderContext for RecordingContext {
    fn initialize(&mut self) -> SubsyncResult<ContextHandle> {
        let mut next = self.next_handle.lock();
        *next += 1;
        let handle = ContextHandle(*next);
        self.calls.lock().push(ContextCall::Initialize(handle));
        Ok(handle)
    }

    fn upload(&mut self, handle: ContextHandle, image: &SubtitleImage) -> SubsyncResult<TextureId> {
        let mut next = self.next_texture.lock();
        *next += 1;
        let texture = TextureId(*next);
        self.calls
            .lock()
            .push(ContextCall::Upload(handle, texture, image.id()));
        Ok(texture)
    }

    fn delete_texture(&mut self, handle: ContextHandle, texture: TextureId) {
        self.calls.lock().push(ContextCall::Delete(handle, texture));
    }

    fn uninitialize(&mut self, handle: ContextHandle) {
        self.calls.lock().push(ContextCall::Uninitialize(handle));
    }

    fn name(&self) -> &str {
        "recording"
    }
}
