//! JSON cue sheets and a rasterizer that draws them.
//!
//! There is no font engine here: each cue is drawn as solid boxes in its
//! colour, which is enough to exercise caching, resizing and release
//! through the real compositor.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use anyhow::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use subsync_common::clock::TimestampMs;
use subsync_common::error::{SubsyncError, SubsyncResult};
use subsync_compositor::{flatten_glyphs, GlyphMask, RasterRequest, Rasterizer};
use subsync_overlay_model::image::{SharedImage, SubtitleImage};

/// A list of timed cues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CueSheet {
    pub cues: Vec<Cue>,
}

/// One subtitle shown over `[start_ms, end_ms)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cue {
    pub start_ms: TimestampMs,
    pub end_ms: TimestampMs,
    #[serde(default)]
    pub text: String,
    /// `RRGGBBTT` hex; `TT` is transparency, `00` opaque.
    #[serde(default = "default_color")]
    pub color: String,
    /// Areas to fill, normalized to the video size. Empty means one
    /// centered bar near the bottom, sized to the text.
    #[serde(default)]
    pub boxes: Vec<CueBox>,
}

/// Rectangle in normalized video coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

fn default_color() -> String {
    "FFFFFF00".to_string()
}

impl Cue {
    /// Packed `0xRRGGBBTT` colour.
    pub fn packed_color(&self) -> SubsyncResult<u32> {
        if self.color.len() != 8 {
            return Err(SubsyncError::config(format!(
                "cue colour must be 8 hex digits (RRGGBBTT), got {:?}",
                self.color
            )));
        }
        u32::from_str_radix(&self.color, 16).map_err(|e| {
            SubsyncError::config(format!("invalid cue colour {:?}: {e}", self.color))
        })
    }

    fn contains(&self, timestamp_ms: TimestampMs) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms < self.end_ms
    }

    fn areas(&self) -> Vec<CueBox> {
        if !self.boxes.is_empty() {
            return self.boxes.clone();
        }
        let width = (0.1 + 0.02 * self.text.chars().count() as f32).min(0.9);
        vec![CueBox {
            x: (1.0 - width) / 2.0,
            y: 0.82,
            width,
            height: 0.08,
        }]
    }
}

impl CueSheet {
    /// Load and validate a cue sheet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cue sheet {}", path.display()))?;
        let sheet: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cue sheet {}", path.display()))?;
        sheet.validate()?;
        Ok(sheet)
    }

    pub fn validate(&self) -> SubsyncResult<()> {
        for (i, cue) in self.cues.iter().enumerate() {
            if cue.start_ms >= cue.end_ms {
                return Err(SubsyncError::config(format!(
                    "cue {i} ends at {}ms, not after its start at {}ms",
                    cue.end_ms, cue.start_ms
                )));
            }
            cue.packed_color()?;
        }
        Ok(())
    }

    /// Index of the cue shown at `timestamp_ms`. Overlapping cues resolve
    /// to the first one listed.
    pub fn active_at(&self, timestamp_ms: TimestampMs) -> Option<usize> {
        self.cues.iter().position(|cue| cue.contains(timestamp_ms))
    }

    /// End of the last cue.
    pub fn end_ms(&self) -> TimestampMs {
        self.cues.iter().map(|cue| cue.end_ms).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputKey {
    cue: Option<usize>,
    width: u32,
    height: u32,
}

struct LastOutput {
    key: OutputKey,
    image: Weak<SubtitleImage>,
}

/// Image counters shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct ImageCounters {
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ImageCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Rasterizes a [`CueSheet`].
///
/// An unchanged cue at an unchanged size returns the previous image, as
/// long as the compositor still holds it. The first gap after a cue yields
/// a transparent image to clear the screen; later gap frames report no cue.
pub struct CueSheetRasterizer {
    sheet: CueSheet,
    colors: Vec<u32>,
    last: Mutex<Option<LastOutput>>,
    counters: ImageCounters,
}

impl CueSheetRasterizer {
    pub fn new(sheet: CueSheet) -> SubsyncResult<Self> {
        let colors = sheet
            .cues
            .iter()
            .map(Cue::packed_color)
            .collect::<SubsyncResult<Vec<_>>>()?;
        Ok(Self {
            sheet,
            colors,
            last: Mutex::new(None),
            counters: ImageCounters::default(),
        })
    }

    pub fn counters(&self) -> ImageCounters {
        self.counters.clone()
    }

    fn draw(&self, cue: Option<usize>, width: u32, height: u32) -> SubsyncResult<SharedImage> {
        let image = match cue {
            None => SubtitleImage::transparent(width, height)?,
            Some(index) => {
                let areas: Vec<(i32, i32, u32, u32)> = self.sheet.cues[index]
                    .areas()
                    .iter()
                    .map(|area| to_pixels(area, width, height))
                    .collect();
                let bitmaps: Vec<Vec<u8>> = areas
                    .iter()
                    .map(|(_, _, w, h)| vec![255u8; *w as usize * *h as usize])
                    .collect();
                let masks: Vec<GlyphMask<'_>> = areas
                    .iter()
                    .zip(&bitmaps)
                    .map(|((x, y, w, h), bitmap)| GlyphMask {
                        dst_x: *x,
                        dst_y: *y,
                        width: *w,
                        height: *h,
                        stride: *w as usize,
                        bitmap,
                        color: self.colors[index],
                    })
                    .collect();
                flatten_glyphs(width, height, &masks)?
            }
        };

        let released = self.counters.released.clone();
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(image
            .with_release_hook(move |_| {
                released.fetch_add(1, Ordering::SeqCst);
            })
            .into_shared())
    }
}

fn to_pixels(area: &CueBox, width: u32, height: u32) -> (i32, i32, u32, u32) {
    let x = (area.x * width as f32).round() as i32;
    let y = (area.y * height as f32).round() as i32;
    let w = (area.width * width as f32).round().max(1.0) as u32;
    let h = (area.height * height as f32).round().max(1.0) as u32;
    (x, y, w, h)
}

impl Rasterizer for CueSheetRasterizer {
    fn rasterize(&self, request: &RasterRequest) -> SubsyncResult<Option<SharedImage>> {
        let key = OutputKey {
            cue: self.sheet.active_at(request.timestamp_ms),
            width: request.width,
            height: request.height,
        };

        let mut last = self.last.lock();
        if let Some(previous) = last.as_ref() {
            if previous.key == key {
                if let Some(image) = previous.image.upgrade() {
                    return Ok(Some(image));
                }
                if key.cue.is_none() {
                    return Ok(None);
                }
            }
        }

        // Nothing was showing, so a gap needs no clearing image.
        let was_showing = last.as_ref().is_some_and(|p| p.key.cue.is_some());
        if key.cue.is_none() && !was_showing {
            return Ok(None);
        }

        let image = self.draw(key.cue, key.width, key.height)?;
        if let Some(index) = key.cue {
            tracing::trace!(
                cue = index,
                text = %self.sheet.cues[index].text,
                image = %image.id(),
                "Cue drawn"
            );
        }
        *last = Some(LastOutput {
            key,
            image: Arc::downgrade(&image),
        });
        Ok(Some(image))
    }

    fn name(&self) -> &str {
        "cue-sheet"
    }
}
