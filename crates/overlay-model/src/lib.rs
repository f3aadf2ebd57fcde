//! Subsync Overlay Model
//!
//! Defines the core data contracts for subtitle compositing:
//! - **Image:** Owned subtitle rasters (pixel buffers or GPU textures)
//! - **Dimensions:** The video size a compositing pipeline targets
//! - **Placement:** Where and how the subtitle image lands on the frame
//!
//! Placement coordinates are normalized so they survive video size changes.

pub mod dimensions;
pub mod image;
pub mod placement;

pub use dimensions::*;
pub use image::*;
pub use placement::*;
