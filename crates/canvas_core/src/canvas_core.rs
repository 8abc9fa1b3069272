//! # Core geometry and drawing primitives for the diagram canvas
//!
//! This crate holds everything the scene graph and the canvas view share but that
//! carries no scene state of its own: axis-aligned bounds, the zoom/offset transform,
//! the geometry kernel used for hit-testing and connector crossings, colors, the
//! normalized input event types, and the drawing-surface abstraction together with
//! the surfaces the engine ships (software raster, recording, SVG).

pub mod algorithms;
pub mod bounds;
pub mod color;
pub mod draw;
pub mod input;
pub mod raster;
pub mod surface;
pub mod svg;
pub mod transform;

pub use bounds::Bounds;
pub use color::Color;
pub use glam::Vec2;
pub use surface::{Bitmap, DrawCommand, RecordingSurface, Surface};
pub use transform::CanvasTransform;
