//! Canvas settings that hosts load from JSON.

use crate::error::CanvasError;
use canvas_core::Color;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initial state of a [`CanvasView`](crate::CanvasView)
///
/// Every field is optional in the JSON form; missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Size of one page in canvas units
    pub page_size: Vec2,
    pub x_pages: u32,
    pub y_pages: u32,
    /// Window size in pixels
    pub view_size: Vec2,
    pub zoom: f32,
    pub grid_size: f32,
    pub grid_snapping: bool,
    pub grid_visible: bool,
    pub draws_line_hops: bool,
    /// Whether top-level items keep a rendered copy between frames
    pub cache_toplevel_contents: bool,
    pub background_color: Color,
    pub selection_color: Color,
    pub hover_color: Color,
    pub highlight_color: Color,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            page_size: Vec2::new(2000.0, 1500.0),
            x_pages: 1,
            y_pages: 1,
            view_size: Vec2::new(800.0, 600.0),
            zoom: 1.0,
            grid_size: 10.0,
            grid_snapping: false,
            grid_visible: true,
            draws_line_hops: true,
            cache_toplevel_contents: true,
            background_color: Color::WHITE,
            selection_color: Color::from_rgba8(0x38, 0x75, 0xd7, 0xff),
            hover_color: Color::from_rgba8(0x8a, 0xb4, 0xf8, 0xff),
            highlight_color: Color::from_rgba8(0xf0, 0xa0, 0x20, 0xff),
        }
    }
}

impl CanvasConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CanvasError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CanvasError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CanvasError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Rejects settings the view cannot work with
    pub fn validate(&self) -> Result<(), CanvasError> {
        if self.zoom <= 0.0 {
            return Err(CanvasError::InvalidGeometry(format!(
                "zoom must be positive, got {}",
                self.zoom
            )));
        }
        if self.page_size.min_element() <= 0.0 || self.x_pages == 0 || self.y_pages == 0 {
            return Err(CanvasError::InvalidGeometry(format!(
                "empty page layout: {}x{} pages of {}",
                self.x_pages, self.y_pages, self.page_size
            )));
        }
        if self.grid_size <= 0.0 {
            return Err(CanvasError::InvalidGeometry(format!(
                "grid size must be positive, got {}",
                self.grid_size
            )));
        }
        Ok(())
    }
}
