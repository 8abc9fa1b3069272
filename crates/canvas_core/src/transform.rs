//! Canvas-to-window transform.
//!
//! The canvas only ever pans and zooms uniformly, so the window transform is a
//! translation plus a single scale factor. No rotation, no skew.

use crate::bounds::Bounds;
use glam::Vec2;

/// Maps a point as `point * scale + offset`.
///
/// The view transform of a canvas is built with [`CanvasTransform::for_view`]
/// from its scroll offset, the centering offset used when the content is smaller
/// than the window, and the zoom. Surfaces keep one as their current transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CanvasTransform {
    /// Applied after scaling
    pub offset: Vec2,
    pub scale: f32,
}

impl CanvasTransform {
    pub fn identity() -> Self {
        Self::from_translation(Vec2::ZERO)
    }

    pub fn from_translation(offset: Vec2) -> Self {
        Self { offset, scale: 1.0 }
    }

    /// `window = (canvas - scroll + extra) * zoom`, with `scroll` and `extra` in
    /// canvas units
    pub fn for_view(scroll: Vec2, extra: Vec2, zoom: f32) -> Self {
        Self {
            offset: (extra - scroll) * zoom,
            scale: zoom,
        }
    }

    pub fn apply(&self, point: Vec2) -> Vec2 {
        point * self.scale + self.offset
    }

    /// Distances and sizes only scale
    pub fn apply_vector(&self, vector: Vec2) -> Vec2 {
        vector * self.scale
    }

    pub fn apply_bounds(&self, bounds: &Bounds) -> Bounds {
        Bounds::from_corners(self.apply(bounds.min), self.apply(bounds.max))
    }

    pub fn apply_inverse(&self, point: Vec2) -> Vec2 {
        (point - self.offset) / self.scale
    }

    pub fn apply_inverse_bounds(&self, bounds: &Bounds) -> Bounds {
        Bounds::from_corners(self.apply_inverse(bounds.min), self.apply_inverse(bounds.max))
    }

    /// `self` first, then `outer`; a cache texture placed inside a zoomed
    /// surface is `from_translation(origin).then(&surface_transform)`
    pub fn then(&self, outer: &CanvasTransform) -> CanvasTransform {
        CanvasTransform {
            offset: outer.apply(self.offset),
            scale: self.scale * outer.scale,
        }
    }
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self::identity()
    }
}
