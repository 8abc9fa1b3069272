//! Item extents.
//!
//! Diagram items never rotate, so every extent the canvas deals with (item
//! bounds, repaint regions, page tiles, marquee rectangles) is an AABB.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A rectangle in canvas coordinates; `min` is the top-left corner and y grows downwards
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Corners are taken as given; a `min` past `max` is an empty rectangle
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self {
            min: origin,
            max: origin + size,
        }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_origin_size(Vec2::new(x, y), Vec2::new(width, height))
    }

    /// Rectangle spanned by two arbitrary corners, such as a marquee drag
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest bounds containing every point, `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        }))
    }

    pub fn zero() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::ZERO,
        }
    }

    pub fn origin(&self) -> Vec2 {
        self.min
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// No area on at least one axis
    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    /// Overlap with a non-zero area
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Like [`Bounds::intersects`] but touching edges count
    ///
    /// Connector lines that run exactly horizontal or vertical have a zero-height
    /// (or zero-width) box, so crossing candidates must be collected with this test.
    pub fn intersects_inclusive(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Shared region; touching rectangles give a zero-area result
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);

        if min.x <= max.x && min.y <= max.y {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Edges count as inside
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub fn contains_bounds(&self, other: &Self) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    /// Grows every side by `amount`, e.g. the outer padding of an item
    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    pub fn translate(&self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Scales both corners about the canvas origin
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    /// Snaps outwards to whole units
    pub fn round_out(&self) -> Self {
        Self {
            min: self.min.floor(),
            max: self.max.ceil(),
        }
    }

    /// Clockwise from the top-left
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_extent() {
        let item = Bounds::from_xywh(40.0, 25.0, 120.0, 60.0);
        assert_eq!(item.max, Vec2::new(160.0, 85.0));
        assert_eq!(item.size(), Vec2::new(120.0, 60.0));
        assert_eq!(item.center(), Vec2::new(100.0, 55.0));
        assert_eq!(item, Bounds::from_origin_size(Vec2::new(40.0, 25.0), Vec2::new(120.0, 60.0)));
    }

    #[test]
    fn test_marquee_from_any_drag_direction() {
        let dragged_up_left = Bounds::from_corners(Vec2::new(90.0, 70.0), Vec2::new(10.0, 30.0));
        assert_eq!(dragged_up_left, Bounds::from_xywh(10.0, 30.0, 80.0, 40.0));
        assert!(Bounds::new(Vec2::new(90.0, 70.0), Vec2::new(10.0, 30.0)).is_empty());
    }

    #[test]
    fn test_route_extent_from_vertices() {
        assert!(Bounds::from_points(std::iter::empty()).is_none());

        let route = Bounds::from_points([
            Vec2::new(5.0, 40.0),
            Vec2::new(-3.0, 2.0),
            Vec2::new(12.0, 7.0),
        ])
        .unwrap();
        assert_eq!(route, Bounds::new(Vec2::new(-3.0, 2.0), Vec2::new(12.0, 40.0)));
    }

    #[test]
    fn test_overlapping_tables() {
        let orders = Bounds::from_xywh(0.0, 0.0, 200.0, 120.0);
        let customers = Bounds::from_xywh(150.0, 80.0, 200.0, 120.0);
        let far_away = Bounds::from_xywh(400.0, 0.0, 50.0, 50.0);

        assert!(orders.intersects(&customers));
        assert_eq!(orders.intersection(&customers), Some(Bounds::from_xywh(150.0, 80.0, 50.0, 40.0)));
        assert_eq!(orders.union(&customers), Bounds::from_xywh(0.0, 0.0, 350.0, 200.0));
        assert!(!orders.intersects(&far_away));
        assert!(orders.intersection(&far_away).is_none());
    }

    #[test]
    fn test_zero_height_bounds_overlap_inclusively() {
        let horizontal = Bounds::from_corners(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0));
        let vertical = Bounds::from_corners(Vec2::new(50.0, 0.0), Vec2::new(50.0, 100.0));

        assert!(!horizontal.intersects(&vertical));
        assert!(horizontal.intersects_inclusive(&vertical));
    }

    #[test]
    fn test_hits_on_the_border_count() {
        let item = Bounds::from_xywh(10.0, 20.0, 100.0, 50.0);
        assert!(item.contains_point(Vec2::new(10.0, 20.0)));
        assert!(item.contains_point(Vec2::new(110.0, 70.0)));
        assert!(!item.contains_point(Vec2::new(110.5, 70.0)));
        assert!(item.contains_bounds(&Bounds::from_xywh(10.0, 20.0, 10.0, 10.0)));
        assert!(!item.contains_bounds(&item.expand(1.0)));
    }

    #[test]
    fn test_padded_repaint_region() {
        let item = Bounds::from_xywh(10.3, 20.0, 99.4, 50.0);
        let padded = item.expand(4.0).round_out();
        assert_eq!(padded, Bounds::new(Vec2::new(6.0, 16.0), Vec2::new(114.0, 74.0)));
        assert_eq!(padded.scale(2.0).min, Vec2::new(12.0, 32.0));
    }
}
