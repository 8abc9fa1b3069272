//! Magnets: the points connector ends attach to.
//!
//! Every item except lines has an implicit bounds magnet, which resolves to the
//! point where a line toward the item's center crosses its border. Fixed magnets
//! sit at an offset inside the item.

use crate::item::{ItemId, MagnetRef};
use crate::Scene;
use canvas_core::algorithms::intersect_rect_to_line;
use glam::Vec2;

/// Fixed magnets closer than this to the pointer win over the bounds magnet
pub const MAGNET_SNAP_DISTANCE: f32 = 5.0;

impl Scene {
    /// Adds a fixed magnet at `offset` (local coordinates)
    pub fn add_magnet(&mut self, id: ItemId, offset: Vec2) -> Option<MagnetRef> {
        let item = self.get_mut(id)?;
        item.magnets.push(offset);
        Some(MagnetRef::Fixed(item.magnets.len() - 1))
    }

    /// Picks the magnet of `id` a connector dropped at `point` (root
    /// coordinates) attaches to
    pub fn closest_magnet(&self, id: ItemId, point: Vec2) -> Option<MagnetRef> {
        let item = self.get(id)?;
        let origin = self.root_position(id);
        let closest = item
            .magnets
            .iter()
            .enumerate()
            .map(|(index, offset)| (index, (origin + *offset).distance(point)))
            .filter(|(_, distance)| *distance < MAGNET_SNAP_DISTANCE)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match closest {
            Some((index, _)) => Some(MagnetRef::Fixed(index)),
            None if !item.is_line() => Some(MagnetRef::Bounds),
            None => None,
        }
    }

    /// Where a connector attached to `magnet` ends, in root coordinates, when
    /// the other end of the line is at `toward`
    pub fn magnet_position(&self, id: ItemId, magnet: MagnetRef, toward: Vec2) -> Option<Vec2> {
        let item = self.get(id)?;
        match magnet {
            MagnetRef::Fixed(index) => {
                let offset = item.magnets.get(index)?;
                Some(self.root_position(id) + *offset)
            }
            MagnetRef::Bounds => {
                let bounds = self.root_bounds(id);
                let center = bounds.center();
                Some(
                    intersect_rect_to_line(&bounds, center, toward)
                        .map(|(first, _)| first)
                        .unwrap_or(center),
                )
            }
        }
    }

    /// A stable point to aim the other end of a line at
    pub fn magnet_reference(&self, id: ItemId, magnet: MagnetRef) -> Option<Vec2> {
        match magnet {
            MagnetRef::Bounds => self.get(id).map(|_| self.root_bounds(id).center()),
            MagnetRef::Fixed(_) => self.magnet_position(id, magnet, Vec2::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{add_box, scene_with_area};
    use crate::*;
    use glam::Vec2;

    #[test]
    fn test_closest_magnet_prefers_nearby_fixed_magnets() {
        let (mut scene, area) = scene_with_area();
        let item = add_box(&mut scene, area, 100.0, 100.0, 40.0, 40.0);
        let left = scene.add_magnet(item, Vec2::new(0.0, 20.0)).unwrap();
        scene.add_magnet(item, Vec2::new(40.0, 20.0));

        assert_eq!(scene.closest_magnet(item, Vec2::new(102.0, 121.0)), Some(left));
        assert_eq!(scene.closest_magnet(item, Vec2::new(120.0, 101.0)), Some(MagnetRef::Bounds));
    }

    #[test]
    fn test_bounds_magnet_lands_on_the_border() {
        let (mut scene, area) = scene_with_area();
        let item = add_box(&mut scene, area, 100.0, 100.0, 40.0, 20.0);

        let right = scene.magnet_position(item, MagnetRef::Bounds, Vec2::new(300.0, 110.0));
        assert_eq!(right, Some(Vec2::new(140.0, 110.0)));
        let above = scene.magnet_position(item, MagnetRef::Bounds, Vec2::new(120.0, 0.0));
        assert_eq!(above, Some(Vec2::new(120.0, 100.0)));
        // a target inside the item resolves to the center
        let inside = scene.magnet_position(item, MagnetRef::Bounds, Vec2::new(125.0, 112.0));
        assert_eq!(inside, Some(Vec2::new(120.0, 110.0)));
    }
}
