//! The selection manager.
//!
//! Tracks which items are selected and moves them together while they are
//! dragged. The first selected item is the anchor: grid snapping is computed
//! for it alone and the same correction is applied to every other item, so
//! the selection keeps its shape.

use canvas_core::algorithms::snap_to_grid;
use canvas_core::Bounds;
use glam::Vec2;
use scene_graph::{ItemId, ItemType, Scene};
use strum_macros::{Display, EnumString};

/// Offset of a dragged item's root position from the cursor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragRecord {
    pub item: ItemId,
    pub offset: Vec2,
}

/// How a marquee combines with the current selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SelectMode {
    #[default]
    Replace,
    Add,
    Toggle,
}

#[derive(Debug, Default)]
pub struct Selection {
    items: Vec<ItemId>,
    drag: Vec<DragRecord>,
    moving: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The item that gets selected when `item` is picked
    ///
    /// Parts of a plain group select the group. `None` if the result does
    /// not accept selection.
    pub fn selection_target(scene: &Scene, item: ItemId) -> Option<ItemId> {
        let mut current = item;
        while let Some(parent) = scene.parent(current) {
            if scene.get(parent).map(|p| p.item_type()) != Some(ItemType::Group) {
                break;
            }
            current = parent;
        }
        scene
            .get(current)
            .filter(|item| item.flags().accepts_selection)
            .map(|_| current)
    }

    pub fn contents(&self) -> &[ItemId] {
        &self.items
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn anchor(&self) -> Option<ItemId> {
        self.items.first().copied()
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Makes `item` the only selected item. Returns `true` if anything changed.
    pub fn set(&mut self, scene: &mut Scene, item: ItemId) -> bool {
        let Some(target) = Self::selection_target(scene, item) else {
            return false;
        };
        if self.items == [target] {
            return false;
        }
        for other in std::mem::take(&mut self.items) {
            if other != target {
                scene.set_selected(other, false);
            }
        }
        scene.set_selected(target, true);
        self.items.push(target);
        log::debug!("selection set to item {target}");
        true
    }

    pub fn add(&mut self, scene: &mut Scene, item: ItemId) -> bool {
        let Some(target) = Self::selection_target(scene, item) else {
            return false;
        };
        if self.contains(target) {
            return false;
        }
        scene.set_selected(target, true);
        self.items.push(target);
        true
    }

    pub fn remove(&mut self, scene: &mut Scene, item: ItemId) -> bool {
        let target = Self::selection_target(scene, item).unwrap_or(item);
        let Some(index) = self.items.iter().position(|selected| *selected == target) else {
            return false;
        };
        self.items.remove(index);
        self.drag.retain(|record| record.item != target);
        scene.set_selected(target, false);
        true
    }

    pub fn toggle(&mut self, scene: &mut Scene, item: ItemId) -> bool {
        let target = Self::selection_target(scene, item).unwrap_or(item);
        if self.contains(target) {
            self.remove(scene, target)
        } else {
            self.add(scene, target)
        }
    }

    pub fn add_items(&mut self, scene: &mut Scene, items: &[ItemId]) -> bool {
        let mut changed = false;
        for &item in items {
            changed |= self.add(scene, item);
        }
        changed
    }

    pub fn toggle_items(&mut self, scene: &mut Scene, items: &[ItemId]) -> bool {
        let mut changed = false;
        for &item in items {
            changed |= self.toggle(scene, item);
        }
        changed
    }

    pub fn clear(&mut self, scene: &mut Scene) -> bool {
        if self.items.is_empty() {
            return false;
        }
        for item in std::mem::take(&mut self.items) {
            scene.set_selected(item, false);
        }
        self.drag.clear();
        self.moving = false;
        true
    }

    /// Unselects items whose root bounds do not touch `rect`
    pub fn remove_items_outside(&mut self, scene: &mut Scene, rect: &Bounds) -> bool {
        let outside: Vec<ItemId> = self
            .items
            .iter()
            .copied()
            .filter(|&item| !scene.root_bounds(item).intersects_inclusive(rect))
            .collect();
        for &item in &outside {
            self.remove(scene, item);
        }
        !outside.is_empty()
    }

    /// Drops an item that no longer exists
    pub fn forget(&mut self, item: ItemId) {
        self.items.retain(|selected| *selected != item);
        self.drag.retain(|record| record.item != item);
        if self.drag.is_empty() {
            self.moving = false;
        }
    }

    /// Starts a drag of the draggable selected items from `point` (root coordinates)
    pub fn begin_moving(&mut self, scene: &Scene, point: Vec2) {
        self.drag = self
            .items
            .iter()
            .filter(|&&item| scene.get(item).is_some_and(|i| i.flags().draggable))
            .map(|&item| DragRecord {
                item,
                offset: scene.root_position(item) - point,
            })
            .collect();
        self.moving = true;
        log::debug!("moving {} items", self.drag.len());
    }

    /// Moves every dragged item so it keeps its offset from `point`
    pub fn update_move(&mut self, scene: &mut Scene, point: Vec2, grid: Option<f32>) {
        if !self.moving {
            return;
        }
        let correction = match (self.drag.first(), grid) {
            (Some(anchor), Some(grid)) => {
                let wanted = point + anchor.offset;
                snap_to_grid(wanted, grid) - wanted
            }
            _ => Vec2::ZERO,
        };
        for record in self.drag.clone() {
            move_to_root(scene, record.item, point + record.offset + correction);
        }
    }

    /// Commits the move, re-snapping the anchor and shifting the rest by the same amount
    pub fn end_moving(&mut self, scene: &mut Scene, grid: Option<f32>) {
        if let (Some(anchor), Some(grid)) = (self.drag.first(), grid) {
            let current = scene.root_position(anchor.item);
            let correction = snap_to_grid(current, grid) - current;
            if correction != Vec2::ZERO {
                for record in self.drag.clone() {
                    let position = scene.root_position(record.item) + correction;
                    move_to_root(scene, record.item, position);
                }
            }
        }
        self.drag.clear();
        self.moving = false;
    }
}

/// Places `item` at a root position, kept inside its parent
fn move_to_root(scene: &mut Scene, item: ItemId, root: Vec2) {
    let Some(parent) = scene.parent(item) else {
        scene.set_position(item, root);
        return;
    };
    let mut local = scene.convert_point_from(parent, root, None).max(Vec2::ZERO);
    let limit = scene
        .get(parent)
        .filter(|parent| parent.item_type() == ItemType::Area)
        .map(|parent| parent.size());
    if let (Some(limit), Some(size)) = (limit, scene.get(item).map(|item| item.size())) {
        local = local.min((limit - size).max(Vec2::ZERO));
    }
    scene.set_position(item, local);
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::Color;
    use rstest::rstest;
    use scene_graph::{LayerId, RectFigure};
    use std::str::FromStr;

    fn scene_with_area() -> (Scene, ItemId) {
        let mut scene = Scene::new();
        let area = scene.create_area(LayerId::default());
        scene.set_size(area, Vec2::new(1000.0, 1000.0));
        (scene, area)
    }

    fn add_item(scene: &mut Scene, parent: ItemId, x: f32, y: f32) -> ItemId {
        let item = scene.create_figure(LayerId::default(), RectFigure::new(Color::WHITE));
        scene.set_auto_sizing(item, false);
        scene.update_flags(item, |flags| {
            flags.accepts_selection = true;
            flags.draggable = true;
        });
        scene.add(parent, item);
        scene.set_size(item, Vec2::new(40.0, 30.0));
        scene.set_position(item, Vec2::new(x, y));
        item
    }

    fn selected(scene: &Scene) -> Vec<ItemId> {
        scene
            .iter()
            .filter(|(_, item)| item.is_selected())
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn test_set_replaces_and_keeps_flags_consistent() {
        let (mut scene, area) = scene_with_area();
        let a = add_item(&mut scene, area, 0.0, 0.0);
        let b = add_item(&mut scene, area, 100.0, 0.0);
        let mut selection = Selection::new();

        assert!(selection.add(&mut scene, a));
        assert!(selection.add(&mut scene, b));
        assert!(selection.set(&mut scene, b));
        assert_eq!(selection.contents(), &[b]);
        assert_eq!(selected(&scene), vec![b]);

        // already the only selection
        assert!(!selection.set(&mut scene, b));
    }

    #[test]
    fn test_unselectable_items_leave_selection_unchanged() {
        let (mut scene, area) = scene_with_area();
        let a = add_item(&mut scene, area, 0.0, 0.0);
        let fixed = add_item(&mut scene, area, 100.0, 0.0);
        scene.update_flags(fixed, |flags| flags.accepts_selection = false);
        let mut selection = Selection::new();
        selection.set(&mut scene, a);

        assert!(!selection.set(&mut scene, fixed));
        assert!(!selection.add(&mut scene, fixed));
        assert_eq!(selection.contents(), &[a]);
        assert_eq!(selected(&scene), vec![a]);
    }

    #[test]
    fn test_parts_of_plain_groups_select_the_group() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(LayerId::default());
        scene.add(area, group);
        scene.update_flags(group, |flags| flags.accepts_selection = true);
        let part = add_item(&mut scene, group, 10.0, 10.0);
        let mut selection = Selection::new();

        selection.set(&mut scene, part);
        assert_eq!(selection.contents(), &[group]);
        assert!(!scene.get(part).unwrap().is_selected());

        // toggling the part again unselects the group
        selection.toggle(&mut scene, part);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_remove_items_outside() {
        let (mut scene, area) = scene_with_area();
        let inside = add_item(&mut scene, area, 10.0, 10.0);
        let outside = add_item(&mut scene, area, 500.0, 500.0);
        let mut selection = Selection::new();
        selection.add_items(&mut scene, &[inside, outside]);

        assert!(selection.remove_items_outside(&mut scene, &Bounds::from_xywh(0.0, 0.0, 100.0, 100.0)));
        assert_eq!(selection.contents(), &[inside]);
        assert!(!scene.get(outside).unwrap().is_selected());
    }

    #[test]
    fn test_group_moves_with_one_snap_correction() {
        let (mut scene, area) = scene_with_area();
        let a = add_item(&mut scene, area, 10.0, 10.0);
        let b = add_item(&mut scene, area, 63.0, 17.0);
        let c = add_item(&mut scene, area, 121.0, 88.0);
        let mut selection = Selection::new();
        selection.add_items(&mut scene, &[a, b, c]);

        let start = Vec2::new(20.0, 20.0);
        selection.begin_moving(&scene, start);
        selection.update_move(&mut scene, start + Vec2::new(33.0, 47.0), Some(10.0));
        selection.end_moving(&mut scene, Some(10.0));

        // the anchor lands on the grid, the others keep their relative offsets
        assert_eq!(scene.get(a).unwrap().position(), Vec2::new(40.0, 60.0));
        assert_eq!(scene.get(b).unwrap().position(), Vec2::new(93.0, 67.0));
        assert_eq!(scene.get(c).unwrap().position(), Vec2::new(151.0, 138.0));
        assert!(!selection.is_moving());
    }

    #[rstest]
    #[case(Vec2::new(-500.0, -500.0), Vec2::new(0.0, 0.0))]
    #[case(Vec2::new(5000.0, 5000.0), Vec2::new(960.0, 970.0))]
    fn test_moves_are_clamped_to_the_area(#[case] target: Vec2, #[case] expected: Vec2) {
        let (mut scene, area) = scene_with_area();
        let item = add_item(&mut scene, area, 100.0, 100.0);
        let mut selection = Selection::new();
        selection.set(&mut scene, item);

        selection.begin_moving(&scene, Vec2::new(100.0, 100.0));
        selection.update_move(&mut scene, target, None);
        assert_eq!(scene.get(item).unwrap().position(), expected);
    }

    #[test]
    fn test_items_that_are_not_draggable_stay_put() {
        let (mut scene, area) = scene_with_area();
        let item = add_item(&mut scene, area, 100.0, 100.0);
        scene.update_flags(item, |flags| flags.draggable = false);
        let mut selection = Selection::new();
        selection.set(&mut scene, item);

        selection.begin_moving(&scene, Vec2::ZERO);
        selection.update_move(&mut scene, Vec2::new(50.0, 50.0), None);
        assert_eq!(scene.get(item).unwrap().position(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_forget_drops_destroyed_items() {
        let (mut scene, area) = scene_with_area();
        let a = add_item(&mut scene, area, 0.0, 0.0);
        let mut selection = Selection::new();
        selection.set(&mut scene, a);
        selection.begin_moving(&scene, Vec2::ZERO);
        scene.destroy(a);
        selection.forget(a);
        assert!(selection.is_empty());
        assert!(!selection.is_moving());
    }

    #[rstest]
    #[case("replace", SelectMode::Replace)]
    #[case("add", SelectMode::Add)]
    #[case("toggle", SelectMode::Toggle)]
    fn test_select_mode_names(#[case] name: &str, #[case] mode: SelectMode) {
        assert_eq!(SelectMode::from_str(name).unwrap(), mode);
        assert_eq!(mode.to_string(), name);
    }

    #[test]
    fn test_unknown_select_mode_is_rejected() {
        assert!(SelectMode::from_str("invert").is_err());
    }
}
