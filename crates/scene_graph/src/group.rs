//! Stacking groups and area groups.
//!
//! Children are kept front to back: index 0 is drawn last and hit first.

use crate::item::{Item, ItemId, ItemKind, LayerId};
use crate::Scene;
use canvas_core::Bounds;
use glam::Vec2;

/// Space kept around the children of a plain group
pub const GROUP_MARGIN: f32 = 5.0;

#[derive(Clone, Debug, Default)]
pub struct GroupData {
    pub(crate) children: Vec<ItemId>,
    pub(crate) is_area: bool,
    freeze_count: u32,
    bounds_dirty: bool,
}

impl GroupData {
    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn is_area(&self) -> bool {
        self.is_area
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_count > 0
    }
}

impl Scene {
    /// A plain group whose bounds follow its children
    pub fn create_group(&mut self, layer: LayerId) -> ItemId {
        self.insert(layer, ItemKind::Group(GroupData::default()))
    }

    /// An area group: fixed bounds, used as a layer root or a nested sub-area
    pub fn create_area(&mut self, layer: LayerId) -> ItemId {
        let id = self.insert(
            layer,
            ItemKind::Group(GroupData {
                is_area: true,
                ..GroupData::default()
            }),
        );
        if let Some(item) = self.get_mut(id) {
            item.flags.draw_state = false;
        }
        id
    }

    fn group_mut(&mut self, id: ItemId) -> Option<&mut GroupData> {
        match self.get_mut(id).map(|item| &mut item.kind) {
            Some(ItemKind::Group(group)) => Some(group),
            _ => None,
        }
    }

    fn set_layer_recursive(&mut self, id: ItemId, layer: LayerId) {
        let children = self.children(id).to_vec();
        if let Some(item) = self.get_mut(id) {
            item.layer = layer;
        }
        for child in children {
            self.set_layer_recursive(child, layer);
        }
    }

    /// Adds `item` on top of `container`, detaching it from its previous parent
    pub fn add(&mut self, container: ItemId, item: ItemId) {
        self.add_at(container, item, 0);
    }

    /// Adds `item` to `container` at `index` (0 is the front for groups,
    /// the first slot for stacks)
    pub fn add_at(&mut self, container: ItemId, item: ItemId, index: usize) {
        assert!(
            !self.is_ancestor_or_self(item, container),
            "cannot add item {item} into itself or one of its descendants"
        );
        let (Some(target), Some(child)) = (self.get(container), self.get(item)) else {
            return;
        };
        if !matches!(target.kind, ItemKind::Group(_) | ItemKind::Stack(_)) {
            log::warn!("item {container} is not a container");
            return;
        }
        let layer = target.layer;
        let selected = child.selected;
        let old_parent = child.parent;

        if let Some(old_parent) = old_parent {
            self.remove(old_parent, item);
        }

        match self.get_mut(container).map(|target| &mut target.kind) {
            Some(ItemKind::Group(group)) => {
                let index = index.min(group.children.len());
                group.children.insert(index, item);
            }
            Some(ItemKind::Stack(stack)) => {
                let index = index.min(stack.children.len());
                stack.children.insert(index, item);
            }
            _ => return,
        }
        if let Some(child) = self.get_mut(item) {
            child.parent = Some(container);
            child.selected = selected;
        }
        self.set_layer_recursive(item, layer);

        self.child_bounds_changed(container);
        self.set_needs_relayout(item);
    }

    /// Detaches `item` from `container`; the item stays alive, unparented
    pub fn remove(&mut self, container: ItemId, item: ItemId) {
        if self.parent(item) != Some(container) {
            return;
        }
        if self.is_toplevel(item) {
            self.set_needs_repaint(item);
        } else {
            self.set_needs_render(item);
        }

        match self.get_mut(container).map(|target| &mut target.kind) {
            Some(ItemKind::Group(group)) => group.children.retain(|&child| child != item),
            Some(ItemKind::Stack(stack)) => stack.children.retain(|&child| child != item),
            _ => {}
        }
        if let Some(child) = self.get_mut(item) {
            child.parent = None;
            child.last_repaint_bounds = None;
        }

        if let Some(ItemKind::Stack(_)) = self.get(container).map(|target| &target.kind) {
            self.set_needs_relayout(container);
        }
        self.child_bounds_changed(container);
    }

    /// Moves `item` to the front of its group, or just in front of `above`
    pub fn raise(&mut self, item: ItemId, above: Option<ItemId>) {
        let Some(parent) = self.parent(item) else {
            return;
        };
        let Some(group) = self.group_mut(parent) else {
            return;
        };
        group.children.retain(|&child| child != item);
        let index = above
            .and_then(|above| group.children.iter().position(|&child| child == above))
            .unwrap_or(0);
        group.children.insert(index, item);
        self.set_needs_repaint(item);
    }

    /// Moves `item` to the back of its group
    pub fn lower(&mut self, item: ItemId) {
        let Some(parent) = self.parent(item) else {
            return;
        };
        let Some(group) = self.group_mut(parent) else {
            return;
        };
        group.children.retain(|&child| child != item);
        group.children.push(item);
        self.set_needs_repaint(item);
    }

    /// Suspends bounds recomputation until the matching [`Scene::thaw`]
    pub fn freeze(&mut self, group: ItemId) {
        if let Some(group) = self.group_mut(group) {
            group.freeze_count += 1;
        }
    }

    pub fn thaw(&mut self, id: ItemId) {
        let Some(group) = self.group_mut(id) else {
            return;
        };
        assert!(group.freeze_count > 0, "thaw of group {id} without a matching freeze");
        group.freeze_count -= 1;
        if group.freeze_count == 0 && group.bounds_dirty {
            group.bounds_dirty = false;
            self.update_group_bounds(id);
        }
    }

    pub(crate) fn child_bounds_changed(&mut self, container: ItemId) {
        let Some(group) = self.group_mut(container) else {
            return;
        };
        if group.is_area {
            return;
        }
        if group.freeze_count > 0 {
            group.bounds_dirty = true;
            return;
        }
        self.update_group_bounds(container);
    }

    /// Fits a plain group around its visible children plus [`GROUP_MARGIN`]
    pub fn update_group_bounds(&mut self, id: ItemId) {
        let Some(item) = self.get(id) else {
            return;
        };
        let Some(group) = item.as_group().filter(|group| !group.is_area) else {
            return;
        };
        let union = group
            .children
            .iter()
            .filter_map(|&child| self.get(child))
            .filter(|child| child.flags.visible)
            .map(|child| child.bounds())
            .reduce(|a, b| a.union(&b));
        let Some(union) = union else {
            return;
        };

        let shift = union.min - Vec2::splat(GROUP_MARGIN);
        let size = union.size() + Vec2::splat(GROUP_MARGIN * 2.0);
        if shift == Vec2::ZERO && size == item.size {
            return;
        }
        let position = item.position + shift;

        let children = group.children.clone();
        for child in children {
            if let Some(child) = self.get_mut(child) {
                child.position -= shift;
                if let Some(line) = child.as_line_mut() {
                    for vertex in line.vertices.iter_mut() {
                        *vertex -= shift;
                    }
                }
            }
        }
        self.apply_bounds(id, position, size);
    }

    /// Hit test for a single item; `point` is in the item's parent coordinates
    pub fn item_contains_point(&self, id: ItemId, point: Vec2) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        match &item.kind {
            ItemKind::Line(_) => self.line_contains_point(id, point),
            ItemKind::Figure(figure) => {
                item.bounds().contains_point(point)
                    && figure.contains_point(point - item.position, item.size)
            }
            _ => item.bounds().contains_point(point),
        }
    }

    /// Frontmost item of `group` at `point` (group coordinates), descending
    /// into nested groups
    pub fn item_at(&self, group: ItemId, point: Vec2) -> Option<ItemId> {
        let group_item = self.get(group)?;
        for &child in group_item.children() {
            let Some(item) = self.get(child) else {
                continue;
            };
            if !item.flags.visible || !self.item_contains_point(child, point) {
                continue;
            }
            if let ItemKind::Group(_) = item.kind {
                return self.item_at(child, point - item.position).or(Some(child));
            }
            return Some(child);
        }
        None
    }

    /// Like [`Scene::item_at`], but continues into stacks down to the innermost item
    pub fn leaf_item_at(&self, group: ItemId, point: Vec2) -> Option<ItemId> {
        let mut found = self.item_at(group, point)?;
        let root_point = self.convert_point_to(group, point, None);
        'descend: loop {
            let Some(ItemKind::Stack(stack)) = self.get(found).map(|item| &item.kind) else {
                break;
            };
            let local = self.convert_point_from(found, root_point, None);
            for &child in &stack.children {
                let visible = self.get(child).is_some_and(|item| item.flags.visible);
                if visible && self.item_contains_point(child, local) {
                    found = child;
                    continue 'descend;
                }
            }
            break;
        }
        Some(found)
    }

    /// Items of `group` whose bounds touch `rect` (group coordinates), front
    /// to back. Nested areas are searched; plain groups count as one item.
    pub fn items_bounded_by(
        &self,
        group: ItemId,
        rect: &Bounds,
        predicate: &dyn Fn(&Item) -> bool,
    ) -> Vec<ItemId> {
        let mut found = Vec::new();
        self.collect_bounded_by(group, rect, predicate, &mut found);
        found
    }

    fn collect_bounded_by(
        &self,
        group: ItemId,
        rect: &Bounds,
        predicate: &dyn Fn(&Item) -> bool,
        found: &mut Vec<ItemId>,
    ) {
        for &child in self.children(group) {
            let Some(item) = self.get(child) else {
                continue;
            };
            if !item.flags.visible {
                continue;
            }
            if item.as_group().is_some_and(|group| group.is_area) {
                self.collect_bounded_by(child, &rect.translate(-item.position), predicate, found);
            } else if rect.intersects_inclusive(&item.bounds()) && predicate(item) {
                found.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{add_box, layer, scene_with_area};
    use crate::*;
    use super::GROUP_MARGIN;
    use canvas_core::Bounds;
    use glam::Vec2;

    #[test]
    fn test_add_puts_item_in_front() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 0.0, 0.0, 10.0, 10.0);
        let b = add_box(&mut scene, area, 0.0, 0.0, 10.0, 10.0);
        assert_eq!(scene.children(area), &[b, a]);
        assert_eq!(scene.parent(a), Some(area));
    }

    #[test]
    fn test_reparent_keeps_selection_and_single_parent() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(layer());
        scene.add(area, group);
        let item = add_box(&mut scene, area, 50.0, 50.0, 10.0, 10.0);
        scene.set_selected(item, true);

        scene.add(group, item);

        assert_eq!(scene.parent(item), Some(group));
        assert_eq!(scene.children(area), &[group]);
        assert_eq!(scene.children(group), &[item]);
        assert!(scene.get(item).unwrap().is_selected());
    }

    #[test]
    #[should_panic(expected = "into itself")]
    fn test_adding_into_descendant_panics() {
        let (mut scene, area) = scene_with_area();
        let outer = scene.create_group(layer());
        scene.add(area, outer);
        let inner = scene.create_group(layer());
        scene.add(outer, inner);
        scene.add(inner, outer);
    }

    #[test]
    fn test_raise_and_lower() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 0.0, 0.0, 10.0, 10.0);
        let b = add_box(&mut scene, area, 0.0, 0.0, 10.0, 10.0);
        let c = add_box(&mut scene, area, 0.0, 0.0, 10.0, 10.0);
        assert_eq!(scene.children(area), &[c, b, a]);

        scene.raise(a, None);
        assert_eq!(scene.children(area), &[a, c, b]);

        scene.raise(b, Some(c));
        assert_eq!(scene.children(area), &[a, b, c]);

        scene.lower(a);
        assert_eq!(scene.children(area), &[b, c, a]);
    }

    #[test]
    fn test_group_bounds_follow_children() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(layer());
        scene.add(area, group);
        let a = add_box(&mut scene, group, 10.0, 10.0, 20.0, 20.0);
        let b = add_box(&mut scene, group, 100.0, 50.0, 20.0, 20.0);

        let bounds = scene.root_bounds(group);
        assert_eq!(bounds.min, Vec2::splat(10.0 - GROUP_MARGIN));
        assert_eq!(bounds.max, Vec2::new(120.0 + GROUP_MARGIN, 70.0 + GROUP_MARGIN));
        // children keep their place on the canvas
        assert_eq!(scene.root_position(a), Vec2::new(10.0, 10.0));
        assert_eq!(scene.root_position(b), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn test_freeze_defers_bounds_update() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(layer());
        scene.add(area, group);
        let a = add_box(&mut scene, group, 10.0, 10.0, 20.0, 20.0);
        let before = scene.root_bounds(group);

        scene.freeze(group);
        scene.set_position(a, Vec2::new(200.0, 10.0) - scene.root_position(group));
        assert_eq!(scene.root_bounds(group), before);
        scene.thaw(group);

        assert_eq!(scene.root_bounds(group).min.x, 200.0 - GROUP_MARGIN);
        assert_eq!(scene.root_position(a), Vec2::new(200.0, 10.0));
    }

    #[test]
    #[should_panic(expected = "without a matching freeze")]
    fn test_unbalanced_thaw_panics() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(layer());
        scene.add(area, group);
        scene.thaw(group);
    }

    #[test]
    fn test_item_at_picks_frontmost() {
        let (mut scene, area) = scene_with_area();
        let back = add_box(&mut scene, area, 0.0, 0.0, 100.0, 100.0);
        let front = add_box(&mut scene, area, 50.0, 50.0, 100.0, 100.0);

        assert_eq!(scene.item_at(area, Vec2::new(75.0, 75.0)), Some(front));
        assert_eq!(scene.item_at(area, Vec2::new(25.0, 25.0)), Some(back));
        assert_eq!(scene.item_at(area, Vec2::new(500.0, 500.0)), None);

        scene.set_visible(front, false);
        assert_eq!(scene.item_at(area, Vec2::new(75.0, 75.0)), Some(back));
    }

    #[test]
    fn test_item_at_descends_into_groups() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(layer());
        scene.add(area, group);
        let inner = add_box(&mut scene, group, 40.0, 40.0, 20.0, 20.0);
        add_box(&mut scene, group, 100.0, 100.0, 20.0, 20.0);

        assert_eq!(scene.item_at(area, Vec2::new(50.0, 50.0)), Some(inner));
        // inside the group but between children
        assert_eq!(scene.item_at(area, Vec2::new(80.0, 80.0)), Some(group));
    }

    #[test]
    fn test_leaf_item_at_enters_stacks() {
        let (mut scene, area) = scene_with_area();
        let stack = scene.create_stack(layer(), Orientation::Vertical);
        scene.add(area, stack);
        scene.set_position(stack, Vec2::new(100.0, 100.0));
        let title = scene.create_figure(layer(), TextFigure::new("orders"));
        let column = scene.create_figure(layer(), TextFigure::new("id"));
        scene.stack_add(stack, title);
        scene.stack_add(stack, column);
        scene.relayout(stack);

        let column_center = scene.root_bounds(column).center();
        assert_eq!(scene.item_at(area, column_center), Some(stack));
        assert_eq!(scene.leaf_item_at(area, column_center), Some(column));
    }

    #[test]
    fn test_items_bounded_by() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 0.0, 0.0, 10.0, 10.0);
        let b = add_box(&mut scene, area, 100.0, 0.0, 10.0, 10.0);
        let c = add_box(&mut scene, area, 200.0, 0.0, 10.0, 10.0);

        let hits = scene.items_bounded_by(area, &Bounds::from_xywh(5.0, 0.0, 100.0, 5.0), &|_| true);
        assert_eq!(hits, vec![b, a]);

        let none = scene.items_bounded_by(area, &Bounds::from_xywh(0.0, 0.0, 300.0, 10.0), &|item| item.is_line());
        assert!(none.is_empty());
        let _ = c;
    }
}
