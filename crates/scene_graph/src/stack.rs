//! Box stacks: containers that arrange their children in a row or column.
//!
//! Unlike groups, stacks own the geometry of their children, and the children
//! are not top-level: their render and relayout requests go to the stack.

use crate::item::{ItemId, ItemKind, LayerId};
use crate::Scene;
use glam::Vec2;
use strum_macros::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Clone, Debug)]
pub struct StackData {
    pub(crate) children: Vec<ItemId>,
    pub orientation: Orientation,
    pub spacing: f32,
}

impl StackData {
    pub fn children(&self) -> &[ItemId] {
        &self.children
    }
}

/// Main-axis and cross-axis components of `v`
fn split(orientation: Orientation, v: Vec2) -> (f32, f32) {
    match orientation {
        Orientation::Horizontal => (v.x, v.y),
        Orientation::Vertical => (v.y, v.x),
    }
}

fn join(orientation: Orientation, main: f32, cross: f32) -> Vec2 {
    match orientation {
        Orientation::Horizontal => Vec2::new(main, cross),
        Orientation::Vertical => Vec2::new(cross, main),
    }
}

impl Scene {
    pub fn create_stack(&mut self, layer: LayerId, orientation: Orientation) -> ItemId {
        self.insert(
            layer,
            ItemKind::Stack(StackData {
                children: Vec::new(),
                orientation,
                spacing: 0.0,
            }),
        )
    }

    /// Appends `item` after the stack's current children
    pub fn stack_add(&mut self, stack: ItemId, item: ItemId) {
        let len = self.children(stack).len();
        self.add_at(stack, item, len);
    }

    pub fn set_stack_spacing(&mut self, stack: ItemId, spacing: f32) {
        if let Some(ItemKind::Stack(data)) = self.get_mut(stack).map(|item| &mut item.kind) {
            data.spacing = spacing;
            self.set_needs_relayout(stack);
        }
    }

    fn stack_layout_info(&self, stack: ItemId) -> Option<(Orientation, f32, Vec<ItemId>)> {
        let data = self.get(stack)?.as_stack()?;
        let visible = data
            .children
            .iter()
            .copied()
            .filter(|&child| self.get(child).is_some_and(|item| item.flags.visible))
            .collect();
        Some((data.orientation, data.spacing, visible))
    }

    pub(crate) fn stack_min_size(&mut self, stack: ItemId) -> Vec2 {
        let Some((orientation, spacing, children)) = self.stack_layout_info(stack) else {
            return Vec2::ZERO;
        };
        let (mut main, mut cross) = (0.0f32, 0.0f32);
        for &child in &children {
            let (child_main, child_cross) = split(orientation, self.preferred_size(child));
            main += child_main;
            cross = cross.max(child_cross);
        }
        if children.len() > 1 {
            main += spacing * (children.len() - 1) as f32;
        }
        join(orientation, main, cross)
    }

    /// Places the children one after another inside the stack's padding,
    /// stretching each across the stack
    pub(crate) fn layout_stack(&mut self, stack: ItemId) {
        let Some((orientation, spacing, children)) = self.stack_layout_info(stack) else {
            return;
        };
        let Some(item) = self.get(stack) else {
            return;
        };
        let padding = item.padding;
        let (_, inner_cross) = split(orientation, item.size - padding * 2.0);
        let (mut cursor, cross_start) = split(orientation, padding);

        for child in children {
            let (child_main, _) = split(orientation, self.preferred_size(child));
            let position = join(orientation, cursor, cross_start);
            let size = join(orientation, child_main, inner_cross.max(0.0));

            let Some(child_item) = self.get(child) else {
                continue;
            };
            if child_item.position != position || child_item.size != size {
                self.apply_bounds(child, position, size);
            }
            cursor += child_main + spacing;
        }
    }
}
