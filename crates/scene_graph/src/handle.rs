//! Handle descriptions and the resize gesture.
//!
//! The canvas owns the handle objects; the scene says where they go and what
//! dragging them does.

use crate::item::{ItemId, ItemKind};
use crate::Scene;
use canvas_core::algorithms::snap_to_grid;
use glam::Vec2;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Represents a resize handle position on an item's bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl ResizeHandle {
    /// Returns the opposite handle
    pub fn opposite(&self) -> Self {
        match self {
            ResizeHandle::TopLeft => ResizeHandle::BottomRight,
            ResizeHandle::Top => ResizeHandle::Bottom,
            ResizeHandle::TopRight => ResizeHandle::BottomLeft,
            ResizeHandle::Left => ResizeHandle::Right,
            ResizeHandle::Right => ResizeHandle::Left,
            ResizeHandle::BottomLeft => ResizeHandle::TopRight,
            ResizeHandle::Bottom => ResizeHandle::Top,
            ResizeHandle::BottomRight => ResizeHandle::TopLeft,
        }
    }

    /// Returns true if this handle is on the left side
    pub fn is_left(&self) -> bool {
        matches!(
            self,
            ResizeHandle::TopLeft | ResizeHandle::Left | ResizeHandle::BottomLeft
        )
    }

    /// Returns true if this handle is on the right side
    pub fn is_right(&self) -> bool {
        matches!(
            self,
            ResizeHandle::TopRight | ResizeHandle::Right | ResizeHandle::BottomRight
        )
    }

    /// Returns true if this handle is on the top side
    pub fn is_top(&self) -> bool {
        matches!(
            self,
            ResizeHandle::TopLeft | ResizeHandle::Top | ResizeHandle::TopRight
        )
    }

    /// Returns true if this handle is on the bottom side
    pub fn is_bottom(&self) -> bool {
        matches!(
            self,
            ResizeHandle::BottomLeft | ResizeHandle::Bottom | ResizeHandle::BottomRight
        )
    }

    /// Position on the box as a fraction of its size
    pub fn anchor(&self) -> Vec2 {
        let x = if self.is_left() {
            0.0
        } else if self.is_right() {
            1.0
        } else {
            0.5
        };
        let y = if self.is_top() {
            0.0
        } else if self.is_bottom() {
            1.0
        } else {
            0.5
        };
        Vec2::new(x, y)
    }
}

/// What dragging a handle changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleTag {
    Resize(ResizeHandle),
    LineStart,
    LineEnd,
    /// A line segment, by index of its first vertex
    LineSegment(usize),
}

/// Where a handle goes, in root coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleSpec {
    pub tag: HandleTag,
    pub position: Vec2,
    pub draggable: bool,
}

impl Scene {
    /// Handles to show while `id` has focus
    pub fn handle_specs(&self, id: ItemId) -> Vec<HandleSpec> {
        let Some(item) = self.get(id) else {
            return Vec::new();
        };
        if let ItemKind::Line(_) = item.kind {
            return self.line_handle_specs(id);
        }

        let origin = self.root_position(id);
        let draggable = item.flags.h_resizable || item.flags.v_resizable;
        let size = item.size;
        ResizeHandle::iter()
            .map(|handle| HandleSpec {
                tag: HandleTag::Resize(handle),
                position: origin + (size * handle.anchor()).ceil(),
                draggable,
            })
            .collect()
    }

    /// Applies a handle drag to `id`; `position` is the pointer in root
    /// coordinates. Returns `true` if the item handled the drag.
    pub fn drag_handle(
        &mut self,
        id: ItemId,
        tag: HandleTag,
        position: Vec2,
        target: Option<ItemId>,
        dragging: bool,
        grid: Option<f32>,
    ) -> bool {
        match tag {
            HandleTag::Resize(handle) => self.drag_resize_handle(id, handle, position, grid),
            _ => self.drag_line_handle(id, tag, position, target, dragging),
        }
    }

    fn drag_resize_handle(
        &mut self,
        id: ItemId,
        handle: ResizeHandle,
        position: Vec2,
        grid: Option<f32>,
    ) -> bool {
        let min_size = self.min_size(id);
        let Some(item) = self.get(id) else {
            return false;
        };
        let (h_resizable, v_resizable) = (item.flags.h_resizable, item.flags.v_resizable);
        if !h_resizable && !v_resizable {
            return false;
        }
        let bounds = item.bounds();
        let parent = item.parent;
        let pointer = match parent {
            Some(parent) => self.convert_point_from(parent, position, None),
            None => position,
        };
        let parent_limit = parent
            .and_then(|parent| self.get(parent))
            .filter(|parent| parent.as_group().is_some_and(|group| group.is_area()))
            .map(|parent| parent.size);

        let mut npos = bounds.min;
        let mut nsize = bounds.size();

        // x axis, then y axis, with the same rules
        for axis in 0..2 {
            let (resizable, leading, trailing) = if axis == 0 {
                (h_resizable, handle.is_left(), handle.is_right())
            } else {
                (v_resizable, handle.is_top(), handle.is_bottom())
            };
            if !resizable {
                continue;
            }
            if trailing {
                let mut length = (pointer[axis] - bounds.min[axis]).max(min_size[axis]);
                if let Some(limit) = parent_limit {
                    length = length.min(limit[axis] - npos[axis]);
                }
                nsize[axis] = length.max(1.0);
            } else if leading {
                let far = bounds.max[axis];
                npos[axis] = pointer[axis];
                nsize[axis] = far - npos[axis];
                if nsize[axis] < min_size[axis] {
                    npos[axis] = far - min_size[axis];
                    nsize[axis] = min_size[axis];
                }
                if npos[axis] < 0.0 {
                    nsize[axis] += npos[axis];
                    npos[axis] = 0.0;
                }
            }
        }

        if let Some(constrain) = self.get(id).and_then(|item| item.constrainer.as_ref()) {
            constrain(handle, &mut npos, &mut nsize);
        }

        if let Some(grid) = grid {
            let snapped = snap_to_grid(npos, grid);
            nsize -= snapped - npos;
            npos = snapped;
            nsize = snap_to_grid(nsize, grid);
        }
        nsize = nsize.max(Vec2::ONE);

        self.set_position(id, npos);
        self.set_size(id, nsize);
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{add_box, scene_with_area};
    use crate::*;
    use canvas_core::Bounds;
    use glam::Vec2;
    use rstest::rstest;

    #[test]
    fn test_box_handles_sit_on_the_bounds() {
        let (mut scene, area) = scene_with_area();
        let item = add_box(&mut scene, area, 10.0, 20.0, 31.0, 11.0);
        let specs = scene.handle_specs(item);

        assert_eq!(specs.len(), 8);
        let at = |handle| {
            specs
                .iter()
                .find(|spec| spec.tag == HandleTag::Resize(handle))
                .unwrap()
                .position
        };
        assert_eq!(at(ResizeHandle::TopLeft), Vec2::new(10.0, 20.0));
        assert_eq!(at(ResizeHandle::Top), Vec2::new(26.0, 20.0));
        assert_eq!(at(ResizeHandle::BottomRight), Vec2::new(41.0, 31.0));
        assert!(specs.iter().all(|spec| spec.draggable));
    }

    #[rstest]
    #[case(ResizeHandle::BottomRight, Vec2::new(150.0, 140.0), Bounds::from_xywh(100.0, 100.0, 50.0, 40.0))]
    #[case(ResizeHandle::Right, Vec2::new(150.0, 500.0), Bounds::from_xywh(100.0, 100.0, 50.0, 20.0))]
    #[case(ResizeHandle::TopLeft, Vec2::new(90.0, 95.0), Bounds::from_xywh(90.0, 95.0, 30.0, 25.0))]
    // clamped to the minimum size of 10x10
    #[case(ResizeHandle::Left, Vec2::new(200.0, 0.0), Bounds::from_xywh(110.0, 100.0, 10.0, 20.0))]
    #[case(ResizeHandle::Bottom, Vec2::new(0.0, 50.0), Bounds::from_xywh(100.0, 100.0, 20.0, 10.0))]
    fn test_resize_handles(#[case] handle: ResizeHandle, #[case] pointer: Vec2, #[case] expected: Bounds) {
        let (mut scene, area) = scene_with_area();
        let item = add_box(&mut scene, area, 100.0, 100.0, 20.0, 20.0);

        assert!(scene.drag_handle(item, HandleTag::Resize(handle), pointer, None, true, None));
        assert_eq!(scene.get(item).unwrap().bounds(), expected);
    }

    #[test]
    fn test_resize_is_clamped_to_area_and_snapped() {
        let (mut scene, area) = scene_with_area();
        let item = add_box(&mut scene, area, 900.0, 100.0, 20.0, 20.0);

        scene.drag_handle(item, HandleTag::Resize(ResizeHandle::Right), Vec2::new(2000.0, 0.0), None, true, None);
        assert_eq!(scene.get(item).unwrap().bounds().max.x, 1000.0);

        scene.drag_handle(item, HandleTag::Resize(ResizeHandle::BottomRight), Vec2::new(963.0, 137.0), None, true, Some(10.0));
        assert_eq!(scene.get(item).unwrap().bounds(), Bounds::from_xywh(900.0, 100.0, 60.0, 40.0));
    }

    #[test]
    fn test_constrainer_and_fixed_axes() {
        let (mut scene, area) = scene_with_area();
        let item = add_box(&mut scene, area, 0.0, 0.0, 20.0, 20.0);
        scene.update_flags(item, |flags| flags.v_resizable = false);
        scene.set_drag_constrainer(
            item,
            Some(Box::new(|_: ResizeHandle, _: &mut Vec2, size: &mut Vec2| {
                size.x = size.x.min(60.0)
            })),
        );

        scene.drag_handle(item, HandleTag::Resize(ResizeHandle::BottomRight), Vec2::new(100.0, 100.0), None, true, None);
        assert_eq!(scene.get(item).unwrap().size(), Vec2::new(60.0, 20.0));
    }
}
