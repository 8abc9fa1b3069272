//! The interaction layer: handles, marquee selection and the active-area overlay.
//!
//! It sits above every content layer and sees pointer events first. Handle
//! drags and marquee selection win over item interaction; anything else is
//! reported as ignored so the view can offer the event to items.

use crate::selection::SelectMode;
use canvas_core::draw::draw_glow;
use canvas_core::input::{Modifiers, MouseButton};
use canvas_core::{Bounds, Color, Surface};
use glam::Vec2;
use scene_graph::{HandleTag, ItemId, ItemType, RenderContext, Scene};
use smallvec::SmallVec;

/// Handle edge length in window pixels
pub const HANDLE_SIZE: f32 = 6.0;

const ACTIVE_AREA_DIM: Color = Color::rgba(0.0, 0.0, 0.0, 0.3);

/// A draggable marker on the focused item, in root coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemHandle {
    pub item: ItemId,
    pub tag: HandleTag,
    pub position: Vec2,
    pub draggable: bool,
    pub highlighted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InteractionResult {
    Ignored,
    Handled,
    /// A marquee was released over `rect` (root coordinates)
    SelectInside { rect: Bounds, mode: SelectMode },
}

pub struct InteractionLayer {
    handles: SmallVec<[ItemHandle; 8]>,
    dragging_handle: Option<usize>,
    drop_target: Option<ItemId>,
    marquee: Option<(Vec2, Vec2)>,
    active_area: Option<Bounds>,
    dirty: Option<Bounds>,
    zoom: f32,
}

impl Default for InteractionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionLayer {
    pub fn new() -> Self {
        Self {
            handles: SmallVec::new(),
            dragging_handle: None,
            drop_target: None,
            marquee: None,
            active_area: None,
            dirty: None,
            zoom: 1.0,
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
    }

    pub fn handles(&self) -> &[ItemHandle] {
        &self.handles
    }

    pub fn handle_item(&self) -> Option<ItemId> {
        self.handles.first().map(|handle| handle.item)
    }

    pub fn is_dragging_handle(&self) -> bool {
        self.dragging_handle.is_some()
    }

    pub fn marquee(&self) -> Option<Bounds> {
        self.marquee.map(|(start, end)| Bounds::from_corners(start, end))
    }

    pub fn active_area(&self) -> Option<Bounds> {
        self.active_area
    }

    /// Dims everything outside `area`; `None` removes the overlay
    pub fn set_active_area(&mut self, area: Option<Bounds>, total: Bounds) {
        if self.active_area != area {
            self.active_area = area;
            self.invalidate(total);
        }
    }

    /// Region that changed since the last call, in root coordinates
    pub fn take_dirty(&mut self) -> Option<Bounds> {
        self.dirty.take()
    }

    fn invalidate(&mut self, bounds: Bounds) {
        self.dirty = Some(match self.dirty {
            Some(dirty) => dirty.union(&bounds),
            None => bounds,
        });
    }

    fn handle_bounds(&self, position: Vec2) -> Bounds {
        let half = HANDLE_SIZE / 2.0 / self.zoom;
        Bounds::new(position - Vec2::splat(half), position + Vec2::splat(half))
    }

    fn invalidate_handles(&mut self) {
        let covered = self
            .handles
            .iter()
            .map(|handle| self.handle_bounds(handle.position).expand(1.0))
            .reduce(|a, b| a.union(&b));
        if let Some(covered) = covered {
            self.invalidate(covered);
        }
    }

    /// Replaces the handles with those of `item`
    pub fn show_handles(&mut self, scene: &Scene, item: ItemId) {
        self.invalidate_handles();
        self.handles = scene
            .handle_specs(item)
            .into_iter()
            .map(|spec| ItemHandle {
                item,
                tag: spec.tag,
                position: spec.position,
                draggable: spec.draggable,
                highlighted: false,
            })
            .collect();
        self.dragging_handle = None;
        self.invalidate_handles();
    }

    /// Moves the handles after their item changed geometry
    pub fn refresh_handles(&mut self, scene: &Scene) {
        let Some(item) = self.handle_item() else {
            return;
        };
        let dragging = self.dragging_handle.map(|index| self.handles[index].tag);
        self.show_handles(scene, item);
        self.dragging_handle = dragging.and_then(|tag| self.handles.iter().position(|h| h.tag == tag));
    }

    pub fn clear_handles(&mut self) {
        self.invalidate_handles();
        self.handles.clear();
        self.dragging_handle = None;
        self.drop_target = None;
    }

    /// Index of the handle under `point` (root coordinates)
    pub fn handle_at(&self, point: Vec2) -> Option<usize> {
        self.handles
            .iter()
            .position(|handle| self.handle_bounds(handle.position).contains_point(point))
    }

    /// Top-priority pass, offered every button event before items see it
    pub fn handle_mouse_button_top(
        &mut self,
        scene: &mut Scene,
        layer_roots: &[ItemId],
        button: MouseButton,
        press: bool,
        point: Vec2,
        modifiers: Modifiers,
        grid: Option<f32>,
    ) -> InteractionResult {
        if button != MouseButton::Left {
            return InteractionResult::Ignored;
        }
        if press {
            return match self.handle_at(point) {
                Some(index) if self.handles[index].draggable => {
                    log::debug!("dragging {:?} handle", self.handles[index].tag);
                    self.dragging_handle = Some(index);
                    InteractionResult::Handled
                }
                _ => InteractionResult::Ignored,
            };
        }

        if let Some(index) = self.dragging_handle.take() {
            let handle = self.handles[index];
            let target = self.drop_target_at(scene, layer_roots, handle, point);
            scene.drag_handle(handle.item, handle.tag, point, target, false, grid);
            self.set_drop_target(scene, None);
            self.refresh_handles(scene);
            return InteractionResult::Handled;
        }

        if let Some(rect) = self.marquee() {
            self.marquee = None;
            self.invalidate(rect.expand(1.0));
            let mode = if modifiers.shift {
                SelectMode::Add
            } else if modifiers.control || modifiers.command {
                SelectMode::Toggle
            } else {
                SelectMode::Replace
            };
            return InteractionResult::SelectInside { rect, mode };
        }
        InteractionResult::Ignored
    }

    /// Fallback pass for presses no item claimed: starts a marquee
    pub fn handle_mouse_button_bottom(&mut self, button: MouseButton, press: bool, point: Vec2) -> bool {
        if button != MouseButton::Left || !press {
            return false;
        }
        self.marquee = Some((point, point));
        true
    }

    pub fn handle_mouse_move(
        &mut self,
        scene: &mut Scene,
        layer_roots: &[ItemId],
        point: Vec2,
        grid: Option<f32>,
    ) -> bool {
        if let Some(index) = self.dragging_handle {
            let handle = self.handles[index];
            let target = self.drop_target_at(scene, layer_roots, handle, point);
            scene.drag_handle(handle.item, handle.tag, point, target, true, grid);
            self.set_drop_target(scene, target);
            self.refresh_handles(scene);
            return true;
        }

        if let Some((start, end)) = self.marquee {
            self.invalidate(Bounds::from_corners(start, end).expand(1.0));
            self.marquee = Some((start, point));
            self.invalidate(Bounds::from_corners(start, point).expand(1.0));
            return true;
        }

        let hovered = self.handle_at(point);
        let mut changed = Vec::new();
        for (index, handle) in self.handles.iter_mut().enumerate() {
            let highlighted = hovered == Some(index);
            if handle.highlighted != highlighted {
                handle.highlighted = highlighted;
                changed.push(handle.position);
            }
        }
        for position in changed {
            self.invalidate(self.handle_bounds(position).expand(1.0));
        }
        false
    }

    /// Item a line end would attach to if dropped at `point`
    fn drop_target_at(
        &self,
        scene: &Scene,
        layer_roots: &[ItemId],
        handle: ItemHandle,
        point: Vec2,
    ) -> Option<ItemId> {
        if !matches!(handle.tag, HandleTag::LineStart | HandleTag::LineEnd) {
            return None;
        }
        layer_roots.iter().find_map(|&root| {
            let local = scene.convert_point_from(root, point, None);
            scene.children(root).iter().copied().find(|&child| {
                child != handle.item
                    && scene
                        .get(child)
                        .is_some_and(|item| item.is_visible() && item.item_type() != ItemType::Line)
                    && scene.item_contains_point(child, local)
            })
        })
    }

    fn set_drop_target(&mut self, scene: &Scene, target: Option<ItemId>) {
        if self.drop_target == target {
            return;
        }
        for item in [self.drop_target, target].into_iter().flatten() {
            self.invalidate(scene.root_bounds(item).expand(6.0));
        }
        self.drop_target = target;
    }

    /// Paints the overlay in canvas coordinates
    pub fn repaint(&self, scene: &Scene, surface: &mut dyn Surface, ctx: &RenderContext, total: &Bounds) {
        surface.save();
        surface.new_path();

        if let Some(active) = self.active_area {
            // the four bands around the active area
            let bands = [
                Bounds::new(total.min, Vec2::new(total.max.x, active.min.y)),
                Bounds::new(Vec2::new(total.min.x, active.max.y), total.max),
                Bounds::new(
                    Vec2::new(total.min.x, active.min.y),
                    Vec2::new(active.min.x, active.max.y),
                ),
                Bounds::new(
                    Vec2::new(active.max.x, active.min.y),
                    Vec2::new(total.max.x, active.max.y),
                ),
            ];
            for band in bands.iter().filter(|band| !band.is_empty()) {
                surface.rectangle(band);
            }
            surface.set_color(ACTIVE_AREA_DIM);
            surface.fill();
        }

        if let Some(target) = self.drop_target {
            draw_glow(surface, &scene.root_bounds(target), ctx.highlight_color);
        }

        let hairline = 1.0 / self.zoom;
        if let Some(rect) = self.marquee() {
            surface.rectangle(&rect);
            surface.set_color(ctx.selection_color.with_alpha(0.2));
            surface.fill_preserve();
            surface.set_color(ctx.selection_color.with_alpha(0.8));
            surface.set_line_width(hairline);
            surface.stroke();
        }

        surface.set_line_width(hairline);
        for handle in &self.handles {
            let fill = match (handle.draggable, handle.highlighted) {
                (false, _) => Color::rgb(0.7, 0.7, 0.7),
                (true, true) => ctx.hover_color,
                (true, false) => Color::WHITE,
            };
            surface.rectangle(&self.handle_bounds(handle.position));
            surface.set_color(fill);
            surface.fill_preserve();
            surface.set_color(ctx.selection_color);
            surface.stroke();
        }
        surface.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::{DrawCommand, RecordingSurface};
    use scene_graph::{
        Connector, LayerId, MagnetRef, RectFigure, ResizeHandle, StraightLayouter,
    };

    fn scene_with_box() -> (Scene, ItemId, ItemId) {
        let mut scene = Scene::new();
        let area = scene.create_area(LayerId::default());
        scene.set_size(area, Vec2::new(1000.0, 1000.0));
        let item = scene.create_figure(LayerId::default(), RectFigure::default());
        scene.set_auto_sizing(item, false);
        scene.add(area, item);
        scene.set_bounds(item, Bounds::from_xywh(100.0, 100.0, 40.0, 20.0));
        (scene, area, item)
    }

    #[test]
    fn test_handle_hit_area_shrinks_with_zoom() {
        let (scene, _, item) = scene_with_box();
        let mut layer = InteractionLayer::new();
        layer.show_handles(&scene, item);
        assert_eq!(layer.handles().len(), 8);

        assert!(layer.handle_at(Vec2::new(102.5, 102.5)).is_some());
        layer.set_zoom(4.0);
        assert!(layer.handle_at(Vec2::new(102.5, 102.5)).is_none());
        assert!(layer.handle_at(Vec2::new(100.5, 100.5)).is_some());
    }

    #[test]
    fn test_resize_through_handle_drag() {
        let (mut scene, area, item) = scene_with_box();
        let mut layer = InteractionLayer::new();
        layer.show_handles(&scene, item);
        let roots = [area];

        let corner = layer
            .handles()
            .iter()
            .find(|h| h.tag == HandleTag::Resize(ResizeHandle::BottomRight))
            .unwrap()
            .position;
        let result = layer.handle_mouse_button_top(
            &mut scene,
            &roots,
            MouseButton::Left,
            true,
            corner,
            Modifiers::none(),
            None,
        );
        assert_eq!(result, InteractionResult::Handled);

        assert!(layer.handle_mouse_move(&mut scene, &roots, Vec2::new(180.0, 150.0), None));
        let result = layer.handle_mouse_button_top(
            &mut scene,
            &roots,
            MouseButton::Left,
            false,
            Vec2::new(180.0, 150.0),
            Modifiers::none(),
            None,
        );
        assert_eq!(result, InteractionResult::Handled);
        assert_eq!(scene.get(item).unwrap().bounds(), Bounds::from_xywh(100.0, 100.0, 80.0, 50.0));
        // handles followed the item
        assert!(layer
            .handles()
            .iter()
            .any(|h| h.position == Vec2::new(180.0, 150.0)));
        assert!(!layer.is_dragging_handle());
    }

    #[test]
    fn test_marquee_reports_mode_from_modifiers() {
        let (mut scene, area, _) = scene_with_box();
        let mut layer = InteractionLayer::new();
        let roots = [area];

        assert!(layer.handle_mouse_button_bottom(MouseButton::Left, true, Vec2::new(10.0, 10.0)));
        assert!(layer.handle_mouse_move(&mut scene, &roots, Vec2::new(200.0, 150.0), None));
        assert!(layer.take_dirty().is_some());

        let result = layer.handle_mouse_button_top(
            &mut scene,
            &roots,
            MouseButton::Left,
            false,
            Vec2::new(200.0, 150.0),
            Modifiers::shift(),
            None,
        );
        assert_eq!(
            result,
            InteractionResult::SelectInside {
                rect: Bounds::from_xywh(10.0, 10.0, 190.0, 140.0),
                mode: SelectMode::Add,
            }
        );
        assert_eq!(layer.marquee(), None);
    }

    #[test]
    fn test_other_buttons_and_empty_space_are_ignored() {
        let (mut scene, area, item) = scene_with_box();
        let mut layer = InteractionLayer::new();
        layer.show_handles(&scene, item);

        for (button, point) in [
            (MouseButton::Right, Vec2::new(100.0, 100.0)),
            (MouseButton::Left, Vec2::new(500.0, 500.0)),
        ] {
            let result = layer.handle_mouse_button_top(
                &mut scene,
                &[area],
                button,
                true,
                point,
                Modifiers::none(),
                None,
            );
            assert_eq!(result, InteractionResult::Ignored);
        }
    }

    #[test]
    fn test_line_end_drop_reattaches_to_item_under_cursor() {
        let (mut scene, area, item) = scene_with_box();
        let other = scene.create_figure(LayerId::default(), RectFigure::default());
        scene.set_auto_sizing(other, false);
        scene.add(area, other);
        scene.set_bounds(other, Bounds::from_xywh(400.0, 100.0, 40.0, 20.0));
        let line = scene.create_line(LayerId::default());
        scene.add(area, line);
        scene.set_line_layouter(
            line,
            StraightLayouter::new(
                Connector::attached(item, MagnetRef::Bounds),
                Connector::free(Vec2::new(300.0, 300.0)),
            ),
        );

        let mut layer = InteractionLayer::new();
        layer.show_handles(&scene, line);
        let end = layer
            .handles()
            .iter()
            .find(|h| h.tag == HandleTag::LineEnd)
            .unwrap()
            .position;
        let roots = [area];
        layer.handle_mouse_button_top(&mut scene, &roots, MouseButton::Left, true, end, Modifiers::none(), None);
        layer.handle_mouse_move(&mut scene, &roots, Vec2::new(420.0, 110.0), None);

        let mut surface = RecordingSurface::new();
        layer.repaint(&scene, &mut surface, &RenderContext::default(), &Bounds::from_xywh(0.0, 0.0, 1000.0, 1000.0));
        assert!(surface
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::Stroke { width, .. } if *width == 5.0)));

        layer.handle_mouse_button_top(
            &mut scene,
            &roots,
            MouseButton::Left,
            false,
            Vec2::new(420.0, 110.0),
            Modifiers::none(),
            None,
        );
        let vertices = scene.get(line).unwrap().as_line().unwrap().vertices().to_vec();
        // the end now sits on the left border of the other box
        assert_eq!(vertices.last().unwrap().x, 400.0);
    }

    #[test]
    fn test_active_area_dims_outside() {
        let mut layer = InteractionLayer::new();
        let total = Bounds::from_xywh(0.0, 0.0, 100.0, 100.0);
        layer.set_active_area(Some(Bounds::from_xywh(20.0, 20.0, 50.0, 50.0)), total);
        assert_eq!(layer.take_dirty(), Some(total));

        let scene = Scene::new();
        let mut surface = RecordingSurface::new();
        layer.repaint(&scene, &mut surface, &RenderContext::default(), &total);
        let DrawCommand::Fill { path, color, .. } = &surface.commands()[0] else {
            panic!("expected the dimming fill");
        };
        assert_eq!(*color, ACTIVE_AREA_DIM);
        assert_eq!(path.subpaths.len(), 4);
    }
}
