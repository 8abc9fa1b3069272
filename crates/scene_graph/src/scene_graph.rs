//! # Scene Graph
//!
//! The scene graph holds every item of a diagram in one arena. Items refer to
//! each other through [`ItemId`] handles: containers list their children by id
//! and every item keeps a plain id back to its parent, so the hierarchy has a
//! single owner (the [`Scene`]) and no reference cycles.
//!
//! ## Key Concepts
//!
//! - **Groups**: ordered containers; the first child is the top of the z-order.
//!   An *area* group is the root of a layer (or a nested sub-area).
//! - **Top-level items**: direct children of a group. They are the unit of
//!   caching, relayout and repaint; invalidations on nested items propagate up to them.
//! - **Events**: mutations that other subsystems care about (repaints, relayouts,
//!   destroyed items) are queued as [`SceneEvent`]s and drained by the canvas.
//!
//! All geometry is local: an item's position is relative to its parent's origin.
//! "Root" coordinates are those of the outermost container, which the canvas
//! treats as canvas space.

pub mod events;
pub mod figure;
pub mod group;
pub mod handle;
pub mod item;
pub mod layouter;
pub mod line;
pub mod magnet;
pub mod render;
pub mod stack;

pub use events::SceneEvent;
pub use figure::{Figure, ItemEvent, ItemEventKind, RectFigure, TextFigure};
pub use group::GroupData;
pub use handle::{HandleSpec, HandleTag, ResizeHandle};
pub use item::{
    live_item_count, DisplayListId, DragConstrainer, Item, ItemFlags, ItemId, ItemKind,
    ItemState, ItemType, LayerId, MagnetRef, TextureCache, TextureId, OUTER_PAD,
};
pub use layouter::{Connector, ConnectorTarget, LineLayouter, OrthogonalLayouter, StraightLayouter};
pub use line::{LineData, LineEnd, LinePattern, SegmentPoint, HOP_RADIUS, LINE_HIT_THRESHOLD};
pub use render::RenderContext;
pub use stack::{Orientation, StackData};

use canvas_core::{Bounds, Color};
use glam::Vec2;
use slotmap::SlotMap;

/// Owner of all scene items
///
/// Every mutation that affects rendering or layout goes through a `Scene`
/// method, which performs the follow-up work (parent bounds, connected lines)
/// directly and queues [`SceneEvent`]s for the canvas.
#[derive(Default)]
pub struct Scene {
    items: SlotMap<ItemId, Item>,
    events: Vec<SceneEvent>,
    /// Lines whose layout is being applied, so connected lines cannot recurse
    routing: Vec<ItemId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, layer: LayerId, kind: ItemKind) -> ItemId {
        self.items.insert(Item::new(layer, kind))
    }

    /// Creates an unparented item drawing `figure`
    pub fn create_figure(&mut self, layer: LayerId, figure: impl Figure + 'static) -> ItemId {
        self.insert(layer, ItemKind::Figure(Box::new(figure)))
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    /// Direct access for renderers managing an item's caches
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items.iter()
    }

    /// Drains the queued notifications
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub(crate) fn emit(&mut self, event: SceneEvent) {
        self.events.push(event);
    }

    // Hierarchy

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.items.get(id).and_then(|item| item.parent)
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.items.get(id).map(|item| item.children()).unwrap_or(&[])
    }

    /// An item is top-level when its parent is a group or an area
    pub fn is_toplevel(&self, id: ItemId) -> bool {
        self.parent(id)
            .and_then(|parent| self.items.get(parent))
            .is_some_and(|parent| matches!(parent.kind, ItemKind::Group(_)))
    }

    /// The top-level item containing `id` (possibly `id` itself)
    pub fn toplevel(&self, id: ItemId) -> Option<ItemId> {
        let mut current = id;
        loop {
            if self.is_toplevel(current) {
                return Some(current);
            }
            current = self.parent(current)?;
        }
    }

    /// `true` if `ancestor` is `item` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: ItemId, item: ItemId) -> bool {
        let mut current = Some(item);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// `id` followed by its ancestors, innermost first
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut chain = Vec::new();
        let mut current = self.contains(id).then_some(id);
        while let Some(item) = current {
            chain.push(item);
            current = self.parent(item);
        }
        chain
    }

    pub fn common_ancestor(&self, a: ItemId, b: ItemId) -> Option<ItemId> {
        let chain = self.ancestors(a);
        let mut current = self.contains(b).then_some(b);
        while let Some(item) = current {
            if chain.contains(&item) {
                return Some(item);
            }
            current = self.parent(item);
        }
        None
    }

    // Coordinates

    /// Sum of positions from `id` up to, but not including, `ancestor`
    fn offset_to(&self, id: ItemId, ancestor: Option<ItemId>) -> Vec2 {
        let mut offset = Vec2::ZERO;
        let mut current = Some(id);
        while let Some(item_id) = current {
            if Some(item_id) == ancestor {
                break;
            }
            let Some(item) = self.items.get(item_id) else {
                break;
            };
            offset += item.position;
            current = item.parent;
        }
        offset
    }

    /// Position of the item's origin in root coordinates
    pub fn root_position(&self, id: ItemId) -> Vec2 {
        self.offset_to(id, None)
    }

    pub fn root_bounds(&self, id: ItemId) -> Bounds {
        let size = self.items.get(id).map(|item| item.size).unwrap_or_default();
        Bounds::from_origin_size(self.root_position(id), size)
    }

    /// Root bounds grown by [`OUTER_PAD`], clamped to non-negative coordinates
    pub fn padded_root_bounds(&self, id: ItemId) -> Bounds {
        let bounds = self.root_bounds(id).expand(OUTER_PAD);
        Bounds::new(bounds.min.max(Vec2::ZERO), bounds.max.max(Vec2::ZERO))
    }

    /// Converts `point` from `id`'s coordinates into `to`'s (root when `None`)
    pub fn convert_point_to(&self, id: ItemId, point: Vec2, to: Option<ItemId>) -> Vec2 {
        let Some(to) = to else {
            return point + self.root_position(id);
        };
        match self.common_ancestor(id, to) {
            Some(common) => point + self.offset_to(id, Some(common)) - self.offset_to(to, Some(common)),
            None => point + self.root_position(id) - self.root_position(to),
        }
    }

    /// Converts `point` from `from`'s coordinates (root when `None`) into `id`'s
    pub fn convert_point_from(&self, id: ItemId, point: Vec2, from: Option<ItemId>) -> Vec2 {
        let Some(from) = from else {
            return point - self.root_position(id);
        };
        self.convert_point_to(from, point, Some(id))
    }

    // Geometry

    /// Moves an item within its parent; positions are whole units
    pub fn set_position(&mut self, id: ItemId, position: Vec2) {
        let position = position.round();
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if item.position == position {
            return;
        }
        let delta = position - item.position;
        if let Some(line) = item.as_line_mut() {
            for vertex in line.vertices.iter_mut() {
                *vertex += delta;
            }
        }
        let size = item.size;
        self.apply_bounds(id, position, size);
        if self.items.get(id).is_some_and(|item| item.is_line()) {
            self.emit(SceneEvent::LineLayoutChanged { line: id });
        }
    }

    pub fn set_size(&mut self, id: ItemId, size: Vec2) {
        let Some(item) = self.items.get(id) else {
            return;
        };
        if item.size == size {
            return;
        }
        let position = item.position;
        self.apply_bounds(id, position, size);
    }

    pub fn set_bounds(&mut self, id: ItemId, bounds: Bounds) {
        self.set_position(id, bounds.origin());
        self.set_size(id, bounds.size());
    }

    /// Stores new geometry without rounding and runs the follow-up work
    pub(crate) fn apply_bounds(&mut self, id: ItemId, position: Vec2, size: Vec2) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        let old = item.bounds();
        let resized = item.size != size;
        item.position = position;
        item.size = size;

        if resized {
            if let ItemKind::Stack(_) = item.kind {
                self.layout_stack(id);
            }
        }
        self.set_needs_render(id);
        self.bounds_changed(id, old);
    }

    fn bounds_changed(&mut self, id: ItemId, old: Bounds) {
        self.emit(SceneEvent::BoundsChanged { item: id, old });

        if let Some(parent) = self.parent(id) {
            self.child_bounds_changed(parent);
        }
        self.relayout_connected_lines(id);
    }

    // Sizing

    /// Per-axis fixed size; a negative component leaves that axis free
    pub fn set_fixed_size(&mut self, id: ItemId, size: Vec2) {
        if let Some(item) = self.items.get_mut(id) {
            item.fixed_size = size;
            let current = item.size;
            let resized = Vec2::new(
                if size.x >= 0.0 { size.x } else { current.x },
                if size.y >= 0.0 { size.y } else { current.y },
            );
            self.set_size(id, resized);
            self.set_needs_relayout(id);
        }
    }

    pub fn set_fixed_min_size(&mut self, id: ItemId, size: Vec2) {
        if let Some(item) = self.items.get_mut(id) {
            item.fixed_min_size = size;
            self.set_needs_relayout(id);
        }
    }

    pub fn set_padding(&mut self, id: ItemId, padding: Vec2) {
        if let Some(item) = self.items.get_mut(id) {
            if item.padding != padding {
                item.padding = padding;
                self.set_needs_relayout(id);
            }
        }
    }

    pub fn set_auto_sizing(&mut self, id: ItemId, auto_sizing: bool) {
        if let Some(item) = self.items.get_mut(id) {
            if item.flags.auto_sizing != auto_sizing {
                item.flags.auto_sizing = auto_sizing;
                self.set_needs_relayout(id);
            }
        }
    }

    /// Minimum content size, memoized until the next relayout request
    pub fn min_size(&mut self, id: ItemId) -> Vec2 {
        let Some(item) = self.items.get(id) else {
            return Vec2::ZERO;
        };
        if let Some(memo) = item.min_size_memo {
            return memo;
        }
        let fixed = item.fixed_min_size;
        let calculated = match &item.kind {
            ItemKind::Figure(figure) => Some(figure.calc_min_size()),
            ItemKind::Stack(_) => None,
            ItemKind::Group(_) | ItemKind::Line(_) => Some(Vec2::ZERO),
        };
        let calculated = match calculated {
            Some(size) => size,
            None => self.stack_min_size(id),
        };
        let min = Vec2::new(
            if fixed.x >= 0.0 { fixed.x } else { calculated.x },
            if fixed.y >= 0.0 { fixed.y } else { calculated.y },
        );
        if let Some(item) = self.items.get_mut(id) {
            item.min_size_memo = Some(min);
        }
        min
    }

    /// Size the item takes when auto-sized: fixed axes, else minimum plus padding
    pub fn preferred_size(&mut self, id: ItemId) -> Vec2 {
        let min = self.min_size(id);
        let Some(item) = self.items.get(id) else {
            return Vec2::ZERO;
        };
        let (fixed, padding) = (item.fixed_size, item.padding);
        Vec2::new(
            if fixed.x >= 0.0 { fixed.x } else { min.x + padding.x * 2.0 },
            if fixed.y >= 0.0 { fixed.y } else { min.y + padding.y * 2.0 },
        )
    }

    pub fn auto_size(&mut self, id: ItemId) {
        let size = self.preferred_size(id);
        self.set_size(id, size);
    }

    /// Recomputes the item's size according to its sizing policy
    pub fn relayout(&mut self, id: ItemId) {
        let Some(item) = self.items.get(id) else {
            return;
        };
        if item.flags.auto_sizing {
            self.auto_size(id);
        } else {
            let (fixed, current) = (item.fixed_size, item.size);
            let size = Vec2::new(
                if fixed.x >= 0.0 { fixed.x } else { current.x },
                if fixed.y >= 0.0 { fixed.y } else { current.y },
            );
            self.set_size(id, size);
        }
        if let Some(ItemKind::Stack(_)) = self.items.get(id).map(|item| &item.kind) {
            self.layout_stack(id);
        }
    }

    // Flags and state

    /// Changes capability flags; rendering is refreshed afterwards
    pub fn update_flags(&mut self, id: ItemId, update: impl FnOnce(&mut ItemFlags)) {
        if let Some(item) = self.items.get_mut(id) {
            let before = item.flags.clone();
            update(&mut item.flags);
            if item.flags != before {
                if item.flags.auto_sizing != before.auto_sizing {
                    self.set_needs_relayout(id);
                }
                self.set_needs_render(id);
            }
        }
    }

    pub fn set_visible(&mut self, id: ItemId, visible: bool) {
        self.update_flags(id, |flags| flags.visible = visible);
    }

    /// Sets the raw selected flag. The canvas's selection keeps its set in sync.
    pub fn set_selected(&mut self, id: ItemId, selected: bool) {
        if let Some(item) = self.items.get_mut(id) {
            if item.selected != selected {
                item.selected = selected;
                self.set_needs_render(id);
            }
        }
    }

    pub fn set_focused(&mut self, id: ItemId, focused: bool) {
        if let Some(item) = self.items.get_mut(id) {
            if item.focused != focused {
                item.focused = focused;
                self.set_needs_render(id);
            }
        }
    }

    /// Returns `true` if the item redraws on hover changes
    pub fn set_hovering(&mut self, id: ItemId, hovering: bool) -> bool {
        let Some(item) = self.items.get_mut(id) else {
            return false;
        };
        if item.hovering == hovering {
            return false;
        }
        item.hovering = hovering;
        let redraw = item.flags.draws_hover;
        if redraw {
            self.set_needs_render(id);
        }
        redraw
    }

    /// Highlights with `color`, or with the canvas default when `None`
    pub fn set_highlighted(&mut self, id: ItemId, highlighted: bool, color: Option<Color>) {
        if let Some(item) = self.items.get_mut(id) {
            item.highlighted = highlighted;
            item.highlight_color = color;
            self.set_needs_render(id);
        }
    }

    pub fn set_disabled(&mut self, id: ItemId, disabled: bool) {
        if let Some(item) = self.items.get_mut(id) {
            if item.disabled != disabled {
                item.disabled = disabled;
                self.set_needs_render(id);
            }
        }
    }

    pub fn set_tag(&mut self, id: ItemId, tag: impl Into<String>) {
        if let Some(item) = self.items.get_mut(id) {
            item.tag = tag.into();
        }
    }

    /// Depth-first search below `root` (inclusive) for an item with `tag`
    pub fn find_item_with_tag(&self, root: ItemId, tag: &str) -> Option<ItemId> {
        let item = self.items.get(root)?;
        if item.tag == tag {
            return Some(root);
        }
        item.children()
            .iter()
            .find_map(|&child| self.find_item_with_tag(child, tag))
    }

    pub fn set_drag_constrainer(&mut self, id: ItemId, constrainer: Option<DragConstrainer>) {
        if let Some(item) = self.items.get_mut(id) {
            item.constrainer = constrainer;
        }
    }

    // Invalidation

    /// Marks the owning top-level item's cache stale and schedules a repaint
    pub fn set_needs_render(&mut self, id: ItemId) {
        let Some(toplevel) = self.toplevel(id) else {
            return;
        };
        if let Some(item) = self.items.get_mut(toplevel) {
            item.needs_render = true;
        }
        self.set_needs_repaint(toplevel);
    }

    /// Schedules a repaint of the item's padded root bounds, and of the area
    /// it covered at the previous request if that differs
    pub fn set_needs_repaint(&mut self, id: ItemId) {
        let bounds = self.padded_root_bounds(id);
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        let layer = item.layer;
        let previous = item.last_repaint_bounds.replace(bounds);
        if let Some(previous) = previous.filter(|previous| *previous != bounds) {
            self.emit(SceneEvent::RepaintRequested {
                layer,
                bounds: previous,
            });
        }
        self.emit(SceneEvent::RepaintRequested { layer, bounds });
    }

    /// Drops memoized sizes up to the top-level item and queues it for relayout
    pub fn set_needs_relayout(&mut self, id: ItemId) {
        let mut current = Some(id);
        while let Some(item_id) = current {
            let toplevel = self.is_toplevel(item_id);
            let Some(item) = self.items.get_mut(item_id) else {
                break;
            };
            item.min_size_memo = None;
            if toplevel {
                let layer = item.layer;
                self.emit(SceneEvent::RelayoutQueued {
                    layer,
                    item: item_id,
                });
                break;
            }
            current = item.parent;
        }
        self.set_needs_render(id);
    }

    /// Discards the CPU copy of an item's rendering, e.g. after a zoom change
    pub fn invalidate_cache(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        item.needs_render = true;
        if let Some(bitmap) = item.bitmap_cache.take() {
            let bytes = bitmap.byte_size();
            log::trace!("dropped {bytes} byte cache of item {id}");
            self.emit(SceneEvent::CacheReleased {
                bytes,
                texture: None,
            });
        }
    }

    pub fn invalidate_all_caches(&mut self) {
        let ids: Vec<ItemId> = self.items.keys().collect();
        for id in ids {
            self.invalidate_cache(id);
        }
    }

    // Lifetime

    /// Destroys an item and everything below it
    pub fn destroy(&mut self, id: ItemId) {
        if !self.contains(id) {
            return;
        }
        if let Some(parent) = self.parent(id) {
            self.remove(parent, id);
        }
        self.destroy_detached(id);
    }

    fn destroy_detached(&mut self, id: ItemId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.destroy_detached(child);
        }

        self.strip_hops_of(id);
        self.detach_connectors_from(id);

        let Some(item) = self.items.remove(id) else {
            return;
        };
        let bytes = item.bitmap_cache.as_ref().map(|b| b.byte_size()).unwrap_or(0);
        if bytes > 0 || item.texture.is_some() {
            self.emit(SceneEvent::CacheReleased {
                bytes,
                texture: item.texture,
            });
        }
        self.emit(SceneEvent::ItemDestroyed {
            item: id,
            layer: item.layer,
        });
    }
}
