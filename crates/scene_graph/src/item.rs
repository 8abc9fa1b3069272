//! Scene items and the data every node in the arena carries.

use crate::figure::Figure;
use crate::group::GroupData;
use crate::handle::ResizeHandle;
use crate::line::LineData;
use crate::stack::StackData;
use canvas_core::{Bitmap, Bounds, Color};
use glam::Vec2;
use slotmap::KeyData;
use smallvec::SmallVec;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicUsize, Ordering};
use strum_macros::Display;

slotmap::new_key_type! {
    /// Identifies an item in a [`Scene`](crate::Scene)
    pub struct ItemId;

    /// Identifies a layer. Layers live in the canvas; items only remember
    /// which one owns them so invalidations can be routed.
    pub struct LayerId;
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(KeyData::from_ffi(value))
    }
}

impl ItemId {
    pub fn as_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

/// Extra room around an item's bounds that caches and repaints cover, so
/// shadows and state rings drawn outside the item are not cut off.
pub const OUTER_PAD: f32 = 4.0;

static LIVE_ITEMS: AtomicUsize = AtomicUsize::new(0);

/// Number of items currently alive across all scenes
pub fn live_item_count() -> usize {
    LIVE_ITEMS.load(Ordering::Relaxed)
}

/// Stable type tag used instead of downcasting
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ItemType {
    Figure,
    Group,
    Area,
    Stack,
    Line,
}

impl ItemType {
    /// Groups, areas and stacks hold other items
    pub fn is_container(self) -> bool {
        matches!(self, ItemType::Group | ItemType::Area | ItemType::Stack)
    }

    /// Items whose geometry comes from a layout strategy
    pub fn is_routable(self) -> bool {
        self == ItemType::Line
    }
}

/// Visual state, in decreasing priority
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum ItemState {
    Disabled,
    Hovering,
    Highlighted,
    Selected,
    Normal,
}

/// Capability and behavior switches of an item
#[derive(Clone, Debug, PartialEq)]
pub struct ItemFlags {
    pub visible: bool,
    pub accepts_focus: bool,
    pub accepts_selection: bool,
    pub draggable: bool,
    pub draws_hover: bool,
    pub h_resizable: bool,
    pub v_resizable: bool,
    pub auto_sizing: bool,
    /// Top-level items keep a rendered copy of themselves between frames
    pub cache_toplevel_contents: bool,
    pub has_shadow: bool,
    /// Whether selection/hover rings are drawn for this item
    pub draw_state: bool,
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self {
            visible: true,
            accepts_focus: false,
            accepts_selection: false,
            draggable: false,
            draws_hover: false,
            h_resizable: true,
            v_resizable: true,
            auto_sizing: true,
            cache_toplevel_contents: true,
            has_shadow: false,
            draw_state: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DisplayListId(pub u32);

/// A GPU-side copy of an item's rendering
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureCache {
    pub texture: TextureId,
    /// Allocated texture size in pixels, a power of two per axis
    pub texture_size: Vec2,
    /// Pixels actually covered by the item
    pub content_size: Vec2,
    pub display_list: Option<DisplayListId>,
}

/// Which magnet of an item a connector is attached to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MagnetRef {
    /// The implicit magnet anywhere on the item's border
    Bounds,
    /// A fixed magnet, by index in the item's magnet list
    Fixed(usize),
}

/// Item-specific data
pub enum ItemKind {
    Figure(Box<dyn Figure>),
    Group(GroupData),
    Stack(StackData),
    Line(LineData),
}

impl fmt::Debug for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Figure(figure) => write!(f, "Figure({})", figure.name()),
            ItemKind::Group(group) => f.debug_tuple("Group").field(group).finish(),
            ItemKind::Stack(stack) => f.debug_tuple("Stack").field(stack).finish(),
            ItemKind::Line(line) => f.debug_tuple("Line").field(line).finish(),
        }
    }
}

/// Adjusts a resize in progress: handle, new position, new size
pub type DragConstrainer = Box<dyn Fn(ResizeHandle, &mut Vec2, &mut Vec2) + Send>;

/// A node in the scene arena
///
/// Geometry is local: `position` is relative to the parent's origin. All
/// mutation goes through [`Scene`](crate::Scene) so that invalidation and
/// notifications are never skipped.
pub struct Item {
    pub(crate) parent: Option<ItemId>,
    pub(crate) layer: LayerId,
    pub(crate) kind: ItemKind,
    pub(crate) position: Vec2,
    pub(crate) size: Vec2,
    pub(crate) flags: ItemFlags,

    pub(crate) selected: bool,
    pub(crate) focused: bool,
    pub(crate) hovering: bool,
    pub(crate) highlighted: bool,
    pub(crate) disabled: bool,
    pub(crate) highlight_color: Option<Color>,
    pub(crate) tag: String,

    /// Per axis, negative means unset
    pub(crate) fixed_size: Vec2,
    pub(crate) fixed_min_size: Vec2,
    pub(crate) padding: Vec2,
    pub(crate) min_size_memo: Option<Vec2>,

    pub(crate) needs_render: bool,
    pub(crate) bitmap_cache: Option<Bitmap>,
    pub(crate) texture: Option<TextureCache>,
    pub(crate) last_repaint_bounds: Option<Bounds>,

    pub(crate) magnets: SmallVec<[Vec2; 4]>,
    pub(crate) constrainer: Option<DragConstrainer>,

    pub(crate) press_position: Vec2,
    pub(crate) dragged: bool,
}

impl Item {
    pub(crate) fn new(layer: LayerId, kind: ItemKind) -> Self {
        LIVE_ITEMS.fetch_add(1, Ordering::Relaxed);

        let mut flags = ItemFlags::default();
        if let ItemKind::Line(_) = kind {
            flags.accepts_focus = true;
            flags.accepts_selection = true;
            flags.auto_sizing = false;
        }
        if let ItemKind::Group(_) = kind {
            flags.auto_sizing = false;
        }

        Self {
            parent: None,
            layer,
            kind,
            position: Vec2::ZERO,
            size: Vec2::ZERO,
            flags,
            selected: false,
            focused: false,
            hovering: false,
            highlighted: false,
            disabled: false,
            highlight_color: None,
            tag: String::new(),
            fixed_size: Vec2::splat(-1.0),
            fixed_min_size: Vec2::splat(-1.0),
            padding: Vec2::ZERO,
            min_size_memo: None,
            needs_render: true,
            bitmap_cache: None,
            texture: None,
            last_repaint_bounds: None,
            magnets: SmallVec::new(),
            constrainer: None,
            press_position: Vec2::ZERO,
            dragged: false,
        }
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn item_type(&self) -> ItemType {
        match &self.kind {
            ItemKind::Figure(_) => ItemType::Figure,
            ItemKind::Group(group) if group.is_area => ItemType::Area,
            ItemKind::Group(_) => ItemType::Group,
            ItemKind::Stack(_) => ItemType::Stack,
            ItemKind::Line(_) => ItemType::Line,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Bounds in the parent's coordinates
    pub fn bounds(&self) -> Bounds {
        Bounds::from_origin_size(self.position, self.size)
    }

    pub fn flags(&self) -> &ItemFlags {
        &self.flags
    }

    pub fn is_visible(&self) -> bool {
        self.flags.visible
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn highlight_color(&self) -> Option<Color> {
        self.highlight_color
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn padding(&self) -> Vec2 {
        self.padding
    }

    pub fn fixed_size(&self) -> Vec2 {
        self.fixed_size
    }

    pub fn state(&self) -> ItemState {
        if self.disabled {
            ItemState::Disabled
        } else if self.hovering && self.flags.draws_hover {
            ItemState::Hovering
        } else if self.highlighted {
            ItemState::Highlighted
        } else if self.selected {
            ItemState::Selected
        } else {
            ItemState::Normal
        }
    }

    /// Children of groups and stacks; empty for everything else
    pub fn children(&self) -> &[ItemId] {
        match &self.kind {
            ItemKind::Group(group) => &group.children,
            ItemKind::Stack(stack) => &stack.children,
            _ => &[],
        }
    }

    pub fn as_group(&self) -> Option<&GroupData> {
        match &self.kind {
            ItemKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_stack(&self) -> Option<&StackData> {
        match &self.kind {
            ItemKind::Stack(stack) => Some(stack),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineData> {
        match &self.kind {
            ItemKind::Line(line) => Some(line),
            _ => None,
        }
    }

    pub(crate) fn as_line_mut(&mut self) -> Option<&mut LineData> {
        match &mut self.kind {
            ItemKind::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_figure(&self) -> Option<&dyn Figure> {
        match &self.kind {
            ItemKind::Figure(figure) => Some(figure.as_ref()),
            _ => None,
        }
    }

    pub fn as_figure_mut(&mut self) -> Option<&mut (dyn Figure + 'static)> {
        match &mut self.kind {
            ItemKind::Figure(figure) => Some(figure.as_mut()),
            _ => None,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self.kind, ItemKind::Line(_))
    }

    /// Fixed magnet offsets in local coordinates
    pub fn magnets(&self) -> &[Vec2] {
        &self.magnets
    }

    // Render cache state. Renderers own the policy; the item only stores it.

    /// Contents changed since the cache was produced
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn clear_needs_render(&mut self) {
        self.needs_render = false;
    }

    pub fn bitmap_cache(&self) -> Option<&Bitmap> {
        self.bitmap_cache.as_ref()
    }

    /// Replaces the CPU cache, returning the previous one
    pub fn replace_bitmap_cache(&mut self, bitmap: Option<Bitmap>) -> Option<Bitmap> {
        std::mem::replace(&mut self.bitmap_cache, bitmap)
    }

    pub fn texture(&self) -> Option<&TextureCache> {
        self.texture.as_ref()
    }

    pub fn replace_texture(&mut self, texture: Option<TextureCache>) -> Option<TextureCache> {
        std::mem::replace(&mut self.texture, texture)
    }

    /// Drag bookkeeping used by the canvas's default press/drag handling
    pub fn press_position(&self) -> Vec2 {
        self.press_position
    }

    pub fn set_press_position(&mut self, position: Vec2) {
        self.press_position = position;
    }

    pub fn was_dragged(&self) -> bool {
        self.dragged
    }

    pub fn set_dragged(&mut self, dragged: bool) {
        self.dragged = dragged;
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        LIVE_ITEMS.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("type", &self.item_type())
            .field("parent", &self.parent)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
