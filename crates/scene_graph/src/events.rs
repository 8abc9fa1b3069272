use crate::item::{ItemId, LayerId, TextureCache};
use canvas_core::Bounds;

/// Notifications queued by the scene for the canvas
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// `bounds` (root coordinates) must be repainted
    RepaintRequested { layer: LayerId, bounds: Bounds },
    /// A top-level item must recompute its size before the next paint
    RelayoutQueued { layer: LayerId, item: ItemId },
    /// Position or size changed; `old` is in the parent's coordinates
    BoundsChanged { item: ItemId, old: Bounds },
    /// A line's segments changed and crossings need to be re-marked
    LineLayoutChanged { line: ItemId },
    /// A render cache was freed
    CacheReleased {
        bytes: usize,
        texture: Option<TextureCache>,
    },
    ItemDestroyed { item: ItemId, layer: LayerId },
}
