//! Content layers.
//!
//! A layer owns a root area in the scene and a queue of top-level items that
//! must recompute their size before the next paint. Layers are painted back to
//! front by the view; within a layer, groups paint their children back to front.

use crate::renderer::{CacheLedger, Renderer};
use canvas_core::{Bounds, Surface};
use glam::Vec2;
use scene_graph::{ItemId, ItemType, LayerId, RenderContext, Scene};

pub struct Layer {
    name: String,
    root: ItemId,
    visible: bool,
    relayout_queue: Vec<ItemId>,
}

impl Layer {
    /// Creates the layer's root area, sized to `size`
    pub fn new(scene: &mut Scene, id: LayerId, name: impl Into<String>, size: Vec2) -> Self {
        let root = scene.create_area(id);
        scene.set_size(root, size);
        Self {
            name: name.into(),
            root,
            visible: true,
            relayout_queue: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Queues a top-level item for relayout; duplicates are ignored
    ///
    /// # Panics
    ///
    /// Panics if `item` is not a direct child of a group.
    pub fn queue_relayout(&mut self, scene: &Scene, item: ItemId) {
        assert!(
            scene.is_toplevel(item),
            "only top-level items can be queued for relayout in layer {}",
            self.name
        );
        if !self.relayout_queue.contains(&item) {
            self.relayout_queue.push(item);
        }
    }

    pub fn has_pending_relayout(&self) -> bool {
        !self.relayout_queue.is_empty()
    }

    /// Drops a destroyed item from the queue
    pub fn forget(&mut self, item: ItemId) {
        self.relayout_queue.retain(|queued| *queued != item);
    }

    /// Relayouts every queued item, in queue order
    pub fn flush_relayout(&mut self, scene: &mut Scene) {
        if self.relayout_queue.is_empty() {
            return;
        }
        let queue = std::mem::take(&mut self.relayout_queue);
        log::debug!("layer {}: relayout of {} items", self.name, queue.len());
        for item in queue {
            scene.relayout(item);
        }
    }

    /// Paints the layer's items that touch `clip` (root coordinates)
    pub fn repaint(
        &mut self,
        scene: &mut Scene,
        surface: &mut dyn Surface,
        renderer: &mut dyn Renderer,
        ctx: &RenderContext,
        clip: &Bounds,
        ledger: &mut CacheLedger,
    ) {
        if !self.visible {
            return;
        }
        self.flush_relayout(scene);
        repaint_group(scene, self.root, surface, renderer, ctx, clip, ledger);
    }

    /// Bounds of the root area's visible contents, in root coordinates
    pub fn content_bounds(&self, scene: &Scene) -> Option<Bounds> {
        let origin = scene.root_position(self.root);
        scene
            .children(self.root)
            .iter()
            .filter_map(|&child| scene.get(child))
            .filter(|item| item.is_visible())
            .map(|item| item.bounds().translate(origin))
            .reduce(|acc, bounds| acc.union(&bounds))
    }
}

/// `clip` is in the coordinates of `group`'s parent
fn repaint_group(
    scene: &mut Scene,
    group: ItemId,
    surface: &mut dyn Surface,
    renderer: &mut dyn Renderer,
    ctx: &RenderContext,
    clip: &Bounds,
    ledger: &mut CacheLedger,
) {
    let Some(position) = scene.get(group).map(|item| item.position()) else {
        return;
    };
    let clip = clip.translate(-position);
    surface.save();
    surface.translate(position);

    let children = scene.children(group).to_vec();
    for &child in children.iter().rev() {
        let Some(item) = scene.get(child) else {
            continue;
        };
        if !item.is_visible() || !item.bounds().expand(scene_graph::OUTER_PAD).intersects(&clip) {
            continue;
        }
        match item.item_type() {
            ItemType::Group | ItemType::Area => {
                repaint_group(scene, child, surface, renderer, ctx, &clip, ledger);
                let position = scene.get(child).map(|item| item.position()).unwrap_or_default();
                surface.save();
                surface.translate(position);
                scene.draw_state(child, surface, ctx);
                surface.restore();
            }
            _ => renderer.paint_item(scene, child, surface, ctx, ledger),
        }
    }
    surface.restore();
}
