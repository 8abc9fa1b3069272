//! The canvas view: the composition root.
//!
//! A [`CanvasView`] owns the scene, the content layers, the background and
//! interaction layers, the selection and the renderer. It maps window
//! coordinates to canvas coordinates, dispatches input to items and turns the
//! scene's notifications into repaint requests.

use crate::background::BackgroundLayer;
use crate::config::CanvasConfig;
use crate::interaction::{InteractionLayer, InteractionResult};
use crate::layer::Layer;
use crate::renderer::{CacheLedger, ImmediateRenderer, Renderer};
use crate::selection::{SelectMode, Selection};
use canvas_core::algorithms::{snap_size_to_grid, snap_to_grid};
use canvas_core::input::{ButtonEvent, KeyEvent, Modifiers, MotionEvent, MouseButton};
use canvas_core::{Bounds, CanvasTransform, Color, Surface};
use glam::Vec2;
use scene_graph::{ItemEvent, ItemEventKind, ItemId, LayerId, RenderContext, Scene, SceneEvent};
use slotmap::SlotMap;

/// Largest distance past the window edge that still speeds up auto-scroll
const AUTO_SCROLL_LIMIT: f32 = 100.0;

pub type ButtonRelay = Box<dyn FnMut(&ButtonEvent) -> bool + Send>;
pub type MotionRelay = Box<dyn FnMut(&MotionEvent) -> bool + Send>;
pub type KeyRelay = Box<dyn FnMut(&KeyEvent) -> bool + Send>;

/// Where the pointer is in a press/drag/release gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerState {
    #[default]
    Idle,
    Pressed(ItemId),
    Dragging(ItemId),
}

pub struct CanvasView {
    scene: Scene,
    layers: SlotMap<LayerId, Layer>,
    /// Front first
    layer_order: Vec<LayerId>,
    current_layer: LayerId,
    background: BackgroundLayer,
    interaction: InteractionLayer,
    selection: Selection,
    renderer: Box<dyn Renderer>,
    ledger: CacheLedger,
    render_ctx: RenderContext,

    zoom: f32,
    /// Scroll position in canvas units
    offset: Vec2,
    /// Centers content smaller than the window, in canvas units
    extra_offset: Vec2,
    /// Window size in pixels
    view_size: Vec2,
    grid_size: f32,
    grid_snapping: bool,
    draws_line_hops: bool,
    cache_toplevel_contents: bool,

    focused: Option<ItemId>,
    last_click_item: Option<ItemId>,
    last_over_item: Option<ItemId>,
    pointer: PointerState,
    held_buttons: Modifiers,
    last_mouse_pos: Vec2,

    repaint_lock: u32,
    repaints_missed: u32,
    ui_lock: u32,
    /// Window region waiting to be repainted
    pending_repaint: Option<Bounds>,

    button_relay: Option<ButtonRelay>,
    motion_relay: Option<MotionRelay>,
    key_relay: Option<KeyRelay>,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasView {
    pub fn new() -> Self {
        Self::with_config(&CanvasConfig::default())
    }

    pub fn with_config(config: &CanvasConfig) -> Self {
        let mut scene = Scene::new();
        let mut layers: SlotMap<LayerId, Layer> = SlotMap::with_key();
        let total = config.page_size * Vec2::new(config.x_pages as f32, config.y_pages as f32);
        let current_layer = layers.insert_with_key(|id| Layer::new(&mut scene, id, "default", total));

        let mut background = BackgroundLayer::new(config.page_size, config.x_pages, config.y_pages);
        background.fill_color = config.background_color;
        background.grid_visible = config.grid_visible;
        background.grid_size = config.grid_size;
        let mut interaction = InteractionLayer::new();
        interaction.set_zoom(config.zoom);

        let mut view = Self {
            scene,
            layers,
            layer_order: vec![current_layer],
            current_layer,
            background,
            interaction,
            selection: Selection::new(),
            renderer: Box::new(ImmediateRenderer::new()),
            ledger: CacheLedger::default(),
            render_ctx: RenderContext {
                selection_color: config.selection_color,
                hover_color: config.hover_color,
                highlight_color: config.highlight_color,
                ..RenderContext::default()
            },
            zoom: config.zoom,
            offset: Vec2::ZERO,
            extra_offset: Vec2::ZERO,
            view_size: config.view_size,
            grid_size: config.grid_size,
            grid_snapping: config.grid_snapping,
            draws_line_hops: config.draws_line_hops,
            cache_toplevel_contents: config.cache_toplevel_contents,
            focused: None,
            last_click_item: None,
            last_over_item: None,
            pointer: PointerState::Idle,
            held_buttons: Modifiers::none(),
            last_mouse_pos: Vec2::ZERO,
            repaint_lock: 0,
            repaints_missed: 0,
            ui_lock: 0,
            pending_repaint: None,
            button_relay: None,
            motion_relay: None,
            key_relay: None,
        };
        view.update_offsets();
        view.sync();
        view.pending_repaint = None;
        view.queue_repaint();
        view
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct scene access; notifications are processed on the next
    /// [`CanvasView::sync`], which input and paint entry points run themselves
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn interaction(&self) -> &InteractionLayer {
        &self.interaction
    }

    pub fn background(&self) -> &BackgroundLayer {
        &self.background
    }

    pub fn render_context(&self) -> &RenderContext {
        &self.render_ctx
    }

    pub fn pointer_state(&self) -> PointerState {
        self.pointer
    }

    /// Bytes held by CPU render caches
    pub fn cache_memory_in_use(&self) -> usize {
        self.ledger.in_use()
    }

    // Scene notifications

    /// Processes queued scene notifications until none are left
    pub fn sync(&mut self) {
        loop {
            let events = self.scene.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle_scene_event(event);
            }
        }
        if let Some(dirty) = self.interaction.take_dirty() {
            self.queue_repaint_bounds(&dirty);
        }
    }

    fn handle_scene_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::RepaintRequested { layer, bounds } => {
                if self.layers.get(layer).map_or(true, |layer| layer.is_visible()) {
                    self.queue_repaint_bounds(&bounds);
                }
            }
            SceneEvent::RelayoutQueued { layer, item } => {
                // the item may have been moved or destroyed since
                if let Some(layer) = self.layers.get_mut(layer) {
                    if self.scene.is_toplevel(item) {
                        layer.queue_relayout(&self.scene, item);
                    }
                }
            }
            SceneEvent::BoundsChanged { item, .. } => {
                if let Some(owner) = self.interaction.handle_item() {
                    if self.scene.is_ancestor_or_self(item, owner) {
                        self.interaction.refresh_handles(&self.scene);
                    }
                }
            }
            SceneEvent::LineLayoutChanged { line } => {
                if self.draws_line_hops {
                    let roots = self.visible_roots();
                    self.scene.update_line_crossings_in(line, &roots);
                }
                if self.interaction.handle_item() == Some(line) {
                    self.interaction.refresh_handles(&self.scene);
                }
            }
            SceneEvent::CacheReleased { bytes, texture } => {
                self.ledger.release(bytes);
                if let Some(texture) = texture {
                    self.renderer.release_texture(texture);
                }
            }
            SceneEvent::ItemDestroyed { item, .. } => self.forget_item(item),
        }
    }

    /// Drops every reference the view holds to `item`
    fn forget_item(&mut self, item: ItemId) {
        for slot in [
            &mut self.focused,
            &mut self.last_click_item,
            &mut self.last_over_item,
        ] {
            if *slot == Some(item) {
                *slot = None;
            }
        }
        if matches!(self.pointer, PointerState::Pressed(id) | PointerState::Dragging(id) if id == item) {
            self.pointer = PointerState::Idle;
        }
        self.selection.forget(item);
        for layer in self.layers.values_mut() {
            layer.forget(item);
        }
        if self.interaction.handle_item() == Some(item) {
            self.interaction.clear_handles();
        }
    }

    // Layers

    /// Adds a layer in front of the others and makes it current
    pub fn new_layer(&mut self, name: impl Into<String>) -> LayerId {
        let total = self.total_view_size();
        let scene = &mut self.scene;
        let id = self
            .layers
            .insert_with_key(|id| Layer::new(scene, id, name, total));
        self.layer_order.insert(0, id);
        self.current_layer = id;
        log::debug!("new layer {:?}", self.layers[id].name());
        id
    }

    /// Removes a layer and destroys its items; the front layer becomes current
    pub fn remove_layer(&mut self, id: LayerId) {
        if self.layer_order.len() <= 1 || !self.layers.contains_key(id) {
            log::warn!("refusing to remove the last or an unknown layer");
            return;
        }
        self.layer_order.retain(|layer| *layer != id);
        if let Some(layer) = self.layers.remove(id) {
            self.scene.destroy(layer.root());
        }
        self.current_layer = self.layer_order[0];
        self.sync();
        self.queue_repaint();
    }

    pub fn raise_layer(&mut self, id: LayerId) {
        if self.layers.contains_key(id) {
            self.layer_order.retain(|layer| *layer != id);
            self.layer_order.insert(0, id);
            self.refresh_line_crossings();
            self.queue_repaint();
        }
    }

    pub fn lower_layer(&mut self, id: LayerId) {
        if self.layers.contains_key(id) {
            self.layer_order.retain(|layer| *layer != id);
            self.layer_order.push(id);
            self.refresh_line_crossings();
            self.queue_repaint();
        }
    }

    pub fn set_current_layer(&mut self, id: LayerId) {
        if self.layers.contains_key(id) {
            self.current_layer = id;
        }
    }

    pub fn current_layer(&self) -> LayerId {
        self.current_layer
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn get_layer(&self, name: &str) -> Option<LayerId> {
        self.layer_order
            .iter()
            .copied()
            .find(|&id| self.layers[id].name() == name)
    }

    /// Layer ids, front first
    pub fn layers(&self) -> &[LayerId] {
        &self.layer_order
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) {
        if let Some(layer) = self.layers.get_mut(id) {
            if layer.is_visible() != visible {
                layer.set_visible(visible);
                self.refresh_line_crossings();
                self.queue_repaint();
            }
        }
    }

    /// Root areas of the visible layers, front first
    fn visible_roots(&self) -> Vec<ItemId> {
        self.layer_order
            .iter()
            .filter_map(|&id| self.layers.get(id))
            .filter(|layer| layer.is_visible())
            .map(|layer| layer.root())
            .collect()
    }

    // Items

    /// Adds `item` on top of the current layer
    pub fn add_item(&mut self, item: ItemId) {
        self.add_item_to_layer(self.current_layer, item);
    }

    pub fn add_item_to_layer(&mut self, layer: LayerId, item: ItemId) {
        let Some(root) = self.layers.get(layer).map(|layer| layer.root()) else {
            log::warn!("no layer for item {item}");
            return;
        };
        let caching = self.cache_toplevel_contents;
        self.scene
            .update_flags(item, |flags| flags.cache_toplevel_contents = caching);
        self.scene.add(root, item);
        self.sync();
    }

    /// Detaches `item` from the canvas; it stays alive in the scene
    pub fn remove_item(&mut self, item: ItemId) {
        self.selection.remove(&mut self.scene, item);
        if let Some(parent) = self.scene.parent(item) {
            self.scene.remove(parent, item);
        }
        self.forget_item(item);
        self.sync();
    }

    pub fn destroy_item(&mut self, item: ItemId) {
        self.selection.remove(&mut self.scene, item);
        self.scene.destroy(item);
        self.sync();
    }

    // Geometry

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Changes the zoom factor; render caches are rebuilt at the new scale
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom <= 0.0 || !zoom.is_finite() {
            log::warn!("ignoring zoom of {zoom}");
            return;
        }
        if zoom == self.zoom {
            return;
        }
        self.zoom = zoom;
        self.interaction.set_zoom(zoom);
        self.scene.invalidate_all_caches();
        self.update_offsets();
        self.sync();
        self.queue_repaint();
    }

    pub fn page_size(&self) -> Vec2 {
        self.background.page_size
    }

    pub fn page_layout(&self) -> (u32, u32) {
        (self.background.x_pages, self.background.y_pages)
    }

    pub fn set_page_size(&mut self, size: Vec2) {
        self.background.page_size = size;
        self.update_total_size();
    }

    pub fn set_page_layout(&mut self, x_pages: u32, y_pages: u32) {
        self.background.x_pages = x_pages.max(1);
        self.background.y_pages = y_pages.max(1);
        self.update_total_size();
    }

    fn update_total_size(&mut self) {
        let total = self.total_view_size();
        for layer in self.layers.values() {
            self.scene.set_size(layer.root(), total);
        }
        self.update_offsets();
        self.sync();
        self.queue_repaint();
    }

    /// Page size times page counts, in canvas units
    pub fn total_view_size(&self) -> Vec2 {
        self.background.total_size()
    }

    pub fn view_size(&self) -> Vec2 {
        self.view_size
    }

    /// Resizes the window (pixels)
    pub fn set_view_size(&mut self, size: Vec2) {
        self.view_size = size;
        self.update_offsets();
        self.queue_repaint();
    }

    /// Window size in canvas units
    pub fn viewable_size(&self) -> Vec2 {
        self.view_size / self.zoom
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn extra_offset(&self) -> Vec2 {
        self.extra_offset
    }

    /// Scrolls to `offset`, rounded and kept inside the content
    pub fn set_offset(&mut self, offset: Vec2) {
        let limit = (self.total_view_size() - self.viewable_size()).max(Vec2::ZERO);
        let offset = offset.round().clamp(Vec2::ZERO, limit);
        if offset != self.offset {
            self.offset = offset;
            self.queue_repaint();
        }
    }

    fn update_offsets(&mut self) {
        let slack = self.viewable_size() - self.total_view_size();
        self.extra_offset = (slack / 2.0).ceil().max(Vec2::ZERO);
        let limit = (self.total_view_size() - self.viewable_size()).max(Vec2::ZERO);
        self.offset = self.offset.clamp(Vec2::ZERO, limit);
        self.queue_repaint();
    }

    /// Canvas to window transform
    pub fn transform(&self) -> CanvasTransform {
        CanvasTransform::for_view(self.offset, self.extra_offset, self.zoom)
    }

    pub fn window_to_canvas(&self, point: Vec2) -> Vec2 {
        self.transform().apply_inverse(point)
    }

    pub fn canvas_to_window(&self, point: Vec2) -> Vec2 {
        self.transform().apply(point)
    }

    pub fn window_to_canvas_bounds(&self, bounds: &Bounds) -> Bounds {
        self.transform().apply_inverse_bounds(bounds)
    }

    pub fn canvas_to_window_bounds(&self, bounds: &Bounds) -> Bounds {
        self.transform().apply_bounds(bounds)
    }

    /// The part of the canvas the window shows
    pub fn visible_rect(&self) -> Bounds {
        self.window_to_canvas_bounds(&Bounds::from_origin_size(Vec2::ZERO, self.view_size))
    }

    // Grid and drawing options

    pub fn grid_size(&self) -> f32 {
        self.grid_size
    }

    pub fn set_grid_size(&mut self, size: f32) {
        if size > 0.0 {
            self.grid_size = size;
            self.background.grid_size = size;
            self.queue_repaint();
        }
    }

    pub fn grid_snapping(&self) -> bool {
        self.grid_snapping
    }

    pub fn set_grid_snapping(&mut self, snapping: bool) {
        self.grid_snapping = snapping;
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.background.grid_visible = visible;
        self.queue_repaint();
    }

    /// Grid used for drags, `None` while snapping is off
    pub fn active_grid(&self) -> Option<f32> {
        self.grid_snapping.then_some(self.grid_size)
    }

    pub fn snap_to_grid(&self, point: Vec2) -> Vec2 {
        match self.active_grid() {
            Some(grid) => snap_to_grid(point, grid),
            None => point,
        }
    }

    pub fn snap_size(&self, size: Vec2) -> Vec2 {
        match self.active_grid() {
            Some(grid) => snap_size_to_grid(size, grid),
            None => size,
        }
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background.fill_color = color;
        self.queue_repaint();
    }

    pub fn draws_line_hops(&self) -> bool {
        self.draws_line_hops
    }

    /// Turns hop markers on connector crossings on or off for the whole canvas
    pub fn set_draws_line_hops(&mut self, draws: bool) {
        if self.draws_line_hops == draws {
            return;
        }
        self.draws_line_hops = draws;
        if draws {
            self.refresh_line_crossings();
        } else {
            self.scene.clear_all_hops();
        }
        self.sync();
    }

    /// Recomputes every hop from scratch, for when layer order or visibility
    /// decides which line of a pair is the lower one
    fn refresh_line_crossings(&mut self) {
        if !self.draws_line_hops {
            return;
        }
        self.scene.clear_all_hops();
        let roots = self.visible_roots();
        for line in self.scene.line_ids() {
            self.scene.update_line_crossings_in(line, &roots);
        }
    }

    /// Turns per-item render caches on or off for every top-level item
    pub fn set_cache_toplevel_contents(&mut self, caching: bool) {
        if self.cache_toplevel_contents == caching {
            return;
        }
        self.cache_toplevel_contents = caching;
        let ids: Vec<ItemId> = self.scene.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.scene
                .update_flags(id, |flags| flags.cache_toplevel_contents = caching);
            self.scene.invalidate_cache(id);
        }
        self.sync();
    }

    // Rendering

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Switches the rendering backend, freeing the old backend's textures
    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        let textured: Vec<ItemId> = self
            .scene
            .iter()
            .filter(|(_, item)| item.texture().is_some())
            .map(|(id, _)| id)
            .collect();
        for id in textured {
            if let Some(texture) = self.scene.get_mut(id).and_then(|item| item.replace_texture(None)) {
                self.renderer.release_texture(texture);
            }
        }
        log::debug!("renderer {} replaced by {}", self.renderer.name(), renderer.name());
        self.renderer = renderer;
        self.scene.invalidate_all_caches();
        self.sync();
        self.queue_repaint();
    }

    /// Holds back repaint requests until the matching [`CanvasView::unlock_redraw`]
    pub fn lock_redraw(&mut self) {
        self.repaint_lock += 1;
    }

    /// # Panics
    ///
    /// Panics if the redraw lock is not held.
    pub fn unlock_redraw(&mut self) {
        assert!(self.repaint_lock > 0, "unlock_redraw called without a matching lock_redraw");
        self.repaint_lock -= 1;
        if self.repaint_lock == 0 && self.repaints_missed > 0 {
            self.repaints_missed = 0;
            self.queue_repaint();
        }
    }

    pub fn is_redraw_locked(&self) -> bool {
        self.repaint_lock > 0
    }

    /// Blocks painting and input, e.g. while another thread rebuilds the diagram
    pub fn lock_ui(&mut self) {
        self.ui_lock += 1;
    }

    /// # Panics
    ///
    /// Panics if the UI lock is not held.
    pub fn unlock_ui(&mut self) {
        assert!(self.ui_lock > 0, "unlock_ui called without a matching lock_ui");
        self.ui_lock -= 1;
    }

    pub fn is_ui_locked(&self) -> bool {
        self.ui_lock > 0
    }

    /// Requests a repaint of the whole window
    pub fn queue_repaint(&mut self) {
        if self.repaint_lock > 0 {
            self.repaints_missed += 1;
            return;
        }
        self.pending_repaint = Some(Bounds::from_origin_size(Vec2::ZERO, self.view_size));
    }

    /// Requests a repaint of `bounds` (canvas coordinates)
    pub fn queue_repaint_bounds(&mut self, bounds: &Bounds) {
        if self.repaint_lock > 0 {
            self.repaints_missed += 1;
            return;
        }
        let window = self.canvas_to_window_bounds(bounds);
        // anti-aliased edges reach past the item
        let window = Bounds::new(window.min - Vec2::ONE, window.max + Vec2::splat(2.0)).round_out();
        let Some(window) = window.intersection(&Bounds::from_origin_size(Vec2::ZERO, self.view_size)) else {
            return;
        };
        self.pending_repaint = Some(match self.pending_repaint {
            Some(pending) => pending.union(&window),
            None => window,
        });
    }

    /// The window region to repaint this frame, if any
    pub fn take_repaint_request(&mut self) -> Option<Bounds> {
        self.sync();
        self.pending_repaint.take()
    }

    /// Paints `area` (window coordinates) onto `surface`
    ///
    /// Returns `false` without painting while the UI is locked.
    pub fn repaint(&mut self, surface: &mut dyn Surface, area: &Bounds) -> bool {
        if self.is_ui_locked() {
            return false;
        }
        self.sync();
        let clip = self.window_to_canvas_bounds(area);
        let total = Bounds::from_origin_size(Vec2::ZERO, self.total_view_size());

        surface.save();
        surface.set_transform(self.transform());
        surface.clip_rect(&clip);
        self.background.repaint(surface, &clip);
        for &id in self.layer_order.iter().rev() {
            if let Some(layer) = self.layers.get_mut(id) {
                layer.repaint(
                    &mut self.scene,
                    surface,
                    self.renderer.as_mut(),
                    &self.render_ctx,
                    &clip,
                    &mut self.ledger,
                );
            }
        }
        self.interaction.repaint(&self.scene, surface, &self.render_ctx, &total);
        surface.restore();

        // painting may have flushed relayouts
        self.sync();
        true
    }

    /// Paints the visible layers inside `bounds` (canvas coordinates) with
    /// `bounds.min` at the surface origin. No background, overlay, caches or
    /// state rings.
    pub(crate) fn render_for_export(&mut self, surface: &mut dyn Surface, bounds: &Bounds) {
        self.sync();
        let ctx = RenderContext {
            printout: true,
            ..self.render_ctx.clone()
        };
        let mut renderer = ImmediateRenderer::direct();
        let mut ledger = CacheLedger::default();

        surface.save();
        surface.translate(-bounds.min);
        surface.clip_rect(bounds);
        for &id in self.layer_order.iter().rev() {
            if let Some(layer) = self.layers.get_mut(id) {
                layer.repaint(&mut self.scene, surface, &mut renderer, &ctx, bounds, &mut ledger);
            }
        }
        surface.restore();
        self.sync();
    }

    // Queries

    /// Frontmost item at `point` (canvas coordinates) across the visible layers
    pub fn get_item_at(&self, point: Vec2) -> Option<ItemId> {
        self.visible_roots().into_iter().find_map(|root| {
            let local = self.scene.convert_point_from(root, point, None);
            self.scene.item_at(root, local)
        })
    }

    /// Like [`CanvasView::get_item_at`], descending into stacks
    pub fn get_leaf_item_at(&self, point: Vec2) -> Option<ItemId> {
        self.visible_roots().into_iter().find_map(|root| {
            let local = self.scene.convert_point_from(root, point, None);
            self.scene.leaf_item_at(root, local)
        })
    }

    /// Items touching `rect` (canvas coordinates), front to back
    pub fn get_items_bounded_by(&self, rect: &Bounds, predicate: &dyn Fn(&scene_graph::Item) -> bool) -> Vec<ItemId> {
        self.visible_roots()
            .into_iter()
            .flat_map(|root| {
                let local = rect.translate(-self.scene.root_position(root));
                self.scene.items_bounded_by(root, &local, predicate)
            })
            .collect()
    }

    pub fn find_item_with_tag(&self, tag: &str) -> Option<ItemId> {
        self.layer_order
            .iter()
            .filter_map(|&id| self.layers.get(id))
            .find_map(|layer| self.scene.find_item_with_tag(layer.root(), tag))
    }

    /// Union of the visible layers' contents, clipped to the page area
    pub fn get_content_bounds(&self) -> Option<Bounds> {
        let total = Bounds::from_origin_size(Vec2::ZERO, self.total_view_size());
        self.layer_order
            .iter()
            .filter_map(|&id| self.layers.get(id))
            .filter(|layer| layer.is_visible())
            .filter_map(|layer| layer.content_bounds(&self.scene))
            .reduce(|a, b| a.union(&b))
            .and_then(|bounds| bounds.intersection(&total))
    }

    // Selection and focus

    /// Replaces the selection with `item`, focusing it if it accepts focus
    pub fn select_item(&mut self, item: ItemId) -> bool {
        let changed = self.selection.set(&mut self.scene, item);
        if let Some(target) = self.selection.anchor().filter(|_| changed) {
            if self.scene.get(target).is_some_and(|i| i.flags().accepts_focus) {
                self.focus_item(Some(target));
            }
        }
        self.selection_changed();
        changed
    }

    pub fn add_to_selection(&mut self, item: ItemId) -> bool {
        let changed = self.selection.add(&mut self.scene, item);
        self.selection_changed();
        changed
    }

    pub fn remove_from_selection(&mut self, item: ItemId) -> bool {
        let changed = self.selection.remove(&mut self.scene, item);
        self.selection_changed();
        changed
    }

    pub fn toggle_selection(&mut self, item: ItemId) -> bool {
        let changed = self.selection.toggle(&mut self.scene, item);
        self.selection_changed();
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        let changed = self.selection.clear(&mut self.scene);
        self.selection_changed();
        changed
    }

    /// Selects the items of `group`, or of every visible layer when `None`,
    /// touching `rect` in canvas coordinates
    pub fn select_items_inside(&mut self, rect: &Bounds, mode: SelectMode, group: Option<ItemId>) {
        let groups = match group {
            Some(group) => vec![group],
            None => self.visible_roots(),
        };
        let mut items = Vec::new();
        for group in groups {
            let local = rect.translate(-self.scene.root_position(group));
            items.extend(
                self.scene
                    .items_bounded_by(group, &local, &|item| item.flags().accepts_selection),
            );
        }
        match mode {
            SelectMode::Replace => {
                self.selection.remove_items_outside(&mut self.scene, rect);
                if !rect.is_empty() {
                    self.selection.add_items(&mut self.scene, &items);
                }
            }
            SelectMode::Add => {
                self.selection.add_items(&mut self.scene, &items);
            }
            SelectMode::Toggle => {
                self.selection.toggle_items(&mut self.scene, &items);
            }
        }
        log::debug!("{mode} selection: {} items selected", self.selection.len());
        self.selection_changed();
    }

    /// Unselecting the focused item takes its focus away
    fn selection_changed(&mut self) {
        if let Some(focused) = self.focused {
            if !self.scene.get(focused).is_some_and(|item| item.is_selected()) {
                self.focus_item(None);
            }
        }
        self.sync();
    }

    pub fn focused_item(&self) -> Option<ItemId> {
        self.focused
    }

    /// Moves keyboard focus and the handles to `item`
    pub fn focus_item(&mut self, item: Option<ItemId>) {
        if item == self.focused {
            return;
        }
        let old = self.focused.take();
        self.interaction.clear_handles();
        if let Some(item) = item {
            if self.scene.get(item).is_some_and(|i| i.flags().accepts_focus) {
                self.scene.set_focused(item, true);
                self.interaction.show_handles(&self.scene, item);
                self.focused = Some(item);
                log::debug!("focus moved to item {item}");
            }
        }
        if let Some(old) = old {
            self.scene.set_focused(old, false);
        }
        self.sync();
    }

    // Input

    pub fn set_button_relay(&mut self, relay: Option<ButtonRelay>) {
        self.button_relay = relay;
    }

    pub fn set_motion_relay(&mut self, relay: Option<MotionRelay>) {
        self.motion_relay = relay;
    }

    pub fn set_key_relay(&mut self, relay: Option<KeyRelay>) {
        self.key_relay = relay;
    }

    fn merged_modifiers(&self, modifiers: Modifiers) -> Modifiers {
        Modifiers {
            left_button: modifiers.left_button || self.held_buttons.left_button,
            middle_button: modifiers.middle_button || self.held_buttons.middle_button,
            right_button: modifiers.right_button || self.held_buttons.right_button,
            ..modifiers
        }
    }

    fn set_button_held(&mut self, button: MouseButton, held: bool) {
        match button {
            MouseButton::Left => self.held_buttons.left_button = held,
            MouseButton::Middle => self.held_buttons.middle_button = held,
            MouseButton::Right => self.held_buttons.right_button = held,
        }
    }

    /// Dispatches a button press or release; `true` if something handled it
    pub fn handle_mouse_button(&mut self, event: ButtonEvent) -> bool {
        if self.is_ui_locked() {
            return false;
        }
        self.sync();
        if let Some(relay) = self.button_relay.as_mut() {
            if relay(&event) {
                return true;
            }
        }
        self.set_button_held(event.button, event.press);
        self.last_mouse_pos = event.position;
        let point = self.window_to_canvas(event.position);
        let modifiers = self.merged_modifiers(event.modifiers);
        let roots = self.visible_roots();
        let grid = self.active_grid();

        match self.interaction.handle_mouse_button_top(
            &mut self.scene,
            &roots,
            event.button,
            event.press,
            point,
            modifiers,
            grid,
        ) {
            InteractionResult::Handled => {
                self.sync();
                return true;
            }
            InteractionResult::SelectInside { rect, mode } => {
                self.select_items_inside(&rect, mode, None);
                return true;
            }
            InteractionResult::Ignored => {}
        }

        let item = self.get_leaf_item_at(point);
        let button = Some(event.button);
        let mut handled = false;
        if event.press {
            if let Some(item) = item {
                handled = self.propagate(item, ItemEventKind::ButtonPress, point, button, modifiers);
            }
            self.pointer = item.map_or(PointerState::Idle, PointerState::Pressed);
        } else {
            if let Some(last) = self.last_click_item.filter(|&id| self.scene.contains(id)) {
                handled = self.propagate(last, ItemEventKind::ButtonRelease, point, button, modifiers);
            }
            if let Some(item) = item.filter(|&id| Some(id) == self.last_click_item) {
                handled |= self.propagate(item, ItemEventKind::Click, point, button, modifiers);
            }
            self.pointer = PointerState::Idle;
        }
        self.last_click_item = item;

        if !handled && item.is_none() {
            handled = self
                .interaction
                .handle_mouse_button_bottom(event.button, event.press, point);
        }
        self.sync();
        handled
    }

    pub fn handle_mouse_double_click(&mut self, event: ButtonEvent) -> bool {
        if self.is_ui_locked() {
            return false;
        }
        self.sync();
        let point = self.window_to_canvas(event.position);
        let modifiers = self.merged_modifiers(event.modifiers);
        let handled = match self.get_leaf_item_at(point) {
            Some(item) => self.propagate(
                item,
                ItemEventKind::DoubleClick,
                point,
                Some(event.button),
                modifiers,
            ),
            None => false,
        };
        self.sync();
        handled
    }

    pub fn handle_mouse_move(&mut self, event: MotionEvent) -> bool {
        if self.is_ui_locked() {
            return false;
        }
        self.sync();
        if let Some(relay) = self.motion_relay.as_mut() {
            if relay(&event) {
                return true;
            }
        }
        self.last_mouse_pos = event.position;
        let modifiers = self.merged_modifiers(event.modifiers);
        if modifiers.left_button {
            self.perform_auto_scroll(event.position);
        }
        let point = self.window_to_canvas(event.position);
        let roots = self.visible_roots();
        let grid = self.active_grid();

        if self
            .interaction
            .handle_mouse_move(&mut self.scene, &roots, point, grid)
        {
            self.sync();
            return true;
        }

        let any_button = modifiers.left_button || modifiers.middle_button || modifiers.right_button;
        let handled = match (self.last_click_item, any_button) {
            (Some(item), true) if self.scene.contains(item) => {
                self.pointer = PointerState::Dragging(item);
                self.propagate(item, ItemEventKind::Drag, point, None, modifiers)
            }
            _ => {
                let over = self.get_leaf_item_at(point);
                if over != self.last_over_item {
                    self.dispatch_crossing(self.last_over_item, over, point, modifiers);
                    self.last_over_item = over;
                    true
                } else {
                    false
                }
            }
        };
        self.sync();
        handled
    }

    /// The pointer left the window: everything under it gets a leave
    pub fn handle_mouse_leave(&mut self) {
        if let Some(last) = self.last_over_item.take() {
            let point = self.window_to_canvas(self.last_mouse_pos);
            for id in self.hover_chain(last) {
                self.deliver(id, id, ItemEventKind::Leave, point, None, Modifiers::none());
            }
        }
        self.sync();
    }

    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        if self.is_ui_locked() {
            return false;
        }
        match self.key_relay.as_mut() {
            Some(relay) => relay(&event),
            None => false,
        }
    }

    /// Scrolls toward a pointer dragged past the window edge
    ///
    /// The step grows with the distance past the edge, up to a limit.
    pub fn perform_auto_scroll(&mut self, window_point: Vec2) -> bool {
        let overshoot = |value: f32, extent: f32| {
            if value < 0.0 {
                value
            } else if value > extent {
                value - extent
            } else {
                0.0
            }
        };
        let delta = Vec2::new(
            overshoot(window_point.x, self.view_size.x),
            overshoot(window_point.y, self.view_size.y),
        )
        .clamp(Vec2::splat(-AUTO_SCROLL_LIMIT), Vec2::splat(AUTO_SCROLL_LIMIT));
        if delta == Vec2::ZERO {
            return false;
        }
        let step = (delta.abs() / 10.0).ceil() * delta.signum();
        let before = self.offset;
        self.set_offset(self.offset + step);
        self.offset != before
    }

    /// Enter/leave events for a pointer moving from `old` to `new`
    ///
    /// Items below the common ancestor get a leave (innermost first), then the
    /// new chain gets an enter (outermost first).
    fn dispatch_crossing(&mut self, old: Option<ItemId>, new: Option<ItemId>, point: Vec2, modifiers: Modifiers) {
        let common = match (old, new) {
            (Some(old), Some(new)) => self.scene.common_ancestor(old, new),
            _ => None,
        };
        if let Some(old) = old {
            for id in self.hover_chain(old) {
                if Some(id) == common {
                    break;
                }
                self.deliver(id, id, ItemEventKind::Leave, point, None, modifiers);
            }
        }
        if let Some(new) = new {
            let mut entering: Vec<ItemId> = self
                .hover_chain(new)
                .into_iter()
                .take_while(|&id| Some(id) != common)
                .collect();
            entering.reverse();
            for id in entering {
                self.deliver(id, id, ItemEventKind::Enter, point, None, modifiers);
            }
        }
    }

    /// `item` and its ancestors below the layer root, innermost first
    fn hover_chain(&self, item: ItemId) -> Vec<ItemId> {
        self.scene
            .ancestors(item)
            .into_iter()
            .filter(|&id| self.scene.parent(id).is_some())
            .collect()
    }

    /// Offers an event to `item` and then its ancestors, stopping at the
    /// top-level item
    fn propagate(
        &mut self,
        item: ItemId,
        kind: ItemEventKind,
        point: Vec2,
        button: Option<MouseButton>,
        modifiers: Modifiers,
    ) -> bool {
        let mut current = Some(item);
        while let Some(id) = current {
            if self.deliver(id, item, kind, point, button, modifiers) {
                return true;
            }
            if self.scene.is_toplevel(id) {
                break;
            }
            current = self.scene.parent(id);
        }
        false
    }

    /// Gives the figure first say, then runs the default item behavior.
    /// `target` is the item the pointer is over.
    fn deliver(
        &mut self,
        id: ItemId,
        target: ItemId,
        kind: ItemEventKind,
        point: Vec2,
        button: Option<MouseButton>,
        modifiers: Modifiers,
    ) -> bool {
        let event = ItemEvent {
            kind,
            position: self.scene.convert_point_from(id, point, None),
            button,
            modifiers,
        };
        let consumed = self
            .scene
            .get_mut(id)
            .and_then(|item| item.as_figure_mut())
            .is_some_and(|figure| figure.on_event(&event));
        consumed || self.default_item_event(id, target, &event, point)
    }

    fn default_item_event(&mut self, id: ItemId, target: ItemId, event: &ItemEvent, point: Vec2) -> bool {
        let Some(item) = self.scene.get(id) else {
            return false;
        };
        let toplevel = self.scene.is_toplevel(id);
        let accepts_selection = item.flags().accepts_selection;
        let left = event.button == Some(MouseButton::Left);
        let modifiers = event.modifiers;

        match event.kind {
            ItemEventKind::ButtonPress if left => {
                if let Some(item) = self.scene.get_mut(id) {
                    item.set_press_position(point);
                    item.set_dragged(false);
                }
                if toplevel && accepts_selection {
                    if modifiers.control || modifiers.command {
                        self.toggle_selection(id);
                    } else if modifiers.shift {
                        self.add_to_selection(id);
                    }
                    return true;
                }
                false
            }
            ItemEventKind::ButtonRelease if left => {
                if toplevel {
                    if self.selection.is_moving() {
                        let grid = self.active_grid();
                        self.selection.end_moving(&mut self.scene, grid);
                    }
                    return true;
                }
                false
            }
            ItemEventKind::Click if left => {
                if item.was_dragged() {
                    return false;
                }
                let accepts_focus = item.flags().accepts_focus;
                if toplevel && accepts_selection && !modifiers.extends_selection() {
                    self.select_item(id);
                    true
                } else if !toplevel && accepts_focus {
                    self.focus_item(Some(id));
                    true
                } else {
                    false
                }
            }
            ItemEventKind::Drag => {
                if let Some(item) = self.scene.get_mut(id) {
                    item.set_dragged(true);
                }
                if !(toplevel && modifiers.left_button && accepts_selection) {
                    return false;
                }
                if !self.selection.contains(id) {
                    self.select_item(id);
                }
                if !self.selection.is_moving() {
                    let press = self.scene.get(id).map(|item| item.press_position()).unwrap_or(point);
                    self.selection.begin_moving(&self.scene, press);
                }
                let draggable = |scene: &Scene, id: ItemId| scene.get(id).is_some_and(|i| i.flags().draggable);
                if self.selection.contains(id) && (draggable(&self.scene, target) || draggable(&self.scene, id)) {
                    let grid = self.active_grid();
                    self.selection.update_move(&mut self.scene, point, grid);
                }
                true
            }
            ItemEventKind::Enter | ItemEventKind::Leave => {
                self.scene.set_hovering(id, event.kind == ItemEventKind::Enter);
                true
            }
            _ => false,
        }
    }
}
