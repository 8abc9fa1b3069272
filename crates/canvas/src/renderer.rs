//! Rendering backends.
//!
//! Layers hand every top-level item to a [`Renderer`], which decides how the
//! item reaches the output: drawn straight onto the surface, blitted from a
//! CPU bitmap cache, or drawn as a textured quad from a GPU texture. Items
//! never know which backend is active.

use canvas_core::algorithms::next_power_of_two;
use canvas_core::raster::PixelSurface;
use canvas_core::{Bitmap, Bounds, CanvasTransform, Surface};
use glam::Vec2;
use scene_graph::{DisplayListId, ItemId, RenderContext, Scene, TextureCache, TextureId, OUTER_PAD};

/// Bytes held by render caches across the canvas.
///
/// Only bookkeeping; nothing is evicted when the total grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheLedger {
    bytes: usize,
}

impl CacheLedger {
    pub fn add(&mut self, bytes: usize) {
        self.bytes += bytes;
    }

    pub fn release(&mut self, bytes: usize) {
        self.bytes = self.bytes.saturating_sub(bytes);
    }

    pub fn in_use(&self) -> usize {
        self.bytes
    }
}

/// Host GPU context used by [`CachedTextureRenderer`]
///
/// Coordinates passed to the context are device pixels: `transform` maps the
/// quad's local units to the window.
pub trait GpuContext: Send {
    /// Uploads `bitmap` as a new texture
    fn create_texture(&mut self, bitmap: &Bitmap) -> Option<TextureId>;

    /// Replaces the pixels of a texture of the same size
    fn update_texture(&mut self, texture: TextureId, bitmap: &Bitmap) -> bool;

    fn delete_texture(&mut self, texture: TextureId);

    /// Records a quad of `size` units showing the `tex_extent` fraction of
    /// `texture`
    fn compile_quad(&mut self, texture: TextureId, size: Vec2, tex_extent: Vec2) -> Option<DisplayListId>;

    fn delete_display_list(&mut self, list: DisplayListId);

    fn call_display_list(&mut self, list: DisplayListId, transform: CanvasTransform);
}

/// Paints top-level items for a layer
pub trait Renderer: Send {
    fn name(&self) -> &'static str;

    /// Paints `id` in its parent's coordinates
    fn paint_item(
        &mut self,
        scene: &mut Scene,
        id: ItemId,
        surface: &mut dyn Surface,
        ctx: &RenderContext,
        ledger: &mut CacheLedger,
    );

    /// Frees a texture of a destroyed or invalidated item
    fn release_texture(&mut self, _texture: TextureCache) {}
}

/// Padded bounds of an item in its parent's coordinates
fn padded_bounds(scene: &Scene, id: ItemId) -> Option<Bounds> {
    scene.get(id).map(|item| item.bounds().expand(OUTER_PAD))
}

/// Renders `id` into a transparent bitmap of `width` x `height` pixels at `zoom`
fn render_to_bitmap(
    scene: &Scene,
    id: ItemId,
    ctx: &RenderContext,
    zoom: f32,
    width: u32,
    height: u32,
) -> Option<Bitmap> {
    let item = scene.get(id)?;
    let mut surface = PixelSurface::new(width, height)?;
    surface.scale(zoom);
    surface.translate((Vec2::splat(OUTER_PAD) - item.position()).floor());
    scene.render_item(id, &mut surface, ctx);
    Some(surface.into_bitmap())
}

/// Cairo-style renderer: items are drawn onto the surface, optionally through
/// a per-item bitmap cache
pub struct ImmediateRenderer {
    caching: bool,
}

impl ImmediateRenderer {
    /// Caches items that allow it
    pub fn new() -> Self {
        Self { caching: true }
    }

    /// Never caches; used for export and printing
    pub fn direct() -> Self {
        Self { caching: false }
    }

    pub fn caching(&self) -> bool {
        self.caching
    }

    pub fn set_caching(&mut self, caching: bool) {
        self.caching = caching;
    }

    fn regenerate_cache(
        &self,
        scene: &mut Scene,
        id: ItemId,
        ctx: &RenderContext,
        zoom: f32,
        ledger: &mut CacheLedger,
    ) -> bool {
        let Some(padded) = padded_bounds(scene, id) else {
            return false;
        };
        let pixels = (padded.size() * zoom).ceil();
        let Some(bitmap) = render_to_bitmap(scene, id, ctx, zoom, pixels.x as u32, pixels.y as u32)
        else {
            return false;
        };

        let bytes = bitmap.byte_size();
        log::trace!("rendered {bytes} byte cache for item {id}");
        let Some(item) = scene.get_mut(id) else {
            return false;
        };
        if let Some(old) = item.replace_bitmap_cache(Some(bitmap)) {
            ledger.release(old.byte_size());
        }
        item.clear_needs_render();
        ledger.add(bytes);
        true
    }
}

impl Default for ImmediateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for ImmediateRenderer {
    fn name(&self) -> &'static str {
        "immediate"
    }

    fn paint_item(
        &mut self,
        scene: &mut Scene,
        id: ItemId,
        surface: &mut dyn Surface,
        ctx: &RenderContext,
        ledger: &mut CacheLedger,
    ) {
        let Some(item) = scene.get(id) else {
            return;
        };
        if !self.caching || !item.flags().cache_toplevel_contents {
            scene.render_item(id, surface, ctx);
            return;
        }

        let zoom = surface.transform().scale;
        let stale = item.needs_render() || item.bitmap_cache().is_none();
        if stale && !self.regenerate_cache(scene, id, ctx, zoom, ledger) {
            log::warn!("no cache for item {id}, drawing it directly");
            scene.render_item(id, surface, ctx);
            return;
        }

        let (Some(padded), Some(item)) = (padded_bounds(scene, id), scene.get(id)) else {
            return;
        };
        if let Some(bitmap) = item.bitmap_cache() {
            // blit unscaled, on whole device pixels
            let origin = surface.user_to_device(padded.min).floor();
            surface.draw_bitmap_device(bitmap, Bounds::from_origin_size(origin, bitmap.size()));
        }
    }
}

/// GPU renderer: each item is rendered once into a power-of-two texture and
/// redrawn as a textured quad until it changes
pub struct CachedTextureRenderer {
    gpu: Box<dyn GpuContext>,
}

impl CachedTextureRenderer {
    pub fn new(gpu: Box<dyn GpuContext>) -> Self {
        Self { gpu }
    }

    pub fn gpu(&self) -> &dyn GpuContext {
        self.gpu.as_ref()
    }

    fn upload(
        &mut self,
        scene: &mut Scene,
        id: ItemId,
        ctx: &RenderContext,
        zoom: f32,
    ) -> Option<TextureCache> {
        let padded = padded_bounds(scene, id)?;
        let content_size = (padded.size() * zoom).ceil();
        let (Some(width), Some(height)) = (
            next_power_of_two(content_size.x),
            next_power_of_two(content_size.y),
        ) else {
            log::warn!("item {id} is too large for a texture at zoom {zoom}");
            return None;
        };
        let texture_size = Vec2::new(width as f32, height as f32);
        let bitmap = render_to_bitmap(scene, id, ctx, zoom, width, height)?;

        // taken out first so a failed upload leaves the item without a texture
        let previous = scene.get_mut(id).and_then(|item| item.replace_texture(None));
        let texture = match previous {
            Some(old) if old.texture_size == texture_size && self.gpu.update_texture(old.texture, &bitmap) => {
                if let Some(list) = old.display_list {
                    self.gpu.delete_display_list(list);
                }
                old.texture
            }
            old => {
                if let Some(old) = old {
                    self.release_texture(old);
                }
                self.gpu.create_texture(&bitmap)?
            }
        };
        log::trace!(
            "uploaded {}x{} texture for item {id} ({} bytes)",
            width,
            height,
            bitmap.byte_size()
        );

        let display_list = self
            .gpu
            .compile_quad(texture, padded.size(), content_size / texture_size);
        let cache = TextureCache {
            texture,
            texture_size,
            content_size,
            display_list,
        };
        if let Some(item) = scene.get_mut(id) {
            item.replace_texture(Some(cache));
            item.clear_needs_render();
        }
        Some(cache)
    }
}

impl Renderer for CachedTextureRenderer {
    fn name(&self) -> &'static str {
        "cached-texture"
    }

    fn paint_item(
        &mut self,
        scene: &mut Scene,
        id: ItemId,
        surface: &mut dyn Surface,
        ctx: &RenderContext,
        _ledger: &mut CacheLedger,
    ) {
        let Some(item) = scene.get(id) else {
            return;
        };
        if !item.flags().cache_toplevel_contents {
            scene.render_item(id, surface, ctx);
            return;
        }

        let zoom = surface.transform().scale;
        let cache = match item.texture().copied() {
            Some(cache) if !item.needs_render() && cache.display_list.is_some() => Some(cache),
            _ => self.upload(scene, id, ctx, zoom),
        };
        let (Some(list), Some(padded)) = (
            cache.and_then(|cache| cache.display_list),
            padded_bounds(scene, id),
        ) else {
            log::warn!("no texture for item {id}, drawing it directly");
            scene.render_item(id, surface, ctx);
            return;
        };
        let transform = CanvasTransform::from_translation(padded.min).then(&surface.transform());
        self.gpu.call_display_list(list, transform);
    }

    fn release_texture(&mut self, texture: TextureCache) {
        if let Some(list) = texture.display_list {
            self.gpu.delete_display_list(list);
        }
        self.gpu.delete_texture(texture.texture);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use canvas_core::{Color, DrawCommand, RecordingSurface};
    use scene_graph::{LayerId, RectFigure};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum GpuCall {
        Create { width: u32, height: u32 },
        Update(TextureId),
        DeleteTexture(TextureId),
        Compile { texture: TextureId, size: Vec2, tex_extent: Vec2 },
        DeleteList(DisplayListId),
        Call { list: DisplayListId, transform: CanvasTransform },
    }

    /// Records GPU calls into a shared log
    #[derive(Clone, Default)]
    pub(crate) struct RecordingGpu {
        pub(crate) calls: Arc<Mutex<Vec<GpuCall>>>,
        next_id: u32,
        pub(crate) refuse_textures: bool,
        /// Textures created before the GPU starts refusing new ones
        pub(crate) texture_limit: Option<usize>,
    }

    impl RecordingGpu {
        pub(crate) fn calls(&self) -> Vec<GpuCall> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: GpuCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl GpuContext for RecordingGpu {
        fn create_texture(&mut self, bitmap: &Bitmap) -> Option<TextureId> {
            let created = self
                .calls()
                .iter()
                .filter(|call| matches!(call, GpuCall::Create { .. }))
                .count();
            if self.refuse_textures || self.texture_limit.is_some_and(|limit| created >= limit) {
                return None;
            }
            self.push(GpuCall::Create {
                width: bitmap.width(),
                height: bitmap.height(),
            });
            self.next_id += 1;
            Some(TextureId(self.next_id))
        }

        fn update_texture(&mut self, texture: TextureId, _bitmap: &Bitmap) -> bool {
            self.push(GpuCall::Update(texture));
            true
        }

        fn delete_texture(&mut self, texture: TextureId) {
            self.push(GpuCall::DeleteTexture(texture));
        }

        fn compile_quad(&mut self, texture: TextureId, size: Vec2, tex_extent: Vec2) -> Option<DisplayListId> {
            self.push(GpuCall::Compile {
                texture,
                size,
                tex_extent,
            });
            self.next_id += 1;
            Some(DisplayListId(self.next_id))
        }

        fn delete_display_list(&mut self, list: DisplayListId) {
            self.push(GpuCall::DeleteList(list));
        }

        fn call_display_list(&mut self, list: DisplayListId, transform: CanvasTransform) {
            self.push(GpuCall::Call { list, transform });
        }
    }

    fn scene_with_box() -> (Scene, ItemId) {
        let mut scene = Scene::new();
        let area = scene.create_area(LayerId::default());
        scene.set_size(area, Vec2::new(500.0, 500.0));
        let item = scene.create_figure(LayerId::default(), RectFigure::new(Color::rgb(1.0, 0.0, 0.0)));
        scene.set_auto_sizing(item, false);
        scene.add(area, item);
        scene.set_size(item, Vec2::new(40.0, 20.0));
        scene.set_position(item, Vec2::new(10.0, 30.0));
        (scene, item)
    }

    #[test]
    fn test_immediate_renderer_caches_then_blits() {
        let (mut scene, item) = scene_with_box();
        let mut renderer = ImmediateRenderer::new();
        let mut ledger = CacheLedger::default();
        let ctx = RenderContext::default();

        let mut surface = RecordingSurface::new();
        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);

        // padded 48x28 at zoom 1
        assert_eq!(ledger.in_use(), 48 * 28 * 4);
        assert!(!scene.get(item).unwrap().needs_render());
        assert_eq!(
            surface.commands(),
            &[DrawCommand::Bitmap {
                dest: Bounds::from_xywh(6.0, 26.0, 48.0, 28.0),
                width: 48,
                height: 28,
            }]
        );

        // a second paint reuses the cache
        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);
        assert_eq!(ledger.in_use(), 48 * 28 * 4);
        assert_eq!(surface.commands().len(), 2);
    }

    #[test]
    fn test_cache_is_rendered_at_zoom() {
        let (mut scene, item) = scene_with_box();
        let mut renderer = ImmediateRenderer::new();
        let mut ledger = CacheLedger::default();
        let mut surface = RecordingSurface::new();
        surface.scale(2.0);

        renderer.paint_item(&mut scene, item, &mut surface, &RenderContext::default(), &mut ledger);

        let cache = scene.get(item).unwrap().bitmap_cache().unwrap();
        assert_eq!((cache.width(), cache.height()), (96, 56));
        // red fill inside the item, transparent padding outside
        let inside = cache.pixel(20, 20).unwrap();
        assert_eq!(inside, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(cache.pixel(1, 1).unwrap().a, 0.0);
    }

    #[test]
    fn test_direct_renderer_and_uncached_items_draw_paths() {
        let (mut scene, item) = scene_with_box();
        let mut ledger = CacheLedger::default();
        let mut surface = RecordingSurface::new();
        ImmediateRenderer::direct().paint_item(
            &mut scene,
            item,
            &mut surface,
            &RenderContext::default(),
            &mut ledger,
        );
        assert!(matches!(surface.commands()[0], DrawCommand::Fill { .. }));
        assert_eq!(ledger.in_use(), 0);

        scene.update_flags(item, |flags| flags.cache_toplevel_contents = false);
        let mut surface = RecordingSurface::new();
        ImmediateRenderer::new().paint_item(
            &mut scene,
            item,
            &mut surface,
            &RenderContext::default(),
            &mut ledger,
        );
        assert!(matches!(surface.commands()[0], DrawCommand::Fill { .. }));
    }

    #[test]
    fn test_texture_renderer_uploads_power_of_two_textures_once() {
        let (mut scene, item) = scene_with_box();
        let gpu = RecordingGpu::default();
        let mut renderer = CachedTextureRenderer::new(Box::new(gpu.clone()));
        let mut ledger = CacheLedger::default();
        let mut surface = RecordingSurface::new();
        let ctx = RenderContext::default();

        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);
        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);

        let calls = gpu.calls();
        assert_eq!(calls[0], GpuCall::Create { width: 64, height: 32 });
        assert_eq!(
            calls[1],
            GpuCall::Compile {
                texture: TextureId(1),
                size: Vec2::new(48.0, 28.0),
                tex_extent: Vec2::new(48.0 / 64.0, 28.0 / 32.0),
            }
        );
        let draws: Vec<&GpuCall> = calls.iter().filter(|c| matches!(c, GpuCall::Call { .. })).collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(
            draws[0],
            &GpuCall::Call {
                list: DisplayListId(2),
                transform: CanvasTransform::from_translation(Vec2::new(6.0, 26.0)),
            }
        );
        // nothing went through the surface
        assert!(surface.commands().is_empty());
        assert_eq!(ledger.in_use(), 0);
    }

    #[test]
    fn test_texture_is_updated_in_place_after_a_change() {
        let (mut scene, item) = scene_with_box();
        let gpu = RecordingGpu::default();
        let mut renderer = CachedTextureRenderer::new(Box::new(gpu.clone()));
        let mut ledger = CacheLedger::default();
        let mut surface = RecordingSurface::new();
        let ctx = RenderContext::default();

        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);
        scene.set_selected(item, true);
        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);

        let calls = gpu.calls();
        assert!(calls.contains(&GpuCall::Update(TextureId(1))));
        assert!(calls.contains(&GpuCall::DeleteList(DisplayListId(2))));
        assert_eq!(calls.iter().filter(|c| matches!(c, GpuCall::Create { .. })).count(), 1);
    }

    #[test]
    fn test_texture_failure_falls_back_to_direct_rendering() {
        let (mut scene, item) = scene_with_box();
        let gpu = RecordingGpu {
            refuse_textures: true,
            ..RecordingGpu::default()
        };
        let mut renderer = CachedTextureRenderer::new(Box::new(gpu));
        let mut surface = RecordingSurface::new();

        renderer.paint_item(
            &mut scene,
            item,
            &mut surface,
            &RenderContext::default(),
            &mut CacheLedger::default(),
        );
        assert!(matches!(surface.commands()[0], DrawCommand::Fill { .. }));
    }

    #[test]
    fn test_failed_resize_upload_releases_the_old_texture_once() {
        let (mut scene, item) = scene_with_box();
        let gpu = RecordingGpu {
            texture_limit: Some(1),
            ..RecordingGpu::default()
        };
        let mut renderer = CachedTextureRenderer::new(Box::new(gpu.clone()));
        let mut ledger = CacheLedger::default();
        let ctx = RenderContext::default();

        renderer.paint_item(&mut scene, item, &mut RecordingSurface::new(), &ctx, &mut ledger);
        assert!(scene.get(item).unwrap().texture().is_some());

        // a bigger item needs a bigger texture, which the GPU refuses
        scene.set_size(item, Vec2::new(200.0, 100.0));
        let mut surface = RecordingSurface::new();
        renderer.paint_item(&mut scene, item, &mut surface, &ctx, &mut ledger);
        assert!(matches!(surface.commands()[0], DrawCommand::Fill { .. }));
        assert!(scene.get(item).unwrap().texture().is_none());

        renderer.paint_item(&mut scene, item, &mut RecordingSurface::new(), &ctx, &mut ledger);

        let deleted: Vec<GpuCall> = gpu
            .calls()
            .into_iter()
            .filter(|call| matches!(call, GpuCall::DeleteTexture(_)))
            .collect();
        assert_eq!(deleted, vec![GpuCall::DeleteTexture(TextureId(1))]);
    }

    #[test]
    fn test_ledger_never_goes_negative() {
        let mut ledger = CacheLedger::default();
        ledger.add(100);
        ledger.release(40);
        assert_eq!(ledger.in_use(), 60);
        ledger.release(100);
        assert_eq!(ledger.in_use(), 0);
    }
}
