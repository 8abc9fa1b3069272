//! Software raster surface backed by tiny-skia.
//!
//! Used for CPU render caches, for rendering items into textures before they are
//! uploaded to a GPU context, and for PNG export.

use crate::bounds::Bounds;
use crate::color::Color;
use crate::surface::{Bitmap, Path, Surface, SurfaceState};
use tiny_skia::{
    FillRule, Mask, Paint, PathBuilder, PixmapPaint, Rect, Stroke, StrokeDash, Transform,
};

pub struct PixelSurface {
    state: SurfaceState,
    bitmap: Bitmap,
    anti_alias: bool,
}

impl PixelSurface {
    /// A transparent surface; `None` if the size is zero or too large
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            state: SurfaceState::default(),
            bitmap: Bitmap::new(width, height)?,
            anti_alias: true,
        })
    }

    pub fn with_background(width: u32, height: u32, background: Color) -> Option<Self> {
        let mut surface = Self::new(width, height)?;
        surface.clear(background);
        Some(surface)
    }

    /// Hard pixel edges, which keeps pixel-exact assertions stable
    pub fn set_anti_alias(&mut self, anti_alias: bool) {
        self.anti_alias = anti_alias;
    }

    pub fn clear(&mut self, color: Color) {
        let [r, g, b, a] = color.to_rgba8();
        self.bitmap
            .pixmap_mut()
            .fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn into_bitmap(self) -> Bitmap {
        self.bitmap
    }

    fn paint(&self) -> Paint<'static> {
        let [r, g, b, a] = self.state.color.to_rgba8();
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = self.anti_alias;
        paint
    }

    /// `Err(())` when the clip is empty and nothing may be drawn
    fn clip_mask(&self) -> Result<Option<Mask>, ()> {
        let Some(clip) = self.state.clip else {
            return Ok(None);
        };
        let rect = Rect::from_ltrb(clip.min.x, clip.min.y, clip.max.x, clip.max.y).ok_or(())?;
        let mut mask = Mask::new(self.width(), self.height()).ok_or(())?;
        mask.fill_path(
            &PathBuilder::from_rect(rect),
            FillRule::Winding,
            false,
            Transform::identity(),
        );
        Ok(Some(mask))
    }

    fn skia_stroke(&self) -> Stroke {
        let mut stroke = Stroke {
            width: self.state.device_line_width().max(0.1),
            ..Stroke::default()
        };
        if let Some((lengths, offset)) = self.state.device_dash() {
            let mut array = lengths.to_vec();
            if array.len() % 2 == 1 {
                array.extend_from_within(..);
            }
            stroke.dash = StrokeDash::new(array, offset);
        }
        stroke
    }
}

fn to_skia_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for sub in &path.subpaths {
        let mut points = sub.points.iter();
        let Some(first) = points.next() else {
            continue;
        };
        builder.move_to(first.x, first.y);
        for p in points {
            builder.line_to(p.x, p.y);
        }
        if sub.closed {
            builder.close();
        }
    }
    builder.finish()
}

impl Surface for PixelSurface {
    fn state(&self) -> &SurfaceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SurfaceState {
        &mut self.state
    }

    fn fill_path(&mut self, path: &Path) {
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };
        let Ok(mask) = self.clip_mask() else {
            return;
        };
        let paint = self.paint();
        self.bitmap.pixmap_mut().fill_path(
            &skia_path,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            mask.as_ref(),
        );
    }

    fn stroke_path(&mut self, path: &Path) {
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };
        let Ok(mask) = self.clip_mask() else {
            return;
        };
        let paint = self.paint();
        let stroke = self.skia_stroke();
        self.bitmap.pixmap_mut().stroke_path(
            &skia_path,
            &paint,
            &stroke,
            Transform::identity(),
            mask.as_ref(),
        );
    }

    fn draw_bitmap_device(&mut self, bitmap: &Bitmap, dest: Bounds) {
        if dest.is_empty() {
            return;
        }
        let Ok(mask) = self.clip_mask() else {
            return;
        };
        let sx = dest.width() / bitmap.width() as f32;
        let sy = dest.height() / bitmap.height() as f32;
        self.bitmap.pixmap_mut().draw_pixmap(
            0,
            0,
            bitmap.pixmap().as_ref(),
            &PixmapPaint::default(),
            Transform::from_row(sx, 0.0, 0.0, sy, dest.min.x, dest.min.y),
            mask.as_ref(),
        );
    }
}
