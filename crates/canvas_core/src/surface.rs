//! Drawing-surface abstraction.
//!
//! A [`Surface`] is a cairo-like immediate-mode target: build a path, then fill,
//! stroke or clip with it. Path coordinates are in user space and pass through
//! the surface's current translate/scale transform; concrete surfaces only ever
//! see the resulting device-space geometry through the primitive methods
//! (`fill_path`, `stroke_path`, `draw_bitmap_device`).
//!
//! Surfaces shipped here:
//! - [`crate::raster::PixelSurface`], a software rasterizer producing a [`Bitmap`]
//! - [`crate::svg::SvgSurface`], a multi-page SVG document writer
//! - [`RecordingSurface`], which records device-space commands (used by tests and
//!   by hosts that replay drawing into their own toolkit)

use crate::bounds::Bounds;
use crate::color::Color;
use crate::transform::CanvasTransform;
use glam::Vec2;
use smallvec::SmallVec;
use std::f32::consts::TAU;
use std::fmt;
use tiny_skia::Pixmap;

/// Dash lengths plus the offset into the pattern
pub type Dash = (SmallVec<[f32; 4]>, f32);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubPath {
    pub points: Vec<Vec2>,
    pub closed: bool,
}

/// A flattened path in device coordinates; arcs are already split into segments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    pub subpaths: Vec<SubPath>,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.subpaths.iter().flat_map(|s| s.points.iter().copied()))
    }

    pub fn current_point(&self) -> Option<Vec2> {
        self.subpaths.last().and_then(|s| s.points.last().copied())
    }

    fn move_to(&mut self, p: Vec2) {
        self.subpaths.push(SubPath {
            points: vec![p],
            closed: false,
        });
    }

    fn line_to(&mut self, p: Vec2) {
        match self.subpaths.last_mut() {
            Some(sub) if !sub.closed => sub.points.push(p),
            _ => self.move_to(p),
        }
    }

    fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            sub.closed = true;
        }
    }
}

#[derive(Clone, Debug)]
struct SavedState {
    transform: CanvasTransform,
    color: Color,
    line_width: f32,
    dash: Option<Dash>,
    clip: Option<Bounds>,
}

/// Transform, paint settings, clip and current path of a surface
#[derive(Clone, Debug)]
pub struct SurfaceState {
    pub transform: CanvasTransform,
    pub color: Color,
    pub line_width: f32,
    pub dash: Option<Dash>,
    /// Device-space clip rectangle
    pub clip: Option<Bounds>,
    path: Path,
    stack: Vec<SavedState>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            transform: CanvasTransform::identity(),
            color: Color::BLACK,
            line_width: 1.0,
            dash: None,
            clip: None,
            path: Path::default(),
            stack: Vec::new(),
        }
    }
}

impl SurfaceState {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line width in device units
    pub fn device_line_width(&self) -> f32 {
        self.line_width * self.transform.scale
    }

    pub fn device_dash(&self) -> Option<Dash> {
        self.dash.as_ref().map(|(lengths, offset)| {
            let scale = self.transform.scale;
            (
                lengths.iter().map(|l| l * scale).collect(),
                offset * scale,
            )
        })
    }

    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }
}

/// Immediate-mode drawing target.
///
/// Implementors provide the state accessors and the three device-space
/// primitives; everything else has a provided implementation.
pub trait Surface {
    fn state(&self) -> &SurfaceState;
    fn state_mut(&mut self) -> &mut SurfaceState;

    /// Fill a device-space path with the current color (nonzero winding)
    fn fill_path(&mut self, path: &Path);
    /// Stroke a device-space path with the current color, width and dash
    fn stroke_path(&mut self, path: &Path);
    /// Draw a bitmap stretched over a device-space rectangle
    fn draw_bitmap_device(&mut self, bitmap: &Bitmap, dest: Bounds);

    /// Text output; surfaces without font support ignore it
    fn show_text(&mut self, _origin: Vec2, _text: &str, _font_size: f32) {}

    /// Finish the current page on paginated surfaces
    fn show_page(&mut self) {}

    fn save(&mut self) {
        let state = self.state_mut();
        let saved = SavedState {
            transform: state.transform,
            color: state.color,
            line_width: state.line_width,
            dash: state.dash.clone(),
            clip: state.clip,
        };
        state.stack.push(saved);
    }

    fn restore(&mut self) {
        let state = self.state_mut();
        if let Some(saved) = state.stack.pop() {
            state.transform = saved.transform;
            state.color = saved.color;
            state.line_width = saved.line_width;
            state.dash = saved.dash;
            state.clip = saved.clip;
        } else {
            log::warn!("surface restore without matching save");
        }
    }

    fn translate(&mut self, offset: Vec2) {
        let state = self.state_mut();
        state.transform.offset += offset * state.transform.scale;
    }

    fn scale(&mut self, factor: f32) {
        self.state_mut().transform.scale *= factor;
    }

    fn transform(&self) -> CanvasTransform {
        self.state().transform
    }

    fn set_transform(&mut self, transform: CanvasTransform) {
        self.state_mut().transform = transform;
    }

    fn user_to_device(&self, point: Vec2) -> Vec2 {
        self.state().transform.apply(point)
    }

    fn user_to_device_distance(&self, distance: Vec2) -> Vec2 {
        self.state().transform.apply_vector(distance)
    }

    fn set_color(&mut self, color: Color) {
        self.state_mut().color = color;
    }

    fn set_line_width(&mut self, width: f32) {
        self.state_mut().line_width = width;
    }

    /// Empty `dashes` switches back to solid lines
    fn set_dash(&mut self, dashes: &[f32], offset: f32) {
        self.state_mut().dash = if dashes.is_empty() {
            None
        } else {
            Some((dashes.iter().copied().collect(), offset))
        };
    }

    fn new_path(&mut self) {
        self.state_mut().path = Path::default();
    }

    fn move_to(&mut self, point: Vec2) {
        let device = self.user_to_device(point);
        self.state_mut().path.move_to(device);
    }

    fn line_to(&mut self, point: Vec2) {
        let device = self.user_to_device(point);
        self.state_mut().path.line_to(device);
    }

    fn close_path(&mut self) {
        self.state_mut().path.close();
    }

    fn rectangle(&mut self, rect: &Bounds) {
        let [tl, tr, br, bl] = rect.corners();
        self.move_to(tl);
        self.line_to(tr);
        self.line_to(br);
        self.line_to(bl);
        self.close_path();
    }

    /// Arc of increasing angle (clockwise on screen), angles in radians from +x
    fn arc(&mut self, center: Vec2, radius: f32, start: f32, end: f32) {
        let mut end = end;
        while end < start {
            end += TAU;
        }
        append_arc(self, center, radius, start, end);
    }

    /// Arc of decreasing angle (counter-clockwise on screen)
    fn arc_negative(&mut self, center: Vec2, radius: f32, start: f32, end: f32) {
        let mut end = end;
        while end > start {
            end -= TAU;
        }
        append_arc(self, center, radius, start, end);
    }

    fn fill(&mut self) {
        let path = std::mem::take(&mut self.state_mut().path);
        if !path.is_empty() {
            self.fill_path(&path);
        }
    }

    fn fill_preserve(&mut self) {
        let path = self.state().path.clone();
        if !path.is_empty() {
            self.fill_path(&path);
        }
    }

    fn stroke(&mut self) {
        let path = std::mem::take(&mut self.state_mut().path);
        if !path.is_empty() {
            self.stroke_path(&path);
        }
    }

    fn stroke_preserve(&mut self) {
        let path = self.state().path.clone();
        if !path.is_empty() {
            self.stroke_path(&path);
        }
    }

    /// Intersect the clip with a user-space rectangle
    fn clip_rect(&mut self, rect: &Bounds) {
        let state = self.state_mut();
        let device = state.transform.apply_bounds(rect);
        state.clip = Some(match state.clip {
            Some(clip) => clip
                .intersection(&device)
                .unwrap_or(Bounds::new(device.min, device.min)),
            None => device,
        });
    }

    fn reset_clip(&mut self) {
        self.state_mut().clip = None;
    }

    /// Device-space clip, if any
    fn clip_bounds(&self) -> Option<Bounds> {
        self.state().clip
    }

    /// Draw a bitmap stretched over a user-space rectangle
    fn draw_bitmap(&mut self, bitmap: &Bitmap, dest: &Bounds) {
        let device = self.state().transform.apply_bounds(dest);
        self.draw_bitmap_device(bitmap, device);
    }
}

fn append_arc<S: Surface + ?Sized>(surface: &mut S, center: Vec2, radius: f32, start: f32, end: f32) {
    let sweep = end - start;
    let device_radius = radius * surface.state().transform.scale;
    let steps = ((sweep.abs() * device_radius / 2.0).ceil() as usize).clamp(4, 128);

    for i in 0..=steps {
        let angle = start + sweep * (i as f32 / steps as f32);
        let point = center + Vec2::new(angle.cos(), angle.sin()) * radius;
        if i == 0 && surface.state().path.current_point().is_none() {
            surface.move_to(point);
        } else {
            surface.line_to(point);
        }
    }
}

/// An RGBA off-screen image, used for render caches and raster export
#[derive(Clone)]
pub struct Bitmap {
    pixmap: Pixmap,
}

impl Bitmap {
    /// `None` for zero-sized or oversized requests
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Pixmap::new(width, height).map(|pixmap| Self { pixmap })
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }

    /// Memory held by the pixel buffer
    pub fn byte_size(&self) -> usize {
        self.pixmap.data().len()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let pixel = self.pixmap.pixel(x, y)?.demultiply();
        Some(Color::from_rgba8(
            pixel.red(),
            pixel.green(),
            pixel.blue(),
            pixel.alpha(),
        ))
    }

    /// Straight (non-premultiplied) RGBA bytes, row by row
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Device-space drawing command captured by [`RecordingSurface`]
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Fill {
        path: Path,
        color: Color,
        clip: Option<Bounds>,
    },
    Stroke {
        path: Path,
        color: Color,
        width: f32,
        dash: Option<Dash>,
        clip: Option<Bounds>,
    },
    Bitmap {
        dest: Bounds,
        width: u32,
        height: u32,
    },
    Text {
        origin: Vec2,
        text: String,
        font_size: f32,
    },
    ShowPage,
}

/// A surface that records what would have been drawn
#[derive(Debug, Default)]
pub struct RecordingSurface {
    state: SurfaceState,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn page_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::ShowPage))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn state(&self) -> &SurfaceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SurfaceState {
        &mut self.state
    }

    fn fill_path(&mut self, path: &Path) {
        self.commands.push(DrawCommand::Fill {
            path: path.clone(),
            color: self.state.color,
            clip: self.state.clip,
        });
    }

    fn stroke_path(&mut self, path: &Path) {
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            color: self.state.color,
            width: self.state.device_line_width(),
            dash: self.state.device_dash(),
            clip: self.state.clip,
        });
    }

    fn draw_bitmap_device(&mut self, bitmap: &Bitmap, dest: Bounds) {
        self.commands.push(DrawCommand::Bitmap {
            dest,
            width: bitmap.width(),
            height: bitmap.height(),
        });
    }

    fn show_text(&mut self, origin: Vec2, text: &str, font_size: f32) {
        self.commands.push(DrawCommand::Text {
            origin: self.user_to_device(origin),
            text: text.to_string(),
            font_size: font_size * self.state.transform.scale,
        });
    }

    fn show_page(&mut self) {
        self.commands.push(DrawCommand::ShowPage);
    }
}
