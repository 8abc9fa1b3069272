//! Application-defined drawable content.
//!
//! A [`Figure`] draws itself in local coordinates and may react to pointer events
//! routed to its item. Everything else (geometry, selection, caching) is handled
//! by the scene and the canvas.

use canvas_core::draw::{rounded_rectangle, CornerMask};
use canvas_core::input::{Modifiers, MouseButton};
use canvas_core::{Bounds, Color, Surface};
use glam::Vec2;
use strum_macros::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum ItemEventKind {
    ButtonPress,
    ButtonRelease,
    Click,
    DoubleClick,
    Drag,
    Enter,
    Leave,
}

/// A pointer event delivered to one item, in that item's coordinates
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ItemEvent {
    pub kind: ItemEventKind,
    pub position: Vec2,
    pub button: Option<MouseButton>,
    pub modifiers: Modifiers,
}

pub trait Figure: Send {
    /// Draws the figure into the rectangle `(0, 0)..size`
    fn render(&self, surface: &mut dyn Surface, size: Vec2);

    /// Smallest size the contents need, not counting item padding
    fn calc_min_size(&self) -> Vec2 {
        Vec2::ZERO
    }

    /// Adds the figure's outline grown by `offset` to the current path
    fn stroke_outline(&self, surface: &mut dyn Surface, size: Vec2, offset: f32) {
        surface.rectangle(&Bounds::from_origin_size(
            Vec2::splat(-offset),
            size + Vec2::splat(offset * 2.0),
        ));
    }

    fn contains_point(&self, point: Vec2, size: Vec2) -> bool {
        Bounds::from_origin_size(Vec2::ZERO, size).contains_point(point)
    }

    /// Return `true` to consume the event before the default item behavior runs
    fn on_event(&mut self, _event: &ItemEvent) -> bool {
        false
    }

    fn name(&self) -> &str {
        "figure"
    }
}

/// Rough advance width of one character, relative to the font size
const CHAR_WIDTH_RATIO: f32 = 0.6;

fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * CHAR_WIDTH_RATIO
}

/// A filled, outlined box with an optional centered title
#[derive(Clone, Debug, PartialEq)]
pub struct RectFigure {
    pub fill: Color,
    pub pen: Color,
    pub line_width: f32,
    pub corner_radius: f32,
    pub title: Option<String>,
    pub font_size: f32,
}

impl Default for RectFigure {
    fn default() -> Self {
        Self {
            fill: Color::WHITE,
            pen: Color::BLACK,
            line_width: 1.0,
            corner_radius: 0.0,
            title: None,
            font_size: 12.0,
        }
    }
}

impl RectFigure {
    pub fn new(fill: Color) -> Self {
        Self {
            fill,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_corner_radius(mut self, radius: f32) -> Self {
        self.corner_radius = radius;
        self
    }
}

impl Figure for RectFigure {
    fn render(&self, surface: &mut dyn Surface, size: Vec2) {
        let rect = Bounds::from_origin_size(Vec2::ZERO, size - Vec2::ONE);
        rounded_rectangle(surface, &rect, CornerMask::ALL, self.corner_radius, 0.0);
        surface.set_color(self.fill);
        surface.fill_preserve();
        surface.set_color(self.pen);
        surface.set_line_width(self.line_width);
        surface.stroke();

        if let Some(title) = &self.title {
            let width = text_width(title, self.font_size);
            let origin = Vec2::new(
                ((size.x - width) / 2.0).max(4.0),
                (size.y + self.font_size) / 2.0 - 2.0,
            );
            surface.set_color(self.pen);
            surface.show_text(origin.floor(), title, self.font_size);
        }
    }

    fn calc_min_size(&self) -> Vec2 {
        match &self.title {
            Some(title) => Vec2::new(
                text_width(title, self.font_size) + 10.0,
                self.font_size + 8.0,
            )
            .ceil(),
            None => Vec2::new(10.0, 10.0),
        }
    }

    fn stroke_outline(&self, surface: &mut dyn Surface, size: Vec2, offset: f32) {
        let rect = Bounds::from_origin_size(Vec2::ZERO, size - Vec2::ONE);
        rounded_rectangle(surface, &rect, CornerMask::ALL, self.corner_radius, offset);
    }

    fn name(&self) -> &str {
        "rect"
    }
}

/// A single line of text
#[derive(Clone, Debug, PartialEq)]
pub struct TextFigure {
    pub text: String,
    pub color: Color,
    pub font_size: f32,
}

impl TextFigure {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: Color::BLACK,
            font_size: 12.0,
        }
    }
}

impl Figure for TextFigure {
    fn render(&self, surface: &mut dyn Surface, size: Vec2) {
        surface.set_color(self.color);
        let baseline = ((size.y + self.font_size) / 2.0 - 2.0).floor();
        surface.show_text(Vec2::new(0.0, baseline), &self.text, self.font_size);
    }

    fn calc_min_size(&self) -> Vec2 {
        Vec2::new(
            text_width(&self.text, self.font_size),
            self.font_size * 1.25,
        )
        .ceil()
    }

    fn name(&self) -> &str {
        "text"
    }
}
