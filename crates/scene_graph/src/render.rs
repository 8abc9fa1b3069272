//! Painting items onto a surface.
//!
//! Rendering is always immediate here: the canvas decides whether the output
//! goes straight to the screen, into a cache bitmap, or into an export.

use crate::item::{ItemId, ItemKind, ItemState};
use crate::Scene;
use canvas_core::draw::draw_shadow;
use canvas_core::{Bounds, Color, Surface};
use glam::Vec2;

/// Settings shared by every item painted in one pass
#[derive(Clone, Debug, PartialEq)]
pub struct RenderContext {
    /// Export and print output: no state rings
    pub printout: bool,
    pub selection_color: Color,
    pub hover_color: Color,
    pub highlight_color: Color,
    pub shadow_color: Color,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            printout: false,
            selection_color: Color::from_rgba8(0x38, 0x75, 0xd7, 0xff),
            hover_color: Color::from_rgba8(0x8a, 0xb4, 0xf8, 0xff),
            highlight_color: Color::from_rgba8(0xf0, 0xa0, 0x20, 0xff),
            shadow_color: Color::rgba(0.0, 0.0, 0.0, 0.4),
        }
    }
}

impl RenderContext {
    pub fn printout() -> Self {
        Self {
            printout: true,
            ..Self::default()
        }
    }
}

/// Adds the outline of a non-line item grown by `offset` to the path
fn outline(kind: &ItemKind, size: Vec2, surface: &mut dyn Surface, offset: f32) {
    match kind {
        ItemKind::Figure(figure) => figure.stroke_outline(surface, size, offset),
        _ => surface.rectangle(&Bounds::from_origin_size(
            Vec2::splat(-offset),
            size + Vec2::splat(offset * 2.0),
        )),
    }
}

impl Scene {
    /// Paints `id` and everything below it, in the coordinates of its parent
    pub fn render_item(&self, id: ItemId, surface: &mut dyn Surface, ctx: &RenderContext) {
        let Some(item) = self.get(id) else {
            return;
        };
        if !item.flags.visible {
            return;
        }

        surface.save();
        surface.translate(item.position);
        if item.flags.has_shadow {
            draw_shadow(surface, &Bounds::from_origin_size(Vec2::ZERO, item.size), ctx.shadow_color);
        }
        match &item.kind {
            ItemKind::Figure(figure) => figure.render(surface, item.size),
            // front-first lists, painted back to front
            ItemKind::Group(group) => {
                for &child in group.children().iter().rev() {
                    self.render_item(child, surface, ctx);
                }
            }
            ItemKind::Stack(stack) => {
                for &child in stack.children() {
                    self.render_item(child, surface, ctx);
                }
            }
            ItemKind::Line(line) => line.render(surface),
        }
        self.draw_state(id, surface, ctx);
        surface.restore();
    }

    /// Outline ring for the hover, highlight and selection states, in the
    /// item's own coordinates
    pub fn draw_state(&self, id: ItemId, surface: &mut dyn Surface, ctx: &RenderContext) {
        let Some(item) = self.get(id) else {
            return;
        };
        if ctx.printout || !item.flags.draw_state {
            return;
        }
        let color = match item.state() {
            ItemState::Hovering => ctx.hover_color,
            ItemState::Highlighted => item.highlight_color.unwrap_or(ctx.highlight_color),
            ItemState::Selected => ctx.selection_color,
            ItemState::Normal | ItemState::Disabled => return,
        };

        surface.save();
        surface.new_path();
        match &item.kind {
            ItemKind::Line(line) => {
                line.stroke_outline(surface);
                surface.set_color(color.with_alpha(0.6));
                surface.set_line_width(4.0);
                surface.stroke_preserve();
                surface.set_color(color.with_alpha(0.3));
                surface.set_line_width(8.0);
                surface.stroke();
            }
            kind => {
                outline(kind, item.size, surface, 1.0);
                surface.set_color(color);
                surface.set_line_width(2.0);
                surface.stroke();

                outline(kind, item.size, surface, 2.0);
                surface.set_color(color.with_alpha(color.a * 0.3));
                surface.set_line_width(4.0);
                surface.stroke();
            }
        }
        surface.restore();
    }
}
