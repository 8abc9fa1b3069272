//! Drawing helpers shared by figures and the canvas layers.

use crate::bounds::Bounds;
use crate::color::Color;
use crate::surface::Surface;
use glam::Vec2;
use std::f32::consts::{FRAC_PI_2, PI};

/// Which corners of a rectangle get rounded
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CornerMask {
    pub top_left: bool,
    pub top_right: bool,
    pub bottom_left: bool,
    pub bottom_right: bool,
}

impl CornerMask {
    pub const ALL: CornerMask = CornerMask {
        top_left: true,
        top_right: true,
        bottom_left: true,
        bottom_right: true,
    };
    pub const NONE: CornerMask = CornerMask {
        top_left: false,
        top_right: false,
        bottom_left: false,
        bottom_right: false,
    };
    pub const TOP: CornerMask = CornerMask {
        top_left: true,
        top_right: true,
        bottom_left: false,
        bottom_right: false,
    };

    pub fn any(&self) -> bool {
        self.top_left || self.top_right || self.bottom_left || self.bottom_right
    }
}

/// Adds a rectangle with rounded corners to the current path
///
/// `offset` grows the rectangle on every side before the half-unit alignment
/// used for crisp one-unit strokes.
pub fn rounded_rectangle(
    surface: &mut dyn Surface,
    rect: &Bounds,
    corners: CornerMask,
    radius: f32,
    offset: f32,
) {
    let bounds = Bounds::from_origin_size(
        rect.min + Vec2::splat(0.5 - offset),
        rect.size() + Vec2::splat(offset * 2.0),
    );

    if radius <= 0.0 || !corners.any() {
        surface.rectangle(&bounds);
        return;
    }

    let r = radius;
    let (left, top, right, bottom) = (bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y);
    let step = |on: bool| if on { r } else { 0.0 };

    surface.new_path();
    if corners.top_left {
        surface.arc(Vec2::new(left + r, top + r), r, PI, PI + FRAC_PI_2);
    } else {
        surface.move_to(Vec2::new(left, top));
    }
    surface.line_to(Vec2::new(right - step(corners.top_right), top));
    if corners.top_right {
        surface.arc(Vec2::new(right - r, top + r), r, PI + FRAC_PI_2, 0.0);
    }
    surface.line_to(Vec2::new(right, bottom - step(corners.bottom_right)));
    if corners.bottom_right {
        surface.arc(Vec2::new(right - r, bottom - r), r, 0.0, FRAC_PI_2);
    }
    surface.line_to(Vec2::new(left + step(corners.bottom_left), bottom));
    if corners.bottom_left {
        surface.arc(Vec2::new(left + r, bottom - r), r, FRAC_PI_2, PI);
    }
    surface.line_to(Vec2::new(left, top + step(corners.top_left)));
    surface.close_path();
}

/// Soft drop shadow along the right and bottom edges of `around`
///
/// The fade is approximated with bands of decreasing opacity.
pub fn draw_shadow(surface: &mut dyn Surface, around: &Bounds, color: Color) {
    const BANDS: usize = 4;
    const DEPTH: f32 = 5.0;

    surface.save();
    for band in 0..BANDS {
        let alpha = color.a * (1.0 - band as f32 / BANDS as f32) * 0.5;
        let inner = DEPTH * band as f32 / BANDS as f32;
        let width = DEPTH / BANDS as f32;
        surface.set_color(color.with_alpha(alpha));

        surface.rectangle(&Bounds::from_xywh(
            around.max.x + inner,
            around.min.y + 2.0,
            width,
            around.height() - 2.0 + inner,
        ));
        surface.rectangle(&Bounds::from_xywh(
            around.min.x + 2.0,
            around.max.y + inner,
            around.width() - 2.0 + inner + width,
            width,
        ));
        surface.fill();
    }
    surface.restore();
}

/// A wide translucent ring around `around`, used for focus highlights
pub fn draw_glow(surface: &mut dyn Surface, around: &Bounds, color: Color) {
    surface.save();
    surface.set_color(color.with_alpha(0.6));
    surface.set_line_width(5.0);
    surface.rectangle(&around.expand(2.5));
    surface.stroke();
    surface.restore();
}
