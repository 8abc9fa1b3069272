//! Page background: fill, grid and page boundaries.

use canvas_core::{Bounds, Color, Surface};
use glam::Vec2;

/// Finest grid spacing, in device pixels, that is still drawn
const MIN_GRID_PIXELS: f32 = 4.0;
const MAJOR_GRID_STEPS: f32 = 10.0;
const MIN_MAJOR_GRID_PIXELS: f32 = 10.0;

pub struct BackgroundLayer {
    pub visible: bool,
    pub fill_color: Color,
    pub grid_visible: bool,
    pub grid_size: f32,
    pub page_size: Vec2,
    pub x_pages: u32,
    pub y_pages: u32,
}

impl BackgroundLayer {
    pub fn new(page_size: Vec2, x_pages: u32, y_pages: u32) -> Self {
        Self {
            visible: true,
            fill_color: Color::WHITE,
            grid_visible: true,
            grid_size: 10.0,
            page_size,
            x_pages,
            y_pages,
        }
    }

    pub fn total_size(&self) -> Vec2 {
        self.page_size * Vec2::new(self.x_pages as f32, self.y_pages as f32)
    }

    pub fn grid_color(&self) -> Color {
        self.fill_color.contrasting_shade(0.05)
    }

    pub fn major_grid_color(&self) -> Color {
        self.fill_color.contrasting_shade(0.12)
    }

    pub fn page_border_color(&self) -> Color {
        self.fill_color.contrasting_shade(0.3)
    }

    /// Paints the part of the background inside `bounds` (canvas coordinates)
    pub fn repaint(&self, surface: &mut dyn Surface, bounds: &Bounds) {
        if !self.visible {
            return;
        }
        let total = Bounds::from_origin_size(Vec2::ZERO, self.total_size());
        let Some(area) = bounds.intersection(&total) else {
            return;
        };

        surface.save();
        surface.new_path();
        surface.set_color(self.fill_color);
        surface.rectangle(&area);
        surface.fill();

        let zoom = surface.transform().scale;
        // one device pixel wide at any zoom
        surface.set_line_width(1.0 / zoom);
        if self.grid_visible && self.grid_size > 0.0 {
            if self.grid_size * zoom >= MIN_GRID_PIXELS {
                self.draw_lines(surface, &area, Vec2::splat(self.grid_size), self.grid_color());
            }
            let major = self.grid_size * MAJOR_GRID_STEPS;
            if major * zoom >= MIN_MAJOR_GRID_PIXELS {
                self.draw_lines(surface, &area, Vec2::splat(major), self.major_grid_color());
            }
        }
        if self.x_pages > 1 || self.y_pages > 1 {
            self.draw_lines(surface, &area, self.page_size, self.page_border_color());
        }
        surface.restore();
    }

    /// Vertical and horizontal lines every `step`, strictly inside the page area
    fn draw_lines(&self, surface: &mut dyn Surface, area: &Bounds, step: Vec2, color: Color) {
        let total = self.total_size();
        surface.new_path();
        let mut x = (area.min.x / step.x).floor() * step.x;
        while x <= area.max.x {
            if x > 0.0 && x < total.x {
                surface.move_to(Vec2::new(x, area.min.y));
                surface.line_to(Vec2::new(x, area.max.y));
            }
            x += step.x;
        }
        let mut y = (area.min.y / step.y).floor() * step.y;
        while y <= area.max.y {
            if y > 0.0 && y < total.y {
                surface.move_to(Vec2::new(area.min.x, y));
                surface.line_to(Vec2::new(area.max.x, y));
            }
            y += step.y;
        }
        surface.set_color(color);
        surface.stroke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::{DrawCommand, RecordingSurface};

    fn strokes(surface: &RecordingSurface) -> Vec<(Color, usize)> {
        surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Stroke { color, path, .. } => Some((*color, path.subpaths.len())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_fill_is_clipped_to_the_page_area() {
        let background = BackgroundLayer::new(Vec2::new(100.0, 100.0), 1, 1);
        let mut surface = RecordingSurface::new();
        background.repaint(&mut surface, &Bounds::from_xywh(50.0, 50.0, 500.0, 500.0));

        let DrawCommand::Fill { path, color, .. } = &surface.commands()[0] else {
            panic!("expected the page fill");
        };
        assert_eq!(*color, Color::WHITE);
        assert_eq!(path.bounds(), Some(Bounds::from_xywh(50.0, 50.0, 50.0, 50.0)));
    }

    #[test]
    fn test_grid_fades_out_when_zoomed_out() {
        let background = BackgroundLayer::new(Vec2::new(200.0, 200.0), 1, 1);
        let bounds = Bounds::from_xywh(0.0, 0.0, 200.0, 200.0);

        let mut surface = RecordingSurface::new();
        background.repaint(&mut surface, &bounds);
        let drawn = strokes(&surface);
        // 19 inner lines per axis for the fine grid, one per axis for the major grid
        assert_eq!(drawn[0], (background.grid_color(), 38));
        assert_eq!(drawn[1], (background.major_grid_color(), 2));

        let mut surface = RecordingSurface::new();
        surface.scale(0.3);
        background.repaint(&mut surface, &bounds);
        assert_eq!(strokes(&surface), vec![(background.major_grid_color(), 2)]);
    }

    #[test]
    fn test_page_boundaries_for_multi_page_canvas() {
        let mut background = BackgroundLayer::new(Vec2::new(100.0, 100.0), 2, 1);
        background.grid_visible = false;
        let mut surface = RecordingSurface::new();
        background.repaint(&mut surface, &Bounds::from_xywh(0.0, 0.0, 200.0, 100.0));
        assert_eq!(strokes(&surface), vec![(background.page_border_color(), 1)]);
    }

    #[test]
    fn test_grid_contrasts_with_dark_pages() {
        let mut background = BackgroundLayer::new(Vec2::new(100.0, 100.0), 1, 1);
        background.fill_color = Color::rgb(0.1, 0.1, 0.1);
        assert!(background.grid_color().r > 0.1);
        background.fill_color = Color::WHITE;
        assert!(background.grid_color().r < 1.0);
    }
}
