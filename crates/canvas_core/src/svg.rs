//! SVG document surface.
//!
//! Every `show_page` closes the current page; each page becomes a standalone SVG
//! document. Geometry is written in device units, so the surface transform decides
//! the scale of the output.

use crate::bounds::Bounds;
use crate::color::Color;
use crate::surface::{Bitmap, Path, Surface, SurfaceState};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use glam::Vec2;
use std::fmt::Write as _;

pub struct SvgSurface {
    state: SurfaceState,
    width: f32,
    height: f32,
    body: String,
    defs: String,
    clip_ids: Vec<Bounds>,
    pages: Vec<String>,
}

impl SvgSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            state: SurfaceState::default(),
            width,
            height,
            body: String::new(),
            defs: String::new(),
            clip_ids: Vec::new(),
            pages: Vec::new(),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Finished pages; a page still in progress is closed first
    pub fn finish(mut self) -> Vec<String> {
        if !self.body.is_empty() || self.pages.is_empty() {
            self.close_page();
        }
        self.pages
    }

    fn close_page(&mut self) {
        let mut doc = String::new();
        let _ = writeln!(
            doc,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        if !self.defs.is_empty() {
            let _ = writeln!(doc, "<defs>\n{}</defs>", self.defs);
        }
        doc.push_str(&self.body);
        doc.push_str("</svg>\n");

        self.pages.push(doc);
        self.body.clear();
        self.defs.clear();
        self.clip_ids.clear();
    }

    fn clip_attr(&mut self) -> String {
        let Some(clip) = self.state.clip else {
            return String::new();
        };
        let index = match self.clip_ids.iter().position(|c| *c == clip) {
            Some(index) => index,
            None => {
                self.clip_ids.push(clip);
                let index = self.clip_ids.len() - 1;
                let _ = writeln!(
                    self.defs,
                    r#"<clipPath id="clip{index}"><rect x="{}" y="{}" width="{}" height="{}"/></clipPath>"#,
                    clip.min.x,
                    clip.min.y,
                    clip.width(),
                    clip.height()
                );
                index
            }
        };
        format!(r#" clip-path="url(#clip{index})""#)
    }
}

fn path_data(path: &Path) -> String {
    let mut d = String::new();
    for sub in &path.subpaths {
        for (i, p) in sub.points.iter().enumerate() {
            let op = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{op}{} {} ", p.x, p.y);
        }
        if sub.closed {
            d.push_str("Z ");
        }
    }
    d.trim_end().to_string()
}

fn paint_attrs(kind: &str, color: Color) -> String {
    let [r, g, b, _] = color.to_rgba8();
    let mut attrs = format!(r##"{kind}="#{r:02x}{g:02x}{b:02x}""##);
    if color.a < 1.0 {
        let _ = write!(attrs, r#" {kind}-opacity="{}""#, color.a);
    }
    attrs
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl Surface for SvgSurface {
    fn state(&self) -> &SurfaceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SurfaceState {
        &mut self.state
    }

    fn fill_path(&mut self, path: &Path) {
        let clip = self.clip_attr();
        let _ = writeln!(
            self.body,
            r#"<path d="{}" {}{clip}/>"#,
            path_data(path),
            paint_attrs("fill", self.state.color)
        );
    }

    fn stroke_path(&mut self, path: &Path) {
        let clip = self.clip_attr();
        let mut dash = String::new();
        if let Some((lengths, offset)) = self.state.device_dash() {
            let array: Vec<String> = lengths.iter().map(|l| l.to_string()).collect();
            dash = format!(
                r#" stroke-dasharray="{}" stroke-dashoffset="{offset}""#,
                array.join(",")
            );
        }
        let _ = writeln!(
            self.body,
            r#"<path d="{}" fill="none" {} stroke-width="{}"{dash}{clip}/>"#,
            path_data(path),
            paint_attrs("stroke", self.state.color),
            self.state.device_line_width()
        );
    }

    fn draw_bitmap_device(&mut self, bitmap: &Bitmap, dest: Bounds) {
        let png = match bitmap.pixmap().encode_png() {
            Ok(png) => png,
            Err(err) => {
                log::warn!("skipping bitmap in SVG output: {err}");
                return;
            }
        };
        let clip = self.clip_attr();
        let _ = writeln!(
            self.body,
            r#"<image x="{}" y="{}" width="{}" height="{}" href="data:image/png;base64,{}"{clip}/>"#,
            dest.min.x,
            dest.min.y,
            dest.width(),
            dest.height(),
            STANDARD.encode(png)
        );
    }

    fn show_text(&mut self, origin: Vec2, text: &str, font_size: f32) {
        let origin = self.user_to_device(origin);
        let size = font_size * self.state.transform.scale;
        let clip = self.clip_attr();
        let _ = writeln!(
            self.body,
            r#"<text x="{}" y="{}" font-size="{size}" {}{clip}>{}</text>"#,
            origin.x,
            origin.y,
            paint_attrs("fill", self.state.color),
            escape_text(text)
        );
    }

    fn show_page(&mut self) {
        self.close_page();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_page_document() {
        let mut surface = SvgSurface::new(100.0, 50.0);
        surface.set_color(Color::rgb(1.0, 0.0, 0.0));
        surface.rectangle(&Bounds::from_xywh(10.0, 10.0, 20.0, 20.0));
        surface.fill();

        let pages = surface.finish();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].starts_with("<svg"));
        assert!(pages[0].contains(r#"d="M10 10 L30 10 L30 30 L10 30 Z""#));
        assert!(pages[0].contains(r##"fill="#ff0000""##));
    }

    #[test]
    fn test_pages_and_clips() {
        let mut surface = SvgSurface::new(100.0, 100.0);
        surface.clip_rect(&Bounds::from_xywh(0.0, 0.0, 50.0, 50.0));
        surface.set_dash(&[2.0, 2.0], 0.0);
        surface.move_to(Vec2::ZERO);
        surface.line_to(Vec2::new(40.0, 40.0));
        surface.stroke();
        surface.show_page();
        surface.reset_clip();
        surface.show_text(Vec2::new(5.0, 95.0), "a < b", 10.0);
        surface.show_page();

        let pages = surface.finish();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("<clipPath id=\"clip0\">"));
        assert!(pages[0].contains("stroke-dasharray=\"2,2\""));
        assert!(!pages[1].contains("clipPath"));
        assert!(pages[1].contains("a &lt; b"));
    }
}
