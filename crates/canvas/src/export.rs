//! Export and print.
//!
//! Every path renders the diagram directly (no caches) in printout mode, so the
//! output never depends on the on-screen zoom, selection or hover state.

use crate::error::CanvasError;
use crate::view::CanvasView;
use canvas_core::raster::PixelSurface;
use canvas_core::svg::SvgSurface;
use canvas_core::{Bitmap, Bounds, Color, Surface};
use glam::Vec2;
use std::io::Cursor;
use std::path::Path;

pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Space kept around the content of a cropped PNG, in canvas units
const CROP_MARGIN: f32 = 10.0;

/// Paged vector output supplied by the host (PDF, PostScript, SVG, ...)
pub trait DocumentBackend {
    type Surface: Surface;

    /// Starts a document whose pages are `page_size` points
    fn create_surface(&mut self, page_size: Vec2) -> Result<Self::Surface, CanvasError>;

    /// Writes out a finished document
    fn finish(&mut self, surface: Self::Surface) -> Result<(), CanvasError>;
}

/// Collects SVG documents, one per page
#[derive(Debug, Default)]
pub struct SvgBackend {
    pages: Vec<String>,
}

impl SvgBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<String> {
        self.pages
    }
}

impl DocumentBackend for SvgBackend {
    type Surface = SvgSurface;

    fn create_surface(&mut self, page_size: Vec2) -> Result<SvgSurface, CanvasError> {
        if page_size.min_element() <= 0.0 {
            return Err(CanvasError::InvalidGeometry(format!(
                "page size {page_size} has no area"
            )));
        }
        Ok(SvgSurface::new(page_size.x, page_size.y))
    }

    fn finish(&mut self, surface: SvgSurface) -> Result<(), CanvasError> {
        self.pages.extend(surface.finish());
        Ok(())
    }
}

/// Paper and decoration of a printout
#[derive(Clone, Debug, PartialEq)]
pub struct PrintOptions {
    pub paper_size_mm: Vec2,
    pub margin_mm: f32,
    /// Text above every page; see [`substitute_page_tokens`]
    pub header: Option<String>,
    pub footer: Option<String>,
    /// Header and footer size in points
    pub font_size: f32,
    /// Number of the first printed page within a larger document
    pub first_doc_page: u32,
    /// Page count of the larger document, if this printout is part of one
    pub doc_total_pages: Option<u32>,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            // A4
            paper_size_mm: Vec2::new(210.0, 297.0),
            margin_mm: 10.0,
            header: None,
            footer: None,
            font_size: 9.0,
            first_doc_page: 1,
            doc_total_pages: None,
        }
    }
}

/// Replaces `$page`, `$total_pages`, `$doc_page` and `$doc_total_pages` in
/// header and footer text
pub fn substitute_page_tokens(
    text: &str,
    page: u32,
    total_pages: u32,
    doc_page: u32,
    doc_total_pages: u32,
) -> String {
    // longest first, so no token is cut short by a shorter one
    let mut tokens = [
        ("$doc_total_pages", doc_total_pages),
        ("$total_pages", total_pages),
        ("$doc_page", doc_page),
        ("$page", page),
    ];
    tokens.sort_by_key(|(token, _)| std::cmp::Reverse(token.len()));
    tokens
        .iter()
        .fold(text.to_string(), |text, (token, value)| text.replace(token, &value.to_string()))
}

impl CanvasView {
    /// The region a PNG export covers, in canvas units
    pub fn export_bounds(&self, crop: bool) -> Bounds {
        if !crop {
            return Bounds::from_origin_size(Vec2::ZERO, self.total_view_size());
        }
        let content = self.get_content_bounds().unwrap_or_else(|| {
            log::warn!("exporting a canvas with no visible content");
            Bounds::zero()
        });
        Bounds::from_origin_size(
            (content.min - Vec2::splat(CROP_MARGIN)).max(Vec2::ZERO),
            content.size() + Vec2::splat(CROP_MARGIN * 2.0),
        )
    }

    /// Renders the diagram at 1:1 onto a white bitmap
    pub fn render_png(&mut self, crop: bool) -> Result<Bitmap, CanvasError> {
        let bounds = self.export_bounds(crop);
        let (width, height) = (bounds.width().ceil() as u32, bounds.height().ceil() as u32);
        let mut surface = PixelSurface::with_background(width, height, Color::WHITE)
            .ok_or(CanvasError::SurfaceCreation { width, height })?;
        self.render_for_export(&mut surface, &bounds);
        Ok(surface.into_bitmap())
    }

    pub fn encode_png(&mut self, crop: bool) -> Result<Vec<u8>, CanvasError> {
        let bitmap = self.render_png(crop)?;
        let (width, height) = (bitmap.width(), bitmap.height());
        let image = image::RgbaImage::from_raw(width, height, bitmap.to_rgba8())
            .ok_or(CanvasError::SurfaceCreation { width, height })?;
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }

    /// Writes a PNG of the whole canvas, or of its content plus a margin
    pub fn export_png(&mut self, path: impl AsRef<Path>, crop: bool) -> Result<(), CanvasError> {
        let path = path.as_ref();
        log::info!("exporting png to {}", path.display());
        let bytes = self.encode_png(crop)?;
        std::fs::write(path, bytes).map_err(|e| CanvasError::io(path, e))?;
        log::info!("png export finished");
        Ok(())
    }

    /// Renders the whole canvas onto one page of `size_in_pt`, scaled to
    /// the page width
    pub fn export_document<B: DocumentBackend>(
        &mut self,
        backend: &mut B,
        size_in_pt: Vec2,
    ) -> Result<(), CanvasError> {
        let total = self.total_view_size();
        if total.min_element() <= 0.0 {
            return Err(CanvasError::InvalidGeometry(format!("canvas size {total} has no area")));
        }
        let mut surface = backend.create_surface(size_in_pt)?;
        let scale = size_in_pt.x / total.x;
        surface.save();
        surface.scale(scale);
        self.render_for_export(&mut surface, &Bounds::from_origin_size(Vec2::ZERO, total));
        surface.restore();
        surface.show_page();
        backend.finish(surface)
    }

    pub fn export_svg(&mut self, path: impl AsRef<Path>, size_in_pt: Vec2) -> Result<(), CanvasError> {
        let path = path.as_ref();
        log::info!("exporting svg to {}", path.display());
        let mut backend = SvgBackend::new();
        self.export_document(&mut backend, size_in_pt)?;
        let document = backend.into_pages().concat();
        std::fs::write(path, document).map_err(|e| CanvasError::io(path, e))?;
        log::info!("svg export finished");
        Ok(())
    }

    /// Prints one paper page per canvas page, row by row. Returns the number
    /// of pages printed.
    pub fn print<B: DocumentBackend>(
        &mut self,
        backend: &mut B,
        options: &PrintOptions,
    ) -> Result<u32, CanvasError> {
        let paper = options.paper_size_mm * POINTS_PER_MM;
        let margin = options.margin_mm * POINTS_PER_MM;
        let band = options.font_size * 2.0;
        let header_band = if options.header.is_some() { band } else { 0.0 };
        let footer_band = if options.footer.is_some() { band } else { 0.0 };
        let printable = Bounds::new(
            Vec2::new(margin, margin + header_band),
            Vec2::new(paper.x - margin, paper.y - margin - footer_band),
        );
        let page = self.page_size();
        if printable.is_empty() || page.min_element() <= 0.0 {
            return Err(CanvasError::InvalidGeometry(format!(
                "cannot fit {page} pages on {}mm paper",
                options.paper_size_mm
            )));
        }
        let scale = (printable.width() / page.x).min(printable.height() / page.y);

        let (x_pages, y_pages) = self.page_layout();
        let total_pages = x_pages * y_pages;
        let doc_total_pages = options
            .doc_total_pages
            .unwrap_or(options.first_doc_page + total_pages - 1);
        log::info!("printing {total_pages} pages at scale {scale:.3}");

        let mut surface = backend.create_surface(paper)?;
        for index in 0..total_pages {
            let (x, y) = (index % x_pages, index / x_pages);
            let tile = Bounds::from_origin_size(page * Vec2::new(x as f32, y as f32), page);

            surface.save();
            surface.translate(printable.min);
            surface.scale(scale);
            self.render_for_export(&mut surface, &tile);
            surface.restore();

            let tokens = |text: &str| {
                substitute_page_tokens(
                    text,
                    index + 1,
                    total_pages,
                    options.first_doc_page + index,
                    doc_total_pages,
                )
            };
            surface.set_color(Color::BLACK);
            if let Some(header) = &options.header {
                let origin = Vec2::new(margin, margin + options.font_size);
                surface.show_text(origin, &tokens(header), options.font_size);
            }
            if let Some(footer) = &options.footer {
                let origin = Vec2::new(margin, paper.y - margin);
                surface.show_text(origin, &tokens(footer), options.font_size);
            }
            surface.show_page();
        }
        backend.finish(surface)?;
        log::info!("print finished");
        Ok(total_pages)
    }
}
