//! diagram - render diagrams from the command line.
//!
//! Builds a diagram from a JSON description (or the built-in sample) and
//! exports it as PNG or SVG, or prints it as one SVG document per page.

mod demo;
mod logger;

use anyhow::{Context, Result};
use canvas::{PrintOptions, SvgBackend};
use clap::{Parser, Subcommand};
use demo::DiagramFile;
use glam::Vec2;
use logger::DiagramLogger;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "diagram")]
#[command(about = "Render diagrams to PNG, SVG and paged output")]
struct Cli {
    /// JSON diagram description (default: the built-in sample)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Raise the log level; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a PNG image
    Png {
        output: PathBuf,
        /// Keep the whole page area instead of cropping to the content
        #[arg(long)]
        full: bool,
    },

    /// Export a single-page SVG document
    Svg {
        output: PathBuf,
        /// Page width in points; the height follows the canvas proportions
        #[arg(long, default_value_t = 842.0)]
        width: f32,
    },

    /// Print every canvas page onto paper, one SVG file per page
    Print {
        /// Directory the pages are written to
        output_dir: PathBuf,
        /// Paper width in millimeters
        #[arg(long, default_value_t = 210.0)]
        paper_width: f32,
        /// Paper height in millimeters
        #[arg(long, default_value_t = 297.0)]
        paper_height: f32,
        /// Header text; $page and $total_pages are replaced
        #[arg(long)]
        header: Option<String>,
        #[arg(long)]
        footer: Option<String>,
    },

    /// Write the built-in sample as JSON, as a starting point for --input
    Sample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    DiagramLogger::init(cli.verbose)?;

    let input = cli.input.as_deref();
    let build = || load_diagram(input)?.build();

    match cli.command {
        Commands::Sample => {
            let json = serde_json::to_string_pretty(&DiagramFile::sample())?;
            println!("{json}");
        }
        Commands::Png { output, full } => {
            let mut view = build()?;
            view.export_png(&output, !full)
                .with_context(|| format!("Failed to export {}", output.display()))?;
        }
        Commands::Svg { output, width } => {
            let mut view = build()?;
            let total = view.total_view_size();
            let size = Vec2::new(width, width * total.y / total.x);
            view.export_svg(&output, size)
                .with_context(|| format!("Failed to export {}", output.display()))?;
        }
        Commands::Print {
            output_dir,
            paper_width,
            paper_height,
            header,
            footer,
        } => {
            let options = PrintOptions {
                paper_size_mm: Vec2::new(paper_width, paper_height),
                header,
                footer,
                ..PrintOptions::default()
            };
            let mut view = build()?;
            print_pages(&mut view, &output_dir, &options)?;
        }
    }
    Ok(())
}

fn load_diagram(path: Option<&Path>) -> Result<DiagramFile> {
    let Some(path) = path else {
        return Ok(DiagramFile::sample());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_pages(view: &mut canvas::CanvasView, output_dir: &Path, options: &PrintOptions) -> Result<()> {
    let mut backend = SvgBackend::new();
    let pages = view.print(&mut backend, options).context("Failed to print")?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    for (index, page) in backend.pages().iter().enumerate() {
        let path = output_dir.join(format!("page-{:02}.svg", index + 1));
        std::fs::write(&path, page).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    println!("printed {pages} pages to {}", output_dir.display());
    Ok(())
}
