//! # Canvas
//!
//! The interactive diagram canvas built on the [`scene_graph`]. A
//! [`CanvasView`] owns a stack of content [`Layer`]s between a page
//! [`BackgroundLayer`] and an [`InteractionLayer`] carrying resize handles,
//! the rubber-band marquee and drop-target highlights.
//!
//! ## Painting
//!
//! Hosts call [`CanvasView::take_repaint_request`] once per frame and then
//! [`CanvasView::repaint`] with the returned window region. Top-level items are
//! painted by the active [`Renderer`]: directly, from a CPU bitmap cache, or as
//! a GPU textured quad through a host [`GpuContext`].
//!
//! ## Input
//!
//! Normalized button, motion and key events go through the canvas handlers,
//! which offer them to the application relays, then to the interaction layer,
//! then to the item under the pointer and its ancestors up to the top-level item.
//!
//! ## Threads
//!
//! [`CanvasView`] is `Send`. [`SharedCanvas`] wraps it in the coarse lock that
//! every thread takes before touching the diagram.

pub mod background;
pub mod config;
pub mod error;
pub mod export;
pub mod interaction;
pub mod layer;
pub mod renderer;
pub mod selection;
pub mod shared;
pub mod view;

pub use background::BackgroundLayer;
pub use config::CanvasConfig;
pub use error::CanvasError;
pub use export::{substitute_page_tokens, DocumentBackend, PrintOptions, SvgBackend, POINTS_PER_MM};
pub use interaction::{InteractionLayer, InteractionResult, ItemHandle};
pub use layer::Layer;
pub use renderer::{CacheLedger, CachedTextureRenderer, GpuContext, ImmediateRenderer, Renderer};
pub use selection::{SelectMode, Selection};
pub use shared::SharedCanvas;
pub use view::{CanvasView, PointerState};
