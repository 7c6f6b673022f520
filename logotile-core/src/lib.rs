//! Tiled logo-pattern rendering for print products.
//!
//! A design is a set of parameters (physical size, rotation, logo width, gaps,
//! stagger, background) applied to one or more panels. Each panel renders into
//! a full-resolution RGBA buffer; the on-screen preview is an image-scaled copy
//! of that buffer, and export writes the same buffer as PNG or PDF.

pub mod compositor;
pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod image_cache;
pub mod panel;
pub mod params;
pub mod preview;
pub mod session;
pub mod text;
pub mod units;

pub use compositor::{PanelImages, RenderOutput, render};
pub use config::DesignFile;
pub use error::{Error, Result};
pub use export::ExportFormat;
pub use image_cache::{ImageCache, RasterHandle};
pub use panel::{Overlay, Panel, PanelLayout, PanelSize};
pub use params::{BanderoleParameters, DesignParameters, Rgb};
pub use session::DesignSession;
pub use text::FontBook;
pub use units::Density;
